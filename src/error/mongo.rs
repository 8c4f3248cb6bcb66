/// Structured error information extracted from MongoDB errors.
///
/// Rendered as the one-line description stored in a failed outcome.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ErrorInfo {
    pub(crate) error_type: Option<String>,
    pub(crate) code: Option<i32>,
    pub(crate) code_name: Option<String>,
    pub(crate) message: Option<String>,
}

impl ErrorInfo {
    /// Extract structured information from a MongoDB error using the driver API.
    pub fn from_mongodb_error(error: &mongodb::error::Error) -> Self {
        use mongodb::error::{ErrorKind, WriteFailure};

        let mut info = ErrorInfo::default();

        match error.kind.as_ref() {
            ErrorKind::Write(write_failure) => {
                info.error_type = Some("mongo.write_error".to_string());

                match write_failure {
                    WriteFailure::WriteError(write_error) => {
                        info.code = Some(write_error.code);
                        info.message = Some(write_error.message.clone());
                        info.code_name = write_error
                            .code_name
                            .clone()
                            .or_else(|| code_name_for(write_error.code));
                    }
                    WriteFailure::WriteConcernError(wc_error) => {
                        info.code = Some(wc_error.code);
                        info.message = Some(wc_error.message.clone());
                        info.code_name = Some(wc_error.code_name.clone());
                    }
                    _ => {}
                }
            }
            ErrorKind::Command(command_error) => {
                info.error_type = Some("mongo.command_error".to_string());
                info.code = Some(command_error.code);
                info.message = Some(command_error.message.clone());
                info.code_name = if command_error.code_name.is_empty() {
                    code_name_for(command_error.code)
                } else {
                    Some(command_error.code_name.clone())
                };
            }
            ErrorKind::Authentication { message, .. } => {
                info.error_type = Some("mongo.authentication_error".to_string());
                info.message = Some(message.clone());
            }
            ErrorKind::InvalidArgument { message, .. } => {
                info.error_type = Some("mongo.invalid_argument".to_string());
                info.message = Some(message.clone());
            }
            ErrorKind::ServerSelection { message, .. } => {
                info.error_type = Some("mongo.server_selection_error".to_string());
                info.message = Some(message.clone());
            }
            _ => {
                info.message = Some(error.to_string());
            }
        }

        info
    }

    /// One-line description, e.g. `IndexOptionsConflict (85): Index already exists`.
    pub fn summary(&self) -> String {
        let message = self.message.as_deref().unwrap_or("unknown error");
        match (&self.code_name, self.code) {
            (Some(name), Some(code)) => format!("{name} ({code}): {message}"),
            (None, Some(code)) => format!("error {code}: {message}"),
            (Some(name), None) => format!("{name}: {message}"),
            (None, None) => match &self.error_type {
                Some(kind) => format!("{kind}: {message}"),
                None => message.to_string(),
            },
        }
    }
}

/// Server error names for codes the catalog operations commonly hit.
fn code_name_for(code: i32) -> Option<String> {
    let name = match code {
        2 => "BadValue",
        9 => "FailedToParse",
        13 => "Unauthorized",
        18 => "AuthenticationFailed",
        26 => "NamespaceNotFound",
        40 => "ConflictingUpdateOperators",
        50 => "MaxTimeMSExpired",
        85 => "IndexOptionsConflict",
        86 => "IndexKeySpecsConflict",
        121 => "DocumentValidationFailure",
        168 => "InvalidPipelineOperator",
        11000 | 11001 => "DuplicateKey",
        _ => return None,
    };

    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_with_code_and_name() {
        let info = ErrorInfo {
            error_type: Some("mongo.command_error".into()),
            code: Some(85),
            code_name: Some("IndexOptionsConflict".into()),
            message: Some("Index already exists with a different name".into()),
        };
        assert_eq!(
            info.summary(),
            "IndexOptionsConflict (85): Index already exists with a different name"
        );
    }

    #[test]
    fn test_summary_without_code() {
        let info = ErrorInfo {
            message: Some("server selection timeout".into()),
            ..Default::default()
        };
        assert_eq!(info.summary(), "server selection timeout");
    }

    #[test]
    fn test_summary_names_error_type_without_code() {
        let info = ErrorInfo {
            error_type: Some("mongo.authentication_error".into()),
            message: Some("bad credentials".into()),
            ..Default::default()
        };
        assert_eq!(info.summary(), "mongo.authentication_error: bad credentials");
    }

    #[test]
    fn test_code_name_lookup() {
        assert_eq!(code_name_for(168).as_deref(), Some("InvalidPipelineOperator"));
        assert_eq!(code_name_for(11001).as_deref(), Some("DuplicateKey"));
        assert_eq!(code_name_for(424242), None);
    }

    #[test]
    fn test_summary_without_message() {
        let info = ErrorInfo {
            code: Some(2),
            code_name: Some("BadValue".into()),
            ..Default::default()
        };
        assert_eq!(info.summary(), "BadValue (2): unknown error");
    }
}
