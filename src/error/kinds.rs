use std::time::Duration;
use std::{fmt, io};

use crate::error::mongo::ErrorInfo;

/// Crate-wide `Result` type using [`CatalogError`] as the error.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Top-level error type for catalog runs.
#[derive(Debug)]
pub enum CatalogError {
    /// Database could not be reached or the connection is gone.
    Connection(ConnectionError),

    /// A single catalog operation failed.
    Operation(OperationError),

    /// Configuration or catalog input is invalid.
    Argument(ArgumentError),

    /// I/O errors.
    Io(io::Error),

    /// MongoDB driver errors.
    MongoDb(mongodb::error::Error),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Connection-specific errors. Always fatal for a run.
#[derive(Debug)]
pub enum ConnectionError {
    /// Failed to establish a connection.
    ConnectionFailed(String),

    /// Invalid connection URI.
    InvalidUri(String),

    /// Connection timeout.
    Timeout,

    /// Ping command failed.
    PingFailed(String),

    /// Store used before connecting or after close.
    NotConnected,
}

/// Errors raised by a single operation.
#[derive(Debug)]
pub enum OperationError {
    /// Query, update or index call failed.
    QueryFailed(String),

    /// Operation arguments are malformed.
    InvalidParameters(String),

    /// Operator or stage the store cannot evaluate.
    UnsupportedOperator(String),

    /// Operation exceeded its deadline.
    Timeout(Duration),

    /// Operation was interrupted.
    Cancelled(String),
}

/// Errors in configuration or catalog input. Always raised before connecting.
#[derive(Debug)]
pub enum ArgumentError {
    /// Required value missing or empty.
    MissingField(String),

    /// Value present but not acceptable.
    InvalidValue { field: String, value: String },

    /// File content could not be parsed.
    InvalidFormat(String),

    /// Referenced file does not exist.
    FileNotFound(String),

    /// Catalog has no operation with this name.
    UnknownOperation(String),

    /// Options that cannot be combined.
    Conflict(String),
}

impl CatalogError {
    /// Whether the error aborts a run instead of becoming a failed outcome.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CatalogError::Connection(_) | CatalogError::Argument(_)
        )
    }
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::Connection(e) => write!(f, "Connection error: {e}"),
            CatalogError::Operation(e) => write!(f, "{e}"),
            CatalogError::Argument(e) => write!(f, "Invalid argument: {e}"),
            CatalogError::Io(e) => write!(f, "I/O error: {e}"),
            CatalogError::MongoDb(e) => write!(f, "{}", ErrorInfo::from_mongodb_error(e).summary()),
            CatalogError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::ConnectionFailed(msg) => write!(f, "Failed to connect: {msg}"),
            ConnectionError::InvalidUri(uri) => write!(f, "Invalid connection URI: {uri}"),
            ConnectionError::Timeout => write!(f, "Connection timeout"),
            ConnectionError::PingFailed(msg) => write!(f, "Ping failed: {msg}"),
            ConnectionError::NotConnected => write!(f, "Not connected to the database"),
        }
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationError::QueryFailed(msg) => write!(f, "Query failed: {msg}"),
            OperationError::InvalidParameters(msg) => write!(f, "Invalid parameters: {msg}"),
            OperationError::UnsupportedOperator(op) => write!(f, "Unsupported operator: {op}"),
            OperationError::Timeout(limit) => write!(f, "Operation timed out after {limit:?}"),
            OperationError::Cancelled(msg) => write!(f, "Cancelled: {msg}"),
        }
    }
}

impl fmt::Display for ArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentError::MissingField(field) => write!(f, "Missing required field: {field}"),
            ArgumentError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
            ArgumentError::InvalidFormat(msg) => write!(f, "Invalid format: {msg}"),
            ArgumentError::FileNotFound(path) => write!(f, "File not found: {path}"),
            ArgumentError::UnknownOperation(name) => {
                write!(f, "Catalog has no operation named '{name}'")
            }
            ArgumentError::Conflict(msg) => write!(f, "Conflicting options: {msg}"),
        }
    }
}

impl std::error::Error for CatalogError {}
impl std::error::Error for ConnectionError {}
impl std::error::Error for OperationError {}
impl std::error::Error for ArgumentError {}

/* ========================= Conversions to CatalogError ========================= */

impl From<io::Error> for CatalogError {
    fn from(err: io::Error) -> Self {
        CatalogError::Io(err)
    }
}

impl From<mongodb::error::Error> for CatalogError {
    fn from(err: mongodb::error::Error) -> Self {
        CatalogError::MongoDb(err)
    }
}

impl From<ConnectionError> for CatalogError {
    fn from(err: ConnectionError) -> Self {
        CatalogError::Connection(err)
    }
}

impl From<OperationError> for CatalogError {
    fn from(err: OperationError) -> Self {
        CatalogError::Operation(err)
    }
}

impl From<ArgumentError> for CatalogError {
    fn from(err: ArgumentError) -> Self {
        CatalogError::Argument(err)
    }
}

impl From<String> for CatalogError {
    fn from(msg: String) -> Self {
        CatalogError::Generic(msg)
    }
}

impl From<&str> for CatalogError {
    fn from(msg: &str) -> Self {
        CatalogError::Generic(msg.to_owned())
    }
}
