//! Shell completion scripts
//!
//! Scripts are generated from the clap definition, so every flag and
//! subcommand completes without extra maintenance.

use clap::CommandFactory;
use clap_complete::{Shell, generate};

use crate::cli::CliArgs;
use crate::error::{ArgumentError, Result};

const BIN_NAME: &str = "mongo-catalog";

/// Generate the completion script for `shell_name`
///
/// # Arguments
/// * `shell_name` - Shell type (bash, zsh, fish)
///
/// # Returns
/// * `Result<String>` - Completion script or error for unsupported shells
pub fn generate_completion(shell_name: &str) -> Result<String> {
    let shell = parse_shell(shell_name)?;

    let mut cmd = CliArgs::command();
    let mut buffer = Vec::new();
    generate(shell, &mut cmd, BIN_NAME, &mut buffer);

    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Parse shell name string to Shell enum
fn parse_shell(shell_name: &str) -> Result<Shell> {
    match shell_name.to_lowercase().as_str() {
        "bash" => Ok(Shell::Bash),
        "zsh" => Ok(Shell::Zsh),
        "fish" => Ok(Shell::Fish),
        _ => Err(ArgumentError::InvalidValue {
            field: "shell".to_string(),
            value: format!("{shell_name} (supported: bash, zsh, fish)"),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shell() {
        assert!(matches!(parse_shell("bash"), Ok(Shell::Bash)));
        assert!(matches!(parse_shell("ZSH"), Ok(Shell::Zsh)));
        assert!(matches!(parse_shell("fish"), Ok(Shell::Fish)));
        assert!(parse_shell("powershell").is_err());
    }

    #[test]
    fn test_bash_script_mentions_flags() {
        let script = generate_completion("bash").unwrap();
        assert!(script.contains(BIN_NAME));
        assert!(script.contains("--fail-fast"));
        assert!(script.contains("--catalog"));
    }
}
