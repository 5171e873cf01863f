//! Error types for keychain automation.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, KeychainError>;

#[derive(Debug, Error)]
pub enum KeychainError {
    /// A required password was missing or empty. Raised before any
    /// subprocess is started.
    #[error("{0}: password required")]
    PasswordRequired(&'static str),

    #[error("Command execution failed: {0}")]
    CommandExecution(String),

    #[error("security {subcommand} exited with status {code}: {stderr}")]
    CommandFailed {
        subcommand: String,
        code: i32,
        stderr: String,
    },

    #[error("Keychain not found: {}", .0.display())]
    KeychainNotFound(PathBuf),

    #[error("Path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parsing error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}
