//! Error types for the lark_client crate.

use thiserror::Error;

/// Errors that can occur when talking to the Feishu/Lark open platform.
///
/// Vendor application errors (a non-zero `code` inside an otherwise successful
/// response) are not represented here: they are returned to the caller as data.
#[derive(Error, Debug)]
pub enum LarkError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid document URL or token: {0}")]
    InvalidUrlOrToken(String),
}

/// Result type alias for LarkError.
pub type Result<T> = std::result::Result<T, LarkError>;
