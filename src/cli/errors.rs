//! CLI errors
//!
//! Every failure ends the process with a non-zero exit code; the code string
//! is printed alongside the message.

use std::io;

use thiserror::Error;

use crate::common::GatewayError;

/// Failure classes reported by the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    ConfigError,
    /// stdin/stdout or listener sockets
    IoError,
    /// A gateway operation run by `query` failed
    RequestFailed,
}

impl CliErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConfigError => "DG_CLI_CONFIG_ERROR",
            Self::IoError => "DG_CLI_IO_ERROR",
            Self::RequestFailed => "DG_CLI_REQUEST_FAILED",
        }
    }
}

#[derive(Debug, Error)]
#[error("{}: {message}", .code.as_str())]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    fn with_code(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::with_code(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::with_code(CliErrorCode::IoError, msg)
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::with_code(CliErrorCode::RequestFailed, msg)
    }

    pub fn code(&self) -> CliErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<io::Error> for CliError {
    fn from(err: io::Error) -> Self {
        Self::io_error(err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::io_error(format!("Malformed JSON: {}", err))
    }
}

impl From<GatewayError> for CliError {
    fn from(err: GatewayError) -> Self {
        Self::request_failed(format!("{} ({})", err, err.status_code()))
    }
}
