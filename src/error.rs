//! Error types and Result aliases for the shell parser

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::ConfigError;

/// Result type alias for shell parser operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the shell parser
#[derive(Debug)]
pub enum Error {
    // === Transport errors ===
    /// Transport is not open
    TransportClosed,

    /// Failed to hand bytes to the transport
    TransportWriteFailed {
        reason: String,
    },

    /// The session driver task is no longer running
    SessionClosed,

    // === Command errors ===
    /// Empty command
    EmptyCommand,

    /// Command timeout
    CommandTimeout {
        command: String,
        duration: Duration,
    },

    // === Configuration errors ===
    /// Failed to load configuration file
    ConfigLoadFailed {
        path: PathBuf,
        reason: String,
    },

    /// Failed to save configuration file
    ConfigSaveFailed {
        path: PathBuf,
        reason: String,
    },

    /// Configuration file not found
    ConfigNotFound,

    /// Configuration validation failed
    ConfigValidationFailed {
        field: String,
        reason: String,
    },

    /// Failed to serialize configuration
    ConfigSerializationFailed {
        format: String,
        reason: String,
    },

    /// Failed to parse configuration
    ConfigParseFailed {
        format: String,
        reason: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Transport errors
            Error::TransportClosed => {
                write!(f, "Transport is not open")
            }
            Error::TransportWriteFailed { reason } => {
                write!(f, "Failed to write to transport: {}", reason)
            }
            Error::SessionClosed => {
                write!(f, "Shell session is no longer running")
            }

            // Command errors
            Error::EmptyCommand => {
                write!(f, "Command cannot be empty")
            }
            Error::CommandTimeout { command, duration } => {
                write!(
                    f,
                    "Command '{}' timed out after {} ms",
                    command,
                    duration.as_millis()
                )
            }

            // Configuration errors
            Error::ConfigLoadFailed { path, reason } => {
                write!(f, "Failed to load config from '{}': {}", path.display(), reason)
            }
            Error::ConfigSaveFailed { path, reason } => {
                write!(f, "Failed to save config to '{}': {}", path.display(), reason)
            }
            Error::ConfigNotFound => {
                write!(f, "Configuration file not found")
            }
            Error::ConfigValidationFailed { field, reason } => {
                write!(f, "Configuration validation failed for '{}': {}", field, reason)
            }
            Error::ConfigSerializationFailed { format, reason } => {
                write!(f, "Failed to serialize config as {}: {}", format, reason)
            }
            Error::ConfigParseFailed { format, reason } => {
                write!(f, "Failed to parse {} config: {}", format, reason)
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::ConfigValidationFailed {
            field: err.field().to_string(),
            reason: err.to_string(),
        }
    }
}
