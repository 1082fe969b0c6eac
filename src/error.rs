//! Error types and handling infrastructure for lemonline.
//!
//! This module provides a centralized error handling system using `thiserror` for
//! custom error types. The binary wraps these with `anyhow` context at the edge.
//!
//! ## Error classes
//!
//! - **Provider errors**: a data source is missing or a single query failed. These
//!   only ever blank one field of the status line.
//! - **Core errors**: the readiness machinery, the relay thread, or the output
//!   stream broke. These terminate the process.

use thiserror::Error;

/// The main error type for lemonline operations.
#[derive(Error, Debug)]
pub enum StatusError {
    /// A device, file, or socket needed by a provider is not present
    #[error("{resource} unavailable: {reason}")]
    Unavailable { resource: String, reason: String },

    /// I/O failure with a short description of what was being done
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A peer (MPD, mixer tool, display server) answered in an unexpected shape
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Data read from disk or a device did not have the expected format
    #[error("Format error: {message}")]
    Format { message: String },

    /// Weather cache JSON could not be decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Display server request failed
    #[error("Display error: {message}")]
    Display { message: String },

    /// The readiness registry itself failed (fatal)
    #[error("Readiness failure: {message}")]
    Readiness { message: String },

    /// The file watch backend reported an error (fatal)
    #[error("File watch failure: {0}")]
    Watch(#[from] notify::Error),

    /// The display relay thread could not be started (fatal)
    #[error("Relay failure: {message}")]
    Relay { message: String },

    /// The status line could not be written to stdout (fatal)
    #[error("Output failure: {source}")]
    Output {
        #[source]
        source: std::io::Error,
    },
}

/// Standard Result type for lemonline operations.
pub type Result<T> = std::result::Result<T, StatusError>;

impl StatusError {
    /// Create an Unavailable error for a named resource
    pub fn unavailable(resource: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unavailable {
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an Io error with additional context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a Protocol error with a descriptive message
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a Format error with a descriptive message
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// Create a Display error with a descriptive message
    pub fn display(message: impl Into<String>) -> Self {
        Self::Display {
            message: message.into(),
        }
    }

    /// Create a Readiness error with a descriptive message
    pub fn readiness(message: impl Into<String>) -> Self {
        Self::Readiness {
            message: message.into(),
        }
    }

    /// Create a Relay error with a descriptive message
    pub fn relay(message: impl Into<String>) -> Self {
        Self::Relay {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for StatusError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::Io {
                context: "Not found".to_string(),
                source: err,
            },
            std::io::ErrorKind::PermissionDenied => Self::Io {
                context: "Permission denied".to_string(),
                source: err,
            },
            _ => Self::Io {
                context: "IO operation failed".to_string(),
                source: err,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let missing = StatusError::unavailable("/dev/apm", "no such device");
        assert_eq!(missing.to_string(), "/dev/apm unavailable: no such device");

        let protocol = StatusError::protocol("not an MPD server");
        assert_eq!(protocol.to_string(), "Protocol error: not an MPD server");

        let format = StatusError::format("'weather' is not an array");
        assert_eq!(format.to_string(), "Format error: 'weather' is not an array");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let status_err: StatusError = io_err.into();

        match status_err {
            StatusError::Io { context, .. } => assert_eq!(context, "Not found"),
            _ => panic!("Expected Io variant"),
        }
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let status_err: StatusError = json_err.into();
        assert!(matches!(status_err, StatusError::Json(_)));
    }
}
