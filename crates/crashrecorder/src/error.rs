//! Error types for crashrecorder.
//!
//! This module defines all error types used throughout the crashrecorder crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

use crate::sample::Signal;

/// The main error type for crashrecorder operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Signal Errors ===
    /// A signal update arrived with a value that doesn't fit its slot.
    #[error("malformed update for signal '{signal}': {message}")]
    SignalMalformed {
        /// The signal the update was addressed to.
        signal: Signal,
        /// Description of what went wrong.
        message: String,
    },

    // === Trigger Errors ===
    /// A trigger payload could not be interpreted.
    #[error("malformed trigger payload: {message}")]
    TriggerParse {
        /// Description of what went wrong.
        message: String,
    },

    // === Storage Errors ===
    /// Writing the snapshot file failed.
    #[error("failed to write snapshot to {path}: {source}")]
    StorageWrite {
        /// Path of the snapshot file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Encoding a CSV record failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// The sampling task died. The recorder cannot continue.
    #[error("fatal: {0}")]
    Fatal(String),
}

/// A specialized Result type for crashrecorder operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a malformed signal error.
    #[must_use]
    pub fn signal_malformed(signal: Signal, message: impl Into<String>) -> Self {
        Self::SignalMalformed {
            signal,
            message: message.into(),
        }
    }

    /// Create a trigger parse error.
    #[must_use]
    pub fn trigger_parse(message: impl Into<String>) -> Self {
        Self::TriggerParse {
            message: message.into(),
        }
    }

    /// Create a new fatal error.
    #[must_use]
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    /// Check if this error must terminate the process.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::fatal("sampler panicked");
        assert_eq!(err.to_string(), "fatal: sampler panicked");
    }

    #[test]
    fn test_error_is_fatal() {
        assert!(Error::fatal("x").is_fatal());
        assert!(!Error::signal_malformed(Signal::Speed, "x").is_fatal());
        assert!(!Error::trigger_parse("x").is_fatal());
    }

    #[test]
    fn test_signal_malformed_display() {
        let err = Error::signal_malformed(Signal::Speed, "expected a number");
        let msg = err.to_string();
        assert!(msg.contains("speed"));
        assert!(msg.contains("expected a number"));
    }

    #[test]
    fn test_trigger_parse_display() {
        let err = Error::trigger_parse("missing 'status'");
        assert_eq!(
            err.to_string(),
            "malformed trigger payload: missing 'status'"
        );
    }

    #[test]
    fn test_storage_write_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::StorageWrite {
            path: PathBuf::from("/readonly/vehicle_data.csv"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("/readonly/vehicle_data.csv"));
        assert!(msg.contains("access denied"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_directory_create_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::ConfigValidation {
            message: "capacity must be greater than 0".to_string(),
        };
        assert!(err.to_string().contains("capacity"));
    }
}
