use core::result::Result as CoreResult;
use std::io::Error as IoError;
use std::path::PathBuf;

use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use toml::de::Error as TomlError;

use crate::batch::BatchId;

/// Result type for batch-coordination operations.
pub type Result<T> = CoreResult<T, Error>;

/// Errors that can occur while coordinating a batch run.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] SerdeJsonError),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] TomlError),

    /// The file is currently locked by another actor.
    #[error("file {} is locked by {holder}", path.display())]
    LockUnavailable {
        /// Path of the contested file.
        path: PathBuf,
        /// Actor holding the lock.
        holder: String,
    },

    /// A lock acquisition attempt failed against the vault.
    #[error("failed to acquire lock on {}: {reason}", path.display())]
    LockAcquireFailed {
        /// Path of the file that could not be locked.
        path: PathBuf,
        /// Vault-reported reason.
        reason: String,
    },

    /// A job executor reported a failure. Recorded on the job, never
    /// propagated past the processing loop.
    #[error("job execution failed: {0}")]
    Execution(String),

    /// The editing host could not be restarted at a checkpoint.
    #[error("host restart failed: {0}")]
    RestartFailure(String),

    /// A batch could not be persisted or loaded.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// No batch exists with the given id.
    #[error("batch not found: {0}")]
    BatchNotFound(BatchId),

    /// Classification left no file eligible for processing.
    #[error("no files available to process: {0}")]
    NoFilesAvailable(String),

    /// Another batch already holds the editing host.
    #[error("another batch is already processing")]
    HostBusy,

    /// Configuration is invalid or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A general error not covered by other variants.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Determines whether this error aborts an in-flight batch run.
    ///
    /// File-level and job-level errors are contained and surfaced in the run
    /// summary instead; only a failed host restart or an invalid
    /// configuration halts processing.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RestartFailure(_) | Self::InvalidConfig(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value as JsonValue, from_str};
    use std::io;

    #[test]
    fn test_error_display() {
        let error1 = Error::LockUnavailable {
            path: PathBuf::from("assembly.sldasm"),
            holder: "jdoe".to_owned(),
        };
        assert_eq!(
            error1.to_string(),
            "file assembly.sldasm is locked by jdoe"
        );

        let error2 = Error::RestartFailure("host did not come back".to_owned());
        assert_eq!(
            error2.to_string(),
            "host restart failed: host did not come back"
        );

        let error3 = Error::NoFilesAvailable("all 3 files locked".to_owned());
        assert_eq!(
            error3.to_string(),
            "no files available to process: all 3 files locked"
        );
    }

    #[test]
    fn test_error_is_fatal() {
        assert!(Error::RestartFailure("gone".to_owned()).is_fatal());
        assert!(Error::InvalidConfig("bad thresholds".to_owned()).is_fatal());

        assert!(!Error::Execution("edit failed".to_owned()).is_fatal());
        assert!(!Error::Persistence("disk full".to_owned()).is_fatal());
        assert!(
            !Error::LockAcquireFailed {
                path: PathBuf::from("part.sldprt"),
                reason: "timeout".to_owned(),
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: Error = io_error.into();
        assert!(matches!(error, Error::Io(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_error = from_str::<JsonValue>("invalid json").unwrap_err();
        let error: Error = json_error.into();
        assert!(matches!(error, Error::Json(_)));
    }
}
