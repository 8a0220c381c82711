//! Error types for SegFile core.

use crate::config::AccessMode;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in SegFile core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] segfile_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Persisted bounds were written under a different access mode.
    #[error(
        "cannot deserialize bounds written for '{persisted}' access mode; \
         DiskAccessMode was changed to '{configured}'"
    )]
    AccessModeMismatch {
        /// Tag found in the bounds metadata.
        persisted: String,
        /// Mode the builder was created for.
        configured: AccessMode,
    },

    /// Configuration value is out of range or cannot be parsed.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// A data file failed to decode.
    #[error("corrupt data file '{}': {source}", path.display())]
    CorruptFile {
        /// Path of the damaged file.
        path: PathBuf,
        /// Underlying read or decode failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Bounds metadata or row layout is malformed.
    #[error("invalid format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a corrupt file error wrapping `source`.
    pub fn corrupt_file(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::CorruptFile {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns whether this error means the file contents cannot be trusted.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::CorruptFile { .. } | Self::InvalidFormat { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_message_names_both_modes() {
        let err = CoreError::AccessModeMismatch {
            persisted: "standard".into(),
            configured: AccessMode::Mmap,
        };
        let msg = err.to_string();
        assert!(msg.contains("'standard'"));
        assert!(msg.contains("'mmap'"));
        assert!(msg.contains("DiskAccessMode was changed"));
    }

    #[test]
    fn corrupt_file_keeps_source() {
        let io = io::Error::new(io::ErrorKind::UnexpectedEof, "short read");
        let err = CoreError::corrupt_file("/tmp/data.db", io);
        assert!(err.is_corruption());
        assert!(err.to_string().contains("/tmp/data.db"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn storage_errors_convert() {
        let err: CoreError = segfile_storage::StorageError::Closed.into();
        assert!(matches!(err, CoreError::Storage(_)));
        assert!(!err.is_corruption());
    }
}
