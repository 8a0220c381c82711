//! Error types for storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Memory-mapping a region of a file failed.
    #[error("failed to map {len} bytes at offset {offset} of '{}': {source}", path.display())]
    Map {
        /// The file being mapped.
        path: PathBuf,
        /// Start of the requested window.
        offset: u64,
        /// Length of the requested window.
        len: u64,
        /// The underlying OS error.
        source: io::Error,
    },

    /// A mapping was requested that exceeds the addressable window size.
    #[error("mapping of {len} bytes exceeds the maximum window of {max} bytes")]
    MappingTooLarge {
        /// The requested length.
        len: u64,
        /// The maximum mappable length.
        max: u64,
    },

    /// A seek landed outside the window an input can serve.
    #[error("seek to {position} outside of window [{start}, {end}) in '{}'", path.display())]
    SeekOutOfRange {
        /// The file the input reads from.
        path: PathBuf,
        /// The requested absolute position.
        position: u64,
        /// First position served by the input.
        start: u64,
        /// One past the last position served by the input.
        end: u64,
    },

    /// The channel has been closed.
    #[error("channel is closed")]
    Closed,
}
