//! Positioned data input trait.

use crate::error::StorageResult;
use std::io::Read;
use std::path::Path;

/// A readable, seekable view of one file, positioned at an absolute offset.
///
/// Inputs are handed out by segmented files for a single caller and are not
/// shared between threads. Dropping an input releases whatever it holds
/// (a share of a mapping, or a private reader on the file channel).
///
/// # Invariants
///
/// - `position()` is an absolute offset into the file named by `path()`
/// - `position() + bytes_remaining()` is the end of what this input can serve
/// - After `seek(p)` succeeds, `position() == p`
pub trait FileDataInput: Read + Send {
    /// Returns the path of the file this input reads.
    fn path(&self) -> &Path;

    /// Returns the absolute file offset of the next byte to be read.
    fn position(&self) -> u64;

    /// Moves to absolute `position`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot serve `position`.
    fn seek(&mut self, position: u64) -> StorageResult<()>;

    /// Returns the number of bytes between the position and the end of the input.
    fn bytes_remaining(&self) -> u64;

    /// Returns whether every byte has been read.
    fn is_eof(&self) -> bool {
        self.bytes_remaining() == 0
    }

    /// Skips `n` bytes forward.
    ///
    /// # Errors
    ///
    /// Returns an error if the target position cannot be served.
    fn skip_bytes(&mut self, n: u64) -> StorageResult<()> {
        let target = self.position().saturating_add(n);
        self.seek(target)
    }
}

impl<T: FileDataInput + ?Sized> FileDataInput for Box<T> {
    fn path(&self) -> &Path {
        (**self).path()
    }

    fn position(&self) -> u64 {
        (**self).position()
    }

    fn seek(&mut self, position: u64) -> StorageResult<()> {
        (**self).seek(position)
    }

    fn bytes_remaining(&self) -> u64 {
        (**self).bytes_remaining()
    }

    fn is_eof(&self) -> bool {
        (**self).is_eof()
    }

    fn skip_bytes(&mut self, n: u64) -> StorageResult<()> {
        (**self).skip_bytes(n)
    }
}
