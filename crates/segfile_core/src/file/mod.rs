//! Segmented files: position-addressed readers over immutable data files.
//!
//! A segmented file resolves an absolute position into a [`FileDataInput`]
//! positioned there. Every variant shares one file channel between all of its
//! owners; [`SegmentedFile::shared_copy`] adds an owner and
//! [`SegmentedFile::close`] removes one. The last owner to close tears the
//! shared state down, exactly once.
//!
//! ## Variants
//!
//! - [`MmappedSegmentedFile`] - Zero-copy reads from mapped segments
//! - [`BufferedSegmentedFile`] - Pooled buffered readers on the channel

mod buffered;
mod mmapped;

pub use buffered::BufferedSegmentedFile;
pub use mmapped::MmappedSegmentedFile;

use crate::error::CoreResult;
use segfile_storage::{FileDataInput, RandomAccessReader};
use std::fmt;
use std::path::Path;

/// Capability shared by every segmented file variant.
pub trait SegmentedFile: Send + Sync + fmt::Display {
    /// Returns the path of the data file.
    fn path(&self) -> &Path;

    /// Returns the logical length in bytes.
    fn length(&self) -> u64;

    /// Returns the number of bytes the file occupies on disk.
    fn on_disk_length(&self) -> u64;

    /// Returns an input positioned at `position`.
    ///
    /// # Errors
    ///
    /// Returns an error if a fallback reader cannot be opened.
    ///
    /// # Panics
    ///
    /// Panics if `position >= length()` or the handle is closed.
    fn get_segment(&self, position: u64) -> CoreResult<Box<dyn FileDataInput>>;

    /// Opens a buffered reader over the whole file, positioned at 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader cannot be opened.
    fn create_reader(&self) -> CoreResult<RandomAccessReader>;

    /// Creates another owner of the same channel and segments.
    ///
    /// # Panics
    ///
    /// Panics if this handle is closed.
    fn shared_copy(&self) -> Box<dyn SegmentedFile>;

    /// Releases this owner. Returns `true` if the shared state was torn down.
    fn close(&mut self) -> bool;

    /// Returns whether this handle has been closed.
    fn is_closed(&self) -> bool;

    /// Returns the number of live owners, or 0 once this handle is closed.
    fn ref_count(&self) -> usize;

    /// Hints the OS to drop cached pages before `before`. Best effort.
    fn drop_page_cache(&self, before: u64);
}

impl dyn SegmentedFile + '_ {
    /// Iterates over segment inputs starting at `position`.
    pub fn iter_from(&self, position: u64) -> SegmentIterator<'_> {
        SegmentIterator::new(self, position)
    }
}

/// Lazily yields inputs covering `[position, length)` segment by segment.
///
/// Each input should be dropped before the next one is requested.
pub struct SegmentIterator<'a> {
    file: &'a dyn SegmentedFile,
    next_position: u64,
}

impl<'a> SegmentIterator<'a> {
    /// Creates an iterator starting at `position`.
    #[must_use]
    pub fn new(file: &'a dyn SegmentedFile, position: u64) -> Self {
        Self {
            file,
            next_position: position,
        }
    }
}

impl Iterator for SegmentIterator<'_> {
    type Item = CoreResult<Box<dyn FileDataInput>>;

    fn next(&mut self) -> Option<Self::Item> {
        let length = self.file.length();
        if self.next_position >= length {
            return None;
        }

        match self.file.get_segment(self.next_position) {
            Ok(input) => {
                let remaining = input.bytes_remaining();
                self.next_position = if remaining == 0 {
                    length
                } else {
                    self.next_position + remaining
                };
                Some(Ok(input))
            }
            Err(e) => {
                self.next_position = length;
                Some(Err(e))
            }
        }
    }
}

impl fmt::Debug for SegmentIterator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentIterator")
            .field("path", &self.file.path())
            .field("next_position", &self.next_position)
            .finish()
    }
}
