//! Memory-mapped file windows and zero-copy inputs over them.

use crate::error::{StorageError, StorageResult};
use crate::input::FileDataInput;
use memmap2::Mmap;
use std::fmt;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

/// Largest window a single mapping may cover: 2^31 - 1 bytes.
pub const MAX_MAPPED_SIZE: u64 = i32::MAX as u64;

/// A read-only mapped window `[offset, offset + len)` of a file.
///
/// Clones share the mapping. The pages are unmapped when the last clone is
/// released, either explicitly through [`MappedRegion::unmap`] or by drop.
#[derive(Clone)]
pub struct MappedRegion {
    map: Arc<Mmap>,
    offset: u64,
}

impl MappedRegion {
    pub(crate) fn new(map: Mmap, offset: u64) -> Self {
        Self {
            map: Arc::new(map),
            offset,
        }
    }

    /// Returns the absolute file offset of the first mapped byte.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns the number of mapped bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.map.len() as u64
    }

    /// Returns whether the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the mapped bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.map
    }

    /// Returns how many handles (regions and inputs) share this mapping.
    #[must_use]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.map)
    }

    /// Gives up this handle and unmaps the pages if it was the last one.
    ///
    /// Returns `true` if the pages were unmapped now, `false` if another handle
    /// still uses them; in that case the unmap happens when that handle drops.
    pub fn unmap(self) -> bool {
        Arc::into_inner(self.map).is_some()
    }

    /// Opens an input over this window, positioned at absolute `position`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::SeekOutOfRange`] if `position` lies outside the window.
    pub fn input(&self, path: Arc<Path>, position: u64) -> StorageResult<MappedInput> {
        let mut input = MappedInput {
            region: self.clone(),
            path,
            pos: 0,
        };
        input.seek(position)?;
        Ok(input)
    }
}

impl fmt::Debug for MappedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedRegion")
            .field("offset", &self.offset)
            .field("len", &self.len())
            .finish()
    }
}

/// A positioned input reading straight out of a [`MappedRegion`].
///
/// Holds a share of the mapping, so the bytes stay readable even if every
/// owner of the file closes while this input is alive.
#[derive(Debug)]
pub struct MappedInput {
    region: MappedRegion,
    path: Arc<Path>,
    pos: usize,
}

impl MappedInput {
    /// Returns the unread part of the window without copying.
    #[must_use]
    pub fn remaining_slice(&self) -> &[u8] {
        &self.region.as_slice()[self.pos..]
    }

    /// Returns the region this input reads from.
    #[must_use]
    pub fn region(&self) -> &MappedRegion {
        &self.region
    }
}

impl Read for MappedInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.remaining_slice();
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl FileDataInput for MappedInput {
    fn path(&self) -> &Path {
        &self.path
    }

    fn position(&self) -> u64 {
        self.region.offset + self.pos as u64
    }

    fn seek(&mut self, position: u64) -> StorageResult<()> {
        let start = self.region.offset;
        let end = start + self.region.len();
        if position < start || position > end {
            return Err(StorageError::SeekOutOfRange {
                path: self.path.to_path_buf(),
                position,
                start,
                end,
            });
        }
        // In range, and the window is at most MAX_MAPPED_SIZE long.
        self.pos = (position - start) as usize;
        Ok(())
    }

    fn bytes_remaining(&self) -> u64 {
        (self.region.as_slice().len() - self.pos) as u64
    }
}
