//! Buffered random-access reader over a shared channel.

use crate::channel::ChannelProxy;
use crate::error::{StorageError, StorageResult};
use crate::input::FileDataInput;
use std::io::{self, Read};
use std::path::Path;

/// Default size of a reader's read-ahead buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024; // 64 KB

/// A buffered reader with its own cursor over a shared [`ChannelProxy`].
///
/// Used wherever a mapped view is unavailable: windows too large to map, or
/// files opened in standard access mode. The reader holds its own share of the
/// channel, so it stays usable until dropped even if its creator closes.
///
/// # Buffering
///
/// Reads are served from a fixed-size buffer refilled with positional reads.
/// Seeking inside the buffered range keeps the buffer.
#[derive(Debug)]
pub struct RandomAccessReader {
    channel: ChannelProxy,
    length: u64,
    buffer: Vec<u8>,
    buffer_offset: u64,
    buffer_len: usize,
    position: u64,
}

impl RandomAccessReader {
    /// Opens a reader covering the whole file, positioned at 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the file size cannot be determined.
    pub fn open(channel: &ChannelProxy, buffer_size: usize) -> StorageResult<Self> {
        let length = channel.size()?;
        Ok(Self::open_with_length(channel, length, buffer_size))
    }

    /// Opens a reader covering `[0, length)`, positioned at 0.
    #[must_use]
    pub fn open_with_length(channel: &ChannelProxy, length: u64, buffer_size: usize) -> Self {
        Self {
            channel: channel.shared_copy(),
            length,
            buffer: vec![0u8; buffer_size.max(1)],
            buffer_offset: 0,
            buffer_len: 0,
            position: 0,
        }
    }

    /// Returns the length of the readable range.
    #[must_use]
    pub fn length(&self) -> u64 {
        self.length
    }

    fn buffered(&self) -> bool {
        self.position >= self.buffer_offset
            && self.position < self.buffer_offset + self.buffer_len as u64
    }

    fn refill(&mut self) -> io::Result<()> {
        let want = (self.length - self.position).min(self.buffer.len() as u64) as usize;
        let mut filled = 0;
        while filled < want {
            let n = self
                .channel
                .read_at(&mut self.buffer[filled..want], self.position + filled as u64)?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        self.buffer_offset = self.position;
        self.buffer_len = filled;
        Ok(())
    }
}

impl Read for RandomAccessReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() || self.position >= self.length {
            return Ok(0);
        }
        if !self.buffered() {
            self.refill()?;
            if self.buffer_len == 0 {
                // The file shrank underneath the declared length.
                return Ok(0);
            }
        }

        let start = (self.position - self.buffer_offset) as usize;
        let n = out.len().min(self.buffer_len - start);
        out[..n].copy_from_slice(&self.buffer[start..start + n]);
        self.position += n as u64;
        Ok(n)
    }
}

impl FileDataInput for RandomAccessReader {
    fn path(&self) -> &Path {
        self.channel.path()
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn seek(&mut self, position: u64) -> StorageResult<()> {
        if position > self.length {
            return Err(StorageError::SeekOutOfRange {
                path: self.channel.path_buf(),
                position,
                start: 0,
                end: self.length,
            });
        }
        self.position = position;
        Ok(())
    }

    fn bytes_remaining(&self) -> u64 {
        self.length - self.position
    }
}
