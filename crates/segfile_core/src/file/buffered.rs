//! Segmented file served by pooled buffered readers.

use super::SegmentedFile;
use crate::error::CoreResult;
use parking_lot::Mutex;
use segfile_storage::{
    ChannelProxy, FileDataInput, RandomAccessReader, SharedCloseable, StorageResult, Tidy,
};
use std::fmt;
use std::io::{self, Read};
use std::path::Path;
use std::sync::{Arc, Weak};

/// Idle readers kept for reuse per file.
const MAX_POOLED_READERS: usize = 16;

struct ReaderPool {
    readers: Mutex<Vec<RandomAccessReader>>,
}

impl ReaderPool {
    fn take(&self) -> Option<RandomAccessReader> {
        self.readers.lock().pop()
    }

    fn put(&self, reader: RandomAccessReader) {
        let mut readers = self.readers.lock();
        if readers.len() < MAX_POOLED_READERS {
            readers.push(reader);
        }
    }
}

struct BufferedShared {
    channel: ChannelProxy,
    path: Arc<Path>,
    length: u64,
    on_disk_length: u64,
    read_buffer_size: usize,
    pool: Arc<ReaderPool>,
}

impl BufferedShared {
    fn open_reader(&self) -> RandomAccessReader {
        RandomAccessReader::open_with_length(&self.channel, self.length, self.read_buffer_size)
    }
}

impl Tidy for BufferedShared {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn tidy(self) {
        let BufferedShared {
            mut channel,
            path,
            pool,
            ..
        } = self;

        // Pooled readers hold channel shares; drop them first.
        let pooled = std::mem::take(&mut *pool.readers.lock());
        let released = pooled.len();
        drop(pooled);
        drop(pool);

        let closed = channel.close();
        tracing::debug!(path = %path.display(), released, closed, "closed buffered file");
    }
}

/// A data file read through buffered positional reads, without mappings.
///
/// Readers handed out by [`SegmentedFile::get_segment`] return to a small
/// pool when dropped, keeping their buffers warm for the next caller.
pub struct BufferedSegmentedFile {
    handle: SharedCloseable<BufferedShared>,
}

impl BufferedSegmentedFile {
    /// Takes ownership of `channel` for a file of `length` bytes.
    #[must_use]
    pub fn new(channel: ChannelProxy, length: u64, read_buffer_size: usize) -> Self {
        let path = channel.shared_path();
        Self {
            handle: SharedCloseable::new(BufferedShared {
                channel,
                path,
                length,
                on_disk_length: length,
                read_buffer_size,
                pool: Arc::new(ReaderPool {
                    readers: Mutex::new(Vec::new()),
                }),
            }),
        }
    }

    /// Returns the number of idle pooled readers.
    #[must_use]
    pub fn pooled_readers(&self) -> usize {
        self.handle
            .try_get()
            .map_or(0, |shared| shared.pool.readers.lock().len())
    }
}

impl SegmentedFile for BufferedSegmentedFile {
    fn path(&self) -> &Path {
        &self.handle.get().path
    }

    fn length(&self) -> u64 {
        self.handle.get().length
    }

    fn on_disk_length(&self) -> u64 {
        self.handle.get().on_disk_length
    }

    fn get_segment(&self, position: u64) -> CoreResult<Box<dyn FileDataInput>> {
        let shared = self.handle.get();
        assert!(
            position < shared.length,
            "position {position} out of range for length {}",
            shared.length
        );

        let mut reader = shared.pool.take().unwrap_or_else(|| shared.open_reader());
        reader.seek(position)?;
        Ok(Box::new(PooledReader {
            reader: Some(reader),
            pool: Arc::downgrade(&shared.pool),
        }))
    }

    fn create_reader(&self) -> CoreResult<RandomAccessReader> {
        Ok(self.handle.get().open_reader())
    }

    fn shared_copy(&self) -> Box<dyn SegmentedFile> {
        Box::new(Self {
            handle: self.handle.shared_copy(),
        })
    }

    fn close(&mut self) -> bool {
        self.handle.close()
    }

    fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    fn ref_count(&self) -> usize {
        self.handle.ref_count()
    }

    fn drop_page_cache(&self, before: u64) {
        if let Some(shared) = self.handle.try_get() {
            shared.channel.drop_page_cache(before);
        }
    }
}

impl fmt::Display for BufferedSegmentedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.handle.try_get() {
            Some(shared) => write!(
                f,
                "BufferedSegmentedFile(path='{}', length={})",
                shared.path.display(),
                shared.length
            ),
            None => f.write_str("BufferedSegmentedFile(closed)"),
        }
    }
}

impl fmt::Debug for BufferedSegmentedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferedSegmentedFile")
            .field("path", &self.handle.try_get().map(|s| Arc::clone(&s.path)))
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

/// A reader that goes back to its file's pool on drop.
struct PooledReader {
    reader: Option<RandomAccessReader>,
    pool: Weak<ReaderPool>,
}

impl PooledReader {
    fn reader(&self) -> &RandomAccessReader {
        match &self.reader {
            Some(reader) => reader,
            None => unreachable!("pooled reader is present until drop"),
        }
    }

    fn reader_mut(&mut self) -> &mut RandomAccessReader {
        match &mut self.reader {
            Some(reader) => reader,
            None => unreachable!("pooled reader is present until drop"),
        }
    }
}

impl Read for PooledReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader_mut().read(buf)
    }
}

impl FileDataInput for PooledReader {
    fn path(&self) -> &Path {
        self.reader().path()
    }

    fn position(&self) -> u64 {
        self.reader().position()
    }

    fn seek(&mut self, position: u64) -> StorageResult<()> {
        self.reader_mut().seek(position)
    }

    fn bytes_remaining(&self) -> u64 {
        self.reader().bytes_remaining()
    }
}

impl Drop for PooledReader {
    fn drop(&mut self) {
        if let (Some(reader), Some(pool)) = (self.reader.take(), self.pool.upgrade()) {
            pool.put(reader);
        }
    }
}
