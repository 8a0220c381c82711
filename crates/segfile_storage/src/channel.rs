//! Shared read-only file channel.

use crate::error::{StorageError, StorageResult};
use crate::mapped::{MappedRegion, MAX_MAPPED_SIZE};
use crate::shared::{SharedCloseable, Tidy};
use memmap2::MmapOptions;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

struct ChannelFile {
    path: Arc<Path>,
    file: File,
}

impl Tidy for ChannelFile {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn tidy(self) {
        drop(self.file);
        tracing::debug!(path = %self.path.display(), "closed channel");
    }
}

/// A read-only file descriptor shared between every reader of one file.
///
/// Reads are positional (`pread`), so a channel carries no cursor and may be
/// used from many threads at once. Each [`ChannelProxy::shared_copy`] is an
/// independent owner; the descriptor is closed when the last owner closes.
///
/// # Example
///
/// ```no_run
/// use segfile_storage::ChannelProxy;
/// use std::path::Path;
///
/// let channel = ChannelProxy::open(Path::new("data.db")).unwrap();
/// let mut header = [0u8; 16];
/// channel.read_at(&mut header, 0).unwrap();
/// ```
#[derive(Debug)]
pub struct ChannelProxy {
    handle: SharedCloseable<ChannelFile>,
}

impl ChannelProxy {
    /// Opens a channel on an existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened for reading.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = File::open(path)?;
        tracing::debug!(path = %path.display(), "opened channel");
        Ok(Self {
            handle: SharedCloseable::new(ChannelFile {
                path: Arc::from(path),
                file,
            }),
        })
    }

    /// Returns the path of the underlying file.
    ///
    /// # Panics
    ///
    /// Panics if this handle has been closed.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.handle.get().path
    }

    /// Returns a cheap shared reference to the path, for inputs that outlive a borrow.
    #[must_use]
    pub fn shared_path(&self) -> Arc<Path> {
        Arc::clone(&self.handle.get().path)
    }

    /// Returns the owned path of the underlying file.
    #[must_use]
    pub fn path_buf(&self) -> PathBuf {
        self.path().to_path_buf()
    }

    /// Returns the current size of the file in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file metadata cannot be read.
    pub fn size(&self) -> StorageResult<u64> {
        Ok(self.file()?.metadata()?.len())
    }

    /// Reads up to `buf.len()` bytes at `position` without moving any cursor.
    ///
    /// Returns the number of bytes read; 0 means end of file.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is closed or the read fails.
    pub fn read_at(&self, buf: &mut [u8], position: u64) -> io::Result<usize> {
        let file = self
            .file()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        positional_read(file, buf, position)
    }

    /// Memory-maps `len` bytes of the file starting at `offset`, read-only.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::MappingTooLarge`] if `len` exceeds
    /// [`MAX_MAPPED_SIZE`], or [`StorageError::Map`] if the OS refuses the mapping.
    #[allow(unsafe_code)]
    pub fn map(&self, offset: u64, len: u64) -> StorageResult<MappedRegion> {
        let too_large = || StorageError::MappingTooLarge {
            len,
            max: MAX_MAPPED_SIZE,
        };
        if len > MAX_MAPPED_SIZE {
            return Err(too_large());
        }
        let map_len = usize::try_from(len).map_err(|_| too_large())?;
        let file = self.file()?;

        // SAFETY: memory-mapped files may be modified externally, which would be
        // undefined behavior. This is sound because:
        // 1. Data files are immutable once written; nothing reopens them for writing
        // 2. The mapping is read-only, so this process never writes through it
        // 3. The mapping owns its own reference to the pages and stays valid after
        //    the descriptor is closed
        let map = unsafe { MmapOptions::new().offset(offset).len(map_len).map(file) }.map_err(
            |source| StorageError::Map {
                path: self.path_buf(),
                offset,
                len,
                source,
            },
        )?;

        Ok(MappedRegion::new(map, offset))
    }

    /// Hints the OS to evict cached pages of `[0, before)`.
    ///
    /// Best effort: failures, closed channels and unsupported platforms are ignored.
    #[allow(unsafe_code)]
    pub fn drop_page_cache(&self, before: u64) {
        let Ok(file) = self.file() else {
            return;
        };

        #[cfg(target_os = "linux")]
        {
            use std::os::unix::io::AsRawFd;

            let Ok(len) = libc::off_t::try_from(before) else {
                return;
            };
            // SAFETY: posix_fadvise only inspects the descriptor, which stays open
            // for as long as `file` is borrowed. It never touches process memory.
            let rc = unsafe { libc::posix_fadvise(file.as_raw_fd(), 0, len, libc::POSIX_FADV_DONTNEED) };
            if rc != 0 {
                tracing::trace!(path = %self.path().display(), rc, "posix_fadvise failed");
            }
        }

        #[cfg(not(target_os = "linux"))]
        {
            let _ = (file, before);
        }
    }

    /// Creates another owner of this channel.
    ///
    /// # Panics
    ///
    /// Panics if this handle has been closed.
    #[must_use]
    pub fn shared_copy(&self) -> Self {
        Self {
            handle: self.handle.shared_copy(),
        }
    }

    /// Releases this owner. Returns `true` if the descriptor was closed.
    pub fn close(&mut self) -> bool {
        self.handle.close()
    }

    /// Returns whether this handle has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    /// Returns the number of live owners of the descriptor.
    #[must_use]
    pub fn ref_count(&self) -> usize {
        self.handle.ref_count()
    }

    fn file(&self) -> StorageResult<&File> {
        self.handle
            .try_get()
            .map(|channel| &channel.file)
            .ok_or(StorageError::Closed)
    }
}

#[cfg(unix)]
fn positional_read(file: &File, buf: &mut [u8], position: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, position)
}

#[cfg(windows)]
fn positional_read(file: &File, buf: &mut [u8], position: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_file(dir: &Path, data: &[u8]) -> PathBuf {
        let path = dir.join("data.bin");
        let mut file = File::create(&path).unwrap();
        file.write_all(data).unwrap();
        file.sync_all().unwrap();
        path
    }

    #[test]
    fn open_and_size() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), b"hello world");

        let channel = ChannelProxy::open(&path).unwrap();
        assert_eq!(channel.size().unwrap(), 11);
        assert_eq!(channel.path(), path);
    }

    #[test]
    fn open_missing_file_fails() {
        let dir = tempdir().unwrap();
        let result = ChannelProxy::open(&dir.path().join("missing.bin"));
        assert!(matches!(result, Err(StorageError::Io(_))));
    }

    #[test]
    fn positional_reads() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), b"hello world");
        let channel = ChannelProxy::open(&path).unwrap();

        let mut buf = [0u8; 5];
        assert_eq!(channel.read_at(&mut buf, 6).unwrap(), 5);
        assert_eq!(&buf, b"world");

        assert_eq!(channel.read_at(&mut buf, 11).unwrap(), 0);
    }

    #[test]
    fn map_window() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), b"0123456789");
        let channel = ChannelProxy::open(&path).unwrap();

        let region = channel.map(3, 4).unwrap();
        assert_eq!(region.offset(), 3);
        assert_eq!(region.len(), 4);
        assert_eq!(region.as_slice(), b"3456");
    }

    #[test]
    fn map_rejects_oversized_window() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), b"x");
        let channel = ChannelProxy::open(&path).unwrap();

        let result = channel.map(0, MAX_MAPPED_SIZE + 1);
        assert!(matches!(result, Err(StorageError::MappingTooLarge { .. })));
    }

    #[test]
    fn mapping_outlives_channel() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), b"persistent");
        let mut channel = ChannelProxy::open(&path).unwrap();

        let region = channel.map(0, 10).unwrap();
        assert!(channel.close());
        assert_eq!(region.as_slice(), b"persistent");
    }

    #[test]
    fn shared_copies_close_once() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), b"abc");
        let mut channel = ChannelProxy::open(&path).unwrap();
        let mut copy = channel.shared_copy();
        assert_eq!(channel.ref_count(), 2);

        assert!(!channel.close());
        assert!(channel.is_closed());
        assert!(matches!(channel.size(), Err(StorageError::Closed)));

        // The copy still reads.
        let mut buf = [0u8; 3];
        copy.read_at(&mut buf, 0).unwrap();
        assert_eq!(&buf, b"abc");

        assert!(copy.close());
    }

    #[test]
    fn drop_page_cache_is_best_effort() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), &[7u8; 8192]);
        let mut channel = ChannelProxy::open(&path).unwrap();

        channel.drop_page_cache(4096);
        channel.drop_page_cache(u64::MAX);
        channel.close();
        channel.drop_page_cache(4096);
    }
}
