//! Read-side owner of one data file.

use crate::builder::SegmentBuilder;
use crate::comparator::CellNameComparator;
use crate::config::{AccessMode, Config};
use crate::error::{CoreError, CoreResult};
use crate::file::SegmentedFile;
use crate::row::RowHeader;
use crate::slice::{SliceInput, SliceReader};
use segfile_storage::{ChannelProxy, FileDataInput, RandomAccessReader};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Returns the bounds sidecar path for a data file (`<stem>.bounds`).
#[must_use]
pub fn bounds_path(data_path: &Path) -> PathBuf {
    data_path.with_extension("bounds")
}

/// An opened data file: its segments, cell order and health flag.
///
/// Shared copies see the same suspect flag.
pub struct DataFile {
    file: Box<dyn SegmentedFile>,
    comparator: Arc<dyn CellNameComparator>,
    suspect: Arc<AtomicBool>,
}

impl DataFile {
    /// Wraps an already opened segmented file.
    #[must_use]
    pub fn new(file: Box<dyn SegmentedFile>, comparator: Arc<dyn CellNameComparator>) -> Self {
        Self {
            file,
            comparator,
            suspect: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Opens the data file at `path`.
    ///
    /// Boundaries come from the bounds sidecar when it exists. A mapped file
    /// without a sidecar is scanned row by row to rebuild them.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AccessModeMismatch`] if the sidecar was written for
    /// another mode, [`CoreError::CorruptFile`] if a rescan fails, or an I/O
    /// error if the file cannot be opened.
    pub fn open(
        path: &Path,
        config: &Config,
        comparator: Arc<dyn CellNameComparator>,
    ) -> CoreResult<Self> {
        config.validate()?;
        let mut builder = SegmentBuilder::data(config);

        let sidecar = bounds_path(path);
        if sidecar.exists() {
            builder.load_bounds(&sidecar)?;
        } else if builder.mode() == AccessMode::Mmap {
            tracing::info!(path = %path.display(), "no bounds sidecar; rescanning rows");
            let channel = ChannelProxy::open(path)?;
            let reader = RandomAccessReader::open(&channel, config.read_buffer_size)?;
            for row in RowScanner::new(reader) {
                let row = row.map_err(|e| CoreError::corrupt_file(path, e))?;
                builder.add_potential_boundary(row.end());
            }
        }

        let file = builder.complete(path)?;
        tracing::debug!(file = %file, "opened data file");
        Ok(Self::new(file, comparator))
    }

    /// Returns the data file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Returns the logical length.
    #[must_use]
    pub fn length(&self) -> u64 {
        self.file.length()
    }

    /// Returns the underlying segmented file.
    #[must_use]
    pub fn segmented_file(&self) -> &dyn SegmentedFile {
        self.file.as_ref()
    }

    /// Returns the cell name order of this file.
    #[must_use]
    pub fn comparator(&self) -> &dyn CellNameComparator {
        self.comparator.as_ref()
    }

    /// Flags the file as possibly corrupt.
    pub fn mark_suspect(&self) {
        if !self.suspect.swap(true, Ordering::AcqRel) {
            tracing::warn!(path = %self.path().display(), "marking data file suspect");
        }
    }

    /// Returns whether a read has failed on this file.
    #[must_use]
    pub fn is_suspect(&self) -> bool {
        self.suspect.load(Ordering::Acquire)
    }

    /// Returns an input positioned at `position`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] if `position` is past the end.
    pub fn data_input(&self, position: u64) -> CoreResult<Box<dyn FileDataInput>> {
        if position >= self.length() {
            return Err(CoreError::invalid_operation(format!(
                "position {position} is past the end of '{}' ({} bytes)",
                self.path().display(),
                self.length()
            )));
        }
        self.file.get_segment(position)
    }

    /// Reads the row at `position` up to the cell name `finish` (inclusive).
    ///
    /// An empty `finish` reads the whole row.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be opened.
    pub fn slice(&self, position: u64, finish: &[u8]) -> CoreResult<SliceReader<'_>> {
        let input = self.data_input(position)?;
        SliceReader::new(self, SliceInput::Owned(input), position, finish)
    }

    /// Like [`Self::slice`], reading through an input the caller keeps.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be opened.
    pub fn slice_with<'a>(
        &'a self,
        input: &'a mut dyn FileDataInput,
        position: u64,
        finish: &[u8],
    ) -> CoreResult<SliceReader<'a>> {
        SliceReader::new(self, SliceInput::Borrowed(input), position, finish)
    }

    /// Iterates over the headers of every row, in file order.
    ///
    /// # Errors
    ///
    /// Returns an error if a reader cannot be opened.
    pub fn rows(&self) -> CoreResult<RowScanner<RandomAccessReader>> {
        Ok(RowScanner::new(self.file.create_reader()?))
    }

    /// Creates another owner sharing segments and suspect flag.
    #[must_use]
    pub fn shared_copy(&self) -> Self {
        Self {
            file: self.file.shared_copy(),
            comparator: Arc::clone(&self.comparator),
            suspect: Arc::clone(&self.suspect),
        }
    }

    /// Releases this owner. Returns `true` if the file was torn down.
    pub fn close(&mut self) -> bool {
        self.file.close()
    }
}

impl fmt::Debug for DataFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataFile")
            .field("file", &self.file.to_string())
            .field("comparator", &self.comparator.name())
            .field("suspect", &self.is_suspect())
            .finish()
    }
}

/// A row found by [`RowScanner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowEntry {
    /// Absolute offset of the row.
    pub position: u64,
    /// The row's leading fields.
    pub header: RowHeader,
}

impl RowEntry {
    /// Returns the offset one past the row.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.position.saturating_add(self.header.row_size())
    }
}

/// Walks row headers from the current position to the end of the input.
#[derive(Debug)]
pub struct RowScanner<I> {
    input: I,
    end: u64,
    failed: bool,
}

impl<I: FileDataInput> RowScanner<I> {
    /// Starts at the current position of `input`.
    pub fn new(input: I) -> Self {
        let end = input.position() + input.bytes_remaining();
        Self {
            input,
            end,
            failed: false,
        }
    }

    fn read_next(&mut self) -> io::Result<RowEntry> {
        let position = self.input.position();
        let header = RowHeader::read_from(&mut self.input)?;
        let entry = RowEntry { position, header };
        if entry.end() > self.end {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "row at {position} claims {} bytes, past the end at {}",
                    entry.header.row_size(),
                    self.end
                ),
            ));
        }
        self.input
            .seek(entry.end())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(entry)
    }
}

impl<I: FileDataInput> Iterator for RowScanner<I> {
    type Item = io::Result<RowEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.input.position() >= self.end {
            return None;
        }
        let next = self.read_next();
        self.failed = next.is_err();
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::BytesComparator;
    use crate::config::DiskAccessMode;
    use crate::row::{Cell, DeletionTime};
    use crate::writer::{DataFileWriter, RowIndexEntry};
    use tempfile::tempdir;

    fn write_rows(path: &Path, config: &Config, rows: usize) -> Vec<RowIndexEntry> {
        let mut writer = DataFileWriter::create(path, config, Arc::new(BytesComparator)).unwrap();
        for i in 0..rows {
            let cells: Vec<Cell> = (0..4u8)
                .map(|c| Cell::live(vec![b'c', c], vec![i as u8; 20], i as i64))
                .collect();
            writer
                .append_row(format!("key-{i:03}").as_bytes(), DeletionTime::LIVE, &cells)
                .unwrap();
        }
        writer.finish().unwrap().index
    }

    fn small_segments() -> Config {
        Config::new()
            .disk_access_mode(DiskAccessMode::Mmap)
            .max_segment_size(256)
    }

    #[test]
    fn reopen_with_sidecar() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.db");
        let index = write_rows(&path, &small_segments(), 20);

        let data = DataFile::open(&path, &small_segments(), Arc::new(BytesComparator)).unwrap();
        for entry in &index {
            let cells: Vec<_> = data.slice(entry.position, b"").unwrap().collect();
            assert_eq!(cells.len(), 4);
        }
        assert!(!data.is_suspect());
    }

    #[test]
    fn reopen_without_sidecar_rescans() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.db");
        write_rows(&path, &small_segments(), 20);

        let with_sidecar = DataFile::open(&path, &small_segments(), Arc::new(BytesComparator)).unwrap();
        let starts = |data: &DataFile| -> Vec<u64> {
            data.segmented_file()
                .iter_from(0)
                .map(|i| i.unwrap().position())
                .collect()
        };
        let expected = starts(&with_sidecar);
        assert!(expected.len() > 1);

        std::fs::remove_file(bounds_path(&path)).unwrap();
        let rescanned = DataFile::open(&path, &small_segments(), Arc::new(BytesComparator)).unwrap();
        assert_eq!(starts(&rescanned), expected);
    }

    #[test]
    fn reopen_with_changed_mode_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.db");
        write_rows(&path, &small_segments(), 3);

        let standard = Config::new().disk_access_mode(DiskAccessMode::Standard);
        let err = DataFile::open(&path, &standard, Arc::new(BytesComparator)).unwrap_err();
        assert!(matches!(err, CoreError::AccessModeMismatch { .. }));
    }

    #[test]
    fn rows_walk_every_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.db");
        let index = write_rows(&path, &small_segments(), 10);
        let data = DataFile::open(&path, &small_segments(), Arc::new(BytesComparator)).unwrap();

        let rows: Vec<RowEntry> = data.rows().unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), index.len());
        for (row, entry) in rows.iter().zip(&index) {
            assert_eq!(row.position, entry.position);
            assert_eq!(row.header.key, entry.key);
        }
        assert_eq!(rows.last().unwrap().end(), data.length());
    }

    #[test]
    fn position_past_end_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.db");
        write_rows(&path, &small_segments(), 1);
        let data = DataFile::open(&path, &small_segments(), Arc::new(BytesComparator)).unwrap();

        let err = data.slice(data.length(), b"").unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));
    }

    #[test]
    fn shared_copies_share_suspect_flag() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.db");
        write_rows(&path, &small_segments(), 1);
        let mut data = DataFile::open(&path, &small_segments(), Arc::new(BytesComparator)).unwrap();
        let mut copy = data.shared_copy();

        copy.mark_suspect();
        assert!(data.is_suspect());
        assert!(!copy.close());
        assert!(data.close());
    }
}
