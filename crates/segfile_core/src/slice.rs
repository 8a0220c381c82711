//! Bounded reads of one row's cells.

use crate::error::{CoreError, CoreResult};
use crate::row::{Cell, CellIterator, ColumnFamily, DeletionTime};
use crate::table::DataFile;
use bytes::Bytes;
use segfile_storage::{DataInputExt, FileDataInput};
use std::cmp::Ordering;
use std::fmt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Where a slice reader gets its bytes from.
pub enum SliceInput<'a> {
    /// Opened by the reader; released when the reader closes.
    Owned(Box<dyn FileDataInput>),
    /// Supplied by the caller, who keeps ownership.
    Borrowed(&'a mut dyn FileDataInput),
}

impl SliceInput<'_> {
    /// Returns whether closing the reader releases this input.
    #[must_use]
    pub fn needs_closing(&self) -> bool {
        matches!(self, Self::Owned(_))
    }

    fn input(&mut self) -> &mut dyn FileDataInput {
        match self {
            Self::Owned(input) => input.as_mut(),
            Self::Borrowed(input) => &mut **input,
        }
    }
}

impl Read for SliceInput<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input().read(buf)
    }
}

impl fmt::Debug for SliceInput<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Owned(input) => f.debug_tuple("Owned").field(&input.position()).finish(),
            Self::Borrowed(input) => f.debug_tuple("Borrowed").field(&input.position()).finish(),
        }
    }
}

/// Lifecycle of a [`SliceReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceState {
    /// Cells may still be produced.
    Streaming,
    /// The row ended, the stop bound was passed, or a read failed.
    Exhausted,
    /// The reader was closed.
    Closed,
}

/// Streams the cells of one row whose names are at most a stop bound.
///
/// Construction positions the input at the row start, skips the key and the
/// size field, and decodes the row's deletion marker. Iteration then yields
/// cells in on-disk order until the row ends or a cell name compares greater
/// than `finish`. An empty `finish` reads the whole row.
///
/// Read failures mark the owning [`DataFile`] suspect and surface as
/// [`CoreError::CorruptFile`].
pub struct SliceReader<'a> {
    owner: &'a DataFile,
    path: PathBuf,
    finish: Bytes,
    column_family: ColumnFamily,
    cells: Option<CellIterator<SliceInput<'a>>>,
    state: SliceState,
}

impl<'a> SliceReader<'a> {
    /// Opens a reader over the row starting at `position`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if `input` cannot be positioned at `position`,
    /// or [`CoreError::CorruptFile`] if the row header cannot be decoded.
    pub fn new(
        owner: &'a DataFile,
        mut input: SliceInput<'a>,
        position: u64,
        finish: &[u8],
    ) -> CoreResult<Self> {
        let path = input.input().path().to_path_buf();
        input.input().seek(position)?;

        let deletion = match Self::read_header(&mut input) {
            Ok(deletion) => deletion,
            Err(e) => {
                owner.mark_suspect();
                return Err(CoreError::corrupt_file(path, e));
            }
        };
        let mut column_family = ColumnFamily::empty();
        column_family.delete(deletion);

        Ok(Self {
            owner,
            path,
            finish: Bytes::copy_from_slice(finish),
            column_family,
            cells: Some(CellIterator::new(input)),
            state: SliceState::Streaming,
        })
    }

    fn read_header(input: &mut SliceInput<'_>) -> io::Result<DeletionTime> {
        input.skip_short_length()?;
        input.read_u64()?;
        DeletionTime::read_from(input)
    }

    /// Returns the row's deletion prototype.
    #[must_use]
    pub fn column_family(&self) -> &ColumnFamily {
        &self.column_family
    }

    /// Returns the data file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> SliceState {
        self.state
    }

    /// Stops the reader and releases its input if the reader opened it.
    pub fn close(&mut self) {
        if let Some(cells) = self.cells.take() {
            if let SliceInput::Owned(input) = cells.into_inner() {
                drop(input);
            }
        }
        self.state = SliceState::Closed;
    }

    fn exhaust(&mut self) {
        self.state = SliceState::Exhausted;
    }

    fn past_finish(&self, cell: &Cell) -> bool {
        !self.finish.is_empty()
            && self.owner.comparator().compare(cell.name(), &self.finish) == Ordering::Greater
    }
}

impl Iterator for SliceReader<'_> {
    type Item = CoreResult<Cell>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state != SliceState::Streaming {
            return None;
        }
        let next = self.cells.as_mut().and_then(Iterator::next);

        match next {
            None => {
                self.exhaust();
                None
            }
            Some(Err(e)) => {
                self.exhaust();
                self.owner.mark_suspect();
                Some(Err(CoreError::corrupt_file(self.path.clone(), e)))
            }
            Some(Ok(cell)) if self.past_finish(&cell) => {
                self.exhaust();
                None
            }
            Some(Ok(cell)) => Some(Ok(cell)),
        }
    }
}

impl fmt::Debug for SliceReader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SliceReader")
            .field("path", &self.path)
            .field("finish", &self.finish)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::BytesComparator;
    use crate::config::{Config, DiskAccessMode};
    use crate::writer::{DataFileWriter, WrittenDataFile};
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    fn names(cells: &[Cell]) -> Vec<&[u8]> {
        cells.iter().map(|c| &c.name()[..]).collect()
    }

    fn write(mode: DiskAccessMode, deletion: DeletionTime) -> (TempDir, WrittenDataFile) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.db");
        let config = Config::new().disk_access_mode(mode);
        let mut writer = DataFileWriter::create(&path, &config, Arc::new(BytesComparator)).unwrap();

        let row: Vec<Cell> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|n| Cell::live(n.as_bytes().to_vec(), b"value".to_vec(), 7))
            .collect();
        writer.append_row(b"before", DeletionTime::LIVE, &row[..1]).unwrap();
        writer.append_row(b"row", deletion, &row).unwrap();
        writer.append_row(b"after", DeletionTime::LIVE, &row[3..]).unwrap();
        (dir, writer.finish().unwrap())
    }

    #[test]
    fn stops_after_bound() {
        let (_dir, written) = write(DiskAccessMode::Mmap, DeletionTime::LIVE);
        let position = written.index[1].position;

        let reader = written.data.slice(position, b"c").unwrap();
        let cells: Vec<Cell> = reader.map(|c| c.unwrap()).collect();
        assert_eq!(names(&cells), vec![&b"a"[..], b"b", b"c"]);
    }

    #[test]
    fn bound_between_names() {
        let (_dir, written) = write(DiskAccessMode::Mmap, DeletionTime::LIVE);
        let reader = written.data.slice(written.index[1].position, b"bb").unwrap();
        assert_eq!(reader.count(), 2);
    }

    #[test]
    fn empty_bound_reads_whole_row() {
        let (_dir, written) = write(DiskAccessMode::Standard, DeletionTime::LIVE);
        let mut reader = written.data.slice(written.index[1].position, b"").unwrap();

        let cells: Vec<Cell> = reader.by_ref().map(|c| c.unwrap()).collect();
        assert_eq!(cells.len(), 5);
        assert_eq!(reader.state(), SliceState::Exhausted);
        assert!(reader.next().is_none());
    }

    #[test]
    fn column_family_is_available_before_first_cell() {
        let deletion = DeletionTime::new(42, 1_700_000_000);
        let (_dir, written) = write(DiskAccessMode::Mmap, deletion);
        let reader = written.data.slice(written.index[1].position, b"").unwrap();

        assert_eq!(reader.state(), SliceState::Streaming);
        assert!(reader.column_family().is_marked_for_delete());
        assert_eq!(reader.column_family().deletion_info(), deletion);
    }

    #[test]
    fn borrowed_input_stays_with_caller() {
        let (_dir, written) = write(DiskAccessMode::Mmap, DeletionTime::LIVE);
        let row = written.index[1].position;
        let after = written.index[2].position;

        let mut input = written.data.data_input(0).unwrap();
        {
            let mut reader = written.data.slice_with(input.as_mut(), row, b"").unwrap();
            assert_eq!(reader.by_ref().count(), 5);
            reader.close();
            assert_eq!(reader.state(), SliceState::Closed);
            assert!(reader.next().is_none());
        }

        // The caller's input sits right after the row.
        assert_eq!(input.position(), after);
        let reader = written.data.slice_with(input.as_mut(), after, b"").unwrap();
        assert_eq!(reader.count(), 2);
    }

    #[test]
    fn corrupt_row_marks_file_suspect() {
        let (_dir, written) = write(DiskAccessMode::Mmap, DeletionTime::LIVE);
        assert!(!written.data.is_suspect());

        // Starting one byte into a row misreads the key length.
        let result = written.data.slice(written.index[1].position + 1, b"");
        let failed = match result {
            Err(e) => e.is_corruption(),
            Ok(reader) => reader.into_iter().any(|c| c.is_err()),
        };
        assert!(failed);
        assert!(written.data.is_suspect());
    }

    #[test]
    fn slice_input_ownership() {
        let (_dir, written) = write(DiskAccessMode::Mmap, DeletionTime::LIVE);
        let mut owned = written.data.data_input(0).unwrap();
        assert!(!SliceInput::Borrowed(owned.as_mut()).needs_closing());
        assert!(SliceInput::Owned(owned).needs_closing());
    }
}
