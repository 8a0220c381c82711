//! Sequential writer for data files.

use crate::builder::SegmentBuilder;
use crate::comparator::CellNameComparator;
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::file::SegmentedFile;
use crate::row::{serialize_row, Cell, DeletionTime};
use crate::table::{bounds_path, DataFile};
use bytes::Bytes;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a row starts in its data file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowIndexEntry {
    /// Partition key of the row.
    pub key: Bytes,
    /// Absolute offset of the row.
    pub position: u64,
}

/// A finished data file and the index of its rows.
#[derive(Debug)]
pub struct WrittenDataFile {
    /// The reopened file.
    pub data: DataFile,
    /// One entry per row, in write order.
    pub index: Vec<RowIndexEntry>,
}

/// Appends rows to a new data file and records segment boundaries.
///
/// Every row end is offered to the [`SegmentBuilder`] as a potential
/// boundary, so no row is ever split across segments unless it alone exceeds
/// the segment cap.
pub struct DataFileWriter {
    path: PathBuf,
    out: BufWriter<File>,
    position: u64,
    builder: SegmentBuilder,
    comparator: Arc<dyn CellNameComparator>,
    index: Vec<RowIndexEntry>,
}

impl DataFileWriter {
    /// Creates (or truncates) the data file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid or the file cannot be created.
    pub fn create(
        path: &Path,
        config: &Config,
        comparator: Arc<dyn CellNameComparator>,
    ) -> CoreResult<Self> {
        config.validate()?;
        let out = BufWriter::new(File::create(path)?);
        tracing::debug!(path = %path.display(), "creating data file");
        Ok(Self {
            path: path.to_path_buf(),
            out,
            position: 0,
            builder: SegmentBuilder::data(config),
            comparator,
            index: Vec::new(),
        })
    }

    /// Returns the number of bytes written so far.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Returns the path being written.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one row with its cells, which must be in ascending name order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] for a malformed row, or an I/O
    /// error if writing fails.
    pub fn append_row(
        &mut self,
        key: &[u8],
        deletion: DeletionTime,
        cells: &[Cell],
    ) -> CoreResult<RowIndexEntry> {
        let row = serialize_row(key, deletion, cells, self.comparator.as_ref()).map_err(|e| {
            if e.kind() == io::ErrorKind::InvalidInput {
                CoreError::invalid_operation(e.to_string())
            } else {
                CoreError::Io(e)
            }
        })?;
        self.out.write_all(&row)?;

        let entry = RowIndexEntry {
            key: Bytes::copy_from_slice(key),
            position: self.position,
        };
        self.position += row.len() as u64;
        self.builder.add_potential_boundary(self.position);
        self.index.push(entry.clone());
        Ok(entry)
    }

    /// Opens the rows written so far while writing continues.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing or opening fails.
    pub fn open_early(&mut self) -> CoreResult<Box<dyn SegmentedFile>> {
        self.out.flush()?;
        self.builder.complete_early(&self.path, self.position)
    }

    /// Syncs the file, writes its bounds sidecar and reopens it for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if syncing, opening or writing the sidecar fails.
    pub fn finish(mut self) -> CoreResult<WrittenDataFile> {
        self.out.flush()?;
        self.out.get_ref().sync_all()?;

        let file = self.builder.complete(&self.path)?;
        self.builder.save_bounds(&bounds_path(&self.path))?;
        self.builder.close();

        tracing::debug!(
            file = %file,
            rows = self.index.len(),
            boundaries = self.builder.boundaries().len(),
            "finished data file"
        );
        Ok(WrittenDataFile {
            data: DataFile::new(file, self.comparator),
            index: self.index,
        })
    }
}

impl std::fmt::Debug for DataFileWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataFileWriter")
            .field("path", &self.path)
            .field("position", &self.position)
            .field("rows", &self.index.len())
            .finish()
    }
}
