//! Test fixtures and data file helpers.
//!
//! Provides convenience functions for writing data files into temporary
//! directories and reopening them.

use segfile_core::{
    bounds_path, BytesComparator, Cell, CellNameComparator, Config, DataFile, DataFileWriter,
    DeletionTime, DiskAccessMode, RowIndexEntry,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// One row to write into a fixture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRow {
    /// Partition key.
    pub key: Vec<u8>,
    /// Row deletion marker.
    pub deletion: DeletionTime,
    /// Cells in ascending name order.
    pub cells: Vec<Cell>,
}

impl TestRow {
    /// Creates a live row.
    pub fn new(key: impl Into<Vec<u8>>, cells: Vec<Cell>) -> Self {
        Self {
            key: key.into(),
            deletion: DeletionTime::LIVE,
            cells,
        }
    }

    /// Creates a live row with one live cell per name; names must be sorted.
    pub fn with_names(key: impl Into<Vec<u8>>, names: &[&str]) -> Self {
        let cells = names
            .iter()
            .map(|n| Cell::live(n.as_bytes().to_vec(), format!("value-{n}").into_bytes(), 1))
            .collect();
        Self::new(key, cells)
    }

    /// Sets the row deletion marker.
    #[must_use]
    pub fn deleted(mut self, deletion: DeletionTime) -> Self {
        self.deletion = deletion;
        self
    }
}

/// Creates row `i` of a standard fixture: `cells` cells of `value_size` bytes.
pub fn standard_row(i: usize, cells: usize, value_size: usize) -> TestRow {
    let cells = (0..cells)
        .map(|c| {
            Cell::live(
                format!("cell-{c:04}").into_bytes(),
                vec![(i % 251) as u8; value_size],
                i as i64,
            )
        })
        .collect();
    TestRow::new(format!("key-{i:06}"), cells)
}

/// A written data file with automatic cleanup.
pub struct TestDataFile {
    data: DataFile,
    index: Vec<RowIndexEntry>,
    rows: Vec<TestRow>,
    config: Config,
    comparator: Arc<dyn CellNameComparator>,
    path: PathBuf,
    _temp_dir: TempDir,
}

impl TestDataFile {
    /// Starts building a fixture.
    pub fn builder() -> TestDataFileBuilder {
        TestDataFileBuilder::default()
    }

    /// Writes `rows` under `config` with byte-ordered cell names.
    pub fn write(config: Config, rows: Vec<TestRow>) -> Self {
        Self::builder().config(config).with_rows(rows).build()
    }

    /// Returns the opened data file.
    pub fn data(&self) -> &DataFile {
        &self.data
    }

    /// Returns the row index produced by the writer.
    pub fn index(&self) -> &[RowIndexEntry] {
        &self.index
    }

    /// Returns the rows as written.
    pub fn rows(&self) -> &[TestRow] {
        &self.rows
    }

    /// Returns the configuration the file was written with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the data file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the bounds sidecar path.
    pub fn bounds_path(&self) -> PathBuf {
        bounds_path(&self.path)
    }

    /// Opens the file again under `config`.
    pub fn reopen_with(&self, config: &Config) -> segfile_core::CoreResult<DataFile> {
        DataFile::open(&self.path, config, Arc::clone(&self.comparator))
    }

    /// Opens the file again under the original configuration.
    pub fn reopen(&self) -> DataFile {
        self.reopen_with(&self.config).expect("Failed to reopen data file")
    }
}

impl std::fmt::Debug for TestDataFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestDataFile")
            .field("path", &self.path)
            .field("rows", &self.rows.len())
            .finish()
    }
}

/// Builder for [`TestDataFile`].
pub struct TestDataFileBuilder {
    config: Config,
    rows: Vec<TestRow>,
    comparator: Arc<dyn CellNameComparator>,
}

impl Default for TestDataFileBuilder {
    fn default() -> Self {
        Self {
            config: Config::new().disk_access_mode(DiskAccessMode::Mmap),
            rows: Vec::new(),
            comparator: Arc::new(BytesComparator),
        }
    }
}

impl TestDataFileBuilder {
    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Sets the cell name comparator.
    #[must_use]
    pub fn comparator(mut self, comparator: Arc<dyn CellNameComparator>) -> Self {
        self.comparator = comparator;
        self
    }

    /// Appends `count` standard rows of 8 cells with 32-byte values.
    #[must_use]
    pub fn rows(mut self, count: usize) -> Self {
        let start = self.rows.len();
        self.rows.extend((start..start + count).map(|i| standard_row(i, 8, 32)));
        self
    }

    /// Appends one row.
    #[must_use]
    pub fn row(mut self, row: TestRow) -> Self {
        self.rows.push(row);
        self
    }

    /// Appends rows.
    #[must_use]
    pub fn with_rows(mut self, rows: impl IntoIterator<Item = TestRow>) -> Self {
        self.rows.extend(rows);
        self
    }

    /// Writes the file and opens it.
    pub fn build(self) -> TestDataFile {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("data.db");

        let mut writer = DataFileWriter::create(&path, &self.config, Arc::clone(&self.comparator))
            .expect("Failed to create data file");
        for row in &self.rows {
            writer
                .append_row(&row.key, row.deletion, &row.cells)
                .expect("Failed to append row");
        }
        let written = writer.finish().expect("Failed to finish data file");

        TestDataFile {
            data: written.data,
            index: written.index,
            rows: self.rows,
            config: self.config,
            comparator: self.comparator,
            path,
            _temp_dir: temp_dir,
        }
    }
}

/// Runs a test against a fixture of `rows` standard rows.
///
/// # Example
///
/// ```rust,ignore
/// use segfile_testkit::with_data_file;
///
/// #[test]
/// fn my_test() {
///     with_data_file(5, |fixture| {
///         assert_eq!(fixture.index().len(), 5);
///     });
/// }
/// ```
pub fn with_data_file<F, R>(rows: usize, f: F) -> R
where
    F: FnOnce(&TestDataFile) -> R,
{
    let fixture = TestDataFile::builder().rows(rows).build();
    f(&fixture)
}
