//! # SegFile Core
//!
//! Segmented access to immutable, row-oriented data files.
//!
//! A data file is written once by a [`DataFileWriter`], which records every
//! row end as a potential segment boundary. On completion the
//! [`SegmentBuilder`] merges those boundaries into segments no larger than the
//! mapping cap and opens the file as a [`SegmentedFile`]. Readers resolve an
//! absolute row position into a positioned input and stream the row's cells
//! through a [`SliceReader`], optionally stopping at an upper-bound cell name.
//!
//! ## Design Principles
//!
//! - Data files are immutable once written
//! - Segments never split a row unless that row alone exceeds the cap
//! - Shared state is torn down exactly once, by the last owner to close
//! - Boundaries persist in a sidecar, so a normal reopen skips the row scan
//!
//! ## Example
//!
//! ```no_run
//! use segfile_core::{BytesComparator, Cell, Config, DataFileWriter, DeletionTime};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let config = Config::default();
//! let mut writer =
//!     DataFileWriter::create(Path::new("data.db"), &config, Arc::new(BytesComparator)).unwrap();
//! let cells = [Cell::live(&b"a"[..], &b"1"[..], 1), Cell::live(&b"b"[..], &b"2"[..], 1)];
//! let entry = writer.append_row(b"key", DeletionTime::LIVE, &cells).unwrap();
//! let written = writer.finish().unwrap();
//!
//! for cell in written.data.slice(entry.position, b"a").unwrap() {
//!     println!("{:?}", cell.unwrap());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod builder;
mod comparator;
mod config;
mod error;
pub mod file;
mod row;
pub mod segment;
mod slice;
mod table;
mod writer;

pub use builder::SegmentBuilder;
pub use comparator::{comparator_by_name, BytesComparator, CellNameComparator, LongComparator};
pub use config::{AccessMode, AccessModes, Config, DiskAccessMode};
pub use error::{CoreError, CoreResult};
pub use file::{BufferedSegmentedFile, MmappedSegmentedFile, SegmentIterator, SegmentedFile};
pub use row::{
    serialize_row, Cell, CellIterator, CellKind, ColumnFamily, DeletionTime, RowHeader,
    MAX_CELL_VALUE_SIZE,
};
pub use segment::{BoundaryPlanner, Segment, SegmentTable};
pub use slice::{SliceInput, SliceReader, SliceState};
pub use table::{bounds_path, DataFile, RowEntry, RowScanner};
pub use writer::{DataFileWriter, RowIndexEntry, WrittenDataFile};

/// Re-exported storage types used in this crate's API.
pub use segfile_storage::{FileDataInput, MappedInput, RandomAccessReader, MAX_MAPPED_SIZE};

/// Version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
