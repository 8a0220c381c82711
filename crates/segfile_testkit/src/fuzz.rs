//! Fuzz testing harnesses for SegFile.
//!
//! This module provides fuzz targets that can be used with cargo-fuzz
//! or other fuzzing frameworks. Every target must return normally for any
//! input; decoders report bad bytes as errors, never as panics.

use segfile_core::{
    AccessMode, BytesComparator, CellIterator, Config, DataFile, DiskAccessMode, RowHeader,
    SegmentBuilder,
};
use std::io::Cursor;
use std::sync::Arc;

/// Fuzz target for the cell decoder.
pub fn fuzz_cell_stream(data: &[u8]) {
    for cell in CellIterator::new(Cursor::new(data)) {
        if cell.is_err() {
            break;
        }
    }
}

/// Fuzz target for row headers.
///
/// A decoded header must describe a row at least as long as its fixed fields.
pub fn fuzz_row_header(data: &[u8]) {
    if let Ok(header) = RowHeader::read_from(&mut Cursor::new(data)) {
        assert!(header.row_size() >= 10 + header.key.len() as u64);
    }
}

/// Fuzz target for bounds metadata.
///
/// Accepted boundaries must start at 0 and be strictly increasing.
pub fn fuzz_bounds(data: &[u8]) {
    let config = Config::new().disk_access_mode(DiskAccessMode::Mmap);
    let mut builder = SegmentBuilder::for_mode(AccessMode::Mmap, &config);
    if builder.deserialize_bounds(&mut Cursor::new(data)).is_ok() {
        let bounds = builder.boundaries();
        assert_eq!(bounds.first(), Some(&0));
        assert!(bounds.windows(2).all(|w| w[0] < w[1]));
    }
}

/// Fuzz target for reading a whole data file made of arbitrary bytes.
///
/// Failures must mark the file suspect rather than panic.
pub fn fuzz_data_file(data: &[u8]) {
    if data.is_empty() {
        return;
    }
    let Ok(dir) = tempfile::tempdir() else {
        return;
    };
    let path = dir.path().join("fuzz.db");
    if std::fs::write(&path, data).is_err() {
        return;
    }

    let config = Config::new().disk_access_mode(DiskAccessMode::Standard);
    let Ok(file) = DataFile::open(&path, &config, Arc::new(BytesComparator)) else {
        return;
    };

    let mut failed = false;
    match file.slice(0, b"") {
        Ok(reader) => {
            for cell in reader {
                if cell.is_err() {
                    failed = true;
                }
            }
        }
        Err(e) => failed = e.is_corruption(),
    }
    if failed {
        assert!(file.is_suspect());
    }
}
