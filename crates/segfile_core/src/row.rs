//! Serialized row and cell format.
//!
//! ## Row Format
//!
//! ```text
//! | key (2 + N) | data_size (8) | local_deletion_time (4) | marked_for_delete_at (8) |
//! | cell ... | end_marker (2) |
//! ```
//!
//! `data_size` counts every byte after itself, up to and including the end
//! marker. The end marker is a zero name length.
//!
//! ## Cell Format
//!
//! ```text
//! | name (2 + N) | kind (1) | [ttl (4) | local_expiration_time (4)] | timestamp (8) | value |
//! ```
//!
//! Kinds:
//! - `0` = live, value is `len (4) | bytes`
//! - `1` = tombstone, value is `local_deletion_time (4)`
//! - `2` = expiring, carries ttl and expiration; value is `len (4) | bytes`

use crate::comparator::CellNameComparator;
use bytes::Bytes;
use segfile_storage::{DataInputExt, DataOutputExt, MAX_SHORT_LENGTH};
use std::cmp::Ordering;
use std::io::{self, Read, Write};

/// Largest cell value accepted when decoding.
pub const MAX_CELL_VALUE_SIZE: usize = 256 * 1024 * 1024; // 256 MB

const KIND_LIVE: u8 = 0;
const KIND_TOMBSTONE: u8 = 1;
const KIND_EXPIRING: u8 = 2;

/// Row-level deletion marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeletionTime {
    /// Server time of the deletion, in seconds.
    pub local_deletion_time: i32,
    /// Write timestamp the deletion shadows.
    pub marked_for_delete_at: i64,
}

impl DeletionTime {
    /// The marker of a row that was never deleted.
    pub const LIVE: Self = Self {
        local_deletion_time: i32::MAX,
        marked_for_delete_at: i64::MIN,
    };

    /// Creates a deletion marker.
    #[must_use]
    pub const fn new(marked_for_delete_at: i64, local_deletion_time: i32) -> Self {
        Self {
            local_deletion_time,
            marked_for_delete_at,
        }
    }

    /// Returns whether this marker deletes nothing.
    #[must_use]
    pub fn is_live(&self) -> bool {
        *self == Self::LIVE
    }

    /// Returns whether a write at `timestamp` is shadowed by this marker.
    #[must_use]
    pub fn deletes(&self, timestamp: i64) -> bool {
        timestamp <= self.marked_for_delete_at
    }

    /// Size in bytes of the serialized form.
    pub const SERIALIZED_SIZE: u64 = 12;

    /// Writes the marker.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        out.write_i32(self.local_deletion_time)?;
        out.write_i64(self.marked_for_delete_at)
    }

    /// Reads a marker.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails.
    pub fn read_from<R: Read + ?Sized>(input: &mut R) -> io::Result<Self> {
        let local_deletion_time = input.read_i32()?;
        let marked_for_delete_at = input.read_i64()?;
        Ok(Self {
            local_deletion_time,
            marked_for_delete_at,
        })
    }
}

impl Default for DeletionTime {
    fn default() -> Self {
        Self::LIVE
    }
}

impl PartialOrd for DeletionTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DeletionTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.marked_for_delete_at
            .cmp(&other.marked_for_delete_at)
            .then(self.local_deletion_time.cmp(&other.local_deletion_time))
    }
}

/// Row-level metadata prototype: the row's deletion marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnFamily {
    deletion: DeletionTime,
}

impl ColumnFamily {
    /// Creates a prototype with no deletion.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merges a deletion marker; the newer marker wins.
    pub fn delete(&mut self, deletion: DeletionTime) {
        if deletion > self.deletion {
            self.deletion = deletion;
        }
    }

    /// Returns the effective deletion marker.
    #[must_use]
    pub fn deletion_info(&self) -> DeletionTime {
        self.deletion
    }

    /// Returns whether the row carries a deletion.
    #[must_use]
    pub fn is_marked_for_delete(&self) -> bool {
        !self.deletion.is_live()
    }
}

/// Kind-specific state of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    /// A regular value.
    Live,
    /// A deleted cell.
    Tombstone {
        /// Server time of the deletion, in seconds.
        local_deletion_time: i32,
    },
    /// A value with a time to live.
    Expiring {
        /// Time to live in seconds.
        ttl: i32,
        /// Server time at which the value expires, in seconds.
        local_expiration_time: i32,
    },
}

/// One named value of a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    name: Bytes,
    value: Bytes,
    timestamp: i64,
    kind: CellKind,
}

impl Cell {
    /// Creates a live cell.
    #[must_use]
    pub fn live(name: impl Into<Bytes>, value: impl Into<Bytes>, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            timestamp,
            kind: CellKind::Live,
        }
    }

    /// Creates a tombstone.
    #[must_use]
    pub fn tombstone(name: impl Into<Bytes>, timestamp: i64, local_deletion_time: i32) -> Self {
        Self {
            name: name.into(),
            value: Bytes::new(),
            timestamp,
            kind: CellKind::Tombstone {
                local_deletion_time,
            },
        }
    }

    /// Creates an expiring cell.
    #[must_use]
    pub fn expiring(
        name: impl Into<Bytes>,
        value: impl Into<Bytes>,
        timestamp: i64,
        ttl: i32,
        local_expiration_time: i32,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            timestamp,
            kind: CellKind::Expiring {
                ttl,
                local_expiration_time,
            },
        }
    }

    /// Returns the cell name.
    #[must_use]
    pub fn name(&self) -> &Bytes {
        &self.name
    }

    /// Returns the value; empty for tombstones.
    #[must_use]
    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// Returns the write timestamp.
    #[must_use]
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Returns the kind.
    #[must_use]
    pub fn kind(&self) -> CellKind {
        self.kind
    }

    /// Returns whether the cell holds a value at server time `now` (seconds).
    #[must_use]
    pub fn is_live(&self, now: i32) -> bool {
        match self.kind {
            CellKind::Live => true,
            CellKind::Tombstone { .. } => false,
            CellKind::Expiring {
                local_expiration_time,
                ..
            } => now < local_expiration_time,
        }
    }

    /// Writes the cell.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an empty or oversized name.
    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        if self.name.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cell names must not be empty",
            ));
        }
        out.write_short_length_bytes(&self.name)?;
        match self.kind {
            CellKind::Live => {
                out.write_u8(KIND_LIVE)?;
                out.write_i64(self.timestamp)?;
                out.write_int_length_bytes(&self.value)
            }
            CellKind::Tombstone {
                local_deletion_time,
            } => {
                out.write_u8(KIND_TOMBSTONE)?;
                out.write_i64(self.timestamp)?;
                out.write_i32(local_deletion_time)
            }
            CellKind::Expiring {
                ttl,
                local_expiration_time,
            } => {
                out.write_u8(KIND_EXPIRING)?;
                out.write_i32(ttl)?;
                out.write_i32(local_expiration_time)?;
                out.write_i64(self.timestamp)?;
                out.write_int_length_bytes(&self.value)
            }
        }
    }

    /// Reads the next cell, or `None` at the end-of-row marker.
    ///
    /// # Errors
    ///
    /// Returns an error on a short read or an unknown kind.
    pub fn read_from<R: Read + ?Sized>(input: &mut R) -> io::Result<Option<Self>> {
        let name = input.read_short_length_bytes()?;
        if name.is_empty() {
            return Ok(None);
        }

        let kind = match input.read_u8()? {
            KIND_LIVE => CellKind::Live,
            KIND_TOMBSTONE => CellKind::Tombstone {
                local_deletion_time: 0,
            },
            KIND_EXPIRING => CellKind::Expiring {
                ttl: input.read_i32()?,
                local_expiration_time: input.read_i32()?,
            },
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown cell kind {other}"),
                ))
            }
        };
        let timestamp = input.read_i64()?;

        let (kind, value) = match kind {
            CellKind::Tombstone { .. } => (
                CellKind::Tombstone {
                    local_deletion_time: input.read_i32()?,
                },
                Bytes::new(),
            ),
            other => (
                other,
                Bytes::from(input.read_int_length_bytes(MAX_CELL_VALUE_SIZE)?),
            ),
        };

        Ok(Some(Self {
            name: Bytes::from(name),
            value,
            timestamp,
            kind,
        }))
    }
}

/// Fixed leading fields of a serialized row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowHeader {
    /// Partition key.
    pub key: Bytes,
    /// Bytes after the size field, through the end marker.
    pub data_size: u64,
    /// Row deletion marker.
    pub deletion: DeletionTime,
}

impl RowHeader {
    /// Reads the key, size and deletion marker.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails.
    pub fn read_from<R: Read + ?Sized>(input: &mut R) -> io::Result<Self> {
        let key = Bytes::from(input.read_short_length_bytes()?);
        let data_size = input.read_u64()?;
        let deletion = DeletionTime::read_from(input)?;
        Ok(Self {
            key,
            data_size,
            deletion,
        })
    }

    /// Returns the total serialized size of the row this header starts.
    #[must_use]
    pub fn row_size(&self) -> u64 {
        (2 + self.key.len() as u64 + 8).saturating_add(self.data_size)
    }
}

/// Serializes one row.
///
/// # Errors
///
/// Returns `InvalidInput` for an oversized key, an empty cell name, or cells
/// not in strictly ascending order under `comparator`.
pub fn serialize_row(
    key: &[u8],
    deletion: DeletionTime,
    cells: &[Cell],
    comparator: &dyn CellNameComparator,
) -> io::Result<Vec<u8>> {
    if key.len() > MAX_SHORT_LENGTH {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("key of {} bytes exceeds {MAX_SHORT_LENGTH}", key.len()),
        ));
    }
    if let Some(pair) = cells
        .windows(2)
        .find(|pair| comparator.compare(&pair[0].name, &pair[1].name) != Ordering::Less)
    {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "cells out of order under {} comparator: {:?} then {:?}",
                comparator.name(),
                pair[0].name,
                pair[1].name
            ),
        ));
    }

    let mut body = Vec::new();
    deletion.write_to(&mut body)?;
    for cell in cells {
        cell.write_to(&mut body)?;
    }
    body.write_u16(0)?;

    let mut row = Vec::with_capacity(2 + key.len() + 8 + body.len());
    row.write_short_length_bytes(key)?;
    row.write_u64(body.len() as u64)?;
    row.extend_from_slice(&body);
    Ok(row)
}

/// Streams the cells of one row up to its end marker.
///
/// Owns its input; [`CellIterator::into_inner`] gives it back.
#[derive(Debug)]
pub struct CellIterator<R> {
    input: R,
    finished: bool,
}

impl<R: Read> CellIterator<R> {
    /// Starts reading cells at the current position of `input`.
    pub fn new(input: R) -> Self {
        Self {
            input,
            finished: false,
        }
    }

    /// Returns whether the end marker (or an error) has been reached.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns the underlying input.
    pub fn into_inner(self) -> R {
        self.input
    }
}

impl<R: Read> Iterator for CellIterator<R> {
    type Item = io::Result<Cell>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match Cell::read_from(&mut self.input) {
            Ok(Some(cell)) => Some(Ok(cell)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::BytesComparator;
    use std::io::Cursor;

    fn sample_cells() -> Vec<Cell> {
        vec![
            Cell::live(&b"a"[..], &b"1"[..], 10),
            Cell::tombstone(&b"b"[..], 11, 1_700_000_000),
            Cell::expiring(&b"c"[..], &b"3"[..], 12, 60, 1_700_000_060),
        ]
    }

    #[test]
    fn row_layout() {
        let row = serialize_row(b"key", DeletionTime::LIVE, &sample_cells(), &BytesComparator).unwrap();
        let mut input = Cursor::new(&row);

        let header = RowHeader::read_from(&mut input).unwrap();
        assert_eq!(&header.key[..], b"key");
        assert!(header.deletion.is_live());
        assert_eq!(header.row_size(), row.len() as u64);

        let cells: Vec<Cell> = CellIterator::new(&mut input).map(|c| c.unwrap()).collect();
        assert_eq!(cells, sample_cells());
        assert_eq!(input.position(), row.len() as u64);
    }

    #[test]
    fn out_of_order_cells_are_rejected() {
        let cells = vec![Cell::live(&b"b"[..], &b""[..], 1), Cell::live(&b"a"[..], &b""[..], 1)];
        let err = serialize_row(b"k", DeletionTime::LIVE, &cells, &BytesComparator).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        let dupes = vec![Cell::live(&b"a"[..], &b""[..], 1), Cell::live(&b"a"[..], &b""[..], 2)];
        assert!(serialize_row(b"k", DeletionTime::LIVE, &dupes, &BytesComparator).is_err());
    }

    #[test]
    fn empty_cell_name_is_rejected() {
        let cells = vec![Cell::live(Bytes::new(), &b"v"[..], 1)];
        assert!(serialize_row(b"k", DeletionTime::LIVE, &cells, &BytesComparator).is_err());
    }

    #[test]
    fn unknown_kind_is_an_error() {
        let mut bytes = Vec::new();
        bytes.write_short_length_bytes(b"x").unwrap();
        bytes.write_u8(9).unwrap();
        let mut cells = CellIterator::new(Cursor::new(bytes));
        assert!(cells.next().unwrap().is_err());
        assert!(cells.next().is_none());
    }

    #[test]
    fn truncated_cell_is_an_error() {
        let row = serialize_row(b"k", DeletionTime::LIVE, &sample_cells(), &BytesComparator).unwrap();
        let mut input = Cursor::new(&row[..row.len() - 6]);
        RowHeader::read_from(&mut input).unwrap();
        let results: Vec<_> = CellIterator::new(input).collect();
        assert!(results.last().unwrap().is_err());
    }

    #[test]
    fn newer_deletion_wins() {
        let mut cf = ColumnFamily::empty();
        assert!(!cf.is_marked_for_delete());

        cf.delete(DeletionTime::new(100, 5));
        cf.delete(DeletionTime::new(50, 9));
        assert_eq!(cf.deletion_info(), DeletionTime::new(100, 5));
        assert!(cf.is_marked_for_delete());
        assert!(cf.deletion_info().deletes(100));
        assert!(!cf.deletion_info().deletes(101));
    }

    #[test]
    fn expiring_liveness() {
        let cell = Cell::expiring(&b"c"[..], &b"v"[..], 1, 10, 1000);
        assert!(cell.is_live(999));
        assert!(!cell.is_live(1000));
        assert!(!Cell::tombstone(&b"t"[..], 1, 0).is_live(0));
    }
}
