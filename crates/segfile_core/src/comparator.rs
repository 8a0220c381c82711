//! Cell name ordering.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Total order over serialized cell names.
pub trait CellNameComparator: Send + Sync + fmt::Debug {
    /// Compares two cell names.
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;

    /// Returns the comparator's name.
    fn name(&self) -> &'static str;
}

/// Unsigned lexicographic byte order.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesComparator;

impl CellNameComparator for BytesComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }

    fn name(&self) -> &'static str {
        "bytes"
    }
}

/// Signed order over 8-byte big-endian integer names.
///
/// Names of any other length sort after every integer, by bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct LongComparator;

impl LongComparator {
    fn decode(name: &[u8]) -> Option<i64> {
        <[u8; 8]>::try_from(name).ok().map(i64::from_be_bytes)
    }
}

impl CellNameComparator for LongComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        match (Self::decode(a), Self::decode(b)) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.cmp(b),
        }
    }

    fn name(&self) -> &'static str {
        "long"
    }
}

/// Looks up a comparator by name (`bytes` or `long`).
#[must_use]
pub fn comparator_by_name(name: &str) -> Option<Arc<dyn CellNameComparator>> {
    match name {
        "bytes" => Some(Arc::new(BytesComparator)),
        "long" => Some(Arc::new(LongComparator)),
        _ => None,
    }
}
