//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data
//! that maintains required invariants.

use crate::fixtures::TestRow;
use proptest::prelude::*;
use segfile_core::{Cell, DeletionTime};
use std::collections::BTreeSet;

/// Strategy for finalized boundaries: starts at 0, strictly increasing,
/// ending with the file length.
pub fn finalized_boundaries_strategy(max_segments: usize, max_gap: u64) -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(1..=max_gap, 1..=max_segments).prop_map(|gaps| {
        let mut boundaries = Vec::with_capacity(gaps.len() + 1);
        let mut at = 0;
        boundaries.push(at);
        for gap in gaps {
            at += gap;
            boundaries.push(at);
        }
        boundaries
    })
}

/// Strategy for candidate boundaries offered by a writer (row ends).
pub fn row_ends_strategy(max_rows: usize, max_row_size: u64) -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(1..=max_row_size, 0..max_rows).prop_map(|sizes| {
        sizes
            .into_iter()
            .scan(0u64, |end, size| {
                *end += size;
                Some(*end)
            })
            .collect()
    })
}

/// Strategy for distinct cell names, in byte order.
pub fn cell_names_strategy(max_cells: usize) -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::btree_set(prop::collection::vec(any::<u8>(), 1..12), 0..max_cells)
        .prop_map(|names: BTreeSet<Vec<u8>>| names.into_iter().collect())
}

/// Strategy for a cell of any kind with the given name.
pub fn cell_strategy(name: Vec<u8>) -> impl Strategy<Value = Cell> {
    let value = prop::collection::vec(any::<u8>(), 0..64);
    prop_oneof![
        3 => (value.clone(), any::<i64>()).prop_map({
            let name = name.clone();
            move |(v, ts)| Cell::live(name.clone(), v, ts)
        }),
        1 => (any::<i64>(), any::<i32>()).prop_map({
            let name = name.clone();
            move |(ts, ldt)| Cell::tombstone(name.clone(), ts, ldt)
        }),
        1 => (value, any::<i64>(), 1..86_400i32, any::<i32>()).prop_map(
            move |(v, ts, ttl, exp)| Cell::expiring(name.clone(), v, ts, ttl, exp)
        ),
    ]
}

/// Strategy for a row deletion marker, live most of the time.
pub fn deletion_strategy() -> impl Strategy<Value = DeletionTime> {
    prop_oneof![
        3 => Just(DeletionTime::LIVE),
        1 => (any::<i64>(), any::<i32>()).prop_map(|(at, ldt)| DeletionTime::new(at, ldt)),
    ]
}

/// Strategy for a row with sorted, distinct cell names.
pub fn row_strategy(max_cells: usize) -> impl Strategy<Value = TestRow> {
    (
        prop::collection::vec(any::<u8>(), 0..32),
        deletion_strategy(),
        cell_names_strategy(max_cells),
    )
        .prop_flat_map(|(key, deletion, names)| {
            let cells: Vec<_> = names.into_iter().map(cell_strategy).collect();
            (Just(key), Just(deletion), cells)
        })
        .prop_map(|(key, deletion, cells)| TestRow::new(key, cells).deleted(deletion))
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
