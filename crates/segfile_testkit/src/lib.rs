//! # SegFile Testkit
//!
//! Test utilities for SegFile.
//!
//! This crate provides:
//! - Data file fixtures written into temporary directories
//! - Property-based test generators using proptest
//! - Fuzz harnesses for the row and bounds decoders
//! - Concurrent read stress helpers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use segfile_testkit::prelude::*;
//!
//! #[test]
//! fn reads_every_row() {
//!     let fixture = TestDataFile::builder().rows(10).build();
//!     for (entry, row) in fixture.index().iter().zip(fixture.rows()) {
//!         let cells: Vec<_> = fixture.data().slice(entry.position, b"").unwrap().collect();
//!         assert_eq!(cells.len(), row.cells.len());
//!     }
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod fuzz;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::fuzz::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use fuzz::*;
pub use generators::*;
pub use stress::*;
