//! Segments of an immutable data file.
//!
//! A data file of `length` bytes is cut into contiguous segments at row
//! boundaries. Each segment is served through a mapped view when it fits in
//! one mapping, and through buffered reads otherwise.
//!
//! ```text
//! boundaries: 0        b1            b2                  length
//!             |--------|-------------|--------------------|
//! segments:   [  s0   ][     s1     ][        s2         ]
//! ```
//!
//! - [`BoundaryPlanner`] merges candidate cut points under a size cap
//! - [`plan_windows`] turns boundaries into windows without touching a file
//! - [`SegmentTable`] holds the resulting segments, with their views

mod plan;
mod table;

pub use plan::{plan_windows, BoundaryPlanner, Window};
pub use table::{Segment, SegmentTable};
