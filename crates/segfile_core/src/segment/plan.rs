//! Boundary merging and window planning.

/// A window `[start, end)` between two adjacent boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// First byte of the window.
    pub start: u64,
    /// One past the last byte of the window.
    pub end: u64,
}

impl Window {
    /// Returns the window size in bytes.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Returns whether the window is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// Returns whether the window fits in one mapping of at most `cap` bytes.
    #[must_use]
    pub const fn is_mappable(&self, cap: u64) -> bool {
        self.len() <= cap
    }
}

/// Splits finalized boundaries (including the terminal length) into windows.
///
/// `boundaries` must be strictly increasing and start at 0.
#[must_use]
pub fn plan_windows(boundaries: &[u64]) -> Vec<Window> {
    boundaries
        .windows(2)
        .map(|pair| Window {
            start: pair[0],
            end: pair[1],
        })
        .collect()
}

/// Accumulates candidate cut points and merges them under a size cap.
///
/// Candidates are offsets where a segment may legally end, typically the end
/// of each row. Consecutive candidates are merged into one segment for as long
/// as the segment stays within `max_segment_size`. A single span between two
/// candidates that is itself larger than the cap becomes its own oversized
/// segment, which is later served without a mapped view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryPlanner {
    boundaries: Vec<u64>,
    current_start: u64,
    current_size: u64,
    max_segment_size: u64,
}

impl BoundaryPlanner {
    /// Creates a planner with the single boundary 0.
    #[must_use]
    pub fn new(max_segment_size: u64) -> Self {
        Self {
            boundaries: vec![0],
            current_start: 0,
            current_size: 0,
            max_segment_size,
        }
    }

    /// Creates a planner from previously persisted boundaries.
    ///
    /// An empty list is treated as `[0]`.
    #[must_use]
    pub fn from_boundaries(boundaries: Vec<u64>, max_segment_size: u64) -> Self {
        let boundaries = if boundaries.is_empty() { vec![0] } else { boundaries };
        let current_start = boundaries.last().copied().unwrap_or(0);
        Self {
            boundaries,
            current_start,
            current_size: 0,
            max_segment_size,
        }
    }

    /// Returns the committed boundaries.
    #[must_use]
    pub fn boundaries(&self) -> &[u64] {
        &self.boundaries
    }

    /// Returns the size cap.
    #[must_use]
    pub fn max_segment_size(&self) -> u64 {
        self.max_segment_size
    }

    /// Offers a candidate cut point. Candidates must be strictly increasing.
    pub fn add_potential_boundary(&mut self, boundary: u64) {
        debug_assert!(
            boundary >= self.current_start + self.current_size,
            "boundary {boundary} offered out of order"
        );

        if boundary.saturating_sub(self.current_start) <= self.max_segment_size {
            // Still fits: grow the open segment.
            self.current_size = boundary.saturating_sub(self.current_start);
            return;
        }

        if self.current_size > 0 {
            self.current_start += self.current_size;
            self.boundaries.push(self.current_start);
        }

        self.current_size = boundary.saturating_sub(self.current_start);
        if self.current_size > self.max_segment_size {
            // One span alone is over the cap.
            self.current_start = boundary;
            self.boundaries.push(self.current_start);
            self.current_size = 0;
        }
    }

    /// Finalizes against the file length.
    ///
    /// Boundaries past `length` are discarded from the planner. The returned
    /// list additionally ends with `length` as the terminal sentinel.
    pub fn finish(&mut self, length: u64) -> Vec<u64> {
        while self.boundaries.len() > 1 && self.boundaries.last().is_some_and(|&b| b > length) {
            self.boundaries.pop();
        }

        let mut finalized = self.boundaries.clone();
        if finalized.last() != Some(&length) {
            finalized.push(length);
        }
        finalized
    }
}
