//! The immutable segment table of a mapped data file.

use super::plan::plan_windows;
use crate::error::CoreResult;
use segfile_storage::{ChannelProxy, MappedRegion};

/// One contiguous byte range of a data file.
#[derive(Debug, Clone)]
pub struct Segment {
    offset: u64,
    size: u64,
    view: Option<MappedRegion>,
}

impl Segment {
    /// Creates a segment, with or without a mapped view.
    #[must_use]
    pub fn new(offset: u64, size: u64, view: Option<MappedRegion>) -> Self {
        Self { offset, size, view }
    }

    /// Returns the absolute offset of the first byte.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns the segment size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns one past the last byte.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    /// Returns the mapped view, if the segment has one.
    #[must_use]
    pub fn view(&self) -> Option<&MappedRegion> {
        self.view.as_ref()
    }

    /// Returns whether reads are served from a mapping.
    #[must_use]
    pub fn is_mapped(&self) -> bool {
        self.view.is_some()
    }

    pub(crate) fn into_view(self) -> Option<MappedRegion> {
        self.view
    }
}

/// Sorted, gap-free segments covering `[0, length)`.
#[derive(Debug, Clone)]
pub struct SegmentTable {
    segments: Vec<Segment>,
    length: u64,
}

impl SegmentTable {
    /// Builds a table from segments that partition `[0, length)`.
    ///
    /// # Panics
    ///
    /// Panics if the segments leave a gap, overlap or miss the end.
    #[must_use]
    pub fn new(segments: Vec<Segment>, length: u64) -> Self {
        let mut expected = 0;
        for segment in &segments {
            assert_eq!(segment.offset, expected, "segments must be contiguous");
            expected = segment.end();
        }
        assert_eq!(expected, length, "segments must cover the file");
        Self { segments, length }
    }

    /// Maps every window of the finalized `boundaries` that fits under `cap`.
    ///
    /// `boundaries` must end with the file length.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses a mapping.
    pub fn map(channel: &ChannelProxy, boundaries: &[u64], cap: u64) -> CoreResult<Self> {
        let windows = plan_windows(boundaries);
        let mut segments = Vec::with_capacity(windows.len());

        for window in windows {
            let view = if window.is_mappable(cap) {
                Some(channel.map(window.start, window.len())?)
            } else {
                tracing::debug!(
                    path = %channel.path().display(),
                    start = window.start,
                    len = window.len(),
                    "segment exceeds mapping cap; using buffered reads"
                );
                None
            };
            segments.push(Segment::new(window.start, window.len(), view));
        }

        let length = boundaries.last().copied().unwrap_or(0);
        tracing::debug!(
            path = %channel.path().display(),
            segments = segments.len(),
            length,
            "mapped segment table"
        );
        Ok(Self::new(segments, length))
    }

    /// Returns the segment containing `position`.
    ///
    /// # Panics
    ///
    /// Panics if `position >= length`.
    #[must_use]
    pub fn floor(&self, position: u64) -> &Segment {
        assert!(
            position < self.length,
            "position {position} out of range for length {}",
            self.length
        );
        let idx = self.segments.partition_point(|s| s.offset <= position);
        &self.segments[idx - 1]
    }

    /// Returns the covered length.
    #[must_use]
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Returns the number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns whether the table has no segments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the number of segments with a mapped view.
    #[must_use]
    pub fn mapped_count(&self) -> usize {
        self.segments.iter().filter(|s| s.is_mapped()).count()
    }

    /// Iterates over segments in file order.
    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    pub(crate) fn into_segments(self) -> Vec<Segment> {
        self.segments
    }
}

impl<'a> IntoIterator for &'a SegmentTable {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}
