//! Segmented file backed by memory-mapped segments.

use super::SegmentedFile;
use crate::error::CoreResult;
use crate::segment::SegmentTable;
use segfile_storage::{ChannelProxy, FileDataInput, RandomAccessReader, SharedCloseable, Tidy};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

struct MmapShared {
    channel: ChannelProxy,
    path: Arc<Path>,
    length: u64,
    on_disk_length: u64,
    segments: SegmentTable,
    read_buffer_size: usize,
}

impl Tidy for MmapShared {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn tidy(self) {
        let MmapShared {
            mut channel,
            path,
            segments,
            ..
        } = self;

        let mut unmapped = 0usize;
        let mut deferred = 0usize;
        for view in segments.into_segments().into_iter().filter_map(|s| s.into_view()) {
            if view.unmap() {
                unmapped += 1;
            } else {
                deferred += 1;
            }
        }
        channel.close();

        if deferred == 0 {
            tracing::debug!(path = %path.display(), unmapped, "unmapped all segments");
        } else {
            tracing::warn!(
                path = %path.display(),
                unmapped,
                deferred,
                "segments still referenced by open inputs; unmap deferred until they drop"
            );
        }
    }
}

/// A data file whose segments are served from memory mappings.
///
/// Segments too large to map are read through a private
/// [`RandomAccessReader`] opened per call.
pub struct MmappedSegmentedFile {
    handle: SharedCloseable<MmapShared>,
}

impl MmappedSegmentedFile {
    /// Takes ownership of `channel` and the mapped `segments`.
    #[must_use]
    pub fn new(
        channel: ChannelProxy,
        length: u64,
        segments: SegmentTable,
        read_buffer_size: usize,
    ) -> Self {
        let path = channel.shared_path();
        Self {
            handle: SharedCloseable::new(MmapShared {
                channel,
                path,
                length,
                on_disk_length: length,
                segments,
                read_buffer_size,
            }),
        }
    }

    /// Returns the segment table.
    ///
    /// # Panics
    ///
    /// Panics if this handle is closed.
    #[must_use]
    pub fn segments(&self) -> &SegmentTable {
        &self.handle.get().segments
    }
}

impl SegmentedFile for MmappedSegmentedFile {
    fn path(&self) -> &Path {
        &self.handle.get().path
    }

    fn length(&self) -> u64 {
        self.handle.get().length
    }

    fn on_disk_length(&self) -> u64 {
        self.handle.get().on_disk_length
    }

    fn get_segment(&self, position: u64) -> CoreResult<Box<dyn FileDataInput>> {
        let shared = self.handle.get();
        let segment = shared.segments.floor(position);

        match segment.view() {
            Some(view) => Ok(Box::new(view.input(Arc::clone(&shared.path), position)?)),
            None => {
                let mut reader = RandomAccessReader::open_with_length(
                    &shared.channel,
                    shared.length,
                    shared.read_buffer_size,
                );
                reader.seek(position)?;
                Ok(Box::new(reader))
            }
        }
    }

    fn create_reader(&self) -> CoreResult<RandomAccessReader> {
        let shared = self.handle.get();
        Ok(RandomAccessReader::open_with_length(
            &shared.channel,
            shared.length,
            shared.read_buffer_size,
        ))
    }

    fn shared_copy(&self) -> Box<dyn SegmentedFile> {
        Box::new(Self {
            handle: self.handle.shared_copy(),
        })
    }

    fn close(&mut self) -> bool {
        self.handle.close()
    }

    fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    fn ref_count(&self) -> usize {
        self.handle.ref_count()
    }

    fn drop_page_cache(&self, before: u64) {
        if let Some(shared) = self.handle.try_get() {
            shared.channel.drop_page_cache(before);
        }
    }
}

impl fmt::Display for MmappedSegmentedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.handle.try_get() {
            Some(shared) => write!(
                f,
                "MmappedSegmentedFile(path='{}', length={})",
                shared.path.display(),
                shared.length
            ),
            None => f.write_str("MmappedSegmentedFile(closed)"),
        }
    }
}

impl fmt::Debug for MmappedSegmentedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("MmappedSegmentedFile");
        if let Some(shared) = self.handle.try_get() {
            s.field("path", &shared.path)
                .field("length", &shared.length)
                .field("segments", &shared.segments.len());
        }
        s.field("ref_count", &self.ref_count()).finish()
    }
}
