//! Write-time construction of segmented files.
//!
//! A [`SegmentBuilder`] is created once per data file being written, for the
//! resolved access mode of that file. The writer offers every row end as a
//! potential boundary; on completion the builder opens the finished file as
//! the matching [`SegmentedFile`] variant.
//!
//! ## Bounds metadata
//!
//! ```text
//! | tag_len (2) | tag (tag_len, utf8) | count (4) | boundary (8) × count |
//! ```
//!
//! The tag is the access mode the bounds were planned for. Buffered builders
//! record no boundaries and write a count of 0.

use crate::config::{AccessMode, Config};
use crate::error::{CoreError, CoreResult};
use crate::file::{BufferedSegmentedFile, MmappedSegmentedFile, SegmentedFile};
use crate::segment::{BoundaryPlanner, SegmentTable};
use segfile_storage::{ChannelProxy, DataInputExt, DataOutputExt};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Upper bound on boundaries preallocated while decoding metadata.
const PREALLOCATE_BOUNDARIES: usize = 4096;

/// Accumulates boundaries and opens the finished data file.
#[derive(Debug)]
pub struct SegmentBuilder {
    mode: AccessMode,
    planner: Option<BoundaryPlanner>,
    read_buffer_size: usize,
    channel: Option<ChannelProxy>,
}

impl SegmentBuilder {
    /// Creates a builder for an explicit access mode.
    #[must_use]
    pub fn for_mode(mode: AccessMode, config: &Config) -> Self {
        let planner = match mode {
            AccessMode::Mmap => Some(BoundaryPlanner::new(config.max_segment_size)),
            AccessMode::Standard => None,
        };
        Self {
            mode,
            planner,
            read_buffer_size: config.read_buffer_size,
            channel: None,
        }
    }

    /// Creates a builder for data files under `config`.
    #[must_use]
    pub fn data(config: &Config) -> Self {
        Self::for_mode(config.resolve_access_modes().data, config)
    }

    /// Creates a builder for index files under `config`.
    #[must_use]
    pub fn index(config: &Config) -> Self {
        Self::for_mode(config.resolve_access_modes().index, config)
    }

    /// Returns the access mode this builder produces.
    #[must_use]
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Returns the boundaries committed so far. Always empty for buffered builders.
    #[must_use]
    pub fn boundaries(&self) -> &[u64] {
        match &self.planner {
            Some(planner) => planner.boundaries(),
            None => &[],
        }
    }

    /// Offers a position where a segment may end.
    pub fn add_potential_boundary(&mut self, boundary: u64) {
        if let Some(planner) = &mut self.planner {
            planner.add_potential_boundary(boundary);
        }
    }

    /// Opens the finished file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or mapped.
    pub fn complete(&mut self, path: &Path) -> CoreResult<Box<dyn SegmentedFile>> {
        self.complete_with(path, true)
    }

    /// Opens `path` at its current size, as a final or intermediate file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or mapped.
    pub fn complete_with(&mut self, path: &Path, is_final: bool) -> CoreResult<Box<dyn SegmentedFile>> {
        let channel = self.channel_for(path)?;
        self.complete_channel(channel, None, is_final)
    }

    /// Opens the first `override_length` bytes of a file still being written.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or mapped.
    pub fn complete_early(
        &mut self,
        path: &Path,
        override_length: u64,
    ) -> CoreResult<Box<dyn SegmentedFile>> {
        let channel = self.channel_for(path)?;
        self.complete_channel(channel, Some(override_length), false)
    }

    /// Opens a segmented file over `channel`, taking ownership of it.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be read or a mapping fails.
    ///
    /// # Panics
    ///
    /// Panics if `is_final` is combined with an override length.
    pub fn complete_channel(
        &mut self,
        channel: ChannelProxy,
        override_length: Option<u64>,
        is_final: bool,
    ) -> CoreResult<Box<dyn SegmentedFile>> {
        assert!(
            !is_final || override_length.is_none(),
            "a final file cannot be opened with an override length"
        );
        let length = match override_length {
            Some(length) => length,
            None => channel.size()?,
        };

        let file: Box<dyn SegmentedFile> = match &mut self.planner {
            Some(planner) => {
                let boundaries = planner.finish(length);
                let table = SegmentTable::map(&channel, &boundaries, planner.max_segment_size())?;
                Box::new(MmappedSegmentedFile::new(channel, length, table, self.read_buffer_size))
            }
            None => Box::new(BufferedSegmentedFile::new(channel, length, self.read_buffer_size)),
        };

        tracing::debug!(file = %file, is_final, early = override_length.is_some(), "completed segmented file");
        Ok(file)
    }

    /// Writes the bounds metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn serialize_bounds<W: Write + ?Sized>(&self, out: &mut W) -> CoreResult<()> {
        let boundaries = self.boundaries();
        let count = u32::try_from(boundaries.len())
            .map_err(|_| CoreError::invalid_operation("too many boundaries to persist"))?;

        out.write_utf(self.mode.tag())?;
        out.write_u32(count)?;
        for &boundary in boundaries {
            out.write_u64(boundary)?;
        }
        Ok(())
    }

    /// Restores boundaries from metadata written by [`Self::serialize_bounds`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AccessModeMismatch`] if the metadata was written for
    /// another access mode, and [`CoreError::InvalidFormat`] if it is malformed.
    pub fn deserialize_bounds<R: Read + ?Sized>(&mut self, input: &mut R) -> CoreResult<()> {
        let tag = input.read_utf()?;
        if tag != self.mode.tag() {
            return Err(CoreError::AccessModeMismatch {
                persisted: tag,
                configured: self.mode,
            });
        }

        let count = input.read_u32()? as usize;
        let mut boundaries = Vec::with_capacity(count.min(PREALLOCATE_BOUNDARIES));
        for _ in 0..count {
            boundaries.push(input.read_u64()?);
        }

        if let Some(&first) = boundaries.first() {
            if first != 0 {
                return Err(CoreError::invalid_format(format!(
                    "first boundary must be 0, found {first}"
                )));
            }
        }
        if boundaries.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(CoreError::invalid_format("boundaries are not strictly increasing"));
        }

        if let Some(planner) = &mut self.planner {
            *planner = BoundaryPlanner::from_boundaries(boundaries, planner.max_segment_size());
        }
        Ok(())
    }

    /// Writes the bounds metadata to a sidecar file and syncs it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_bounds(&self, path: &Path) -> CoreResult<()> {
        let mut out = BufWriter::new(File::create(path)?);
        self.serialize_bounds(&mut out)?;
        let file = out.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        tracing::debug!(path = %path.display(), boundaries = self.boundaries().len(), "saved bounds");
        Ok(())
    }

    /// Restores boundaries from a sidecar file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not match.
    pub fn load_bounds(&mut self, path: &Path) -> CoreResult<()> {
        let mut input = BufReader::new(File::open(path)?);
        self.deserialize_bounds(&mut input)
    }

    /// Releases the cached channel, if any.
    pub fn close(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
    }

    fn channel_for(&mut self, path: &Path) -> CoreResult<ChannelProxy> {
        if let Some(channel) = &self.channel {
            if channel.path() == path {
                return Ok(channel.shared_copy());
            }
        }
        self.close();
        let channel = ChannelProxy::open(path)?;
        let copy = channel.shared_copy();
        self.channel = Some(channel);
        Ok(copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiskAccessMode;
    use std::io::{Cursor, Read as _};
    use tempfile::tempdir;

    fn mmap_config(cap: u64) -> Config {
        Config::new()
            .disk_access_mode(DiskAccessMode::Mmap)
            .max_segment_size(cap)
    }

    fn write_file(dir: &Path, len: usize) -> std::path::PathBuf {
        let path = dir.join("data.db");
        let data: Vec<u8> = (0..len).map(|i| (i % 256) as u8).collect();
        std::fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn mode_follows_config() {
        let config = Config::new().disk_access_mode(DiskAccessMode::MmapIndexOnly);
        assert_eq!(SegmentBuilder::data(&config).mode(), AccessMode::Standard);
        assert_eq!(SegmentBuilder::index(&config).mode(), AccessMode::Mmap);
    }

    #[test]
    fn complete_mapped_file() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), 100);
        let mut builder = SegmentBuilder::data(&mmap_config(40));
        for end in [30, 60, 100] {
            builder.add_potential_boundary(end);
        }

        let file = builder.complete(&path).unwrap();
        assert_eq!(file.length(), 100);
        assert!(file.to_string().starts_with("MmappedSegmentedFile"));

        let starts: Vec<u64> = file.iter_from(0).map(|i| i.unwrap().position()).collect();
        assert_eq!(starts, vec![0, 30, 60]);
    }

    #[test]
    fn complete_buffered_file() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), 64);
        let config = Config::new().disk_access_mode(DiskAccessMode::Standard);
        let mut builder = SegmentBuilder::data(&config);
        builder.add_potential_boundary(32);
        assert!(builder.boundaries().is_empty());

        let file = builder.complete(&path).unwrap();
        assert!(file.to_string().starts_with("BufferedSegmentedFile"));
        assert_eq!(file.get_segment(10).unwrap().bytes_remaining(), 54);
    }

    #[test]
    fn complete_early_uses_override_length() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), 100);
        let mut builder = SegmentBuilder::data(&mmap_config(40));
        for end in [30, 60, 100] {
            builder.add_potential_boundary(end);
        }

        let early = builder.complete_early(&path, 50).unwrap();
        assert_eq!(early.length(), 50);
        let mut tail = Vec::new();
        early.get_segment(30).unwrap().read_to_end(&mut tail).unwrap();
        assert_eq!(tail.len(), 20);
    }

    #[test]
    #[should_panic(expected = "override length")]
    fn final_with_override_panics() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), 10);
        let mut builder = SegmentBuilder::data(&mmap_config(40));
        let channel = ChannelProxy::open(&path).unwrap();
        let _ = builder.complete_channel(channel, Some(5), true);
    }

    #[test]
    fn channel_is_reused_for_same_path() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), 10);
        let mut builder = SegmentBuilder::data(&mmap_config(40));

        let mut first = builder.complete_early(&path, 5).unwrap();
        let mut second = builder.complete(&path).unwrap();
        let cached = builder.channel.as_ref().unwrap();
        assert_eq!(cached.ref_count(), 3);

        first.close();
        second.close();
        builder.close();
        assert!(builder.channel.is_none());
    }

    #[test]
    fn bounds_round_trip() {
        let config = mmap_config(100);
        let mut builder = SegmentBuilder::data(&config);
        for end in [60, 90, 150, 200, 260] {
            builder.add_potential_boundary(end);
        }

        let mut bytes = Vec::new();
        builder.serialize_bounds(&mut bytes).unwrap();

        let mut restored = SegmentBuilder::data(&config);
        restored.deserialize_bounds(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(restored.boundaries(), builder.boundaries());
    }

    #[test]
    fn buffered_bounds_are_tag_and_zero_count() {
        let config = Config::new().disk_access_mode(DiskAccessMode::Standard);
        let mut bytes = Vec::new();
        SegmentBuilder::data(&config).serialize_bounds(&mut bytes).unwrap();

        let mut expected = Vec::new();
        expected.write_utf("standard").unwrap();
        expected.write_u32(0).unwrap();
        assert_eq!(bytes, expected);
    }

    #[test]
    fn mismatched_tag_is_rejected() {
        let mut bytes = Vec::new();
        SegmentBuilder::data(&Config::new().disk_access_mode(DiskAccessMode::Standard))
            .serialize_bounds(&mut bytes)
            .unwrap();

        let mut builder = SegmentBuilder::data(&mmap_config(100));
        let err = builder.deserialize_bounds(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::AccessModeMismatch { ref persisted, configured: AccessMode::Mmap } if persisted == "standard"
        ));
    }

    #[test]
    fn unordered_boundaries_are_rejected() {
        let mut bytes = Vec::new();
        bytes.write_utf("mmap").unwrap();
        bytes.write_u32(3).unwrap();
        for b in [0u64, 50, 20] {
            bytes.write_u64(b).unwrap();
        }
        let mut builder = SegmentBuilder::data(&mmap_config(100));
        let err = builder.deserialize_bounds(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidFormat { .. }));
    }

    #[test]
    fn truncated_bounds_fail() {
        let mut bytes = Vec::new();
        bytes.write_utf("mmap").unwrap();
        bytes.write_u32(4).unwrap();
        bytes.write_u64(0).unwrap();
        let mut builder = SegmentBuilder::data(&mmap_config(100));
        assert!(matches!(
            builder.deserialize_bounds(&mut Cursor::new(bytes)),
            Err(CoreError::Io(_))
        ));
    }

    #[test]
    fn sidecar_round_trip_reopens_same_table() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), 300);
        let bounds = dir.path().join("data.bounds");
        let config = mmap_config(100);

        let mut builder = SegmentBuilder::data(&config);
        for end in [60, 90, 150, 200, 260, 300] {
            builder.add_potential_boundary(end);
        }
        let written = builder.complete(&path).unwrap();
        builder.save_bounds(&bounds).unwrap();

        let mut reopened = SegmentBuilder::data(&config);
        reopened.load_bounds(&bounds).unwrap();
        let read = reopened.complete(&path).unwrap();

        let starts = |f: &dyn SegmentedFile| -> Vec<u64> {
            f.iter_from(0).map(|i| i.unwrap().position()).collect()
        };
        assert_eq!(starts(written.as_ref()), starts(read.as_ref()));
    }
}
