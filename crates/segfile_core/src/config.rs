//! Data file configuration and disk access policy.

use crate::error::{CoreError, CoreResult};
use segfile_storage::{DEFAULT_BUFFER_SIZE, MAX_MAPPED_SIZE};
use std::fmt;
use std::str::FromStr;

/// How data and index files are read, as configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DiskAccessMode {
    /// `mmap` on 64-bit targets, `standard` otherwise.
    #[default]
    Auto,
    /// Map both data and index files.
    Mmap,
    /// Map index files only; data files use buffered reads.
    MmapIndexOnly,
    /// Buffered reads everywhere.
    Standard,
}

impl DiskAccessMode {
    /// Returns the configuration name of this mode.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Mmap => "mmap",
            Self::MmapIndexOnly => "mmap_index_only",
            Self::Standard => "standard",
        }
    }
}

impl fmt::Display for DiskAccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiskAccessMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "mmap" => Ok(Self::Mmap),
            "mmap_index_only" => Ok(Self::MmapIndexOnly),
            "standard" => Ok(Self::Standard),
            other => Err(CoreError::invalid_config(format!(
                "disk_access_mode '{other}' must be either 'auto', 'mmap', \
                 'mmap_index_only', or 'standard'"
            ))),
        }
    }
}

/// A resolved, concrete access mode for one kind of file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    /// Segments are memory-mapped.
    Mmap,
    /// Buffered positional reads.
    Standard,
}

impl AccessMode {
    /// Returns the tag persisted in bounds metadata.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Mmap => "mmap",
            Self::Standard => "standard",
        }
    }

    /// Parses a persisted tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "mmap" => Some(Self::Mmap),
            "standard" => Some(Self::Standard),
            _ => None,
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Access modes resolved for data and index files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessModes {
    /// Mode for data files.
    pub data: AccessMode,
    /// Mode for index files.
    pub index: AccessMode,
}

/// Configuration for building and opening data files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Configured disk access mode.
    pub disk_access_mode: DiskAccessMode,

    /// Largest segment that gets a mapped view.
    pub max_segment_size: u64,

    /// Buffer size of fallback readers.
    pub read_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            disk_access_mode: DiskAccessMode::Auto,
            max_segment_size: MAX_MAPPED_SIZE, // 2 GiB - 1
            read_buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the disk access mode.
    #[must_use]
    pub const fn disk_access_mode(mut self, mode: DiskAccessMode) -> Self {
        self.disk_access_mode = mode;
        self
    }

    /// Sets the segment size cap, clamped to the mapping ceiling.
    #[must_use]
    pub const fn max_segment_size(mut self, size: u64) -> Self {
        self.max_segment_size = if size > MAX_MAPPED_SIZE {
            MAX_MAPPED_SIZE
        } else {
            size
        };
        self
    }

    /// Sets the fallback reader buffer size.
    #[must_use]
    pub const fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] for a zero segment cap or buffer.
    pub fn validate(&self) -> CoreResult<()> {
        if self.max_segment_size == 0 || self.max_segment_size > MAX_MAPPED_SIZE {
            return Err(CoreError::invalid_config(format!(
                "max_segment_size must be in 1..={MAX_MAPPED_SIZE}, got {}",
                self.max_segment_size
            )));
        }
        if self.read_buffer_size == 0 {
            return Err(CoreError::invalid_config("read_buffer_size must be positive"));
        }
        Ok(())
    }

    /// Resolves the configured mode into concrete data and index modes.
    #[must_use]
    pub fn resolve_access_modes(&self) -> AccessModes {
        let modes = match self.disk_access_mode {
            DiskAccessMode::Auto => {
                let mode = if cfg!(target_pointer_width = "64") {
                    AccessMode::Mmap
                } else {
                    AccessMode::Standard
                };
                tracing::info!(mode = %mode, "auto DiskAccessMode determined");
                AccessModes {
                    data: mode,
                    index: mode,
                }
            }
            DiskAccessMode::Mmap => AccessModes {
                data: AccessMode::Mmap,
                index: AccessMode::Mmap,
            },
            DiskAccessMode::MmapIndexOnly => AccessModes {
                data: AccessMode::Standard,
                index: AccessMode::Mmap,
            },
            DiskAccessMode::Standard => AccessModes {
                data: AccessMode::Standard,
                index: AccessMode::Standard,
            },
        };
        tracing::debug!(data = %modes.data, index = %modes.index, "resolved disk access modes");
        modes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.disk_access_mode, DiskAccessMode::Auto);
        assert_eq!(config.max_segment_size, MAX_MAPPED_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .disk_access_mode(DiskAccessMode::Standard)
            .max_segment_size(1024)
            .read_buffer_size(512);

        assert_eq!(config.disk_access_mode, DiskAccessMode::Standard);
        assert_eq!(config.max_segment_size, 1024);
        assert_eq!(config.read_buffer_size, 512);
    }

    #[test]
    fn segment_cap_is_clamped() {
        let config = Config::new().max_segment_size(u64::MAX);
        assert_eq!(config.max_segment_size, MAX_MAPPED_SIZE);
    }

    #[test]
    fn zero_values_are_rejected() {
        assert!(Config::new().max_segment_size(0).validate().is_err());
        assert!(Config::new().read_buffer_size(0).validate().is_err());
    }

    #[test]
    fn parse_modes() {
        assert_eq!("auto".parse::<DiskAccessMode>().unwrap(), DiskAccessMode::Auto);
        assert_eq!(" MMAP ".parse::<DiskAccessMode>().unwrap(), DiskAccessMode::Mmap);
        assert_eq!(
            "mmap_index_only".parse::<DiskAccessMode>().unwrap(),
            DiskAccessMode::MmapIndexOnly
        );
        let err = "mapped".parse::<DiskAccessMode>().unwrap_err();
        assert!(err.to_string().contains("must be either"));
    }

    #[test]
    fn display_round_trips() {
        for mode in [
            DiskAccessMode::Auto,
            DiskAccessMode::Mmap,
            DiskAccessMode::MmapIndexOnly,
            DiskAccessMode::Standard,
        ] {
            assert_eq!(mode.to_string().parse::<DiskAccessMode>().unwrap(), mode);
        }
    }

    #[test]
    fn resolve_explicit_modes() {
        let modes = Config::new()
            .disk_access_mode(DiskAccessMode::MmapIndexOnly)
            .resolve_access_modes();
        assert_eq!(modes.data, AccessMode::Standard);
        assert_eq!(modes.index, AccessMode::Mmap);

        let modes = Config::new()
            .disk_access_mode(DiskAccessMode::Standard)
            .resolve_access_modes();
        assert_eq!(modes.data, AccessMode::Standard);
        assert_eq!(modes.index, AccessMode::Standard);
    }

    #[test]
    fn resolve_auto_follows_pointer_width() {
        let modes = Config::new().resolve_access_modes();
        let expected = if cfg!(target_pointer_width = "64") {
            AccessMode::Mmap
        } else {
            AccessMode::Standard
        };
        assert_eq!(modes.data, expected);
        assert_eq!(modes.index, expected);
    }

    #[test]
    fn tags() {
        assert_eq!(AccessMode::from_tag("mmap"), Some(AccessMode::Mmap));
        assert_eq!(AccessMode::from_tag("standard"), Some(AccessMode::Standard));
        assert_eq!(AccessMode::from_tag("auto"), None);
    }
}
