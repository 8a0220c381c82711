//! CLI command implementations.

pub mod inspect;
pub mod slice;
pub mod verify;

use segfile_core::{comparator_by_name, CellNameComparator, Config, DataFile};
use std::path::Path;
use std::sync::Arc;

/// Options shared by every command that opens a data file.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Resolved configuration.
    pub config: Config,
    /// Cell name comparator name.
    pub comparator: String,
}

impl OpenOptions {
    /// Looks up the configured comparator.
    pub fn comparator(&self) -> Result<Arc<dyn CellNameComparator>, Box<dyn std::error::Error>> {
        comparator_by_name(&self.comparator)
            .ok_or_else(|| format!("unknown comparator '{}' (expected bytes or long)", self.comparator).into())
    }

    /// Opens the data file at `path`.
    pub fn open(&self, path: &Path) -> Result<DataFile, Box<dyn std::error::Error>> {
        if !path.exists() {
            return Err(format!("No data file found at {}", path.display()).into());
        }
        Ok(DataFile::open(path, &self.config, self.comparator()?)?)
    }
}

/// Renders a cell name or key for display.
///
/// 8-byte names under the `long` comparator print as integers; printable
/// UTF-8 prints as text; anything else prints as hex.
pub fn render_name(name: &[u8], comparator: &str) -> String {
    if comparator == "long" {
        if let Ok(bytes) = <[u8; 8]>::try_from(name) {
            return i64::from_be_bytes(bytes).to_string();
        }
    }
    match std::str::from_utf8(name) {
        Ok(text) if text.chars().all(|c| !c.is_control()) => text.to_string(),
        _ => format!("0x{}", name.iter().map(|b| format!("{b:02x}")).collect::<String>()),
    }
}

/// Formats a byte count for humans.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{}", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
