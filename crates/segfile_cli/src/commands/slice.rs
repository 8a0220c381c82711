//! Slice command implementation.

use super::{render_name, OpenOptions};
use segfile_core::{Cell, CellKind};
use serde::Serialize;
use std::path::Path;

/// One cell as printed by the slice command.
#[derive(Debug, Serialize)]
pub struct CellOutput {
    /// Rendered cell name.
    pub name: String,
    /// Cell kind (live, tombstone, expiring).
    pub kind: &'static str,
    /// Write timestamp.
    pub timestamp: i64,
    /// Value size in bytes.
    pub value_size: usize,
}

/// Row slice output.
#[derive(Debug, Serialize)]
pub struct SliceOutput {
    /// Row offset.
    pub position: u64,
    /// Whether the row carries a deletion marker.
    pub deleted: bool,
    /// Row deletion timestamp.
    pub marked_for_delete_at: i64,
    /// Cells up to the stop bound.
    pub cells: Vec<CellOutput>,
}

/// Runs the slice command.
pub fn run(
    path: &Path,
    options: &OpenOptions,
    position: u64,
    finish: Option<&str>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = options.open(path)?;
    let finish = match finish {
        Some(name) => parse_name(name, &options.comparator)?,
        None => Vec::new(),
    };

    let reader = data.slice(position, &finish)?;
    let deletion = reader.column_family().deletion_info();
    let mut output = SliceOutput {
        position,
        deleted: reader.column_family().is_marked_for_delete(),
        marked_for_delete_at: deletion.marked_for_delete_at,
        cells: Vec::new(),
    };
    for cell in reader {
        output.cells.push(describe(&cell?, &options.comparator));
    }

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&output)?),
        _ => {
            println!("Row at {}", output.position);
            if output.deleted {
                println!("  deleted at {}", output.marked_for_delete_at);
            }
            for cell in &output.cells {
                println!(
                    "  {} [{}] ts={} ({} bytes)",
                    cell.name, cell.kind, cell.timestamp, cell.value_size
                );
            }
            println!("{} cells", output.cells.len());
        }
    }
    Ok(())
}

/// Parses a stop bound given on the command line.
fn parse_name(name: &str, comparator: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    if comparator == "long" {
        let value: i64 = name.parse()?;
        return Ok(value.to_be_bytes().to_vec());
    }
    Ok(name.as_bytes().to_vec())
}

fn describe(cell: &Cell, comparator: &str) -> CellOutput {
    let kind = match cell.kind() {
        CellKind::Live => "live",
        CellKind::Tombstone { .. } => "tombstone",
        CellKind::Expiring { .. } => "expiring",
    };
    CellOutput {
        name: render_name(cell.name(), comparator),
        kind,
        timestamp: cell.timestamp(),
        value_size: cell.value().len(),
    }
}
