//! Inspect command implementation.

use super::{format_size, render_name, OpenOptions};
use segfile_core::segment::plan_windows;
use segfile_core::{bounds_path, AccessMode, BoundaryPlanner, SegmentBuilder};
use segfile_storage::DataInputExt;
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Data file inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Data file path.
    pub path: String,
    /// Logical length in bytes.
    pub length: u64,
    /// Access mode the data file is opened with.
    pub access_mode: String,
    /// Bounds sidecar details, if the sidecar exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<BoundsInfo>,
    /// Number of rows.
    pub row_count: usize,
    /// Row positions (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<RowInfo>>,
}

/// Persisted bounds and the segments they produce.
#[derive(Debug, Serialize)]
pub struct BoundsInfo {
    /// Access mode tag stored in the sidecar.
    pub tag: String,
    /// Number of persisted boundaries.
    pub boundary_count: usize,
    /// Planned segments (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<SegmentInfo>>,
}

/// One planned segment.
#[derive(Debug, Serialize)]
pub struct SegmentInfo {
    /// First byte of the segment.
    pub offset: u64,
    /// Segment size in bytes.
    pub size: u64,
    /// Whether the segment fits in one mapping.
    pub mapped: bool,
}

/// One row of the data file.
#[derive(Debug, Serialize)]
pub struct RowInfo {
    /// Rendered partition key.
    pub key: String,
    /// Absolute offset of the row.
    pub position: u64,
    /// Serialized row size.
    pub size: u64,
}

/// Runs the inspect command.
pub fn run(
    path: &Path,
    options: &OpenOptions,
    show_segments: bool,
    show_rows: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = options.open(path)?;
    let length = data.length();

    let mut result = InspectResult {
        path: path.display().to_string(),
        length,
        access_mode: options.config.resolve_access_modes().data.to_string(),
        bounds: None,
        row_count: 0,
        rows: None,
    };

    let sidecar = bounds_path(path);
    if sidecar.exists() {
        result.bounds = Some(read_bounds(&sidecar, options, length, show_segments)?);
    }

    let mut rows = Vec::new();
    for row in data.rows()? {
        let row = row?;
        result.row_count += 1;
        if show_rows {
            rows.push(RowInfo {
                key: render_name(&row.header.key, "bytes"),
                position: row.position,
                size: row.header.row_size(),
            });
        }
    }
    if show_rows {
        result.rows = Some(rows);
    }

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn read_bounds(
    sidecar: &Path,
    options: &OpenOptions,
    length: u64,
    show_segments: bool,
) -> Result<BoundsInfo, Box<dyn std::error::Error>> {
    let tag = BufReader::new(File::open(sidecar)?).read_utf()?;
    let mode = AccessMode::from_tag(&tag)
        .ok_or_else(|| format!("unknown access mode tag '{tag}' in {}", sidecar.display()))?;

    let mut builder = SegmentBuilder::for_mode(mode, &options.config);
    builder.load_bounds(sidecar)?;
    let boundary_count = builder.boundaries().len();

    let segments = (show_segments && mode == AccessMode::Mmap).then(|| {
        let cap = options.config.max_segment_size;
        let mut planner = BoundaryPlanner::from_boundaries(builder.boundaries().to_vec(), cap);
        plan_windows(&planner.finish(length))
            .into_iter()
            .map(|w| SegmentInfo {
                offset: w.start,
                size: w.len(),
                mapped: w.is_mappable(cap),
            })
            .collect()
    });

    Ok(BoundsInfo {
        tag,
        boundary_count,
        segments,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("SegFile Data File Inspection");
    println!("============================");
    println!();
    println!("Path:        {}", result.path);
    println!("Length:      {} bytes", format_size(result.length));
    println!("Access mode: {}", result.access_mode);
    println!("Rows:        {}", result.row_count);

    match &result.bounds {
        Some(bounds) => {
            println!();
            println!("Bounds:");
            println!("  Tag:        {}", bounds.tag);
            println!("  Boundaries: {}", bounds.boundary_count);
            if let Some(segments) = &bounds.segments {
                println!();
                println!("Segments:");
                for (i, seg) in segments.iter().enumerate() {
                    println!(
                        "  [{}] offset {}, {} bytes, {}",
                        i,
                        seg.offset,
                        format_size(seg.size),
                        if seg.mapped { "mapped" } else { "buffered" }
                    );
                }
            }
        }
        None => {
            println!();
            println!("Bounds sidecar not found (boundaries rebuilt by scanning)");
        }
    }

    if let Some(rows) = &result.rows {
        println!();
        println!("Rows:");
        for row in rows {
            println!("  {} @ {} ({} bytes)", row.key, row.position, row.size);
        }
    }
}
