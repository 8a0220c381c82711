//! Verify command implementation.

use super::OpenOptions;
use segfile_core::DataFile;
use std::path::Path;

/// Verification result.
#[derive(Debug)]
pub struct VerifyResult {
    /// Number of rows checked.
    pub rows_checked: usize,
    /// Number of cells read.
    pub cells_read: usize,
    /// Number of rows that failed to read.
    pub corrupt_rows: usize,
    /// List of errors found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn new() -> Self {
        Self {
            rows_checked: 0,
            cells_read: 0,
            corrupt_rows: 0,
            errors: Vec::new(),
        }
    }

    fn is_ok(&self) -> bool {
        self.corrupt_rows == 0 && self.errors.is_empty()
    }
}

/// Runs the verify command.
pub fn run(path: &Path, options: &OpenOptions) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying data file at {:?}", path);
    println!();

    let data = options.open(path)?;
    let result = verify_rows(&data)?;
    print_result(&result);

    println!();
    if result.is_ok() && !data.is_suspect() {
        println!("✓ Data file verification passed");
        Ok(())
    } else {
        println!("✗ Data file verification failed");
        Err("Verification failed".into())
    }
}

/// Reads every row header and every cell of `data`.
pub fn verify_rows(data: &DataFile) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let mut result = VerifyResult::new();
    let mut end = 0;

    for row in data.rows()? {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                result.errors.push(format!("row header at {end}: {e}"));
                break;
            }
        };
        result.rows_checked += 1;
        end = row.end();

        let reader = match data.slice(row.position, b"") {
            Ok(reader) => reader,
            Err(e) => {
                result.corrupt_rows += 1;
                result.errors.push(format!("row at {}: {e}", row.position));
                continue;
            }
        };
        for cell in reader {
            match cell {
                Ok(_) => result.cells_read += 1,
                Err(e) => {
                    result.corrupt_rows += 1;
                    result.errors.push(format!("row at {}: {e}", row.position));
                }
            }
        }
    }

    if result.errors.is_empty() && end != data.length() {
        result
            .errors
            .push(format!("rows end at {end}, file length is {}", data.length()));
    }
    Ok(result)
}

fn print_result(result: &VerifyResult) {
    println!("  Rows checked: {}", result.rows_checked);
    println!("  Cells read:   {}", result.cells_read);
    println!("  Corrupt rows: {}", result.corrupt_rows);

    if !result.errors.is_empty() {
        println!("  Errors:");
        for (i, error) in result.errors.iter().take(10).enumerate() {
            println!("    {}. {}", i + 1, error);
        }
        if result.errors.len() > 10 {
            println!("    ... and {} more", result.errors.len() - 10);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segfile_core::{BytesComparator, Cell, Config, DataFileWriter, DeletionTime, DiskAccessMode};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn write(path: &Path) {
        let config = Config::new().disk_access_mode(DiskAccessMode::Mmap);
        let mut writer = DataFileWriter::create(path, &config, Arc::new(BytesComparator)).unwrap();
        for key in [&b"k1"[..], b"k2", b"k3"] {
            let cells = [Cell::live(&b"a"[..], &b"1"[..], 1), Cell::live(&b"b"[..], &b"2"[..], 1)];
            writer.append_row(key, DeletionTime::LIVE, &cells).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn clean_file_verifies() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.db");
        write(&path);

        let config = Config::new().disk_access_mode(DiskAccessMode::Mmap);
        let data = DataFile::open(&path, &config, Arc::new(BytesComparator)).unwrap();
        let result = verify_rows(&data).unwrap();
        assert!(result.is_ok());
        assert_eq!(result.rows_checked, 3);
        assert_eq!(result.cells_read, 6);
    }

    #[test]
    fn truncated_file_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.db");
        write(&path);

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();
        std::fs::remove_file(segfile_core::bounds_path(&path)).unwrap();

        let config = Config::new().disk_access_mode(DiskAccessMode::Standard);
        let data = DataFile::open(&path, &config, Arc::new(BytesComparator)).unwrap();
        let result = verify_rows(&data).unwrap();
        assert!(!result.is_ok());
    }
}
