//! Stress tests for SegFile.
//!
//! These helpers hammer one data file with slice reads, sequentially or from
//! several threads each holding its own shared copy.

use crate::fixtures::TestDataFile;
use segfile_core::DataFile;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of slice reads to perform.
    pub operations: usize,
    /// Number of concurrent threads (for concurrent tests).
    pub threads: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
        }
    }
}

/// Reads row `i % rows` in full and checks its cell count.
fn read_row(data: &DataFile, fixture: &TestDataFile, i: usize) -> bool {
    let row = i % fixture.index().len();
    let Ok(reader) = data.slice(fixture.index()[row].position, b"") else {
        return false;
    };
    let mut cells = 0;
    for cell in reader {
        if cell.is_err() {
            return false;
        }
        cells += 1;
    }
    cells == fixture.rows()[row].cells.len()
}

/// Run a sequential slice stress test.
pub fn stress_sequential_slices(fixture: &TestDataFile, config: &StressConfig) -> StressTestResult {
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        if read_row(fixture.data(), fixture, i) {
            successful += 1;
        } else {
            failed += 1;
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Run a concurrent slice stress test; each thread reads through its own
/// shared copy and closes it when done.
pub fn stress_concurrent_slices(fixture: &TestDataFile, config: &StressConfig) -> StressTestResult {
    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let ops_per_thread = config.operations / config.threads.max(1);

    let start = Instant::now();
    thread::scope(|scope| {
        for t in 0..config.threads {
            let mut data = fixture.data().shared_copy();
            let successful = &successful;
            let failed = &failed;
            scope.spawn(move || {
                for i in 0..ops_per_thread {
                    if read_row(&data, fixture, t * ops_per_thread + i) {
                        successful.fetch_add(1, Ordering::Relaxed);
                    } else {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
                data.close();
            });
        }
    });

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}
