//! Stress helpers for concurrent archive writers.
//!
//! Writers never share an archive, but they do share a catalog. These
//! helpers run several writers in parallel against one catalog and report
//! how the catalog fared.

use crate::fixtures::sample_records;
use logvault_catalog::MetadataCatalog;
use logvault_core::{ArchiveConfig, ArchiveWriter};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Archives finalized.
    pub archives: usize,
    /// Writers that failed.
    pub failed: usize,
    /// Messages ingested across all writers.
    pub messages: usize,
    /// Total duration.
    pub duration: Duration,
    /// Messages per second.
    pub messages_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(archives: usize, failed: usize, messages: usize, duration: Duration) -> Self {
        let messages_per_second = if duration.as_secs_f64() > 0.0 {
            messages as f64 / duration.as_secs_f64()
        } else {
            0.0
        };
        Self {
            archives,
            failed,
            messages,
            duration,
            messages_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Archives: {}", self.archives);
        println!("Failed: {}", self.failed);
        println!("Messages: {}", self.messages);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} messages/sec", self.messages_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of concurrent writers.
    pub writers: usize,
    /// Files each writer ingests.
    pub files_per_writer: usize,
    /// Messages per file.
    pub messages_per_file: usize,
    /// Segment size target for every writer.
    pub target_segment_size: u64,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            writers: 4,
            files_per_writer: 5,
            messages_per_file: 50,
            target_segment_size: 1024,
        }
    }
}

/// Runs `config.writers` writers in parallel, each creating its own archive
/// under `root` and committing to `catalog`.
pub fn concurrent_writers(
    root: &Path,
    catalog: Arc<dyn MetadataCatalog>,
    config: &StressConfig,
) -> StressTestResult {
    let archives = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let messages = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let handles: Vec<_> = (0..config.writers)
        .map(|w| {
            let root = root.join(format!("writer{w}"));
            let catalog = Arc::clone(&catalog);
            let archives = Arc::clone(&archives);
            let failed = Arc::clone(&failed);
            let messages = Arc::clone(&messages);
            let config = config.clone();
            thread::spawn(move || {
                let archive_config = ArchiveConfig::new()
                    .target_segment_size(config.target_segment_size)
                    .creation_ix(w as u64);
                let mut writer = match ArchiveWriter::create(&root, archive_config, catalog) {
                    Ok(writer) => writer,
                    Err(_) => {
                        failed.fetch_add(1, Ordering::Relaxed);
                        return;
                    }
                };
                for f in 0..config.files_per_writer {
                    let records =
                        sample_records((w * 1_000_000 + f * 10_000) as i64, config.messages_per_file);
                    match writer.ingest(&format!("/w{w}/f{f}.log"), records) {
                        Ok(report) => {
                            messages.fetch_add(report.messages as usize, Ordering::Relaxed);
                        }
                        Err(_) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                            return;
                        }
                    }
                }
                match writer.finalize() {
                    Ok(_) => archives.fetch_add(1, Ordering::Relaxed),
                    Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                };
            })
        })
        .collect();

    for handle in handles {
        if handle.join().is_err() {
            failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    StressTestResult::new(
        archives.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        messages.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TempArchiveRoot;
    use logvault_catalog::InMemoryCatalog;

    #[test]
    fn writers_share_a_catalog() {
        let temp = TempArchiveRoot::new();
        let catalog = Arc::new(InMemoryCatalog::new());
        let config = StressConfig {
            writers: 3,
            files_per_writer: 2,
            messages_per_file: 20,
            ..Default::default()
        };
        let result = concurrent_writers(&temp.archive_path("stress"), catalog.clone(), &config);
        assert_eq!(result.failed, 0);
        assert_eq!(result.archives, 3);
        assert_eq!(result.messages, 120);
        assert_eq!(catalog.list_archives().unwrap().len(), 3);
        assert_eq!(catalog.file_count(), 6);
    }

    #[test]
    fn result_throughput() {
        let result = StressTestResult::new(1, 0, 100, Duration::from_secs(2));
        assert!((result.messages_per_second - 50.0).abs() < f64::EPSILON);
    }
}
