//! Archive fixtures.
//!
//! Every fixture writes into its own temporary directory, which is removed
//! when the fixture is dropped.

use logvault_catalog::{ArchiveRecord, InMemoryCatalog, MetadataCatalog};
use logvault_core::{ArchiveConfig, ArchiveReader, ArchiveWriter, ParsedRecord, WriterState};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Input for one logical file: its path and records.
pub type InputFile = (String, Vec<ParsedRecord>);

/// A finalized archive in a temporary directory.
pub struct TestArchive {
    /// Catalog row returned by finalization.
    pub record: ArchiveRecord,
    /// Shared catalog the archive was committed to.
    pub catalog: Arc<InMemoryCatalog>,
    /// Files as they were ingested.
    pub input: Vec<InputFile>,
    /// Records accepted by the writer.
    pub messages: usize,
    root: PathBuf,
    _temp_dir: TempDir,
}

impl TestArchive {
    /// Archive root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Opens a reader over the archive.
    pub fn reader(&self) -> ArchiveReader {
        ArchiveReader::open(&self.root).expect("Failed to open archive")
    }

    /// Number of segments written.
    pub fn segment_count(&self) -> usize {
        self.reader().segment_ids().len()
    }
}

/// A temporary directory that archives can be created under.
pub struct TempArchiveRoot {
    temp_dir: TempDir,
}

impl TempArchiveRoot {
    /// Creates a fresh temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Path for the archive named `name`.
    pub fn archive_path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Path of a shared catalog database in this directory.
    pub fn catalog_path(&self) -> PathBuf {
        self.temp_dir.path().join("catalog.db")
    }
}

impl Default for TempArchiveRoot {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic records for a file: `count` messages cycling through a few
/// templates, timestamps starting at `base` in steps of 10.
pub fn sample_records(base: i64, count: usize) -> Vec<ParsedRecord> {
    (0..count)
        .map(|i| {
            let ts = base + 10 * i as i64;
            match i % 3 {
                0 => ParsedRecord::from_template(
                    ts,
                    "request {} took {} ms",
                    [format!("/api/{}", i % 5), (i * 7).to_string()],
                ),
                1 => ParsedRecord::from_template(
                    ts,
                    "user {} logged in",
                    [format!("user{}", i % 4)],
                ),
                _ => ParsedRecord::from_template(ts, "heartbeat", Vec::<String>::new()),
            }
        })
        .collect()
}

/// Writes `files` into a new archive at `root` and finalizes it.
///
/// If ingestion reaches the configured archive size target the writer
/// finalizes on its own and later files are not ingested.
pub fn write_archive_at(
    root: &Path,
    config: ArchiveConfig,
    catalog: Arc<InMemoryCatalog>,
    files: &[InputFile],
) -> (ArchiveRecord, usize) {
    let mut writer = ArchiveWriter::create(root, config, catalog.clone() as Arc<dyn MetadataCatalog>)
        .expect("Failed to create archive");
    let mut messages = 0usize;
    for (path, records) in files {
        let report = writer
            .ingest(path, records.clone())
            .expect("Failed to ingest file");
        messages += report.messages as usize;
        if let Some(err) = report.finalize_error {
            panic!("Failed to finalize archive: {err}");
        }
        if let Some(record) = report.finalized {
            return (record, messages);
        }
    }
    assert_ne!(writer.state(), WriterState::Closed);
    let record = writer.finalize().expect("Failed to finalize archive");
    (record, messages)
}

/// Writes `files` into a new archive in a temporary directory.
pub fn write_archive(config: ArchiveConfig, files: Vec<InputFile>) -> TestArchive {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let root = temp_dir.path().join("archive");
    let catalog = Arc::new(InMemoryCatalog::new());
    let (record, messages) = write_archive_at(&root, config, catalog.clone(), &files);
    TestArchive {
        record,
        catalog,
        input: files,
        messages,
        root,
        _temp_dir: temp_dir,
    }
}

/// Three files of ten messages each, written with 200-byte segments so the
/// archive spans several segments and some files are split.
pub fn sample_archive() -> TestArchive {
    let files = (0..3)
        .map(|i| (format!("/var/log/app{i}.log"), sample_records(1_000 * i, 10)))
        .collect();
    write_archive(ArchiveConfig::new().target_segment_size(200), files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_records_are_valid() {
        for record in sample_records(0, 9) {
            record.validate().unwrap();
        }
    }

    #[test]
    fn sample_archive_spans_segments() {
        let archive = sample_archive();
        assert_eq!(archive.messages, 30);
        assert!(archive.segment_count() > 1);
        assert_eq!(
            archive.catalog.files_in_archive(&archive.record.id).unwrap().len(),
            archive.reader().files().len()
        );
    }

    #[test]
    fn temp_root_paths() {
        let root = TempArchiveRoot::new();
        assert!(root.archive_path("a").ends_with("a"));
        assert!(root.catalog_path().ends_with("catalog.db"));
    }
}
