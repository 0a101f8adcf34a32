//! Cross-crate integration test helpers.
//!
//! [`ArchiveHarness`] remembers what was ingested so a finished archive can
//! be checked against it after decoding.

use crate::fixtures::InputFile;
use logvault_catalog::{ArchiveRecord, FileRecord, InMemoryCatalog, MetadataCatalog};
use logvault_core::{ArchiveConfig, ArchiveReader, ArchiveWriter, ParsedRecord};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Tracks ingested input for later verification.
pub struct ArchiveHarness {
    /// The writer under test.
    pub writer: ArchiveWriter,
    /// Catalog the writer commits to.
    pub catalog: Arc<InMemoryCatalog>,
    expected: BTreeMap<String, Vec<ParsedRecord>>,
}

impl ArchiveHarness {
    /// Creates a harness writing to `root`.
    pub fn new(root: &Path, config: ArchiveConfig) -> Self {
        let catalog = Arc::new(InMemoryCatalog::new());
        let writer = ArchiveWriter::create(root, config, catalog.clone() as Arc<dyn MetadataCatalog>)
            .expect("Failed to create archive");
        Self {
            writer,
            catalog,
            expected: BTreeMap::new(),
        }
    }

    /// Ingests one file and remembers the records the writer accepted.
    pub fn ingest(&mut self, path: &str, records: Vec<ParsedRecord>) {
        let report = self
            .writer
            .ingest(path, records.clone())
            .expect("Failed to ingest file");
        let rejected: Vec<usize> = report.failures.iter().map(|f| f.record_index).collect();
        let accepted: Vec<ParsedRecord> = records
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !rejected.contains(i))
            .map(|(_, r)| r)
            .collect();
        if !accepted.is_empty() {
            self.expected.insert(path.to_string(), accepted);
        }
    }

    /// Ingests every file in `files`.
    pub fn ingest_all(&mut self, files: &[InputFile]) {
        for (path, records) in files {
            self.ingest(path, records.clone());
        }
    }

    /// Finalizes the archive.
    pub fn finalize(&mut self) -> ArchiveRecord {
        self.writer.finalize().expect("Failed to finalize archive")
    }

    /// Number of logical files expected in the archive.
    pub fn expected_files(&self) -> usize {
        self.expected.len()
    }

    /// Decodes every logical file through `reader` and compares it with
    /// what was ingested.
    pub fn verify_roundtrip(&self, reader: &ArchiveReader) {
        let logical = group_logical_files(reader.files());
        assert_eq!(
            logical.len(),
            self.expected.len(),
            "Logical file count mismatch"
        );
        for (orig_id, chunks) in &logical {
            let path = &chunks[0].path;
            let expected = self
                .expected
                .get(path)
                .unwrap_or_else(|| panic!("Unexpected file {path}"));
            let decoded = reader
                .decode_logical_file(orig_id)
                .expect("Failed to decode logical file");
            assert_records_eq(expected, &decoded, path);
        }
    }
}

/// Groups file rows by logical file, each group sorted by split index.
pub fn group_logical_files(files: &[FileRecord]) -> BTreeMap<String, Vec<FileRecord>> {
    let mut groups: BTreeMap<String, Vec<FileRecord>> = BTreeMap::new();
    for file in files {
        groups
            .entry(file.logical_id().to_string())
            .or_default()
            .push(file.clone());
    }
    for chunks in groups.values_mut() {
        chunks.sort_by_key(|f| f.split_ix);
    }
    groups
}

/// Asserts that decoded records carry the same content as the input.
/// Timestamp patterns are not compared.
pub fn assert_records_eq(expected: &[ParsedRecord], actual: &[ParsedRecord], path: &str) {
    assert_eq!(expected.len(), actual.len(), "Message count mismatch in {path}");
    for (i, (want, got)) in expected.iter().zip(actual).enumerate() {
        assert_eq!(want.timestamp, got.timestamp, "Timestamp mismatch at {path}:{i}");
        assert_eq!(want.logtype, got.logtype, "Logtype mismatch at {path}:{i}");
        assert_eq!(want.variables, got.variables, "Variables mismatch at {path}:{i}");
    }
}

/// Asserts the structural invariants of a finished archive.
pub fn assert_archive_invariants(reader: &ArchiveReader) {
    let manifest = reader.manifest();

    for (i, id) in reader.segment_ids().iter().enumerate() {
        assert_eq!(*id, i as u64, "Segment ids must be 0, 1, 2, ...");
    }

    for file in reader.files() {
        assert!(file.begin_timestamp <= file.end_timestamp, "File {} range inverted", file.id);
        assert!(
            manifest.begin_timestamp <= file.begin_timestamp
                && file.end_timestamp <= manifest.end_timestamp,
            "File {} outside archive range",
            file.id
        );
        assert!(
            reader.segment_ids().contains(&file.segment_id),
            "File {} points at unknown segment {}",
            file.id,
            file.segment_id
        );
    }

    for (orig_id, chunks) in group_logical_files(reader.files()) {
        let split = chunks.len() > 1;
        let mut next_message = 0;
        for (ix, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.split_ix, ix as u64, "Split gap in {orig_id}");
            assert_eq!(chunk.is_split, split, "is_split flag wrong in {orig_id}");
            assert_eq!(chunk.begin_message_ix, next_message, "Message gap in {orig_id}");
            next_message += chunk.num_messages;
            if ix > 0 {
                assert!(
                    chunk.segment_id > chunks[ix - 1].segment_id,
                    "Chunks of {orig_id} must move forward through segments"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{sample_records, TempArchiveRoot};

    #[test]
    fn harness_roundtrip() {
        let temp = TempArchiveRoot::new();
        let root = temp.archive_path("a");
        let mut harness = ArchiveHarness::new(&root, ArchiveConfig::new().target_segment_size(160));
        harness.ingest("/a.log", sample_records(0, 12));
        harness.ingest("/b.log", sample_records(500, 4));
        harness.finalize();

        let reader = ArchiveReader::open(&root).unwrap();
        harness.verify_roundtrip(&reader);
        assert_archive_invariants(&reader);
        assert_eq!(harness.expected_files(), 2);
    }

    #[test]
    fn rejected_records_are_not_expected() {
        let temp = TempArchiveRoot::new();
        let root = temp.archive_path("a");
        let mut harness = ArchiveHarness::new(&root, ArchiveConfig::new());
        let mut records = sample_records(0, 3);
        records.insert(1, ParsedRecord::new(5, "two {} {}".replace("{}", "\u{11}"), vec!["x".into()]));
        harness.ingest("/a.log", records);
        harness.finalize();
        harness.verify_roundtrip(&ArchiveReader::open(&root).unwrap());
    }
}
