//! End-to-end archive scenarios.

use logvault_catalog::{InMemoryCatalog, MetadataCatalog, SqliteCatalog, TimeRange};
use logvault_core::{
    parse_segment_list, ArchiveConfig, ArchiveReader, ArchiveWriter, ErrorKind, FormatVersion,
    ParsedRecord, SplitPolicy, WriterState,
};
use logvault_testkit::prelude::*;
use proptest::prelude::*;
use std::fs;
use std::sync::Arc;

#[test]
fn single_logtype_file_layout() {
    let temp = TempArchiveRoot::new();
    let root = temp.archive_path("a");
    let catalog = Arc::new(InMemoryCatalog::new());
    let mut writer = ArchiveWriter::create(&root, ArchiveConfig::new(), catalog.clone()).unwrap();

    let records = vec![
        ParsedRecord::from_template(10, "copy {} to {}", ["a", "b"]),
        ParsedRecord::from_template(20, "copy {} to {}", ["c", "d"]),
        ParsedRecord::from_template(30, "copy {} to {}", ["e", "a"]),
    ];
    let report = writer.ingest("/var/log/copy.log", records).unwrap();
    assert!(report.failures.is_empty());
    assert_eq!(writer.logtype_dictionary().len(), 1);
    assert_eq!(writer.variable_dictionary().len(), 5);
    let archive = writer.finalize().unwrap();

    let files = catalog.files_in_archive(&archive.id).unwrap();
    assert_eq!(files.len(), 1);
    let file = &files[0];
    assert_eq!(file.num_messages, 3);
    assert_eq!(file.num_variables, 6);
    assert_eq!(file.segment_id, 0);
    assert_eq!(file.segment_timestamps_position, 0);
    assert_eq!(file.segment_logtypes_position, 0);
    assert_eq!(file.segment_variables_position, 0);
    assert!(!file.is_split);

    let reader = ArchiveReader::open(&root).unwrap();
    let segment = reader.read_segment(0).unwrap();
    assert_eq!(segment.timestamps(), &[10, 20, 30]);
    assert_eq!(segment.logtype_ids(), &[0, 0, 0]);
    assert_eq!(segment.variable_ids(), &[0, 1, 2, 3, 4, 0]);
    assert_eq!(reader.segments_with_variable(4), vec![0]);
}

#[test]
fn second_finalize_is_rejected_and_leaves_catalog_alone() {
    let temp = TempArchiveRoot::new();
    let catalog = Arc::new(InMemoryCatalog::new());
    let mut writer =
        ArchiveWriter::create(&temp.archive_path("a"), ArchiveConfig::new(), catalog.clone())
            .unwrap();
    writer.ingest("/a.log", sample_records(0, 5)).unwrap();
    let first = writer.finalize().unwrap();
    let archives = catalog.list_archives().unwrap();
    let files = catalog.files_in_archive(&first.id).unwrap();

    let err = writer.finalize().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArchiveClosed);
    assert_eq!(writer.state(), WriterState::Closed);
    assert_eq!(catalog.list_archives().unwrap(), archives);
    assert_eq!(catalog.files_in_archive(&first.id).unwrap(), files);

    let err = writer.ingest("/b.log", sample_records(0, 1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArchiveClosed);
}

#[test]
fn newer_major_version_is_rejected_before_segments_are_read() {
    let archive = sample_archive();
    let metadata = archive.root().join("metadata");
    let mut bytes = fs::read(&metadata).unwrap();
    bytes[4..8].copy_from_slice(&FormatVersion::new(1, 0, 0).pack().to_le_bytes());
    fs::write(&metadata, bytes).unwrap();
    // Anything past the manifest would fail differently if it were read.
    fs::remove_dir_all(archive.root().join("s")).unwrap();

    let err = ArchiveReader::open(archive.root()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IncompatibleFormat);
}

#[test]
fn newer_minor_version_is_readable() {
    let archive = sample_archive();
    let metadata = archive.root().join("metadata");
    let mut bytes = fs::read(&metadata).unwrap();
    let current = FormatVersion::CURRENT;
    let newer = FormatVersion::new(current.major, current.minor + 1, 0);
    bytes[4..8].copy_from_slice(&newer.pack().to_le_bytes());
    fs::write(&metadata, bytes).unwrap();

    let reader = ArchiveReader::open(archive.root()).unwrap();
    assert_eq!(reader.manifest().version, newer);
    reader.verify().unwrap();
}

#[test]
fn segment_list_has_no_gaps() {
    let archive = sample_archive();
    let text = fs::read_to_string(archive.root().join("s/segment_list.txt")).unwrap();
    let ids = parse_segment_list(&text).unwrap();
    assert_eq!(ids.len(), archive.segment_count());
    for id in ids {
        assert!(archive.root().join(format!("s/{id}")).is_file());
    }
}

#[test]
fn corrupted_segment_fails_verification() {
    let archive = sample_archive();
    let segment = archive.root().join("s/0");
    let mut bytes = fs::read(&segment).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0xFF;
    fs::write(&segment, bytes).unwrap();

    let reader = archive.reader();
    let err = reader.verify().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Corruption);
}

#[test]
fn shared_sqlite_catalog_with_concurrent_writers() {
    let temp = TempArchiveRoot::new();
    let catalog = Arc::new(SqliteCatalog::open(&temp.catalog_path()).unwrap());
    let config = StressConfig {
        writers: 4,
        files_per_writer: 3,
        messages_per_file: 40,
        target_segment_size: 256,
    };
    let result = concurrent_writers(&temp.archive_path("archives"), catalog.clone(), &config);
    assert_eq!(result.failed, 0);
    assert_eq!(result.archives, 4);

    let archives = catalog.list_archives().unwrap();
    assert_eq!(archives.len(), 4);
    for archive in &archives {
        assert_eq!(catalog.archives_by_creator(&archive.creator_id).unwrap().len(), 1);
    }

    // Writer 0's timestamps start at 0, writer 1's at 1_000_000.
    let early = catalog.files_overlapping(TimeRange::new(0, 999_999)).unwrap();
    assert!(!early.is_empty());
    assert!(early.iter().all(|f| f.path.starts_with("/w0/")));

    let root = temp.archive_path("archives").join("writer2");
    let reader = ArchiveReader::open_with_catalog(&root, catalog.as_ref()).unwrap();
    assert_archive_invariants(&reader);
    reader.verify().unwrap();
}

#[test]
fn empty_archive_finalizes() {
    let temp = TempArchiveRoot::new();
    let root = temp.archive_path("empty");
    let catalog = Arc::new(InMemoryCatalog::new());
    let mut writer = ArchiveWriter::create(&root, ArchiveConfig::new(), catalog.clone()).unwrap();
    writer.add_empty_directory("/var/log/empty").unwrap();
    let record = writer.finalize().unwrap();
    assert_eq!(record.begin_timestamp, 0);
    assert_eq!(record.end_timestamp, 0);
    assert_eq!(catalog.empty_directories().unwrap(), vec!["/var/log/empty".to_string()]);

    let reader = ArchiveReader::open(&root).unwrap();
    assert!(reader.files().is_empty());
    assert!(reader.segment_ids().is_empty());
    reader.verify().unwrap();
}

fn split_policy_strategy() -> impl Strategy<Value = SplitPolicy> {
    prop_oneof![Just(SplitPolicy::SplitAtBoundary), Just(SplitPolicy::FinishFile)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn ingested_files_decode_unchanged(
        files in input_files_strategy(4, 40),
        target in 48u64..2048,
        policy in split_policy_strategy(),
    ) {
        let temp = TempArchiveRoot::new();
        let root = temp.archive_path("a");
        let config = ArchiveConfig::new().target_segment_size(target).split_policy(policy);
        let mut harness = ArchiveHarness::new(&root, config);
        harness.ingest_all(&files);
        let record = harness.finalize();

        let reader = ArchiveReader::open(&root).unwrap();
        harness.verify_roundtrip(&reader);
        assert_archive_invariants(&reader);
        let report = reader.verify().unwrap();
        let expected: u64 = files.iter().map(|(_, r)| r.len() as u64).sum();
        prop_assert_eq!(report.messages, expected);
        prop_assert!(record.begin_timestamp <= record.end_timestamp);
        if policy == SplitPolicy::FinishFile {
            prop_assert!(reader.files().iter().all(|f| !f.is_split));
        }
    }
}
