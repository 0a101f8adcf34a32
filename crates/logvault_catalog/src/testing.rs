//! Row builders shared by the catalog tests.

use crate::types::{ArchiveRecord, FileRecord};

pub(crate) fn archive(id: &str, creator: &str, creation_ix: u64, begin: i64, end: i64) -> ArchiveRecord {
    ArchiveRecord {
        id: id.to_string(),
        begin_timestamp: begin,
        end_timestamp: end,
        uncompressed_size: 1000,
        size: 100,
        creator_id: creator.to_string(),
        creation_ix,
    }
}

pub(crate) fn file(id: &str, archive_id: &str, begin: i64, end: i64) -> FileRecord {
    FileRecord {
        id: id.to_string(),
        orig_file_id: Some(id.to_string()),
        path: format!("/logs/{id}.log"),
        begin_timestamp: begin,
        end_timestamp: end,
        timestamp_patterns: Vec::new(),
        num_uncompressed_bytes: 64,
        begin_message_ix: 0,
        num_messages: 2,
        num_variables: 3,
        is_split: false,
        split_ix: 0,
        segment_id: 0,
        segment_timestamps_position: 0,
        segment_logtypes_position: 0,
        segment_variables_position: 0,
        archive_id: archive_id.to_string(),
    }
}
