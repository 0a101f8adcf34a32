//! Row types stored in the catalog.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive timestamp range used for overlap queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    /// First timestamp in the range.
    pub begin: i64,
    /// Last timestamp in the range.
    pub end: i64,
}

impl TimeRange {
    /// Creates a range; `begin` and `end` are swapped if given out of order.
    #[must_use]
    pub const fn new(begin: i64, end: i64) -> Self {
        if begin <= end {
            Self { begin, end }
        } else {
            Self {
                begin: end,
                end: begin,
            }
        }
    }

    /// The range covering every timestamp.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            begin: i64::MIN,
            end: i64::MAX,
        }
    }

    /// Returns whether `[begin, end]` shares at least one timestamp with this range.
    #[must_use]
    pub const fn overlaps(&self, begin: i64, end: i64) -> bool {
        begin <= self.end && end >= self.begin
    }

    /// Returns whether `[begin, end]` lies entirely inside this range.
    #[must_use]
    pub const fn contains(&self, begin: i64, end: i64) -> bool {
        begin >= self.begin && end <= self.end
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.begin, self.end)
    }
}

/// One row of the `archives` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    /// Archive id.
    pub id: String,
    /// Earliest message timestamp.
    pub begin_timestamp: i64,
    /// Latest message timestamp.
    pub end_timestamp: i64,
    /// Bytes of the original logs.
    pub uncompressed_size: u64,
    /// Bytes on disk.
    pub size: u64,
    /// Id of the writer that produced the archive.
    pub creator_id: String,
    /// Monotonic index among archives of the same creator.
    pub creation_ix: u64,
}

/// A change of timestamp pattern at a given message of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampPattern {
    /// Message index (within the chunk) where the pattern starts applying.
    pub message_ix: u64,
    /// The pattern text, e.g. `%Y-%m-%d %H:%M:%S,%3`.
    pub pattern: String,
}

impl TimestampPattern {
    /// Encodes a list of patterns as newline-separated `ix:pattern` entries.
    #[must_use]
    pub fn encode_list(patterns: &[Self]) -> String {
        patterns
            .iter()
            .map(|p| format!("{}:{}", p.message_ix, p.pattern))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Parses the output of [`Self::encode_list`]; `None` on malformed input.
    #[must_use]
    pub fn decode_list(encoded: &str) -> Option<Vec<Self>> {
        if encoded.is_empty() {
            return Some(Vec::new());
        }
        encoded
            .split('\n')
            .map(|line| {
                let (ix, pattern) = line.split_once(':')?;
                Some(Self {
                    message_ix: ix.parse().ok()?,
                    pattern: pattern.to_string(),
                })
            })
            .collect()
    }
}

/// One row of the `files` table: a logical input file or one split chunk of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Id of this row.
    pub id: String,
    /// Id of chunk 0 of the logical file; absent in rows written before it existed.
    pub orig_file_id: Option<String>,
    /// Original path.
    pub path: String,
    /// Earliest message timestamp.
    pub begin_timestamp: i64,
    /// Latest message timestamp.
    pub end_timestamp: i64,
    /// Timestamp pattern changes.
    pub timestamp_patterns: Vec<TimestampPattern>,
    /// Bytes of the original messages in this chunk.
    pub num_uncompressed_bytes: u64,
    /// Index of the first message within the logical file.
    pub begin_message_ix: u64,
    /// Messages in this chunk.
    pub num_messages: u64,
    /// Variable occurrences in this chunk.
    pub num_variables: u64,
    /// Whether the logical file was split across segments.
    pub is_split: bool,
    /// Position of this chunk among the splits, from 0.
    pub split_ix: u64,
    /// Segment holding this chunk.
    pub segment_id: u64,
    /// Offset into the segment's timestamp column.
    pub segment_timestamps_position: u64,
    /// Offset into the segment's logtype column.
    pub segment_logtypes_position: u64,
    /// Offset into the segment's variable column.
    pub segment_variables_position: u64,
    /// Owning archive.
    pub archive_id: String,
}

impl FileRecord {
    /// Id of the logical file this row belongs to.
    #[must_use]
    pub fn logical_id(&self) -> &str {
        self.orig_file_id.as_deref().unwrap_or(&self.id)
    }

    /// Half-open range of message indexes this chunk covers in the logical file.
    #[must_use]
    pub fn message_range(&self) -> std::ops::Range<u64> {
        self.begin_message_ix..self.begin_message_ix + self.num_messages
    }
}

/// Rows written together by one archive finalization.
///
/// A catalog applies a batch atomically: either every row becomes visible
/// or none does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitBatch {
    /// The archive row, if the batch creates one.
    pub archive: Option<ArchiveRecord>,
    /// File rows.
    pub files: Vec<FileRecord>,
    /// Empty directory paths.
    pub empty_directories: Vec<String>,
}

impl CommitBatch {
    /// Returns whether the batch holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.archive.is_none() && self.files.is_empty() && self.empty_directories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_range_overlap() {
        let range = TimeRange::new(100, 200);
        assert!(range.overlaps(50, 100));
        assert!(range.overlaps(200, 300));
        assert!(range.overlaps(120, 130));
        assert!(!range.overlaps(201, 300));
        assert!(!range.overlaps(0, 99));
        assert!(range.contains(100, 200));
        assert!(!range.contains(99, 150));
    }

    #[test]
    fn time_range_normalizes_order() {
        assert_eq!(TimeRange::new(5, 1), TimeRange::new(1, 5));
    }

    #[test]
    fn timestamp_patterns_text_form() {
        let patterns = vec![
            TimestampPattern {
                message_ix: 0,
                pattern: "%Y-%m-%d %H:%M:%S".into(),
            },
            TimestampPattern {
                message_ix: 42,
                pattern: "[%d/%b/%Y:%H:%M:%S".into(),
            },
        ];
        let encoded = TimestampPattern::encode_list(&patterns);
        assert_eq!(encoded, "0:%Y-%m-%d %H:%M:%S\n42:[%d/%b/%Y:%H:%M:%S");
        assert_eq!(TimestampPattern::decode_list(&encoded).unwrap(), patterns);
        assert_eq!(TimestampPattern::decode_list("").unwrap(), vec![]);
        assert!(TimestampPattern::decode_list("nope").is_none());
    }
}
