//! Table and column names of the catalog.
//!
//! These names are a fixed wire contract: other tools read `metadata.db`
//! directly, so nothing here may be renamed.

/// The `archives` table.
pub mod archives {
    /// Table name.
    pub const TABLE: &str = "archives";
    /// Archive id (primary key).
    pub const ID: &str = "id";
    /// Earliest timestamp in the archive.
    pub const BEGIN_TIMESTAMP: &str = "begin_timestamp";
    /// Latest timestamp in the archive.
    pub const END_TIMESTAMP: &str = "end_timestamp";
    /// Bytes of the original logs.
    pub const UNCOMPRESSED_SIZE: &str = "uncompressed_size";
    /// Bytes on disk.
    pub const SIZE: &str = "size";
    /// Id of the process that wrote the archive.
    pub const CREATOR_ID: &str = "creator_id";
    /// Per-creator ordering index.
    pub const CREATION_IX: &str = "creation_ix";

    /// All columns in declaration order.
    pub const COLUMNS: [&str; 7] = [
        ID,
        BEGIN_TIMESTAMP,
        END_TIMESTAMP,
        UNCOMPRESSED_SIZE,
        SIZE,
        CREATOR_ID,
        CREATION_IX,
    ];
}

/// The `files` table.
pub mod files {
    /// Table name.
    pub const TABLE: &str = "files";
    /// File (or split chunk) id.
    pub const ID: &str = "id";
    /// Id of the first chunk of the logical file.
    pub const ORIG_FILE_ID: &str = "orig_file_id";
    /// Original path.
    pub const PATH: &str = "path";
    /// Earliest timestamp.
    pub const BEGIN_TIMESTAMP: &str = "begin_timestamp";
    /// Latest timestamp.
    pub const END_TIMESTAMP: &str = "end_timestamp";
    /// Encoded timestamp pattern changes.
    pub const TIMESTAMP_PATTERNS: &str = "timestamp_patterns";
    /// Original byte count.
    pub const NUM_UNCOMPRESSED_BYTES: &str = "num_uncompressed_bytes";
    /// Index of the first message within the logical file.
    pub const BEGIN_MESSAGE_IX: &str = "begin_message_ix";
    /// Message count.
    pub const NUM_MESSAGES: &str = "num_messages";
    /// Variable occurrence count.
    pub const NUM_VARIABLES: &str = "num_variables";
    /// Whether the logical file was split.
    pub const IS_SPLIT: &str = "is_split";
    /// Position of this chunk among the splits.
    pub const SPLIT_IX: &str = "split_ix";
    /// Segment holding the chunk.
    pub const SEGMENT_ID: &str = "segment_id";
    /// Offset into the segment's timestamp column.
    pub const SEGMENT_TIMESTAMPS_POSITION: &str = "segment_timestamps_position";
    /// Offset into the segment's logtype column.
    pub const SEGMENT_LOGTYPES_POSITION: &str = "segment_logtypes_position";
    /// Offset into the segment's variable column.
    pub const SEGMENT_VARIABLES_POSITION: &str = "segment_variables_position";
    /// Owning archive.
    pub const ARCHIVE_ID: &str = "archive_id";

    /// All columns in declaration order.
    pub const COLUMNS: [&str; 17] = [
        ID,
        ORIG_FILE_ID,
        PATH,
        BEGIN_TIMESTAMP,
        END_TIMESTAMP,
        TIMESTAMP_PATTERNS,
        NUM_UNCOMPRESSED_BYTES,
        BEGIN_MESSAGE_IX,
        NUM_MESSAGES,
        NUM_VARIABLES,
        IS_SPLIT,
        SPLIT_IX,
        SEGMENT_ID,
        SEGMENT_TIMESTAMPS_POSITION,
        SEGMENT_LOGTYPES_POSITION,
        SEGMENT_VARIABLES_POSITION,
        ARCHIVE_ID,
    ];
}

/// The `empty_directories` table.
pub mod empty_directories {
    /// Table name.
    pub const TABLE: &str = "empty_directories";
    /// Directory path (primary key).
    pub const PATH: &str = "path";

    /// All columns in declaration order.
    pub const COLUMNS: [&str; 1] = [PATH];
}

/// DDL executed when a SQLite catalog is opened.
pub(crate) const CREATE_STATEMENTS: [&str; 6] = [
    "CREATE TABLE IF NOT EXISTS archives (
        id TEXT PRIMARY KEY NOT NULL,
        begin_timestamp INTEGER NOT NULL,
        end_timestamp INTEGER NOT NULL,
        uncompressed_size INTEGER NOT NULL,
        size INTEGER NOT NULL,
        creator_id TEXT NOT NULL,
        creation_ix INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS archives_creator ON archives (creator_id, creation_ix)",
    "CREATE TABLE IF NOT EXISTS files (
        id TEXT PRIMARY KEY NOT NULL,
        orig_file_id TEXT,
        path TEXT NOT NULL,
        begin_timestamp INTEGER NOT NULL,
        end_timestamp INTEGER NOT NULL,
        timestamp_patterns TEXT NOT NULL,
        num_uncompressed_bytes INTEGER NOT NULL,
        begin_message_ix INTEGER NOT NULL,
        num_messages INTEGER NOT NULL,
        num_variables INTEGER NOT NULL,
        is_split INTEGER NOT NULL,
        split_ix INTEGER NOT NULL,
        segment_id INTEGER NOT NULL,
        segment_timestamps_position INTEGER NOT NULL,
        segment_logtypes_position INTEGER NOT NULL,
        segment_variables_position INTEGER NOT NULL,
        archive_id TEXT NOT NULL REFERENCES archives (id) ON DELETE CASCADE
    )",
    "CREATE INDEX IF NOT EXISTS files_time_range ON files (begin_timestamp, end_timestamp)",
    "CREATE INDEX IF NOT EXISTS files_archive ON files (archive_id)",
    "CREATE TABLE IF NOT EXISTS empty_directories (
        path TEXT PRIMARY KEY NOT NULL
    )",
];

/// Comma-separated column list for SELECT / INSERT statements.
pub(crate) fn column_list(columns: &[&str]) -> String {
    columns.join(", ")
}

/// `?, ?, ...` placeholders matching `n` columns.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
