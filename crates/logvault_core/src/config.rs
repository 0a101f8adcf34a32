//! Archive writer configuration.

use logvault_codec::{CodecKind, ZstdCodec};
use uuid::Uuid;

/// What the allocator does when a file would overflow the current segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitPolicy {
    /// Roll over mid-file and continue the file as a new split chunk.
    #[default]
    SplitAtBoundary,
    /// Let the segment grow past its target until the file ends.
    FinishFile,
}

/// Configuration for an [`crate::ArchiveWriter`].
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    /// Uncompressed column bytes at which a segment rolls over.
    pub target_segment_size: u64,

    /// How files straddling a rollover are handled.
    pub split_policy: SplitPolicy,

    /// Finalize automatically once this many uncompressed bytes were ingested.
    pub target_archive_size: Option<u64>,

    /// Compressor for every stream.
    pub codec: CodecKind,

    /// Compressor level, ignored by codecs without levels.
    pub compression_level: i32,

    /// Id of the process writing archives.
    pub creator_id: Uuid,

    /// Position of this archive among the creator's archives.
    pub creation_ix: u64,

    /// Whether to fsync every stream before committing.
    pub sync_on_finalize: bool,

    /// Whether to also write the archive's rows to its own `metadata.db`.
    pub local_catalog: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            target_segment_size: 256 * 1024 * 1024, // 256 MB
            split_policy: SplitPolicy::default(),
            target_archive_size: None,
            codec: CodecKind::default(),
            compression_level: ZstdCodec::DEFAULT_LEVEL,
            creator_id: Uuid::nil(),
            creation_ix: 0,
            sync_on_finalize: true,
            local_catalog: true,
        }
    }
}

impl ArchiveConfig {
    /// Creates a configuration with default values and a fresh creator id.
    #[must_use]
    pub fn new() -> Self {
        Self::default().creator_id(Uuid::new_v4())
    }

    /// Sets the segment rollover threshold.
    #[must_use]
    pub const fn target_segment_size(mut self, size: u64) -> Self {
        self.target_segment_size = size;
        self
    }

    /// Sets the split policy.
    #[must_use]
    pub const fn split_policy(mut self, policy: SplitPolicy) -> Self {
        self.split_policy = policy;
        self
    }

    /// Sets the auto-finalize threshold.
    #[must_use]
    pub const fn target_archive_size(mut self, size: Option<u64>) -> Self {
        self.target_archive_size = size;
        self
    }

    /// Sets the stream codec.
    #[must_use]
    pub const fn codec(mut self, codec: CodecKind) -> Self {
        self.codec = codec;
        self
    }

    /// Sets the compression level.
    #[must_use]
    pub const fn compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    /// Sets the creator id.
    #[must_use]
    pub const fn creator_id(mut self, id: Uuid) -> Self {
        self.creator_id = id;
        self
    }

    /// Sets the creation index.
    #[must_use]
    pub const fn creation_ix(mut self, ix: u64) -> Self {
        self.creation_ix = ix;
        self
    }

    /// Sets whether streams are fsynced before commit.
    #[must_use]
    pub const fn sync_on_finalize(mut self, value: bool) -> Self {
        self.sync_on_finalize = value;
        self
    }

    /// Sets whether a per-archive `metadata.db` is written.
    #[must_use]
    pub const fn local_catalog(mut self, value: bool) -> Self {
        self.local_catalog = value;
        self
    }
}
