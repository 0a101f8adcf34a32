//! Archive writer.
//!
//! ```text
//! Open ──ingest──▶ Writing ──finalize──▶ Finalizing ──▶ Closed
//!   └──────────────finalize──────────────────┘
//! ```
//!
//! A writer is single-threaded by construction: every mutating method takes
//! `&mut self`. Several writers on different roots may share one catalog.
//!
//! Finalization is all-or-nothing. Streams are written first, the manifest
//! goes to a temporary file, catalog rows are committed in one batch, and
//! only then is the manifest renamed into place. If any step fails, the
//! catalog is left without the archive's rows and no `metadata` file exists.

use crate::allocator::SegmentAllocator;
use crate::config::{ArchiveConfig, SplitPolicy};
use crate::dictionary::{Dictionary, DictionaryKind};
use crate::dir::{ArchiveDir, ArchiveLayout};
use crate::error::{CoreError, CoreResult};
use crate::manifest::{ArchiveCounts, ArchiveManifest};
use crate::record::ParsedRecord;
use crate::segment::ColumnPositions;
use crate::segment_index::SegmentIndex;
use crate::version::FormatVersion;
use logvault_catalog::{
    ArchiveRecord, CommitBatch, FileRecord, MetadataCatalog, SqliteCatalog, TimestampPattern,
};
use logvault_codec::StreamCodec;
use logvault_storage::{FileBackend, StorageBackend};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle state of an [`ArchiveWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Created, nothing ingested yet.
    Open,
    /// At least one file ingested.
    Writing,
    /// Streams and catalog rows are being committed.
    Finalizing,
    /// Terminal. Every further operation fails with [`CoreError::ArchiveClosed`].
    Closed,
}

/// A record that was skipped during ingestion.
#[derive(Debug)]
pub struct RecordFailure {
    /// Position of the record in the ingested sequence.
    pub record_index: usize,
    /// Why it was skipped.
    pub error: CoreError,
}

/// Outcome of ingesting one file.
#[derive(Debug)]
pub struct IngestReport {
    /// Ids of the file rows emitted, one per split chunk.
    pub file_ids: Vec<String>,
    /// Messages encoded.
    pub messages: u64,
    /// Records skipped.
    pub failures: Vec<RecordFailure>,
    /// Set when the ingest reached the archive size target and finalized.
    pub finalized: Option<ArchiveRecord>,
    /// Set when the ingest reached the archive size target but finalizing
    /// failed. The writer is closed and nothing was published.
    pub finalize_error: Option<CoreError>,
}

/// Writes one archive.
///
/// ```no_run
/// use logvault_catalog::InMemoryCatalog;
/// use logvault_core::{ArchiveConfig, ArchiveWriter, ParsedRecord};
/// use std::path::Path;
/// use std::sync::Arc;
///
/// let catalog = Arc::new(InMemoryCatalog::new());
/// let mut writer = ArchiveWriter::create(Path::new("archives/a1"), ArchiveConfig::new(), catalog)?;
/// writer.ingest("/var/log/app.log", vec![
///     ParsedRecord::from_template(1, "user {} logged in", ["alice"]),
/// ])?;
/// let archive = writer.finalize()?;
/// println!("{} bytes on disk", archive.size);
/// # Ok::<(), logvault_core::CoreError>(())
/// ```
pub struct ArchiveWriter {
    config: ArchiveConfig,
    dir: ArchiveDir,
    codec: Box<dyn StreamCodec>,
    catalog: Arc<dyn MetadataCatalog>,
    id: String,
    state: WriterState,
    logtypes: Dictionary,
    variables: Dictionary,
    logtype_index: SegmentIndex,
    variable_index: SegmentIndex,
    allocator: SegmentAllocator,
    files: Vec<FileRecord>,
    empty_directories: Vec<String>,
    time_range: Option<(i64, i64)>,
    uncompressed_size: u64,
}

impl ArchiveWriter {
    /// Creates a new archive under `root` and locks it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ArchiveLocked`] if another writer holds `root`,
    /// or an error if `root` already holds an archive.
    pub fn create(
        root: &Path,
        config: ArchiveConfig,
        catalog: Arc<dyn MetadataCatalog>,
    ) -> CoreResult<Self> {
        if config.target_segment_size == 0 {
            return Err(CoreError::invalid_operation(
                "target segment size must be positive",
            ));
        }
        let dir = ArchiveDir::create(root)?;
        let allocator = SegmentAllocator::new(
            dir.layout().clone(),
            config.codec.build(config.compression_level),
            config.target_segment_size,
            config.sync_on_finalize,
        )?;
        let id = Uuid::new_v4().to_string();
        debug!(archive = %id, root = %root.display(), "archive created");

        Ok(Self {
            codec: config.codec.build(config.compression_level),
            config,
            dir,
            catalog,
            id,
            state: WriterState::Open,
            logtypes: Dictionary::new(DictionaryKind::Logtype),
            variables: Dictionary::new(DictionaryKind::Variable),
            logtype_index: SegmentIndex::new(DictionaryKind::Logtype),
            variable_index: SegmentIndex::new(DictionaryKind::Variable),
            allocator,
            files: Vec::new(),
            empty_directories: Vec::new(),
            time_range: None,
            uncompressed_size: 0,
        })
    }

    /// Archive id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WriterState {
        self.state
    }

    /// Paths of the archive being written.
    #[must_use]
    pub fn layout(&self) -> &ArchiveLayout {
        self.dir.layout()
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// The logtype dictionary so far.
    #[must_use]
    pub fn logtype_dictionary(&self) -> &Dictionary {
        &self.logtypes
    }

    /// The variable dictionary so far.
    #[must_use]
    pub fn variable_dictionary(&self) -> &Dictionary {
        &self.variables
    }

    /// File rows buffered for the final commit.
    #[must_use]
    pub fn pending_files(&self) -> &[FileRecord] {
        &self.files
    }

    /// Bytes of original messages ingested so far.
    #[must_use]
    pub fn uncompressed_size(&self) -> u64 {
        self.uncompressed_size
    }

    fn ensure_writable(&self) -> CoreResult<()> {
        match self.state {
            WriterState::Open | WriterState::Writing => Ok(()),
            WriterState::Finalizing | WriterState::Closed => Err(CoreError::ArchiveClosed),
        }
    }

    /// Records a directory that contains no files.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ArchiveClosed`] after finalization.
    pub fn add_empty_directory(&mut self, path: impl Into<String>) -> CoreResult<()> {
        self.ensure_writable()?;
        let path = path.into();
        if !self.empty_directories.contains(&path) {
            self.empty_directories.push(path);
        }
        Ok(())
    }

    /// Encodes the records of one input file.
    ///
    /// Records that cannot be encoded are skipped and listed in the report.
    /// Any other failure closes the writer; the archive is then never
    /// committed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ArchiveClosed`] after finalization, or the
    /// storage error that aborted the write. A failed automatic
    /// finalization is returned in [`IngestReport::finalize_error`] so the
    /// record failures of the file are kept.
    pub fn ingest<I>(&mut self, path: &str, records: I) -> CoreResult<IngestReport>
    where
        I: IntoIterator<Item = ParsedRecord>,
    {
        self.ensure_writable()?;
        self.state = WriterState::Writing;

        let mut report = match self.ingest_file(path, records) {
            Ok(report) => report,
            Err(err) => {
                self.abort(&err);
                return Err(err);
            }
        };

        if let Some(target) = self.config.target_archive_size {
            if self.uncompressed_size >= target {
                debug!(archive = %self.id, target, "archive size target reached");
                match self.finalize() {
                    Ok(record) => report.finalized = Some(record),
                    Err(err) => report.finalize_error = Some(err),
                }
            }
        }
        Ok(report)
    }

    fn ingest_file<I>(&mut self, path: &str, records: I) -> CoreResult<IngestReport>
    where
        I: IntoIterator<Item = ParsedRecord>,
    {
        let mut file = FileInProgress::new(path);
        let mut failures = Vec::new();

        for (record_index, record) in records.into_iter().enumerate() {
            let (logtype_id, variable_ids) = match self.encode(&record) {
                Ok(encoded) => encoded,
                Err(error) if error.is_recoverable() => {
                    warn!(path, record_index, %error, "skipping record");
                    failures.push(RecordFailure {
                        record_index,
                        error,
                    });
                    continue;
                }
                Err(error) => return Err(error),
            };

            if self.allocator.would_overflow(variable_ids.len()) {
                match self.config.split_policy {
                    SplitPolicy::SplitAtBoundary => {
                        file.close_chunk(&self.id);
                        self.allocator.rollover()?;
                    }
                    SplitPolicy::FinishFile if !file.has_open_chunk() => {
                        self.allocator.rollover()?;
                    }
                    SplitPolicy::FinishFile => {}
                }
            }

            let segment_id = self.allocator.current_id();
            file.ensure_chunk(segment_id, self.allocator.positions());
            self.allocator
                .append(record.timestamp, logtype_id, &variable_ids);
            self.logtype_index.record_reference(segment_id, logtype_id);
            for &variable_id in &variable_ids {
                self.variable_index.record_reference(segment_id, variable_id);
            }
            file.push(&record);

            self.uncompressed_size += record.rendered_len();
            self.time_range = Some(match self.time_range {
                Some((begin, end)) => (begin.min(record.timestamp), end.max(record.timestamp)),
                None => (record.timestamp, record.timestamp),
            });
        }

        let messages = file.total_messages();
        let rows = file.finish(&self.id);
        let file_ids = rows.iter().map(|row| row.id.clone()).collect();
        if rows.is_empty() {
            debug!(path, "file produced no messages");
        }
        self.files.extend(rows);

        if self.allocator.is_full() {
            self.allocator.rollover()?;
        }

        Ok(IngestReport {
            file_ids,
            messages,
            failures,
            finalized: None,
            finalize_error: None,
        })
    }

    fn encode(&mut self, record: &ParsedRecord) -> CoreResult<(u64, Vec<u64>)> {
        record.validate()?;
        let logtype_id = self.logtypes.lookup_or_insert(&record.logtype)?;
        let variable_ids = record
            .variables
            .iter()
            .map(|value| self.variables.lookup_or_insert(value))
            .collect::<CoreResult<Vec<_>>>()?;
        Ok((logtype_id, variable_ids))
    }

    /// Flushes every stream, writes the manifest and commits catalog rows.
    ///
    /// The writer is closed afterwards whether or not this succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ArchiveClosed`] if already finalized, or the
    /// error that aborted the commit. On error nothing is published.
    pub fn finalize(&mut self) -> CoreResult<ArchiveRecord> {
        self.ensure_writable()?;
        self.state = WriterState::Finalizing;
        let result = self.commit();
        self.state = WriterState::Closed;
        self.dir.release();
        match &result {
            Ok(record) => info!(
                archive = %record.id,
                files = self.files.len(),
                uncompressed = record.uncompressed_size,
                size = record.size,
                "archive finalized"
            ),
            Err(err) => warn!(archive = %self.id, %err, "archive finalization failed"),
        }
        result
    }

    fn commit(&mut self) -> CoreResult<ArchiveRecord> {
        self.allocator.finish()?;
        let flushed = self.allocator.flushed().to_vec();
        for segment in &flushed {
            self.logtype_index.register_segment(segment.id);
            self.variable_index.register_segment(segment.id);
        }

        let codec = self.codec.as_ref();
        let layout = self.dir.layout().clone();
        let sync = self.config.sync_on_finalize;
        let mut stored = self.allocator.stored_size()?;
        stored += write_stream(&layout.logtype_dict_path(), &self.logtypes.to_frame(codec)?, sync)?;
        stored += write_stream(&layout.var_dict_path(), &self.variables.to_frame(codec)?, sync)?;
        stored += write_stream(
            &layout.logtype_segindex_path(),
            &self.logtype_index.to_frame(codec)?,
            sync,
        )?;
        stored += write_stream(
            &layout.var_segindex_path(),
            &self.variable_index.to_frame(codec)?,
            sync,
        )?;
        debug!(
            archive = %self.id,
            logtypes = self.logtypes.len(),
            variables = self.variables.len(),
            "dictionaries flushed"
        );

        let (begin_timestamp, end_timestamp) = self.time_range.unwrap_or((0, 0));
        let mut manifest = ArchiveManifest {
            version: FormatVersion::CURRENT,
            id: self.id.clone(),
            begin_timestamp,
            end_timestamp,
            uncompressed_size: self.uncompressed_size,
            size: 0,
            creator_id: self.config.creator_id.to_string(),
            creation_ix: self.config.creation_ix,
            counts: Some(ArchiveCounts {
                segments: flushed.len() as u64,
                logtypes: self.logtypes.len() as u64,
                variables: self.variables.len() as u64,
            }),
        };
        manifest.size = stored + manifest.encoded_len() as u64;
        self.dir.write_manifest_temp(&manifest.encode(), sync)?;

        let record = manifest.to_record();
        let batch = CommitBatch {
            archive: Some(record.clone()),
            files: self.files.clone(),
            empty_directories: self.empty_directories.clone(),
        };

        if let Err(err) = self.commit_catalogs(&batch) {
            self.dir.discard_manifest_temp();
            remove_local_catalog(&layout);
            return Err(err);
        }

        if let Err(err) = self.dir.publish_manifest() {
            if let Err(undo) = self.catalog.delete_archive(&self.id) {
                warn!(archive = %self.id, %undo, "failed to withdraw catalog rows");
            }
            self.dir.discard_manifest_temp();
            remove_local_catalog(&layout);
            return Err(err);
        }
        Ok(record)
    }

    fn commit_catalogs(&self, batch: &CommitBatch) -> CoreResult<()> {
        if self.config.local_catalog {
            let local = SqliteCatalog::open(&self.dir.layout().metadata_db_path())?;
            let result = local.commit(batch);
            local.close();
            result?;
        }
        self.catalog.commit(batch)?;
        Ok(())
    }

    fn abort(&mut self, err: &CoreError) {
        warn!(archive = %self.id, %err, "archive write aborted");
        self.state = WriterState::Closed;
        self.dir.release();
    }
}

impl Drop for ArchiveWriter {
    fn drop(&mut self) {
        if matches!(self.state, WriterState::Open | WriterState::Writing) {
            warn!(archive = %self.id, "archive writer dropped without finalize");
        }
    }
}

impl std::fmt::Debug for ArchiveWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveWriter")
            .field("id", &self.id)
            .field("root", &self.dir.layout().root())
            .field("state", &self.state)
            .field("files", &self.files.len())
            .finish_non_exhaustive()
    }
}

fn write_stream(path: &Path, frame: &[u8], sync: bool) -> CoreResult<u64> {
    let mut backend = FileBackend::create_new(path)?;
    backend.append(frame)?;
    if sync {
        backend.sync()?;
    } else {
        backend.flush()?;
    }
    Ok(backend.size()?)
}

fn remove_local_catalog(layout: &ArchiveLayout) {
    let path = layout.metadata_db_path();
    if path.exists() {
        if let Err(err) = fs::remove_file(&path) {
            warn!(path = %path.display(), %err, "failed to remove local catalog");
        }
    }
}

/// One contiguous run of a file's messages inside a single segment.
#[derive(Debug)]
struct Chunk {
    id: String,
    split_ix: u64,
    begin_message_ix: u64,
    segment_id: u64,
    positions: ColumnPositions,
    begin_timestamp: i64,
    end_timestamp: i64,
    num_messages: u64,
    num_variables: u64,
    num_uncompressed_bytes: u64,
    timestamp_patterns: Vec<TimestampPattern>,
    active_pattern: Option<String>,
}

/// Split bookkeeping for the file being ingested.
#[derive(Debug)]
struct FileInProgress {
    path: String,
    orig_file_id: Option<String>,
    messages_done: u64,
    chunk: Option<Chunk>,
    rows: Vec<FileRecord>,
}

impl FileInProgress {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            orig_file_id: None,
            messages_done: 0,
            chunk: None,
            rows: Vec::new(),
        }
    }

    fn has_open_chunk(&self) -> bool {
        self.chunk.is_some()
    }

    fn total_messages(&self) -> u64 {
        self.messages_done + self.chunk.as_ref().map_or(0, |c| c.num_messages)
    }

    fn ensure_chunk(&mut self, segment_id: u64, positions: ColumnPositions) {
        if self.chunk.is_some() {
            return;
        }
        let id = Uuid::new_v4().to_string();
        if self.orig_file_id.is_none() {
            self.orig_file_id = Some(id.clone());
        }
        self.chunk = Some(Chunk {
            id,
            split_ix: self.rows.len() as u64,
            begin_message_ix: self.messages_done,
            segment_id,
            positions,
            begin_timestamp: i64::MAX,
            end_timestamp: i64::MIN,
            num_messages: 0,
            num_variables: 0,
            num_uncompressed_bytes: 0,
            timestamp_patterns: Vec::new(),
            active_pattern: None,
        });
    }

    fn push(&mut self, record: &ParsedRecord) {
        let Some(chunk) = self.chunk.as_mut() else {
            return;
        };
        if record.timestamp_pattern != chunk.active_pattern {
            chunk.timestamp_patterns.push(TimestampPattern {
                message_ix: chunk.num_messages,
                pattern: record.timestamp_pattern.clone().unwrap_or_default(),
            });
            chunk.active_pattern.clone_from(&record.timestamp_pattern);
        }
        chunk.begin_timestamp = chunk.begin_timestamp.min(record.timestamp);
        chunk.end_timestamp = chunk.end_timestamp.max(record.timestamp);
        chunk.num_messages += 1;
        chunk.num_variables += record.variables.len() as u64;
        chunk.num_uncompressed_bytes += record.rendered_len();
    }

    fn close_chunk(&mut self, archive_id: &str) {
        let Some(chunk) = self.chunk.take() else {
            return;
        };
        self.messages_done += chunk.num_messages;
        self.rows.push(FileRecord {
            id: chunk.id,
            orig_file_id: self.orig_file_id.clone(),
            path: self.path.clone(),
            begin_timestamp: chunk.begin_timestamp,
            end_timestamp: chunk.end_timestamp,
            timestamp_patterns: chunk.timestamp_patterns,
            num_uncompressed_bytes: chunk.num_uncompressed_bytes,
            begin_message_ix: chunk.begin_message_ix,
            num_messages: chunk.num_messages,
            num_variables: chunk.num_variables,
            is_split: false,
            split_ix: chunk.split_ix,
            segment_id: chunk.segment_id,
            segment_timestamps_position: chunk.positions.timestamps,
            segment_logtypes_position: chunk.positions.logtypes,
            segment_variables_position: chunk.positions.variables,
            archive_id: archive_id.to_string(),
        });
    }

    fn finish(mut self, archive_id: &str) -> Vec<FileRecord> {
        self.close_chunk(archive_id);
        if self.rows.len() > 1 {
            for row in &mut self.rows {
                row.is_split = true;
            }
        }
        self.rows
    }
}
