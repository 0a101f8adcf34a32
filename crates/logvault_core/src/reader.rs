//! Read side of a finished archive.
//!
//! Opening reads the manifest and checks its format version before touching
//! any other stream. Dictionaries, segment indexes and the segment list are
//! loaded eagerly; segments are read on demand. Everything is immutable
//! after finalization, so a reader can be shared across threads.

use crate::allocator::parse_segment_list;
use crate::dictionary::{Dictionary, DictionaryKind};
use crate::dir::ArchiveLayout;
use crate::error::{CoreError, CoreResult};
use crate::manifest::ArchiveManifest;
use crate::record::{placeholder_count, ParsedRecord};
use crate::segment::Segment;
use crate::segment_index::SegmentIndex;
use logvault_catalog::{FileRecord, MetadataCatalog, SqliteCatalog, TimestampPattern};
use logvault_storage::{FileBackend, StorageBackend};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Totals gathered by [`ArchiveReader::verify`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Segments read.
    pub segments: u64,
    /// File rows decoded.
    pub files: u64,
    /// Messages decoded.
    pub messages: u64,
}

/// A read-only view of a finalized archive.
#[derive(Debug)]
pub struct ArchiveReader {
    layout: ArchiveLayout,
    manifest: ArchiveManifest,
    segment_ids: Vec<u64>,
    files: Vec<FileRecord>,
    logtypes: Dictionary,
    variables: Dictionary,
    logtype_index: SegmentIndex,
    variable_index: SegmentIndex,
}

impl ArchiveReader {
    /// Opens the archive at `root`, taking file rows from its `metadata.db`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IncompatibleFormat`] for another major version,
    /// [`CoreError::InvalidOperation`] if the archive has no local catalog,
    /// or any error reading its streams.
    pub fn open(root: &Path) -> CoreResult<Self> {
        let layout = ArchiveLayout::new(root);
        let manifest = read_manifest(&layout)?;
        let db_path = layout.metadata_db_path();
        if !db_path.exists() {
            return Err(CoreError::invalid_operation(format!(
                "{} has no {}; open it with a catalog",
                root.display(),
                crate::dir::METADATA_DB_FILE
            )));
        }
        let catalog = SqliteCatalog::open(&db_path)?;
        let files = catalog.files_in_archive(&manifest.id);
        catalog.close();
        Self::load(layout, manifest, files?)
    }

    /// Opens the archive at `root`, taking file rows from `catalog`.
    ///
    /// # Errors
    ///
    /// Same as [`ArchiveReader::open`], minus the local catalog requirement.
    pub fn open_with_catalog(root: &Path, catalog: &dyn MetadataCatalog) -> CoreResult<Self> {
        let layout = ArchiveLayout::new(root);
        let manifest = read_manifest(&layout)?;
        let files = catalog.files_in_archive(&manifest.id)?;
        Self::load(layout, manifest, files)
    }

    fn load(
        layout: ArchiveLayout,
        manifest: ArchiveManifest,
        files: Vec<FileRecord>,
    ) -> CoreResult<Self> {
        let list = read_stream(&layout.segment_list_path())?;
        let list = String::from_utf8(list)
            .map_err(|_| CoreError::corruption("segment list is not UTF-8"))?;
        let segment_ids = parse_segment_list(&list)?;

        let logtypes =
            Dictionary::from_frame(DictionaryKind::Logtype, &read_stream(&layout.logtype_dict_path())?)?;
        let variables =
            Dictionary::from_frame(DictionaryKind::Variable, &read_stream(&layout.var_dict_path())?)?;
        let logtype_index = SegmentIndex::from_frame(
            DictionaryKind::Logtype,
            &read_stream(&layout.logtype_segindex_path())?,
        )?;
        let variable_index = SegmentIndex::from_frame(
            DictionaryKind::Variable,
            &read_stream(&layout.var_segindex_path())?,
        )?;

        if let Some(counts) = manifest.counts {
            let actual = [
                ("segments", counts.segments, segment_ids.len()),
                ("logtypes", counts.logtypes, logtypes.len()),
                ("variables", counts.variables, variables.len()),
            ];
            for (what, expected, found) in actual {
                if expected != found as u64 {
                    return Err(CoreError::corruption(format!(
                        "manifest records {expected} {what} but {found} were found"
                    )));
                }
            }
        }

        info!(
            archive = %manifest.id,
            version = %manifest.version,
            segments = segment_ids.len(),
            files = files.len(),
            "archive opened"
        );
        Ok(Self {
            layout,
            manifest,
            segment_ids,
            files,
            logtypes,
            variables,
            logtype_index,
            variable_index,
        })
    }

    /// The manifest.
    #[must_use]
    pub fn manifest(&self) -> &ArchiveManifest {
        &self.manifest
    }

    /// Paths of the archive.
    #[must_use]
    pub fn layout(&self) -> &ArchiveLayout {
        &self.layout
    }

    /// File rows, ordered by segment then position.
    #[must_use]
    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    /// Segment ids in creation order.
    #[must_use]
    pub fn segment_ids(&self) -> &[u64] {
        &self.segment_ids
    }

    /// The logtype dictionary.
    #[must_use]
    pub fn logtype_dictionary(&self) -> &Dictionary {
        &self.logtypes
    }

    /// The variable dictionary.
    #[must_use]
    pub fn variable_dictionary(&self) -> &Dictionary {
        &self.variables
    }

    /// Id of `template` in the logtype dictionary.
    #[must_use]
    pub fn find_logtype(&self, template: &str) -> Option<u64> {
        self.logtypes.get(template)
    }

    /// Id of `value` in the variable dictionary.
    #[must_use]
    pub fn find_variable(&self, value: &str) -> Option<u64> {
        self.variables.get(value)
    }

    /// Segments that may contain logtype `id`; all others can be skipped.
    #[must_use]
    pub fn segments_with_logtype(&self, id: u64) -> Vec<u64> {
        self.logtype_index.segments_containing(id)
    }

    /// Segments that may contain variable `id`; all others can be skipped.
    #[must_use]
    pub fn segments_with_variable(&self, id: u64) -> Vec<u64> {
        self.variable_index.segments_containing(id)
    }

    /// Reads and decodes one segment.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] if `id` is not listed in the
    /// archive, or any read or decode error.
    pub fn read_segment(&self, id: u64) -> CoreResult<Segment> {
        if !self.segment_ids.contains(&id) {
            return Err(CoreError::invalid_operation(format!(
                "segment {id} is not part of archive {}",
                self.manifest.id
            )));
        }
        let data = read_stream(&self.layout.segment_path(id))?;
        Segment::from_frame(id, &data)
    }

    /// Decodes the messages of one file row.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Corruption`] if the row points past the end of
    /// its segment's columns, and [`CoreError::UnknownId`] if a column
    /// references a missing dictionary entry.
    pub fn decode_file(&self, file: &FileRecord) -> CoreResult<Vec<ParsedRecord>> {
        if file.archive_id != self.manifest.id {
            return Err(CoreError::invalid_operation(format!(
                "file {} belongs to archive {}",
                file.id, file.archive_id
            )));
        }
        if file.num_messages == 0 {
            return Ok(Vec::new());
        }
        let segment = self.read_segment(file.segment_id)?;
        self.decode_in_segment(&segment, file)
    }

    /// Decodes every chunk of a logical file, in split order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] for an unknown id and
    /// [`CoreError::Corruption`] if chunks are not contiguous.
    pub fn decode_logical_file(&self, orig_file_id: &str) -> CoreResult<Vec<ParsedRecord>> {
        let mut chunks: Vec<&FileRecord> = self
            .files
            .iter()
            .filter(|file| file.logical_id() == orig_file_id)
            .collect();
        if chunks.is_empty() {
            return Err(CoreError::invalid_operation(format!(
                "no file {orig_file_id} in archive {}",
                self.manifest.id
            )));
        }
        chunks.sort_by_key(|file| file.split_ix);

        let mut messages = Vec::new();
        for (ix, chunk) in chunks.iter().enumerate() {
            if chunk.split_ix != ix as u64 || chunk.begin_message_ix != messages.len() as u64 {
                return Err(CoreError::corruption(format!(
                    "file {orig_file_id}: chunk {} is not contiguous",
                    chunk.id
                )));
            }
            messages.extend(self.decode_file(chunk)?);
        }
        Ok(messages)
    }

    fn decode_in_segment(
        &self,
        segment: &Segment,
        file: &FileRecord,
    ) -> CoreResult<Vec<ParsedRecord>> {
        let n = to_index(file.num_messages)?;
        let timestamps = column_slice(segment.timestamps(), file.segment_timestamps_position, n, file)?;
        let logtype_ids = column_slice(segment.logtype_ids(), file.segment_logtypes_position, n, file)?;
        let variable_column = segment.variable_ids();
        let mut var_pos = to_index(file.segment_variables_position)?;
        let var_start = var_pos;
        let mut patterns = PatternCursor::new(&file.timestamp_patterns);

        let mut messages = Vec::with_capacity(n);
        for (ix, (&timestamp, &logtype_id)) in timestamps.iter().zip(logtype_ids).enumerate() {
            let logtype = self.logtypes.resolve(logtype_id)?;
            let count = placeholder_count(logtype);
            let end = var_pos.checked_add(count).ok_or_else(|| {
                CoreError::corruption(format!(
                    "file {}: variable offset {var_pos} overflows",
                    file.id
                ))
            })?;
            let ids = variable_column.get(var_pos..end).ok_or_else(|| {
                CoreError::corruption(format!(
                    "file {}: variables [{var_pos}, {end}) exceed segment {} column length {}",
                    file.id,
                    segment.id(),
                    variable_column.len()
                ))
            })?;
            var_pos = end;
            let variables = ids
                .iter()
                .map(|&id| self.variables.resolve(id).map(str::to_string))
                .collect::<CoreResult<Vec<_>>>()?;
            messages.push(ParsedRecord {
                timestamp,
                logtype: logtype.to_string(),
                variables,
                timestamp_pattern: patterns.at(ix as u64),
            });
        }

        if (var_pos - var_start) as u64 != file.num_variables {
            return Err(CoreError::corruption(format!(
                "file {}: decoded {} variables but row records {}",
                file.id,
                var_pos - var_start,
                file.num_variables
            )));
        }
        Ok(messages)
    }

    /// Re-reads every segment and checks it against the dictionaries,
    /// segment indexes and file rows.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn verify(&self) -> CoreResult<VerifyReport> {
        let mut by_segment: BTreeMap<u64, Vec<&FileRecord>> = BTreeMap::new();
        for file in &self.files {
            if file.begin_timestamp > file.end_timestamp
                || file.begin_timestamp < self.manifest.begin_timestamp
                || file.end_timestamp > self.manifest.end_timestamp
            {
                return Err(CoreError::corruption(format!(
                    "file {}: time range [{}, {}] outside archive [{}, {}]",
                    file.id,
                    file.begin_timestamp,
                    file.end_timestamp,
                    self.manifest.begin_timestamp,
                    self.manifest.end_timestamp
                )));
            }
            if file.num_messages > 0 {
                by_segment.entry(file.segment_id).or_default().push(file);
            }
        }
        if let Some(&segment_id) = by_segment.keys().find(|id| !self.segment_ids.contains(id)) {
            return Err(CoreError::corruption(format!(
                "file rows reference missing segment {segment_id}"
            )));
        }

        let mut report = VerifyReport::default();
        for &segment_id in &self.segment_ids {
            let segment = self.read_segment(segment_id)?;
            for &id in segment.logtype_ids() {
                self.logtypes.resolve(id)?;
                if !self.logtype_index.may_contain(segment_id, id) {
                    return Err(CoreError::corruption(format!(
                        "logtype {id} used by segment {segment_id} is missing from its index"
                    )));
                }
            }
            for &id in segment.variable_ids() {
                self.variables.resolve(id)?;
                if !self.variable_index.may_contain(segment_id, id) {
                    return Err(CoreError::corruption(format!(
                        "variable {id} used by segment {segment_id} is missing from its index"
                    )));
                }
            }

            let files = by_segment.get(&segment_id).map(Vec::as_slice).unwrap_or_default();
            let covered: u64 = files.iter().map(|file| file.num_messages).sum();
            if covered != segment.message_count() as u64 {
                return Err(CoreError::corruption(format!(
                    "segment {segment_id} holds {} messages but file rows cover {covered}",
                    segment.message_count()
                )));
            }
            for file in files {
                report.messages += self.decode_in_segment(&segment, file)?.len() as u64;
                report.files += 1;
            }
            report.segments += 1;
            debug!(segment = segment_id, files = files.len(), "segment verified");
        }
        Ok(report)
    }
}

fn read_manifest(layout: &ArchiveLayout) -> CoreResult<ArchiveManifest> {
    ArchiveManifest::decode(&read_stream(&layout.metadata_path())?)
}

fn read_stream(path: &Path) -> CoreResult<Vec<u8>> {
    Ok(FileBackend::open_read_only(path)?.read_all()?)
}

fn to_index(value: u64) -> CoreResult<usize> {
    usize::try_from(value).map_err(|_| CoreError::corruption(format!("offset {value} overflows")))
}

/// `column[offset..offset + n]`, or a corruption error naming the file.
fn column_slice<'a, T>(column: &'a [T], offset: u64, n: usize, file: &FileRecord) -> CoreResult<&'a [T]> {
    let start = to_index(offset)?;
    column.get(start..start.saturating_add(n)).ok_or_else(|| {
        CoreError::corruption(format!(
            "file {}: messages [{start}, {}) exceed segment {} column length {}",
            file.id,
            start.saturating_add(n),
            file.segment_id,
            column.len()
        ))
    })
}

/// Walks a chunk's pattern changes alongside its messages.
struct PatternCursor<'a> {
    patterns: &'a [TimestampPattern],
    next: usize,
    active: Option<String>,
}

impl<'a> PatternCursor<'a> {
    fn new(patterns: &'a [TimestampPattern]) -> Self {
        Self {
            patterns,
            next: 0,
            active: None,
        }
    }

    /// Pattern in effect for message `ix`; calls must use ascending `ix`.
    fn at(&mut self, ix: u64) -> Option<String> {
        while let Some(change) = self.patterns.get(self.next) {
            if change.message_ix > ix {
                break;
            }
            self.active = (!change.pattern.is_empty()).then(|| change.pattern.clone());
            self.next += 1;
        }
        self.active.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArchiveConfig;
    use crate::error::ErrorKind;
    use crate::writer::ArchiveWriter;
    use logvault_catalog::InMemoryCatalog;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn write_archive(root: &Path, catalog: Arc<InMemoryCatalog>) -> Vec<ParsedRecord> {
        let input: Vec<ParsedRecord> = (0..20)
            .map(|i| {
                ParsedRecord::from_template(1000 + i, "request {} from {} took {} ms", [
                    format!("/api/{}", i % 4),
                    "10.0.0.1".to_string(),
                    (i * 7).to_string(),
                ])
            })
            .collect();
        let config = ArchiveConfig::new().target_segment_size(200).sync_on_finalize(false);
        let mut writer = ArchiveWriter::create(root, config, catalog).unwrap();
        writer.ingest("/srv/app.log", input.clone()).unwrap();
        writer.ingest("/srv/empty.log", Vec::new()).unwrap();
        writer.finalize().unwrap();
        input
    }

    #[test]
    fn roundtrip_through_local_catalog() {
        let temp = tempdir().unwrap();
        let input = write_archive(temp.path(), Arc::new(InMemoryCatalog::new()));

        let reader = ArchiveReader::open(temp.path()).unwrap();
        assert!(reader.segment_ids().len() > 1);
        let orig = reader.files()[0].logical_id().to_string();
        assert_eq!(reader.decode_logical_file(&orig).unwrap(), input);

        let total: u64 = reader.files().iter().map(|f| f.num_messages).sum();
        assert_eq!(total, 20);
        let report = reader.verify().unwrap();
        assert_eq!(report.messages, 20);
        assert_eq!(report.segments, reader.segment_ids().len() as u64);
    }

    #[test]
    fn open_with_shared_catalog() {
        let temp = tempdir().unwrap();
        let catalog = Arc::new(InMemoryCatalog::new());
        write_archive(temp.path(), catalog.clone());
        let reader = ArchiveReader::open_with_catalog(temp.path(), catalog.as_ref()).unwrap();
        assert_eq!(reader.files().len(), reader.segment_ids().len());
    }

    #[test]
    fn pruning_via_segment_indexes() {
        let temp = tempdir().unwrap();
        write_archive(temp.path(), Arc::new(InMemoryCatalog::new()));
        let reader = ArchiveReader::open(temp.path()).unwrap();

        let ip = reader.find_variable("10.0.0.1").unwrap();
        assert_eq!(reader.segments_with_variable(ip), reader.segment_ids());
        let first_duration = reader.find_variable("0").unwrap();
        assert_eq!(reader.segments_with_variable(first_duration), vec![0]);
        assert!(reader.find_variable("10.0.0.2").is_none());
        let logtype = reader.find_logtype("request \u{11} from \u{11} took \u{11} ms").unwrap();
        assert_eq!(reader.segments_with_logtype(logtype).len(), reader.segment_ids().len());
    }

    #[test]
    fn out_of_range_offsets_are_corruption() {
        let temp = tempdir().unwrap();
        write_archive(temp.path(), Arc::new(InMemoryCatalog::new()));
        let reader = ArchiveReader::open(temp.path()).unwrap();

        let mut file = reader.files()[0].clone();
        file.num_messages += 1000;
        let err = reader.decode_file(&file).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corruption);
    }

    #[test]
    fn overflowing_variable_offset_is_corruption() {
        let temp = tempdir().unwrap();
        write_archive(temp.path(), Arc::new(InMemoryCatalog::new()));
        let reader = ArchiveReader::open(temp.path()).unwrap();

        let mut file = reader.files()[0].clone();
        file.segment_variables_position = u64::MAX;
        let err = reader.decode_file(&file).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corruption);
    }

    #[test]
    fn unknown_segment_rejected() {
        let temp = tempdir().unwrap();
        write_archive(temp.path(), Arc::new(InMemoryCatalog::new()));
        let reader = ArchiveReader::open(temp.path()).unwrap();
        assert!(reader.read_segment(999).is_err());
    }

    #[test]
    fn pattern_cursor_tracks_changes() {
        let patterns = vec![
            TimestampPattern {
                message_ix: 0,
                pattern: "%s".into(),
            },
            TimestampPattern {
                message_ix: 2,
                pattern: String::new(),
            },
        ];
        let mut cursor = PatternCursor::new(&patterns);
        assert_eq!(cursor.at(0).as_deref(), Some("%s"));
        assert_eq!(cursor.at(1).as_deref(), Some("%s"));
        assert_eq!(cursor.at(2), None);
    }

    #[test]
    fn reader_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ArchiveReader>();
    }
}
