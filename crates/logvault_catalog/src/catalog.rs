//! The catalog trait.

use crate::error::{CatalogError, CatalogResult};
use crate::schema::{archives, files};
use crate::types::{ArchiveRecord, CommitBatch, FileRecord, TimeRange};
use std::collections::HashSet;

/// A transactional store of archive, file and empty-directory rows spanning
/// many archives.
///
/// # Invariants
///
/// - Rows are inserted once and never updated
/// - [`MetadataCatalog::commit`] is atomic: all rows of a batch become
///   visible together or not at all, and two batches never interleave
/// - Deleting an archive deletes its file rows
/// - Implementations are `Send + Sync`; independent archive writers share
///   one catalog through an `Arc`
pub trait MetadataCatalog: Send + Sync {
    /// Atomically inserts every row of `batch`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::ConstraintViolation`] on a duplicate id or a
    /// file row whose archive does not exist; nothing is inserted then.
    fn commit(&self, batch: &CommitBatch) -> CatalogResult<()>;

    /// Inserts one archive row.
    ///
    /// # Errors
    ///
    /// Same as [`MetadataCatalog::commit`].
    fn insert_archive(&self, archive: &ArchiveRecord) -> CatalogResult<()> {
        self.commit(&CommitBatch {
            archive: Some(archive.clone()),
            ..CommitBatch::default()
        })
    }

    /// Inserts file rows as one batch.
    ///
    /// # Errors
    ///
    /// Same as [`MetadataCatalog::commit`].
    fn insert_files(&self, rows: &[FileRecord]) -> CatalogResult<()> {
        self.commit(&CommitBatch {
            files: rows.to_vec(),
            ..CommitBatch::default()
        })
    }

    /// Inserts empty directory paths as one batch. Paths already present are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn insert_empty_directories(&self, paths: &[String]) -> CatalogResult<()> {
        self.commit(&CommitBatch {
            empty_directories: paths.to_vec(),
            ..CommitBatch::default()
        })
    }

    /// Files whose `[begin_timestamp, end_timestamp]` overlaps `range`,
    /// ordered by begin timestamp, then path, then split index.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn files_overlapping(&self, range: TimeRange) -> CatalogResult<Vec<FileRecord>>;

    /// Files of one archive in the order they were written.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn files_in_archive(&self, archive_id: &str) -> CatalogResult<Vec<FileRecord>>;

    /// Archives written by `creator_id`, ordered by `creation_ix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn archives_by_creator(&self, creator_id: &str) -> CatalogResult<Vec<ArchiveRecord>>;

    /// One archive row by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn archive(&self, id: &str) -> CatalogResult<Option<ArchiveRecord>>;

    /// All archive rows ordered by begin timestamp, then id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn list_archives(&self) -> CatalogResult<Vec<ArchiveRecord>>;

    /// All empty directory paths, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn empty_directories(&self) -> CatalogResult<Vec<String>>;

    /// Deletes an archive row and its file rows; returns the number of file rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::ArchiveNotFound`] if no such archive exists.
    fn delete_archive(&self, id: &str) -> CatalogResult<usize>;
}

/// Checks a batch for duplicate ids among its own rows.
///
/// Conflicts with rows already stored are left to the backend.
pub(crate) fn check_batch(batch: &CommitBatch) -> CatalogResult<()> {
    let mut seen = HashSet::with_capacity(batch.files.len());
    for file in &batch.files {
        if !seen.insert(file.id.as_str()) {
            return Err(CatalogError::constraint(
                files::TABLE,
                format!("duplicate file id {} in batch", file.id),
            ));
        }
        if let Some(archive) = &batch.archive {
            if file.archive_id != archive.id {
                return Err(CatalogError::constraint(
                    files::TABLE,
                    format!(
                        "file {} references archive {} but batch commits archive {}",
                        file.id, file.archive_id, archive.id
                    ),
                ));
            }
        }
    }
    if let Some(archive) = &batch.archive {
        if archive.begin_timestamp > archive.end_timestamp {
            return Err(CatalogError::constraint(
                archives::TABLE,
                format!(
                    "archive {} has begin_timestamp {} after end_timestamp {}",
                    archive.id, archive.begin_timestamp, archive.end_timestamp
                ),
            ));
        }
    }
    Ok(())
}
