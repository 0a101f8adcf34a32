//! In-memory catalog.

use crate::catalog::{check_batch, MetadataCatalog};
use crate::error::{CatalogError, CatalogResult};
use crate::schema::{archives, files};
use crate::types::{ArchiveRecord, CommitBatch, FileRecord, TimeRange};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Default)]
struct Tables {
    archives: BTreeMap<String, ArchiveRecord>,
    /// File rows in insertion order.
    files: Vec<FileRecord>,
    /// Ids of every row in `files`.
    file_ids: HashSet<String>,
    empty_directories: BTreeSet<String>,
}

/// A catalog held entirely in memory.
///
/// All three tables sit behind one lock, so a [`CommitBatch`] is validated
/// and applied under a single write guard.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    tables: RwLock<Tables>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of file rows across all archives.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.tables.read().files.len()
    }
}

impl MetadataCatalog for InMemoryCatalog {
    fn commit(&self, batch: &CommitBatch) -> CatalogResult<()> {
        check_batch(batch)?;
        let mut tables = self.tables.write();

        if let Some(archive) = &batch.archive {
            if tables.archives.contains_key(&archive.id) {
                return Err(CatalogError::constraint(
                    archives::TABLE,
                    format!("duplicate archive id {}", archive.id),
                ));
            }
        }
        for file in &batch.files {
            if tables.file_ids.contains(&file.id) {
                return Err(CatalogError::constraint(
                    files::TABLE,
                    format!("duplicate file id {}", file.id),
                ));
            }
            let archive_known = tables.archives.contains_key(&file.archive_id)
                || batch
                    .archive
                    .as_ref()
                    .is_some_and(|a| a.id == file.archive_id);
            if !archive_known {
                return Err(CatalogError::constraint(
                    files::TABLE,
                    format!(
                        "file {} references unknown archive {}",
                        file.id, file.archive_id
                    ),
                ));
            }
        }

        if let Some(archive) = &batch.archive {
            tables.archives.insert(archive.id.clone(), archive.clone());
        }
        tables
            .file_ids
            .extend(batch.files.iter().map(|f| f.id.clone()));
        tables.files.extend(batch.files.iter().cloned());
        tables
            .empty_directories
            .extend(batch.empty_directories.iter().cloned());
        Ok(())
    }

    fn files_overlapping(&self, range: TimeRange) -> CatalogResult<Vec<FileRecord>> {
        let tables = self.tables.read();
        let mut out: Vec<FileRecord> = tables
            .files
            .iter()
            .filter(|f| range.overlaps(f.begin_timestamp, f.end_timestamp))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            (a.begin_timestamp, &a.path, a.split_ix).cmp(&(b.begin_timestamp, &b.path, b.split_ix))
        });
        Ok(out)
    }

    fn files_in_archive(&self, archive_id: &str) -> CatalogResult<Vec<FileRecord>> {
        let tables = self.tables.read();
        let mut out: Vec<FileRecord> = tables
            .files
            .iter()
            .filter(|f| f.archive_id == archive_id)
            .cloned()
            .collect();
        out.sort_by_key(|f| (f.segment_id, f.segment_timestamps_position));
        Ok(out)
    }

    fn archives_by_creator(&self, creator_id: &str) -> CatalogResult<Vec<ArchiveRecord>> {
        let tables = self.tables.read();
        let mut out: Vec<ArchiveRecord> = tables
            .archives
            .values()
            .filter(|a| a.creator_id == creator_id)
            .cloned()
            .collect();
        out.sort_by_key(|a| a.creation_ix);
        Ok(out)
    }

    fn archive(&self, id: &str) -> CatalogResult<Option<ArchiveRecord>> {
        Ok(self.tables.read().archives.get(id).cloned())
    }

    fn list_archives(&self) -> CatalogResult<Vec<ArchiveRecord>> {
        let tables = self.tables.read();
        let mut out: Vec<ArchiveRecord> = tables.archives.values().cloned().collect();
        out.sort_by(|a, b| (a.begin_timestamp, &a.id).cmp(&(b.begin_timestamp, &b.id)));
        Ok(out)
    }

    fn empty_directories(&self) -> CatalogResult<Vec<String>> {
        Ok(self
            .tables
            .read()
            .empty_directories
            .iter()
            .cloned()
            .collect())
    }

    fn delete_archive(&self, id: &str) -> CatalogResult<usize> {
        let mut tables = self.tables.write();
        if tables.archives.remove(id).is_none() {
            return Err(CatalogError::ArchiveNotFound(id.to_string()));
        }
        let tables = &mut *tables;
        let before = tables.files.len();
        let file_ids = &mut tables.file_ids;
        tables.files.retain(|f| {
            if f.archive_id == id {
                file_ids.remove(&f.id);
                false
            } else {
                true
            }
        });
        Ok(before - tables.files.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{archive, file};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn commit_and_query() {
        let catalog = InMemoryCatalog::new();
        catalog
            .commit(&CommitBatch {
                archive: Some(archive("a1", "c1", 0, 100, 200)),
                files: vec![file("f1", "a1", 100, 150), file("f2", "a1", 160, 200)],
                empty_directories: vec!["/var/log/empty".into()],
            })
            .unwrap();

        assert_eq!(catalog.files_in_archive("a1").unwrap().len(), 2);
        let hits = catalog.files_overlapping(TimeRange::new(155, 170)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "f2");
        assert_eq!(catalog.empty_directories().unwrap(), vec!["/var/log/empty"]);
    }

    #[test]
    fn duplicate_archive_rejected_without_side_effects() {
        let catalog = InMemoryCatalog::new();
        catalog.insert_archive(&archive("a1", "c1", 0, 0, 10)).unwrap();

        let result = catalog.commit(&CommitBatch {
            archive: Some(archive("a1", "c1", 1, 0, 10)),
            files: vec![file("f1", "a1", 0, 10)],
            empty_directories: vec!["/tmp/x".into()],
        });
        assert!(result.unwrap_err().is_constraint_violation());
        assert_eq!(catalog.file_count(), 0);
        assert!(catalog.empty_directories().unwrap().is_empty());
    }

    #[test]
    fn duplicate_file_id_across_commits_rejected() {
        let catalog = InMemoryCatalog::new();
        catalog
            .commit(&CommitBatch {
                archive: Some(archive("a1", "c", 0, 0, 10)),
                files: vec![file("f1", "a1", 0, 10)],
                empty_directories: vec![],
            })
            .unwrap();

        let result = catalog.commit(&CommitBatch {
            archive: Some(archive("a2", "c", 1, 0, 10)),
            files: vec![file("f2", "a2", 0, 5), file("f1", "a2", 5, 10)],
            empty_directories: vec![],
        });
        assert!(result.unwrap_err().is_constraint_violation());
        assert!(catalog.archive("a2").unwrap().is_none());
        assert_eq!(catalog.file_count(), 1);

        // Deleting the owner frees the id.
        catalog.delete_archive("a1").unwrap();
        catalog
            .commit(&CommitBatch {
                archive: Some(archive("a2", "c", 1, 0, 10)),
                files: vec![file("f1", "a2", 0, 10)],
                empty_directories: vec![],
            })
            .unwrap();
        assert_eq!(catalog.files_in_archive("a2").unwrap().len(), 1);
    }

    #[test]
    fn file_with_unknown_archive_rejected() {
        let catalog = InMemoryCatalog::new();
        let result = catalog.insert_files(&[file("f1", "missing", 0, 1)]);
        assert!(matches!(
            result,
            Err(CatalogError::ConstraintViolation { table: "files", .. })
        ));
    }

    #[test]
    fn archives_ordered_by_creation_ix() {
        let catalog = InMemoryCatalog::new();
        for (id, ix) in [("a3", 3), ("a1", 1), ("a2", 2)] {
            catalog.insert_archive(&archive(id, "writer", ix, 0, 1)).unwrap();
        }
        catalog.insert_archive(&archive("other", "someone-else", 0, 0, 1)).unwrap();

        let ids: Vec<String> = catalog
            .archives_by_creator("writer")
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec!["a1", "a2", "a3"]);
    }

    #[test]
    fn delete_cascades_to_files() {
        let catalog = InMemoryCatalog::new();
        catalog
            .commit(&CommitBatch {
                archive: Some(archive("a1", "c", 0, 0, 10)),
                files: vec![file("f1", "a1", 0, 5), file("f2", "a1", 5, 10)],
                empty_directories: vec![],
            })
            .unwrap();
        catalog
            .commit(&CommitBatch {
                archive: Some(archive("a2", "c", 1, 0, 10)),
                files: vec![file("f3", "a2", 0, 10)],
                empty_directories: vec![],
            })
            .unwrap();

        assert_eq!(catalog.delete_archive("a1").unwrap(), 2);
        assert!(catalog.archive("a1").unwrap().is_none());
        assert_eq!(catalog.file_count(), 1);
        assert!(matches!(
            catalog.delete_archive("a1"),
            Err(CatalogError::ArchiveNotFound(_))
        ));
    }

    #[test]
    fn concurrent_commits_do_not_interleave() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let catalog = Arc::clone(&catalog);
                thread::spawn(move || {
                    let archive_id = format!("a{t}");
                    let files = (0..50)
                        .map(|i| file(&format!("f{t}-{i}"), &archive_id, i, i + 1))
                        .collect();
                    catalog
                        .commit(&CommitBatch {
                            archive: Some(archive(&archive_id, "c", t as u64, 0, 100)),
                            files,
                            empty_directories: vec![],
                        })
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(catalog.list_archives().unwrap().len(), 8);
        for t in 0..8 {
            assert_eq!(catalog.files_in_archive(&format!("a{t}")).unwrap().len(), 50);
        }
    }
}
