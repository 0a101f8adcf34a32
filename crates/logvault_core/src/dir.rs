//! Archive directory layout and the single-writer lock.
//!
//! ```text
//! <archive_root>/
//! ├─ s/
//! │  ├─ 0, 1, ...          # segments, named by id
//! │  └─ segment_list.txt   # segment ids in creation order
//! ├─ logtype.dict          # logtype dictionary
//! ├─ var.dict              # variable dictionary
//! ├─ logtype.segindex      # logtype ids used per segment
//! ├─ var.segindex          # variable ids used per segment
//! ├─ metadata              # manifest
//! ├─ metadata.db           # catalog rows of this archive
//! └─ .lock                 # held while a writer is active
//! ```
//!
//! `schema.txt` may also be present; it belongs to the parser and is never
//! written here.

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Directory holding segment files.
pub const SEGMENTS_DIR: &str = "s";
/// Segment id list inside [`SEGMENTS_DIR`].
pub const SEGMENT_LIST_FILE: &str = "segment_list.txt";
/// Logtype dictionary stream.
pub const LOGTYPE_DICT_FILE: &str = "logtype.dict";
/// Variable dictionary stream.
pub const VAR_DICT_FILE: &str = "var.dict";
/// Logtype segment index stream.
pub const LOGTYPE_SEGINDEX_FILE: &str = "logtype.segindex";
/// Variable segment index stream.
pub const VAR_SEGINDEX_FILE: &str = "var.segindex";
/// Archive manifest.
pub const METADATA_FILE: &str = "metadata";
/// Per-archive catalog database.
pub const METADATA_DB_FILE: &str = "metadata.db";
/// Parser schema, consumed but never produced.
pub const SCHEMA_FILE: &str = "schema.txt";

const METADATA_TEMP_FILE: &str = "metadata.tmp";
const LOCK_FILE: &str = ".lock";

/// Paths of every stream under an archive root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLayout {
    root: PathBuf,
}

impl ArchiveLayout {
    /// Creates a layout rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Archive root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The segments directory.
    #[must_use]
    pub fn segments_dir(&self) -> PathBuf {
        self.root.join(SEGMENTS_DIR)
    }

    /// The file of segment `id`.
    #[must_use]
    pub fn segment_path(&self, id: u64) -> PathBuf {
        self.segments_dir().join(id.to_string())
    }

    /// The segment list.
    #[must_use]
    pub fn segment_list_path(&self) -> PathBuf {
        self.segments_dir().join(SEGMENT_LIST_FILE)
    }

    /// The logtype dictionary.
    #[must_use]
    pub fn logtype_dict_path(&self) -> PathBuf {
        self.root.join(LOGTYPE_DICT_FILE)
    }

    /// The variable dictionary.
    #[must_use]
    pub fn var_dict_path(&self) -> PathBuf {
        self.root.join(VAR_DICT_FILE)
    }

    /// The logtype segment index.
    #[must_use]
    pub fn logtype_segindex_path(&self) -> PathBuf {
        self.root.join(LOGTYPE_SEGINDEX_FILE)
    }

    /// The variable segment index.
    #[must_use]
    pub fn var_segindex_path(&self) -> PathBuf {
        self.root.join(VAR_SEGINDEX_FILE)
    }

    /// The manifest.
    #[must_use]
    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    /// The per-archive catalog.
    #[must_use]
    pub fn metadata_db_path(&self) -> PathBuf {
        self.root.join(METADATA_DB_FILE)
    }

    /// The parser schema.
    #[must_use]
    pub fn schema_path(&self) -> PathBuf {
        self.root.join(SCHEMA_FILE)
    }

    fn metadata_temp_path(&self) -> PathBuf {
        self.root.join(METADATA_TEMP_FILE)
    }

    fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }
}

/// An archive root held exclusively by one writer.
///
/// The lock is an advisory `fs2` lock on `.lock`. It is released, and the
/// lock file removed, by [`ArchiveDir::release`] or on drop.
#[derive(Debug)]
pub struct ArchiveDir {
    layout: ArchiveLayout,
    lock_file: Option<File>,
}

impl ArchiveDir {
    /// Creates (if needed) and locks a directory for a new archive.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ArchiveLocked`] if another writer holds the
    /// directory, and [`CoreError::InvalidOperation`] if it already holds a
    /// finished archive.
    pub fn create(root: &Path) -> CoreResult<Self> {
        fs::create_dir_all(root)?;
        if !root.is_dir() {
            return Err(CoreError::invalid_operation(format!(
                "archive root is not a directory: {}",
                root.display()
            )));
        }

        let layout = ArchiveLayout::new(root);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(layout.lock_path())?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::ArchiveLocked {
                path: root.to_path_buf(),
            });
        }

        if layout.metadata_path().exists() {
            let _ = FileExt::unlock(&lock_file);
            return Err(CoreError::invalid_operation(format!(
                "archive already exists: {}",
                root.display()
            )));
        }
        fs::create_dir_all(layout.segments_dir())?;

        Ok(Self {
            layout,
            lock_file: Some(lock_file),
        })
    }

    /// Paths inside the archive.
    #[must_use]
    pub fn layout(&self) -> &ArchiveLayout {
        &self.layout
    }

    /// Writes the manifest to its temporary path.
    pub(crate) fn write_manifest_temp(&self, data: &[u8], sync: bool) -> CoreResult<()> {
        let mut file = File::create(self.layout.metadata_temp_path())?;
        file.write_all(data)?;
        if sync {
            file.sync_all()?;
        }
        Ok(())
    }

    /// Renames the temporary manifest into place, publishing the archive.
    pub(crate) fn publish_manifest(&self) -> CoreResult<()> {
        fs::rename(self.layout.metadata_temp_path(), self.layout.metadata_path())?;
        self.sync_directory()
    }

    /// Removes the temporary manifest, if any.
    pub(crate) fn discard_manifest_temp(&self) {
        let path = self.layout.metadata_temp_path();
        if path.exists() {
            if let Err(err) = fs::remove_file(&path) {
                warn!(path = %path.display(), %err, "failed to remove temporary manifest");
            }
        }
    }

    /// Syncs the root so renames and new files are durable.
    #[cfg(unix)]
    pub(crate) fn sync_directory(&self) -> CoreResult<()> {
        File::open(self.layout.root())?.sync_all()?;
        Ok(())
    }

    /// Directory fsync is not available off unix; NTFS journals metadata.
    #[cfg(not(unix))]
    pub(crate) fn sync_directory(&self) -> CoreResult<()> {
        Ok(())
    }

    /// Unlocks and removes the lock file. Idempotent.
    pub fn release(&mut self) {
        if let Some(file) = self.lock_file.take() {
            let _ = FileExt::unlock(&file);
            drop(file);
            let _ = fs::remove_file(self.layout.lock_path());
        }
    }

    /// Returns whether the lock is still held.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.lock_file.is_some()
    }
}

impl Drop for ArchiveDir {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn layout_paths() {
        let layout = ArchiveLayout::new("/a");
        assert_eq!(layout.segment_path(12), Path::new("/a/s/12"));
        assert_eq!(layout.segment_list_path(), Path::new("/a/s/segment_list.txt"));
        assert_eq!(layout.logtype_dict_path(), Path::new("/a/logtype.dict"));
        assert_eq!(layout.var_segindex_path(), Path::new("/a/var.segindex"));
        assert_eq!(layout.metadata_db_path(), Path::new("/a/metadata.db"));
        assert_eq!(layout.schema_path(), Path::new("/a/schema.txt"));
    }

    #[test]
    fn create_locks_directory() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("archive");
        let dir = ArchiveDir::create(&root).unwrap();
        assert!(dir.is_locked());
        assert!(root.join("s").is_dir());

        let second = ArchiveDir::create(&root);
        assert!(matches!(second, Err(CoreError::ArchiveLocked { .. })));
    }

    #[test]
    fn release_removes_lock_file() {
        let temp = tempdir().unwrap();
        let mut dir = ArchiveDir::create(temp.path()).unwrap();
        dir.release();
        assert!(!temp.path().join(".lock").exists());
        dir.release();

        // Lock can be re-acquired afterwards.
        let _again = ArchiveDir::create(temp.path()).unwrap();
    }

    #[test]
    fn manifest_publish() {
        let temp = tempdir().unwrap();
        let dir = ArchiveDir::create(temp.path()).unwrap();
        dir.write_manifest_temp(b"manifest", true).unwrap();
        assert!(!dir.layout().metadata_path().exists());
        dir.publish_manifest().unwrap();
        assert_eq!(fs::read(dir.layout().metadata_path()).unwrap(), b"manifest");
        drop(dir);

        let err = ArchiveDir::create(temp.path()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));
    }

    #[test]
    fn discard_temp_manifest() {
        let temp = tempdir().unwrap();
        let dir = ArchiveDir::create(temp.path()).unwrap();
        dir.write_manifest_temp(b"x", false).unwrap();
        dir.discard_manifest_temp();
        assert!(!temp.path().join("metadata.tmp").exists());
    }
}
