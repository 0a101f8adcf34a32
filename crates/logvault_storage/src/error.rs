//! Error types for storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of storage.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current storage size.
        size: u64,
    },

    /// A stream that must be created fresh already exists on disk.
    #[error("stream already exists: {}", path.display())]
    AlreadyExists {
        /// Path of the existing stream.
        path: PathBuf,
    },

    /// A stream opened for reading does not exist.
    #[error("stream not found: {}", path.display())]
    NotFound {
        /// Path of the missing stream.
        path: PathBuf,
    },

    /// The backend was opened read-only.
    #[error("backend is read-only")]
    ReadOnly,
}
