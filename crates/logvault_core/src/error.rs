//! Error types for logvault core.

use crate::version::FormatVersion;
use logvault_catalog::CatalogError;
use logvault_codec::CodecError;
use logvault_storage::StorageError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while writing or reading an archive.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Stream codec or framing error.
    #[error("codec error: {0}")]
    Codec(CodecError),

    /// Metadata catalog error.
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The archive was written by an incompatible format major version.
    #[error("incompatible archive format {found} (supported: {supported})")]
    IncompatibleFormat {
        /// Version stored in the archive.
        found: FormatVersion,
        /// Version this build writes.
        supported: FormatVersion,
    },

    /// A dictionary id was never assigned.
    #[error("unknown {dictionary} id {id}")]
    UnknownId {
        /// Which dictionary was consulted.
        dictionary: &'static str,
        /// The missing id.
        id: u64,
    },

    /// The archive writer has already been finalized.
    #[error("archive is closed")]
    ArchiveClosed,

    /// A record could not be split into a logtype and variables.
    #[error("encoding failure: {message}")]
    EncodingFailure {
        /// Why the record was rejected.
        message: String,
    },

    /// An archive stream is structurally invalid.
    #[error("archive corruption: {message}")]
    Corruption {
        /// Description of the corruption.
        message: String,
    },

    /// A stream checksum did not match its contents.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Checksum stored in the stream.
        expected: u32,
        /// Checksum computed over the stream.
        actual: u32,
    },

    /// Another writer holds the archive directory.
    #[error("archive locked: {}", path.display())]
    ArchiveLocked {
        /// Archive root.
        path: PathBuf,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

/// Coarse classification of a [`CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Format major version mismatch.
    IncompatibleFormat,
    /// Dictionary id never assigned.
    UnknownId,
    /// Operation after finalization.
    ArchiveClosed,
    /// A single record was rejected; the archive continues.
    EncodingFailure,
    /// File, codec or transaction failure.
    StorageIo,
    /// Duplicate or dangling catalog key.
    CatalogConstraint,
    /// Stream contents are inconsistent.
    Corruption,
    /// The archive directory is in use.
    Locked,
    /// Caller misuse.
    InvalidOperation,
}

impl CoreError {
    /// Creates an encoding failure error.
    pub fn encoding_failure(message: impl Into<String>) -> Self {
        Self::EncodingFailure {
            message: message.into(),
        }
    }

    /// Creates a corruption error.
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates an unknown id error.
    pub fn unknown_id(dictionary: &'static str, id: u64) -> Self {
        Self::UnknownId { dictionary, id }
    }

    /// Classifies the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::IncompatibleFormat { .. } => ErrorKind::IncompatibleFormat,
            Self::UnknownId { .. } => ErrorKind::UnknownId,
            Self::ArchiveClosed => ErrorKind::ArchiveClosed,
            Self::EncodingFailure { .. } => ErrorKind::EncodingFailure,
            Self::Catalog(err) if err.is_constraint_violation() => ErrorKind::CatalogConstraint,
            Self::Storage(_) | Self::Codec(_) | Self::Catalog(_) | Self::Io(_) => {
                ErrorKind::StorageIo
            }
            Self::Corruption { .. } | Self::ChecksumMismatch { .. } => ErrorKind::Corruption,
            Self::ArchiveLocked { .. } => ErrorKind::Locked,
            Self::InvalidOperation { .. } => ErrorKind::InvalidOperation,
        }
    }

    /// Returns whether the error concerns a single record only.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::EncodingFailure
    }
}

impl From<CodecError> for CoreError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::ChecksumMismatch { expected, actual } => {
                Self::ChecksumMismatch { expected, actual }
            }
            other => Self::Codec(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_errors_are_lifted() {
        let err = CoreError::from(CodecError::ChecksumMismatch {
            expected: 1,
            actual: 2,
        });
        assert!(matches!(err, CoreError::ChecksumMismatch { expected: 1, actual: 2 }));
        assert_eq!(err.kind(), ErrorKind::Corruption);

        let err = CoreError::from(CodecError::UnexpectedEof);
        assert_eq!(err.kind(), ErrorKind::StorageIo);
    }

    #[test]
    fn catalog_constraint_kind() {
        let err = CoreError::from(CatalogError::constraint("archives", "UNIQUE constraint failed"));
        assert_eq!(err.kind(), ErrorKind::CatalogConstraint);
        let err = CoreError::from(CatalogError::Database("disk I/O error".into()));
        assert_eq!(err.kind(), ErrorKind::StorageIo);
    }

    #[test]
    fn only_encoding_failures_are_recoverable() {
        assert!(CoreError::encoding_failure("bad").is_recoverable());
        assert!(!CoreError::ArchiveClosed.is_recoverable());
        assert!(!CoreError::unknown_id("logtype", 3).is_recoverable());
    }
}
