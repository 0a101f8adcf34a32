//! # logvault storage
//!
//! Byte-store backends underneath every logvault archive stream.
//!
//! Backends are **opaque**: they append, read back and sync bytes, and know
//! nothing about segments, dictionaries or manifests. The archive layer owns
//! all format interpretation.
//!
//! [`FileBackend`] stores one stream per OS file (`s/0`, `var.dict`, ...).
//! Streams are created once and reopened read-only.
//!
//! ```no_run
//! use logvault_storage::{FileBackend, StorageBackend};
//! use std::path::Path;
//!
//! let path = Path::new("archive/var.dict");
//! let mut backend = FileBackend::create_new(path).unwrap();
//! backend.append(b"segment bytes").unwrap();
//! backend.sync().unwrap();
//!
//! let reader = FileBackend::open_read_only(path).unwrap();
//! assert_eq!(reader.read_all().unwrap(), b"segment bytes");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
