//! # logvault core
//!
//! Segmented, dictionary-encoded archive format for log messages.
//!
//! Each parsed message is split into a logtype (the template) and its
//! variables. Both are dictionary-encoded per archive, and the resulting ids
//! are packed into segments of three aligned columns: timestamps, logtype
//! ids and variable ids. Per-segment indexes of the ids in use let a reader
//! skip segments that cannot match before decompressing anything.
//!
//! This crate provides:
//! - [`Dictionary`] and [`SegmentIndex`]
//! - [`Segment`] and the [`SegmentAllocator`] that rolls segments over
//! - [`FormatVersion`] and the [`ArchiveManifest`]
//! - [`ArchiveWriter`], which commits finished archives to a
//!   [`logvault_catalog::MetadataCatalog`]
//! - [`ArchiveReader`] for decoding, pruning and verification
//!
//! ```no_run
//! use logvault_catalog::InMemoryCatalog;
//! use logvault_core::{ArchiveConfig, ArchiveReader, ArchiveWriter, ParsedRecord};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let root = Path::new("archives/0001");
//! let mut writer = ArchiveWriter::create(root, ArchiveConfig::new(), Arc::new(InMemoryCatalog::new()))?;
//! writer.ingest("app.log", vec![ParsedRecord::from_template(1, "started in {} ms", ["42"])])?;
//! writer.finalize()?;
//!
//! let reader = ArchiveReader::open(root)?;
//! for file in reader.files() {
//!     for message in reader.decode_file(file)? {
//!         println!("{} {}", message.timestamp, message.render());
//!     }
//! }
//! # Ok::<(), logvault_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod allocator;
mod config;
mod dictionary;
pub mod dir;
mod error;
mod manifest;
mod reader;
mod record;
mod segment;
mod segment_index;
mod version;
mod writer;

pub use allocator::{parse_segment_list, FlushedSegment, SegmentAllocator};
pub use config::{ArchiveConfig, SplitPolicy};
pub use dictionary::{Dictionary, DictionaryKind, DICTIONARY_MAGIC};
pub use dir::{ArchiveDir, ArchiveLayout};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use manifest::{ArchiveCounts, ArchiveManifest, MANIFEST_MAGIC};
pub use reader::{ArchiveReader, VerifyReport};
pub use record::{ParsedRecord, VARIABLE_PLACEHOLDER};
pub use segment::{ColumnPositions, Segment, ENTRY_SIZE, SEGMENT_MAGIC};
pub use segment_index::{SegmentIndex, SEGMENT_INDEX_MAGIC};
pub use version::FormatVersion;
pub use writer::{ArchiveWriter, IngestReport, RecordFailure, WriterState};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
