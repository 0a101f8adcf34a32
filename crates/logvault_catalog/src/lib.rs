//! # logvault catalog
//!
//! Relational metadata for log archives: one row per archive, one row per
//! file or split chunk, and the set of empty directories seen during
//! ingestion.
//!
//! Two implementations of [`MetadataCatalog`] are provided:
//!
//! - [`SqliteCatalog`] - the `metadata.db` format shared by archives
//! - [`InMemoryCatalog`] - for tests and throwaway ingestion
//!
//! Column names are part of the on-disk contract and live in [`schema`].
//!
//! ```rust
//! use logvault_catalog::{ArchiveRecord, InMemoryCatalog, MetadataCatalog};
//!
//! let catalog = InMemoryCatalog::new();
//! catalog.insert_archive(&ArchiveRecord {
//!     id: "a1".into(),
//!     begin_timestamp: 0,
//!     end_timestamp: 10,
//!     uncompressed_size: 100,
//!     size: 20,
//!     creator_id: "writer".into(),
//!     creation_ix: 0,
//! }).unwrap();
//! assert_eq!(catalog.archives_by_creator("writer").unwrap().len(), 1);
//! ```

mod catalog;
mod error;
mod memory;
pub mod schema;
mod sqlite;
mod types;

#[cfg(test)]
mod testing;

pub use catalog::MetadataCatalog;
pub use error::{CatalogError, CatalogResult};
pub use memory::InMemoryCatalog;
pub use sqlite::SqliteCatalog;
pub use types::{ArchiveRecord, CommitBatch, FileRecord, TimeRange, TimestampPattern};
