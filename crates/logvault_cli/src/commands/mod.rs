//! CLI command implementations.

pub mod archives;
pub mod dict;
pub mod files;
pub mod inspect;
pub mod verify;

use logvault_catalog::SqliteCatalog;
use logvault_core::ArchiveReader;
use std::path::Path;
use tracing::debug;

/// Opens an archive, reading file rows from `catalog` when given.
pub fn open_reader(
    path: &Path,
    catalog: Option<&Path>,
) -> Result<ArchiveReader, Box<dyn std::error::Error>> {
    let reader = match catalog {
        Some(db) => {
            let catalog = SqliteCatalog::open(db)?;
            let reader = ArchiveReader::open_with_catalog(path, &catalog);
            catalog.close();
            reader?
        }
        None => ArchiveReader::open(path)?,
    };
    debug!(
        archive = %reader.manifest().id,
        files = reader.files().len(),
        segments = reader.segment_ids().len(),
        "archive opened"
    );
    Ok(reader)
}
