//! Archives command implementation.

use crate::Format;
use logvault_catalog::{MetadataCatalog, SqliteCatalog};
use std::path::Path;

/// Runs the archives command.
pub fn run(
    catalog_path: &Path,
    creator: Option<&str>,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = SqliteCatalog::open(catalog_path)?;
    let archives = match creator {
        Some(creator) => catalog.archives_by_creator(creator),
        None => catalog.list_archives(),
    };
    catalog.close();
    let archives = archives?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&archives)?),
        Format::Text => {
            for archive in &archives {
                println!(
                    "{} creator {} #{} [{} .. {}] {} -> {} bytes",
                    archive.id,
                    archive.creator_id,
                    archive.creation_ix,
                    archive.begin_timestamp,
                    archive.end_timestamp,
                    archive.uncompressed_size,
                    archive.size
                );
            }
        }
    }
    Ok(())
}
