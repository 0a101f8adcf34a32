//! Dict command implementation.

use super::open_reader;
use crate::DictArg;
use logvault_core::VARIABLE_PLACEHOLDER;
use std::path::Path;

/// Runs the dict command.
pub fn run(
    path: &Path,
    catalog: Option<&Path>,
    which: DictArg,
    limit: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let reader = open_reader(path, catalog)?;
    let dictionary = match which {
        DictArg::Logtype => reader.logtype_dictionary(),
        DictArg::Var => reader.variable_dictionary(),
    };

    for (id, value) in dictionary.iter().take(limit.unwrap_or(usize::MAX)) {
        // Placeholders are control bytes; show them as `{}`.
        println!("{id}\t{}", value.replace(VARIABLE_PLACEHOLDER, "{}"));
    }
    Ok(())
}
