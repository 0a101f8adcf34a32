//! Verify command implementation.

use super::open_reader;
use std::path::Path;

/// Runs the verify command.
pub fn run(path: &Path, catalog: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying archive at {}", path.display());
    println!();

    let reader = match open_reader(path, catalog) {
        Ok(reader) => reader,
        Err(err) => {
            println!("✗ Archive could not be opened: {err}");
            return Err("Verification failed".into());
        }
    };

    match reader.verify() {
        Ok(report) => {
            println!("Segments checked: {}", report.segments);
            println!("Files checked:    {}", report.files);
            println!("Messages decoded: {}", report.messages);
            println!();
            println!("✓ Archive verification passed");
            Ok(())
        }
        Err(err) => {
            println!("  {err}");
            println!();
            println!("✗ Archive verification failed");
            Err("Verification failed".into())
        }
    }
}
