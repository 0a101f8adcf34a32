//! Inspect command implementation.

use super::open_reader;
use crate::Format;
use logvault_core::ArchiveLayout;
use logvault_storage::{FileBackend, StorageBackend};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Archive inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Archive root.
    pub path: String,
    /// Archive id.
    pub id: String,
    /// Format version.
    pub version: String,
    /// Earliest timestamp.
    pub begin_timestamp: i64,
    /// Latest timestamp.
    pub end_timestamp: i64,
    /// Bytes of original messages.
    pub uncompressed_size: u64,
    /// Bytes on disk per manifest.
    pub size: u64,
    /// Writer id.
    pub creator_id: String,
    /// Creation index.
    pub creation_ix: u64,
    /// Number of file rows.
    pub file_count: usize,
    /// Total messages over all file rows.
    pub message_count: u64,
    /// Logtype dictionary entries.
    pub logtype_count: usize,
    /// Variable dictionary entries.
    pub variable_count: usize,
    /// Stream sizes on disk.
    pub streams: Vec<StreamSize>,
    /// Segment details (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<SegmentStats>>,
}

/// On-disk size of one stream.
#[derive(Debug, Serialize)]
pub struct StreamSize {
    /// File name relative to the archive root.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
}

/// Statistics for a single segment.
#[derive(Debug, Serialize)]
pub struct SegmentStats {
    /// Segment id.
    pub id: u64,
    /// Messages in the segment.
    pub messages: usize,
    /// Variable ids in the segment.
    pub variables: usize,
    /// Compressed size in bytes.
    pub stored_size: u64,
}

/// Runs the inspect command.
pub fn run(
    path: &Path,
    catalog: Option<&Path>,
    show_segments: bool,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = collect(path, catalog, show_segments)?;
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        Format::Text => print_text_output(&result),
    }
    Ok(())
}

/// Gathers inspection data without printing it.
pub fn collect(
    path: &Path,
    catalog: Option<&Path>,
    show_segments: bool,
) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let reader = open_reader(path, catalog)?;
    let manifest = reader.manifest();
    let layout = reader.layout();

    let mut streams = Vec::new();
    for stream in stream_paths(layout) {
        if stream.exists() {
            let name = stream
                .strip_prefix(layout.root())
                .unwrap_or(&stream)
                .display()
                .to_string();
            streams.push(StreamSize {
                name,
                size: FileBackend::open_read_only(&stream)?.size()?,
            });
        }
    }

    let segments = if show_segments {
        let mut stats = Vec::with_capacity(reader.segment_ids().len());
        for &id in reader.segment_ids() {
            let segment = reader.read_segment(id)?;
            stats.push(SegmentStats {
                id,
                messages: segment.message_count(),
                variables: segment.variable_ids().len(),
                stored_size: FileBackend::open_read_only(&layout.segment_path(id))?.size()?,
            });
        }
        Some(stats)
    } else {
        None
    };

    Ok(InspectResult {
        path: path.display().to_string(),
        id: manifest.id.clone(),
        version: manifest.version.to_string(),
        begin_timestamp: manifest.begin_timestamp,
        end_timestamp: manifest.end_timestamp,
        uncompressed_size: manifest.uncompressed_size,
        size: manifest.size,
        creator_id: manifest.creator_id.clone(),
        creation_ix: manifest.creation_ix,
        file_count: reader.files().len(),
        message_count: reader.files().iter().map(|f| f.num_messages).sum(),
        logtype_count: reader.logtype_dictionary().len(),
        variable_count: reader.variable_dictionary().len(),
        streams,
        segments,
    })
}

fn stream_paths(layout: &ArchiveLayout) -> Vec<PathBuf> {
    vec![
        layout.metadata_path(),
        layout.logtype_dict_path(),
        layout.var_dict_path(),
        layout.logtype_segindex_path(),
        layout.var_segindex_path(),
        layout.segment_list_path(),
        layout.metadata_db_path(),
    ]
}

fn print_text_output(result: &InspectResult) {
    println!("logvault Archive Inspection");
    println!("===========================");
    println!();
    println!("Path:     {}", result.path);
    println!("Id:       {}", result.id);
    println!("Format:   {}", result.version);
    println!("Creator:  {} (#{})", result.creator_id, result.creation_ix);
    println!(
        "Time:     {} .. {}",
        result.begin_timestamp, result.end_timestamp
    );
    println!();
    println!("Size:");
    println!("  Uncompressed: {}", format_size(result.uncompressed_size));
    println!("  On disk:      {}", format_size(result.size));
    println!();
    println!("Contents:");
    println!("  Files:     {}", result.file_count);
    println!("  Messages:  {}", result.message_count);
    println!("  Logtypes:  {}", result.logtype_count);
    println!("  Variables: {}", result.variable_count);
    println!();
    println!("Streams:");
    for stream in &result.streams {
        println!("  {:<20} {}", stream.name, format_size(stream.size));
    }

    if let Some(segments) = &result.segments {
        println!();
        println!("Segments:");
        for seg in segments {
            println!(
                "  [{}] {} messages, {} variables, {}",
                seg.id,
                seg.messages,
                seg.variables,
                format_size(seg.stored_size)
            );
        }
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logvault_testkit::fixtures::sample_archive;

    #[test]
    fn collects_manifest_and_segments() {
        let archive = sample_archive();
        let result = collect(archive.root(), None, true).unwrap();
        assert_eq!(result.id, archive.record.id);
        assert_eq!(result.message_count, archive.messages as u64);
        let segments = result.segments.unwrap();
        assert_eq!(segments.len(), archive.segment_count());
        assert!(result.streams.iter().any(|s| s.name == "metadata"));
    }

    #[test]
    fn size_formatting() {
        assert_eq!(format_size(10), "10 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
