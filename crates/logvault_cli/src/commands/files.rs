//! Files command implementation.

use super::open_reader;
use crate::Format;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct DecodedFile<'a> {
    #[serde(flatten)]
    row: &'a logvault_catalog::FileRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    messages: Option<Vec<DecodedMessage>>,
}

#[derive(Debug, Serialize)]
struct DecodedMessage {
    timestamp: i64,
    text: String,
}

/// Runs the files command.
pub fn run(
    path: &Path,
    catalog: Option<&Path>,
    show_messages: bool,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    let reader = open_reader(path, catalog)?;

    let mut out = Vec::with_capacity(reader.files().len());
    for row in reader.files() {
        let messages = if show_messages {
            let decoded = reader.decode_file(row)?;
            Some(
                decoded
                    .into_iter()
                    .map(|record| DecodedMessage {
                        timestamp: record.timestamp,
                        text: record.render(),
                    })
                    .collect(),
            )
        } else {
            None
        };
        out.push(DecodedFile { row, messages });
    }

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&out)?),
        Format::Text => {
            for file in &out {
                let row = file.row;
                let split = if row.is_split {
                    format!(" split {}", row.split_ix)
                } else {
                    String::new()
                };
                println!(
                    "{} {}{} segment {} messages {} [{} .. {}]",
                    row.id,
                    row.path,
                    split,
                    row.segment_id,
                    row.num_messages,
                    row.begin_timestamp,
                    row.end_timestamp
                );
                for message in file.messages.iter().flatten() {
                    println!("  {} {}", message.timestamp, message.text);
                }
            }
        }
    }
    Ok(())
}
