//! Property-based test generators using proptest.
//!
//! Generated records always pass [`ParsedRecord::validate`].

use logvault_core::{ParsedRecord, VARIABLE_PLACEHOLDER};
use proptest::prelude::*;

/// Strategy for timestamps in a realistic millisecond range.
pub fn timestamp_strategy() -> impl Strategy<Value = i64> {
    0i64..4_102_444_800_000
}

/// Strategy for variable values: non-empty, never containing the placeholder.
pub fn variable_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        any::<i64>().prop_map(|n| n.to_string()),
        prop::string::string_regex("[a-zA-Z0-9_./:-]{1,24}").expect("Invalid regex"),
        "[0-9a-f]{8}-[0-9a-f]{4}",
    ]
    .prop_filter("variables must be encodable", |v| {
        !v.is_empty() && !v.contains(VARIABLE_PLACEHOLDER)
    })
}

/// Strategy for static template text between placeholders.
pub fn template_text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z ,=\\[\\]]{0,16}").expect("Invalid regex")
}

/// Strategy for a record with up to `max_vars` variables.
pub fn record_strategy(max_vars: usize) -> impl Strategy<Value = ParsedRecord> {
    (
        timestamp_strategy(),
        prop::collection::vec((template_text_strategy(), variable_strategy()), 0..=max_vars),
        template_text_strategy(),
    )
        .prop_map(|(ts, parts, tail)| {
            let mut logtype = String::new();
            let mut variables = Vec::with_capacity(parts.len());
            for (text, value) in parts {
                logtype.push_str(&text);
                logtype.push(VARIABLE_PLACEHOLDER);
                variables.push(value);
            }
            logtype.push_str(&tail);
            ParsedRecord::new(ts, logtype, variables)
        })
}

/// Strategy for the records of one file, drawn from a small template pool so
/// logtypes repeat the way they do in real logs.
pub fn log_file_strategy(max_records: usize) -> impl Strategy<Value = Vec<ParsedRecord>> {
    prop::collection::vec(record_strategy(3), 1..8).prop_flat_map(move |pool| {
        let len = pool.len();
        prop::collection::vec(
            (0..len, timestamp_strategy(), prop::collection::vec(variable_strategy(), 3)),
            0..=max_records,
        )
        .prop_map(move |picks| {
            picks
                .into_iter()
                .map(|(ix, ts, values)| {
                    let template = &pool[ix];
                    let count = template.placeholder_count();
                    ParsedRecord::new(ts, template.logtype.clone(), values[..count].to_vec())
                })
                .collect()
        })
    })
}

/// Strategy for file paths.
pub fn path_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("/[a-z]{1,8}(/[a-z0-9_]{1,8}){0,3}\\.log").expect("Invalid regex")
}

/// Strategy for several files, each with a distinct path.
pub fn input_files_strategy(
    max_files: usize,
    max_records: usize,
) -> impl Strategy<Value = Vec<(String, Vec<ParsedRecord>)>> {
    prop::collection::vec(log_file_strategy(max_records), 1..=max_files).prop_map(|files| {
        files
            .into_iter()
            .enumerate()
            .map(|(i, records)| (format!("/logs/{i}.log"), records))
            .collect()
    })
}
