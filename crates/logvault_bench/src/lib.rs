//! Benchmark utilities.

#![warn(missing_docs)]

use logvault_core::{ParsedRecord, Segment};
use rand::seq::SliceRandom;
use rand::Rng;

const TEMPLATES: &[&str] = &[
    "GET {} returned {} in {} ms",
    "connection from {} closed",
    "cache miss for key {}",
    "worker {} started job {}",
    "flushed {} bytes to {}",
    "heartbeat",
];

/// Generates `count` records drawn from a small template pool, with
/// variables taken from `cardinality` distinct values.
pub fn generate_records(count: usize, cardinality: usize) -> Vec<ParsedRecord> {
    let mut rng = rand::thread_rng();
    let cardinality = cardinality.max(1);
    (0..count)
        .map(|i| {
            let template = TEMPLATES.choose(&mut rng).copied().unwrap_or("heartbeat");
            let vars = template.matches("{}").count();
            let values: Vec<String> = (0..vars)
                .map(|_| format!("v{}", rng.gen_range(0..cardinality)))
                .collect();
            ParsedRecord::from_template(1_700_000_000_000 + i as i64 * 3, template, values)
        })
        .collect()
}

/// Generates distinct variable-like strings.
pub fn generate_values(count: usize) -> Vec<String> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| format!("{i}-{:08x}", rng.gen::<u32>()))
        .collect()
}

/// Builds a segment of `messages` messages with realistic id distributions.
pub fn generate_segment(messages: usize) -> Segment {
    let mut rng = rand::thread_rng();
    let mut segment = Segment::new(0);
    let mut ts = 1_700_000_000_000i64;
    for _ in 0..messages {
        ts += rng.gen_range(0..50);
        let vars: Vec<u64> = (0..rng.gen_range(0..4)).map(|_| rng.gen_range(0..5_000)).collect();
        segment.push_message(ts, rng.gen_range(0..64), &vars);
    }
    segment
}
