//! Archive writer benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use logvault_bench::generate_records;
use logvault_catalog::InMemoryCatalog;
use logvault_core::{ArchiveConfig, ArchiveWriter, SplitPolicy};
use std::sync::Arc;
use tempfile::TempDir;

/// Benchmark ingesting and finalizing one file.
fn bench_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest");
    group.sample_size(20);

    for count in [1_000usize, 10_000] {
        let records = generate_records(count, 500);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &records, |b, records| {
            b.iter(|| {
                let temp_dir = TempDir::new().unwrap();
                let config = ArchiveConfig::new().target_segment_size(64 * 1024);
                let mut writer = ArchiveWriter::create(
                    &temp_dir.path().join("a"),
                    config,
                    Arc::new(InMemoryCatalog::new()),
                )
                .unwrap();
                writer.ingest("/bench.log", black_box(records.clone())).unwrap();
                black_box(writer.finalize().unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark the two split policies on many small segments.
fn bench_split_policy(c: &mut Criterion) {
    let mut group = c.benchmark_group("split_policy");
    group.sample_size(20);
    let records = generate_records(5_000, 200);

    for policy in [SplitPolicy::SplitAtBoundary, SplitPolicy::FinishFile] {
        group.bench_function(format!("{policy:?}"), |b| {
            b.iter(|| {
                let temp_dir = TempDir::new().unwrap();
                let config = ArchiveConfig::new()
                    .target_segment_size(4 * 1024)
                    .split_policy(policy)
                    .local_catalog(false);
                let mut writer = ArchiveWriter::create(
                    &temp_dir.path().join("a"),
                    config,
                    Arc::new(InMemoryCatalog::new()),
                )
                .unwrap();
                for chunk in records.chunks(500) {
                    writer.ingest("/bench.log", chunk.to_vec()).unwrap();
                }
                black_box(writer.finalize().unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_ingest, bench_split_policy);
criterion_main!(benches);
