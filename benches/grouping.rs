//! Benchmarks for grouping, range layout and encoded-length arithmetic
//!
//! These run once per publish over the whole tree, so they should stay
//! well below the cost of a single ledger round trip even for large sites.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use blobsite::publish::grouper::{group_files, FileRecord};
use blobsite::publish::site::byte_ranges;
use blobsite::storage::{encoded_blob_length, EncodingType};

/// A site of `count` files with sizes cycling through a few typical values
fn create_site(count: usize) -> Vec<FileRecord> {
    const SIZES: [usize; 5] = [512, 2_048, 16_384, 120, 65_536];
    (0..count)
        .map(|i| FileRecord::new(format!("/assets/file-{:05}.js", i), vec![0u8; SIZES[i % SIZES.len()]]))
        .collect()
}

fn benchmark_group_files(c: &mut Criterion) {
    let mut group = c.benchmark_group("group_files");

    for count in [100, 1_000, 5_000].iter() {
        let files = create_site(*count);
        group.bench_with_input(BenchmarkId::new("packed_1mib", count), count, |b, _| {
            b.iter(|| group_files(black_box(files.clone()), 1024 * 1024));
        });
        group.bench_with_input(BenchmarkId::new("one_per_file", count), count, |b, _| {
            b.iter(|| group_files(black_box(files.clone()), 0));
        });
    }

    group.finish();
}

fn benchmark_byte_ranges(c: &mut Criterion) {
    let sizes: Vec<u64> = (0..10_000u64).map(|i| (i * 37) % 4_096).collect();

    c.bench_function("byte_ranges_10k", |b| {
        b.iter(|| byte_ranges(black_box(&sizes)));
    });
}

fn benchmark_encoded_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("encoded_blob_length");

    for n_shards in [10u16, 100, 1_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(n_shards), n_shards, |b, n| {
            b.iter(|| {
                for length in (0..1_000u64).map(|i| i * 4_099) {
                    black_box(encoded_blob_length(black_box(length), *n, EncodingType::RedStuff));
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_group_files,
    benchmark_byte_ranges,
    benchmark_encoded_length
);
criterion_main!(benches);
