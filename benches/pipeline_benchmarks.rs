//! Performance benchmarks for Chatterbox Gateway
//!
//! Run with: cargo bench
//! Or for specific benchmarks: cargo bench -- <filter>

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use chatterbox_gateway::core::cache::{AudioCache, Fingerprint};
use chatterbox_gateway::core::segmenter::split;
use chatterbox_gateway::core::types::GenerationResult;

const PARAGRAPH: &str = "The lighthouse keeper climbed the stairs at dusk. \
    Every evening the lamp needed oil, and every evening the sea looked different. \
    Tonight the waves were calm! Was that a ship on the horizon? \
    He lit the wick and watched the beam sweep across the water. ";

/// Benchmark sentence segmentation for streaming
fn bench_segmentation(c: &mut Criterion) {
    let mut group = c.benchmark_group("segmentation");
    group.measurement_time(Duration::from_secs(5));

    for repeats in [1usize, 10, 50] {
        let text = PARAGRAPH.repeat(repeats);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("split", text.len()), &text, |b, text| {
            b.iter(|| split(black_box(text), 150, 3));
        });
    }

    group.finish();
}

/// Benchmark request fingerprinting
fn bench_fingerprint(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint");

    for len in [50usize, 500, 5000] {
        let text: String = PARAGRAPH.chars().cycle().take(len).collect();
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("compute", len), &text, |b, text| {
            b.iter(|| Fingerprint::compute(black_box(text), "narrator", "narrator"));
        });
    }

    group.finish();
}

/// Benchmark cache lookups against a full cache
fn bench_cache(c: &mut Criterion) {
    let cache = AudioCache::new(100);
    let result = Arc::new(GenerationResult {
        audio: Bytes::from(vec![0u8; 48_000]),
        sample_rate: 24_000,
        duration_secs: 1.0,
        character_id: "narrator".to_string(),
        voice_id: "narrator".to_string(),
        language: "en".to_string(),
        generation_ms: 500,
        cached: false,
    });
    let keys: Vec<Fingerprint> = (0..100)
        .map(|i| Fingerprint::compute(&format!("Line number {i}."), "narrator", "narrator"))
        .collect();
    for key in &keys {
        cache.put(*key, Arc::clone(&result));
    }
    let miss = Fingerprint::compute("Never cached.", "narrator", "narrator");

    let mut group = c.benchmark_group("cache");
    group.bench_function("hit", |b| b.iter(|| cache.get(black_box(&keys[42]))));
    group.bench_function("miss", |b| b.iter(|| cache.get(black_box(&miss))));
    group.bench_function("put_evict", |b| {
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            let key = Fingerprint::compute(&i.to_string(), "narrator", "narrator");
            cache.put(key, Arc::clone(&result));
        });
    });
    group.finish();
}

criterion_group!(benches, bench_segmentation, bench_fingerprint, bench_cache);
criterion_main!(benches);
