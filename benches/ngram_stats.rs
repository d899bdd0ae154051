//! N-gram statistics over a synthetic corpus
//!
//! ```bash
//! cargo bench --bench ngram_stats
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::collections::HashMap;
use twittersphere::corpus::MemoryCorpus;
use twittersphere::stats::{compute_ngram_stats, StatsOptions};

const WORDS: &[&str] = &[
    "climate", "action", "solar", "wind", "energy", "coffee", "runner", "dad", "teacher", "news",
    "brisbane", "perth", "views", "own", "mine", "bot", "official", "account", "green", "tea",
    "renewable", "policy", "science", "ocean", "reef", "farmer", "mum", "writer", "gamer", "art",
];

fn corpus(size: usize) -> (MemoryCorpus, HashMap<String, bool>) {
    let texts: Vec<(String, String)> = (0..size)
        .map(|i| {
            let words: Vec<&str> = (0..15)
                .map(|k| WORDS[(i * 13 + k * 7 + k * k) % WORDS.len()])
                .collect();
            (i.to_string(), words.join(" "))
        })
        .collect();
    let verdicts = (0..size).map(|i| (i.to_string(), i % 3 == 0)).collect();
    (MemoryCorpus::from_texts(texts), verdicts)
}

fn bench_sequential(c: &mut Criterion) {
    let options = StatsOptions::default();
    let mut group = c.benchmark_group("ngram_stats_sequential");

    for size in [1_000, 10_000] {
        let (corpus, verdicts) = corpus(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(compute_ngram_stats(&corpus, &verdicts, &options)));
        });
    }

    group.finish();
}

#[cfg(feature = "parallel")]
fn bench_parallel(c: &mut Criterion) {
    use twittersphere::stats::par_compute_ngram_stats;

    let options = StatsOptions::default();
    let mut group = c.benchmark_group("ngram_stats_parallel");

    for size in [1_000, 10_000] {
        let (corpus, verdicts) = corpus(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(par_compute_ngram_stats(&corpus, &verdicts, &options)));
        });
    }

    group.finish();
}

#[cfg(not(feature = "parallel"))]
fn bench_parallel(_c: &mut Criterion) {}

criterion_group!(benches, bench_sequential, bench_parallel);
criterion_main!(benches);
