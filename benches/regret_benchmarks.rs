//! Top-k and regret benchmarks
//!
//! Toyota Way: Genchi Genbutsu (measure, don't guess)
//!
//! Regret runs once per dataset, per formulation, per candidate, so the
//! heap-based top-k must stay well ahead of a full sort as pipelines grow.
//!
//! Run with: cargo bench --bench regret_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use trueno_tune::problem::{adapt, ProblemKind};
use trueno_tune::record::{Corpus, Metafeatures, PerformanceRecord};
use trueno_tune::regret::regret;
use trueno_tune::topk::{rank_order, top_k_ids};

const PIPELINE_COUNTS: [usize; 3] = [100, 1_000, 10_000];
const K: usize = 25;

#[allow(clippy::cast_precision_loss)]
fn scores(n: usize, salt: usize) -> Vec<(String, f64)> {
    (0..n)
        .map(|i| (format!("p{i:05}"), ((i * 7_919 + salt) % 1_009) as f64 / 1_009.0))
        .collect()
}

fn dataset(n: usize) -> Corpus {
    Corpus::from_records(
        scores(n, 0)
            .into_iter()
            .map(|(p, s)| PerformanceRecord::new("D", p, Metafeatures::new(), s)),
    )
    .unwrap()
}

/// Heap top-k against a full ranking
fn bench_top_k(c: &mut Criterion) {
    let mut group = c.benchmark_group("top_k");

    for n in PIPELINE_COUNTS {
        let items = scores(n, 13);
        group.bench_with_input(BenchmarkId::new("heap", n), &items, |b, items| {
            b.iter(|| top_k_ids(black_box(items), K).unwrap().len());
        });
        group.bench_with_input(BenchmarkId::new("full_rank", n), &items, |b, items| {
            b.iter(|| rank_order(black_box(items)).len());
        });
    }

    group.finish();
}

/// Adapter plus regret for one dataset, per formulation
fn bench_regret(c: &mut Criterion) {
    let mut group = c.benchmark_group("regret");

    for n in PIPELINE_COUNTS {
        let corpus = dataset(n);
        let predicted = scores(n, 101);
        for kind in ProblemKind::ALL {
            group.bench_with_input(BenchmarkId::new(kind.as_str(), n), &predicted, |b, predicted| {
                let dataset = corpus.get("D").unwrap();
                b.iter(|| {
                    let selection = adapt(kind, "D", black_box(predicted), K).unwrap();
                    regret(dataset, &selection, K).unwrap()
                });
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_top_k, bench_regret);
criterion_main!(benches);
