//! Benchmarks for hypothesis extension and scoring cost.
//!
//! Extension appends to the per-step histories and shares attention
//! distributions behind `Arc`: one `extend` copies pointers, never the
//! accumulated attention payload, as the decode horizon deepens.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use sheaf_core::search::{Hypothesis, LinguisticIds, ScoreMode, Scorer};
use std::sync::Arc;

const ATTN_LEN: usize = 400;

fn random_attn(rng: &mut impl Rng) -> Arc<[f32]> {
    let raw: Vec<f32> = (0..ATTN_LEN).map(|_| rng.gen_range(0.0..1.0)).collect();
    let sum: f32 = raw.iter().sum();
    raw.into_iter().map(|x| x / sum).collect::<Vec<_>>().into()
}

/// Build a hypothesis `depth` steps deep with distinct tokens.
fn setup_hypothesis(depth: usize) -> Hypothesis<u32> {
    let mut rng = rand::thread_rng();
    let mut hyp = Hypothesis::root(2, 0, ATTN_LEN, false);
    for i in 0..depth {
        hyp = hyp
            .extend(
                10 + i as u32,
                rng.gen_range(-3.0..0.0),
                0,
                random_attn(&mut rng),
                None,
                vec![0.0; ATTN_LEN],
            )
            .unwrap();
    }
    hyp
}

/// Extension cost across decode depths.
fn bench_extend_vs_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("extend_vs_depth");
    group.throughput(Throughput::Elements(1));

    for depth in [1, 16, 128, 1024].iter() {
        let hyp = setup_hypothesis(*depth);
        let mut rng = rand::thread_rng();
        let attn = random_attn(&mut rng);

        group.bench_with_input(BenchmarkId::new("depth", depth), depth, |b, _| {
            b.iter(|| {
                let child = hyp
                    .extend(
                        black_box(99_999),
                        black_box(-0.5),
                        0,
                        attn.clone(),
                        None,
                        vec![0.0; ATTN_LEN],
                    )
                    .unwrap();
                black_box(child)
            })
        });
    }

    group.finish();
}

/// Smart scoring cost across decode depths.
fn bench_smart_score_vs_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("smart_score_vs_depth");
    group.throughput(Throughput::Elements(1));

    let scorer = Scorer {
        stop_token: 3,
        n_reserved: 4,
        mode: ScoreMode::Smart,
        ids: LinguisticIds {
            start_sent: [2].into_iter().collect(),
            stopwords: [10, 11].into_iter().collect(),
            pronouns: [12, 13].into_iter().collect(),
        },
    };

    for depth in [16, 128, 1024].iter() {
        let hyp = setup_hypothesis(*depth);

        group.bench_with_input(BenchmarkId::new("depth", depth), depth, |b, _| {
            b.iter(|| {
                let score = scorer.score(black_box(&hyp)).unwrap();
                black_box(score)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_extend_vs_depth, bench_smart_score_vs_depth);
criterion_main!(benches);
