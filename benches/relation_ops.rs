//! Relation-level benchmarks.
//!
//! These benchmarks measure the relation algebra on random relations of
//! growing size, so the diagram engine sees realistic workloads.
//!
//! Run with:
//! ```bash
//! cargo bench --bench relation_ops
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rel_bdd::context::{Context, ContextConfig};
use rel_bdd::relation::Relation;

// ============================================================================
// Helpers
// ============================================================================

/// A relation with `edges` random pairs.
fn random_pairs<'ctx>(ctx: &'ctx Context, n: u64, edges: usize, seed: u64) -> Relation<'ctx> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let bits: Vec<(u64, u64)> = (0..edges).map(|_| (rng.random_range(0..n), rng.random_range(0..n))).collect();
    ctx.relation_with_bits(n, n, bits).unwrap()
}

fn context(seed: u64) -> Context {
    Context::with_config(ContextConfig::default().with_storage_bits(22).with_seed(seed))
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_composition(c: &mut Criterion) {
    let mut group = c.benchmark_group("composition");
    group.sample_size(20);

    for n in [16u64, 64, 256] {
        group.bench_with_input(BenchmarkId::new("random_pairs", n), &n, |b, &n| {
            b.iter(|| {
                let ctx = context(42);
                let r = random_pairs(&ctx, n, 2 * n as usize, 1);
                let s = random_pairs(&ctx, n, 2 * n as usize, 2);
                let count = r.composition(&s).unwrap().count();
                count
            });
        });
    }

    group.finish();
}

fn bench_closure(c: &mut Criterion) {
    let mut group = c.benchmark_group("closure");
    group.sample_size(10);

    for n in [16u64, 64, 128] {
        group.bench_with_input(BenchmarkId::new("squaring", n), &n, |b, &n| {
            b.iter(|| {
                let ctx = context(7);
                let r = random_pairs(&ctx, n, n as usize, 3);
                let mut current = r.join(&ctx.identity(n).unwrap()).unwrap();
                loop {
                    let next = current.composition(&current).unwrap();
                    if next == current {
                        break;
                    }
                    current = next;
                }
                current.count()
            });
        });
    }

    group.finish();
}

fn bench_boolean_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("boolean_ops");

    for n in [32u64, 128, 512] {
        group.bench_with_input(BenchmarkId::new("meet_join_complement", n), &n, |b, &n| {
            b.iter(|| {
                let ctx = context(11);
                let r = random_pairs(&ctx, n, 4 * n as usize, 4);
                let s = random_pairs(&ctx, n, 4 * n as usize, 5);
                let m = r.meet(&s).unwrap();
                let j = r.join(&s).unwrap();
                let count = j.complement().unwrap().join(&m).unwrap().count();
                count
            });
        });
    }

    group.finish();
}

fn bench_transpose(c: &mut Criterion) {
    let mut group = c.benchmark_group("transpose");

    for n in [64u64, 256, 1024] {
        group.bench_with_input(BenchmarkId::new("random_pairs", n), &n, |b, &n| {
            b.iter(|| {
                let ctx = context(13);
                let r = random_pairs(&ctx, n, 2 * n as usize, 6);
                let count = r.transpose().unwrap().count();
                count
            });
        });
    }

    group.finish();
}

fn bench_random_density(c: &mut Criterion) {
    let mut group = c.benchmark_group("random");
    group.sample_size(20);

    for density in [0.1, 0.5, 0.9] {
        group.bench_with_input(BenchmarkId::new("32x32", density), &density, |b, &density| {
            b.iter(|| {
                let ctx = context(17);
                let mut r = ctx.relation(32, 32).unwrap();
                r.random(density).unwrap();
                r.count()
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_composition,
    bench_closure,
    bench_boolean_ops,
    bench_transpose,
    bench_random_density,
);
criterion_main!(benches);
