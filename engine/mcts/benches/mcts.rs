//! MCTS benchmarks for performance profiling.
//!
//! Run with: `cargo bench -p mcts`
//!
//! These benchmarks measure:
//! - Full MCTS search with varying simulation counts
//! - Composite vs discrete action spaces
//! - Support encoding/decoding

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mcts::{search, ActionSpace, ConstantModel, MctsConfig, MinMaxStats, SupportCodec};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

// =============================================================================
// Full MCTS Search Benchmarks
// =============================================================================

fn bench_search_simulations(c: &mut Criterion) {
    let mut group = c.benchmark_group("mcts_search_simulations");
    let space = ActionSpace::discrete(4);
    let model = ConstantModel::new(1, 4, 0.5, 1.0, SupportCodec::with_half_width(300));

    for sims in [50, 100, 200, 400, 800] {
        group.throughput(Throughput::Elements(sims as u64));
        group.bench_with_input(BenchmarkId::new("discrete_4", sims), &sims, |b, &sims| {
            let config = MctsConfig::for_training().with_simulations(sims);

            b.iter(|| {
                let mut minmax = MinMaxStats::new();
                let mut rng = ChaCha20Rng::seed_from_u64(42);
                black_box(search(&model, &[0.0; 4], &mut minmax, &space, config, &mut rng).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_composite_actions(c: &mut Criterion) {
    let mut group = c.benchmark_group("mcts_composite");
    let sims = 100u32;

    for (dims, values) in [(1usize, 9usize), (2, 3), (3, 3)] {
        let space = ActionSpace::composite(dims, values);
        let model = ConstantModel::new(dims, values, 0.0, 0.0, SupportCodec::with_half_width(300));
        let config = MctsConfig::for_training().with_simulations(sims);
        let name = format!("{}x{}", dims, values);

        group.bench_function(name, |b| {
            b.iter(|| {
                let mut minmax = MinMaxStats::new();
                let mut rng = ChaCha20Rng::seed_from_u64(42);
                black_box(search(&model, &[0.0; 4], &mut minmax, &space, config, &mut rng).unwrap())
            });
        });
    }

    group.finish();
}

// =============================================================================
// Support Codec Benchmarks
// =============================================================================

fn bench_support_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("support_codec");
    let codec = SupportCodec::with_half_width(300);
    let scalars: Vec<f32> = (0..256).map(|i| (i as f32 - 128.0) * 3.7).collect();
    let supports = codec.encode_batch(&scalars);

    group.throughput(Throughput::Elements(scalars.len() as u64));
    group.bench_function("encode_batch_256", |b| {
        b.iter(|| black_box(codec.encode_batch(black_box(&scalars))))
    });
    group.bench_function("decode_batch_256", |b| {
        b.iter(|| black_box(codec.decode_batch(black_box(&supports))))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_search_simulations,
    bench_composite_actions,
    bench_support_codec,
);
criterion_main!(benches);
