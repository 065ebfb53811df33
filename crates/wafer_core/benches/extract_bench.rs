use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use wafer_core::config::{CorpusConfig, OutcomeWeights};
use wafer_core::corpus::TrainingCorpusGenerator;
use wafer_core::features::extract;
use wafer_core::wafer::{simulate_wafer, PatternClass, WaferSpec};

fn bench_simulate_and_extract(c: &mut Criterion) {
    let weights = OutcomeWeights::default();
    let mut group = c.benchmark_group("wafer");

    for (diameter, die) in [(300.0, 100.0), (450.0, 25.0)] {
        let spec = WaferSpec::new(diameter, die);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let grid = simulate_wafer(spec, PatternClass::RadialPatternDefect.into(), &weights, &mut rng)
            .unwrap_or_else(|e| panic!("simulate {diameter}/{die}: {e}"));

        group.bench_function(format!("extract_{diameter}_{die}"), |b| {
            b.iter(|| extract(black_box(&grid)))
        });
        group.bench_function(format!("simulate_{diameter}_{die}"), |b| {
            b.iter_batched(
                || ChaCha8Rng::seed_from_u64(7),
                |mut rng| simulate_wafer(spec, PatternClass::ClusterFailure.into(), &weights, &mut rng),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_corpus(c: &mut Criterion) {
    let config = CorpusConfig { num_samples: 210, ..Default::default() };
    let generator = TrainingCorpusGenerator::new(config, OutcomeWeights::default())
        .unwrap_or_else(|e| panic!("generator: {e}"));

    let mut group = c.benchmark_group("corpus_210");
    group.sample_size(10);
    group.bench_function("sequential", |b| b.iter(|| generator.generate(black_box(3))));
    group.bench_function("parallel", |b| b.iter(|| generator.generate_parallel(black_box(3))));
    group.finish();
}

criterion_group!(benches, bench_simulate_and_extract, bench_corpus);
criterion_main!(benches);
