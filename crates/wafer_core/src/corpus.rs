//! Training corpus generation
//!
//! Every class is simulated `num_samples / 21` times on its own ChaCha stream
//! derived from the seed, then the concatenation is shuffled on a separate
//! stream. The sequential and rayon generators therefore produce the same
//! corpus for the same seed.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Uniform};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{CorpusConfig, OutcomeWeights, PipelineConfig};
use crate::error::{ConfigError, Result};
use crate::features::{extract, FeatureVector};
use crate::wafer::{simulate_wafer, PatternClass, WaferSpec, NUM_CLASSES};

/// Stream used for the final shuffle; class streams are 0..NUM_CLASSES
const SHUFFLE_STREAM: u64 = NUM_CLASSES as u64;

/// One labeled feature vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub features: FeatureVector,
    /// One-hot over [`PatternClass::ALL`]
    pub label: [f32; NUM_CLASSES],
    pub class: PatternClass,
    pub spec: WaferSpec,
}

/// Shuffled samples with per-class counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingCorpus {
    samples: Vec<TrainingSample>,
    class_counts: [usize; NUM_CLASSES],
    seed: u64,
}

impl TrainingCorpus {
    /// Wrap already generated samples. Counts are recomputed.
    pub fn from_samples(samples: Vec<TrainingSample>, seed: u64) -> Self {
        let mut class_counts = [0; NUM_CLASSES];
        for sample in &samples {
            class_counts[sample.class.index()] += 1;
        }
        Self { samples, class_counts, seed }
    }

    pub fn samples(&self) -> &[TrainingSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn class_counts(&self) -> &[usize; NUM_CLASSES] {
        &self.class_counts
    }

    pub fn count_for(&self, class: PatternClass) -> usize {
        self.class_counts[class.index()]
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Split at the tail: the last `validation_split` share is held out.
    ///
    /// # Errors
    /// `CorpusTooSmall` unless both halves get at least one sample.
    pub fn split(&self, validation_split: f32) -> Result<(&[TrainingSample], &[TrainingSample])> {
        let n = self.samples.len();
        let val = ((n as f64) * validation_split as f64).floor() as usize;
        if val == 0 || val >= n {
            return Err(ConfigError::CorpusTooSmall { samples: n }.into());
        }
        Ok(self.samples.split_at(n - val))
    }
}

/// Progress report emitted between samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorpusProgress {
    pub generated: usize,
    pub total: usize,
    pub class: PatternClass,
}

/// Drives simulation and extraction across all classes
#[derive(Debug, Clone)]
pub struct TrainingCorpusGenerator {
    config: CorpusConfig,
    weights: OutcomeWeights,
}

impl TrainingCorpusGenerator {
    pub fn new(config: CorpusConfig, weights: OutcomeWeights) -> Result<Self> {
        config.validate()?;
        weights.validate()?;
        Ok(Self { config, weights })
    }

    pub fn from_pipeline(config: &PipelineConfig) -> Result<Self> {
        Self::new(config.corpus.clone(), config.outcome.clone())
    }

    pub fn samples_per_class(&self) -> usize {
        self.config.num_samples / NUM_CLASSES
    }

    pub fn config(&self) -> &CorpusConfig {
        &self.config
    }

    fn class_rng(seed: u64, stream: u64) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(stream);
        rng
    }

    fn check_size(&self) -> Result<usize> {
        let per_class = self.samples_per_class();
        if per_class == 0 {
            return Err(ConfigError::CorpusTooSmall { samples: self.config.num_samples }.into());
        }
        Ok(per_class)
    }

    fn generate_class(
        &self,
        class: PatternClass,
        seed: u64,
        mut on_sample: impl FnMut(),
    ) -> Result<Vec<TrainingSample>> {
        let per_class = self.samples_per_class();
        let mut rng = Self::class_rng(seed, class.index() as u64);
        let die_sizes = Uniform::new(self.config.min_die_size_mm2, self.config.max_die_size_mm2);
        let label = class.one_hot();

        let mut samples = Vec::with_capacity(per_class);
        for _ in 0..per_class {
            let diameter = self.config.diameters_mm[rng.gen_range(0..self.config.diameters_mm.len())];
            let spec = WaferSpec::new(diameter, die_sizes.sample(&mut rng));
            let grid = simulate_wafer(spec, class.into(), &self.weights, &mut rng)?;
            samples.push(TrainingSample { features: extract(&grid), label, class, spec });
            on_sample();
        }
        Ok(samples)
    }

    fn finish(&self, seed: u64, per_class: Vec<Vec<TrainingSample>>) -> TrainingCorpus {
        let mut samples: Vec<TrainingSample> = per_class.into_iter().flatten().collect();
        samples.shuffle(&mut Self::class_rng(seed, SHUFFLE_STREAM));
        let corpus = TrainingCorpus::from_samples(samples, seed);
        info!(samples = corpus.len(), seed, "Training corpus ready");
        corpus
    }

    /// Generate on the calling thread
    pub fn generate(&self, seed: u64) -> Result<TrainingCorpus> {
        self.generate_with_progress(seed, |_| {})
    }

    /// Generate on the calling thread, yielding and reporting progress every
    /// `yield_every` samples.
    pub fn generate_with_progress<F>(&self, seed: u64, mut observer: F) -> Result<TrainingCorpus>
    where
        F: FnMut(CorpusProgress),
    {
        let per_class = self.check_size()?;
        let total = per_class * NUM_CLASSES;
        let every = self.config.yield_every.max(1);
        info!(total, per_class, seed, "Generating training corpus");

        let mut generated = 0usize;
        let mut by_class = Vec::with_capacity(NUM_CLASSES);
        for class in PatternClass::ALL {
            let samples = self.generate_class(class, seed, || {
                generated += 1;
                if generated % every == 0 {
                    observer(CorpusProgress { generated, total, class });
                    std::thread::yield_now();
                }
            })?;
            debug!(class = %class, samples = samples.len(), "Class generated");
            by_class.push(samples);
        }

        Ok(self.finish(seed, by_class))
    }

    /// Generate with one rayon task per class. Same result as [`Self::generate`].
    pub fn generate_parallel(&self, seed: u64) -> Result<TrainingCorpus> {
        let per_class = self.check_size()?;
        info!(total = per_class * NUM_CLASSES, seed, "Generating training corpus in parallel");

        let by_class = PatternClass::ALL
            .as_slice()
            .par_iter()
            .map(|&class| self.generate_class(class, seed, || {}))
            .collect::<Result<Vec<_>>>()?;

        Ok(self.finish(seed, by_class))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_LEN;

    fn generator(num_samples: usize) -> TrainingCorpusGenerator {
        let config = CorpusConfig { num_samples, yield_every: 50, ..Default::default() };
        TrainingCorpusGenerator::new(config, OutcomeWeights::default()).unwrap()
    }

    #[test]
    fn test_exactly_one_hundred_per_class() {
        let corpus = generator(2_100).generate(42).unwrap();
        assert_eq!(corpus.len(), 2_100);
        for class in PatternClass::ALL {
            assert_eq!(corpus.count_for(class), 100, "{class}");
        }
    }

    #[test]
    fn test_samples_are_well_formed() {
        let corpus = generator(105).generate(1).unwrap();
        for sample in corpus.samples() {
            assert_eq!(sample.features.len(), FEATURE_LEN);
            assert_eq!(sample.label, sample.class.one_hot());
            assert!(sample.spec.diameter_mm == 300.0 || sample.spec.diameter_mm == 450.0);
            assert!((25.0..200.0).contains(&sample.spec.die_size_mm2));
        }
    }

    #[test]
    fn test_integer_division_drops_remainder() {
        assert_eq!(generator(230).generate(0).unwrap().len(), 210);
    }

    #[test]
    fn test_too_few_samples_rejected() {
        let err = generator(20).generate(0).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_corpus_is_shuffled() {
        let corpus = generator(210).generate(7).unwrap();
        let first_ten: Vec<_> = corpus.samples()[..10].iter().map(|s| s.class).collect();
        assert!(first_ten.iter().any(|c| *c != first_ten[0]));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let gen = generator(420);
        assert_eq!(gen.generate(99).unwrap(), gen.generate_parallel(99).unwrap());
    }

    #[test]
    fn test_seed_changes_corpus() {
        let gen = generator(210);
        assert_ne!(gen.generate(1).unwrap(), gen.generate(2).unwrap());
    }

    #[test]
    fn test_progress_reported_every_interval() {
        let mut reports = Vec::new();
        generator(210).generate_with_progress(3, |p| reports.push(p)).unwrap();
        assert_eq!(reports.len(), 4);
        assert_eq!(reports[0].generated, 50);
        assert!(reports.iter().all(|p| p.total == 210));
    }

    #[test]
    fn test_split_holds_out_tail() {
        let corpus = generator(210).generate(5).unwrap();
        let (train, val) = corpus.split(0.2).unwrap();
        assert_eq!(val.len(), 42);
        assert_eq!(train.len(), 168);
        assert_eq!(&val[0], &corpus.samples()[168]);

        let tiny = TrainingCorpus::from_samples(corpus.samples()[..2].to_vec(), 5);
        assert!(tiny.split(0.2).is_err());
    }
}
