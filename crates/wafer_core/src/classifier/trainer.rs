//! Minibatch training loop

use nalgebra::DMatrix;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::TrainedModel;
use crate::config::TrainerConfig;
use crate::corpus::{TrainingCorpus, TrainingSample};
use crate::error::{ConfigError, Result, TrainingFailure};
use crate::nn::{argmax_rows, softmax_cross_entropy, Adam, Network};
use crate::wafer::{PatternClass, NUM_CLASSES};

/// Metrics after one epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochReport {
    pub epoch: usize,
    pub train_loss: f32,
    pub train_accuracy: f32,
    pub val_loss: f32,
    pub val_accuracy: f32,
}

/// Observer verdict between epochs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochControl {
    Continue,
    Stop,
}

/// Summary of a finished training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub epochs_run: usize,
    pub final_loss: f32,
    pub train_accuracy: f32,
    pub val_accuracy: f32,
    pub early_stopped: bool,
    pub stopped_by_observer: bool,
    pub train_samples: usize,
    pub val_samples: usize,
    pub history: Vec<EpochReport>,
}

fn to_matrices(samples: &[TrainingSample], input_dim: usize) -> (DMatrix<f32>, DMatrix<f32>) {
    let x = DMatrix::from_fn(samples.len(), input_dim, |i, j| samples[i].features.as_slice()[j]);
    let y = DMatrix::from_fn(samples.len(), NUM_CLASSES, |i, j| samples[i].label[j]);
    (x, y)
}

fn gather_rows(m: &DMatrix<f32>, rows: &[usize]) -> DMatrix<f32> {
    DMatrix::from_fn(rows.len(), m.ncols(), |i, j| m[(rows[i], j)])
}

fn accuracy(probs: &DMatrix<f32>, targets: &DMatrix<f32>) -> (usize, usize) {
    let hits = argmax_rows(probs)
        .into_iter()
        .zip(argmax_rows(targets))
        .filter(|(p, t)| p == t)
        .count();
    (hits, probs.nrows())
}

/// Trains the pattern classifier from a corpus
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn train(&self, corpus: &TrainingCorpus) -> Result<TrainedModel> {
        self.train_with_observer(corpus, |_| EpochControl::Continue)
    }

    /// Train, consulting `observer` after every epoch. Returning
    /// [`EpochControl::Stop`] ends training with the weights of that epoch.
    ///
    /// # Errors
    /// - `ConfigError` for a corpus that cannot be split or mixed vector lengths
    /// - `TrainingFailure::NonFiniteLoss` when a batch loss is NaN or infinite
    pub fn train_with_observer<F>(&self, corpus: &TrainingCorpus, mut observer: F) -> Result<TrainedModel>
    where
        F: FnMut(&EpochReport) -> EpochControl,
    {
        let cfg = &self.config;
        let (train, val) = corpus.split(cfg.validation_split)?;
        let input_dim = train[0].features.len();
        if let Some(bad) = corpus.samples().iter().find(|s| s.features.len() != input_dim) {
            return Err(ConfigError::FeatureLength { expected: input_dim, found: bad.features.len() }.into());
        }

        let (x_train, y_train) = to_matrices(train, input_dim);
        let (x_val, y_val) = to_matrices(val, input_dim);

        let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
        let mut network = Network::new(input_dim, NUM_CLASSES, cfg, &mut rng);
        let mut adam = Adam::new(cfg.learning_rate, cfg.beta1, cfg.beta2, cfg.adam_epsilon);
        let mut order: Vec<usize> = (0..train.len()).collect();

        info!(
            train = train.len(),
            validation = val.len(),
            parameters = network.parameter_count(),
            max_epochs = cfg.max_epochs,
            "Training pattern classifier"
        );

        let mut history = Vec::new();
        let mut early_stopped = false;
        let mut stopped_by_observer = false;

        for epoch in 0..cfg.max_epochs {
            order.shuffle(&mut rng);
            let mut loss_sum = 0.0f32;
            let mut hits = 0usize;

            for (batch, rows) in order.chunks(cfg.batch_size).enumerate() {
                let xb = gather_rows(&x_train, rows);
                let yb = gather_rows(&y_train, rows);
                let logits = network.forward_train(&xb, &mut rng);
                let (ce, probs, grad) = softmax_cross_entropy(&logits, &yb);
                let loss = ce + network.l2_penalty();
                if !loss.is_finite() {
                    return Err(TrainingFailure::NonFiniteLoss { epoch, batch, loss }.into());
                }
                network.backward(&grad);
                network.apply_gradients(&mut adam);

                loss_sum += loss * rows.len() as f32;
                hits += accuracy(&probs, &yb).0;
            }

            let (val_ce, val_probs, _) = softmax_cross_entropy(&network.logits(&x_val), &y_val);
            let (val_hits, val_n) = accuracy(&val_probs, &y_val);
            let report = EpochReport {
                epoch,
                train_loss: loss_sum / train.len() as f32,
                train_accuracy: hits as f32 / train.len() as f32,
                val_loss: val_ce,
                val_accuracy: val_hits as f32 / val_n.max(1) as f32,
            };
            debug!(
                epoch,
                loss = report.train_loss,
                accuracy = report.train_accuracy,
                val_loss = report.val_loss,
                val_accuracy = report.val_accuracy,
                "Epoch finished"
            );
            history.push(report);

            if observer(&report) == EpochControl::Stop {
                info!(epoch, "Training stopped by observer");
                stopped_by_observer = true;
                break;
            }
            if epoch > cfg.early_stop_min_epoch && report.val_accuracy > cfg.early_stop_val_accuracy {
                info!(epoch, val_accuracy = report.val_accuracy, "Early stopping");
                early_stopped = true;
                break;
            }
        }

        let last = history.last().copied().unwrap_or(EpochReport {
            epoch: 0,
            train_loss: f32::NAN,
            train_accuracy: 0.0,
            val_loss: f32::NAN,
            val_accuracy: 0.0,
        });
        let report = TrainingReport {
            epochs_run: history.len(),
            final_loss: last.train_loss,
            train_accuracy: last.train_accuracy,
            val_accuracy: last.val_accuracy,
            early_stopped,
            stopped_by_observer,
            train_samples: train.len(),
            val_samples: val.len(),
            history,
        };
        info!(
            epochs = report.epochs_run,
            loss = report.final_loss,
            val_accuracy = report.val_accuracy,
            "Training complete"
        );

        Ok(TrainedModel::new(network, PatternClass::ALL, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CorpusConfig, OutcomeWeights};
    use crate::corpus::TrainingCorpusGenerator;
    use crate::error::WaferError;
    use crate::features::FeatureVector;

    fn corpus(num_samples: usize) -> TrainingCorpus {
        let config = CorpusConfig { num_samples, ..Default::default() };
        TrainingCorpusGenerator::new(config, OutcomeWeights::default())
            .unwrap()
            .generate(11)
            .unwrap()
    }

    fn short(max_epochs: usize) -> Trainer {
        Trainer::new(TrainerConfig { max_epochs, batch_size: 64, ..Default::default() }).unwrap()
    }

    #[test]
    fn test_training_improves_over_chance() {
        let model = short(15).train(&corpus(840)).unwrap();
        let report = model.report();
        assert_eq!(report.epochs_run, 15);
        assert_eq!(report.val_samples, 168);
        assert!(report.history[14].train_loss < report.history[0].train_loss);
        assert!(report.val_accuracy > 2.0 / NUM_CLASSES as f32, "{}", report.val_accuracy);
    }

    #[test]
    fn test_observer_stops_between_epochs() {
        let mut seen = 0;
        let model = short(50)
            .train_with_observer(&corpus(210), |r| {
                seen += 1;
                if r.epoch == 2 {
                    EpochControl::Stop
                } else {
                    EpochControl::Continue
                }
            })
            .unwrap();
        assert_eq!(seen, 3);
        assert_eq!(model.report().epochs_run, 3);
        assert!(model.report().stopped_by_observer);
    }

    #[test]
    fn test_early_stop_after_min_epoch() {
        let trainer = Trainer::new(TrainerConfig {
            max_epochs: 40,
            early_stop_min_epoch: 2,
            early_stop_val_accuracy: -1.0,
            ..Default::default()
        })
        .unwrap();
        let model = trainer.train(&corpus(210)).unwrap();
        assert!(model.report().early_stopped);
        assert_eq!(model.report().epochs_run, 4);
    }

    #[test]
    fn test_nan_feature_aborts_training() {
        let mut samples = corpus(210).samples().to_vec();
        let mut poisoned = samples[0].features.clone().into_inner();
        poisoned[3] = f32::NAN;
        samples[0].features = FeatureVector::new(poisoned);
        let err = short(3).train(&TrainingCorpus::from_samples(samples, 0)).unwrap_err();
        assert!(matches!(err, WaferError::Training(TrainingFailure::NonFiniteLoss { epoch: 0, .. })));
    }

    #[test]
    fn test_tiny_corpus_rejected() {
        let samples = corpus(21).samples()[..1].to_vec();
        let err = short(1).train(&TrainingCorpus::from_samples(samples, 0)).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_same_seed_same_model() {
        let data = corpus(210);
        let a = short(2).train(&data).unwrap();
        let b = short(2).train(&data).unwrap();
        assert_eq!(a.report(), b.report());
    }
}
