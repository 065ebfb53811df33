//! # Pattern Classifier
//!
//! The caller owns a [`ModelState`]; nothing here is global. Training moves
//! the state through `Untrained → Training → Trained` and puts the previous
//! state back if the run fails.
//!
//! ```rust,no_run
//! use wafer_core::classifier::ModelState;
//! use wafer_core::config::PipelineConfig;
//!
//! let mut state = ModelState::default();
//! let model = state.ensure_trained(&PipelineConfig::quick()).unwrap();
//! println!("validation accuracy {:.2}", model.report().val_accuracy);
//! ```

mod trainer;

pub use trainer::{EpochControl, EpochReport, Trainer, TrainingReport};

use nalgebra::DMatrix;
use std::mem;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::corpus::{TrainingCorpus, TrainingCorpusGenerator};
use crate::error::{ConfigError, Result, WaferError};
use crate::nn::Network;
use crate::wafer::{PatternClass, NUM_CLASSES};

/// Learned weights plus what is needed to interpret them
#[derive(Debug, Clone)]
pub struct TrainedModel {
    network: Network,
    classes: [PatternClass; NUM_CLASSES],
    report: TrainingReport,
}

impl TrainedModel {
    pub(crate) fn new(network: Network, classes: [PatternClass; NUM_CLASSES], report: TrainingReport) -> Self {
        Self { network, classes, report }
    }

    pub fn input_dim(&self) -> usize {
        self.network.input_dim()
    }

    /// Output order of [`TrainedModel::predict_proba`]
    pub fn classes(&self) -> &[PatternClass; NUM_CLASSES] {
        &self.classes
    }

    pub fn report(&self) -> &TrainingReport {
        &self.report
    }

    /// Class probabilities for one feature vector. Takes `&self` only, so a
    /// shared model serves concurrent callers.
    ///
    /// # Errors
    /// `ConfigError::FeatureLength` if the vector does not match the input width.
    pub fn predict_proba(&self, features: &[f32]) -> Result<Vec<f32>> {
        if features.len() != self.input_dim() {
            return Err(ConfigError::FeatureLength { expected: self.input_dim(), found: features.len() }.into());
        }
        let x = DMatrix::from_row_slice(1, features.len(), features);
        Ok(self.network.predict_proba(&x).row(0).iter().copied().collect())
    }
}

/// Lifecycle of the classifier owned by the caller
#[derive(Debug, Clone, Default)]
pub enum ModelState {
    #[default]
    Untrained,
    /// A run is in progress; only observable from inside training callbacks
    Training,
    Trained(TrainedModel),
}

impl ModelState {
    pub fn is_trained(&self) -> bool {
        matches!(self, ModelState::Trained(_))
    }

    pub fn model(&self) -> Option<&TrainedModel> {
        match self {
            ModelState::Trained(model) => Some(model),
            _ => None,
        }
    }

    /// Train once per process; a no-op when already trained.
    pub fn ensure_trained(&mut self, config: &PipelineConfig) -> Result<&TrainedModel> {
        if self.is_trained() {
            return self.model().ok_or(WaferError::UntrainedModel);
        }
        self.retrain(config)
    }

    /// Generate a fresh corpus and train, replacing any existing model.
    pub fn retrain(&mut self, config: &PipelineConfig) -> Result<&TrainedModel> {
        config.validate()?;
        let corpus = TrainingCorpusGenerator::from_pipeline(config)?.generate(config.trainer.seed)?;
        let trainer = Trainer::new(config.trainer.clone())?;
        self.train_on(&trainer, &corpus)
    }

    /// Train on an existing corpus. On failure the prior state is restored.
    pub fn train_on(&mut self, trainer: &Trainer, corpus: &TrainingCorpus) -> Result<&TrainedModel> {
        let prior = mem::replace(self, ModelState::Training);
        match trainer.train(corpus) {
            Ok(model) => {
                info!(epochs = model.report().epochs_run, "Classifier trained");
                *self = ModelState::Trained(model);
            }
            Err(err) => {
                warn!(error = %err, "Training failed, keeping previous model state");
                *self = prior;
                return Err(err);
            }
        }
        self.model().ok_or(WaferError::UntrainedModel)
    }

    /// Drop any trained model
    pub fn reset(&mut self) {
        *self = ModelState::Untrained;
    }
}
