//! Single-sample inference with ranked output

use rand::RngCore;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classifier::{ModelState, TrainedModel};
use crate::config::PipelineConfig;
use crate::error::{ConfigError, Result, WaferError};
use crate::features::{extract, FeatureVector, FEATURE_LEN};
use crate::probability::ProbabilityValidator;
use crate::wafer::{simulate_wafer, FieldSelector, PatternClass, WaferGrid, WaferSpec, NUM_CLASSES};

/// Whether `predict` may train an untrained model on demand
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoTrain {
    #[default]
    Enabled,
    Disabled,
}

/// One entry of the ranked output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RankedLabel {
    pub label: PatternClass,
    pub probability: f64,
}

/// Classifier verdict for one feature vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PredictionResult {
    /// Probability per class in [`PatternClass::ALL`] order, summing to 1
    pub distribution: Vec<f64>,
    pub label: PatternClass,
    /// Probability of `label`
    pub confidence: f64,
    /// Highest-probability labels, descending
    pub top_k: Vec<RankedLabel>,
}

impl PredictionResult {
    pub fn probability_of(&self, class: PatternClass) -> f64 {
        self.distribution.get(class.index()).copied().unwrap_or(0.0)
    }
}

/// Answers classification requests against a caller-owned [`ModelState`]
#[derive(Debug, Clone)]
pub struct PredictionService {
    config: PipelineConfig,
    auto_train: AutoTrain,
    top_k: usize,
    validator: ProbabilityValidator,
}

impl Default for PredictionService {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl PredictionService {
    pub const DEFAULT_TOP_K: usize = 3;

    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            auto_train: AutoTrain::Enabled,
            top_k: Self::DEFAULT_TOP_K,
            validator: ProbabilityValidator::with_tolerance(1e-6),
        }
    }

    pub fn with_auto_train(mut self, auto_train: AutoTrain) -> Self {
        self.auto_train = auto_train;
        self
    }

    /// Ranked output length, clamped to 1..=21
    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k.clamp(1, NUM_CLASSES);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Classify a feature vector, training first if allowed and needed.
    ///
    /// The length check runs before anything else, so a malformed vector
    /// never triggers training and never changes `state`.
    ///
    /// # Errors
    /// - `ConfigError::FeatureLength` for a vector of the wrong length
    /// - `WaferError::UntrainedModel` when untrained and auto-training is off
    /// - whatever training returns when auto-training fails
    pub fn predict(&self, state: &mut ModelState, features: &FeatureVector) -> Result<PredictionResult> {
        let expected = state.model().map_or(FEATURE_LEN, |m| m.input_dim());
        features.check_len(expected)?;

        let model = match (state.is_trained(), self.auto_train) {
            (true, _) => state.model().ok_or(WaferError::UntrainedModel)?,
            (false, AutoTrain::Enabled) => {
                info!("Model untrained, training on demand");
                state.ensure_trained(&self.config)?
            }
            (false, AutoTrain::Disabled) => return Err(WaferError::UntrainedModel),
        };
        self.predict_with(model, features)
    }

    /// Classify with an already trained model; no state involved.
    pub fn predict_with(&self, model: &TrainedModel, features: &FeatureVector) -> Result<PredictionResult> {
        let raw = model.predict_proba(features.as_slice())?;
        let widened: Vec<f64> = raw.iter().map(|&p| p as f64).collect();
        let distribution = self
            .validator
            .validate_and_normalize(&widened)
            .map_err(|msg| ConfigError::Trainer(format!("classifier output: {msg}")))?;

        let mut ranked: Vec<RankedLabel> = model
            .classes()
            .iter()
            .zip(distribution.iter())
            .map(|(&label, &probability)| RankedLabel { label, probability })
            .collect();
        ranked.sort_by(|a, b| b.probability.total_cmp(&a.probability));
        ranked.truncate(self.top_k);

        let best = ranked[0];
        debug!(label = %best.label, confidence = best.probability, "Prediction");
        Ok(PredictionResult { distribution, label: best.label, confidence: best.probability, top_k: ranked })
    }

    /// Simulate a fresh wafer, extract its features and classify them.
    pub fn simulate_and_predict(
        &self,
        state: &mut ModelState,
        spec: WaferSpec,
        selector: FieldSelector,
        rng: &mut dyn RngCore,
    ) -> Result<(WaferGrid, PredictionResult)> {
        let grid = simulate_wafer(spec, selector, &self.config.outcome, rng)?;
        let features = extract(&grid);
        let prediction = self.predict(state, &features)?;
        Ok((grid, prediction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Trainer;
    use crate::config::{CorpusConfig, OutcomeWeights, TrainerConfig};
    use crate::corpus::TrainingCorpusGenerator;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn tiny_config() -> PipelineConfig {
        let mut cfg = PipelineConfig::default();
        cfg.corpus.num_samples = 210;
        cfg.trainer.max_epochs = 2;
        cfg
    }

    fn trained_state() -> ModelState {
        let corpus = TrainingCorpusGenerator::new(
            CorpusConfig { num_samples: 420, ..Default::default() },
            OutcomeWeights::default(),
        )
        .unwrap()
        .generate(3)
        .unwrap();
        let trainer = Trainer::new(TrainerConfig { max_epochs: 3, ..Default::default() }).unwrap();
        let mut state = ModelState::default();
        state.train_on(&trainer, &corpus).unwrap();
        state
    }

    #[test]
    fn test_wrong_length_leaves_untrained_state_alone() {
        let service = PredictionService::new(tiny_config());
        let mut state = ModelState::default();
        let err = service.predict(&mut state, &FeatureVector::new(vec![0.5; 20])).unwrap_err();
        assert!(matches!(
            err,
            WaferError::Configuration(ConfigError::FeatureLength { expected: 36, found: 20 })
        ));
        assert!(matches!(state, ModelState::Untrained));
    }

    #[test]
    fn test_disabled_auto_train_reports_untrained() {
        let service = PredictionService::new(tiny_config()).with_auto_train(AutoTrain::Disabled);
        let mut state = ModelState::default();
        let err = service.predict(&mut state, &FeatureVector::new(vec![0.0; FEATURE_LEN])).unwrap_err();
        assert!(matches!(err, WaferError::UntrainedModel));
        assert!(err.is_recoverable());
        assert!(!state.is_trained());
    }

    #[test]
    fn test_auto_train_on_first_predict() {
        let service = PredictionService::new(tiny_config());
        let mut state = ModelState::default();
        let result = service.predict(&mut state, &FeatureVector::new(vec![0.2; FEATURE_LEN])).unwrap();
        assert!(state.is_trained());
        assert_eq!(result.distribution.len(), NUM_CLASSES);
    }

    #[test]
    fn test_result_is_normalized_and_ranked() {
        let state = trained_state();
        let model = state.model().unwrap();
        let service = PredictionService::default().with_top_k(5);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let grid = simulate_wafer(
            WaferSpec::new(300.0, 100.0),
            PatternClass::EdgeDieFailure.into(),
            &OutcomeWeights::default(),
            &mut rng,
        )
        .unwrap();
        let result = service.predict_with(model, &extract(&grid)).unwrap();

        let sum: f64 = result.distribution.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert_eq!(result.top_k.len(), 5);
        assert!(result.top_k.windows(2).all(|w| w[0].probability >= w[1].probability));
        assert_eq!(result.top_k[0].label, result.label);
        assert_eq!(result.confidence, result.probability_of(result.label));
    }

    #[test]
    fn test_top_k_is_clamped() {
        assert_eq!(PredictionService::default().with_top_k(0).top_k(), 1);
        assert_eq!(PredictionService::default().with_top_k(99).top_k(), NUM_CLASSES);
    }

    #[test]
    fn test_wrong_length_on_trained_state_keeps_model() {
        let service = PredictionService::default();
        let mut state = trained_state();
        let before = state.model().unwrap().report().clone();
        assert!(service.predict(&mut state, &FeatureVector::new(vec![0.0; 40])).is_err());
        assert_eq!(state.model().unwrap().report(), &before);
    }

    #[test]
    fn test_simulate_and_predict_uses_trained_model() {
        let service = PredictionService::default().with_auto_train(AutoTrain::Disabled);
        let mut state = trained_state();
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let (grid, result) = service
            .simulate_and_predict(&mut state, WaferSpec::new(450.0, 120.0), FieldSelector::Fallback, &mut rng)
            .unwrap();
        assert!(grid.is_sampled());
        assert_eq!(result.top_k.len(), PredictionService::DEFAULT_TOP_K);
    }
}
