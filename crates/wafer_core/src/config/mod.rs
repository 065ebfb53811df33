//! # Pipeline Configuration
//!
//! All tuning constants of the simulate → extract → train pipeline live here,
//! grouped by concern, so the corpus generator, the trainer and any consumer
//! that needs matching tier counts read the same values.
//!
//! ## Usage
//! ```rust
//! use wafer_core::config::PipelineConfig;
//!
//! let config = PipelineConfig::default();
//! let quick = PipelineConfig::quick();
//! assert!(quick.corpus.num_samples < config.corpus.num_samples);
//! ```

mod corpus_config;
mod outcome_weights;
mod trainer_config;
mod wafer_limits;

pub use corpus_config::CorpusConfig;
pub use outcome_weights::OutcomeWeights;
pub use trainer_config::TrainerConfig;
pub use wafer_limits::WaferLimits;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Full pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    /// Accepted wafer geometries
    pub wafer: WaferLimits,
    /// Tier weights for the die outcome sampler
    pub outcome: OutcomeWeights,
    /// Training corpus generation
    pub corpus: CorpusConfig,
    /// Classifier training
    #[serde(default)]
    pub trainer: TrainerConfig,
}

impl PipelineConfig {
    /// Small corpus and short training, for interactive runs and tests.
    pub fn quick() -> Self {
        let mut cfg = Self::default();
        cfg.corpus.num_samples = 2_100;
        cfg.trainer.max_epochs = 30;
        cfg.trainer.early_stop_min_epoch = 10;
        cfg
    }

    /// Large corpus, full epoch budget.
    pub fn thorough() -> Self {
        let mut cfg = Self::default();
        cfg.corpus.num_samples = 100_000;
        cfg
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.wafer.validate()?;
        self.outcome.validate()?;
        self.corpus.validate()?;
        self.trainer.validate()?;
        Ok(())
    }
}
