//! Classifier training parameters

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    // === Architecture ===
    /// Hidden layer widths (default: 128, 64)
    pub hidden_units: [usize; 2],
    /// Dropout rate after each hidden block (default: 0.3, 0.25)
    pub dropout: [f32; 2],
    /// L2 penalty on hidden kernels (default: 0.001)
    pub l2: f32,
    /// Batch-norm running statistics momentum (default: 0.99)
    pub bn_momentum: f32,
    /// Batch-norm variance epsilon (default: 0.001)
    pub bn_epsilon: f32,

    // === Optimizer (Adam) ===
    /// Learning rate (default: 0.001)
    pub learning_rate: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub adam_epsilon: f32,

    // === Schedule ===
    /// Minibatch size (default: 256)
    pub batch_size: usize,
    /// Epoch cap (default: 100)
    pub max_epochs: usize,
    /// Fraction of the shuffled corpus held out at its tail (default: 0.2)
    pub validation_split: f32,
    /// Early stopping only after this epoch index (default: 20)
    pub early_stop_min_epoch: usize,
    /// Validation accuracy that stops training early (default: 0.75)
    pub early_stop_val_accuracy: f32,

    /// Seed for weight init, dropout masks and batch order (default: 42)
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            hidden_units: [128, 64],
            dropout: [0.3, 0.25],
            l2: 0.001,
            bn_momentum: 0.99,
            bn_epsilon: 0.001,

            learning_rate: 0.001,
            beta1: 0.9,
            beta2: 0.999,
            adam_epsilon: 1e-7,

            batch_size: 256,
            max_epochs: 100,
            validation_split: 0.2,
            early_stop_min_epoch: 20,
            early_stop_val_accuracy: 0.75,

            seed: 42,
        }
    }
}

impl TrainerConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        let fail = |msg: &str| -> Result<()> { Err(ConfigError::Trainer(msg.to_string()).into()) };

        if self.hidden_units.iter().any(|&u| u == 0) {
            return fail("hidden layer width must be positive");
        }
        if self.dropout.iter().any(|p| !(0.0..1.0).contains(p)) {
            return fail("dropout must lie in [0, 1)");
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return fail("learning rate must be positive");
        }
        if !(0.0..1.0).contains(&self.beta1) || !(0.0..1.0).contains(&self.beta2) {
            return fail("Adam betas must lie in [0, 1)");
        }
        if !(0.0..=1.0).contains(&self.bn_momentum) || self.bn_epsilon <= 0.0 {
            return fail("invalid batch-norm momentum or epsilon");
        }
        if self.l2 < 0.0 {
            return fail("L2 penalty must be non-negative");
        }
        if self.batch_size == 0 {
            return fail("batch size must be positive");
        }
        if self.max_epochs == 0 {
            return fail("epoch cap must be positive");
        }
        if !(self.validation_split > 0.0 && self.validation_split < 1.0) {
            return fail("validation split must lie in (0, 1)");
        }
        Ok(())
    }
}
