use thiserror::Error;

/// Rejected inputs. Never leaves a trained model in a different state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid wafer diameter: {diameter_mm} mm")]
    InvalidDiameter { diameter_mm: f64 },

    #[error("Unsupported wafer diameter: {diameter_mm} mm (supported: {supported:?})")]
    UnsupportedDiameter { diameter_mm: f64, supported: Vec<f64> },

    #[error("Invalid die size: {die_size_mm2} mm² (allowed range {min}..={max})")]
    InvalidDieSize { die_size_mm2: f64, min: f64, max: f64 },

    #[error("No die fits on a {diameter_mm} mm wafer with {die_size_mm2} mm² dies")]
    EmptyGrid { diameter_mm: f64, die_size_mm2: f64 },

    #[error("Feature vector length mismatch: expected {expected}, found {found}")]
    FeatureLength { expected: usize, found: usize },

    #[error("Feature layout mismatch: expected v{expected}, found v{found}")]
    LayoutVersion { expected: u32, found: u32 },

    #[error("Invalid outcome weights: {0}")]
    OutcomeWeights(String),

    #[error("Invalid trainer setting: {0}")]
    Trainer(String),

    #[error("Corpus too small: {samples} samples cannot be split for training and validation")]
    CorpusTooSmall { samples: usize },
}

/// Aborted training attempt. The previous model state is kept.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrainingFailure {
    #[error("Loss diverged at epoch {epoch}, batch {batch}: {loss}")]
    NonFiniteLoss { epoch: usize, batch: usize, loss: f32 },
}

#[derive(Error, Debug)]
pub enum WaferError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Training failure: {0}")]
    Training(#[from] TrainingFailure),

    #[error("Model is not trained and automatic training is disabled")]
    UntrainedModel,

    #[error("Unsupported schema version: {0}")]
    SchemaVersion(u8),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WaferError {
    /// Errors caused by caller input rather than by the training run itself.
    pub fn is_configuration(&self) -> bool {
        matches!(self, WaferError::Configuration(_) | WaferError::SchemaVersion(_))
    }

    /// Whether the same request can succeed after a state change
    /// (training the model, fixing the input).
    pub fn is_recoverable(&self) -> bool {
        match self {
            WaferError::Configuration(_) => true,
            WaferError::UntrainedModel => true,
            WaferError::Training(_) => false,
            WaferError::SchemaVersion(_) => false,
            WaferError::Serialization(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, WaferError>;
