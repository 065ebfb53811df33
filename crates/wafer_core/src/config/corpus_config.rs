//! Training corpus generation parameters

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Total samples requested; each class gets `num_samples / 21` (default: 50_000)
    pub num_samples: usize,
    /// Diameters drawn uniformly per sample in mm (default: 300, 450)
    pub diameters_mm: Vec<f64>,
    /// Lower bound of the die size draw in mm², inclusive (default: 25.0)
    pub min_die_size_mm2: f64,
    /// Upper bound of the die size draw in mm², exclusive (default: 200.0)
    pub max_die_size_mm2: f64,
    /// Samples between cooperative yield points (default: 1000)
    pub yield_every: usize,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            num_samples: 50_000,
            diameters_mm: vec![300.0, 450.0],
            min_die_size_mm2: 25.0,
            max_die_size_mm2: 200.0,
            yield_every: 1_000,
        }
    }
}

impl CorpusConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(&bad) = self.diameters_mm.iter().find(|d| !d.is_finite() || **d <= 0.0) {
            return Err(ConfigError::InvalidDiameter { diameter_mm: bad }.into());
        }
        if self.diameters_mm.is_empty() {
            return Err(ConfigError::InvalidDiameter { diameter_mm: 0.0 }.into());
        }
        if !(self.min_die_size_mm2 > 0.0 && self.min_die_size_mm2 < self.max_die_size_mm2) {
            return Err(ConfigError::InvalidDieSize {
                die_size_mm2: self.min_die_size_mm2,
                min: self.min_die_size_mm2,
                max: self.max_die_size_mm2,
            }
            .into());
        }
        Ok(())
    }
}
