//! Wafer geometry accepted from the configuration source

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Diameters and die sizes the configuration source may hand over
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaferLimits {
    /// Supported wafer diameters in mm (default: 200, 300, 450)
    pub supported_diameters_mm: Vec<f64>,
    /// Smallest accepted die size in mm² (default: 1.0)
    pub min_die_size_mm2: f64,
    /// Largest accepted die size in mm² (default: 1000.0)
    pub max_die_size_mm2: f64,
}

impl Default for WaferLimits {
    fn default() -> Self {
        Self {
            supported_diameters_mm: vec![200.0, 300.0, 450.0],
            min_die_size_mm2: 1.0,
            max_die_size_mm2: 1000.0,
        }
    }
}

impl WaferLimits {
    pub fn supports_diameter(&self, diameter_mm: f64) -> bool {
        self.supported_diameters_mm
            .iter()
            .any(|d| (d - diameter_mm).abs() < 1e-9)
    }

    pub fn supports_die_size(&self, die_size_mm2: f64) -> bool {
        die_size_mm2.is_finite()
            && die_size_mm2 >= self.min_die_size_mm2
            && die_size_mm2 <= self.max_die_size_mm2
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.supported_diameters_mm.is_empty() {
            return Err(ConfigError::InvalidDiameter { diameter_mm: 0.0 }.into());
        }
        if let Some(&bad) = self
            .supported_diameters_mm
            .iter()
            .find(|d| !d.is_finite() || **d <= 0.0)
        {
            return Err(ConfigError::InvalidDiameter { diameter_mm: bad }.into());
        }
        if !(self.min_die_size_mm2 > 0.0 && self.min_die_size_mm2 <= self.max_die_size_mm2) {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_supported_sizes() {
        let limits = WaferLimits::default();
        assert!(limits.supports_diameter(300.0));
        assert!(!limits.supports_diameter(250.0));
        assert!(limits.supports_die_size(100.0));
        assert!(!limits.supports_die_size(0.0));
        assert!(!limits.supports_die_size(f64::NAN));
    }

    #[test]
    fn test_inverted_die_range_rejected() {
        let limits = WaferLimits { min_die_size_mm2: 50.0, max_die_size_mm2: 10.0, ..Default::default() };
        assert!(limits.validate().is_err());
    }
}
