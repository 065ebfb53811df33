// ============================================================================
// Probability Distribution Validation
// ============================================================================
//
// Contract: categorical weights and classifier outputs must sum to 1.0
// (within tolerance) and contain no negative entries.
//
// Integration Points:
// - OutcomeWeights::validate() - tier tables before sampling
// - PredictionService - classifier output before ranking

use serde::{Deserialize, Serialize};

/// Probability distribution validator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbabilityValidator {
    /// Tolerance for deviation from 1.0
    /// Default: 0.001
    tolerance: f64,
}

impl Default for ProbabilityValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProbabilityValidator {
    /// Create a new validator with default tolerance (0.001)
    pub fn new() -> Self {
        Self { tolerance: 0.001 }
    }

    /// Create a validator with custom tolerance
    ///
    /// # Examples
    /// ```
    /// use wafer_core::probability::ProbabilityValidator;
    ///
    /// let strict = ProbabilityValidator::with_tolerance(1e-6);
    /// assert!(strict.validate_distribution(&[0.5, 0.5]).is_ok());
    /// ```
    pub fn with_tolerance(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Validate a probability distribution
    ///
    /// # Validation Rules
    /// 1. Distribution must not be empty
    /// 2. All probabilities must be finite and non-negative
    /// 3. Sum must be within tolerance of 1.0
    ///
    /// # Examples
    /// ```
    /// use wafer_core::probability::ProbabilityValidator;
    ///
    /// let validator = ProbabilityValidator::new();
    /// assert!(validator.validate_distribution(&[0.4, 0.3, 0.3]).is_ok());
    /// assert!(validator.validate_distribution(&[0.4, 0.3, 0.4]).is_err());
    /// assert!(validator.validate_distribution(&[0.6, -0.1, 0.5]).is_err());
    /// ```
    pub fn validate_distribution(&self, probabilities: &[f64]) -> Result<(), String> {
        if probabilities.is_empty() {
            return Err("Empty probability distribution".to_string());
        }

        if let Some(bad) = probabilities.iter().find(|p| !p.is_finite() || **p < 0.0) {
            return Err(format!("Invalid probability: {}", bad));
        }

        let sum: f64 = probabilities.iter().sum();
        let deviation = (sum - 1.0).abs();

        if deviation > self.tolerance {
            return Err(format!(
                "Probability sum {:.6} deviates from 1.0 by {:.6} (tolerance: {:.6})",
                sum, deviation, self.tolerance
            ));
        }

        Ok(())
    }

    /// Validate and return the distribution rescaled to sum to exactly 1.0
    /// (up to f64 rounding).
    ///
    /// Accepts deviations up to 10%, which covers single-precision softmax
    /// output widened to f64.
    pub fn validate_and_normalize(&self, probabilities: &[f64]) -> Result<Vec<f64>, String> {
        if probabilities.is_empty() {
            return Err("Empty probability distribution".to_string());
        }

        if let Some(bad) = probabilities.iter().find(|p| !p.is_finite() || **p < 0.0) {
            return Err(format!("Invalid probability: {}", bad));
        }

        let sum: f64 = probabilities.iter().sum();
        if sum == 0.0 {
            return Err("Cannot normalize: sum is zero".to_string());
        }

        let max_deviation_for_normalization = 0.1;
        if (sum - 1.0).abs() > max_deviation_for_normalization {
            return Err(format!(
                "Probability sum {:.6} too far from 1.0 for normalization (max: {:.1})",
                sum, max_deviation_for_normalization
            ));
        }

        Ok(probabilities.iter().map(|p| p / sum).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_distribution_rejected() {
        let v = ProbabilityValidator::new();
        assert!(v.validate_distribution(&[]).is_err());
        assert!(v.validate_and_normalize(&[]).is_err());
    }

    #[test]
    fn test_nan_rejected() {
        let v = ProbabilityValidator::new();
        assert!(v.validate_distribution(&[0.5, f64::NAN, 0.5]).is_err());
    }

    #[test]
    fn test_normalize_small_deviation() {
        let v = ProbabilityValidator::with_tolerance(1e-9);
        let normalized = v.validate_and_normalize(&[0.3, 0.3, 0.39]).unwrap();
        assert!(v.validate_distribution(&normalized).is_ok());
    }

    #[test]
    fn test_normalize_rejects_large_deviation() {
        let v = ProbabilityValidator::new();
        assert!(v.validate_and_normalize(&[0.5, 0.5, 0.5]).is_err());
        assert!(v.validate_and_normalize(&[0.0, 0.0]).is_err());
    }
}
