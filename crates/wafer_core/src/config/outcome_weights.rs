//! Tier weights of the die outcome sampler
//!
//! One canonical weighting. The renderer-facing tier counts and the training
//! corpus both come from these tables, so they must not be forked.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::probability::ProbabilityValidator;
use crate::wafer::DieStatus;

/// Categorical weights, consumed in order against one uniform roll
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutcomeWeights {
    /// Tier draw after a successful defect trial (default: dead 0.4, faulty 0.3, economy 0.3)
    pub defective: [(DieStatus, f64); 3],
    /// Tier draw after a failed defect trial (default: premium 0.6, standard 0.25, economy 0.15)
    pub healthy: [(DieStatus, f64); 3],
}

impl Default for OutcomeWeights {
    fn default() -> Self {
        Self {
            defective: [
                (DieStatus::Dead, 0.4),
                (DieStatus::Faulty, 0.3),
                (DieStatus::Economy, 0.3),
            ],
            healthy: [
                (DieStatus::Premium, 0.6),
                (DieStatus::Standard, 0.25),
                (DieStatus::Economy, 0.15),
            ],
        }
    }
}

impl OutcomeWeights {
    /// Map a uniform roll in [0, 1) onto a weight table.
    ///
    /// Rolls past the cumulative sum (floating residue) land on the last tier.
    pub fn pick(table: &[(DieStatus, f64)], roll: f64) -> DieStatus {
        let mut cumulative = 0.0;
        for &(status, weight) in table {
            cumulative += weight;
            if roll < cumulative {
                return status;
            }
        }
        table.last().map(|&(status, _)| status).unwrap_or(DieStatus::Economy)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let validator = ProbabilityValidator::new();
        for (name, table) in [("defective", &self.defective), ("healthy", &self.healthy)] {
            let weights: Vec<f64> = table.iter().map(|&(_, w)| w).collect();
            validator
                .validate_distribution(&weights)
                .map_err(|msg| ConfigError::OutcomeWeights(format!("{name}: {msg}")))?;
        }
        if self.defective.iter().any(|&(s, _)| matches!(s, DieStatus::Premium | DieStatus::Standard)) {
            return Err(ConfigError::OutcomeWeights(
                "defective table may not yield premium or standard dies".to_string(),
            )
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_are_canonical() {
        let w = OutcomeWeights::default();
        assert_eq!(w.defective[0], (DieStatus::Dead, 0.4));
        assert_eq!(w.defective[1], (DieStatus::Faulty, 0.3));
        assert_eq!(w.defective[2], (DieStatus::Economy, 0.3));
        assert_eq!(w.healthy[0], (DieStatus::Premium, 0.6));
        assert_eq!(w.healthy[1], (DieStatus::Standard, 0.25));
        assert_eq!(w.healthy[2], (DieStatus::Economy, 0.15));
        assert!(w.validate().is_ok());
    }

    #[test]
    fn test_pick_follows_cumulative_thresholds() {
        let w = OutcomeWeights::default();
        assert_eq!(OutcomeWeights::pick(&w.defective, 0.0), DieStatus::Dead);
        assert_eq!(OutcomeWeights::pick(&w.defective, 0.39), DieStatus::Dead);
        assert_eq!(OutcomeWeights::pick(&w.defective, 0.4), DieStatus::Faulty);
        assert_eq!(OutcomeWeights::pick(&w.defective, 0.69), DieStatus::Faulty);
        assert_eq!(OutcomeWeights::pick(&w.defective, 0.7), DieStatus::Economy);
        assert_eq!(OutcomeWeights::pick(&w.healthy, 0.59), DieStatus::Premium);
        assert_eq!(OutcomeWeights::pick(&w.healthy, 0.6), DieStatus::Standard);
        assert_eq!(OutcomeWeights::pick(&w.healthy, 0.85), DieStatus::Economy);
        assert_eq!(OutcomeWeights::pick(&w.healthy, 0.999_999), DieStatus::Economy);
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let mut w = OutcomeWeights::default();
        w.healthy[0].1 = 0.9;
        assert!(w.validate().is_err());
    }

    #[test]
    fn test_defective_table_cannot_produce_good_tiers() {
        let mut w = OutcomeWeights::default();
        w.defective[2].0 = DieStatus::Premium;
        assert!(w.validate().is_err());
    }
}
