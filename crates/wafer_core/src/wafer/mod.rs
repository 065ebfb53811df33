//! Wafer simulation
//!
//! Rasterize, evaluate a defect field, sample per-die outcomes.
//!
//! ```rust
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//! use wafer_core::config::OutcomeWeights;
//! use wafer_core::wafer::{simulate_wafer, PatternClass, WaferSpec};
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//! let grid = simulate_wafer(
//!     WaferSpec::new(300.0, 100.0),
//!     PatternClass::EdgeDieFailure.into(),
//!     &OutcomeWeights::default(),
//!     &mut rng,
//! )
//! .unwrap();
//! assert_eq!(grid.tier_counts().total(), grid.len());
//! ```

pub mod field;
pub mod grid;
pub mod outcome;
pub mod pattern;

pub use field::{DefectFieldModel, FieldRule, FALLBACK_PROBABILITY, FIELD_TABLE};
pub use grid::{CellContext, DieCell, GridSampler, WaferGrid, WaferSpec, GRID_MARGIN, MAX_GRID_SIDE};
pub use outcome::{DieOutcome, DieOutcomeSampler, DieStatus, TierCounts};
pub use pattern::{FieldSelector, PatternClass, NUM_CLASSES};

use rand::RngCore;
use tracing::debug;

use crate::config::OutcomeWeights;
use crate::error::Result;

/// Simulate one wafer: grid, field, outcomes
pub fn simulate_wafer(
    spec: WaferSpec,
    selector: FieldSelector,
    weights: &OutcomeWeights,
    rng: &mut dyn RngCore,
) -> Result<WaferGrid> {
    let mut grid = GridSampler::new().rasterize(spec)?;
    DieOutcomeSampler::new(weights.clone()).sample_grid(&mut grid, selector, rng);
    debug!(
        diameter_mm = spec.diameter_mm,
        die_size_mm2 = spec.die_size_mm2,
        cells = grid.len(),
        defects = grid.defect_count(),
        field = %selector,
        "Simulated wafer"
    );
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_same_seed_same_wafer() {
        let spec = WaferSpec::new(450.0, 150.0);
        let weights = OutcomeWeights::default();
        let a = simulate_wafer(spec, PatternClass::ScratchPattern.into(), &weights, &mut ChaCha8Rng::seed_from_u64(5)).unwrap();
        let b = simulate_wafer(spec, PatternClass::ScratchPattern.into(), &weights, &mut ChaCha8Rng::seed_from_u64(5)).unwrap();
        assert_eq!(a.cells, b.cells);
        assert_eq!(a.selector, Some(FieldSelector::Pattern(PatternClass::ScratchPattern)));
    }

    #[test]
    fn test_fallback_field_simulates() {
        let grid = simulate_wafer(
            WaferSpec::new(300.0, 50.0),
            FieldSelector::from_label("Scratch Pattern + Plasma Damage"),
            &OutcomeWeights::default(),
            &mut ChaCha8Rng::seed_from_u64(11),
        )
        .unwrap();
        assert_eq!(grid.selector, Some(FieldSelector::Fallback));
        assert!(grid.is_sampled());
    }

    #[test]
    fn test_empty_grid_propagates() {
        let result = simulate_wafer(
            WaferSpec::new(200.0, 90_000.0),
            PatternClass::PerfectRun.into(),
            &OutcomeWeights::default(),
            &mut ChaCha8Rng::seed_from_u64(0),
        );
        assert!(result.unwrap_err().is_configuration());
    }
}
