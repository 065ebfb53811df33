//! Per-die outcome sampling
//!
//! Each die gets one Bernoulli trial against its field probability and then
//! one categorical tier draw from the table matching the trial result.

use rand::{Rng, RngCore};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::field::DefectFieldModel;
use super::grid::WaferGrid;
use super::pattern::FieldSelector;
use crate::config::OutcomeWeights;

/// Quality tier of a sampled die
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DieStatus {
    Premium,
    Standard,
    Economy,
    Faulty,
    Dead,
}

impl DieStatus {
    pub const ALL: [DieStatus; 5] = [
        DieStatus::Premium,
        DieStatus::Standard,
        DieStatus::Economy,
        DieStatus::Faulty,
        DieStatus::Dead,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DieStatus::Premium => "premium",
            DieStatus::Standard => "standard",
            DieStatus::Economy => "economy",
            DieStatus::Faulty => "faulty",
            DieStatus::Dead => "dead",
        }
    }

    /// Single-character glyph for text maps
    pub fn glyph(&self) -> char {
        match self {
            DieStatus::Premium => 'P',
            DieStatus::Standard => 'S',
            DieStatus::Economy => 'e',
            DieStatus::Faulty => 'f',
            DieStatus::Dead => 'X',
        }
    }

    /// Faulty or dead
    pub fn is_failure(&self) -> bool {
        matches!(self, DieStatus::Faulty | DieStatus::Dead)
    }
}

impl fmt::Display for DieStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of sampling one die
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DieOutcome {
    pub status: DieStatus,
    /// The Bernoulli defect trial succeeded
    pub defective: bool,
}

/// Per-tier die counts, in [`DieStatus::ALL`] order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TierCounts {
    pub premium: usize,
    pub standard: usize,
    pub economy: usize,
    pub faulty: usize,
    pub dead: usize,
}

impl TierCounts {
    pub fn add(&mut self, status: DieStatus) {
        match status {
            DieStatus::Premium => self.premium += 1,
            DieStatus::Standard => self.standard += 1,
            DieStatus::Economy => self.economy += 1,
            DieStatus::Faulty => self.faulty += 1,
            DieStatus::Dead => self.dead += 1,
        }
    }

    pub fn get(&self, status: DieStatus) -> usize {
        match status {
            DieStatus::Premium => self.premium,
            DieStatus::Standard => self.standard,
            DieStatus::Economy => self.economy,
            DieStatus::Faulty => self.faulty,
            DieStatus::Dead => self.dead,
        }
    }

    pub fn total(&self) -> usize {
        self.premium + self.standard + self.economy + self.faulty + self.dead
    }

    pub fn failures(&self) -> usize {
        self.faulty + self.dead
    }

    /// Faulty plus dead over all dies, 0 for an empty count
    pub fn failure_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.failures() as f64 / total as f64
        }
    }
}

impl WaferGrid {
    /// Tier counts over sampled cells
    pub fn tier_counts(&self) -> TierCounts {
        let mut counts = TierCounts::default();
        for status in self.cells.iter().filter_map(|c| c.status()) {
            counts.add(status);
        }
        counts
    }

    /// Cells whose defect trial succeeded
    pub fn defect_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_defective()).count()
    }
}

/// Draws defect trials and quality tiers for a rasterized wafer
#[derive(Debug, Clone, Default)]
pub struct DieOutcomeSampler {
    weights: OutcomeWeights,
    field: DefectFieldModel,
}

impl DieOutcomeSampler {
    pub fn new(weights: OutcomeWeights) -> Self {
        Self { weights, field: DefectFieldModel::new() }
    }

    pub fn weights(&self) -> &OutcomeWeights {
        &self.weights
    }

    /// Sample one die from a defect probability. Out-of-range probabilities
    /// are clamped to [0, 1].
    pub fn sample_die(&self, probability: f64, rng: &mut dyn RngCore) -> DieOutcome {
        let p = if probability.is_nan() { 0.0 } else { probability.clamp(0.0, 1.0) };
        let defective = rng.gen::<f64>() < p;
        let table = if defective { &self.weights.defective } else { &self.weights.healthy };
        let status = OutcomeWeights::pick(table, rng.gen::<f64>());
        DieOutcome { status, defective }
    }

    /// Evaluate the selected field at every cell and sample its outcome.
    /// Overwrites outcomes from any previous run.
    pub fn sample_grid(&self, grid: &mut WaferGrid, selector: FieldSelector, rng: &mut dyn RngCore) {
        let radius = grid.radius();
        let (cell_width, center) = (grid.cell_width, grid.center);
        for cell in grid.cells.iter_mut() {
            let p = self.field.probability(selector, &cell.context(cell_width, radius, center), rng);
            cell.outcome = Some(self.sample_die(p, rng));
        }
        grid.selector = Some(selector);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wafer::grid::{GridSampler, WaferSpec};
    use crate::wafer::pattern::PatternClass;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn sampled(class: PatternClass, seed: u64) -> WaferGrid {
        let mut grid = GridSampler::new().rasterize(WaferSpec::new(300.0, 100.0)).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        DieOutcomeSampler::default().sample_grid(&mut grid, class.into(), &mut rng);
        grid
    }

    #[test]
    fn test_tier_counts_cover_every_cell() {
        for class in PatternClass::ALL {
            let grid = sampled(class, 7);
            assert!(grid.is_sampled());
            assert_eq!(grid.tier_counts().total(), grid.len(), "{class}");
        }
    }

    #[test]
    fn test_certain_probabilities() {
        let sampler = DieOutcomeSampler::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..200 {
            let hit = sampler.sample_die(1.0, &mut rng);
            assert!(hit.defective);
            assert!(matches!(hit.status, DieStatus::Dead | DieStatus::Faulty | DieStatus::Economy));

            let miss = sampler.sample_die(0.0, &mut rng);
            assert!(!miss.defective);
            assert!(matches!(miss.status, DieStatus::Premium | DieStatus::Standard | DieStatus::Economy));
        }
    }

    #[test]
    fn test_out_of_range_probability_is_clamped() {
        let sampler = DieOutcomeSampler::default();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        assert!(sampler.sample_die(4.0, &mut rng).defective);
        assert!(!sampler.sample_die(-1.0, &mut rng).defective);
        assert!(!sampler.sample_die(f64::NAN, &mut rng).defective);
    }

    #[test]
    fn test_perfect_run_defect_rate_near_two_percent() {
        let mut defects = 0;
        let mut dies = 0;
        for seed in 0..40 {
            let grid = sampled(PatternClass::PerfectRun, seed);
            defects += grid.defect_count();
            dies += grid.len();
        }
        let rate = defects as f64 / dies as f64;
        assert!((0.01..0.03).contains(&rate), "rate {rate}");
    }

    #[test]
    fn test_healthy_tier_frequencies() {
        let sampler = DieOutcomeSampler::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut counts = TierCounts::default();
        for _ in 0..20_000 {
            counts.add(sampler.sample_die(0.0, &mut rng).status);
        }
        let premium = counts.premium as f64 / 20_000.0;
        assert!((premium - 0.6).abs() < 0.02, "premium {premium}");
        assert_eq!(counts.failures(), 0);
    }

    #[test]
    fn test_status_serde_lowercase() {
        assert_eq!(serde_json::to_string(&DieStatus::Dead).unwrap(), "\"dead\"");
        assert_eq!(DieStatus::Faulty.index(), 3);
    }
}
