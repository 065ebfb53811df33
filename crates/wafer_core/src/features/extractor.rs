use super::zones::{self, BinCount, ANGULAR_SECTORS, QUADRANTS, RADIAL_ZONES};
use super::{
    offsets, FeatureVector, EPSILON, FEATURE_LEN, MIN_ASYMMETRY_DEFECTS, REFERENCE_DIAMETER_MM,
    REFERENCE_DIE_SIZE_MM2,
};
use crate::wafer::WaferGrid;

/// Stateless extractor; see [`extract`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SpatialFeatureExtractor;

impl SpatialFeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, grid: &WaferGrid) -> FeatureVector {
        extract(grid)
    }
}

fn flag(condition: bool) -> f32 {
    if condition {
        1.0
    } else {
        0.0
    }
}

/// Aggregate a sampled wafer into its feature vector.
///
/// Unsampled cells count toward the die total but toward no tier.
pub fn extract(grid: &WaferGrid) -> FeatureVector {
    let tiers = grid.tier_counts();
    let total = grid.len().max(1) as f32;

    let mut radial = [BinCount::default(); RADIAL_ZONES];
    let mut sectors = [BinCount::default(); ANGULAR_SECTORS];
    let mut quads = [BinCount::default(); QUADRANTS];
    let (mut left, mut right, mut top, mut bottom) = (0usize, 0usize, 0usize, 0usize);
    let mut defects = 0usize;

    for cell in &grid.cells {
        let defective = cell.is_defective();
        radial[zones::radial_zone(cell.normalized_distance)].push(defective);
        sectors[zones::angular_sector(cell.angle)].push(defective);
        quads[zones::quadrant(cell.dx, cell.dy)].push(defective);

        if defective {
            defects += 1;
            if cell.dx < 0.0 {
                left += 1;
            } else {
                right += 1;
            }
            if cell.dy < 0.0 {
                top += 1;
            } else {
                bottom += 1;
            }
        }
    }

    let premium = tiers.premium as f32 / total;
    let standard = tiers.standard as f32 / total;
    let economy = tiers.economy as f32 / total;
    let faulty = tiers.faulty as f32 / total;
    let dead = tiers.dead as f32 / total;
    let failure_rate = faulty + dead;

    let mut v = vec![0.0f32; FEATURE_LEN];
    v[offsets::TIERS..offsets::TIERS + 5].copy_from_slice(&[premium, standard, economy, faulty, dead]);
    v[5] = defects as f32 / total;
    v[6] = failure_rate;
    v[7] = tiers.dead as f32 / (tiers.failures() as f32).max(EPSILON);
    v[8] = flag(failure_rate > 0.5);
    v[9] = premium + standard;
    v[10] = tiers.premium as f32 / ((tiers.premium + tiers.standard) as f32).max(EPSILON);
    v[11] = (dead - faulty).abs();
    v[12] = flag(dead > 0.3);
    v[13] = flag(premium > 0.7);
    v[14] = flag(failure_rate < 0.1);

    for (i, bin) in radial.iter().enumerate() {
        v[offsets::ZONES + i] = bin.density();
    }
    for (i, bin) in sectors.iter().enumerate() {
        v[offsets::SECTORS + i] = bin.density();
    }
    for (i, bin) in quads.iter().enumerate() {
        v[offsets::QUADRANTS + i] = bin.density();
    }

    if defects > MIN_ASYMMETRY_DEFECTS {
        let norm = (defects as f32).max(EPSILON);
        v[offsets::ASYMMETRY] = (right as f32 - left as f32) / norm;
        v[offsets::ASYMMETRY + 1] = (bottom as f32 - top as f32) / norm;
    }

    v[offsets::CONTEXT] = (grid.spec.diameter_mm / REFERENCE_DIAMETER_MM).clamp(0.0, 1.0) as f32;
    v[offsets::CONTEXT + 1] = (grid.spec.die_size_mm2 / REFERENCE_DIE_SIZE_MM2).clamp(0.0, 1.0) as f32;

    // f32 rounding can push sums of ratios a hair past 1
    for x in v[..offsets::ASYMMETRY].iter_mut() {
        *x = x.clamp(0.0, 1.0);
    }

    FeatureVector::new(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutcomeWeights;
    use crate::features::{FeatureKind, FEATURE_LAYOUT};
    use crate::wafer::{simulate_wafer, FieldSelector, GridSampler, PatternClass, WaferSpec};
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn sampled(class: PatternClass, spec: WaferSpec, seed: u64) -> WaferGrid {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        simulate_wafer(spec, class.into(), &OutcomeWeights::default(), &mut rng).unwrap()
    }

    fn assert_in_layout_ranges(v: &FeatureVector) {
        assert_eq!(v.len(), FEATURE_LEN);
        for (x, spec) in v.as_slice().iter().zip(FEATURE_LAYOUT.iter()) {
            let (lo, hi) = spec.kind.range();
            assert!(x.is_finite() && *x >= lo && *x <= hi, "{} = {}", spec.name, x);
            if spec.kind == FeatureKind::Flag {
                assert!(*x == 0.0 || *x == 1.0, "{} = {}", spec.name, x);
            }
        }
    }

    #[test]
    fn test_unsampled_grid_is_all_zero_except_context() {
        let grid = GridSampler::new().rasterize(WaferSpec::new(300.0, 100.0)).unwrap();
        let v = extract(&grid);
        assert_in_layout_ranges(&v);
        assert!((v.as_slice()[offsets::CONTEXT] - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(v.get(offsets::CONTEXT + 1), Some(0.5));
        // no failures at all: low-failure flag set
        assert_eq!(v.get(14), Some(1.0));
    }

    #[test]
    fn test_context_features_clamped() {
        let grid = GridSampler::new().rasterize(WaferSpec::new(600.0, 400.0)).unwrap();
        let v = extract(&grid);
        assert_eq!(v.get(offsets::CONTEXT), Some(1.0));
        assert_eq!(v.get(offsets::CONTEXT + 1), Some(1.0));
    }

    #[test]
    fn test_tier_ratios_sum_to_one() {
        let v = extract(&sampled(PatternClass::ClusterFailure, WaferSpec::new(450.0, 60.0), 3));
        let sum: f32 = v.as_slice()[..5].iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
        assert!((v.as_slice()[9] - (v.as_slice()[0] + v.as_slice()[1])).abs() < 1e-6);
    }

    #[test]
    fn test_asymmetry_zero_for_few_defects() {
        // 200 mm wafer with large dies: a perfect run rarely has more than 10 defects
        let grid = sampled(PatternClass::PerfectRun, WaferSpec::new(200.0, 400.0), 1);
        assert!(grid.defect_count() <= MIN_ASYMMETRY_DEFECTS);
        let v = extract(&grid);
        assert_eq!(v.get(offsets::ASYMMETRY), Some(0.0));
        assert_eq!(v.get(offsets::ASYMMETRY + 1), Some(0.0));
    }

    #[test]
    fn test_ion_drift_leans_right() {
        let v = extract(&sampled(PatternClass::IonImplantationDrift, WaferSpec::new(300.0, 50.0), 8));
        assert!(v.as_slice()[offsets::ASYMMETRY] > 0.3);
    }

    #[test]
    fn test_center_contamination_concentrates_in_inner_zone() {
        let mut center = 0.0;
        let mut edge = 0.0;
        for seed in 0..20 {
            let v = extract(&sampled(PatternClass::CenterParticleContamination, WaferSpec::new(300.0, 100.0), seed));
            center += v.as_slice()[offsets::ZONES];
            edge += v.as_slice()[offsets::ZONES + 4];
        }
        assert!(center / edge.max(1e-6) > 2.0, "center {center} edge {edge}");
    }

    #[test]
    fn test_extractor_struct_matches_function() {
        let grid = sampled(PatternClass::ScratchPattern, WaferSpec::new(300.0, 100.0), 4);
        assert_eq!(SpatialFeatureExtractor::new().extract(&grid), extract(&grid));
    }

    #[test]
    fn test_fallback_grid_extracts() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let grid = simulate_wafer(
            WaferSpec::new(300.0, 100.0),
            FieldSelector::Fallback,
            &OutcomeWeights::default(),
            &mut rng,
        )
        .unwrap();
        assert_in_layout_ranges(&extract(&grid));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn prop_features_within_ranges(
            class_idx in 0usize..21,
            diameter in prop::sample::select(vec![200.0f64, 300.0, 450.0]),
            die in 25.0f64..200.0,
            seed in any::<u64>(),
        ) {
            let class = PatternClass::from_index(class_idx).unwrap();
            let grid = sampled(class, WaferSpec::new(diameter, die), seed);
            let v = extract(&grid);
            assert_in_layout_ranges(&v);
            // repeated extraction keeps shape and values
            prop_assert_eq!(extract(&grid), v);
        }
    }
}
