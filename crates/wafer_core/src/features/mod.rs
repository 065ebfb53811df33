//! # Feature Extraction
//!
//! A sampled [`WaferGrid`](crate::wafer::WaferGrid) becomes a fixed-length
//! [`FeatureVector`]. Training and inference both go through [`extract`];
//! there is no second implementation.
//!
//! ## Normalization
//! - per-die ratios divide by the total cell count
//! - per-defect ratios divide by `max(count, EPSILON)`
//! - spatial bins report defective cells / cells in the bin
//! - asymmetries are 0 up to [`MIN_ASYMMETRY_DEFECTS`] defects
//! - context features divide by reference maxima, clamped to [0, 1]

mod extractor;
pub mod zones;

pub use extractor::{extract, SpatialFeatureExtractor};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Canonical feature vector length
pub const FEATURE_LEN: usize = 36;

/// Bumped whenever the meaning or order of a component changes
pub const FEATURE_LAYOUT_VERSION: u32 = 1;

/// Floor for per-defect denominators
pub const EPSILON: f32 = 1e-3;

/// Asymmetry features stay 0 at or below this many defects
pub const MIN_ASYMMETRY_DEFECTS: usize = 10;

/// Reference maxima for context features
pub const REFERENCE_DIAMETER_MM: f64 = 450.0;
pub const REFERENCE_DIE_SIZE_MM2: f64 = 200.0;

/// Ordered feature values
///
/// Vectors from [`extract`] always have [`FEATURE_LEN`] entries. Vectors from
/// outside may have any length and are checked with [`FeatureVector::check_len`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }

    pub fn get(&self, index: usize) -> Option<f32> {
        self.0.get(index).copied()
    }

    pub fn check_len(&self, expected: usize) -> Result<()> {
        if self.0.len() != expected {
            return Err(ConfigError::FeatureLength { expected, found: self.0.len() }.into());
        }
        Ok(())
    }
}

impl From<Vec<f32>> for FeatureVector {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

impl AsRef<[f32]> for FeatureVector {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

/// Value domain of one component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// Per-die or per-defect ratio in [0, 1]
    Ratio,
    /// 0 or 1
    Flag,
    /// Bin density in [0, 1]
    Density,
    /// Signed balance in [-1, 1]
    Asymmetry,
    /// Wafer geometry scaled to [0, 1]
    Context,
}

impl FeatureKind {
    pub fn range(&self) -> (f32, f32) {
        match self {
            FeatureKind::Asymmetry => (-1.0, 1.0),
            _ => (0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeatureSpec {
    pub name: &'static str,
    pub kind: FeatureKind,
}

const fn spec(name: &'static str, kind: FeatureKind) -> FeatureSpec {
    FeatureSpec { name, kind }
}

/// Name and kind of each component, in vector order
pub const FEATURE_LAYOUT: [FeatureSpec; FEATURE_LEN] = [
    spec("premium_ratio", FeatureKind::Ratio),
    spec("standard_ratio", FeatureKind::Ratio),
    spec("economy_ratio", FeatureKind::Ratio),
    spec("faulty_ratio", FeatureKind::Ratio),
    spec("dead_ratio", FeatureKind::Ratio),
    spec("defect_ratio", FeatureKind::Ratio),
    spec("failure_rate", FeatureKind::Ratio),
    spec("dead_concentration", FeatureKind::Ratio),
    spec("catastrophic", FeatureKind::Flag),
    spec("good_die_ratio", FeatureKind::Ratio),
    spec("premium_concentration", FeatureKind::Ratio),
    spec("dead_faulty_imbalance", FeatureKind::Ratio),
    spec("high_dead", FeatureKind::Flag),
    spec("high_quality", FeatureKind::Flag),
    spec("low_failure", FeatureKind::Flag),
    spec("zone_0", FeatureKind::Density),
    spec("zone_1", FeatureKind::Density),
    spec("zone_2", FeatureKind::Density),
    spec("zone_3", FeatureKind::Density),
    spec("zone_4", FeatureKind::Density),
    spec("sector_0", FeatureKind::Density),
    spec("sector_1", FeatureKind::Density),
    spec("sector_2", FeatureKind::Density),
    spec("sector_3", FeatureKind::Density),
    spec("sector_4", FeatureKind::Density),
    spec("sector_5", FeatureKind::Density),
    spec("sector_6", FeatureKind::Density),
    spec("sector_7", FeatureKind::Density),
    spec("quad_nw", FeatureKind::Density),
    spec("quad_ne", FeatureKind::Density),
    spec("quad_sw", FeatureKind::Density),
    spec("quad_se", FeatureKind::Density),
    spec("left_right_asymmetry", FeatureKind::Asymmetry),
    spec("top_bottom_asymmetry", FeatureKind::Asymmetry),
    spec("diameter", FeatureKind::Context),
    spec("die_size", FeatureKind::Context),
];

/// Offsets of the feature groups
pub mod offsets {
    pub const TIERS: usize = 0;
    pub const ZONES: usize = 15;
    pub const SECTORS: usize = 20;
    pub const QUADRANTS: usize = 28;
    pub const ASYMMETRY: usize = 32;
    pub const CONTEXT: usize = 34;
}

/// Position of a named component
pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_LAYOUT.iter().position(|f| f.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_offsets_match_names() {
        assert_eq!(FEATURE_LAYOUT[offsets::ZONES].name, "zone_0");
        assert_eq!(FEATURE_LAYOUT[offsets::SECTORS].name, "sector_0");
        assert_eq!(FEATURE_LAYOUT[offsets::QUADRANTS].name, "quad_nw");
        assert_eq!(FEATURE_LAYOUT[offsets::ASYMMETRY].name, "left_right_asymmetry");
        assert_eq!(FEATURE_LAYOUT[offsets::CONTEXT].name, "diameter");
        assert_eq!(feature_index("die_size"), Some(FEATURE_LEN - 1));
    }

    #[test]
    fn test_check_len() {
        assert!(FeatureVector::new(vec![0.0; FEATURE_LEN]).check_len(FEATURE_LEN).is_ok());
        let err = FeatureVector::new(vec![0.0; 20]).check_len(FEATURE_LEN).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_vector_serializes_as_plain_array() {
        let v = FeatureVector::from(vec![0.5, 1.0]);
        assert_eq!(serde_json::to_string(&v).unwrap(), "[0.5,1.0]");
    }
}
