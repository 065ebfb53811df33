//! Defect pattern classes
//!
//! The 21 labels are a closed set. Their order is the one-hot position in the
//! training corpus and the output position of the classifier, so it must not
//! be reordered.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Defect mechanism that produced a wafer's spatial pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub enum PatternClass {
    #[serde(rename = "Edge Die Failure")]
    EdgeDieFailure,
    #[serde(rename = "Center Particle Contamination")]
    CenterParticleContamination,
    #[serde(rename = "Radial Pattern Defect")]
    RadialPatternDefect,
    #[serde(rename = "Random Defect Scatter")]
    RandomDefectScatter,
    #[serde(rename = "Cluster Failure")]
    ClusterFailure,
    #[serde(rename = "Scratch Pattern")]
    ScratchPattern,
    #[serde(rename = "Wafer Bow Distortion")]
    WaferBowDistortion,
    #[serde(rename = "Etch Non-Uniformity")]
    EtchNonUniformity,
    #[serde(rename = "Ion Implantation Drift")]
    IonImplantationDrift,
    #[serde(rename = "Lithography Misalignment")]
    LithographyMisalignment,
    #[serde(rename = "Chemical Vapor Deposition Defect")]
    ChemicalVaporDeposition,
    #[serde(rename = "Metal Layer Delamination")]
    MetalLayerDelamination,
    #[serde(rename = "Plasma Damage")]
    PlasmaDamage,
    #[serde(rename = "Photoresist Residue")]
    PhotoresistResidue,
    #[serde(rename = "Micro-crack Propagation")]
    MicroCrackPropagation,
    #[serde(rename = "Thermal Stress Fracture")]
    ThermalStressFracture,
    #[serde(rename = "Cross-Contamination")]
    CrossContamination,
    #[serde(rename = "Incomplete Oxide Formation")]
    IncompleteOxideFormation,
    #[serde(rename = "Step Coverage Failure")]
    StepCoverageFailure,
    #[serde(rename = "Polysilicon Grain Boundaries")]
    PolysiliconGrainBoundaries,
    /// No-defect label
    #[serde(rename = "Perfect Run")]
    PerfectRun,
}

/// Number of pattern classes
pub const NUM_CLASSES: usize = 21;

impl PatternClass {
    /// All classes in canonical order
    pub const ALL: [PatternClass; NUM_CLASSES] = [
        PatternClass::EdgeDieFailure,
        PatternClass::CenterParticleContamination,
        PatternClass::RadialPatternDefect,
        PatternClass::RandomDefectScatter,
        PatternClass::ClusterFailure,
        PatternClass::ScratchPattern,
        PatternClass::WaferBowDistortion,
        PatternClass::EtchNonUniformity,
        PatternClass::IonImplantationDrift,
        PatternClass::LithographyMisalignment,
        PatternClass::ChemicalVaporDeposition,
        PatternClass::MetalLayerDelamination,
        PatternClass::PlasmaDamage,
        PatternClass::PhotoresistResidue,
        PatternClass::MicroCrackPropagation,
        PatternClass::ThermalStressFracture,
        PatternClass::CrossContamination,
        PatternClass::IncompleteOxideFormation,
        PatternClass::StepCoverageFailure,
        PatternClass::PolysiliconGrainBoundaries,
        PatternClass::PerfectRun,
    ];

    /// Position in [`PatternClass::ALL`] (0-20)
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Create from index
    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    /// Canonical display label
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternClass::EdgeDieFailure => "Edge Die Failure",
            PatternClass::CenterParticleContamination => "Center Particle Contamination",
            PatternClass::RadialPatternDefect => "Radial Pattern Defect",
            PatternClass::RandomDefectScatter => "Random Defect Scatter",
            PatternClass::ClusterFailure => "Cluster Failure",
            PatternClass::ScratchPattern => "Scratch Pattern",
            PatternClass::WaferBowDistortion => "Wafer Bow Distortion",
            PatternClass::EtchNonUniformity => "Etch Non-Uniformity",
            PatternClass::IonImplantationDrift => "Ion Implantation Drift",
            PatternClass::LithographyMisalignment => "Lithography Misalignment",
            PatternClass::ChemicalVaporDeposition => "Chemical Vapor Deposition Defect",
            PatternClass::MetalLayerDelamination => "Metal Layer Delamination",
            PatternClass::PlasmaDamage => "Plasma Damage",
            PatternClass::PhotoresistResidue => "Photoresist Residue",
            PatternClass::MicroCrackPropagation => "Micro-crack Propagation",
            PatternClass::ThermalStressFracture => "Thermal Stress Fracture",
            PatternClass::CrossContamination => "Cross-Contamination",
            PatternClass::IncompleteOxideFormation => "Incomplete Oxide Formation",
            PatternClass::StepCoverageFailure => "Step Coverage Failure",
            PatternClass::PolysiliconGrainBoundaries => "Polysilicon Grain Boundaries",
            PatternClass::PerfectRun => "Perfect Run",
        }
    }

    /// Parse a canonical label. Case-insensitive, surrounding whitespace ignored.
    pub fn from_label(label: &str) -> Option<Self> {
        let wanted = label.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|class| class.as_str().eq_ignore_ascii_case(wanted))
    }

    /// Is this the no-defect label?
    pub fn is_defect_free(&self) -> bool {
        matches!(self, PatternClass::PerfectRun)
    }

    /// One-hot encoding over [`PatternClass::ALL`]
    pub fn one_hot(&self) -> [f32; NUM_CLASSES] {
        let mut label = [0.0; NUM_CLASSES];
        label[self.index()] = 1.0;
        label
    }
}

impl fmt::Display for PatternClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which defect field drives a simulation
///
/// External producers (e.g. a text generator) may hand over labels outside
/// the enumeration, including combined "A + B" labels. Those run on the flat
/// fallback field instead of failing the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", content = "pattern")]
pub enum FieldSelector {
    Pattern(PatternClass),
    Fallback,
}

impl FieldSelector {
    /// Resolve an external label
    pub fn from_label(label: &str) -> Self {
        match PatternClass::from_label(label) {
            Some(class) => FieldSelector::Pattern(class),
            None => {
                warn!(label, "Unrecognized pattern label, using fallback defect field");
                FieldSelector::Fallback
            }
        }
    }

    pub fn pattern(&self) -> Option<PatternClass> {
        match self {
            FieldSelector::Pattern(class) => Some(*class),
            FieldSelector::Fallback => None,
        }
    }

    pub fn is_recognized(&self) -> bool {
        self.pattern().is_some()
    }
}

impl From<PatternClass> for FieldSelector {
    fn from(class: PatternClass) -> Self {
        FieldSelector::Pattern(class)
    }
}

impl fmt::Display for FieldSelector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldSelector::Pattern(class) => write!(f, "{}", class),
            FieldSelector::Fallback => f.write_str("Unclassified (fallback field)"),
        }
    }
}
