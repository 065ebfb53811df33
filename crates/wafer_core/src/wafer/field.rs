//! Defect probability fields
//!
//! One rule per pattern class, looked up through [`FIELD_TABLE`]. Rules see
//! only the cell geometry and an RNG handle. All of them are pure except
//! thermal stress fracture, which redraws on every evaluation.

use rand::{Rng, RngCore};

use super::grid::CellContext;
use super::pattern::{FieldSelector, PatternClass, NUM_CLASSES};

/// Maps the geometry of one cell to a defect probability in [0, 1]
pub type FieldRule = fn(&CellContext, &mut dyn RngCore) -> f64;

/// Flat probability for labels outside the enumeration
pub const FALLBACK_PROBABILITY: f64 = 0.15;

/// Rules in [`PatternClass::ALL`] order
pub const FIELD_TABLE: [(PatternClass, FieldRule); NUM_CLASSES] = [
    (PatternClass::EdgeDieFailure, edge_die_failure),
    (PatternClass::CenterParticleContamination, center_particle_contamination),
    (PatternClass::RadialPatternDefect, radial_pattern),
    (PatternClass::RandomDefectScatter, random_scatter),
    (PatternClass::ClusterFailure, cluster_failure),
    (PatternClass::ScratchPattern, scratch),
    (PatternClass::WaferBowDistortion, wafer_bow),
    (PatternClass::EtchNonUniformity, etch_non_uniformity),
    (PatternClass::IonImplantationDrift, ion_implantation_drift),
    (PatternClass::LithographyMisalignment, lithography_misalignment),
    (PatternClass::ChemicalVaporDeposition, chemical_vapor_deposition),
    (PatternClass::MetalLayerDelamination, metal_delamination),
    (PatternClass::PlasmaDamage, plasma_damage),
    (PatternClass::PhotoresistResidue, photoresist_residue),
    (PatternClass::MicroCrackPropagation, micro_crack),
    (PatternClass::ThermalStressFracture, thermal_stress),
    (PatternClass::CrossContamination, cross_contamination),
    (PatternClass::IncompleteOxideFormation, incomplete_oxide),
    (PatternClass::StepCoverageFailure, step_coverage),
    (PatternClass::PolysiliconGrainBoundaries, polysilicon_grain),
    (PatternClass::PerfectRun, perfect_run),
];

fn scratch(c: &CellContext, _: &mut dyn RngCore) -> f64 {
    if (c.dx - c.dy).abs() < c.cell_width * 2.0 {
        0.7
    } else {
        0.05
    }
}

fn edge_die_failure(c: &CellContext, _: &mut dyn RngCore) -> f64 {
    if c.d > 0.8 {
        0.8
    } else {
        0.05
    }
}

fn center_particle_contamination(c: &CellContext, _: &mut dyn RngCore) -> f64 {
    if c.d < 0.3 {
        0.75
    } else {
        0.05
    }
}

fn radial_pattern(c: &CellContext, _: &mut dyn RngCore) -> f64 {
    if (c.theta * 4.0).sin().abs() > 0.8 {
        0.7
    } else {
        0.05
    }
}

fn cluster_failure(c: &CellContext, _: &mut dyn RngCore) -> f64 {
    let hx = c.cx + c.radius * 0.3;
    let hy = c.cy - c.radius * 0.2;
    let dist = ((c.x - hx).powi(2) + (c.y - hy).powi(2)).sqrt();
    if dist < c.radius * 0.25 {
        0.8
    } else {
        0.05
    }
}

fn random_scatter(_: &CellContext, _: &mut dyn RngCore) -> f64 {
    0.2
}

fn wafer_bow(c: &CellContext, _: &mut dyn RngCore) -> f64 {
    if c.d > 0.7 {
        0.7
    } else if c.d > 0.5 {
        0.3
    } else {
        0.05
    }
}

fn etch_non_uniformity(c: &CellContext, _: &mut dyn RngCore) -> f64 {
    if ((c.d % 0.3) - 0.15).abs() < 0.05 {
        0.7
    } else {
        0.1
    }
}

fn ion_implantation_drift(c: &CellContext, _: &mut dyn RngCore) -> f64 {
    let gradient = (c.dx + c.radius) / (2.0 * c.radius);
    if gradient > 0.6 {
        0.7
    } else if gradient > 0.4 {
        0.3
    } else {
        0.05
    }
}

// Truncated remainder keeps the stripe pattern symmetric about the center
fn lithography_misalignment(c: &CellContext, _: &mut dyn RngCore) -> f64 {
    let period = c.cell_width * 4.0;
    if (c.dx % period).abs() < c.cell_width || (c.dy % period).abs() < c.cell_width {
        0.6
    } else {
        0.1
    }
}

fn chemical_vapor_deposition(c: &CellContext, _: &mut dyn RngCore) -> f64 {
    if c.d < 0.4 {
        0.8
    } else if c.d < 0.6 {
        0.4
    } else {
        0.1
    }
}

fn metal_delamination(c: &CellContext, _: &mut dyn RngCore) -> f64 {
    if (c.theta * 3.0 + c.d * 5.0).sin().abs() > 0.7 {
        0.7
    } else {
        0.1
    }
}

fn plasma_damage(c: &CellContext, _: &mut dyn RngCore) -> f64 {
    if (c.theta * 6.0).sin().abs() > 0.6 && c.d > 0.5 {
        0.8
    } else {
        0.1
    }
}

fn photoresist_residue(c: &CellContext, _: &mut dyn RngCore) -> f64 {
    if (c.dx * 0.1).sin() * (c.dy * 0.1).cos() > 0.5 {
        0.6
    } else {
        0.1
    }
}

fn micro_crack(c: &CellContext, _: &mut dyn RngCore) -> f64 {
    let band = c.cell_width * 3.0;
    if (c.dx * 0.8 - c.dy).abs() < band || (c.dx * 0.8 + c.dy).abs() < band {
        0.7
    } else {
        0.08
    }
}

/// Non-stationary: a fresh draw per evaluation
fn thermal_stress(_: &CellContext, rng: &mut dyn RngCore) -> f64 {
    0.5 + rng.gen::<f64>() * 0.3
}

fn cross_contamination(_: &CellContext, _: &mut dyn RngCore) -> f64 {
    0.25
}

fn incomplete_oxide(c: &CellContext, _: &mut dyn RngCore) -> f64 {
    let tile = c.cell_width * 5.0;
    let tx = (c.x / tile).floor().rem_euclid(2.0);
    let ty = (c.y / tile).floor().rem_euclid(2.0);
    if tx == ty {
        0.6
    } else {
        0.08
    }
}

fn step_coverage(c: &CellContext, _: &mut dyn RngCore) -> f64 {
    if c.d > 0.7 || (c.theta * 8.0).sin().abs() > 0.8 {
        0.7
    } else {
        0.1
    }
}

fn polysilicon_grain(_: &CellContext, _: &mut dyn RngCore) -> f64 {
    0.18
}

fn perfect_run(_: &CellContext, _: &mut dyn RngCore) -> f64 {
    0.02
}

fn fallback(_: &CellContext, _: &mut dyn RngCore) -> f64 {
    FALLBACK_PROBABILITY
}

/// Strategy lookup for defect fields
#[derive(Debug, Clone, Copy, Default)]
pub struct DefectFieldModel;

impl DefectFieldModel {
    pub fn new() -> Self {
        Self
    }

    pub fn rule(&self, selector: FieldSelector) -> FieldRule {
        match selector {
            FieldSelector::Pattern(class) => FIELD_TABLE[class.index()].1,
            FieldSelector::Fallback => fallback,
        }
    }

    /// Defect probability at one cell, clamped to [0, 1]
    pub fn probability(&self, selector: FieldSelector, cell: &CellContext, rng: &mut dyn RngCore) -> f64 {
        self.rule(selector)(cell, rng).clamp(0.0, 1.0)
    }

    /// Is the field the same on every evaluation?
    pub fn is_stationary(selector: FieldSelector) -> bool {
        selector != FieldSelector::Pattern(PatternClass::ThermalStressFracture)
    }
}
