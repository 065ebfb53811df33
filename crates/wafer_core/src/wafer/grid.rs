//! Wafer rasterization
//!
//! The wafer is laid over a square grid of `floor(diameter * GRID_MARGIN / w)`
//! cells per side, `w = sqrt(die_size)`. Coordinates are grid coordinates in
//! mm with the origin at the grid's top-left corner, so the wafer center is
//! the grid center. Cells whose center lies farther than `radius - w/2` from
//! the wafer center straddle the edge and are dropped.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::outcome::{DieOutcome, DieStatus};
use super::pattern::FieldSelector;
use crate::config::WaferLimits;
use crate::error::{ConfigError, Result};

/// Grid side as a fraction of the wafer diameter
pub const GRID_MARGIN: f64 = 1.0;

/// Largest grid side `rasterize` accepts; bounds the cell allocation
pub const MAX_GRID_SIDE: usize = 4096;

/// Wafer geometry handed over by the configuration source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WaferSpec {
    /// Wafer diameter in mm
    pub diameter_mm: f64,
    /// Die area in mm²
    pub die_size_mm2: f64,
}

impl WaferSpec {
    pub fn new(diameter_mm: f64, die_size_mm2: f64) -> Self {
        Self { diameter_mm, die_size_mm2 }
    }

    /// Build a spec and check it against the supported geometry set
    pub fn checked(diameter_mm: f64, die_size_mm2: f64, limits: &WaferLimits) -> Result<Self> {
        if !limits.supports_diameter(diameter_mm) {
            return Err(ConfigError::UnsupportedDiameter {
                diameter_mm,
                supported: limits.supported_diameters_mm.clone(),
            }
            .into());
        }
        if !limits.supports_die_size(die_size_mm2) {
            return Err(ConfigError::InvalidDieSize {
                die_size_mm2,
                min: limits.min_die_size_mm2,
                max: limits.max_die_size_mm2,
            }
            .into());
        }
        Ok(Self::new(diameter_mm, die_size_mm2))
    }

    pub fn radius(&self) -> f64 {
        self.diameter_mm / 2.0
    }

    /// Side length of one square die
    pub fn cell_width(&self) -> f64 {
        self.die_size_mm2.sqrt()
    }

    /// Ideal die count π r² / die_size, ignoring rasterization
    pub fn nominal_die_count(&self) -> f64 {
        std::f64::consts::PI * self.radius().powi(2) / self.die_size_mm2
    }
}

/// One die on the wafer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DieCell {
    pub row: usize,
    pub col: usize,
    /// Cell center in grid coordinates
    pub center: (f64, f64),
    /// Offset from the wafer center
    pub dx: f64,
    pub dy: f64,
    /// Distance from the wafer center divided by the radius, in [0, 1]
    pub normalized_distance: f64,
    /// `atan2(dy, dx)`, in (-π, π]
    pub angle: f64,
    pub(crate) outcome: Option<DieOutcome>,
}

/// Geometry a defect field rule sees for one cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellContext {
    /// Normalized distance from the wafer center
    pub d: f64,
    /// Angle in (-π, π]
    pub theta: f64,
    pub dx: f64,
    pub dy: f64,
    /// Cell center in grid coordinates
    pub x: f64,
    pub y: f64,
    pub cell_width: f64,
    pub radius: f64,
    /// Wafer center in grid coordinates
    pub cx: f64,
    pub cy: f64,
}

impl DieCell {
    pub fn context(&self, cell_width: f64, radius: f64, center: (f64, f64)) -> CellContext {
        CellContext {
            d: self.normalized_distance,
            theta: self.angle,
            dx: self.dx,
            dy: self.dy,
            x: self.center.0,
            y: self.center.1,
            cell_width,
            radius,
            cx: center.0,
            cy: center.1,
        }
    }

    /// Sampled outcome; `None` until the outcome sampler has run
    pub fn outcome(&self) -> Option<DieOutcome> {
        self.outcome
    }

    pub fn status(&self) -> Option<DieStatus> {
        self.outcome.map(|o| o.status)
    }

    /// Did the defect trial succeed for this die?
    pub fn is_defective(&self) -> bool {
        self.outcome.map_or(false, |o| o.defective)
    }
}

/// Rasterized wafer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaferGrid {
    pub spec: WaferSpec,
    /// Grid side in cells
    pub grid_side: usize,
    pub cell_width: f64,
    /// Wafer center in grid coordinates
    pub center: (f64, f64),
    /// Cells inside the wafer, row-major
    pub cells: Vec<DieCell>,
    /// Field that produced the outcomes; `None` until sampled
    pub selector: Option<FieldSelector>,
}

impl WaferGrid {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn radius(&self) -> f64 {
        self.spec.radius()
    }

    /// Have all cells been assigned an outcome?
    pub fn is_sampled(&self) -> bool {
        self.selector.is_some() && self.cells.iter().all(|c| c.outcome.is_some())
    }

    /// Status map indexed `[row][col]`, `None` outside the wafer or unsampled.
    /// Rendering collaborators draw from this.
    pub fn status_map(&self) -> Vec<Vec<Option<DieStatus>>> {
        let mut map = vec![vec![None; self.grid_side]; self.grid_side];
        for cell in &self.cells {
            map[cell.row][cell.col] = cell.status();
        }
        map
    }

    /// Text rows of the status map, one glyph per cell, `.` off the wafer
    pub fn status_rows(&self) -> Vec<String> {
        self.status_map()
            .iter()
            .map(|row| row.iter().map(|s| s.map_or('.', |s| s.glyph())).collect())
            .collect()
    }
}

/// Lays circular wafers onto a square die grid
#[derive(Debug, Clone, Copy)]
pub struct GridSampler {
    margin: f64,
}

impl Default for GridSampler {
    fn default() -> Self {
        Self { margin: GRID_MARGIN }
    }
}

impl GridSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rasterize a wafer
    ///
    /// # Errors
    /// `ConfigError` for non-positive or non-finite inputs, for dies so
    /// large that no cell fits inside the wafer, and for dies so small the
    /// grid side would exceed [`MAX_GRID_SIDE`].
    pub fn rasterize(&self, spec: WaferSpec) -> Result<WaferGrid> {
        if !(spec.diameter_mm.is_finite() && spec.diameter_mm > 0.0) {
            return Err(ConfigError::InvalidDiameter { diameter_mm: spec.diameter_mm }.into());
        }
        if !(spec.die_size_mm2.is_finite() && spec.die_size_mm2 > 0.0) {
            return Err(ConfigError::InvalidDieSize {
                die_size_mm2: spec.die_size_mm2,
                min: 0.0,
                max: f64::INFINITY,
            }
            .into());
        }

        let radius = spec.radius();
        let w = spec.cell_width();
        let side = (spec.diameter_mm * self.margin / w).floor();
        let min_die = (spec.diameter_mm * self.margin / MAX_GRID_SIDE as f64).powi(2);
        let too_small = || ConfigError::InvalidDieSize {
            die_size_mm2: spec.die_size_mm2,
            min: min_die,
            max: f64::INFINITY,
        };
        if side > MAX_GRID_SIDE as f64 {
            return Err(too_small().into());
        }
        let grid_side = side as usize;
        let half = grid_side as f64 * w / 2.0;
        let center = (half, half);
        let keep_radius = radius - w / 2.0;

        let capacity = grid_side.checked_mul(grid_side).ok_or_else(too_small)?;
        let mut cells = Vec::with_capacity(capacity);
        for row in 0..grid_side {
            for col in 0..grid_side {
                let cx = col as f64 * w + w / 2.0;
                let cy = row as f64 * w + w / 2.0;
                let dx = cx - center.0;
                let dy = cy - center.1;
                let distance = (dx * dx + dy * dy).sqrt();

                if distance > keep_radius {
                    continue;
                }

                cells.push(DieCell {
                    row,
                    col,
                    center: (cx, cy),
                    dx,
                    dy,
                    normalized_distance: distance / radius,
                    angle: dy.atan2(dx),
                    outcome: None,
                });
            }
        }

        if cells.is_empty() {
            return Err(ConfigError::EmptyGrid {
                diameter_mm: spec.diameter_mm,
                die_size_mm2: spec.die_size_mm2,
            }
            .into());
        }

        Ok(WaferGrid { spec, grid_side, cell_width: w, center, cells, selector: None })
    }
}
