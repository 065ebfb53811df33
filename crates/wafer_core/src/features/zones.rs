//! Spatial bins over the wafer disc

use std::f64::consts::PI;

pub const RADIAL_ZONES: usize = 5;
pub const ANGULAR_SECTORS: usize = 8;
pub const QUADRANTS: usize = 4;

/// Radial zone of a normalized distance; the last bin is closed at 1.0
pub fn radial_zone(d: f64) -> usize {
    ((d * RADIAL_ZONES as f64).floor().max(0.0) as usize).min(RADIAL_ZONES - 1)
}

/// Sector of an `atan2` angle, counted from θ = -π in π/4 steps
pub fn angular_sector(theta: f64) -> usize {
    let shifted = (theta + PI).rem_euclid(2.0 * PI);
    ((shifted / (PI / 4.0)).floor() as usize) % ANGULAR_SECTORS
}

/// Quadrant index: NW (dx<0, dy<0), NE, SW, SE
pub fn quadrant(dx: f64, dy: f64) -> usize {
    let east = if dx < 0.0 { 0 } else { 1 };
    let south = if dy < 0.0 { 0 } else { 2 };
    east + south
}

/// Defective and total cell counts of one bin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BinCount {
    pub defective: usize,
    pub cells: usize,
}

impl BinCount {
    pub fn push(&mut self, defective: bool) {
        self.cells += 1;
        if defective {
            self.defective += 1;
        }
    }

    /// Defective share of the bin; empty bins report 0
    pub fn density(&self) -> f32 {
        self.defective as f32 / self.cells.max(1) as f32
    }
}
