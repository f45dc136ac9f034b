//! Feret (caliper) diameters by angular sweep.
//!
//! Contour points are rotated about a fixed centre by each sampled angle and
//! the extent of the rotated x coordinates is taken as the caliper width.
//! Rotation follows the image convention (y axis pointing down), so a
//! positive angle turns counter-clockwise on screen:
//!
//! ```text
//! x' =  cos θ · (x - cx) + sin θ · (y - cy)
//! y' = -sin θ · (x - cx) + cos θ · (y - cy)
//! ```
//!
//! The width at θ is therefore measured along the image direction
//! `(cos θ, sin θ)`.

use serde::{Deserialize, Serialize};

/// Default angular step, one sample per integer degree
pub const DEFAULT_FERET_STEP_DEG: f64 = 1.0;

/// Finest accepted step, 18 000 samples per particle
pub const MIN_FERET_STEP_DEG: f64 = 0.01;

/// Caliper widths are symmetric under a half turn
pub const HALF_TURN_DEG: f64 = 180.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeretMeasurement {
    pub max: f64,
    pub min: f64,
    pub mean: f64,
    pub angle_at_max_deg: f64,
    pub angle_at_min_deg: f64,
}

/// Sweep over `0, step, 2·step, ...` strictly below 180°
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeretSweep {
    step_deg: f64,
}

impl Default for FeretSweep {
    fn default() -> Self {
        Self {
            step_deg: DEFAULT_FERET_STEP_DEG,
        }
    }
}

impl FeretSweep {
    /// `None` unless `MIN_FERET_STEP_DEG <= step_deg <= 180`
    pub fn new(step_deg: f64) -> Option<Self> {
        (MIN_FERET_STEP_DEG..=HALF_TURN_DEG)
            .contains(&step_deg)
            .then_some(Self { step_deg })
    }

    pub fn step_deg(&self) -> f64 {
        self.step_deg
    }

    /// Sampled angles in ascending sweep order
    pub fn angles(&self) -> impl Iterator<Item = f64> + '_ {
        let step = self.step_deg;
        (0..self.sample_count()).map(move |k| k as f64 * step)
    }

    /// Number of `k·step` values strictly below 180°
    pub fn sample_count(&self) -> usize {
        ((HALF_TURN_DEG - 1e-9) / self.step_deg).floor() as usize + 1
    }

    /// Width of the points projected at `angle_deg` around `center`
    pub fn width_at(points: &[[f64; 2]], center: [f64; 2], angle_deg: f64) -> f64 {
        let (sin, cos) = angle_deg.to_radians().sin_cos();
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for &[x, y] in points {
            let projected = cos * (x - center[0]) + sin * (y - center[1]);
            lo = lo.min(projected);
            hi = hi.max(projected);
        }
        hi - lo
    }

    /// Run the sweep. Ties resolve to the earliest sampled angle.
    pub fn measure(&self, points: &[[f64; 2]], center: [f64; 2]) -> FeretMeasurement {
        if points.is_empty() {
            return FeretMeasurement {
                max: 0.0,
                min: 0.0,
                mean: 0.0,
                angle_at_max_deg: 0.0,
                angle_at_min_deg: 0.0,
            };
        }

        let mut max = f64::NEG_INFINITY;
        let mut min = f64::INFINITY;
        let mut angle_at_max = 0.0;
        let mut angle_at_min = 0.0;
        let mut sum = 0.0;
        let mut samples = 0usize;

        for angle in self.angles() {
            let width = Self::width_at(points, center, angle);
            if width > max {
                max = width;
                angle_at_max = angle;
            }
            if width < min {
                min = width;
                angle_at_min = angle;
            }
            sum += width;
            samples += 1;
        }

        FeretMeasurement {
            max,
            min,
            mean: sum / samples as f64,
            angle_at_max_deg: angle_at_max,
            angle_at_min_deg: angle_at_min,
        }
    }
}

/// Caliper line at one sweep angle, for overlays
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeretCaliper {
    pub start: [f64; 2],
    pub end: [f64; 2],
    pub angle_deg: f64,
}

impl FeretCaliper {
    /// Segment spanning the width at `angle_deg`, through the mean rotated y
    pub fn at_angle(points: &[[f64; 2]], center: [f64; 2], angle_deg: f64) -> Option<Self> {
        if points.is_empty() {
            return None;
        }

        let (sin, cos) = angle_deg.to_radians().sin_cos();
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        let mut sum_y = 0.0;
        for &[x, y] in points {
            let dx = x - center[0];
            let dy = y - center[1];
            let rx = cos * dx + sin * dy;
            lo = lo.min(rx);
            hi = hi.max(rx);
            sum_y += -sin * dx + cos * dy;
        }
        let mean_y = sum_y / points.len() as f64;

        let unrotate = |rx: f64, ry: f64| {
            [
                center[0] + cos * rx - sin * ry,
                center[1] + sin * rx + cos * ry,
            ]
        };

        Some(Self {
            start: unrotate(lo, mean_y),
            end: unrotate(hi, mean_y),
            angle_deg,
        })
    }

    pub fn length(&self) -> f64 {
        let dx = self.end[0] - self.start[0];
        let dy = self.end[1] - self.start[1];
        (dx * dx + dy * dy).sqrt()
    }
}
