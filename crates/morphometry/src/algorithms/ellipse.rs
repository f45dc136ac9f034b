//! Algebraic least-squares ellipse fitting.
//!
//! The conic `A x² + B xy + C y² + D x + E y + F = 0` is fitted under the
//! normalisation `A + C = 1`, which turns the problem into an ordinary
//! linear least-squares system in five unknowns.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::traits::EllipseFitter;

/// Minimum number of points for a conic fit
pub const MIN_ELLIPSE_POINTS: usize = 5;

/// Fitted ellipse in image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EllipseFit {
    pub center: [f64; 2],
    pub semi_major: f64,
    pub semi_minor: f64,
    /// Direction of the major axis, degrees
    pub angle_deg: f64,
}

impl EllipseFit {
    /// `sqrt(1 - (b/a)²)`, 0 for a circle
    pub fn eccentricity(&self) -> f64 {
        let (a, b) = (self.semi_major, self.semi_minor);
        if a > b && a > 0.0 {
            (1.0 - (b / a).powi(2)).max(0.0).sqrt()
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LeastSquaresEllipseFitter;

impl EllipseFitter for LeastSquaresEllipseFitter {
    fn fit(&self, points: &[[f64; 2]]) -> Option<EllipseFit> {
        let n = points.len();
        if n < MIN_ELLIPSE_POINTS {
            return None;
        }

        let (mean_x, mean_y, scale) = normalization_params(points);

        let mut design = DMatrix::<f64>::zeros(n, 5);
        let mut rhs = DVector::<f64>::zeros(n);
        for (i, &[px, py]) in points.iter().enumerate() {
            let x = (px - mean_x) * scale;
            let y = (py - mean_y) * scale;
            design[(i, 0)] = x * x - y * y;
            design[(i, 1)] = x * y;
            design[(i, 2)] = x;
            design[(i, 3)] = y;
            design[(i, 4)] = 1.0;
            rhs[i] = -y * y;
        }

        let svd = design.svd(true, true);
        let largest = svd.singular_values.max();
        if largest <= 0.0 || !largest.is_finite() || svd.rank(largest * 1e-10) < 5 {
            return None;
        }
        let solution = svd.solve(&rhs, largest * 1e-12).ok()?;

        let a = solution[0];
        let b = solution[1];
        let c = 1.0 - a;
        let d = solution[2];
        let e = solution[3];
        let f = solution[4];

        // Ellipse condition
        let det = 4.0 * a * c - b * b;
        if det <= 0.0 {
            return None;
        }

        let x0 = (b * e - 2.0 * c * d) / det;
        let y0 = (b * d - 2.0 * a * e) / det;
        let f0 = f + (d * x0 + e * y0) / 2.0;

        let half_sum = (a + c) / 2.0;
        let radius = (((a - c) / 2.0).powi(2) + (b / 2.0).powi(2)).sqrt();
        let lambda_small = half_sum - radius;
        let lambda_large = half_sum + radius;
        if lambda_small <= 0.0 || f0 >= 0.0 {
            return None;
        }

        let semi_major = (-f0 / lambda_small).sqrt() / scale;
        let semi_minor = (-f0 / lambda_large).sqrt() / scale;
        if !semi_major.is_finite() || !semi_minor.is_finite() {
            return None;
        }

        Some(EllipseFit {
            center: [x0 / scale + mean_x, y0 / scale + mean_y],
            semi_major,
            semi_minor,
            angle_deg: (0.5 * (-b).atan2(c - a)).to_degrees(),
        })
    }
}

/// Returns (mean_x, mean_y, scale) mapping the points to unit mean radius
fn normalization_params(points: &[[f64; 2]]) -> (f64, f64, f64) {
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p[0]).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p[1]).sum::<f64>() / n;

    let mean_dist = points
        .iter()
        .map(|p| ((p[0] - mean_x).powi(2) + (p[1] - mean_y).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    let scale = if mean_dist > 1e-15 { 1.0 / mean_dist } else { 1.0 };
    (mean_x, mean_y, scale)
}
