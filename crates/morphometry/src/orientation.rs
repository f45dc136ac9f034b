use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{particle_set::ParticleView, types::ParticleDescriptors};

pub const DEFAULT_DISPLAY_RANGE: [f64; 2] = [20.0, 60.0];

/// Which Feret direction a vector follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrientationLayer {
    /// Along `feret_angle_at_max`, length from `feret_max`
    FeretMax,
    /// Along `feret_angle_at_min`, length from `feret_min`
    FeretMin,
}

/// One arrow anchored at a particle centroid, in image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OrientationVector {
    pub particle_id: usize,
    pub layer: OrientationLayer,
    pub x: f64,
    pub y: f64,
    pub dx: f64,
    pub dy: f64,
    /// Display length, `hypot(dx, dy)`
    pub length: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrientationFieldBuilder {
    pub display_range: [f64; 2],
    pub include_min_layer: bool,
}

impl Default for OrientationFieldBuilder {
    fn default() -> Self {
        Self {
            display_range: DEFAULT_DISPLAY_RANGE,
            include_min_layer: false,
        }
    }
}

impl OrientationFieldBuilder {
    pub fn new(display_range: [f64; 2]) -> Self {
        Self {
            display_range,
            ..Self::default()
        }
    }

    pub fn with_min_layer(mut self, include: bool) -> Self {
        self.include_min_layer = include;
        self
    }

    /// Vectors for the max layer, then the min layer when enabled.
    ///
    /// Lengths are min-max rescaled into `display_range` over the particles
    /// of the view; with no spread every vector gets the range minimum.
    pub fn build(&self, view: &ParticleView<'_>) -> Vec<OrientationVector> {
        let mut vectors = self.layer(view, OrientationLayer::FeretMax);
        if self.include_min_layer {
            vectors.extend(self.layer(view, OrientationLayer::FeretMin));
        }
        vectors
    }

    fn layer(&self, view: &ParticleView<'_>, layer: OrientationLayer) -> Vec<OrientationVector> {
        let pick = |d: &ParticleDescriptors| match layer {
            OrientationLayer::FeretMax => (d.feret_max_px, d.feret_angle_at_max_deg),
            OrientationLayer::FeretMin => (d.feret_min_px, d.feret_angle_at_min_deg),
        };

        let (lo, hi) = view
            .iter()
            .map(|record| pick(&record.descriptors).0)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        let [out_lo, out_hi] = self.display_range;

        view.iter()
            .map(|record| {
                let (diameter, angle_deg) = pick(&record.descriptors);
                let length = if hi > lo {
                    out_lo + (diameter - lo) / (hi - lo) * (out_hi - out_lo)
                } else {
                    out_lo
                };
                let (sin, cos) = angle_deg.to_radians().sin_cos();
                let [x, y] = record.descriptors.centroid;

                OrientationVector {
                    particle_id: record.id,
                    layer,
                    x,
                    y,
                    dx: length * cos,
                    dy: length * sin,
                    length,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{particle_set::ParticleSet, scale::ScaleContext, types::Contour};
    use approx::assert_abs_diff_eq;

    fn set_with(particles: &[(f64, f64, [f64; 2])]) -> ParticleSet {
        let mut set = ParticleSet::new(ScaleContext::pixels());
        for &(feret_max, angle, centroid) in particles {
            let contour = Contour::new(vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]).unwrap();
            let descriptors = ParticleDescriptors {
                centroid,
                area_px: 1.0,
                perimeter_px: 1.0,
                diameter_px: feret_max,
                feret_max_px: feret_max,
                feret_min_px: feret_max / 2.0,
                feret_mean_px: feret_max,
                feret_angle_at_max_deg: angle,
                feret_angle_at_min_deg: angle + 90.0,
                eccentricity: 0.0,
                mean_intensity: None,
            };
            set.push(contour, descriptors, None, None);
        }
        set
    }

    #[test]
    fn test_lengths_rescale_linearly() {
        let set = set_with(&[(10.0, 0.0, [5.0, 5.0]), (20.0, 0.0, [9.0, 1.0]), (30.0, 0.0, [0.0, 0.0])]);
        let vectors = OrientationFieldBuilder::default().build(&set.view());

        let lengths: Vec<f64> = vectors.iter().map(|v| v.length).collect();
        assert_eq!(lengths, vec![20.0, 40.0, 60.0]);
        assert_eq!((vectors[1].x, vectors[1].y), (9.0, 1.0));
        assert_eq!(vectors[2].particle_id, 3);
    }

    #[test]
    fn test_single_particle_uses_range_minimum() {
        let set = set_with(&[(42.0, 0.0, [0.0, 0.0])]);
        let vectors = OrientationFieldBuilder::new([5.0, 15.0]).build(&set.view());
        assert_eq!(vectors.len(), 1);
        assert_eq!(vectors[0].length, 5.0);
    }

    #[test]
    fn test_direction_follows_feret_angle() {
        let set = set_with(&[(10.0, 90.0, [0.0, 0.0]), (20.0, 45.0, [0.0, 0.0])]);
        let vectors = OrientationFieldBuilder::default().build(&set.view());

        assert_abs_diff_eq!(vectors[0].dx, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(vectors[0].dy, 20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(vectors[1].dx, vectors[1].dy, epsilon = 1e-9);
        assert_abs_diff_eq!(vectors[1].dx.hypot(vectors[1].dy), 60.0, epsilon = 1e-9);
    }

    #[test]
    fn test_min_layer_is_optional() {
        let set = set_with(&[(10.0, 0.0, [0.0, 0.0]), (20.0, 30.0, [0.0, 0.0])]);
        let builder = OrientationFieldBuilder::default();
        assert_eq!(builder.build(&set.view()).len(), 2);

        let vectors = builder.with_min_layer(true).build(&set.view());
        assert_eq!(vectors.len(), 4);
        assert_eq!(vectors[2].layer, OrientationLayer::FeretMin);
        assert_abs_diff_eq!(vectors[3].dx, -30.0, epsilon = 1e-9);
    }

    #[test]
    fn test_empty_view() {
        let set = ParticleSet::new(ScaleContext::pixels());
        assert!(OrientationFieldBuilder::default().build(&set.view()).is_empty());
    }
}
