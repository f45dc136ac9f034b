use image::GrayImage;
use crate::{
    algorithms::{
        FeretSweep, LeastSquaresEllipseFitter, MIN_ELLIPSE_POINTS, geometry,
    },
    traits::EllipseFitter,
    types::{Contour, ParticleDescriptors},
};

/// Stateless computation of the per-particle descriptor set
#[derive(Debug, Clone, Default)]
pub struct DescriptorEngine<E = LeastSquaresEllipseFitter>
where
    E: EllipseFitter,
{
    pub sweep: FeretSweep,
    pub ellipse_fitter: E,
}

impl<E> DescriptorEngine<E>
where
    E: EllipseFitter,
{
    pub fn new(sweep: FeretSweep, ellipse_fitter: E) -> Self {
        Self {
            sweep,
            ellipse_fitter,
        }
    }

    /// Compute pixel-space descriptors. Never fails for a valid contour.
    pub fn compute(
        &self,
        contour: &Contour,
        raw_mask: Option<&GrayImage>,
        grayscale: Option<&GrayImage>,
    ) -> ParticleDescriptors {
        let points = contour.points();
        let centroid = geometry::centroid(contour, raw_mask);

        // Same centre for every sample of the sweep
        let feret = self.sweep.measure(points, centroid);

        let eccentricity = if points.len() >= MIN_ELLIPSE_POINTS {
            self.ellipse_fitter
                .fit(points)
                .map(|fit| fit.eccentricity())
                .unwrap_or(0.0)
        } else {
            0.0
        };

        ParticleDescriptors {
            centroid,
            area_px: geometry::polygon_area(contour),
            perimeter_px: geometry::closed_perimeter(contour),
            diameter_px: geometry::max_pairwise_distance(contour),
            feret_max_px: feret.max,
            feret_min_px: feret.min,
            feret_mean_px: feret.mean,
            feret_angle_at_max_deg: feret.angle_at_max_deg,
            feret_angle_at_min_deg: feret.angle_at_min_deg,
            eccentricity,
            mean_intensity: grayscale.and_then(|image| geometry::mean_intensity(contour, image)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use image::Luma;

    fn engine() -> DescriptorEngine {
        DescriptorEngine::<LeastSquaresEllipseFitter>::default()
    }

    #[test]
    fn test_regular_polygon_descriptors() {
        let points: Vec<[f64; 2]> = (0..360)
            .map(|i| {
                let t = (i as f64).to_radians();
                [50.0 + 20.0 * t.cos(), 50.0 + 20.0 * t.sin()]
            })
            .collect();
        let contour = Contour::new(points).unwrap();
        let d = engine().compute(&contour, None, None);

        assert_abs_diff_eq!(d.diameter_px, 40.0, epsilon = 1e-9);
        assert_abs_diff_eq!(d.feret_max_px, 40.0, epsilon = 0.01);
        assert_abs_diff_eq!(d.feret_min_px, 40.0, epsilon = 0.01);
        assert_abs_diff_eq!(d.eccentricity, 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(d.centroid[0], 50.0, epsilon = 1e-9);
        assert_abs_diff_eq!(d.centroid[1], 50.0, epsilon = 1e-9);
        assert_eq!(d.mean_intensity, None);
    }

    #[test]
    fn test_convex_polygon_feret_max_matches_diameter() {
        let contour = Contour::new(vec![
            [3.0, 1.0],
            [40.0, 6.0],
            [52.0, 30.0],
            [31.0, 47.0],
            [8.0, 35.0],
        ])
        .unwrap();
        let d = engine().compute(&contour, None, None);

        let step_error = d.diameter_px * (1.0 - 0.5f64.to_radians().cos());
        assert!(d.feret_max_px <= d.diameter_px + 1e-9);
        assert!(d.diameter_px - d.feret_max_px <= step_error + 1e-9);
        assert!(d.feret_min_px <= d.feret_max_px);
    }

    #[test]
    fn test_triangle_has_zero_eccentricity() {
        let contour = Contour::new(vec![[0.0, 0.0], [10.0, 0.0], [5.0, 8.0]]).unwrap();
        let d = engine().compute(&contour, None, None);
        assert_eq!(d.eccentricity, 0.0);
        assert_abs_diff_eq!(d.area_px, 40.0, epsilon = 1e-9);
    }

    #[test]
    fn test_near_linear_contour_degrades_gracefully() {
        let points: Vec<[f64; 2]> = (0..8).map(|i| [i as f64 * 3.0, i as f64]).collect();
        let contour = Contour::new(points).unwrap();
        let d = engine().compute(&contour, None, None);
        assert_eq!(d.eccentricity, 0.0);
        assert_eq!(d.area_px, 0.0);
        assert_eq!(d.centroid, contour.vertex_mean());
    }

    #[test]
    fn test_intensity_from_grayscale() {
        let image = GrayImage::from_pixel(30, 30, Luma([77u8]));
        let contour = Contour::new(vec![[5.0, 5.0], [20.0, 5.0], [20.0, 20.0], [5.0, 20.0]]).unwrap();
        let d = engine().compute(&contour, None, Some(&image));
        assert_abs_diff_eq!(d.mean_intensity.unwrap(), 77.0, epsilon = 1e-9);
    }
}
