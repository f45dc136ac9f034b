use geo::{Area, Centroid, ConvexHull, EuclideanLength};
use image::GrayImage;

use crate::{algorithms::mask_centroid, types::Contour};

/// Below this many vertices the pairwise diameter runs over every point
const BRUTE_FORCE_DIAMETER_LIMIT: usize = 512;

/// Zeroth-moment threshold under which the area centroid is unreliable
const DEGENERATE_AREA: f64 = 1e-9;

/// Shoelace area of the contour
pub fn polygon_area(contour: &Contour) -> f64 {
    contour.to_geo_polygon().unsigned_area()
}

/// Length of the closed path through all contour points
pub fn closed_perimeter(contour: &Contour) -> f64 {
    contour.to_geo_polygon().exterior().euclidean_length()
}

/// Area-weighted centroid, falling back to the mask then to the vertex mean
pub fn centroid(contour: &Contour, raw_mask: Option<&GrayImage>) -> [f64; 2] {
    let polygon = contour.to_geo_polygon();
    if polygon.signed_area().abs() > DEGENERATE_AREA {
        if let Some(point) = polygon.centroid() {
            return [point.x(), point.y()];
        }
    }

    raw_mask
        .and_then(mask_centroid)
        .unwrap_or_else(|| contour.vertex_mean())
}

/// Largest Euclidean distance between any two contour points
pub fn max_pairwise_distance(contour: &Contour) -> f64 {
    let points = contour.points();
    if points.len() <= BRUTE_FORCE_DIAMETER_LIMIT {
        return brute_force_diameter(points);
    }

    // The farthest pair always lies on the convex hull
    let hull = contour.to_geo_polygon().convex_hull();
    let hull_points: Vec<[f64; 2]> = hull.exterior().coords().map(|c| [c.x, c.y]).collect();
    brute_force_diameter(&hull_points)
}

fn brute_force_diameter(points: &[[f64; 2]]) -> f64 {
    let mut best_sq = 0.0f64;
    for (i, a) in points.iter().enumerate() {
        for b in &points[i + 1..] {
            let dx = b[0] - a[0];
            let dy = b[1] - a[1];
            best_sq = best_sq.max(dx * dx + dy * dy);
        }
    }
    best_sq.sqrt()
}

/// Mean gray level of the pixels strictly inside the contour.
///
/// Rows are filled from even-odd edge crossings at pixel centres. Pixels on
/// an edge, horizontal ones included, are left out.
pub fn mean_intensity(contour: &Contour, image: &GrayImage) -> Option<f64> {
    if image.width() == 0 || image.height() == 0 {
        return None;
    }

    let points = contour.points();
    let (min, max) = contour.bounding_box();
    let y_start = min[1].ceil().max(0.0);
    let y_end = max[1].floor().min((image.height() - 1) as f64);
    let x_limit = (image.width() - 1) as f64;
    if y_end < y_start {
        return None;
    }

    let mut sum = 0u64;
    let mut count = 0u64;
    let mut crossings: Vec<f64> = Vec::new();
    let mut horizontal: Vec<(f64, f64)> = Vec::new();

    for y in y_start as u32..=y_end as u32 {
        let row = y as f64;
        crossings.clear();
        horizontal.clear();

        for (i, a) in points.iter().enumerate() {
            let b = points[(i + 1) % points.len()];
            if a[1] == row && b[1] == row {
                horizontal.push((a[0].min(b[0]), a[0].max(b[0])));
            } else if (a[1] <= row) != (b[1] <= row) {
                crossings.push(a[0] + (row - a[1]) * (b[0] - a[0]) / (b[1] - a[1]));
            }
        }
        crossings.sort_by(f64::total_cmp);

        for span in crossings.chunks_exact(2) {
            let first = (span[0].floor() + 1.0).max(0.0);
            let last = (span[1].ceil() - 1.0).min(x_limit);
            if last < first {
                continue;
            }
            for x in first as u32..=last as u32 {
                let column = x as f64;
                if horizontal.iter().any(|&(lo, hi)| column >= lo && column <= hi) {
                    continue;
                }
                sum += image.get_pixel(x, y)[0] as u64;
                count += 1;
            }
        }
    }

    (count > 0).then(|| sum as f64 / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use image::Luma;

    fn square(side: f64) -> Contour {
        Contour::new(vec![[0.0, 0.0], [side, 0.0], [side, side], [0.0, side]]).unwrap()
    }

    #[test]
    fn test_area_and_perimeter_of_square() {
        let contour = square(10.0);
        assert_abs_diff_eq!(polygon_area(&contour), 100.0, epsilon = 1e-9);
        assert_abs_diff_eq!(closed_perimeter(&contour), 40.0, epsilon = 1e-9);
    }

    #[test]
    fn test_centroid_is_area_weighted() {
        // Dense vertices along one edge would pull a vertex mean off-centre
        let contour = Contour::new(vec![
            [0.0, 0.0],
            [2.0, 0.0],
            [4.0, 0.0],
            [6.0, 0.0],
            [8.0, 0.0],
            [10.0, 0.0],
            [10.0, 10.0],
            [0.0, 10.0],
        ])
        .unwrap();
        let [cx, cy] = centroid(&contour, None);
        assert_abs_diff_eq!(cx, 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(cy, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_centroid_falls_back_for_collinear_points() {
        let contour = Contour::new(vec![[0.0, 0.0], [4.0, 0.0], [8.0, 0.0]]).unwrap();
        assert_eq!(centroid(&contour, None), [4.0, 0.0]);

        let mut mask = GrayImage::new(10, 10);
        mask.put_pixel(2, 6, Luma([255u8]));
        assert_eq!(centroid(&contour, Some(&mask)), [2.0, 6.0]);
    }

    #[test]
    fn test_diameter_matches_diagonal() {
        assert_abs_diff_eq!(max_pairwise_distance(&square(3.0)), 18f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_large_contour_diameter_uses_hull() {
        let points: Vec<[f64; 2]> = (0..2000)
            .map(|i| {
                let t = i as f64 / 2000.0 * std::f64::consts::TAU;
                [50.0 * t.cos(), 20.0 * t.sin()]
            })
            .collect();
        let contour = Contour::new(points).unwrap();
        assert_abs_diff_eq!(max_pairwise_distance(&contour), 100.0, epsilon = 1e-6);
    }

    #[test]
    fn test_mean_intensity_excludes_boundary() {
        let mut image = GrayImage::from_pixel(20, 20, Luma([10u8]));
        for y in 3..8 {
            for x in 3..8 {
                image.put_pixel(x, y, Luma([200u8]));
            }
        }
        let contour = Contour::new(vec![[2.0, 2.0], [8.0, 2.0], [8.0, 8.0], [2.0, 8.0]]).unwrap();
        assert_abs_diff_eq!(mean_intensity(&contour, &image).unwrap(), 200.0, epsilon = 1e-9);
    }

    #[test]
    fn test_mean_intensity_matches_point_in_polygon() {
        use geo::Contains;
        use geo_types::Point;

        let image = GrayImage::from_fn(24, 24, |x, y| Luma([((x * 7 + y * 13) % 256) as u8]));
        let shapes = [
            vec![[10.0, 2.0], [18.0, 10.0], [10.0, 18.0], [2.0, 10.0]],
            vec![[2.0, 2.0], [12.0, 2.0], [12.0, 6.0], [6.0, 6.0], [6.0, 12.0], [2.0, 12.0]],
            vec![[1.5, 3.2], [20.7, 5.1], [9.3, 21.4]],
        ];

        for points in shapes {
            let contour = Contour::new(points).unwrap();
            let polygon = contour.to_geo_polygon();
            let inside: Vec<f64> = image
                .enumerate_pixels()
                .filter(|(x, y, _)| polygon.contains(&Point::new(*x as f64, *y as f64)))
                .map(|(_, _, p)| p[0] as f64)
                .collect();
            let expected = inside.iter().sum::<f64>() / inside.len() as f64;
            assert_abs_diff_eq!(mean_intensity(&contour, &image).unwrap(), expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_mean_intensity_outside_image_is_undefined() {
        let image = GrayImage::new(5, 5);
        let contour = Contour::new(vec![[-20.0, -20.0], [-10.0, -20.0], [-10.0, -10.0]]).unwrap();
        assert_eq!(mean_intensity(&contour, &image), None);
    }
}
