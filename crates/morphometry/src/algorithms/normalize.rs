use geo_types::{Coord, LineString, Polygon};
use crate::{
    algorithms::ImageprocContourExtractor,
    error::{MorphometryError, Result},
    traits::MaskContourExtractor,
    types::{Contour, ObjectShape},
};

/// Turns detector-specific shapes into one canonical contour per object
#[derive(Debug, Clone, Default)]
pub struct ContourNormalizer<C = ImageprocContourExtractor>
where
    C: MaskContourExtractor,
{
    pub extractor: C,
    /// Truncate vertices to integer pixel coordinates
    pub snap_to_pixel_grid: bool,
}

impl<C> ContourNormalizer<C>
where
    C: MaskContourExtractor,
{
    pub fn new(extractor: C, snap_to_pixel_grid: bool) -> Self {
        Self {
            extractor,
            snap_to_pixel_grid,
        }
    }

    /// Normalize one object, failing with `DegenerateContour` below 3 points
    pub fn normalize(&self, shape: &ObjectShape) -> Result<Contour> {
        let points = match shape {
            ObjectShape::Mask(mask) => {
                let contours = self.extractor.extract_external_contours(mask)?;
                largest_by_area(contours)
                    .ok_or(MorphometryError::DegenerateContour { points: 0 })?
            }
            ObjectShape::Polygon(points) => points.clone(),
            ObjectShape::PolygonFragments(fragments) => {
                let flat: Vec<f64> = fragments.iter().flatten().copied().collect();
                flat.chunks_exact(2).map(|pair| [pair[0], pair[1]]).collect()
            }
        };

        let points = if self.snap_to_pixel_grid {
            points
                .into_iter()
                .map(|[x, y]| [x.trunc(), y.trunc()])
                .collect()
        } else {
            points
        };

        Contour::new(points)
    }
}

/// Keep the component with the largest enclosed area, earliest wins ties
fn largest_by_area(contours: Vec<Vec<[f64; 2]>>) -> Option<Vec<[f64; 2]>> {
    use geo::Area;

    let mut best: Option<(f64, Vec<[f64; 2]>)> = None;
    for points in contours {
        let coords: Vec<Coord<f64>> = points.iter().map(|&[x, y]| Coord { x, y }).collect();
        let area = Polygon::new(LineString::new(coords), vec![]).unsigned_area();

        let replace = match &best {
            Some((best_area, _)) => area > *best_area,
            None => true,
        };
        if replace {
            best = Some((area, points));
        }
    }

    best.map(|(_, points)| points)
}
