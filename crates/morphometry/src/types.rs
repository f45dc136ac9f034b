use std::sync::Arc;

use geo_types::{Coord, LineString, Polygon};
use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::{
    algorithms::FeretCaliper,
    error::{MorphometryError, Result},
};

/// Minimum number of distinct vertices for a usable contour
pub const MIN_CONTOUR_POINTS: usize = 3;

/// Ordered closed polyline describing one particle outline.
///
/// The ring is stored open: the last vertex is implicitly joined to the
/// first one. Consecutive vertices are always distinct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<[f64; 2]>", into = "Vec<[f64; 2]>")]
pub struct Contour {
    points: Vec<[f64; 2]>,
}

impl TryFrom<Vec<[f64; 2]>> for Contour {
    type Error = MorphometryError;

    fn try_from(points: Vec<[f64; 2]>) -> Result<Self> {
        Self::new(points)
    }
}

impl From<Contour> for Vec<[f64; 2]> {
    fn from(contour: Contour) -> Self {
        contour.points
    }
}

impl Contour {
    /// Build a contour, dropping non-finite and consecutive duplicate points
    pub fn new(points: Vec<[f64; 2]>) -> Result<Self> {
        let mut cleaned: Vec<[f64; 2]> = Vec::with_capacity(points.len());
        for point in points {
            if !point[0].is_finite() || !point[1].is_finite() {
                continue;
            }
            if cleaned.last() != Some(&point) {
                cleaned.push(point);
            }
        }

        // Closing vertex repeats the first one
        while cleaned.len() > 1 && cleaned.first() == cleaned.last() {
            cleaned.pop();
        }

        if cleaned.len() < MIN_CONTOUR_POINTS {
            return Err(MorphometryError::DegenerateContour {
                points: cleaned.len(),
            });
        }

        Ok(Self { points: cleaned })
    }

    pub fn points(&self) -> &[[f64; 2]] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Convert to geo-types Polygon for geometric operations
    pub fn to_geo_polygon(&self) -> Polygon<f64> {
        let coords: Vec<Coord<f64>> = self
            .points
            .iter()
            .map(|&[x, y]| Coord { x, y })
            .collect();

        Polygon::new(LineString::new(coords), vec![])
    }

    /// Unweighted mean of the vertices
    pub fn vertex_mean(&self) -> [f64; 2] {
        let n = self.points.len() as f64;
        let (sum_x, sum_y) = self
            .points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), &[x, y]| (sx + x, sy + y));
        [sum_x / n, sum_y / n]
    }

    /// Get the bounding box of the contour
    pub fn bounding_box(&self) -> ([f64; 2], [f64; 2]) {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;

        for &[x, y] in &self.points {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        ([min_x, min_y], [max_x, max_y])
    }
}

/// Detector-specific representation of one object
#[derive(Debug, Clone)]
pub enum ObjectShape {
    /// Binary mask, non-zero pixels are foreground
    Mask(Arc<GrayImage>),
    /// Polygon vertices in traversal order
    Polygon(Vec<[f64; 2]>),
    /// Flat `x, y, x, y, ...` coordinate runs from sliced inference, joined in order
    PolygonFragments(Vec<Vec<f64>>),
}

impl ObjectShape {
    pub fn raw_mask(&self) -> Option<&Arc<GrayImage>> {
        match self {
            Self::Mask(mask) => Some(mask),
            _ => None,
        }
    }
}

/// One object reported by a detection backend
#[derive(Debug, Clone)]
pub struct DetectedObject {
    pub shape: ObjectShape,
    pub confidence: f32,
}

impl DetectedObject {
    pub fn new(shape: ObjectShape, confidence: f32) -> Self {
        Self { shape, confidence }
    }
}

/// Detector output for one image
#[derive(Debug, Clone, Default)]
pub struct DetectionBatch {
    pub objects: Vec<DetectedObject>,
    /// Grayscale derivative of the analyzed image, used for intensity
    pub grayscale: Option<GrayImage>,
}

impl DetectionBatch {
    pub fn new(objects: Vec<DetectedObject>) -> Self {
        Self {
            objects,
            grayscale: None,
        }
    }

    pub fn with_grayscale(mut self, image: GrayImage) -> Self {
        self.grayscale = Some(image);
        self
    }

    pub fn image_dimensions(&self) -> Option<(u32, u32)> {
        self.grayscale.as_ref().map(|img| img.dimensions())
    }
}

/// Pixel-space descriptors of one particle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleDescriptors {
    pub centroid: [f64; 2],
    pub area_px: f64,
    pub perimeter_px: f64,
    /// Largest distance between any two contour points
    pub diameter_px: f64,
    pub feret_max_px: f64,
    pub feret_min_px: f64,
    pub feret_mean_px: f64,
    pub feret_angle_at_max_deg: f64,
    pub feret_angle_at_min_deg: f64,
    /// 0 when the ellipse fit is undefined
    pub eccentricity: f64,
    /// Absent when no grayscale image was supplied
    pub mean_intensity: Option<f64>,
}

/// One detected particle with its computed state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticleRecord {
    /// 1-based position in the owning set
    pub id: usize,
    pub confidence: Option<f32>,
    pub contour: Contour,
    #[serde(flatten)]
    pub descriptors: ParticleDescriptors,
    #[serde(skip)]
    pub raw_mask: Option<Arc<GrayImage>>,
}

impl ParticleRecord {
    /// Caliper segments at the max and min Feret angles, for overlays
    pub fn calipers(&self) -> Option<(FeretCaliper, FeretCaliper)> {
        let d = &self.descriptors;
        let points = self.contour.points();
        let max = FeretCaliper::at_angle(points, d.centroid, d.feret_angle_at_max_deg)?;
        let min = FeretCaliper::at_angle(points, d.centroid, d.feret_angle_at_min_deg)?;
        Some((max, min))
    }
}
