use image::GrayImage;
use crate::{algorithms::EllipseFit, error::Result, scale::ScaleBarReading};

/// Trait for boundary extraction from binary masks
pub trait MaskContourExtractor: Send + Sync {
    /// Extract the external boundaries of every foreground component
    fn extract_external_contours(&self, mask: &GrayImage) -> Result<Vec<Vec<[f64; 2]>>>;
}

/// Trait for ellipse fitting algorithms
pub trait EllipseFitter: Send + Sync {
    /// Fit an ellipse to the points, `None` when no ellipse is defined
    fn fit(&self, points: &[[f64; 2]]) -> Option<EllipseFit>;
}

/// Trait for external scale-bar detectors (OCR and friends)
pub trait ScaleBarDetector: Send + Sync {
    /// Locate the scale bar and read its label, `None` on failure
    fn detect(&self, image: &GrayImage) -> Option<ScaleBarReading>;
}

impl<T: MaskContourExtractor + ?Sized> MaskContourExtractor for Box<T> {
    fn extract_external_contours(&self, mask: &GrayImage) -> Result<Vec<Vec<[f64; 2]>>> {
        (**self).extract_external_contours(mask)
    }
}

impl<T: EllipseFitter + ?Sized> EllipseFitter for Box<T> {
    fn fit(&self, points: &[[f64; 2]]) -> Option<EllipseFit> {
        (**self).fit(points)
    }
}
