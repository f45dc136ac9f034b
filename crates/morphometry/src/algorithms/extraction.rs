use image::GrayImage;
use imageproc::contours::BorderType;
use crate::{error::Result, traits::MaskContourExtractor};

/// Imageproc-based contour extractor
#[derive(Debug, Clone, Default)]
pub struct ImageprocContourExtractor;

impl MaskContourExtractor for ImageprocContourExtractor {
    fn extract_external_contours(&self, mask: &GrayImage) -> Result<Vec<Vec<[f64; 2]>>> {
        let contours = imageproc::contours::find_contours::<i32>(mask);

        let result = contours
            .into_iter()
            .filter(|contour| matches!(contour.border_type, BorderType::Outer))
            .map(|contour| {
                contour
                    .points
                    .iter()
                    .map(|p| [p.x as f64, p.y as f64])
                    .collect()
            })
            .collect();

        Ok(result)
    }
}

/// Centroid of all foreground pixels, `None` for an empty mask
pub fn mask_centroid(mask: &GrayImage) -> Option<[f64; 2]> {
    let mut count = 0u64;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;

    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel[0] != 0 {
            count += 1;
            sum_x += x as f64;
            sum_y += y as f64;
        }
    }

    (count > 0).then(|| [sum_x / count as f64, sum_y / count as f64])
}
