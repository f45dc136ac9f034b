use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    algorithms::{DEFAULT_FERET_STEP_DEG, HALF_TURN_DEG, MIN_FERET_STEP_DEG},
    error::{MorphometryError, Result},
    orientation::DEFAULT_DISPLAY_RANGE,
    scale::{ScaleFallback, ScaleSource},
    statistics::{DEFAULT_BIN_COUNT, DEFAULT_FIT_CURVE_SAMPLES},
};

pub const DEFAULT_ROUND_PRECISION: u32 = 2;
pub const DEFAULT_MAX_DETECTIONS: usize = 1000;
pub const MAX_ROUND_PRECISION: u32 = 6;
pub const MAX_BIN_COUNT: usize = 100;

/// Settings of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AnalysisConfig {
    /// How pixels convert to physical units
    pub scale: ScaleSource,
    /// What to do when the requested scale cannot be resolved
    pub scale_fallback: ScaleFallback,
    /// Original image size over the size the detector saw
    pub resample_factor: f64,
    /// Decimals for rendered tables and exports
    pub round_precision: u32,
    /// Histogram bins
    pub bin_count: usize,
    /// Angular step of the Feret sweep in degrees
    pub feret_step_deg: f64,
    /// Detections below this confidence are skipped
    pub min_confidence: f32,
    /// Detections beyond this count are dropped
    pub max_detections: usize,
    /// Truncate polygon vertices to integer pixels
    pub snap_to_pixel_grid: bool,
    /// Orientation vector length range
    pub display_range: [f64; 2],
    /// Points per normal-fit curve
    pub fit_curve_samples: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            scale: ScaleSource::Pixels,
            scale_fallback: ScaleFallback::PixelMode,
            resample_factor: 1.0,
            round_precision: DEFAULT_ROUND_PRECISION,
            bin_count: DEFAULT_BIN_COUNT,
            feret_step_deg: DEFAULT_FERET_STEP_DEG,
            min_confidence: 0.0,
            max_detections: DEFAULT_MAX_DETECTIONS,
            snap_to_pixel_grid: false,
            display_range: DEFAULT_DISPLAY_RANGE,
            fit_curve_samples: DEFAULT_FIT_CURVE_SAMPLES,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(MorphometryError::InvalidConfig(message));

        if self.round_precision > MAX_ROUND_PRECISION {
            return invalid(format!(
                "round_precision must be at most {MAX_ROUND_PRECISION}, got {}",
                self.round_precision
            ));
        }
        if self.bin_count == 0 || self.bin_count > MAX_BIN_COUNT {
            return invalid(format!("bin_count must be in 1..={MAX_BIN_COUNT}, got {}", self.bin_count));
        }
        if !(MIN_FERET_STEP_DEG..=HALF_TURN_DEG).contains(&self.feret_step_deg) {
            return invalid(format!(
                "feret_step_deg must be in [{MIN_FERET_STEP_DEG}, {HALF_TURN_DEG}], got {}",
                self.feret_step_deg
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return invalid(format!("min_confidence must be in [0, 1], got {}", self.min_confidence));
        }
        if self.max_detections == 0 {
            return invalid("max_detections must be positive".to_string());
        }
        if !self.resample_factor.is_finite() || self.resample_factor <= 0.0 {
            return invalid(format!("resample_factor must be positive, got {}", self.resample_factor));
        }
        let [lo, hi] = self.display_range;
        if !lo.is_finite() || !hi.is_finite() || lo < 0.0 || lo > hi {
            return invalid(format!("display_range must satisfy 0 <= min <= max, got [{lo}, {hi}]"));
        }
        Ok(())
    }

    /// Round for display; stored values are never rounded
    pub fn round(&self, value: f64) -> f64 {
        let factor = 10f64.powi(self.round_precision as i32);
        (value * factor).round() / factor
    }
}
