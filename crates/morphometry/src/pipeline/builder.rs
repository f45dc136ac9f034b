use crate::{
    algorithms::{ContourNormalizer, DescriptorEngine, FeretSweep, ImageprocContourExtractor, LeastSquaresEllipseFitter},
    config::AnalysisConfig,
    error::{MorphometryError, Result},
    pipeline::AnalysisPipeline,
    scale::ScaleSource,
    traits::{EllipseFitter, MaskContourExtractor, ScaleBarDetector},
};

/// Builder for analysis pipelines with a fluent API
pub struct PipelineBuilder {
    config: AnalysisConfig,
    contour_extractor: Option<Box<dyn MaskContourExtractor>>,
    ellipse_fitter: Option<Box<dyn EllipseFitter>>,
    scale_bar_detector: Option<Box<dyn ScaleBarDetector>>,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            config: AnalysisConfig::default(),
            contour_extractor: None,
            ellipse_fitter: None,
            scale_bar_detector: None,
        }
    }

    /// Replace the whole run configuration
    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_scale(mut self, scale: ScaleSource) -> Self {
        self.config.scale = scale;
        self
    }

    pub fn with_feret_step(mut self, step_deg: f64) -> Self {
        self.config.feret_step_deg = step_deg;
        self
    }

    /// Set the mask contour extractor (replaces any existing one)
    pub fn set_contour_extractor<E>(mut self, extractor: E) -> Self
    where
        E: MaskContourExtractor + 'static,
    {
        self.contour_extractor = Some(Box::new(extractor));
        self
    }

    /// Set the ellipse fitter (replaces any existing one)
    pub fn set_ellipse_fitter<F>(mut self, fitter: F) -> Self
    where
        F: EllipseFitter + 'static,
    {
        self.ellipse_fitter = Some(Box::new(fitter));
        self
    }

    /// Consulted when the configured scale is a scale bar without a reading
    pub fn set_scale_bar_detector<D>(mut self, detector: D) -> Self
    where
        D: ScaleBarDetector + 'static,
    {
        self.scale_bar_detector = Some(Box::new(detector));
        self
    }

    /// Validate the configuration and build with default components if not specified
    pub fn build(self) -> Result<AnalysisPipeline> {
        self.config.validate()?;

        let sweep = FeretSweep::new(self.config.feret_step_deg).ok_or_else(|| {
            MorphometryError::InvalidConfig(format!("invalid Feret step {}", self.config.feret_step_deg))
        })?;

        let contour_extractor = self
            .contour_extractor
            .unwrap_or_else(|| Box::new(ImageprocContourExtractor));
        let ellipse_fitter = self
            .ellipse_fitter
            .unwrap_or_else(|| Box::new(LeastSquaresEllipseFitter));

        let normalizer = ContourNormalizer::new(contour_extractor, self.config.snap_to_pixel_grid);
        Ok(AnalysisPipeline::new(
            self.config,
            normalizer,
            DescriptorEngine::new(sweep, ellipse_fitter),
            self.scale_bar_detector,
        ))
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_is_rejected_at_build() {
        let result = PipelineBuilder::new().with_feret_step(-1.0).build();
        assert!(matches!(result, Err(MorphometryError::InvalidConfig(_))));
    }

    #[test]
    fn test_builder_applies_settings() {
        let pipeline = PipelineBuilder::new()
            .with_feret_step(2.0)
            .with_scale(ScaleSource::ScaleBar { reading: None })
            .build()
            .unwrap();
        assert_eq!(pipeline.config().feret_step_deg, 2.0);
        assert!(pipeline.info().contains("feret step 2°"));
        assert!(pipeline.info().contains("scale-bar detector none"));
    }
}
