pub mod builder;

use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use image::GrayImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    algorithms::{ContourNormalizer, DescriptorEngine},
    config::AnalysisConfig,
    error::{MorphometryError, Result},
    orientation::{OrientationFieldBuilder, OrientationVector},
    particle_set::{ParticleSet, RangeFilter},
    scale::{ScaleContext, ScaleSource},
    statistics::{Histogram, StatisticsAggregator, StatisticsTable},
    traits::{EllipseFitter, MaskContourExtractor, ScaleBarDetector},
    types::{Contour, DetectedObject, DetectionBatch, ParticleDescriptors},
};

/// Shared flag checked between particles of a running analysis
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Detection batch in, particle set out
pub struct AnalysisPipeline {
    config: AnalysisConfig,
    normalizer: ContourNormalizer<Box<dyn MaskContourExtractor>>,
    engine: DescriptorEngine<Box<dyn EllipseFitter>>,
    scale_bar_detector: Option<Box<dyn ScaleBarDetector>>,
}

type Measured = (Contour, ParticleDescriptors, f32, Option<Arc<GrayImage>>);

impl AnalysisPipeline {
    /// Create a new pipeline builder
    pub fn builder() -> builder::PipelineBuilder {
        builder::PipelineBuilder::new()
    }

    pub fn new(
        config: AnalysisConfig,
        normalizer: ContourNormalizer<Box<dyn MaskContourExtractor>>,
        engine: DescriptorEngine<Box<dyn EllipseFitter>>,
        scale_bar_detector: Option<Box<dyn ScaleBarDetector>>,
    ) -> Self {
        Self {
            config,
            normalizer,
            engine,
            scale_bar_detector,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Resolve the run's scale, asking the detector when no reading was given
    pub fn resolve_scale(&self, grayscale: Option<&GrayImage>) -> Result<ScaleContext> {
        let source = match (&self.config.scale, &self.scale_bar_detector, grayscale) {
            (ScaleSource::ScaleBar { reading: None }, Some(detector), Some(image)) => {
                let reading = detector.detect(image);
                debug!(found = reading.is_some(), "Scale bar detection finished");
                ScaleSource::ScaleBar { reading }
            }
            (source, _, _) => source.clone(),
        };

        ScaleContext::resolve(&source, self.config.scale_fallback)?
            .with_resample_factor(self.config.resample_factor)
    }

    /// Run the whole analysis.
    ///
    /// Degenerate objects are dropped; an invalid scale or a cancellation
    /// aborts the run without producing a set.
    pub fn run(&self, batch: &DetectionBatch, cancel: &CancellationToken) -> Result<AnalysisRun> {
        let scale = self.resolve_scale(batch.grayscale.as_ref())?;
        debug!(
            physical = scale.is_physical(),
            unit = scale.unit_name(),
            pixels_per_unit = scale.pixels_per_unit(),
            "Scale resolved"
        );

        let accepted = self.select_detections(&batch.objects);
        let grayscale = batch.grayscale.as_ref();

        let measured: Vec<Option<Measured>> = accepted
            .par_iter()
            .enumerate()
            .map(|(index, object)| {
                if cancel.is_cancelled() {
                    return Err(MorphometryError::Cancelled);
                }
                Ok(self.measure(index, object, grayscale))
            })
            .collect::<Result<_>>()?;

        if cancel.is_cancelled() {
            return Err(MorphometryError::Cancelled);
        }

        let mut particles = ParticleSet::new(scale);
        for (contour, descriptors, confidence, raw_mask) in measured.into_iter().flatten() {
            particles.push(contour, descriptors, Some(confidence), raw_mask);
        }

        let rejected = accepted.len() - particles.len();
        if particles.is_empty() {
            info!(detections = batch.objects.len(), "No particles found");
        } else {
            info!(
                particles = particles.len(),
                rejected,
                detections = batch.objects.len(),
                "Analysis finished"
            );
        }

        Ok(AnalysisRun {
            config: self.config.clone(),
            detections: batch.objects.len(),
            rejected,
            image_dimensions: batch.image_dimensions(),
            particles,
        })
    }

    /// Confidence threshold then detection limit, in input order
    fn select_detections<'a>(&self, objects: &'a [DetectedObject]) -> Vec<&'a DetectedObject> {
        let confident: Vec<&DetectedObject> = objects
            .iter()
            .filter(|object| object.confidence >= self.config.min_confidence)
            .collect();

        let limit = self.config.max_detections;
        if confident.len() >= limit {
            warn!(
                limit,
                detections = confident.len(),
                "Detection limit reached, some particles may be missing"
            );
        }
        debug!(
            skipped = objects.len() - confident.len(),
            "Low-confidence detections skipped"
        );

        confident.into_iter().take(limit).collect()
    }

    fn measure(&self, index: usize, object: &DetectedObject, grayscale: Option<&GrayImage>) -> Option<Measured> {
        let contour = match self.normalizer.normalize(&object.shape) {
            Ok(contour) => contour,
            Err(MorphometryError::DegenerateContour { points }) => {
                debug!(index, points, "Dropping degenerate detection");
                return None;
            }
            Err(e) => {
                warn!(index, error = %e, "Dropping detection");
                return None;
            }
        };

        let raw_mask = object.shape.raw_mask().cloned();
        let descriptors = self
            .engine
            .compute(&contour, raw_mask.as_deref(), grayscale);
        Some((contour, descriptors, object.confidence, raw_mask))
    }

    /// Get information about the pipeline configuration
    pub fn info(&self) -> String {
        format!(
            "Pipeline: feret step {}°, scale {:?}, scale-bar detector {}",
            self.engine.sweep.step_deg(),
            self.config.scale,
            if self.scale_bar_detector.is_some() { "set" } else { "none" }
        )
    }
}

/// Result of one analysis run, reloadable from JSON for re-filtering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRun {
    pub config: AnalysisConfig,
    /// Objects in the input batch
    pub detections: usize,
    /// Selected objects that did not yield a contour
    pub rejected: usize,
    pub image_dimensions: Option<(u32, u32)>,
    pub particles: ParticleSet,
}

impl AnalysisRun {
    pub fn scale(&self) -> &ScaleContext {
        self.particles.scale()
    }

    /// Fail with `EmptyDetectionBatch` when nothing was accepted
    pub fn require_particles(&self) -> Result<&ParticleSet> {
        if self.particles.is_empty() {
            return Err(MorphometryError::EmptyDetectionBatch);
        }
        Ok(&self.particles)
    }

    pub fn remove_particle(&mut self, id: usize) -> Result<()> {
        self.particles.remove(id).map(|_| ())
    }

    pub fn aggregator(&self) -> StatisticsAggregator {
        StatisticsAggregator::new(self.config.bin_count, self.config.fit_curve_samples)
    }

    pub fn statistics(&self, filter: Option<&RangeFilter>) -> StatisticsTable {
        self.aggregator().summarize(&self.particles, filter)
    }

    pub fn histograms(&self, filter: Option<&RangeFilter>) -> Vec<Histogram> {
        let view = match filter {
            Some(filter) => self.particles.filter(filter),
            None => self.particles.view(),
        };
        self.aggregator().histograms(&view)
    }

    pub fn orientation_field(&self, filter: Option<&RangeFilter>, include_min_layer: bool) -> Vec<OrientationVector> {
        let view = match filter {
            Some(filter) => self.particles.filter(filter),
            None => self.particles.view(),
        };
        OrientationFieldBuilder::new(self.config.display_range)
            .with_min_layer(include_min_layer)
            .build(&view)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut run: Self = serde_json::from_reader(reader)?;
        run.config.validate()?;
        run.particles.renumber();
        Ok(run)
    }
}
