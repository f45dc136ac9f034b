//! # Particle Morphometry Library
//!
//! Turns detector output (binary masks, polygons or sliced-inference
//! fragments) into per-particle shape descriptors, scales them to physical
//! units and summarizes the resulting population.
//!
//! ## Core Features
//!
//! - **Contour normalization**: one canonical outline per detected object
//! - **Descriptors**: area, perimeter, diameter, Feret sweep, eccentricity, intensity
//! - **Scaling**: pixel mode, reference distances or scale-bar readings
//! - **Statistics**: filtered summaries, histograms with normal-fit overlays
//! - **Orientation field**: per-particle vectors along the Feret angles
//! - **Exports**: CSV tables, GeoJSON and reloadable JSON runs
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use morphometry::{AnalysisPipeline, CancellationToken, DetectedObject, DetectionBatch, ObjectShape};
//!
//! let pipeline = AnalysisPipeline::builder().build()?;
//!
//! let batch = DetectionBatch::new(vec![DetectedObject::new(
//!     ObjectShape::Polygon(vec![[0.0, 0.0], [12.0, 0.0], [12.0, 5.0], [0.0, 5.0]]),
//!     0.9,
//! )]);
//! let run = pipeline.run(&batch, &CancellationToken::new())?;
//!
//! let table = run.statistics(None);
//! run.save_geojson("particles.geojson")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Filtering
//!
//! ```rust,no_run
//! use morphometry::{AnalysisRun, RangeFilter};
//!
//! let run = AnalysisRun::load_json("run.json")?;
//! let filter = RangeFilter::new(vec!["area=50:".parse()?, "eccentricity=:0.8".parse()?]);
//! let table = run.statistics(Some(&filter));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Core modules
pub mod error;
pub mod types;
pub mod traits;
pub mod algorithms;
pub mod descriptor;
pub mod scale;
pub mod particle_set;
pub mod statistics;
pub mod orientation;
pub mod config;
pub mod pipeline;
pub mod io;

// Re-exports for convenience
pub use error::{MorphometryError, Result};
pub use types::{Contour, DetectedObject, DetectionBatch, ObjectShape, ParticleDescriptors, ParticleRecord};
pub use traits::*;
pub use algorithms::*;
pub use descriptor::{Descriptor, DescriptorKind};
pub use scale::{LengthUnit, ScaleBarReading, ScaleContext, ScaleFallback, ScaleSource};
pub use particle_set::{DescriptorRange, ParticleSession, ParticleSet, ParticleView, RangeFilter};
pub use statistics::{DescriptorStatistics, Histogram, NormalFit, StatisticsAggregator, StatisticsTable};
pub use orientation::{OrientationFieldBuilder, OrientationLayer, OrientationVector};
pub use config::AnalysisConfig;
pub use pipeline::{AnalysisPipeline, AnalysisRun, CancellationToken, builder::PipelineBuilder};
pub use io::*;
