use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use image::{GrayImage, Luma};
use morphometry::{AnalysisConfig, DetectedObject, DetectionBatch, MorphometryError, ObjectShape};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParticleCliError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    ImageError(#[from] image::ImageError),
    #[error(transparent)]
    Morphometry(#[from] MorphometryError),
    #[error("Missing 'detections' path, set it in the job file or pass --detections")]
    MissingDetections,
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
    #[error("Unsupported detections format. Please use .json or .geojson files")]
    UnsupportedDetectionsFormat,
}

/// Analysis job: where the inputs live and how to analyze them
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct AnalysisJob {
    /// Detection file, `.json` or `.geojson`
    pub detections: Option<String>,
    /// Analyzed image, converted to grayscale for intensities
    pub image: Option<String>,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

fn default_output_dir() -> String {
    "particles_out".to_string()
}

impl Default for AnalysisJob {
    fn default() -> Self {
        Self {
            detections: None,
            image: None,
            output_dir: default_output_dir(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl AnalysisJob {
    /// Load AnalysisJob configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ParticleCliError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load AnalysisJob configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self, ParticleCliError> {
        let job: AnalysisJob = toml::from_str(content)?;
        job.analysis.validate()?;
        Ok(job)
    }

    /// Load AnalysisJob configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ParticleCliError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load AnalysisJob configuration from JSON string
    pub fn from_json(content: &str) -> Result<Self, ParticleCliError> {
        let job: AnalysisJob = serde_json::from_str(content)?;
        job.analysis.validate()?;
        Ok(job)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ParticleCliError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(ParticleCliError::UnsupportedFileFormat),
        }
    }

    /// Convert AnalysisJob to TOML string
    pub fn to_toml(&self) -> Result<String, ParticleCliError> {
        Ok(toml::to_string_pretty(&self)?)
    }

    /// Convert AnalysisJob to JSON string
    pub fn to_json(&self) -> Result<String, ParticleCliError> {
        Ok(serde_json::to_string_pretty(&self)?)
    }

    /// Read the detections and the optional image into one batch
    pub fn load_batch(&self) -> Result<DetectionBatch, ParticleCliError> {
        let detections = self
            .detections
            .as_ref()
            .ok_or(ParticleCliError::MissingDetections)?;
        let mut batch = DetectionBatch::new(load_detections(detections)?);
        if let Some(image) = &self.image {
            batch = batch.with_grayscale(image::open(image)?.to_luma8());
        }
        Ok(batch)
    }
}

/// Shape of one detection as written by an external detector
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DetectionShape {
    /// Vertices in traversal order
    Polygon { points: Vec<[f64; 2]> },
    /// Flat `x, y, ...` runs from sliced inference, joined in order
    Fragments { fragments: Vec<Vec<f64>> },
    /// Binary mask image, relative paths resolve against the detection file
    Mask { path: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct DetectionEntry {
    #[serde(flatten)]
    pub shape: DetectionShape,
    #[serde(default = "full_confidence")]
    pub confidence: f32,
}

fn full_confidence() -> f32 {
    1.0
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct DetectionFile {
    pub detections: Vec<DetectionEntry>,
}

impl DetectionFile {
    pub fn from_json(content: &str) -> Result<Self, ParticleCliError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Convert entries to detector objects, loading masks from `base_dir`
    pub fn into_objects(self, base_dir: &Path) -> Result<Vec<DetectedObject>, ParticleCliError> {
        self.detections
            .into_iter()
            .map(|entry| {
                let shape = match entry.shape {
                    DetectionShape::Polygon { points } => ObjectShape::Polygon(points),
                    DetectionShape::Fragments { fragments } => ObjectShape::PolygonFragments(fragments),
                    DetectionShape::Mask { path } => {
                        let path = resolve_path(base_dir, &path);
                        ObjectShape::Mask(Arc::new(binarize(&image::open(path)?.to_luma8())))
                    }
                };
                Ok(DetectedObject::new(shape, entry.confidence))
            })
            .collect()
    }
}

fn resolve_path(base_dir: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Any non-zero pixel is foreground
fn binarize(mask: &GrayImage) -> GrayImage {
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        if mask.get_pixel(x, y)[0] > 0 {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Load detections from `.json` (detection file) or `.geojson` (polygons)
pub fn load_detections<P: AsRef<Path>>(path: P) -> Result<Vec<DetectedObject>, ParticleCliError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("geojson") => Ok(morphometry::detections_from_geojson_str(&content)?),
        Some("json") => {
            let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
            DetectionFile::from_json(&content)?.into_objects(base_dir)
        }
        _ => Err(ParticleCliError::UnsupportedDetectionsFormat),
    }
}
