use thiserror::Error;

#[derive(Error, Debug)]
pub enum MorphometryError {
    #[error("Degenerate contour: {points} usable points, at least 3 required")]
    DegenerateContour { points: usize },

    #[error("Invalid scale reference: reference length {reference_length}, pixel distance {pixel_distance}")]
    InvalidScaleReference { reference_length: f64, pixel_distance: f64 },

    #[error("Physical units requested but no scale could be resolved")]
    ScaleUnavailable,

    #[error("No particles found")]
    EmptyDetectionBatch,

    #[error("Analysis run was cancelled")]
    Cancelled,

    #[error("Unknown descriptor: {0}")]
    UnknownDescriptor(String),

    #[error("Invalid range for {descriptor}: [{min}, {max}] must be finite and ordered")]
    InvalidRange { descriptor: String, min: f64, max: f64 },

    #[error("No particle with id {0}")]
    UnknownParticle(usize),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),
}

pub type Result<T> = std::result::Result<T, MorphometryError>;
