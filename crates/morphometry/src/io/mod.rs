pub mod geojson;
pub mod tables;

pub use self::geojson::detections_from_geojson_str;
pub use self::tables::{write_particles_csv, write_statistics_csv};
