use geojson::{Feature, FeatureCollection, Geometry, Value, feature::Id};
use serde_json::{Map, Number, Value as JsonValue};
use strum::IntoEnumIterator;
use tracing::debug;

use crate::{
    descriptor::Descriptor,
    error::Result,
    pipeline::AnalysisRun,
    types::{DetectedObject, ObjectShape, ParticleRecord},
};

/// Confidence given to imported polygons without a `confidence` property
const IMPORTED_CONFIDENCE: f32 = 1.0;

fn number(value: f64) -> JsonValue {
    Number::from_f64(value).map(JsonValue::Number).unwrap_or(JsonValue::Null)
}

fn segment(start: [f64; 2], end: [f64; 2]) -> JsonValue {
    JsonValue::Array(vec![
        JsonValue::Array(vec![number(start[0]), number(start[1])]),
        JsonValue::Array(vec![number(end[0]), number(end[1])]),
    ])
}

impl AnalysisRun {
    fn particle_feature(&self, record: &ParticleRecord) -> Feature {
        // GeoJSON rings are explicitly closed
        let mut ring: Vec<Vec<f64>> = record.contour.points().iter().map(|&[x, y]| vec![x, y]).collect();
        if let Some(first) = ring.first().cloned() {
            ring.push(first);
        }

        let mut properties = Map::new();
        properties.insert("id".to_string(), JsonValue::Number(Number::from(record.id)));
        properties.insert(
            "confidence".to_string(),
            record.confidence.map_or(JsonValue::Null, |c| number(c as f64)),
        );
        properties.insert(
            "centroid".to_string(),
            JsonValue::Array(record.descriptors.centroid.iter().map(|&v| number(v)).collect()),
        );
        for descriptor in Descriptor::iter() {
            let value = descriptor
                .value(record, self.scale())
                .map_or(JsonValue::Null, number);
            properties.insert(descriptor.to_string(), value);
        }
        if let Some((max, min)) = record.calipers() {
            properties.insert("feret_max_caliper".to_string(), segment(max.start, max.end));
            properties.insert("feret_min_caliper".to_string(), segment(min.start, min.end));
        }

        Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Polygon(vec![ring]))),
            id: Some(Id::Number(Number::from(record.id))),
            properties: Some(properties),
            foreign_members: None,
        }
    }

    /// One polygon feature per particle, descriptors in scaled units
    pub fn to_geojson(&self) -> FeatureCollection {
        let features = self
            .particles
            .iter()
            .map(|record| self.particle_feature(record))
            .collect();

        let mut foreign_members = Map::new();
        if let Some((width, height)) = self.image_dimensions {
            foreign_members.insert("image_width".to_string(), JsonValue::Number(Number::from(width)));
            foreign_members.insert("image_height".to_string(), JsonValue::Number(Number::from(height)));
        }
        foreign_members.insert("particle_count".to_string(), JsonValue::Number(Number::from(self.particles.len())));
        foreign_members.insert("unit".to_string(), JsonValue::String(self.scale().unit_name().to_string()));

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: Some(foreign_members),
        }
    }

    /// Export to GeoJSON and serialize to JSON string
    pub fn to_geojson_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_geojson())?)
    }

    /// Save GeoJSON to file
    pub fn save_geojson<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_geojson_string()?)?;
        Ok(())
    }
}

/// Read polygon detections from a GeoJSON feature collection.
///
/// Only the exterior ring of each polygon is used. A numeric `confidence`
/// property is honoured; other geometry types are skipped.
pub fn detections_from_geojson_str(text: &str) -> Result<Vec<DetectedObject>> {
    let collection: FeatureCollection = text.parse()?;

    let mut objects = Vec::new();
    for (index, feature) in collection.features.into_iter().enumerate() {
        let confidence = feature
            .property("confidence")
            .and_then(JsonValue::as_f64)
            .map_or(IMPORTED_CONFIDENCE, |c| c as f32);

        match feature.geometry.map(|geometry| geometry.value) {
            Some(Value::Polygon(rings)) if !rings.is_empty() => {
                let points = rings[0]
                    .iter()
                    .filter(|position| position.len() >= 2)
                    .map(|position| [position[0], position[1]])
                    .collect();
                objects.push(DetectedObject::new(ObjectShape::Polygon(points), confidence));
            }
            _ => debug!(index, "Skipping feature without a polygon geometry"),
        }
    }

    Ok(objects)
}
