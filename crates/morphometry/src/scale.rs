//! Pixel to physical unit conversion.
//!
//! A [`ScaleContext`] is resolved once per analysis run from a
//! [`ScaleSource`] and never changes afterwards. Descriptors are always
//! stored in pixels; scaled values are derived through
//! [`ScaleContext::scale`].

use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::warn;

use crate::{
    descriptor::{Descriptor, DescriptorKind},
    error::{MorphometryError, Result},
};

pub const PIXEL_UNIT: &str = "px";

/// Physical length units recognised on scale-bar labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize, JsonSchema)]
pub enum LengthUnit {
    #[strum(serialize = "nm")]
    #[serde(rename = "nm")]
    Nanometer,
    #[strum(to_string = "µm", serialize = "μm", serialize = "um")]
    #[serde(rename = "µm", alias = "μm", alias = "um")]
    Micrometer,
    #[strum(serialize = "mm")]
    #[serde(rename = "mm")]
    Millimeter,
    #[strum(serialize = "m")]
    #[serde(rename = "m")]
    Meter,
}

impl LengthUnit {
    /// Label suffixes in match order; longer symbols before `m`
    const SUFFIXES: [(&'static str, LengthUnit); 6] = [
        ("µm", LengthUnit::Micrometer),
        ("μm", LengthUnit::Micrometer),
        ("um", LengthUnit::Micrometer),
        ("nm", LengthUnit::Nanometer),
        ("mm", LengthUnit::Millimeter),
        ("m", LengthUnit::Meter),
    ];

    fn match_prefix(text: &str) -> Option<LengthUnit> {
        Self::SUFFIXES
            .iter()
            .find(|(suffix, _)| text.starts_with(suffix))
            .map(|(_, unit)| *unit)
    }
}

/// Result of an external scale-bar detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScaleBarReading {
    /// Length of the bar in pixels
    pub pixel_width: u32,
    /// Physical length printed on the label
    pub value: f64,
    pub unit: String,
}

impl ScaleBarReading {
    /// Read a label such as `"50 µm"` or `"0,5mm"`.
    ///
    /// The first number directly followed by a known unit wins. Returns
    /// `None` when the text contains no such pair.
    pub fn parse_label(pixel_width: u32, label: &str) -> Option<Self> {
        let bytes = label.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if !bytes[i].is_ascii_digit() {
                i += 1;
                continue;
            }

            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i < bytes.len() && (bytes[i] == b'.' || bytes[i] == b',') {
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let number = &label[start..i];

            let rest = label[i..].trim_start();
            if let Some(unit) = LengthUnit::match_prefix(rest) {
                let value = number.trim_end_matches([',', '.']).replace(',', ".");
                if let Ok(value) = value.parse::<f64>() {
                    return Some(Self {
                        pixel_width,
                        value,
                        unit: unit.to_string(),
                    });
                }
            }
        }
        None
    }
}

/// Where the pixel to unit conversion comes from
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScaleSource {
    /// Report everything in pixels
    #[default]
    Pixels,
    /// Pre-measured pixel distance covering `reference_length` units
    PixelDistance {
        pixel_distance: f64,
        reference_length: f64,
        unit: String,
    },
    /// Two user-marked points `reference_length` units apart
    ReferencePoints {
        a: [f64; 2],
        b: [f64; 2],
        reference_length: f64,
        unit: String,
    },
    /// Scale bar reading, or `None` to ask the configured detector
    ScaleBar {
        #[serde(default)]
        reading: Option<ScaleBarReading>,
    },
}

/// Behaviour when a requested physical scale cannot be established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScaleFallback {
    #[default]
    PixelMode,
    Abort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(try_from = "ScaleContextFields")]
pub struct ScaleContext {
    is_physical: bool,
    unit_name: String,
    pixels_per_unit: f64,
    /// Original image size over analyzed image size
    #[serde(default = "unit_factor")]
    resample_factor: f64,
}

/// Stored form of a [`ScaleContext`], checked by the constructors on load
#[derive(Deserialize, JsonSchema)]
struct ScaleContextFields {
    is_physical: bool,
    unit_name: String,
    pixels_per_unit: f64,
    #[serde(default = "unit_factor")]
    resample_factor: f64,
}

impl TryFrom<ScaleContextFields> for ScaleContext {
    type Error = MorphometryError;

    fn try_from(fields: ScaleContextFields) -> Result<Self> {
        let scale = if fields.is_physical {
            Self::from_pixel_distance(fields.pixels_per_unit, 1.0, &fields.unit_name)?
        } else {
            Self::pixels()
        };
        scale.with_resample_factor(fields.resample_factor)
    }
}

fn unit_factor() -> f64 {
    1.0
}

impl Default for ScaleContext {
    fn default() -> Self {
        Self::pixels()
    }
}

impl ScaleContext {
    /// Identity scaling
    pub fn pixels() -> Self {
        Self {
            is_physical: false,
            unit_name: PIXEL_UNIT.to_string(),
            pixels_per_unit: 1.0,
            resample_factor: 1.0,
        }
    }

    /// `pixels_per_unit = pixel_distance / reference_length`
    pub fn from_pixel_distance(pixel_distance: f64, reference_length: f64, unit: &str) -> Result<Self> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(pixel_distance) || !valid(reference_length) {
            return Err(MorphometryError::InvalidScaleReference {
                reference_length,
                pixel_distance,
            });
        }

        Ok(Self {
            is_physical: true,
            unit_name: normalize_unit_name(unit),
            pixels_per_unit: pixel_distance / reference_length,
            resample_factor: 1.0,
        })
    }

    pub fn from_reference_points(a: [f64; 2], b: [f64; 2], reference_length: f64, unit: &str) -> Result<Self> {
        let distance = ((b[0] - a[0]).powi(2) + (b[1] - a[1]).powi(2)).sqrt();
        Self::from_pixel_distance(distance, reference_length, unit)
    }

    pub fn from_scale_bar(reading: &ScaleBarReading) -> Result<Self> {
        Self::from_pixel_distance(reading.pixel_width as f64, reading.value, &reading.unit)
    }

    /// Resolve a source. Invalid references always fail; a missing scale-bar
    /// reading follows `fallback`.
    pub fn resolve(source: &ScaleSource, fallback: ScaleFallback) -> Result<Self> {
        match source {
            ScaleSource::Pixels => Ok(Self::pixels()),
            ScaleSource::PixelDistance {
                pixel_distance,
                reference_length,
                unit,
            } => Self::from_pixel_distance(*pixel_distance, *reference_length, unit),
            ScaleSource::ReferencePoints {
                a,
                b,
                reference_length,
                unit,
            } => Self::from_reference_points(*a, *b, *reference_length, unit),
            ScaleSource::ScaleBar { reading: Some(reading) } => Self::from_scale_bar(reading),
            ScaleSource::ScaleBar { reading: None } => match fallback {
                ScaleFallback::PixelMode => {
                    warn!("Scale bar not found, falling back to pixel units");
                    Ok(Self::pixels())
                }
                ScaleFallback::Abort => Err(MorphometryError::ScaleUnavailable),
            },
        }
    }

    /// Report values in the units of an image resampled by `factor`
    pub fn with_resample_factor(mut self, factor: f64) -> Result<Self> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(MorphometryError::InvalidConfig(format!(
                "resample factor must be positive, got {factor}"
            )));
        }
        self.resample_factor = factor;
        Ok(self)
    }

    pub fn is_physical(&self) -> bool {
        self.is_physical
    }

    pub fn unit_name(&self) -> &str {
        &self.unit_name
    }

    pub fn pixels_per_unit(&self) -> f64 {
        self.pixels_per_unit
    }

    pub fn resample_factor(&self) -> f64 {
        self.resample_factor
    }

    pub fn scale_length(&self, value_px: f64) -> f64 {
        value_px * self.resample_factor / self.pixels_per_unit
    }

    pub fn scale_area(&self, value_px2: f64) -> f64 {
        let factor = self.resample_factor / self.pixels_per_unit;
        value_px2 * factor * factor
    }

    /// Scale a pixel-space value according to the descriptor's kind
    pub fn scale(&self, descriptor: Descriptor, value_px: f64) -> f64 {
        match descriptor.kind() {
            DescriptorKind::Length => self.scale_length(value_px),
            DescriptorKind::Area => self.scale_area(value_px),
            DescriptorKind::Angle | DescriptorKind::Dimensionless | DescriptorKind::Intensity => value_px,
        }
    }
}

fn normalize_unit_name(unit: &str) -> String {
    match LengthUnit::from_str(unit.trim()) {
        Ok(unit) => unit.to_string(),
        Err(_) => unit.trim().to_string(),
    }
}
