use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};

use crate::{scale::ScaleContext, types::ParticleRecord};

/// How a descriptor responds to unit scaling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    Length,
    Area,
    Angle,
    Dimensionless,
    Intensity,
}

#[derive(
    Debug, Clone, Copy,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq, Eq, Hash
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Descriptor {
    /// Enclosed polygon area
    Area,
    /// Closed contour length
    Perimeter,
    /// Largest distance between two contour points
    Diameter,
    /// Largest caliper width
    FeretMax,
    /// Smallest caliper width
    FeretMin,
    /// Mean caliper width over the sweep
    FeretMean,
    /// Sweep angle of the largest width
    FeretAngleMax,
    /// Sweep angle of the smallest width
    FeretAngleMin,
    /// Fitted ellipse eccentricity
    Eccentricity,
    /// Mean gray level inside the contour
    MeanIntensity,
}

impl Descriptor {
    /// Descriptors summarized in statistics tables and histograms
    pub const SUMMARY: [Descriptor; 8] = [
        Descriptor::Area,
        Descriptor::Perimeter,
        Descriptor::Diameter,
        Descriptor::FeretMax,
        Descriptor::FeretMin,
        Descriptor::FeretMean,
        Descriptor::Eccentricity,
        Descriptor::MeanIntensity,
    ];

    /// Get a list of all descriptor names
    pub fn names() -> &'static [&'static str] {
        <Self as VariantNames>::VARIANTS
    }

    pub fn kind(&self) -> DescriptorKind {
        match self {
            Self::Area => DescriptorKind::Area,
            Self::Perimeter
            | Self::Diameter
            | Self::FeretMax
            | Self::FeretMin
            | Self::FeretMean => DescriptorKind::Length,
            Self::FeretAngleMax | Self::FeretAngleMin => DescriptorKind::Angle,
            Self::Eccentricity => DescriptorKind::Dimensionless,
            Self::MeanIntensity => DescriptorKind::Intensity,
        }
    }

    /// Short column symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Area => "S",
            Self::Perimeter => "P",
            Self::Diameter => "D",
            Self::FeretMax => "Dmax",
            Self::FeretMin => "Dmin",
            Self::FeretMean => "Dmean",
            Self::FeretAngleMax => "θmax",
            Self::FeretAngleMin => "θmin",
            Self::Eccentricity => "e",
            Self::MeanIntensity => "I",
        }
    }

    /// Column label with the unit of the given scale, e.g. `S [µm²]`
    pub fn label(&self, scale: &ScaleContext) -> String {
        match self.kind() {
            DescriptorKind::Length => format!("{} [{}]", self.symbol(), scale.unit_name()),
            DescriptorKind::Area => format!("{} [{}²]", self.symbol(), scale.unit_name()),
            DescriptorKind::Angle => format!("{} [°]", self.symbol()),
            DescriptorKind::Dimensionless => self.symbol().to_string(),
            DescriptorKind::Intensity => format!("{} [a.u.]", self.symbol()),
        }
    }

    /// Pixel-space value stored on the record
    pub fn raw_value(&self, record: &ParticleRecord) -> Option<f64> {
        let d = &record.descriptors;
        match self {
            Self::Area => Some(d.area_px),
            Self::Perimeter => Some(d.perimeter_px),
            Self::Diameter => Some(d.diameter_px),
            Self::FeretMax => Some(d.feret_max_px),
            Self::FeretMin => Some(d.feret_min_px),
            Self::FeretMean => Some(d.feret_mean_px),
            Self::FeretAngleMax => Some(d.feret_angle_at_max_deg),
            Self::FeretAngleMin => Some(d.feret_angle_at_min_deg),
            Self::Eccentricity => Some(d.eccentricity),
            Self::MeanIntensity => d.mean_intensity,
        }
    }

    /// Value in the units of `scale`
    pub fn value(&self, record: &ParticleRecord, scale: &ScaleContext) -> Option<f64> {
        self.raw_value(record).map(|v| scale.scale(*self, v))
    }
}
