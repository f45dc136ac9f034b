//! Per-descriptor summaries and histograms over a filtered particle view.
//!
//! Standard deviation is the sample estimate (`n - 1` denominator) and is
//! undefined below two values. Every statistic of an empty selection is
//! `None`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    descriptor::Descriptor,
    particle_set::{ParticleSet, ParticleView, RangeFilter},
};

pub const DEFAULT_BIN_COUNT: usize = 20;
pub const DEFAULT_FIT_CURVE_SAMPLES: usize = 100;

/// Relative spread under which data is treated as constant
const DEGENERATE_STD: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DescriptorStatistics {
    pub descriptor: Descriptor,
    /// Column label including the active unit
    pub label: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub max: Option<f64>,
    pub min: Option<f64>,
    pub std_dev: Option<f64>,
}

impl DescriptorStatistics {
    fn from_values(descriptor: Descriptor, label: String, values: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        Self {
            descriptor,
            label,
            count: sorted.len(),
            mean: mean(&sorted),
            median: median(&sorted),
            max: sorted.last().copied(),
            min: sorted.first().copied(),
            std_dev: sample_std_dev(&sorted),
        }
    }
}

/// Fixed ordered list of descriptor summaries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StatisticsTable {
    pub rows: Vec<DescriptorStatistics>,
}

impl StatisticsTable {
    pub fn get(&self, descriptor: Descriptor) -> Option<&DescriptorStatistics> {
        self.rows.iter().find(|row| row.descriptor == descriptor)
    }

    /// Number of particles the table was computed from
    pub fn particle_count(&self) -> usize {
        self.rows.iter().map(|row| row.count).max().unwrap_or(0)
    }
}

/// Normal distribution fitted to the histogram data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NormalFit {
    pub mean: f64,
    pub std_dev: f64,
    /// `(x, pdf(x))` samples across the data range
    pub curve: Vec<[f64; 2]>,
}

impl NormalFit {
    /// `None` for missing or near-zero spread
    fn sample(values: &[f64], samples: usize) -> Option<Self> {
        let mean = mean(values)?;
        let std_dev = sample_std_dev(values)?;
        if std_dev <= DEGENERATE_STD * mean.abs().max(1.0) || samples == 0 {
            return None;
        }

        let (lo, hi) = min_max(values)?;
        let norm = 1.0 / (std_dev * std::f64::consts::TAU.sqrt());
        let curve = linspace(lo, hi, samples)
            .map(|x| {
                let z = (x - mean) / std_dev;
                [x, norm * (-0.5 * z * z).exp()]
            })
            .collect();

        Some(Self { mean, std_dev, curve })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Histogram {
    pub descriptor: Descriptor,
    pub label: String,
    /// `bin_count + 1` ascending edges, empty when there is no data
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
    pub fit: Option<NormalFit>,
}

impl Histogram {
    fn build(descriptor: Descriptor, label: String, values: &[f64], bin_count: usize, fit_samples: usize) -> Self {
        let bins = bin_count.max(1);
        let Some((mut lo, mut hi)) = min_max(values) else {
            return Self {
                descriptor,
                label,
                edges: Vec::new(),
                counts: Vec::new(),
                fit: None,
            };
        };
        if hi - lo <= 0.0 {
            lo -= 0.5;
            hi += 0.5;
        }

        let edges: Vec<f64> = linspace(lo, hi, bins + 1).collect();
        let width = (hi - lo) / bins as f64;
        let mut counts = vec![0usize; bins];
        for &value in values {
            // Last bin is closed on the right
            let index = (((value - lo) / width).floor() as usize).min(bins - 1);
            counts[index] += 1;
        }

        Self {
            descriptor,
            label,
            edges,
            counts,
            fit: NormalFit::sample(values, fit_samples),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsAggregator {
    pub descriptors: Vec<Descriptor>,
    pub bin_count: usize,
    pub fit_curve_samples: usize,
}

impl Default for StatisticsAggregator {
    fn default() -> Self {
        Self {
            descriptors: Descriptor::SUMMARY.to_vec(),
            bin_count: DEFAULT_BIN_COUNT,
            fit_curve_samples: DEFAULT_FIT_CURVE_SAMPLES,
        }
    }
}

impl StatisticsAggregator {
    pub fn new(bin_count: usize, fit_curve_samples: usize) -> Self {
        Self {
            bin_count,
            fit_curve_samples,
            ..Self::default()
        }
    }

    pub fn with_descriptors(mut self, descriptors: Vec<Descriptor>) -> Self {
        self.descriptors = descriptors;
        self
    }

    /// Summarize the records of `set` accepted by `filter`
    pub fn summarize(&self, set: &ParticleSet, filter: Option<&RangeFilter>) -> StatisticsTable {
        match filter {
            Some(filter) => self.summarize_view(&set.filter(filter)),
            None => self.summarize_view(&set.view()),
        }
    }

    pub fn summarize_view(&self, view: &ParticleView<'_>) -> StatisticsTable {
        let rows = self
            .descriptors
            .iter()
            .map(|&descriptor| {
                DescriptorStatistics::from_values(
                    descriptor,
                    descriptor.label(view.scale()),
                    &view.values(descriptor),
                )
            })
            .collect();
        StatisticsTable { rows }
    }

    pub fn histograms(&self, view: &ParticleView<'_>) -> Vec<Histogram> {
        self.descriptors
            .iter()
            .map(|&descriptor| {
                Histogram::build(
                    descriptor,
                    descriptor.label(view.scale()),
                    &view.values(descriptor),
                    self.bin_count,
                    self.fit_curve_samples,
                )
            })
            .collect()
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Expects sorted input
fn median(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    match n {
        0 => None,
        _ if n % 2 == 1 => Some(sorted[n / 2]),
        _ => Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0),
    }
}

fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((sum_sq / (values.len() - 1) as f64).sqrt())
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values.iter().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

fn linspace(start: f64, end: f64, samples: usize) -> impl Iterator<Item = f64> {
    let step = if samples > 1 {
        (end - start) / (samples - 1) as f64
    } else {
        0.0
    };
    (0..samples).map(move |i| if i + 1 == samples && samples > 1 { end } else { start + step * i as f64 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        particle_set::DescriptorRange,
        scale::ScaleContext,
        types::{Contour, ParticleDescriptors},
    };
    use approx::assert_abs_diff_eq;

    fn set_with_areas(scale: ScaleContext, areas: &[f64]) -> ParticleSet {
        let mut set = ParticleSet::new(scale);
        for &area in areas {
            let contour = Contour::new(vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]).unwrap();
            let descriptors = ParticleDescriptors {
                centroid: [0.0, 0.0],
                area_px: area,
                perimeter_px: area / 10.0,
                diameter_px: 1.0,
                feret_max_px: 1.0,
                feret_min_px: 1.0,
                feret_mean_px: 1.0,
                feret_angle_at_max_deg: 0.0,
                feret_angle_at_min_deg: 0.0,
                eccentricity: 0.0,
                mean_intensity: Some(area / 4.0),
            };
            set.push(contour, descriptors, None, None);
        }
        set
    }

    #[test]
    fn test_summary_statistics() {
        let set = set_with_areas(ScaleContext::pixels(), &[4.0, 1.0, 3.0, 2.0]);
        let table = StatisticsAggregator::default().summarize(&set, None);
        let area = table.get(Descriptor::Area).unwrap();

        assert_eq!(area.count, 4);
        assert_eq!(area.label, "S [px²]");
        assert_abs_diff_eq!(area.mean.unwrap(), 2.5);
        assert_abs_diff_eq!(area.median.unwrap(), 2.5);
        assert_eq!(area.min, Some(1.0));
        assert_eq!(area.max, Some(4.0));
        // Sample standard deviation of 1..=4
        assert_abs_diff_eq!(area.std_dev.unwrap(), (5.0f64 / 3.0).sqrt(), epsilon = 1e-12);
        assert_eq!(table.rows.len(), Descriptor::SUMMARY.len());
    }

    #[test]
    fn test_scaled_area_statistics() {
        let scale = ScaleContext::from_pixel_distance(2.0, 1.0, "µm").unwrap();
        let set = set_with_areas(scale, &[100.0, 200.0, 300.0]);
        let table = StatisticsAggregator::default().summarize(&set, None);
        let area = table.get(Descriptor::Area).unwrap();

        assert_abs_diff_eq!(area.mean.unwrap(), 50.0, epsilon = 1e-12);
        assert_eq!(area.label, "S [µm²]");
        // Intensity is not scaled
        assert_abs_diff_eq!(table.get(Descriptor::MeanIntensity).unwrap().mean.unwrap(), 50.0);
    }

    #[test]
    fn test_empty_selection_is_all_none() {
        let set = set_with_areas(ScaleContext::pixels(), &[10.0, 20.0]);
        let filter = RangeFilter::default()
            .with(DescriptorRange::new(Descriptor::Area, Some(1000.0), None).unwrap());
        let table = StatisticsAggregator::default().summarize(&set, Some(&filter));

        for row in &table.rows {
            assert_eq!(row.count, 0);
            assert!(row.mean.is_none() && row.median.is_none() && row.std_dev.is_none());
            assert!(row.min.is_none() && row.max.is_none());
        }
        assert_eq!(table.particle_count(), 0);
    }

    #[test]
    fn test_single_value_has_no_std_dev() {
        let set = set_with_areas(ScaleContext::pixels(), &[42.0]);
        let table = StatisticsAggregator::default().summarize(&set, None);
        let area = table.get(Descriptor::Area).unwrap();
        assert_eq!(area.median, Some(42.0));
        assert_eq!(area.std_dev, None);
    }

    #[test]
    fn test_histogram_bins_cover_range() {
        let set = set_with_areas(ScaleContext::pixels(), &[0.0, 1.0, 2.0, 3.0, 4.0, 10.0]);
        let aggregator = StatisticsAggregator::new(5, 50).with_descriptors(vec![Descriptor::Area]);
        let histograms = aggregator.histograms(&set.view());
        let area = &histograms[0];

        assert_eq!(area.edges, vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(area.counts, vec![2, 2, 1, 0, 1]);
        assert_eq!(area.counts.iter().sum::<usize>(), 6);

        let fit = area.fit.as_ref().unwrap();
        assert_eq!(fit.curve.len(), 50);
        assert_eq!(fit.curve[0][0], 0.0);
        assert_eq!(fit.curve[49][0], 10.0);
        assert!(fit.curve.iter().all(|[_, y]| *y > 0.0));
    }

    #[test]
    fn test_constant_data_skips_fit() {
        let set = set_with_areas(ScaleContext::pixels(), &[7.0, 7.0, 7.0]);
        let aggregator = StatisticsAggregator::new(4, 100).with_descriptors(vec![Descriptor::Area]);
        let area = &aggregator.histograms(&set.view())[0];

        assert!(area.fit.is_none());
        assert_eq!(area.edges.first(), Some(&6.5));
        assert_eq!(area.edges.last(), Some(&7.5));
        assert_eq!(area.counts.iter().sum::<usize>(), 3);
    }

    #[test]
    fn test_empty_histogram() {
        let set = ParticleSet::new(ScaleContext::pixels());
        let histograms = StatisticsAggregator::default().histograms(&set.view());
        assert!(histograms.iter().all(|h| h.edges.is_empty() && h.counts.is_empty() && h.fit.is_none()));
    }
}
