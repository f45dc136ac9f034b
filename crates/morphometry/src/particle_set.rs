use std::{
    str::FromStr,
    sync::{Arc, RwLock},
};

use image::GrayImage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    descriptor::Descriptor,
    error::{MorphometryError, Result},
    scale::ScaleContext,
    types::{Contour, ParticleDescriptors, ParticleRecord},
};

/// Insertion-ordered particles of one analysis run.
///
/// Ids are 1-based positions. They stay stable until a particle is removed,
/// after which the remaining records are renumbered in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParticleSet {
    scale: ScaleContext,
    records: Vec<ParticleRecord>,
}

impl ParticleSet {
    pub fn new(scale: ScaleContext) -> Self {
        Self {
            scale,
            records: Vec::new(),
        }
    }

    /// Append a particle and return its id
    pub fn push(
        &mut self,
        contour: Contour,
        descriptors: ParticleDescriptors,
        confidence: Option<f32>,
        raw_mask: Option<Arc<GrayImage>>,
    ) -> usize {
        let id = self.records.len() + 1;
        self.records.push(ParticleRecord {
            id,
            confidence,
            contour,
            descriptors,
            raw_mask,
        });
        id
    }

    /// Remove a particle, renumbering the ones after it
    pub fn remove(&mut self, id: usize) -> Result<ParticleRecord> {
        if id == 0 || id > self.records.len() {
            return Err(MorphometryError::UnknownParticle(id));
        }
        let removed = self.records.remove(id - 1);
        self.renumber();
        Ok(removed)
    }

    /// Restore the 1-based numbering invariant, e.g. after deserialization
    pub fn renumber(&mut self) {
        for (index, record) in self.records.iter_mut().enumerate() {
            record.id = index + 1;
        }
    }

    pub fn get(&self, id: usize) -> Option<&ParticleRecord> {
        id.checked_sub(1).and_then(|index| self.records.get(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParticleRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn scale(&self) -> &ScaleContext {
        &self.scale
    }

    /// Unfiltered view over every record
    pub fn view(&self) -> ParticleView<'_> {
        ParticleView {
            scale: &self.scale,
            records: self.records.iter().collect(),
        }
    }

    /// Records satisfying every range of `filter`
    pub fn filter(&self, filter: &RangeFilter) -> ParticleView<'_> {
        self.view().refine(filter)
    }
}

/// Borrowed sub-collection of a [`ParticleSet`]; never mutates records
#[derive(Debug, Clone)]
pub struct ParticleView<'a> {
    scale: &'a ScaleContext,
    records: Vec<&'a ParticleRecord>,
}

impl<'a> ParticleView<'a> {
    pub fn refine(&self, filter: &RangeFilter) -> ParticleView<'a> {
        ParticleView {
            scale: self.scale,
            records: self
                .records
                .iter()
                .copied()
                .filter(|record| filter.matches(record, self.scale))
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a ParticleRecord> + '_ {
        self.records.iter().copied()
    }

    pub fn ids(&self) -> Vec<usize> {
        self.records.iter().map(|record| record.id).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn scale(&self) -> &'a ScaleContext {
        self.scale
    }

    /// Scaled values of one descriptor, skipping undefined ones
    pub fn values(&self, descriptor: Descriptor) -> Vec<f64> {
        self.records
            .iter()
            .filter_map(|record| descriptor.value(record, self.scale))
            .filter(|value| !value.is_nan())
            .collect()
    }
}

/// Inclusive bounds on one descriptor, in scaled units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DescriptorRange {
    pub descriptor: Descriptor,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl DescriptorRange {
    /// Bounds must be finite and ordered
    pub fn new(descriptor: Descriptor, min: Option<f64>, max: Option<f64>) -> Result<Self> {
        let finite = |bound: Option<f64>| bound.is_none_or(f64::is_finite);
        let ordered = match (min, max) {
            (Some(lo), Some(hi)) => lo <= hi,
            _ => true,
        };
        if !finite(min) || !finite(max) || !ordered {
            return Err(MorphometryError::InvalidRange {
                descriptor: descriptor.to_string(),
                min: min.unwrap_or(f64::NEG_INFINITY),
                max: max.unwrap_or(f64::INFINITY),
            });
        }
        Ok(Self { descriptor, min, max })
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.is_none_or(|lo| value >= lo) && self.max.is_none_or(|hi| value <= hi)
    }
}

impl FromStr for DescriptorRange {
    type Err = MorphometryError;

    /// `area=10:50`, `feret_max=:120` or `eccentricity=0.5:`
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || MorphometryError::InvalidConfig(format!("expected name=min:max, got '{s}'"));

        let (name, bounds) = s.split_once('=').ok_or_else(invalid)?;
        let descriptor = Descriptor::from_str(name.trim())
            .map_err(|_| MorphometryError::UnknownDescriptor(name.trim().to_string()))?;
        let (lo, hi) = bounds.split_once(':').ok_or_else(invalid)?;

        let parse_bound = |text: &str| -> Result<Option<f64>> {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            text.parse::<f64>().map(Some).map_err(|_| invalid())
        };

        Self::new(descriptor, parse_bound(lo)?, parse_bound(hi)?)
    }
}

/// Conjunction of descriptor ranges; empty matches everything
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RangeFilter {
    pub ranges: Vec<DescriptorRange>,
}

impl RangeFilter {
    pub fn new(ranges: Vec<DescriptorRange>) -> Self {
        Self { ranges }
    }

    pub fn with(mut self, range: DescriptorRange) -> Self {
        self.ranges.push(range);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Undefined descriptor values never satisfy a range
    pub fn matches(&self, record: &ParticleRecord, scale: &ScaleContext) -> bool {
        self.ranges.iter().all(|range| {
            range
                .descriptor
                .value(record, scale)
                .is_some_and(|value| range.contains(value))
        })
    }
}

/// Latest published particle set, shared between one mutator and many readers.
///
/// Readers get `Arc` snapshots; a removal publishes a new renumbered set so
/// a snapshot never changes under its holder.
#[derive(Debug, Clone, Default)]
pub struct ParticleSession {
    current: Arc<RwLock<Option<Arc<ParticleSet>>>>,
}

impl ParticleSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the session contents with a finished run
    pub fn publish(&self, set: ParticleSet) -> Arc<ParticleSet> {
        let set = Arc::new(set);
        *self.write_guard() = Some(Arc::clone(&set));
        set
    }

    pub fn snapshot(&self) -> Option<Arc<ParticleSet>> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Remove a particle and publish the renumbered set
    pub fn remove_particle(&self, id: usize) -> Result<Arc<ParticleSet>> {
        let mut guard = self.write_guard();
        let current = guard.as_ref().ok_or(MorphometryError::UnknownParticle(id))?;

        let mut next = ParticleSet::clone(current);
        next.remove(id)?;
        let next = Arc::new(next);
        *guard = Some(Arc::clone(&next));
        Ok(next)
    }

    pub fn clear(&self) {
        *self.write_guard() = None;
    }

    fn write_guard(&self) -> std::sync::RwLockWriteGuard<'_, Option<Arc<ParticleSet>>> {
        match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
