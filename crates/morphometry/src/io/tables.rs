use std::io::Write;

use strum::IntoEnumIterator;

use crate::{
    descriptor::{Descriptor, DescriptorKind},
    error::Result,
    particle_set::RangeFilter,
    pipeline::AnalysisRun,
    scale::ScaleContext,
    statistics::StatisticsTable,
};

fn format_value(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.precision$}"),
        _ => String::new(),
    }
}

/// Descriptors whose pixel and scaled values differ
fn is_scaled(descriptor: Descriptor) -> bool {
    matches!(descriptor.kind(), DescriptorKind::Length | DescriptorKind::Area)
}

/// One row per particle: pixel columns, then scaled columns in physical mode
pub fn write_particles_csv<W: Write>(writer: W, run: &AnalysisRun, filter: Option<&RangeFilter>) -> Result<()> {
    let precision = run.config.round_precision as usize;
    let scale = run.scale();
    let pixels = ScaleContext::pixels();
    let scaled: Vec<Descriptor> = if scale.is_physical() {
        Descriptor::iter().filter(|d| is_scaled(*d)).collect()
    } else {
        Vec::new()
    };

    let mut csv = csv::Writer::from_writer(writer);

    let mut header = vec![
        "id".to_string(),
        "confidence".to_string(),
        "x [px]".to_string(),
        "y [px]".to_string(),
    ];
    header.extend(Descriptor::iter().map(|d| d.label(&pixels)));
    header.extend(scaled.iter().map(|d| d.label(scale)));
    csv.write_record(&header)?;

    let view = match filter {
        Some(filter) => run.particles.filter(filter),
        None => run.particles.view(),
    };
    for record in view.iter() {
        let [x, y] = record.descriptors.centroid;
        let mut row = vec![
            record.id.to_string(),
            format_value(record.confidence.map(f64::from), precision),
            format_value(Some(x), precision),
            format_value(Some(y), precision),
        ];
        row.extend(Descriptor::iter().map(|d| format_value(d.raw_value(record), precision)));
        row.extend(scaled.iter().map(|d| format_value(d.value(record, scale), precision)));
        csv.write_record(&row)?;
    }

    csv.flush()?;
    Ok(())
}

/// One row per descriptor with its summary statistics
pub fn write_statistics_csv<W: Write>(writer: W, table: &StatisticsTable, round_precision: u32) -> Result<()> {
    let precision = round_precision as usize;
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["descriptor", "count", "mean", "median", "max", "min", "std_dev"])?;

    for row in &table.rows {
        csv.write_record([
            row.label.clone(),
            row.count.to_string(),
            format_value(row.mean, precision),
            format_value(row.median, precision),
            format_value(row.max, precision),
            format_value(row.min, precision),
            format_value(row.std_dev, precision),
        ])?;
    }

    csv.flush()?;
    Ok(())
}
