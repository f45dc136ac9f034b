use std::sync::Arc;

use image::{GrayImage, Luma};
use morphometry::{
    AnalysisConfig, AnalysisPipeline, CancellationToken, DetectedObject, DetectionBatch, Descriptor,
    ObjectShape, ParticleSession, RangeFilter, ScaleSource,
};
use tracing_subscriber::EnvFilter;

const WIDTH: u32 = 256;
const HEIGHT: u32 = 192;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("Particle Morphometry Demo");
    println!("=========================");

    let batch = synthetic_batch();
    let config = AnalysisConfig {
        scale: ScaleSource::PixelDistance {
            pixel_distance: 100.0,
            reference_length: 20.0,
            unit: "µm".to_string(),
        },
        ..Default::default()
    };

    let pipeline = AnalysisPipeline::builder().with_config(config).build()?;
    println!("{}", pipeline.info());

    let run = pipeline.run(&batch, &CancellationToken::new())?;
    println!("\nParticles: {} accepted, {} rejected", run.particles.len(), run.rejected);
    for record in run.particles.iter() {
        println!(
            "  #{:<2} area {:>8.2} {}  feret max {:>6.2} at {:>3}°  e = {:.3}",
            record.id,
            Descriptor::Area.value(record, run.scale()).unwrap_or(f64::NAN),
            Descriptor::Area.label(run.scale()),
            Descriptor::FeretMax.value(record, run.scale()).unwrap_or(f64::NAN),
            record.descriptors.feret_angle_at_max_deg,
            record.descriptors.eccentricity,
        );
    }

    print_statistics(&run, None);

    let filter = RangeFilter::new(vec!["area=20:".parse()?]);
    println!("\nFiltered by area >= 20 µm²:");
    print_statistics(&run, Some(&filter));

    println!("\nOrientation field:");
    for vector in run.orientation_field(None, false) {
        println!(
            "  #{:<2} at ({:.1}, {:.1}) -> ({:+.1}, {:+.1})",
            vector.particle_id, vector.x, vector.y, vector.dx, vector.dy
        );
    }

    let session = ParticleSession::new();
    session.publish(run.particles.clone());
    let after = session.remove_particle(1)?;
    println!("\nAfter removing particle 1: {} particles remain", after.len());

    run.save_geojson("demo_particles.geojson")?;
    println!("Saved demo_particles.geojson");

    Ok(())
}

fn print_statistics(run: &morphometry::AnalysisRun, filter: Option<&RangeFilter>) {
    let table = run.statistics(filter);
    println!("\n{:<14} {:>5} {:>10} {:>10} {:>10}", "descriptor", "n", "mean", "median", "std");
    for row in &table.rows {
        let cell = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
        println!(
            "{:<14} {:>5} {:>10} {:>10} {:>10}",
            row.label,
            row.count,
            cell(row.mean),
            cell(row.median),
            cell(row.std_dev)
        );
    }
}

fn synthetic_batch() -> DetectionBatch {
    let mut grayscale = GrayImage::from_pixel(WIDTH, HEIGHT, Luma([30u8]));

    let ellipse = ellipse_mask(70.0, 60.0, 30.0, 14.0, 25f64.to_radians());
    let disk = ellipse_mask(180.0, 120.0, 18.0, 18.0, 0.0);
    for (mask, level) in [(&ellipse, 180u8), (&disk, 220u8)] {
        for (x, y, pixel) in mask.enumerate_pixels() {
            if pixel[0] > 0 {
                grayscale.put_pixel(x, y, Luma([level]));
            }
        }
    }

    DetectionBatch::new(vec![
        DetectedObject::new(ObjectShape::Mask(Arc::new(ellipse)), 0.93),
        DetectedObject::new(ObjectShape::Mask(Arc::new(disk)), 0.88),
        DetectedObject::new(
            ObjectShape::Polygon(vec![[20.0, 140.0], [90.0, 150.0], [85.0, 170.0], [25.0, 165.0]]),
            0.71,
        ),
        DetectedObject::new(
            ObjectShape::PolygonFragments(vec![vec![140.0, 20.0, 200.0, 25.0], vec![190.0, 60.0, 150.0, 55.0]]),
            0.64,
        ),
        // Too few points, dropped as degenerate
        DetectedObject::new(ObjectShape::Polygon(vec![[5.0, 5.0], [9.0, 9.0]]), 0.55),
    ])
    .with_grayscale(grayscale)
}

fn ellipse_mask(cx: f64, cy: f64, a: f64, b: f64, angle: f64) -> GrayImage {
    let (sin, cos) = angle.sin_cos();
    GrayImage::from_fn(WIDTH, HEIGHT, |x, y| {
        let dx = x as f64 - cx;
        let dy = y as f64 - cy;
        let u = cos * dx + sin * dy;
        let v = -sin * dx + cos * dy;
        if (u / a).powi(2) + (v / b).powi(2) <= 1.0 {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}
