use std::sync::Arc;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use image::{GrayImage, Luma};
use morphometry::{
    AnalysisConfig, AnalysisPipeline, AnalysisRun, CancellationToken, Contour, DescriptorEngine, DescriptorRange,
    DetectedObject, DetectionBatch, Descriptor, LeastSquaresEllipseFitter, ObjectShape, ParticleDescriptors,
    ParticleSet, RangeFilter, ScaleContext, ScaleSource, StatisticsAggregator,
};

fn descriptors_with_area(area: f64) -> ParticleDescriptors {
    ParticleDescriptors {
        centroid: [area / 10.0, 0.0],
        area_px: area,
        perimeter_px: area / 5.0,
        diameter_px: area / 20.0,
        feret_max_px: area / 20.0,
        feret_min_px: area / 40.0,
        feret_mean_px: area / 30.0,
        feret_angle_at_max_deg: 0.0,
        feret_angle_at_min_deg: 90.0,
        eccentricity: 0.3,
        mean_intensity: Some(100.0),
    }
}

fn triangle() -> Contour {
    Contour::new(vec![[0.0, 0.0], [3.0, 0.0], [0.0, 3.0]]).unwrap()
}

fn polygon(points: &[[f64; 2]], confidence: f32) -> DetectedObject {
    DetectedObject::new(ObjectShape::Polygon(points.to_vec()), confidence)
}

fn rectangle(x: f64, y: f64, w: f64, h: f64) -> Vec<[f64; 2]> {
    vec![[x, y], [x + w, y], [x + w, y + h], [x, y + h]]
}

fn default_run(batch: &DetectionBatch) -> AnalysisRun {
    AnalysisPipeline::builder()
        .build()
        .unwrap()
        .run(batch, &CancellationToken::new())
        .unwrap()
}

#[test]
fn three_particles_scale_to_physical_areas() {
    let scale = ScaleContext::from_pixel_distance(2.0, 1.0, "µm").unwrap();
    assert_eq!(scale.pixels_per_unit(), 2.0);

    let mut set = ParticleSet::new(scale);
    for area in [100.0, 200.0, 300.0] {
        set.push(triangle(), descriptors_with_area(area), None, None);
    }

    let areas = set.view().values(Descriptor::Area);
    assert_eq!(areas, vec![25.0, 50.0, 75.0]);

    let table = StatisticsAggregator::default().summarize(&set, None);
    let area = table.get(Descriptor::Area).unwrap();
    assert_relative_eq!(area.mean.unwrap(), 50.0);
    assert_relative_eq!(area.median.unwrap(), 50.0);
    assert_eq!(area.label, "S [µm²]");
}

#[test]
fn empty_batch_yields_empty_set_and_null_statistics() {
    let run = default_run(&DetectionBatch::default());
    assert_eq!(run.particles.len(), 0);

    let table = run.statistics(None);
    assert_eq!(table.rows.len(), Descriptor::SUMMARY.len());
    for row in &table.rows {
        assert_eq!(row.count, 0);
        assert!(row.mean.is_none());
        assert!(row.median.is_none());
        assert!(row.max.is_none());
        assert!(row.min.is_none());
        assert!(row.std_dev.is_none());
    }
    assert!(run.histograms(None).iter().all(|h| h.counts.is_empty()));
}

#[test]
fn two_point_contour_contributes_no_record() {
    let batch = DetectionBatch::new(vec![polygon(&[[0.0, 0.0], [10.0, 10.0]], 0.9)]);
    let run = default_run(&batch);
    assert!(run.particles.is_empty());
    assert_eq!(run.rejected, 1);
}

#[test]
fn axis_aligned_rectangle_feret_angles() {
    let batch = DetectionBatch::new(vec![polygon(&rectangle(10.0, 10.0, 120.0, 3.0), 1.0)]);
    let run = default_run(&batch);
    let d = &run.particles.get(1).unwrap().descriptors;

    assert_abs_diff_eq!(d.feret_max_px, 120.0, epsilon = 0.1);
    assert!(d.feret_angle_at_max_deg <= 1.0);
    assert_abs_diff_eq!(d.feret_min_px, 3.0, epsilon = 1e-9);
    assert_eq!(d.feret_angle_at_min_deg, 90.0);
    assert!(d.feret_min_px <= d.feret_mean_px && d.feret_mean_px <= d.feret_max_px);
}

#[test]
fn circle_descriptors_agree() {
    let points: Vec<[f64; 2]> = (0..400)
        .map(|i| {
            let t = i as f64 / 400.0 * std::f64::consts::TAU;
            [100.0 + 25.0 * t.cos(), 100.0 + 25.0 * t.sin()]
        })
        .collect();
    let contour = Contour::new(points).unwrap();
    let d = DescriptorEngine::<LeastSquaresEllipseFitter>::default().compute(&contour, None, None);

    assert_abs_diff_eq!(d.feret_max_px, 50.0, epsilon = 0.01);
    assert_abs_diff_eq!(d.feret_min_px, 50.0, epsilon = 0.01);
    assert_abs_diff_eq!(d.diameter_px, 50.0, epsilon = 1e-9);
    assert_abs_diff_eq!(d.eccentricity, 0.0, epsilon = 1e-3);
}

#[test]
fn convex_polygon_feret_max_within_one_step_of_diameter() {
    let hexagon: Vec<[f64; 2]> = (0..6)
        .map(|i| {
            let t = (i as f64 * 60.0 + 7.0).to_radians();
            [40.0 * t.cos(), 25.0 * t.sin()]
        })
        .collect();
    let contour = Contour::new(hexagon).unwrap();
    let d = DescriptorEngine::<LeastSquaresEllipseFitter>::default().compute(&contour, None, None);

    let one_step = d.diameter_px * (1.0 - 1f64.to_radians().cos());
    assert!(d.feret_max_px <= d.diameter_px + 1e-9);
    assert!(d.diameter_px - d.feret_max_px <= one_step);
    assert!(d.feret_min_px <= d.feret_max_px);
}

#[test]
fn mask_input_keeps_largest_component() {
    let mut mask = GrayImage::new(80, 80);
    for y in 10..30 {
        for x in 10..40 {
            mask.put_pixel(x, y, Luma([255u8]));
        }
    }
    for y in 60..63 {
        for x in 60..63 {
            mask.put_pixel(x, y, Luma([255u8]));
        }
    }

    let batch = DetectionBatch::new(vec![DetectedObject::new(ObjectShape::Mask(Arc::new(mask)), 0.9)]);
    let run = default_run(&batch);
    assert_eq!(run.particles.len(), 1);

    let (min, max) = run.particles.get(1).unwrap().contour.bounding_box();
    assert!(min[0] >= 9.0 && max[0] <= 40.0);
    assert!(min[1] >= 9.0 && max[1] <= 30.0);
}

#[test]
fn filtering_twice_equals_filtering_once() {
    let batch = DetectionBatch::new(
        (1..=6)
            .map(|i| polygon(&rectangle(0.0, 0.0, 10.0 * i as f64, 10.0), 0.9))
            .collect(),
    );
    let run = default_run(&batch);
    let filter = RangeFilter::new(vec![
        DescriptorRange::new(Descriptor::Area, Some(200.0), Some(500.0)).unwrap(),
        "eccentricity=0:1".parse().unwrap(),
    ]);

    let once = run.particles.filter(&filter);
    let twice = once.refine(&filter);
    assert_eq!(once.ids(), twice.ids());
    assert_eq!(once.ids(), vec![2, 3, 4, 5]);
}

#[test]
fn removed_particle_is_excluded_from_statistics() {
    let batch = DetectionBatch::new(vec![
        polygon(&rectangle(0.0, 0.0, 10.0, 10.0), 0.9),
        polygon(&rectangle(0.0, 0.0, 20.0, 20.0), 0.9),
        polygon(&rectangle(0.0, 0.0, 100.0, 100.0), 0.9),
    ]);
    let mut run = default_run(&batch);
    let before = run.statistics(None);
    assert_eq!(before.get(Descriptor::Area).unwrap().max, Some(10000.0));

    run.remove_particle(3).unwrap();
    let after = run.statistics(None);
    for descriptor in [Descriptor::Area, Descriptor::Perimeter, Descriptor::FeretMax] {
        let row = after.get(descriptor).unwrap();
        assert_eq!(row.count, 2);
        assert!(row.max.unwrap() < before.get(descriptor).unwrap().max.unwrap());
    }
    let area = after.get(Descriptor::Area).unwrap();
    assert_relative_eq!(area.mean.unwrap(), 250.0);
    assert_relative_eq!(area.median.unwrap(), 250.0);
    assert_eq!(area.min, Some(100.0));
    assert_relative_eq!(area.std_dev.unwrap(), (2.0f64 * 150.0 * 150.0).sqrt());
}

#[test]
fn scaling_round_trip_for_positive_ratios() {
    for ppu in [0.25, 1.0, 2.0, 13.7] {
        let scale = ScaleContext::from_pixel_distance(ppu * 4.0, 4.0, "nm").unwrap();
        for px in [1.0, 12.5, 999.0] {
            assert_relative_eq!(scale.scale_length(px) / (1.0 / ppu), px, max_relative = 1e-12);
        }
    }
}

#[test]
fn saved_run_reloads_for_refiltering() {
    let config = AnalysisConfig {
        scale: ScaleSource::ReferencePoints {
            a: [0.0, 0.0],
            b: [0.0, 50.0],
            reference_length: 10.0,
            unit: "µm".into(),
        },
        bin_count: 4,
        ..Default::default()
    };
    let batch = DetectionBatch::new(vec![
        polygon(&rectangle(0.0, 0.0, 10.0, 10.0), 0.9),
        polygon(&rectangle(30.0, 30.0, 25.0, 10.0), 0.8),
    ]);
    let run = AnalysisPipeline::builder()
        .with_config(config)
        .build()
        .unwrap()
        .run(&batch, &CancellationToken::new())
        .unwrap();

    let path = std::env::temp_dir().join(format!("morphometry-run-{}.json", std::process::id()));
    run.save_json(&path).unwrap();
    let reloaded = AnalysisRun::load_json(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(reloaded.particles.len(), 2);
    assert_eq!(reloaded.scale(), run.scale());
    assert_eq!(reloaded.config.bin_count, 4);
    let original = run.statistics(None);
    let restored = reloaded.statistics(None);
    assert_relative_eq!(
        restored.get(Descriptor::Area).unwrap().mean.unwrap(),
        original.get(Descriptor::Area).unwrap().mean.unwrap(),
        max_relative = 1e-12
    );

    // 25 px² per µm²
    let filter = RangeFilter::new(vec!["area=5:".parse().unwrap()]);
    assert_eq!(reloaded.particles.filter(&filter).ids(), vec![2]);
}

#[test]
fn tampered_run_file_is_rejected_on_load() {
    let config = AnalysisConfig {
        scale: ScaleSource::PixelDistance {
            pixel_distance: 10.0,
            reference_length: 2.0,
            unit: "µm".into(),
        },
        ..Default::default()
    };
    let batch = DetectionBatch::new(vec![polygon(&rectangle(0.0, 0.0, 10.0, 10.0), 0.9)]);
    let run = AnalysisPipeline::builder()
        .with_config(config)
        .build()
        .unwrap()
        .run(&batch, &CancellationToken::new())
        .unwrap();
    let saved = serde_json::to_value(&run).unwrap();

    let path = std::env::temp_dir().join(format!("morphometry-tampered-{}.json", std::process::id()));
    let reload_with = |edit: &dyn Fn(&mut serde_json::Value)| {
        let mut value = saved.clone();
        edit(&mut value);
        std::fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();
        AnalysisRun::load_json(&path)
    };

    assert!(reload_with(&|_| {}).is_ok());
    assert!(reload_with(&|v| v["particles"]["scale"]["pixels_per_unit"] = 0.0.into()).is_err());
    assert!(
        reload_with(&|v| v["particles"]["records"][0]["contour"] = serde_json::json!([[0.0, 0.0], [5.0, 5.0]]))
            .is_err()
    );
    assert!(matches!(
        reload_with(&|v| v["config"]["bin_count"] = 0.into()),
        Err(morphometry::MorphometryError::InvalidConfig(_))
    ));
    std::fs::remove_file(&path).ok();
}
