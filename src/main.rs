use histoquant::image::RgbRaster;
use histoquant::layers::{CompositeSlide, NamedLayer};
use histoquant::pipeline::process_batch;
use histoquant::stats::compile_statistics;
use histoquant::PipelineConfig;

/// Demo stub: synthesizes one annotated slide and runs the pipeline on it.
fn main() {
    let (w, h) = (360usize, 360usize);
    let pitch = 60usize;
    // 60 px per 500 µm interval.
    let config = PipelineConfig {
        dpi: 3048.0,
        ..Default::default()
    };

    let base = RgbRaster::filled(w, h, [209, 83, 145]);

    let mut contour = RgbRaster::filled(w, h, [255, 255, 255]);
    for t in 0..2usize {
        for x in 60 - t..=300 + t {
            contour.set(x, 60 - t, [0, 0, 0]);
            contour.set(x, 300 + t, [0, 0, 0]);
        }
        for y in 60 - t..=300 + t {
            contour.set(60 - t, y, [0, 0, 0]);
            contour.set(300 + t, y, [0, 0, 0]);
        }
    }

    let mut grid = RgbRaster::filled(w, h, [255, 255, 255]);
    for line in (0..=w - 1).step_by(pitch) {
        for i in 0..w {
            grid.set(line.min(w - 1), i, [0, 0, 0]);
            grid.set(i, line.min(h - 1), [0, 0, 0]);
        }
    }

    let slide = CompositeSlide::from_layers(
        "Test-Week4-HE-Defect-Animal1",
        vec![
            NamedLayer {
                name: "base".to_string(),
                raster: base,
            },
            NamedLayer {
                name: "roi".to_string(),
                raster: contour,
            },
            NamedLayer {
                name: "grid".to_string(),
                raster: grid,
            },
        ],
    )
    .expect("valid identifier");

    let outcome = process_batch(&[slide], &config);
    let report = outcome.report();
    println!("{}", serde_json::to_string_pretty(&report).unwrap());

    match compile_statistics(&outcome.measurement_table()) {
        Ok(stats) => println!(
            "summaries={} mixed={} skipped={}",
            stats.summaries.len(),
            stats.mixed_models.len(),
            stats.skipped_models.len()
        ),
        Err(e) => println!("statistics unavailable: {e}"),
    }
}
