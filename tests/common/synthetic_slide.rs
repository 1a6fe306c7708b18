//! Synthetic annotated slides with exactly known geometry.

use histoquant::image::RgbRaster;
use histoquant::layers::{CompositeSlide, NamedLayer};
use histoquant::PipelineConfig;

pub const WHITE: [u8; 3] = [255, 255, 255];
pub const BLACK: [u8; 3] = [0, 0, 0];

/// Configuration whose DPI makes one 500 µm grid interval exactly
/// `pitch_px` pixels.
pub fn config_for_pitch(pitch_px: f32) -> PipelineConfig {
    PipelineConfig {
        dpi: pitch_px * 25_400.0 / 500.0,
        ..Default::default()
    }
}

/// Grid layer with 1 px lines at `offset + k·pitch` in both axes.
pub fn grid_layer(w: usize, h: usize, offset: usize, pitch: usize, lines: usize) -> RgbRaster {
    let mut raster = RgbRaster::filled(w, h, WHITE);
    for k in 0..lines {
        let pos = offset + k * pitch;
        for i in 0..h {
            raster.set(pos, i, BLACK);
        }
        for i in 0..w {
            raster.set(i, pos, BLACK);
        }
    }
    raster
}

/// Contour layer with a rectangle outline (3 px stroke).
pub fn rect_contour_layer(
    w: usize,
    h: usize,
    x0: usize,
    y0: usize,
    x1: usize,
    y1: usize,
) -> RgbRaster {
    let mut raster = RgbRaster::filled(w, h, WHITE);
    for t in 0..3usize {
        for x in (x0 - t)..=(x1 + t) {
            raster.set(x, y0 - t, BLACK);
            raster.set(x, y1 + t, BLACK);
        }
        for y in (y0 - t)..=(y1 + t) {
            raster.set(x0 - t, y, BLACK);
            raster.set(x1 + t, y, BLACK);
        }
    }
    raster
}

/// Contour layer with a circle outline (3 px stroke) centred at
/// (`cx`, `cy`) with radius `r`.
pub fn circle_contour_layer(w: usize, h: usize, cx: f32, cy: f32, r: f32) -> RgbRaster {
    let mut raster = RgbRaster::filled(w, h, WHITE);
    for y in 0..h {
        for x in 0..w {
            let d = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
            if (d - r).abs() <= 1.5 {
                raster.set(x, y, BLACK);
            }
        }
    }
    raster
}

/// Base layer where a fraction of columns carry `stripe` and the rest
/// `background`. Column stripes keep per-tile fractions exact as long as
/// the tile width is a multiple of `period`.
pub fn striped_base(
    w: usize,
    h: usize,
    stripe: [u8; 3],
    background: [u8; 3],
    stripe_cols: usize,
    period: usize,
) -> RgbRaster {
    let mut raster = RgbRaster::filled(w, h, background);
    for y in 0..h {
        for x in 0..w {
            if x % period < stripe_cols {
                raster.set(x, y, stripe);
            }
        }
    }
    raster
}

/// Assemble a composite from the three layers.
pub fn composite(
    identifier: &str,
    base: RgbRaster,
    contour: RgbRaster,
    grid: RgbRaster,
) -> CompositeSlide {
    CompositeSlide::from_layers(
        identifier,
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
    .expect("synthetic identifier is well-formed")
}
