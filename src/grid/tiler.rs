//! Tile extraction along detected grid lines.
//!
//! Tile boundaries are the Cartesian product of consecutive horizontal and
//! vertical line pairs. Each boundary crops the masked base layer; tiles
//! with too little ROI coverage are excluded (recorded, never measured).
//! Retained tiles are indexed row-major and named as a pure function of the
//! slide metadata, the ROI index and the tile index, so re-running the
//! pipeline on identical input reproduces identical names.

use super::GridGeometry;
use crate::config::TileParams;
use crate::image::{BitMask, RgbRaster};
use crate::roi::MaskedLayer;
use crate::types::SlideMeta;
use log::debug;
use serde::Serialize;

/// Why a tile produced no measurement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DiscardReason {
    /// Valid-pixel fraction below the emptiness threshold.
    Empty,
    /// Boundary smaller than the minimum tile side.
    Undersized,
}

/// Recorded exclusion of one grid cell. Not an error.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TileDiscard {
    /// Grid cell (row, column) of the discarded boundary.
    pub cell: (usize, usize),
    pub valid_fraction: f32,
    pub reason: DiscardReason,
}

/// One retained tile of a ROI.
#[derive(Clone, Debug)]
pub struct Tile {
    /// Deterministic, slide-unique name.
    pub name: String,
    /// Tile index (row, column), normalized so the top-left retained tile
    /// of the ROI is (0, 0).
    pub index: (usize, usize),
    /// Grid cell the tile was cut from.
    pub cell: (usize, usize),
    pub pixels: RgbRaster,
    pub valid: BitMask,
    pub valid_fraction: f32,
}

/// Outcome of tiling one ROI.
#[derive(Clone, Debug)]
pub struct Tiling {
    pub tiles: Vec<Tile>,
    pub discarded: Vec<TileDiscard>,
}

/// Cut the masked base layer into tiles along the detected grid.
pub fn tile_masked(
    masked: &MaskedLayer,
    geometry: &GridGeometry,
    meta: &SlideMeta,
    roi_index: usize,
    params: &TileParams,
) -> Tiling {
    let (w, h) = masked.rgb.dimensions();
    let rows = boundaries(&geometry.horizontal, h);
    let cols = boundaries(&geometry.vertical, w);

    struct Retained {
        cell: (usize, usize),
        bounds: (usize, usize, usize, usize),
        valid_fraction: f32,
    }

    let mut retained: Vec<Retained> = Vec::new();
    let mut discarded: Vec<TileDiscard> = Vec::new();

    for (r, &(y0, y1)) in rows.iter().enumerate() {
        for (c, &(x0, x1)) in cols.iter().enumerate() {
            let cell = (r, c);
            if x1 - x0 < params.min_size_px || y1 - y0 < params.min_size_px {
                discarded.push(TileDiscard {
                    cell,
                    valid_fraction: 0.0,
                    reason: DiscardReason::Undersized,
                });
                continue;
            }
            let valid_fraction = masked.valid.fraction_in(x0, y0, x1, y1);
            if valid_fraction < params.emptiness_thresh {
                discarded.push(TileDiscard {
                    cell,
                    valid_fraction,
                    reason: DiscardReason::Empty,
                });
                continue;
            }
            retained.push(Retained {
                cell,
                bounds: (x0, y0, x1, y1),
                valid_fraction,
            });
        }
    }

    // Normalize indices to the retained set's top-left cell.
    let min_row = retained.iter().map(|t| t.cell.0).min().unwrap_or(0);
    let min_col = retained.iter().map(|t| t.cell.1).min().unwrap_or(0);

    let tiles: Vec<Tile> = retained
        .into_iter()
        .map(|t| {
            let (x0, y0, x1, y1) = t.bounds;
            let index = (t.cell.0 - min_row, t.cell.1 - min_col);
            Tile {
                name: format!("{meta}-roi{roi_index}-tile{}x{}", index.0, index.1),
                index,
                cell: t.cell,
                pixels: masked.rgb.crop(x0, y0, x1, y1),
                valid: masked.valid.crop(x0, y0, x1, y1),
                valid_fraction: t.valid_fraction,
            }
        })
        .collect();

    debug!(
        "Tiler: {} retained {} discarded for {meta} roi{roi_index}",
        tiles.len(),
        discarded.len()
    );
    Tiling { tiles, discarded }
}

/// Pixel intervals between consecutive line positions, clamped to the image.
fn boundaries(lines: &[f32], extent: usize) -> Vec<(usize, usize)> {
    lines
        .windows(2)
        .filter_map(|w| {
            let a = w[0].round().clamp(0.0, extent as f32) as usize;
            let b = w[1].round().clamp(0.0, extent as f32) as usize;
            (b > a).then_some((a, b))
        })
        .collect()
}
