//! Per-slide orchestration.
//!
//! Overview
//! - Decomposes the composite into its three layers.
//! - Builds one ROI mask per closed contour and restricts the base layer.
//! - Detects the reference grid once per slide and tiles every ROI.
//! - Classifies each retained tile with the palette of the slide's stain.
//!
//! Every stage failure maps onto one [`SlideError`] variant carrying the
//! stage's typed error; the batch runner ([`batch`]) isolates these per
//! slide. Empty-tile exclusions are not errors and travel in the summary.

pub mod batch;
pub mod output;

pub use batch::{process_batch, BatchOutcome, BatchReport};

use crate::classify::{classify_tile, StainPalette};
use crate::config::PipelineConfig;
use crate::grid::tiler::{tile_masked, Tile, TileDiscard};
use crate::grid::{detect_grid, GridDetectionFailure, GridGeometry};
use crate::layers::{decompose, CompositeSlide, DecomposeError};
use crate::roi::{apply_mask, build_masks, ContourError};
use crate::stats::TileRecord;
use crate::types::SlideMeta;
use log::debug;
use serde::Serialize;
use std::fmt;

/// Why one slide produced no measurements. Isolated per slide; never
/// aborts the batch.
#[derive(Clone, Debug)]
pub enum SlideError {
    Decompose(DecomposeError),
    Contour(ContourError),
    Grid(GridDetectionFailure),
}

impl SlideError {
    /// Stable failure kind for structured reports.
    pub fn kind(&self) -> &'static str {
        match self {
            SlideError::Decompose(DecomposeError::MissingLayer { .. }) => "MissingLayer",
            SlideError::Decompose(DecomposeError::LayerAmbiguity { .. }) => "LayerAmbiguity",
            SlideError::Decompose(DecomposeError::DimensionMismatch { .. }) => {
                "DimensionMismatch"
            }
            SlideError::Contour(ContourError::MalformedContour { .. }) => "MalformedContour",
            SlideError::Contour(ContourError::EmptyRoi { .. }) => "EmptyRoi",
            SlideError::Grid(_) => "GridDetectionFailure",
        }
    }
}

impl fmt::Display for SlideError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlideError::Decompose(e) => write!(f, "layer decomposition: {e}"),
            SlideError::Contour(e) => write!(f, "ROI contour: {e}"),
            SlideError::Grid(e) => write!(f, "grid detection: {e}"),
        }
    }
}

impl std::error::Error for SlideError {}

impl From<DecomposeError> for SlideError {
    fn from(e: DecomposeError) -> Self {
        SlideError::Decompose(e)
    }
}

impl From<ContourError> for SlideError {
    fn from(e: ContourError) -> Self {
        SlideError::Contour(e)
    }
}

impl From<GridDetectionFailure> for SlideError {
    fn from(e: GridDetectionFailure) -> Self {
        SlideError::Grid(e)
    }
}

/// Per-ROI bookkeeping of one processed slide.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoiSummary {
    pub roi: usize,
    pub area_px: usize,
    /// Physical ROI area from the observed grid pitch.
    pub area_sq_microns: f64,
    pub retained_tiles: usize,
    pub discarded: Vec<TileDiscard>,
}

/// Everything one slide contributes downstream.
#[derive(Clone, Debug)]
pub struct SlideSummary {
    pub meta: SlideMeta,
    pub geometry: GridGeometry,
    pub rois: Vec<RoiSummary>,
    /// Retained tiles, for image output.
    pub tiles: Vec<Tile>,
    /// Measurement rows, one per retained tile.
    pub records: Vec<TileRecord>,
}

/// Run the full per-slide pipeline: decompose → mask → tile → classify.
pub fn process_slide(
    slide: &CompositeSlide,
    config: &PipelineConfig,
) -> Result<SlideSummary, SlideError> {
    let meta = &slide.meta;
    let layers = decompose(slide)?;
    let masks = build_masks(&layers.contour.to_gray(), &config.binarize, &config.roi)?;
    let geometry = detect_grid(&layers.grid, config.dpi, &config.grid, &config.binarize)?;
    debug!(
        "Pipeline: {meta} grid {}x{} cells, {} ROI(s)",
        geometry.cell_count().0,
        geometry.cell_count().1,
        masks.len()
    );

    let palette = StainPalette::for_stain(meta.stain);
    let um_per_px = f64::from(geometry.microns_per_pixel);
    let mut rois = Vec::with_capacity(masks.len());
    let mut tiles = Vec::new();
    let mut records = Vec::new();

    for roi in &masks {
        let masked = apply_mask(&layers.base, roi);
        let tiling = tile_masked(&masked, &geometry, meta, roi.index, &config.tile);
        rois.push(RoiSummary {
            roi: roi.index,
            area_px: roi.area_px,
            area_sq_microns: roi.area_px as f64 * um_per_px * um_per_px,
            retained_tiles: tiling.tiles.len(),
            discarded: tiling.discarded,
        });
        for tile in tiling.tiles {
            let measurement = classify_tile(&tile, palette);
            records.push(TileRecord {
                slide: meta.clone(),
                roi: roi.index,
                tile: tile.index,
                name: tile.name.clone(),
                measurement,
            });
            tiles.push(tile);
        }
    }

    Ok(SlideSummary {
        meta: meta.clone(),
        geometry,
        rois,
        tiles,
        records,
    })
}
