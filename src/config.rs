//! Parameter types configuring the pipeline stages.
//!
//! One immutable [`PipelineConfig`] is threaded through every stage; parallel
//! slide tasks share it read-only. Defaults reproduce the annotation
//! protocol: 300 DPI renders with a 500 µm reference grid.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const MICRONS_PER_INCH: f32 = 25_400.0;

/// Pipeline-wide configuration shared by all slides of a batch.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Render resolution of the composite layers (dots per inch).
    pub dpi: f32,
    /// Adaptive binarization shared by contour and grid processing.
    pub binarize: BinarizeParams,
    /// ROI contour rasterization.
    pub roi: RoiParams,
    /// Grid-line detection and validation.
    pub grid: GridParams,
    /// Tile extraction and empty-tile exclusion.
    pub tile: TileParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dpi: 300.0,
            binarize: BinarizeParams::default(),
            roi: RoiParams::default(),
            grid: GridParams::default(),
            tile: TileParams::default(),
        }
    }
}

/// Locally windowed mean thresholding parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BinarizeParams {
    /// Side of the square averaging window in pixels (odd).
    pub window: usize,
    /// Offset subtracted from the local mean; a pixel is foreground when
    /// darker than `mean - offset`.
    pub offset: f32,
}

impl Default for BinarizeParams {
    fn default() -> Self {
        Self {
            window: 11,
            offset: 2.0,
        }
    }
}

/// ROI contour handling.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RoiParams {
    /// Minimum enclosed area (pixels) below which a contour is rejected as
    /// an empty ROI.
    pub min_area_px: usize,
}

impl Default for RoiParams {
    fn default() -> Self {
        Self { min_area_px: 64 }
    }
}

/// Grid-line detection parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GridParams {
    /// Physical grid pitch in micrometers.
    pub spacing_um: f32,
    /// Relative tolerance when validating consecutive line spacing against
    /// the expected physical pitch.
    pub spacing_tol: f32,
    /// Angular half-range (degrees) around each axis searched by the line
    /// accumulator.
    pub angle_tol_deg: f32,
    /// Minimum accumulator support for a line candidate, as a fraction of
    /// the image extent perpendicular to the line.
    pub min_span_frac: f32,
    /// Positional merge tolerance for collinear candidates, as a fraction
    /// of the expected pitch.
    pub cluster_eps_frac: f32,
}

impl Default for GridParams {
    fn default() -> Self {
        Self {
            spacing_um: 500.0,
            spacing_tol: 0.25,
            angle_tol_deg: 20.0,
            min_span_frac: 0.3,
            cluster_eps_frac: 0.3,
        }
    }
}

impl GridParams {
    /// Expected grid pitch in pixels at the given render resolution.
    pub fn expected_pitch_px(&self, dpi: f32) -> f32 {
        self.spacing_um / MICRONS_PER_INCH * dpi
    }
}

/// Tile extraction parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TileParams {
    /// Minimum fraction of ROI-valid pixels for a tile to be measured.
    pub emptiness_thresh: f32,
    /// Minimum tile side in pixels; slivers below this are discarded.
    pub min_size_px: usize,
}

impl Default for TileParams {
    fn default() -> Self {
        Self {
            emptiness_thresh: 0.1,
            min_size_px: 50,
        }
    }
}

/// Load a [`PipelineConfig`] from a JSON file.
pub fn load_config(path: &Path) -> Result<PipelineConfig, String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    let config: PipelineConfig = serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_conversion_uses_dpi() {
        let grid = GridParams::default();
        // 500 µm at 3048 DPI is exactly 60 px.
        assert!((grid.expected_pitch_px(3048.0) - 60.0).abs() < 1e-4);
    }

    #[test]
    fn loads_partial_config_over_defaults() {
        let path = std::env::temp_dir().join("histoquant-config-test.json");
        std::fs::write(&path, r#"{"dpi": 600.0, "tile": {"emptiness_thresh": 0.2}}"#).unwrap();
        let config = load_config(&path).unwrap();
        assert!((config.dpi - 600.0).abs() < 1e-6);
        assert!((config.tile.emptiness_thresh - 0.2).abs() < 1e-6);
        assert!((config.grid.spacing_um - 500.0).abs() < 1e-6);
        std::fs::remove_file(&path).ok();
    }
}
