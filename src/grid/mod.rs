//! Grid-line detection and ROI tiling.
//!
//! Overview
//! - Binarizes the grid layer with the adaptive windowed threshold
//!   ([`binarize`]), robust to faint strokes and uneven background.
//! - Accumulates stroke pixels into near-horizontal and near-vertical line
//!   candidates ([`hough`]).
//! - Merges collinear candidates within a positional tolerance ([`cluster`]).
//! - Validates consecutive line spacing against the physical grid pitch
//!   (500 µm converted through the slide DPI); lines that cannot be
//!   reconciled with the pitch are dropped as spurious.
//! - Cuts the masked base layer into named tiles along the surviving lines
//!   and excludes tiles with too little ROI coverage ([`tiler`]).
//!
//! A slide on which fewer than two lines survive in either orientation
//! cannot be tiled; that is a [`GridDetectionFailure`] reported with the
//! slide, never a panic.

pub mod binarize;
pub mod cluster;
pub mod hough;
pub mod tiler;

use crate::config::{BinarizeParams, GridParams};
use crate::image::RgbRaster;
use binarize::adaptive_binarize;
use cluster::cluster_candidates;
use hough::{detect_lines, LineCandidate, Orientation};
use log::debug;
use serde::Serialize;
use std::fmt;

/// Detected grid line positions plus the derived physical scale.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridGeometry {
    /// Sorted y positions of horizontal lines.
    pub horizontal: Vec<f32>,
    /// Sorted x positions of vertical lines.
    pub vertical: Vec<f32>,
    /// Median observed pitch in pixels.
    pub pitch_px: f32,
    /// Physical scale derived from the observed pitch and the configured
    /// grid spacing.
    pub microns_per_pixel: f32,
}

impl GridGeometry {
    /// Grid cells available for tiling (rows, columns).
    pub fn cell_count(&self) -> (usize, usize) {
        (
            self.horizontal.len().saturating_sub(1),
            self.vertical.len().saturating_sub(1),
        )
    }
}

/// The grid layer could not be resolved into a usable lattice.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridDetectionFailure {
    pub orientation: Orientation,
    pub found: usize,
}

impl fmt::Display for GridDetectionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "found {} {:?} line(s), need at least 2",
            self.found, self.orientation
        )
    }
}

impl std::error::Error for GridDetectionFailure {}

/// Detect the reference grid in the grid layer.
pub fn detect_grid(
    grid_layer: &RgbRaster,
    dpi: f32,
    params: &GridParams,
    binarize: &BinarizeParams,
) -> Result<GridGeometry, GridDetectionFailure> {
    let strokes = adaptive_binarize(&grid_layer.to_gray(), binarize);
    let expected_pitch = params.expected_pitch_px(dpi);
    let eps = params.cluster_eps_frac * expected_pitch;

    let mut families: [Vec<f32>; 2] = [Vec::new(), Vec::new()];
    for (slot, orientation) in [Orientation::Horizontal, Orientation::Vertical]
        .into_iter()
        .enumerate()
    {
        let span = match orientation {
            Orientation::Horizontal => grid_layer.width(),
            Orientation::Vertical => grid_layer.height(),
        };
        let min_strength = params.min_span_frac * span as f32;
        let candidates = detect_lines(&strokes, orientation, params.angle_tol_deg, params.min_span_frac);
        let clustered = cluster_candidates(candidates, eps, min_strength);
        let lines = validate_spacing(clustered, expected_pitch, params.spacing_tol);
        debug!(
            "Grid: {orientation:?} family kept {} line(s) after spacing validation",
            lines.len()
        );
        if lines.len() < 2 {
            return Err(GridDetectionFailure {
                orientation,
                found: lines.len(),
            });
        }
        families[slot] = lines.iter().map(|l| l.position).collect();
    }
    let [horizontal, vertical] = families;

    let pitch_px = median_gap(&horizontal, &vertical, expected_pitch);
    Ok(GridGeometry {
        horizontal,
        vertical,
        pitch_px,
        microns_per_pixel: params.spacing_um / pitch_px,
    })
}

/// Drop lines that cannot be reconciled with the expected physical pitch.
///
/// Two passes: lines closer to their neighbour than the minimum allowed
/// gap are duplicate detections (the weaker is dropped); then any gap that
/// is not an integer multiple of the expected pitch within tolerance marks
/// its weaker endpoint as spurious.
fn validate_spacing(
    mut lines: Vec<LineCandidate>,
    expected_pitch: f32,
    tol: f32,
) -> Vec<LineCandidate> {
    let min_gap = expected_pitch * (1.0 - tol);

    // Pass 1: collapse duplicate detections.
    let mut i = 1;
    while i < lines.len() {
        if lines[i].position - lines[i - 1].position < min_gap {
            let drop = if lines[i].strength < lines[i - 1].strength {
                i
            } else {
                i - 1
            };
            lines.remove(drop);
        } else {
            i += 1;
        }
    }

    // Pass 2: every surviving gap must sit near a multiple of the pitch.
    loop {
        let Some(bad) = lines
            .windows(2)
            .position(|w| !gap_matches_pitch(w[1].position - w[0].position, expected_pitch, tol))
        else {
            return lines;
        };
        if lines.len() <= 2 {
            return lines;
        }
        let drop = if lines[bad].strength < lines[bad + 1].strength {
            bad
        } else {
            bad + 1
        };
        lines.remove(drop);
    }
}

fn gap_matches_pitch(gap: f32, expected_pitch: f32, tol: f32) -> bool {
    let multiple = (gap / expected_pitch).round().max(1.0);
    (gap - multiple * expected_pitch).abs() <= tol * expected_pitch
}

/// Median single-interval gap over both families.
fn median_gap(horizontal: &[f32], vertical: &[f32], expected_pitch: f32) -> f32 {
    let mut gaps: Vec<f32> = Vec::new();
    for family in [horizontal, vertical] {
        for w in family.windows(2) {
            let gap = w[1] - w[0];
            let multiple = (gap / expected_pitch).round().max(1.0);
            gaps.push(gap / multiple);
        }
    }
    gaps.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = gaps.len();
    if n == 0 {
        return expected_pitch;
    }
    if n % 2 == 1 {
        gaps[n / 2]
    } else {
        0.5 * (gaps[n / 2 - 1] + gaps[n / 2])
    }
}
