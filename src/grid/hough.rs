//! Parametric line accumulation over binarized stroke pixels.
//!
//! Grid lines are near-axis-aligned, so instead of a full ρ–θ sweep the
//! accumulator searches a small angular fan around each axis. For the
//! vertical family a stroke pixel (x, y) votes for `ρ = x·cosφ + y·sinφ`
//! at every fan angle φ; the horizontal family swaps the roles of x and y.
//! Cells whose support reaches a fraction of the perpendicular image extent
//! become [`LineCandidate`]s, reported as the axis position where the line
//! crosses the image midline. Collinear duplicates across neighbouring fan
//! angles are left for the 1D clustering stage to merge.

use crate::image::BitMask;
use serde::Serialize;

/// Line family searched by the accumulator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// A candidate grid line: axis position in pixels plus accumulator support.
#[derive(Clone, Copy, Debug)]
pub struct LineCandidate {
    pub position: f32,
    pub strength: f32,
}

const ANGLE_STEP_DEG: f32 = 1.0;

/// Detect candidate lines of one family.
///
/// `min_span_frac` scales the vote threshold by the image extent
/// perpendicular to the family (a full line crosses that many pixels).
pub fn detect_lines(
    strokes: &BitMask,
    orientation: Orientation,
    angle_tol_deg: f32,
    min_span_frac: f32,
) -> Vec<LineCandidate> {
    // u = coordinate along the searched axis, v = along the line.
    let (u_len, v_len) = match orientation {
        Orientation::Vertical => (strokes.width(), strokes.height()),
        Orientation::Horizontal => (strokes.height(), strokes.width()),
    };
    if u_len == 0 || v_len == 0 {
        return Vec::new();
    }

    let steps = (2.0 * angle_tol_deg / ANGLE_STEP_DEG).round() as usize + 1;
    let angles: Vec<f32> = (0..steps)
        .map(|i| (-angle_tol_deg + i as f32 * ANGLE_STEP_DEG).to_radians())
        .collect();

    let sin_tol = angle_tol_deg.to_radians().sin();
    let rho_offset = v_len as f32 * sin_tol;
    let rho_bins = (u_len as f32 + 2.0 * rho_offset).ceil() as usize + 1;
    let mut accum = vec![0u32; steps * rho_bins];

    for y in 0..strokes.height() {
        for x in 0..strokes.width() {
            if !strokes.get(x, y) {
                continue;
            }
            let (u, v) = match orientation {
                Orientation::Vertical => (x as f32, y as f32),
                Orientation::Horizontal => (y as f32, x as f32),
            };
            for (t, phi) in angles.iter().enumerate() {
                let rho = u * phi.cos() + v * phi.sin();
                let bin = (rho + rho_offset).round();
                if bin >= 0.0 && (bin as usize) < rho_bins {
                    accum[t * rho_bins + bin as usize] += 1;
                }
            }
        }
    }

    let threshold = (min_span_frac * v_len as f32).max(2.0);
    let v_mid = v_len as f32 * 0.5;
    let mut candidates = Vec::new();
    for (t, phi) in angles.iter().enumerate() {
        for bin in 0..rho_bins {
            let votes = accum[t * rho_bins + bin];
            if (votes as f32) < threshold {
                continue;
            }
            let rho = bin as f32 - rho_offset;
            // Axis position where the line crosses the image midline.
            let position = (rho - v_mid * phi.sin()) / phi.cos();
            if position.is_finite() && position >= -1.0 && position <= u_len as f32 + 1.0 {
                candidates.push(LineCandidate {
                    position,
                    strength: votes as f32,
                });
            }
        }
    }
    candidates
}
