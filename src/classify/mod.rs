//! Fixed-centroid color classification.
//!
//! A pure function over (pixel color, palette): every valid pixel of a tile
//! is assigned the label of its nearest reference centroid in RGB space.
//! Distances compare in integer arithmetic and ties resolve to the earlier
//! palette label, so re-running a tile is bit-for-bit reproducible. The
//! label set partitions the valid pixels exhaustively; fractions sum to 1.

pub mod palette;

pub use palette::{LabelClusters, StainPalette};

use crate::grid::tiler::Tile;
use serde::{Deserialize, Serialize};

/// Per-tile, per-label area fractions.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileMeasurement {
    /// Label names in palette order.
    pub labels: Vec<String>,
    /// Area fraction per label (label pixels ÷ valid pixels).
    pub fractions: Vec<f64>,
    /// Valid pixels the fractions are relative to.
    pub valid_pixels: usize,
}

impl TileMeasurement {
    pub fn fraction_for(&self, label: &str) -> Option<f64> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|i| self.fractions[i])
    }
}

/// Classify every valid pixel of a tile against the palette.
pub fn classify_tile(tile: &Tile, palette: &StainPalette) -> TileMeasurement {
    let mut counts = vec![0usize; palette.labels.len()];
    let (w, h) = tile.pixels.dimensions();
    let mut valid_pixels = 0usize;

    for y in 0..h {
        for x in 0..w {
            if !tile.valid.get(x, y) {
                continue;
            }
            valid_pixels += 1;
            counts[nearest_label(tile.pixels.get(x, y), palette)] += 1;
        }
    }

    let denom = valid_pixels.max(1) as f64;
    TileMeasurement {
        labels: palette.label_names(),
        fractions: counts.iter().map(|&c| c as f64 / denom).collect(),
        valid_pixels,
    }
}

/// Index of the palette label with the nearest centroid. Strict `<` keeps
/// the earliest label on exact distance ties.
#[inline]
fn nearest_label(px: [u8; 3], palette: &StainPalette) -> usize {
    let mut best = 0usize;
    let mut best_dist = u32::MAX;
    for (i, label) in palette.labels.iter().enumerate() {
        for c in label.centroids {
            let dist = sq_dist(px, *c);
            if dist < best_dist {
                best_dist = dist;
                best = i;
            }
        }
    }
    best
}

#[inline]
fn sq_dist(a: [u8; 3], b: [u8; 3]) -> u32 {
    let dr = i32::from(a[0]) - i32::from(b[0]);
    let dg = i32::from(a[1]) - i32::from(b[1]);
    let db = i32::from(a[2]) - i32::from(b[2]);
    (dr * dr + dg * dg + db * db) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{BitMask, RgbRaster};
    use crate::types::{SlideMeta, StainType};

    fn tile_of(colors: &[[u8; 3]], valid: &[bool]) -> Tile {
        let w = colors.len();
        let mut rgb = RgbRaster::filled(w, 1, [0, 0, 0]);
        let mut mask = BitMask::filled(w, 1, false);
        for (x, (&c, &v)) in colors.iter().zip(valid).enumerate() {
            rgb.set(x, 0, c);
            mask.set(x, 0, v);
        }
        let meta = SlideMeta::parse("Test-Week2-CD31-Defect-Animal1").unwrap();
        Tile {
            name: format!("{meta}-roi0-tile0x0"),
            index: (0, 0),
            cell: (0, 0),
            pixels: rgb,
            valid: mask,
            valid_fraction: 1.0,
        }
    }

    #[test]
    fn fractions_partition_valid_pixels() {
        let palette = StainPalette::for_stain(StainType::Ihc);
        let tile = tile_of(
            &[[20, 15, 17], [72, 36, 16], [241, 235, 234], [72, 36, 16]],
            &[true, true, true, true],
        );
        let m = classify_tile(&tile, palette);
        let total: f64 = m.fractions.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert_eq!(m.fraction_for("Target"), Some(0.5));
        assert_eq!(m.fraction_for("Nuclei"), Some(0.25));
    }

    #[test]
    fn invalid_pixels_are_excluded() {
        let palette = StainPalette::for_stain(StainType::Ihc);
        let tile = tile_of(
            &[[72, 36, 16], [72, 36, 16], [20, 15, 17]],
            &[true, false, false],
        );
        let m = classify_tile(&tile, palette);
        assert_eq!(m.valid_pixels, 1);
        assert_eq!(m.fraction_for("Target"), Some(1.0));
    }

    #[test]
    fn classification_is_deterministic_with_tie_priority() {
        let palette = StainPalette::for_stain(StainType::Ihc);
        // Equidistant from the first Nuclei and first Target centroids.
        let nuclei = [20u8, 15, 17];
        let target = [72u8, 36, 16];
        let mid = [46u8, 26, 27];
        assert_eq!(sq_dist(mid, nuclei), sq_dist(mid, target));

        let tile = tile_of(&[mid], &[true]);
        for _ in 0..3 {
            let m = classify_tile(&tile, palette);
            assert_eq!(m.fraction_for("Nuclei"), Some(1.0));
            assert_eq!(m.fraction_for("Target"), Some(0.0));
        }
    }
}
