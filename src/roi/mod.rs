//! ROI mask construction and application.
//!
//! The contour layer carries hand-drawn closed outlines around the
//! remodeling site. Binarizing the strokes and flood-filling the exterior
//! from the image border leaves exactly the enclosed pixels unreached;
//! connected components of that interior become independent [`RoiMask`]s.
//! Masking never overwrites tissue pixels with a sentinel color: validity
//! travels in a separate channel so legitimately dark or white tissue stays
//! distinguishable from the excluded exterior.

use crate::config::{BinarizeParams, RoiParams};
use crate::grid::binarize::adaptive_binarize;
use crate::image::{BitMask, GrayRaster, RgbRaster};
use log::debug;
use std::fmt;

/// One rasterized region of interest.
#[derive(Clone, Debug)]
pub struct RoiMask {
    /// Index among the slide's ROIs, row-major by bounding-box top-left.
    pub index: usize,
    pub mask: BitMask,
    /// Enclosed area in pixels.
    pub area_px: usize,
}

/// Base layer restricted to one ROI. Pixels outside the ROI keep their
/// color but are flagged invalid.
#[derive(Clone, Debug)]
pub struct MaskedLayer {
    pub rgb: RgbRaster,
    pub valid: BitMask,
}

/// Reasons why ROI geometry is rejected. Fatal for the slide.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContourError {
    /// Strokes exist but enclose no area (open contour), or the layer has
    /// no strokes at all.
    MalformedContour { stroke_px: usize },
    /// A contour encloses less than the minimum measurable area.
    EmptyRoi { area_px: usize, minimum: usize },
}

impl fmt::Display for ContourError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContourError::MalformedContour { stroke_px } => {
                write!(f, "contour encloses no area ({stroke_px} stroke pixels)")
            }
            ContourError::EmptyRoi { area_px, minimum } => {
                write!(f, "ROI area {area_px} px below minimum {minimum} px")
            }
        }
    }
}

impl std::error::Error for ContourError {}

/// Rasterize the contour layer into one binary mask per closed contour.
pub fn build_masks(
    contour: &GrayRaster,
    binarize: &BinarizeParams,
    roi: &RoiParams,
) -> Result<Vec<RoiMask>, ContourError> {
    let strokes = adaptive_binarize(contour, binarize);
    let stroke_px = strokes.count();
    if stroke_px == 0 {
        return Err(ContourError::MalformedContour { stroke_px: 0 });
    }

    let exterior = flood_exterior(&strokes);
    let (w, h) = (strokes.width(), strokes.height());

    // Interior = neither stroke nor reachable from the border.
    let mut interior = BitMask::filled(w, h, false);
    let mut interior_px = 0usize;
    for y in 0..h {
        for x in 0..w {
            if !strokes.get(x, y) && !exterior.get(x, y) {
                interior.set(x, y, true);
                interior_px += 1;
            }
        }
    }
    if interior_px == 0 {
        return Err(ContourError::MalformedContour { stroke_px });
    }

    let mut components = connected_components(&interior);
    // Deterministic ROI indices: row-major order of bounding-box top-left.
    components.sort_by_key(|c| c.top_left);
    debug!(
        "ROI: {} enclosed px in {} component(s)",
        interior_px,
        components.len()
    );

    let mut masks = Vec::with_capacity(components.len());
    for (index, comp) in components.into_iter().enumerate() {
        if comp.area < roi.min_area_px {
            return Err(ContourError::EmptyRoi {
                area_px: comp.area,
                minimum: roi.min_area_px,
            });
        }
        masks.push(RoiMask {
            index,
            mask: comp.mask,
            area_px: comp.area,
        });
    }
    Ok(masks)
}

/// Restrict the base layer to one ROI.
pub fn apply_mask(base: &RgbRaster, roi: &RoiMask) -> MaskedLayer {
    MaskedLayer {
        rgb: base.clone(),
        valid: roi.mask.clone(),
    }
}

/// Flood fill from every border pixel across non-stroke pixels
/// (4-connectivity). Returns the set of exterior pixels.
fn flood_exterior(strokes: &BitMask) -> BitMask {
    let (w, h) = (strokes.width(), strokes.height());
    let mut exterior = BitMask::filled(w, h, false);
    let mut stack: Vec<(usize, usize)> = Vec::new();

    let mut seed = |x: usize, y: usize, stack: &mut Vec<(usize, usize)>| {
        if !strokes.get(x, y) {
            stack.push((x, y));
        }
    };
    for x in 0..w {
        seed(x, 0, &mut stack);
        seed(x, h - 1, &mut stack);
    }
    for y in 0..h {
        seed(0, y, &mut stack);
        seed(w - 1, y, &mut stack);
    }

    while let Some((x, y)) = stack.pop() {
        if exterior.get(x, y) || strokes.get(x, y) {
            continue;
        }
        exterior.set(x, y, true);
        if x > 0 {
            stack.push((x - 1, y));
        }
        if x + 1 < w {
            stack.push((x + 1, y));
        }
        if y > 0 {
            stack.push((x, y - 1));
        }
        if y + 1 < h {
            stack.push((x, y + 1));
        }
    }
    exterior
}

struct Component {
    mask: BitMask,
    area: usize,
    top_left: (usize, usize),
}

/// 4-connected components of a mask's set pixels.
fn connected_components(mask: &BitMask) -> Vec<Component> {
    let (w, h) = (mask.width(), mask.height());
    let mut visited = BitMask::filled(w, h, false);
    let mut components = Vec::new();
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for y0 in 0..h {
        for x0 in 0..w {
            if !mask.get(x0, y0) || visited.get(x0, y0) {
                continue;
            }
            let mut comp = BitMask::filled(w, h, false);
            let mut area = 0usize;
            let mut top_left = (y0, x0);
            stack.push((x0, y0));
            while let Some((x, y)) = stack.pop() {
                if visited.get(x, y) || !mask.get(x, y) {
                    continue;
                }
                visited.set(x, y, true);
                comp.set(x, y, true);
                area += 1;
                if (y, x) < top_left {
                    top_left = (y, x);
                }
                if x > 0 {
                    stack.push((x - 1, y));
                }
                if x + 1 < w {
                    stack.push((x + 1, y));
                }
                if y > 0 {
                    stack.push((x, y - 1));
                }
                if y + 1 < h {
                    stack.push((x, y + 1));
                }
            }
            components.push(Component {
                mask: comp,
                area,
                top_left,
            });
        }
    }
    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::GrayRaster;

    /// White background with black outlines drawn by `paint`.
    fn contour_layer(w: usize, h: usize, paint: impl Fn(usize, usize) -> bool) -> GrayRaster {
        let mut data = vec![255u8; w * h];
        for y in 0..h {
            for x in 0..w {
                if paint(x, y) {
                    data[y * w + x] = 0;
                }
            }
        }
        GrayRaster::from_raw(w, h, data)
    }

    fn on_rect_outline(x: usize, y: usize, x0: usize, y0: usize, x1: usize, y1: usize) -> bool {
        let on_h = (y == y0 || y == y1) && (x0..=x1).contains(&x);
        let on_v = (x == x0 || x == x1) && (y0..=y1).contains(&y);
        on_h || on_v
    }

    fn params() -> (BinarizeParams, RoiParams) {
        (BinarizeParams::default(), RoiParams { min_area_px: 16 })
    }

    #[test]
    fn closed_rectangle_yields_interior() {
        let layer = contour_layer(64, 64, |x, y| on_rect_outline(x, y, 10, 10, 50, 50));
        let (bin, roi) = params();
        let masks = build_masks(&layer, &bin, &roi).unwrap();
        assert_eq!(masks.len(), 1);
        // Interior of a 41x41 outline is 39x39.
        assert_eq!(masks[0].area_px, 39 * 39);
        assert!(masks[0].mask.get(30, 30));
        assert!(!masks[0].mask.get(5, 5));
    }

    #[test]
    fn open_polyline_is_malformed() {
        let layer = contour_layer(64, 64, |x, y| y == 30 && (10..=50).contains(&x));
        let (bin, roi) = params();
        assert!(matches!(
            build_masks(&layer, &bin, &roi),
            Err(ContourError::MalformedContour { .. })
        ));
    }

    #[test]
    fn tiny_enclosure_is_empty_roi() {
        let layer = contour_layer(64, 64, |x, y| on_rect_outline(x, y, 10, 10, 14, 14));
        let (bin, roi) = params();
        assert!(matches!(
            build_masks(&layer, &bin, &roi),
            Err(ContourError::EmptyRoi { .. })
        ));
    }

    #[test]
    fn disjoint_contours_yield_independent_masks() {
        let layer = contour_layer(128, 64, |x, y| {
            on_rect_outline(x, y, 5, 5, 40, 40) || on_rect_outline(x, y, 70, 5, 120, 55)
        });
        let (bin, roi) = params();
        let masks = build_masks(&layer, &bin, &roi).unwrap();
        assert_eq!(masks.len(), 2);
        assert_eq!(masks[0].index, 0);
        assert!(masks[0].mask.get(20, 20));
        assert!(!masks[0].mask.get(90, 30));
        assert!(masks[1].mask.get(90, 30));
    }
}
