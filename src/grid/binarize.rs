//! Locally windowed adaptive thresholding.
//!
//! Grid strokes and ROI outlines are thin and often faint; a global
//! threshold loses them wherever the background drifts. The binarizer
//! compares each pixel against the mean of its surrounding window (computed
//! with an integral image, O(W·H) total) and keeps pixels darker than
//! `mean - offset`.

use crate::config::BinarizeParams;
use crate::image::{BitMask, GrayRaster};

/// Binarize a grayscale raster; foreground = locally dark pixels.
pub fn adaptive_binarize(gray: &GrayRaster, params: &BinarizeParams) -> BitMask {
    let (w, h) = (gray.width(), gray.height());
    let mut out = BitMask::filled(w, h, false);
    if w == 0 || h == 0 {
        return out;
    }

    let integral = integral_image(gray);
    let half = (params.window.max(1) / 2) as isize;

    for y in 0..h {
        for x in 0..w {
            let x0 = (x as isize - half).max(0) as usize;
            let y0 = (y as isize - half).max(0) as usize;
            let x1 = (x as isize + half).min(w as isize - 1) as usize;
            let y1 = (y as isize + half).min(h as isize - 1) as usize;
            let area = ((x1 - x0 + 1) * (y1 - y0 + 1)) as f32;
            let sum = window_sum(&integral, w, x0, y0, x1, y1) as f32;
            let mean = sum / area;
            if f32::from(gray.get(x, y)) < mean - params.offset {
                out.set(x, y, true);
            }
        }
    }
    out
}

/// Summed-area table with one extra row/column of zeros.
fn integral_image(gray: &GrayRaster) -> Vec<u64> {
    let (w, h) = (gray.width(), gray.height());
    let stride = w + 1;
    let mut integral = vec![0u64; stride * (h + 1)];
    for y in 0..h {
        let row = gray.row(y);
        let mut row_sum = 0u64;
        for x in 0..w {
            row_sum += u64::from(row[x]);
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row_sum;
        }
    }
    integral
}

#[inline]
fn window_sum(integral: &[u64], w: usize, x0: usize, y0: usize, x1: usize, y1: usize) -> u64 {
    let stride = w + 1;
    integral[(y1 + 1) * stride + x1 + 1] + integral[y0 * stride + x0]
        - integral[y0 * stride + x1 + 1]
        - integral[(y1 + 1) * stride + x0]
}
