//! Raster buffers shared by every pipeline stage.
//!
//! - [`RgbRaster`] – owned 8-bit RGB buffer (base, contour and grid layers).
//! - [`GrayRaster`] – owned 8-bit single-channel buffer for binarization.
//! - [`BitMask`] – boolean raster used for ROI masks and validity channels.
//! - [`io`] – PNG load/save plus the shared pretty-JSON writer.
//!
//! Buffers are plain row-major vectors with accessor methods; none of the
//! pipeline stages mutate a raster they did not create.

pub mod io;
mod mask;
mod rgb;

pub use io::{load_rgb_image, save_rgb_image, write_json_file};
pub use mask::BitMask;
pub use rgb::{GrayRaster, RgbRaster};
