//! I/O helpers for RGB rasters and JSON.
//!
//! - `load_rgb_image`: read a PNG/JPEG/etc. into an owned RGB buffer.
//! - `save_rgb_image`: write an [`RgbRaster`] to disk.
//! - `write_json_file`: pretty-print a serializable value to disk.
use super::RgbRaster;
use image::RgbImage;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Load an image from disk and convert to 8-bit RGB.
pub fn load_rgb_image(path: &Path) -> Result<RgbRaster, String> {
    let img = image::open(path)
        .map_err(|e| format!("Failed to open {}: {e}", path.display()))?
        .into_rgb8();
    let width = img.width() as usize;
    let height = img.height() as usize;
    Ok(RgbRaster::from_raw(width, height, img.into_raw()))
}

/// Save an RGB raster to disk; the format follows the file extension.
pub fn save_rgb_image(raster: &RgbRaster, path: &Path) -> Result<(), String> {
    ensure_parent_dir(path)?;
    let image: RgbImage = RgbImage::from_raw(
        raster.width() as u32,
        raster.height() as u32,
        raster.as_raw().to_vec(),
    )
    .ok_or_else(|| "Failed to create image buffer".to_string())?;
    image
        .save(path)
        .map_err(|e| format!("Failed to save {}: {e}", path.display()))
}

/// Serialize a value as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to serialize JSON for {}: {e}", path.display()))?;
    fs::write(path, json).map_err(|e| format!("Failed to write JSON {}: {e}", path.display()))
}

fn ensure_parent_dir(path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {e}", parent.display()))?;
        }
    }
    Ok(())
}
