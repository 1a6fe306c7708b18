//! File outputs: layer and tile rasters, measurement tables.
//!
//! Naming preserves traceability to the source slide: layer files carry the
//! slide identifier plus a role suffix, tile files carry the deterministic
//! tile name, and measurement tables are one CSV per staining with the
//! palette's labels as columns.

use super::SlideSummary;
use crate::image::save_rgb_image;
use crate::layers::SlideLayers;
use crate::stats::MeasurementTable;
use crate::types::SlideMeta;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write the three decomposed layers next to each other.
pub fn write_layer_images(
    layers: &SlideLayers,
    meta: &SlideMeta,
    dir: &Path,
) -> Result<(), String> {
    save_rgb_image(&layers.base, &dir.join(format!("{meta}.png")))?;
    save_rgb_image(&layers.contour, &dir.join(format!("{meta} (ROI).png")))?;
    save_rgb_image(&layers.grid, &dir.join(format!("{meta} (Grid).png")))
}

/// Write every retained tile of a slide; discarded tiles produce no file.
pub fn write_tile_images(summary: &SlideSummary, dir: &Path) -> Result<(), String> {
    for tile in &summary.tiles {
        save_rgb_image(&tile.pixels, &dir.join(format!("{}.png", tile.name)))?;
    }
    Ok(())
}

/// Write one staining's measurement rows as CSV.
///
/// Columns: slide metadata, ROI and tile indices, then one area-fraction
/// column per palette label.
pub fn write_stain_csv(
    table: &MeasurementTable,
    stain_name: &str,
    path: &Path,
) -> Result<(), String> {
    let mut records = table.stain_records(stain_name).peekable();
    let Some(first) = records.peek() else {
        return Err(format!("No records for staining {stain_name}"));
    };
    let labels = first.measurement.labels.clone();

    let file = fs::File::create(path)
        .map_err(|e| format!("Failed to create {}: {e}", path.display()))?;
    let mut w = BufWriter::new(file);

    let mut header = vec![
        "slide".to_string(),
        "condition".to_string(),
        "week".to_string(),
        "staining".to_string(),
        "location".to_string(),
        "animal".to_string(),
        "roi".to_string(),
        "tileRow".to_string(),
        "tileCol".to_string(),
    ];
    header.extend(labels.iter().map(|l| sanitize_column(l)));
    write_row(&mut w, path, &header)?;

    for record in records {
        let mut row = vec![
            record.slide.to_string(),
            record.slide.condition.to_string(),
            record.slide.time_point.week().to_string(),
            record.slide.stain_name.clone(),
            record.slide.location.clone(),
            record.slide.animal.to_string(),
            record.roi.to_string(),
            record.tile.0.to_string(),
            record.tile.1.to_string(),
        ];
        for label in &labels {
            let fraction = record.measurement.fraction_for(label).unwrap_or(0.0);
            row.push(format!("{fraction:.6}"));
        }
        write_row(&mut w, path, &row)?;
    }
    Ok(())
}

/// Write `{stain}_tile_data.csv` for every staining in the table.
pub fn write_measurement_csvs(table: &MeasurementTable, dir: &Path) -> Result<(), String> {
    fs::create_dir_all(dir).map_err(|e| format!("Failed to create {}: {e}", dir.display()))?;
    for stain_name in table.stain_names() {
        let path = dir.join(format!("{stain_name}_tile_data.csv"));
        write_stain_csv(table, &stain_name, &path)?;
    }
    Ok(())
}

fn write_row(w: &mut impl Write, path: &Path, fields: &[String]) -> Result<(), String> {
    writeln!(w, "{}", fields.join(","))
        .map_err(|e| format!("Failed to write {}: {e}", path.display()))
}

fn sanitize_column(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_names_are_sanitized() {
        assert_eq!(sanitize_column("Nuclei/Elastic Fiber"), "Nuclei_Elastic_Fiber");
        assert_eq!(sanitize_column("Other"), "Other");
    }
}
