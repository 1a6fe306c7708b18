#![doc = include_str!("../README.md")]

// Public modules (stable-ish surface)
pub mod classify;
pub mod config;
pub mod image;
pub mod layers;
pub mod pipeline;
pub mod stats;
pub mod types;

// Lower-level stage modules – public for tools and tests, but considered
// unstable internals.
pub mod grid;
pub mod roi;

// --- High-level re-exports -------------------------------------------------

// Main entry points: slide processing + configuration.
pub use crate::config::{load_config, PipelineConfig};
pub use crate::layers::CompositeSlide;
pub use crate::pipeline::{process_batch, process_slide, BatchOutcome, SlideError};

// The measurement table and the statistics it feeds.
pub use crate::stats::{compile_statistics, MeasurementTable, StatisticsReport};

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use histoquant::prelude::*;
///
/// # fn main() -> Result<(), String> {
/// let config = PipelineConfig::default();
/// let slide = CompositeSlide::from_layer_files(
///     "Test-Week4-CD31-Defect-Animal3",
///     "base.png".as_ref(),
///     "roi.png".as_ref(),
///     "grid.png".as_ref(),
/// )?;
/// match process_slide(&slide, &config) {
///     Ok(summary) => println!("{} tile(s)", summary.tiles.len()),
///     Err(e) => eprintln!("{}: {e}", slide.meta),
/// }
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::classify::StainPalette;
    pub use crate::config::PipelineConfig;
    pub use crate::layers::{CompositeSlide, NamedLayer};
    pub use crate::pipeline::{process_batch, process_slide};
    pub use crate::stats::compile_statistics;
    pub use crate::types::{Condition, SlideMeta, StainType, TimePoint};
}
