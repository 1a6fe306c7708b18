//! Batch processing across slides.
//!
//! Slides are independent through classification, so the batch fans out on
//! a rayon parallel iterator; the only shared state is the read-only
//! configuration. Per-slide failures are captured, never propagated; one
//! slide's grid failure must not cost the rest of the batch.

use super::{process_slide, SlideError, SlideSummary};
use crate::config::PipelineConfig;
use crate::layers::CompositeSlide;
use crate::stats::MeasurementTable;
use crate::types::SlideMeta;
use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;

/// One slide's result, success or isolated failure.
#[derive(Clone, Debug)]
pub struct SlideOutcome {
    pub meta: SlideMeta,
    pub result: Result<SlideSummary, SlideError>,
}

/// All outcomes of one batch run, in input order.
#[derive(Clone, Debug)]
pub struct BatchOutcome {
    pub outcomes: Vec<SlideOutcome>,
}

/// Process every slide, in parallel, isolating failures.
pub fn process_batch(slides: &[CompositeSlide], config: &PipelineConfig) -> BatchOutcome {
    let outcomes: Vec<SlideOutcome> = slides
        .par_iter()
        .map(|slide| {
            let result = process_slide(slide, config);
            if let Err(e) = &result {
                warn!("Batch: {} failed: {e}", slide.meta);
            }
            SlideOutcome {
                meta: slide.meta.clone(),
                result,
            }
        })
        .collect();
    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    info!(
        "Batch: {} slide(s) processed, {} failed",
        outcomes.len(),
        failed
    );
    BatchOutcome { outcomes }
}

impl BatchOutcome {
    /// Pool every successful slide's rows into the measurement table.
    pub fn measurement_table(&self) -> MeasurementTable {
        let records = self
            .outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .flat_map(|s| s.records.iter().cloned())
            .collect();
        MeasurementTable::new(records)
    }

    /// Structured per-slide report for batch callers.
    pub fn report(&self) -> BatchReport {
        let slides: Vec<SlideReport> = self
            .outcomes
            .iter()
            .map(|o| {
                let status = match &o.result {
                    Ok(summary) => SlideStatus::Success {
                        rois: summary.rois.len(),
                        retained_tiles: summary.tiles.len(),
                        discarded_tiles: summary
                            .rois
                            .iter()
                            .map(|r| r.discarded.len())
                            .sum(),
                    },
                    Err(e) => SlideStatus::Failed {
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                    },
                };
                SlideReport {
                    slide: o.meta.to_string(),
                    status,
                }
            })
            .collect();
        let succeeded = slides
            .iter()
            .filter(|s| matches!(s.status, SlideStatus::Success { .. }))
            .count();
        BatchReport {
            processed: slides.len(),
            succeeded,
            failed: slides.len() - succeeded,
            slides,
        }
    }
}

/// Per-slide entry of the batch report.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideReport {
    pub slide: String,
    pub status: SlideStatus,
}

/// Success or the specific failure kind, with the slide identifier kept by
/// [`SlideReport`] so callers can continue past it.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum SlideStatus {
    #[serde(rename_all = "camelCase")]
    Success {
        rois: usize,
        retained_tiles: usize,
        discarded_tiles: usize,
    },
    #[serde(rename_all = "camelCase")]
    Failed { kind: String, message: String },
}

/// Batch-level rollup.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub slides: Vec<SlideReport>,
}
