//! Cross-tile and cross-slide aggregation.
//!
//! The measurement table (one row per retained tile) is the single input
//! to every statistical operation:
//! - per-group distribution summaries for external plotting,
//! - the random-intercept mixed-effects comparison ([`mixed`]),
//! - the TPI regression and weighted comparison ([`tpi`]).
//!
//! Groups that cannot be computed are excluded with a recorded
//! [`InsufficientData`] reason; only a comparison with no computable group
//! at all escalates to the caller.

pub mod math;
pub mod mixed;
pub mod regression;
pub mod tpi;

pub use mixed::{fit_mixed, MixedModelFit};
pub use regression::{fit_ols, LinearFit};
pub use tpi::{run_tpi_analysis, TpiAnalysis};

use crate::classify::TileMeasurement;
use crate::types::{Condition, SlideMeta, TimePoint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One row of the measurement table.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileRecord {
    pub slide: SlideMeta,
    pub roi: usize,
    pub tile: (usize, usize),
    pub name: String,
    pub measurement: TileMeasurement,
}

/// The tabular dataset consumed by the statistics engine.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MeasurementTable {
    pub records: Vec<TileRecord>,
}

impl MeasurementTable {
    pub fn new(records: Vec<TileRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records of one staining, by the identifier's staining token.
    pub fn stain_records<'a>(
        &'a self,
        stain_name: &'a str,
    ) -> impl Iterator<Item = &'a TileRecord> + 'a {
        self.records
            .iter()
            .filter(move |r| r.slide.stain_name == stain_name)
    }

    /// Staining tokens present, sorted.
    pub fn stain_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .records
            .iter()
            .map(|r| r.slide.stain_name.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Distribution summary per (condition, time point) for one label of
    /// one staining.
    pub fn summarize(&self, stain_name: &str, label: &str) -> Vec<GroupSummary> {
        let mut groups: BTreeMap<(Condition, TimePoint), Vec<f64>> = BTreeMap::new();
        for record in self.stain_records(stain_name) {
            if let Some(fraction) = record.measurement.fraction_for(label) {
                groups
                    .entry((record.slide.condition, record.slide.time_point))
                    .or_default()
                    .push(fraction);
            }
        }
        groups
            .into_iter()
            .map(|((condition, time_point), mut values)| GroupSummary {
                condition,
                time_point,
                label: label.to_string(),
                n: values.len(),
                mean: math::mean(&values),
                sd: math::sample_sd(&values),
                q1: math::quantile(&mut values, 0.25),
                median: math::quantile(&mut values, 0.5),
                q3: math::quantile(&mut values, 0.75),
            })
            .collect()
    }

    /// Per-slide mean and SD of every label of one staining.
    pub fn slide_aggregates(&self, stain_name: &str) -> Vec<SlideAggregate> {
        let mut slides: BTreeMap<String, (SlideMeta, BTreeMap<String, Vec<f64>>)> =
            BTreeMap::new();
        for record in self.stain_records(stain_name) {
            let entry = slides
                .entry(record.slide.to_string())
                .or_insert_with(|| (record.slide.clone(), BTreeMap::new()));
            for (label, fraction) in record
                .measurement
                .labels
                .iter()
                .zip(&record.measurement.fractions)
            {
                entry.1.entry(label.clone()).or_default().push(*fraction);
            }
        }
        slides
            .into_values()
            .map(|(slide, labels)| SlideAggregate {
                slide,
                labels: labels
                    .into_iter()
                    .map(|(label, values)| LabelAggregate {
                        label,
                        tiles: values.len(),
                        mean: math::mean(&values),
                        sd: math::sample_sd(&values),
                    })
                    .collect(),
            })
            .collect()
    }
}

/// Distribution summary of one (condition, time point, label) group.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub condition: Condition,
    pub time_point: TimePoint,
    pub label: String,
    pub n: usize,
    pub mean: f64,
    pub sd: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
}

/// Tile-level mean and SD of one label on one slide.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelAggregate {
    pub label: String,
    pub tiles: usize,
    pub mean: f64,
    pub sd: f64,
}

/// Slide-level rollup of all labels.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideAggregate {
    pub slide: SlideMeta,
    pub labels: Vec<LabelAggregate>,
}

/// A mixed-model group excluded from the report, with the recorded reason.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedModel {
    pub stain_name: String,
    pub label: String,
    pub time_point: TimePoint,
    pub reason: String,
}

/// A TPI marker analysis that produced nothing computable.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedTpi {
    pub marker: String,
    pub reason: String,
}

/// The statistics section of the batch report: every computable summary,
/// model and TPI analysis, plus every omission with its stated reason.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsReport {
    pub summaries: Vec<GroupSummary>,
    pub slide_aggregates: Vec<SlideAggregate>,
    pub mixed_models: Vec<MixedModelFit>,
    pub skipped_models: Vec<SkippedModel>,
    pub tpi: Vec<TpiAnalysis>,
    pub skipped_tpi: Vec<SkippedTpi>,
}

/// Roll the complete measurement table up into the statistics report.
///
/// Per-group failures are recorded and skipped; only an empty table, with
/// no usable data for any requested comparison, escalates to the caller.
pub fn compile_statistics(table: &MeasurementTable) -> Result<StatisticsReport, InsufficientData> {
    use crate::classify::StainPalette;
    use crate::types::StainType;

    if table.is_empty() {
        return Err(InsufficientData::NoComputableGroups {
            context: "an empty measurement table".to_string(),
        });
    }

    let mut report = StatisticsReport {
        summaries: Vec::new(),
        slide_aggregates: Vec::new(),
        mixed_models: Vec::new(),
        skipped_models: Vec::new(),
        tpi: Vec::new(),
        skipped_tpi: Vec::new(),
    };

    for stain_name in table.stain_names() {
        let stain = StainType::from_name(&stain_name);
        let palette = StainPalette::for_stain(stain);
        report
            .slide_aggregates
            .extend(table.slide_aggregates(&stain_name));

        let time_points: Vec<TimePoint> = {
            let mut tps: Vec<TimePoint> = table
                .stain_records(&stain_name)
                .map(|r| r.slide.time_point)
                .collect();
            tps.sort();
            tps.dedup();
            tps
        };

        for label in palette.label_names() {
            report.summaries.extend(table.summarize(&stain_name, &label));
            for &time_point in &time_points {
                match mixed::fit_mixed(table, &stain_name, &label, time_point) {
                    Ok(fit) => report.mixed_models.push(fit),
                    Err(reason) => report.skipped_models.push(SkippedModel {
                        stain_name: stain_name.clone(),
                        label: label.clone(),
                        time_point,
                        reason: reason.to_string(),
                    }),
                }
            }
        }

        if stain == StainType::Ihc {
            match tpi::run_tpi_analysis(table, &stain_name) {
                Ok(analysis) => report.tpi.push(analysis),
                Err(reason) => report.skipped_tpi.push(SkippedTpi {
                    marker: stain_name.clone(),
                    reason: reason.to_string(),
                }),
            }
        }
    }

    Ok(report)
}

/// A statistical group lacks the replication its operation requires.
/// The group is excluded and reported; never fatal to the run unless no
/// group at all can be computed.
#[derive(Clone, Debug, PartialEq)]
pub enum InsufficientData {
    TooFewAnimals {
        time_point: TimePoint,
        found: usize,
        minimum: usize,
    },
    TooFewPairedSlides {
        condition: Condition,
        time_point: TimePoint,
        found: usize,
        minimum: usize,
    },
    DegenerateRegressor {
        condition: Condition,
        time_point: TimePoint,
    },
    NoComputableGroups {
        context: String,
    },
}

impl fmt::Display for InsufficientData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsufficientData::TooFewAnimals {
                time_point,
                found,
                minimum,
            } => write!(
                f,
                "{time_point}: {found} animal(s) across conditions, need ≥{minimum}"
            ),
            InsufficientData::TooFewPairedSlides {
                condition,
                time_point,
                found,
                minimum,
            } => write!(
                f,
                "{condition} {time_point}: {found} paired slide(s), need ≥{minimum}"
            ),
            InsufficientData::DegenerateRegressor {
                condition,
                time_point,
            } => write!(
                f,
                "{condition} {time_point}: nuclei fractions carry no variation to regress on"
            ),
            InsufficientData::NoComputableGroups { context } => {
                write!(f, "no computable group for {context}")
            }
        }
    }
}

impl std::error::Error for InsufficientData {}
