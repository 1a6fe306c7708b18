//! Target Prevalence Index.
//!
//! Raw IHC target-positive fractions confound marker prevalence with local
//! cell density. The TPI removes that confound by regressing the per-tile
//! IHC target fraction on the per-tile H&E nuclei fraction of the paired
//! slide (same animal, time point and location share one reference grid,
//! so tiles pair by index). The TPI of a slide is the regression-predicted
//! target fraction averaged over its paired tiles; the spread of those
//! per-tile predictions is the slide's weight in the downstream comparison.
//!
//! Comparisons between two conditions at one time point use an
//! inverse-variance weighted Welch-style test: weighted group means and
//! variances, se = √(v₁+v₂), conservative df = min(n₁,n₂)−1. Ignoring the
//! tile-level heterogeneity here would overstate significance.

use super::math;
use super::regression::{fit_ols, LinearFit};
use super::{InsufficientData, MeasurementTable};
use crate::types::{Condition, StainType, TimePoint};
use log::{debug, warn};
use serde::Serialize;
use std::collections::BTreeMap;

const MIN_PAIRED_SLIDES: usize = 2;
const HE_NUCLEI_LABEL: &str = "Nuclei";
const IHC_TARGET_LABEL: &str = "Target";

/// TPI of one slide, with the tile-level dispersion used as its weight.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideTpi {
    pub condition: Condition,
    pub time_point: TimePoint,
    pub location: String,
    pub animal: u32,
    pub tpi: f64,
    /// SD of the per-tile regression predictions; 0 for a single pair.
    pub tile_sd: f64,
    pub paired_tiles: usize,
}

/// Fitted regression and slide TPIs of one condition×time-point group.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TpiGroup {
    pub condition: Condition,
    pub time_point: TimePoint,
    pub fit: LinearFit,
    pub slides: Vec<SlideTpi>,
}

/// A group excluded from the comparison, with the recorded reason.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedGroup {
    pub condition: Condition,
    pub time_point: TimePoint,
    pub reason: String,
}

/// Weighted two-sample comparison of two conditions at one time point.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TpiComparison {
    pub time_point: TimePoint,
    pub a: Condition,
    pub b: Condition,
    pub weighted_mean_a: f64,
    pub weighted_mean_b: f64,
    pub t: f64,
    pub df: f64,
    pub p: f64,
}

/// Complete TPI analysis of one IHC marker.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TpiAnalysis {
    pub marker: String,
    pub groups: Vec<TpiGroup>,
    pub comparisons: Vec<TpiComparison>,
    pub skipped: Vec<SkippedGroup>,
}

/// Run the TPI analysis for one IHC marker against the H&E nuclei baseline.
///
/// Errs only when no condition×time-point group is computable at all.
pub fn run_tpi_analysis(
    table: &MeasurementTable,
    marker: &str,
) -> Result<TpiAnalysis, InsufficientData> {
    // H&E nuclei fraction per (sample, roi, tile index).
    type PairKey = (Condition, TimePoint, String, u32, usize, (usize, usize));
    let mut nuclei: BTreeMap<PairKey, f64> = BTreeMap::new();
    for record in &table.records {
        if record.slide.stain != StainType::HE {
            continue;
        }
        if let Some(fraction) = record.measurement.fraction_for(HE_NUCLEI_LABEL) {
            let (condition, time_point, location, animal) = record.slide.sample_key();
            nuclei.insert(
                (condition, time_point, location, animal, record.roi, record.tile),
                fraction,
            );
        }
    }

    // Paired (nuclei, target) observations per slide, grouped by
    // condition×time-point.
    type SlideKey = (String, u32);
    let mut groups: BTreeMap<(Condition, TimePoint), BTreeMap<SlideKey, Vec<(f64, f64)>>> =
        BTreeMap::new();
    let mut unpaired = 0usize;
    for record in table.stain_records(marker) {
        let Some(target) = record.measurement.fraction_for(IHC_TARGET_LABEL) else {
            continue;
        };
        let (condition, time_point, location, animal) = record.slide.sample_key();
        let key = (
            condition,
            time_point,
            location.clone(),
            animal,
            record.roi,
            record.tile,
        );
        match nuclei.get(&key) {
            Some(&nuclei_fraction) => {
                groups
                    .entry((condition, time_point))
                    .or_default()
                    .entry((location, animal))
                    .or_default()
                    .push((nuclei_fraction, target));
            }
            None => unpaired += 1,
        }
    }
    if unpaired > 0 {
        warn!("TPI: {unpaired} {marker} tile(s) without a matching H&E tile");
    }

    let mut fitted: Vec<TpiGroup> = Vec::new();
    let mut skipped: Vec<SkippedGroup> = Vec::new();
    for ((condition, time_point), slides) in groups {
        if slides.len() < MIN_PAIRED_SLIDES {
            let reason = InsufficientData::TooFewPairedSlides {
                condition,
                time_point,
                found: slides.len(),
                minimum: MIN_PAIRED_SLIDES,
            };
            debug!("TPI: skipping group, {reason}");
            skipped.push(SkippedGroup {
                condition,
                time_point,
                reason: reason.to_string(),
            });
            continue;
        }

        let (xs, ys): (Vec<f64>, Vec<f64>) = slides
            .values()
            .flat_map(|pairs| pairs.iter().copied())
            .unzip();
        let Some(fit) = fit_ols(&xs, &ys) else {
            let reason = InsufficientData::DegenerateRegressor {
                condition,
                time_point,
            };
            debug!("TPI: skipping group, {reason}");
            skipped.push(SkippedGroup {
                condition,
                time_point,
                reason: reason.to_string(),
            });
            continue;
        };

        let slides = slides
            .into_iter()
            .map(|((location, animal), pairs)| {
                let predictions: Vec<f64> =
                    pairs.iter().map(|&(x, _)| fit.predict(x)).collect();
                SlideTpi {
                    condition,
                    time_point,
                    location,
                    animal,
                    tpi: math::mean(&predictions),
                    tile_sd: math::sample_sd(&predictions),
                    paired_tiles: predictions.len(),
                }
            })
            .collect();
        fitted.push(TpiGroup {
            condition,
            time_point,
            fit,
            slides,
        });
    }

    if fitted.is_empty() {
        return Err(InsufficientData::NoComputableGroups {
            context: format!("TPI of {marker}"),
        });
    }

    let mut comparisons = Vec::new();
    for i in 0..fitted.len() {
        for j in i + 1..fitted.len() {
            let (ga, gb) = (&fitted[i], &fitted[j]);
            if ga.time_point != gb.time_point {
                continue;
            }
            comparisons.push(compare_groups(ga, gb));
        }
    }

    Ok(TpiAnalysis {
        marker: marker.to_string(),
        groups: fitted,
        comparisons,
        skipped,
    })
}

/// Inverse-variance weighted Welch-style comparison of two groups.
fn compare_groups(a: &TpiGroup, b: &TpiGroup) -> TpiComparison {
    let collect = |g: &TpiGroup| -> (Vec<f64>, Vec<f64>) {
        g.slides
            .iter()
            .map(|s| (s.tpi, 1.0 / (s.tile_sd * s.tile_sd).max(1e-12)))
            .unzip()
    };
    let (va, wa) = collect(a);
    let (vb, wb) = collect(b);
    let (mean_a, var_a) = math::weighted_mean_var(&va, &wa);
    let (mean_b, var_b) = math::weighted_mean_var(&vb, &wb);

    let se = (var_a + var_b).sqrt();
    let df = (va.len().min(vb.len()) as f64 - 1.0).max(1.0);
    let (t, p) = if se > 0.0 {
        let t = (mean_a - mean_b) / se;
        (t, math::t_two_sided_p(t, df))
    } else {
        (0.0, 1.0)
    };

    TpiComparison {
        time_point: a.time_point,
        a: a.condition,
        b: b.condition,
        weighted_mean_a: mean_a,
        weighted_mean_b: mean_b,
        t,
        df,
        p,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::TileMeasurement;
    use crate::stats::TileRecord;
    use crate::types::SlideMeta;

    fn he_record(condition: &str, animal: u32, tile: usize, nuclei: f64) -> TileRecord {
        let slide =
            SlideMeta::parse(&format!("{condition}-Week4-HE-Defect-Animal{animal}")).unwrap();
        TileRecord {
            name: format!("{slide}-roi0-tile0x{tile}"),
            slide,
            roi: 0,
            tile: (0, tile),
            measurement: TileMeasurement {
                labels: vec!["Nuclei".into(), "Cytoplasm/Fibrosis/Muscle".into(), "Other".into()],
                fractions: vec![nuclei, 0.5, 0.5 - nuclei],
                valid_pixels: 1000,
            },
        }
    }

    fn ihc_record(condition: &str, animal: u32, tile: usize, target: f64) -> TileRecord {
        let slide =
            SlideMeta::parse(&format!("{condition}-Week4-CD31-Defect-Animal{animal}")).unwrap();
        TileRecord {
            name: format!("{slide}-roi0-tile0x{tile}"),
            slide,
            roi: 0,
            tile: (0, tile),
            measurement: TileMeasurement {
                labels: vec!["Nuclei".into(), "Target".into(), "Other".into()],
                fractions: vec![0.2, target, 0.8 - target],
                valid_pixels: 1000,
            },
        }
    }

    /// Paired slides where target = 0.05 + 0.5·nuclei exactly.
    fn linear_table() -> MeasurementTable {
        let mut records = Vec::new();
        for animal in 1..=3u32 {
            for tile in 0..4usize {
                let nuclei = 0.1 + 0.05 * animal as f64 + 0.02 * tile as f64;
                records.push(he_record("Test", animal, tile, nuclei));
                records.push(ihc_record("Test", animal, tile, 0.05 + 0.5 * nuclei));
            }
        }
        // A second condition so the analysis has something to compare.
        for animal in 11..=12u32 {
            for tile in 0..4usize {
                let nuclei = 0.15 + 0.03 * animal as f64 / 10.0 + 0.02 * tile as f64;
                records.push(he_record("Sham", animal, tile, nuclei));
                records.push(ihc_record("Sham", animal, tile, 0.02 + 0.3 * nuclei));
            }
        }
        MeasurementTable::new(records)
    }

    #[test]
    fn regression_recovers_synthetic_relationship() {
        let analysis = run_tpi_analysis(&linear_table(), "CD31").unwrap();
        let test_group = analysis
            .groups
            .iter()
            .find(|g| g.condition == Condition::Test)
            .unwrap();
        assert!((test_group.fit.slope - 0.5).abs() < 1e-9);
        assert!((test_group.fit.intercept - 0.05).abs() < 1e-9);
        assert_eq!(test_group.slides.len(), 3);
        assert_eq!(analysis.comparisons.len(), 1);
    }

    #[test]
    fn lone_slide_group_is_skipped_not_fatal() {
        let mut records = Vec::new();
        for tile in 0..4usize {
            let nuclei = 0.2 + 0.02 * tile as f64;
            records.push(he_record("Test", 1, tile, nuclei));
            records.push(ihc_record("Test", 1, tile, 0.1 + 0.4 * nuclei));
            records.push(he_record("Sham", 2, tile, nuclei));
            records.push(ihc_record("Sham", 2, tile, 0.1 + 0.2 * nuclei));
            records.push(he_record("Sham", 3, tile, nuclei + 0.01));
            records.push(ihc_record("Sham", 3, tile, 0.1 + 0.2 * nuclei));
        }
        let analysis = run_tpi_analysis(&MeasurementTable::new(records), "CD31").unwrap();
        assert_eq!(analysis.groups.len(), 1);
        assert_eq!(analysis.groups[0].condition, Condition::Sham);
        assert_eq!(analysis.skipped.len(), 1);
        assert_eq!(analysis.skipped[0].condition, Condition::Test);
    }

    #[test]
    fn no_pairs_at_all_is_run_level_error() {
        let records = vec![ihc_record("Test", 1, 0, 0.3)];
        assert!(matches!(
            run_tpi_analysis(&MeasurementTable::new(records), "CD31"),
            Err(InsufficientData::NoComputableGroups { .. })
        ));
    }

    #[test]
    fn weighted_comparison_matches_closed_form() {
        // Hand-computed: groups {10, 12} (sd 1 each) vs {20, 26} (sd 2, 1).
        let slide = |condition, animal, tpi, sd| SlideTpi {
            condition,
            time_point: TimePoint::Week4,
            location: "Defect".into(),
            animal,
            tpi,
            tile_sd: sd,
            paired_tiles: 4,
        };
        let fit = LinearFit {
            slope: 1.0,
            intercept: 0.0,
            residual_variance: 0.0,
            n: 8,
        };
        let ga = TpiGroup {
            condition: Condition::Test,
            time_point: TimePoint::Week4,
            fit,
            slides: vec![
                slide(Condition::Test, 1, 10.0, 1.0),
                slide(Condition::Test, 2, 12.0, 1.0),
            ],
        };
        let gb = TpiGroup {
            condition: Condition::Sham,
            time_point: TimePoint::Week4,
            fit,
            slides: vec![
                slide(Condition::Sham, 3, 20.0, 2.0),
                slide(Condition::Sham, 4, 26.0, 1.0),
            ],
        };
        let cmp = compare_groups(&ga, &gb);
        // Group a: equal weights, mean 11, var = (1+1)/2 = 1.
        // Group b: weights 0.25 and 1 -> mean 24.8,
        // var = (0.25·23.04 + 1·1.44)/1.25 = 5.76.
        assert!((cmp.weighted_mean_a - 11.0).abs() < 1e-9);
        assert!((cmp.weighted_mean_b - 24.8).abs() < 1e-9);
        let expected_t = (11.0 - 24.8) / (1.0 + 5.76f64).sqrt();
        assert!((cmp.t - expected_t).abs() < 1e-9);
        assert!((cmp.df - 1.0).abs() < 1e-12);
    }
}
