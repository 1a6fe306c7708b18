//! Random-intercept mixed-effects comparison.
//!
//! Tiles are technical replicates nested inside animals; treating them as
//! independent samples would overstate every contrast. The model is
//!
//! `y_ij = μ_c + a_i + ε_ij`,  `a_i ~ (0, σ²_b)`,  `ε_ij ~ (0, σ²_w)`
//!
//! with condition-specific means μ_c, animal intercepts a_i and tile
//! residuals ε_ij. Variance components come from the method of moments:
//! σ²_w pools the within-animal tile variance, σ²_b is the animal-mean
//! dispersion in excess of what σ²_w alone explains. Condition means are
//! then inverse-variance weighted animal means, with Wald intervals on
//! Student's t at animal-level degrees of freedom.

use super::math;
use super::{InsufficientData, MeasurementTable};
use crate::types::{Condition, TimePoint};
use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;

/// Estimated mean of one condition, with animal-level uncertainty.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionEffect {
    pub condition: Condition,
    pub estimate: f64,
    pub se: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    pub animals: usize,
    pub tiles: usize,
}

/// Pairwise condition contrast.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contrast {
    pub a: Condition,
    pub b: Condition,
    pub difference: f64,
    pub se: f64,
    pub t: f64,
    pub p: f64,
    /// Bonferroni-adjusted over all contrasts of this fit.
    pub p_bonferroni: f64,
}

/// A fitted mixed model for one (time point, label) of one staining.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MixedModelFit {
    pub stain_name: String,
    pub label: String,
    pub time_point: TimePoint,
    pub sigma2_within: f64,
    pub sigma2_between: f64,
    /// Residual (animal-level) degrees of freedom.
    pub df: f64,
    pub effects: Vec<ConditionEffect>,
    pub contrasts: Vec<Contrast>,
}

/// Fit the random-intercept model for one label at one time point.
pub fn fit_mixed(
    table: &MeasurementTable,
    stain_name: &str,
    label: &str,
    time_point: TimePoint,
) -> Result<MixedModelFit, InsufficientData> {
    // Tile fractions per (condition, animal).
    let mut animals: BTreeMap<(Condition, u32), Vec<f64>> = BTreeMap::new();
    for record in table.stain_records(stain_name) {
        if record.slide.time_point != time_point {
            continue;
        }
        if let Some(fraction) = record.measurement.fraction_for(label) {
            animals
                .entry((record.slide.condition, record.slide.animal))
                .or_default()
                .push(fraction);
        }
    }

    let conditions: Vec<Condition> = {
        let mut c: Vec<Condition> = animals.keys().map(|(cond, _)| *cond).collect();
        c.sort();
        c.dedup();
        c
    };
    let n_animals = animals.len();
    let df = n_animals as f64 - conditions.len() as f64;
    // At least one animal-level residual degree of freedom, and at least
    // two conditions to contrast.
    if conditions.len() < 2 || df < 1.0 {
        return Err(InsufficientData::TooFewAnimals {
            time_point,
            found: n_animals,
            minimum: conditions.len().max(2) + 1,
        });
    }

    // Pooled within-animal variance.
    let mut ss_within = 0.0;
    let mut df_within = 0.0;
    for values in animals.values() {
        if values.len() > 1 {
            ss_within += math::sample_variance(values) * (values.len() - 1) as f64;
            df_within += (values.len() - 1) as f64;
        }
    }
    let sigma2_within = if df_within > 0.0 {
        ss_within / df_within
    } else {
        0.0
    };

    // Animal means grouped by condition.
    let mut by_condition: BTreeMap<Condition, Vec<(f64, usize)>> = BTreeMap::new();
    for ((condition, _), values) in &animals {
        by_condition
            .entry(*condition)
            .or_default()
            .push((math::mean(values), values.len()));
    }

    // Between-animal dispersion in excess of the within-tile share.
    let mut ss_means = 0.0;
    for means in by_condition.values() {
        let values: Vec<f64> = means.iter().map(|(m, _)| *m).collect();
        ss_means += math::sample_variance(&values) * (values.len().saturating_sub(1)) as f64;
    }
    let s2_means = ss_means / df;
    let mean_inv_n = animals
        .values()
        .map(|v| 1.0 / v.len() as f64)
        .sum::<f64>()
        / n_animals as f64;
    let sigma2_between = (s2_means - sigma2_within * mean_inv_n).max(0.0);
    debug!(
        "Mixed: {stain_name}/{label} {time_point} sigma2_w={sigma2_within:.3e} sigma2_b={sigma2_between:.3e}"
    );

    let t_crit = math::t_critical(df, 0.05);
    let mut effects = Vec::with_capacity(by_condition.len());
    for (&condition, means) in &by_condition {
        let mut weight_sum = 0.0;
        let mut weighted = 0.0;
        let mut tiles = 0usize;
        for &(mean, n) in means {
            let variance = (sigma2_between + sigma2_within / n as f64).max(1e-12);
            let w = 1.0 / variance;
            weight_sum += w;
            weighted += w * mean;
            tiles += n;
        }
        let estimate = weighted / weight_sum;
        let se = (1.0 / weight_sum).sqrt();
        effects.push(ConditionEffect {
            condition,
            estimate,
            se,
            ci_low: estimate - t_crit * se,
            ci_high: estimate + t_crit * se,
            animals: means.len(),
            tiles,
        });
    }

    let n_pairs = effects.len() * (effects.len() - 1) / 2;
    let mut contrasts = Vec::with_capacity(n_pairs);
    for i in 0..effects.len() {
        for j in i + 1..effects.len() {
            let (ea, eb) = (&effects[i], &effects[j]);
            let difference = ea.estimate - eb.estimate;
            let se = (ea.se * ea.se + eb.se * eb.se).sqrt();
            let t = if se > 0.0 { difference / se } else { 0.0 };
            let p = math::t_two_sided_p(t, df);
            contrasts.push(Contrast {
                a: ea.condition,
                b: eb.condition,
                difference,
                se,
                t,
                p,
                p_bonferroni: (p * n_pairs as f64).min(1.0),
            });
        }
    }

    Ok(MixedModelFit {
        stain_name: stain_name.to_string(),
        label: label.to_string(),
        time_point,
        sigma2_within,
        sigma2_between,
        df,
        effects,
        contrasts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::TileMeasurement;
    use crate::stats::TileRecord;
    use crate::types::SlideMeta;

    fn record(condition: &str, animal: u32, tile: usize, nuclei: f64) -> TileRecord {
        let slide =
            SlideMeta::parse(&format!("{condition}-Week4-HE-Defect-Animal{animal}")).unwrap();
        TileRecord {
            name: format!("{slide}-roi0-tile0x{tile}"),
            slide,
            roi: 0,
            tile: (0, tile),
            measurement: TileMeasurement {
                labels: vec!["Nuclei".to_string(), "Other".to_string()],
                fractions: vec![nuclei, 1.0 - nuclei],
                valid_pixels: 1000,
            },
        }
    }

    fn synthetic_table(shift: f64) -> MeasurementTable {
        let mut records = Vec::new();
        // Three animals per condition, four tiles each; animal offsets are
        // larger than tile noise.
        for (c_idx, condition) in ["Test", "Sham"].iter().enumerate() {
            let base = 0.3 + shift * c_idx as f64;
            for animal in 0..3u32 {
                let animal_offset = (animal as f64 - 1.0) * 0.02;
                for tile in 0..4usize {
                    let tile_noise = (tile as f64 - 1.5) * 0.004;
                    records.push(record(
                        condition,
                        animal + 1 + 10 * c_idx as u32,
                        tile,
                        base + animal_offset + tile_noise,
                    ));
                }
            }
        }
        MeasurementTable::new(records)
    }

    #[test]
    fn recovers_condition_means() {
        let table = synthetic_table(0.1);
        let fit = fit_mixed(&table, "HE", "Nuclei", TimePoint::Week4).unwrap();
        assert_eq!(fit.effects.len(), 2);
        let test = fit
            .effects
            .iter()
            .find(|e| e.condition == Condition::Test)
            .unwrap();
        let sham = fit
            .effects
            .iter()
            .find(|e| e.condition == Condition::Sham)
            .unwrap();
        assert!((test.estimate - 0.3).abs() < 0.01);
        assert!((sham.estimate - 0.4).abs() < 0.01);
        assert!((fit.df - 4.0).abs() < 1e-9);
    }

    #[test]
    fn animal_variation_dominates_uncertainty() {
        let fit = fit_mixed(&synthetic_table(0.1), "HE", "Nuclei", TimePoint::Week4).unwrap();
        // Animal offsets of ±0.02 must surface as between-animal variance,
        // not be washed out by 12 tiles per condition.
        assert!(fit.sigma2_between > fit.sigma2_within);
        let contrast = &fit.contrasts[0];
        assert!(contrast.p < 0.05);
        assert!(contrast.se > 0.005, "se {} ignores animal level", contrast.se);
    }

    #[test]
    fn bonferroni_scales_by_pair_count_and_caps() {
        let mut records = Vec::new();
        for (c_idx, condition) in ["Test", "Sham", "Control"].iter().enumerate() {
            for animal in 0..2u32 {
                for tile in 0..3usize {
                    // Means barely differ; raw p-values land near 1.
                    let value = 0.3
                        + 0.001 * c_idx as f64
                        + 0.03 * (animal as f64 - 0.5)
                        + 0.002 * tile as f64;
                    records.push(record(condition, animal + 1 + 10 * c_idx as u32, tile, value));
                }
            }
        }
        let fit = fit_mixed(
            &MeasurementTable::new(records),
            "HE",
            "Nuclei",
            TimePoint::Week4,
        )
        .unwrap();
        assert_eq!(fit.contrasts.len(), 3);
        for contrast in &fit.contrasts {
            let expected = (contrast.p * 3.0).min(1.0);
            assert!((contrast.p_bonferroni - expected).abs() < 1e-12);
            assert!(contrast.p_bonferroni <= 1.0);
        }
        // At least one near-1 raw p must be capped rather than tripled.
        assert!(fit.contrasts.iter().any(|c| c.p_bonferroni == 1.0));
    }

    #[test]
    fn single_animal_groups_are_insufficient() {
        let mut records = Vec::new();
        for tile in 0..4usize {
            records.push(record("Test", 1, tile, 0.3));
            records.push(record("Sham", 2, tile, 0.4));
        }
        let table = MeasurementTable::new(records);
        assert!(matches!(
            fit_mixed(&table, "HE", "Nuclei", TimePoint::Week4),
            Err(InsufficientData::TooFewAnimals { .. })
        ));
    }
}
