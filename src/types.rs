//! Slide identity: experimental condition, time point, stain and animal.
//!
//! Source identifiers follow the annotation tool's convention
//! `{Condition}-Week{N}-{Staining}-{Location}-Animal{ID}`; the parsed
//! [`SlideMeta`] seeds tile naming and every statistical grouping.

use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Experimental arm of a slide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Condition {
    Test,
    Sham,
    Control,
}

impl Condition {
    fn parse(token: &str) -> Option<Condition> {
        match token {
            "Test" => Some(Condition::Test),
            "Sham" => Some(Condition::Sham),
            "Control" | "Ctrl" => Some(Condition::Control),
            _ => None,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Condition::Test => "Test",
            Condition::Sham => "Sham",
            Condition::Control => "Control",
        };
        f.write_str(s)
    }
}

/// Sampling time point, in weeks after treatment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimePoint {
    Week2,
    Week4,
    Week8,
}

impl TimePoint {
    pub fn week(self) -> u32 {
        match self {
            TimePoint::Week2 => 2,
            TimePoint::Week4 => 4,
            TimePoint::Week8 => 8,
        }
    }

    fn from_week(week: u32) -> Option<TimePoint> {
        match week {
            2 => Some(TimePoint::Week2),
            4 => Some(TimePoint::Week4),
            8 => Some(TimePoint::Week8),
            _ => None,
        }
    }
}

impl fmt::Display for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Week{}", self.week())
    }
}

/// Stain family determining the classification palette.
///
/// IHC covers every antibody marker; the marker name itself is kept in
/// [`SlideMeta::stain_name`] for naming and pairing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StainType {
    HE,
    Trichrome,
    Pentachrome,
    Ihc,
}

/// Antibody markers recognized as IHC stains in source identifiers.
const IHC_MARKERS: [&str; 10] = [
    "CD31", "CD68", "FSP1", "Desmin", "Laminin", "Collagen", "MHC", "Actinin", "Tubulin", "Acetylc",
];

impl StainType {
    /// Resolve the stain family from the identifier's staining token.
    ///
    /// Unknown tokens fall back to the IHC palette, as the annotation
    /// convention spells histochemical stains explicitly.
    pub fn from_name(name: &str) -> StainType {
        match name {
            "HE" | "H&E" => StainType::HE,
            "Trichrome" => StainType::Trichrome,
            "Pentachrome" | "Movats" => StainType::Pentachrome,
            _ => {
                if !IHC_MARKERS.contains(&name) {
                    warn!("StainType: unknown staining {name:?}, assuming IHC palette");
                }
                StainType::Ihc
            }
        }
    }
}

/// Parsed slide identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlideMeta {
    pub condition: Condition,
    pub time_point: TimePoint,
    /// Staining token as written in the identifier (e.g. `HE`, `CD31`).
    pub stain_name: String,
    /// Stain family resolved from `stain_name`.
    pub stain: StainType,
    /// Anatomical location token (e.g. `Defect`).
    pub location: String,
    pub animal: u32,
}

impl SlideMeta {
    /// Parse a source identifier of the form
    /// `{Condition}-Week{N}-{Staining}-{Location}-Animal{ID}`.
    pub fn parse(identifier: &str) -> Result<SlideMeta, String> {
        let parts: Vec<&str> = identifier.split('-').map(str::trim).collect();
        if parts.len() != 5 {
            return Err(format!(
                "Identifier {identifier:?} has {} fields, expected 5",
                parts.len()
            ));
        }
        let condition = Condition::parse(parts[0])
            .ok_or_else(|| format!("Identifier {identifier:?}: unknown condition {:?}", parts[0]))?;
        let week: u32 = parts[1]
            .strip_prefix("Week")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| format!("Identifier {identifier:?}: bad week field {:?}", parts[1]))?;
        let time_point = TimePoint::from_week(week)
            .ok_or_else(|| format!("Identifier {identifier:?}: unsupported week {week}"))?;
        let animal: u32 = parts[4]
            .strip_prefix("Animal")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| format!("Identifier {identifier:?}: bad animal field {:?}", parts[4]))?;
        Ok(SlideMeta {
            condition,
            time_point,
            stain_name: parts[2].to_string(),
            stain: StainType::from_name(parts[2]),
            location: parts[3].to_string(),
            animal,
        })
    }

    /// Key identifying the physical sample a slide was cut from; H&E and
    /// IHC slides of the same sample share it.
    pub fn sample_key(&self) -> (Condition, TimePoint, String, u32) {
        (
            self.condition,
            self.time_point,
            self.location.clone(),
            self.animal,
        )
    }
}

impl fmt::Display for SlideMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}-Animal{}",
            self.condition, self.time_point, self.stain_name, self.location, self.animal
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_round_trips_identifier() {
        let meta = SlideMeta::parse("Test-Week4-CD31-Defect-Animal3").unwrap();
        assert_eq!(meta.condition, Condition::Test);
        assert_eq!(meta.time_point, TimePoint::Week4);
        assert_eq!(meta.stain, StainType::Ihc);
        assert_eq!(meta.stain_name, "CD31");
        assert_eq!(meta.animal, 3);
        assert_eq!(meta.to_string(), "Test-Week4-CD31-Defect-Animal3");
    }

    #[test]
    fn rejects_malformed_identifiers() {
        assert!(SlideMeta::parse("Test-Week4-HE-Defect").is_err());
        assert!(SlideMeta::parse("Bogus-Week4-HE-Defect-Animal1").is_err());
        assert!(SlideMeta::parse("Test-Week3-HE-Defect-Animal1").is_err());
        assert!(SlideMeta::parse("Test-Week4-HE-Defect-AnimalX").is_err());
    }

    #[test]
    fn control_accepts_legacy_token() {
        let meta = SlideMeta::parse("Ctrl-Week2-HE-Defect-Animal1").unwrap();
        assert_eq!(meta.condition, Condition::Control);
    }
}
