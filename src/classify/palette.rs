//! Stain-specific reference palettes.
//!
//! Each stain family fixes a closed set of tissue-component labels; every
//! label carries a few RGB shade centroids (dark, medium, light) sampled
//! from reference slides. The sets are configuration, not learned, and the
//! label order within a palette is the tie-breaking priority.

use crate::types::StainType;
use serde::Serialize;

/// Reference centroids for one tissue-component label.
#[derive(Clone, Debug, Serialize)]
pub struct LabelClusters {
    pub label: &'static str,
    /// Shade centroids in RGB; the nearest over all of them wins the label.
    pub centroids: &'static [[u8; 3]],
}

/// The fixed palette of one stain family.
#[derive(Clone, Debug, Serialize)]
pub struct StainPalette {
    pub stain: StainType,
    pub labels: &'static [LabelClusters],
}

impl StainPalette {
    /// Palette for a stain family.
    pub fn for_stain(stain: StainType) -> &'static StainPalette {
        match stain {
            StainType::HE => &HE,
            StainType::Trichrome => &TRICHROME,
            StainType::Pentachrome => &PENTACHROME,
            StainType::Ihc => &IHC,
        }
    }

    pub fn label_names(&self) -> Vec<String> {
        self.labels.iter().map(|l| l.label.to_string()).collect()
    }

    /// Position of a label within the palette.
    pub fn label_index(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l.label == label)
    }
}

static HE: StainPalette = StainPalette {
    stain: StainType::HE,
    labels: &[
        LabelClusters {
            label: "Nuclei",
            centroids: &[[81, 44, 109], [130, 82, 132], [165, 127, 175]],
        },
        LabelClusters {
            label: "Cytoplasm/Fibrosis/Muscle",
            centroids: &[[136, 41, 73], [209, 83, 145], [239, 170, 216]],
        },
        LabelClusters {
            label: "Other",
            centroids: &[[210, 149, 191], [235, 140, 198], [245, 235, 243]],
        },
    ],
};

static TRICHROME: StainPalette = StainPalette {
    stain: StainType::Trichrome,
    labels: &[
        LabelClusters {
            label: "Nuclei/Cytoplasm",
            centroids: &[[106, 44, 60], [142, 59, 75], [209, 160, 172]],
        },
        LabelClusters {
            label: "Fibrosis",
            centroids: &[[102, 98, 114], [151, 131, 145], [190, 200, 211]],
        },
        LabelClusters {
            label: "Muscle",
            centroids: &[[115, 14, 15], [147, 49, 63], [180, 97, 111]],
        },
        LabelClusters {
            label: "Other",
            centroids: &[[214, 193, 205], [236, 234, 239], [242, 233, 239]],
        },
    ],
};

static PENTACHROME: StainPalette = StainPalette {
    stain: StainType::Pentachrome,
    labels: &[
        LabelClusters {
            label: "Nuclei/Elastic Fiber",
            centroids: &[[20, 3, 10], [44, 20, 39], [89, 44, 59]],
        },
        LabelClusters {
            label: "Fibrosis",
            centroids: &[[70, 30, 39], [144, 95, 82], [189, 168, 177]],
        },
        LabelClusters {
            label: "Muscle/Cytoplasm",
            centroids: &[[57, 10, 19], [108, 27, 31], [147, 82, 99]],
        },
        LabelClusters {
            label: "Other",
            centroids: &[[161, 130, 140], [213, 185, 191], [243, 237, 237]],
        },
    ],
};

static IHC: StainPalette = StainPalette {
    stain: StainType::Ihc,
    labels: &[
        LabelClusters {
            label: "Nuclei",
            centroids: &[[20, 15, 17], [129, 123, 142], [214, 205, 212]],
        },
        LabelClusters {
            label: "Target",
            centroids: &[[72, 36, 16], [166, 139, 125], [234, 196, 170]],
        },
        LabelClusters {
            label: "Other",
            centroids: &[[191, 188, 190], [229, 221, 220], [241, 235, 234]],
        },
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_palette_ends_with_other() {
        for stain in [
            StainType::HE,
            StainType::Trichrome,
            StainType::Pentachrome,
            StainType::Ihc,
        ] {
            let palette = StainPalette::for_stain(stain);
            assert_eq!(palette.labels.last().unwrap().label, "Other");
            assert!(palette.labels.iter().all(|l| !l.centroids.is_empty()));
        }
    }

    #[test]
    fn ihc_palette_exposes_target() {
        let palette = StainPalette::for_stain(StainType::Ihc);
        assert_eq!(palette.label_index("Target"), Some(1));
    }
}
