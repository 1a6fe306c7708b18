//! Composite slide decomposition.
//!
//! A slide arrives as an ordered collection of named raster layers. The
//! decomposer resolves the three semantic roles {Base, Contour, Grid} from
//! the layer names the annotation tool assigned, never from pixel content,
//! so separation is deterministic regardless of stain color.

use crate::image::{load_rgb_image, RgbRaster};
use crate::types::SlideMeta;
use std::fmt;
use std::path::Path;

/// Semantic role a layer plays inside a composite slide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LayerRole {
    /// The tissue scan itself.
    Base,
    /// Hand-drawn region-of-interest contour.
    Contour,
    /// Reference grid with known physical pitch.
    Grid,
}

impl LayerRole {
    const ALL: [LayerRole; 3] = [LayerRole::Base, LayerRole::Contour, LayerRole::Grid];

    /// Identifiers the annotation tools use for this role, lowercased.
    fn identifiers(self) -> &'static [&'static str] {
        match self {
            LayerRole::Base => &["base", "image", "original", "tissue"],
            LayerRole::Contour => &["roi", "contour"],
            LayerRole::Grid => &["grid", "grids"],
        }
    }

    /// Resolve the role a layer name claims, if any.
    pub fn from_name(name: &str) -> Option<LayerRole> {
        let normalized = name.trim().to_ascii_lowercase();
        LayerRole::ALL
            .into_iter()
            .find(|role| role.identifiers().contains(&normalized.as_str()))
    }
}

impl fmt::Display for LayerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LayerRole::Base => "base",
            LayerRole::Contour => "contour",
            LayerRole::Grid => "grid",
        };
        f.write_str(s)
    }
}

/// One named raster layer of a composite.
#[derive(Clone, Debug)]
pub struct NamedLayer {
    pub name: String,
    pub raster: RgbRaster,
}

/// A composite annotated slide: parsed identity plus its named layers.
#[derive(Clone, Debug)]
pub struct CompositeSlide {
    pub meta: SlideMeta,
    layers: Vec<NamedLayer>,
}

impl CompositeSlide {
    /// Build from in-memory layers. The identifier must follow the
    /// `{Condition}-Week{N}-{Staining}-{Location}-Animal{ID}` convention.
    pub fn from_layers(identifier: &str, layers: Vec<NamedLayer>) -> Result<Self, String> {
        let meta = SlideMeta::parse(identifier)?;
        Ok(Self { meta, layers })
    }

    /// Build from three co-registered raster files on disk.
    pub fn from_layer_files(
        identifier: &str,
        base: &Path,
        contour: &Path,
        grid: &Path,
    ) -> Result<Self, String> {
        let layers = vec![
            NamedLayer {
                name: "base".to_string(),
                raster: load_rgb_image(base)?,
            },
            NamedLayer {
                name: "roi".to_string(),
                raster: load_rgb_image(contour)?,
            },
            NamedLayer {
                name: "grid".to_string(),
                raster: load_rgb_image(grid)?,
            },
        ];
        Self::from_layers(identifier, layers)
    }

    pub fn layers(&self) -> &[NamedLayer] {
        &self.layers
    }
}

/// The three resolved layers of one slide.
#[derive(Clone, Debug)]
pub struct SlideLayers {
    pub base: RgbRaster,
    pub contour: RgbRaster,
    pub grid: RgbRaster,
}

/// Reasons why layer decomposition may fail. Fatal for the slide: masking
/// is meaningless without all three layers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecomposeError {
    /// No layer claims the role.
    MissingLayer { role: LayerRole },
    /// More than one layer claims the same role.
    LayerAmbiguity {
        role: LayerRole,
        first: String,
        second: String,
    },
    /// A resolved layer does not match the base layer's dimensions.
    DimensionMismatch {
        role: LayerRole,
        expected: (usize, usize),
        found: (usize, usize),
    },
}

impl fmt::Display for DecomposeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecomposeError::MissingLayer { role } => {
                write!(f, "no layer claims the {role} role")
            }
            DecomposeError::LayerAmbiguity {
                role,
                first,
                second,
            } => write!(
                f,
                "layers {first:?} and {second:?} both claim the {role} role"
            ),
            DecomposeError::DimensionMismatch {
                role,
                expected,
                found,
            } => write!(
                f,
                "{role} layer is {}x{}, base is {}x{}",
                found.0, found.1, expected.0, expected.1
            ),
        }
    }
}

impl std::error::Error for DecomposeError {}

/// Split a composite into its three semantic layers.
pub fn decompose(slide: &CompositeSlide) -> Result<SlideLayers, DecomposeError> {
    let mut resolved: [Option<&NamedLayer>; 3] = [None, None, None];
    for layer in slide.layers() {
        let Some(role) = LayerRole::from_name(&layer.name) else {
            continue;
        };
        let slot = &mut resolved[role as usize];
        if let Some(existing) = slot {
            return Err(DecomposeError::LayerAmbiguity {
                role,
                first: existing.name.clone(),
                second: layer.name.clone(),
            });
        }
        *slot = Some(layer);
    }

    for role in LayerRole::ALL {
        if resolved[role as usize].is_none() {
            return Err(DecomposeError::MissingLayer { role });
        }
    }
    let base = resolved[LayerRole::Base as usize].unwrap();
    let contour = resolved[LayerRole::Contour as usize].unwrap();
    let grid = resolved[LayerRole::Grid as usize].unwrap();

    let expected = base.raster.dimensions();
    for (role, layer) in [
        (LayerRole::Contour, contour),
        (LayerRole::Grid, grid),
    ] {
        let found = layer.raster.dimensions();
        if found != expected {
            return Err(DecomposeError::DimensionMismatch {
                role,
                expected,
                found,
            });
        }
    }

    Ok(SlideLayers {
        base: base.raster.clone(),
        contour: contour.raster.clone(),
        grid: grid.raster.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(name: &str, w: usize, h: usize) -> NamedLayer {
        NamedLayer {
            name: name.to_string(),
            raster: RgbRaster::filled(w, h, [255, 255, 255]),
        }
    }

    fn slide(layers: Vec<NamedLayer>) -> CompositeSlide {
        CompositeSlide::from_layers("Test-Week4-HE-Defect-Animal1", layers).unwrap()
    }

    #[test]
    fn resolves_roles_by_name() {
        let s = slide(vec![
            layer("Original", 8, 8),
            layer("ROI", 8, 8),
            layer("Grids", 8, 8),
        ]);
        assert!(decompose(&s).is_ok());
    }

    #[test]
    fn missing_layer_is_fatal() {
        let s = slide(vec![layer("base", 8, 8), layer("roi", 8, 8)]);
        assert!(matches!(
            decompose(&s),
            Err(DecomposeError::MissingLayer {
                role: LayerRole::Grid
            })
        ));
    }

    #[test]
    fn duplicate_role_is_ambiguous() {
        let s = slide(vec![
            layer("base", 8, 8),
            layer("roi", 8, 8),
            layer("contour", 8, 8),
            layer("grid", 8, 8),
        ]);
        assert!(matches!(
            decompose(&s),
            Err(DecomposeError::LayerAmbiguity { .. })
        ));
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let s = slide(vec![
            layer("base", 8, 8),
            layer("roi", 8, 9),
            layer("grid", 8, 8),
        ]);
        assert!(matches!(
            decompose(&s),
            Err(DecomposeError::DimensionMismatch { .. })
        ));
    }
}
