//! Production settings.

use std::path::Path;

use fabcam_math::Tolerance;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Knobs for a production run, loadable from TOML.
///
/// ```
/// use fabcam::ProductionSettings;
///
/// let settings = ProductionSettings::from_toml_str("hash_text_length = 12")?;
/// assert_eq!(settings.hash_text_length, 12);
/// assert!(settings.reuse_unchanged);
/// # Ok::<(), fabcam::FabError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProductionSettings {
    /// Largest sine of the angle between a join axis and a mount normal
    /// still treated as collinear.
    pub collinear_tolerance: f64,
    /// Distance below which two points coincide (mm).
    pub linear_tolerance: f64,
    /// Hex digits kept by `Solid::hash_text`.
    pub hash_text_length: usize,
    /// Reuse kernel output from the previous run when an operation's build
    /// key is unchanged.
    pub reuse_unchanged: bool,
}

impl Default for ProductionSettings {
    fn default() -> Self {
        Self {
            collinear_tolerance: Tolerance::DEFAULT.collinear,
            linear_tolerance: Tolerance::DEFAULT.linear,
            hash_text_length: 16,
            reuse_unchanged: true,
        }
    }
}

impl ProductionSettings {
    /// Parse settings from TOML text; missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Geometric tolerances for this run.
    pub fn tolerance(&self) -> Tolerance {
        Tolerance {
            linear: self.linear_tolerance,
            collinear: self.collinear_tolerance,
        }
    }
}
