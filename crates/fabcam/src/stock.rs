//! Raw material stock.

use fabcam_math::BoundingBox;
use serde::{Deserialize, Serialize};

use crate::error::{FabError, Result};

/// A kind of raw stock: sheet or bar cut to whole size increments from a
/// fixed set of thicknesses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Stock {
    /// Stock name.
    pub name: String,
    /// X and Y sizes are whole multiples of this (mm).
    pub size_increment: f64,
    /// Available thicknesses, ascending (mm).
    pub thickness_increments: Vec<f64>,
    /// Material left around the part on every side (mm).
    pub minimum_cut: f64,
}

impl Stock {
    /// Create a stock kind, sorting the thicknesses.
    pub fn new(
        name: impl Into<String>,
        size_increment: f64,
        thicknesses: impl IntoIterator<Item = f64>,
        minimum_cut: f64,
    ) -> Result<Self> {
        let name = name.into();
        if !(size_increment.is_finite() && size_increment > 0.0) {
            return Err(FabError::schema(&name, "size_increment", "must be positive"));
        }
        if !(minimum_cut.is_finite() && minimum_cut >= 0.0) {
            return Err(FabError::schema(&name, "minimum_cut", "must not be negative"));
        }
        let mut thickness_increments: Vec<f64> = thicknesses.into_iter().collect();
        if thickness_increments.is_empty() || thickness_increments.iter().any(|t| !(t.is_finite() && *t > 0.0)) {
            return Err(FabError::schema(&name, "thickness_increments", "must be a non-empty list of positive thicknesses"));
        }
        thickness_increments.sort_by(f64::total_cmp);
        Ok(Self {
            name,
            size_increment,
            thickness_increments,
            minimum_cut,
        })
    }

    /// Stock size `[x, y, z]` that encloses `bounds`.
    ///
    /// X and Y get the minimum cut on both sides and round up to the size
    /// increment. Z takes the thinnest stock covering the part plus one
    /// minimum cut.
    pub fn envelope(&self, bounds: &BoundingBox) -> Result<[f64; 3]> {
        if bounds.is_empty() {
            return Err(FabError::schema(&self.name, "bounds", "solid has no extruded material"));
        }
        let [x, y, z] = bounds.size();
        let round_up = |extent: f64| (extent / self.size_increment).ceil() * self.size_increment;
        let width = round_up(x + 2.0 * self.minimum_cut);
        let length = round_up(y + 2.0 * self.minimum_cut);
        let needed = z + self.minimum_cut;
        let thickness = self
            .thickness_increments
            .iter()
            .copied()
            .find(|t| *t >= needed)
            .ok_or_else(|| FabError::schema(&self.name, "thickness_increments", format!("none covers {needed} mm")))?;
        Ok([width, length, thickness])
    }
}
