//! Print configuration types.
//!
//! [`PrintObjectConfig`] holds settings shared by every layer of an object
//! (layer heights), [`PrintRegionConfig`] the settings of one print region
//! (shells, infill, extrusion widths).

use crate::{CoordF, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Settings that apply to a whole print object.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintObjectConfig {
    /// Layer height (mm).
    pub layer_height: CoordF,
    /// First layer height (mm).
    pub first_layer_height: CoordF,
    /// Extrusion width override for the first layer (mm), 0 = use the role width.
    pub first_layer_extrusion_width: CoordF,
}

impl PrintObjectConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer_height(mut self, height: CoordF) -> Self {
        self.layer_height = height;
        self
    }

    pub fn first_layer_height(mut self, height: CoordF) -> Self {
        self.first_layer_height = height;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.layer_height > 0.0) {
            return Err(Error::Config("Layer height must be positive".into()));
        }
        if !(self.first_layer_height > 0.0) {
            return Err(Error::Config("First layer height must be positive".into()));
        }
        if self.first_layer_extrusion_width < 0.0 {
            return Err(Error::Config("First layer extrusion width must not be negative".into()));
        }
        Ok(())
    }
}

impl Default for PrintObjectConfig {
    fn default() -> Self {
        Self {
            layer_height: 0.2,
            first_layer_height: 0.2,
            first_layer_extrusion_width: 0.0,
        }
    }
}

impl fmt::Display for PrintObjectConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PrintObjectConfig(layer={:.2}mm, first_layer={:.2}mm)",
            self.layer_height, self.first_layer_height
        )
    }
}

/// Settings of one print region.
///
/// Extrusion widths of 0 select the automatic width for the role.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintRegionConfig {
    /// Number of perimeters/shells.
    pub perimeters: u32,
    /// Number of solid top layers.
    ///
    /// Per layer only zero versus non-zero matters: zero turns top surfaces
    /// into sparse infill. Carrying the skin down into the layers beneath is
    /// left to the surface classifier, which labels those areas
    /// `InternalSolid`.
    pub top_solid_layers: u32,
    /// Number of solid bottom layers. Same per-layer rule as
    /// `top_solid_layers`, for bottom surfaces that are not bridges.
    pub bottom_solid_layers: u32,
    /// Sparse infill density (0.0 - 1.0).
    pub fill_density: CoordF,
    /// Sparse infill pattern.
    pub fill_pattern: InfillPattern,
    /// Base infill angle (degrees).
    pub fill_angle: CoordF,
    /// Infill/perimeter overlap (mm).
    pub infill_overlap: CoordF,
    /// Emit centerlines for walls too thin for a perimeter.
    pub thin_walls: bool,

    pub nozzle_diameter: CoordF,
    pub perimeter_extrusion_width: CoordF,
    pub external_perimeter_extrusion_width: CoordF,
    pub infill_extrusion_width: CoordF,
    pub solid_infill_extrusion_width: CoordF,
    pub top_infill_extrusion_width: CoordF,
    pub support_material_extrusion_width: CoordF,

    /// Bridge thread cross-section relative to the nozzle area.
    pub bridge_flow_ratio: CoordF,
}

impl PrintRegionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn perimeters(mut self, count: u32) -> Self {
        self.perimeters = count;
        self
    }

    pub fn fill_density(mut self, density: CoordF) -> Self {
        self.fill_density = density;
        self
    }

    pub fn fill_pattern(mut self, pattern: InfillPattern) -> Self {
        self.fill_pattern = pattern;
        self
    }

    pub fn solid_layers(mut self, top: u32, bottom: u32) -> Self {
        self.top_solid_layers = top;
        self.bottom_solid_layers = bottom;
        self
    }

    pub fn thin_walls(mut self, enabled: bool) -> Self {
        self.thin_walls = enabled;
        self
    }

    pub fn nozzle_diameter(mut self, diameter: CoordF) -> Self {
        self.nozzle_diameter = diameter;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.nozzle_diameter > 0.0) {
            return Err(Error::Config("Nozzle diameter must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.fill_density) {
            return Err(Error::Config(format!(
                "Fill density must be within 0..1, got {}",
                self.fill_density
            )));
        }
        if !(self.bridge_flow_ratio > 0.0) {
            return Err(Error::Config("Bridge flow ratio must be positive".into()));
        }
        let widths = [
            self.perimeter_extrusion_width,
            self.external_perimeter_extrusion_width,
            self.infill_extrusion_width,
            self.solid_infill_extrusion_width,
            self.top_infill_extrusion_width,
            self.support_material_extrusion_width,
        ];
        if widths.iter().any(|w| *w < 0.0) {
            return Err(Error::Config("Extrusion widths must not be negative".into()));
        }
        Ok(())
    }
}

impl Default for PrintRegionConfig {
    fn default() -> Self {
        Self {
            perimeters: 3,
            top_solid_layers: 4,
            bottom_solid_layers: 3,
            fill_density: 0.2,
            fill_pattern: InfillPattern::Grid,
            fill_angle: 45.0,
            infill_overlap: 0.1,
            thin_walls: true,
            nozzle_diameter: 0.4,
            perimeter_extrusion_width: 0.45,
            external_perimeter_extrusion_width: 0.45,
            infill_extrusion_width: 0.45,
            solid_infill_extrusion_width: 0.45,
            top_infill_extrusion_width: 0.4,
            support_material_extrusion_width: 0.4,
            bridge_flow_ratio: 1.0,
        }
    }
}

impl fmt::Display for PrintRegionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PrintRegionConfig(perimeters={}, infill={:.0}%, pattern={:?})",
            self.perimeters,
            self.fill_density * 100.0,
            self.fill_pattern
        )
    }
}

/// Sparse infill pattern.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InfillPattern {
    /// Parallel lines, alternating direction per layer.
    Rectilinear,
    /// Crossing lines on every layer.
    #[default]
    Grid,
    /// Nested inward offsets of the boundary.
    Concentric,
}
