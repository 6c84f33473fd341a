//! Extrusion flow model.
//!
//! A [`Flow`] describes the cross-section of one extruded line: its width,
//! its height and the centre-to-centre spacing of adjacent lines. Regular
//! extrusions are modelled as a rectangle with semicircular ends; bridges
//! as a circle of the nozzle diameter.

use crate::{scale, Coord, CoordF};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Extra gap between adjacent bridge threads, in mm.
pub const BRIDGE_EXTRA_SPACING: CoordF = 0.05;

/// Auto extrusion width as a multiple of the nozzle diameter.
const AUTO_WIDTH_FACTOR: CoordF = 1.125;

pub type FlowResult<T> = std::result::Result<T, FlowError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FlowError {
    #[error("Flow::spacing() produced negative spacing for width {width} and height {height}")]
    NegativeSpacing { width: CoordF, height: CoordF },

    #[error("Flow::mm3_per_mm() produced negative flow for width {width} and height {height}")]
    NegativeFlow { width: CoordF, height: CoordF },

    #[error("Invalid flow parameter: {0}")]
    InvalidArgument(String),
}

/// The extrusion role a flow is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowRole {
    ExternalPerimeter,
    Perimeter,
    Infill,
    SolidInfill,
    TopSolidInfill,
    SupportMaterial,
    SupportMaterialInterface,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    width: CoordF,
    height: CoordF,
    spacing: CoordF,
    nozzle_diameter: CoordF,
    bridge: bool,
}

impl Flow {
    /// Regular (non-bridge) flow.
    pub fn new(width: CoordF, height: CoordF, nozzle_diameter: CoordF) -> FlowResult<Self> {
        if !(width > 0.0) || !(height > 0.0) || !(nozzle_diameter > 0.0) {
            return Err(FlowError::InvalidArgument(format!(
                "width={width}, height={height}, nozzle={nozzle_diameter}"
            )));
        }
        Ok(Self {
            width,
            height,
            spacing: Self::rounded_rectangle_extrusion_spacing(width, height)?,
            nozzle_diameter,
            bridge: false,
        })
    }

    /// Circular bridge thread of diameter `dmr`.
    pub fn bridging_flow(dmr: CoordF, nozzle_diameter: CoordF) -> FlowResult<Self> {
        if !(dmr > 0.0) {
            return Err(FlowError::InvalidArgument(format!("bridge diameter {dmr}")));
        }
        Ok(Self {
            width: dmr,
            height: dmr,
            spacing: dmr + BRIDGE_EXTRA_SPACING,
            nozzle_diameter,
            bridge: true,
        })
    }

    /// Build a flow for `role` from a configured width; `0.0` selects the automatic width.
    pub fn new_from_config_width(
        role: FlowRole,
        width: CoordF,
        nozzle_diameter: CoordF,
        height: CoordF,
    ) -> FlowResult<Self> {
        if width < 0.0 {
            return Err(FlowError::InvalidArgument(format!("negative width {width}")));
        }
        let w = if width == 0.0 {
            Self::auto_extrusion_width(role, nozzle_diameter)
        } else {
            width
        };
        Self::new(w, height, nozzle_diameter)
    }

    pub fn auto_extrusion_width(role: FlowRole, nozzle_diameter: CoordF) -> CoordF {
        match role {
            FlowRole::SupportMaterial | FlowRole::SupportMaterialInterface | FlowRole::TopSolidInfill => {
                nozzle_diameter
            }
            _ => AUTO_WIDTH_FACTOR * nozzle_diameter,
        }
    }

    /// `width - height * (1 - PI/4)`.
    pub fn rounded_rectangle_extrusion_spacing(width: CoordF, height: CoordF) -> FlowResult<CoordF> {
        let spacing = width - height * (1.0 - 0.25 * PI);
        if spacing <= 0.0 {
            return Err(FlowError::NegativeSpacing { width, height });
        }
        Ok(spacing)
    }

    /// Same flow with a different width, spacing recomputed.
    pub fn with_width(&self, width: CoordF) -> FlowResult<Self> {
        if self.bridge {
            Self::bridging_flow(width, self.nozzle_diameter)
        } else {
            Self::new(width, self.height, self.nozzle_diameter)
        }
    }

    /// Extruded volume per mm of path.
    pub fn mm3_per_mm(&self) -> FlowResult<CoordF> {
        let v = if self.bridge {
            self.width * self.width * 0.25 * PI
        } else {
            self.height * (self.width - self.height * (1.0 - 0.25 * PI))
        };
        if v <= 0.0 {
            return Err(FlowError::NegativeFlow {
                width: self.width,
                height: self.height,
            });
        }
        Ok(v)
    }

    #[inline]
    pub fn width(&self) -> CoordF {
        self.width
    }

    #[inline]
    pub fn height(&self) -> CoordF {
        self.height
    }

    #[inline]
    pub fn spacing(&self) -> CoordF {
        self.spacing
    }

    #[inline]
    pub fn nozzle_diameter(&self) -> CoordF {
        self.nozzle_diameter
    }

    #[inline]
    pub fn is_bridge(&self) -> bool {
        self.bridge
    }

    #[inline]
    pub fn scaled_width(&self) -> Coord {
        scale(self.width)
    }

    #[inline]
    pub fn scaled_spacing(&self) -> Coord {
        scale(self.spacing)
    }
}
