//! # Slicer core
//!
//! The per-layer geometry pipeline of an FDM slicer.
//!
//! Given the cross-sections of a model, this crate:
//! - classifies each layer region's slices into top, bottom and internal surfaces
//! - merges regions into islands and orders them for travel
//! - corrects bottom surfaces against the layer below (bridges, unsupported edges)
//! - generates perimeters, thin walls and fill surfaces
//! - generates infill
//! - holds support layer geometry
//!
//! Mesh slicing, surface classification and the flow model are consumed
//! through the [`MeshSlicer`], [`SurfaceClassifier`] and [`Flow`] seams.
//!
//! ## Example
//!
//! ```rust,ignore
//! use slicer_core::{Pipeline, PipelineConfig, PrintObject, ExposureClassifier};
//!
//! let mut object = PrintObject::new(object_config, vec![region_config]);
//! object.generate_layers(10.0)?;
//! let report = Pipeline::new(PipelineConfig::new()).run(&mut object, &mesh_slicer, &ExposureClassifier::default())?;
//! ```

pub mod bridge;
pub mod clipper;
pub mod config;
pub mod extrusion;
pub mod flow;
pub mod geometry;
pub mod infill;
pub mod perimeter;
pub mod pipeline;
pub mod print;
pub mod slice;

pub use config::{InfillPattern, PrintObjectConfig, PrintRegionConfig};
pub use extrusion::{
    ExtrusionEntity, ExtrusionEntityCollection, ExtrusionLoop, ExtrusionPath, ExtrusionRole,
};
pub use flow::{Flow, FlowError, FlowResult, FlowRole, BRIDGE_EXTRA_SPACING};
pub use geometry::{BoundingBox, ExPolygon, ExPolygons, Line, Point, Polygon, Polygons, Polyline};
pub use pipeline::{CancellationToken, Pipeline, PipelineConfig, PipelineReport};
pub use print::{LayerKind, LayerRef, PrintObject, PrintRegion};
pub use slice::{
    ExposureClassifier, Layer, LayerRegion, LayerStage, MeshSlicer, PerimeterStats, RawSlices,
    SupportLayer, Surface, SurfaceClassifier, SurfaceCollection, SurfaceType,
};

/// Coordinate type used throughout the slicer.
/// Integer coordinates scaled by SCALING_FACTOR.
pub type Coord = i64;

/// Floating-point coordinate type for unscaled values.
pub type CoordF = f64;

/// 1 unit = 1 nanometer, so 1mm = 1_000_000 units.
pub const SCALING_FACTOR: f64 = 1_000_000.0;

#[inline]
pub fn scale(v: CoordF) -> Coord {
    (v * SCALING_FACTOR).round() as Coord
}

#[inline]
pub fn unscale(v: Coord) -> CoordF {
    v as CoordF / SCALING_FACTOR
}

#[inline]
pub fn scaled(v: CoordF) -> Coord {
    scale(v)
}

#[inline]
pub fn unscaled(v: Coord) -> CoordF {
    unscale(v)
}

/// Result type used throughout the slicer.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for slicer operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Flow error: {0}")]
    Flow(#[from] FlowError),

    #[error("Invalid geometry: {0}")]
    Geometry(String),

    /// A layer operation was called out of order.
    #[error("Layer {layer_id}: {operation} requires stage {required:?}, layer is at {actual:?}")]
    Stage {
        layer_id: usize,
        operation: &'static str,
        required: LayerStage,
        actual: LayerStage,
    },

    /// Unrecoverable failure while processing one layer.
    #[error("Layer {layer_id} (z={print_z:.3}mm) failed: {reason}")]
    LayerFailed {
        layer_id: usize,
        print_z: CoordF,
        reason: String,
    },

    #[error("Cancelled")]
    Cancelled,
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
