//! Layers and their regions.
//!
//! - [`Layer`] - one Z slab, owning a [`LayerRegion`] per print region
//! - [`SupportLayer`] - a slab of support material
//! - [`Surface`] / [`SurfaceCollection`] - typed areas of a region
//! - [`MeshSlicer`] / [`SurfaceClassifier`] - the inputs a layer is built from

mod layer;
mod layer_region;
mod source;
mod support_layer;
mod surface;

pub use layer::{Layer, LayerStage};
pub use layer_region::{LayerRegion, PerimeterStats};
pub use source::{repair_polygons, MeshSlicer, RawSlices};
pub use support_layer::SupportLayer;
pub use surface::{
    ExposureClassifier, Surface, SurfaceClassifier, SurfaceCollection, SurfaceType, Surfaces,
};
