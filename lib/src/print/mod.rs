//! Print objects: the arena that owns layers and keeps their links.
//!
//! Layers refer to their neighbours by index only. [`PrintObject`] is the
//! single place those indices are assigned, so adding or reordering layers
//! always goes through it.

use crate::config::{PrintObjectConfig, PrintRegionConfig};
use crate::slice::{Layer, SupportLayer};
use crate::{CoordF, Error, Result};
use log::debug;
use std::cmp::Ordering;
use std::sync::Arc;

/// Heights closer than this are treated as equal (mm).
const Z_EPSILON: CoordF = 1e-6;

/// A print region: an id and its shared settings.
#[derive(Debug, Clone)]
pub struct PrintRegion {
    pub id: usize,
    pub config: Arc<PrintRegionConfig>,
}

/// Read access to either kind of layer, for consumers that walk the
/// whole print in Z order.
#[derive(Debug, Clone, Copy)]
pub enum LayerRef<'a> {
    Object(&'a Layer),
    Support(&'a SupportLayer),
}

impl LayerRef<'_> {
    pub fn id(&self) -> usize {
        match self {
            LayerRef::Object(l) => l.id(),
            LayerRef::Support(l) => l.id(),
        }
    }

    pub fn print_z(&self) -> CoordF {
        match self {
            LayerRef::Object(l) => l.print_z(),
            LayerRef::Support(l) => l.print_z(),
        }
    }

    pub fn has_extrusions(&self) -> bool {
        match self {
            LayerRef::Object(l) => l.has_extrusions(),
            LayerRef::Support(l) => l.has_extrusions(),
        }
    }

    pub fn is_support(&self) -> bool {
        matches!(self, LayerRef::Support(_))
    }
}

fn compare_layers(a: &LayerRef<'_>, b: &LayerRef<'_>) -> Ordering {
    a.print_z()
        .total_cmp(&b.print_z())
        .then(a.is_support().cmp(&b.is_support()))
}

/// An owned layer of either kind, as handed out by [`PrintObject::into_layers`].
#[derive(Debug, Clone)]
pub enum LayerKind {
    Object(Layer),
    Support(SupportLayer),
}

impl LayerKind {
    pub fn as_layer_ref(&self) -> LayerRef<'_> {
        match self {
            LayerKind::Object(l) => LayerRef::Object(l),
            LayerKind::Support(l) => LayerRef::Support(l),
        }
    }

    pub fn print_z(&self) -> CoordF {
        self.as_layer_ref().print_z()
    }

    pub fn has_extrusions(&self) -> bool {
        self.as_layer_ref().has_extrusions()
    }
}

/// One sliced object.
#[derive(Debug, Clone)]
pub struct PrintObject {
    config: PrintObjectConfig,
    regions: Vec<PrintRegion>,
    layers: Vec<Layer>,
    support_layers: Vec<SupportLayer>,
}

impl PrintObject {
    pub fn new(config: PrintObjectConfig, region_configs: Vec<PrintRegionConfig>) -> Self {
        let regions = region_configs
            .into_iter()
            .enumerate()
            .map(|(id, config)| PrintRegion {
                id,
                config: Arc::new(config),
            })
            .collect();
        Self {
            config,
            regions,
            layers: Vec::new(),
            support_layers: Vec::new(),
        }
    }

    pub fn config(&self) -> &PrintObjectConfig {
        &self.config
    }

    pub fn regions(&self) -> &[PrintRegion] {
        &self.regions
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, idx: usize) -> Option<&Layer> {
        self.layers.get(idx)
    }

    pub fn layer_mut(&mut self, idx: usize) -> Option<&mut Layer> {
        self.layers.get_mut(idx)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn support_layers(&self) -> &[SupportLayer] {
        &self.support_layers
    }

    pub fn support_layer_mut(&mut self, idx: usize) -> Option<&mut SupportLayer> {
        self.support_layers.get_mut(idx)
    }

    /// Replace the layers with a fresh stack covering `object_height`.
    ///
    /// The first layer uses `first_layer_height`, the rest `layer_height`;
    /// the top layer is clamped to the object. Every layer gets one region
    /// per print region, sliced through the middle of its slab.
    pub fn generate_layers(&mut self, object_height: CoordF) -> Result<usize> {
        self.config.validate()?;
        for region in &self.regions {
            region.config.validate()?;
        }
        if !(object_height > 0.0) {
            return Err(Error::Config(format!("Object height must be positive, got {object_height}")));
        }

        let first_width = (self.config.first_layer_extrusion_width > 0.0)
            .then_some(self.config.first_layer_extrusion_width);
        let mut layers = Vec::new();
        let mut z = 0.0;
        while object_height - z > Z_EPSILON {
            let nominal = if layers.is_empty() {
                self.config.first_layer_height
            } else {
                self.config.layer_height
            };
            let height = nominal.min(object_height - z);
            let print_z = z + height;
            let mut layer = Layer::new(layers.len(), print_z - height / 2.0, print_z, height);
            for region in &self.regions {
                let layer_region = layer.add_region(Arc::clone(&region.config));
                if layers.is_empty() {
                    layer_region.set_first_layer_width(first_width);
                }
            }
            layers.push(layer);
            z = print_z;
        }

        debug!("generated {} layers for {:.3}mm object", layers.len(), object_height);
        self.layers = layers;
        self.update_layer_links();
        Ok(self.layers.len())
    }

    /// Re-derive neighbour links and ids from index order.
    pub fn update_layer_links(&mut self) {
        let n = self.layers.len();
        for (idx, layer) in self.layers.iter_mut().enumerate() {
            layer.set_id(idx);
            layer.set_lower_layer_id(idx.checked_sub(1));
            layer.set_upper_layer_id((idx + 1 < n).then_some(idx + 1));
        }
        let n = self.support_layers.len();
        for (idx, layer) in self.support_layers.iter_mut().enumerate() {
            let layer = layer.layer_mut();
            layer.set_id(idx);
            layer.set_lower_layer_id(idx.checked_sub(1));
            layer.set_upper_layer_id((idx + 1 < n).then_some(idx + 1));
        }
    }

    /// Insert a support layer in Z order and return its index.
    pub fn add_support_layer(&mut self, print_z: CoordF, height: CoordF) -> Result<usize> {
        if !(height > 0.0) {
            return Err(Error::Config(format!("Support layer height must be positive, got {height}")));
        }
        let idx = self
            .support_layers
            .partition_point(|l| l.print_z() <= print_z + Z_EPSILON);
        self.support_layers
            .insert(idx, SupportLayer::new(idx, print_z - height / 2.0, print_z, height));
        self.update_layer_links();
        Ok(idx)
    }

    /// Every layer, object and support, ordered by `print_z`.
    ///
    /// On equal heights the object layer comes first.
    pub fn all_layers(&self) -> Vec<LayerRef<'_>> {
        let mut all: Vec<LayerRef<'_>> = self
            .layers
            .iter()
            .map(LayerRef::Object)
            .chain(self.support_layers.iter().map(LayerRef::Support))
            .collect();
        all.sort_by(compare_layers);
        all
    }

    /// Consume the object, yielding every layer in `print_z` order.
    pub fn into_layers(self) -> Vec<LayerKind> {
        let mut all: Vec<LayerKind> = self
            .layers
            .into_iter()
            .map(LayerKind::Object)
            .chain(self.support_layers.into_iter().map(LayerKind::Support))
            .collect();
        all.sort_by(|a, b| compare_layers(&a.as_layer_ref(), &b.as_layer_ref()));
        all
    }

    /// Swap in a processed stack. The count must match.
    pub(crate) fn commit_layers(&mut self, layers: Vec<Layer>) -> Result<()> {
        if layers.len() != self.layers.len() {
            return Err(Error::Geometry(format!(
                "Expected {} layers, got {}",
                self.layers.len(),
                layers.len()
            )));
        }
        self.layers = layers;
        Ok(())
    }
}
