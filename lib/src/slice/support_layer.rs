//! Layers carrying only support geometry.

use crate::extrusion::{ExtrusionEntity, ExtrusionEntityCollection, ExtrusionRole};
use crate::geometry::ExPolygons;
use crate::slice::layer::Layer;
use crate::CoordF;

/// Print priority of a support extrusion: base, then interface, then contact.
fn support_priority(entity: &ExtrusionEntity) -> u8 {
    match entity.role() {
        Some(ExtrusionRole::SupportMaterialInterface) => 1,
        Some(ExtrusionRole::SupportMaterialContact) => 2,
        _ => 0,
    }
}

/// A layer of support material.
///
/// The generic layer data is kept for its Z placement and links; the
/// support geometry itself is produced elsewhere and stored here.
#[derive(Debug, Clone)]
pub struct SupportLayer {
    layer: Layer,
    pub support_islands: ExPolygons,
    support_fills: ExtrusionEntityCollection,
}

impl SupportLayer {
    pub fn new(id: usize, slice_z: CoordF, print_z: CoordF, height: CoordF) -> Self {
        Self {
            layer: Layer::new(id, slice_z, print_z, height),
            support_islands: Vec::new(),
            support_fills: ExtrusionEntityCollection::ordered(),
        }
    }

    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    pub(crate) fn layer_mut(&mut self) -> &mut Layer {
        &mut self.layer
    }

    pub fn id(&self) -> usize {
        self.layer.id()
    }

    pub fn print_z(&self) -> CoordF {
        self.layer.print_z()
    }

    pub fn support_fills(&self) -> &ExtrusionEntityCollection {
        &self.support_fills
    }

    /// Insert after every entity of equal or higher priority.
    pub fn push_fill(&mut self, entity: impl Into<ExtrusionEntity>) {
        let entity = entity.into();
        if entity.is_empty() {
            return;
        }
        let priority = support_priority(&entity);
        let pos = self
            .support_fills
            .entities
            .iter()
            .position(|e| support_priority(e) > priority)
            .unwrap_or(self.support_fills.entities.len());
        self.support_fills.entities.insert(pos, entity);
    }

    pub fn clear_fills(&mut self) {
        self.support_fills.clear();
    }

    /// Only support fills count; a support layer has no regions to print.
    pub fn has_extrusions(&self) -> bool {
        !self.support_fills.is_empty()
    }
}
