//! Extrusion entities.
//!
//! Perimeter and infill generation produce geometry; this module wraps that
//! geometry with the extrusion role and cross-section it will be printed
//! with. Entities nest: a [`ExtrusionEntityCollection`] holds paths, loops
//! and further collections, and its order is the print order.

use crate::flow::Flow;
use crate::geometry::{Point, Polygon, Polyline};
use crate::{unscale, Coord, CoordF};
use std::f64::consts::PI;

/// Type of extrusion for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtrusionRole {
    ExternalPerimeter,
    Perimeter,
    /// Sparse infill.
    InternalInfill,
    SolidInfill,
    /// Solid infill on a visible top surface.
    TopSolidInfill,
    BridgeInfill,
    /// Centerline of a wall too thin for a perimeter loop.
    ThinWall,
    SupportMaterial,
    SupportMaterialInterface,
    SupportMaterialContact,
}

impl ExtrusionRole {
    pub fn is_perimeter(&self) -> bool {
        matches!(self, ExtrusionRole::ExternalPerimeter | ExtrusionRole::Perimeter)
    }

    pub fn is_infill(&self) -> bool {
        matches!(
            self,
            ExtrusionRole::InternalInfill
                | ExtrusionRole::SolidInfill
                | ExtrusionRole::TopSolidInfill
                | ExtrusionRole::BridgeInfill
        )
    }

    pub fn is_support(&self) -> bool {
        matches!(
            self,
            ExtrusionRole::SupportMaterial
                | ExtrusionRole::SupportMaterialInterface
                | ExtrusionRole::SupportMaterialContact
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExtrusionRole::ExternalPerimeter => "external perimeter",
            ExtrusionRole::Perimeter => "perimeter",
            ExtrusionRole::InternalInfill => "internal infill",
            ExtrusionRole::SolidInfill => "solid infill",
            ExtrusionRole::TopSolidInfill => "top solid infill",
            ExtrusionRole::BridgeInfill => "bridge infill",
            ExtrusionRole::ThinWall => "thin wall",
            ExtrusionRole::SupportMaterial => "support material",
            ExtrusionRole::SupportMaterialInterface => "support interface",
            ExtrusionRole::SupportMaterialContact => "support contact",
        }
    }
}

/// An open extrusion path with a fixed cross-section.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtrusionPath {
    pub polyline: Polyline,
    pub role: ExtrusionRole,
    /// Extrusion width (mm).
    pub width: CoordF,
    /// Extrusion height (mm).
    pub height: CoordF,
    pub bridge: bool,
}

impl ExtrusionPath {
    pub fn new(polyline: Polyline, role: ExtrusionRole, flow: &Flow) -> Self {
        Self {
            polyline,
            role,
            width: flow.width(),
            height: flow.height(),
            bridge: flow.is_bridge(),
        }
    }

    pub fn first_point(&self) -> Option<Point> {
        self.polyline.first_point()
    }

    pub fn last_point(&self) -> Option<Point> {
        self.polyline.last_point()
    }

    pub fn length_mm(&self) -> CoordF {
        unscale(self.polyline.length() as Coord)
    }

    /// Cross-section in mm²: a circle for bridges, a rounded rectangle otherwise.
    pub fn cross_section_area(&self) -> CoordF {
        if self.bridge {
            self.width * self.width * 0.25 * PI
        } else {
            self.height * (self.width - self.height * (1.0 - 0.25 * PI))
        }
    }

    pub fn reverse(&mut self) {
        self.polyline.reverse();
    }
}

/// A closed extrusion loop.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtrusionLoop {
    pub path: ExtrusionPath,
    /// Outer boundary of its island (false for hole loops).
    pub is_contour: bool,
}

impl ExtrusionLoop {
    pub fn new(polygon: &Polygon, role: ExtrusionRole, flow: &Flow, is_contour: bool) -> Self {
        Self {
            path: ExtrusionPath::new(Polyline::from_polygon(polygon), role, flow),
            is_contour,
        }
    }

    pub fn role(&self) -> ExtrusionRole {
        self.path.role
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtrusionEntity {
    Path(ExtrusionPath),
    Loop(ExtrusionLoop),
    Collection(ExtrusionEntityCollection),
}

impl ExtrusionEntity {
    /// Role of the entity; the first role found for a collection.
    pub fn role(&self) -> Option<ExtrusionRole> {
        match self {
            ExtrusionEntity::Path(p) => Some(p.role),
            ExtrusionEntity::Loop(l) => Some(l.role()),
            ExtrusionEntity::Collection(c) => c.entities.iter().find_map(|e| e.role()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ExtrusionEntity::Path(p) => !p.polyline.is_valid(),
            ExtrusionEntity::Loop(l) => !l.path.polyline.is_valid(),
            ExtrusionEntity::Collection(c) => c.is_empty(),
        }
    }
}

impl From<ExtrusionPath> for ExtrusionEntity {
    fn from(path: ExtrusionPath) -> Self {
        ExtrusionEntity::Path(path)
    }
}

impl From<ExtrusionLoop> for ExtrusionEntity {
    fn from(l: ExtrusionLoop) -> Self {
        ExtrusionEntity::Loop(l)
    }
}

impl From<ExtrusionEntityCollection> for ExtrusionEntity {
    fn from(c: ExtrusionEntityCollection) -> Self {
        ExtrusionEntity::Collection(c)
    }
}

/// Ordered collection of extrusion entities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtrusionEntityCollection {
    pub entities: Vec<ExtrusionEntity>,
    /// The order is binding and must not be re-sorted downstream.
    pub no_sort: bool,
}

impl ExtrusionEntityCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ordered() -> Self {
        Self {
            entities: Vec::new(),
            no_sort: true,
        }
    }

    /// Append an entity; empty entities are dropped.
    pub fn push(&mut self, entity: impl Into<ExtrusionEntity>) {
        let entity = entity.into();
        if !entity.is_empty() {
            self.entities.push(entity);
        }
    }

    pub fn append(&mut self, other: ExtrusionEntityCollection) {
        self.entities.extend(other.entities);
    }

    pub fn is_empty(&self) -> bool {
        self.entities.iter().all(|e| e.is_empty())
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExtrusionEntity> {
        self.entities.iter()
    }

    /// All leaf paths in print order.
    pub fn flatten(&self) -> Vec<&ExtrusionPath> {
        let mut out = Vec::new();
        collect_paths(self, &mut out);
        out
    }

    pub fn total_length_mm(&self) -> CoordF {
        self.flatten().iter().map(|p| p.length_mm()).sum()
    }
}

fn collect_paths<'a>(c: &'a ExtrusionEntityCollection, out: &mut Vec<&'a ExtrusionPath>) {
    for e in &c.entities {
        match e {
            ExtrusionEntity::Path(p) => out.push(p),
            ExtrusionEntity::Loop(l) => out.push(&l.path),
            ExtrusionEntity::Collection(inner) => collect_paths(inner, out),
        }
    }
}
