//! Classified surfaces of a layer region.
//!
//! A [`Surface`] is one ExPolygon tagged with how it is exposed: facing up
//! (top), facing down (bottom), spanning air (bridge), or enclosed
//! (internal). Classification itself sits behind the
//! [`SurfaceClassifier`] trait; [`ExposureClassifier`] compares a slice with
//! the slices directly above and below.

use crate::clipper::{difference, opening, union, OffsetJoinType};
use crate::geometry::{ExPolygon, ExPolygons};
use crate::CoordF;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a surface within a layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SurfaceType {
    /// Visible from above.
    Top,
    /// Visible from below, resting on the bed or on the layer below.
    Bottom,
    /// Visible from below and spanning air.
    BottomBridge,
    /// Solid infill between skins.
    InternalSolid,
    /// Sparse infill.
    #[default]
    Internal,
    /// Empty interior, no infill.
    InternalVoid,
}

impl SurfaceType {
    /// Every variant, in stacking order from top to void.
    pub const ALL: [SurfaceType; 6] = [
        SurfaceType::Top,
        SurfaceType::Bottom,
        SurfaceType::BottomBridge,
        SurfaceType::InternalSolid,
        SurfaceType::Internal,
        SurfaceType::InternalVoid,
    ];

    #[inline]
    pub fn is_top(&self) -> bool {
        matches!(self, SurfaceType::Top)
    }

    #[inline]
    pub fn is_bottom(&self) -> bool {
        matches!(self, SurfaceType::Bottom | SurfaceType::BottomBridge)
    }

    #[inline]
    pub fn is_bridge(&self) -> bool {
        matches!(self, SurfaceType::BottomBridge)
    }

    /// Needs 100% infill.
    #[inline]
    pub fn is_solid(&self) -> bool {
        matches!(
            self,
            SurfaceType::Top | SurfaceType::Bottom | SurfaceType::BottomBridge | SurfaceType::InternalSolid
        )
    }

    #[inline]
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            SurfaceType::Internal | SurfaceType::InternalSolid | SurfaceType::InternalVoid
        )
    }

    #[inline]
    pub fn is_external(&self) -> bool {
        !self.is_internal()
    }

    pub fn name(&self) -> &'static str {
        match self {
            SurfaceType::Top => "top",
            SurfaceType::Bottom => "bottom",
            SurfaceType::BottomBridge => "bottom bridge",
            SurfaceType::InternalSolid => "internal solid",
            SurfaceType::Internal => "internal",
            SurfaceType::InternalVoid => "internal void",
        }
    }
}

impl fmt::Display for SurfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A classified region within a layer.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    pub expolygon: ExPolygon,
    pub surface_type: SurfaceType,
    /// Bridge direction in radians, set once a bridge angle has been detected.
    pub bridge_angle: Option<CoordF>,
}

impl Surface {
    pub fn new(expolygon: ExPolygon, surface_type: SurfaceType) -> Self {
        Self {
            expolygon,
            surface_type,
            bridge_angle: None,
        }
    }

    pub fn top(expolygon: ExPolygon) -> Self {
        Self::new(expolygon, SurfaceType::Top)
    }

    pub fn bottom(expolygon: ExPolygon) -> Self {
        Self::new(expolygon, SurfaceType::Bottom)
    }

    pub fn internal(expolygon: ExPolygon) -> Self {
        Self::new(expolygon, SurfaceType::Internal)
    }

    pub fn bridge(expolygon: ExPolygon, angle: Option<CoordF>) -> Self {
        Self {
            expolygon,
            surface_type: SurfaceType::BottomBridge,
            bridge_angle: angle,
        }
    }

    /// Same type and bridge angle as `template`, new geometry.
    pub fn with_template(template: &Surface, expolygon: ExPolygon) -> Self {
        Self {
            expolygon,
            surface_type: template.surface_type,
            bridge_angle: template.bridge_angle,
        }
    }

    #[inline]
    pub fn area(&self) -> CoordF {
        self.expolygon.area()
    }

    #[inline]
    pub fn is_top(&self) -> bool {
        self.surface_type.is_top()
    }

    #[inline]
    pub fn is_bottom(&self) -> bool {
        self.surface_type.is_bottom()
    }

    #[inline]
    pub fn is_bridge(&self) -> bool {
        self.surface_type.is_bridge()
    }

    #[inline]
    pub fn is_solid(&self) -> bool {
        self.surface_type.is_solid()
    }

    #[inline]
    pub fn is_external(&self) -> bool {
        self.surface_type.is_external()
    }

    /// Surfaces that may be merged into one another.
    #[inline]
    pub fn is_compatible(&self, other: &Surface) -> bool {
        self.surface_type == other.surface_type && self.bridge_angle == other.bridge_angle
    }
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Surface({:?}, area={:.2}mm²)", self.surface_type, self.area() * 1e-12)
    }
}

pub type Surfaces = Vec<Surface>;

/// Collection of surfaces with grouping helpers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfaceCollection {
    pub surfaces: Vec<Surface>,
}

impl SurfaceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_surfaces(surfaces: Vec<Surface>) -> Self {
        Self { surfaces }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn push(&mut self, surface: Surface) {
        self.surfaces.push(surface);
    }

    pub fn clear(&mut self) {
        self.surfaces.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Surface> {
        self.surfaces.iter()
    }

    pub fn filter_by_type(&self, surface_type: SurfaceType) -> Vec<&Surface> {
        self.surfaces.iter().filter(|s| s.surface_type == surface_type).collect()
    }

    pub fn has_type(&self, surface_type: SurfaceType) -> bool {
        self.surfaces.iter().any(|s| s.surface_type == surface_type)
    }

    /// Geometry of every surface, classification dropped.
    pub fn expolygons(&self) -> ExPolygons {
        self.surfaces.iter().map(|s| s.expolygon.clone()).collect()
    }

    pub fn total_area(&self) -> CoordF {
        self.surfaces.iter().map(|s| s.area()).sum()
    }

    /// Surfaces grouped by (type, bridge angle), groups in first-seen order.
    pub fn group_by_compatibility(&self) -> Vec<Vec<&Surface>> {
        let mut groups: Vec<Vec<&Surface>> = Vec::new();
        for s in &self.surfaces {
            match groups.iter_mut().find(|g| g[0].is_compatible(s)) {
                Some(g) => g.push(s),
                None => groups.push(vec![s]),
            }
        }
        groups
    }
}

impl FromIterator<Surface> for SurfaceCollection {
    fn from_iter<I: IntoIterator<Item = Surface>>(iter: I) -> Self {
        Self::from_surfaces(iter.into_iter().collect())
    }
}

impl fmt::Display for SurfaceCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SurfaceCollection({} surfaces", self.surfaces.len())?;
        for t in SurfaceType::ALL {
            let n = self.filter_by_type(t).len();
            if n > 0 {
                write!(f, ", {}={}", t.name(), n)?;
            }
        }
        write!(f, ")")
    }
}

/// Labels a region's slices as top, bottom or internal.
///
/// `below` and `above` are the merged slices of the neighbouring layers;
/// `None` means there is no such layer.
pub trait SurfaceClassifier: Send + Sync {
    fn classify(
        &self,
        slices: &[ExPolygon],
        below: Option<&[ExPolygon]>,
        above: Option<&[ExPolygon]>,
    ) -> Vec<Surface>;
}

/// Classifies by exposure: area not covered above is top, area not
/// covered below is bottom, the rest is internal.
///
/// Where a region is both top and bottom (a single-layer membrane) bottom
/// wins, so the area stays eligible for bridge correction.
#[derive(Clone, Debug)]
pub struct ExposureClassifier {
    /// Opening distance applied to exposed areas to drop slivers (mm).
    pub opening: CoordF,
    /// Minimum surface area kept (scaled units squared).
    pub min_area: CoordF,
}

impl Default for ExposureClassifier {
    fn default() -> Self {
        Self {
            opening: 0.0,
            min_area: 1.0,
        }
    }
}

impl ExposureClassifier {
    fn exposed(&self, slices: &[ExPolygon], neighbour: Option<&[ExPolygon]>) -> ExPolygons {
        let diff = match neighbour {
            Some(n) if !n.is_empty() => difference(slices, n),
            _ => slices.to_vec(),
        };
        if self.opening > 0.0 {
            opening(&diff, self.opening, OffsetJoinType::Miter)
        } else {
            diff
        }
    }
}

impl SurfaceClassifier for ExposureClassifier {
    fn classify(
        &self,
        slices: &[ExPolygon],
        below: Option<&[ExPolygon]>,
        above: Option<&[ExPolygon]>,
    ) -> Vec<Surface> {
        if slices.is_empty() {
            return Vec::new();
        }
        let bottom = self.exposed(slices, below);
        let top = difference(&self.exposed(slices, above), &bottom);
        let internal = difference(slices, &union(&top, &bottom));

        let keep = |e: &ExPolygon| e.area() > self.min_area;
        bottom
            .into_iter()
            .filter(keep)
            .map(Surface::bottom)
            .chain(top.into_iter().filter(keep).map(Surface::top))
            .chain(internal.into_iter().filter(keep).map(Surface::internal))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Polygon};

    fn make_square_mm(x: f64, y: f64, size: f64) -> ExPolygon {
        Polygon::rectangle(Point::new_scale(x, y), Point::new_scale(x + size, y + size)).into()
    }

    #[test]
    fn test_surface_type_classification() {
        assert!(SurfaceType::Top.is_top());
        assert!(SurfaceType::BottomBridge.is_bottom());
        assert!(SurfaceType::BottomBridge.is_bridge());
        assert!(SurfaceType::InternalSolid.is_solid());
        assert!(!SurfaceType::Internal.is_solid());
        assert!(SurfaceType::Bottom.is_external());
        assert!(SurfaceType::InternalVoid.is_internal());
        assert_eq!(SurfaceType::BottomBridge.to_string(), "bottom bridge");
    }

    #[test]
    fn test_surface_compatibility() {
        let a = Surface::bridge(make_square_mm(0.0, 0.0, 1.0), Some(0.5));
        let b = Surface::bridge(make_square_mm(2.0, 0.0, 1.0), Some(0.5));
        let c = Surface::bridge(make_square_mm(4.0, 0.0, 1.0), Some(1.0));
        assert!(a.is_compatible(&b));
        assert!(!a.is_compatible(&c));
        assert!(!a.is_compatible(&Surface::bottom(make_square_mm(0.0, 0.0, 1.0))));
    }

    #[test]
    fn test_surface_collection_grouping() {
        let coll: SurfaceCollection = vec![
            Surface::internal(make_square_mm(0.0, 0.0, 1.0)),
            Surface::top(make_square_mm(2.0, 0.0, 1.0)),
            Surface::internal(make_square_mm(4.0, 0.0, 1.0)),
        ]
        .into_iter()
        .collect();
        let groups = coll.group_by_compatibility();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[0][0].surface_type, SurfaceType::Internal);
        assert!(coll.has_type(SurfaceType::Top));
        assert_eq!(coll.filter_by_type(SurfaceType::Internal).len(), 2);
    }

    #[test]
    fn test_surface_collection_display_counts_every_type() {
        let coll: SurfaceCollection = vec![
            Surface::top(make_square_mm(0.0, 0.0, 1.0)),
            Surface::new(make_square_mm(2.0, 0.0, 1.0), SurfaceType::InternalSolid),
            Surface::new(make_square_mm(4.0, 0.0, 1.0), SurfaceType::InternalVoid),
            Surface::new(make_square_mm(6.0, 0.0, 1.0), SurfaceType::InternalVoid),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            coll.to_string(),
            "SurfaceCollection(4 surfaces, top=1, internal solid=1, internal void=2)"
        );
    }

    #[test]
    fn test_classify_single_layer_is_bottom() {
        let slices = vec![make_square_mm(0.0, 0.0, 10.0)];
        let surfaces = ExposureClassifier::default().classify(&slices, None, None);
        assert_eq!(surfaces.len(), 1);
        assert_eq!(surfaces[0].surface_type, SurfaceType::Bottom);
        assert!(surfaces[0].is_external());
    }

    #[test]
    fn test_classify_top_layer() {
        let slices = vec![make_square_mm(0.0, 0.0, 10.0)];
        let below = slices.clone();
        let surfaces = ExposureClassifier::default().classify(&slices, Some(&below), None);
        assert_eq!(surfaces.len(), 1);
        assert_eq!(surfaces[0].surface_type, SurfaceType::Top);
    }

    #[test]
    fn test_classify_internal() {
        let slices = vec![make_square_mm(0.0, 0.0, 10.0)];
        let n = slices.clone();
        let surfaces = ExposureClassifier::default().classify(&slices, Some(&n), Some(&n));
        assert_eq!(surfaces.len(), 1);
        assert_eq!(surfaces[0].surface_type, SurfaceType::Internal);
    }

    #[test]
    fn test_classify_overhang_is_bottom() {
        let slices = vec![make_square_mm(0.0, 0.0, 10.0)];
        let below = vec![make_square_mm(0.0, 0.0, 5.0)];
        let above = slices.clone();
        let surfaces = ExposureClassifier::default().classify(&slices, Some(&below), Some(&above));
        let bottom: f64 = surfaces.iter().filter(|s| s.is_bottom()).map(|s| s.area()).sum();
        let internal: f64 = surfaces.iter().filter(|s| !s.is_external()).map(|s| s.area()).sum();
        assert!((bottom * 1e-12 - 75.0).abs() < 0.1);
        assert!((internal * 1e-12 - 25.0).abs() < 0.1);
        assert!(surfaces.iter().all(|s| !s.is_bridge()));
    }

    #[test]
    fn test_classify_empty() {
        assert!(ExposureClassifier::default().classify(&[], None, None).is_empty());
    }
}
