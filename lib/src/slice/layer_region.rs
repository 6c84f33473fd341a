//! Per-(layer, print region) geometry.

use crate::bridge::BridgeDetector;
use crate::clipper::{difference, intersection, union_ex};
use crate::config::PrintRegionConfig;
use crate::extrusion::{ExtrusionEntityCollection, ExtrusionLoop, ExtrusionPath, ExtrusionRole};
use crate::flow::{Flow, FlowRole};
use crate::geometry::{ExPolygon, ExPolygons, Polylines};
use crate::infill::{InfillConfig, InfillGenerator};
use crate::perimeter::{PerimeterConfig, PerimeterGenerator};
use crate::slice::surface::{Surface, SurfaceCollection, SurfaceType};
use crate::{CoordF, Result};
use log::trace;
use std::sync::Arc;

/// Counters from one perimeter pass over a region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerimeterStats {
    pub islands: usize,
    pub loops: usize,
    pub thin_fills: usize,
    /// Fill area pieces left inside the perimeters.
    pub fill_areas: usize,
    /// Input was non-empty but repair left no usable contour.
    pub no_valid_contour: bool,
}

impl PerimeterStats {
    /// Valid islands went in and nothing at all came out.
    pub fn produced_nothing(&self) -> bool {
        self.islands > 0 && self.loops == 0 && self.thin_fills == 0 && self.fill_areas == 0
    }
}

/// The part of one layer that belongs to one print region.
#[derive(Debug, Clone)]
pub struct LayerRegion {
    layer_id: usize,
    region_id: usize,
    config: Arc<PrintRegionConfig>,
    layer_height: CoordF,
    first_layer_width: Option<CoordF>,

    /// Classified cross-sections.
    pub slices: SurfaceCollection,
    /// Area inside the innermost perimeters.
    pub fill_expolygons: ExPolygons,
    /// `fill_expolygons` minus what lower-indexed regions already fill.
    pub fill_no_overlap_expolygons: ExPolygons,
    pub fill_surfaces: SurfaceCollection,
    /// Centerlines of walls too thin for a perimeter loop.
    pub thin_fills: ExtrusionEntityCollection,
    pub bridged: ExPolygons,
    pub unsupported_bridge_edges: Polylines,
    /// One ordered group per island, outer loop first.
    pub perimeters: ExtrusionEntityCollection,
    /// One group per fill surface, thin fills last.
    pub fills: ExtrusionEntityCollection,
}

impl LayerRegion {
    pub fn new(layer_id: usize, region_id: usize, config: Arc<PrintRegionConfig>, layer_height: CoordF) -> Self {
        Self {
            layer_id,
            region_id,
            config,
            layer_height,
            first_layer_width: None,
            slices: SurfaceCollection::new(),
            fill_expolygons: Vec::new(),
            fill_no_overlap_expolygons: Vec::new(),
            fill_surfaces: SurfaceCollection::new(),
            thin_fills: ExtrusionEntityCollection::new(),
            bridged: Vec::new(),
            unsupported_bridge_edges: Vec::new(),
            perimeters: ExtrusionEntityCollection::new(),
            fills: ExtrusionEntityCollection::new(),
        }
    }

    pub fn layer_id(&self) -> usize {
        self.layer_id
    }

    pub(crate) fn set_layer_id(&mut self, id: usize) {
        self.layer_id = id;
    }

    pub fn region_id(&self) -> usize {
        self.region_id
    }

    pub fn config(&self) -> &PrintRegionConfig {
        &self.config
    }

    pub fn layer_height(&self) -> CoordF {
        self.layer_height
    }

    /// Width used for every non-bridge role on the first layer.
    pub fn set_first_layer_width(&mut self, width: Option<CoordF>) {
        self.first_layer_width = width.filter(|w| *w > 0.0);
    }

    /// Flow for `role` on this layer.
    ///
    /// `width` overrides the configured width. Bridge flows are round
    /// threads of diameter `nozzle * sqrt(bridge_flow_ratio)`.
    pub fn flow(&self, role: FlowRole, bridge: bool, width: Option<CoordF>) -> Result<Flow> {
        let nozzle = self.config.nozzle_diameter;
        if bridge {
            let dmr = width.unwrap_or(nozzle * self.config.bridge_flow_ratio.sqrt());
            return Ok(Flow::bridging_flow(dmr, nozzle)?);
        }
        let configured = match role {
            FlowRole::ExternalPerimeter => self.config.external_perimeter_extrusion_width,
            FlowRole::Perimeter => self.config.perimeter_extrusion_width,
            FlowRole::Infill => self.config.infill_extrusion_width,
            FlowRole::SolidInfill => self.config.solid_infill_extrusion_width,
            FlowRole::TopSolidInfill => self.config.top_infill_extrusion_width,
            FlowRole::SupportMaterial | FlowRole::SupportMaterialInterface => {
                self.config.support_material_extrusion_width
            }
        };
        let w = width.or(self.first_layer_width).unwrap_or(configured);
        Ok(Flow::new_from_config_width(role, w, nozzle, self.layer_height)?)
    }

    /// Fill surfaces smaller than this are dropped (scaled² units).
    pub fn infill_area_threshold(&self) -> Result<CoordF> {
        let spacing = self.flow(FlowRole::SolidInfill, false, None)?.scaled_spacing() as CoordF;
        Ok(spacing * spacing)
    }

    /// Rebuild `fill_surfaces` as each group of compatible slices clipped
    /// to `fill_no_overlap_expolygons`.
    pub fn slices_to_fill_surfaces_clipped(&mut self) {
        let mut fill_surfaces = SurfaceCollection::new();
        for group in self.slices.group_by_compatibility() {
            let expolygons: ExPolygons = group.iter().map(|s| s.expolygon.clone()).collect();
            for expoly in intersection(&expolygons, &self.fill_no_overlap_expolygons) {
                fill_surfaces.push(Surface::with_template(group[0], expoly));
            }
        }
        self.fill_surfaces = fill_surfaces;
    }

    /// Normalize `fill_surfaces` before infill.
    pub fn prepare_fill_surfaces(&mut self) -> Result<()> {
        let threshold = self.infill_area_threshold()?;
        let config = &self.config;
        let retyped: SurfaceCollection = self
            .fill_surfaces
            .iter()
            .filter(|s| s.area() >= threshold)
            .map(|s| {
                let mut s = s.clone();
                if s.surface_type == SurfaceType::Top && config.top_solid_layers == 0 {
                    s.surface_type = SurfaceType::Internal;
                }
                if s.surface_type == SurfaceType::Bottom && config.bottom_solid_layers == 0 {
                    s.surface_type = SurfaceType::Internal;
                }
                if s.surface_type == SurfaceType::Internal && config.fill_density <= 0.0 {
                    s.surface_type = SurfaceType::InternalVoid;
                }
                s
            })
            .collect();

        let mut merged = SurfaceCollection::new();
        for group in retyped.group_by_compatibility() {
            let expolygons: ExPolygons = group.iter().map(|s| s.expolygon.clone()).collect();
            for expoly in union_ex(&expolygons) {
                merged.push(Surface::with_template(group[0], expoly));
            }
        }
        self.fill_surfaces = merged;
        Ok(())
    }

    /// Generate perimeters for `slices`.
    ///
    /// The area left inside the perimeters goes to `fill_surfaces` as
    /// internal surfaces and to both fill expolygon sets.
    pub fn make_perimeters(
        &mut self,
        slices: &SurfaceCollection,
        fill_surfaces: &mut SurfaceCollection,
    ) -> Result<PerimeterStats> {
        self.perimeters.clear();
        self.thin_fills.clear();

        let ext_flow = self.flow(FlowRole::ExternalPerimeter, false, None)?;
        let perimeter_flow = self.flow(FlowRole::Perimeter, false, None)?;
        let config = PerimeterConfig::new(perimeter_flow, ext_flow, self.config.perimeters as usize)
            .with_thin_walls(self.config.thin_walls);
        let result = PerimeterGenerator::new(config).generate(&slices.expolygons());

        let mut stats = PerimeterStats {
            islands: result.islands.len(),
            no_valid_contour: result.no_valid_contour,
            ..Default::default()
        };
        for island in &result.islands {
            let mut group = ExtrusionEntityCollection::ordered();
            for l in &island.loops {
                let (role, flow) = if l.is_external {
                    (ExtrusionRole::ExternalPerimeter, &ext_flow)
                } else {
                    (ExtrusionRole::Perimeter, &perimeter_flow)
                };
                group.push(ExtrusionLoop::new(&l.polygon, role, flow, l.is_contour));
            }
            stats.loops += island.loops.len();
            self.perimeters.push(group);

            for wall in &island.thin_walls {
                self.thin_fills.push(ExtrusionPath::new(wall.clone(), ExtrusionRole::ThinWall, &ext_flow));
                stats.thin_fills += 1;
            }
        }

        self.fill_expolygons = union_ex(&result.infill_area());
        self.fill_no_overlap_expolygons = self.fill_expolygons.clone();
        stats.fill_areas = self.fill_expolygons.len();
        fill_surfaces.clear();
        for expoly in &self.fill_expolygons {
            fill_surfaces.push(Surface::internal(expoly.clone()));
        }

        trace!(
            "layer {} region {}: {} islands, {} loops, {} thin fills",
            self.layer_id,
            self.region_id,
            stats.islands,
            stats.loops,
            stats.thin_fills
        );
        Ok(stats)
    }

    /// Split bottom surfaces into the part resting on `lower` and the part
    /// over nothing; the latter becomes a bridge.
    pub fn process_external_surfaces(&mut self, lower: Option<&[ExPolygon]>) -> Result<()> {
        let Some(lower) = lower else {
            return Ok(());
        };
        let threshold = self.infill_area_threshold()?;
        let bridge_flow = self.flow(FlowRole::SolidInfill, true, None)?;

        let mut corrected = SurfaceCollection::new();
        for surface in self.slices.iter() {
            if surface.surface_type != SurfaceType::Bottom {
                corrected.push(surface.clone());
                continue;
            }
            let this = std::slice::from_ref(&surface.expolygon);
            let unsupported = difference(this, lower);
            if unsupported.is_empty() {
                corrected.push(surface.clone());
                continue;
            }

            let mut remaining = intersection(this, lower);
            for piece in unsupported {
                if piece.area() < threshold {
                    remaining.push(piece);
                    continue;
                }
                let detector = BridgeDetector::new(piece.clone(), lower, bridge_flow.spacing());
                let angle = detector.resolve_angle();
                self.unsupported_bridge_edges.extend(detector.unsupported_edges(angle));
                self.bridged.push(piece.clone());
                corrected.push(Surface::bridge(piece, Some(angle)));
            }
            for expoly in union_ex(&remaining) {
                corrected.push(Surface::with_template(surface, expoly));
            }
        }
        self.slices = corrected;
        Ok(())
    }

    /// Generate infill for every fill surface, then append the thin fills.
    pub fn make_fills(&mut self, layer_id: usize) -> Result<()> {
        self.fills.clear();
        let solid_flow = self.flow(FlowRole::SolidInfill, false, None)?;
        let top_flow = self.flow(FlowRole::TopSolidInfill, false, None)?;
        let infill_flow = self.flow(FlowRole::Infill, false, None)?;
        let bridge_flow = self.flow(FlowRole::SolidInfill, true, None)?;

        for surface in self.fill_surfaces.iter() {
            let (mut config, role, flow) = match surface.surface_type {
                SurfaceType::InternalVoid => continue,
                SurfaceType::BottomBridge => {
                    let angle = surface.bridge_angle.unwrap_or(0.0).to_degrees();
                    (
                        InfillConfig::bridge(bridge_flow.spacing(), angle),
                        ExtrusionRole::BridgeInfill,
                        &bridge_flow,
                    )
                }
                SurfaceType::Top => (
                    InfillConfig::solid(top_flow.spacing()),
                    ExtrusionRole::TopSolidInfill,
                    &top_flow,
                ),
                SurfaceType::Bottom | SurfaceType::InternalSolid => (
                    InfillConfig::solid(solid_flow.spacing()),
                    ExtrusionRole::SolidInfill,
                    &solid_flow,
                ),
                SurfaceType::Internal => (
                    InfillConfig {
                        pattern: self.config.fill_pattern,
                        density: self.config.fill_density,
                        extrusion_spacing: infill_flow.spacing(),
                        ..InfillConfig::default()
                    },
                    ExtrusionRole::InternalInfill,
                    &infill_flow,
                ),
            };
            if surface.surface_type != SurfaceType::BottomBridge {
                config.angle = self.config.fill_angle;
            }
            config.overlap = self.config.infill_overlap;

            let result = InfillGenerator::new(config).generate(std::slice::from_ref(&surface.expolygon), layer_id);
            let mut group = ExtrusionEntityCollection::new();
            for path in &result.paths {
                group.push(ExtrusionPath::new(path.to_polyline(), role, flow));
            }
            self.fills.push(group);
        }

        if !self.thin_fills.is_empty() {
            self.fills.push(self.thin_fills.clone());
        }
        Ok(())
    }

    pub fn has_extrusions(&self) -> bool {
        !self.perimeters.is_empty() || !self.fills.is_empty()
    }

    pub fn clear_extrusions(&mut self) {
        self.perimeters.clear();
        self.fills.clear();
        self.thin_fills.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InfillPattern;
    use crate::geometry::{total_area, Point, Polygon};
    use crate::SCALING_FACTOR;

    const MM2: f64 = SCALING_FACTOR * SCALING_FACTOR;

    fn make_square_mm(x: f64, y: f64, size: f64) -> ExPolygon {
        Polygon::rectangle(Point::new_scale(x, y), Point::new_scale(x + size, y + size)).into()
    }

    fn make_rect_mm(x: f64, y: f64, w: f64, h: f64) -> ExPolygon {
        Polygon::rectangle(Point::new_scale(x, y), Point::new_scale(x + w, y + h)).into()
    }

    fn region(config: PrintRegionConfig) -> LayerRegion {
        LayerRegion::new(1, 0, Arc::new(config), 0.2)
    }

    fn run_perimeters(r: &mut LayerRegion) -> PerimeterStats {
        let slices = r.slices.clone();
        let mut fill = SurfaceCollection::new();
        let stats = r.make_perimeters(&slices, &mut fill).unwrap();
        r.fill_surfaces = fill;
        stats
    }

    #[test]
    fn test_flow_roles() {
        let r = region(PrintRegionConfig::default());
        let solid = r.flow(FlowRole::SolidInfill, false, None).unwrap();
        assert!((solid.width() - 0.45).abs() < 1e-9);
        assert!((solid.height() - 0.2).abs() < 1e-9);

        let wide = r.flow(FlowRole::Perimeter, false, Some(0.6)).unwrap();
        assert!((wide.width() - 0.6).abs() < 1e-9);

        let bridge = r.flow(FlowRole::SolidInfill, true, None).unwrap();
        assert!(bridge.is_bridge());
        assert!((bridge.width() - 0.4).abs() < 1e-9);
        assert!((bridge.spacing() - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_first_layer_width() {
        let mut r = region(PrintRegionConfig::default());
        r.set_first_layer_width(Some(0.5));
        assert!((r.flow(FlowRole::Infill, false, None).unwrap().width() - 0.5).abs() < 1e-9);
        r.set_first_layer_width(Some(0.0));
        assert!((r.flow(FlowRole::Infill, false, None).unwrap().width() - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_flow_error_propagates() {
        let config = PrintRegionConfig {
            perimeter_extrusion_width: 0.01,
            ..Default::default()
        };
        let r = LayerRegion::new(0, 0, Arc::new(config), 0.3);
        assert!(matches!(
            r.flow(FlowRole::Perimeter, false, None),
            Err(crate::Error::Flow(_))
        ));
    }

    #[test]
    fn test_has_extrusions() {
        let mut r = region(PrintRegionConfig::default());
        r.slices.push(Surface::internal(make_square_mm(0.0, 0.0, 20.0)));
        assert!(!r.has_extrusions());
        run_perimeters(&mut r);
        assert!(r.has_extrusions());
        r.clear_extrusions();
        assert!(!r.has_extrusions());
    }

    #[test]
    fn test_make_perimeters_groups_per_island() {
        let mut r = region(PrintRegionConfig::default().perimeters(2));
        r.slices.push(Surface::internal(make_square_mm(0.0, 0.0, 10.0)));
        r.slices.push(Surface::internal(make_square_mm(20.0, 0.0, 10.0)));
        let stats = run_perimeters(&mut r);
        assert_eq!(stats.islands, 2);
        assert_eq!(r.perimeters.len(), 2);
        for group in r.perimeters.iter() {
            let crate::ExtrusionEntity::Collection(c) = group else {
                panic!("expected a collection per island");
            };
            assert!(c.no_sort);
            let roles: Vec<_> = c.flatten().iter().map(|p| p.role).collect();
            assert_eq!(roles, vec![ExtrusionRole::ExternalPerimeter, ExtrusionRole::Perimeter]);
        }
        assert_eq!(r.fill_surfaces.len(), 2);
        assert!(r.fill_surfaces.iter().all(|s| s.surface_type == SurfaceType::Internal));
    }

    #[test]
    fn test_narrow_island_only_thin_fills() {
        let mut r = region(PrintRegionConfig::default());
        r.slices.push(Surface::internal(make_rect_mm(0.0, 0.0, 8.0, 0.3)));
        let stats = run_perimeters(&mut r);
        assert_eq!(stats.loops, 0);
        assert_eq!(stats.thin_fills, 1);
        assert!(r.perimeters.is_empty());
        assert!(r.fill_expolygons.is_empty());
        r.make_fills(1).unwrap();
        assert_eq!(r.fills.len(), 1);
        assert_eq!(r.fills.flatten()[0].role, ExtrusionRole::ThinWall);
    }

    #[test]
    fn test_slices_to_fill_surfaces_clipped_idempotent() {
        let mut r = region(PrintRegionConfig::default());
        r.slices.push(Surface::top(make_rect_mm(0.0, 0.0, 10.0, 20.0)));
        r.slices.push(Surface::internal(make_rect_mm(10.0, 0.0, 10.0, 20.0)));
        r.fill_no_overlap_expolygons = vec![make_square_mm(1.0, 1.0, 18.0)];

        r.slices_to_fill_surfaces_clipped();
        let first = r.fill_surfaces.clone();
        r.slices_to_fill_surfaces_clipped();
        assert_eq!(first, r.fill_surfaces);

        assert_eq!(first.filter_by_type(SurfaceType::Top).len(), 1);
        assert_eq!(first.filter_by_type(SurfaceType::Internal).len(), 1);
        assert!((first.total_area() / MM2 - 18.0 * 18.0).abs() < 0.01);
    }

    #[test]
    fn test_prepare_fill_surfaces_drops_and_merges() {
        let mut r = region(PrintRegionConfig::default());
        r.fill_surfaces.push(Surface::internal(make_rect_mm(0.0, 0.0, 5.0, 10.0)));
        r.fill_surfaces.push(Surface::internal(make_rect_mm(5.0, 0.0, 5.0, 10.0)));
        r.fill_surfaces.push(Surface::top(make_square_mm(30.0, 0.0, 0.1)));
        r.prepare_fill_surfaces().unwrap();
        assert_eq!(r.fill_surfaces.len(), 1);
        assert!((r.fill_surfaces.total_area() / MM2 - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_prepare_fill_surfaces_retypes() {
        let config = PrintRegionConfig::default().solid_layers(0, 0).fill_density(0.0);
        let mut r = region(config);
        r.fill_surfaces.push(Surface::top(make_square_mm(0.0, 0.0, 5.0)));
        r.fill_surfaces.push(Surface::bottom(make_square_mm(10.0, 0.0, 5.0)));
        r.fill_surfaces.push(Surface::bridge(make_square_mm(20.0, 0.0, 5.0), Some(0.0)));
        r.prepare_fill_surfaces().unwrap();
        assert_eq!(r.fill_surfaces.filter_by_type(SurfaceType::InternalVoid).len(), 2);
        assert_eq!(r.fill_surfaces.filter_by_type(SurfaceType::BottomBridge).len(), 1);
    }

    #[test]
    fn test_solid_layer_counts_keep_skins_and_internal_solid() {
        // Sparse density zero must not void classifier-provided solid shells.
        let config = PrintRegionConfig::default().solid_layers(3, 3).fill_density(0.0);
        let mut r = region(config);
        r.fill_surfaces.push(Surface::top(make_square_mm(0.0, 0.0, 5.0)));
        r.fill_surfaces.push(Surface::new(make_square_mm(10.0, 0.0, 5.0), SurfaceType::InternalSolid));
        r.fill_surfaces.push(Surface::internal(make_square_mm(20.0, 0.0, 5.0)));
        r.prepare_fill_surfaces().unwrap();
        assert_eq!(r.fill_surfaces.filter_by_type(SurfaceType::Top).len(), 1);
        assert_eq!(r.fill_surfaces.filter_by_type(SurfaceType::InternalSolid).len(), 1);
        assert_eq!(r.fill_surfaces.filter_by_type(SurfaceType::InternalVoid).len(), 1);

        r.make_fills(2).unwrap();
        let roles: Vec<_> = r.fills.iter().filter_map(|e| e.role()).collect();
        assert_eq!(roles.len(), 2);
        assert!(roles.contains(&ExtrusionRole::TopSolidInfill));
        assert!(roles.contains(&ExtrusionRole::SolidInfill));
    }

    #[test]
    fn test_process_external_surfaces_without_lower() {
        let mut r = region(PrintRegionConfig::default());
        r.slices.push(Surface::bottom(make_square_mm(0.0, 0.0, 10.0)));
        let before = r.slices.clone();
        r.process_external_surfaces(None).unwrap();
        assert_eq!(r.slices, before);
        assert!(r.bridged.is_empty());
        assert!(r.unsupported_bridge_edges.is_empty());
    }

    #[test]
    fn test_process_external_surfaces_partial_support() {
        let mut r = region(PrintRegionConfig::default());
        r.slices.push(Surface::bottom(make_rect_mm(0.0, 0.0, 20.0, 10.0)));
        r.slices.push(Surface::internal(make_square_mm(40.0, 0.0, 10.0)));
        let lower = vec![make_rect_mm(0.0, 0.0, 10.0, 10.0), make_square_mm(40.0, 0.0, 10.0)];
        r.process_external_surfaces(Some(&lower)).unwrap();

        let bridges = r.slices.filter_by_type(SurfaceType::BottomBridge);
        assert_eq!(bridges.len(), 1);
        assert!(bridges[0].bridge_angle.is_some());
        assert!((bridges[0].area() / MM2 - 100.0).abs() < 0.01);
        let bottoms = r.slices.filter_by_type(SurfaceType::Bottom);
        assert_eq!(bottoms.len(), 1);
        assert!((bottoms[0].area() / MM2 - 100.0).abs() < 0.01);
        assert_eq!(r.slices.filter_by_type(SurfaceType::Internal).len(), 1);
        assert!((total_area(&r.bridged) / MM2 - 100.0).abs() < 0.01);
        assert!(!r.unsupported_bridge_edges.is_empty());
    }

    #[test]
    fn test_make_fills_one_group_per_surface() {
        let config = PrintRegionConfig::default().fill_pattern(InfillPattern::Rectilinear);
        let mut r = region(config);
        r.fill_surfaces.push(Surface::top(make_square_mm(0.0, 0.0, 10.0)));
        r.fill_surfaces.push(Surface::internal(make_square_mm(20.0, 0.0, 10.0)));
        r.fill_surfaces.push(Surface::bridge(make_square_mm(40.0, 0.0, 10.0), Some(0.0)));
        r.fill_surfaces.push(Surface::new(make_square_mm(60.0, 0.0, 10.0), SurfaceType::InternalVoid));
        r.make_fills(3).unwrap();
        assert_eq!(r.fills.len(), 3);
        let roles: Vec<_> = r.fills.iter().filter_map(|e| e.role()).collect();
        assert_eq!(
            roles,
            vec![
                ExtrusionRole::TopSolidInfill,
                ExtrusionRole::InternalInfill,
                ExtrusionRole::BridgeInfill
            ]
        );
        let bridge_paths: Vec<_> = r
            .fills
            .flatten()
            .into_iter()
            .filter(|p| p.role == ExtrusionRole::BridgeInfill)
            .collect();
        assert!(bridge_paths.iter().all(|p| p.bridge));
    }
}
