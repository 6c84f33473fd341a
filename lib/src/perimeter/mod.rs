//! Perimeter generation.
//!
//! Perimeters are produced per island by offsetting the island boundary
//! inward:
//!
//! 1. The external loop sits half an external width inside the boundary.
//! 2. The first internal loop is `external_to_internal_spacing` further in.
//! 3. Each further loop is one `perimeter_spacing` in.
//!
//! Internal levels use `offset2` (shrink past the spacing, grow back) so
//! that slivers narrower than a line disappear instead of producing
//! degenerate loops. Whatever remains inside the last loop becomes the
//! infill area.
//!
//! Islands narrower than one external line cannot hold a loop and are
//! printed along their centerline (a thin wall) that follows the region's
//! shape. With `thin_walls` on, narrow protrusions lost by the external
//! offset are handled the same way.

use crate::clipper::{difference, extract_centerlines, grow, offset2, shrink, union_ex, OffsetJoinType};
use crate::flow::Flow;
use crate::geometry::{ExPolygon, ExPolygons, Point, Polygon, Polylines};
use crate::{CoordF, SCALING_FACTOR};
use log::trace;
use std::cmp::Ordering;

/// Configuration for perimeter generation.
#[derive(Debug, Clone)]
pub struct PerimeterConfig {
    /// Maximum number of loops per island.
    pub perimeter_count: usize,
    pub perimeter_flow: Flow,
    pub ext_perimeter_flow: Flow,
    /// Spacing between internal loop centerlines (mm).
    pub perimeter_spacing: CoordF,
    pub external_perimeter_spacing: CoordF,
    /// Average of the external and internal spacing (mm).
    pub external_to_internal_spacing: CoordF,
    pub thin_walls: bool,
    /// Loops and islands below this area are dropped (mm²).
    pub min_perimeter_area: CoordF,
    pub join_type: OffsetJoinType,
}

impl PerimeterConfig {
    pub fn new(perimeter_flow: Flow, ext_perimeter_flow: Flow, perimeter_count: usize) -> Self {
        let perimeter_spacing = perimeter_flow.spacing();
        let external_perimeter_spacing = ext_perimeter_flow.spacing();
        Self {
            perimeter_count,
            perimeter_flow,
            ext_perimeter_flow,
            perimeter_spacing,
            external_perimeter_spacing,
            external_to_internal_spacing: 0.5 * (external_perimeter_spacing + perimeter_spacing),
            thin_walls: true,
            min_perimeter_area: 1e-4,
            join_type: OffsetJoinType::Miter,
        }
    }

    pub fn with_thin_walls(mut self, enabled: bool) -> Self {
        self.thin_walls = enabled;
        self
    }
}

/// One perimeter loop.
#[derive(Debug, Clone, PartialEq)]
pub struct PerimeterLoop {
    /// Loop centerline.
    pub polygon: Polygon,
    pub is_external: bool,
    /// Outer boundary (false for loops around holes).
    pub is_contour: bool,
    /// 0 = outermost, increasing inward.
    pub perimeter_index: usize,
}

/// Perimeters of one island.
#[derive(Debug, Clone, Default)]
pub struct IslandPerimeters {
    /// Loops ordered outer to inner.
    pub loops: Vec<PerimeterLoop>,
    /// Area inside the innermost loop.
    pub infill_area: ExPolygons,
    /// Centerlines of parts too narrow for a loop.
    pub thin_walls: Polylines,
}

impl IslandPerimeters {
    pub fn is_empty(&self) -> bool {
        self.loops.is_empty() && self.infill_area.is_empty() && self.thin_walls.is_empty()
    }

    pub fn level_count(&self) -> usize {
        self.loops.iter().map(|l| l.perimeter_index + 1).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PerimeterResult {
    /// Per island, in travel order.
    pub islands: Vec<IslandPerimeters>,
    /// Input was non-empty but contained no island of usable area.
    pub no_valid_contour: bool,
}

impl PerimeterResult {
    pub fn infill_area(&self) -> ExPolygons {
        self.islands.iter().flat_map(|i| i.infill_area.iter().cloned()).collect()
    }

    pub fn thin_walls(&self) -> Polylines {
        self.islands.iter().flat_map(|i| i.thin_walls.iter().cloned()).collect()
    }

    pub fn loop_count(&self) -> usize {
        self.islands.iter().map(|i| i.loops.len()).sum()
    }

    /// Every island yielded nothing.
    pub fn is_empty(&self) -> bool {
        self.islands.iter().all(|i| i.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct PerimeterGenerator {
    config: PerimeterConfig,
}

impl PerimeterGenerator {
    pub fn new(config: PerimeterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PerimeterConfig {
        &self.config
    }

    /// Generate perimeters for a set of slices.
    ///
    /// The slices are unioned first, so overlapping or self-intersecting
    /// input is repaired rather than rejected.
    pub fn generate(&self, slices: &[ExPolygon]) -> PerimeterResult {
        let mut result = PerimeterResult::default();
        if slices.is_empty() {
            return result;
        }

        let min_area = self.config.min_perimeter_area * SCALING_FACTOR * SCALING_FACTOR;
        let islands: ExPolygons = union_ex(slices).into_iter().filter(|e| e.area() >= min_area).collect();
        if islands.is_empty() {
            result.no_valid_contour = true;
            return result;
        }

        result.islands = chain_expolygons(&islands)
            .into_iter()
            .map(|idx| self.generate_island(&islands[idx]))
            .collect();
        trace!(
            "perimeters: {} islands, {} loops",
            result.islands.len(),
            result.loop_count()
        );
        result
    }

    fn generate_island(&self, island: &ExPolygon) -> IslandPerimeters {
        let mut out = IslandPerimeters::default();
        let jt = self.config.join_type;
        let ext_width = self.config.ext_perimeter_flow.width();

        if self.config.perimeter_count == 0 {
            out.infill_area = vec![island.clone()];
            return out;
        }

        let island_vec = vec![island.clone()];
        let mut current = island_vec.clone();
        for idx in 0..self.config.perimeter_count {
            let area = if idx == 0 {
                shrink(&current, ext_width / 2.0, jt)
            } else {
                let (distance, spacing) = if idx == 1 {
                    (self.config.external_to_internal_spacing, self.config.perimeter_spacing)
                } else {
                    (self.config.perimeter_spacing, self.config.perimeter_spacing)
                };
                offset2(&current, distance + spacing / 2.0 - 0.001, spacing / 2.0 - 0.001, jt)
            };

            if idx == 0 {
                if area.is_empty() {
                    // Narrower than one external line.
                    out.thin_walls = extract_centerlines(&island_vec, ext_width, jt);
                    return out;
                }
                if self.config.thin_walls {
                    let covered = grow(&area, ext_width / 2.0 + 0.001, jt);
                    let min_area = ext_width * ext_width * SCALING_FACTOR * SCALING_FACTOR;
                    let protrusions: ExPolygons = difference(&island_vec, &covered)
                        .into_iter()
                        .filter(|p| p.area() >= min_area)
                        .collect();
                    out.thin_walls = extract_centerlines(&protrusions, ext_width, jt);
                }
            }
            if area.is_empty() {
                break;
            }

            let mut level = self.level_loops(&area, idx);
            level.sort_by(|a, b| compare_polygons_deterministic(&a.polygon, &b.polygon));
            out.loops.extend(level);
            current = area;
        }

        let last_width = if out.level_count() <= 1 {
            ext_width
        } else {
            self.config.perimeter_flow.width()
        };
        out.infill_area = shrink(&current, last_width / 2.0, jt);
        out
    }

    fn level_loops(&self, area: &[ExPolygon], idx: usize) -> Vec<PerimeterLoop> {
        let min_area = self.config.min_perimeter_area * SCALING_FACTOR * SCALING_FACTOR;
        let mut loops = Vec::new();
        for expoly in area {
            let rings = std::iter::once((&expoly.contour, true)).chain(expoly.holes.iter().map(|h| (h, false)));
            for (ring, is_contour) in rings {
                if ring.len() >= 3 && ring.area() >= min_area {
                    loops.push(PerimeterLoop {
                        polygon: ring.clone(),
                        is_external: idx == 0,
                        is_contour,
                        perimeter_index: idx,
                    });
                }
            }
        }
        loops
    }
}

/// Greedy nearest-neighbour chaining of expolygons on bounding-box centres.
///
/// The chain starts at the expolygon with the smallest bounding-box
/// (min.x, min.y); every step moves to the nearest unvisited centre. Ties
/// go to the lower input index, so the order is a pure function of the input.
pub fn chain_expolygons(expolys: &[ExPolygon]) -> Vec<usize> {
    if expolys.is_empty() {
        return vec![];
    }
    let bboxes: Vec<_> = expolys.iter().map(|e| e.bounding_box()).collect();
    let centers: Vec<Point> = bboxes.iter().map(|b| b.center()).collect();

    let mut current = (0..expolys.len())
        .min_by_key(|&i| (bboxes[i].min.x, bboxes[i].min.y, i))
        .unwrap_or(0);
    let mut visited = vec![false; expolys.len()];
    let mut ordered = Vec::with_capacity(expolys.len());
    visited[current] = true;
    ordered.push(current);

    for _ in 1..expolys.len() {
        let pos = centers[current];
        let mut best: Option<(i128, usize)> = None;
        for (idx, seen) in visited.iter().enumerate() {
            if *seen {
                continue;
            }
            let d = pos.distance_squared(&centers[idx]);
            if best.map_or(true, |(bd, _)| d < bd) {
                best = Some((d, idx));
            }
        }
        let Some((_, next)) = best else { break };
        visited[next] = true;
        ordered.push(next);
        current = next;
    }
    ordered
}

/// Order by bounding-box min x, then min y, then larger area first.
pub fn compare_polygons_deterministic(a: &Polygon, b: &Polygon) -> Ordering {
    let bb_a = a.bounding_box();
    let bb_b = b.bounding_box();
    bb_a.min
        .x
        .cmp(&bb_b.min.x)
        .then(bb_a.min.y.cmp(&bb_b.min.y))
        .then_with(|| b.area().partial_cmp(&a.area()).unwrap_or(Ordering::Equal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipper::point_in_expolygons;
    use crate::unscale;

    fn make_square_mm(x: f64, y: f64, size: f64) -> ExPolygon {
        Polygon::rectangle(Point::new_scale(x, y), Point::new_scale(x + size, y + size)).into()
    }

    fn make_rect_mm(x: f64, y: f64, w: f64, h: f64) -> ExPolygon {
        Polygon::rectangle(Point::new_scale(x, y), Point::new_scale(x + w, y + h)).into()
    }

    fn make_square_with_hole_mm(size: f64, hole: f64) -> ExPolygon {
        let off = (size - hole) / 2.0;
        let mut inner = Polygon::rectangle(Point::new_scale(off, off), Point::new_scale(off + hole, off + hole));
        inner.make_clockwise();
        ExPolygon::with_holes(make_square_mm(0.0, 0.0, size).contour, vec![inner])
    }

    fn generator(count: usize) -> PerimeterGenerator {
        let flow = Flow::new(0.45, 0.2, 0.4).unwrap();
        PerimeterGenerator::new(PerimeterConfig::new(flow, flow, count))
    }

    #[test]
    fn test_perimeter_config_spacing() {
        let flow = Flow::new(0.45, 0.2, 0.4).unwrap();
        let ext = Flow::new(0.5, 0.2, 0.4).unwrap();
        let config = PerimeterConfig::new(flow, ext, 3);
        let expected = 0.45 - 0.2 * (1.0 - 0.25 * std::f64::consts::PI);
        assert!((config.perimeter_spacing - expected).abs() < 1e-9);
        assert!(
            (config.external_to_internal_spacing
                - 0.5 * (config.external_perimeter_spacing + config.perimeter_spacing))
                .abs()
                < 1e-9
        );
    }

    #[test]
    fn test_simple_square_outer_to_inner() {
        let result = generator(3).generate(&[make_square_mm(0.0, 0.0, 20.0)]);
        assert_eq!(result.islands.len(), 1);
        let island = &result.islands[0];
        assert_eq!(island.loops.len(), 3);
        let indices: Vec<_> = island.loops.iter().map(|l| l.perimeter_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(island.loops[0].is_external);
        let areas: Vec<_> = island.loops.iter().map(|l| l.polygon.area()).collect();
        assert!(areas[0] > areas[1] && areas[1] > areas[2]);
        assert!(!island.infill_area.is_empty());
        assert!(island.thin_walls.is_empty());
    }

    #[test]
    fn test_square_with_hole() {
        let result = generator(2).generate(&[make_square_with_hole_mm(30.0, 10.0)]);
        let island = &result.islands[0];
        assert_eq!(island.level_count(), 2);
        assert_eq!(island.loops.iter().filter(|l| !l.is_contour).count(), 2);
        assert_eq!(island.loops.len(), 4);
    }

    #[test]
    fn test_perimeter_count_upper_bound() {
        // 3mm square fits fewer loops than requested.
        let result = generator(10).generate(&[make_square_mm(0.0, 0.0, 3.0)]);
        let island = &result.islands[0];
        assert!(island.level_count() <= 10);
        assert!(island.level_count() < 10);
        assert!(island.loops.len() >= 1);
    }

    #[test]
    fn test_zero_perimeters() {
        let result = generator(0).generate(&[make_square_mm(0.0, 0.0, 10.0)]);
        assert_eq!(result.loop_count(), 0);
        assert_eq!(result.infill_area().len(), 1);
    }

    #[test]
    fn test_narrow_strip_becomes_thin_wall() {
        let strip = make_rect_mm(0.0, 0.0, 10.0, 0.3);
        let result = generator(3).generate(&[strip]);
        assert_eq!(result.loop_count(), 0);
        assert!(result.infill_area().is_empty());
        let walls = result.thin_walls();
        assert_eq!(walls.len(), 1);
        let len = unscale(walls[0].length() as i64);
        assert!(len > 9.0 && len < 10.0, "thin wall length {len}");
        assert!(!result.no_valid_contour);
    }

    fn make_ring_mm(outer: f64, wall: f64, segments: usize) -> ExPolygon {
        let ring = |r: f64| {
            Polygon::from_points(
                (0..segments)
                    .map(|i| {
                        let a = std::f64::consts::TAU * i as f64 / segments as f64;
                        Point::new_scale(r * a.cos(), r * a.sin())
                    })
                    .collect(),
            )
        };
        let mut hole = ring(outer - wall);
        hole.make_clockwise();
        ExPolygon::with_holes(ring(outer), vec![hole])
    }

    fn assert_walls_inside(walls: &Polylines, island: &ExPolygon) {
        let margin = grow(std::slice::from_ref(island), 0.05, OffsetJoinType::Round);
        for p in walls.iter().flat_map(|w| w.points()) {
            assert!(point_in_expolygons(p, &margin), "thin wall point {p:?} outside island");
        }
    }

    #[test]
    fn test_l_shaped_thin_wall_follows_both_arms() {
        let l_strip: ExPolygon = Polygon::from_points(vec![
            Point::new_scale(0.0, 0.0),
            Point::new_scale(10.0, 0.0),
            Point::new_scale(10.0, 0.3),
            Point::new_scale(0.3, 0.3),
            Point::new_scale(0.3, 10.0),
            Point::new_scale(0.0, 10.0),
        ])
        .into();
        let result = generator(2).generate(&[l_strip.clone()]);
        let walls = result.thin_walls();
        assert!(!walls.is_empty());
        assert_walls_inside(&walls, &l_strip);
        let total: f64 = walls.iter().map(|w| unscale(w.length() as i64)).sum();
        assert!(total > 18.0, "thin wall length {total}");
    }

    #[test]
    fn test_thin_ring_gets_closed_wall_inside_ring() {
        let ring = make_ring_mm(5.0, 0.3, 64);
        let result = generator(2).generate(&[ring.clone()]);
        assert_eq!(result.loop_count(), 0);
        let walls = result.thin_walls();
        assert!(!walls.is_empty());
        assert_walls_inside(&walls, &ring);
        // Nothing lands in the empty middle.
        let hole = [make_square_mm(-3.3, -3.3, 6.6)];
        assert!(walls.iter().flat_map(|w| w.points()).all(|p| !point_in_expolygons(p, &hole)));
        assert!(walls.iter().any(|w| w.first_point() == w.last_point()));
    }

    #[test]
    fn test_thin_protrusion_with_thin_walls() {
        // 10x10 body with a 0.3mm wide fin sticking out 5mm.
        let body = make_square_mm(0.0, 0.0, 10.0);
        let fin = make_rect_mm(10.0, 4.85, 5.0, 0.3);
        let result = generator(2).generate(&[body.clone(), fin.clone()]);
        assert_eq!(result.islands.len(), 1);
        let walls = result.thin_walls();
        assert!(!walls.is_empty());
        assert_walls_inside(&walls, &fin);

        let flow = Flow::new(0.45, 0.2, 0.4).unwrap();
        let off = PerimeterGenerator::new(PerimeterConfig::new(flow, flow, 2).with_thin_walls(false));
        assert!(off.generate(&[body, fin]).thin_walls().is_empty());
    }

    #[test]
    fn test_empty_and_sliver_input() {
        let g = generator(3);
        let empty = g.generate(&[]);
        assert!(empty.islands.is_empty());
        assert!(!empty.no_valid_contour);

        let sliver = make_rect_mm(0.0, 0.0, 0.001, 0.001);
        assert!(g.generate(&[sliver]).no_valid_contour);
    }

    #[test]
    fn test_chain_expolygons_starts_bottom_left() {
        let expolys = vec![
            make_square_mm(20.0, 0.0, 1.0),
            make_square_mm(0.0, 0.0, 1.0),
            make_square_mm(10.0, 0.0, 1.0),
        ];
        assert_eq!(chain_expolygons(&expolys), vec![1, 2, 0]);
    }

    #[test]
    fn test_chain_expolygons_tie_breaks_on_index() {
        // Two candidates equidistant from the start.
        let expolys = vec![
            make_square_mm(0.0, 0.0, 1.0),
            make_square_mm(0.0, 5.0, 1.0),
            make_square_mm(5.0, 0.0, 1.0),
        ];
        assert_eq!(chain_expolygons(&expolys), vec![0, 1, 2]);
        assert_eq!(chain_expolygons(&expolys), chain_expolygons(&expolys));
    }

    #[test]
    fn test_compare_polygons_deterministic() {
        let a = make_square_mm(0.0, 0.0, 2.0).contour;
        let b = make_square_mm(1.0, 0.0, 2.0).contour;
        let c = make_square_mm(0.0, 0.0, 1.0).contour;
        assert_eq!(compare_polygons_deterministic(&a, &b), Ordering::Less);
        assert_eq!(compare_polygons_deterministic(&a, &c), Ordering::Less);
    }
}
