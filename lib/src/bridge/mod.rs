//! Bridge detection.
//!
//! A bridge is a bottom surface, or the part of one, that has nothing under
//! it on the layer below. Bridges are printed as straight solid lines, so
//! the detector picks the direction that anchors the most line length on
//! both ends:
//!
//! 1. Anchors: the bridge grown by one spacing, intersected with the lower
//!    layer's islands.
//! 2. Candidates: every 5°, plus the directions of the bridge's own edges and
//!    of the anchoring edges.
//! 3. Coverage: for each candidate, test lines one spacing apart are clipped
//!    to the bridge; a line counts when both ends land on an anchor. Among
//!    candidates within one spacing of the best coverage, the one with the
//!    shortest longest span wins.
//!
//! A bridge with no anchors at all falls back to its principal axis.

use crate::clipper::{diff_pl, grow, intersect_polylines_with_expolygons, intersection, point_in_expolygons, union_ex, OffsetJoinType};
use crate::geometry::{principal_axis, ExPolygon, ExPolygons, Line, Polyline, Polylines};
use crate::infill::scanlines;
use crate::{scale, unscale, Coord, CoordF};
use log::trace;
use std::f64::consts::PI;

/// Angular resolution of the candidate search.
const ANGLE_RESOLUTION: CoordF = PI / 36.0;

/// Unsupported edges within this angle of the bridge direction are dropped.
const PARALLEL_TOLERANCE: CoordF = PI / 36.0;

#[derive(Debug, Clone, Copy)]
struct BridgeDirection {
    angle: CoordF,
    coverage: CoordF,
    max_length: CoordF,
}

/// Finds the bridging direction of an unsupported area.
#[derive(Debug)]
pub struct BridgeDetector {
    expolygons: ExPolygons,
    lower_slices: ExPolygons,
    /// Extrusion spacing (scaled).
    spacing: Coord,
    /// Anchoring edges: the grown bridge outline where it lies over lower islands.
    edges: Polylines,
    anchor_regions: ExPolygons,
}

impl BridgeDetector {
    /// `spacing` is the bridge extrusion spacing in mm.
    pub fn new(expolygon: ExPolygon, lower_slices: &[ExPolygon], spacing: CoordF) -> Self {
        Self::new_multi(vec![expolygon], lower_slices, spacing)
    }

    pub fn new_multi(expolygons: ExPolygons, lower_slices: &[ExPolygon], spacing: CoordF) -> Self {
        let mut detector = Self {
            expolygons,
            lower_slices: union_ex(lower_slices),
            spacing: scale(spacing),
            edges: Vec::new(),
            anchor_regions: Vec::new(),
        };
        detector.initialize();
        detector
    }

    fn initialize(&mut self) {
        if self.lower_slices.is_empty() || self.spacing <= 0 {
            return;
        }
        let grown = grow(&self.expolygons, unscale(self.spacing), OffsetJoinType::Square);
        if grown.is_empty() {
            return;
        }
        let lower_contours: ExPolygons = self
            .lower_slices
            .iter()
            .map(|ex| ExPolygon::new(ex.contour.clone()))
            .collect();
        let outlines = crate::clipper::expolygons_to_polylines(&grown);
        self.edges = intersect_polylines_with_expolygons(&outlines, &lower_contours);

        // 10 micron safety offset against exact-boundary coincidences.
        let lower = grow(&self.lower_slices, 0.01, OffsetJoinType::Square);
        self.anchor_regions = intersection(&grown, &lower);
    }

    pub fn anchor_regions(&self) -> &ExPolygons {
        &self.anchor_regions
    }

    pub fn edges(&self) -> &Polylines {
        &self.edges
    }

    /// Best anchored bridging angle in radians, in [0, PI).
    ///
    /// `None` when the area has no anchors on the layer below or no test
    /// line is anchored at both ends.
    pub fn detect_angle(&self) -> Option<CoordF> {
        if self.edges.is_empty() || self.anchor_regions.is_empty() {
            return None;
        }

        let clip_area = grow(&self.expolygons, 0.5 * unscale(self.spacing), OffsetJoinType::Square);
        let spacing_mm = unscale(self.spacing);
        let mut candidates: Vec<BridgeDirection> = self
            .candidates()
            .into_iter()
            .filter_map(|angle| {
                let lines = scanlines(&clip_area, angle.to_degrees(), spacing_mm);
                let clipped = intersect_polylines_with_expolygons(&lines, &clip_area);
                let (mut coverage, mut max_length) = (0.0, 0.0);
                for pl in &clipped {
                    let (Some(a), Some(b)) = (pl.first_point(), pl.last_point()) else {
                        continue;
                    };
                    if point_in_expolygons(&a, &self.anchor_regions) && point_in_expolygons(&b, &self.anchor_regions) {
                        let len = unscale(pl.length() as Coord);
                        coverage += len;
                        max_length = CoordF::max(max_length, len);
                    }
                }
                (coverage > 0.0).then_some(BridgeDirection {
                    angle,
                    coverage,
                    max_length,
                })
            })
            .collect();
        if candidates.is_empty() {
            return None;
        }

        candidates.sort_by(|a, b| b.coverage.total_cmp(&a.coverage).then(a.angle.total_cmp(&b.angle)));
        let mut best = candidates[0];
        for c in &candidates[1..] {
            if best.coverage - c.coverage >= spacing_mm {
                break;
            }
            if c.max_length < best.max_length {
                best = *c;
            }
        }
        trace!(
            "bridge angle {:.1}° (coverage {:.2}mm, max span {:.2}mm)",
            best.angle.to_degrees(),
            best.coverage,
            best.max_length
        );
        Some(best.angle.rem_euclid(PI))
    }

    /// Anchored angle, else the principal axis of the area, else 0.
    pub fn resolve_angle(&self) -> CoordF {
        self.detect_angle()
            .or_else(|| principal_axis(&self.expolygons).map(|(_, angle)| angle))
            .unwrap_or(0.0)
    }

    fn candidates(&self) -> Vec<CoordF> {
        let steps = (PI / ANGLE_RESOLUTION).round() as usize;
        let mut angles: Vec<CoordF> = (0..steps).map(|i| i as CoordF * ANGLE_RESOLUTION).collect();

        for expoly in &self.expolygons {
            for polygon in expoly.to_polygons() {
                angles.extend(polygon.edges().iter().filter(|l| !l.is_point()).map(|l| l.direction_angle()));
            }
        }
        for edge in &self.edges {
            if let (Some(a), Some(b)) = (edge.first_point(), edge.last_point()) {
                if a != b {
                    angles.push(Line::new(a, b).direction_angle());
                }
            }
        }

        angles.sort_by(|a, b| a.total_cmp(b));
        let mut unique: Vec<CoordF> = Vec::with_capacity(angles.len());
        for angle in angles {
            if !unique.iter().any(|&u| directions_parallel(angle, u, PI / 180.0)) {
                unique.push(angle);
            }
        }
        unique
    }

    /// Segments of the bridge outline that sit over nothing and run across
    /// the bridge direction.
    pub fn unsupported_edges(&self, angle: CoordF) -> Polylines {
        let grown_lower = grow(&self.lower_slices, unscale(self.spacing), OffsetJoinType::Square);
        let mut unsupported = Vec::new();
        for expoly in &self.expolygons {
            let outline = crate::clipper::expolygons_to_polylines(std::slice::from_ref(expoly));
            for polyline in diff_pl(&outline, &grown_lower) {
                for line in polyline.lines() {
                    if !line.is_point() && !line.parallel_to_angle(angle, PARALLEL_TOLERANCE) {
                        unsupported.push(Polyline::from_points(vec![line.a, line.b]));
                    }
                }
            }
        }
        unsupported
    }
}

/// True when two undirected angles (radians) are within `tolerance`.
pub fn directions_parallel(a: CoordF, b: CoordF, tolerance: CoordF) -> bool {
    let diff = (a - b).rem_euclid(PI);
    diff < tolerance || PI - diff < tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Polygon};

    fn make_rect_mm(x: f64, y: f64, w: f64, h: f64) -> ExPolygon {
        Polygon::rectangle(Point::new_scale(x, y), Point::new_scale(x + w, y + h)).into()
    }

    #[test]
    fn test_directions_parallel() {
        assert!(directions_parallel(0.0, PI - 0.001, 0.01));
        assert!(directions_parallel(0.5, 0.505, 0.01));
        assert!(!directions_parallel(0.0, PI / 2.0, 0.01));
    }

    #[test]
    fn test_bridge_detector_no_lower() {
        let detector = BridgeDetector::new(make_rect_mm(0.0, 0.0, 10.0, 4.0), &[], 0.45);
        assert!(detector.anchor_regions().is_empty());
        assert!(detector.detect_angle().is_none());
        // Principal axis of a wide rectangle is horizontal.
        assert!(directions_parallel(detector.resolve_angle(), 0.0, 1e-6));
    }

    #[test]
    fn test_bridge_between_two_pillars() {
        // Gap from x=10 to x=20, pillars on both sides.
        let bridge = make_rect_mm(10.0, 0.0, 10.0, 10.0);
        let lower = vec![make_rect_mm(0.0, 0.0, 10.0, 10.0), make_rect_mm(20.0, 0.0, 10.0, 10.0)];
        let detector = BridgeDetector::new(bridge, &lower, 0.5);
        assert!(!detector.anchor_regions().is_empty());
        let angle = detector.detect_angle().expect("anchored");
        // Lines must run across the gap, i.e. along X.
        assert!(directions_parallel(angle, 0.0, 5f64.to_radians()), "angle {}", angle.to_degrees());
    }

    #[test]
    fn test_unsupported_edges_over_nothing() {
        let bridge = make_rect_mm(10.0, 0.0, 10.0, 10.0);
        let lower = vec![make_rect_mm(0.0, 0.0, 10.0, 10.0), make_rect_mm(20.0, 0.0, 10.0, 10.0)];
        let detector = BridgeDetector::new(bridge, &lower, 0.5);
        let edges = detector.unsupported_edges(0.0);
        // Only the top and bottom edges are free, and those run along the bridge.
        assert!(edges.is_empty());
        let across = detector.unsupported_edges(PI / 2.0);
        assert_eq!(across.len(), 2);
    }

    #[test]
    fn test_unsupported_edges_floating() {
        let bridge = make_rect_mm(50.0, 50.0, 4.0, 4.0);
        let lower = vec![make_rect_mm(0.0, 0.0, 10.0, 10.0)];
        let detector = BridgeDetector::new(bridge, &lower, 0.5);
        assert!(detector.detect_angle().is_none());
        // Vertical edges remain when bridging along X.
        assert_eq!(detector.unsupported_edges(0.0).len(), 2);
    }
}
