//! Polygon boolean and offset operations.
//!
//! Boolean operations and offsets are delegated to `geo-clipper`, which works
//! on unscaled `geo` geometry. Values cross the boundary in millimetres and
//! are re-scaled on the way back; `CLIPPER_FACTOR` keeps micron precision
//! inside Clipper's integer space.
//!
//! Polyline clipping is done here on the scaled integer geometry, splitting
//! segments at exact boundary crossings.

use crate::geometry::{ExPolygon, ExPolygons, Line, Point, Polygon, Polyline, Polylines};
use crate::{scale, unscale, CoordF};
use geo::{Coord as GeoCoord, LineString, MultiPolygon, Polygon as GeoPolygon};
use geo_clipper::{Clipper, EndType, JoinType};

const CLIPPER_FACTOR: f64 = 1000.0;

/// Join type for offset corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetJoinType {
    Square,
    #[default]
    Round,
    Miter,
}

impl From<OffsetJoinType> for JoinType {
    fn from(jt: OffsetJoinType) -> Self {
        match jt {
            OffsetJoinType::Square => JoinType::Square,
            OffsetJoinType::Round => JoinType::Round(0.25),
            OffsetJoinType::Miter => JoinType::Miter(2.0),
        }
    }
}

fn ring_to_geo(points: &[Point]) -> LineString<f64> {
    let mut ring: Vec<GeoCoord<f64>> = points
        .iter()
        .map(|p| GeoCoord {
            x: unscale(p.x),
            y: unscale(p.y),
        })
        .collect();
    if let (Some(first), Some(last)) = (ring.first().copied(), ring.last()) {
        if first != *last {
            ring.push(first);
        }
    }
    LineString::new(ring)
}

fn geo_to_ring(ls: &LineString<f64>) -> Polygon {
    let mut points: Vec<Point> = ls.coords().map(|c| Point::new(scale(c.x), scale(c.y))).collect();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    Polygon::from_points(points)
}

fn expolygon_to_geo(expoly: &ExPolygon) -> GeoPolygon<f64> {
    GeoPolygon::new(
        ring_to_geo(expoly.contour.points()),
        expoly.holes.iter().map(|h| ring_to_geo(h.points())).collect(),
    )
}

fn geo_to_expolygon(geo_poly: &GeoPolygon<f64>) -> ExPolygon {
    let mut contour = geo_to_ring(geo_poly.exterior());
    contour.make_counter_clockwise();
    let holes = geo_poly
        .interiors()
        .iter()
        .map(|ls| {
            let mut h = geo_to_ring(ls);
            h.make_clockwise();
            h
        })
        .filter(|h| h.len() >= 3)
        .collect();
    ExPolygon::with_holes(contour, holes)
}

fn geo_multi_to_expolygons(multi: &MultiPolygon<f64>) -> ExPolygons {
    multi
        .0
        .iter()
        .map(geo_to_expolygon)
        .filter(|e| !e.is_empty() && e.area() > 0.0)
        .collect()
}

fn expolygons_to_geo_multi(expolys: &[ExPolygon]) -> MultiPolygon<f64> {
    MultiPolygon::new(expolys.iter().map(expolygon_to_geo).collect())
}

fn polygons_to_geo_multi(polys: &[Polygon]) -> MultiPolygon<f64> {
    MultiPolygon::new(
        polys
            .iter()
            .map(|p| GeoPolygon::new(ring_to_geo(p.points()), vec![]))
            .collect(),
    )
}

// ============================================================================
// Boolean Operations
// ============================================================================

/// Union of two sets of expolygons.
pub fn union(subject: &[ExPolygon], clip: &[ExPolygon]) -> ExPolygons {
    if subject.is_empty() && clip.is_empty() {
        return vec![];
    }
    let result = expolygons_to_geo_multi(subject).union(&expolygons_to_geo_multi(clip), CLIPPER_FACTOR);
    geo_multi_to_expolygons(&result)
}

/// Self-union: merges overlaps and resolves self-intersections.
///
/// Always runs through Clipper, even for a single input, so the output is
/// a normalized, non-overlapping set.
pub fn union_ex(expolygons: &[ExPolygon]) -> ExPolygons {
    if expolygons.is_empty() {
        return vec![];
    }
    union(expolygons, &[])
}

/// Build expolygons from loose rings under the non-zero winding rule.
///
/// Counter-clockwise rings add area, clockwise rings nested inside them become
/// holes. Self-intersecting rings are split into simple pieces.
pub fn union_polygons_ex(polygons: &[Polygon]) -> ExPolygons {
    if polygons.is_empty() {
        return vec![];
    }
    let result = polygons_to_geo_multi(polygons).union(&MultiPolygon::new(vec![]), CLIPPER_FACTOR);
    geo_multi_to_expolygons(&result)
}

pub fn intersection(subject: &[ExPolygon], clip: &[ExPolygon]) -> ExPolygons {
    if subject.is_empty() || clip.is_empty() {
        return vec![];
    }
    let result = expolygons_to_geo_multi(subject)
        .intersection(&expolygons_to_geo_multi(clip), CLIPPER_FACTOR);
    geo_multi_to_expolygons(&result)
}

/// `subject - clip`.
pub fn difference(subject: &[ExPolygon], clip: &[ExPolygon]) -> ExPolygons {
    if subject.is_empty() {
        return vec![];
    }
    if clip.is_empty() {
        return union_ex(subject);
    }
    let result =
        expolygons_to_geo_multi(subject).difference(&expolygons_to_geo_multi(clip), CLIPPER_FACTOR);
    geo_multi_to_expolygons(&result)
}

// ============================================================================
// Offset Operations
// ============================================================================

/// Offset by `delta` mm; positive grows, negative shrinks.
pub fn offset_expolygons(expolygons: &[ExPolygon], delta: CoordF, join_type: OffsetJoinType) -> ExPolygons {
    if expolygons.is_empty() {
        return vec![];
    }
    let result = expolygons_to_geo_multi(expolygons).offset(
        delta,
        join_type.into(),
        EndType::ClosedPolygon,
        CLIPPER_FACTOR,
    );
    geo_multi_to_expolygons(&result)
}

pub fn shrink(expolygons: &[ExPolygon], distance: CoordF, join_type: OffsetJoinType) -> ExPolygons {
    offset_expolygons(expolygons, -distance.abs(), join_type)
}

pub fn grow(expolygons: &[ExPolygon], distance: CoordF, join_type: OffsetJoinType) -> ExPolygons {
    offset_expolygons(expolygons, distance.abs(), join_type)
}

/// Morphological opening: shrink then grow by the same distance.
pub fn opening(expolygons: &[ExPolygon], distance: CoordF, join_type: OffsetJoinType) -> ExPolygons {
    if expolygons.is_empty() || distance <= 0.0 {
        return expolygons.to_vec();
    }
    let shrunk = shrink(expolygons, distance, join_type);
    grow(&shrunk, distance, join_type)
}

/// Shrink by `shrink_amount`, then grow by `grow_amount`.
pub fn offset2(
    expolygons: &[ExPolygon],
    shrink_amount: CoordF,
    grow_amount: CoordF,
    join_type: OffsetJoinType,
) -> ExPolygons {
    let shrunk = shrink(expolygons, shrink_amount, join_type);
    if shrunk.is_empty() {
        return vec![];
    }
    grow(&shrunk, grow_amount, join_type)
}

const CENTERLINE_BISECTIONS: usize = 6;

/// Approximate centerlines of regions narrower than `width` mm.
///
/// Each region is shrunk as far as it survives, bisecting between zero and
/// `width / 2`. The surviving sliver hugs the medial axis: a sliver with
/// holes is a ring and yields its contour as a closed loop, anything else
/// is cut at its two most distant vertices and one side is kept. Lines are
/// clipped to their region and those shorter than `width` are dropped.
pub fn extract_centerlines(expolygons: &[ExPolygon], width: CoordF, join_type: OffsetJoinType) -> Polylines {
    if expolygons.is_empty() || width <= 0.0 {
        return vec![];
    }
    let min_length = width * crate::SCALING_FACTOR;
    let mut centerlines = Vec::new();

    for expoly in expolygons {
        let region = std::slice::from_ref(expoly);
        let mut sliver = ExPolygons::new();
        let (mut lo, mut hi) = (0.0, width / 2.0);
        for _ in 0..CENTERLINE_BISECTIONS {
            let mid = 0.5 * (lo + hi);
            let shrunk = shrink(region, mid, join_type);
            if shrunk.is_empty() {
                hi = mid;
            } else {
                lo = mid;
                sliver = shrunk;
            }
        }

        let lines: Polylines = sliver
            .iter()
            .filter_map(|piece| {
                if piece.holes.is_empty() {
                    split_at_extremes(&piece.contour)
                } else {
                    Some(Polyline::from_polygon(&piece.contour))
                }
            })
            .collect();
        centerlines.extend(
            intersect_polylines_with_expolygons(&lines, region)
                .into_iter()
                .filter(|pl| pl.length() >= min_length),
        );
    }
    centerlines
}

/// One side of a closed ring, from the vertex farthest from the start to
/// the vertex farthest from that one.
fn split_at_extremes(ring: &Polygon) -> Option<Polyline> {
    let points = ring.points();
    if points.len() < 2 {
        return None;
    }
    let farthest_from = |from: Point| {
        (0..points.len())
            .max_by_key(|&i| (points[i].distance_squared(&from), std::cmp::Reverse(i)))
            .unwrap_or(0)
    };
    let start = farthest_from(points[0]);
    let end = farthest_from(points[start]);
    if start == end {
        return None;
    }
    let n = points.len();
    let steps = (end + n - start) % n;
    let path: Vec<Point> = (0..=steps).map(|k| points[(start + k) % n]).collect();
    Some(Polyline::from_points(path))
}

// ============================================================================
// Polyline Clipping
// ============================================================================

/// Portions of `polylines` inside `clip`.
pub fn intersect_polylines_with_expolygons(polylines: &[Polyline], clip: &[ExPolygon]) -> Polylines {
    if clip.is_empty() {
        return vec![];
    }
    polylines.iter().flat_map(|pl| clip_polyline(pl, clip, true)).collect()
}

/// Portions of `polylines` outside `clip`.
pub fn diff_pl(polylines: &[Polyline], clip: &[ExPolygon]) -> Polylines {
    if clip.is_empty() {
        return polylines.iter().filter(|pl| pl.is_valid()).cloned().collect();
    }
    polylines.iter().flat_map(|pl| clip_polyline(pl, clip, false)).collect()
}

fn clip_polyline(polyline: &Polyline, clip: &[ExPolygon], keep_inside: bool) -> Polylines {
    let mut result = Vec::new();
    let mut current: Vec<Point> = Vec::new();

    for seg in polyline.lines() {
        for (a, b) in clip_segment(&seg, clip, keep_inside) {
            match current.last() {
                Some(last) if *last == a => current.push(b),
                _ => {
                    if current.len() >= 2 {
                        result.push(Polyline::from_points(std::mem::take(&mut current)));
                    }
                    current = vec![a, b];
                }
            }
        }
    }
    if current.len() >= 2 {
        result.push(Polyline::from_points(current));
    }
    result
}

/// Split a segment at every crossing with the clip boundaries and keep the
/// pieces whose midpoint lies on the requested side.
fn clip_segment(seg: &Line, clip: &[ExPolygon], keep_inside: bool) -> Vec<(Point, Point)> {
    if seg.is_point() {
        return vec![];
    }
    let mut ts = vec![0.0, 1.0];
    let d = seg.direction();
    let len2 = (d.x as f64).powi(2) + (d.y as f64).powi(2);
    for expoly in clip {
        if !expoly.bounding_box().overlaps(&seg_bbox(seg)) {
            continue;
        }
        for edge in expoly.to_polygons().iter().flat_map(|p| p.edges()) {
            if let Some(ip) = seg.intersection(&edge) {
                let v = ip - seg.a;
                let t = (v.x as f64 * d.x as f64 + v.y as f64 * d.y as f64) / len2;
                ts.push(t.clamp(0.0, 1.0));
            }
        }
    }
    ts.sort_by(|a, b| a.total_cmp(b));
    ts.dedup_by(|a, b| (*a - *b).abs() < 1e-12);

    let at = |t: f64| {
        Point::new(
            seg.a.x + (d.x as f64 * t).round() as i64,
            seg.a.y + (d.y as f64 * t).round() as i64,
        )
    };
    ts.windows(2)
        .filter_map(|w| {
            let (p, q) = (at(w[0]), at(w[1]));
            if p == q {
                return None;
            }
            let mid = at(0.5 * (w[0] + w[1]));
            let inside = point_in_expolygons(&mid, clip);
            (inside == keep_inside).then_some((p, q))
        })
        .collect()
}

fn seg_bbox(seg: &Line) -> crate::geometry::BoundingBox {
    crate::geometry::BoundingBox::from_points(&[seg.a, seg.b])
}

pub fn point_in_expolygons(pt: &Point, expolygons: &[ExPolygon]) -> bool {
    expolygons.iter().any(|e| e.contains_point(pt))
}

/// Contours and holes as closed polylines.
pub fn expolygons_to_polylines(expolygons: &[ExPolygon]) -> Polylines {
    expolygons
        .iter()
        .flat_map(|e| e.to_polygons())
        .map(|p| Polyline::from_polygon(&p))
        .collect()
}
