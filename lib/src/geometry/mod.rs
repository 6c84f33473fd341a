//! Geometry primitives for the layer pipeline.
//!
//! - [`Point`] / [`PointF`]: scaled and unscaled 2D points
//! - [`Line`], [`Polyline`]: segments and open paths
//! - [`Polygon`], [`ExPolygon`]: closed boundaries, with holes for the latter
//! - [`BoundingBox`]: axis-aligned bounds
//!
//! Coordinates are scaled integers, 1mm = 1_000_000 units. Use `scale()` /
//! `unscale()` to convert.

mod bounding_box;
mod expolygon;
mod line;
mod point;
mod polygon;
mod polyline;

pub use bounding_box::BoundingBox;
pub use expolygon::{get_extents, to_polygons, total_area, ExPolygon, ExPolygons};
pub use line::{Line, Lines};
pub use point::{Point, PointF, Points};
pub use polygon::{Polygon, Polygons};
pub use polyline::{Polyline, Polylines};

use crate::{Coord, CoordF};

/// Z component of the 2D cross product, widened to avoid overflow.
#[inline]
pub fn cross2(v1: Point, v2: Point) -> i128 {
    v1.x as i128 * v2.y as i128 - v1.y as i128 * v2.x as i128
}

#[inline]
pub fn dot2(v1: Point, v2: Point) -> i128 {
    v1.x as i128 * v2.x as i128 + v1.y as i128 * v2.y as i128
}

/// Rotate 90 degrees counter-clockwise.
#[inline]
pub fn perp(v: Point) -> Point {
    Point::new(-v.y, v.x)
}

#[inline]
pub fn lerp(a: Point, b: Point, t: CoordF) -> Point {
    Point::new(
        (a.x as CoordF + (b.x - a.x) as CoordF * t).round() as Coord,
        (a.y as CoordF + (b.y - a.y) as CoordF * t).round() as Coord,
    )
}

#[inline]
pub fn approx_eq(a: CoordF, b: CoordF, epsilon: CoordF) -> bool {
    (a - b).abs() < epsilon
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    CounterClockwise,
    Clockwise,
    Collinear,
}

pub fn orientation(p1: Point, p2: Point, p3: Point) -> Orientation {
    match cross2(p2 - p1, p3 - p2).signum() {
        1 => Orientation::CounterClockwise,
        -1 => Orientation::Clockwise,
        _ => Orientation::Collinear,
    }
}

/// Principal axis of the area covered by `expolygons`, sampled on their vertices.
///
/// Returns the centroid of the samples and the angle (radians, in [0, PI)) of
/// the direction of largest variance. `None` when there are fewer than
/// three samples or the point cloud has no dominant direction.
pub fn principal_axis(expolygons: &[ExPolygon]) -> Option<(PointF, CoordF)> {
    let pts: Vec<PointF> = expolygons
        .iter()
        .flat_map(|e| e.to_polygons())
        .flat_map(|p| p.into_points())
        .map(|p| p.to_f())
        .collect();
    if pts.len() < 3 {
        return None;
    }
    let n = pts.len() as CoordF;
    let cx = pts.iter().map(|p| p.x).sum::<CoordF>() / n;
    let cy = pts.iter().map(|p| p.y).sum::<CoordF>() / n;
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for p in &pts {
        let dx = p.x - cx;
        let dy = p.y - cy;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    if approx_eq(sxx, syy, 1e-9) && sxy.abs() < 1e-9 {
        return None;
    }
    let angle = (0.5 * (2.0 * sxy).atan2(sxx - syy)).rem_euclid(std::f64::consts::PI);
    Some((PointF::new(cx, cy), angle))
}
