//! Line segment type.

use super::{cross2, dot2, Point};
use crate::{unscale, Coord, CoordF};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A line segment defined by two endpoints.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Line {
    pub a: Point,
    pub b: Point,
}

pub type Lines = Vec<Line>;

impl Line {
    #[inline]
    pub const fn new(a: Point, b: Point) -> Self {
        Self { a, b }
    }

    #[inline]
    pub fn direction(&self) -> Point {
        self.b - self.a
    }

    /// Direction angle normalized to [0, PI).
    pub fn direction_angle(&self) -> CoordF {
        let dir = self.direction();
        let mut angle = (dir.y as CoordF).atan2(dir.x as CoordF);
        if angle < 0.0 {
            angle += std::f64::consts::PI;
        }
        if angle >= std::f64::consts::PI {
            angle -= std::f64::consts::PI;
        }
        angle
    }

    #[inline]
    pub fn midpoint(&self) -> Point {
        Point::new(
            self.a.x + (self.b.x - self.a.x) / 2,
            self.a.y + (self.b.y - self.a.y) / 2,
        )
    }

    #[inline]
    pub fn length(&self) -> CoordF {
        self.a.distance(&self.b)
    }

    #[inline]
    pub fn is_point(&self) -> bool {
        self.a == self.b
    }

    /// Closest point on the segment.
    pub fn project_point(&self, p: &Point) -> Point {
        let d = self.direction();
        let len2 = dot2(d, d);
        if len2 == 0 {
            return self.a;
        }
        let t = (dot2(*p - self.a, d) as f64 / len2 as f64).clamp(0.0, 1.0);
        Point::new(
            self.a.x + (d.x as f64 * t).round() as Coord,
            self.a.y + (d.y as f64 * t).round() as Coord,
        )
    }

    pub fn distance_to_point(&self, p: &Point) -> CoordF {
        p.distance(&self.project_point(p))
    }

    /// Segment intersection test, collinear overlaps included.
    pub fn intersects(&self, other: &Line) -> bool {
        let d1 = orient(other.a, other.b, self.a);
        let d2 = orient(other.a, other.b, self.b);
        let d3 = orient(self.a, self.b, other.a);
        let d4 = orient(self.a, self.b, other.b);

        if ((d1 > 0 && d2 < 0) || (d1 < 0 && d2 > 0)) && ((d3 > 0 && d4 < 0) || (d3 < 0 && d4 > 0)) {
            return true;
        }
        (d1 == 0 && on_segment(other.a, other.b, self.a))
            || (d2 == 0 && on_segment(other.a, other.b, self.b))
            || (d3 == 0 && on_segment(self.a, self.b, other.a))
            || (d4 == 0 && on_segment(self.a, self.b, other.b))
    }

    /// Intersection point of two non-parallel segments.
    pub fn intersection(&self, other: &Line) -> Option<Point> {
        let r = self.direction();
        let s = other.direction();
        let denom = cross2(r, s);
        if denom == 0 {
            return None;
        }
        let qp = other.a - self.a;
        let t = cross2(qp, s) as f64 / denom as f64;
        let u = cross2(qp, r) as f64 / denom as f64;
        if !(0.0..=1.0).contains(&t) || !(0.0..=1.0).contains(&u) {
            return None;
        }
        Some(Point::new(
            self.a.x + (r.x as f64 * t).round() as Coord,
            self.a.y + (r.y as f64 * t).round() as Coord,
        ))
    }

    /// True when the undirected angle between this line and `angle` is below `tolerance` (radians).
    pub fn parallel_to_angle(&self, angle: CoordF, tolerance: CoordF) -> bool {
        let mut diff = (self.direction_angle() - angle.rem_euclid(std::f64::consts::PI)).abs();
        if diff > std::f64::consts::FRAC_PI_2 {
            diff = std::f64::consts::PI - diff;
        }
        diff < tolerance
    }
}

#[inline]
fn orient(a: Point, b: Point, c: Point) -> i128 {
    cross2(b - a, c - a)
}

#[inline]
fn on_segment(a: Point, b: Point, p: Point) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

impl fmt::Debug for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line({:?} -> {:?})", self.a, self.b)
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({:.3}mm)", self.a, self.b, unscale(self.length() as Coord))
    }
}
