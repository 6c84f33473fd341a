//! Closed polygon type.
//!
//! Points are stored without repeating the first point. A counter-clockwise
//! polygon has positive signed area.

use super::{cross2, BoundingBox, Line, Point};
use crate::{Coord, CoordF};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Polygon {
    points: Vec<Point>,
}

pub type Polygons = Vec<Polygon>;

impl Polygon {
    #[inline]
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    #[inline]
    pub fn from_points(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Axis-aligned rectangle, counter-clockwise.
    pub fn rectangle(min: Point, max: Point) -> Self {
        Self::from_points(vec![
            min,
            Point::new(max.x, min.y),
            max,
            Point::new(min.x, max.y),
        ])
    }

    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    #[inline]
    pub fn into_points(self) -> Vec<Point> {
        self.points
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Signed area in scaled units squared (shoelace).
    pub fn signed_area(&self) -> CoordF {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let mut acc: i128 = 0;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            acc += cross2(a, b);
        }
        acc as CoordF * 0.5
    }

    #[inline]
    pub fn area(&self) -> CoordF {
        self.signed_area().abs()
    }

    #[inline]
    pub fn is_counter_clockwise(&self) -> bool {
        self.signed_area() > 0.0
    }

    pub fn make_counter_clockwise(&mut self) {
        if self.signed_area() < 0.0 {
            self.points.reverse();
        }
    }

    pub fn make_clockwise(&mut self) {
        if self.signed_area() > 0.0 {
            self.points.reverse();
        }
    }

    pub fn reverse(&mut self) {
        self.points.reverse();
    }

    pub fn perimeter(&self) -> CoordF {
        self.edges().iter().map(|l| l.length()).sum()
    }

    /// Closed edge list, including the edge from the last point back to the first.
    pub fn edges(&self) -> Vec<Line> {
        let n = self.points.len();
        if n < 2 {
            return Vec::new();
        }
        (0..n)
            .map(|i| Line::new(self.points[i], self.points[(i + 1) % n]))
            .collect()
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(&self.points)
    }

    /// Even-odd point containment. Points exactly on the boundary may go either way.
    pub fn contains_point(&self, p: &Point) -> bool {
        let n = self.points.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let pi = self.points[i];
            let pj = self.points[j];
            if (pi.y > p.y) != (pj.y > p.y) {
                let t = (p.y - pi.y) as f64 / (pj.y - pi.y) as f64;
                let x_cross = pi.x as f64 + t * (pj.x - pi.x) as f64;
                if (p.x as f64) < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    /// Drop consecutive duplicates, including a closing duplicate of the first point.
    pub fn remove_duplicate_points(&mut self) {
        self.points.dedup();
        while self.points.len() > 1 && self.points.first() == self.points.last() {
            self.points.pop();
        }
    }

    /// True when any two non-adjacent edges cross. Checks all edge pairs.
    pub fn is_self_intersecting(&self) -> bool {
        let edges = self.edges();
        let n = edges.len();
        if n < 4 {
            return false;
        }
        for i in 0..n {
            for j in (i + 2)..n {
                if i == 0 && j == n - 1 {
                    continue;
                }
                if edges[i].intersects(&edges[j]) {
                    return true;
                }
            }
        }
        false
    }

    /// A polygon with fewer than three points or zero area.
    pub fn is_degenerate(&self) -> bool {
        self.points.len() < 3 || self.signed_area() == 0.0
    }

    pub fn translate(&mut self, v: Point) {
        for p in &mut self.points {
            *p = *p + v;
        }
    }

    pub fn centroid(&self) -> Point {
        if self.points.is_empty() {
            return Point::zero();
        }
        let n = self.points.len() as i128;
        let sx: i128 = self.points.iter().map(|p| p.x as i128).sum();
        let sy: i128 = self.points.iter().map(|p| p.y as i128).sum();
        Point::new((sx / n) as Coord, (sy / n) as Coord)
    }
}

impl fmt::Debug for Polygon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Polygon({} pts)", self.points.len())
    }
}

impl From<Vec<Point>> for Polygon {
    fn from(points: Vec<Point>) -> Self {
        Self::from_points(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: Coord) -> Polygon {
        Polygon::rectangle(Point::new(0, 0), Point::new(size, size))
    }

    #[test]
    fn test_polygon_area_and_orientation() {
        let mut sq = square(10);
        assert_eq!(sq.signed_area(), 100.0);
        assert!(sq.is_counter_clockwise());
        sq.make_clockwise();
        assert_eq!(sq.signed_area(), -100.0);
        assert_eq!(sq.area(), 100.0);
    }

    #[test]
    fn test_polygon_contains_point() {
        let sq = square(10);
        assert!(sq.contains_point(&Point::new(5, 5)));
        assert!(!sq.contains_point(&Point::new(15, 5)));
        assert!(!sq.contains_point(&Point::new(-1, -1)));
    }

    #[test]
    fn test_polygon_bowtie_self_intersects() {
        let bowtie = Polygon::from_points(vec![
            Point::new(0, 0),
            Point::new(10, 10),
            Point::new(10, 0),
            Point::new(0, 10),
        ]);
        assert!(bowtie.is_self_intersecting());
        assert!(!square(10).is_self_intersecting());
    }

    #[test]
    fn test_polygon_remove_duplicate_points() {
        let mut p = Polygon::from_points(vec![
            Point::new(0, 0),
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 0),
        ]);
        p.remove_duplicate_points();
        assert_eq!(p.len(), 3);
    }

    #[test]
    fn test_polygon_degenerate() {
        let line = Polygon::from_points(vec![Point::new(0, 0), Point::new(5, 0), Point::new(10, 0)]);
        assert!(line.is_degenerate());
        assert!(!square(3).is_degenerate());
    }

    #[test]
    fn test_polygon_perimeter() {
        assert_eq!(square(10).perimeter(), 40.0);
    }
}
