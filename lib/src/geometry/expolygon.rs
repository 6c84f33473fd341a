//! Polygon with holes.

use super::{BoundingBox, Point, Polygon, Polygons};
use crate::CoordF;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A region bounded by one counter-clockwise contour and zero or more clockwise holes.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExPolygon {
    pub contour: Polygon,
    pub holes: Vec<Polygon>,
}

pub type ExPolygons = Vec<ExPolygon>;

impl ExPolygon {
    pub fn new(contour: Polygon) -> Self {
        Self {
            contour,
            holes: Vec::new(),
        }
    }

    pub fn with_holes(contour: Polygon, holes: Vec<Polygon>) -> Self {
        Self { contour, holes }
    }

    /// Area in scaled units squared, holes subtracted.
    pub fn area(&self) -> CoordF {
        let holes: CoordF = self.holes.iter().map(|h| h.area()).sum();
        self.contour.area() - holes
    }

    pub fn is_empty(&self) -> bool {
        self.contour.len() < 3
    }

    /// Inside the contour and outside every hole.
    pub fn contains_point(&self, p: &Point) -> bool {
        self.contour.contains_point(p) && !self.holes.iter().any(|h| h.contains_point(p))
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.contour.bounding_box()
    }

    /// Contour followed by holes.
    pub fn to_polygons(&self) -> Polygons {
        let mut out = Vec::with_capacity(1 + self.holes.len());
        out.push(self.contour.clone());
        out.extend(self.holes.iter().cloned());
        out
    }

    pub fn translate(&mut self, v: Point) {
        self.contour.translate(v);
        for h in &mut self.holes {
            h.translate(v);
        }
    }
}

impl From<Polygon> for ExPolygon {
    fn from(mut contour: Polygon) -> Self {
        contour.make_counter_clockwise();
        Self::new(contour)
    }
}

impl fmt::Debug for ExPolygon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ExPolygon(contour={} pts, holes={})",
            self.contour.len(),
            self.holes.len()
        )
    }
}

/// Total area of a set of expolygons in scaled units squared.
pub fn total_area(expolygons: &[ExPolygon]) -> CoordF {
    expolygons.iter().map(|e| e.area()).sum()
}

/// Flatten expolygons into their contours and holes.
pub fn to_polygons(expolygons: &[ExPolygon]) -> Polygons {
    expolygons.iter().flat_map(|e| e.to_polygons()).collect()
}

/// Combined bounding box.
pub fn get_extents(expolygons: &[ExPolygon]) -> BoundingBox {
    let mut bb = BoundingBox::default();
    for e in expolygons {
        bb.merge(&e.bounding_box());
    }
    bb
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> ExPolygon {
        let mut hole = Polygon::rectangle(Point::new(2, 2), Point::new(8, 8));
        hole.make_clockwise();
        ExPolygon::with_holes(Polygon::rectangle(Point::new(0, 0), Point::new(10, 10)), vec![hole])
    }

    #[test]
    fn test_expolygon_area_with_hole() {
        assert_eq!(frame().area(), 100.0 - 36.0);
    }

    #[test]
    fn test_expolygon_contains_point() {
        let f = frame();
        assert!(f.contains_point(&Point::new(1, 1)));
        assert!(!f.contains_point(&Point::new(5, 5)));
    }

    #[test]
    fn test_expolygon_from_clockwise_polygon() {
        let mut p = Polygon::rectangle(Point::new(0, 0), Point::new(4, 4));
        p.make_clockwise();
        let e: ExPolygon = p.into();
        assert!(e.contour.is_counter_clockwise());
    }

    #[test]
    fn test_get_extents() {
        let a: ExPolygon = Polygon::rectangle(Point::new(0, 0), Point::new(4, 4)).into();
        let b: ExPolygon = Polygon::rectangle(Point::new(10, -3), Point::new(12, 1)).into();
        let bb = get_extents(&[a, b]);
        assert_eq!(bb.min, Point::new(0, -3));
        assert_eq!(bb.max, Point::new(12, 4));
    }
}
