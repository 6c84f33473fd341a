//! Point types.
//!
//! [`Point`] holds scaled integer coordinates, [`PointF`] holds unscaled
//! millimetre coordinates.

use crate::{scale, unscale, Coord, CoordF};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// A 2D point with scaled integer coordinates.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    pub x: Coord,
    pub y: Coord,
}

pub type Points = Vec<Point>;

impl Point {
    #[inline]
    pub const fn new(x: Coord, y: Coord) -> Self {
        Self { x, y }
    }

    /// Create a point from millimetre coordinates.
    #[inline]
    pub fn new_scale(x: CoordF, y: CoordF) -> Self {
        Self::new(scale(x), scale(y))
    }

    #[inline]
    pub const fn zero() -> Self {
        Self { x: 0, y: 0 }
    }

    /// Squared distance, widened so it cannot overflow for any pair of scaled points.
    #[inline]
    pub fn distance_squared(&self, other: &Point) -> i128 {
        let dx = (self.x - other.x) as i128;
        let dy = (self.y - other.y) as i128;
        dx * dx + dy * dy
    }

    /// Euclidean distance in scaled units.
    #[inline]
    pub fn distance(&self, other: &Point) -> CoordF {
        (self.distance_squared(other) as CoordF).sqrt()
    }

    /// Rotate around the origin by `angle` radians.
    pub fn rotated(&self, angle: CoordF) -> Self {
        let (s, c) = angle.sin_cos();
        let x = self.x as CoordF;
        let y = self.y as CoordF;
        Self::new((c * x - s * y).round() as Coord, (s * x + c * y).round() as Coord)
    }

    #[inline]
    pub fn to_f(&self) -> PointF {
        PointF::new(unscale(self.x), unscale(self.y))
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", unscale(self.x), unscale(self.y))
    }
}

impl Add for Point {
    type Output = Point;
    #[inline]
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    #[inline]
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Point {
    type Output = Point;
    #[inline]
    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

/// A 2D point with unscaled (mm) coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PointF {
    pub x: CoordF,
    pub y: CoordF,
}

impl PointF {
    #[inline]
    pub const fn new(x: CoordF, y: CoordF) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn length(&self) -> CoordF {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    #[inline]
    pub fn distance(&self, other: &PointF) -> CoordF {
        (*self - *other).length()
    }

    /// Unit vector in the same direction, or zero for a zero vector.
    pub fn normalized(&self) -> PointF {
        let len = self.length();
        if len > 0.0 {
            PointF::new(self.x / len, self.y / len)
        } else {
            PointF::default()
        }
    }

    #[inline]
    pub fn to_scaled(&self) -> Point {
        Point::new_scale(self.x, self.y)
    }
}

impl Add for PointF {
    type Output = PointF;
    #[inline]
    fn add(self, rhs: PointF) -> PointF {
        PointF::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for PointF {
    type Output = PointF;
    #[inline]
    fn sub(self, rhs: PointF) -> PointF {
        PointF::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<CoordF> for PointF {
    type Output = PointF;
    #[inline]
    fn mul(self, rhs: CoordF) -> PointF {
        PointF::new(self.x * rhs, self.y * rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_arithmetic() {
        let a = Point::new(3, 4);
        let b = Point::new(1, 1);
        assert_eq!(a + b, Point::new(4, 5));
        assert_eq!(a - b, Point::new(2, 3));
        assert_eq!(-a, Point::new(-3, -4));
    }

    #[test]
    fn test_point_distance() {
        let a = Point::new(0, 0);
        let b = Point::new(3, 4);
        assert_eq!(a.distance_squared(&b), 25);
        assert!((a.distance(&b) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_point_distance_squared_no_overflow() {
        let a = Point::new(-4_000_000_000_000, 0);
        let b = Point::new(4_000_000_000_000, 0);
        assert!(a.distance_squared(&b) > 0);
    }

    #[test]
    fn test_point_scale_roundtrip() {
        let p = Point::new_scale(1.5, -2.25);
        assert_eq!(p, Point::new(1_500_000, -2_250_000));
        let f = p.to_f();
        assert!((f.x - 1.5).abs() < 1e-9);
        assert!((f.y + 2.25).abs() < 1e-9);
    }

    #[test]
    fn test_point_rotated() {
        let p = Point::new(1_000_000, 0).rotated(std::f64::consts::FRAC_PI_2);
        assert_eq!(p.x, 0);
        assert_eq!(p.y, 1_000_000);
    }

    #[test]
    fn test_pointf_normalized() {
        let v = PointF::new(3.0, 4.0).normalized();
        assert!((v.length() - 1.0).abs() < 1e-12);
        assert_eq!(PointF::default().normalized(), PointF::default());
    }
}
