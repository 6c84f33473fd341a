//! Raw cross-sections from the mesh slicer, and their repair.

use crate::clipper::{union_ex, union_polygons_ex};
use crate::geometry::{ExPolygon, ExPolygons, Polygon, Polygons};
use crate::{CoordF, Result};

/// Cuts the model of one print region at a height.
///
/// Returned rings follow the usual convention: counter-clockwise contours,
/// clockwise holes. They may be degenerate or self-intersecting; callers
/// repair them.
pub trait MeshSlicer: Send + Sync {
    fn slice(&self, region_id: usize, slice_z: CoordF) -> Result<Polygons>;
}

impl<F> MeshSlicer for F
where
    F: Fn(usize, CoordF) -> Result<Polygons> + Send + Sync,
{
    fn slice(&self, region_id: usize, slice_z: CoordF) -> Result<Polygons> {
        self(region_id, slice_z)
    }
}

/// Repaired per-region cross-sections of one layer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawSlices {
    /// Indexed by region id.
    pub regions: Vec<ExPolygons>,
    /// True when any input ring needed repair.
    pub repaired: bool,
}

impl RawSlices {
    /// Union of every region's slices.
    pub fn merged(&self) -> ExPolygons {
        let all: ExPolygons = self.regions.iter().flatten().cloned().collect();
        union_ex(&all)
    }

    pub fn is_empty(&self) -> bool {
        self.regions.iter().all(|r| r.is_empty())
    }
}

/// Turn raw rings into valid expolygons.
///
/// Duplicate points are dropped, degenerate rings discarded, and
/// self-intersections and overlaps resolved by a non-zero union. The flag
/// reports whether any of that was needed. A ring set the union changes
/// shows it in a different ring count or net area, so no separate
/// intersection test runs on the input.
pub fn repair_polygons(mut polygons: Polygons) -> (ExPolygons, bool) {
    let mut repaired = false;
    for p in &mut polygons {
        let before = p.len();
        p.remove_duplicate_points();
        if p.len() != before {
            repaired = true;
        }
    }
    let before = polygons.len();
    polygons.retain(|p| !p.is_degenerate());
    if polygons.len() != before {
        repaired = true;
    }

    let expolygons = union_polygons_ex(&polygons);
    if !repaired {
        repaired = union_changed_rings(&polygons, &expolygons);
    }
    (expolygons, repaired)
}

/// Union output differs from its input rings beyond Clipper's rounding.
fn union_changed_rings(input: &[Polygon], output: &[ExPolygon]) -> bool {
    let rings_in = input.len();
    let rings_out: usize = output.iter().map(|e| 1 + e.holes.len()).sum();
    if rings_in != rings_out {
        return true;
    }
    let area_in: CoordF = input.iter().map(|p| p.signed_area()).sum();
    let area_out: CoordF = output.iter().map(|e| e.area()).sum();
    let perimeter: CoordF = input.iter().map(|p| p.perimeter()).sum();
    // Clipper rounds to a micron grid; allow a micron-wide band per edge.
    let tolerance = perimeter * ROUNDING_BAND;
    (area_in - area_out).abs() > tolerance
}

/// One micron in scaled units.
const ROUNDING_BAND: CoordF = crate::SCALING_FACTOR * 1e-3;
