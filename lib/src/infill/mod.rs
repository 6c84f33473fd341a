//! Infill pattern generation.
//!
//! Infill fills the area left inside perimeters. Line patterns are built by
//! covering the bounding box of the fill area with parallel scanlines and
//! clipping them to the area:
//! - Rectilinear: one direction per layer, rotated by `angle_increment` on
//!   every layer.
//! - Grid: two crossing directions on every layer.
//! - Concentric: repeated inward offsets of the area boundary.
//!
//! Bridges use rectilinear at full density with a fixed angle.
//!
//! With `connect_infill` on, consecutive line pieces are joined into one
//! path when the gap between them is short and the connector stays inside
//! the fill area.

use crate::clipper::{diff_pl, grow, intersect_polylines_with_expolygons, shrink, OffsetJoinType};
use crate::config::InfillPattern;
use crate::geometry::{get_extents, ExPolygon, ExPolygons, Point, Polygon, Polyline, Polylines};
use crate::{scale, unscale, Coord, CoordF};

/// Configuration for infill generation.
#[derive(Debug, Clone)]
pub struct InfillConfig {
    pub pattern: InfillPattern,
    /// 0.0 - 1.0, where 1.0 is solid.
    pub density: CoordF,
    /// Spacing of adjacent lines at 100% density (mm).
    pub extrusion_spacing: CoordF,
    /// Degrees from the X axis.
    pub angle: CoordF,
    /// Added to the angle for each layer index.
    pub angle_increment: CoordF,
    /// Outward growth of the fill area into the perimeters (mm).
    pub overlap: CoordF,
    /// Fill areas below this are skipped (mm²).
    pub min_area: CoordF,
    /// Alternate scan direction between adjacent lines.
    pub zigzag: bool,
    /// Join adjacent lines into continuous paths where possible.
    pub connect_infill: bool,
}

/// Connectors may be at most this many line spacings long.
const CONNECT_DISTANCE_FACTOR: CoordF = 2.5;
/// Slack (mm) for connectors running along the area boundary.
const CONNECT_TOLERANCE: CoordF = 0.01;

impl Default for InfillConfig {
    fn default() -> Self {
        Self {
            pattern: InfillPattern::Rectilinear,
            density: 0.2,
            extrusion_spacing: 0.45,
            angle: 45.0,
            angle_increment: 90.0,
            overlap: 0.0,
            min_area: 0.01,
            zigzag: true,
            connect_infill: true,
        }
    }
}

impl InfillConfig {
    /// Solid rectilinear fill.
    pub fn solid(extrusion_spacing: CoordF) -> Self {
        Self {
            pattern: InfillPattern::Rectilinear,
            density: 1.0,
            extrusion_spacing,
            ..Default::default()
        }
    }

    /// Solid fill at a fixed angle on every layer.
    pub fn bridge(extrusion_spacing: CoordF, angle_deg: CoordF) -> Self {
        Self {
            angle: angle_deg,
            angle_increment: 0.0,
            ..Self::solid(extrusion_spacing)
        }
    }

    pub fn with_density(density: CoordF) -> Self {
        Self {
            density: density.clamp(0.0, 1.0),
            ..Default::default()
        }
    }

    /// Distance between adjacent lines of one direction (mm).
    pub fn line_spacing(&self) -> CoordF {
        if self.density <= 0.0 {
            return CoordF::MAX;
        }
        if self.density >= 1.0 {
            return self.extrusion_spacing;
        }
        self.extrusion_spacing / self.density
    }

    pub fn angle_for_layer(&self, layer_index: usize) -> CoordF {
        self.angle + self.angle_increment * layer_index as CoordF
    }
}

/// A single infill path.
#[derive(Debug, Clone, PartialEq)]
pub enum InfillPath {
    Line(Polyline),
    Loop(Polygon),
}

impl InfillPath {
    pub fn length_mm(&self) -> CoordF {
        let len = match self {
            InfillPath::Line(polyline) => polyline.length(),
            InfillPath::Loop(polygon) => polygon.perimeter(),
        };
        unscale(len as Coord)
    }

    pub fn is_loop(&self) -> bool {
        matches!(self, InfillPath::Loop(_))
    }

    /// Open polyline; loops are closed by repeating their first point.
    pub fn to_polyline(&self) -> Polyline {
        match self {
            InfillPath::Line(polyline) => polyline.clone(),
            InfillPath::Loop(polygon) => Polyline::from_polygon(polygon),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InfillResult {
    /// Paths in print order.
    pub paths: Vec<InfillPath>,
    pub total_length_mm: CoordF,
}

impl InfillResult {
    pub fn has_infill(&self) -> bool {
        !self.paths.is_empty()
    }

    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    fn calculate_total_length(&mut self) {
        self.total_length_mm = self.paths.iter().map(|p| p.length_mm()).sum();
    }
}

#[derive(Debug, Clone)]
pub struct InfillGenerator {
    config: InfillConfig,
}

impl InfillGenerator {
    pub fn new(config: InfillConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InfillConfig {
        &self.config
    }

    /// Generate infill for `infill_area` on the layer with the given index.
    pub fn generate(&self, infill_area: &[ExPolygon], layer_index: usize) -> InfillResult {
        let mut result = InfillResult::default();
        if infill_area.is_empty() || self.config.density <= 0.0 {
            return result;
        }

        let min_area = self.config.min_area * crate::SCALING_FACTOR * crate::SCALING_FACTOR;
        let fill_area: ExPolygons = if self.config.overlap > 0.0 {
            grow(infill_area, self.config.overlap, OffsetJoinType::Miter)
        } else {
            infill_area.to_vec()
        }
        .into_iter()
        .filter(|e| e.area() >= min_area)
        .collect();
        if fill_area.is_empty() {
            return result;
        }

        let angle = self.config.angle_for_layer(layer_index);
        let spacing = self.config.line_spacing();
        result.paths = match self.config.pattern {
            InfillPattern::Rectilinear => self.generate_rectilinear(&fill_area, angle, spacing),
            InfillPattern::Grid => {
                // Two directions share the density.
                let mut paths = self.generate_rectilinear(&fill_area, angle, spacing * 2.0);
                paths.extend(self.generate_rectilinear(&fill_area, angle + 90.0, spacing * 2.0));
                paths
            }
            InfillPattern::Concentric => self.generate_concentric(&fill_area, spacing),
        };
        result.calculate_total_length();
        result
    }

    fn generate_rectilinear(&self, fill_area: &[ExPolygon], angle_deg: CoordF, spacing_mm: CoordF) -> Vec<InfillPath> {
        let lines = scanlines(fill_area, angle_deg, spacing_mm);
        let mut polylines = Polylines::new();
        for (i, line) in lines.iter().enumerate() {
            let mut pieces = intersect_polylines_with_expolygons(std::slice::from_ref(line), fill_area);
            if self.config.zigzag && i % 2 == 1 {
                pieces.reverse();
                pieces.iter_mut().for_each(|p| p.reverse());
            }
            polylines.extend(pieces.into_iter().filter(|p| p.is_valid()));
        }
        if self.config.connect_infill {
            polylines = connect_infill_lines(polylines, fill_area, spacing_mm * CONNECT_DISTANCE_FACTOR);
        }
        polylines.into_iter().map(InfillPath::Line).collect()
    }

    fn generate_concentric(&self, fill_area: &[ExPolygon], spacing_mm: CoordF) -> Vec<InfillPath> {
        let mut paths = Vec::new();
        let mut current = shrink(fill_area, self.config.extrusion_spacing / 2.0, OffsetJoinType::Miter);
        while !current.is_empty() {
            for expoly in &current {
                for ring in std::iter::once(&expoly.contour).chain(expoly.holes.iter()) {
                    if ring.len() >= 3 {
                        paths.push(InfillPath::Loop(ring.clone()));
                    }
                }
            }
            current = shrink(&current, spacing_mm, OffsetJoinType::Miter);
        }
        paths
    }
}

/// Join each line to the next one in print order when the connector from
/// its end to the next start is at most `max_gap_mm` long and lies inside
/// `fill_area`. Lines that cannot be joined start a new path.
pub fn connect_infill_lines(lines: Polylines, fill_area: &[ExPolygon], max_gap_mm: CoordF) -> Polylines {
    let guard = grow(fill_area, CONNECT_TOLERANCE, OffsetJoinType::Miter);
    let max_gap = max_gap_mm * crate::SCALING_FACTOR;
    let mut connected = Polylines::new();
    let mut lines = lines.into_iter();
    let Some(mut current) = lines.next() else {
        return connected;
    };
    for next in lines {
        let joinable = match (current.last_point(), next.first_point()) {
            (Some(end), Some(start)) => {
                end.distance(&start) <= max_gap
                    && diff_pl(&[Polyline::from_points(vec![end, start])], &guard).is_empty()
            }
            _ => false,
        };
        if joinable {
            current.append(&next);
        } else {
            connected.push(std::mem::replace(&mut current, next));
        }
    }
    connected.push(current);
    connected
}

/// Parallel lines covering the extents of `area`, at `angle_deg` from the
/// X axis, `spacing_mm` apart.
///
/// Lines are phase-locked to the origin so that adjacent regions at the same
/// angle share scanlines.
pub fn scanlines(area: &[ExPolygon], angle_deg: CoordF, spacing_mm: CoordF) -> Polylines {
    let spacing = scale(spacing_mm);
    if spacing <= 0 || area.is_empty() {
        return vec![];
    }
    let bbox = get_extents(area);
    if !bbox.defined {
        return vec![];
    }

    let (sin_a, cos_a) = angle_deg.to_radians().sin_cos();
    let corners = [
        bbox.min,
        Point::new(bbox.max.x, bbox.min.y),
        bbox.max,
        Point::new(bbox.min.x, bbox.max.y),
    ];
    // Project the bbox onto the line direction (t) and its normal (n).
    let (mut t_min, mut t_max, mut n_min, mut n_max) = (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
    for c in corners {
        let (x, y) = (c.x as f64, c.y as f64);
        let t = x * cos_a + y * sin_a;
        let n = -x * sin_a + y * cos_a;
        t_min = t_min.min(t);
        t_max = t_max.max(t);
        n_min = n_min.min(n);
        n_max = n_max.max(n);
    }

    let step = spacing as f64;
    let first = (n_min / step).ceil() as i64;
    let last = (n_max / step).floor() as i64;
    let to_point = |t: f64, n: f64| Point::new((t * cos_a - n * sin_a).round() as Coord, (t * sin_a + n * cos_a).round() as Coord);
    (first..=last)
        .map(|k| {
            let n = k as f64 * step;
            Polyline::from_points(vec![to_point(t_min - step, n), to_point(t_max + step, n)])
        })
        .collect()
}
