//! One horizontal slab of a print object.
//!
//! A [`Layer`] owns one [`LayerRegion`] per print region and moves through
//! a fixed sequence of stages:
//!
//! ```text
//! Created -> Sliced -> Merged -> PerimetersDone -> FillsDone
//! ```
//!
//! Each processing call checks the stage it needs and fails with
//! [`Error::Stage`] when called out of order. External-surface correction
//! runs while the layer is `Merged`.

use crate::clipper::{difference, point_in_expolygons, union, union_ex};
use crate::config::PrintRegionConfig;
use crate::geometry::{ExPolygon, ExPolygons, Point};
use crate::perimeter::chain_expolygons;
use crate::slice::layer_region::{LayerRegion, PerimeterStats};
use crate::slice::source::{repair_polygons, MeshSlicer, RawSlices};
use crate::slice::surface::{SurfaceClassifier, SurfaceCollection};
use crate::{CoordF, Error, Result};
use log::{debug, trace};
use rayon::prelude::*;
use std::sync::Arc;

/// Processing stage of a layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LayerStage {
    #[default]
    Created,
    Sliced,
    Merged,
    PerimetersDone,
    FillsDone,
}

#[derive(Debug, Clone)]
pub struct Layer {
    id: usize,
    slice_z: CoordF,
    print_z: CoordF,
    height: CoordF,
    lower_layer_id: Option<usize>,
    upper_layer_id: Option<usize>,
    regions: Vec<LayerRegion>,
    /// Merged islands in print order.
    pub slices: ExPolygons,
    /// Input geometry needed repair. Processing continues regardless.
    pub slicing_errors: bool,
    stage: LayerStage,
}

impl Layer {
    pub fn new(id: usize, slice_z: CoordF, print_z: CoordF, height: CoordF) -> Self {
        Self {
            id,
            slice_z,
            print_z,
            height,
            lower_layer_id: None,
            upper_layer_id: None,
            regions: Vec::new(),
            slices: Vec::new(),
            slicing_errors: false,
            stage: LayerStage::Created,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: usize) {
        self.id = id;
        self.regions.iter_mut().for_each(|r| r.set_layer_id(id));
    }

    pub fn slice_z(&self) -> CoordF {
        self.slice_z
    }

    pub fn print_z(&self) -> CoordF {
        self.print_z
    }

    pub fn height(&self) -> CoordF {
        self.height
    }

    pub fn bottom_z(&self) -> CoordF {
        self.print_z - self.height
    }

    pub fn lower_layer_id(&self) -> Option<usize> {
        self.lower_layer_id
    }

    pub fn upper_layer_id(&self) -> Option<usize> {
        self.upper_layer_id
    }

    pub(crate) fn set_lower_layer_id(&mut self, id: Option<usize>) {
        self.lower_layer_id = id;
    }

    pub(crate) fn set_upper_layer_id(&mut self, id: Option<usize>) {
        self.upper_layer_id = id;
    }

    pub fn stage(&self) -> LayerStage {
        self.stage
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn region(&self, idx: usize) -> Option<&LayerRegion> {
        self.regions.get(idx)
    }

    pub fn region_mut(&mut self, idx: usize) -> Option<&mut LayerRegion> {
        self.regions.get_mut(idx)
    }

    pub fn regions(&self) -> &[LayerRegion] {
        &self.regions
    }

    /// Append a region; its id is its index.
    pub fn add_region(&mut self, config: Arc<PrintRegionConfig>) -> &mut LayerRegion {
        let region_id = self.regions.len();
        self.regions.push(LayerRegion::new(self.id, region_id, config, self.height));
        let last = self.regions.len() - 1;
        &mut self.regions[last]
    }

    /// No islands and no region slices.
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty() && self.regions.iter().all(|r| r.slices.is_empty())
    }

    /// Slices of every region, unmerged.
    pub fn all_region_slices(&self) -> ExPolygons {
        self.regions.iter().flat_map(|r| r.slices.expolygons()).collect()
    }

    pub fn any_internal_region_slice_contains(&self, point: &Point) -> bool {
        self.regions.iter().any(|r| {
            r.slices
                .iter()
                .any(|s| s.surface_type.is_internal() && s.expolygon.contains_point(point))
        })
    }

    pub fn any_bottom_region_slice_contains(&self, point: &Point) -> bool {
        self.regions.iter().any(|r| {
            r.slices
                .iter()
                .any(|s| s.surface_type.is_bottom() && s.expolygon.contains_point(point))
        })
    }

    pub fn has_extrusions(&self) -> bool {
        self.regions.iter().any(|r| r.has_extrusions())
    }

    fn require(&self, operation: &'static str, required: LayerStage) -> Result<()> {
        if self.stage != required {
            return Err(Error::Stage {
                layer_id: self.id,
                operation,
                required,
                actual: self.stage,
            });
        }
        Ok(())
    }

    /// Wrap an error from this layer's processing as a layer failure.
    fn fail(&self, err: Error) -> Error {
        match err {
            Error::LayerFailed { .. } | Error::Stage { .. } | Error::Cancelled => err,
            other => Error::LayerFailed {
                layer_id: self.id,
                print_z: self.print_z,
                reason: other.to_string(),
            },
        }
    }

    /// Cut every region at `slice_z` and repair the result.
    pub fn slice_regions(&self, slicer: &dyn MeshSlicer) -> Result<RawSlices> {
        let mut raw = RawSlices::default();
        for region_id in 0..self.regions.len() {
            let polygons = slicer.slice(region_id, self.slice_z).map_err(|e| self.fail(e))?;
            let (expolygons, repaired) = repair_polygons(polygons);
            raw.repaired |= repaired;
            raw.regions.push(expolygons);
        }
        Ok(raw)
    }

    /// Classify each region's raw slices against the neighbouring layers.
    pub fn make_slices(
        &mut self,
        raw: &RawSlices,
        below: Option<&RawSlices>,
        above: Option<&RawSlices>,
        classifier: &dyn SurfaceClassifier,
    ) -> Result<()> {
        self.require("make_slices", LayerStage::Created)?;
        let below = below.map(|b| b.merged());
        let above = above.map(|a| a.merged());
        for (idx, region) in self.regions.iter_mut().enumerate() {
            let slices = raw.regions.get(idx).map(|s| s.as_slice()).unwrap_or(&[]);
            region.slices =
                SurfaceCollection::from_surfaces(classifier.classify(slices, below.as_deref(), above.as_deref()));
        }
        if raw.repaired {
            self.slicing_errors = true;
        }
        self.stage = LayerStage::Sliced;
        Ok(())
    }

    /// Union all region slices into islands, chained for short travel.
    pub fn merge_slices(&mut self) -> Result<()> {
        self.require("merge_slices", LayerStage::Sliced)?;
        let merged = union_ex(&self.all_region_slices());
        self.slices = chain_expolygons(&merged).into_iter().map(|i| merged[i].clone()).collect();
        trace!("layer {}: {} islands", self.id, self.slices.len());
        self.stage = LayerStage::Merged;
        Ok(())
    }

    /// Bridge correction for every region against the islands of the layer below.
    pub fn process_external_surfaces(&mut self, lower: Option<&[ExPolygon]>) -> Result<()> {
        self.require("process_external_surfaces", LayerStage::Merged)?;
        for idx in 0..self.regions.len() {
            let result = self.regions[idx].process_external_surfaces(lower);
            result.map_err(|e| self.fail(e))?;
        }
        Ok(())
    }

    /// Perimeters for every region, then fill surfaces with overlaps between
    /// regions resolved in favour of the lower region index.
    pub fn make_perimeters(&mut self) -> Result<()> {
        self.require("make_perimeters", LayerStage::Merged)?;
        let results: Vec<(LayerRegion, PerimeterStats)> = self
            .regions
            .par_iter()
            .map(|region| -> Result<(LayerRegion, PerimeterStats)> {
                let mut region = region.clone();
                let slices = region.slices.clone();
                let mut fill_surfaces = SurfaceCollection::new();
                let stats = region.make_perimeters(&slices, &mut fill_surfaces)?;
                region.fill_surfaces = fill_surfaces;
                Ok((region, stats))
            })
            .collect::<Result<_>>()
            .map_err(|e| self.fail(e))?;

        let mut regions = Vec::with_capacity(results.len());
        for (region, stats) in results {
            if stats.no_valid_contour {
                self.slicing_errors = true;
            }
            if stats.produced_nothing() {
                return Err(Error::LayerFailed {
                    layer_id: self.id,
                    print_z: self.print_z,
                    reason: format!("region {} produced no perimeters, thin fills or fill area", region.region_id()),
                });
            }
            regions.push(region);
        }

        let mut claimed: ExPolygons = Vec::new();
        for region in &mut regions {
            region.fill_no_overlap_expolygons = if claimed.is_empty() {
                region.fill_expolygons.clone()
            } else {
                difference(&region.fill_expolygons, &claimed)
            };
            claimed = union(&claimed, &region.fill_expolygons);
            region.slices_to_fill_surfaces_clipped();
        }
        self.regions = regions;
        self.stage = LayerStage::PerimetersDone;
        Ok(())
    }

    /// Infill for every region.
    pub fn make_fills(&mut self) -> Result<()> {
        self.require("make_fills", LayerStage::PerimetersDone)?;
        let id = self.id;
        let regions: Vec<LayerRegion> = self
            .regions
            .par_iter()
            .map(|region| -> Result<LayerRegion> {
                let mut region = region.clone();
                region.prepare_fill_surfaces()?;
                region.make_fills(id)?;
                Ok(region)
            })
            .collect::<Result<_>>()
            .map_err(|e| self.fail(e))?;

        let expects_output = regions.iter().any(|r| r.config().perimeters > 0);
        if !self.slices.is_empty() && expects_output && !regions.iter().any(|r| r.has_extrusions()) {
            return Err(Error::LayerFailed {
                layer_id: self.id,
                print_z: self.print_z,
                reason: "non-empty layer produced no extrusions".into(),
            });
        }
        self.regions = regions;
        debug!(
            "layer {} (z={:.3}): {} islands, extrusions: {}",
            self.id,
            self.print_z,
            self.slices.len(),
            self.has_extrusions()
        );
        self.stage = LayerStage::FillsDone;
        Ok(())
    }

    pub fn clear_extrusions(&mut self) {
        self.regions.iter_mut().for_each(|r| r.clear_extrusions());
    }

    /// True when `point` is inside one of the merged islands.
    pub fn contains_point(&self, point: &Point) -> bool {
        point_in_expolygons(point, &self.slices)
    }
}
