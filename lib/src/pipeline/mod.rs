//! Pipeline module - drives a print object through the per-layer stages.
//!
//! ```text
//! slice + classify + merge  (parallel over layers)
//!          | barrier
//! external surfaces         (parallel, reads the layer below)
//! perimeters                (parallel)
//! fills                     (parallel)
//! ```
//!
//! Every stage maps the committed layers to new values and commits them
//! only when all layers succeeded, so an error or a cancellation leaves the
//! object at the end of the last completed stage.
//!
//! # Example
//!
//! ```rust,ignore
//! use slicer_core::{ExposureClassifier, Pipeline, PipelineConfig, PrintObject};
//!
//! let mut object = PrintObject::new(object_config, vec![region_config]);
//! object.generate_layers(20.0)?;
//!
//! let pipeline = Pipeline::new(PipelineConfig::new().threads(4));
//! let report = pipeline.run(&mut object, &mesh_slicer, &ExposureClassifier::default())?;
//! ```

use crate::print::PrintObject;
use crate::slice::{Layer, MeshSlicer, RawSlices, SurfaceClassifier};
use crate::{CoordF, Error, Result};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared flag that stops a running pipeline at the next layer boundary.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Error::Cancelled)` once cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Configuration for the pipeline.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Worker threads, `None` for the global rayon pool.
    pub threads: Option<usize>,

    pub cancellation: CancellationToken,

    /// Enable bridge detection on bottom surfaces.
    pub detect_bridges: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threads: None,
            cancellation: CancellationToken::new(),
            detect_bridges: true,
        }
    }
}

impl PipelineConfig {
    /// Create a new pipeline configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: run on a dedicated pool of `count` threads.
    pub fn threads(mut self, count: usize) -> Self {
        self.threads = Some(count);
        self
    }

    /// Builder: use an externally owned cancellation token.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Builder: enable or disable bridge detection.
    pub fn detect_bridges(mut self, enabled: bool) -> Self {
        self.detect_bridges = enabled;
        self
    }
}

/// Outcome of a completed run.
#[derive(Clone, Debug, Default)]
pub struct PipelineReport {
    /// Number of layers processed.
    pub layers: usize,
    /// Ids of layers whose input needed repair.
    pub repaired_layers: Vec<usize>,
    /// Non-fatal problems, one entry per kind.
    pub warnings: Vec<String>,
    pub elapsed: Duration,
}

/// Runs the layer stages of a [`PrintObject`].
#[derive(Clone, Debug, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.config.cancellation.clone()
    }

    /// Process every layer of `object`.
    pub fn run(
        &self,
        object: &mut PrintObject,
        slicer: &dyn MeshSlicer,
        classifier: &dyn SurfaceClassifier,
    ) -> Result<PipelineReport> {
        self.run_with_callback(object, slicer, classifier, |_, _| {})
    }

    /// Process every layer with a progress callback.
    ///
    /// The callback receives (stage_name, progress_0_to_1) between stages.
    pub fn run_with_callback<F>(
        &self,
        object: &mut PrintObject,
        slicer: &dyn MeshSlicer,
        classifier: &dyn SurfaceClassifier,
        mut callback: F,
    ) -> Result<PipelineReport>
    where
        F: FnMut(&str, f64) + Send,
    {
        match self.config.threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| Error::Config(format!("Failed to build thread pool: {e}")))?;
                pool.install(|| self.run_stages(object, slicer, classifier, &mut callback))
            }
            None => self.run_stages(object, slicer, classifier, &mut callback),
        }
    }

    fn run_stages<F>(
        &self,
        object: &mut PrintObject,
        slicer: &dyn MeshSlicer,
        classifier: &dyn SurfaceClassifier,
        callback: &mut F,
    ) -> Result<PipelineReport>
    where
        F: FnMut(&str, f64),
    {
        let start = Instant::now();
        let token = &self.config.cancellation;
        token.check()?;
        info!(
            "processing {} layers with {} threads",
            object.layer_count(),
            rayon::current_num_threads()
        );

        callback("slicing", 0.0);
        let stage_start = Instant::now();
        let raw: Vec<RawSlices> = object
            .layers()
            .par_iter()
            .map(|layer| -> Result<RawSlices> {
                token.check()?;
                layer.slice_regions(slicer)
            })
            .collect::<Result<_>>()?;
        let layers = {
            let raw = &raw;
            object
                .layers()
                .par_iter()
                .zip(raw.par_iter())
                .map(|(layer, own)| -> Result<Layer> {
                    token.check()?;
                    let below = layer.lower_layer_id().and_then(|i| raw.get(i));
                    let above = layer.upper_layer_id().and_then(|i| raw.get(i));
                    let mut layer = layer.clone();
                    layer.make_slices(own, below, above, classifier)?;
                    layer.merge_slices()?;
                    Ok(layer)
                })
                .collect::<Result<Vec<_>>>()?
        };
        object.commit_layers(layers)?;
        debug!("slicing done in {:.2?}", stage_start.elapsed());
        callback("slicing", 1.0);

        // Every layer is merged past this point; the layer below can be read.
        callback("external_surfaces", 0.0);
        if self.config.detect_bridges {
            let stage_start = Instant::now();
            let snapshot = object.layers();
            let layers = snapshot
                .par_iter()
                .map(|layer| -> Result<Layer> {
                    token.check()?;
                    let lower = layer
                        .lower_layer_id()
                        .and_then(|i| snapshot.get(i))
                        .map(|l| l.slices.as_slice());
                    let mut layer = layer.clone();
                    layer.process_external_surfaces(lower)?;
                    Ok(layer)
                })
                .collect::<Result<Vec<_>>>()?;
            object.commit_layers(layers)?;
            debug!("external surfaces done in {:.2?}", stage_start.elapsed());
        }
        callback("external_surfaces", 1.0);

        callback("perimeters", 0.0);
        self.map_layers(object, "perimeters", Layer::make_perimeters)?;
        callback("perimeters", 1.0);

        callback("fills", 0.0);
        self.map_layers(object, "fills", Layer::make_fills)?;
        callback("fills", 1.0);

        let report = self.report(object, start.elapsed());
        info!(
            "processed {} layers in {:.2?}",
            report.layers, report.elapsed
        );
        Ok(report)
    }

    /// Apply `op` to a copy of every layer and commit when all succeed.
    fn map_layers<Op>(&self, object: &mut PrintObject, stage: &str, op: Op) -> Result<()>
    where
        Op: Fn(&mut Layer) -> Result<()> + Sync,
    {
        let stage_start = Instant::now();
        let token = &self.config.cancellation;
        let layers = object
            .layers()
            .par_iter()
            .map(|layer| -> Result<Layer> {
                token.check()?;
                let mut layer = layer.clone();
                op(&mut layer)?;
                Ok(layer)
            })
            .collect::<Result<Vec<_>>>()?;
        object.commit_layers(layers)?;
        debug!("{} done in {:.2?}", stage, stage_start.elapsed());
        Ok(())
    }

    /// Collect repaired layers into a single warning.
    fn report(&self, object: &PrintObject, elapsed: Duration) -> PipelineReport {
        let repaired: Vec<(usize, CoordF)> = object
            .layers()
            .iter()
            .filter(|l| l.slicing_errors)
            .map(|l| (l.id(), l.print_z()))
            .collect();

        let mut warnings = Vec::new();
        if !repaired.is_empty() {
            let heights: Vec<String> = repaired.iter().map(|(_, z)| format!("{z:.2}")).collect();
            let message = format!(
                "Repaired invalid geometry on {} layer(s) at z = {} mm; the model may have \
                 self-intersecting or open facets, check the result",
                repaired.len(),
                heights.join(", ")
            );
            warn!("{message}");
            warnings.push(message);
        }

        PipelineReport {
            layers: object.layer_count(),
            repaired_layers: repaired.into_iter().map(|(id, _)| id).collect(),
            warnings,
            elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PrintObjectConfig, PrintRegionConfig};
    use crate::geometry::{ExPolygon, Point, Polygon, Polygons};
    use crate::slice::{ExposureClassifier, LayerStage, Surface, SurfaceType};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn square_mm(x: f64, y: f64, size: f64) -> Polygon {
        Polygon::rectangle(Point::new_scale(x, y), Point::new_scale(x + size, y + size))
    }

    fn bowtie_mm(x: f64, size: f64) -> Polygon {
        Polygon::from_points(vec![
            Point::new_scale(x, 0.0),
            Point::new_scale(x + size, size),
            Point::new_scale(x + size, 0.0),
            Point::new_scale(x, size),
        ])
    }

    fn make_object(height: f64) -> PrintObject {
        let config = PrintObjectConfig::new().layer_height(0.2).first_layer_height(0.2);
        let mut object = PrintObject::new(config, vec![PrintRegionConfig::default()]);
        object.generate_layers(height).unwrap();
        object
    }

    /// Marks every slice as bottom.
    struct AllBottom;

    impl SurfaceClassifier for AllBottom {
        fn classify(
            &self,
            slices: &[ExPolygon],
            _below: Option<&[ExPolygon]>,
            _above: Option<&[ExPolygon]>,
        ) -> Vec<Surface> {
            slices.iter().cloned().map(Surface::bottom).collect()
        }
    }

    #[test]
    fn test_pipeline_config_builder() {
        let token = CancellationToken::new();
        let config = PipelineConfig::new()
            .threads(2)
            .detect_bridges(false)
            .cancellation(token.clone());
        assert_eq!(config.threads, Some(2));
        assert!(!config.detect_bridges);
        token.cancel();
        assert!(config.cancellation.is_cancelled());
        assert!(matches!(config.cancellation.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_column_end_to_end() {
        init_logger();
        let mut object = make_object(1.0);
        let slicer = |_: usize, _: CoordF| -> Result<Polygons> { Ok(vec![square_mm(0.0, 0.0, 20.0)]) };

        let mut stages = Vec::new();
        let report = Pipeline::new(PipelineConfig::new().threads(2))
            .run_with_callback(&mut object, &slicer, &ExposureClassifier::default(), |stage, progress| {
                if progress == 1.0 {
                    stages.push(stage.to_string());
                }
            })
            .unwrap();

        assert_eq!(stages, vec!["slicing", "external_surfaces", "perimeters", "fills"]);
        assert_eq!(report.layers, 5);
        assert!(report.warnings.is_empty());
        assert!(report.repaired_layers.is_empty());
        for layer in object.layers() {
            assert_eq!(layer.stage(), LayerStage::FillsDone);
            assert_eq!(layer.slices.len(), 1);
            assert!(layer.has_extrusions());
        }

        let bottom = object.layer(0).unwrap().region(0).unwrap();
        assert!(bottom.slices.has_type(SurfaceType::Bottom));
        let top = object.layer(4).unwrap().region(0).unwrap();
        assert!(top.slices.has_type(SurfaceType::Top));
        let middle = object.layer(2).unwrap().region(0).unwrap();
        assert!(middle.slices.iter().all(|s| s.surface_type == SurfaceType::Internal));
    }

    #[test]
    fn test_unsupported_bottom_becomes_bridge() {
        let mut object = make_object(0.4);
        // Layer 0 holds only the left square; layer 1 adds a floating one.
        let slicer = |_: usize, z: CoordF| -> Result<Polygons> {
            if z < 0.2 {
                Ok(vec![square_mm(0.0, 0.0, 10.0)])
            } else {
                Ok(vec![square_mm(0.0, 0.0, 10.0), square_mm(20.0, 0.0, 10.0)])
            }
        };
        Pipeline::default().run(&mut object, &slicer, &AllBottom).unwrap();

        let region = object.layer(1).unwrap().region(0).unwrap();
        let bridges = region.slices.filter_by_type(SurfaceType::BottomBridge);
        assert_eq!(bridges.len(), 1);
        assert!(bridges[0].bridge_angle.is_some());
        assert!(bridges[0].expolygon.contains_point(&Point::new_scale(25.0, 5.0)));

        let bottoms = region.slices.filter_by_type(SurfaceType::Bottom);
        assert_eq!(bottoms.len(), 1);
        assert!(bottoms[0].expolygon.contains_point(&Point::new_scale(5.0, 5.0)));
        assert!((bottoms[0].area() - 100e12).abs() < 1e9);

        assert!(!region.unsupported_bridge_edges.is_empty());
        let (min, max) = (Point::new_scale(20.0, 0.0), Point::new_scale(30.0, 10.0));
        for edge in &region.unsupported_bridge_edges {
            for p in edge.points() {
                assert!(p.x >= min.x - 1000 && p.x <= max.x + 1000);
                assert!(p.y >= min.y - 1000 && p.y <= max.y + 1000);
            }
        }
        assert_eq!(region.bridged.len(), 1);

        // The first layer has nothing below and keeps plain bottom surfaces.
        let first = object.layer(0).unwrap().region(0).unwrap();
        assert!(!first.slices.has_type(SurfaceType::BottomBridge));
    }

    #[test]
    fn test_bridge_detection_disabled() {
        let mut object = make_object(0.4);
        let slicer = |_: usize, z: CoordF| -> Result<Polygons> {
            if z < 0.2 {
                Ok(vec![square_mm(0.0, 0.0, 10.0)])
            } else {
                Ok(vec![square_mm(20.0, 0.0, 10.0)])
            }
        };
        Pipeline::new(PipelineConfig::new().detect_bridges(false))
            .run(&mut object, &slicer, &AllBottom)
            .unwrap();
        let region = object.layer(1).unwrap().region(0).unwrap();
        assert!(!region.slices.has_type(SurfaceType::BottomBridge));
        assert!(region.unsupported_bridge_edges.is_empty());
    }

    #[test]
    fn test_cancel_before_run_leaves_object_unchanged() {
        let mut object = make_object(0.6);
        let token = CancellationToken::new();
        token.cancel();
        let slicer = |_: usize, _: CoordF| -> Result<Polygons> { Ok(vec![square_mm(0.0, 0.0, 10.0)]) };

        let pipeline = Pipeline::new(PipelineConfig::new().cancellation(token));
        let result = pipeline.run(&mut object, &slicer, &ExposureClassifier::default());
        assert!(matches!(result, Err(Error::Cancelled)));
        for layer in object.layers() {
            assert_eq!(layer.stage(), LayerStage::Created);
            assert!(layer.slices.is_empty());
            assert!(layer.is_empty());
        }
    }

    #[test]
    fn test_cancel_mid_run_keeps_last_committed_stage() {
        let mut object = make_object(0.6);
        let pipeline = Pipeline::default();
        let token = pipeline.cancellation_token();
        let slicer = |_: usize, _: CoordF| -> Result<Polygons> { Ok(vec![square_mm(0.0, 0.0, 10.0)]) };

        let result = pipeline.run_with_callback(
            &mut object,
            &slicer,
            &ExposureClassifier::default(),
            move |stage, _| {
                if stage == "perimeters" {
                    token.cancel();
                }
            },
        );
        assert!(matches!(result, Err(Error::Cancelled)));
        for layer in object.layers() {
            assert_eq!(layer.stage(), LayerStage::Merged);
            assert!(!layer.has_extrusions());
        }
    }

    #[test]
    fn test_slicer_failure_reports_layer() {
        let mut object = make_object(1.0);
        let slicer = |_: usize, z: CoordF| -> Result<Polygons> {
            if (z - 0.5).abs() < 1e-6 {
                Err(Error::Geometry("non-manifold edge".into()))
            } else {
                Ok(vec![square_mm(0.0, 0.0, 10.0)])
            }
        };
        let result = Pipeline::default().run(&mut object, &slicer, &ExposureClassifier::default());
        match result {
            Err(Error::LayerFailed { layer_id, print_z, reason }) => {
                assert_eq!(layer_id, 2);
                assert!((print_z - 0.6).abs() < 1e-9);
                assert!(reason.contains("non-manifold edge"));
            }
            other => panic!("expected layer failure, got {other:?}"),
        }
        assert!(object.layers().iter().all(|l| l.stage() == LayerStage::Created));
    }

    #[test]
    fn test_repair_warnings_aggregated() {
        init_logger();
        let mut object = make_object(1.0);
        // Layers 1 and 3 come back self-intersecting.
        let slicer = |_: usize, z: CoordF| -> Result<Polygons> {
            if (z - 0.3).abs() < 1e-6 || (z - 0.7).abs() < 1e-6 {
                Ok(vec![bowtie_mm(0.0, 10.0)])
            } else {
                Ok(vec![square_mm(0.0, 0.0, 10.0)])
            }
        };
        let report = Pipeline::default()
            .run(&mut object, &slicer, &ExposureClassifier::default())
            .unwrap();

        assert_eq!(report.repaired_layers, vec![1, 3]);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("2 layer(s)"));
        assert!(report.warnings[0].contains("0.40"));
        assert!(report.warnings[0].contains("0.80"));
        assert!(object.layer(1).unwrap().slicing_errors);
        assert!(!object.layer(0).unwrap().slicing_errors);
    }

    #[test]
    fn test_empty_object() {
        let config = PrintObjectConfig::new();
        let mut object = PrintObject::new(config, vec![PrintRegionConfig::default()]);
        let slicer = |_: usize, _: CoordF| -> Result<Polygons> { Ok(Vec::new()) };
        let report = Pipeline::default()
            .run(&mut object, &slicer, &ExposureClassifier::default())
            .unwrap();
        assert_eq!(report.layers, 0);
        assert!(report.warnings.is_empty());
    }
}
