// Engine module organization
// Frame owns one time point; each submodule handles a specific aspect of its search

pub mod mutations;
pub mod optimizer;

pub use mutations::{MoveKind, PendingMove};
pub use optimizer::{OptimizeReport, OptimizerContext, OptimizerState, Outcome};

use std::collections::HashSet;
use std::sync::Arc;

use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::cell::{CellParams, Sphere};
use crate::config::SimulationConfig;
use crate::error::Result;
use crate::fitness::{Cost, CostEvaluator, MetricsSnapshot};
use crate::geom::VolumeBounds;
use crate::image_stack::{ImageStack, StackShape};
use crate::render::{CpuRenderer, SyntheticRenderer};

/// one time point: the real stack, the fitted cells and a synthetic stack cached
/// for the last accepted configuration.
pub struct Frame {
    pub(self) rng: Pcg32,
    pub(self) cfg: SimulationConfig,
    pub(self) renderer: Arc<dyn SyntheticRenderer>,
    pub(self) evaluator: Arc<dyn CostEvaluator>,
    pub(self) index: usize,
    pub(self) image_name: String,
    pub(self) real: ImageStack,       // immutable after load
    pub(self) cells: Vec<Sphere>,     // last accepted configuration
    pub(self) synth: ImageStack,      // render of `cells`
    pub(self) cost: Cost,             // cost of `synth` against `real`
    pub(self) bounds: VolumeBounds,
    pub(self) last_metrics: MetricsSnapshot,
}

impl Frame {
    /// frame using the built-in renderer and the configured cost metric
    pub fn new(
        index: usize,
        image_name: impl Into<String>,
        real: ImageStack,
        cells: Vec<Sphere>,
        cfg: SimulationConfig,
    ) -> Result<Self> {
        let renderer = Arc::new(CpuRenderer::from_config(&cfg));
        let evaluator = Arc::new(cfg.cost_metric);
        Self::with_components(index, image_name, real, cells, cfg, renderer, evaluator)
    }

    pub fn with_components(
        index: usize,
        image_name: impl Into<String>,
        real: ImageStack,
        cells: Vec<Sphere>,
        cfg: SimulationConfig,
        renderer: Arc<dyn SyntheticRenderer>,
        evaluator: Arc<dyn CostEvaluator>,
    ) -> Result<Self> {
        profiling::scope!("Frame::new");
        cfg.validate()?;

        let rng = match cfg.seed {
            Some(seed) => Pcg32::seed_from_u64(seed ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)),
            None => Pcg32::from_rng(&mut rand::rng()),
        };
        let bounds = VolumeBounds::from_shape(real.shape(), cfg.z_spacing);
        let synth = renderer.render(&cells, real.shape());
        let cost = evaluator.cost(&real, &synth)?;

        let mut this = Self {
            rng,
            cfg,
            renderer,
            evaluator,
            index,
            image_name: image_name.into(),
            real,
            cells,
            synth,
            cost,
            bounds,
            last_metrics: MetricsSnapshot::default(),
        };
        this.update_metrics_snapshot();
        Ok(this)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn image_name(&self) -> &str {
        &self.image_name
    }

    /// number of cells in the current configuration
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[Sphere] {
        &self.cells
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.cfg
    }

    pub fn shape(&self) -> StackShape {
        self.real.shape()
    }

    pub fn bounds(&self) -> &VolumeBounds {
        &self.bounds
    }

    /// cost of the last accepted configuration
    pub fn cost(&self) -> Cost {
        self.cost
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.last_metrics
    }

    pub fn real_stack(&self) -> &ImageStack {
        &self.real
    }

    /// synthetic stack of the last accepted configuration
    pub fn synth_stack(&self) -> &ImageStack {
        &self.synth
    }

    /// real slices quantized to 8-bit for writing
    pub fn output_images(&self) -> Vec<image::GrayImage> {
        self.real.iter().map(|p| p.to_gray_image()).collect()
    }

    /// synthetic slices of the accepted configuration, quantized to 8-bit
    pub fn output_synth_images(&self) -> Vec<image::GrayImage> {
        self.synth.iter().map(|p| p.to_gray_image()).collect()
    }

    /// fresh render of the current cells (same content as `synth_stack`)
    pub fn generate_synth_images(&self) -> ImageStack {
        self.renderer.render(&self.cells, self.real.shape())
    }

    /// score any synthetic stack against this frame's real stack
    pub fn calculate_cost(&self, synth: &ImageStack) -> Result<Cost> {
        self.evaluator.cost(&self.real, synth)
    }

    /// replace the whole configuration (used by copy-forward); re-renders and re-scores
    pub fn set_cells(&mut self, cells: Vec<Sphere>) -> Result<()> {
        profiling::scope!("Frame::set_cells");
        let synth = self.renderer.render(&cells, self.real.shape());
        let cost = self.evaluator.cost(&self.real, &synth)?;
        self.commit(cells, synth, cost);
        Ok(())
    }

    pub fn cells_as_params(&self) -> Vec<CellParams> {
        self.cells.iter().map(|c| c.to_params(&self.image_name)).collect()
    }

    /// Single write path for the accepted state: cells, cached render and cost
    /// always change together.
    pub(self) fn commit(&mut self, cells: Vec<Sphere>, synth: ImageStack, cost: Cost) {
        self.cells = cells;
        self.synth = synth;
        self.cost = cost;
        self.update_metrics_snapshot();
    }

    pub(self) fn update_metrics_snapshot(&mut self) {
        self.last_metrics =
            MetricsSnapshot::from_cost(self.cost, self.cfg.cost_metric, self.real.shape().num_voxels());
    }

    /// `<parent>N` names for two split children, unique within this frame
    pub(self) fn fresh_child_names(&self, parent: &str) -> (String, String) {
        let taken: HashSet<&str> = self.cells.iter().map(|c| c.name.as_str()).collect();
        let next_free = |start: u32| -> (String, u32) {
            let mut n = start;
            loop {
                let candidate = format!("{parent}{n}");
                n += 1;
                if !taken.contains(candidate.as_str()) {
                    return (candidate, n);
                }
            }
        };
        let (first, n) = next_free(0);
        let (second, _) = next_free(n);
        (first, second)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_new_frame_caches_render_and_cost() {
        let truth = [Sphere::new("a", 12.0, 12.0, 0.0, 5.0)];
        let frame = frame_with(&truth, truth.to_vec(), StackShape::new(24, 24, 1), 1);
        assert_eq!(frame.cost(), 0.0);
        assert_eq!(frame.synth_stack(), &frame.generate_synth_images());
        assert_eq!(frame.len(), 1);
    }

    #[test]
    fn test_set_cells_rescores() {
        let truth = [Sphere::new("a", 12.0, 12.0, 0.0, 5.0)];
        let mut frame = frame_with(&truth, truth.to_vec(), StackShape::new(24, 24, 1), 1);
        frame.set_cells(vec![Sphere::new("a", 5.0, 5.0, 0.0, 3.0)]).unwrap();
        assert!(frame.cost() > 0.0);
        assert_eq!(frame.synth_stack(), &frame.generate_synth_images());
        assert_eq!(frame.cost(), frame.calculate_cost(frame.synth_stack()).unwrap());
    }

    #[test]
    fn test_fresh_child_names_skip_taken_names() {
        let cells = vec![
            Sphere::new("c", 5.0, 5.0, 0.0, 3.0),
            Sphere::new("c0", 15.0, 5.0, 0.0, 3.0),
            Sphere::new("c2", 5.0, 15.0, 0.0, 3.0),
        ];
        let frame = frame_with(&[], cells, StackShape::new(24, 24, 1), 1);
        let (a, b) = frame.fresh_child_names("c");
        assert_eq!(a, "c1");
        assert_eq!(b, "c3");
    }

    #[test]
    fn test_empty_real_stack_frame() {
        let cfg = seeded_config(3);
        let frame = Frame::new(0, "missing.tif", ImageStack::empty(), vec![], cfg).unwrap();
        assert_eq!(frame.cost(), 0.0);
        assert!(frame.synth_stack().is_empty());
        assert_eq!(frame.metrics(), MetricsSnapshot::default());
    }

    #[test]
    fn test_output_images_match_stack_shape() {
        let truth = [Sphere::new("a", 6.0, 6.0, 1.0, 3.0)];
        let frame = frame_with(&truth, truth.to_vec(), StackShape::new(12, 10, 3), 1);
        let real = frame.output_images();
        let synth = frame.output_synth_images();
        assert_eq!(real.len(), 3);
        assert_eq!(synth.len(), 3);
        assert_eq!(real[1].dimensions(), (12, 10));
        assert_eq!(real, synth);
    }

    #[test]
    fn test_cells_as_params_labels_rows_with_image_name() {
        let frame = frame_with(&[], vec![Sphere::new("x", 3.0, 4.0, 0.0, 2.0)], StackShape::new(8, 8, 1), 1);
        let rows = frame.cells_as_params();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].file, "frame.png");
        assert_eq!(rows[0].name, "x");
    }

    #[test]
    fn test_invalid_config_is_rejected_at_construction() {
        let cfg = SimulationConfig { iterations_per_cell: 0, ..SimulationConfig::default() };
        let plane = blank_plane(4, 4);
        let real = ImageStack::from_planes(vec![plane]).unwrap();
        let err = Frame::new(0, "f", real, vec![], cfg).err().unwrap();
        assert!(err.is_precondition_violation());
    }
}
