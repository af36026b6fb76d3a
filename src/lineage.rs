use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::cell::Sphere;
use crate::config::SimulationConfig;
use crate::engine::{Frame, OptimizeReport};
use crate::error::{CellverseError, Result};
use crate::image_stack::ImageStack;
use crate::io::{load_image, save_slices, write_cells_csv};

pub const CELLS_CSV_NAME: &str = "cells.csv";

/// Ordered frames of one time-lapse plus the output location.
/// `cursor` is the highest frame index optimized so far; cell export covers `0..=cursor`.
pub struct Lineage {
    frames: Vec<Frame>,
    output_path: PathBuf,
    cursor: Option<usize>,
}

impl Lineage {
    /// Load every image and seed its frame.
    /// Frames before `continue_from` (all frames when it is None) take the seed cells
    /// listed for their image path; later frames start empty.
    /// Unreadable images produce frames without slices.
    pub fn new(
        initial_cells: &HashMap<String, Vec<Sphere>>,
        image_paths: &[PathBuf],
        cfg: &SimulationConfig,
        output_path: impl Into<PathBuf>,
        continue_from: Option<usize>,
    ) -> Result<Self> {
        profiling::scope!("Lineage::new");
        cfg.validate()?;

        let frames = image_paths
            .par_iter()
            .enumerate()
            .map(|(i, path)| {
                let name = path.display().to_string();
                let real = load_real_stack(path, cfg.blur_sigma);
                let seeded = continue_from.is_none_or(|cutoff| i < cutoff);
                let cells = match initial_cells.get(&name) {
                    Some(cells) if seeded => cells.clone(),
                    _ => Vec::new(),
                };
                debug!("frame {i}: {name} ({} slices, {} seed cells)", real.len(), cells.len());
                Frame::new(i, name, real, cells, cfg.clone())
            })
            .collect::<Result<Vec<Frame>>>()?;

        info!(
            "lineage: {} frame(s), {} seeded cell(s)",
            frames.len(),
            frames.iter().map(Frame::len).sum::<usize>()
        );
        Ok(Self::from_frames(frames, output_path))
    }

    /// assemble a lineage from frames built elsewhere (custom renderer or cost)
    pub fn from_frames(frames: Vec<Frame>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            frames,
            output_path: output_path.into(),
            cursor: None,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Result<&Frame> {
        self.check_index(index)?;
        Ok(&self.frames[index])
    }

    pub fn frame_mut(&mut self, index: usize) -> Result<&mut Frame> {
        self.check_index(index)?;
        Ok(&mut self.frames[index])
    }

    /// number of cells in frame `index`
    pub fn frame_len(&self, index: usize) -> Result<usize> {
        self.frame(index).map(Frame::len)
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Run the optimizer once over frame `index`.
    pub fn optimize(&mut self, index: usize) -> Result<OptimizeReport> {
        self.check_index(index)?;
        let report = self.frames[index].optimize()?;
        self.advance_cursor(index);
        Ok(report)
    }

    /// Optimize a range of frames concurrently. Frames are independent, so this is
    /// equivalent to calling `optimize` on each.
    pub fn optimize_frames(&mut self, range: Range<usize>) -> Result<Vec<OptimizeReport>> {
        profiling::scope!("Lineage::optimize_frames");
        if range.start > range.end || range.end > self.frames.len() {
            return Err(CellverseError::InvalidFrameIndex {
                index: range.end.max(range.start).saturating_sub(1),
                len: self.frames.len(),
            });
        }
        if range.is_empty() {
            return Ok(Vec::new());
        }

        let last = range.end - 1;
        let reports = self.frames[range]
            .par_iter_mut()
            .map(Frame::optimize)
            .collect::<Result<Vec<_>>>()?;
        self.advance_cursor(last);
        Ok(reports)
    }

    /// Replace frame `to`'s cells with a deep copy of frame `to - 1`'s.
    /// Out-of-range targets (and frame 0, which has no predecessor) are ignored.
    pub fn copy_cells_forward(&mut self, to: usize) -> Result<()> {
        if to == 0 || to >= self.frames.len() {
            debug!("copy forward to frame {to} ignored ({} frames)", self.frames.len());
            return Ok(());
        }
        let (before, after) = self.frames.split_at_mut(to);
        let source = &before[to - 1];
        let cells = source.cells().to_vec();
        debug!("copy {} cell(s) from frame {} to frame {to}", cells.len(), to - 1);
        after[0].set_cells(cells)
    }

    /// Write `<out>/real/<index>/<k>.png` and `<out>/synth/<index>/<k>.png`.
    pub fn save_images(&self, index: usize) -> Result<()> {
        profiling::scope!("Lineage::save_images");
        let frame = self.frame(index)?;
        let dir = index.to_string();
        save_slices(&self.output_path.join("real").join(&dir), &frame.output_images())?;
        save_slices(&self.output_path.join("synth").join(&dir), &frame.output_synth_images())?;
        Ok(())
    }

    /// Export cells of frames `0..=cursor` to `<out>/cells.csv`.
    /// Before any frame was optimized the file holds only the header.
    pub fn save_cells(&self) -> Result<PathBuf> {
        let end = self.cursor.map_or(0, |c| c + 1);
        self.write_cells(end)
    }

    /// Export cells of frames `0..=index`, whatever the cursor says.
    pub fn save_cells_through(&self, index: usize) -> Result<PathBuf> {
        self.check_index(index)?;
        self.write_cells(index + 1)
    }

    fn write_cells(&self, end: usize) -> Result<PathBuf> {
        let rows = self.frames[..end].iter().flat_map(Frame::cells_as_params).collect::<Vec<_>>();
        let path = self.output_path.join(CELLS_CSV_NAME);
        info!("writing {} cell row(s) from {end} frame(s) to {}", rows.len(), path.display());
        write_cells_csv(&path, rows)?;
        Ok(path)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.frames.len() {
            return Err(CellverseError::InvalidFrameIndex {
                index,
                len: self.frames.len(),
            });
        }
        Ok(())
    }

    fn advance_cursor(&mut self, index: usize) {
        self.cursor = Some(self.cursor.map_or(index, |c| c.max(index)));
    }
}

fn load_real_stack(path: &Path, blur_sigma: f32) -> ImageStack {
    let planes = load_image(path, blur_sigma);
    if planes.is_empty() {
        warn!("no image data for {}, frame will have no slices", path.display());
        return ImageStack::empty();
    }
    match ImageStack::from_planes(planes) {
        Ok(stack) => stack,
        Err(e) => {
            warn!("{}: {e}, frame will have no slices", path.display());
            ImageStack::empty()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_stack::StackShape;
    use crate::render::{CpuRenderer, SyntheticRenderer};

    fn cfg() -> SimulationConfig {
        SimulationConfig {
            seed: Some(42),
            iterations_per_cell: 10,
            ..SimulationConfig::default()
        }
    }

    fn frames(n: usize, cells: Vec<Sphere>) -> Vec<Frame> {
        let cfg = cfg();
        let truth = [Sphere::new("t", 10.0, 10.0, 0.0, 4.0)];
        (0..n)
            .map(|i| {
                let real = CpuRenderer::from_config(&cfg).render(&truth, StackShape::new(20, 20, 1));
                let seed = if i == 0 { cells.clone() } else { Vec::new() };
                Frame::new(i, format!("f{i}.png"), real, seed, cfg.clone()).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_invalid_index_is_precondition_violation() {
        let dir = tempfile::tempdir().unwrap();
        let mut lineage = Lineage::from_frames(frames(2, vec![]), dir.path());
        assert!(lineage.optimize(2).unwrap_err().is_precondition_violation());
        assert!(lineage.save_images(5).unwrap_err().is_precondition_violation());
        assert!(lineage.frame_len(2).unwrap_err().is_precondition_violation());
        assert!(lineage.save_cells_through(9).unwrap_err().is_precondition_violation());
        assert!(lineage.optimize_frames(1..3).unwrap_err().is_precondition_violation());
        assert_eq!(lineage.cursor(), None);
    }

    #[test]
    fn test_cursor_tracks_highest_optimized_frame() {
        let dir = tempfile::tempdir().unwrap();
        let cells = vec![Sphere::new("a", 8.0, 8.0, 0.0, 4.0)];
        let mut lineage = Lineage::from_frames(frames(3, cells), dir.path());
        lineage.optimize(1).unwrap();
        lineage.optimize(0).unwrap();
        assert_eq!(lineage.cursor(), Some(1));
        lineage.optimize_frames(0..3).unwrap();
        assert_eq!(lineage.cursor(), Some(2));
    }

    #[test]
    fn test_copy_forward_to_first_frame_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let cells = vec![Sphere::new("a", 8.0, 8.0, 0.0, 4.0)];
        let mut lineage = Lineage::from_frames(frames(2, cells.clone()), dir.path());
        lineage.copy_cells_forward(0).unwrap();
        assert_eq!(lineage.frames()[0].cells(), &cells[..]);
        assert!(lineage.frames()[1].is_empty());
    }

    #[test]
    fn test_save_cells_without_optimize_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let cells = vec![Sphere::new("a", 8.0, 8.0, 0.0, 4.0)];
        let lineage = Lineage::from_frames(frames(1, cells), dir.path());
        let path = lineage.save_cells().unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap().lines().count(), 1);

        let path = lineage.save_cells_through(0).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text.lines().nth(1), Some("f0.png,a,8,8,0,4"));
    }
}
