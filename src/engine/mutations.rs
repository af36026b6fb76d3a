use std::fmt;

use log::trace;
use rand::Rng;

use crate::cell::{Param, Sphere};
use crate::error::Result;
use crate::fitness::Cost;
use crate::geom::{random_unit_vector, sphere_is_valid, split_sphere};
use crate::image_stack::ImageStack;

use super::Frame;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MoveKind {
    Perturbation,
    Split,
}

impl fmt::Display for MoveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveKind::Perturbation => f.write_str("perturbation"),
            MoveKind::Split => f.write_str("split"),
        }
    }
}

/// A scored but uncommitted move.
/// Holds the frame's only mutable borrow, so a second proposal cannot be made until
/// this one is resolved. Dropping it without `resolve` is a reject.
pub struct PendingMove<'a> {
    frame: &'a mut Frame,
    kind: MoveKind,
    cells: Vec<Sphere>,
    synth: ImageStack,
    cost: Cost,
}

impl<'a> PendingMove<'a> {
    pub fn kind(&self) -> MoveKind {
        self.kind
    }

    /// candidate cost minus accepted cost; negative is an improvement
    pub fn cost_delta(&self) -> Cost {
        self.cost - self.frame.cost
    }

    pub fn candidate_cost(&self) -> Cost {
        self.cost
    }

    /// the configuration that `resolve(true)` would install
    pub fn candidate_cells(&self) -> &[Sphere] {
        &self.cells
    }

    /// commit the candidate (true) or discard it (false). returns `accept`.
    pub fn resolve(self, accept: bool) -> bool {
        if accept {
            trace!(
                "frame {}: accepted {} (cost {:.4} -> {:.4})",
                self.frame.index,
                self.kind,
                self.frame.cost,
                self.cost
            );
            self.frame.commit(self.cells, self.synth, self.cost);
        }
        accept
    }
}

impl Frame {
    /// Displace one parameter of one random cell by a uniform step.
    /// Returns None when there is nothing to perturb or the displaced cell would leave
    /// its valid bounds (rejected before scoring).
    pub fn perturb(&mut self) -> Result<Option<PendingMove<'_>>> {
        profiling::scope!("perturb");
        if self.cells.is_empty() {
            return Ok(None);
        }

        let idx = self.rng.random_range(0..self.cells.len());
        // z is pinned in single-slice volumes
        let params: &[Param] = if self.bounds.is_planar() {
            &[Param::X, Param::Y, Param::Radius]
        } else {
            &Param::ALL
        };
        let param = params[self.rng.random_range(0..params.len())];
        let step = self.cfg.step_for(param);
        let delta = self.rng.random_range(-step..=step);

        let mut moved = self.cells[idx].clone();
        moved.set(param, moved.get(param) + delta);
        if !sphere_is_valid(&moved, &self.bounds, self.cfg.radius_min, self.cfg.radius_max) {
            return Ok(None);
        }

        let mut cells = self.cells.clone();
        cells[idx] = moved;
        self.score(MoveKind::Perturbation, cells).map(Some)
    }

    /// Replace one random cell with two volume-preserving children along a random axis.
    /// Children take the parent's slot in the cell order and get fresh names.
    /// Returns None when the parent is too small or a child would leave its bounds.
    pub fn split(&mut self) -> Result<Option<PendingMove<'_>>> {
        profiling::scope!("split");
        if self.cells.is_empty() {
            return Ok(None);
        }

        let idx = self.rng.random_range(0..self.cells.len());
        if self.cells[idx].radius < self.cfg.min_split_radius {
            return Ok(None);
        }

        let axis = random_unit_vector(&mut self.rng, self.bounds.is_planar());
        let names = self.fresh_child_names(&self.cells[idx].name);
        let (a, b) = split_sphere(&self.cells[idx], axis, names);
        let valid = |s: &Sphere| sphere_is_valid(s, &self.bounds, self.cfg.radius_min, self.cfg.radius_max);
        if !valid(&a) || !valid(&b) {
            return Ok(None);
        }

        let mut cells = Vec::with_capacity(self.cells.len() + 1);
        cells.extend_from_slice(&self.cells[..idx]);
        cells.push(a);
        cells.push(b);
        cells.extend_from_slice(&self.cells[idx + 1..]);
        self.score(MoveKind::Split, cells).map(Some)
    }

    /// render and score a candidate without touching the accepted state
    fn score(&mut self, kind: MoveKind, cells: Vec<Sphere>) -> Result<PendingMove<'_>> {
        let synth = self.renderer.render(&cells, self.real.shape());
        let cost = self.evaluator.cost(&self.real, &synth)?;
        Ok(PendingMove {
            frame: self,
            kind,
            cells,
            synth,
            cost,
        })
    }
}
