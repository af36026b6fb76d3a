use log::{debug, info, warn};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rayon::prelude::*;

use crate::cell::Param;
use crate::config::{Algorithm, SimulationConfig};
use crate::error::Result;
use crate::fitness::{Cost, MetricsSnapshot};
use crate::geom::clamp_sphere;

use super::{Frame, MoveKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptimizerState {
    Running,
    /// gradient descent stopped improving; remaining iterations are no-ops
    MinimaReached,
    Terminated,
}

/// what one iteration did to the frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Accepted,
    Rejected,
    /// proposal left the valid parameter space and was never scored
    Invalid,
    /// no work this iteration (converged, reserved mode, or no move to draw)
    Skipped,
}

/// per-call optimizer state: the selected mode, the state machine and the cached move distribution
pub struct OptimizerContext {
    algorithm: Algorithm,
    state: OptimizerState,
    moves: Option<WeightedIndex<f64>>,
}

impl OptimizerContext {
    pub fn new(cfg: &SimulationConfig) -> Self {
        // index 0 = perturbation, 1 = split. all-zero weights leave nothing to draw.
        let moves = WeightedIndex::new([cfg.prob.perturbation, cfg.prob.split]).ok();
        Self {
            algorithm: cfg.algorithm,
            state: OptimizerState::Running,
            moves,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn state(&self) -> OptimizerState {
        self.state
    }

    fn draw_move(&self, rng: &mut impl rand::Rng) -> Option<MoveKind> {
        let dist = self.moves.as_ref()?;
        Some(match dist.sample(rng) {
            0 => MoveKind::Perturbation,
            _ => MoveKind::Split,
        })
    }
}

/// summary of one `Frame::optimize` call
#[derive(Clone, Debug, PartialEq)]
pub struct OptimizeReport {
    pub frame_index: usize,
    pub algorithm: Algorithm,
    pub budget: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub invalid: usize,
    pub skipped: usize,
    pub initial_cost: Cost,
    pub final_cost: Cost,
    /// gradient descent hit its tolerance before the budget ran out
    pub converged: bool,
    pub metrics: MetricsSnapshot,
}

impl OptimizeReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Accepted => self.accepted += 1,
            Outcome::Rejected => self.rejected += 1,
            Outcome::Invalid => self.invalid += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }

    pub fn iterations(&self) -> usize {
        self.accepted + self.rejected + self.invalid + self.skipped
    }
}

impl Frame {
    /// cells × iterations_per_cell, fixed at entry. frames without image data get 0.
    pub fn iteration_budget(&self) -> usize {
        if self.real.is_empty() {
            return 0;
        }
        self.cells.len() * self.cfg.iterations_per_cell
    }

    /// Run the configured search for this frame's full iteration budget.
    pub fn optimize(&mut self) -> Result<OptimizeReport> {
        profiling::scope!("Frame::optimize");

        let budget = self.iteration_budget();
        let mut ctx = OptimizerContext::new(&self.cfg);
        let mut report = OptimizeReport {
            frame_index: self.index,
            algorithm: ctx.algorithm,
            budget,
            accepted: 0,
            rejected: 0,
            invalid: 0,
            skipped: 0,
            initial_cost: self.cost,
            final_cost: self.cost,
            converged: false,
            metrics: self.last_metrics,
        };

        if budget > 0 {
            match ctx.algorithm {
                Algorithm::HillClimbing if ctx.moves.is_none() => {
                    warn!("frame {}: both move weights are zero, nothing to propose", self.index)
                }
                Algorithm::SimulatedAnnealing => {
                    warn!("frame {}: simulated annealing is not implemented, frame left unchanged", self.index)
                }
                _ => {}
            }
        }

        for i in 0..budget {
            let outcome = self.propose_and_resolve(&mut ctx)?;
            report.record(outcome);

            if (i + 1) % 100 == 0 {
                debug!(
                    "frame {}: iteration {}/{} cost {:.4} cells {}",
                    self.index,
                    i + 1,
                    budget,
                    self.cost,
                    self.cells.len()
                );
            }
        }

        report.converged = ctx.state == OptimizerState::MinimaReached;
        ctx.state = OptimizerState::Terminated;
        report.final_cost = self.cost;
        report.metrics = self.last_metrics;

        info!(
            "frame {} ({}): {} iterations, {} accepted, {} rejected, {} invalid, {} skipped, cost {:.4} -> {:.4}, psnr {:.2} dB{}",
            self.index,
            report.algorithm,
            report.budget,
            report.accepted,
            report.rejected,
            report.invalid,
            report.skipped,
            report.initial_cost,
            report.final_cost,
            report.metrics.psnr,
            if report.converged { ", converged" } else { "" }
        );
        Ok(report)
    }

    /// One iteration of the selected mode.
    pub fn propose_and_resolve(&mut self, ctx: &mut OptimizerContext) -> Result<Outcome> {
        profiling::scope!("propose_and_resolve");
        if ctx.state == OptimizerState::Terminated {
            return Ok(Outcome::Skipped);
        }

        match ctx.algorithm {
            Algorithm::HillClimbing => {
                let Some(kind) = ctx.draw_move(&mut self.rng) else {
                    return Ok(Outcome::Skipped);
                };
                let pending = match kind {
                    MoveKind::Perturbation => self.perturb()?,
                    MoveKind::Split => self.split()?,
                };
                let Some(pending) = pending else {
                    return Ok(Outcome::Invalid);
                };
                // equal cost is not an improvement
                let accept = pending.cost_delta() < 0.0;
                Ok(if pending.resolve(accept) { Outcome::Accepted } else { Outcome::Rejected })
            }
            Algorithm::SimulatedAnnealing => Ok(Outcome::Skipped),
            Algorithm::GradientDescent => {
                if ctx.state == OptimizerState::MinimaReached {
                    return Ok(Outcome::Skipped);
                }
                let current = self.calculate_cost(&self.synth)?;
                let new = self.gradient_descent()?;
                if current - new < self.cfg.gradient.tolerance {
                    debug!("frame {}: gradient descent converged at cost {:.4}", self.index, new);
                    ctx.state = OptimizerState::MinimaReached;
                }
                Ok(if new < current { Outcome::Accepted } else { Outcome::Rejected })
            }
        }
    }

    /// One finite-difference gradient step over every parameter of every cell.
    /// The step is committed only if it lowers the cost. Returns the frame cost afterwards.
    pub(super) fn gradient_descent(&mut self) -> Result<Cost> {
        profiling::scope!("gradient_descent");
        if self.cells.is_empty() {
            return Ok(self.cost);
        }

        let params: &[Param] = if self.bounds.is_planar() {
            &[Param::X, Param::Y, Param::Radius]
        } else {
            &Param::ALL
        };
        let probe = self.cfg.gradient.probe_delta;
        let shape = self.real.shape();

        let slots: Vec<(usize, Param)> = (0..self.cells.len())
            .flat_map(|i| params.iter().map(move |&p| (i, p)))
            .collect();

        // central differences; each probe renders its own candidate
        let gradient: Vec<f32> = {
            let (cells, renderer, evaluator, real) = (&self.cells, &self.renderer, &self.evaluator, &self.real);
            let (bounds, rmin, rmax) = (&self.bounds, self.cfg.radius_min, self.cfg.radius_max);
            slots
                .par_iter()
                .map(|&(i, p)| -> Result<f32> {
                    profiling::scope!("gradient_probe");
                    let probe_cost = |d: f32| -> Result<(Cost, f32)> {
                        let mut moved = cells.to_vec();
                        let v = moved[i].get(p);
                        moved[i].set(p, v + d);
                        clamp_sphere(&mut moved[i], bounds, rmin, rmax);
                        let actual = moved[i].get(p) - v;
                        let cost = evaluator.cost(real, &renderer.render(&moved, shape))?;
                        Ok((cost, actual))
                    };
                    let (plus, dp) = probe_cost(probe)?;
                    let (minus, dm) = probe_cost(-probe)?;
                    let span = dp - dm;
                    if span <= 0.0 {
                        return Ok(0.0);
                    }
                    Ok(((plus - minus) / span as f64) as f32)
                })
                .collect::<Result<Vec<f32>>>()?
        };

        let lr = self.cfg.gradient.learning_rate;
        let mut stepped = self.cells.clone();
        for (&(i, p), &g) in slots.iter().zip(&gradient) {
            let cap = self.cfg.step_for(p);
            let delta = (-lr * g).clamp(-cap, cap);
            let v = stepped[i].get(p);
            stepped[i].set(p, v + delta);
        }
        for cell in &mut stepped {
            clamp_sphere(cell, &self.bounds, self.cfg.radius_min, self.cfg.radius_max);
        }

        let synth = self.renderer.render(&stepped, shape);
        let cost = self.evaluator.cost(&self.real, &synth)?;
        if cost < self.cost {
            self.commit(stepped, synth, cost);
        }
        Ok(self.cost)
    }
}
