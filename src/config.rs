use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CellverseError, Result};
use crate::fitness::CostMetric;

/// search strategy used by `Frame::optimize`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Algorithm {
    /// weighted-random perturb/split, strict-improvement acceptance
    #[default]
    HillClimbing,
    /// reserved selector. currently performs no work per iteration.
    SimulatedAnnealing,
    /// finite-difference gradient steps until improvement drops below tolerance
    GradientDescent,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::HillClimbing => "hill-climbing",
            Algorithm::SimulatedAnnealing => "simulated-annealing",
            Algorithm::GradientDescent => "gradient-descent",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = CellverseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hill-climbing" | "hill climbing" | "hill" => Ok(Algorithm::HillClimbing),
            "simulated-annealing" | "simulated annealing" => Ok(Algorithm::SimulatedAnnealing),
            "gradient-descent" | "gradient descent" => Ok(Algorithm::GradientDescent),
            _ => Err(CellverseError::InvalidAlgorithm(s.to_owned())),
        }
    }
}

impl TryFrom<String> for Algorithm {
    type Error = CellverseError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Algorithm> for String {
    fn from(a: Algorithm) -> Self {
        a.as_str().to_owned()
    }
}

/// relative likelihood of each hill-climbing move. need not sum to 1.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveWeights {
    pub perturbation: f64,
    pub split: f64,
}

impl Default for MoveWeights {
    fn default() -> Self {
        Self {
            perturbation: 0.8,
            split: 0.2,
        }
    }
}

/// gradient-descent step parameters
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientConfig {
    /// finite-difference probe size (pixels)
    pub probe_delta: f32,
    /// step = -learning_rate * gradient
    pub learning_rate: f32,
    /// improvement (cost units) below which the frame is considered converged
    pub tolerance: f64,
}

impl Default for GradientConfig {
    fn default() -> Self {
        Self {
            probe_delta: 0.5,
            learning_rate: 0.1,
            tolerance: 0.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    // iteration budget per frame = cell count * iterations_per_cell
    pub iterations_per_cell: usize,
    pub algorithm: Algorithm,
    pub prob: MoveWeights,

    // perturbation step sizes (uniform displacement in [-step, step])
    pub position_step: f32,
    pub radius_step: f32,

    // radius limits
    pub radius_min: f32,
    pub radius_max: f32,
    /// cells smaller than this are never split
    pub min_split_radius: f32,

    pub gradient: GradientConfig,

    // synthetic image model
    pub background_intensity: f32,
    pub cell_intensity: f32,
    pub antialiasing: bool,
    /// distance between consecutive slices, in pixel units
    pub z_spacing: f32,

    // real image preprocessing
    pub blur_sigma: f32,

    pub cost_metric: CostMetric,

    /// rng seed for reproducible runs. None seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            iterations_per_cell: 50,
            algorithm: Algorithm::HillClimbing,
            prob: MoveWeights::default(),

            position_step: 1.0,
            radius_step: 0.5,

            radius_min: 1.0,
            radius_max: 50.0,
            min_split_radius: 3.0,

            gradient: GradientConfig::default(),

            background_intensity: 0.2,
            cell_intensity: 0.8,
            antialiasing: true,
            z_spacing: 1.0,

            blur_sigma: 1.5,

            cost_metric: CostMetric::Ssd,

            seed: None,
        }
    }
}

impl SimulationConfig {
    /// reject configurations the optimizer cannot run with
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(CellverseError::InvalidConfig(msg));

        if self.iterations_per_cell < 1 {
            return bad("iterations_per_cell must be at least 1".into());
        }
        for (name, w) in [("perturbation", self.prob.perturbation), ("split", self.prob.split)] {
            if !w.is_finite() || w < 0.0 {
                return bad(format!("move weight {name} must be a non-negative number, got {w}"));
            }
        }
        if !(self.radius_min >= 0.0 && self.radius_min <= self.radius_max) {
            return bad(format!(
                "radius range [{}, {}] is empty or negative",
                self.radius_min, self.radius_max
            ));
        }
        if !(self.position_step >= 0.0 && self.radius_step >= 0.0) {
            return bad("perturbation steps must be non-negative".into());
        }
        if !(self.z_spacing > 0.0) {
            return bad(format!("z_spacing must be positive, got {}", self.z_spacing));
        }
        if !(self.gradient.probe_delta > 0.0) {
            return bad("gradient.probe_delta must be positive".into());
        }
        Ok(())
    }

    /// per-parameter perturbation step
    #[inline]
    pub fn step_for(&self, param: crate::cell::Param) -> f32 {
        if param.is_position() {
            self.position_step
        } else {
            self.radius_step
        }
    }
}
