// Fitness module organization
// cost evaluation between a synthetic stack and the real stack, plus derived metrics

pub mod metrics;
pub mod sad;

pub use metrics::MetricsSnapshot;
pub use sad::{sad_plane, ssd_plane, stack_sum};

use serde::{Deserialize, Serialize};

use crate::error::{CellverseError, Result};
use crate::image_stack::ImageStack;

/// scalar dissimilarity, lower is better
pub type Cost = f64;

/// compares a synthetic stack against the real stack.
/// implementations must be pure: identical inputs give bit-identical costs.
pub trait CostEvaluator: Send + Sync {
    fn cost(&self, real: &ImageStack, synth: &ImageStack) -> Result<Cost>;
}

/// built-in per-pixel metrics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostMetric {
    /// sum of absolute differences
    Sad,
    /// sum of squared differences
    #[default]
    Ssd,
}

impl CostEvaluator for CostMetric {
    fn cost(&self, real: &ImageStack, synth: &ImageStack) -> Result<Cost> {
        profiling::scope!("CostMetric::cost");
        if real.shape() != synth.shape() {
            return Err(CellverseError::ShapeMismatch {
                expected: real.shape(),
                got: synth.shape(),
            });
        }
        let cost = match self {
            CostMetric::Sad => stack_sum(real, synth, sad_plane),
            CostMetric::Ssd => stack_sum(real, synth, ssd_plane),
        };
        Ok(cost)
    }
}
