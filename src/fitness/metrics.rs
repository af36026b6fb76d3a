//─────────────────────────────────────────────────────────────────────────────
// resolution-invariant metrics (cost/voxel, MSE, PSNR)
//─────────────────────────────────────────────────────────────────────────────

use super::{Cost, CostMetric};

/// planes are normalized to [0, 1]
pub const INTENSITY_PEAK: f64 = 1.0;

/// PSNR (peak signal-to-noise ratio) in decibels.
/// higher is better; an exact match is capped by the 1e-12 mse floor.
#[inline]
pub fn psnr_from_mse(mse: f64, peak: f64) -> f64 {
    let mse = mse.max(1e-12);
    10.0 * ((peak * peak) / mse).log10()
}

/// cached snapshot of resolution-invariant metrics for a frame
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub cost_per_voxel: f64,
    pub psnr: f64,
}

impl MetricsSnapshot {
    /// build metrics from a raw stack cost.
    /// sad is converted with the usual pseudo-mse convention (mean abs diff, squared).
    pub fn from_cost(cost: Cost, metric: CostMetric, num_voxels: usize) -> Self {
        if num_voxels == 0 {
            return Self::default();
        }
        let n = num_voxels as f64;
        let cost_per_voxel = cost / n;
        let mse = match metric {
            CostMetric::Ssd => cost_per_voxel,
            CostMetric::Sad => cost_per_voxel * cost_per_voxel,
        };
        Self {
            cost_per_voxel,
            psnr: psnr_from_mse(mse, INTENSITY_PEAK),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_psnr_of_known_mse() {
        // mse 0.01 at peak 1.0 -> 20 dB
        assert!((psnr_from_mse(0.01, 1.0) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_frame_has_default_metrics() {
        assert_eq!(MetricsSnapshot::from_cost(5.0, CostMetric::Ssd, 0), MetricsSnapshot::default());
    }

    #[test]
    fn test_sad_and_ssd_agree_on_uniform_error() {
        // every voxel off by 0.1: sad = 0.1n, ssd = 0.01n
        let n = 1000;
        let a = MetricsSnapshot::from_cost(0.1 * n as f64, CostMetric::Sad, n);
        let b = MetricsSnapshot::from_cost(0.01 * n as f64, CostMetric::Ssd, n);
        assert!((a.psnr - b.psnr).abs() < 1e-6);
    }
}
