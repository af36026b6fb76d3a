/// per-pixel dissimilarity between grayscale planes and stacks.
/// sums are accumulated in f64, sequentially within a plane and in slice order across
/// the stack, so results are bit-for-bit reproducible regardless of rayon scheduling.
use rayon::prelude::*;

use crate::image_stack::{ImagePlane, ImageStack};

/// planes above this many pixels are scored in parallel across the stack
const PAR_MIN_PIXELS: usize = 64 * 1024;

/// sum of absolute differences over one plane
#[inline]
pub fn sad_plane(real: &ImagePlane, synth: &ImagePlane) -> f64 {
    debug_assert_eq!(real.data.len(), synth.data.len());
    real.data
        .iter()
        .zip(&synth.data)
        .map(|(&a, &b)| (a as f64 - b as f64).abs())
        .sum()
}

/// sum of squared differences over one plane
#[inline]
pub fn ssd_plane(real: &ImagePlane, synth: &ImagePlane) -> f64 {
    debug_assert_eq!(real.data.len(), synth.data.len());
    real.data
        .iter()
        .zip(&synth.data)
        .map(|(&a, &b)| {
            let d = a as f64 - b as f64;
            d * d
        })
        .sum()
}

/// apply a plane metric to every slice pair and add the results in slice order.
/// shapes must already be checked by the caller.
pub fn stack_sum<F>(real: &ImageStack, synth: &ImageStack, plane_metric: F) -> f64
where
    F: Fn(&ImagePlane, &ImagePlane) -> f64 + Sync,
{
    profiling::scope!("stack_sum");
    debug_assert_eq!(real.len(), synth.len());

    let pixels = real.planes().first().map_or(0, |p| p.num_pixels());
    if real.len() > 1 && pixels >= PAR_MIN_PIXELS {
        // ordered collect keeps the final reduction deterministic
        let per_slice: Vec<f64> = real
            .planes()
            .par_iter()
            .zip(synth.planes().par_iter())
            .map(|(r, s)| plane_metric(r, s))
            .collect();
        per_slice.iter().sum()
    } else {
        real.iter().zip(synth.iter()).map(|(r, s)| plane_metric(r, s)).sum()
    }
}
