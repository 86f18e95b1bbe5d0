//! Weighted rolling means with tapered kernels.
//!
//! Windows are centered: the window for output `i` spans
//! `[i + off + 1 - W, i + off]` with `off = (W - 1) / 2`, so for even `W`
//! it reaches one sample further into the past than into the future.
//! `weights[0]` applies to the oldest sample in the window.

use std::f64::consts::PI;

/// Symmetric Hann window of length `n`.
pub fn hann(n: usize) -> Vec<f64> {
    cosine_window(n, 0.5, 0.5)
}

/// Symmetric Hamming window of length `n`.
pub fn hamming(n: usize) -> Vec<f64> {
    cosine_window(n, 0.54, 0.46)
}

fn cosine_window(n: usize, a0: f64, a1: f64) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let denom = (n - 1) as f64;
            (0..n)
                .map(|k| a0 - a1 * (2.0 * PI * k as f64 / denom).cos())
                .collect()
        }
    }
}

/// Centered weighted mean of `values` under `weights`.
///
/// Only present values contribute, and the weights are renormalised over
/// them. An output is missing when fewer than `min_periods` values in its
/// window are present, or when their weights sum to zero. Windows that
/// hang over either end of the series are truncated, never padded.
pub fn centered_weighted_mean(
    values: &[Option<f64>],
    weights: &[f64],
    min_periods: usize,
) -> Vec<Option<f64>> {
    let n = values.len() as isize;
    let width = weights.len() as isize;
    if width == 0 {
        return vec![None; values.len()];
    }
    let offset = (width - 1) / 2;

    (0..n)
        .map(|i| {
            let start = i + offset + 1 - width;
            let mut weighted = 0.0;
            let mut total = 0.0;
            let mut count = 0;
            for (k, w) in weights.iter().enumerate() {
                let j = start + k as isize;
                if j < 0 || j >= n {
                    continue;
                }
                if let Some(v) = values[j as usize] {
                    weighted += w * v;
                    total += w;
                    count += 1;
                }
            }
            (count >= min_periods && total != 0.0).then(|| weighted / total)
        })
        .collect()
}
