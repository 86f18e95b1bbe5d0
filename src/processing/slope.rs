//! Trend estimation over the lookback window.
//!
//! The hourly series is low-pass filtered with a 44-hour Hann window to
//! remove the tide, the warm-up stretch is discarded, and a straight line
//! is fitted by least squares against sample position. The per-hour slope
//! is reported per 14 days.

use tracing::debug;

use super::window::{centered_weighted_mean, hann};
use crate::error::FitError;

/// Length of the de-tiding window, in hourly samples.
pub const DETIDE_WINDOW: usize = 44;

/// Present samples a de-tiding window needs to produce a value.
pub const DETIDE_MIN_PERIODS: usize = 20;

/// Leading filter outputs dropped before fitting.
pub const WARMUP_SAMPLES: usize = 20;

/// Hourly samples per 14 days.
pub const SAMPLES_PER_PERIOD: f64 = 24.0 * 14.0;

/// Result of a trend fit: a slope per 14 days, or no estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SlopeEstimate {
    Value(f64),
    Missing,
}

impl SlopeEstimate {
    pub fn value(&self) -> Option<f64> {
        match self {
            SlopeEstimate::Value(v) => Some(*v),
            SlopeEstimate::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, SlopeEstimate::Missing)
    }
}

/// Front-end normalisation constant for a variable's trend indicator.
///
/// Fixed per physical quantity; `None` for names outside the table.
pub fn slope_scale(short_name: &str) -> Option<f64> {
    let scale = match short_name {
        "Temperature" => 10.0,
        "Dissolved Oxygen" => 200.0,
        "Chlorophyll-a" => 40.0,
        "Oxygen Saturation" => 60.0,
        "pH" => 10.0,
        "Salinity" => 5.0,
        "Nitrate" => 30.0,
        "Fluorescence" => 10.0,
        _ => return None,
    };
    Some(scale)
}

/// Trend of an hourly series in units per 14 days.
///
/// Missing samples are left out of the fit but keep their position, so a
/// gap never shifts later samples in time. Any failure to fit yields
/// [`SlopeEstimate::Missing`].
pub fn slope(series: &[Option<f64>]) -> SlopeEstimate {
    match fit_slope(series) {
        Ok(per_sample) => SlopeEstimate::Value(per_sample * SAMPLES_PER_PERIOD),
        Err(e) => {
            debug!(error = %e, samples = series.len(), "Slope unavailable");
            SlopeEstimate::Missing
        }
    }
}

fn fit_slope(series: &[Option<f64>]) -> Result<f64, FitError> {
    let filtered = centered_weighted_mean(series, &hann(DETIDE_WINDOW), DETIDE_MIN_PERIODS);
    let points: Vec<(f64, f64)> = filtered
        .iter()
        .skip(WARMUP_SAMPLES)
        .enumerate()
        .filter_map(|(x, y)| y.map(|y| (x as f64, y)))
        .collect();
    least_squares_slope(&points)
}

/// Ordinary least-squares slope of `y` on `x`.
fn least_squares_slope(points: &[(f64, f64)]) -> Result<f64, FitError> {
    if points.len() < 2 {
        return Err(FitError::InsufficientData {
            required: 2,
            found: points.len(),
        });
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;

    let (sxy, sxx) = points.iter().fold((0.0, 0.0), |(sxy, sxx), &(x, y)| {
        let dx = x - mean_x;
        (sxy + dx * (y - mean_y), sxx + dx * dx)
    });

    if sxx == 0.0 {
        return Err(FitError::Degenerate);
    }
    let slope = sxy / sxx;
    if !slope.is_finite() {
        return Err(FitError::Degenerate);
    }
    Ok(slope)
}
