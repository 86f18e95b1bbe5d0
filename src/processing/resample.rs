//! Hourly regularization and smoothing.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Timelike, Utc};
use chrono_tz::Tz;
use tracing::debug;

use super::window::{centered_weighted_mean, hamming};
use crate::config::VariableSpec;
use crate::series::{HourlyTimeSeries, RawObservationTable, rolling_name};

/// Samples in the smoothing window (one per hour).
pub const SMOOTHING_WINDOW: usize = 6;

/// Every sample of the smoothing window must be present.
pub const SMOOTHING_MIN_PERIODS: usize = 6;

const SECONDS_PER_HOUR: i64 = 3600;

/// Means every column within the station's wall-clock hours, from the first
/// occupied hour to the last. Hours with no present samples are missing.
///
/// Each variable marked `smoothed` gains a `<short_name>_rolling` column:
/// a centered Hamming-weighted mean over [`SMOOTHING_WINDOW`] hours. The
/// index is expressed in `tz`.
#[tracing::instrument(skip_all, fields(rows = masked.len()))]
pub fn resample(masked: &RawObservationTable, variables: &[VariableSpec], tz: Tz) -> HourlyTimeSeries {
    let names: Vec<&str> = masked.column_names().collect();
    let mut hourly = HourlyTimeSeries::new(names.iter().copied());

    // local hour start (unix seconds) -> per-column (sum, count)
    let mut buckets: BTreeMap<i64, Vec<(f64, usize)>> = BTreeMap::new();
    for (row, time) in masked.index().iter().enumerate() {
        let key = local_hour_start(time, tz);
        let sums = buckets
            .entry(key)
            .or_insert_with(|| vec![(0.0, 0); names.len()]);
        for (slot, column) in sums.iter_mut().zip(masked.columns()) {
            if let Some(v) = column.values[row] {
                slot.0 += v;
                slot.1 += 1;
            }
        }
    }

    if let (Some((&first, _)), Some((&last, _))) =
        (buckets.first_key_value(), buckets.last_key_value())
    {
        if let Some(start) = DateTime::<Utc>::from_timestamp(first, 0) {
            let hours = (last - first) / SECONDS_PER_HOUR;
            for h in 0..=hours {
                let key = first + h * SECONDS_PER_HOUR;
                let time = (start + TimeDelta::hours(h)).with_timezone(&tz);
                let values = match buckets.get(&key) {
                    Some(sums) => sums
                        .iter()
                        .map(|&(sum, count)| (count > 0).then(|| sum / count as f64))
                        .collect(),
                    None => vec![None; names.len()],
                };
                hourly.push_row(time, values);
            }
        }
    }

    let weights = hamming(SMOOTHING_WINDOW);
    for var in variables.iter().filter(|v| v.smoothed) {
        let smoothed = match hourly.column(&var.short_name) {
            Some(values) => centered_weighted_mean(values, &weights, SMOOTHING_MIN_PERIODS),
            None => continue,
        };
        hourly.insert_column(rolling_name(&var.short_name), smoothed);
    }

    debug!(hourly_rows = hourly.len(), "Resampled to hourly means");
    hourly
}

/// Unix seconds at the top of the local hour containing `time`. Differs from
/// the UTC hour for zones offset by a fraction of an hour.
fn local_hour_start(time: &DateTime<Utc>, tz: Tz) -> i64 {
    let local = time.with_timezone(&tz);
    time.timestamp() - i64::from(local.minute() * 60 + local.second())
}
