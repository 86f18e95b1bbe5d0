//! Reindexing onto the fixed trailing export grid.
//!
//! The grid runs hourly from `now - 14 days` to `now` inclusive, where `now`
//! is the station-local wall clock rounded to the nearest hour. Grid
//! timestamps are naive local times; the offset is dropped here and a fixed
//! shift is applied at export instead.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, TimeDelta, Timelike, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::series::{GapFilledSeries, HourlyTimeSeries};

/// Days covered by the export grid.
pub const GRID_DAYS: i64 = 14;

/// Points on the export grid, both ends included.
pub const GRID_LEN: usize = (GRID_DAYS * 24 + 1) as usize;

/// [`fill_to_present_at`] against the current clock.
pub fn fill_to_present(hourly: &HourlyTimeSeries, tz: Tz) -> GapFilledSeries {
    fill_to_present_at(hourly, tz, Utc::now())
}

/// Reindexes `hourly` onto the [`GRID_LEN`]-point grid ending at `now`.
///
/// Grid hours with no input row are missing; input rows off the grid are
/// dropped. If two input rows share a naive local hour (the repeated hour
/// when clocks fall back), the earlier one is kept.
pub fn fill_to_present_at(hourly: &HourlyTimeSeries, tz: Tz, now: DateTime<Utc>) -> GapFilledSeries {
    let end = round_to_hour(now.with_timezone(&tz).naive_local());
    let start = end - TimeDelta::days(GRID_DAYS);
    let grid: Vec<NaiveDateTime> = (0..GRID_LEN as i64)
        .map(|h| start + TimeDelta::hours(h))
        .collect();

    let mut rows: HashMap<NaiveDateTime, usize> = HashMap::with_capacity(hourly.len());
    for (row, time) in hourly.index().iter().enumerate() {
        rows.entry(time.naive_local()).or_insert(row);
    }

    let mut filled = GapFilledSeries::with_index(grid);
    for column in hourly.columns() {
        let values = filled
            .index()
            .iter()
            .map(|t| rows.get(t).and_then(|&row| column.values[row]))
            .collect();
        filled.insert_column(column.name.clone(), values);
    }

    debug!(
        grid_start = %start,
        grid_end = %end,
        hourly_rows = hourly.len(),
        "Reindexed onto export grid"
    );
    filled
}

/// Rounds to the nearest whole hour; exactly half past rounds up.
fn round_to_hour(t: NaiveDateTime) -> NaiveDateTime {
    let past = TimeDelta::seconds(i64::from(t.minute() * 60 + t.second()))
        + TimeDelta::nanoseconds(i64::from(t.nanosecond()));
    let floor = t - past;
    if past >= TimeDelta::minutes(30) {
        floor + TimeDelta::hours(1)
    } else {
        floor
    }
}
