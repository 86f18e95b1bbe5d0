//! Chart model handed to the external renderer.
//!
//! Holds everything needed to draw one station's figure: a title block,
//! one panel per declared variable with its hourly points, optional
//! smoothed line, colour, units, and y-limits, plus an optional upwelling
//! panel. Styling beyond that is the renderer's business.

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use serde::Serialize;

use crate::config::{StationConfig, YLimits};
use crate::processing::utility::min_max;
use crate::series::{HourlyTimeSeries, rolling_name};
use crate::upwelling::UpwellingSeries;

/// Seaborn "deep" palette, cycled across panels.
pub const PALETTE: [&str; 10] = [
    "#4C72B0", "#DD8452", "#55A868", "#C44E52", "#8172B3", "#937860", "#DA8BC3", "#8C8C8C",
    "#CCB974", "#64B5CD",
];

/// Extra room on the right of the time axis.
const X_PADDING_HOURS: i64 = 8;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Panel {
    pub short_name: String,
    pub units: String,
    pub color: &'static str,
    pub time: Vec<DateTime<FixedOffset>>,
    pub values: Vec<Option<f64>>,
    /// Smoothed line, for variables declared with `running_mean`.
    pub rolling: Option<Vec<Option<f64>>>,
    /// `None` lets the renderer pick limits from the data.
    pub y_limits: Option<YLimits>,
    /// Station comments; only ever set on the last panel.
    pub comments: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartModel {
    pub title: String,
    pub subtitle: String,
    pub updated_on: DateTime<Utc>,
    pub x_range: (DateTime<Utc>, DateTime<Utc>),
    pub panels: Vec<Panel>,
    pub upwelling: Option<UpwellingSeries>,
    /// Set when the station's data could not be fetched.
    pub unavailable: Option<String>,
}

impl ChartModel {
    /// Builds the full figure model from a station's hourly series.
    pub fn build(
        config: &StationConfig,
        hourly: &HourlyTimeSeries,
        upwelling: Option<UpwellingSeries>,
        now: DateTime<Utc>,
    ) -> Self {
        let time: Vec<DateTime<FixedOffset>> =
            hourly.index().iter().map(|t| t.fixed_offset()).collect();
        let last = config.variables().len().saturating_sub(1);

        let panels = config
            .variables()
            .iter()
            .enumerate()
            .map(|(i, var)| {
                let values = hourly
                    .column(&var.short_name)
                    .map(<[_]>::to_vec)
                    .unwrap_or_else(|| vec![None; hourly.len()]);
                let rolling = if var.smoothed {
                    hourly.column(&rolling_name(&var.short_name)).map(<[_]>::to_vec)
                } else {
                    None
                };
                Panel {
                    short_name: var.short_name.clone(),
                    units: var.output_units().to_string(),
                    color: PALETTE[i % PALETTE.len()],
                    time: time.clone(),
                    y_limits: resolve_y_limits(var.y_limits, &values),
                    values,
                    rolling,
                    comments: (i == last).then(|| config.comments().map(str::to_string)).flatten(),
                }
            })
            .collect();

        Self {
            upwelling,
            panels,
            ..Self::frame(config, now)
        }
    }

    /// Placeholder figure for a station whose data could not be fetched.
    pub fn unavailable(config: &StationConfig, reason: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            unavailable: Some(reason.into()),
            ..Self::frame(config, now)
        }
    }

    fn frame(config: &StationConfig, now: DateTime<Utc>) -> Self {
        let start = now - TimeDelta::days(i64::from(config.lookback_days()));
        let end = now + TimeDelta::hours(X_PADDING_HOURS);
        Self {
            title: config.display_name().to_string(),
            subtitle: config.data_provider().to_string(),
            updated_on: now,
            x_range: (start, end),
            panels: Vec::new(),
            upwelling: None,
            unavailable: None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.unavailable.is_some()
    }
}

/// Widens declared limits so no observed value falls outside them.
pub fn resolve_y_limits(declared: Option<YLimits>, values: &[Option<f64>]) -> Option<YLimits> {
    let mut limits = declared?;
    if let Some((lo, hi)) = min_max(values) {
        limits.min = limits.min.min(lo);
        limits.max = limits.max.max(hi);
    }
    Some(limits)
}
