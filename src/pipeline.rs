//! One station, end to end.
//!
//! Fetch, mask, convert, resample, fill, fit, and export. Nothing is
//! written for a station unless every stage before the write succeeded.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::StationConfig;
use crate::error::{PipelineError, TransportError};
use crate::fetch::{ErddapClient, HttpClient};
use crate::output::{JsonPayload, export, write_station_json};
use crate::presentation::ChartModel;
use crate::processing::{
    GRID_LEN, SlopeEstimate, apply_unit_conversions, fill_to_present_at, mask_with_report,
    resample, slope,
};
use crate::series::{GapFilledSeries, HourlyTimeSeries, RawObservationTable};
use crate::stats::RunStats;
use crate::upwelling::upwelling_index;

/// Everything computed for one station in one run.
#[derive(Debug, Clone)]
pub struct StationRun {
    pub hourly: HourlyTimeSeries,
    pub gap_filled: GapFilledSeries,
    pub slopes: Vec<SlopeEstimate>,
    pub payload: JsonPayload,
    pub stats: RunStats,
}

/// Masks, converts, and resamples fetched tables into the hourly series
/// shared by the export and chart paths.
pub fn prepare_hourly(
    config: &StationConfig,
    data: &RawObservationTable,
    qc: Option<&RawObservationTable>,
    stats: &mut RunStats,
) -> HourlyTimeSeries {
    let (mut masked, report) = mask_with_report(data, qc, &config.qc_column_mapping());
    apply_unit_conversions(&mut masked, config.variables());
    let hourly = resample(&masked, config.variables(), config.timezone());

    stats.raw_rows = data.len();
    stats.qc_rows = qc.map(|t| t.len());
    stats.joined_rows = report.joined_rows;
    stats.failed_values = report.failed_values;
    stats.hourly_rows = hourly.len();
    hourly
}

/// Runs every processing stage over already-fetched tables.
#[tracing::instrument(skip_all, fields(station_id = %config.station_id()))]
pub fn process_tables(
    config: &StationConfig,
    data: &RawObservationTable,
    qc: Option<&RawObservationTable>,
    now: DateTime<Utc>,
) -> StationRun {
    let mut stats = RunStats::new().with_station(config.station_id(), config.display_name());
    let hourly = prepare_hourly(config, data, qc, &mut stats);
    let gap_filled = fill_to_present_at(&hourly, config.timezone(), now);

    // Trends come from the hourly record, not the padded grid.
    let slopes: Vec<SlopeEstimate> = config
        .variables()
        .iter()
        .map(|var| match hourly.column(&var.short_name) {
            Some(values) => slope(values),
            None => SlopeEstimate::Missing,
        })
        .collect();

    let payload = export(&gap_filled, &slopes, config);

    stats.variables = config.variables().len();
    stats.grid_cells = stats.variables * GRID_LEN;
    stats.grid_present = payload
        .variables
        .iter()
        .map(|(_, v)| v.values.iter().filter(|x| x.is_some()).count())
        .sum();
    stats.slopes_missing = slopes.iter().filter(|s| s.is_missing()).count();

    info!(
        raw_rows = stats.raw_rows,
        hourly_rows = stats.hourly_rows,
        failed_values = stats.failed_values,
        coverage_pct = stats.coverage_pct(),
        "Station processed"
    );

    StationRun {
        hourly,
        gap_filled,
        slopes,
        payload,
        stats,
    }
}

/// Drives station runs against one data service.
pub struct Pipeline<C> {
    erddap: ErddapClient<C>,
}

impl<C: HttpClient> Pipeline<C> {
    pub fn new(erddap: ErddapClient<C>) -> Self {
        Self { erddap }
    }

    /// Fetches and processes a station as of `now`.
    pub fn run_at(
        &self,
        config: &StationConfig,
        now: DateTime<Utc>,
    ) -> Result<StationRun, TransportError> {
        let (data, qc) = self.erddap.fetch(config)?;
        Ok(process_tables(config, &data, qc.as_ref(), now))
    }

    /// Runs a station and writes `<out_dir>/<station_id>.json`.
    ///
    /// The returned stats describe the run whether or not it succeeded.
    pub fn export_station_at(
        &self,
        config: &StationConfig,
        out_dir: &Path,
        now: DateTime<Utc>,
    ) -> (Result<PathBuf, PipelineError>, RunStats) {
        let run = match self.run_at(config, now) {
            Ok(run) => run,
            Err(e) => {
                let err = PipelineError::from(e);
                let stats = RunStats::from_error(err.kind(), &err.to_string())
                    .with_station(config.station_id(), config.display_name());
                return (Err(err), stats);
            }
        };

        match write_station_json(&run.payload, out_dir, config.station_id()) {
            Ok(path) => (Ok(path), run.stats),
            Err(e) => {
                let err = PipelineError::from(e);
                let stats = RunStats {
                    error_type: Some(err.kind().to_string()),
                    error_message: Some(err.to_string()),
                    ..run.stats
                };
                (Err(err), stats)
            }
        }
    }

    pub fn export_station(
        &self,
        config: &StationConfig,
        out_dir: &Path,
    ) -> (Result<PathBuf, PipelineError>, RunStats) {
        self.export_station_at(config, out_dir, Utc::now())
    }

    /// Builds the chart model. A failed fetch yields the unavailable
    /// placeholder; a failed wind fetch only drops the upwelling panel.
    #[tracing::instrument(skip_all, fields(station_id = %config.station_id()))]
    pub fn chart_at(&self, config: &StationConfig, now: DateTime<Utc>) -> ChartModel {
        let (data, qc) = match self.erddap.fetch(config) {
            Ok(tables) => tables,
            Err(e) => {
                warn!(error = %e, "Station data unavailable, rendering placeholder");
                return ChartModel::unavailable(config, e.to_string(), now);
            }
        };

        let mut stats = RunStats::new();
        let hourly = prepare_hourly(config, &data, qc.as_ref(), &mut stats);

        let upwelling = config.wind().and_then(|wind| {
            match self.erddap.fetch_wind(wind, config.lookback_days()) {
                Ok(table) => Some(upwelling_index(&table, wind.anemometer_height)),
                Err(e) => {
                    warn!(error = %e, wind_station = %wind.station_id, "Offshore wind unavailable");
                    None
                }
            }
        });

        ChartModel::build(config, &hourly, upwelling, now)
    }

    pub fn chart(&self, config: &StationConfig) -> ChartModel {
        self.chart_at(config, Utc::now())
    }
}
