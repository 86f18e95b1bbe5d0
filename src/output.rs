//! Wire payload for the web dashboard, plus persistence of run records.
//!
//! The station JSON keeps a stable key order: `name`, `datetime`, then one
//! object per variable in declared order.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use serde::Serialize;
use serde::ser::{SerializeMap, SerializeStruct, Serializer};
use serde_json::ser::PrettyFormatter;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::config::StationConfig;
use crate::error::ExportError;
use crate::processing::slope::{SlopeEstimate, slope_scale};
use crate::processing::utility::round_to;
use crate::series::GapFilledSeries;
use crate::stats::RunStats;

/// Fixed shift added to every exported timestamp, in seconds. Applied
/// regardless of daylight saving.
pub const DATETIME_OFFSET_SECS: i64 = 7 * 60 * 60;

const VALUE_DECIMALS: i32 = 2;
const SLOPE_DECIMALS: i32 = 3;

/// A number, or the literal string `"null"` when absent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumberOrNull(pub Option<f64>);

impl Serialize for NumberOrNull {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Some(v) => serializer.serialize_f64(v),
            None => serializer.serialize_str("null"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariablePayload {
    /// Rounded to two decimals; `None` serializes as JSON `null`.
    pub values: Vec<Option<f64>>,
    pub units: String,
    pub slope_scale: NumberOrNull,
    pub slope: NumberOrNull,
}

impl Serialize for VariablePayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("VariablePayload", 4)?;
        s.serialize_field("values", &self.values)?;
        s.serialize_field("units", &self.units)?;
        s.serialize_field("slope_scale", &self.slope_scale)?;
        s.serialize_field("slope", &self.slope)?;
        s.end()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsonPayload {
    pub name: String,
    pub datetime: Vec<i64>,
    /// `(short_name, payload)` in declared order.
    pub variables: Vec<(String, VariablePayload)>,
}

impl JsonPayload {
    pub fn variable(&self, short_name: &str) -> Option<&VariablePayload> {
        self.variables
            .iter()
            .find(|(name, _)| name == short_name)
            .map(|(_, v)| v)
    }
}

impl Serialize for JsonPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2 + self.variables.len()))?;
        map.serialize_entry("name", &self.name)?;
        map.serialize_entry("datetime", &self.datetime)?;
        for (name, variable) in &self.variables {
            map.serialize_entry(name, variable)?;
        }
        map.end()
    }
}

/// Assembles the payload for one station.
///
/// `slopes` runs parallel to `config.variables()`. Every declared variable
/// appears, all-null if it never made it onto the grid.
pub fn export(
    gap_filled: &GapFilledSeries,
    slopes: &[SlopeEstimate],
    config: &StationConfig,
) -> JsonPayload {
    let datetime = gap_filled
        .index()
        .iter()
        .map(|t| t.and_utc().timestamp() + DATETIME_OFFSET_SECS)
        .collect();

    let variables = config
        .variables()
        .iter()
        .enumerate()
        .map(|(i, var)| {
            let values = match gap_filled.column(&var.short_name) {
                Some(values) => values
                    .iter()
                    .map(|v| v.map(|v| round_to(v, VALUE_DECIMALS)))
                    .collect(),
                None => vec![None; gap_filled.len()],
            };
            let slope = slopes
                .get(i)
                .and_then(SlopeEstimate::value)
                .map(|s| round_to(s, SLOPE_DECIMALS));
            let payload = VariablePayload {
                values,
                units: var.output_units().to_string(),
                slope_scale: NumberOrNull(slope_scale(&var.short_name)),
                slope: NumberOrNull(slope),
            };
            (var.short_name.clone(), payload)
        })
        .collect();

    JsonPayload {
        name: config.display_name().to_string(),
        datetime,
        variables,
    }
}

/// Serializes `value` with four-space indentation.
pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>, ExportError> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}

/// Writes `value` as JSON to `path` through a temporary file in the same
/// directory, so readers never see a partial file.
pub fn write_json_atomic<T: Serialize>(value: &T, path: &Path) -> Result<(), ExportError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let io_err = |source: std::io::Error| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };

    fs::create_dir_all(dir).map_err(io_err)?;
    let bytes = to_pretty_json(value)?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(&bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    debug!(path = %path.display(), bytes = bytes.len(), "JSON written");
    Ok(())
}

/// Writes `<out_dir>/<station_id>.json` and returns its path.
#[tracing::instrument(skip(payload, out_dir), fields(out_dir = %out_dir.display()))]
pub fn write_station_json(
    payload: &JsonPayload,
    out_dir: &Path,
    station_id: &str,
) -> Result<PathBuf, ExportError> {
    let path = out_dir.join(format!("{station_id}.json"));
    write_json_atomic(payload, &path)?;
    info!(path = %path.display(), points = payload.datetime.len(), "Station JSON written");
    Ok(path)
}

/// Logs a run record as pretty-printed JSON.
pub fn print_json(stats: &RunStats) -> Result<(), ExportError> {
    info!("{}", serde_json::to_string_pretty(stats)?);
    Ok(())
}

/// Appends `stats` as one CSV row to the run ledger at `path`. A new ledger
/// starts with a header row.
pub fn append_record(path: &Path, stats: &RunStats) -> Result<(), ExportError> {
    let io_err = |source: std::io::Error| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };
    let new_ledger = !path.exists();

    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .map_err(io_err)?;
    let mut ledger = WriterBuilder::new().has_headers(new_ledger).from_writer(file);
    ledger.serialize(stats)?;
    ledger.flush().map_err(io_err)?;

    debug!(path = %path.display(), new_ledger, "Run record appended");
    Ok(())
}
