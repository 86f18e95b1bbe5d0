use chrono::{DateTime, Utc};
use serde::Serialize;

/// One row of the run ledger: how much data survived each stage of a
/// station's run, or why the run failed.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct RunStats {
    pub timestamp: DateTime<Utc>,
    pub station_id: Option<String>,
    pub station_name: Option<String>,

    // row counts by stage
    pub raw_rows: usize,
    pub qc_rows: Option<usize>,
    pub joined_rows: usize,
    pub failed_values: usize,
    pub hourly_rows: usize,

    // export grid
    pub variables: usize,
    pub grid_cells: usize,
    pub grid_present: usize,
    pub slopes_missing: usize,

    // error tracking
    pub error_type: Option<String>,
    pub error_message: Option<String>,
}

impl RunStats {
    /// Empty record stamped with the current time.
    pub fn new() -> Self {
        RunStats {
            timestamp: Utc::now(),
            ..Default::default()
        }
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    /// Share of exported grid cells that carry a value.
    pub fn coverage_pct(&self) -> f64 {
        Self::pct(self.grid_present, self.grid_cells)
    }

    /// Create an error record with timestamp and error information
    pub fn from_error(error_type: &str, error_message: &str) -> Self {
        RunStats {
            timestamp: Utc::now(),
            error_type: Some(error_type.to_string()),
            error_message: Some(error_message.to_string()),
            ..Default::default()
        }
    }

    /// Set station metadata (id and display name)
    pub fn with_station(mut self, station_id: &str, station_name: &str) -> Self {
        self.station_id = Some(station_id.to_string());
        self.station_name = Some(station_name.to_string());
        self
    }

    pub fn is_error(&self) -> bool {
        self.error_type.is_some()
    }
}
