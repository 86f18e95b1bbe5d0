//! Wind-driven upwelling index for the chart's offshore panel.
//!
//! Wind speed at the anemometer is brought to 10 m with the Large & Pond
//! neutral drag law, turned into a wind stress, and the alongshore component
//! divided by the Coriolis parameter gives Ekman transport. The JSON export
//! never carries this quantity.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::series::RawObservationTable;

/// von Kármán constant.
const KAPPA: f64 = 0.4;

/// Air density, kg/m³.
const RHO_AIR: f64 = 1.22;

/// Coriolis parameter for the station's latitude band, scaled as plotted.
const CORIOLIS: f64 = 0.935;

/// Convergence tolerance on the 10 m wind speed, m/s.
const TOLERANCE: f64 = 0.001;

const MAX_ITERATIONS: usize = 50;

/// Column ids in the offshore wind table.
pub const WIND_SPEED: &str = "wind_speed";
pub const WIND_FROM_DIRECTION: &str = "wind_from_direction";
pub const OFFSHORE_TEMPERATURE: &str = "sea_water_temperature";

/// Large & Pond neutral drag coefficient at 10 m.
fn drag_coefficient(u10: f64) -> f64 {
    if u10 < 10.15385 {
        1.15e-3
    } else {
        4.9e-4 + 6.5e-5 * u10
    }
}

/// Neutral wind speed at 10 m and its drag coefficient, from a speed
/// measured at `height` metres.
pub fn wind_at_10m(speed: f64, height: f64) -> (f64, f64) {
    let a = (height / 10.0).ln() / KAPPA;
    let mut cd: f64 = 1.15e-3;
    let mut u10 = speed / (1.0 + a * cd.sqrt());
    for _ in 0..MAX_ITERATIONS {
        cd = drag_coefficient(u10);
        let next = speed / (1.0 + a * cd.sqrt());
        let converged = (next - u10).abs() <= TOLERANCE;
        u10 = next;
        if converged {
            break;
        }
    }
    (u10, drag_coefficient(u10))
}

/// Wind stress magnitude, N/m².
pub fn wind_stress(speed: f64, height: f64) -> f64 {
    let (u10, cd) = wind_at_10m(speed, height);
    RHO_AIR * cd * u10 * u10
}

/// Ekman transport from one wind sample. Positive values favour upwelling.
pub fn ekman_transport(speed: f64, from_direction_deg: f64, height: f64) -> f64 {
    let v = wind_stress(speed, height) * -from_direction_deg.to_radians().cos();
    (-1.0 / CORIOLIS) * v
}

/// Upwelling index evaluated at each raw wind sample time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpwellingSeries {
    pub time: Vec<DateTime<Utc>>,
    pub ekman_transport: Vec<Option<f64>>,
    pub offshore_temperature: Vec<Option<f64>>,
}

/// Computes the index for every row of an offshore wind table. A row with
/// speed or direction missing yields a missing value.
pub fn upwelling_index(wind: &RawObservationTable, anemometer_height: f64) -> UpwellingSeries {
    let speed = wind.column(WIND_SPEED).unwrap_or_default();
    let direction = wind.column(WIND_FROM_DIRECTION).unwrap_or_default();
    let ekman = (0..wind.len())
        .map(|i| {
            let s = speed.get(i).copied().flatten()?;
            let d = direction.get(i).copied().flatten()?;
            Some(ekman_transport(s, d, anemometer_height))
        })
        .collect();
    let offshore_temperature = match wind.column(OFFSHORE_TEMPERATURE) {
        Some(values) => values.to_vec(),
        None => vec![None; wind.len()],
    };

    UpwellingSeries {
        time: wind.index().to_vec(),
        ekman_transport: ekman,
        offshore_temperature,
    }
}
