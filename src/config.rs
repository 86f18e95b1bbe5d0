//! Station parameter files.
//!
//! A parameter file is a JSON record per station:
//!
//! ```json
//! {
//!   "erddap-id": "morro-bay-bs1",
//!   "station-name": "Morro Bay BS1",
//!   "data-provider": "Cal Poly",
//!   "past_days": 7,
//!   "data_variables": [
//!     {"var-id": "sea_water_temperature", "short_name": "Temperature",
//!      "units": "C", "running_mean": true, "ylims": [10, 20]}
//!   ],
//!   "qartod_variables": [
//!     {"qartod-var-id": "sea_water_temperature_qc_agg"}
//!   ]
//! }
//! ```
//!
//! The file is validated once by [`StationConfig::load`]; the resulting
//! record is immutable and every later stage only borrows it.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::ConfigError;

/// Time zone used when a parameter file does not name one.
pub const DEFAULT_TIMEZONE: &str = "US/Pacific";

/// Display aliases applied to `short_name` at load time.
const SHORT_NAME_ALIASES: &[(&str, &str)] = &[("Dissolved Oxygen Saturation", "Oxygen Saturation")];

/// Short name that receives the µmol/L to mg/L correction.
const DISSOLVED_OXYGEN: &str = "Dissolved Oxygen";

/// µmol/L of O2 to mg/L.
pub const OXYGEN_UMOL_TO_MG: f64 = 0.03199;

const DEFAULT_ANEMOMETER_HEIGHT_M: f64 = 10.0;

#[derive(Debug, Deserialize)]
struct RawStationParams {
    #[serde(rename = "erddap-id")]
    erddap_id: String,
    #[serde(rename = "station-name", default)]
    station_name: Option<String>,
    #[serde(rename = "data-provider", default)]
    data_provider: Option<String>,
    past_days: i64,
    data_variables: Vec<RawVariable>,
    #[serde(default)]
    qartod_variables: Vec<RawQcVariable>,
    #[serde(default)]
    comments: Option<String>,
    #[serde(rename = "web-url-fname", default)]
    web_url_fname: Option<String>,
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    wind: Option<RawWind>,
}

#[derive(Debug, Deserialize)]
struct RawVariable {
    #[serde(rename = "var-id")]
    var_id: String,
    short_name: String,
    units: String,
    #[serde(default)]
    running_mean: Option<serde_json::Value>,
    #[serde(default)]
    ylims: Option<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
struct RawQcVariable {
    #[serde(rename = "qartod-var-id")]
    qartod_var_id: String,
}

#[derive(Debug, Deserialize)]
struct RawWind {
    #[serde(rename = "erddap-id")]
    erddap_id: String,
    #[serde(rename = "anemometer-height", default)]
    anemometer_height: Option<f64>,
}

/// Declared axis limits for a variable's chart panel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YLimits {
    pub min: f64,
    pub max: f64,
}

/// A fixed correction applied to a variable's values after QC masking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitConversion {
    /// Dissolved oxygen reported in µmol/L, exported in mg/L.
    OxygenMicromolarToMgPerLitre,
}

impl UnitConversion {
    pub fn factor(&self) -> f64 {
        match self {
            UnitConversion::OxygenMicromolarToMgPerLitre => OXYGEN_UMOL_TO_MG,
        }
    }

    pub fn target_units(&self) -> &'static str {
        match self {
            UnitConversion::OxygenMicromolarToMgPerLitre => "mg/L",
        }
    }

    fn detect(short_name: &str, units: &str) -> Option<Self> {
        let units = units.trim().to_lowercase();
        let micromolar = matches!(units.as_str(), "umol/l" | "µmol/l" | "μmol/l" | "umol l-1");
        (short_name == DISSOLVED_OXYGEN && micromolar)
            .then_some(UnitConversion::OxygenMicromolarToMgPerLitre)
    }
}

/// One requested data variable, in declared order.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSpec {
    /// Remote column id, e.g. `sea_water_temperature`.
    pub var_id: String,
    /// Data key and display name, aliases already resolved.
    pub short_name: String,
    /// Units as declared in the parameter file.
    pub units: String,
    /// Whether a `<short_name>_rolling` column is produced.
    pub smoothed: bool,
    pub y_limits: Option<YLimits>,
    pub conversion: Option<UnitConversion>,
}

impl VariableSpec {
    /// Units of the values after any conversion has been applied.
    pub fn output_units(&self) -> &str {
        match &self.conversion {
            Some(conversion) => conversion.target_units(),
            None => &self.units,
        }
    }
}

/// QC flag column gating the data variable at the same position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QcVariableSpec {
    pub qc_var_id: String,
}

/// Offshore buoy used for the upwelling panel of the chart.
#[derive(Debug, Clone, PartialEq)]
pub struct WindSource {
    pub station_id: String,
    pub anemometer_height: f64,
}

/// Validated, immutable description of one monitoring station.
#[derive(Debug, Clone)]
pub struct StationConfig {
    station_id: String,
    display_name: String,
    data_provider: String,
    lookback_days: u32,
    variables: Vec<VariableSpec>,
    qc_variables: Vec<QcVariableSpec>,
    comments: Option<String>,
    web_url_fname: Option<String>,
    timezone: Tz,
    wind: Option<WindSource>,
}

impl StationConfig {
    /// Reads and validates a parameter file.
    #[tracing::instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Validates a parameter record held in memory.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Self::parse(json, Path::new("<inline>"))
    }

    fn parse(json: &str, origin: &Path) -> Result<Self, ConfigError> {
        let raw: RawStationParams =
            serde_json::from_str(json).map_err(|source| ConfigError::Parse {
                path: origin.to_path_buf(),
                source,
            })?;
        let config = Self::validate(raw)?;
        debug!(
            station_id = %config.station_id,
            variables = config.variables.len(),
            qc = config.qc_enabled(),
            "Station parameters loaded"
        );
        Ok(config)
    }

    fn validate(raw: RawStationParams) -> Result<Self, ConfigError> {
        let station_id = raw.erddap_id.trim().to_string();
        if station_id.is_empty() {
            return Err(ConfigError::invalid("<unnamed>", "erddap-id is empty"));
        }
        let invalid = |reason: String| ConfigError::invalid(&station_id, reason);

        if raw.past_days < 1 {
            return Err(invalid(format!("past_days must be >= 1, got {}", raw.past_days)));
        }
        let lookback_days = u32::try_from(raw.past_days)
            .map_err(|_| invalid(format!("past_days {} is out of range", raw.past_days)))?;

        if raw.data_variables.is_empty() {
            return Err(invalid("data_variables is empty".to_string()));
        }

        let mut seen = HashSet::new();
        let mut variables = Vec::with_capacity(raw.data_variables.len());
        for var in raw.data_variables {
            if var.var_id.trim().is_empty() {
                return Err(invalid("a data variable has an empty var-id".to_string()));
            }
            let short_name = resolve_alias(var.short_name.trim());
            if short_name.is_empty() {
                return Err(invalid(format!("variable '{}' has an empty short_name", var.var_id)));
            }
            if !seen.insert(short_name.clone()) {
                return Err(invalid(format!("duplicate short_name '{short_name}'")));
            }

            let y_limits = match var.ylims {
                Some([min, max]) if !(min.is_finite() && max.is_finite() && min < max) => {
                    return Err(invalid(format!(
                        "ylims for '{short_name}' must be finite with min < max, got [{min}, {max}]"
                    )));
                }
                Some([min, max]) => Some(YLimits { min, max }),
                None => None,
            };

            // Presence of the key enables smoothing; only an explicit false disables it.
            let smoothed = match var.running_mean {
                None | Some(serde_json::Value::Bool(false)) => false,
                Some(_) => true,
            };

            let conversion = UnitConversion::detect(&short_name, &var.units);
            variables.push(VariableSpec {
                var_id: var.var_id.trim().to_string(),
                short_name,
                units: var.units,
                smoothed,
                y_limits,
                conversion,
            });
        }

        let qc_variables: Vec<QcVariableSpec> = raw
            .qartod_variables
            .into_iter()
            .map(|qc| QcVariableSpec {
                qc_var_id: qc.qartod_var_id.trim().to_string(),
            })
            .collect();
        if !qc_variables.is_empty() && qc_variables.len() != variables.len() {
            return Err(invalid(format!(
                "{} qartod_variables declared for {} data_variables",
                qc_variables.len(),
                variables.len()
            )));
        }
        if qc_variables.iter().any(|qc| qc.qc_var_id.is_empty()) {
            return Err(invalid("a qartod variable has an empty qartod-var-id".to_string()));
        }

        let timezone_name = raw.timezone.as_deref().unwrap_or(DEFAULT_TIMEZONE);
        let timezone: Tz = timezone_name
            .parse()
            .map_err(|e| invalid(format!("unknown timezone '{timezone_name}': {e}")))?;

        let wind = match raw.wind {
            Some(w) => {
                let height = w.anemometer_height.unwrap_or(DEFAULT_ANEMOMETER_HEIGHT_M);
                if w.erddap_id.trim().is_empty() || !(height.is_finite() && height > 0.0) {
                    return Err(invalid(
                        "wind needs an erddap-id and a positive anemometer-height".to_string(),
                    ));
                }
                Some(WindSource {
                    station_id: w.erddap_id.trim().to_string(),
                    anemometer_height: height,
                })
            }
            None => None,
        };

        Ok(Self {
            display_name: raw.station_name.unwrap_or_else(|| station_id.clone()),
            data_provider: raw.data_provider.unwrap_or_default(),
            station_id,
            lookback_days,
            variables,
            qc_variables,
            comments: raw.comments,
            web_url_fname: raw.web_url_fname,
            timezone,
            wind,
        })
    }

    /// Remote dataset slug; also the output file stem.
    pub fn station_id(&self) -> &str {
        &self.station_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn data_provider(&self) -> &str {
        &self.data_provider
    }

    pub fn lookback_days(&self) -> u32 {
        self.lookback_days
    }

    pub fn variables(&self) -> &[VariableSpec] {
        &self.variables
    }

    pub fn variable(&self, short_name: &str) -> Option<&VariableSpec> {
        self.variables.iter().find(|v| v.short_name == short_name)
    }

    pub fn qc_variables(&self) -> &[QcVariableSpec] {
        &self.qc_variables
    }

    pub fn qc_enabled(&self) -> bool {
        !self.qc_variables.is_empty()
    }

    /// `(data column, qc column)` pairs, position by position.
    pub fn qc_column_mapping(&self) -> Vec<(&str, &str)> {
        self.variables
            .iter()
            .zip(&self.qc_variables)
            .map(|(v, qc)| (v.short_name.as_str(), qc.qc_var_id.as_str()))
            .collect()
    }

    pub fn short_names(&self) -> Vec<&str> {
        self.variables.iter().map(|v| v.short_name.as_str()).collect()
    }

    pub fn units(&self) -> Vec<&str> {
        self.variables.iter().map(|v| v.units.as_str()).collect()
    }

    /// Short names of the variables that get a smoothed sibling column.
    pub fn rolling_variables(&self) -> Vec<&str> {
        self.variables
            .iter()
            .filter(|v| v.smoothed)
            .map(|v| v.short_name.as_str())
            .collect()
    }

    pub fn comments(&self) -> Option<&str> {
        self.comments.as_deref()
    }

    pub fn web_url_fname(&self) -> Option<&str> {
        self.web_url_fname.as_deref()
    }

    /// Chart model file name: `web-url-fname` with a `.json` extension,
    /// else `<erddap-id>_chart.json`.
    pub fn chart_file_name(&self) -> PathBuf {
        match self.web_url_fname() {
            Some(fname) => Path::new(fname).with_extension("json"),
            None => PathBuf::from(format!("{}_chart.json", self.station_id)),
        }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn wind(&self) -> Option<&WindSource> {
        self.wind.as_ref()
    }
}

/// Maps legacy short names onto their display names.
pub fn resolve_alias(short_name: &str) -> String {
    SHORT_NAME_ALIASES
        .iter()
        .find(|(from, _)| *from == short_name)
        .map(|(_, to)| to.to_string())
        .unwrap_or_else(|| short_name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MORRO: &str = r#"{
        "erddap-id": "edu_calpoly_marine_morro",
        "station-name": "Morro Bay T-Pier",
        "data-provider": "Cal Poly",
        "past_days": 7,
        "data_variables": [
            {"var-id": "sea_water_temperature", "short_name": "Temperature", "units": "C", "running_mean": true, "ylims": [10, 20]},
            {"var-id": "mass_concentration_of_oxygen_in_sea_water", "short_name": "Dissolved Oxygen", "units": "umol/L"},
            {"var-id": "fractional_saturation_of_oxygen_in_sea_water", "short_name": "Dissolved Oxygen Saturation", "units": "%"}
        ],
        "qartod_variables": [
            {"qartod-var-id": "sea_water_temperature_qc_agg"},
            {"qartod-var-id": "mass_concentration_of_oxygen_in_sea_water_qc_agg"},
            {"qartod-var-id": "fractional_saturation_of_oxygen_in_sea_water_qc_agg"}
        ],
        "comments": "pH sensor under maintenance",
        "web-url-fname": "morro_bay_tpier.png"
    }"#;

    #[test]
    fn test_load_valid_params() {
        let config = StationConfig::from_json(MORRO).unwrap();
        assert_eq!(config.station_id(), "edu_calpoly_marine_morro");
        assert_eq!(config.display_name(), "Morro Bay T-Pier");
        assert_eq!(config.lookback_days(), 7);
        assert_eq!(
            config.short_names(),
            vec!["Temperature", "Dissolved Oxygen", "Oxygen Saturation"]
        );
        assert_eq!(config.rolling_variables(), vec!["Temperature"]);
        assert_eq!(config.timezone(), chrono_tz::US::Pacific);
        assert_eq!(config.comments(), Some("pH sensor under maintenance"));
        assert!(config.qc_enabled());
    }

    #[test]
    fn test_units_follow_declared_order() {
        let config = StationConfig::from_json(MORRO).unwrap();
        assert_eq!(config.units(), vec!["C", "umol/L", "%"]);
    }

    #[test]
    fn test_chart_file_name_from_web_url_fname() {
        let config = StationConfig::from_json(MORRO).unwrap();
        assert_eq!(config.chart_file_name(), PathBuf::from("morro_bay_tpier.json"));

        let bare = StationConfig::from_json(
            r#"{"erddap-id": "bs1", "past_days": 1,
                "data_variables": [{"var-id": "a", "short_name": "A", "units": "x"}]}"#,
        )
        .unwrap();
        assert_eq!(bare.chart_file_name(), PathBuf::from("bs1_chart.json"));
    }

    #[test]
    fn test_alias_is_resolved_once_at_load() {
        let config = StationConfig::from_json(MORRO).unwrap();
        assert!(config.variable("Oxygen Saturation").is_some());
        assert!(config.variable("Dissolved Oxygen Saturation").is_none());
        assert_eq!(resolve_alias("Temperature"), "Temperature");
    }

    #[test]
    fn test_oxygen_conversion_detected_from_units() {
        let config = StationConfig::from_json(MORRO).unwrap();
        let oxygen = config.variable("Dissolved Oxygen").unwrap();
        assert_eq!(
            oxygen.conversion,
            Some(UnitConversion::OxygenMicromolarToMgPerLitre)
        );
        assert_eq!(oxygen.output_units(), "mg/L");

        let temperature = config.variable("Temperature").unwrap();
        assert_eq!(temperature.conversion, None);
        assert_eq!(temperature.output_units(), "C");
    }

    #[test]
    fn test_qc_mapping_follows_declared_order() {
        let config = StationConfig::from_json(MORRO).unwrap();
        let mapping = config.qc_column_mapping();
        assert_eq!(mapping[0], ("Temperature", "sea_water_temperature_qc_agg"));
        assert_eq!(
            mapping[2],
            (
                "Oxygen Saturation",
                "fractional_saturation_of_oxygen_in_sea_water_qc_agg"
            )
        );
    }

    #[test]
    fn test_misaligned_qc_list_is_rejected() {
        let json = r#"{
            "erddap-id": "bs1", "past_days": 7,
            "data_variables": [
                {"var-id": "a", "short_name": "A", "units": "x"},
                {"var-id": "b", "short_name": "B", "units": "x"}
            ],
            "qartod_variables": [{"qartod-var-id": "a_qc"}]
        }"#;
        let err = StationConfig::from_json(json).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }), "{err}");
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let json = r#"{"erddap-id": "bs1", "data_variables": []}"#;
        let err = StationConfig::from_json(json).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("past_days"));
    }

    #[test]
    fn test_zero_lookback_is_rejected() {
        let json = r#"{
            "erddap-id": "bs1", "past_days": 0,
            "data_variables": [{"var-id": "a", "short_name": "A", "units": "x"}]
        }"#;
        assert!(StationConfig::from_json(json).is_err());
    }

    #[test]
    fn test_duplicate_short_name_after_alias_is_rejected() {
        let json = r#"{
            "erddap-id": "bs1", "past_days": 7,
            "data_variables": [
                {"var-id": "a", "short_name": "Oxygen Saturation", "units": "%"},
                {"var-id": "b", "short_name": "Dissolved Oxygen Saturation", "units": "%"}
            ]
        }"#;
        let err = StationConfig::from_json(json).unwrap_err();
        assert!(err.to_string().contains("duplicate short_name"));
    }

    #[test]
    fn test_inverted_ylims_are_rejected() {
        let json = r#"{
            "erddap-id": "bs1", "past_days": 7,
            "data_variables": [{"var-id": "a", "short_name": "A", "units": "x", "ylims": [5, 1]}]
        }"#;
        assert!(StationConfig::from_json(json).is_err());
    }

    #[test]
    fn test_station_without_qc_skips_masking() {
        let json = r#"{
            "erddap-id": "bs1", "past_days": 3,
            "data_variables": [{"var-id": "a", "short_name": "A", "units": "x", "running_mean": false}]
        }"#;
        let config = StationConfig::from_json(json).unwrap();
        assert!(!config.qc_enabled());
        assert!(config.qc_column_mapping().is_empty());
        assert!(config.rolling_variables().is_empty());
        assert_eq!(config.display_name(), "bs1");
    }

    #[test]
    fn test_unknown_timezone_is_rejected() {
        let json = r#"{
            "erddap-id": "bs1", "past_days": 3, "timezone": "Mars/Olympus",
            "data_variables": [{"var-id": "a", "short_name": "A", "units": "x"}]
        }"#;
        assert!(StationConfig::from_json(json).is_err());
    }

    #[test]
    fn test_wind_source_defaults_height() {
        let json = r#"{
            "erddap-id": "bs1", "past_days": 3,
            "wind": {"erddap-id": "wmo_46028"},
            "data_variables": [{"var-id": "a", "short_name": "A", "units": "x"}]
        }"#;
        let config = StationConfig::from_json(json).unwrap();
        let wind = config.wind().unwrap();
        assert_eq!(wind.station_id, "wmo_46028");
        assert_eq!(wind.anemometer_height, 10.0);
    }
}
