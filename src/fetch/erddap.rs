//! Query construction and retrieval against an ERDDAP `tabledap` endpoint.

use tracing::info;

use super::{HttpClient, fetch_text};
use crate::config::{StationConfig, WindSource};
use crate::error::TransportError;
use crate::parser::parse_table;
use crate::series::RawObservationTable;

/// Public CeNCOOS tabledap root.
pub const DEFAULT_BASE_URL: &str = "http://erddap.cencoos.org/erddap/tabledap/";

/// Column ids requested from an offshore buoy for the upwelling panel.
pub const WIND_VARIABLES: [&str; 3] = ["sea_water_temperature", "wind_speed", "wind_from_direction"];

const EXTENSION: &str = ".csvp";
const SEPARATOR: &str = "%2C";

/// Builds `<base><dataset>.csvp?time%2C<v1>%2C<v2>&time>now-<days>days`.
///
/// Column order in the response follows `variables` exactly.
pub fn query_url(base_url: &str, dataset_id: &str, variables: &[&str], past_days: u32) -> String {
    let mut url = format!("{base_url}{dataset_id}{EXTENSION}?time");
    for var in variables {
        url.push_str(SEPARATOR);
        url.push_str(var);
    }
    url.push_str(&format!("&time>now-{past_days}days"));
    url
}

/// Fetches station tables from one tabledap server.
pub struct ErddapClient<C> {
    client: C,
    base_url: String,
}

impl<C: HttpClient> ErddapClient<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Points the client at another tabledap root. A trailing `/` is added
    /// when missing.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Query for the environmental variables, in declared order.
    pub fn data_url(&self, config: &StationConfig) -> String {
        let ids: Vec<&str> = config.variables().iter().map(|v| v.var_id.as_str()).collect();
        query_url(&self.base_url, config.station_id(), &ids, config.lookback_days())
    }

    /// Query for the QC flag variables, if the station declares any.
    pub fn qc_url(&self, config: &StationConfig) -> Option<String> {
        if !config.qc_enabled() {
            return None;
        }
        let ids: Vec<&str> = config
            .qc_variables()
            .iter()
            .map(|qc| qc.qc_var_id.as_str())
            .collect();
        Some(query_url(
            &self.base_url,
            config.station_id(),
            &ids,
            config.lookback_days(),
        ))
    }

    /// Issues the data query and, for QC-enabled stations, the QC query.
    ///
    /// Data columns are named by short name; QC columns by QC variable id.
    ///
    /// # Errors
    ///
    /// Any request or parse failure is a [`TransportError`]; the caller
    /// should report the station unavailable and carry on.
    #[tracing::instrument(skip(self, config), fields(station_id = %config.station_id()))]
    pub fn fetch(
        &self,
        config: &StationConfig,
    ) -> Result<(RawObservationTable, Option<RawObservationTable>), TransportError> {
        let data_url = self.data_url(config);
        let data_columns: Vec<String> = config
            .variables()
            .iter()
            .map(|v| v.short_name.clone())
            .collect();
        let body = fetch_text(&self.client, &data_url)?;
        let data = parse_table(&body, &data_columns, &data_url)?;

        let qc = match self.qc_url(config) {
            Some(qc_url) => {
                let qc_columns: Vec<String> = config
                    .qc_variables()
                    .iter()
                    .map(|qc| qc.qc_var_id.clone())
                    .collect();
                let body = fetch_text(&self.client, &qc_url)?;
                Some(parse_table(&body, &qc_columns, &qc_url)?)
            }
            None => None,
        };

        info!(
            data_rows = data.len(),
            qc_rows = qc.as_ref().map(|t| t.len()),
            "Station tables fetched"
        );
        Ok((data, qc))
    }

    /// Fetches offshore temperature and wind for the upwelling panel.
    #[tracing::instrument(skip(self, wind), fields(wind_station = %wind.station_id))]
    pub fn fetch_wind(
        &self,
        wind: &WindSource,
        past_days: u32,
    ) -> Result<RawObservationTable, TransportError> {
        let url = query_url(&self.base_url, &wind.station_id, &WIND_VARIABLES, past_days);
        let columns: Vec<String> = WIND_VARIABLES.iter().map(|c| c.to_string()).collect();
        let body = fetch_text(&self.client, &url)?;
        parse_table(&body, &columns, &url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::BasicClient;
    use mockito::Matcher;

    const PARAMS: &str = r#"{
        "erddap-id": "morro-bay-bs1", "past_days": 7,
        "data_variables": [
            {"var-id": "sea_water_temperature", "short_name": "Temperature", "units": "C"},
            {"var-id": "sea_water_ph_reported_on_total_scale_internal", "short_name": "pH", "units": "total scale"}
        ],
        "qartod_variables": [
            {"qartod-var-id": "sea_water_temperature_qc_agg"},
            {"qartod-var-id": "sea_water_ph_reported_on_total_scale_internal_qc_agg"}
        ]
    }"#;

    const DATA_BODY: &str = "time (UTC),sea_water_temperature (degree_C),sea_water_ph (1)
2024-05-01T00:00:00Z,12.9,8.01
2024-05-01T00:10:00Z,13.1,8.02
";

    const QC_BODY: &str = "time (UTC),t_qc (1),ph_qc (1)
2024-05-01T00:00:00Z,1,1
2024-05-01T00:10:00Z,4,1
";

    #[test]
    fn test_query_url_matches_legacy_layout() {
        let url = query_url(
            DEFAULT_BASE_URL,
            "edu_calpoly_marine_morro",
            &[
                "mass_concentration_of_chlorophyll_in_sea_water",
                "sea_water_temperature",
            ],
            7,
        );
        assert_eq!(
            url,
            "http://erddap.cencoos.org/erddap/tabledap/edu_calpoly_marine_morro.csvp?time%2Cmass_concentration_of_chlorophyll_in_sea_water%2Csea_water_temperature&time>now-7days"
        );
    }

    #[test]
    fn test_qc_url_only_for_qc_stations() {
        let config = StationConfig::from_json(PARAMS).unwrap();
        let client = ErddapClient::new(BasicClient::new());
        let qc_url = client.qc_url(&config).unwrap();
        assert!(qc_url.contains("time%2Csea_water_temperature_qc_agg%2Csea_water_ph"));

        let plain = StationConfig::from_json(
            r#"{"erddap-id": "x", "past_days": 1,
                "data_variables": [{"var-id": "a", "short_name": "A", "units": "u"}]}"#,
        )
        .unwrap();
        assert!(client.qc_url(&plain).is_none());
    }

    #[test]
    fn test_with_base_url_adds_trailing_slash() {
        let client =
            ErddapClient::new(BasicClient::new()).with_base_url("http://localhost:1234/tabledap");
        assert_eq!(client.base_url(), "http://localhost:1234/tabledap/");
    }

    #[test]
    fn test_fetch_reads_data_and_qc_tables() {
        let mut server = mockito::Server::new();
        let data_mock = server
            .mock("GET", "/erddap/tabledap/morro-bay-bs1.csvp")
            .match_query(Matcher::Regex("scale_internal&".to_string()))
            .with_status(200)
            .with_body(DATA_BODY)
            .create();
        let qc_mock = server
            .mock("GET", "/erddap/tabledap/morro-bay-bs1.csvp")
            .match_query(Matcher::Regex("qc_agg".to_string()))
            .with_status(200)
            .with_body(QC_BODY)
            .create();

        let config = StationConfig::from_json(PARAMS).unwrap();
        let client = ErddapClient::new(BasicClient::new())
            .with_base_url(format!("{}/erddap/tabledap/", server.url()));

        let (data, qc) = client.fetch(&config).unwrap();

        data_mock.assert();
        qc_mock.assert();
        assert_eq!(data.len(), 2);
        assert_eq!(data.column("pH").unwrap(), &[Some(8.01), Some(8.02)]);
        let qc = qc.unwrap();
        assert_eq!(
            qc.column("sea_water_temperature_qc_agg").unwrap(),
            &[Some(1.0), Some(4.0)]
        );
    }

    #[test]
    fn test_fetch_surfaces_http_failure_as_transport_error() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("GET", "/erddap/tabledap/morro-bay-bs1.csvp")
            .match_query(Matcher::Any)
            .with_status(500)
            .create();

        let config = StationConfig::from_json(PARAMS).unwrap();
        let client = ErddapClient::new(BasicClient::new())
            .with_base_url(format!("{}/erddap/tabledap/", server.url()));

        let err = client.fetch(&config).unwrap_err();
        assert!(matches!(err, TransportError::Status { status: 500, .. }));
    }
}
