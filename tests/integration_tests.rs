use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Utc};
use oyster_dashboard::config::StationConfig;
use oyster_dashboard::error::{ConfigError, PipelineError, TransportError};
use oyster_dashboard::fetch::{ErddapClient, HttpClient};
use oyster_dashboard::output::{DATETIME_OFFSET_SECS, NumberOrNull};
use oyster_dashboard::pipeline::Pipeline;
use oyster_dashboard::processing::GRID_LEN;
use std::fs;
use std::path::Path;

/// Serves canned bodies: the first route whose needle appears in the URL wins.
struct FakeService {
    routes: Vec<(&'static str, Result<String, u16>)>,
}

impl HttpClient for FakeService {
    fn get_text(&self, url: &str) -> Result<String, TransportError> {
        let (_, response) = self
            .routes
            .iter()
            .find(|(needle, _)| url.contains(needle))
            .unwrap_or_else(|| panic!("unexpected request {url}"));
        response.clone().map_err(|status| TransportError::Status {
            url: url.to_string(),
            status,
        })
    }
}

fn pipeline(routes: Vec<(&'static str, Result<String, u16>)>) -> Pipeline<FakeService> {
    Pipeline::new(ErddapClient::new(FakeService { routes }))
}

fn fixture(name: &str) -> StationConfig {
    StationConfig::load(Path::new("tests/fixtures").join(name)).expect("fixture loads")
}

// The export grid for this clock opens at 2024-01-01 00:00 Pacific (08:00 UTC).
fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap()
}

fn grid_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()
}

fn csvp(header: &str, rows: &[(DateTime<Utc>, Vec<String>)]) -> String {
    let mut body = format!("{header}\n");
    for (time, values) in rows {
        body.push_str(&time.format("%Y-%m-%dT%H:%M:%SZ").to_string());
        for v in values {
            body.push(',');
            body.push_str(v);
        }
        body.push('\n');
    }
    body
}

/// 72 hourly temperatures rising from 10.0 to 17.1, failed by QC at hour 40.
fn temperature_routes() -> Vec<(&'static str, Result<String, u16>)> {
    let data: Vec<_> = (0..72)
        .map(|h| {
            let t = grid_start() + TimeDelta::hours(h);
            (t, vec![format!("{:.1}", 10.0 + 0.1 * h as f64)])
        })
        .collect();
    let qc: Vec<_> = (0..72)
        .map(|h| {
            let t = grid_start() + TimeDelta::hours(h);
            (t, vec![if h == 40 { "4" } else { "1" }.to_string()])
        })
        .collect();
    vec![
        (
            "qc_agg",
            Ok(csvp("time (UTC),sea_water_temperature_qc_agg (1)", &qc)),
        ),
        (
            "morro-bay-bs1.csvp",
            Ok(csvp("time (UTC),sea_water_temperature (degree_C)", &data)),
        ),
    ]
}

#[test]
fn test_full_pipeline() {
    let config = fixture("temperature-params.json");
    let run = pipeline(temperature_routes())
        .run_at(&config, now())
        .expect("station runs");

    let payload = &run.payload;
    assert_eq!(payload.name, "Morro Bay BS1");
    assert_eq!(payload.datetime.len(), GRID_LEN);
    assert!(payload.datetime.windows(2).all(|w| w[1] - w[0] == 3600));
    let first_local = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    assert_eq!(
        payload.datetime[0],
        first_local.and_utc().timestamp() + DATETIME_OFFSET_SECS
    );

    let temperature = payload.variable("Temperature").expect("declared variable");
    assert_eq!(temperature.values.len(), GRID_LEN);
    assert_eq!(temperature.values[0], Some(10.0));
    assert_eq!(temperature.values[39], Some(13.9));
    assert_eq!(temperature.values[40], None);
    assert_eq!(temperature.values[71], Some(17.1));
    assert!(temperature.values[72..].iter().all(Option::is_none));
    assert_eq!(temperature.units, "C");
    assert_eq!(temperature.slope_scale, NumberOrNull(Some(10.0)));
    match temperature.slope {
        NumberOrNull(Some(s)) => assert!(s > 0.0, "slope {s}"),
        NumberOrNull(None) => panic!("expected a slope for a 72 hour record"),
    }

    assert_eq!(run.stats.failed_values, 1);
    assert_eq!(run.stats.hourly_rows, 72);
}

#[test]
fn test_export_writes_station_file() {
    let config = fixture("temperature-params.json");
    let dir = tempfile::tempdir().unwrap();

    let (result, stats) = pipeline(temperature_routes()).export_station_at(&config, dir.path(), now());

    let path = result.expect("export succeeds");
    assert_eq!(path, dir.path().join("morro-bay-bs1.json"));
    assert!(!stats.is_error());

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
    assert!(keys.contains(&"name"));
    assert!(keys.contains(&"Temperature"));
    assert!(!keys.contains(&"Temperature_rolling"));
    assert_eq!(json["Temperature"]["values"][40], serde_json::Value::Null);
    assert_eq!(json["Temperature"]["slope_scale"], 10.0);
    assert_eq!(json["datetime"].as_array().unwrap().len(), 337);
}

#[test]
fn test_unit_conversion_and_alias() {
    let config = fixture("oxygen-params.json");
    let t = grid_start() + TimeDelta::hours(3);
    let body = csvp(
        "time (UTC),oxygen (umol L-1),saturation (percent)",
        &[(t, vec!["100.0".to_string(), "98.5".to_string()])],
    );
    let run = pipeline(vec![("edu_calpoly_marine_morro.csvp", Ok(body))])
        .run_at(&config, now())
        .expect("station runs");

    let oxygen = run.payload.variable("Dissolved Oxygen").unwrap();
    assert_eq!(oxygen.values[3], Some(3.2));
    assert_eq!(oxygen.units, "mg/L");
    assert_eq!(oxygen.slope_scale, NumberOrNull(Some(200.0)));
    assert_eq!(oxygen.slope, NumberOrNull(None));

    let saturation = run.payload.variable("Oxygen Saturation").unwrap();
    assert_eq!(saturation.values[3], Some(98.5));
    assert_eq!(saturation.slope_scale, NumberOrNull(Some(60.0)));
    assert_eq!(run.stats.qc_rows, None);
}

#[test]
fn test_empty_response_yields_all_null_grid() {
    let config = fixture("oxygen-params.json");
    let body = "time (UTC),oxygen (umol L-1),saturation (percent)\n".to_string();
    let run = pipeline(vec![(".csvp", Ok(body))])
        .run_at(&config, now())
        .expect("station runs");

    assert_eq!(run.payload.datetime.len(), GRID_LEN);
    for (_, variable) in &run.payload.variables {
        assert_eq!(variable.values.len(), GRID_LEN);
        assert!(variable.values.iter().all(Option::is_none));
        assert_eq!(variable.slope, NumberOrNull(None));
    }
}

#[test]
fn test_row_order_does_not_change_export() {
    let config = fixture("oxygen-params.json");
    let rows: Vec<_> = (0..30)
        .map(|i| {
            let t = grid_start() + TimeDelta::minutes(20 * i);
            (t, vec![format!("{}", 200 + (i * 7) % 13), format!("{}", 90 + i % 5)])
        })
        .collect();
    let mut reversed = rows.clone();
    reversed.reverse();
    let header = "time (UTC),oxygen (umol L-1),saturation (percent)";

    let forward = pipeline(vec![(".csvp", Ok(csvp(header, &rows)))])
        .run_at(&config, now())
        .unwrap();
    let backward = pipeline(vec![(".csvp", Ok(csvp(header, &reversed)))])
        .run_at(&config, now())
        .unwrap();

    assert_eq!(forward.payload, backward.payload);
}

#[test]
fn test_transport_failure_writes_nothing() {
    let config = fixture("temperature-params.json");
    let dir = tempfile::tempdir().unwrap();

    let (result, stats) =
        pipeline(vec![(".csvp", Err(503))]).export_station_at(&config, dir.path(), now());

    let err = result.unwrap_err();
    assert!(matches!(err, PipelineError::Transport(TransportError::Status { status: 503, .. })));
    assert_eq!(stats.error_type.as_deref(), Some("transport_error"));
    assert_eq!(stats.station_id.as_deref(), Some("morro-bay-bs1"));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_qc_failure_makes_station_unavailable() {
    let config = fixture("temperature-params.json");
    let mut routes = temperature_routes();
    routes[0].1 = Err(500);

    let err = pipeline(routes).run_at(&config, now()).unwrap_err();
    assert!(matches!(err, TransportError::Status { status: 500, .. }));
}

#[test]
fn test_misaligned_qc_is_rejected_before_fetch() {
    let err = StationConfig::load("tests/fixtures/misaligned-params.json").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { .. }));
}

#[test]
fn test_chart_model_with_upwelling() {
    let config = fixture("temperature-params.json");
    let wind: Vec<_> = (0..6)
        .map(|h| {
            let t = grid_start() + TimeDelta::hours(h);
            (t, vec!["12.1".to_string(), "8.0".to_string(), "320".to_string()])
        })
        .collect();
    let mut routes = vec![(
        "wmo_46028.csvp",
        Ok(csvp(
            "time (UTC),sea_water_temperature (degree_C),wind_speed (m s-1),wind_from_direction (degrees_true)",
            &wind,
        )),
    )];
    routes.extend(temperature_routes());

    let chart = pipeline(routes).chart_at(&config, now());

    assert!(!chart.is_unavailable());
    assert_eq!(chart.title, "Morro Bay BS1");
    assert_eq!(chart.subtitle, "Cal Poly");
    assert_eq!(chart.panels.len(), 1);
    let panel = &chart.panels[0];
    assert_eq!(panel.comments.as_deref(), Some("Sensor cleaned weekly"));
    assert!(panel.rolling.is_some());
    let limits = panel.y_limits.unwrap();
    assert_eq!(limits.min, 10.0);
    assert_eq!(limits.max, 20.0);

    let upwelling = chart.upwelling.expect("wind fetched");
    assert_eq!(upwelling.time.len(), 6);
    assert!(upwelling.ekman_transport.iter().all(|v| v.unwrap() > 0.0));
}

#[test]
fn test_chart_placeholder_when_station_unreachable() {
    let config = fixture("temperature-params.json");
    let chart = pipeline(vec![(".csvp", Err(404))]).chart_at(&config, now());

    assert!(chart.is_unavailable());
    assert!(chart.panels.is_empty());
    assert!(chart.unavailable.unwrap().contains("404"));
}
