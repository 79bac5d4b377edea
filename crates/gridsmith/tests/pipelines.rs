//! End-to-end pipeline runs with the local fallbacks only.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use gridsmith::{
    DatasetSpec, FaerSolver, GridError, GridResult, GridSmithClient, LinearSystemBackend,
    Metadata, MetricSpec, PipelineConfig, PipelineContext, SplitSpec,
};
use gridsmith_io::frame::{column_bool, column_f64, column_i64, column_names};
use gridsmith_io::{load_parquet, save_frame, TableFormat};
use polars::prelude::*;
use tempfile::tempdir;

fn local_client() -> GridSmithClient {
    GridSmithClient::with_context(PipelineContext::local_only())
}

fn hour_stamp(i: usize) -> String {
    format!("2024-01-{:02} {:02}:00:00", 1 + i / 24, i % 24)
}

fn write_csv(dir: &Path, name: &str, header: &str, rows: impl Iterator<Item = String>) -> PathBuf {
    let path = dir.join(name);
    let mut text = format!("{header}\n");
    for row in rows {
        text.push_str(&row);
        text.push('\n');
    }
    fs::write(&path, text).unwrap();
    path
}

fn ami_consumption(i: usize) -> f64 {
    match i {
        10 => 50.0,
        30 => 45.0,
        _ => 10.0 + 0.1 * (i % 5) as f64,
    }
}

/// 48 hourly readings with spikes at rows 10 and 30; ground truth marks 10 and 20.
fn ami_csv(dir: &Path) -> PathBuf {
    write_csv(
        dir,
        "ami.csv",
        "timestamp,consumption,ground_truth",
        (0..48).map(|i| {
            let truth = i == 10 || i == 20;
            format!("{},{},{}", hour_stamp(i), ami_consumption(i), truth as u8)
        }),
    )
}

#[test]
fn parquet_round_trip_preserves_columns() {
    let dir = tempdir().unwrap();
    let stamps = Series::new("timestamp", &[1_704_067_200_000i64, 1_704_070_800_000])
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
        .unwrap();
    let mut df = DataFrame::new(vec![
        stamps,
        Series::new("consumption", &[Some(1.5f64), None]),
        Series::new("is_anomaly", &[false, true]),
        Series::new("meter", &["a", "b"]),
    ])
    .unwrap();
    let path = dir.path().join("tables").join("round_trip.parquet");
    save_frame(&mut df, &path, TableFormat::Parquet).unwrap();

    let back = load_parquet(&path, Some("timestamp")).unwrap();
    assert_eq!(column_names(&back), column_names(&df));
    assert_eq!(back.column("timestamp").unwrap().dtype(), df.column("timestamp").unwrap().dtype());
    assert_eq!(
        column_i64(&back, "timestamp").unwrap(),
        column_i64(&df, "timestamp").unwrap()
    );
    assert_eq!(
        back.column("consumption").unwrap().f64().unwrap().into_iter().collect::<Vec<_>>(),
        vec![Some(1.5), None]
    );
    assert_eq!(column_bool(&back, "is_anomaly").unwrap(), vec![false, true]);
    assert_eq!(
        back.column("meter").unwrap().utf8().unwrap().into_iter().collect::<Vec<_>>(),
        vec![Some("a"), Some("b")]
    );
}

#[test]
fn missing_consumption_fails_before_writing() {
    let dir = tempdir().unwrap();
    let input = write_csv(
        dir.path(),
        "demand.csv",
        "timestamp,demand",
        (0..10).map(|i| format!("{},{}", hour_stamp(i), i)),
    );
    let out = dir.path().join("out");
    let err = local_client()
        .run_ami_anomaly(&PipelineConfig::new(&input, &out))
        .unwrap_err();
    assert!(err.is_validation(), "unexpected error: {err}");
    assert!(err.to_string().contains("consumption"));
    assert!(!out.exists());
}

#[test]
fn dataset_spec_is_checked_before_writing() {
    let dir = tempdir().unwrap();
    let input = ami_csv(dir.path());
    let out = dir.path().join("out");
    let config = PipelineConfig::new(&input, &out)
        .with_dataset_spec(DatasetSpec::new("ami", ["consumption", "meter_id"]));
    let err = local_client().run_ami_anomaly(&config).unwrap_err();
    assert!(err.is_validation());
    assert!(err.to_string().contains("meter_id"));
    assert!(!out.exists());
}

#[test]
fn ami_metrics_match_reference_counts() {
    let dir = tempdir().unwrap();
    let input = ami_csv(dir.path());
    let out = dir.path().join("out");
    let results = local_client()
        .run_ami_anomaly(&PipelineConfig::new(&input, &out))
        .unwrap();

    let table = load_parquet(results.table("anomaly_results").unwrap(), None).unwrap();
    let predicted = column_bool(&table, "is_anomaly").unwrap();
    let truth = column_bool(&table, "ground_truth").unwrap();
    let flagged: Vec<usize> = (0..predicted.len()).filter(|&i| predicted[i]).collect();
    assert_eq!(flagged, vec![10, 30]);

    // reference precision / recall / f1 from raw counts
    let tp = predicted.iter().zip(&truth).filter(|(p, t)| **p && **t).count() as f64;
    let fp = predicted.iter().zip(&truth).filter(|(p, t)| **p && !**t).count() as f64;
    let fn_ = predicted.iter().zip(&truth).filter(|(p, t)| !**p && **t).count() as f64;
    let precision = tp / (tp + fp);
    let recall = tp / (tp + fn_);
    let f1 = 2.0 * precision * recall / (precision + recall);

    assert_eq!(results.metric("precision"), Some(precision));
    assert_eq!(results.metric("recall"), Some(recall));
    assert!((results.metric("f1").unwrap() - f1).abs() < 1e-12);
    assert_eq!(results.metric("f1"), Some(0.5));

    let on_disk: std::collections::BTreeMap<String, f64> =
        serde_json::from_str(&fs::read_to_string(results.metrics_path()).unwrap()).unwrap();
    assert_eq!(on_disk, results.metrics);
    assert_eq!(results.metadata["provider_used"], "local");
    assert_eq!(results.metadata["anomaly_count"], 2);

    // no renderer: the figure is a metadata record
    let figure = results.figure("anomaly_plot").unwrap();
    assert_eq!(figure.extension().unwrap(), "json");
    assert!(figure.exists());
}

#[test]
fn ami_split_evaluates_test_rows_only() {
    let dir = tempdir().unwrap();
    let input = ami_csv(dir.path());
    let config = PipelineConfig::new(&input, dir.path().join("out"))
        .with_split_spec(SplitSpec {
            test_ratio: 0.25,
            shuffle: true,
            random_state: Some(7),
        })
        .with_metric_specs(vec![MetricSpec::anomaly("accuracy")]);
    let results = local_client().run_ami_anomaly(&config).unwrap();
    assert_eq!(results.metrics.keys().collect::<Vec<_>>(), vec!["accuracy"]);
    let accuracy = results.metric("accuracy").unwrap();
    assert!((0.0..=1.0).contains(&accuracy));
}

#[test]
fn ami_reuses_existing_anomaly_columns() {
    let dir = tempdir().unwrap();
    let input = write_csv(
        dir.path(),
        "scored.csv",
        "timestamp,consumption,anomaly_score,is_anomaly",
        (0..6).map(|i| format!("{},{},{},{}", hour_stamp(i), i, 0.5, (i == 3) as u8)),
    );
    let results = local_client()
        .run_ami_anomaly(&PipelineConfig::new(&input, dir.path().join("out")))
        .unwrap();
    assert_eq!(results.metadata["provider_used"], "input");
    assert_eq!(results.metadata["anomaly_count"], 1);
    assert!(results.metrics.is_empty());
}

#[test]
fn temperature_load_end_to_end_on_synthetic_data() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("out");
    let config = PipelineConfig::new(dir.path().join("missing.csv"), &out);
    let results = local_client().run_temperature_load(&config).unwrap();

    let keys: Vec<&str> = results.metrics.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["coefficient", "mae", "mse", "r2"]);
    assert!(results.metrics.values().all(|v| v.is_finite()));
    assert_eq!(results.metadata["synthetic_input"], true);
    assert_eq!(results.metadata["test_rows"], 73);

    let table = load_parquet(results.table("temperature_load_results").unwrap(), None).unwrap();
    assert_eq!(table.height(), 365);
    let load = column_f64(&table, "Load_MW").unwrap();
    let predicted = column_f64(&table, "predicted_load").unwrap();
    let residual = column_f64(&table, "residual").unwrap();
    for i in 0..load.len() {
        assert!((residual[i] - (load[i] - predicted[i])).abs() < 1e-9);
    }
    assert!(results.figure("temperature_load_plot").is_some());
    assert!(results.figure("predictions_plot").is_some());

    let on_disk: std::collections::BTreeMap<String, f64> =
        serde_json::from_str(&fs::read_to_string(out.join("metrics.json")).unwrap()).unwrap();
    assert_eq!(on_disk.keys().collect::<Vec<_>>(), results.metrics.keys().collect::<Vec<_>>());
}

/// Counts every solve and delegates to faer.
#[derive(Default)]
struct CountingSolver {
    calls: AtomicUsize,
}

impl LinearSystemBackend for CountingSolver {
    fn solve(&self, matrix: &[Vec<f64>], rhs: &[f64]) -> GridResult<Vec<f64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        FaerSolver.solve(matrix, rhs)
    }
}

#[test]
fn context_solver_drives_local_fits() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("missing.csv");
    let metadata = Metadata::new().with("days", 120);

    let solver = Arc::new(CountingSolver::default());
    let custom = GridSmithClient::with_context(
        PipelineContext::local_only().with_solver(solver.clone()),
    )
    .run_temperature_load(
        &PipelineConfig::new(&input, dir.path().join("custom")).with_metadata(metadata.clone()),
    )
    .unwrap();
    assert_eq!(solver.calls.load(Ordering::SeqCst), 1);

    let default = local_client()
        .run_temperature_load(
            &PipelineConfig::new(&input, dir.path().join("default")).with_metadata(metadata),
        )
        .unwrap();
    assert_eq!(custom.metrics, default.metrics);
    assert_eq!(custom.metadata["provider_used"], "local");
}

#[test]
fn temperature_load_reports_only_requested_metrics() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig::new(dir.path().join("missing.csv"), dir.path().join("out"))
        .with_metadata(Metadata::new().with("days", 120))
        .with_metric_specs(vec![MetricSpec::regression("rmse")]);
    let results = local_client().run_temperature_load(&config).unwrap();

    let keys: Vec<&str> = results.metrics.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["rmse"]);
    assert!(results.metadata.contains_key("model_coefficient"));
}

#[test]
fn temperature_load_rejects_unsupported_existing_input() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("weather.xlsx");
    fs::write(&input, "x").unwrap();
    let out = dir.path().join("out");
    let err = local_client()
        .run_temperature_load(&PipelineConfig::new(&input, &out))
        .unwrap_err();
    assert!(err.is_validation());
    assert!(!out.exists());
}

#[test]
fn outage_events_are_grouped() {
    let dir = tempdir().unwrap();
    let input = write_csv(
        dir.path(),
        "feeder.csv",
        "timestamp,power",
        (0..24).map(|i| {
            let power = if (5..8).contains(&i) || i == 15 { 0.0 } else { 40.0 };
            format!("{},{}", hour_stamp(i), power)
        }),
    );
    let results = local_client()
        .run_outage_event(&PipelineConfig::new(&input, dir.path().join("out")))
        .unwrap();
    assert_eq!(results.metric("outage_events"), Some(2.0));
    assert_eq!(results.metric("outage_rows"), Some(4.0));
    assert_eq!(results.metric("outage_fraction"), Some(4.0 / 24.0));

    let events = load_parquet(results.table("outage_events").unwrap(), None).unwrap();
    assert_eq!(column_f64(&events, "duration_rows").unwrap(), vec![3.0, 1.0]);
    assert_eq!(column_f64(&events, "start_row").unwrap(), vec![5.0, 15.0]);
    let starts = column_i64(&events, "start_timestamp").unwrap();
    let ends = column_i64(&events, "end_timestamp").unwrap();
    assert_eq!(ends[0].unwrap() - starts[0].unwrap(), 2 * 3_600_000);
}

#[test]
fn transformer_forecast_appends_horizon_rows() {
    let dir = tempdir().unwrap();
    let input = write_csv(
        dir.path(),
        "transformer.csv",
        "timestamp,demand",
        (0..72).map(|i| format!("{},{}", hour_stamp(i), 80.0 + (i as f64 * 0.26).sin() * 5.0)),
    );
    let config = PipelineConfig::new(&input, dir.path().join("out"))
        .with_metadata(Metadata::new().with("horizon", 12));
    let results = local_client().run_transformer_forecast(&config).unwrap();

    let table = load_parquet(results.table("forecast_results").unwrap(), None).unwrap();
    assert_eq!(table.height(), 84);
    assert_eq!(table.column("forecast").unwrap().null_count(), 60);
    let keys: Vec<&str> = results.metrics.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["mae", "mape", "mse", "rmse"]);
    assert_eq!(results.metadata["forecast_method"], "exponential_smoothing");
}

#[test]
fn mistyped_metadata_fails_before_writing() {
    let dir = tempdir().unwrap();
    let input = write_csv(
        dir.path(),
        "transformer.csv",
        "timestamp,power",
        (0..48).map(|i| format!("{},{}", hour_stamp(i), 40.0 + (i % 24) as f64)),
    );
    let out = dir.path().join("out");
    let config = PipelineConfig::new(&input, &out)
        .with_metadata(Metadata::new().with("horizon", "24"));
    let err = local_client().run_transformer_forecast(&config).unwrap_err();
    assert!(matches!(err, GridError::Config(_)), "{err}");
    assert!(!out.exists());
}

#[test]
fn load_forecasting_uses_arima_on_synthetic_load() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig::new(dir.path().join("absent.parquet"), dir.path().join("out"))
        .with_metadata(
            Metadata::new()
                .with("periods", 240)
                .with("forecast_horizon", 24)
                .with("arima_order", vec![2, 1, 1]),
        );
    let results = local_client().run_load_forecasting(&config).unwrap();
    assert_eq!(results.metadata["provider_used"], "local");
    assert_eq!(results.metadata["arima_order"], serde_json::json!([2, 1, 1]));

    let table = load_parquet(results.table("load_forecast_results").unwrap(), None).unwrap();
    assert_eq!(table.height(), 264);
    let forecast = column_f64(&table, "forecast").unwrap();
    assert!(forecast[240..].iter().all(|v| v.is_finite()));
    assert!(results.metric("rmse").unwrap() > 0.0);
}

#[test]
fn maintenance_scores_are_isolation_scores() {
    let dir = tempdir().unwrap();
    let input = write_csv(
        dir.path(),
        "equipment.csv",
        "timestamp,Temperature_C,Vibration_g,Failure",
        (0..60).map(|i| {
            let failing = i == 42;
            let temp = if failing { 95.0 } else { 60.0 + (i % 7) as f64 };
            let vib = if failing { 4.0 } else { 0.2 + 0.01 * (i % 5) as f64 };
            format!("{},{},{},{}", hour_stamp(i), temp, vib, failing as u8)
        }),
    );
    let results = local_client()
        .run_predictive_maintenance(&PipelineConfig::new(&input, dir.path().join("out")))
        .unwrap();
    assert_eq!(
        results.metadata["feature_columns"],
        serde_json::json!(["Temperature_C", "Vibration_g"])
    );
    assert_eq!(results.metric("recall"), Some(1.0));

    let table =
        load_parquet(results.table("predictive_maintenance_results").unwrap(), None).unwrap();
    let scores = column_f64(&table, "anomaly_score").unwrap();
    assert!(scores.iter().all(|s| *s > 0.0 && *s <= 1.0));
    let top = (0..scores.len())
        .max_by(|&a, &b| scores[a].total_cmp(&scores[b]))
        .unwrap();
    assert_eq!(top, 42);
}

#[test]
fn run_from_toml_config() {
    let dir = tempdir().unwrap();
    let input = ami_csv(dir.path());
    let out = dir.path().join("out");
    let config_path = dir.path().join("ami.toml");
    fs::write(
        &config_path,
        format!(
            r#"
input_path = "{}"
output_dir = "{}"

[[metric_specs]]
name = "recall"
type = "anomaly"

[metadata]
zscore_threshold = 3.0
"#,
            input.display(),
            out.display()
        ),
    )
    .unwrap();
    let results = local_client()
        .run_from_path(gridsmith::PipelineKind::AmiAnomaly, &config_path)
        .unwrap();
    assert_eq!(results.metrics.keys().collect::<Vec<_>>(), vec!["recall"]);
    assert_eq!(results.metric("recall"), Some(0.5));
}

#[cfg(feature = "render")]
#[test]
fn default_client_renders_png() {
    let dir = tempdir().unwrap();
    let input = ami_csv(dir.path());
    let results = GridSmithClient::new()
        .run_ami_anomaly(&PipelineConfig::new(&input, dir.path().join("out")))
        .unwrap();
    let figure = results.figure("anomaly_plot").unwrap();
    assert_eq!(figure.extension().unwrap(), "png");
    assert!(fs::metadata(figure).unwrap().len() > 0);
}
