//! Outage events: runs of readings at or below a threshold.

use gridsmith_algo::dispatch::detect_outages;
use gridsmith_algo::{group_events, MetricMap, OutageEvent, OutageRequest};
use gridsmith_core::{columns, GridResult, MetricKind, PipelineConfig, PipelineKind, PipelineResults};
use gridsmith_io::frame::{column_bool, column_f64, has_column, set_column};
use gridsmith_viz::plot_anomalies;
use polars::prelude::*;

use super::{
    evaluate_labels, load_input, plot_x, require_one_of, requested_metrics, timestamp_column,
    timestamps_ms, RunOutputs,
};
use crate::context::PipelineContext;

fn events_frame(
    events: &[OutageEvent],
    timestamps: Option<&[Option<i64>]>,
    timestamp: &str,
) -> GridResult<DataFrame> {
    let at = |row: usize| timestamps.and_then(|ts| ts.get(row).copied().flatten());
    let as_datetime = |name: &str, values: Vec<Option<i64>>| {
        Series::new(name, values).cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
    };

    let mut columns_out = vec![
        Series::new("event_id", events.iter().map(|e| e.event_id as u32).collect::<Vec<_>>()),
        Series::new("start_row", events.iter().map(|e| e.start_row as u32).collect::<Vec<_>>()),
        Series::new("end_row", events.iter().map(|e| e.end_row as u32).collect::<Vec<_>>()),
        Series::new(
            "duration_rows",
            events.iter().map(|e| e.duration_rows as u32).collect::<Vec<_>>(),
        ),
    ];
    if timestamps.is_some() {
        columns_out.push(as_datetime(
            &format!("start_{timestamp}"),
            events.iter().map(|e| at(e.start_row)).collect(),
        )?);
        columns_out.push(as_datetime(
            &format!("end_{timestamp}"),
            events.iter().map(|e| at(e.end_row)).collect(),
        )?);
    }
    columns_out.push(Series::new(
        "min_value",
        events
            .iter()
            .map(|e| e.min_value.is_finite().then_some(e.min_value))
            .collect::<Vec<_>>(),
    ));
    Ok(DataFrame::new(columns_out)?)
}

/// Flag outage rows of the first value column among `consumption`, `demand`
/// and `power`, and group consecutive flags into events.
pub fn run_outage_event_pipeline(
    config: &PipelineConfig,
    context: &PipelineContext,
) -> GridResult<PipelineResults> {
    let timestamp = timestamp_column(config, columns::TIMESTAMP);
    let mut df = load_input(config, timestamp)?;
    let value_column = require_one_of(&df, columns::VALUE_CANDIDATES, "value")?;
    let local = context.local_provider(&config.metadata)?;

    let mut outputs = RunOutputs::new(PipelineKind::OutageEvent, config);
    outputs.note_shape(&df);
    outputs.note("value_column", value_column);

    let resolved = {
        let request = OutageRequest {
            frame: &df,
            value_column,
            threshold: local.params().outage_threshold,
        };
        detect_outages(&context.providers, &local, &request)?
    };
    outputs.note_resolved("detect_outages", &resolved);
    let flags = resolved.value.flags;

    let values = column_f64(&df, value_column)?;
    let events = group_events(&flags, &values);
    let timestamps = if has_column(&df, timestamp) {
        Some(timestamps_ms(&df, timestamp)?)
    } else {
        None
    };
    let mut events_df = events_frame(&events, timestamps.as_deref(), timestamp)?;

    let outage_rows = flags.iter().filter(|f| **f).count();
    let mut metrics = MetricMap::new();
    metrics.insert("outage_events".to_string(), events.len() as f64);
    metrics.insert("outage_rows".to_string(), outage_rows as f64);
    metrics.insert(
        "outage_fraction".to_string(),
        if flags.is_empty() {
            0.0
        } else {
            outage_rows as f64 / flags.len() as f64
        },
    );
    if has_column(&df, columns::GROUND_TRUTH) {
        let truth = column_bool(&df, columns::GROUND_TRUTH)?;
        let names = requested_metrics(config, MetricKind::Anomaly);
        metrics.extend(evaluate_labels(
            &context.providers,
            &truth,
            &flags,
            None,
            None,
            names.as_deref(),
        )?);
    }

    set_column(&mut df, Series::new(columns::IS_OUTAGE, flags.as_slice()))?;
    outputs.write_table("outage_results", &mut df)?;
    outputs.write_table("outage_events", &mut events_df)?;
    let figure = plot_anomalies(
        &df,
        plot_x(&df, timestamp),
        value_column,
        columns::IS_OUTAGE,
        "Outage Event Detection",
        &outputs.figure_path("outage_plot"),
        context.renderer(),
    )?;
    outputs.add_figure("outage_plot", figure);
    outputs.finish(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_frame_carries_boundary_timestamps() {
        let events = group_events(&[false, true, true, false, true], &[5.0, 0.0, -1.0, 4.0, 0.0]);
        let stamps: Vec<Option<i64>> = (0..5).map(|i| Some(i * 1000)).collect();
        let df = events_frame(&events, Some(&stamps), "timestamp").unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(
            df.get_column_names(),
            vec![
                "event_id",
                "start_row",
                "end_row",
                "duration_rows",
                "start_timestamp",
                "end_timestamp",
                "min_value"
            ]
        );
        let ends = timestamps_ms(&df, "end_timestamp").unwrap();
        assert_eq!(ends, vec![Some(2000), Some(4000)]);
        assert_eq!(column_f64(&df, "min_value").unwrap(), vec![-1.0, 0.0]);
    }

    #[test]
    fn events_frame_without_timestamps() {
        let df = events_frame(&[], None, "timestamp").unwrap();
        assert_eq!(df.height(), 0);
        assert_eq!(df.width(), 5);
    }
}
