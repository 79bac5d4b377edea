//! Provider-first dispatch for each analytics operation.
//!
//! Each function builds a [`StrategyChain`] from the available providers in
//! priority order, with the matching [`LocalProvider`] computation as the
//! fallback, and runs it.

use gridsmith_core::{columns, GridError, GridResult};
use gridsmith_io::frame::{column_names, has_column};
use polars::prelude::*;

use crate::chain::{Resolved, StrategyChain};
use crate::local::LocalProvider;
use crate::provider::{
    AnomalyOutput, AnomalyRequest, ForecastOutput, ForecastRequest, OutageOutput, OutageRequest,
    ProviderRegistry, RegressionRequest,
};
use crate::regression::LinearFit;

pub fn detect_anomalies<'r>(
    registry: &ProviderRegistry,
    local: &LocalProvider,
    request: &AnomalyRequest<'r>,
) -> GridResult<Resolved<AnomalyOutput>> {
    let mut chain = StrategyChain::<AnomalyRequest<'r>, AnomalyOutput>::new(
        "detect_anomalies",
        LocalProvider::ID,
        |req| local.anomalies(req),
    )
    .validate(|out, req| {
        let rows = req.frame.height();
        out.labels.len() == rows && out.scores.as_ref().map_or(true, |s| s.len() == rows)
    });
    for provider in registry.available() {
        chain = chain.strategy(provider.id(), move |req| Ok(provider.detect_anomalies(req)?));
    }
    chain.run(request)
}

pub fn detect_outages<'r>(
    registry: &ProviderRegistry,
    local: &LocalProvider,
    request: &OutageRequest<'r>,
) -> GridResult<Resolved<OutageOutput>> {
    let mut chain = StrategyChain::<OutageRequest<'r>, OutageOutput>::new(
        "detect_outages",
        LocalProvider::ID,
        |req| local.outages(req),
    )
    .validate(|out, req| out.flags.len() == req.frame.height());
    for provider in registry.available() {
        chain = chain.strategy(provider.id(), move |req| Ok(provider.detect_outages(req)?));
    }
    chain.run(request)
}

/// Rename the first accepted forecast column of a provider table to `forecast`.
///
/// Accepted names, most specific first: `<value>_forecast`, `forecast`,
/// `prediction`, `pred`.
pub fn normalize_forecast_table(mut table: DataFrame, value_column: &str) -> GridResult<DataFrame> {
    if has_column(&table, columns::FORECAST) {
        return Ok(table);
    }
    let available = column_names(&table);
    let candidates = columns::forecast_candidates(value_column);
    let found = candidates
        .iter()
        .find(|name| available.contains(*name))
        .ok_or_else(|| {
            GridError::Validation(format!(
                "forecast table has none of the columns {candidates:?}"
            ))
        })?;
    let mut series = table.column(found)?.clone();
    series.rename(columns::FORECAST);
    table.with_column(series)?;
    Ok(table)
}

pub fn forecast<'r>(
    registry: &ProviderRegistry,
    local: &LocalProvider,
    request: &ForecastRequest<'r>,
) -> GridResult<Resolved<ForecastOutput>> {
    let mut chain = StrategyChain::<ForecastRequest<'r>, ForecastOutput>::new(
        "forecast",
        LocalProvider::ID,
        |req| local.forecast_values(req).map(ForecastOutput::Values),
    )
    .validate(|out, req| out.values(req.horizon).is_some());
    for provider in registry.available() {
        chain = chain.strategy(provider.id(), move |req| {
            Ok(match provider.forecast(req)? {
                ForecastOutput::Table(table) => {
                    ForecastOutput::Table(normalize_forecast_table(table, req.value_column)?)
                }
                values => values,
            })
        });
    }
    chain.run(request)
}

pub fn fit_regression<'r>(
    registry: &ProviderRegistry,
    local: &LocalProvider,
    request: &RegressionRequest<'r>,
) -> GridResult<Resolved<LinearFit>> {
    let mut chain = StrategyChain::<RegressionRequest<'r>, LinearFit>::new(
        "fit_regression",
        LocalProvider::ID,
        |req| local.regression(req),
    )
    .validate(|fit, req| {
        let n_features = req.features.first().map_or(0, Vec::len);
        fit.is_well_formed(n_features)
    });
    for provider in registry.available() {
        chain = chain.strategy(provider.id(), move |req| Ok(provider.fit_regression(req)?));
    }
    chain.run(request)
}
