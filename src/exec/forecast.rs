//! Forecasting over a bucketed time series
//!
//! Three candidate strategies are fit on the historical buckets: repeat the
//! last value (naive), extend the average step (drift), and ordinary least
//! squares over the bucket index (linear). The winner is picked by mean
//! absolute error on a holdout tail, preferring the simpler strategy on
//! ties. Short series skip the holdout and use naive directly.

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::error::{EngineError, EngineResult};
use crate::exec::trend::{bucket_label, bucket_series};
use crate::normalize::finite;
use crate::plan::FilterClause;
use crate::resolve::Granularity;
use crate::store::dataset::Dataset;

#[derive(Clone, Debug, Serialize)]
pub struct ForecastPoint {
    pub period: String,
    pub value: f64,
    pub is_forecast: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct ForecastResult {
    pub time_column: String,
    pub target_column: String,
    pub granularity: String,
    /// winning strategy: "naive", "drift", or "linear"
    pub method: String,
    /// holdout mean absolute error of the winner; None for short series
    pub holdout_mae: Option<f64>,
    /// history followed by projected periods, flagged per point
    pub points: Vec<ForecastPoint>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Strategy {
    Naive,
    Drift,
    Linear,
}

impl Strategy {
    fn as_str(&self) -> &'static str {
        match self {
            Strategy::Naive => "naive",
            Strategy::Drift => "drift",
            Strategy::Linear => "linear",
        }
    }

    /// Predict values at 1-based steps past the end of `history`
    fn predict(&self, history: &[f64], steps: usize) -> Vec<f64> {
        let n = history.len();
        let last = *history.last().unwrap_or(&0.0);
        match self {
            Strategy::Naive => vec![last; steps],
            Strategy::Drift => {
                let step = if n > 1 {
                    (last - history[0]) / (n - 1) as f64
                } else {
                    0.0
                };
                (1..=steps).map(|i| last + step * i as f64).collect()
            }
            Strategy::Linear => {
                let (slope, intercept) = ols(history);
                (0..steps)
                    .map(|i| intercept + slope * (n + i) as f64)
                    .collect()
            }
        }
    }
}

/// Least-squares slope and intercept over (index, value) pairs
fn ols(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    if values.len() < 2 {
        return (0.0, values.first().copied().unwrap_or(0.0));
    }
    let mean_x = (values.len() - 1) as f64 / 2.0;
    let mean_y = values.iter().sum::<f64>() / n;
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        num += dx * (y - mean_y);
        den += dx * dx;
    }
    if den == 0.0 {
        return (0.0, mean_y);
    }
    let slope = num / den;
    (slope, mean_y - slope * mean_x)
}

fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / actual.len().max(1) as f64
}

/// Pick the strategy with the lowest holdout MAE. Candidates are tried
/// simplest first and replaced only on a strictly lower error, so ties go
/// to the simpler strategy.
fn select_strategy(values: &[f64]) -> (Strategy, Option<f64>) {
    if values.len() < 4 {
        return (Strategy::Naive, None);
    }
    let holdout = (values.len() / 5).max(1);
    let (train, test) = values.split_at(values.len() - holdout);

    let mut best = Strategy::Naive;
    let mut best_mae = mae(test, &Strategy::Naive.predict(train, holdout));
    for candidate in [Strategy::Drift, Strategy::Linear] {
        let error = mae(test, &candidate.predict(train, holdout));
        if error < best_mae {
            best = candidate;
            best_mae = error;
        }
    }
    (best, finite(best_mae))
}

/// Calendar start of the bucket `steps` periods after `start`
fn add_periods(start: NaiveDate, granularity: Granularity, steps: usize) -> NaiveDate {
    match granularity {
        Granularity::Day => start + Duration::days(steps as i64),
        Granularity::Week => start + Duration::weeks(steps as i64),
        Granularity::Month => {
            let total = start.month0() as i64 + steps as i64;
            let year = start.year() + (total / 12) as i32;
            let month = (total % 12) as u32 + 1;
            NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(start)
        }
        Granularity::Year => {
            NaiveDate::from_ymd_opt(start.year() + steps as i32, 1, 1).unwrap_or(start)
        }
    }
}

pub fn run(
    dataset: &Dataset,
    time_column: &str,
    target_column: &str,
    granularity: Granularity,
    periods: usize,
    clauses: &[FilterClause],
) -> EngineResult<ForecastResult> {
    let series = bucket_series(dataset, time_column, target_column, granularity, clauses)?;
    if series.is_empty() {
        return Err(EngineError::execution_in(
            "no historical values to forecast from",
            "forecast",
        ));
    }

    let values: Vec<f64> = series.iter().map(|(_, v)| *v).collect();
    let (strategy, holdout_mae) = select_strategy(&values);
    let predicted = strategy.predict(&values, periods);

    let last_start = series.last().map(|(d, _)| *d).unwrap_or_default();
    let mut points: Vec<ForecastPoint> = series
        .into_iter()
        .map(|(start, value)| ForecastPoint {
            period: bucket_label(start, granularity),
            value,
            is_forecast: false,
        })
        .collect();
    points.extend(predicted.iter().enumerate().map(|(i, &value)| ForecastPoint {
        period: bucket_label(add_periods(last_start, granularity, i + 1), granularity),
        value,
        is_forecast: true,
    }));

    Ok(ForecastResult {
        time_column: time_column.to_string(),
        target_column: target_column.to_string(),
        granularity: granularity.as_str().to_string(),
        method: strategy.as_str().to_string(),
        holdout_mae,
        points,
    })
}
