//! Time-bucketed aggregation with period-over-period growth

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{EngineError, EngineResult};
use crate::normalize::finite;
use crate::plan::{matching_rows, FilterClause};
use crate::profile::parse_date;
use crate::resolve::Granularity;
use crate::store::dataset::Dataset;

#[derive(Clone, Debug, Serialize)]
pub struct TrendPoint {
    pub period: String,
    pub value: f64,
    /// percent change from the previous bucket; None for the first bucket
    /// and whenever the previous bucket is zero
    pub growth_pct: Option<f64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct TrendResult {
    pub time_column: String,
    pub value_column: String,
    pub granularity: String,
    pub points: Vec<TrendPoint>,
}

/// First calendar day of the bucket containing `date`
pub fn bucket_start(date: NaiveDate, granularity: Granularity) -> NaiveDate {
    match granularity {
        Granularity::Day => date,
        Granularity::Week => {
            let offset = date.weekday().num_days_from_monday() as i64;
            date - chrono::Duration::days(offset)
        }
        Granularity::Month => {
            NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
        }
        Granularity::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
    }
}

pub fn bucket_label(start: NaiveDate, granularity: Granularity) -> String {
    match granularity {
        Granularity::Day | Granularity::Week => start.format("%Y-%m-%d").to_string(),
        Granularity::Month => start.format("%Y-%m").to_string(),
        Granularity::Year => start.format("%Y").to_string(),
    }
}

/// Sum `value_column` per time bucket in chronological order, over the
/// rows matching `clauses` (all rows when empty)
pub fn bucket_series(
    dataset: &Dataset,
    time_column: &str,
    value_column: &str,
    granularity: Granularity,
    clauses: &[FilterClause],
) -> EngineResult<Vec<(NaiveDate, f64)>> {
    let time = dataset.column(time_column).ok_or_else(|| {
        EngineError::execution_in(
            format!("time column '{}' not found", time_column),
            "trend",
        )
    })?;
    let value = dataset.column(value_column).ok_or_else(|| {
        EngineError::execution_in(
            format!("value column '{}' not found", value_column),
            "trend",
        )
    })?;

    let rows = matching_rows(dataset, clauses)?;
    let mut buckets: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for row in rows {
        let Some(raw) = time.display_at(row) else { continue };
        let Some(date) = parse_date(&raw) else { continue };
        let Some(amount) = value.float_at(row) else { continue };
        *buckets.entry(bucket_start(date, granularity)).or_insert(0.0) += amount;
    }

    if buckets.is_empty() {
        return Err(EngineError::execution_in(
            format!(
                "no rows had both a parseable '{}' date and a numeric '{}' value",
                time_column, value_column
            ),
            "trend",
        ));
    }

    Ok(buckets.into_iter().collect())
}

pub fn run(
    dataset: &Dataset,
    time_column: &str,
    value_column: &str,
    granularity: Granularity,
) -> EngineResult<TrendResult> {
    let series = bucket_series(dataset, time_column, value_column, granularity, &[])?;

    let mut points = Vec::with_capacity(series.len());
    let mut previous: Option<f64> = None;
    for (start, value) in series {
        let growth_pct = match previous {
            Some(prev) if prev != 0.0 => finite((value - prev) / prev * 100.0),
            _ => None,
        };
        points.push(TrendPoint {
            period: bucket_label(start, granularity),
            value,
            growth_pct,
        });
        previous = Some(value);
    }

    Ok(TrendResult {
        time_column: time_column.to_string(),
        value_column: value_column.to_string(),
        granularity: granularity.as_str().to_string(),
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Float64Array, StringArray};
    use std::sync::Arc;

    use crate::store::dataset::{Column, Dataset};

    fn monthly_dataset() -> Dataset {
        let date = Column::new(
            "date",
            Arc::new(StringArray::from(vec![
                Some("2024-01-05"),
                Some("2024-01-20"),
                Some("2024-02-10"),
                Some("2024-03-15"),
            ])) as ArrayRef,
        );
        let sales = Column::new(
            "sales",
            Arc::new(Float64Array::from(vec![
                Some(60.0),
                Some(40.0),
                Some(150.0),
                Some(120.0),
            ])) as ArrayRef,
        );
        Dataset::new("d", "t.csv", vec![date, sales])
    }

    #[test]
    fn monthly_growth_series() {
        let result = run(&monthly_dataset(), "date", "sales", Granularity::Month).unwrap();
        let labels: Vec<&str> = result.points.iter().map(|p| p.period.as_str()).collect();
        assert_eq!(labels, vec!["2024-01", "2024-02", "2024-03"]);
        let values: Vec<f64> = result.points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![100.0, 150.0, 120.0]);
        let growth: Vec<Option<f64>> =
            result.points.iter().map(|p| p.growth_pct).collect();
        assert_eq!(growth[0], None);
        assert!((growth[1].unwrap() - 50.0).abs() < 1e-9);
        assert!((growth[2].unwrap() + 20.0).abs() < 1e-9);
    }

    #[test]
    fn zero_previous_bucket_yields_no_growth() {
        let date = Column::new(
            "date",
            Arc::new(StringArray::from(vec![Some("2024-01-01"), Some("2024-02-01")]))
                as ArrayRef,
        );
        let sales = Column::new(
            "sales",
            Arc::new(Float64Array::from(vec![Some(0.0), Some(50.0)])) as ArrayRef,
        );
        let ds = Dataset::new("d", "t.csv", vec![date, sales]);
        let result = run(&ds, "date", "sales", Granularity::Month).unwrap();
        assert_eq!(result.points[1].growth_pct, None);
    }

    #[test]
    fn week_buckets_start_monday() {
        // 2024-01-03 is a Wednesday
        let date = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let start = bucket_start(date, Granularity::Week);
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn unparseable_dates_fail_cleanly() {
        let date = Column::new(
            "date",
            Arc::new(StringArray::from(vec![Some("not a date")])) as ArrayRef,
        );
        let sales = Column::new(
            "sales",
            Arc::new(Float64Array::from(vec![Some(1.0)])) as ArrayRef,
        );
        let ds = Dataset::new("d", "t.csv", vec![date, sales]);
        assert!(run(&ds, "date", "sales", Granularity::Month).is_err());
    }
}
