//! Dataset-wide descriptive statistics

use serde::Serialize;

use crate::normalize::finite;
use crate::profile::{parse_date, ColumnClass};
use crate::store::dataset::Dataset;

#[derive(Clone, Debug, Serialize)]
pub struct NumericStats {
    pub column: String,
    pub count: usize,
    pub missing: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub median: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct TopValue {
    pub value: String,
    pub count: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct CategoricalStats {
    pub column: String,
    pub count: usize,
    pub missing: usize,
    pub distinct: usize,
    pub top_values: Vec<TopValue>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DateStats {
    pub column: String,
    pub count: usize,
    pub missing: usize,
    pub min: Option<String>,
    pub max: Option<String>,
    pub span_days: Option<i64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SummaryReport {
    pub row_count: usize,
    pub column_count: usize,
    pub numeric: Vec<NumericStats>,
    pub categorical: Vec<CategoricalStats>,
    pub dates: Vec<DateStats>,
}

const TOP_VALUES: usize = 10;

pub fn run(dataset: &Dataset) -> SummaryReport {
    let profile = dataset.profile();
    let mut numeric = Vec::new();
    let mut categorical = Vec::new();
    let mut dates = Vec::new();

    for column in &dataset.columns {
        match profile.class_of(&column.name) {
            Some(ColumnClass::Numeric) => numeric.push(numeric_stats(column)),
            Some(ColumnClass::Datelike) => dates.push(date_stats(column)),
            _ => categorical.push(categorical_stats(column)),
        }
    }

    SummaryReport {
        row_count: dataset.row_count,
        column_count: dataset.columns.len(),
        numeric,
        categorical,
        dates,
    }
}

fn numeric_stats(column: &crate::store::dataset::Column) -> NumericStats {
    let mut values: Vec<f64> = (0..column.len()).filter_map(|r| column.float_at(r)).collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let count = values.len();
    let missing = column.len() - count;

    if count == 0 {
        return NumericStats {
            column: column.name.clone(),
            count,
            missing,
            mean: None,
            std: None,
            min: None,
            q25: None,
            median: None,
            q75: None,
            max: None,
        };
    }

    let mean = values.iter().sum::<f64>() / count as f64;
    // sample standard deviation; undefined for a single value
    let std = if count > 1 {
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
            / (count - 1) as f64;
        finite(variance.sqrt())
    } else {
        None
    };

    NumericStats {
        column: column.name.clone(),
        count,
        missing,
        mean: finite(mean),
        std,
        min: values.first().copied(),
        q25: quantile(&values, 0.25),
        median: quantile(&values, 0.5),
        q75: quantile(&values, 0.75),
        max: values.last().copied(),
    }
}

/// Linear-interpolation quantile over sorted values
fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    if sorted.len() == 1 {
        return Some(sorted[0]);
    }
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

fn categorical_stats(column: &crate::store::dataset::Column) -> CategoricalStats {
    let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    let mut order: Vec<String> = Vec::new();
    let mut count = 0;
    for row in 0..column.len() {
        if let Some(value) = column.display_at(row) {
            count += 1;
            if !counts.contains_key(&value) {
                order.push(value.clone());
            }
            *counts.entry(value).or_insert(0) += 1;
        }
    }

    // sort by descending count, first-seen order breaking ties
    let mut ranked: Vec<(usize, String)> = order
        .into_iter()
        .enumerate()
        .map(|(idx, value)| (idx, value))
        .collect();
    ranked.sort_by(|a, b| counts[&b.1].cmp(&counts[&a.1]).then(a.0.cmp(&b.0)));

    CategoricalStats {
        column: column.name.clone(),
        count,
        missing: column.len() - count,
        distinct: counts.len(),
        top_values: ranked
            .into_iter()
            .take(TOP_VALUES)
            .map(|(_, value)| TopValue {
                count: counts[&value],
                value,
            })
            .collect(),
    }
}

fn date_stats(column: &crate::store::dataset::Column) -> DateStats {
    let mut parsed = Vec::new();
    let mut count = 0;
    for row in 0..column.len() {
        if let Some(value) = column.display_at(row) {
            count += 1;
            if let Some(date) = parse_date(&value) {
                parsed.push(date);
            }
        }
    }
    let min = parsed.iter().min().copied();
    let max = parsed.iter().max().copied();
    let span_days = match (min, max) {
        (Some(lo), Some(hi)) => Some((hi - lo).num_days()),
        _ => None,
    };

    DateStats {
        column: column.name.clone(),
        count,
        missing: column.len() - count,
        min: min.map(|d| d.format("%Y-%m-%d").to_string()),
        max: max.map(|d| d.format("%Y-%m-%d").to_string()),
        span_days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Float64Array, StringArray};
    use std::sync::Arc;

    use crate::store::dataset::{Column, Dataset};

    fn dataset() -> Dataset {
        let date = Column::new(
            "day",
            Arc::new(StringArray::from(vec![
                Some("2024-01-01"),
                Some("2024-01-02"),
                Some("2024-01-11"),
            ])) as ArrayRef,
        );
        let region = Column::new(
            "region",
            Arc::new(StringArray::from(vec![Some("west"), Some("west"), Some("east")]))
                as ArrayRef,
        );
        let amount = Column::new(
            "amount",
            Arc::new(Float64Array::from(vec![Some(10.0), Some(20.0), None])) as ArrayRef,
        );
        Dataset::new("d", "t.csv", vec![date, region, amount])
    }

    #[test]
    fn report_covers_every_column_once() {
        let report = run(&dataset());
        assert_eq!(report.row_count, 3);
        assert_eq!(report.column_count, 3);
        assert_eq!(
            report.numeric.len() + report.categorical.len() + report.dates.len(),
            3
        );
    }

    #[test]
    fn numeric_stats_ignore_nulls() {
        let report = run(&dataset());
        let amount = &report.numeric[0];
        assert_eq!(amount.count, 2);
        assert_eq!(amount.missing, 1);
        assert_eq!(amount.mean, Some(15.0));
        assert_eq!(amount.min, Some(10.0));
        assert_eq!(amount.max, Some(20.0));
        assert_eq!(amount.median, Some(15.0));
    }

    #[test]
    fn categorical_stats_rank_by_count() {
        let report = run(&dataset());
        let region = &report.categorical[0];
        assert_eq!(region.distinct, 2);
        assert_eq!(region.top_values[0].value, "west");
        assert_eq!(region.top_values[0].count, 2);
    }

    #[test]
    fn date_stats_track_range() {
        let report = run(&dataset());
        let day = &report.dates[0];
        assert_eq!(day.min.as_deref(), Some("2024-01-01"));
        assert_eq!(day.max.as_deref(), Some("2024-01-11"));
        assert_eq!(day.span_days, Some(10));
    }

    #[test]
    fn quantiles_interpolate_linearly() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&values, 0.25), Some(1.75));
        assert_eq!(quantile(&values, 0.5), Some(2.5));
        assert_eq!(quantile(&values, 0.75), Some(3.25));
    }
}
