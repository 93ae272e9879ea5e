//! Column profiling: partition a dataset's columns into numeric,
//! categorical and date-like classes
//!
//! Numeric means the storage type is Int64 or Float64. Text columns are
//! additionally date-tested: if at least `DATE_DETECT_THRESHOLD` of the
//! non-null values parse with one of the supported date formats, the column
//! is date-like. Everything that can't be classified defaults to
//! categorical. The partition is disjoint: every column lands in exactly
//! one class.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::DATE_DETECT_THRESHOLD;
use crate::store::dataset::{Column, Dataset};

const SAMPLE_VALUES: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnClass {
    Numeric,
    Categorical,
    Datelike,
}

/// Per-dataset column classification and lightweight stats
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
    pub datelike: Vec<String>,
    /// Missing-value count per column
    pub missing: BTreeMap<String, usize>,
    /// A few distinct values per column, in first-seen order
    pub samples: BTreeMap<String, Vec<String>>,
}

impl ColumnProfile {
    pub fn class_of(&self, name: &str) -> Option<ColumnClass> {
        let matches = |list: &[String]| list.iter().any(|c| c.eq_ignore_ascii_case(name));
        if matches(&self.numeric) {
            Some(ColumnClass::Numeric)
        } else if matches(&self.datelike) {
            Some(ColumnClass::Datelike)
        } else if matches(&self.categorical) {
            Some(ColumnClass::Categorical)
        } else {
            None
        }
    }

    pub fn first_numeric(&self) -> Option<&str> {
        self.numeric.first().map(|s| s.as_str())
    }

    pub fn first_categorical(&self) -> Option<&str> {
        self.categorical.first().map(|s| s.as_str())
    }

    pub fn first_datelike(&self) -> Option<&str> {
        self.datelike.first().map(|s| s.as_str())
    }
}

/// Pure function of the dataset's current column types
pub fn profile(dataset: &Dataset) -> ColumnProfile {
    let mut out = ColumnProfile::default();

    for column in &dataset.columns {
        out.missing.insert(column.name.clone(), column.null_count());
        out.samples
            .insert(column.name.clone(), sample_values(column));

        if column.is_numeric() {
            out.numeric.push(column.name.clone());
        } else if is_datelike(column) {
            out.datelike.push(column.name.clone());
        } else {
            out.categorical.push(column.name.clone());
        }
    }

    out
}

fn sample_values(column: &Column) -> Vec<String> {
    let mut seen = Vec::new();
    for row in 0..column.len() {
        if let Some(value) = column.display_at(row) {
            if !seen.contains(&value) {
                seen.push(value);
                if seen.len() >= SAMPLE_VALUES {
                    break;
                }
            }
        }
    }
    seen
}

fn is_datelike(column: &Column) -> bool {
    let mut non_null = 0usize;
    let mut parsed = 0usize;
    for row in 0..column.len() {
        if let Some(value) = column.str_at(row) {
            non_null += 1;
            if parse_date(value).is_some() {
                parsed += 1;
            }
        }
    }
    non_null > 0 && (parsed as f64) / (non_null as f64) >= DATE_DETECT_THRESHOLD
}

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"];

/// Best-effort date parse for the formats the profiler recognizes.
/// Also used by the trend and forecast executors for bucketing.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }
    // year-month, e.g. "2024-03"
    if value.len() == 7 && value.as_bytes()[4] == b'-' {
        if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", value), "%Y-%m-%d") {
            return Some(date);
        }
    }
    // timestamp with a date prefix, e.g. "2024-03-01T12:00:00Z"
    if value.len() > 10 {
        if let Some(prefix) = value.get(..10) {
            if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
                return Some(date);
            }
        }
    }
    None
}
