//! Result normalization: every executor output becomes the canonical
//! JSON-safe envelope
//!
//! One exhaustive match over the `AnalysisResult` union produces
//! `{kind, payload, diagnostics}`. JSON safety is enforced at the value
//! boundary: `json_number`/`cell_value` map non-finite floats to null
//! (serde_json has no NaN/Infinity representation), dates are carried as
//! ISO-8601 strings, and tabular data is emitted as ordered flat records.

use serde_json::{Map, Number, Value};

use crate::error::EngineError;
use crate::exec::AnalysisResult;
use crate::store::dataset::{Column, Dataset};

/// Canonical response shape shared by every operation kind
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ResultEnvelope {
    pub kind: String,
    pub payload: Value,
    pub diagnostics: Value,
}

/// A finite float, or None for NaN/Infinity. Executors use this for
/// optional metrics so undefined never masquerades as zero.
pub fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// A JSON number, or null when the float has no JSON representation
pub fn json_number(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}

/// One cell as a JSON primitive (intact ints, finite floats, strings)
pub fn cell_value(column: &Column, row: usize) -> Value {
    use arrow::array::{Array, Float64Array, Int64Array};

    if row >= column.len() || column.data.is_null(row) {
        return Value::Null;
    }
    if let Some(ints) = column.data.as_any().downcast_ref::<Int64Array>() {
        return Value::from(ints.value(row));
    }
    if let Some(floats) = column.data.as_any().downcast_ref::<Float64Array>() {
        return json_number(floats.value(row));
    }
    column
        .str_at(row)
        .map(|s| Value::String(s.to_string()))
        .unwrap_or(Value::Null)
}

/// One row as an ordered flat record
pub fn record_at(dataset: &Dataset, row: usize) -> Map<String, Value> {
    let mut record = Map::new();
    for column in &dataset.columns {
        record.insert(column.name.clone(), cell_value(column, row));
    }
    record
}

/// Selected rows as ordered flat records
pub fn records(dataset: &Dataset, rows: impl IntoIterator<Item = usize>) -> Vec<Map<String, Value>> {
    rows.into_iter().map(|row| record_at(dataset, row)).collect()
}

/// Normalize an executor result into the response envelope
pub fn envelope(result: &AnalysisResult, notes: &[String]) -> ResultEnvelope {
    let (kind, payload) = match result {
        AnalysisResult::Summary(report) => ("summary", to_payload(report)),
        AnalysisResult::Trend(trend) => ("trend", to_payload(trend)),
        AnalysisResult::Aggregation(agg) => ("aggregation", to_payload(agg)),
        AnalysisResult::Filter(filter) => ("filter", to_payload(filter)),
        AnalysisResult::Query(query) => ("query", to_payload(query)),
        AnalysisResult::Forecast(forecast) => ("forecast", to_payload(forecast)),
        AnalysisResult::Predict(predict) => ("predict", to_payload(predict)),
        AnalysisResult::WhatIf(whatif) => ("whatif", to_payload(whatif)),
    };
    ResultEnvelope {
        kind: kind.to_string(),
        payload,
        diagnostics: diagnostics_value(notes, None),
    }
}

/// Envelope for a failed request, tagged with the pipeline stage that failed
pub fn error_envelope(error: &EngineError, stage: &str) -> ResultEnvelope {
    ResultEnvelope {
        kind: "error".to_string(),
        payload: Value::String(error.user_message()),
        diagnostics: diagnostics_value(&[], Some(stage)),
    }
}

fn to_payload<T: serde::Serialize>(value: &T) -> Value {
    // serde_json maps any remaining non-finite float to null here
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn diagnostics_value(notes: &[String], stage: Option<&str>) -> Value {
    let mut diag = Map::new();
    if let Some(stage) = stage {
        diag.insert("stage".to_string(), Value::String(stage.to_string()));
    }
    if !notes.is_empty() {
        diag.insert(
            "notes".to_string(),
            Value::Array(notes.iter().cloned().map(Value::String).collect()),
        );
    }
    Value::Object(diag)
}
