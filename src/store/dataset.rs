//! In-memory tabular dataset backed by arrow arrays
//!
//! Columns are stored as arrow arrays aligned by row position. A dataset is
//! immutable once loaded; column-type coercion produces a new dataset so the
//! original stays available for comparison.

use std::sync::{Arc, OnceLock};

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::DataType as ArrowType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::profile::{self, ColumnProfile};

/// Storage type of a column as loaded
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Int,
    Float,
    Text,
}

impl StorageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageType::Int => "int",
            StorageType::Float => "float",
            StorageType::Text => "text",
        }
    }
}

/// A named column and its arrow-backed values
#[derive(Clone, Debug)]
pub struct Column {
    pub name: String,
    pub data: ArrayRef,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ArrayRef) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn null_count(&self) -> usize {
        self.data.null_count()
    }

    pub fn storage_type(&self) -> StorageType {
        match self.data.data_type() {
            ArrowType::Int64 => StorageType::Int,
            ArrowType::Float64 => StorageType::Float,
            _ => StorageType::Text,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.storage_type(), StorageType::Int | StorageType::Float)
    }

    /// Numeric value at a row, widening ints to f64. None for nulls and
    /// non-numeric storage.
    pub fn float_at(&self, row: usize) -> Option<f64> {
        if row >= self.data.len() || self.data.is_null(row) {
            return None;
        }
        if let Some(ints) = self.data.as_any().downcast_ref::<Int64Array>() {
            return Some(ints.value(row) as f64);
        }
        if let Some(floats) = self.data.as_any().downcast_ref::<Float64Array>() {
            let v = floats.value(row);
            return if v.is_finite() { Some(v) } else { None };
        }
        None
    }

    /// String value at a row. None for nulls and non-text storage.
    pub fn str_at(&self, row: usize) -> Option<&str> {
        if row >= self.data.len() || self.data.is_null(row) {
            return None;
        }
        self.data
            .as_any()
            .downcast_ref::<StringArray>()
            .map(|s| s.value(row))
    }

    /// Display form of a cell, used for group keys and samples
    pub fn display_at(&self, row: usize) -> Option<String> {
        if row >= self.data.len() || self.data.is_null(row) {
            return None;
        }
        if let Some(s) = self.str_at(row) {
            return Some(s.to_string());
        }
        if let Some(ints) = self.data.as_any().downcast_ref::<Int64Array>() {
            return Some(ints.value(row).to_string());
        }
        if let Some(floats) = self.data.as_any().downcast_ref::<Float64Array>() {
            return Some(floats.value(row).to_string());
        }
        None
    }
}

/// Listing/preview metadata for a dataset
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub id: String,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
    pub columns: Vec<String>,
    pub row_count: usize,
}

/// An uploaded tabular dataset
pub struct Dataset {
    pub id: String,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
    pub columns: Vec<Column>,
    pub row_count: usize,
    profile_cache: OnceLock<ColumnProfile>,
}

impl Dataset {
    pub fn new(id: impl Into<String>, filename: impl Into<String>, columns: Vec<Column>) -> Self {
        let row_count = columns.first().map(|c| c.len()).unwrap_or(0);
        Self {
            id: id.into(),
            filename: filename.into(),
            uploaded_at: Utc::now(),
            columns,
            row_count,
            profile_cache: OnceLock::new(),
        }
    }

    /// Case-insensitive column lookup
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Column profile, computed on first use and cached for the dataset's
    /// lifetime. Coercion builds a new dataset, so the cache never goes stale.
    pub fn profile(&self) -> &ColumnProfile {
        self.profile_cache.get_or_init(|| profile::profile(self))
    }

    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            id: self.id.clone(),
            filename: self.filename.clone(),
            uploaded_at: self.uploaded_at,
            columns: self.column_names(),
            row_count: self.row_count,
        }
    }

    /// Build a copy with one column coerced to a new storage type.
    /// Values that fail to convert become nulls.
    pub fn with_coerced_column(
        &self,
        new_id: impl Into<String>,
        column: &str,
        target: StorageType,
    ) -> EngineResult<Dataset> {
        let col = self
            .column(column)
            .ok_or_else(|| EngineError::input(format!("unknown column '{}'", column)))?;
        let coerced = coerce_column(col, target);
        let columns = self
            .columns
            .iter()
            .map(|c| {
                if c.name.eq_ignore_ascii_case(column) {
                    coerced.clone()
                } else {
                    c.clone()
                }
            })
            .collect();
        let mut dataset = Dataset::new(new_id, self.filename.clone(), columns);
        dataset.uploaded_at = self.uploaded_at;
        Ok(dataset)
    }
}

fn coerce_column(col: &Column, target: StorageType) -> Column {
    let n = col.len();
    let data: ArrayRef = match target {
        StorageType::Int => {
            let values: Vec<Option<i64>> = (0..n)
                .map(|i| {
                    col.float_at(i)
                        .map(|v| v.round() as i64)
                        .or_else(|| col.str_at(i).and_then(|s| s.trim().parse::<i64>().ok()))
                })
                .collect();
            Arc::new(Int64Array::from(values))
        }
        StorageType::Float => {
            let values: Vec<Option<f64>> = (0..n)
                .map(|i| {
                    col.float_at(i)
                        .or_else(|| col.str_at(i).and_then(|s| s.trim().parse::<f64>().ok()))
                })
                .collect();
            Arc::new(Float64Array::from(values))
        }
        StorageType::Text => {
            let values: Vec<Option<String>> = (0..n).map(|i| col.display_at(i)).collect();
            Arc::new(StringArray::from(values))
        }
    };
    Column::new(col.name.clone(), data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_column(name: &str, values: Vec<Option<&str>>) -> Column {
        Column::new(name, Arc::new(StringArray::from(values)) as ArrayRef)
    }

    #[test]
    fn coerce_text_to_float_keeps_nulls_for_bad_values() {
        let ds = Dataset::new(
            "d1",
            "test.csv",
            vec![text_column("price", vec![Some("10.5"), Some("oops"), None])],
        );
        let coerced = ds.with_coerced_column("d2", "price", StorageType::Float).unwrap();
        let col = coerced.column("price").unwrap();
        assert_eq!(col.storage_type(), StorageType::Float);
        assert_eq!(col.float_at(0), Some(10.5));
        assert_eq!(col.float_at(1), None);
        assert_eq!(col.float_at(2), None);
        // original untouched
        assert_eq!(ds.column("price").unwrap().storage_type(), StorageType::Text);
    }

    #[test]
    fn column_lookup_is_case_insensitive() {
        let ds = Dataset::new("d1", "t.csv", vec![text_column("Region", vec![Some("West")])]);
        assert!(ds.column("region").is_some());
        assert!(ds.column("REGION").is_some());
        assert!(ds.column("missing").is_none());
    }
}
