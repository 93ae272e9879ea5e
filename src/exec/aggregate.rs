//! Grouped aggregation over one numeric column

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::{EngineError, EngineResult};
use crate::normalize::json_number;
use crate::plan::AggFunction;
use crate::store::dataset::Dataset;

#[derive(Clone, Debug, Serialize)]
pub struct AggregationResult {
    pub group_by: Vec<String>,
    pub column: String,
    pub function: String,
    pub rows: Vec<Map<String, Value>>,
}

/// Group rows by the display values of `group_by` and apply `function` to
/// `agg_column` within each group. Rows come back sorted by the aggregated
/// value, largest first, with first-seen row order breaking ties; null
/// group keys form their own group.
pub fn run(
    dataset: &Dataset,
    group_by: &[String],
    agg_column: &str,
    function: AggFunction,
) -> EngineResult<AggregationResult> {
    let value_column = dataset.column(agg_column).ok_or_else(|| {
        EngineError::execution_in(
            format!("aggregation column '{}' not found", agg_column),
            "aggregation",
        )
    })?;
    if !value_column.is_numeric() && function != AggFunction::Count {
        return Err(EngineError::execution_in(
            format!("column '{}' is not numeric", agg_column),
            "aggregation",
        ));
    }
    let key_columns: Vec<&crate::store::dataset::Column> = group_by
        .iter()
        .map(|name| {
            dataset.column(name).ok_or_else(|| {
                EngineError::execution_in(
                    format!("group-by column '{}' not found", name),
                    "aggregation",
                )
            })
        })
        .collect::<EngineResult<_>>()?;

    let mut groups: HashMap<Vec<Option<String>>, Vec<usize>> = HashMap::new();
    let mut order: Vec<Vec<Option<String>>> = Vec::new();
    for row in 0..dataset.row_count {
        let key: Vec<Option<String>> =
            key_columns.iter().map(|c| c.display_at(row)).collect();
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(row);
    }

    let mut aggregated: Vec<(f64, Map<String, Value>)> = Vec::with_capacity(order.len());
    for key in order {
        let member_rows = &groups[&key];
        let value = function.apply(value_column, member_rows);
        let mut record = Map::new();
        for (name, part) in group_by.iter().zip(&key) {
            record.insert(
                name.clone(),
                part.clone().map(Value::String).unwrap_or(Value::Null),
            );
        }
        record.insert(agg_column.to_string(), json_number(value));
        aggregated.push((value, record));
    }

    // descending by aggregated value; sort_by is stable, so ties keep
    // first-seen order
    aggregated.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    let rows: Vec<Map<String, Value>> = aggregated.into_iter().map(|(_, r)| r).collect();

    Ok(AggregationResult {
        group_by: group_by.to_vec(),
        column: agg_column.to_string(),
        function: function.as_str().to_string(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Float64Array, StringArray};
    use std::sync::Arc;

    use crate::store::dataset::{Column, Dataset};

    fn dataset() -> Dataset {
        let region = Column::new(
            "region",
            Arc::new(StringArray::from(vec![
                Some("west"),
                Some("east"),
                Some("west"),
                None,
            ])) as ArrayRef,
        );
        let sales = Column::new(
            "sales",
            Arc::new(Float64Array::from(vec![
                Some(10.0),
                Some(20.0),
                Some(30.0),
                Some(5.0),
            ])) as ArrayRef,
        );
        Dataset::new("d", "t.csv", vec![region, sales])
    }

    #[test]
    fn groups_rank_by_descending_value() {
        let result = run(
            &dataset(),
            &["region".to_string()],
            "sales",
            AggFunction::Sum,
        )
        .unwrap();
        assert_eq!(result.rows.len(), 3);
        assert_eq!(result.rows[0]["region"], Value::String("west".into()));
        assert_eq!(result.rows[0]["sales"], Value::from(40.0));
        assert_eq!(result.rows[1]["region"], Value::String("east".into()));
        assert_eq!(result.rows[1]["sales"], Value::from(20.0));
        // null key forms its own group
        assert_eq!(result.rows[2]["region"], Value::Null);
        assert_eq!(result.rows[2]["sales"], Value::from(5.0));
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let region = Column::new(
            "region",
            Arc::new(StringArray::from(vec![Some("b"), Some("a")])) as ArrayRef,
        );
        let sales = Column::new(
            "sales",
            Arc::new(Float64Array::from(vec![Some(7.0), Some(7.0)])) as ArrayRef,
        );
        let ds = Dataset::new("d", "t.csv", vec![region, sales]);
        let result = run(&ds, &["region".to_string()], "sales", AggFunction::Sum).unwrap();
        assert_eq!(result.rows[0]["region"], Value::String("b".into()));
        assert_eq!(result.rows[1]["region"], Value::String("a".into()));
    }

    #[test]
    fn mean_over_groups() {
        let result = run(
            &dataset(),
            &["region".to_string()],
            "sales",
            AggFunction::Mean,
        )
        .unwrap();
        assert_eq!(result.rows[0]["sales"], Value::from(20.0));
    }

    #[test]
    fn unknown_column_is_an_execution_error() {
        let err = run(
            &dataset(),
            &["nope".to_string()],
            "sales",
            AggFunction::Sum,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Execution { .. }));
    }
}
