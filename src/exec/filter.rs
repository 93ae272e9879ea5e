//! Structured row filtering with a hard result cap

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::EngineResult;
use crate::normalize::records;
use crate::plan::{self, matching_rows, FilterClause, TransformPlan};
use crate::store::dataset::Dataset;

#[derive(Clone, Debug, Serialize)]
pub struct FilterResult {
    pub conditions: Vec<FilterClause>,
    /// how many rows matched before the cap
    pub matched_count: usize,
    pub rows: Vec<Map<String, Value>>,
    pub truncated: bool,
    pub no_match: bool,
}

/// Conjunction of all clauses; at most `max_rows` rows are returned but
/// `matched_count` always reflects the full match. A full transform plan,
/// when present, is evaluated instead so its projection, sort, and limit
/// shape the returned rows.
pub fn run(
    dataset: &Dataset,
    clauses: &[FilterClause],
    transform: Option<&TransformPlan>,
    max_rows: usize,
) -> EngineResult<FilterResult> {
    let (matched_count, rows, truncated) = match transform {
        Some(transform) => {
            let output = plan::run(transform, dataset)?;
            let mut rows = output.records;
            let truncated = rows.len() > max_rows;
            rows.truncate(max_rows);
            (output.matched, rows, truncated)
        }
        None => {
            let matched = matching_rows(dataset, clauses)?;
            let count = matched.len();
            let rows = records(dataset, matched.into_iter().take(max_rows));
            (count, rows, count > max_rows)
        }
    };

    Ok(FilterResult {
        conditions: clauses.to_vec(),
        matched_count,
        rows,
        truncated,
        no_match: matched_count == 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Int64Array, StringArray};
    use std::sync::Arc;

    use crate::plan::FilterOp;
    use crate::store::dataset::{Column, Dataset};

    fn dataset(n: usize) -> Dataset {
        let region = Column::new(
            "region",
            Arc::new(StringArray::from(
                (0..n)
                    .map(|i| Some(if i % 2 == 0 { "west" } else { "east" }))
                    .collect::<Vec<_>>(),
            )) as ArrayRef,
        );
        let units = Column::new(
            "units",
            Arc::new(Int64Array::from(
                (0..n).map(|i| Some(i as i64)).collect::<Vec<_>>(),
            )) as ArrayRef,
        );
        Dataset::new("d", "t.csv", vec![region, units])
    }

    fn eq_clause(column: &str, value: Value) -> FilterClause {
        FilterClause {
            column: column.to_string(),
            op: FilterOp::Eq,
            value,
        }
    }

    #[test]
    fn no_match_is_flagged_not_an_error() {
        let result = run(
            &dataset(4),
            &[eq_clause("region", Value::String("north".into()))],
            None,
            100,
        )
        .unwrap();
        assert!(result.no_match);
        assert!(!result.truncated);
        assert_eq!(result.matched_count, 0);
        assert!(result.rows.is_empty());
    }

    #[test]
    fn cap_truncates_rows_but_not_the_count() {
        let result = run(
            &dataset(250),
            &[eq_clause("region", Value::String("west".into()))],
            None,
            100,
        )
        .unwrap();
        assert_eq!(result.matched_count, 125);
        assert_eq!(result.rows.len(), 100);
        assert!(result.truncated);
    }

    #[test]
    fn transform_plan_sort_and_limit_shape_the_rows() {
        let plan = TransformPlan {
            filters: vec![eq_clause("region", Value::String("west".into()))],
            sort: Some(crate::plan::PlanSort {
                by: "units".to_string(),
                descending: true,
            }),
            limit: Some(2),
            ..TransformPlan::default()
        };
        let clauses = plan.filters.clone();
        let result = run(&dataset(10), &clauses, Some(&plan), 100).unwrap();
        // west rows are the even units; sorted descending, limited to two
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0]["units"], Value::from(8));
        assert_eq!(result.rows[1]["units"], Value::from(6));
        assert_eq!(result.matched_count, 5);
        assert!(!result.truncated);
    }

    #[test]
    fn clauses_combine_as_conjunction() {
        let result = run(
            &dataset(10),
            &[
                eq_clause("region", Value::String("west".into())),
                FilterClause {
                    column: "units".to_string(),
                    op: FilterOp::Gt,
                    value: Value::from(5),
                },
            ],
            None,
            100,
        )
        .unwrap();
        // even indices above 5: 6, 8
        assert_eq!(result.matched_count, 2);
        assert_eq!(result.rows[0]["units"], Value::from(6));
        assert_eq!(result.rows[1]["units"], Value::from(8));
    }
}
