//! Allowlisted transform plans
//!
//! When a prompt needs a data transformation the resolver cannot extract
//! directly, the model is asked for a `TransformPlan` as strict JSON. The
//! plan vocabulary is a closed set of primitives (column selection,
//! comparison filters, group-by aggregation, sort, limit) executed by a
//! deterministic interpreter. Model output never becomes code; an invalid
//! plan is rejected during validation and the caller degrades to a preview.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{EngineError, EngineResult};
use crate::normalize;
use crate::store::dataset::{Column, Dataset};

/// Comparison operators allowed in filter clauses
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    In,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Ne => "ne",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::Contains => "contains",
            FilterOp::In => "in",
        }
    }
}

/// One column/operator/value predicate
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FilterClause {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

/// Aggregation functions allowed in plans and prompts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggFunction {
    Sum,
    Mean,
    Count,
    Min,
    Max,
}

impl AggFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggFunction::Sum => "sum",
            AggFunction::Mean => "mean",
            AggFunction::Count => "count",
            AggFunction::Min => "min",
            AggFunction::Max => "max",
        }
    }

    /// Apply the function to the given rows. Count tallies every non-null
    /// cell regardless of storage type; the rest use the non-null numeric
    /// values.
    pub fn apply(&self, column: &Column, rows: &[usize]) -> f64 {
        if matches!(self, AggFunction::Count) {
            return rows
                .iter()
                .filter(|&&r| column.display_at(r).is_some())
                .count() as f64;
        }
        let values: Vec<f64> = rows.iter().filter_map(|&r| column.float_at(r)).collect();
        match self {
            AggFunction::Count => unreachable!(),
            AggFunction::Sum => values.iter().sum(),
            AggFunction::Mean => {
                if values.is_empty() {
                    0.0
                } else {
                    values.iter().sum::<f64>() / values.len() as f64
                }
            }
            AggFunction::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            AggFunction::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlanAggregate {
    pub column: String,
    pub function: AggFunction,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlanSort {
    pub by: String,
    #[serde(default)]
    pub descending: bool,
}

/// The closed plan vocabulary the model may emit
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransformPlan {
    #[serde(default)]
    pub select: Option<Vec<String>>,
    #[serde(default)]
    pub filters: Vec<FilterClause>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub aggregate: Option<PlanAggregate>,
    #[serde(default)]
    pub sort: Option<PlanSort>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl TransformPlan {
    pub fn is_noop(&self) -> bool {
        self.select.is_none()
            && self.filters.is_empty()
            && self.group_by.is_empty()
            && self.aggregate.is_none()
            && self.sort.is_none()
            && self.limit.is_none()
    }

    /// Every referenced column must exist in the dataset
    pub fn validate(&self, dataset: &Dataset) -> EngineResult<()> {
        let check = |name: &str| -> EngineResult<()> {
            if dataset.column(name).is_none() {
                return Err(EngineError::execution(format!(
                    "plan references unknown column '{}'",
                    name
                )));
            }
            Ok(())
        };
        for name in self.select.iter().flatten() {
            check(name)?;
        }
        for clause in &self.filters {
            check(&clause.column)?;
        }
        for name in &self.group_by {
            check(name)?;
        }
        if let Some(agg) = &self.aggregate {
            check(&agg.column)?;
        }
        if let Some(sort) = &self.sort {
            // sorting by an aggregate output column is allowed
            if dataset.column(&sort.by).is_none()
                && self.aggregate.as_ref().map(|a| a.column.as_str()) != Some(sort.by.as_str())
            {
                return Err(EngineError::execution(format!(
                    "plan sorts by unknown column '{}'",
                    sort.by
                )));
            }
        }
        Ok(())
    }
}

/// Interpreter output: flat records plus the pre-truncation match count
#[derive(Clone, Debug)]
pub struct PlanOutput {
    pub records: Vec<Map<String, Value>>,
    pub matched: usize,
}

/// Evaluate one clause against one row
pub fn clause_matches(clause: &FilterClause, column: &Column, row: usize) -> bool {
    if column.is_numeric() {
        let cell = match column.float_at(row) {
            Some(v) => v,
            None => return false,
        };
        match clause.op {
            FilterOp::In => clause
                .value
                .as_array()
                .map(|items| items.iter().filter_map(value_as_f64).any(|v| v == cell))
                .unwrap_or(false),
            FilterOp::Contains => column
                .display_at(row)
                .map(|s| s.contains(clause.value.as_str().unwrap_or_default()))
                .unwrap_or(false),
            op => {
                let target = match value_as_f64(&clause.value) {
                    Some(v) => v,
                    None => return false,
                };
                match op {
                    FilterOp::Eq => cell == target,
                    FilterOp::Ne => cell != target,
                    FilterOp::Gt => cell > target,
                    FilterOp::Gte => cell >= target,
                    FilterOp::Lt => cell < target,
                    FilterOp::Lte => cell <= target,
                    _ => unreachable!(),
                }
            }
        }
    } else {
        let cell = match column.str_at(row) {
            Some(v) => v,
            None => return false,
        };
        let target = clause.value.as_str().map(str::to_string).unwrap_or_else(|| {
            clause
                .value
                .as_f64()
                .map(|v| v.to_string())
                .unwrap_or_default()
        });
        match clause.op {
            FilterOp::Eq => cell == target,
            FilterOp::Ne => cell != target,
            FilterOp::Contains => cell.contains(target.as_str()),
            FilterOp::In => clause
                .value
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .any(|v| v.as_str().map(|s| s == cell).unwrap_or(false))
                })
                .unwrap_or(false),
            // ordered comparison on text falls back to lexicographic order
            FilterOp::Gt => cell > target.as_str(),
            FilterOp::Gte => cell >= target.as_str(),
            FilterOp::Lt => cell < target.as_str(),
            FilterOp::Lte => cell <= target.as_str(),
        }
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Row indices matching all clauses (conjunction)
pub fn matching_rows(dataset: &Dataset, clauses: &[FilterClause]) -> EngineResult<Vec<usize>> {
    let mut bound: Vec<(&FilterClause, &Column)> = Vec::with_capacity(clauses.len());
    for clause in clauses {
        let column = dataset.column(&clause.column).ok_or_else(|| {
            EngineError::execution(format!("filter references unknown column '{}'", clause.column))
        })?;
        bound.push((clause, column));
    }
    Ok((0..dataset.row_count)
        .filter(|&row| bound.iter().all(|(clause, column)| clause_matches(clause, column, row)))
        .collect())
}

/// Run a validated plan over the dataset
pub fn run(plan: &TransformPlan, dataset: &Dataset) -> EngineResult<PlanOutput> {
    plan.validate(dataset)?;

    let rows = matching_rows(dataset, &plan.filters)?;
    let matched = rows.len();

    // group + aggregate path produces one record per group
    if let (false, Some(agg)) = (plan.group_by.is_empty(), plan.aggregate.as_ref()) {
        let agg_column = dataset
            .column(&agg.column)
            .ok_or_else(|| EngineError::execution("aggregate column disappeared"))?;
        let group_columns: Vec<&Column> = plan
            .group_by
            .iter()
            .filter_map(|name| dataset.column(name))
            .collect();

        let mut order: Vec<Vec<String>> = Vec::new();
        let mut groups: std::collections::HashMap<Vec<String>, Vec<usize>> =
            std::collections::HashMap::new();
        for &row in &rows {
            let key: Vec<String> = group_columns
                .iter()
                .map(|c| c.display_at(row).unwrap_or_default())
                .collect();
            if !groups.contains_key(&key) {
                order.push(key.clone());
            }
            groups.entry(key).or_default().push(row);
        }

        let mut records: Vec<Map<String, Value>> = order
            .into_iter()
            .map(|key| {
                let indices = &groups[&key];
                let mut record = Map::new();
                for (column, value) in group_columns.iter().zip(key) {
                    record.insert(column.name.clone(), Value::String(value));
                }
                record.insert(
                    agg_column.name.clone(),
                    normalize::json_number(agg.function.apply(agg_column, indices)),
                );
                record
            })
            .collect();

        sort_records(&mut records, plan.sort.as_ref());
        if let Some(limit) = plan.limit {
            records.truncate(limit);
        }
        return Ok(PlanOutput { records, matched });
    }

    // plain row selection path
    let selected: Vec<&Column> = match &plan.select {
        Some(names) => names
            .iter()
            .filter_map(|name| dataset.column(name))
            .collect(),
        None => dataset.columns.iter().collect(),
    };

    let mut ordered_rows = rows;
    if let Some(sort) = &plan.sort {
        if let Some(sort_column) = dataset.column(&sort.by) {
            ordered_rows.sort_by(|&a, &b| {
                let ord = compare_cells(sort_column, a, b);
                if sort.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }
    }
    if let Some(limit) = plan.limit {
        ordered_rows.truncate(limit);
    }

    let records = ordered_rows
        .iter()
        .map(|&row| {
            let mut record = Map::new();
            for column in &selected {
                record.insert(column.name.clone(), normalize::cell_value(column, row));
            }
            record
        })
        .collect();

    Ok(PlanOutput { records, matched })
}

fn compare_cells(column: &Column, a: usize, b: usize) -> std::cmp::Ordering {
    if column.is_numeric() {
        let va = column.float_at(a).unwrap_or(f64::NEG_INFINITY);
        let vb = column.float_at(b).unwrap_or(f64::NEG_INFINITY);
        va.partial_cmp(&vb).unwrap_or(std::cmp::Ordering::Equal)
    } else {
        column
            .str_at(a)
            .unwrap_or("")
            .cmp(column.str_at(b).unwrap_or(""))
    }
}

fn sort_records(records: &mut [Map<String, Value>], sort: Option<&PlanSort>) {
    let Some(sort) = sort else { return };
    records.sort_by(|a, b| {
        let va = a.get(&sort.by);
        let vb = b.get(&sort.by);
        let ord = match (va.and_then(Value::as_f64), vb.and_then(Value::as_f64)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
            _ => va
                .and_then(Value::as_str)
                .unwrap_or("")
                .cmp(vb.and_then(Value::as_str).unwrap_or("")),
        };
        if sort.descending {
            ord.reverse()
        } else {
            ord
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Int64Array, StringArray};
    use std::sync::Arc;

    fn dataset() -> Dataset {
        let cat = Column::new(
            "cat",
            Arc::new(StringArray::from(vec![Some("X"), Some("X"), Some("Y")])) as ArrayRef,
        );
        let val = Column::new(
            "val",
            Arc::new(Int64Array::from(vec![Some(10), Some(30), Some(5)])) as ArrayRef,
        );
        Dataset::new("d", "t.csv", vec![cat, val])
    }

    #[test]
    fn plan_with_unknown_column_fails_validation() {
        let plan = TransformPlan {
            filters: vec![FilterClause {
                column: "nope".into(),
                op: FilterOp::Eq,
                value: Value::from(1),
            }],
            ..Default::default()
        };
        assert!(plan.validate(&dataset()).is_err());
    }

    #[test]
    fn group_aggregate_plan_produces_one_record_per_group() {
        let plan = TransformPlan {
            group_by: vec!["cat".into()],
            aggregate: Some(PlanAggregate {
                column: "val".into(),
                function: AggFunction::Sum,
            }),
            ..Default::default()
        };
        let out = run(&plan, &dataset()).unwrap();
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0]["cat"], Value::String("X".into()));
        assert_eq!(out.records[0]["val"], Value::from(40.0));
    }

    #[test]
    fn filter_sort_limit_plan() {
        let plan = TransformPlan {
            filters: vec![FilterClause {
                column: "val".into(),
                op: FilterOp::Gt,
                value: Value::from(4),
            }],
            sort: Some(PlanSort {
                by: "val".into(),
                descending: true,
            }),
            limit: Some(2),
            ..Default::default()
        };
        let out = run(&plan, &dataset()).unwrap();
        assert_eq!(out.matched, 3);
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0]["val"], Value::from(30));
    }

    #[test]
    fn count_tallies_non_null_text_cells() {
        let cat = Column::new(
            "cat",
            Arc::new(StringArray::from(vec![Some("X"), Some("X"), None])) as ArrayRef,
        );
        let ds = Dataset::new("d", "t.csv", vec![cat]);
        let column = ds.column("cat").unwrap();
        assert_eq!(AggFunction::Count.apply(column, &[0, 1, 2]), 2.0);
    }
}
