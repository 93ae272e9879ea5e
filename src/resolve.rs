//! Parameter resolution: prompt + column profile → concrete, column-bound
//! executor arguments
//!
//! Every rule here is a deterministic fallback chain. Resolution fails
//! closed: when no rule produces a valid column, the executor receives an
//! explicit resolution error instead of a guessed wrong column. Every
//! default taken is recorded as a diagnostic note.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::intent::Intent;
use crate::llm::{ollama::extract_json, LanguageModel};
use crate::plan::{AggFunction, FilterClause, FilterOp, TransformPlan};
use crate::profile::ColumnProfile;
use crate::store::dataset::Dataset;

/// Time bucket width for trend and forecast
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
    Year,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
            Granularity::Year => "year",
        }
    }
}

/// Intent-specific executor arguments
#[derive(Clone, Debug)]
pub enum ResolvedParams {
    Summary,
    Trend {
        time_column: String,
        value_column: String,
        granularity: Granularity,
    },
    Aggregation {
        group_by: Vec<String>,
        agg_column: String,
        agg_function: AggFunction,
    },
    Filter {
        clauses: Vec<FilterClause>,
        plan: Option<TransformPlan>,
    },
    Query {
        plan: Option<TransformPlan>,
    },
    Forecast {
        time_column: String,
        target_column: String,
        granularity: Granularity,
        periods: usize,
        filters: Vec<FilterClause>,
    },
    Predict {
        target_column: String,
    },
    WhatIf {
        target_column: String,
        record: Vec<(String, Value)>,
        defaults_used: Vec<String>,
    },
}

/// Resolved arguments plus which defaults were chosen along the way
#[derive(Clone, Debug)]
pub struct Resolution {
    pub params: ResolvedParams,
    pub notes: Vec<String>,
}

const BUSINESS_KEYWORDS: [&str; 7] = [
    "revenue", "sales", "profit", "price", "cost", "amount", "units",
];

const TIME_NAME_KEYWORDS: [&str; 6] = ["date", "time", "year", "month", "week", "day"];

pub struct Resolver {
    llm: Option<Arc<dyn LanguageModel>>,
    config: EngineConfig,
}

impl Resolver {
    pub fn new(llm: Option<Arc<dyn LanguageModel>>, config: EngineConfig) -> Self {
        Self { llm, config }
    }

    pub async fn resolve(
        &self,
        intent: Intent,
        prompt: &str,
        dataset: &Dataset,
    ) -> EngineResult<Resolution> {
        let profile = dataset.profile();
        let mut notes = Vec::new();

        let params = match intent {
            Intent::Summary => ResolvedParams::Summary,
            Intent::Trend => {
                let time_column = time_column(prompt, dataset, profile, &mut notes)?;
                let value_column = value_column(prompt, profile, &mut notes)?;
                let granularity = granularity_from(prompt).unwrap_or_else(|| {
                    notes.push("granularity defaulted to month".to_string());
                    Granularity::Month
                });
                ResolvedParams::Trend {
                    time_column,
                    value_column,
                    granularity,
                }
            }
            Intent::Aggregation => {
                let group_by = group_by_columns(prompt, dataset, profile, &mut notes)?;
                let agg_column = value_column(prompt, profile, &mut notes)?;
                let agg_function = agg_function_from(prompt).unwrap_or_else(|| {
                    notes.push("aggregation function defaulted to sum".to_string());
                    AggFunction::Sum
                });
                ResolvedParams::Aggregation {
                    group_by,
                    agg_column,
                    agg_function,
                }
            }
            Intent::Filter => {
                let clauses = extract_clauses(prompt, dataset);
                if !clauses.is_empty() {
                    for clause in &clauses {
                        notes.push(format!(
                            "filter condition: {} {} {}",
                            clause.column,
                            clause.op.as_str(),
                            clause.value
                        ));
                    }
                    ResolvedParams::Filter {
                        clauses,
                        plan: None,
                    }
                } else {
                    // second attempt: ask the model for an allowlisted plan
                    match self.generate_plan(prompt, dataset, &mut notes).await {
                        Some(plan) if !plan.filters.is_empty() || !plan.is_noop() => {
                            ResolvedParams::Filter {
                                clauses: plan.filters.clone(),
                                plan: Some(plan),
                            }
                        }
                        _ => {
                            return Err(EngineError::resolution_for(
                                "no filter condition could be extracted from the prompt",
                                "filter predicate",
                            ));
                        }
                    }
                }
            }
            Intent::Query => {
                let plan = self.generate_plan(prompt, dataset, &mut notes).await;
                if plan.is_none() {
                    notes.push("returning dataset preview".to_string());
                }
                ResolvedParams::Query { plan }
            }
            Intent::Forecast => {
                let time_column = time_column(prompt, dataset, profile, &mut notes)?;
                let target_column = value_column(prompt, profile, &mut notes)?;
                let (periods, granularity) = horizon_from(prompt).unwrap_or_else(|| {
                    notes.push(format!(
                        "forecast horizon defaulted to {} months",
                        self.config.default_forecast_periods
                    ));
                    (self.config.default_forecast_periods, Granularity::Month)
                });
                let periods = periods.min(self.config.max_forecast_periods).max(1);
                let filters = extract_clauses(prompt, dataset);
                for clause in &filters {
                    notes.push(format!(
                        "forecast restricted to {} {} {}",
                        clause.column,
                        clause.op.as_str(),
                        clause.value
                    ));
                }
                ResolvedParams::Forecast {
                    time_column,
                    target_column,
                    granularity,
                    periods,
                    filters,
                }
            }
            Intent::Predict => {
                let target_column = value_column(prompt, profile, &mut notes)?;
                ResolvedParams::Predict { target_column }
            }
            Intent::WhatIf => {
                let target_column = value_column(prompt, profile, &mut notes)?;
                let (record, defaults_used) =
                    whatif_record(prompt, dataset, profile, &target_column);
                ResolvedParams::WhatIf {
                    target_column,
                    record,
                    defaults_used,
                }
            }
            Intent::Error => {
                return Err(EngineError::resolution(
                    "the prompt was classified as not executable",
                ));
            }
        };

        Ok(Resolution { params, notes })
    }

    /// Ask the model for a transform plan as strict JSON; any failure
    /// (no model, bad JSON, unknown columns) yields None so the caller can
    /// degrade deterministically.
    async fn generate_plan(
        &self,
        prompt: &str,
        dataset: &Dataset,
        notes: &mut Vec<String>,
    ) -> Option<TransformPlan> {
        let llm = self.llm.as_ref()?;
        let system = plan_system_prompt(dataset);
        let response = match llm.complete(&system, prompt).await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "plan generation call failed");
                notes.push("plan generation unavailable".to_string());
                return None;
            }
        };
        let cleaned = extract_json(&response);
        let plan: TransformPlan = match serde_json::from_str(&cleaned) {
            Ok(plan) => plan,
            Err(e) => {
                debug!(error = %e, "model plan was not valid JSON");
                notes.push("model plan rejected: invalid JSON".to_string());
                return None;
            }
        };
        if let Err(e) = plan.validate(dataset) {
            debug!(error = %e, "model plan referenced unknown columns");
            notes.push("model plan rejected: unknown columns".to_string());
            return None;
        }
        notes.push("executed model-generated transform plan".to_string());
        Some(plan)
    }
}

fn plan_system_prompt(dataset: &Dataset) -> String {
    let columns = dataset.column_names().join(", ");
    format!(
        "You translate a data request into a JSON transform plan. Output ONLY valid JSON with \
this exact shape (omit fields you do not need):\n\
{{\"select\": [\"col\"], \"filters\": [{{\"column\": \"col\", \"op\": \"eq|ne|gt|gte|lt|lte|contains|in\", \"value\": ...}}], \
\"group_by\": [\"col\"], \"aggregate\": {{\"column\": \"col\", \"function\": \"sum|mean|count|min|max\"}}, \
\"sort\": {{\"by\": \"col\", \"descending\": true}}, \"limit\": 10}}\n\
Use only these column names exactly as written: {}. No markdown, no explanations.",
        columns
    )
}

/// A column whose name appears verbatim in the prompt, longest name first
fn named_column<'a>(prompt: &str, candidates: impl Iterator<Item = &'a str>) -> Option<String> {
    let prompt_lower = prompt.to_lowercase();
    let mut names: Vec<&str> = candidates.collect();
    names.sort_by_key(|n| std::cmp::Reverse(n.len()));
    for name in names {
        let lowered = name.to_lowercase();
        if prompt_lower.contains(&lowered)
            || prompt_lower.contains(&lowered.replace('_', " "))
        {
            return Some(name.to_string());
        }
    }
    None
}

fn time_column(
    prompt: &str,
    dataset: &Dataset,
    profile: &ColumnProfile,
    notes: &mut Vec<String>,
) -> EngineResult<String> {
    if let Some(name) = named_column(prompt, profile.datelike.iter().map(String::as_str)) {
        return Ok(name);
    }
    if let Some(name) = profile.first_datelike() {
        notes.push(format!("time column defaulted to '{}'", name));
        return Ok(name.to_string());
    }
    for column in &dataset.columns {
        let lowered = column.name.to_lowercase();
        if TIME_NAME_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
            notes.push(format!("time column guessed from name '{}'", column.name));
            return Ok(column.name.clone());
        }
    }
    Err(EngineError::resolution_for(
        "no date-like column was found for time analysis",
        "time column",
    ))
}

fn value_column(
    prompt: &str,
    profile: &ColumnProfile,
    notes: &mut Vec<String>,
) -> EngineResult<String> {
    let prompt_lower = prompt.to_lowercase();
    for keyword in BUSINESS_KEYWORDS {
        if !prompt_lower.contains(keyword) {
            continue;
        }
        for name in &profile.numeric {
            if name.to_lowercase().contains(keyword) {
                return Ok(name.clone());
            }
        }
    }
    if let Some(name) = named_column(prompt, profile.numeric.iter().map(String::as_str)) {
        return Ok(name);
    }
    if let Some(name) = profile.first_numeric() {
        notes.push(format!("value column defaulted to '{}'", name));
        return Ok(name.to_string());
    }
    Err(EngineError::resolution_for(
        "the dataset has no numeric column to analyze",
        "value column",
    ))
}

fn granularity_from(prompt: &str) -> Option<Granularity> {
    let p = prompt.to_lowercase();
    if p.contains("daily") || p.contains("per day") || p.contains("by day") {
        Some(Granularity::Day)
    } else if p.contains("weekly") || p.contains("per week") || p.contains("by week") {
        Some(Granularity::Week)
    } else if p.contains("yearly") || p.contains("annual") || p.contains("per year") || p.contains("by year") {
        Some(Granularity::Year)
    } else if p.contains("monthly") || p.contains("per month") || p.contains("by month") {
        Some(Granularity::Month)
    } else {
        None
    }
}

fn group_by_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:group(?:ed)?\s+)?by\s+([A-Za-z0-9_ ,]+)").expect("static pattern")
    })
}

fn group_by_columns(
    prompt: &str,
    dataset: &Dataset,
    profile: &ColumnProfile,
    notes: &mut Vec<String>,
) -> EngineResult<Vec<String>> {
    let mut resolved: Vec<String> = Vec::new();

    if let Some(captures) = group_by_re().captures(prompt) {
        let fragment_list = captures.get(1).map(|m| m.as_str()).unwrap_or("");
        for fragment in fragment_list.split([',']).flat_map(|f| f.split(" and ")) {
            let fragment = fragment.trim();
            if fragment.is_empty() {
                continue;
            }
            let fragment_lower = fragment.to_lowercase();
            // substring containment in either direction, case-insensitive
            let matched = dataset.columns.iter().find(|c| {
                let name = c.name.to_lowercase();
                name.contains(&fragment_lower) || fragment_lower.contains(&name)
            });
            if let Some(column) = matched {
                if !resolved.iter().any(|r| r == &column.name) {
                    resolved.push(column.name.clone());
                }
            }
        }
    }

    // also accept "per <column>" phrasing
    if resolved.is_empty() {
        if let Some(name) = named_column(prompt, profile.categorical.iter().map(String::as_str)) {
            resolved.push(name);
        }
    }

    if resolved.is_empty() {
        if let Some(name) = profile.first_categorical() {
            notes.push(format!("grouping defaulted to '{}'", name));
            resolved.push(name.to_string());
        } else {
            return Err(EngineError::resolution_for(
                "the dataset has no categorical column to group by",
                "group-by columns",
            ));
        }
    }

    Ok(resolved)
}

fn agg_function_from(prompt: &str) -> Option<AggFunction> {
    let p = prompt.to_lowercase();
    if p.contains("average") || p.contains("mean") {
        Some(AggFunction::Mean)
    } else if p.contains("count") || p.contains("number of") {
        Some(AggFunction::Count)
    } else if p.contains("minimum") || p.contains("lowest") || p.contains(" min ") {
        Some(AggFunction::Min)
    } else if p.contains("maximum") || p.contains("highest") || p.contains(" max ") {
        Some(AggFunction::Max)
    } else if p.contains("sum") || p.contains("total") {
        Some(AggFunction::Sum)
    } else {
        None
    }
}

fn horizon_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d+)\s*(day|week|month|year)s?").expect("static pattern")
    })
}

fn horizon_from(prompt: &str) -> Option<(usize, Granularity)> {
    let captures = horizon_re().captures(prompt)?;
    let periods: usize = captures.get(1)?.as_str().parse().ok()?;
    if periods == 0 {
        return None;
    }
    let granularity = match captures.get(2)?.as_str().to_lowercase().as_str() {
        "day" => Granularity::Day,
        "week" => Granularity::Week,
        "year" => Granularity::Year,
        _ => Granularity::Month,
    };
    Some((periods, granularity))
}

/// Column-anchored clause extraction: "<column> <op> <value>"
pub fn extract_clauses(prompt: &str, dataset: &Dataset) -> Vec<FilterClause> {
    let mut clauses = Vec::new();
    let mut columns: Vec<&str> = dataset.columns.iter().map(|c| c.name.as_str()).collect();
    columns.sort_by_key(|n| std::cmp::Reverse(n.len()));

    for name in columns {
        let pattern = format!(
            r#"(?i)\b{}\s*(==|!=|>=|<=|=|>|<|not\s+equals?|equals?|is\s+not|is|greater\s+than\s+or\s+equal(?:\s+to)?|greater\s+than|less\s+than\s+or\s+equal(?:\s+to)?|less\s+than|at\s+least|at\s+most|above|below|over|under|contains|in)\s+("[^"]+"|'[^']+'|\[[^\]]+\]|[\w.-]+)"#,
            regex::escape(name)
        );
        let Ok(re) = Regex::new(&pattern) else { continue };
        for captures in re.captures_iter(prompt) {
            let op_text = captures
                .get(1)
                .map(|m| m.as_str().to_lowercase())
                .unwrap_or_default();
            let raw_value = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
            let Some(op) = parse_op(&op_text) else { continue };
            let value = parse_value(raw_value, op);
            clauses.push(FilterClause {
                column: name.to_string(),
                op,
                value,
            });
        }
    }

    clauses
}

fn parse_op(op: &str) -> Option<FilterOp> {
    let op = op.split_whitespace().collect::<Vec<_>>().join(" ");
    match op.as_str() {
        "=" | "==" | "equals" | "equal" | "is" => Some(FilterOp::Eq),
        "!=" | "not equals" | "not equal" | "is not" => Some(FilterOp::Ne),
        ">" | "greater than" | "above" | "over" => Some(FilterOp::Gt),
        ">=" | "greater than or equal" | "greater than or equal to" | "at least" => {
            Some(FilterOp::Gte)
        }
        "<" | "less than" | "below" | "under" => Some(FilterOp::Lt),
        "<=" | "less than or equal" | "less than or equal to" | "at most" => Some(FilterOp::Lte),
        "contains" => Some(FilterOp::Contains),
        "in" => Some(FilterOp::In),
        _ => None,
    }
}

fn parse_value(raw: &str, op: FilterOp) -> Value {
    let raw = raw.trim();
    if op == FilterOp::In {
        let inner = raw.trim_start_matches('[').trim_end_matches(']');
        let items: Vec<Value> = inner
            .split(',')
            .map(|item| scalar_value(item.trim()))
            .filter(|v| !matches!(v, Value::Null))
            .collect();
        return Value::Array(items);
    }
    scalar_value(raw)
}

fn scalar_value(raw: &str) -> Value {
    let unquoted = raw
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_string();
    if unquoted.is_empty() {
        return Value::Null;
    }
    if let Ok(int) = unquoted.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(float) = unquoted.parse::<f64>() {
        return Value::from(float);
    }
    Value::String(unquoted)
}

fn whatif_value_re(column: &str) -> Option<Regex> {
    let pattern = format!(
        r#"(?i)\b{}\s*(?:=|:|is|of|at|were|was)\s+("[^"]+"|'[^']+'|[\w.-]+)"#,
        regex::escape(column)
    );
    Regex::new(&pattern).ok()
}

/// A fully-populated hypothetical record. Every feature column gets a value:
/// extracted from the prompt where possible, otherwise the column mean
/// (numeric) or mode (categorical/date-like), recorded in `defaults_used`.
fn whatif_record(
    prompt: &str,
    dataset: &Dataset,
    profile: &ColumnProfile,
    target_column: &str,
) -> (Vec<(String, Value)>, Vec<String>) {
    let mut record = Vec::new();
    let mut defaults_used = Vec::new();

    for column in &dataset.columns {
        if column.name.eq_ignore_ascii_case(target_column) {
            continue;
        }
        let extracted = whatif_value_re(&column.name)
            .and_then(|re| re.captures(prompt))
            .and_then(|c| c.get(1).map(|m| scalar_value(m.as_str())));

        let is_numeric = profile
            .class_of(&column.name)
            .map(|c| c == crate::profile::ColumnClass::Numeric)
            .unwrap_or(false);

        let value = match extracted {
            Some(value) if is_numeric => match value.as_f64() {
                Some(_) => value,
                None => {
                    defaults_used.push(column.name.clone());
                    numeric_default(column)
                }
            },
            Some(value) => match value {
                Value::String(_) => value,
                other => Value::String(
                    other
                        .as_f64()
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| other.to_string()),
                ),
            },
            None => {
                defaults_used.push(column.name.clone());
                if is_numeric {
                    numeric_default(column)
                } else {
                    categorical_default(column)
                }
            }
        };
        record.push((column.name.clone(), value));
    }

    (record, defaults_used)
}

fn numeric_default(column: &crate::store::dataset::Column) -> Value {
    let values: Vec<f64> = (0..column.len()).filter_map(|r| column.float_at(r)).collect();
    if values.is_empty() {
        Value::from(0.0)
    } else {
        Value::from(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn categorical_default(column: &crate::store::dataset::Column) -> Value {
    let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for row in 0..column.len() {
        if let Some(value) = column.display_at(row) {
            if !counts.contains_key(&value) {
                order.push(value.clone());
            }
            *counts.entry(value).or_insert(0) += 1;
        }
    }
    order
        .into_iter()
        .max_by_key(|v| counts[v])
        .map(Value::String)
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Float64Array, StringArray};
    use std::sync::Arc;

    fn dataset() -> Dataset {
        let date = crate::store::dataset::Column::new(
            "order_date",
            Arc::new(StringArray::from(vec![
                Some("2024-01-01"),
                Some("2024-02-01"),
                Some("2024-03-01"),
            ])) as ArrayRef,
        );
        let region = crate::store::dataset::Column::new(
            "Region",
            Arc::new(StringArray::from(vec![Some("West"), Some("East"), Some("West")])) as ArrayRef,
        );
        let sales = crate::store::dataset::Column::new(
            "total_sales",
            Arc::new(Float64Array::from(vec![Some(100.0), Some(150.0), Some(120.0)])) as ArrayRef,
        );
        Dataset::new("d", "t.csv", vec![date, region, sales])
    }

    fn resolver() -> Resolver {
        Resolver::new(None, EngineConfig::default())
    }

    #[tokio::test]
    async fn trend_resolves_time_and_value_columns() {
        let ds = dataset();
        let resolution = resolver()
            .resolve(Intent::Trend, "show the sales trend monthly", &ds)
            .await
            .unwrap();
        match resolution.params {
            ResolvedParams::Trend {
                time_column,
                value_column,
                granularity,
            } => {
                assert_eq!(time_column, "order_date");
                assert_eq!(value_column, "total_sales");
                assert_eq!(granularity, Granularity::Month);
            }
            other => panic!("unexpected params: {:?}", other),
        }
    }

    #[tokio::test]
    async fn aggregation_parses_group_by_fragments() {
        let ds = dataset();
        let resolution = resolver()
            .resolve(Intent::Aggregation, "average sales by region", &ds)
            .await
            .unwrap();
        match resolution.params {
            ResolvedParams::Aggregation {
                group_by,
                agg_column,
                agg_function,
            } => {
                assert_eq!(group_by, vec!["Region"]);
                assert_eq!(agg_column, "total_sales");
                assert_eq!(agg_function, AggFunction::Mean);
            }
            other => panic!("unexpected params: {:?}", other),
        }
    }

    #[tokio::test]
    async fn filter_extracts_structured_clause() {
        let ds = dataset();
        let resolution = resolver()
            .resolve(Intent::Filter, "Filter rows where Region equals West", &ds)
            .await
            .unwrap();
        match resolution.params {
            ResolvedParams::Filter { clauses, .. } => {
                assert_eq!(clauses.len(), 1);
                assert_eq!(clauses[0].column, "Region");
                assert_eq!(clauses[0].op, FilterOp::Eq);
                assert_eq!(clauses[0].value, Value::String("West".into()));
            }
            other => panic!("unexpected params: {:?}", other),
        }
    }

    #[tokio::test]
    async fn filter_without_any_clause_fails_closed() {
        let ds = dataset();
        let err = resolver()
            .resolve(Intent::Filter, "trim it down a bit please", &ds)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Resolution { .. }));
    }

    #[tokio::test]
    async fn forecast_parses_explicit_horizon() {
        let ds = dataset();
        let resolution = resolver()
            .resolve(Intent::Forecast, "forecast sales for the next 6 weeks", &ds)
            .await
            .unwrap();
        match resolution.params {
            ResolvedParams::Forecast {
                periods,
                granularity,
                ..
            } => {
                assert_eq!(periods, 6);
                assert_eq!(granularity, Granularity::Week);
            }
            other => panic!("unexpected params: {:?}", other),
        }
    }

    #[tokio::test]
    async fn forecast_carries_prompt_conditions() {
        let ds = dataset();
        let resolution = resolver()
            .resolve(
                Intent::Forecast,
                "forecast sales where Region equals West for the next 2 months",
                &ds,
            )
            .await
            .unwrap();
        match resolution.params {
            ResolvedParams::Forecast {
                periods, filters, ..
            } => {
                assert_eq!(periods, 2);
                assert_eq!(filters.len(), 1);
                assert_eq!(filters[0].column, "Region");
                assert_eq!(filters[0].value, Value::String("West".into()));
            }
            other => panic!("unexpected params: {:?}", other),
        }
    }

    #[tokio::test]
    async fn forecast_defaults_to_three_months() {
        let ds = dataset();
        let resolution = resolver()
            .resolve(Intent::Forecast, "forecast the sales", &ds)
            .await
            .unwrap();
        match resolution.params {
            ResolvedParams::Forecast {
                periods,
                granularity,
                ..
            } => {
                assert_eq!(periods, 3);
                assert_eq!(granularity, Granularity::Month);
            }
            other => panic!("unexpected params: {:?}", other),
        }
    }

    #[tokio::test]
    async fn whatif_fills_every_feature() {
        let ds = dataset();
        let resolution = resolver()
            .resolve(
                Intent::WhatIf,
                "what if sales: Region is East for next period",
                &ds,
            )
            .await
            .unwrap();
        match resolution.params {
            ResolvedParams::WhatIf {
                record,
                defaults_used,
                target_column,
            } => {
                assert_eq!(target_column, "total_sales");
                // every non-target column got a value
                assert_eq!(record.len(), 2);
                assert!(record
                    .iter()
                    .all(|(_, v)| !matches!(v, Value::Null)));
                assert!(record
                    .iter()
                    .any(|(name, v)| name == "Region" && v == &Value::String("East".into())));
                // the date column fell back to its mode
                assert!(defaults_used.contains(&"order_date".to_string()));
            }
            other => panic!("unexpected params: {:?}", other),
        }
    }

    #[test]
    fn clause_extraction_handles_numeric_comparison() {
        let ds = dataset();
        let clauses = extract_clauses("only rows with total_sales > 110", &ds);
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0].op, FilterOp::Gt);
        assert_eq!(clauses[0].value, Value::from(110));
    }

    #[test]
    fn clause_extraction_handles_membership() {
        let ds = dataset();
        let clauses = extract_clauses("show Region in [West, East]", &ds);
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0].op, FilterOp::In);
        assert_eq!(
            clauses[0].value,
            Value::Array(vec![
                Value::String("West".into()),
                Value::String("East".into())
            ])
        );
    }
}
