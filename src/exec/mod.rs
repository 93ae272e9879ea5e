//! Per-intent executors
//!
//! Each executor is a pure function from a dataset plus resolved parameters
//! to a typed result. The union is normalized into the response envelope by
//! `crate::normalize`; nothing here touches the network or the stores.

pub mod aggregate;
pub mod filter;
pub mod forecast;
pub mod predict;
pub mod query;
pub mod summary;
pub mod trend;
pub mod whatif;

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::resolve::ResolvedParams;
use crate::store::dataset::Dataset;

/// Tagged union of every executor output
#[derive(Clone, Debug, serde::Serialize)]
#[serde(untagged)]
pub enum AnalysisResult {
    Summary(summary::SummaryReport),
    Trend(trend::TrendResult),
    Aggregation(aggregate::AggregationResult),
    Filter(filter::FilterResult),
    Query(query::QueryResult),
    Forecast(forecast::ForecastResult),
    Predict(predict::PredictResult),
    WhatIf(whatif::WhatIfResult),
}

/// Dispatch resolved parameters to the matching executor
pub fn execute(
    dataset: &Dataset,
    params: &ResolvedParams,
    config: &EngineConfig,
) -> EngineResult<AnalysisResult> {
    match params {
        ResolvedParams::Summary => Ok(AnalysisResult::Summary(summary::run(dataset))),
        ResolvedParams::Trend {
            time_column,
            value_column,
            granularity,
        } => trend::run(dataset, time_column, value_column, *granularity)
            .map(AnalysisResult::Trend),
        ResolvedParams::Aggregation {
            group_by,
            agg_column,
            agg_function,
        } => aggregate::run(dataset, group_by, agg_column, *agg_function)
            .map(AnalysisResult::Aggregation),
        ResolvedParams::Filter { clauses, plan } => {
            filter::run(dataset, clauses, plan.as_ref(), config.max_filter_rows)
                .map(AnalysisResult::Filter)
        }
        ResolvedParams::Query { plan } => {
            Ok(AnalysisResult::Query(query::run(
                dataset,
                plan.as_ref(),
                config.preview_rows,
            )))
        }
        ResolvedParams::Forecast {
            time_column,
            target_column,
            granularity,
            periods,
            filters,
        } => forecast::run(
            dataset,
            time_column,
            target_column,
            *granularity,
            *periods,
            filters,
        )
        .map(AnalysisResult::Forecast),
        ResolvedParams::Predict { target_column } => {
            predict::run(dataset, target_column, config.max_filter_rows)
                .map(AnalysisResult::Predict)
        }
        ResolvedParams::WhatIf {
            target_column,
            record,
            defaults_used,
        } => whatif::run(dataset, target_column, record, defaults_used)
            .map(AnalysisResult::WhatIf),
    }
}
