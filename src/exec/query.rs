//! General data requests: model-planned transforms with a preview fallback

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::normalize::records;
use crate::plan::{self, TransformPlan};
use crate::store::dataset::Dataset;

#[derive(Clone, Debug, Serialize)]
pub struct QueryResult {
    pub rows: Vec<Map<String, Value>>,
    pub row_count: usize,
    /// "plan" when a transform plan produced the rows, "preview" otherwise
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Run the plan when one resolved; degrade to the head of the dataset when
/// there is no plan or the plan fails at runtime. Query never errors.
pub fn run(dataset: &Dataset, plan: Option<&TransformPlan>, preview_rows: usize) -> QueryResult {
    if let Some(plan) = plan {
        match plan::run(plan, dataset) {
            Ok(output) => {
                return QueryResult {
                    row_count: output.records.len(),
                    rows: output.records,
                    source: "plan".to_string(),
                    note: None,
                };
            }
            Err(e) => {
                debug!(error = %e, "transform plan failed, falling back to preview");
                return preview(
                    dataset,
                    preview_rows,
                    Some("the requested transform could not be applied".to_string()),
                );
            }
        }
    }
    preview(dataset, preview_rows, None)
}

fn preview(dataset: &Dataset, preview_rows: usize, note: Option<String>) -> QueryResult {
    let take = preview_rows.min(dataset.row_count);
    let rows = records(dataset, 0..take);
    QueryResult {
        row_count: rows.len(),
        rows,
        source: "preview".to_string(),
        note,
    }
}
