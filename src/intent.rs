//! Intent classification: free-text prompt → one of a closed set of
//! analytical operation kinds
//!
//! Primary path asks the model for exactly one lowercase token from the
//! intent set. Any failure (model unreachable, malformed token) falls
//! through to deterministic keyword rules, so classification stays
//! testable without a live model and the same prompt always maps to the
//! same intent on the rule path.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::llm::LanguageModel;

/// Closed set of operation kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Summary,
    Trend,
    Aggregation,
    Filter,
    Query,
    Forecast,
    Predict,
    #[serde(rename = "whatif")]
    WhatIf,
    /// Terminal: the prompt could not or should not be executed
    Error,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Summary => "summary",
            Intent::Trend => "trend",
            Intent::Aggregation => "aggregation",
            Intent::Filter => "filter",
            Intent::Query => "query",
            Intent::Forecast => "forecast",
            Intent::Predict => "predict",
            Intent::WhatIf => "whatif",
            Intent::Error => "error",
        }
    }

    /// Parse the single-token model response. `error` is deliberately not
    /// accepted from the model; only the rule path may produce it.
    pub fn from_token(token: &str) -> Option<Intent> {
        match token.trim().to_ascii_lowercase().as_str() {
            "summary" => Some(Intent::Summary),
            "trend" => Some(Intent::Trend),
            "aggregation" => Some(Intent::Aggregation),
            "filter" => Some(Intent::Filter),
            "query" => Some(Intent::Query),
            "forecast" => Some(Intent::Forecast),
            "predict" => Some(Intent::Predict),
            "whatif" => Some(Intent::WhatIf),
            _ => None,
        }
    }
}

const CLASSIFY_SYSTEM: &str = "You are an AI that classifies data analysis queries into one of \
the following intents: summary, trend, aggregation, forecast, predict, whatif, filter, or query. \
Respond with only the intent name as a single lowercase word. Do not include explanations, \
formatting, or any extra text.";

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static classifier pattern")
}

fn unsafe_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex(r"(?i)rm\s+-rf|drop\s+table|delete\s+from|import\s+os|subprocess|__import__|eval\s*\(|exec\s*\(|<script|ignore\s+previous\s+instructions")
    })
}

fn summary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| regex(r"(?i)\bsummar|overview|describe|statistics"))
}

fn trend_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| regex(r"(?i)\btrend|over time|time\s*series"))
}

fn forecast_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| regex(r"(?i)\bforecast|\bfuture\b|\bnext\s+\d+|\bnext\s+(day|week|month|quarter|year)|projection"))
}

fn predict_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| regex(r"(?i)\bpredict|\bprediction|\bmodel\s+(the|this|my)|\binference\b"))
}

fn whatif_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| regex(r"(?i)what\s+if|\bsuppose\b|\bsimulate\b|\bscenario\b|\bhypothetical"))
}

fn filter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| regex(r"(?i)\bfilter\b|\bwhere\b|only\s+show|\brows?\s+(with|that|matching)|\bsubset\b|\bexclude\b"))
}

fn aggregate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| regex(r"(?i)\bsum\b|\btotal\b|\baverage\b|\bmean\b|\bcount\b|\bgroup\b|\baggregate|\bminimum\b|\bmaximum\b|\bhighest\b|\blowest\b"))
}

fn grouping_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| regex(r"(?i)\bby\b|\bper\b|for\s+each|\bgroup"))
}

/// Deterministic keyword rules, first match wins. `error` is reserved for
/// the unsafe-marker rule; an unmatched prompt defaults to `query`.
pub fn fallback_intent(prompt: &str) -> Intent {
    if unsafe_re().is_match(prompt) {
        return Intent::Error;
    }
    if summary_re().is_match(prompt) {
        return Intent::Summary;
    }
    if trend_re().is_match(prompt) {
        return Intent::Trend;
    }
    if forecast_re().is_match(prompt) {
        return Intent::Forecast;
    }
    if predict_re().is_match(prompt) && !whatif_re().is_match(prompt) {
        return Intent::Predict;
    }
    if whatif_re().is_match(prompt) {
        return Intent::WhatIf;
    }
    if filter_re().is_match(prompt) {
        return Intent::Filter;
    }
    if aggregate_re().is_match(prompt) {
        if grouping_re().is_match(prompt) {
            return Intent::Aggregation;
        }
        return Intent::Query;
    }
    Intent::Query
}

/// Model-first classifier with the rule fallback
pub struct IntentClassifier {
    llm: Option<Arc<dyn LanguageModel>>,
}

impl IntentClassifier {
    pub fn new(llm: Option<Arc<dyn LanguageModel>>) -> Self {
        Self { llm }
    }

    pub async fn classify(&self, prompt: &str) -> Intent {
        // unsafe markers short-circuit before any model call
        if unsafe_re().is_match(prompt) {
            return Intent::Error;
        }

        if let Some(llm) = &self.llm {
            let user = format!("Prompt: {}\nIntent:", prompt);
            match llm.complete(CLASSIFY_SYSTEM, &user).await {
                Ok(response) => {
                    if let Some(intent) = Intent::from_token(&response) {
                        debug!(intent = intent.as_str(), "model classified intent");
                        return intent;
                    }
                    warn!(
                        response = response.trim(),
                        "model returned invalid intent token, using rules"
                    );
                }
                Err(e) => {
                    warn!(error = %e, "intent model call failed, using rules");
                }
            }
        }

        fallback_intent(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_covers_the_closed_set() {
        assert_eq!(fallback_intent("Give me a summary of the dataset"), Intent::Summary);
        assert_eq!(
            fallback_intent("What are the trends in sales over the past year?"),
            Intent::Trend
        );
        assert_eq!(
            fallback_intent("Show the average sales per category"),
            Intent::Aggregation
        );
        assert_eq!(
            fallback_intent("Forecast the revenue for next month"),
            Intent::Forecast
        );
        assert_eq!(
            fallback_intent("Predict outlet sales for this data"),
            Intent::Predict
        );
        assert_eq!(
            fallback_intent("What if the item price were 250?"),
            Intent::WhatIf
        );
        assert_eq!(
            fallback_intent("Filter rows where Region equals West"),
            Intent::Filter
        );
        assert_eq!(fallback_intent("Top 10 products with most orders"), Intent::Query);
    }

    #[test]
    fn fallback_is_idempotent() {
        let prompt = "Filter rows where Region equals West";
        assert_eq!(fallback_intent(prompt), fallback_intent(prompt));
    }

    #[test]
    fn unsafe_markers_classify_as_error() {
        assert_eq!(fallback_intent("summarize; then run rm -rf /"), Intent::Error);
        assert_eq!(fallback_intent("drop table users"), Intent::Error);
    }

    #[test]
    fn plain_aggregation_verbs_without_grouping_fall_to_query() {
        assert_eq!(fallback_intent("total revenue please"), Intent::Query);
    }

    #[test]
    fn error_token_is_not_accepted_from_the_model() {
        assert_eq!(Intent::from_token("error"), None);
        assert_eq!(Intent::from_token(" Summary \n"), Some(Intent::Summary));
        assert_eq!(Intent::from_token("banana"), None);
    }

    #[tokio::test]
    async fn classifier_without_model_uses_rules() {
        let classifier = IntentClassifier::new(None);
        assert_eq!(
            classifier.classify("Filter rows where Region equals West").await,
            Intent::Filter
        );
    }
}
