//! Hypothetical-scenario estimation

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::EngineResult;
use crate::normalize::json_number;
use crate::predictor::{LinearPredictor, Predictor};
use crate::store::dataset::Dataset;

#[derive(Clone, Debug, Serialize)]
pub struct WhatIfResult {
    pub target_column: String,
    pub estimate: Value,
    /// the fully-populated record the model scored
    pub inputs: Map<String, Value>,
    /// feature columns that fell back to their dataset default
    pub defaults_used: Vec<String>,
}

pub fn run(
    dataset: &Dataset,
    target_column: &str,
    record: &[(String, Value)],
    defaults_used: &[String],
) -> EngineResult<WhatIfResult> {
    let model = LinearPredictor::fit(dataset, target_column)?;
    let estimate = model.single_predict(record)?;

    let mut inputs = Map::new();
    for (name, value) in record {
        inputs.insert(name.clone(), value.clone());
    }

    Ok(WhatIfResult {
        target_column: target_column.to_string(),
        estimate: json_number(estimate),
        inputs,
        defaults_used: defaults_used.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Float64Array};
    use std::sync::Arc;

    use crate::store::dataset::{Column, Dataset};

    #[test]
    fn scenario_estimate_follows_the_fitted_line() {
        let x = Column::new(
            "x",
            Arc::new(Float64Array::from(vec![
                Some(1.0),
                Some(2.0),
                Some(3.0),
            ])) as ArrayRef,
        );
        let y = Column::new(
            "y",
            Arc::new(Float64Array::from(vec![
                Some(10.0),
                Some(20.0),
                Some(30.0),
            ])) as ArrayRef,
        );
        let ds = Dataset::new("d", "t.csv", vec![x, y]);
        let result = run(
            &ds,
            "y",
            &[("x".to_string(), serde_json::json!(4.0))],
            &[],
        )
        .unwrap();
        let estimate = result.estimate.as_f64().unwrap();
        assert!((estimate - 40.0).abs() < 1e-3);
        assert_eq!(result.inputs["x"], serde_json::json!(4.0));
    }
}
