//! In-sample prediction quality for one numeric target

use serde::Serialize;

use crate::error::EngineResult;
use crate::normalize::finite;
use crate::predictor::{LinearPredictor, Predictor};
use crate::store::dataset::Dataset;

#[derive(Clone, Debug, Serialize)]
pub struct PredictedRow {
    pub actual: f64,
    pub predicted: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct PredictResult {
    pub target_column: String,
    /// mean absolute error over every scored row
    pub mae: Option<f64>,
    /// undefined when the target has no variance
    pub r2: Option<f64>,
    pub row_count: usize,
    pub rows: Vec<PredictedRow>,
    pub truncated: bool,
}

/// Fit a linear model against `target_column` and score every row that has
/// a target value. Metrics cover all scored rows; the row listing is capped.
pub fn run(dataset: &Dataset, target_column: &str, max_rows: usize) -> EngineResult<PredictResult> {
    let model = LinearPredictor::fit(dataset, target_column)?;
    let pairs = model.batch_predict(dataset)?;

    let n = pairs.len();
    let mae = if n > 0 {
        finite(
            pairs
                .iter()
                .map(|(actual, predicted)| (actual - predicted).abs())
                .sum::<f64>()
                / n as f64,
        )
    } else {
        None
    };

    let r2 = if n > 1 {
        let mean = pairs.iter().map(|(a, _)| a).sum::<f64>() / n as f64;
        let ss_tot: f64 = pairs.iter().map(|(a, _)| (a - mean).powi(2)).sum();
        let ss_res: f64 = pairs.iter().map(|(a, p)| (a - p).powi(2)).sum();
        if ss_tot > 0.0 {
            finite(1.0 - ss_res / ss_tot)
        } else {
            None
        }
    } else {
        None
    };

    let truncated = n > max_rows;
    let rows = pairs
        .into_iter()
        .take(max_rows)
        .map(|(actual, predicted)| PredictedRow { actual, predicted })
        .collect();

    Ok(PredictResult {
        target_column: target_column.to_string(),
        mae,
        r2,
        row_count: n,
        rows,
        truncated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Float64Array};
    use std::sync::Arc;

    use crate::store::dataset::{Column, Dataset};

    fn linear_dataset(n: usize) -> Dataset {
        let x = Column::new(
            "x",
            Arc::new(Float64Array::from(
                (0..n).map(|i| Some(i as f64)).collect::<Vec<_>>(),
            )) as ArrayRef,
        );
        let y = Column::new(
            "y",
            Arc::new(Float64Array::from(
                (0..n).map(|i| Some(3.0 * i as f64 + 2.0)).collect::<Vec<_>>(),
            )) as ArrayRef,
        );
        Dataset::new("d", "t.csv", vec![x, y])
    }

    #[test]
    fn exact_fit_scores_near_perfectly() {
        let result = run(&linear_dataset(10), "y", 100).unwrap();
        assert!(result.mae.unwrap() < 1e-3);
        assert!(result.r2.unwrap() > 0.999);
        assert_eq!(result.row_count, 10);
        assert!(!result.truncated);
    }

    #[test]
    fn row_listing_is_capped_but_count_is_not() {
        let result = run(&linear_dataset(150), "y", 100).unwrap();
        assert_eq!(result.row_count, 150);
        assert_eq!(result.rows.len(), 100);
        assert!(result.truncated);
    }

    #[test]
    fn missing_target_is_an_error() {
        assert!(run(&linear_dataset(10), "z", 100).is_err());
    }
}
