//! Linear prediction over tabular features
//!
//! Fits a ridge-regularized least-squares model against one numeric target.
//! Features are prepared the same way at fit and predict time: numeric
//! columns are mean-imputed and standard-scaled, categorical columns are
//! mode-imputed and label-encoded over the sorted distinct values seen at
//! fit time. Unseen categories and absent features encode to zero before
//! scaling, so a sparse hypothetical record still yields a finite estimate.

use std::collections::{BTreeSet, HashMap};

use serde_json::Value;

use crate::error::{EngineError, EngineResult};
use crate::store::dataset::Dataset;

/// Seam for the predict and what-if executors
pub trait Predictor: Send + Sync {
    /// Target column this model was fit against
    fn target(&self) -> &str;

    /// In-sample predictions for every row that has a non-null target
    fn batch_predict(&self, dataset: &Dataset) -> EngineResult<Vec<(f64, f64)>>;

    /// Prediction for one hypothetical record of (column, value) pairs
    fn single_predict(&self, record: &[(String, Value)]) -> EngineResult<f64>;
}

enum Encoding {
    /// mean of the training rows, the imputation value
    Numeric { mean: f64 },
    /// sorted distinct labels; code = index + 1, unseen = 0
    Categorical { labels: Vec<String>, mode: String },
}

struct Feature {
    name: String,
    encoding: Encoding,
    /// scaling parameters over the encoded training values
    scale_mean: f64,
    scale_std: f64,
}

/// Closed-form least squares with a small ridge term for stability
pub struct LinearPredictor {
    target: String,
    features: Vec<Feature>,
    /// theta[0] is the bias term
    theta: Vec<f64>,
}

const RIDGE_LAMBDA: f64 = 1e-6;

impl LinearPredictor {
    /// Fit against `target` using every other column as a feature.
    pub fn fit(dataset: &Dataset, target: &str) -> EngineResult<Self> {
        let target_column = dataset.column(target).ok_or_else(|| {
            EngineError::execution_in(
                format!("target column '{}' not found", target),
                "model fit",
            )
        })?;
        if !target_column.is_numeric() {
            return Err(EngineError::execution_in(
                format!("target column '{}' is not numeric", target),
                "model fit",
            ));
        }

        // training rows are those with a non-null target
        let rows: Vec<usize> = (0..dataset.row_count)
            .filter(|&r| target_column.float_at(r).is_some())
            .collect();
        if rows.len() < 2 {
            return Err(EngineError::execution_in(
                "not enough rows with a target value to fit a model",
                "model fit",
            ));
        }

        let mut features = Vec::new();
        for column in &dataset.columns {
            if column.name.eq_ignore_ascii_case(target) {
                continue;
            }
            if let Some(feature) = build_feature(column, &rows) {
                features.push(feature);
            }
        }
        if features.is_empty() {
            return Err(EngineError::execution_in(
                "no usable feature columns besides the target",
                "model fit",
            ));
        }

        // design matrix with a leading bias column
        let width = features.len() + 1;
        let mut design: Vec<Vec<f64>> = Vec::with_capacity(rows.len());
        let mut targets: Vec<f64> = Vec::with_capacity(rows.len());
        for &row in &rows {
            let mut x = Vec::with_capacity(width);
            x.push(1.0);
            for feature in &features {
                x.push(feature.scaled_at(dataset, row));
            }
            design.push(x);
            targets.push(target_column.float_at(row).unwrap_or(0.0));
        }

        let theta = solve_normal_equations(&design, &targets, width)?;

        Ok(Self {
            target: target.to_string(),
            features,
            theta,
        })
    }

    fn predict_encoded(&self, encoded: &[f64]) -> f64 {
        let mut y = self.theta[0];
        for (i, x) in encoded.iter().enumerate() {
            y += self.theta[i + 1] * x;
        }
        y
    }
}

impl Predictor for LinearPredictor {
    fn target(&self) -> &str {
        &self.target
    }

    fn batch_predict(&self, dataset: &Dataset) -> EngineResult<Vec<(f64, f64)>> {
        let target_column = dataset.column(&self.target).ok_or_else(|| {
            EngineError::execution_in(
                format!("target column '{}' not found", self.target),
                "batch predict",
            )
        })?;
        let mut pairs = Vec::new();
        for row in 0..dataset.row_count {
            let Some(actual) = target_column.float_at(row) else {
                continue;
            };
            let encoded: Vec<f64> = self
                .features
                .iter()
                .map(|f| f.scaled_at(dataset, row))
                .collect();
            pairs.push((actual, self.predict_encoded(&encoded)));
        }
        Ok(pairs)
    }

    fn single_predict(&self, record: &[(String, Value)]) -> EngineResult<f64> {
        let by_name: HashMap<&str, &Value> = record
            .iter()
            .map(|(name, value)| (name.as_str(), value))
            .collect();
        let encoded: Vec<f64> = self
            .features
            .iter()
            .map(|feature| {
                let raw = by_name
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(&feature.name))
                    .map(|(_, value)| *value);
                feature.scale(feature.encode_value(raw))
            })
            .collect();
        let estimate = self.predict_encoded(&encoded);
        if estimate.is_finite() {
            Ok(estimate)
        } else {
            Err(EngineError::execution_in(
                "the model produced a non-finite estimate",
                "what-if predict",
            ))
        }
    }
}

impl Feature {
    /// Encoded-then-scaled value for one dataset row
    fn scaled_at(&self, dataset: &Dataset, row: usize) -> f64 {
        let column = dataset.column(&self.name);
        let raw = match (&self.encoding, column) {
            (Encoding::Numeric { mean }, Some(col)) => {
                col.float_at(row).unwrap_or(*mean)
            }
            (Encoding::Categorical { labels, mode }, Some(col)) => {
                let label = col.display_at(row).unwrap_or_else(|| mode.clone());
                encode_label(labels, &label)
            }
            // feature column absent from this dataset: encode as zero
            (_, None) => 0.0,
        };
        self.scale(raw)
    }

    /// Encode a prompt-supplied value; None or an unusable value encodes
    /// to the training default (mean or mode).
    fn encode_value(&self, value: Option<&Value>) -> f64 {
        match &self.encoding {
            Encoding::Numeric { mean } => value
                .and_then(Value::as_f64)
                .or_else(|| {
                    value
                        .and_then(Value::as_str)
                        .and_then(|s| s.parse::<f64>().ok())
                })
                .unwrap_or(*mean),
            Encoding::Categorical { labels, mode } => {
                let label = match value {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => mode.clone(),
                };
                encode_label(labels, &label)
            }
        }
    }

    fn scale(&self, raw: f64) -> f64 {
        (raw - self.scale_mean) / self.scale_std
    }
}

fn encode_label(labels: &[String], label: &str) -> f64 {
    labels
        .iter()
        .position(|l| l == label)
        .map(|i| (i + 1) as f64)
        .unwrap_or(0.0)
}

fn build_feature(column: &crate::store::dataset::Column, rows: &[usize]) -> Option<Feature> {
    let encoding = if column.is_numeric() {
        let values: Vec<f64> = rows.iter().filter_map(|&r| column.float_at(r)).collect();
        if values.is_empty() {
            return None;
        }
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        Encoding::Numeric { mean }
    } else {
        let mut distinct = BTreeSet::new();
        let mut counts: HashMap<String, usize> = HashMap::new();
        for &row in rows {
            if let Some(value) = column.display_at(row) {
                distinct.insert(value.clone());
                *counts.entry(value).or_insert(0) += 1;
            }
        }
        if distinct.is_empty() {
            return None;
        }
        let labels: Vec<String> = distinct.into_iter().collect();
        let mode = labels
            .iter()
            .max_by_key(|l| counts.get(*l).copied().unwrap_or(0))
            .cloned()
            .unwrap_or_default();
        Encoding::Categorical { labels, mode }
    };

    // scaling over the encoded training values
    let encoded: Vec<f64> = rows
        .iter()
        .map(|&row| match &encoding {
            Encoding::Numeric { mean } => column.float_at(row).unwrap_or(*mean),
            Encoding::Categorical { labels, mode } => {
                let label = column.display_at(row).unwrap_or_else(|| mode.clone());
                encode_label(labels, &label)
            }
        })
        .collect();
    let scale_mean = encoded.iter().sum::<f64>() / encoded.len() as f64;
    let variance = encoded
        .iter()
        .map(|v| (v - scale_mean).powi(2))
        .sum::<f64>()
        / encoded.len() as f64;
    let mut scale_std = variance.sqrt();
    if scale_std == 0.0 || !scale_std.is_finite() {
        scale_std = 1.0;
    }

    Some(Feature {
        name: column.name.clone(),
        encoding,
        scale_mean,
        scale_std,
    })
}

/// Solve (XᵀX + λI)θ = Xᵀy by Gaussian elimination with partial pivoting.
fn solve_normal_equations(
    design: &[Vec<f64>],
    targets: &[f64],
    width: usize,
) -> EngineResult<Vec<f64>> {
    // normal matrix and right-hand side
    let mut a = vec![vec![0.0; width + 1]; width];
    for (x, &y) in design.iter().zip(targets) {
        for i in 0..width {
            for j in 0..width {
                a[i][j] += x[i] * x[j];
            }
            a[i][width] += x[i] * y;
        }
    }
    for (i, row) in a.iter_mut().enumerate() {
        row[i] += RIDGE_LAMBDA;
    }

    for pivot in 0..width {
        let best = (pivot..width)
            .max_by(|&i, &j| {
                a[i][pivot]
                    .abs()
                    .partial_cmp(&a[j][pivot].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(pivot);
        a.swap(pivot, best);
        let diag = a[pivot][pivot];
        if diag.abs() < 1e-12 {
            return Err(EngineError::execution_in(
                "the feature matrix is singular",
                "model fit",
            ));
        }
        for col in pivot..=width {
            a[pivot][col] /= diag;
        }
        for row in 0..width {
            if row == pivot {
                continue;
            }
            let factor = a[row][pivot];
            if factor == 0.0 {
                continue;
            }
            for col in pivot..=width {
                a[row][col] -= factor * a[pivot][col];
            }
        }
    }

    Ok(a.iter().map(|row| row[width]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Float64Array, StringArray};
    use std::sync::Arc;

    use crate::store::dataset::{Column, Dataset};

    fn linear_dataset() -> Dataset {
        // y = 2x + 1, exactly
        let x = Column::new(
            "x",
            Arc::new(Float64Array::from(vec![
                Some(1.0),
                Some(2.0),
                Some(3.0),
                Some(4.0),
            ])) as ArrayRef,
        );
        let y = Column::new(
            "y",
            Arc::new(Float64Array::from(vec![
                Some(3.0),
                Some(5.0),
                Some(7.0),
                Some(9.0),
            ])) as ArrayRef,
        );
        Dataset::new("d", "t.csv", vec![x, y])
    }

    #[test]
    fn recovers_exact_linear_relationship() {
        let ds = linear_dataset();
        let model = LinearPredictor::fit(&ds, "y").unwrap();
        let pairs = model.batch_predict(&ds).unwrap();
        for (actual, predicted) in pairs {
            assert!((actual - predicted).abs() < 1e-3);
        }
    }

    #[test]
    fn single_predict_interpolates() {
        let ds = linear_dataset();
        let model = LinearPredictor::fit(&ds, "y").unwrap();
        let estimate = model
            .single_predict(&[("x".to_string(), serde_json::json!(2.5))])
            .unwrap();
        assert!((estimate - 6.0).abs() < 1e-3);
    }

    #[test]
    fn missing_feature_still_predicts() {
        let ds = linear_dataset();
        let model = LinearPredictor::fit(&ds, "y").unwrap();
        let estimate = model.single_predict(&[]).unwrap();
        assert!(estimate.is_finite());
    }

    #[test]
    fn categorical_features_are_label_encoded() {
        let region = Column::new(
            "region",
            Arc::new(StringArray::from(vec![
                Some("east"),
                Some("west"),
                Some("east"),
                Some("west"),
            ])) as ArrayRef,
        );
        let y = Column::new(
            "y",
            Arc::new(Float64Array::from(vec![
                Some(10.0),
                Some(20.0),
                Some(10.0),
                Some(20.0),
            ])) as ArrayRef,
        );
        let ds = Dataset::new("d", "t.csv", vec![region, y]);
        let model = LinearPredictor::fit(&ds, "y").unwrap();
        let east = model
            .single_predict(&[("region".to_string(), serde_json::json!("east"))])
            .unwrap();
        let west = model
            .single_predict(&[("region".to_string(), serde_json::json!("west"))])
            .unwrap();
        assert!((east - 10.0).abs() < 1e-3);
        assert!((west - 20.0).abs() < 1e-3);
    }

    #[test]
    fn non_numeric_target_is_rejected() {
        let region = Column::new(
            "region",
            Arc::new(StringArray::from(vec![Some("east"), Some("west")])) as ArrayRef,
        );
        let y = Column::new(
            "y",
            Arc::new(Float64Array::from(vec![Some(1.0), Some(2.0)])) as ArrayRef,
        );
        let ds = Dataset::new("d", "t.csv", vec![region, y]);
        assert!(LinearPredictor::fit(&ds, "region").is_err());
    }
}
