//! 表形式データの回帰（エネルギー効率データセットの暖房・冷房負荷予測）。
use std::path::PathBuf;

use ndarray::{Array1, ArrayView1, ArrayView2};
use thiserror::Error;

pub mod dataset;
pub mod forest;
pub mod linear;
pub mod metrics;

pub use dataset::{Dataset, Split, train_test_split};
pub use forest::RandomForest;
pub use linear::{LinearModel, LinearRegression, Ridge};
pub use metrics::Scores;

#[derive(Debug, Error)]
pub enum RegressionError {
    #[error("failed to read dataset at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse JSON on line {line}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("line {line} has no numeric value for column {column}")]
    MissingColumn { line: usize, column: String },
    #[error("dataset has no column named {0}")]
    UnknownColumn(String),
    #[error("shape mismatch: {0}")]
    Shape(String),
    #[error("invalid split: {0}")]
    InvalidSplit(String),
    #[error("invalid value for {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// A trained model. Prediction never mutates the model.
pub trait FittedRegressor: Send + Sync {
    fn predict(&self, x: ArrayView2<'_, f64>) -> Array1<f64>;
}

/// An estimator configuration; `fit` returns a new model instead of mutating `self`.
pub trait Regressor: Send + Sync {
    fn name(&self) -> &'static str;

    /// # Errors
    /// Returns [`RegressionError`] when the inputs are empty or inconsistently shaped,
    /// or when the estimator parameters are invalid.
    fn fit(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<Box<dyn FittedRegressor>, RegressionError>;
}

pub(crate) fn check_shapes(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
) -> Result<(), RegressionError> {
    if x.nrows() == 0 {
        return Err(RegressionError::Shape("no training rows".to_string()));
    }
    if x.nrows() != y.len() {
        return Err(RegressionError::Shape(format!(
            "{} feature rows but {} labels",
            x.nrows(),
            y.len()
        )));
    }
    Ok(())
}
