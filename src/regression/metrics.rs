use ndarray::ArrayView1;
use serde::Serialize;

/// Test-set error metrics of one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Scores {
    pub mse: f64,
    pub mae: f64,
    pub r2: f64,
}

impl Scores {
    #[must_use]
    pub fn compute(truth: ArrayView1<'_, f64>, predicted: ArrayView1<'_, f64>) -> Self {
        Self {
            mse: mean_squared_error(truth, predicted),
            mae: mean_absolute_error(truth, predicted),
            r2: r2_score(truth, predicted),
        }
    }
}

#[must_use]
pub fn mean_squared_error(truth: ArrayView1<'_, f64>, predicted: ArrayView1<'_, f64>) -> f64 {
    mean_of(truth, predicted, |d| d * d)
}

#[must_use]
pub fn mean_absolute_error(truth: ArrayView1<'_, f64>, predicted: ArrayView1<'_, f64>) -> f64 {
    mean_of(truth, predicted, f64::abs)
}

/// `1 - SS_res / SS_tot`. A constant target scores 1.0 when predicted exactly and 0.0 otherwise.
#[must_use]
pub fn r2_score(truth: ArrayView1<'_, f64>, predicted: ArrayView1<'_, f64>) -> f64 {
    let Some(mean) = truth.mean() else {
        return 0.0;
    };
    let ss_res: f64 = truth
        .iter()
        .zip(predicted.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = truth.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

fn mean_of(
    truth: ArrayView1<'_, f64>,
    predicted: ArrayView1<'_, f64>,
    f: impl Fn(f64) -> f64,
) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let total: f64 = truth
        .iter()
        .zip(predicted.iter())
        .map(|(t, p)| f(t - p))
        .sum();
    total / truth.len() as f64
}
