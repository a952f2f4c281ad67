//! 最小二乗回帰とリッジ回帰（正規方程式による閉形式解）。
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use super::{FittedRegressor, RegressionError, Regressor, check_shapes};

/// Coefficients and intercept of a fitted linear model.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    pub coefficients: Array1<f64>,
    pub intercept: f64,
}

impl FittedRegressor for LinearModel {
    fn predict(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        x.dot(&self.coefficients) + self.intercept
    }
}

/// Ordinary least squares with an intercept.
///
/// Exactly collinear features get a zero coefficient; the fit stays a least-squares solution.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LinearRegression;

impl LinearRegression {
    /// # Errors
    /// Returns [`RegressionError::Shape`] for empty or misaligned inputs.
    pub fn fit_model(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<LinearModel, RegressionError> {
        fit_penalized(x, y, 0.0)
    }
}

impl Regressor for LinearRegression {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn fit(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<Box<dyn FittedRegressor>, RegressionError> {
        Ok(Box::new(self.fit_model(x, y)?))
    }
}

/// L2-penalized least squares; the intercept is not penalized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ridge {
    pub alpha: f64,
}

impl Default for Ridge {
    fn default() -> Self {
        Self { alpha: 1.0 }
    }
}

impl Ridge {
    #[must_use]
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }

    /// # Errors
    /// Returns [`RegressionError::InvalidParameter`] for a negative or non-finite alpha,
    /// or [`RegressionError::Shape`] for empty or misaligned inputs.
    pub fn fit_model(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<LinearModel, RegressionError> {
        if !self.alpha.is_finite() || self.alpha < 0.0 {
            return Err(RegressionError::InvalidParameter {
                name: "alpha",
                reason: format!("{} is not a finite non-negative number", self.alpha),
            });
        }
        fit_penalized(x, y, self.alpha)
    }
}

impl Regressor for Ridge {
    fn name(&self) -> &'static str {
        "ridge"
    }

    fn fit(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<Box<dyn FittedRegressor>, RegressionError> {
        Ok(Box::new(self.fit_model(x, y)?))
    }
}

/// Solves `(XcᵀXc + αI) β = Xcᵀyc` on centred data, then recovers the intercept.
fn fit_penalized(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    alpha: f64,
) -> Result<LinearModel, RegressionError> {
    check_shapes(x, y)?;
    let x_mean = x
        .mean_axis(Axis(0))
        .ok_or_else(|| RegressionError::Shape("no training rows".to_string()))?;
    let y_mean = y.mean().unwrap_or_default();

    let centred_x = &x - &x_mean;
    let centred_y = &y - y_mean;
    let mut gram = centred_x.t().dot(&centred_x);
    for i in 0..gram.nrows() {
        gram[[i, i]] += alpha;
    }
    let rhs = centred_x.t().dot(&centred_y);

    let coefficients = solve_symmetric(gram, rhs);
    let intercept = y_mean - x_mean.dot(&coefficients);
    Ok(LinearModel {
        coefficients,
        intercept,
    })
}

/// Gauss-Jordan elimination with partial pivoting. Columns whose pivot vanishes
/// are treated as free and fixed at zero.
fn solve_symmetric(mut a: Array2<f64>, mut b: Array1<f64>) -> Array1<f64> {
    let n = a.nrows();
    let scale = a.diag().iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let tolerance = scale.max(1.0) * 1e-10;
    let mut solution = Array1::zeros(n);
    let mut pivot_columns = Vec::with_capacity(n);
    let mut rank = 0;

    for col in 0..n {
        let Some(pivot_row) =
            (rank..n).max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))
        else {
            break;
        };
        if a[[pivot_row, col]].abs() <= tolerance {
            continue;
        }
        if pivot_row != rank {
            for k in 0..n {
                a.swap([pivot_row, k], [rank, k]);
            }
            b.swap(pivot_row, rank);
        }

        let pivot = a[[rank, col]];
        for k in 0..n {
            a[[rank, k]] /= pivot;
        }
        b[rank] /= pivot;

        for row in 0..n {
            if row == rank {
                continue;
            }
            let factor = a[[row, col]];
            if factor == 0.0 {
                continue;
            }
            for k in 0..n {
                a[[row, k]] -= factor * a[[rank, k]];
            }
            b[row] -= factor * b[rank];
        }

        pivot_columns.push(col);
        rank += 1;
    }

    for (row, &col) in pivot_columns.iter().enumerate() {
        solution[col] = b[row];
    }
    solution
}
