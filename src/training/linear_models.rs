//! Linear regressors: OLS, ridge, lasso, elastic net and Huber

use crate::error::{ResaleError, Result};
use crate::utils::linalg::solve_symmetric;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Check shapes and reject empty input
fn check_xy(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(ResaleError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(ResaleError::InvalidInput("cannot fit on zero samples".to_string()));
    }
    Ok(())
}

/// Centered copies of X and y with their means (zero means without intercept)
fn center(
    x: &Array2<f64>,
    y: &Array1<f64>,
    fit_intercept: bool,
) -> (Array2<f64>, Array1<f64>, Array1<f64>, f64) {
    if !fit_intercept {
        return (x.clone(), y.clone(), Array1::zeros(x.ncols()), 0.0);
    }
    let x_mean = x
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(x.ncols()));
    let y_mean = y.mean().unwrap_or(0.0);
    (x - &x_mean, y - y_mean, x_mean, y_mean)
}

/// Solve (XᵀX + αI) w = Xᵀy
fn solve_normal_equations(x: &Array2<f64>, y: &Array1<f64>, alpha: f64) -> Result<Array1<f64>> {
    let mut xtx = x.t().dot(x);
    for i in 0..xtx.nrows() {
        xtx[[i, i]] += alpha;
    }
    let xty = x.t().dot(y);
    solve_symmetric(&xtx, &xty).ok_or_else(|| {
        ResaleError::ComputationError("normal equations are singular".to_string())
    })
}

fn soft_threshold(val: f64, threshold: f64) -> f64 {
    if val > threshold {
        val - threshold
    } else if val < -threshold {
        val + threshold
    } else {
        0.0
    }
}

/// Fitted weights shared by every linear model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearCoefficients {
    pub coefficients: Array1<f64>,
    pub intercept: f64,
}

impl LinearCoefficients {
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.coefficients.len() {
            return Err(ResaleError::ShapeError {
                expected: format!("{} features", self.coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.dot(&self.coefficients) + self.intercept)
    }
}

/// Ordinary least squares
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    pub fit_intercept: bool,
    fitted: Option<LinearCoefficients>,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    pub fn new() -> Self {
        Self {
            fit_intercept: true,
            fitted: None,
        }
    }

    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_xy(x, y)?;
        let (x_c, y_c, x_mean, y_mean) = center(x, y, self.fit_intercept);
        let coefficients = solve_normal_equations(&x_c, &y_c, 0.0)?;
        let intercept = y_mean - coefficients.dot(&x_mean);
        self.fitted = Some(LinearCoefficients { coefficients, intercept });
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fitted.as_ref().ok_or(ResaleError::ModelNotFitted)?.predict(x)
    }

    pub fn coefficients(&self) -> Option<&LinearCoefficients> {
        self.fitted.as_ref()
    }
}

/// L2-penalised least squares
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgeRegression {
    pub alpha: f64,
    pub fit_intercept: bool,
    fitted: Option<LinearCoefficients>,
}

impl Default for RidgeRegression {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl RidgeRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            fit_intercept: true,
            fitted: None,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_xy(x, y)?;
        let (x_c, y_c, x_mean, y_mean) = center(x, y, self.fit_intercept);
        let coefficients = solve_normal_equations(&x_c, &y_c, self.alpha)?;
        let intercept = y_mean - coefficients.dot(&x_mean);
        self.fitted = Some(LinearCoefficients { coefficients, intercept });
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fitted.as_ref().ok_or(ResaleError::ModelNotFitted)?.predict(x)
    }
}

/// Elastic net by cyclic coordinate descent on
/// `1/(2n)·||y − Xw||² + α·l1·||w||₁ + α·(1 − l1)/2·||w||²`.
/// `l1_ratio = 1` is the lasso.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticNetRegression {
    pub alpha: f64,
    /// 0.0 = pure L2, 1.0 = pure L1
    pub l1_ratio: f64,
    pub max_iter: usize,
    pub tol: f64,
    pub fit_intercept: bool,
    fitted: Option<LinearCoefficients>,
    n_iter: usize,
}

impl Default for ElasticNetRegression {
    fn default() -> Self {
        Self::new(1.0, 0.5)
    }
}

impl ElasticNetRegression {
    pub fn new(alpha: f64, l1_ratio: f64) -> Self {
        Self {
            alpha,
            l1_ratio: l1_ratio.clamp(0.0, 1.0),
            max_iter: 20_000,
            tol: 1e-4,
            fit_intercept: true,
            fitted: None,
            n_iter: 0,
        }
    }

    pub fn lasso(alpha: f64) -> Self {
        Self::new(alpha, 1.0)
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Sweeps used by the last fit
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_xy(x, y)?;
        let (n_samples, n_features) = x.dim();
        let (x_c, y_c, x_mean, y_mean) = center(x, y, self.fit_intercept);

        let col_norms: Vec<f64> = x_c.columns().into_iter().map(|c| c.dot(&c)).collect();
        let n = n_samples as f64;
        let l1_penalty = self.alpha * self.l1_ratio * n;
        let l2_penalty = self.alpha * (1.0 - self.l1_ratio) * n;

        let mut w = Array1::<f64>::zeros(n_features);
        let mut r = y_c.clone();
        self.n_iter = 0;

        for _ in 0..self.max_iter {
            self.n_iter += 1;
            let mut max_change = 0.0f64;
            let mut max_weight = 0.0f64;

            for j in 0..n_features {
                let denom = col_norms[j] + l2_penalty;
                if denom < 1e-15 {
                    continue;
                }
                let col = x_c.column(j);
                let old = w[j];
                let rho = col.dot(&r) + col_norms[j] * old;
                let new = soft_threshold(rho, l1_penalty) / denom;
                if new != old {
                    r.scaled_add(old - new, &col);
                    w[j] = new;
                }
                max_change = max_change.max((new - old).abs());
                max_weight = max_weight.max(new.abs());
            }

            if max_weight == 0.0 || max_change / max_weight < self.tol {
                break;
            }
        }

        let intercept = y_mean - w.dot(&x_mean);
        self.fitted = Some(LinearCoefficients { coefficients: w, intercept });
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fitted.as_ref().ok_or(ResaleError::ModelNotFitted)?.predict(x)
    }

    pub fn coefficients(&self) -> Option<&LinearCoefficients> {
        self.fitted.as_ref()
    }
}

/// Huber-loss regression by iteratively reweighted least squares.
///
/// Residuals beyond `epsilon` robust scales (MAD / 0.6745) are down-weighted
/// by `epsilon / |r/σ|`; `alpha` is an L2 penalty on the weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HuberRegressor {
    pub epsilon: f64,
    pub alpha: f64,
    pub max_iter: usize,
    pub tol: f64,
    fitted: Option<LinearCoefficients>,
    scale: f64,
}

impl Default for HuberRegressor {
    fn default() -> Self {
        Self::new(1.35, 1e-4)
    }
}

impl HuberRegressor {
    pub fn new(epsilon: f64, alpha: f64) -> Self {
        Self {
            epsilon,
            alpha,
            max_iter: 20_000,
            tol: 1e-5,
            fitted: None,
            scale: 1.0,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_xy(x, y)?;
        if self.epsilon < 1.0 {
            return Err(ResaleError::InvalidParameter {
                name: "epsilon".to_string(),
                value: self.epsilon.to_string(),
                reason: "must be >= 1.0".to_string(),
            });
        }
        let (n_samples, n_features) = x.dim();

        // Design matrix with a trailing intercept column; the intercept is not penalised
        let mut design = Array2::ones((n_samples, n_features + 1));
        design.slice_mut(ndarray::s![.., ..n_features]).assign(x);

        let mut weights = Array1::<f64>::ones(n_samples);
        let mut beta = Array1::<f64>::zeros(n_features + 1);

        for _ in 0..self.max_iter.max(1) {
            let wx = &design * &weights.view().insert_axis(Axis(1));
            let mut xtwx = design.t().dot(&wx);
            for i in 0..n_features {
                xtwx[[i, i]] += self.alpha;
            }
            let xtwy = wx.t().dot(y);
            let next = solve_symmetric(&xtwx, &xtwy).ok_or_else(|| {
                ResaleError::ComputationError("weighted normal equations are singular".to_string())
            })?;

            let residuals = y - &design.dot(&next);
            let mut abs_res: Vec<f64> = residuals.iter().map(|r| r.abs()).collect();
            abs_res.sort_by(|a, b| a.total_cmp(b));
            let mad = abs_res[abs_res.len() / 2];
            self.scale = (mad / 0.6745).max(1e-12);

            for (w, r) in weights.iter_mut().zip(residuals.iter()) {
                let z = (r / self.scale).abs();
                *w = if z <= self.epsilon { 1.0 } else { self.epsilon / z };
            }

            let change = (&next - &beta).mapv(f64::abs).sum();
            beta = next;
            if change < self.tol {
                break;
            }
        }

        self.fitted = Some(LinearCoefficients {
            coefficients: beta.slice(ndarray::s![..n_features]).to_owned(),
            intercept: beta[n_features],
        });
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fitted.as_ref().ok_or(ResaleError::ModelNotFitted)?.predict(x)
    }

    pub fn coefficients(&self) -> Option<&LinearCoefficients> {
        self.fitted.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn line() -> (Array2<f64>, Array1<f64>) {
        // y = 2x + 1
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![3.0, 5.0, 7.0, 9.0, 11.0, 13.0];
        (x, y)
    }

    #[test]
    fn test_ols_recovers_line() {
        let (x, y) = line();
        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();
        let c = model.coefficients().unwrap();
        assert!((c.coefficients[0] - 2.0).abs() < 1e-8);
        assert!((c.intercept - 1.0).abs() < 1e-8);
    }

    #[test]
    fn test_ridge_shrinks() {
        let (x, y) = line();
        let mut ols = LinearRegression::new();
        ols.fit(&x, &y).unwrap();
        let mut ridge = RidgeRegression::new(10.0);
        ridge.fit(&x, &y).unwrap();

        let x_new = array![[10.0]];
        assert!(ridge.predict(&x_new).unwrap()[0] < ols.predict(&x_new).unwrap()[0]);
    }

    #[test]
    fn test_lasso_zeroes_noise_feature() {
        let x = array![
            [1.0, 0.3],
            [2.0, -0.1],
            [3.0, 0.2],
            [4.0, -0.3],
            [5.0, 0.1],
            [6.0, -0.2],
        ];
        let y = array![2.0, 4.0, 6.0, 8.0, 10.0, 12.0];
        let mut lasso = ElasticNetRegression::lasso(0.1);
        lasso.fit(&x, &y).unwrap();
        let c = lasso.coefficients().unwrap();
        assert!(c.coefficients[0] > 1.5);
        assert_eq!(c.coefficients[1], 0.0);
    }

    #[test]
    fn test_large_alpha_predicts_mean() {
        let (x, y) = line();
        let mut enet = ElasticNetRegression::new(1e6, 0.5);
        enet.fit(&x, &y).unwrap();
        let p = enet.predict(&x).unwrap();
        assert!(p.iter().all(|v| (v - 8.0).abs() < 1e-6));
    }

    #[test]
    fn test_huber_resists_outlier() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0]];
        let mut y = x.column(0).mapv(|v| 2.0 * v + 1.0);
        y[7] = 100.0;

        let mut huber = HuberRegressor::default();
        huber.fit(&x, &y).unwrap();
        let mut ols = LinearRegression::new();
        ols.fit(&x, &y).unwrap();

        let slope_huber = huber.coefficients().unwrap().coefficients[0];
        let slope_ols = ols.coefficients().unwrap().coefficients[0];
        assert!((slope_huber - 2.0).abs() < (slope_ols - 2.0).abs());
    }

    #[test]
    fn test_not_fitted_and_shape() {
        let model = RidgeRegression::default();
        assert!(matches!(model.predict(&array![[1.0]]), Err(ResaleError::ModelNotFitted)));

        let mut model = LinearRegression::new();
        assert!(model.fit(&array![[1.0], [2.0]], &array![1.0]).is_err());
    }
}
