//! PCA: Principal Component Analysis
//!
//! Linear dimensionality reduction for vectorized text. Finds the top-k
//! eigenvectors of the covariance matrix by seeded power iteration with
//! deflation. When there are fewer samples than features the n×n Gram matrix
//! is decomposed instead and its eigenvectors are mapped back to feature space.

use crate::error::{ResaleError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

const MAX_ITER: usize = 300;
const TOL: f64 = 1e-10;

/// Fitted PCA projection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pca {
    n_components: usize,
    random_state: u64,
    mean: Option<Array1<f64>>,
    /// n_components x n_features
    components: Option<Array2<f64>>,
    explained_variance: Vec<f64>,
    total_variance: f64,
}

impl Pca {
    pub fn new(n_components: usize, random_state: u64) -> Self {
        Self {
            n_components,
            random_state,
            mean: None,
            components: None,
            explained_variance: Vec::new(),
            total_variance: 0.0,
        }
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    pub fn is_fitted(&self) -> bool {
        self.components.is_some()
    }

    pub fn explained_variance_ratio(&self) -> Vec<f64> {
        let total = self.total_variance.max(1e-12);
        self.explained_variance.iter().map(|ev| (ev / total).max(0.0)).collect()
    }

    pub fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        let (n, d) = x.dim();
        if self.n_components == 0 || self.n_components > n.min(d) {
            return Err(ResaleError::InvalidParameter {
                name: "n_components".to_string(),
                value: self.n_components.to_string(),
                reason: format!("must be between 1 and min(n_samples, n_features) = {}", n.min(d)),
            });
        }

        let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(d));
        let centered = x - &mean;
        let denom = (n as f64 - 1.0).max(1.0);

        let (eigenvalues, components) = if d <= n {
            let cov = centered.t().dot(&centered) / denom;
            self.total_variance = cov.diag().sum();
            power_iteration(&cov, self.n_components, self.random_state)
        } else {
            let gram = centered.dot(&centered.t()) / denom;
            self.total_variance = gram.diag().sum();
            let (values, vectors) = power_iteration(&gram, self.n_components, self.random_state);
            // v = Xcᵀ u / ||Xcᵀ u||
            let mut mapped = vectors.dot(&centered);
            for mut row in mapped.rows_mut() {
                let norm = row.dot(&row).sqrt();
                if norm > 1e-12 {
                    row /= norm;
                }
            }
            (values, mapped)
        };

        let mut components = components;
        for mut row in components.rows_mut() {
            // Largest-magnitude loading is positive
            let pivot = row
                .iter()
                .copied()
                .fold(0.0f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
            if pivot < 0.0 {
                row.mapv_inplace(|v| -v);
            }
        }

        self.mean = Some(mean);
        self.components = Some(components);
        self.explained_variance = eigenvalues;
        Ok(())
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (mean, components) = match (&self.mean, &self.components) {
            (Some(m), Some(c)) => (m, c),
            _ => return Err(ResaleError::ModelNotFitted),
        };
        if x.ncols() != mean.len() {
            return Err(ResaleError::ShapeError {
                expected: format!("{} features", mean.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok((x - mean).dot(&components.t()))
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }
}

/// Top-k eigenpairs of a symmetric PSD matrix. Rows of the returned matrix
/// are the eigenvectors.
fn power_iteration(matrix: &Array2<f64>, k: usize, seed: u64) -> (Vec<f64>, Array2<f64>) {
    let d = matrix.nrows();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut work = matrix.clone();
    let mut eigenvalues = Vec::with_capacity(k);
    let mut vectors = Array2::zeros((k, d));

    for c in 0..k {
        let mut v: Array1<f64> = (0..d).map(|_| rng.gen_range(-1.0..1.0)).collect();
        orthogonalize(&mut v, &vectors, c);
        let norm = v.dot(&v).sqrt().max(1e-12);
        v /= norm;

        let mut eigenvalue = 0.0;
        for _ in 0..MAX_ITER {
            let mut w = work.dot(&v);
            orthogonalize(&mut w, &vectors, c);
            eigenvalue = v.dot(&w);

            let w_norm = w.dot(&w).sqrt();
            if w_norm < 1e-12 {
                break;
            }
            w /= w_norm;

            let diff = (&w - &v).mapv(|x| x * x).sum().sqrt();
            v = w;
            if diff < TOL {
                break;
            }
        }

        let eigenvalue = eigenvalue.max(0.0);
        // Deflate: A -= λ v vᵀ
        for i in 0..d {
            for j in 0..d {
                work[[i, j]] -= eigenvalue * v[i] * v[j];
            }
        }
        eigenvalues.push(eigenvalue);
        vectors.row_mut(c).assign(&v);
    }

    (eigenvalues, vectors)
}

/// Remove the projection of `v` onto the first `k` rows of `basis`
fn orthogonalize(v: &mut Array1<f64>, basis: &Array2<f64>, k: usize) {
    for row in basis.rows().into_iter().take(k) {
        let proj = row.dot(v);
        v.scaled_add(-proj, &row);
    }
}
