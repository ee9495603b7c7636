//! UMAP: Uniform Manifold Approximation and Projection
//!
//! Manifold reducer for vectorized text (McInnes et al., 2018):
//! - Parallel brute-force KNN graph via rayon
//! - Fuzzy simplicial set with binary-search sigma
//! - Seeded SGD layout with negative sampling, in `n_components` dimensions
//!
//! New points are embedded as the membership-weighted mean of their nearest
//! training points' embeddings.

use crate::error::{ResaleError, Result};
use crate::utils::linalg::squared_distance;
use ndarray::{Array2, ArrayView1};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

/// UMAP parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UmapConfig {
    /// Number of nearest neighbors (local vs global structure)
    pub n_neighbors: usize,
    /// Minimum distance between points in the embedding
    pub min_dist: f64,
    pub n_components: usize,
    pub n_epochs: usize,
    pub learning_rate: f64,
    /// Negative samples per positive edge
    pub negative_sample_rate: usize,
    pub spread: f64,
    pub random_state: u64,
}

impl Default for UmapConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 15,
            min_dist: 0.1,
            n_components: 2,
            n_epochs: 200,
            learning_rate: 1.0,
            negative_sample_rate: 5,
            spread: 1.0,
            random_state: 42,
        }
    }
}

/// Max-heap entry by distance, so the farthest neighbor is evicted first
#[derive(Clone)]
struct Neighbor {
    index: usize,
    distance: f64,
}

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
    }
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .partial_cmp(&other.distance)
            .unwrap_or(Ordering::Equal)
            .then(self.index.cmp(&other.index))
    }
}

/// An edge in the fuzzy simplicial set
struct Edge {
    i: usize,
    j: usize,
    weight: f64,
}

/// Fitted UMAP reducer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Umap {
    config: UmapConfig,
    training_data: Option<Array2<f64>>,
    embedding: Option<Array2<f64>>,
}

impl Umap {
    pub fn new(config: UmapConfig) -> Self {
        Self {
            config,
            training_data: None,
            embedding: None,
        }
    }

    pub fn config(&self) -> &UmapConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.embedding.is_some()
    }

    pub fn fit(&mut self, data: &Array2<f64>) -> Result<()> {
        self.fit_transform(data).map(|_| ())
    }

    /// Fit on `data` and return its n_samples x n_components embedding
    pub fn fit_transform(&mut self, data: &Array2<f64>) -> Result<Array2<f64>> {
        let n = data.nrows();
        if n < 3 {
            return Err(ResaleError::DataError(
                "UMAP requires at least 3 samples".to_string(),
            ));
        }
        if self.config.n_components == 0 {
            return Err(ResaleError::InvalidParameter {
                name: "n_components".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let k = self.config.n_neighbors.clamp(1, n - 1);

        let (knn_indices, knn_distances) = compute_knn(data, k);
        let edges = self.compute_fuzzy_set(&knn_indices, &knn_distances, k);
        let embedding = self.optimize_layout(n, &edges);

        self.training_data = Some(data.clone());
        self.embedding = Some(embedding.clone());
        Ok(embedding)
    }

    /// Embed new points from the fitted training neighbourhood
    pub fn transform(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        let (train, embedding) = match (&self.training_data, &self.embedding) {
            (Some(t), Some(e)) => (t, e),
            _ => return Err(ResaleError::ModelNotFitted),
        };
        if data.ncols() != train.ncols() {
            return Err(ResaleError::ShapeError {
                expected: format!("{} features", train.ncols()),
                actual: format!("{} features", data.ncols()),
            });
        }

        let k = self.config.n_neighbors.clamp(1, train.nrows());
        let target = (k as f64).log2();
        let dim = embedding.ncols();

        let rows: Vec<Vec<f64>> = (0..data.nrows())
            .into_par_iter()
            .map(|i| {
                let neighbors = nearest(train, data.row(i), k, None);
                let dists: Vec<f64> = neighbors.iter().map(|nb| nb.distance).collect();
                let (rho, sigma) = smooth_knn(&dists, target);

                let mut point = vec![0.0; dim];
                let mut total = 0.0;
                for nb in &neighbors {
                    let w = (-(nb.distance - rho).max(0.0) / sigma.max(1e-12)).exp();
                    for (c, p) in point.iter_mut().enumerate() {
                        *p += w * embedding[[nb.index, c]];
                    }
                    total += w;
                }
                if total > 0.0 {
                    point.iter_mut().for_each(|p| *p /= total);
                }
                point
            })
            .collect();

        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        Ok(Array2::from_shape_vec((data.nrows(), dim), flat)?)
    }

    /// Fuzzy simplicial set: per-point rho and sigma, then probabilistic
    /// union of the directed memberships
    fn compute_fuzzy_set(
        &self,
        knn_indices: &[Vec<usize>],
        knn_distances: &[Vec<f64>],
        k: usize,
    ) -> Vec<Edge> {
        let n = knn_indices.len();
        let target = (k as f64).log2();

        let params: Vec<(f64, f64)> = (0..n)
            .into_par_iter()
            .map(|i| smooth_knn(&knn_distances[i], target))
            .collect();

        let mut directed: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for i in 0..n {
            let (rho, sigma) = params[i];
            for (idx, (&j, &d)) in knn_indices[i].iter().zip(knn_distances[i].iter()).enumerate() {
                let w = if idx == 0 {
                    1.0
                } else {
                    (-(d - rho).max(0.0) / sigma.max(1e-12)).exp()
                };
                directed.insert((i, j), w);
            }
        }

        // w_sym(i,j) = w(i,j) + w(j,i) - w(i,j) * w(j,i)
        let mut symmetric: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for (&(i, j), &w_ij) in &directed {
            let key = if i < j { (i, j) } else { (j, i) };
            let w_ji = directed.get(&(j, i)).copied().unwrap_or(0.0);
            let w_sym = w_ij + w_ji - w_ij * w_ji;
            symmetric
                .entry(key)
                .and_modify(|w| *w = w.max(w_sym))
                .or_insert(w_sym);
        }

        symmetric
            .into_iter()
            .filter(|(_, w)| *w > 1e-8)
            .map(|((i, j), weight)| Edge { i, j, weight })
            .collect()
    }

    /// SGD layout optimisation with negative sampling
    fn optimize_layout(&self, n_samples: usize, edges: &[Edge]) -> Array2<f64> {
        let dim = self.config.n_components;
        let (a, b) = find_ab_params(self.config.spread, self.config.min_dist);

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_state);
        let mut embedding =
            Array2::from_shape_fn((n_samples, dim), |_| rng.gen_range(-10.0..10.0) * 0.01);

        let n_epochs = self.config.n_epochs;
        let neg_rate = self.config.negative_sample_rate;
        let max_weight = edges.iter().map(|e| e.weight).fold(0.0_f64, f64::max);
        let mut dy = vec![0.0; dim];

        for epoch in 0..n_epochs {
            let alpha = self.config.learning_rate * (1.0 - epoch as f64 / n_epochs as f64);
            if alpha < 1e-8 {
                break;
            }

            for edge in edges {
                // Heavier edges are sampled more often
                let epochs_per_sample = if edge.weight > 0.0 {
                    max_weight / edge.weight
                } else {
                    f64::INFINITY
                };
                if epoch as f64 % epochs_per_sample.max(1.0) >= 1.0 {
                    continue;
                }

                let (i, j) = (edge.i, edge.j);

                // Attraction
                let mut dist_sq: f64 = 1e-8;
                for c in 0..dim {
                    dy[c] = embedding[[i, c]] - embedding[[j, c]];
                    dist_sq += dy[c] * dy[c];
                }
                let grad_coeff =
                    -2.0 * a * b * dist_sq.powf(b - 1.0) / (1.0 + a * dist_sq.powf(b));
                for c in 0..dim {
                    let g = alpha * grad_coeff * dy[c];
                    embedding[[i, c]] += g;
                    embedding[[j, c]] -= g;
                }

                // Repulsion
                for _ in 0..neg_rate {
                    let k = rng.gen_range(0..n_samples);
                    if k == i {
                        continue;
                    }
                    let mut dist_sq_neg: f64 = 1e-8;
                    for c in 0..dim {
                        dy[c] = embedding[[i, c]] - embedding[[k, c]];
                        dist_sq_neg += dy[c] * dy[c];
                    }
                    let grad_coeff_neg =
                        2.0 * b / ((0.001 + dist_sq_neg) * (1.0 + a * dist_sq_neg.powf(b)));
                    for c in 0..dim {
                        embedding[[i, c]] += alpha * grad_coeff_neg * dy[c];
                    }
                }

                for c in 0..dim {
                    embedding[[i, c]] = embedding[[i, c]].clamp(-10.0, 10.0);
                    embedding[[j, c]] = embedding[[j, c]].clamp(-10.0, 10.0);
                }
            }
        }

        embedding
    }
}

/// The `k` nearest rows of `data` to `query`, closest first
fn nearest(
    data: &Array2<f64>,
    query: ArrayView1<f64>,
    k: usize,
    exclude: Option<usize>,
) -> Vec<Neighbor> {
    let mut heap: BinaryHeap<Neighbor> = BinaryHeap::with_capacity(k + 1);
    for (j, row) in data.rows().into_iter().enumerate() {
        if Some(j) == exclude {
            continue;
        }
        let distance = squared_distance(query, row).sqrt();
        if heap.len() < k {
            heap.push(Neighbor { index: j, distance });
        } else if let Some(top) = heap.peek() {
            if distance < top.distance {
                heap.pop();
                heap.push(Neighbor { index: j, distance });
            }
        }
    }
    heap.into_sorted_vec()
}

/// Brute-force KNN, parallel over samples
fn compute_knn(data: &Array2<f64>, k: usize) -> (Vec<Vec<usize>>, Vec<Vec<f64>>) {
    (0..data.nrows())
        .into_par_iter()
        .map(|i| {
            let neighbors = nearest(data, data.row(i), k, Some(i));
            (
                neighbors.iter().map(|nb| nb.index).collect::<Vec<_>>(),
                neighbors.iter().map(|nb| nb.distance).collect::<Vec<_>>(),
            )
        })
        .unzip()
}

/// rho = nearest distance; sigma by binary search so that
/// Σ exp(-(d - rho)/sigma) = log2(k)
fn smooth_knn(dists: &[f64], target: f64) -> (f64, f64) {
    let rho = dists.first().map(|d| d.max(1e-12)).unwrap_or(0.0);

    let mut lo = 1e-8_f64;
    let mut hi = 1000.0_f64;
    let mut sigma: f64 = 1.0;
    for _ in 0..64 {
        sigma = (lo + hi) / 2.0;
        let sum: f64 = dists
            .iter()
            .map(|&d| (-(d - rho).max(0.0) / sigma).exp())
            .sum();
        if (sum - target).abs() < 1e-5 {
            break;
        }
        if sum > target {
            hi = sigma;
        } else {
            lo = sigma;
        }
    }
    (rho, sigma)
}

/// Curve parameters for 1 / (1 + a·d^(2b)) approximating a smooth step at
/// `min_dist`
fn find_ab_params(spread: f64, min_dist: f64) -> (f64, f64) {
    let mut b: f64 = 1.0;
    let a;

    if (spread - 1.0).abs() < 1e-6 {
        a = if min_dist > 0.0 {
            (2.0_f64.powf(2.0 * b) - 1.0) / min_dist.powf(2.0 * b)
        } else {
            1.0
        };
    } else {
        let mut lo = 0.1_f64;
        let mut hi = 5.0_f64;
        for _ in 0..64 {
            b = (lo + hi) / 2.0;
            let a_try = (2.0_f64.powf(2.0 * b) - 1.0) / spread.powf(2.0 * b);
            let val = 1.0 / (1.0 + a_try * min_dist.powf(2.0 * b));
            if val > 0.99 {
                hi = b;
            } else {
                lo = b;
            }
        }
        a = (2.0_f64.powf(2.0 * b) - 1.0) / spread.powf(2.0 * b);
    }

    (a.max(1e-8), b.max(0.1))
}
