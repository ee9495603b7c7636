//! CatBoost-style boosting with symmetric (oblivious) trees
//!
//! Every level of a tree shares one (feature, threshold) split, so a tree is
//! a list of splits plus 2^depth leaf values. Leaves are Newton steps
//! `-G / (H + l2_leaf_reg)` on the squared-loss gradients.

use crate::error::{ResaleError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Candidate thresholds examined per feature
const MAX_BORDERS: usize = 254;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub depth: usize,
    pub l2_leaf_reg: f64,
    pub subsample: f64,
    pub random_state: u64,
}

impl Default for CatBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            depth: 6,
            l2_leaf_reg: 3.0,
            subsample: 1.0,
            random_state: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SymmetricTree {
    /// (feature, threshold) per level
    splits: Vec<(usize, f64)>,
    /// 2^levels leaf values
    leaf_values: Vec<f64>,
}

impl SymmetricTree {
    fn leaf_index(&self, row: ArrayView1<f64>) -> usize {
        self.splits
            .iter()
            .fold(0, |idx, &(feature, threshold)| idx * 2 + usize::from(row[feature] > threshold))
    }

    fn predict(&self, row: ArrayView1<f64>) -> f64 {
        self.leaf_values
            .get(self.leaf_index(row))
            .copied()
            .unwrap_or(0.0)
    }
}

/// Quantile borders of one feature over the sampled rows
fn borders(x: &Array2<f64>, feature: usize, indices: &[usize]) -> Vec<f64> {
    let mut values: Vec<f64> = indices.iter().map(|&i| x[[i, feature]]).collect();
    values.sort_by(|a, b| a.total_cmp(b));
    values.dedup();
    if values.len() < 2 {
        return Vec::new();
    }
    let step = ((values.len() - 1) / MAX_BORDERS).max(1);
    (0..values.len() - 1)
        .step_by(step)
        .map(|i| (values[i] + values[i + 1]) / 2.0)
        .collect()
}

fn build_symmetric_tree(
    x: &Array2<f64>,
    gradients: &[f64],
    indices: &[usize],
    depth: usize,
    l2: f64,
) -> SymmetricTree {
    let mut splits = Vec::with_capacity(depth);
    let mut buckets: Vec<Vec<usize>> = vec![indices.to_vec()];

    // Newton score of a bucket with unit hessians
    let score = |g: f64, h: f64| g * g / (h + l2);

    for _ in 0..depth {
        let best = (0..x.ncols())
            .into_par_iter()
            .filter_map(|feature| {
                let mut best: Option<(f64, f64)> = None;
                for threshold in borders(x, feature, indices) {
                    let mut gain = 0.0;
                    for bucket in &buckets {
                        let (mut lg, mut lh, mut rg, mut rh) = (0.0, 0.0, 0.0, 0.0);
                        for &i in bucket {
                            if x[[i, feature]] <= threshold {
                                lg += gradients[i];
                                lh += 1.0;
                            } else {
                                rg += gradients[i];
                                rh += 1.0;
                            }
                        }
                        gain += score(lg, lh) + score(rg, rh) - score(lg + rg, lh + rh);
                    }
                    if best.map_or(true, |(_, g)| gain > g) {
                        best = Some((threshold, gain));
                    }
                }
                best.filter(|(_, g)| *g > 1e-12).map(|(t, g)| (feature, t, g))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .fold(None, |best: Option<(usize, f64, f64)>, c| match best {
                Some(b) if b.2 >= c.2 => Some(b),
                _ => Some(c),
            });

        let Some((feature, threshold, _)) = best else { break };
        splits.push((feature, threshold));
        buckets = buckets
            .iter()
            .flat_map(|bucket| {
                let (left, right): (Vec<usize>, Vec<usize>) =
                    bucket.iter().partition(|&&i| x[[i, feature]] <= threshold);
                [left, right]
            })
            .collect();
    }

    let leaf_values = buckets
        .iter()
        .map(|bucket| {
            let g: f64 = bucket.iter().map(|&i| gradients[i]).sum();
            -g / (bucket.len() as f64 + l2)
        })
        .collect();

    SymmetricTree { splits, leaf_values }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatBoostRegressor {
    pub config: CatBoostConfig,
    trees: Vec<SymmetricTree>,
    base_prediction: f64,
    n_features: usize,
    is_fitted: bool,
}

impl Default for CatBoostRegressor {
    fn default() -> Self {
        Self::new(CatBoostConfig::default())
    }
}

impl CatBoostRegressor {
    pub fn new(config: CatBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_prediction: 0.0,
            n_features: 0,
            is_fitted: false,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n = x.nrows();
        if n != y.len() {
            return Err(ResaleError::ShapeError {
                expected: format!("y length = {}", n),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n == 0 {
            return Err(ResaleError::InvalidInput("cannot boost on zero samples".to_string()));
        }

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        self.base_prediction = y.mean().unwrap_or(0.0);
        self.n_features = x.ncols();
        self.trees.clear();

        let mut predictions = Array1::from_elem(n, self.base_prediction);
        let n_sub = ((n as f64 * self.config.subsample.clamp(0.0, 1.0)).ceil() as usize).max(1);
        let mut order: Vec<usize> = (0..n).collect();

        for _ in 0..self.config.n_estimators {
            let gradients: Vec<f64> = predictions.iter().zip(y.iter()).map(|(p, t)| p - t).collect();
            let indices: Vec<usize> = if n_sub < n {
                order.shuffle(&mut rng);
                order[..n_sub].to_vec()
            } else {
                (0..n).collect()
            };

            let tree = build_symmetric_tree(x, &gradients, &indices, self.config.depth, self.config.l2_leaf_reg);
            for (i, row) in x.rows().into_iter().enumerate() {
                predictions[i] += self.config.learning_rate * tree.predict(row);
            }
            self.trees.push(tree);
        }

        self.is_fitted = true;
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(ResaleError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(ResaleError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        let lr = self.config.learning_rate;
        Ok(x.rows()
            .into_iter()
            .map(|row| self.base_prediction + self.trees.iter().map(|t| lr * t.predict(row)).sum::<f64>())
            .collect())
    }
}
