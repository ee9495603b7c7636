//! Gradient-boosted regression trees (squared loss)
//!
//! Starts from the target mean and fits each tree to the current residuals,
//! adding its predictions with shrinkage.

use super::decision_tree::{DecisionTree, TreeParams};
use crate::error::{ResaleError, Result};
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientBoostingConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Row fraction per round, without replacement
    pub subsample: f64,
    pub random_state: u64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    pub config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    initial_prediction: f64,
    train_loss: Vec<f64>,
    is_fitted: bool,
}

impl Default for GradientBoostingRegressor {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}

impl GradientBoostingRegressor {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_prediction: 0.0,
            train_loss: Vec::new(),
            is_fitted: false,
        }
    }

    /// Training MSE after each round
    pub fn train_loss(&self) -> &[f64] {
        &self.train_loss
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(ResaleError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(ResaleError::InvalidInput("cannot boost on zero samples".to_string()));
        }
        if !(self.config.subsample > 0.0 && self.config.subsample <= 1.0) {
            return Err(ResaleError::InvalidParameter {
                name: "subsample".to_string(),
                value: self.config.subsample.to_string(),
                reason: "must be in (0, 1]".to_string(),
            });
        }

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        let params = TreeParams {
            max_depth: Some(self.config.max_depth),
            min_samples_split: self.config.min_samples_split,
            min_samples_leaf: self.config.min_samples_leaf,
            ..TreeParams::default()
        };

        self.initial_prediction = y.mean().unwrap_or(0.0);
        self.trees.clear();
        self.train_loss.clear();
        let mut predictions = Array1::from_elem(n_samples, self.initial_prediction);
        let n_sub = ((n_samples as f64 * self.config.subsample).ceil() as usize).max(1);
        let mut order: Vec<usize> = (0..n_samples).collect();

        for round in 0..self.config.n_estimators {
            let residuals = y - &predictions;

            let indices: Vec<usize> = if n_sub < n_samples {
                order.shuffle(&mut rng);
                order[..n_sub].to_vec()
            } else {
                (0..n_samples).collect()
            };

            let mut tree = DecisionTree::new(params.clone())
                .with_random_state(self.config.random_state.wrapping_add(round as u64));
            tree.fit_indices(x, &residuals, &indices)?;
            predictions.scaled_add(self.config.learning_rate, &tree.predict(x)?);

            let mse = (y - &predictions).mapv(|r| r * r).mean().unwrap_or(0.0);
            trace!(round, mse, "Boosting round");
            self.train_loss.push(mse);
            self.trees.push(tree);
        }

        self.is_fitted = true;
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(ResaleError::ModelNotFitted);
        }
        let mut predictions = Array1::from_elem(x.nrows(), self.initial_prediction);
        for tree in &self.trees {
            predictions.scaled_add(self.config.learning_rate, &tree.predict(x)?);
        }
        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((50, 2), |(i, j)| (i * (j + 1)) as f64 / 10.0);
        let y = x.column(0).mapv(|v| v * v);
        (x, y)
    }

    #[test]
    fn test_loss_decreases() {
        let (x, y) = data();
        let mut model = GradientBoostingRegressor::new(GradientBoostingConfig {
            n_estimators: 30,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        let loss = model.train_loss();
        assert_eq!(loss.len(), 30);
        assert!(loss[29] < loss[0]);
        assert_eq!(model.predict(&x).unwrap().len(), 50);
    }

    #[test]
    fn test_zero_rounds_predicts_mean() {
        let (x, y) = data();
        let mut model = GradientBoostingRegressor::new(GradientBoostingConfig {
            n_estimators: 0,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        let mean = y.mean().unwrap();
        assert!(model.predict(&x).unwrap().iter().all(|p| (p - mean).abs() < 1e-12));
    }

    #[test]
    fn test_subsample_is_seeded() {
        let (x, y) = data();
        let config = GradientBoostingConfig {
            n_estimators: 10,
            subsample: 0.5,
            ..Default::default()
        };
        let mut a = GradientBoostingRegressor::new(config.clone());
        let mut b = GradientBoostingRegressor::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_invalid_subsample() {
        let (x, y) = data();
        let mut model = GradientBoostingRegressor::new(GradientBoostingConfig {
            subsample: 0.0,
            ..Default::default()
        });
        assert!(matches!(
            model.fit(&x, &y),
            Err(ResaleError::InvalidParameter { .. })
        ));
    }
}
