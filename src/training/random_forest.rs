//! Bagged regression forests

use super::decision_tree::{DecisionTree, MaxFeatures, SplitStrategy, TreeParams};
use crate::error::{ResaleError, Result};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Random forest regressor: bootstrap rows, best splits, averaged leaves
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    pub n_estimators: usize,
    pub tree_params: TreeParams,
    pub bootstrap: bool,
    pub random_state: u64,
    trees: Vec<DecisionTree>,
    feature_importances: Option<Array1<f64>>,
}

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForestRegressor {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            n_estimators,
            tree_params: TreeParams::default(),
            bootstrap: true,
            random_state: 42,
            trees: Vec::new(),
            feature_importances: None,
        }
    }

    pub fn with_tree_params(mut self, params: TreeParams) -> Self {
        self.tree_params = params;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.tree_params.max_depth = Some(depth);
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.tree_params.max_features = max_features;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(ResaleError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 || self.n_estimators == 0 {
            return Err(ResaleError::InvalidInput(
                "forest needs at least one sample and one tree".to_string(),
            ));
        }

        let base_seed = self.random_state;
        let trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let mut tree = DecisionTree::new(self.tree_params.clone()).with_random_state(seed);
                tree.fit_indices(x, y, &indices)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut importances = Array1::<f64>::zeros(x.ncols());
        for imp in trees.iter().filter_map(|t| t.feature_importances()) {
            importances += imp;
        }
        importances /= trees.len() as f64;

        self.trees = trees;
        self.feature_importances = Some(importances);
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(ResaleError::ModelNotFitted);
        }
        let per_tree = self
            .trees
            .par_iter()
            .map(|t| t.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let mut sum = Array1::<f64>::zeros(x.nrows());
        for p in &per_tree {
            sum += p;
        }
        Ok(sum / self.trees.len() as f64)
    }
}

/// Extremely randomized trees: whole sample, one random threshold per feature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraTreesRegressor {
    forest: RandomForestRegressor,
}

impl Default for ExtraTreesRegressor {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ExtraTreesRegressor {
    pub fn new(n_estimators: usize) -> Self {
        let params = TreeParams {
            splitter: SplitStrategy::Random,
            ..TreeParams::default()
        };
        Self {
            forest: RandomForestRegressor::new(n_estimators)
                .with_tree_params(params)
                .with_bootstrap(false),
        }
    }

    pub fn with_tree_params(mut self, params: TreeParams) -> Self {
        self.forest.tree_params = TreeParams {
            splitter: SplitStrategy::Random,
            ..params
        };
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.forest.random_state = seed;
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        self.forest.fit(x, y)?;
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.forest.predict(x)
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.forest.feature_importances()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((60, 2), |(i, j)| if j == 0 { i as f64 } else { (i % 7) as f64 });
        let y = x.column(0).mapv(|v| if v < 30.0 { 10.0 } else { 50.0 });
        (x, y)
    }

    #[test]
    fn test_forest_learns_step() {
        let (x, y) = data();
        let mut forest = RandomForestRegressor::new(20);
        forest.fit(&x, &y).unwrap();
        let p = forest.predict(&x).unwrap();

        assert_eq!(forest.n_trees(), 20);
        assert!(p[0] < 20.0);
        assert!(p[59] > 40.0);
        let imp = forest.feature_importances().unwrap();
        assert!(imp[0] > imp[1]);
    }

    #[test]
    fn test_forest_is_reproducible() {
        let (x, y) = data();
        let mut a = RandomForestRegressor::new(5).with_max_features(MaxFeatures::Sqrt);
        let mut b = RandomForestRegressor::new(5).with_max_features(MaxFeatures::Sqrt);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_extra_trees() {
        let (x, y) = data();
        let mut model = ExtraTreesRegressor::new(20);
        model.fit(&x, &y).unwrap();
        let p = model.predict(&x).unwrap();
        // Fully grown on the whole sample: training rows are reproduced
        for (a, b) in p.iter().zip(y.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_predict_before_fit() {
        let (x, _) = data();
        assert!(matches!(
            RandomForestRegressor::default().predict(&x),
            Err(ResaleError::ModelNotFitted)
        ));
    }
}
