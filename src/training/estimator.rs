//! Estimator registry
//!
//! [`EstimatorKind`] names every registered regressor, [`EstimatorConfig`]
//! carries its parameters, and [`Estimator`] is the fitted model dispatching
//! `fit` / `predict`.

use super::baseline::MedianRegressor;
use super::catboost::{CatBoostConfig, CatBoostRegressor};
use super::decision_tree::{DecisionTree, MaxFeatures, TreeParams};
use super::gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
use super::knn::{KNNConfig, KNNRegressor};
use super::linear_models::{ElasticNetRegression, HuberRegressor, LinearRegression, RidgeRegression};
use super::random_forest::{ExtraTreesRegressor, RandomForestRegressor};
use crate::error::{ResaleError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const RANDOM_STATE: u64 = 42;
pub const MAX_ITER: usize = 20_000;

/// Registry key of an estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EstimatorKind {
    #[serde(rename = "c-median")]
    Median,
    #[serde(rename = "lr")]
    Linear,
    #[serde(rename = "ridge")]
    Ridge,
    #[serde(rename = "lasso")]
    Lasso,
    #[serde(rename = "enet")]
    ElasticNet,
    #[serde(rename = "huber")]
    Huber,
    #[serde(rename = "dtree")]
    DecisionTree,
    #[serde(rename = "rforest")]
    RandomForest,
    #[serde(rename = "xtrees")]
    ExtraTrees,
    #[serde(rename = "gboost")]
    GradientBoosting,
    #[serde(rename = "catboost")]
    CatBoost,
    #[serde(rename = "knn")]
    Knn,
}

impl EstimatorKind {
    pub const ALL: [EstimatorKind; 12] = [
        EstimatorKind::Median,
        EstimatorKind::Linear,
        EstimatorKind::Ridge,
        EstimatorKind::Lasso,
        EstimatorKind::ElasticNet,
        EstimatorKind::Huber,
        EstimatorKind::DecisionTree,
        EstimatorKind::RandomForest,
        EstimatorKind::ExtraTrees,
        EstimatorKind::GradientBoosting,
        EstimatorKind::CatBoost,
        EstimatorKind::Knn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EstimatorKind::Median => "c-median",
            EstimatorKind::Linear => "lr",
            EstimatorKind::Ridge => "ridge",
            EstimatorKind::Lasso => "lasso",
            EstimatorKind::ElasticNet => "enet",
            EstimatorKind::Huber => "huber",
            EstimatorKind::DecisionTree => "dtree",
            EstimatorKind::RandomForest => "rforest",
            EstimatorKind::ExtraTrees => "xtrees",
            EstimatorKind::GradientBoosting => "gboost",
            EstimatorKind::CatBoost => "catboost",
            EstimatorKind::Knn => "knn",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            EstimatorKind::Median => "constant median baseline",
            EstimatorKind::Linear => "ordinary least squares",
            EstimatorKind::Ridge => "L2-penalised least squares",
            EstimatorKind::Lasso => "L1 coordinate descent",
            EstimatorKind::ElasticNet => "elastic net coordinate descent",
            EstimatorKind::Huber => "Huber loss via IRLS",
            EstimatorKind::DecisionTree => "CART regression tree",
            EstimatorKind::RandomForest => "bootstrap random forest",
            EstimatorKind::ExtraTrees => "extremely randomized trees",
            EstimatorKind::GradientBoosting => "gradient-boosted trees",
            EstimatorKind::CatBoost => "oblivious-tree boosting",
            EstimatorKind::Knn => "k-nearest neighbours",
        }
    }

    /// Comma-separated registry keys
    pub fn valid_keys() -> String {
        Self::ALL.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for EstimatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EstimatorKind {
    type Err = ResaleError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s).ok_or_else(|| {
            ResaleError::ConfigError(format!(
                "unsupported estimator '{}'; supported: [{}]",
                s,
                Self::valid_keys()
            ))
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedianParams {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearParams {
    pub fit_intercept: bool,
}

impl Default for LinearParams {
    fn default() -> Self {
        Self { fit_intercept: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RidgeParams {
    pub alpha: f64,
}

impl Default for RidgeParams {
    fn default() -> Self {
        Self { alpha: 1.0 }
    }
}

/// Lasso and elastic net; `l1_ratio` is ignored by the lasso
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElasticNetParams {
    pub alpha: f64,
    pub l1_ratio: f64,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for ElasticNetParams {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            l1_ratio: 0.5,
            max_iter: MAX_ITER,
            tol: 1e-4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HuberParams {
    pub epsilon: f64,
    pub alpha: f64,
    pub max_iter: usize,
}

impl Default for HuberParams {
    fn default() -> Self {
        Self {
            epsilon: 1.35,
            alpha: 1e-4,
            max_iter: MAX_ITER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub random_state: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            random_state: RANDOM_STATE,
        }
    }
}

impl ForestParams {
    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features,
            ..TreeParams::default()
        }
    }
}

/// Estimator choice with its parameters.
///
/// Serialized as `{"<key>": {<params>}}`; omitted parameters take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EstimatorConfig {
    #[serde(rename = "c-median")]
    Median(MedianParams),
    #[serde(rename = "lr")]
    Linear(LinearParams),
    #[serde(rename = "ridge")]
    Ridge(RidgeParams),
    #[serde(rename = "lasso")]
    Lasso(ElasticNetParams),
    #[serde(rename = "enet")]
    ElasticNet(ElasticNetParams),
    #[serde(rename = "huber")]
    Huber(HuberParams),
    #[serde(rename = "dtree")]
    DecisionTree(TreeParams),
    #[serde(rename = "rforest")]
    RandomForest(ForestParams),
    #[serde(rename = "xtrees")]
    ExtraTrees(ForestParams),
    #[serde(rename = "gboost")]
    GradientBoosting(GradientBoostingConfig),
    #[serde(rename = "catboost")]
    CatBoost(CatBoostConfig),
    #[serde(rename = "knn")]
    Knn(KNNConfig),
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        EstimatorConfig::Ridge(RidgeParams::default())
    }
}

impl From<EstimatorKind> for EstimatorConfig {
    fn from(kind: EstimatorKind) -> Self {
        match kind {
            EstimatorKind::Median => EstimatorConfig::Median(MedianParams::default()),
            EstimatorKind::Linear => EstimatorConfig::Linear(LinearParams::default()),
            EstimatorKind::Ridge => EstimatorConfig::Ridge(RidgeParams::default()),
            EstimatorKind::Lasso => EstimatorConfig::Lasso(ElasticNetParams {
                l1_ratio: 1.0,
                ..ElasticNetParams::default()
            }),
            EstimatorKind::ElasticNet => EstimatorConfig::ElasticNet(ElasticNetParams::default()),
            EstimatorKind::Huber => EstimatorConfig::Huber(HuberParams::default()),
            EstimatorKind::DecisionTree => EstimatorConfig::DecisionTree(TreeParams::default()),
            EstimatorKind::RandomForest => EstimatorConfig::RandomForest(ForestParams::default()),
            EstimatorKind::ExtraTrees => EstimatorConfig::ExtraTrees(ForestParams::default()),
            EstimatorKind::GradientBoosting => {
                EstimatorConfig::GradientBoosting(GradientBoostingConfig::default())
            }
            EstimatorKind::CatBoost => EstimatorConfig::CatBoost(CatBoostConfig::default()),
            EstimatorKind::Knn => EstimatorConfig::Knn(KNNConfig::default()),
        }
    }
}

impl FromStr for EstimatorConfig {
    type Err = ResaleError;

    /// Default parameters for a registry key
    fn from_str(s: &str) -> Result<Self> {
        Ok(s.parse::<EstimatorKind>()?.into())
    }
}

impl EstimatorConfig {
    pub fn kind(&self) -> EstimatorKind {
        match self {
            EstimatorConfig::Median(_) => EstimatorKind::Median,
            EstimatorConfig::Linear(_) => EstimatorKind::Linear,
            EstimatorConfig::Ridge(_) => EstimatorKind::Ridge,
            EstimatorConfig::Lasso(_) => EstimatorKind::Lasso,
            EstimatorConfig::ElasticNet(_) => EstimatorKind::ElasticNet,
            EstimatorConfig::Huber(_) => EstimatorKind::Huber,
            EstimatorConfig::DecisionTree(_) => EstimatorKind::DecisionTree,
            EstimatorConfig::RandomForest(_) => EstimatorKind::RandomForest,
            EstimatorConfig::ExtraTrees(_) => EstimatorKind::ExtraTrees,
            EstimatorConfig::GradientBoosting(_) => EstimatorKind::GradientBoosting,
            EstimatorConfig::CatBoost(_) => EstimatorKind::CatBoost,
            EstimatorConfig::Knn(_) => EstimatorKind::Knn,
        }
    }
}

/// A regressor from the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Estimator {
    Median(MedianRegressor),
    Linear(LinearRegression),
    Ridge(RidgeRegression),
    Lasso(ElasticNetRegression),
    ElasticNet(ElasticNetRegression),
    Huber(HuberRegressor),
    DecisionTree(DecisionTree),
    RandomForest(RandomForestRegressor),
    ExtraTrees(ExtraTreesRegressor),
    GradientBoosting(GradientBoostingRegressor),
    CatBoost(CatBoostRegressor),
    Knn(KNNRegressor),
}

impl Estimator {
    /// Unfitted estimator for a configuration
    pub fn new(config: &EstimatorConfig) -> Self {
        match config {
            EstimatorConfig::Median(_) => Estimator::Median(MedianRegressor::new()),
            EstimatorConfig::Linear(p) => {
                Estimator::Linear(LinearRegression::new().with_fit_intercept(p.fit_intercept))
            }
            EstimatorConfig::Ridge(p) => Estimator::Ridge(RidgeRegression::new(p.alpha)),
            EstimatorConfig::Lasso(p) => Estimator::Lasso(
                ElasticNetRegression::lasso(p.alpha)
                    .with_max_iter(p.max_iter)
                    .with_tol(p.tol),
            ),
            EstimatorConfig::ElasticNet(p) => Estimator::ElasticNet(
                ElasticNetRegression::new(p.alpha, p.l1_ratio)
                    .with_max_iter(p.max_iter)
                    .with_tol(p.tol),
            ),
            EstimatorConfig::Huber(p) => {
                Estimator::Huber(HuberRegressor::new(p.epsilon, p.alpha).with_max_iter(p.max_iter))
            }
            EstimatorConfig::DecisionTree(p) => {
                Estimator::DecisionTree(DecisionTree::new(p.clone()).with_random_state(RANDOM_STATE))
            }
            EstimatorConfig::RandomForest(p) => Estimator::RandomForest(
                RandomForestRegressor::new(p.n_estimators)
                    .with_tree_params(p.tree_params())
                    .with_random_state(p.random_state),
            ),
            EstimatorConfig::ExtraTrees(p) => Estimator::ExtraTrees(
                ExtraTreesRegressor::new(p.n_estimators)
                    .with_tree_params(p.tree_params())
                    .with_random_state(p.random_state),
            ),
            EstimatorConfig::GradientBoosting(p) => {
                Estimator::GradientBoosting(GradientBoostingRegressor::new(p.clone()))
            }
            EstimatorConfig::CatBoost(p) => Estimator::CatBoost(CatBoostRegressor::new(p.clone())),
            EstimatorConfig::Knn(p) => Estimator::Knn(KNNRegressor::new(p.clone())),
        }
    }

    pub fn kind(&self) -> EstimatorKind {
        match self {
            Estimator::Median(_) => EstimatorKind::Median,
            Estimator::Linear(_) => EstimatorKind::Linear,
            Estimator::Ridge(_) => EstimatorKind::Ridge,
            Estimator::Lasso(_) => EstimatorKind::Lasso,
            Estimator::ElasticNet(_) => EstimatorKind::ElasticNet,
            Estimator::Huber(_) => EstimatorKind::Huber,
            Estimator::DecisionTree(_) => EstimatorKind::DecisionTree,
            Estimator::RandomForest(_) => EstimatorKind::RandomForest,
            Estimator::ExtraTrees(_) => EstimatorKind::ExtraTrees,
            Estimator::GradientBoosting(_) => EstimatorKind::GradientBoosting,
            Estimator::CatBoost(_) => EstimatorKind::CatBoost,
            Estimator::Knn(_) => EstimatorKind::Knn,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self {
            Estimator::Median(m) => m.fit(x, y).map(|_| ()),
            Estimator::Linear(m) => m.fit(x, y).map(|_| ()),
            Estimator::Ridge(m) => m.fit(x, y).map(|_| ()),
            Estimator::Lasso(m) | Estimator::ElasticNet(m) => m.fit(x, y).map(|_| ()),
            Estimator::Huber(m) => m.fit(x, y).map(|_| ()),
            Estimator::DecisionTree(m) => m.fit(x, y).map(|_| ()),
            Estimator::RandomForest(m) => m.fit(x, y).map(|_| ()),
            Estimator::ExtraTrees(m) => m.fit(x, y).map(|_| ()),
            Estimator::GradientBoosting(m) => m.fit(x, y).map(|_| ()),
            Estimator::CatBoost(m) => m.fit(x, y).map(|_| ()),
            Estimator::Knn(m) => m.fit(x, y).map(|_| ()),
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Estimator::Median(m) => m.predict(x),
            Estimator::Linear(m) => m.predict(x),
            Estimator::Ridge(m) => m.predict(x),
            Estimator::Lasso(m) | Estimator::ElasticNet(m) => m.predict(x),
            Estimator::Huber(m) => m.predict(x),
            Estimator::DecisionTree(m) => m.predict(x),
            Estimator::RandomForest(m) => m.predict(x),
            Estimator::ExtraTrees(m) => m.predict(x),
            Estimator::GradientBoosting(m) => m.predict(x),
            Estimator::CatBoost(m) => m.predict(x),
            Estimator::Knn(m) => m.predict(x),
        }
    }
}
