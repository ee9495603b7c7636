//! Price regressors
//!
//! Provides the estimator registry and its members:
//! - Constant median baseline
//! - Linear models (OLS, Ridge, Lasso, ElasticNet, Huber)
//! - Decision trees, Random Forests and Extra Trees
//! - Gradient boosting and CatBoost-style symmetric boosting
//! - K-Nearest Neighbors
//!
//! plus the RMSLE / WAPE evaluation metrics.

pub mod baseline;
pub mod catboost;
pub mod decision_tree;
pub mod estimator;
pub mod gradient_boosting;
pub mod knn;
pub mod linear_models;
pub mod metrics;
pub mod random_forest;

pub use baseline::MedianRegressor;
pub use catboost::{CatBoostConfig, CatBoostRegressor};
pub use decision_tree::{DecisionTree, MaxFeatures, SplitStrategy, TreeNode, TreeParams};
pub use estimator::{
    ElasticNetParams, Estimator, EstimatorConfig, EstimatorKind, ForestParams, HuberParams,
    LinearParams, MedianParams, RidgeParams,
};
pub use gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
pub use knn::{DistanceMetric, KNNConfig, KNNRegressor, WeightScheme};
pub use linear_models::{
    ElasticNetRegression, HuberRegressor, LinearCoefficients, LinearRegression, RidgeRegression,
};
pub use metrics::{rmsle, wape, EvaluationMetrics};
pub use random_forest::{ExtraTreesRegressor, RandomForestRegressor};
