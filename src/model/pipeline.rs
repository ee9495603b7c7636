//! The resale price model
//!
//! Tabular and text features are built by their transformers, concatenated
//! column-wise (tabular first) and passed to the registry estimator.
//!
//! `fit` expects the target already mapped through
//! [`TargetTransform::forward`]; `predict` maps estimator output back through
//! [`TargetTransform::inverse`] and clamps it at zero. A non-finite price is
//! a [`ResaleError::ComputationError`].

use super::config::{ModelConfig, TargetTransform};
use crate::error::{ResaleError, Result};
use crate::export::serializer::{
    decode_artifact, encode_artifact, read_artifact, write_artifact, ModelMetadata,
    ARTIFACT_EXTENSION,
};
use crate::export::store::{ObjectStore, StoreCredentials};
use crate::feature_engineering::TextFeatureExtractor;
use crate::preprocessing::pipeline::stack;
use crate::preprocessing::TabularFeatureTransformer;
use crate::training::{Estimator, EstimatorKind, EvaluationMetrics};
use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Feature pipeline plus estimator.
///
/// Not thread-safe to fit; one fit-then-use lifecycle per instance, or clone
/// before fitting in parallel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    config: ModelConfig,
    transformer: Option<TabularFeatureTransformer>,
    extractor: Option<TextFeatureExtractor>,
    estimator: Estimator,
    n_features: Option<usize>,
    is_fitted: bool,
}

impl Model {
    pub fn new(config: ModelConfig) -> Result<Self> {
        config.validate()?;
        let transformer = if config.use_tab_features {
            Some(TabularFeatureTransformer::new(config.transformer_params.clone())?)
        } else {
            None
        };
        let extractor = if config.use_text_features {
            Some(TextFeatureExtractor::new(config.extractor_params.clone())?)
        } else {
            None
        };
        Ok(Self {
            estimator: Estimator::new(&config.estimator),
            config,
            transformer,
            extractor,
            n_features: None,
            is_fitted: false,
        })
    }

    /// Fresh, unfitted model for a new configuration
    pub fn reconfigure(&self, config: ModelConfig) -> Result<Self> {
        Self::new(config)
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn model_name(&self) -> &str {
        &self.config.model_name
    }

    pub fn estimator_kind(&self) -> EstimatorKind {
        self.estimator.kind()
    }

    pub fn target_transform(&self) -> TargetTransform {
        self.config.target_transform
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Width of the estimator input
    pub fn n_features(&self) -> Option<usize> {
        self.n_features
    }

    /// Fit features and estimator on `y` given on the transformed scale
    pub fn fit(&mut self, df: &DataFrame, y: &[f64]) -> Result<&mut Self> {
        if y.len() != df.height() {
            return Err(ResaleError::ShapeError {
                expected: format!("{} target values", df.height()),
                actual: format!("{} target values", y.len()),
            });
        }
        if let Some(v) = y.iter().find(|v| !v.is_finite()) {
            return Err(ResaleError::InvalidInput(format!("target contains non-finite value {}", v)));
        }

        let start = Instant::now();
        self.is_fitted = false;

        let mut blocks = Vec::with_capacity(2);
        if let Some(transformer) = self.transformer.as_mut() {
            blocks.push(transformer.fit_transform(df, Some(y))?);
        }
        if let Some(extractor) = self.extractor.as_mut() {
            blocks.push(extractor.fit_transform(df)?);
        }
        let x = stack(df.height(), &blocks)?;
        debug!(rows = x.nrows(), features = x.ncols(), "Built training matrix");

        self.estimator.fit(&x, &Array1::from(y.to_vec()))?;
        self.n_features = Some(x.ncols());
        self.is_fitted = true;

        info!(
            model = %self.config.model_name,
            estimator = %self.estimator.kind(),
            rows = df.height(),
            features = x.ncols(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Model fitted"
        );
        Ok(self)
    }

    /// Feature matrix for a frame using the fitted transformers
    pub fn features(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(ResaleError::ModelNotFitted);
        }
        let mut blocks = Vec::with_capacity(2);
        if let Some(transformer) = &self.transformer {
            blocks.push(transformer.transform(df)?);
        }
        if let Some(extractor) = &self.extractor {
            blocks.push(extractor.transform(df)?);
        }
        stack(df.height(), &blocks)
    }

    /// Feature names in matrix order
    pub fn feature_names(&self) -> Result<Vec<String>> {
        if !self.is_fitted {
            return Err(ResaleError::ModelNotFitted);
        }
        let mut names = Vec::new();
        if let Some(transformer) = &self.transformer {
            names.extend(transformer.feature_names()?);
        }
        if let Some(extractor) = &self.extractor {
            names.extend(extractor.feature_names());
        }
        Ok(names)
    }

    /// Prices on the original scale, never negative
    pub fn predict(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let x = self.features(df)?;
        let raw = self.estimator.predict(&x)?;
        to_price_scale(self.config.target_transform, raw)
    }

    /// RMSLE and WAPE against prices on the original scale
    pub fn evaluate(&self, df: &DataFrame, y_true: &[f64]) -> Result<EvaluationMetrics> {
        let predictions = self.predict(df)?.to_vec();
        let metrics = EvaluationMetrics::compute(y_true, &predictions)?;
        info!(
            model = %self.config.model_name,
            rows = y_true.len(),
            rmsle = metrics.rmsle,
            wape = metrics.wape,
            "Evaluated model"
        );
        Ok(metrics)
    }

    fn to_artifact(&self, metrics: BTreeMap<String, f64>) -> Result<Vec<u8>> {
        if !self.is_fitted {
            return Err(ResaleError::ModelNotFitted);
        }
        encode_artifact(self, ModelMetadata::new(self.config.clone(), metrics))
    }

    /// Save as `<dir>/<model_name>.rpm` and return the path
    pub fn save(&self, dir: impl AsRef<Path>, metrics: BTreeMap<String, f64>) -> Result<PathBuf> {
        let path = dir
            .as_ref()
            .join(format!("{}.{}", self.config.model_name, ARTIFACT_EXTENSION));
        self.save_to(&path, metrics)?;
        Ok(path)
    }

    pub fn save_to(&self, path: impl AsRef<Path>, metrics: BTreeMap<String, f64>) -> Result<()> {
        let bytes = self.to_artifact(metrics)?;
        write_artifact(path.as_ref(), &bytes)?;
        info!(path = %path.as_ref().display(), bytes = bytes.len(), "Saved model");
        Ok(())
    }

    /// Load a saved model with its metadata
    pub fn load(path: impl AsRef<Path>) -> Result<(Model, ModelMetadata)> {
        let bytes = read_artifact(path.as_ref())?;
        let loaded = decode_artifact(&bytes)?;
        info!(path = %path.as_ref().display(), "Loaded model");
        Ok(loaded)
    }

    pub fn save_to_store(
        &self,
        store: &dyn ObjectStore,
        bucket: &str,
        key: &str,
        metrics: BTreeMap<String, f64>,
    ) -> Result<()> {
        let bytes = self.to_artifact(metrics)?;
        store.put(bucket, key, &bytes)?;
        info!(bucket, key, bytes = bytes.len(), "Uploaded model");
        Ok(())
    }

    pub fn load_from_store(
        store: &dyn ObjectStore,
        bucket: &str,
        key: &str,
    ) -> Result<(Model, ModelMetadata)> {
        let bytes = store.get(bucket, key)?;
        decode_artifact(&bytes)
    }

    /// Resolve credentials through `lookup`, connect, then fetch.
    ///
    /// Absent credentials fail before `connect` is called.
    pub fn load_remote<L, C, S>(
        bucket: &str,
        key: &str,
        lookup: L,
        connect: C,
    ) -> Result<(Model, ModelMetadata)>
    where
        L: Fn(&str) -> Option<String>,
        C: FnOnce(&StoreCredentials) -> Result<S>,
        S: ObjectStore,
    {
        let credentials = StoreCredentials::from_lookup(lookup)?;
        if bucket.trim().is_empty() {
            return Err(ResaleError::ConfigError("bucket name must not be empty".to_string()));
        }
        let store = connect(&credentials)?;
        Self::load_from_store(&store, bucket, key)
    }
}

/// Invert the target transform and clamp at zero; non-finite values are errors
fn to_price_scale(transform: TargetTransform, raw: Array1<f64>) -> Result<Array1<f64>> {
    let mut prices = raw;
    for (i, v) in prices.iter_mut().enumerate() {
        let price = transform.inverse(*v);
        if !price.is_finite() {
            return Err(ResaleError::ComputationError(format!(
                "non-finite prediction {} at row {} (estimator output {})",
                price, i, v
            )));
        }
        *v = price.max(0.0);
    }
    Ok(prices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::store::InMemoryStore;
    use crate::listing::{fixtures, records_to_frame};
    use crate::training::{EstimatorConfig, MedianParams};

    fn data() -> (DataFrame, Vec<f64>) {
        let records = fixtures::five_listings();
        let y = records.iter().filter_map(|r| r.sold_price).collect();
        (records_to_frame(&records).unwrap(), y)
    }

    fn median_model() -> Model {
        Model::new(ModelConfig::new(EstimatorConfig::Median(MedianParams::default()))).unwrap()
    }

    #[test]
    fn test_predict_applies_inverse_once() {
        let (df, y) = data();
        let mut model = median_model();
        let log_y = TargetTransform::Log1p.forward_all(&y);
        model.fit(&df, &log_y).unwrap();

        // median of log1p(y) maps back to the median price
        let p = model.predict(&df).unwrap();
        assert!(p.iter().all(|v| (v - 200.0).abs() < 1e-9));
    }

    #[test]
    fn test_identity_transform() {
        let (df, y) = data();
        let config = ModelConfig::new(EstimatorConfig::Median(MedianParams::default()))
            .with_target_transform(TargetTransform::Identity);
        let mut model = Model::new(config).unwrap();
        model.fit(&df, &y).unwrap();
        assert_eq!(model.predict(&df).unwrap()[0], 200.0);
    }

    #[test]
    fn test_negative_outputs_clamp_to_zero() {
        let (df, _) = data();
        let config = ModelConfig::new(EstimatorConfig::Median(MedianParams::default()))
            .with_target_transform(TargetTransform::Identity);
        let mut model = Model::new(config).unwrap();
        model.fit(&df, &[-5.0; 5]).unwrap();
        assert!(model.predict(&df).unwrap().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_non_finite_predictions_are_errors() {
        let ok = to_price_scale(TargetTransform::Log1p, Array1::from(vec![0.0, 1.0_f64.ln_1p()])).unwrap();
        assert!((ok[1] - 1.0).abs() < 1e-12);

        for raw in [f64::NAN, f64::INFINITY, 1e4] {
            let err = to_price_scale(TargetTransform::Log1p, Array1::from(vec![1.0, raw])).unwrap_err();
            assert!(matches!(err, ResaleError::ComputationError(ref m) if m.contains("row 1")));
        }
        assert!(matches!(
            to_price_scale(TargetTransform::Identity, Array1::from(vec![f64::NAN])),
            Err(ResaleError::ComputationError(_))
        ));
        assert_eq!(
            to_price_scale(TargetTransform::Identity, Array1::from(vec![-3.0])).unwrap()[0],
            0.0
        );
    }

    #[test]
    fn test_unfitted_and_reconfigured() {
        let (df, y) = data();
        let mut model = median_model();
        assert!(matches!(model.predict(&df), Err(ResaleError::ModelNotFitted)));
        model.fit(&df, &y).unwrap();
        assert!(model.is_fitted());

        let fresh = model.reconfigure(model.config().clone().with_model_name("again")).unwrap();
        assert!(!fresh.is_fitted());
        assert!(matches!(fresh.predict(&df), Err(ResaleError::ModelNotFitted)));
    }

    #[test]
    fn test_fit_rejects_length_mismatch() {
        let (df, _) = data();
        assert!(matches!(
            median_model().fit(&df, &[1.0, 2.0]),
            Err(ResaleError::ShapeError { .. })
        ));
    }

    #[test]
    fn test_store_round_trip() {
        let (df, y) = data();
        let mut model = median_model();
        model.fit(&df, &TargetTransform::Log1p.forward_all(&y)).unwrap();

        let store = InMemoryStore::new();
        model.save_to_store(&store, "models", "median.rpm", BTreeMap::new()).unwrap();
        let (loaded, meta) = Model::load_from_store(&store, "models", "median.rpm").unwrap();
        assert_eq!(meta.model_name, "c-median");
        assert_eq!(loaded.predict(&df).unwrap(), model.predict(&df).unwrap());
    }

    #[test]
    fn test_load_remote_checks_credentials_first() {
        let connected = std::cell::Cell::new(false);
        let err = Model::load_remote("models", "m.rpm", |_| None, |_| {
            connected.set(true);
            Ok(InMemoryStore::new())
        })
        .unwrap_err();
        assert!(matches!(err, ResaleError::MissingCredentials(_)));
        assert!(!connected.get());

        let lookup = |name: &str| Some(format!("value-of-{}", name));
        let err = Model::load_remote("models", "m.rpm", lookup, |_| Ok(InMemoryStore::new())).unwrap_err();
        assert!(err.is_not_found());

        let err = Model::load_remote("", "m.rpm", lookup, |_| Ok(InMemoryStore::new())).unwrap_err();
        assert!(matches!(err, ResaleError::ConfigError(_)));
    }
}
