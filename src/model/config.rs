//! Model configuration

use crate::error::{ResaleError, Result};
use crate::feature_engineering::TextConfig;
use crate::preprocessing::TabularConfig;
use crate::training::EstimatorConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Monotonic transform of the price target.
///
/// The experiment driver applies [`TargetTransform::forward`] before
/// `Model::fit`; `Model::predict` applies [`TargetTransform::inverse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetTransform {
    Identity,
    #[default]
    Log1p,
}

impl TargetTransform {
    pub fn forward(&self, value: f64) -> f64 {
        match self {
            TargetTransform::Identity => value,
            TargetTransform::Log1p => value.ln_1p(),
        }
    }

    pub fn inverse(&self, value: f64) -> f64 {
        match self {
            TargetTransform::Identity => value,
            TargetTransform::Log1p => value.exp_m1(),
        }
    }

    pub fn forward_all(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| self.forward(*v)).collect()
    }
}

/// Everything needed to rebuild a [`crate::model::Model`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    pub model_name: String,
    pub estimator: EstimatorConfig,
    pub use_tab_features: bool,
    pub use_text_features: bool,
    pub transformer_params: TabularConfig,
    pub extractor_params: TextConfig,
    pub target_transform: TargetTransform,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_name: "ridge".to_string(),
            estimator: EstimatorConfig::default(),
            use_tab_features: true,
            use_text_features: false,
            transformer_params: TabularConfig::default(),
            extractor_params: TextConfig::default(),
            target_transform: TargetTransform::default(),
        }
    }
}

impl ModelConfig {
    pub fn new(estimator: EstimatorConfig) -> Self {
        Self {
            model_name: estimator.kind().to_string(),
            estimator,
            ..Default::default()
        }
    }

    /// Parse an experiment config; any schema problem is a `ConfigError`
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| ResaleError::ConfigError(format!("invalid model config: {}", e)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ResaleError::ConfigError(format!("cannot read config {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = name.into();
        self
    }

    pub fn with_estimator(mut self, estimator: EstimatorConfig) -> Self {
        self.estimator = estimator;
        self
    }

    /// Select the estimator by registry key, with its default parameters
    pub fn with_estimator_name(mut self, name: &str) -> Result<Self> {
        self.estimator = name.parse()?;
        Ok(self)
    }

    pub fn with_tab_features(mut self, enabled: bool) -> Self {
        self.use_tab_features = enabled;
        self
    }

    pub fn with_text_features(mut self, enabled: bool) -> Self {
        self.use_text_features = enabled;
        self
    }

    pub fn with_transformer_params(mut self, params: TabularConfig) -> Self {
        self.transformer_params = params;
        self
    }

    pub fn with_extractor_params(mut self, params: TextConfig) -> Self {
        self.extractor_params = params;
        self
    }

    pub fn with_target_transform(mut self, transform: TargetTransform) -> Self {
        self.target_transform = transform;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.use_tab_features && !self.use_text_features {
            return Err(ResaleError::ConfigError(
                "at least one of use_tab_features and use_text_features must be enabled".to_string(),
            ));
        }
        if self.model_name.trim().is_empty() {
            return Err(ResaleError::ConfigError("model_name must not be empty".to_string()));
        }
        if self.use_tab_features {
            if self.transformer_params.no_encoding {
                return Err(ResaleError::ConfigError(
                    "no_encoding is an inspection mode and cannot feed an estimator".to_string(),
                ));
            }
            self.transformer_params.validate()?;
        }
        if self.use_text_features {
            self.extractor_params.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{EstimatorKind, RidgeParams};

    #[test]
    fn test_log1p_inverse() {
        let t = TargetTransform::Log1p;
        for v in [0.0, 1.0, 99.5, 12_000.0] {
            assert!((t.inverse(t.forward(v)) - v).abs() < 1e-9 * v.max(1.0));
        }
        assert_eq!(TargetTransform::Identity.inverse(3.5), 3.5);
    }

    #[test]
    fn test_from_json_partial() {
        let config = ModelConfig::from_json(
            r#"{
                "model_name": "ridge-text",
                "estimator": {"ridge": {"alpha": 2.0}},
                "use_text_features": true,
                "extractor_params": {"reducer_class": "umap", "text_cols": ["item_name"]}
            }"#,
        )
        .unwrap();
        assert_eq!(config.estimator, EstimatorConfig::Ridge(RidgeParams { alpha: 2.0 }));
        assert!(config.use_tab_features);
        assert_eq!(config.extractor_params.text_cols, vec!["item_name"]);
        assert_eq!(config.target_transform, TargetTransform::Log1p);
        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_names_are_config_errors() {
        for json in [
            r#"{"estimator": {"svr": {}}}"#,
            r#"{"extractor_params": {"vectorizer_class": "word2vec"}}"#,
            r#"{"extractor_params": {"reducer_class": "tsne"}}"#,
            r#"{"estimator_class": "ridge"}"#,
        ] {
            let err = ModelConfig::from_json(json).unwrap_err();
            assert!(matches!(err, ResaleError::ConfigError(_)), "{}", json);
        }
        let err = ModelConfig::default().with_estimator_name("not-a-real-one").unwrap_err();
        assert!(matches!(err, ResaleError::ConfigError(_)));
        assert!(err.to_string().contains("c-median"));
    }

    #[test]
    fn test_validate() {
        let none = ModelConfig::default().with_tab_features(false).with_text_features(false);
        assert!(matches!(none.validate(), Err(ResaleError::ConfigError(_))));

        let inspect = ModelConfig::default()
            .with_transformer_params(TabularConfig::default().with_no_encoding(true));
        assert!(matches!(inspect.validate(), Err(ResaleError::ConfigError(_))));

        let knn = ModelConfig::new(EstimatorKind::Knn.into());
        assert_eq!(knn.model_name, "knn");
        knn.validate().unwrap();
    }
}
