//! Integration test: model training, evaluation and persistence

mod common;

use resale_price::error::ResaleError;
use resale_price::export::{DirectoryStore, ObjectStore};
use resale_price::feature_engineering::TextConfig;
use resale_price::model::{Model, ModelConfig, TargetTransform};
use resale_price::training::{EstimatorConfig, EstimatorKind, RidgeParams};
use std::collections::BTreeMap;

fn ridge_config() -> ModelConfig {
    ModelConfig::new(EstimatorConfig::Ridge(RidgeParams { alpha: 1.0 }))
}

fn fitted(config: ModelConfig, n: usize, seed: u64) -> Model {
    let (df, y) = common::frame(n, seed);
    let mut model = Model::new(config).unwrap();
    let transform = model.target_transform();
    model.fit(&df, &transform.forward_all(&y)).unwrap();
    model
}

#[test]
fn test_predictions_are_on_price_scale() {
    let model = fitted(ridge_config(), 120, 1);
    let (test_df, y_test) = common::frame(40, 2);
    let predictions = model.predict(&test_df).unwrap();

    assert_eq!(predictions.len(), 40);
    assert!(predictions.iter().all(|p| p.is_finite() && *p >= 0.0));
    // log-scale outputs would sit below ~7; prices here are mostly well above that
    let mean_pred = predictions.mean().unwrap();
    let mean_true = y_test.iter().sum::<f64>() / y_test.len() as f64;
    assert!(mean_pred > 10.0);
    assert!(mean_pred < mean_true * 5.0);
}

#[test]
fn test_evaluate_reports_both_metrics() {
    let model = fitted(ridge_config(), 150, 3);
    let (test_df, y_test) = common::frame(50, 4);
    let metrics = model.evaluate(&test_df, &y_test).unwrap();

    assert!(metrics.rmsle.is_finite() && metrics.rmsle >= 0.0);
    assert!(metrics.wape.is_finite() && metrics.wape >= 0.0);
    // designer and condition explain most of the price
    assert!(metrics.rmsle < 1.0, "rmsle {}", metrics.rmsle);

    let map = metrics.to_map();
    assert!(map.contains_key("rmsle"));
    assert!(map.contains_key("wape"));
}

#[test]
fn test_save_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let model = fitted(ridge_config().with_model_name("ridge-baseline"), 80, 5);
    let (df, y) = common::frame(20, 6);
    let metrics = model.evaluate(&df, &y).unwrap();

    let path = model.save(dir.path(), metrics.to_map()).unwrap();
    assert_eq!(path.file_name().unwrap(), "ridge-baseline.rpm");

    let (loaded, meta) = Model::load(&path).unwrap();
    assert_eq!(meta.model_name, "ridge-baseline");
    assert_eq!(meta.config.estimator.kind(), EstimatorKind::Ridge);
    assert_eq!(meta.metrics.get("rmsle").copied(), Some(metrics.rmsle));
    assert!(loaded.is_fitted());
    assert_eq!(loaded.predict(&df).unwrap(), model.predict(&df).unwrap());
}

#[test]
fn test_save_requires_fit() {
    let dir = tempfile::tempdir().unwrap();
    let model = Model::new(ridge_config()).unwrap();
    assert!(matches!(
        model.save(dir.path(), BTreeMap::new()),
        Err(ResaleError::ModelNotFitted)
    ));
}

#[test]
fn test_load_failures() {
    let dir = tempfile::tempdir().unwrap();
    let err = Model::load(dir.path().join("absent.rpm")).unwrap_err();
    assert!(err.is_not_found());

    let corrupt = dir.path().join("corrupt.rpm");
    std::fs::write(&corrupt, b"not a model at all").unwrap();
    assert!(matches!(Model::load(&corrupt), Err(ResaleError::MalformedArtifact(_))));
}

#[test]
fn test_invalid_configs_fail_before_fit() {
    let err = ridge_config().with_estimator_name("not-a-real-one").unwrap_err();
    assert!(matches!(err, ResaleError::ConfigError(_)));
    assert!(err.to_string().contains("rforest"));

    let neither = ridge_config().with_tab_features(false).with_text_features(false);
    assert!(matches!(Model::new(neither), Err(ResaleError::ConfigError(_))));

    let json = r#"{"model_name": "x", "estimator": {"svm": {}}}"#;
    assert!(matches!(ModelConfig::from_json(json), Err(ResaleError::ConfigError(_))));
}

#[test]
fn test_text_and_tabular_model() {
    let config = ridge_config()
        .with_text_features(true)
        .with_extractor_params(TextConfig::default().with_n_components(2));
    let model = fitted(config, 60, 7);

    let (df, _) = common::frame(10, 8);
    let names = model.feature_names().unwrap();
    assert_eq!(Some(names.len()), model.n_features());
    assert_eq!(model.features(&df).unwrap().ncols(), names.len());
    assert!(names.iter().any(|n| n == "hashtags_missing"));
    assert!(model.predict(&df).unwrap().iter().all(|p| *p >= 0.0));
}

#[test]
fn test_text_only_model() {
    let config = ModelConfig::new(EstimatorConfig::from(EstimatorKind::DecisionTree))
        .with_tab_features(false)
        .with_text_features(true)
        .with_target_transform(TargetTransform::Identity);
    let model = fitted(config, 50, 9);
    let (df, _) = common::frame(5, 10);
    assert_eq!(model.predict(&df).unwrap().len(), 5);
}

#[test]
fn test_directory_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = DirectoryStore::new(dir.path());
    let model = fitted(ridge_config(), 40, 11);

    model.save_to_store(&store, "models", "ridge.rpm", BTreeMap::new()).unwrap();
    assert!(dir.path().join("models").join("ridge.rpm").exists());

    let (loaded, meta) = Model::load_from_store(&store, "models", "ridge.rpm").unwrap();
    assert_eq!(meta.model_name, "ridge");
    let (df, _) = common::frame(10, 12);
    assert_eq!(loaded.predict(&df).unwrap(), model.predict(&df).unwrap());

    assert!(store.get("models", "other.rpm").unwrap_err().is_not_found());
    assert!(matches!(
        store.put("models", "../escape.rpm", b"x"),
        Err(ResaleError::InvalidInput(_))
    ));
}
