//! Integration test: text feature extraction end-to-end

mod common;

use polars::prelude::*;
use resale_price::decomposition::{ReducerKind, ReducerParams};
use resale_price::error::ResaleError;
use resale_price::feature_engineering::{
    text_stats, TextConfig, TextFeatureExtractor, VectorizerKind, VectorizerParams,
};
use resale_price::utils::data_loader::string_column;

fn config(n_components: usize) -> TextConfig {
    TextConfig::default().with_n_components(n_components)
}

#[test]
fn test_width_and_column_order() {
    let (df, _) = common::frame(60, 21);
    let mut extractor = TextFeatureExtractor::new(config(3)).unwrap();
    let x = extractor.fit_transform(&df).unwrap();

    // 3 columns × (3 components + 3 stats) + sentiment + hashtags indicator
    assert_eq!(x.dim(), (60, 3 * (3 + 3) + 2));
    let names = extractor.feature_names();
    assert_eq!(names.len(), x.ncols());
    assert_eq!(names[0], "item_name_pca0");
    assert_eq!(names[3], "description_pca0");
    assert_eq!(names[9], "item_name_length");
    assert_eq!(names[x.ncols() - 2], "description_sentiment");
    assert_eq!(names[x.ncols() - 1], "hashtags_missing");
}

#[test]
fn test_missing_hashtags_indicator() {
    let (df, _) = common::frame(40, 4);
    let mut extractor = TextFeatureExtractor::new(config(2)).unwrap();
    let x = extractor.fit_transform(&df).unwrap();

    let hashtags = string_column(&df, "hashtags").unwrap();
    let last = x.ncols() - 1;
    for (i, value) in hashtags.iter().enumerate() {
        let expected = if value.as_deref() == Some("missing") { 1.0 } else { 0.0 };
        assert_eq!(x[[i, last]], expected);
    }
}

#[test]
fn test_transform_matches_fit_transform() {
    let (df, _) = common::frame(50, 8);
    for kind in [VectorizerKind::Count, VectorizerKind::Tfidf] {
        let cfg = config(2).with_vectorizer(kind, VectorizerParams::default());
        let mut extractor = TextFeatureExtractor::new(cfg).unwrap();
        let fitted = extractor.fit_transform(&df).unwrap();
        let again = extractor.transform(&df).unwrap();
        assert_eq!(fitted.dim(), again.dim());
        for (a, b) in fitted.iter().zip(again.iter()) {
            assert!((a - b).abs() < 1e-8, "{:?}: {} vs {}", kind, a, b);
        }
        assert_eq!(extractor.transform(&df).unwrap(), again);
    }
}

#[test]
fn test_umap_reducer_is_deterministic() {
    let (df, _) = common::frame(40, 13);
    let params = ReducerParams::default().with_n_components(2);
    let cfg = TextConfig::default()
        .with_text_cols(&["item_name"])
        .with_reducer(ReducerKind::Umap, ReducerParams { n_neighbors: 5, n_epochs: 50, ..params });

    let mut first = TextFeatureExtractor::new(cfg.clone()).unwrap();
    let mut second = TextFeatureExtractor::new(cfg).unwrap();
    let a = first.fit_transform(&df).unwrap();
    let b = second.fit_transform(&df).unwrap();
    assert_eq!(a, b);

    let fresh = first.transform(&df.head(Some(5))).unwrap();
    assert_eq!(fresh.nrows(), 5);
    assert!(fresh.iter().all(|v| v.is_finite()));
}

#[test]
fn test_empty_and_placeholder_text() {
    assert_eq!(text_stats(Some("")), [0.0, 0.0, 0.0]);
    assert_eq!(text_stats(Some("missing")), [0.0, 0.0, 0.0]);
    assert_eq!(text_stats(Some("   ")), [0.0, 0.0, 0.0]);

    let df = df!(
        "item_name" => &["wool coat", "missing", ""],
        "description" => &["missing", "", "lovely soft wool"],
        "hashtags" => &["missing", "#coat", "missing"],
    )
    .unwrap();
    let cfg = TextConfig::default().with_embeddings(false);
    let mut extractor = TextFeatureExtractor::new(cfg).unwrap();
    let x = extractor.fit_transform(&df).unwrap();
    assert_eq!(x.ncols(), 3 * 3 + 2);
    // description stats of the placeholder row and the sentiment of the placeholder
    assert_eq!(&x.row(0).to_vec()[3..6], &[0.0, 0.0, 0.0]);
    assert_eq!(x[[0, 9]], 0.0);
    assert_eq!(x[[1, 9]], 0.0);
    assert!(x[[2, 9]] > 0.0);
}

#[test]
fn test_unknown_names_fail_before_fit() {
    let err = TextConfig::default().with_vectorizer_name("word2vec").unwrap_err();
    assert!(matches!(err, ResaleError::ConfigError(_)));
    assert!(err.to_string().contains("word2vec"));
    assert!(err.to_string().contains("tfidf"));

    let err = TextConfig::default().with_reducer_name("tsne").unwrap_err();
    assert!(err.to_string().contains("umap"));
}

#[test]
fn test_missing_text_column() {
    let (df, _) = common::frame(20, 2);
    let mut extractor = TextFeatureExtractor::new(config(2)).unwrap();
    let without = df.drop("description").unwrap();
    assert!(matches!(
        extractor.fit_transform(&without),
        Err(ResaleError::FeatureNotFound(_))
    ));
}
