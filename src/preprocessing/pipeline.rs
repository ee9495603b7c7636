//! Tabular feature pipeline
//!
//! Composes size normalisation, numeric scaling and the categorical encoder
//! groups into one fit/transform unit. Output blocks are laid out as: size,
//! numeric, one-hot, ordinal, CatBoost, target.

use super::config::TabularConfig;
use super::encoder::{
    CatBoostEncoder, CategoricalValues, ColumnEncoder, EncoderKind, OneHotEncoder, OrdinalEncoder,
    TargetEncoder,
};
use super::routing::{EncodingAssignment, SIZE_COLUMN};
use super::scaler::Scaler;
use super::size::SizeNormalizer;
use crate::error::{ResaleError, Result};
use crate::utils::data_loader::string_column;
use ndarray::{concatenate, Array2, ArrayView2, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

fn make_encoder(kind: EncoderKind, config: &TabularConfig) -> ColumnEncoder {
    match kind {
        EncoderKind::OneHot => ColumnEncoder::OneHot(OneHotEncoder::new(config.ohe_params.clone())),
        EncoderKind::Ordinal => ColumnEncoder::Ordinal(OrdinalEncoder::new(config.oe_params.clone())),
        EncoderKind::CatBoost => {
            ColumnEncoder::CatBoost(CatBoostEncoder::new(config.catboost_params.clone()))
        }
        EncoderKind::Target => ColumnEncoder::Target(TargetEncoder::new(config.te_params.clone())),
    }
}

/// Numeric + categorical feature transformer.
///
/// Not thread-safe to fit; clone before fitting in parallel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabularFeatureTransformer {
    config: TabularConfig,
    assignment: EncodingAssignment,
    size_normalizer: SizeNormalizer,
    size_encoder: Option<ColumnEncoder>,
    scaler: Option<Scaler>,
    /// (columns, encoder) for every non-empty group, in output order
    encoders: Vec<(Vec<String>, ColumnEncoder)>,
    is_fitted: bool,
    fit_time: Option<f64>,
}

impl TabularFeatureTransformer {
    pub fn new(config: TabularConfig) -> Result<Self> {
        config.validate()?;
        let assignment = EncodingAssignment::from_config(&config)?;

        let size_encoder = assignment.size_encoder.map(|kind| make_encoder(kind, &config));
        let scaler = (!assignment.numeric.is_empty())
            .then(|| Scaler::new(config.scaler_params.scaler));
        let encoders = assignment
            .groups()
            .into_iter()
            .filter(|(_, cols)| !cols.is_empty())
            .map(|(kind, cols)| (cols.to_vec(), make_encoder(kind, &config)))
            .collect();

        Ok(Self {
            size_normalizer: SizeNormalizer::new(config.normalize_size),
            config,
            assignment,
            size_encoder,
            scaler,
            encoders,
            is_fitted: false,
            fit_time: None,
        })
    }

    /// Fresh, unfitted transformer for a new configuration
    pub fn reconfigure(&self, config: TabularConfig) -> Result<Self> {
        Self::new(config)
    }

    pub fn config(&self) -> &TabularConfig {
        &self.config
    }

    pub fn assignment(&self) -> &EncodingAssignment {
        &self.assignment
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn fit_time(&self) -> Option<f64> {
        self.fit_time
    }

    fn size_values(&self, df: &DataFrame) -> Result<CategoricalValues> {
        let values = self
            .size_normalizer
            .transform_values(&string_column(df, "category")?, &string_column(df, SIZE_COLUMN)?)?;
        Ok(values.iter().map(|v| v.category_key()).collect())
    }

    fn check_target(df: &DataFrame, y: Option<&[f64]>) -> Result<()> {
        match y {
            Some(y) if y.len() != df.height() => Err(ResaleError::ShapeError {
                expected: format!("{} target values", df.height()),
                actual: format!("{} target values", y.len()),
            }),
            _ => Ok(()),
        }
    }

    /// Fit every block. Target-aware encoders need `y`.
    pub fn fit(&mut self, df: &DataFrame, y: Option<&[f64]>) -> Result<&mut Self> {
        if self.config.no_encoding {
            self.is_fitted = true;
            return Ok(self);
        }
        self.fit_transform(df, y)?;
        Ok(self)
    }

    /// Fit and return the training matrix. CatBoost columns use ordered
    /// statistics here, full statistics in [`Self::transform`].
    pub fn fit_transform(&mut self, df: &DataFrame, y: Option<&[f64]>) -> Result<Array2<f64>> {
        if self.config.no_encoding {
            return Err(ResaleError::ConfigError(
                "no_encoding mode produces an inspection frame, not a feature matrix".to_string(),
            ));
        }
        Self::check_target(df, y)?;
        let start = Instant::now();
        self.is_fitted = false;

        let mut blocks = Vec::with_capacity(self.encoders.len() + 2);

        if self.size_encoder.is_some() {
            let sizes = self.size_values(df)?;
            if let Some(encoder) = self.size_encoder.as_mut() {
                blocks.push(encoder.fit_transform_values(&[SIZE_COLUMN.to_string()], &[sizes], y)?);
            }
        }
        if let Some(scaler) = self.scaler.as_mut() {
            blocks.push(scaler.fit_transform(df, &self.assignment.numeric)?);
        }
        for (cols, encoder) in self.encoders.iter_mut() {
            blocks.push(encoder.fit_transform(df, cols, y)?);
        }

        let matrix = stack(df.height(), &blocks)?;
        self.is_fitted = true;
        self.fit_time = Some(start.elapsed().as_secs_f64());
        debug!(
            rows = df.height(),
            features = matrix.ncols(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fitted tabular features"
        );
        Ok(matrix)
    }

    /// Encode a frame with the fitted state
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if self.config.no_encoding {
            return Err(ResaleError::ConfigError(
                "no_encoding mode has no feature matrix; use inspect()".to_string(),
            ));
        }
        if !self.is_fitted {
            return Err(ResaleError::ModelNotFitted);
        }

        let mut blocks = Vec::with_capacity(self.encoders.len() + 2);
        if let Some(encoder) = &self.size_encoder {
            blocks.push(encoder.transform_values(&[self.size_values(df)?])?);
        }
        if let Some(scaler) = &self.scaler {
            blocks.push(scaler.transform(df)?);
        }
        for (_, encoder) in &self.encoders {
            blocks.push(encoder.transform(df)?);
        }
        stack(df.height(), &blocks)
    }

    /// Declared columns unencoded, followed by the normalised size column
    pub fn inspect(&self, df: &DataFrame) -> Result<DataFrame> {
        let a = &self.assignment;
        let names: Vec<&str> = a
            .numeric
            .iter()
            .chain(a.ordinal.iter())
            .chain(a.one_hot.iter())
            .chain(a.catboost.iter())
            .chain(a.target.iter())
            .map(String::as_str)
            .collect();
        for name in &names {
            if df.get_column_index(name).is_none() {
                return Err(ResaleError::FeatureNotFound(name.to_string()));
            }
        }

        let mut out = df.select(names)?;
        out.with_column(self.size_normalizer.transform_frame(df)?)?;
        Ok(out)
    }

    /// Output column names, in matrix order
    pub fn feature_names(&self) -> Result<Vec<String>> {
        if !self.is_fitted {
            return Err(ResaleError::ModelNotFitted);
        }
        let mut names = Vec::new();
        if let Some(encoder) = &self.size_encoder {
            names.extend(encoder.feature_names());
        }
        names.extend(self.assignment.numeric.iter().cloned());
        for (_, encoder) in &self.encoders {
            names.extend(encoder.feature_names());
        }
        Ok(names)
    }

    /// Width of the output matrix; one-hot widths are known only after fit
    pub fn n_features_out(&self) -> Result<usize> {
        Ok(self.feature_names()?.len())
    }
}

/// Column-wise concatenation of the blocks
pub(crate) fn stack(n_rows: usize, blocks: &[Array2<f64>]) -> Result<Array2<f64>> {
    if blocks.is_empty() {
        return Ok(Array2::zeros((n_rows, 0)));
    }
    let views: Vec<ArrayView2<f64>> = blocks.iter().map(|b| b.view()).collect();
    Ok(concatenate(Axis(1), &views)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::{fixtures, records_to_frame};

    fn frame() -> (DataFrame, Vec<f64>) {
        let records = fixtures::five_listings();
        let y = records.iter().filter_map(|r| r.sold_price).collect();
        (records_to_frame(&records).unwrap(), y)
    }

    #[test]
    fn test_default_width() {
        let (df, y) = frame();
        let mut transformer = TabularFeatureTransformer::new(TabularConfig::default()).unwrap();
        let x = transformer.fit_transform(&df, Some(&y)).unwrap();

        // size(target) + n_photos + department(2) + category(5) + condition + designer, subcategory, color
        assert_eq!(x.ncols(), 1 + 1 + 2 + 5 + 1 + 3);
        assert_eq!(transformer.n_features_out().unwrap(), x.ncols());
        assert_eq!(transformer.feature_names().unwrap()[0], "size");
    }

    #[test]
    fn test_transform_is_idempotent() {
        let (df, y) = frame();
        let mut transformer = TabularFeatureTransformer::new(TabularConfig::default()).unwrap();
        transformer.fit(&df, Some(&y)).unwrap();
        assert_eq!(transformer.transform(&df).unwrap(), transformer.transform(&df).unwrap());
    }

    #[test]
    fn test_size_onehot_with_normalisation() {
        let (df, y) = frame();
        let config = TabularConfig::default()
            .with_ohe_cols(&["department", "category", "size"])
            .with_normalize_size(true);
        let mut transformer = TabularFeatureTransformer::new(config).unwrap();
        transformer.fit(&df, Some(&y)).unwrap();

        let names = transformer.feature_names().unwrap();
        assert_eq!(names[0], "size_0.111111");
        assert_eq!(names[4], "size_1.000000");
    }

    #[test]
    fn test_target_required() {
        let (df, _) = frame();
        let mut transformer = TabularFeatureTransformer::new(TabularConfig::default()).unwrap();
        assert!(matches!(
            transformer.fit(&df, None),
            Err(ResaleError::InvalidInput(_))
        ));
        assert!(!transformer.is_fitted());
    }

    #[test]
    fn test_reconfigure_discards_fit() {
        let (df, y) = frame();
        let mut transformer = TabularFeatureTransformer::new(TabularConfig::default()).unwrap();
        transformer.fit(&df, Some(&y)).unwrap();

        let fresh = transformer
            .reconfigure(TabularConfig::default().with_catboost_cols(&["designer"]))
            .unwrap();
        assert!(!fresh.is_fitted());
        assert!(matches!(fresh.transform(&df), Err(ResaleError::ModelNotFitted)));
        assert_eq!(fresh.assignment().catboost, vec!["designer"]);
    }

    #[test]
    fn test_no_encoding_inspection() {
        let (df, _) = frame();
        let config = TabularConfig::default()
            .with_no_encoding(true)
            .with_normalize_size(true);
        let transformer = TabularFeatureTransformer::new(config).unwrap();

        let inspected = transformer.inspect(&df).unwrap();
        let names: Vec<String> = inspected
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names.first().map(String::as_str), Some("n_photos"));
        assert_eq!(names.last().map(String::as_str), Some("size"));
        assert!(matches!(transformer.transform(&df), Err(ResaleError::ConfigError(_))));
    }
}
