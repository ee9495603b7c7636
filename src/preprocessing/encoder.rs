//! Categorical encoding implementations
//!
//! Four encoders share one calling convention: columns arrive as vectors of
//! optional strings (null = missing), and each encoder emits a dense block.
//! The target-aware encoders (CatBoost, target) need `y` at fit time.

use super::config::{
    CatBoostParams, OneHotParams, OrdinalParams, OrdinalUnknown, TargetParams, UnknownPolicy,
};
use crate::error::{ResaleError, Result};
use crate::utils::data_loader::string_column;
use ndarray::Array2;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Ordinal code for values unseen during fit
pub const UNKNOWN_RANK: f64 = -1.0;
/// Ordinal code for missing values
pub const MISSING_RANK: f64 = -2.0;

/// One categorical column: `None` marks a missing value
pub type CategoricalValues = Vec<Option<String>>;

/// Type of encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncoderKind {
    OneHot,
    Ordinal,
    CatBoost,
    Target,
}

impl EncoderKind {
    pub fn is_target_aware(&self) -> bool {
        matches!(self, EncoderKind::CatBoost | EncoderKind::Target)
    }
}

fn check_columns(names: &[String], columns: &[CategoricalValues]) -> Result<usize> {
    if names.len() != columns.len() {
        return Err(ResaleError::ShapeError {
            expected: format!("{} columns", names.len()),
            actual: format!("{} columns", columns.len()),
        });
    }
    let n_rows = columns.first().map(|c| c.len()).unwrap_or(0);
    if let Some(bad) = columns.iter().find(|c| c.len() != n_rows) {
        return Err(ResaleError::ShapeError {
            expected: format!("{} rows", n_rows),
            actual: format!("{} rows", bad.len()),
        });
    }
    Ok(n_rows)
}

fn require_target<'a>(kind: EncoderKind, y: Option<&'a [f64]>, n_rows: usize) -> Result<&'a [f64]> {
    let y = y.ok_or_else(|| {
        ResaleError::InvalidInput(format!("{:?} encoder requires a target at fit time", kind))
    })?;
    if y.len() != n_rows {
        return Err(ResaleError::ShapeError {
            expected: format!("{} target values", n_rows),
            actual: format!("{} target values", y.len()),
        });
    }
    Ok(y)
}

fn mean(y: &[f64]) -> f64 {
    if y.is_empty() {
        0.0
    } else {
        y.iter().sum::<f64>() / y.len() as f64
    }
}

/// One-hot encoder with sorted categories per column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneHotEncoder {
    params: OneHotParams,
    columns: Vec<String>,
    categories: Vec<Vec<String>>,
    is_fitted: bool,
}

impl OneHotEncoder {
    pub fn new(params: OneHotParams) -> Self {
        Self {
            params,
            columns: Vec::new(),
            categories: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn categories(&self) -> &[Vec<String>] {
        &self.categories
    }

    pub fn fit_values(&mut self, names: &[String], columns: &[CategoricalValues]) -> Result<()> {
        check_columns(names, columns)?;
        self.categories = columns
            .iter()
            .map(|col| {
                col.iter()
                    .flatten()
                    .cloned()
                    .collect::<BTreeSet<String>>()
                    .into_iter()
                    .collect()
            })
            .collect();
        self.columns = names.to_vec();
        self.is_fitted = true;
        Ok(())
    }

    pub fn transform_values(&self, columns: &[CategoricalValues]) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(ResaleError::ModelNotFitted);
        }
        let n_rows = check_columns(&self.columns, columns)?;
        let mut out = Array2::zeros((n_rows, self.width()));

        let mut offset = 0;
        for (j, col) in columns.iter().enumerate() {
            let cats = &self.categories[j];
            for (i, value) in col.iter().enumerate() {
                let Some(value) = value else { continue };
                match cats.binary_search(value) {
                    Ok(k) => out[[i, offset + k]] = 1.0,
                    Err(_) => {
                        if self.params.handle_unknown == UnknownPolicy::Error {
                            return Err(ResaleError::UnknownCategory {
                                column: self.columns[j].clone(),
                                value: value.clone(),
                            });
                        }
                    }
                }
            }
            offset += cats.len();
        }
        Ok(out)
    }

    fn width(&self) -> usize {
        self.categories.iter().map(Vec::len).sum()
    }

    fn feature_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .zip(self.categories.iter())
            .flat_map(|(col, cats)| cats.iter().map(move |c| format!("{}_{}", col, c)))
            .collect()
    }
}

/// Ordinal encoder with explicit or sorted ranks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdinalEncoder {
    params: OrdinalParams,
    columns: Vec<String>,
    ranks: Vec<BTreeMap<String, f64>>,
    is_fitted: bool,
}

impl OrdinalEncoder {
    pub fn new(params: OrdinalParams) -> Self {
        Self {
            params,
            columns: Vec::new(),
            ranks: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn fit_values(&mut self, names: &[String], columns: &[CategoricalValues]) -> Result<()> {
        check_columns(names, columns)?;
        self.ranks = names
            .iter()
            .zip(columns.iter())
            .map(|(name, col)| {
                let order: Vec<String> = match self.params.orderings.get(name) {
                    Some(order) => order.clone(),
                    None => col
                        .iter()
                        .flatten()
                        .cloned()
                        .collect::<BTreeSet<String>>()
                        .into_iter()
                        .collect(),
                };
                order
                    .into_iter()
                    .enumerate()
                    .map(|(rank, value)| (value, rank as f64))
                    .collect()
            })
            .collect();
        self.columns = names.to_vec();
        self.is_fitted = true;
        Ok(())
    }

    pub fn transform_values(&self, columns: &[CategoricalValues]) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(ResaleError::ModelNotFitted);
        }
        let n_rows = check_columns(&self.columns, columns)?;
        let mut out = Array2::zeros((n_rows, self.columns.len()));

        for (j, col) in columns.iter().enumerate() {
            for (i, value) in col.iter().enumerate() {
                out[[i, j]] = match value {
                    None => MISSING_RANK,
                    Some(v) => match self.ranks[j].get(v) {
                        Some(rank) => *rank,
                        None if self.params.handle_unknown == OrdinalUnknown::Error => {
                            return Err(ResaleError::UnknownCategory {
                                column: self.columns[j].clone(),
                                value: v.clone(),
                            })
                        }
                        None => UNKNOWN_RANK,
                    },
                };
            }
        }
        Ok(out)
    }
}

/// Per-category running sums of the target
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TargetStats {
    sum: f64,
    count: usize,
}

fn category_stats(col: &CategoricalValues, y: &[f64]) -> BTreeMap<String, TargetStats> {
    let mut stats: BTreeMap<String, TargetStats> = BTreeMap::new();
    for (value, target) in col.iter().zip(y.iter()) {
        if let Some(v) = value {
            let entry = stats.entry(v.clone()).or_default();
            entry.sum += target;
            entry.count += 1;
        }
    }
    stats
}

/// CatBoost-style ordered target statistics.
///
/// On the training matrix each row only sees the targets of earlier rows with
/// the same category, which keeps its own label out of its encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatBoostEncoder {
    params: CatBoostParams,
    columns: Vec<String>,
    prior: f64,
    stats: Vec<BTreeMap<String, TargetStats>>,
    is_fitted: bool,
}

impl CatBoostEncoder {
    pub fn new(params: CatBoostParams) -> Self {
        Self {
            params,
            columns: Vec::new(),
            prior: 0.0,
            stats: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn prior(&self) -> f64 {
        self.prior
    }

    pub fn fit_values(&mut self, names: &[String], columns: &[CategoricalValues], y: Option<&[f64]>) -> Result<()> {
        let n_rows = check_columns(names, columns)?;
        let y = require_target(EncoderKind::CatBoost, y, n_rows)?;

        self.prior = mean(y);
        self.stats = columns.iter().map(|col| category_stats(col, y)).collect();
        self.columns = names.to_vec();
        self.is_fitted = true;
        Ok(())
    }

    /// Fit, then encode the training rows with ordered statistics
    pub fn fit_transform_values(
        &mut self,
        names: &[String],
        columns: &[CategoricalValues],
        y: Option<&[f64]>,
    ) -> Result<Array2<f64>> {
        self.fit_values(names, columns, y)?;
        let y = require_target(EncoderKind::CatBoost, y, columns.first().map(|c| c.len()).unwrap_or(0))?;
        let a = self.params.a;

        let mut out = Array2::zeros((y.len(), columns.len()));
        for (j, col) in columns.iter().enumerate() {
            let mut running: BTreeMap<&str, TargetStats> = BTreeMap::new();
            for (i, value) in col.iter().enumerate() {
                out[[i, j]] = match value {
                    None => self.prior,
                    Some(v) => {
                        let entry = running.entry(v.as_str()).or_default();
                        let encoded = (entry.sum + a * self.prior) / (entry.count as f64 + a);
                        entry.sum += y[i];
                        entry.count += 1;
                        encoded
                    }
                };
            }
        }
        Ok(out)
    }

    pub fn transform_values(&self, columns: &[CategoricalValues]) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(ResaleError::ModelNotFitted);
        }
        let n_rows = check_columns(&self.columns, columns)?;
        let a = self.params.a;

        let mut out = Array2::from_elem((n_rows, self.columns.len()), self.prior);
        for (j, col) in columns.iter().enumerate() {
            for (i, value) in col.iter().enumerate() {
                if let Some(stats) = value.as_ref().and_then(|v| self.stats[j].get(v)) {
                    out[[i, j]] = (stats.sum + a * self.prior) / (stats.count as f64 + a);
                }
            }
        }
        Ok(out)
    }
}

/// Target encoder blending category means with the global mean
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetEncoder {
    params: TargetParams,
    columns: Vec<String>,
    prior: f64,
    encodings: Vec<BTreeMap<String, f64>>,
    is_fitted: bool,
}

impl TargetEncoder {
    pub fn new(params: TargetParams) -> Self {
        Self {
            params,
            columns: Vec::new(),
            prior: 0.0,
            encodings: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn prior(&self) -> f64 {
        self.prior
    }

    pub fn fit_values(&mut self, names: &[String], columns: &[CategoricalValues], y: Option<&[f64]>) -> Result<()> {
        let n_rows = check_columns(names, columns)?;
        let y = require_target(EncoderKind::Target, y, n_rows)?;

        let prior = mean(y);
        let msl = self.params.min_samples_leaf as f64;
        let smoothing = self.params.smoothing;

        self.encodings = columns
            .iter()
            .map(|col| {
                category_stats(col, y)
                    .into_iter()
                    .map(|(value, stats)| {
                        let n = stats.count as f64;
                        let lambda = 1.0 / (1.0 + (-(n - msl) / smoothing).exp());
                        let category_mean = stats.sum / n;
                        (value, prior * (1.0 - lambda) + category_mean * lambda)
                    })
                    .collect()
            })
            .collect();
        self.prior = prior;
        self.columns = names.to_vec();
        self.is_fitted = true;
        Ok(())
    }

    pub fn transform_values(&self, columns: &[CategoricalValues]) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(ResaleError::ModelNotFitted);
        }
        let n_rows = check_columns(&self.columns, columns)?;

        let mut out = Array2::from_elem((n_rows, self.columns.len()), self.prior);
        for (j, col) in columns.iter().enumerate() {
            for (i, value) in col.iter().enumerate() {
                if let Some(encoded) = value.as_ref().and_then(|v| self.encodings[j].get(v)) {
                    out[[i, j]] = *encoded;
                }
            }
        }
        Ok(out)
    }
}

/// Enum dispatch over the four encoders
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ColumnEncoder {
    OneHot(OneHotEncoder),
    Ordinal(OrdinalEncoder),
    CatBoost(CatBoostEncoder),
    Target(TargetEncoder),
}

impl ColumnEncoder {
    pub fn kind(&self) -> EncoderKind {
        match self {
            ColumnEncoder::OneHot(_) => EncoderKind::OneHot,
            ColumnEncoder::Ordinal(_) => EncoderKind::Ordinal,
            ColumnEncoder::CatBoost(_) => EncoderKind::CatBoost,
            ColumnEncoder::Target(_) => EncoderKind::Target,
        }
    }

    pub fn columns(&self) -> &[String] {
        match self {
            ColumnEncoder::OneHot(e) => &e.columns,
            ColumnEncoder::Ordinal(e) => &e.columns,
            ColumnEncoder::CatBoost(e) => &e.columns,
            ColumnEncoder::Target(e) => &e.columns,
        }
    }

    pub fn is_fitted(&self) -> bool {
        match self {
            ColumnEncoder::OneHot(e) => e.is_fitted,
            ColumnEncoder::Ordinal(e) => e.is_fitted,
            ColumnEncoder::CatBoost(e) => e.is_fitted,
            ColumnEncoder::Target(e) => e.is_fitted,
        }
    }

    pub fn fit_values(&mut self, names: &[String], columns: &[CategoricalValues], y: Option<&[f64]>) -> Result<()> {
        match self {
            ColumnEncoder::OneHot(e) => e.fit_values(names, columns),
            ColumnEncoder::Ordinal(e) => e.fit_values(names, columns),
            ColumnEncoder::CatBoost(e) => e.fit_values(names, columns, y),
            ColumnEncoder::Target(e) => e.fit_values(names, columns, y),
        }
    }

    /// Fit and encode the training rows. Only CatBoost differs from
    /// fit-then-transform.
    pub fn fit_transform_values(
        &mut self,
        names: &[String],
        columns: &[CategoricalValues],
        y: Option<&[f64]>,
    ) -> Result<Array2<f64>> {
        if let ColumnEncoder::CatBoost(e) = self {
            return e.fit_transform_values(names, columns, y);
        }
        self.fit_values(names, columns, y)?;
        self.transform_values(columns)
    }

    pub fn transform_values(&self, columns: &[CategoricalValues]) -> Result<Array2<f64>> {
        match self {
            ColumnEncoder::OneHot(e) => e.transform_values(columns),
            ColumnEncoder::Ordinal(e) => e.transform_values(columns),
            ColumnEncoder::CatBoost(e) => e.transform_values(columns),
            ColumnEncoder::Target(e) => e.transform_values(columns),
        }
    }

    pub fn fit(&mut self, df: &DataFrame, columns: &[String], y: Option<&[f64]>) -> Result<()> {
        let values = extract_columns(df, columns)?;
        self.fit_values(columns, &values, y)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String], y: Option<&[f64]>) -> Result<Array2<f64>> {
        let values = extract_columns(df, columns)?;
        self.fit_transform_values(columns, &values, y)
    }

    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted() {
            return Err(ResaleError::ModelNotFitted);
        }
        let values = extract_columns(df, self.columns())?;
        self.transform_values(&values)
    }

    /// Width of the emitted block
    pub fn n_output_columns(&self) -> usize {
        match self {
            ColumnEncoder::OneHot(e) => e.width(),
            other => other.columns().len(),
        }
    }

    pub fn feature_names(&self) -> Vec<String> {
        match self {
            ColumnEncoder::OneHot(e) => e.feature_names(),
            other => other.columns().to_vec(),
        }
    }
}

/// Read the named columns of a frame as categorical values
pub fn extract_columns(df: &DataFrame, columns: &[String]) -> Result<Vec<CategoricalValues>> {
    columns.iter().map(|name| string_column(df, name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|s| s.to_string()).collect()
    }

    fn values(vals: &[Option<&str>]) -> CategoricalValues {
        vals.iter().map(|v| v.map(str::to_string)).collect()
    }

    #[test]
    fn test_onehot_sorted_categories() {
        let mut encoder = OneHotEncoder::new(OneHotParams::default());
        let col = values(&[Some("tops"), Some("bottoms"), Some("tops"), None]);
        encoder.fit_values(&names(&["category"]), &[col.clone()]).unwrap();

        assert_eq!(encoder.categories()[0], vec!["bottoms", "tops"]);
        let out = encoder.transform_values(&[col]).unwrap();
        assert_eq!(out.row(0).to_vec(), vec![0.0, 1.0]);
        assert_eq!(out.row(1).to_vec(), vec![1.0, 0.0]);
        assert_eq!(out.row(3).to_vec(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_onehot_unknown_policies() {
        let train = values(&[Some("tops"), Some("bottoms")]);
        let unseen = values(&[Some("footwear")]);

        let mut ignore = OneHotEncoder::new(OneHotParams::default());
        ignore.fit_values(&names(&["category"]), &[train.clone()]).unwrap();
        let out = ignore.transform_values(&[unseen.clone()]).unwrap();
        assert!(out.iter().all(|v| *v == 0.0));

        let mut strict = OneHotEncoder::new(OneHotParams {
            handle_unknown: UnknownPolicy::Error,
        });
        strict.fit_values(&names(&["category"]), &[train]).unwrap();
        let err = strict.transform_values(&[unseen]).unwrap_err();
        assert!(matches!(err, ResaleError::UnknownCategory { ref value, .. } if value == "footwear"));
    }

    #[test]
    fn test_ordinal_condition_ranks() {
        let mut encoder = OrdinalEncoder::new(OrdinalParams::default());
        let col = values(&[Some("New"), Some("Worn"), Some("Gently Used"), Some("Mint"), None]);
        encoder.fit_values(&names(&["condition"]), &[col.clone()]).unwrap();

        let out = encoder.transform_values(&[col]).unwrap();
        assert_eq!(out.column(0).to_vec(), vec![3.0, 0.0, 2.0, UNKNOWN_RANK, MISSING_RANK]);
    }

    #[test]
    fn test_ordinal_sorted_ranks_and_error_policy() {
        let params = OrdinalParams {
            handle_unknown: OrdinalUnknown::Error,
            ..Default::default()
        };
        let mut encoder = OrdinalEncoder::new(params);
        encoder
            .fit_values(&names(&["color"]), &[values(&[Some("red"), Some("black")])])
            .unwrap();
        let out = encoder.transform_values(&[values(&[Some("red")])]).unwrap();
        assert_eq!(out[[0, 0]], 1.0);

        assert!(encoder.transform_values(&[values(&[Some("blue")])]).is_err());
    }

    #[test]
    fn test_catboost_ordered_statistics() {
        let mut encoder = CatBoostEncoder::new(CatBoostParams::default());
        let col = values(&[Some("a"), Some("a"), Some("b"), Some("a")]);
        let y = [1.0, 3.0, 5.0, 7.0];
        let out = encoder
            .fit_transform_values(&names(&["designer"]), &[col], Some(&y))
            .unwrap();

        let prior = 4.0;
        assert_eq!(encoder.prior(), prior);
        // first "a": no history
        assert!((out[[0, 0]] - prior).abs() < 1e-12);
        // second "a": one earlier row with y=1
        assert!((out[[1, 0]] - (1.0 + prior) / 2.0).abs() < 1e-12);
        // third "a": earlier rows 1 and 3
        assert!((out[[3, 0]] - (4.0 + prior) / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_catboost_full_statistics_and_fallback() {
        let mut encoder = CatBoostEncoder::new(CatBoostParams::default());
        let col = values(&[Some("a"), Some("a"), Some("b")]);
        let y = [2.0, 4.0, 6.0];
        encoder.fit_values(&names(&["designer"]), &[col], Some(&y)).unwrap();

        let out = encoder
            .transform_values(&[values(&[Some("a"), Some("zzz"), None])])
            .unwrap();
        assert!((out[[0, 0]] - (6.0 + 4.0) / 3.0).abs() < 1e-12);
        assert_eq!(out[[1, 0]], 4.0);
        assert_eq!(out[[2, 0]], 4.0);
    }

    #[test]
    fn test_target_encoder_smoothing() {
        let mut encoder = TargetEncoder::new(TargetParams {
            min_samples_leaf: 1,
            smoothing: 1.0,
        });
        let col = values(&[Some("a"), Some("a"), Some("b")]);
        let y = [10.0, 20.0, 60.0];
        encoder.fit_values(&names(&["designer"]), &[col], Some(&y)).unwrap();

        let prior = 30.0;
        let lambda = 1.0 / (1.0 + (-1.0f64).exp());
        let expected = prior * (1.0 - lambda) + 15.0 * lambda;
        let out = encoder
            .transform_values(&[values(&[Some("a"), Some("unseen")])])
            .unwrap();
        assert!((out[[0, 0]] - expected).abs() < 1e-12);
        assert_eq!(out[[1, 0]], prior);
    }

    #[test]
    fn test_target_aware_requires_y() {
        let mut encoder = ColumnEncoder::Target(TargetEncoder::new(TargetParams::default()));
        let err = encoder
            .fit_values(&names(&["designer"]), &[values(&[Some("a")])], None)
            .unwrap_err();
        assert!(matches!(err, ResaleError::InvalidInput(_)));
    }

    #[test]
    fn test_column_encoder_on_frame() {
        let df = df!(
            "department" => &["menswear", "womenswear", "menswear"],
            "category" => &["tops", "tops", "bottoms"],
        )
        .unwrap();
        let cols = names(&["department", "category"]);

        let mut encoder = ColumnEncoder::OneHot(OneHotEncoder::new(OneHotParams::default()));
        let out = encoder.fit_transform(&df, &cols, None).unwrap();
        assert_eq!(out.ncols(), 4);
        assert_eq!(encoder.n_output_columns(), 4);
        assert_eq!(
            encoder.feature_names(),
            vec!["department_menswear", "department_womenswear", "category_bottoms", "category_tops"]
        );

        let missing = df!("department" => &["menswear"]).unwrap();
        assert!(matches!(
            encoder.transform(&missing),
            Err(ResaleError::FeatureNotFound(_))
        ));
    }
}
