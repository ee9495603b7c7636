//! Tabular preprocessing configuration

use super::scaler::ScalerType;
use crate::error::{ResaleError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Categorical columns eligible for encoding, in routing order
pub const CATEGORICAL_UNIVERSE: [&str; 7] = [
    "designer",
    "department",
    "category",
    "subcategory",
    "size",
    "color",
    "condition",
];

/// Fixed condition ranks, worst to best
pub const CONDITION_ORDER: [&str; 4] = ["Worn", "Used", "Gently Used", "New"];

/// Numeric scaler settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalerParamsConfig {
    pub scaler: ScalerType,
}

/// What a one-hot encoder does with values unseen during fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownPolicy {
    Error,
    /// All-zero block
    #[default]
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OneHotParams {
    pub handle_unknown: UnknownPolicy,
}

/// What an ordinal encoder does with values unseen during fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrdinalUnknown {
    Error,
    /// Encode as [`super::encoder::UNKNOWN_RANK`]
    #[default]
    Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrdinalParams {
    pub handle_unknown: OrdinalUnknown,
    /// Explicit rank order per column; other columns rank their sorted values
    pub orderings: BTreeMap<String, Vec<String>>,
}

impl Default for OrdinalParams {
    fn default() -> Self {
        let mut orderings = BTreeMap::new();
        orderings.insert(
            "condition".to_string(),
            CONDITION_ORDER.iter().map(|s| s.to_string()).collect(),
        );
        Self {
            handle_unknown: OrdinalUnknown::Value,
            orderings,
        }
    }
}

/// Ordered target statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatBoostParams {
    /// Weight of the prior
    pub a: f64,
}

impl Default for CatBoostParams {
    fn default() -> Self {
        Self { a: 1.0 }
    }
}

/// Smoothed target means
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetParams {
    pub min_samples_leaf: usize,
    pub smoothing: f64,
}

impl Default for TargetParams {
    fn default() -> Self {
        Self {
            min_samples_leaf: 20,
            smoothing: 10.0,
        }
    }
}

/// Configuration for the tabular feature transformer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabularConfig {
    pub numeric_cols: Vec<String>,
    pub ohe_cols: Vec<String>,
    pub oe_cols: Vec<String>,
    pub catboost_cols: Vec<String>,
    /// `None` or an empty list routes every unclaimed categorical column here
    pub te_cols: Option<Vec<String>>,
    pub scaler_params: ScalerParamsConfig,
    pub ohe_params: OneHotParams,
    pub oe_params: OrdinalParams,
    pub catboost_params: CatBoostParams,
    pub te_params: TargetParams,
    pub normalize_size: bool,
    /// Inspection mode: declared columns pass through unencoded
    pub no_encoding: bool,
}

fn strings(cols: &[&str]) -> Vec<String> {
    cols.iter().map(|s| s.to_string()).collect()
}

impl Default for TabularConfig {
    fn default() -> Self {
        Self {
            numeric_cols: strings(&["n_photos"]),
            ohe_cols: strings(&["department", "category"]),
            oe_cols: strings(&["condition"]),
            catboost_cols: Vec::new(),
            te_cols: None,
            scaler_params: ScalerParamsConfig::default(),
            ohe_params: OneHotParams::default(),
            oe_params: OrdinalParams::default(),
            catboost_params: CatBoostParams::default(),
            te_params: TargetParams::default(),
            normalize_size: false,
            no_encoding: false,
        }
    }
}

impl TabularConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_numeric_cols(mut self, cols: &[&str]) -> Self {
        self.numeric_cols = strings(cols);
        self
    }

    pub fn with_ohe_cols(mut self, cols: &[&str]) -> Self {
        self.ohe_cols = strings(cols);
        self
    }

    pub fn with_oe_cols(mut self, cols: &[&str]) -> Self {
        self.oe_cols = strings(cols);
        self
    }

    pub fn with_catboost_cols(mut self, cols: &[&str]) -> Self {
        self.catboost_cols = strings(cols);
        self
    }

    pub fn with_te_cols(mut self, cols: Option<&[&str]>) -> Self {
        self.te_cols = cols.map(strings);
        self
    }

    pub fn with_scaler(mut self, scaler: ScalerType) -> Self {
        self.scaler_params.scaler = scaler;
        self
    }

    pub fn with_ohe_params(mut self, params: OneHotParams) -> Self {
        self.ohe_params = params;
        self
    }

    pub fn with_oe_params(mut self, params: OrdinalParams) -> Self {
        self.oe_params = params;
        self
    }

    pub fn with_catboost_params(mut self, params: CatBoostParams) -> Self {
        self.catboost_params = params;
        self
    }

    pub fn with_te_params(mut self, params: TargetParams) -> Self {
        self.te_params = params;
        self
    }

    pub fn with_normalize_size(mut self, normalize: bool) -> Self {
        self.normalize_size = normalize;
        self
    }

    pub fn with_no_encoding(mut self, no_encoding: bool) -> Self {
        self.no_encoding = no_encoding;
        self
    }

    /// Check parameter ranges
    pub fn validate(&self) -> Result<()> {
        if !(self.catboost_params.a > 0.0) {
            return Err(ResaleError::InvalidParameter {
                name: "catboost_params.a".to_string(),
                value: self.catboost_params.a.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if !(self.te_params.smoothing > 0.0) {
            return Err(ResaleError::InvalidParameter {
                name: "te_params.smoothing".to_string(),
                value: self.te_params.smoothing.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}
