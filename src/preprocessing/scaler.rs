//! Numeric feature scaling

use crate::error::{ResaleError, Result};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Type of scaler to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    Standard,
    /// Min-Max scaling: (x - min) / (max - min)
    MinMax,
    /// Robust scaling using median and IQR
    Robust,
    /// Max absolute scaling: x / max(|x|)
    MaxAbs,
    /// No scaling
    None,
}

impl Default for ScalerType {
    fn default() -> Self {
        ScalerType::Standard
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScalerParams {
    center: f64, // mean, min, or median
    scale: f64,  // std, range, or IQR
}

/// Numeric column scaler. Missing values are imputed with the fitted centre.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    scaler_type: ScalerType,
    columns: Vec<String>,
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl Scaler {
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            columns: Vec::new(),
            params: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Fit the scaler to the given columns
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        let params = columns
            .iter()
            .map(|name| {
                let ca = numeric(df, name)?;
                self.compute_params(&ca)
            })
            .collect::<Result<Vec<_>>>()?;

        self.columns = columns.to_vec();
        self.params = params;
        self.is_fitted = true;
        Ok(self)
    }

    /// Scale the fitted columns into a dense block, one output column per input
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(ResaleError::ModelNotFitted);
        }

        let mut out = Array2::zeros((df.height(), self.columns.len()));
        for (j, (name, params)) in self.columns.iter().zip(self.params.iter()).enumerate() {
            let ca = numeric(df, name)?;
            for (i, value) in ca.into_iter().enumerate() {
                let v = value.filter(|v| v.is_finite()).unwrap_or(params.center);
                out[[i, j]] = (v - params.center) / params.scale;
            }
        }
        Ok(out)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    fn compute_params(&self, ca: &Float64Chunked) -> Result<ScalerParams> {
        match self.scaler_type {
            ScalerType::Standard => {
                let mean = ca.mean().unwrap_or(0.0);
                let std = ca.std(0).unwrap_or(1.0);
                Ok(ScalerParams {
                    center: mean,
                    scale: if std == 0.0 { 1.0 } else { std },
                })
            }
            ScalerType::MinMax => {
                let min = ca.min().unwrap_or(0.0);
                let max = ca.max().unwrap_or(1.0);
                let range = max - min;
                Ok(ScalerParams {
                    center: min,
                    scale: if range == 0.0 { 1.0 } else { range },
                })
            }
            ScalerType::Robust => {
                let median = ca.median().unwrap_or(0.0);
                let q1 = ca.quantile(0.25, QuantileMethod::Linear)?.unwrap_or(0.0);
                let q3 = ca.quantile(0.75, QuantileMethod::Linear)?.unwrap_or(1.0);
                let iqr = q3 - q1;
                Ok(ScalerParams {
                    center: median,
                    scale: if iqr == 0.0 { 1.0 } else { iqr },
                })
            }
            ScalerType::MaxAbs => {
                let max_abs = ca
                    .into_iter()
                    .filter_map(|v| v.map(|x| x.abs()))
                    .fold(0.0f64, |a, b| a.max(b));
                Ok(ScalerParams {
                    center: 0.0,
                    scale: if max_abs == 0.0 { 1.0 } else { max_abs },
                })
            }
            ScalerType::None => Ok(ScalerParams {
                center: 0.0,
                scale: 1.0,
            }),
        }
    }
}

fn numeric(df: &DataFrame, name: &str) -> Result<Float64Chunked> {
    let column = df
        .column(name)
        .map_err(|_| ResaleError::FeatureNotFound(name.to_string()))?;
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    Ok(series.f64()?.clone())
}
