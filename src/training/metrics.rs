//! Regression error metrics on the raw price scale

use crate::error::{ResaleError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn check_pair(y_true: &[f64], y_pred: &[f64]) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(ResaleError::InvalidInput(format!(
            "length mismatch: {} true values, {} predictions",
            y_true.len(),
            y_pred.len()
        )));
    }
    if y_true.is_empty() {
        return Err(ResaleError::InvalidInput("cannot score empty input".to_string()));
    }
    for (name, values) in [("true", y_true), ("predicted", y_pred)] {
        if let Some(v) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(ResaleError::InvalidInput(format!(
                "{} values must be finite and non-negative, got {}",
                name, v
            )));
        }
    }
    Ok(())
}

/// Root mean squared logarithmic error, rounded to 3 decimals
pub fn rmsle(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    check_pair(y_true, y_pred)?;
    let mse = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (p.ln_1p() - t.ln_1p()).powi(2))
        .sum::<f64>()
        / y_true.len() as f64;
    Ok(round_to(mse.sqrt(), 3))
}

/// Weighted absolute percentage error `100·Σ|y − ŷ| / Σy`, rounded to 2 decimals
pub fn wape(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    check_pair(y_true, y_pred)?;
    let total: f64 = y_true.iter().sum();
    if total == 0.0 {
        return Err(ResaleError::InvalidInput(
            "WAPE is undefined when the true values sum to zero".to_string(),
        ));
    }
    let abs_err: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).abs()).sum();
    Ok(round_to(100.0 * abs_err / total, 2))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub rmsle: f64,
    pub wape: f64,
}

impl EvaluationMetrics {
    pub fn compute(y_true: &[f64], y_pred: &[f64]) -> Result<Self> {
        Ok(Self {
            rmsle: rmsle(y_true, y_pred)?,
            wape: wape(y_true, y_pred)?,
        })
    }

    /// Name → value map stored in artifact metadata
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("rmsle".to_string(), self.rmsle),
            ("wape".to_string(), self.wape),
        ])
    }
}

impl fmt::Display for EvaluationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RMSLE: {:.3}, WAPE: {:.2}%", self.rmsle, self.wape)
    }
}
