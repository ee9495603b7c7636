//! Constant median baseline

use crate::error::{ResaleError, Result};
use crate::utils::linalg::median;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Predicts the training-target median for every row
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MedianRegressor {
    median: Option<f64>,
}

impl MedianRegressor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn median(&self) -> Option<f64> {
        self.median
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        if x.nrows() != y.len() {
            return Err(ResaleError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        let values = y.to_vec();
        self.median = Some(
            median(&values)
                .ok_or_else(|| ResaleError::InvalidInput("cannot fit on zero samples".to_string()))?,
        );
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let m = self.median.ok_or(ResaleError::ModelNotFitted)?;
        Ok(Array1::from_elem(x.nrows(), m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_median_baseline() {
        let x = Array2::zeros((4, 2));
        let mut model = MedianRegressor::new();
        model.fit(&x, &array![1.0, 9.0, 3.0, 5.0]).unwrap();
        assert_eq!(model.median(), Some(4.0));
        assert_eq!(model.predict(&Array2::zeros((2, 7))).unwrap(), array![4.0, 4.0]);
    }

    #[test]
    fn test_unfitted_and_empty() {
        assert!(matches!(
            MedianRegressor::new().predict(&Array2::zeros((1, 1))),
            Err(ResaleError::ModelNotFitted)
        ));
        assert!(MedianRegressor::new()
            .fit(&Array2::zeros((0, 1)), &Array1::zeros(0))
            .is_err());
    }
}
