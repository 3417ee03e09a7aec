use crate::domain::errors::ForecastError;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Zero-mean, unit-variance transform for a single feature.
///
/// Parameters are captured once by [`StandardScaler::fit`]; `transform` and
/// `inverse_transform` are pure functions of those parameters, so data seen
/// after fitting can never leak into them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: f64,
    scale: f64,
}

impl StandardScaler {
    /// Fits on `values` using the population standard deviation. A constant
    /// series gets a unit scale.
    pub fn fit(values: &[f64]) -> Result<Self, ForecastError> {
        if values.is_empty() {
            return Err(ForecastError::invalid("cannot fit scaler on empty series"));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::invalid("cannot fit scaler on non-finite values"));
        }

        let mean = values.iter().mean();
        let std_dev = values.iter().population_std_dev();
        let scale = if std_dev.is_finite() && std_dev > 0.0 {
            std_dev
        } else {
            1.0
        };
        Ok(Self { mean, scale })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn transform(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| (v - self.mean) / self.scale).collect()
    }

    pub fn inverse_transform(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| v * self.scale + self.mean).collect()
    }
}
