//! Forecast accuracy metrics shared by the baselines and the sequence model.

use crate::domain::errors::ForecastError;
use serde::Serialize;

fn check_pair(y_true: &[f64], y_pred: &[f64]) -> Result<(), ForecastError> {
    if y_true.len() != y_pred.len() {
        return Err(ForecastError::invalid(format!(
            "length mismatch: y_true has {}, y_pred has {}",
            y_true.len(),
            y_pred.len()
        )));
    }
    if y_true.is_empty() {
        return Err(ForecastError::invalid("cannot score empty series"));
    }
    Ok(())
}

/// Root mean squared error.
pub fn rmse(y_true: &[f64], y_pred: &[f64]) -> Result<f64, ForecastError> {
    check_pair(y_true, y_pred)?;
    let mse = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64;
    Ok(mse.sqrt())
}

/// Mean absolute percentage error, in percent.
///
/// Any zero in `y_true` makes the ratio undefined; that is reported as
/// `MetricUndefined` instead of an infinite value.
pub fn mape(y_true: &[f64], y_pred: &[f64]) -> Result<f64, ForecastError> {
    check_pair(y_true, y_pred)?;
    if let Some(idx) = y_true.iter().position(|t| *t == 0.0) {
        return Err(ForecastError::MetricUndefined {
            metric: "MAPE".to_string(),
            reason: format!("y_true[{}] is zero", idx),
        });
    }
    let total: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| ((t - p) / t).abs())
        .sum();
    Ok(total / y_true.len() as f64 * 100.0)
}

/// RMSE plus MAPE when it is defined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Scores {
    pub rmse: f64,
    pub mape: Option<f64>,
    pub scored_rows: usize,
}

impl Scores {
    /// Scores a pair of series. `MetricUndefined` from MAPE is folded into
    /// `mape: None`; every other error is returned.
    pub fn compute(y_true: &[f64], y_pred: &[f64]) -> Result<Self, ForecastError> {
        let rmse = rmse(y_true, y_pred)?;
        let mape = match mape(y_true, y_pred) {
            Ok(value) => Some(value),
            Err(ForecastError::MetricUndefined { .. }) => None,
            Err(e) => return Err(e),
        };
        Ok(Self {
            rmse,
            mape,
            scored_rows: y_true.len(),
        })
    }
}
