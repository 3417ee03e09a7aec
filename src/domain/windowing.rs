//! Sliding-window extraction of supervised `(window, next value)` pairs.

use crate::domain::errors::ForecastError;
use ndarray::{Array1, Array2};

/// Input windows `x` of shape `(num_windows, window_size)` and the value
/// immediately following each window in `y`.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowedDataset {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
}

impl WindowedDataset {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn window_size(&self) -> usize {
        self.x.ncols()
    }
}

/// Splits `series` into windows starting at `offset`.
///
/// For every `i` in `offset..series.len()`, row `i - offset` of `x` holds
/// `series[i - window_size..i]` and `y[i - offset]` is `series[i]`.
/// Requires `0 < window_size <= offset < series.len()`.
pub fn extract(
    series: &[f64],
    window_size: usize,
    offset: usize,
) -> Result<WindowedDataset, ForecastError> {
    if window_size == 0 {
        return Err(ForecastError::invalid("window size must be positive"));
    }
    if offset < window_size {
        return Err(ForecastError::invalid(format!(
            "offset {} is smaller than window size {}",
            offset, window_size
        )));
    }
    if series.len() <= offset {
        return Err(ForecastError::invalid(format!(
            "series of length {} yields no window at offset {}",
            series.len(),
            offset
        )));
    }

    let num_windows = series.len() - offset;
    let mut x = Array2::zeros((num_windows, window_size));
    let mut y = Array1::zeros(num_windows);

    for i in offset..series.len() {
        let row = i - offset;
        for (dst, src) in x.row_mut(row).iter_mut().zip(&series[i - window_size..i]) {
            *dst = *src;
        }
        y[row] = series[i];
    }

    Ok(WindowedDataset { x, y })
}
