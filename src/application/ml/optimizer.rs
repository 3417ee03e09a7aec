//! Adam optimizer over a flat list of parameter tensors.

use crate::domain::errors::ForecastError;
use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, Zip};

/// Adaptive Moment Estimation.
///
/// ```text
/// m = beta1 * m + (1 - beta1) * g
/// v = beta2 * v + (1 - beta2) * g^2
/// lr_t = lr * sqrt(1 - beta2^t) / (1 - beta1^t)
/// p = p - lr_t * m / (sqrt(v) + epsilon)
/// ```
///
/// Moment buffers are created on the first step from the gradient shapes; the
/// parameter list must keep the same order and shapes afterwards.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    t: i32,
    m: Vec<ArrayD<f64>>,
    v: Vec<ArrayD<f64>>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn steps(&self) -> i32 {
        self.t
    }

    pub fn step(
        &mut self,
        params: Vec<ArrayViewMutD<'_, f64>>,
        grads: Vec<ArrayViewD<'_, f64>>,
    ) -> Result<(), ForecastError> {
        if params.len() != grads.len() {
            return Err(ForecastError::invalid(format!(
                "optimizer got {} parameters but {} gradients",
                params.len(),
                grads.len()
            )));
        }
        if self.m.is_empty() {
            self.m = grads.iter().map(|g| ArrayD::zeros(g.raw_dim())).collect();
            self.v = grads.iter().map(|g| ArrayD::zeros(g.raw_dim())).collect();
        }
        if self.m.len() != grads.len() {
            return Err(ForecastError::invalid(
                "parameter list changed between optimizer steps",
            ));
        }
        for (idx, (p, g)) in params.iter().zip(&grads).enumerate() {
            if p.shape() != g.shape() || self.m[idx].shape() != g.shape() {
                return Err(ForecastError::invalid(format!(
                    "shape mismatch for parameter {}: {:?} vs {:?}",
                    idx,
                    p.shape(),
                    g.shape()
                )));
            }
        }

        self.t += 1;
        let (beta1, beta2, epsilon) = (self.beta1, self.beta2, self.epsilon);
        let lr_t = self.learning_rate * (1.0 - beta2.powi(self.t)).sqrt()
            / (1.0 - beta1.powi(self.t));

        for (((mut p, g), m), v) in params
            .into_iter()
            .zip(grads)
            .zip(self.m.iter_mut())
            .zip(self.v.iter_mut())
        {
            Zip::from(&mut p)
                .and(&g)
                .and(m)
                .and(v)
                .for_each(|p, &g, m, v| {
                    *m = beta1 * *m + (1.0 - beta1) * g;
                    *v = beta2 * *v + (1.0 - beta2) * g * g;
                    *p -= lr_t * *m / (v.sqrt() + epsilon);
                });
        }
        Ok(())
    }
}
