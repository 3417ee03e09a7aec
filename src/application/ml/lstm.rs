//! Stacked LSTM regressor with a single linear output unit.
//!
//! Every layer but the last feeds its full hidden sequence to the next one;
//! the last layer's final hidden state goes through `Dense(1)`. Gradients are
//! computed with backpropagation through time, one window per rayon task, and
//! summed in window order so a seeded run is reproducible.

use crate::domain::errors::ForecastError;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewD, ArrayViewMutD, Axis, s};
use rand::Rng;
use rayon::prelude::*;

fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

fn glorot_uniform<R: Rng + ?Sized>(rows: usize, cols: usize, fan_in: usize, fan_out: usize, rng: &mut R) -> Array2<f64> {
    let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
    Array2::from_shape_simple_fn((rows, cols), || rng.random_range(-limit..limit))
}

fn add_outer(acc: &mut Array2<f64>, a: &Array1<f64>, b: &Array1<f64>) {
    let outer = a
        .view()
        .insert_axis(Axis(1))
        .dot(&b.view().insert_axis(Axis(0)));
    *acc += &outer;
}

/// Activations of one time step, kept for the backward pass.
#[derive(Debug, Clone)]
struct StepCache {
    x: Array1<f64>,
    h_prev: Array1<f64>,
    c_prev: Array1<f64>,
    i: Array1<f64>,
    f: Array1<f64>,
    g: Array1<f64>,
    o: Array1<f64>,
    tanh_c: Array1<f64>,
}

/// One LSTM layer. Gate blocks are stacked as `[input, forget, cell, output]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LstmLayer {
    input_size: usize,
    hidden_size: usize,
    /// (4H, input)
    w: Array2<f64>,
    /// (4H, H)
    u: Array2<f64>,
    /// (4H)
    b: Array1<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerGradients {
    pub dw: Array2<f64>,
    pub du: Array2<f64>,
    pub db: Array1<f64>,
}

impl LayerGradients {
    fn zeros_like(layer: &LstmLayer) -> Self {
        Self {
            dw: Array2::zeros(layer.w.raw_dim()),
            du: Array2::zeros(layer.u.raw_dim()),
            db: Array1::zeros(layer.b.raw_dim()),
        }
    }
}

impl LstmLayer {
    pub fn new<R: Rng + ?Sized>(input_size: usize, hidden_size: usize, rng: &mut R) -> Self {
        let gates = 4 * hidden_size;
        let mut b = Array1::zeros(gates);
        // forget gate starts open
        b.slice_mut(s![hidden_size..2 * hidden_size]).fill(1.0);

        Self {
            input_size,
            hidden_size,
            w: glorot_uniform(gates, input_size, input_size, gates, rng),
            u: glorot_uniform(gates, hidden_size, hidden_size, gates, rng),
            b,
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn param_count(&self) -> usize {
        self.w.len() + self.u.len() + self.b.len()
    }

    /// Runs the sequence `(steps, input)` and returns every hidden state `(steps, H)`.
    fn forward(&self, inputs: ArrayView2<'_, f64>) -> (Array2<f64>, Vec<StepCache>) {
        let hs = self.hidden_size;
        let steps = inputs.nrows();
        let mut outputs = Array2::zeros((steps, hs));
        let mut caches = Vec::with_capacity(steps);
        let mut h = Array1::zeros(hs);
        let mut c = Array1::zeros(hs);

        for t in 0..steps {
            let x = inputs.row(t).to_owned();
            let z = self.w.dot(&x) + self.u.dot(&h) + &self.b;
            let i = z.slice(s![0..hs]).mapv(sigmoid);
            let f = z.slice(s![hs..2 * hs]).mapv(sigmoid);
            let g = z.slice(s![2 * hs..3 * hs]).mapv(f64::tanh);
            let o = z.slice(s![3 * hs..]).mapv(sigmoid);

            let c_next = &f * &c + &i * &g;
            let tanh_c = c_next.mapv(f64::tanh);
            let h_next = &o * &tanh_c;
            outputs.row_mut(t).assign(&h_next);

            caches.push(StepCache {
                x,
                h_prev: h,
                c_prev: c,
                i,
                f,
                g,
                o,
                tanh_c,
            });
            h = h_next;
            c = c_next;
        }

        (outputs, caches)
    }

    /// Backpropagates `d_outputs` (gradient w.r.t. every hidden state) through
    /// time. Returns the parameter gradients and the gradient w.r.t. the inputs.
    fn backward(&self, caches: &[StepCache], d_outputs: ArrayView2<'_, f64>) -> (LayerGradients, Array2<f64>) {
        let hs = self.hidden_size;
        let mut grads = LayerGradients::zeros_like(self);
        let mut d_inputs = Array2::zeros((caches.len(), self.input_size));
        let mut dh_next: Array1<f64> = Array1::zeros(hs);
        let mut dc_next: Array1<f64> = Array1::zeros(hs);

        for (t, cache) in caches.iter().enumerate().rev() {
            let dh = &d_outputs.row(t) + &dh_next;
            let d_o = &dh * &cache.tanh_c;
            let dc = &dc_next + &(&dh * &cache.o * &cache.tanh_c.mapv(|v| 1.0 - v * v));
            let d_i = &dc * &cache.g;
            let d_g = &dc * &cache.i;
            let d_f = &dc * &cache.c_prev;
            dc_next = &dc * &cache.f;

            let mut dz = Array1::zeros(4 * hs);
            dz.slice_mut(s![0..hs])
                .assign(&(&d_i * &cache.i.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![hs..2 * hs])
                .assign(&(&d_f * &cache.f.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![2 * hs..3 * hs])
                .assign(&(&d_g * &cache.g.mapv(|v| 1.0 - v * v)));
            dz.slice_mut(s![3 * hs..])
                .assign(&(&d_o * &cache.o.mapv(|v| v * (1.0 - v))));

            add_outer(&mut grads.dw, &dz, &cache.x);
            add_outer(&mut grads.du, &dz, &cache.h_prev);
            grads.db += &dz;

            d_inputs.row_mut(t).assign(&self.w.t().dot(&dz));
            dh_next = self.u.t().dot(&dz);
        }

        (grads, d_inputs)
    }
}

/// Gradients for every parameter of an [`LstmRegressor`], same layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    pub layers: Vec<LayerGradients>,
    pub dense_w: Array1<f64>,
    pub dense_b: Array1<f64>,
}

impl Gradients {
    fn zeros_like(model: &LstmRegressor) -> Self {
        Self {
            layers: model.layers.iter().map(LayerGradients::zeros_like).collect(),
            dense_w: Array1::zeros(model.dense_w.raw_dim()),
            dense_b: Array1::zeros(model.dense_b.raw_dim()),
        }
    }

    fn accumulate(&mut self, other: &Gradients) {
        for (acc, g) in self.layers.iter_mut().zip(&other.layers) {
            acc.dw += &g.dw;
            acc.du += &g.du;
            acc.db += &g.db;
        }
        self.dense_w += &other.dense_w;
        self.dense_b += &other.dense_b;
    }

    fn scale(&mut self, factor: f64) {
        for g in &mut self.layers {
            g.dw *= factor;
            g.du *= factor;
            g.db *= factor;
        }
        self.dense_w *= factor;
        self.dense_b *= factor;
    }

    /// Flat view in [`LstmRegressor::parameters_mut`] order.
    pub fn tensors(&self) -> Vec<ArrayViewD<'_, f64>> {
        let mut out = Vec::with_capacity(self.layers.len() * 3 + 2);
        for g in &self.layers {
            out.push(g.dw.view().into_dyn());
            out.push(g.du.view().into_dyn());
            out.push(g.db.view().into_dyn());
        }
        out.push(self.dense_w.view().into_dyn());
        out.push(self.dense_b.view().into_dyn());
        out
    }
}

/// Recurrent regressor: `num_layers` stacked LSTMs followed by `Dense(1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct LstmRegressor {
    window_size: usize,
    layers: Vec<LstmLayer>,
    dense_w: Array1<f64>,
    dense_b: Array1<f64>,
}

impl LstmRegressor {
    /// Single-feature model over windows of `window_size` steps.
    pub fn new<R: Rng + ?Sized>(
        window_size: usize,
        hidden_units: usize,
        num_layers: usize,
        rng: &mut R,
    ) -> Result<Self, ForecastError> {
        if window_size == 0 || hidden_units == 0 || num_layers == 0 {
            return Err(ForecastError::invalid(format!(
                "LSTM needs positive window ({}), units ({}) and layers ({})",
                window_size, hidden_units, num_layers
            )));
        }

        let mut layers = Vec::with_capacity(num_layers);
        layers.push(LstmLayer::new(1, hidden_units, rng));
        for _ in 1..num_layers {
            layers.push(LstmLayer::new(hidden_units, hidden_units, rng));
        }
        let limit = (6.0 / (hidden_units + 1) as f64).sqrt();
        let dense_w = Array1::from_shape_simple_fn(hidden_units, || rng.random_range(-limit..limit));

        Ok(Self {
            window_size,
            layers,
            dense_w,
            dense_b: Array1::zeros(1),
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn layers(&self) -> &[LstmLayer] {
        &self.layers
    }

    pub fn param_count(&self) -> usize {
        self.layers.iter().map(LstmLayer::param_count).sum::<usize>()
            + self.dense_w.len()
            + self.dense_b.len()
    }

    fn check_window(&self, window: &ArrayView1<'_, f64>) -> Result<(), ForecastError> {
        if window.len() != self.window_size {
            return Err(ForecastError::invalid(format!(
                "window of length {} fed to model expecting {}",
                window.len(),
                self.window_size
            )));
        }
        Ok(())
    }

    fn predict_window(&self, window: ArrayView1<'_, f64>) -> f64 {
        let mut seq = window.to_owned().insert_axis(Axis(1));
        for layer in &self.layers {
            seq = layer.forward(seq.view()).0;
        }
        let last = seq.row(seq.nrows() - 1);
        self.dense_w.dot(&last) + self.dense_b[0]
    }

    /// One prediction per row of `windows` `(n, window_size)`.
    pub fn predict(&self, windows: &Array2<f64>) -> Result<Array1<f64>, ForecastError> {
        if windows.ncols() != self.window_size {
            return Err(ForecastError::invalid(format!(
                "windows have {} columns, model expects {}",
                windows.ncols(),
                self.window_size
            )));
        }
        let predictions: Vec<f64> = (0..windows.nrows())
            .into_par_iter()
            .map(|row| self.predict_window(windows.row(row)))
            .collect();
        Ok(Array1::from(predictions))
    }

    /// Squared error of one window and its gradients.
    fn forward_backward(&self, window: ArrayView1<'_, f64>, target: f64) -> (f64, Gradients) {
        let mut inputs = window.to_owned().insert_axis(Axis(1));
        let mut caches = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let (outputs, cache) = layer.forward(inputs.view());
            caches.push(cache);
            inputs = outputs;
        }

        let last_idx = inputs.nrows() - 1;
        let last = inputs.row(last_idx);
        let prediction = self.dense_w.dot(&last) + self.dense_b[0];
        let error = prediction - target;
        let d_pred = 2.0 * error;

        let dense_w = &last * d_pred;
        let dense_b = Array1::from_elem(1, d_pred);

        let mut d_seq = Array2::zeros(inputs.raw_dim());
        d_seq.row_mut(last_idx).assign(&(&self.dense_w * d_pred));

        let mut layer_grads = Vec::with_capacity(self.layers.len());
        for (layer, cache) in self.layers.iter().zip(&caches).rev() {
            let (grads, d_inputs) = layer.backward(cache, d_seq.view());
            layer_grads.push(grads);
            d_seq = d_inputs;
        }
        layer_grads.reverse();

        (
            error * error,
            Gradients {
                layers: layer_grads,
                dense_w,
                dense_b,
            },
        )
    }

    /// Mean squared error over the selected rows and its gradient.
    pub fn batch_gradients(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        rows: &[usize],
    ) -> Result<(f64, Gradients), ForecastError> {
        if rows.is_empty() {
            return Err(ForecastError::invalid("empty mini-batch"));
        }
        if x.nrows() != y.len() {
            return Err(ForecastError::invalid(format!(
                "{} windows but {} targets",
                x.nrows(),
                y.len()
            )));
        }
        if let Some(&bad) = rows.iter().find(|&&r| r >= y.len()) {
            return Err(ForecastError::invalid(format!(
                "row {} out of range for {} windows",
                bad,
                y.len()
            )));
        }
        self.check_window(&x.row(rows[0]))?;

        let per_window: Vec<(f64, Gradients)> = rows
            .par_iter()
            .map(|&row| self.forward_backward(x.row(row), y[row]))
            .collect();

        let mut total = Gradients::zeros_like(self);
        let mut loss = 0.0;
        for (window_loss, grads) in &per_window {
            loss += window_loss;
            total.accumulate(grads);
        }
        let n = per_window.len() as f64;
        total.scale(1.0 / n);
        Ok((loss / n, total))
    }

    /// Mutable views of every parameter, in [`Gradients::tensors`] order.
    pub fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<'_, f64>> {
        let mut out = Vec::with_capacity(self.layers.len() * 3 + 2);
        for layer in &mut self.layers {
            out.push(layer.w.view_mut().into_dyn());
            out.push(layer.u.view_mut().into_dyn());
            out.push(layer.b.view_mut().into_dyn());
        }
        out.push(self.dense_w.view_mut().into_dyn());
        out.push(self.dense_b.view_mut().into_dyn());
        out
    }

    /// Keras-style layer table.
    pub fn summary(&self) -> String {
        let rule = "_".repeat(65);
        let double = "=".repeat(65);
        let mut rows = vec![(
            "input_1 (InputLayer)".to_string(),
            format!("[(None, {}, 1)]", self.window_size),
            0usize,
        )];
        for (idx, layer) in self.layers.iter().enumerate() {
            let name = if idx == 0 {
                "lstm (LSTM)".to_string()
            } else {
                format!("lstm_{} (LSTM)", idx)
            };
            let shape = if idx + 1 < self.layers.len() {
                format!("(None, {}, {})", self.window_size, layer.hidden_size)
            } else {
                format!("(None, {})", layer.hidden_size)
            };
            rows.push((name, shape, layer.param_count()));
        }
        rows.push((
            "dense (Dense)".to_string(),
            "(None, 1)".to_string(),
            self.dense_w.len() + self.dense_b.len(),
        ));

        let total = group_thousands(self.param_count());
        let mut out = String::new();
        out.push_str("Model: \"lstm_regressor\"\n");
        out.push_str(&rule);
        out.push('\n');
        out.push_str(&format!(" {:<28}{:<26}{}\n", "Layer (type)", "Output Shape", "Param #"));
        out.push_str(&double);
        out.push('\n');
        for (name, shape, params) in rows {
            out.push_str(&format!(" {:<28}{:<26}{}\n", name, shape, group_thousands(params)));
        }
        out.push_str(&double);
        out.push('\n');
        out.push_str(&format!("Total params: {}\n", total));
        out.push_str(&format!("Trainable params: {}\n", total));
        out.push_str("Non-trainable params: 0\n");
        out.push_str(&rule);
        out
    }
}

fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
