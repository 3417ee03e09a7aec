//! Scale → train → infer, enforced by consuming typestate.
//!
//! ```text
//! SequenceForecaster --fit_scale--> ScaledForecaster --train--> TrainedForecaster --infer--> ForecastResult
//! ```
//!
//! Each transition takes `self` by value, so a phase can never be re-entered
//! and the scaler is frozen before any test data reaches the model.

use super::lstm::LstmRegressor;
use super::optimizer::Adam;
use super::scaler::StandardScaler;
use crate::application::instrument_reporter::InstrumentReporter;
use crate::domain::config::ModelConfig;
use crate::domain::errors::ForecastError;
use crate::domain::metrics::Scores;
use crate::domain::reporting::{Chart, ChartSeries};
use crate::domain::windowing::{self, WindowedDataset};
use chrono::NaiveDate;
use ndarray::s;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::{debug, info};

pub const COMPONENT: &str = "LSTM";
const NUM_LAYERS: usize = 2;

/// Per-epoch losses in scaled units. `val_loss` is empty when the training set
/// is too small to hold anything out.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrainingHistory {
    pub loss: Vec<f64>,
    pub val_loss: Vec<f64>,
}

impl TrainingHistory {
    pub fn epochs(&self) -> usize {
        self.loss.len()
    }
}

/// Untrained forecaster holding only its configuration.
#[derive(Debug, Clone)]
pub struct SequenceForecaster {
    config: ModelConfig,
}

impl SequenceForecaster {
    pub fn new(config: ModelConfig) -> Result<Self, ForecastError> {
        config
            .validate()
            .map_err(|e| ForecastError::invalid(e.to_string()))?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Fits the scaler on the training closes. Requires at least
    /// `window_size + 1` points so that one supervised window exists.
    pub fn fit_scale(self, train_closes: &[f64]) -> Result<ScaledForecaster, ForecastError> {
        let needed = self.config.window_size + 1;
        if train_closes.len() < needed {
            return Err(ForecastError::insufficient(
                "LSTM training",
                needed,
                train_closes.len(),
            ));
        }

        let scaler = StandardScaler::fit(train_closes)?;
        let tail_start = train_closes.len() - self.config.window_size;
        Ok(ScaledForecaster {
            scaled_train: scaler.transform(train_closes),
            train_tail: train_closes[tail_start..].to_vec(),
            scaler,
            config: self.config,
        })
    }

    /// Runs every phase in order.
    pub fn forecast(self, train_closes: &[f64], test_closes: &[f64]) -> Result<ForecastResult, ForecastError> {
        self.fit_scale(train_closes)?.train()?.infer(test_closes)
    }
}

/// Scaler fitted; model not built yet.
#[derive(Debug, Clone)]
pub struct ScaledForecaster {
    config: ModelConfig,
    scaler: StandardScaler,
    scaled_train: Vec<f64>,
    /// Last `window_size` raw training closes, prepended to the test closes at inference.
    train_tail: Vec<f64>,
}

impl ScaledForecaster {
    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn train(self) -> Result<TrainedForecaster, ForecastError> {
        let cfg = &self.config;
        let dataset = windowing::extract(&self.scaled_train, cfg.window_size, cfg.window_size)?;
        let n = dataset.len();
        let split_at = (n as f64 * (1.0 - cfg.validation_split)).floor() as usize;
        if split_at == 0 {
            return Err(ForecastError::insufficient(
                "LSTM training windows",
                min_windows(cfg.validation_split),
                n,
            ));
        }

        let mut rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut model = LstmRegressor::new(cfg.window_size, cfg.hidden_units, NUM_LAYERS, &mut rng)?;
        let mut optimizer = Adam::new(cfg.learning_rate);
        let mut history = TrainingHistory::default();

        let validation = (split_at < n).then(|| WindowedDataset {
            x: dataset.x.slice(s![split_at.., ..]).to_owned(),
            y: dataset.y.slice(s![split_at..]).to_owned(),
        });
        let mut order: Vec<usize> = (0..split_at).collect();

        for epoch in 0..cfg.epochs {
            order.shuffle(&mut rng);
            let mut weighted = 0.0;
            for batch in order.chunks(cfg.batch_size) {
                let (batch_loss, grads) = model.batch_gradients(&dataset.x, &dataset.y, batch)?;
                weighted += batch_loss * batch.len() as f64;
                optimizer.step(model.parameters_mut(), grads.tensors())?;
            }
            let loss = weighted / split_at as f64;
            history.loss.push(loss);

            if let Some(val) = &validation {
                let predicted = model.predict(&val.x)?;
                let val_loss = (&predicted - &val.y).mapv(|e| e * e).mean().unwrap_or(f64::NAN);
                history.val_loss.push(val_loss);
                debug!(
                    "SequenceForecaster: epoch {}/{} loss={:.6} val_loss={:.6}",
                    epoch + 1,
                    cfg.epochs,
                    loss,
                    val_loss
                );
            } else {
                debug!(
                    "SequenceForecaster: epoch {}/{} loss={:.6}",
                    epoch + 1,
                    cfg.epochs,
                    loss
                );
            }
        }

        Ok(TrainedForecaster {
            config: self.config,
            scaler: self.scaler,
            train_tail: self.train_tail,
            model,
            history,
        })
    }
}

/// Trained model, ready for a single inference pass.
#[derive(Debug, Clone)]
pub struct TrainedForecaster {
    config: ModelConfig,
    scaler: StandardScaler,
    train_tail: Vec<f64>,
    model: LstmRegressor,
    history: TrainingHistory,
}

impl TrainedForecaster {
    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    pub fn model(&self) -> &LstmRegressor {
        &self.model
    }

    pub fn infer(self, test_closes: &[f64]) -> Result<ForecastResult, ForecastError> {
        if test_closes.is_empty() {
            return Err(ForecastError::insufficient("LSTM inference", 1, 0));
        }
        let window = self.config.window_size;
        let mut inputs = self.train_tail.clone();
        inputs.extend_from_slice(test_closes);

        let scaled = self.scaler.transform(&inputs);
        let dataset = windowing::extract(&scaled, window, window)?;
        let predicted = self.model.predict(&dataset.x)?;
        let predictions = self.scaler.inverse_transform(&predicted.to_vec());
        let scores = Scores::compute(test_closes, &predictions)?;

        Ok(ForecastResult {
            config: self.config,
            scaler: self.scaler,
            model: self.model,
            history: self.history,
            predictions,
            scores,
        })
    }
}

/// Everything one forecaster run produced. Predictions are aligned with the
/// test closes and in price units.
#[derive(Debug, Clone)]
pub struct ForecastResult {
    pub config: ModelConfig,
    pub scaler: StandardScaler,
    pub model: LstmRegressor,
    pub history: TrainingHistory,
    pub predictions: Vec<f64>,
    pub scores: Scores,
}

impl ForecastResult {
    pub fn params(&self) -> BTreeMap<String, Value> {
        let mut params = BTreeMap::new();
        params.insert("units".to_string(), json!(self.config.hidden_units));
        params.insert("optimizer".to_string(), json!("adam"));
        params.insert("batch_size".to_string(), json!(self.config.batch_size));
        params.insert("epochs".to_string(), json!(self.config.epochs));
        params.insert("window_size".to_string(), json!(self.config.window_size));
        params.insert("learning_rate".to_string(), json!(self.config.learning_rate));
        params.insert("seed".to_string(), json!(self.config.seed));
        params
    }

    pub fn chart(&self, train: (&[NaiveDate], &[f64]), test: (&[NaiveDate], &[f64])) -> Chart {
        Chart::new("LSTM Prediction Model")
            .with_series(ChartSeries::dense("train", train.0, train.1))
            .with_series(ChartSeries::dense("test", test.0, test.1))
            .with_series(ChartSeries::dense("predicted", test.0, &self.predictions))
    }

    pub async fn report(
        &self,
        reporter: &InstrumentReporter,
        train: (&[NaiveDate], &[f64]),
        test: (&[NaiveDate], &[f64]),
    ) {
        reporter.params(COMPONENT, "LSTMPars", &self.params()).await;
        for loss in &self.history.loss {
            reporter.scalar(COMPONENT, "train/loss", *loss).await;
        }
        for val_loss in &self.history.val_loss {
            reporter.scalar(COMPONENT, "train/val_loss", *val_loss).await;
        }
        reporter
            .text(COMPONENT, "model_summary", &self.model.summary())
            .await;
        reporter.scores(COMPONENT, &self.scores).await;
        reporter
            .image(COMPONENT, "LSTM Prediction Model", &self.chart(train, test))
            .await;

        info!(
            "SequenceForecaster [{}]: rmse={:.4} mape={:?} after {} epochs",
            reporter.namespace().symbol(),
            self.scores.rmse,
            self.scores.mape,
            self.history.epochs()
        );
    }
}

/// Smallest window count that leaves one training window after the
/// validation hold-out.
fn min_windows(validation_split: f64) -> usize {
    let keep = 1.0 - validation_split;
    let mut needed = (1.0 / keep).ceil().max(1.0) as usize;
    while ((needed as f64) * keep).floor() < 1.0 {
        needed += 1;
    }
    needed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_config(seed: u64) -> ModelConfig {
        ModelConfig {
            window_size: 5,
            hidden_units: 4,
            epochs: 3,
            batch_size: 4,
            learning_rate: 0.01,
            validation_split: 0.1,
            seed: Some(seed),
        }
    }

    fn wave(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + 5.0 * (i as f64 * 0.3).sin() + i as f64 * 0.1)
            .collect()
    }

    #[test]
    fn test_validation_holdout_leaving_no_training_window() {
        let config = ModelConfig {
            window_size: 3,
            validation_split: 0.5,
            ..tiny_config(1)
        };
        let err = SequenceForecaster::new(config)
            .unwrap()
            .fit_scale(&wave(4))
            .unwrap()
            .train()
            .unwrap_err();
        assert_eq!(
            err,
            ForecastError::insufficient("LSTM training windows", 2, 1)
        );
    }

    #[test]
    fn test_min_windows_for_holdout() {
        assert_eq!(min_windows(0.0), 1);
        assert_eq!(min_windows(0.1), 2);
        assert_eq!(min_windows(0.5), 2);
        assert_eq!(min_windows(0.75), 4);
    }

    #[test]
    fn test_forecast_shapes() {
        let closes = wave(60);
        let (train, test) = closes.split_at(48);
        let result = SequenceForecaster::new(tiny_config(1))
            .unwrap()
            .forecast(train, test)
            .unwrap();

        assert_eq!(result.predictions.len(), test.len());
        assert_eq!(result.history.loss.len(), 3);
        assert_eq!(result.history.val_loss.len(), 3);
        assert_eq!(result.scores.scored_rows, test.len());
        assert!(result.predictions.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_scaler_fitted_on_train_only() {
        let closes = wave(60);
        let (train, test) = closes.split_at(48);
        let scaled = SequenceForecaster::new(tiny_config(1))
            .unwrap()
            .fit_scale(train)
            .unwrap();
        let train_mean = train.iter().sum::<f64>() / train.len() as f64;
        assert!((scaled.scaler().mean() - train_mean).abs() < 1e-9);

        let result = scaled.train().unwrap().infer(test).unwrap();
        assert!((result.scaler.mean() - train_mean).abs() < 1e-9);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let closes = wave(50);
        let (train, test) = closes.split_at(40);
        let a = SequenceForecaster::new(tiny_config(42))
            .unwrap()
            .forecast(train, test)
            .unwrap();
        let b = SequenceForecaster::new(tiny_config(42))
            .unwrap()
            .forecast(train, test)
            .unwrap();
        assert_eq!(a.predictions, b.predictions);
        assert_eq!(a.history, b.history);
    }

    #[test]
    fn test_too_few_training_points() {
        let err = SequenceForecaster::new(tiny_config(1))
            .unwrap()
            .fit_scale(&[1.0, 2.0, 3.0, 4.0, 5.0])
            .unwrap_err();
        assert_eq!(
            err,
            ForecastError::InsufficientData {
                stage: "LSTM training".to_string(),
                needed: 6,
                available: 5,
            }
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ModelConfig {
            epochs: 0,
            ..tiny_config(1)
        };
        assert!(matches!(
            SequenceForecaster::new(config),
            Err(ForecastError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_training_reduces_loss_on_smooth_series() {
        let closes = wave(80);
        let config = ModelConfig {
            epochs: 12,
            ..tiny_config(3)
        };
        let trained = SequenceForecaster::new(config)
            .unwrap()
            .fit_scale(&closes)
            .unwrap()
            .train()
            .unwrap();
        let loss = &trained.history().loss;
        assert!(loss.last().unwrap() < loss.first().unwrap());
    }

    #[test]
    fn test_params_payload() {
        let closes = wave(40);
        let (train, test) = closes.split_at(32);
        let result = SequenceForecaster::new(tiny_config(1))
            .unwrap()
            .forecast(train, test)
            .unwrap();
        let params = result.params();
        assert_eq!(params["units"], json!(4));
        assert_eq!(params["optimizer"], json!("adam"));
        assert_eq!(params["window_size"], json!(5));
    }
}
