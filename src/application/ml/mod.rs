pub mod forecaster;
pub mod lstm;
pub mod optimizer;
pub mod scaler;

pub use forecaster::{ForecastResult, SequenceForecaster, TrainingHistory};
pub use lstm::LstmRegressor;
pub use scaler::StandardScaler;
