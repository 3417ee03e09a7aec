// Trend baselines
pub mod baseline;

// Namespaced reporting helper shared by every stage
pub mod instrument_reporter;

// Sequence model: scaler, LSTM, optimizer, training loop
pub mod ml;

// Per-instrument run and multi-instrument fan-out
pub mod orchestrator;
pub mod pipeline;
