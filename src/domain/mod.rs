// Validated configuration value objects
pub mod config;

// Domain-specific error types
pub mod errors;

// Accuracy metrics
pub mod metrics;

// Port interfaces
pub mod ports;

// Experiment namespacing and chart payloads
pub mod reporting;

// Daily price series and train/test split
pub mod series;

// Supervised window extraction
pub mod windowing;
