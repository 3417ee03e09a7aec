pub mod alpha_vantage;
pub mod core;
pub mod csv_directory;
pub mod daily_csv;
pub mod mock;
pub mod reporting;

pub use alpha_vantage::AlphaVantageProvider;
pub use csv_directory::CsvDirectoryProvider;
pub use reporting::JsonLinesSink;
