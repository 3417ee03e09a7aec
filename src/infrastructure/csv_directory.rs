use crate::domain::errors::ForecastError;
use crate::domain::ports::DailySeriesProvider;
use crate::domain::series::PriceSeries;
use crate::infrastructure::daily_csv::parse_daily_csv;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

/// Offline provider reading `{dir}/{SYMBOL}.csv` files in the upstream layout.
pub struct CsvDirectoryProvider {
    dir: PathBuf,
}

impl CsvDirectoryProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", symbol.trim().to_uppercase()))
    }

    /// Validates `body` as a daily series, then writes it to the symbol's file.
    pub async fn store(&self, symbol: &str, body: &str) -> Result<PathBuf> {
        let series = parse_daily_csv(symbol, body, usize::MAX)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create data directory {}", self.dir.display()))?;

        let path = self.path_for(symbol);
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(
            "CsvDirectoryProvider: stored {} rows for {} at {}",
            series.len(),
            symbol,
            path.display()
        );
        Ok(path)
    }
}

#[async_trait]
impl DailySeriesProvider for CsvDirectoryProvider {
    async fn fetch_daily_series(&self, symbol: &str, max_rows: usize) -> Result<PriceSeries, ForecastError> {
        let path = self.path_for(symbol);
        let body = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ForecastError::fetch(symbol, format!("{}: {}", path.display(), e)))?;
        parse_daily_csv(symbol, &body, max_rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "timestamp,open,high,low,close,volume\n\
        2024-01-04,1,1,1,3.0,1\n\
        2024-01-03,1,1,1,2.0,1\n\
        2024-01-02,1,1,1,1.0,1\n";

    #[tokio::test]
    async fn test_store_then_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CsvDirectoryProvider::new(dir.path().join("data"));

        let path = provider.store("ibm", BODY).await.unwrap();
        assert!(path.ends_with("IBM.csv"));

        let series = provider.fetch_daily_series("IBM", 2).await.unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.chronological_closes(), vec![2.0, 3.0]);
    }

    #[tokio::test]
    async fn test_missing_file_is_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CsvDirectoryProvider::new(dir.path());
        let err = provider.fetch_daily_series("NOPE", 10).await.unwrap_err();
        assert_eq!(err.kind(), "FetchError");
    }

    #[tokio::test]
    async fn test_store_rejects_notice_body() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CsvDirectoryProvider::new(dir.path());
        assert!(provider.store("IBM", "{\"Note\": \"slow down\"}").await.is_err());
        assert!(!provider.path_for("IBM").exists());
    }
}
