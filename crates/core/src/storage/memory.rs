use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;

use crate::errors::CoreError;
use crate::models::price::PricePoint;
use crate::providers::traits::PriceStore;

/// In-process price store: ticker → closes sorted by date.
///
/// Safe to share between the per-ticker workers (reads take a shared lock,
/// backfills an exclusive one). Can be snapshotted to and restored from a
/// JSON file so the history survives restarts.
#[derive(Debug, Default)]
pub struct MemoryPriceStore {
    series: RwLock<HashMap<String, Vec<PricePoint>>>,
}

impl MemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from already-known series (unsorted input is fine).
    pub fn with_series(series: HashMap<String, Vec<PricePoint>>) -> Self {
        let series = series
            .into_iter()
            .map(|(ticker, points)| {
                let mut sorted = Vec::with_capacity(points.len());
                for point in points {
                    upsert(&mut sorted, point);
                }
                (ticker, sorted)
            })
            .collect();
        Self {
            series: RwLock::new(series),
        }
    }

    /// Number of stored closes across all tickers.
    pub async fn total_entries(&self) -> usize {
        self.series.read().await.values().map(Vec::len).sum()
    }

    pub async fn tickers(&self) -> Vec<String> {
        let mut tickers: Vec<String> = self.series.read().await.keys().cloned().collect();
        tickers.sort();
        tickers
    }

    pub async fn to_json(&self) -> Result<String, CoreError> {
        let guard = self.series.read().await;
        serde_json::to_string(&*guard)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize price store: {e}")))
    }

    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let series: HashMap<String, Vec<PricePoint>> = serde_json::from_str(json)
            .map_err(|e| CoreError::Deserialization(format!("Failed to parse price store: {e}")))?;
        Ok(Self::with_series(series))
    }

    /// Write a JSON snapshot of every stored series to `path`.
    pub async fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), CoreError> {
        let json = self.to_json().await?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Restore a store from a snapshot written by [`save_to_file`](Self::save_to_file).
    pub async fn load_from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json(&json)
    }
}

/// Insert or overwrite `point`, keeping `series` sorted by date.
fn upsert(series: &mut Vec<PricePoint>, point: PricePoint) {
    match series.binary_search_by_key(&point.date, |p| p.date) {
        Ok(idx) => series[idx].close = point.close,
        Err(idx) => series.insert(idx, point),
    }
}

#[async_trait]
impl PriceStore for MemoryPriceStore {
    async fn exists(&self, ticker: &str) -> Result<bool, CoreError> {
        Ok(self
            .series
            .read()
            .await
            .get(ticker)
            .is_some_and(|s| !s.is_empty()))
    }

    async fn latest_date(&self, ticker: &str) -> Result<Option<NaiveDate>, CoreError> {
        Ok(self
            .series
            .read()
            .await
            .get(ticker)
            .and_then(|s| s.last())
            .map(|p| p.date))
    }

    async fn get_series(&self, ticker: &str) -> Result<Vec<PricePoint>, CoreError> {
        Ok(self
            .series
            .read()
            .await
            .get(ticker)
            .cloned()
            .unwrap_or_default())
    }

    async fn backfill(&self, ticker: &str, rows: Vec<PricePoint>) -> Result<(), CoreError> {
        // Nothing is stored when any close is unusable.
        if let Some(bad) = rows.iter().find(|p| !p.close.is_finite() || p.close <= 0.0) {
            return Err(CoreError::PriceStore(format!(
                "Refusing close {} for {ticker} on {}",
                bad.close, bad.date
            )));
        }
        let mut guard = self.series.write().await;
        let series = guard.entry(ticker.to_string()).or_default();
        for point in rows {
            upsert(series, point);
        }
        log::debug!("Stored {} closes for {ticker}", series.len());
        Ok(())
    }
}
