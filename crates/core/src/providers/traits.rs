use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;

use crate::errors::CoreError;
use crate::models::price::{Fundamentals, PricePoint};
use crate::models::transaction::LedgerRow;

/// Source of raw transaction rows (a spreadsheet, a CSV directory, ...).
#[async_trait]
pub trait LedgerSource: Send + Sync {
    /// All rows recorded for one ledger category (e.g. "stock").
    async fn get_transaction_rows(&self, asset_class: &str) -> Result<Vec<LedgerRow>, CoreError>;
}

/// Persistent store of daily split-adjusted closes, keyed by ticker.
///
/// Called concurrently by the per-ticker workers; implementations must be
/// safe to share across tasks.
#[async_trait]
pub trait PriceStore: Send + Sync {
    async fn exists(&self, ticker: &str) -> Result<bool, CoreError>;

    /// Date of the most recent stored close, `None` if nothing is stored.
    async fn latest_date(&self, ticker: &str) -> Result<Option<NaiveDate>, CoreError>;

    /// Every stored close for `ticker`, oldest first.
    async fn get_series(&self, ticker: &str) -> Result<Vec<PricePoint>, CoreError>;

    /// Insert or overwrite closes for `ticker`.
    async fn backfill(&self, ticker: &str, rows: Vec<PricePoint>) -> Result<(), CoreError>;
}

/// Remote market data: daily history and a bulk quote/fundamentals snapshot.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Human-readable name of this provider (for logs/errors).
    fn name(&self) -> &str;

    /// Daily split-adjusted closes for `symbol` in `[from, to]`, sorted by date.
    async fn fetch_history(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError>;

    /// Quote snapshot for many symbols at once. Symbols the source knows
    /// nothing about are simply absent from the map.
    async fn get_bulk_snapshot(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, Fundamentals>, CoreError>;
}

/// Receives refresh progress as a percentage. Fire-and-forget: a sink must
/// never block and never fail the calculation.
pub trait ProgressSink: Send + Sync {
    fn notify(&self, percent_complete: f64);
}

/// Sink that drops every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn notify(&self, _percent_complete: f64) {}
}

impl ProgressSink for tokio::sync::mpsc::UnboundedSender<f64> {
    fn notify(&self, percent_complete: f64) {
        // A closed receiver just means nobody is listening anymore.
        if self.send(percent_complete).is_err() {
            log::debug!("Progress receiver dropped, discarding {percent_complete}%");
        }
    }
}
