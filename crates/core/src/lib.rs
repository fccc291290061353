pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;

use chrono::{DateTime, NaiveDate, Utc};
use models::{
    analytics::PortfolioSummary, position::Position, price::PricePoint, settings::Settings,
    transaction::Transaction,
};
use providers::traits::{LedgerSource, NoProgress, PriceStore, ProgressSink, QuoteProvider};
use services::catalogue_service::Catalogue;
use std::collections::BTreeMap;
use std::sync::Arc;

use errors::CoreError;

/// Progress reported once the ledger has been read.
const PROGRESS_LEDGER_READ: f64 = 3.0;
const PROGRESS_DONE: f64 = 100.0;

/// Main entry point for the Portfolio Tracker core library.
/// Owns the catalogue and the collaborators it reads from.
#[must_use]
pub struct PortfolioTracker {
    ledger: Arc<dyn LedgerSource>,
    catalogue: Catalogue,
    progress: Arc<dyn ProgressSink>,
}

impl std::fmt::Debug for PortfolioTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortfolioTracker")
            .field("catalogue", &self.catalogue)
            .field("settings", self.catalogue.settings())
            .finish()
    }
}

impl PortfolioTracker {
    /// Create a tracker. Fails if `settings` are invalid.
    pub fn new(
        settings: Settings,
        ledger: Arc<dyn LedgerSource>,
        store: Arc<dyn PriceStore>,
        provider: Arc<dyn QuoteProvider>,
    ) -> Result<Self, CoreError> {
        settings.validate()?;
        Ok(Self {
            ledger,
            catalogue: Catalogue::new(settings, store, provider),
            progress: Arc::new(NoProgress),
        })
    }

    /// Report refresh progress (0-100) to `sink`.
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.catalogue.set_progress_sink(Arc::clone(&sink));
        self.progress = sink;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        self.catalogue.settings()
    }

    // ── Refresh ─────────────────────────────────────────────────────

    /// Re-read the ledger and recalculate everything.
    /// Returns the number of imported transactions.
    pub async fn refresh(&mut self) -> Result<usize, CoreError> {
        self.refresh_as_of(Utc::now()).await
    }

    /// [`refresh`](Self::refresh) with an explicit clock.
    pub async fn refresh_as_of(&mut self, now: DateTime<Utc>) -> Result<usize, CoreError> {
        self.catalogue.clear();

        let mut rows = Vec::new();
        for asset_class in &self.catalogue.settings().asset_classes {
            rows.extend(self.ledger.get_transaction_rows(asset_class).await?);
        }
        self.progress.notify(PROGRESS_LEDGER_READ);

        let imported = self.catalogue.process_import(&rows)?;
        self.catalogue.calculate_as_of(now).await?;
        self.progress.notify(PROGRESS_DONE);
        Ok(imported)
    }

    // ── Snapshots ───────────────────────────────────────────────────

    #[must_use]
    pub fn summary(&self) -> &PortfolioSummary {
        self.catalogue.summary()
    }

    /// All positions (cash included), ordered by ticker.
    #[must_use]
    pub fn positions(&self) -> Vec<&Position> {
        self.catalogue.positions().collect()
    }

    /// Positions still held, largest market value first.
    #[must_use]
    pub fn held_positions(&self) -> Vec<&Position> {
        let mut held: Vec<&Position> = self
            .catalogue
            .positions()
            .filter(|p| p.currently_held)
            .collect();
        held.sort_by(|a, b| b.market_value.total_cmp(&a.market_value));
        held
    }

    #[must_use]
    pub fn position(&self, ticker: &str) -> Option<&Position> {
        self.catalogue.position(ticker)
    }

    /// Every ledger transaction, oldest first, with derived returns.
    #[must_use]
    pub fn transactions(&self) -> &[Transaction] {
        self.catalogue.transactions()
    }

    #[must_use]
    pub fn portfolio_value_history(&self) -> &BTreeMap<NaiveDate, f64> {
        self.catalogue.portfolio_value_history()
    }

    #[must_use]
    pub fn cash_flow_by_year(&self) -> &BTreeMap<i32, f64> {
        self.catalogue.cash_flow_by_year()
    }

    #[must_use]
    pub fn benchmark_history(&self) -> &[PricePoint] {
        self.catalogue.benchmark_history()
    }

    // ── JSON export ─────────────────────────────────────────────────

    pub fn summary_json(&self) -> Result<String, CoreError> {
        to_json(self.summary())
    }

    pub fn positions_json(&self) -> Result<String, CoreError> {
        to_json(&self.positions())
    }

    pub fn transactions_json(&self) -> Result<String, CoreError> {
        to_json(self.transactions())
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, CoreError> {
    serde_json::to_string(value).map_err(|e| CoreError::Serialization(e.to_string()))
}
