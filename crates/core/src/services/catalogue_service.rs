use chrono::{DateTime, Datelike, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::analytics::PortfolioSummary;
use crate::models::asset::AssetType;
use crate::models::position::Position;
use crate::models::price::{Fundamentals, PricePoint};
use crate::models::settings::{Settings, SplitTable};
use crate::models::transaction::{sort_chronologically, LedgerRow, Transaction};
use crate::providers::traits::{NoProgress, PriceStore, ProgressSink, QuoteProvider};
use crate::services::benchmark_service::BenchmarkComparator;
use crate::services::history_service::HistoryService;
use crate::services::performance_service::PerformanceService;
use crate::services::position_service::PositionService;

// Progress milestones reported during a calculation.
const PROGRESS_BENCHMARK: f64 = 8.0;
const PROGRESS_FUNDAMENTALS: f64 = 35.0;
const PROGRESS_WORKERS_DONE: f64 = 95.0;

/// Shared, read-only inputs of the per-position workers.
struct WorkerContext {
    history: Arc<HistoryService>,
    calculator: PositionService,
    benchmark: Arc<BenchmarkComparator>,
    splits: SplitTable,
    now: DateTime<Utc>,
}

impl WorkerContext {
    async fn run(
        &self,
        mut position: Position,
        snapshot: Option<Fundamentals>,
        delisted: bool,
    ) -> Position {
        position.preprocess(&self.splits, delisted);

        if !delisted {
            position.apply_fundamentals(snapshot.as_ref());
            if let Err(e) = self.history.refresh_position(&position, self.now).await {
                log::warn!("Couldn't refresh price history for {}: {e}", position.ticker);
            }
        }

        let series = self.history.load_series(&position.ticker).await;
        if !delisted {
            position.price_from_history(&series);
        }

        self.calculator
            .calculate(&mut position, &series, &self.benchmark, self.now.naive_utc());
        position
    }
}

/// Every position of the portfolio plus the aggregates derived from them.
///
/// Derived state is rebuilt from the imported transactions on each
/// calculation. Positions are calculated concurrently, one task per ticker,
/// and only read again once every task has finished.
pub struct Catalogue {
    settings: Settings,
    history: Arc<HistoryService>,
    provider: Arc<dyn QuoteProvider>,
    progress: Arc<dyn ProgressSink>,
    performance: PerformanceService,

    positions: BTreeMap<String, Position>,
    transactions: Vec<Transaction>,
    portfolio_value_history: BTreeMap<NaiveDate, f64>,
    cash_flow_by_year: BTreeMap<i32, f64>,
    benchmark: Arc<BenchmarkComparator>,
    summary: PortfolioSummary,
}

impl std::fmt::Debug for Catalogue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalogue")
            .field("positions", &self.positions.len())
            .field("transactions", &self.transactions.len())
            .field("provider", &self.provider.name())
            .field("summary", &self.summary)
            .finish()
    }
}

impl Catalogue {
    pub fn new(
        settings: Settings,
        store: Arc<dyn PriceStore>,
        provider: Arc<dyn QuoteProvider>,
    ) -> Self {
        let history = Arc::new(HistoryService::new(
            store,
            Arc::clone(&provider),
            settings.stale_after_hours,
            settings.sold_grace_hours,
        ));
        let benchmark = Arc::new(BenchmarkComparator::new(
            settings.benchmark_ticker.clone(),
            Vec::new(),
        ));
        Self {
            settings,
            history,
            provider,
            progress: Arc::new(NoProgress),
            performance: PerformanceService::new(),
            positions: BTreeMap::new(),
            transactions: Vec::new(),
            portfolio_value_history: BTreeMap::new(),
            cash_flow_by_year: BTreeMap::new(),
            benchmark,
            summary: PortfolioSummary::default(),
        }
    }

    /// Report calculation progress to `sink`.
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    pub fn set_progress_sink(&mut self, sink: Arc<dyn ProgressSink>) {
        self.progress = sink;
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Drop every position and transaction.
    pub fn clear(&mut self) {
        self.positions.clear();
        self.transactions.clear();
        self.portfolio_value_history.clear();
        self.cash_flow_by_year.clear();
        self.summary = PortfolioSummary::default();
    }

    /// Parse ledger rows and file them under their positions.
    ///
    /// Rows with a blank date are skipped. A malformed date, share count,
    /// price or action aborts the whole import and leaves the catalogue
    /// untouched. A row whose ticker has no position yet and whose asset type
    /// is unknown is kept in the transaction list but gets no position.
    /// Returns the number of imported transactions.
    pub fn process_import(&mut self, rows: &[LedgerRow]) -> Result<usize, CoreError> {
        let parsed = rows
            .iter()
            .filter(|row| !row.is_blank())
            .map(|row| Transaction::from_row(row).map(|txn| (txn, row)))
            .collect::<Result<Vec<_>, CoreError>>()?;

        let imported = parsed.len();
        for (txn, row) in parsed {
            self.transactions.push(txn.clone());
            if let Some(position) = self.positions.get_mut(&txn.ticker) {
                position.add_transaction(txn);
                continue;
            }

            let asset_type = if txn.ticker == self.settings.cash_ticker {
                Ok(AssetType::Cash)
            } else {
                AssetType::parse_for(&txn.ticker, &row.asset_type)
            };
            match asset_type {
                Ok(asset_type) => {
                    let mut position = Position::new(txn.ticker.clone(), asset_type);
                    position.add_transaction(txn);
                    self.positions.insert(position.ticker.clone(), position);
                }
                Err(e) => log::warn!("Skipping position for {}: {e}", txn.ticker),
            }
        }

        log::info!("Number of transactions processed: {imported}");
        Ok(imported)
    }

    /// Recalculate everything as of the current time.
    pub async fn calculate(&mut self) -> Result<(), CoreError> {
        self.calculate_as_of(Utc::now()).await
    }

    /// Recalculate every position and aggregate as of `now`.
    pub async fn calculate_as_of(&mut self, now: DateTime<Utc>) -> Result<(), CoreError> {
        self.reset_derived();

        let benchmark_ticker = self.settings.benchmark_ticker.clone();
        if let Err(e) = self
            .history
            .refresh_benchmark(&benchmark_ticker, self.settings.benchmark_start, now)
            .await
        {
            log::warn!("Couldn't refresh benchmark history for {benchmark_ticker}: {e}");
        }
        let series = self.history.load_series(&benchmark_ticker).await;
        self.benchmark = Arc::new(BenchmarkComparator::new(benchmark_ticker, series));
        self.progress.notify(PROGRESS_BENCHMARK);

        let snapshots = self.fetch_fundamentals().await;
        self.progress.notify(PROGRESS_FUNDAMENTALS);

        // Every worker has been joined once this returns.
        self.run_workers(snapshots, now).await?;
        self.progress.notify(PROGRESS_WORKERS_DONE);

        self.aggregate(now);

        log::info!("Total Market Value: ${:.2}", self.summary.total_market_value);
        log::info!("Percentage Gain/Loss: {:.2}%", self.summary.percentage_gain);
        Ok(())
    }

    fn reset_derived(&mut self) {
        for position in self.positions.values_mut() {
            position.reset();
        }
        for txn in &mut self.transactions {
            txn.reset_returns();
        }
        self.portfolio_value_history.clear();
        self.cash_flow_by_year.clear();
        self.summary = PortfolioSummary::default();

        let cash_ticker = self.settings.cash_ticker.clone();
        self.positions
            .entry(cash_ticker.clone())
            .or_insert_with(|| Position::new(cash_ticker, AssetType::Cash));
    }

    async fn fetch_fundamentals(&self) -> HashMap<String, Fundamentals> {
        let symbols: Vec<String> = self
            .positions
            .values()
            .filter(|p| p.asset_type != AssetType::Cash && !self.settings.is_delisted(&p.ticker))
            .map(Position::quote_symbol)
            .collect();
        if symbols.is_empty() {
            return HashMap::new();
        }

        log::info!("Querying {} for {} equities...", self.provider.name(), symbols.len());
        match self.provider.get_bulk_snapshot(&symbols).await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                log::warn!("Fundamentals lookup failed, continuing without it: {e}");
                HashMap::new()
            }
        }
    }

    async fn run_workers(
        &mut self,
        mut snapshots: HashMap<String, Fundamentals>,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let context = Arc::new(WorkerContext {
            history: Arc::clone(&self.history),
            calculator: PositionService::new(),
            benchmark: Arc::clone(&self.benchmark),
            splits: self.settings.stock_splits.clone(),
            now,
        });

        let cash_ticker = self.settings.cash_ticker.clone();
        let mut pending: BTreeMap<String, Position> = BTreeMap::new();
        let mut workers = JoinSet::new();

        for (ticker, position) in std::mem::take(&mut self.positions) {
            if ticker == cash_ticker {
                self.positions.insert(ticker, position);
                continue;
            }
            let delisted = self.settings.is_delisted(&ticker);
            let snapshot = snapshots.remove(&position.quote_symbol());
            let context = Arc::clone(&context);
            pending.insert(ticker, position.clone());
            workers.spawn(async move { context.run(position, snapshot, delisted).await });
        }

        let total = pending.len();
        log::info!("Processing {total} securities...");

        let mut failure: Option<String> = None;
        let mut finished = 0usize;
        while let Some(result) = workers.join_next().await {
            finished += 1;
            match result {
                Ok(position) => {
                    pending.remove(&position.ticker);
                    self.positions.insert(position.ticker.clone(), position);
                }
                Err(e) => failure = Some(e.to_string()),
            }
            let share = finished as f64 / total as f64;
            self.progress.notify(
                PROGRESS_FUNDAMENTALS + (PROGRESS_WORKERS_DONE - PROGRESS_FUNDAMENTALS) * share,
            );
        }

        // Whatever is still pending belongs to a task that never returned.
        let lost = pending.keys().next().cloned();
        self.positions.append(&mut pending);
        match (failure, lost) {
            (Some(message), Some(ticker)) => Err(CoreError::Worker { ticker, message }),
            (Some(message), None) => Err(CoreError::Worker {
                ticker: "<unknown>".to_string(),
                message,
            }),
            (None, _) => Ok(()),
        }
    }

    fn aggregate(&mut self, now: DateTime<Utc>) {
        let cash_ticker = self.settings.cash_ticker.clone();
        let mut summary = PortfolioSummary {
            last_updated: now,
            ..PortfolioSummary::default()
        };

        for position in self.positions.values() {
            if position.ticker == cash_ticker {
                continue;
            }
            for (date, value) in &position.value_history {
                if *value > 0.0 {
                    *self.portfolio_value_history.entry(*date).or_insert(0.0) += value;
                }
            }
            summary.total_market_value += position.market_value;
            summary.total_cost_basis += position.total_cost_basis;
            summary.daily_gain += position.daily_gain;
            if position.currently_held {
                summary.total_positions_held += 1;
            }
        }

        // Carry the per-position returns back onto the master list.
        let returns: HashMap<Uuid, (f64, f64, f64)> = self
            .positions
            .values()
            .flat_map(|p| p.transactions())
            .map(|t| (t.id, (t.total_return, t.benchmark_return, t.excess_return)))
            .collect();
        sort_chronologically(&mut self.transactions);
        for txn in &mut self.transactions {
            if let Some((total, benchmark, excess)) = returns.get(&txn.id) {
                txn.total_return = *total;
                txn.benchmark_return = *benchmark;
                txn.excess_return = *excess;
            }
        }

        let cash = self.performance.replay_cash(&self.transactions);
        if let Some(position) = self.positions.get_mut(&cash_ticker) {
            position.value_history = cash.history.clone();
            position.market_price = 1.0;
            position.num_shares = cash.balance;
            position.market_value = cash.balance;
        }
        self.cash_flow_by_year = cash.flow_by_year.clone();
        summary.total_market_value += cash.balance;

        summary.percentage_gain = self
            .performance
            .percentage_gain(summary.total_market_value, summary.total_cost_basis);

        if let Some(first) = self.transactions.first() {
            let annual = self.performance.annual_performance(
                &self.portfolio_value_history,
                &cash,
                first.date().year(),
                now.year(),
                summary.total_market_value,
            );
            summary.annual_performance_by_year = annual.by_year;
            summary.market_value_at_year_start = annual.market_value_at_year_start;
            summary.year_to_date_percentage_gain = annual.year_to_date_percentage_gain;
        }

        self.summary = summary;
    }

    // ── Read-only snapshots ────────────────────────────────────────────

    pub fn summary(&self) -> &PortfolioSummary {
        &self.summary
    }

    /// Every position, including the cash sentinel, ordered by ticker.
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn position(&self, ticker: &str) -> Option<&Position> {
        self.positions.get(ticker)
    }

    /// All imported transactions with their derived returns.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Date → summed value of every non-cash position.
    pub fn portfolio_value_history(&self) -> &BTreeMap<NaiveDate, f64> {
        &self.portfolio_value_history
    }

    /// Year → deposits minus withdrawals.
    pub fn cash_flow_by_year(&self) -> &BTreeMap<i32, f64> {
        &self.cash_flow_by_year
    }

    pub fn benchmark_history(&self) -> &[PricePoint] {
        self.benchmark.series()
    }
}
