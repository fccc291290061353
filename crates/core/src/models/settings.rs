use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::CoreError;
use crate::models::transaction::Transaction;

/// One stock split: on `date`, every share became `ratio` shares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitEvent {
    pub date: NaiveDate,
    pub ratio: f64,
}

/// Known stock splits by ticker. Corporate actions never appear in the
/// ledger, so they are merged into each position's transactions before
/// replay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SplitTable(BTreeMap<String, Vec<SplitEvent>>);

impl SplitTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits of the tickers the portfolio has historically held.
    pub fn historical() -> Self {
        let mut table = Self::new();
        table.insert("TSLA", ymd(2020, 8, 31), 5.0);
        table.insert("TSLA", ymd(2022, 8, 25), 3.0);
        table.insert("NVDA", ymd(2021, 7, 20), 4.0);
        table.insert("SHOP", ymd(2022, 6, 29), 10.0);
        table.insert("AMZN", ymd(2022, 6, 6), 20.0);
        table.insert("GOOG", ymd(2022, 7, 18), 20.0);
        table.insert("GOOGL", ymd(2022, 7, 18), 20.0);
        // Reverse split
        table.insert("IAU", ymd(2021, 5, 24), 0.5);
        table.insert("CELH", ymd(2023, 11, 15), 3.0);
        table
    }

    /// Add a split, keeping each ticker's list in date order.
    pub fn insert(&mut self, ticker: impl Into<String>, date: NaiveDate, ratio: f64) {
        let splits = self.0.entry(ticker.into()).or_default();
        let pos = splits.partition_point(|s| s.date <= date);
        splits.insert(pos, SplitEvent { date, ratio });
    }

    pub fn splits_for(&self, ticker: &str) -> &[SplitEvent] {
        self.0.get(ticker).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Synthetic `Split` transactions for `ticker`.
    pub fn transactions_for(&self, ticker: &str) -> Vec<Transaction> {
        self.splits_for(ticker)
            .iter()
            .map(|s| Transaction::split(ticker, s.date, s.ratio))
            .collect()
    }

    pub fn tickers(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Analytics configuration, loadable from JSON. Missing keys take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Index every transaction is compared against.
    pub benchmark_ticker: String,

    /// First date requested when the benchmark series is not stored yet.
    pub benchmark_start: NaiveDate,

    /// A held ticker whose latest stored close is older than this gets backfilled.
    pub stale_after_hours: i64,

    /// A sold ticker gets backfilled when its last transaction is this much
    /// newer than its latest stored close.
    pub sold_grace_hours: i64,

    /// Ledger categories, requested from the ledger source one at a time.
    pub asset_classes: Vec<String>,

    /// Sentinel ticker holding deposits and withdrawals.
    pub cash_ticker: String,

    /// Tickers no longer traded (ticker → description). Never backfilled or quoted.
    pub delisted_tickers: BTreeMap<String, String>,

    pub stock_splits: SplitTable,
}

impl Default for Settings {
    fn default() -> Self {
        let delisted_tickers = [
            ("VYGVF", "Voyager Digital Ltd."),
            ("APPH", "AppHarvest Inc."),
            ("PTRA", "Proterra Inc."),
            ("XLNX", "Xilinx Inc."),
            ("PONDX", "PIMCO Income Fund Class D"),
        ]
        .into_iter()
        .map(|(t, d)| (t.to_string(), d.to_string()))
        .collect();

        Self {
            benchmark_ticker: "SPY".to_string(),
            benchmark_start: ymd(2015, 1, 1),
            stale_after_hours: 72,
            sold_grace_hours: 24,
            asset_classes: vec!["stock".to_string()],
            cash_ticker: "CASH".to_string(),
            delisted_tickers,
            stock_splits: SplitTable::historical(),
        }
    }
}

impl Settings {
    /// Parse settings from a JSON document and validate them.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string_pretty(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn is_delisted(&self, ticker: &str) -> bool {
        self.delisted_tickers.contains_key(ticker)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.benchmark_ticker.trim().is_empty() {
            return Err(CoreError::Configuration("benchmark_ticker must not be empty".into()));
        }
        if self.cash_ticker.trim().is_empty() {
            return Err(CoreError::Configuration("cash_ticker must not be empty".into()));
        }
        if self.stale_after_hours < 0 || self.sold_grace_hours < 0 {
            return Err(CoreError::Configuration(
                "staleness thresholds must not be negative".into(),
            ));
        }
        for ticker in self.stock_splits.tickers() {
            for split in self.stock_splits.splits_for(ticker) {
                if !split.ratio.is_finite() || split.ratio <= 0.0 {
                    return Err(CoreError::Configuration(format!(
                        "split ratio for {ticker} on {} must be positive, got {}",
                        split.date, split.ratio
                    )));
                }
            }
        }
        Ok(())
    }
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}
