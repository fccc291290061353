use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::CoreError;

/// Date format used by the ledger's date column.
pub const LEDGER_DATE_FORMAT: &str = "%Y-%m-%d";

/// What a ledger entry does to a position or to the cash balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Buy,
    Sell,
    Deposit,
    Withdraw,
    /// Synthetic corporate action injected from the split table.
    /// `shares` carries the split ratio.
    Split,
}

impl Action {
    /// Buys and sells are the only actions with a market return.
    pub fn is_trade(&self) -> bool {
        matches!(self, Action::Buy | Action::Sell)
    }
}

impl FromStr for Action {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(Action::Buy),
            "sell" => Ok(Action::Sell),
            "deposit" => Ok(Action::Deposit),
            "withdraw" => Ok(Action::Withdraw),
            "split" => Ok(Action::Split),
            _ => Err(CoreError::UnknownAction(s.to_string())),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Buy => write!(f, "Buy"),
            Action::Sell => write!(f, "Sell"),
            Action::Deposit => write!(f, "Deposit"),
            Action::Withdraw => write!(f, "Withdraw"),
            Action::Split => write!(f, "Split"),
        }
    }
}

/// One raw row as handed over by a ledger source. All fields are plain text;
/// parsing happens in [`Transaction::parse`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub date: String,
    pub ticker: String,
    pub action: String,
    pub shares: String,
    #[serde(default)]
    pub price: String,
    #[serde(default, rename = "type")]
    pub asset_type: String,
}

impl LedgerRow {
    pub fn new(
        date: impl Into<String>,
        ticker: impl Into<String>,
        action: impl Into<String>,
        shares: impl Into<String>,
        price: impl Into<String>,
        asset_type: impl Into<String>,
    ) -> Self {
        Self {
            date: date.into(),
            ticker: ticker.into(),
            action: action.into(),
            shares: shares.into(),
            price: price.into(),
            asset_type: asset_type.into(),
        }
    }

    /// A blank date marks the end of the populated ledger area.
    pub fn is_blank(&self) -> bool {
        self.date.trim().is_empty()
    }
}

/// A parsed ledger entry.
///
/// Immutable after import except for the derived return fields, which are
/// recomputed on every calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,

    pub ticker: String,

    /// Real entries sit at 12:00, synthetic splits at 00:00, so a split sorts
    /// ahead of trades recorded on the same day.
    pub timestamp: NaiveDateTime,

    pub action: Action,

    /// Number of shares (always ≥ 0). For splits, the split ratio.
    pub shares: f64,

    /// Price per share; 1.0 for entries without a price (cash movements).
    pub price: f64,

    /// `shares × price`
    pub value: f64,

    /// Percentage return of this trade had it been held to today.
    #[serde(default)]
    pub total_return: f64,

    /// Percentage return of the benchmark over the same period.
    #[serde(default)]
    pub benchmark_return: f64,

    /// `total_return − benchmark_return`
    #[serde(default)]
    pub excess_return: f64,
}

impl Transaction {
    /// Build a transaction from already-typed values, timestamped at midday.
    pub fn new(
        ticker: impl Into<String>,
        date: NaiveDate,
        action: Action,
        shares: f64,
        price: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticker: ticker.into(),
            timestamp: midday(date),
            action,
            shares,
            price,
            value: shares * price,
            total_return: 0.0,
            benchmark_return: 0.0,
            excess_return: 0.0,
        }
    }

    /// Parse the raw ledger fields. Any failure here is a schema error.
    pub fn parse(
        date: &str,
        ticker: &str,
        action: &str,
        shares: &str,
        price: &str,
    ) -> Result<Self, CoreError> {
        let date = NaiveDate::parse_from_str(date.trim(), LEDGER_DATE_FORMAT)
            .map_err(|_| CoreError::InvalidDate(date.to_string()))?;
        let action: Action = action.parse()?;
        let shares = parse_amount(shares)
            .filter(|s| *s >= 0.0)
            .ok_or_else(|| CoreError::InvalidShares(shares.to_string()))?;
        let price = if price.trim().is_empty() {
            1.0
        } else {
            parse_amount(price).ok_or_else(|| CoreError::InvalidPrice(price.to_string()))?
        };
        Ok(Self::new(ticker.trim(), date, action, shares, price))
    }

    /// Parse a whole ledger row (the type column is handled by the caller).
    pub fn from_row(row: &LedgerRow) -> Result<Self, CoreError> {
        Self::parse(&row.date, &row.ticker, &row.action, &row.shares, &row.price)
    }

    /// A synthetic split at the start of `date`, multiplying shares by `ratio`.
    /// Splits are not ledger entries and carry the nil id.
    pub fn split(ticker: impl Into<String>, date: NaiveDate, ratio: f64) -> Self {
        Self {
            id: Uuid::nil(),
            timestamp: date.and_time(NaiveTime::default()),
            ..Self::new(ticker, date, Action::Split, ratio, 1.0)
        }
    }

    /// Calendar date of this entry.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub(crate) fn reset_returns(&mut self) {
        self.total_return = 0.0;
        self.benchmark_return = 0.0;
        self.excess_return = 0.0;
    }
}

/// Parse a ledger number written with American thousands separators
/// (e.g. `"1,234.50"`). Returns `None` for anything that isn't a finite number.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn midday(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(12, 0, 0)
        .unwrap_or_else(|| date.and_time(NaiveTime::default()))
}

/// Stable chronological sort. Entries with equal timestamps keep ledger order.
pub fn sort_chronologically(transactions: &mut [Transaction]) {
    transactions.sort_by_key(|t| t.timestamp);
}
