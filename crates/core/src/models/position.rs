use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::asset::AssetType;
use super::lot::LotQueue;
use super::price::{Fundamentals, PricePoint};
use super::settings::SplitTable;
use super::transaction::{sort_chronologically, Action, Transaction};

/// Share counts below this are treated as zero (ledger rounding noise).
pub const SHARE_EPSILON: f64 = 0.001;

/// Everything known about one ticker: its transactions, open lots, value
/// history and summary metrics.
///
/// Derived fields are rebuilt from `transactions` on every calculation;
/// nothing is carried over between refreshes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub ticker: String,
    pub asset_type: AssetType,

    pub market_price: f64,
    pub market_prev_close: f64,
    pub market_value: f64,
    pub daily_gain: f64,
    pub daily_gain_percentage: f64,

    pub num_shares: f64,
    pub unit_cost_basis: f64,
    pub total_cost_basis: f64,
    pub currently_held: bool,

    pub realized_gain: f64,
    pub unrealized_gain: f64,
    pub unrealized_gain_percentage: f64,
    pub total_gain: f64,

    pub all_time_high_value: f64,
    pub holding_days: u32,

    /// Reconciles unadjusted ledger share counts with the split-adjusted
    /// price history. Starts at the product of all split ratios and is
    /// divided by each ratio as the replay passes that split.
    pub split_multiplier: f64,

    // Display-only fields seeded from the fundamentals snapshot.
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
    pub gross_margin: Option<f64>,
    pub revenue_growth_yoy: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub forward_pe: Option<f64>,
    pub price_to_sales_ttm: Option<f64>,

    /// Date → mark-to-market value of the holding.
    pub value_history: BTreeMap<NaiveDate, f64>,

    #[serde(skip)]
    pub(crate) transactions: Vec<Transaction>,

    #[serde(skip)]
    pub(crate) lots: LotQueue,
}

impl Position {
    pub fn new(ticker: impl Into<String>, asset_type: AssetType) -> Self {
        Self {
            ticker: ticker.into(),
            asset_type,
            market_price: 0.0,
            market_prev_close: 0.0,
            market_value: 0.0,
            daily_gain: 0.0,
            daily_gain_percentage: 0.0,
            num_shares: 0.0,
            unit_cost_basis: 0.0,
            total_cost_basis: 0.0,
            currently_held: false,
            realized_gain: 0.0,
            unrealized_gain: 0.0,
            unrealized_gain_percentage: 0.0,
            total_gain: 0.0,
            all_time_high_value: 0.0,
            holding_days: 0,
            split_multiplier: 1.0,
            sector: None,
            industry: None,
            market_cap: None,
            gross_margin: None,
            revenue_growth_yoy: None,
            trailing_pe: None,
            forward_pe: None,
            price_to_sales_ttm: None,
            value_history: BTreeMap::new(),
            transactions: Vec::new(),
            lots: LotQueue::new(),
        }
    }

    pub fn add_transaction(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
    }

    /// This position's transactions (including merged splits once preprocessed).
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Open lots left after the last calculation.
    pub fn lots(&self) -> &LotQueue {
        &self.lots
    }

    /// Symbol used with external quote and history sources.
    pub fn quote_symbol(&self) -> String {
        self.asset_type.quote_symbol(&self.ticker)
    }

    /// Date of the first real (non-split) transaction.
    pub fn first_trade_date(&self) -> Option<NaiveDate> {
        self.transactions
            .iter()
            .find(|t| t.action != Action::Split)
            .map(Transaction::date)
    }

    /// Date of the last transaction of any kind.
    pub fn last_transaction_date(&self) -> Option<NaiveDate> {
        self.transactions.last().map(Transaction::date)
    }

    /// Discard every derived field. Transactions are kept.
    pub fn reset(&mut self) {
        let ticker = std::mem::take(&mut self.ticker);
        let transactions = std::mem::take(&mut self.transactions);
        *self = Self {
            transactions,
            ..Self::new(ticker, self.asset_type)
        };
        for txn in &mut self.transactions {
            txn.reset_returns();
        }
    }

    /// Merge the ticker's splits, sort chronologically and work out whether
    /// the position is still held and what the starting split multiplier is.
    pub fn preprocess(&mut self, splits: &SplitTable, delisted: bool) {
        self.transactions.retain(|t| t.action != Action::Split);
        self.transactions
            .extend(splits.transactions_for(&self.ticker));
        sort_chronologically(&mut self.transactions);

        let mut shares = 0.0;
        let mut multiplier = 1.0;
        for txn in &self.transactions {
            match txn.action {
                Action::Buy => shares += txn.shares,
                Action::Sell => shares -= txn.shares,
                Action::Split => {
                    shares *= txn.shares;
                    multiplier *= txn.shares;
                }
                Action::Deposit | Action::Withdraw => {}
            }
        }
        self.split_multiplier = multiplier;
        self.currently_held = shares > SHARE_EPSILON && !delisted;
    }

    /// Seed the market price and display fields from a quote snapshot.
    pub fn apply_fundamentals(&mut self, snapshot: Option<&Fundamentals>) {
        let Some(f) = snapshot else {
            log::warn!("No quote data returned for {}", self.ticker);
            return;
        };

        let price = match self.asset_type {
            // ETFs report a NAV instead of a current price.
            AssetType::Etf => f.nav_price.or(f.current_price),
            // Funds and coins only have a reliable previous close.
            AssetType::MutualFund | AssetType::Crypto => f.previous_close.or(f.current_price),
            AssetType::Stock | AssetType::Cash => f.current_price,
        };
        match price {
            Some(p) if p > 0.0 => self.market_price = p,
            _ => log::warn!("Couldn't obtain current market price for {}", self.ticker),
        }
        self.market_prev_close = f.previous_close.unwrap_or(0.0);

        if self.asset_type == AssetType::Stock && self.currently_held {
            self.sector = f.sector.clone();
            self.industry = f.industry.clone();
            self.market_cap = f.market_cap;
            self.gross_margin = f.gross_margins;
            self.revenue_growth_yoy = f.revenue_growth;
            self.trailing_pe = f.trailing_pe;
            self.forward_pe = f.forward_pe;
            self.price_to_sales_ttm = f.price_to_sales_ttm;
        }
    }

    /// Fall back to the stored closes when no snapshot price is known.
    pub fn price_from_history(&mut self, history: &[PricePoint]) {
        if self.market_price > 0.0 {
            return;
        }
        if let Some(last) = history.last() {
            self.market_price = last.close;
            self.market_prev_close = history
                .len()
                .checked_sub(2)
                .map(|i| history[i].close)
                .unwrap_or(0.0);
        }
    }

    /// Fill the holdings-derived fields from the open lots.
    pub(crate) fn derive_holdings(&mut self, now: NaiveDateTime, full_history: bool) {
        self.num_shares = self.lots.total_shares();
        self.total_cost_basis = self.lots.total_cost_basis();

        if full_history && self.currently_held {
            if let Some(first) = self.transactions.iter().find(|t| t.action != Action::Split) {
                // Partial days count as a whole day.
                let hours = (now - first.timestamp).num_seconds() as f64 / 3600.0;
                self.holding_days = (hours / 24.0).ceil().max(0.0) as u32;
            }
            self.daily_gain = (self.market_price - self.market_prev_close) * self.num_shares;
            if self.market_prev_close > SHARE_EPSILON {
                self.daily_gain_percentage = (self.market_price - self.market_prev_close) * 100.0
                    / self.market_prev_close;
            }
        }

        if self.num_shares > SHARE_EPSILON {
            self.unit_cost_basis = self.total_cost_basis / self.num_shares;
            self.market_value = self.market_price * self.num_shares;
            self.unrealized_gain = self.market_value - self.total_cost_basis;
            if self.total_cost_basis > SHARE_EPSILON {
                self.unrealized_gain_percentage =
                    (self.unrealized_gain / self.total_cost_basis) * 100.0;
            }
        }
        self.total_gain = self.realized_gain + self.unrealized_gain;
    }
}
