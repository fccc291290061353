use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

use crate::models::position::SHARE_EPSILON;
use crate::models::transaction::{Action, Transaction};

/// Cash balance reconstructed from the full transaction list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CashReplay {
    /// End-of-day cash balance on every day with a transaction.
    pub history: BTreeMap<NaiveDate, f64>,
    /// Balance after the last transaction.
    pub balance: f64,
    /// Year → deposits minus withdrawals.
    pub flow_by_year: BTreeMap<i32, f64>,
    /// Day → deposits minus withdrawals.
    pub flow_by_date: BTreeMap<NaiveDate, f64>,
}

impl CashReplay {
    /// Cash balance at the end of `date` (0 before the first transaction).
    pub fn balance_on(&self, date: NaiveDate) -> f64 {
        self.history
            .range(..=date)
            .next_back()
            .map(|(_, v)| *v)
            .unwrap_or(0.0)
    }

    pub fn flow_in(&self, year: i32) -> f64 {
        self.flow_by_year.get(&year).copied().unwrap_or(0.0)
    }

    /// Net deposits dated within `[from, to]`.
    pub fn flow_between(&self, from: NaiveDate, to: NaiveDate) -> f64 {
        if from > to {
            return 0.0;
        }
        self.flow_by_date.range(from..=to).map(|(_, v)| v).sum()
    }
}

/// Year-by-year returns of the portfolio.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnualPerformance {
    pub by_year: BTreeMap<i32, f64>,
    pub market_value_at_year_start: f64,
    pub year_to_date_percentage_gain: f64,
}

/// Portfolio-wide return arithmetic: cash replay, percentage gain and the
/// simple (not time-weighted) annual return.
pub struct PerformanceService;

impl PerformanceService {
    pub fn new() -> Self {
        Self
    }

    /// Replay `transactions` (chronological) into a cash balance.
    /// Deposits and sells add cash, withdrawals and buys spend it.
    pub fn replay_cash(&self, transactions: &[Transaction]) -> CashReplay {
        let mut replay = CashReplay::default();
        for txn in transactions {
            match txn.action {
                Action::Deposit | Action::Sell => replay.balance += txn.value,
                Action::Withdraw | Action::Buy => replay.balance -= txn.value,
                Action::Split => continue,
            }
            replay.history.insert(txn.date(), replay.balance);

            let flow = match txn.action {
                Action::Deposit => txn.value,
                Action::Withdraw => -txn.value,
                _ => 0.0,
            };
            *replay.flow_by_year.entry(txn.date().year()).or_insert(0.0) += flow;
            if flow != 0.0 {
                *replay.flow_by_date.entry(txn.date()).or_insert(0.0) += flow;
            }
        }
        replay
    }

    /// `(market − cost) / cost × 100`, or 0 with a (near) zero cost basis.
    pub fn percentage_gain(&self, market_value: f64, cost_basis: f64) -> f64 {
        if cost_basis > SHARE_EPSILON {
            (market_value - cost_basis) / cost_basis * 100.0
        } else {
            0.0
        }
    }

    /// Portfolio value (positions plus cash) `year` started with.
    ///
    /// Taken on the first recorded day of `year`, minus the deposits and
    /// withdrawals of `year` made up to that day: those belong to the year's
    /// own cash flow. Without a recorded day in `year`, the cash balance at
    /// the end of the previous year.
    pub fn year_start_value(
        &self,
        equity_history: &BTreeMap<NaiveDate, f64>,
        cash: &CashReplay,
        year: i32,
    ) -> f64 {
        let (Some(first_of_year), Some(last_of_year)) = (
            NaiveDate::from_ymd_opt(year, 1, 1),
            NaiveDate::from_ymd_opt(year, 12, 31),
        ) else {
            return 0.0;
        };
        match equity_history.range(first_of_year..=last_of_year).next() {
            Some((date, equity)) => {
                equity + cash.balance_on(*date) - cash.flow_between(first_of_year, *date)
            }
            None => first_of_year
                .pred_opt()
                .map(|eoy| cash.balance_on(eoy))
                .unwrap_or(0.0),
        }
    }

    /// Return of every year from `first_year` to `current_year`.
    ///
    /// A completed year compares the next year's starting value against its
    /// own starting value plus net cash flow; the current year compares
    /// `total_market_value` against the same baseline.
    pub fn annual_performance(
        &self,
        equity_history: &BTreeMap<NaiveDate, f64>,
        cash: &CashReplay,
        first_year: i32,
        current_year: i32,
        total_market_value: f64,
    ) -> AnnualPerformance {
        let mut performance = AnnualPerformance::default();
        if first_year > current_year {
            return performance;
        }

        let mut start = self.year_start_value(equity_history, cash, first_year);
        for year in first_year..=current_year {
            let baseline = start + cash.flow_in(year);
            let end = if year == current_year {
                total_market_value
            } else {
                self.year_start_value(equity_history, cash, year + 1)
            };
            let pct = growth_percentage(end, baseline);
            performance.by_year.insert(year, pct);

            if year == current_year {
                performance.market_value_at_year_start = start;
                performance.year_to_date_percentage_gain = pct;
            }
            start = end;
        }
        performance
    }
}

impl Default for PerformanceService {
    fn default() -> Self {
        Self::new()
    }
}

fn growth_percentage(end: f64, baseline: f64) -> f64 {
    if baseline <= SHARE_EPSILON {
        return 0.0;
    }
    (end / baseline - 1.0) * 100.0
}
