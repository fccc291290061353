use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;

use crate::models::lot::LotQueue;
use crate::models::position::{Position, SHARE_EPSILON};
use crate::models::price::PricePoint;
use crate::models::transaction::{Action, Transaction};
use crate::services::benchmark_service::BenchmarkComparator;

/// Computes one position's cost basis, realized gain, per-trade returns and
/// value history from its (preprocessed) transactions.
///
/// Two independent replays run over the same transactions:
/// - the lot replay, a FIFO queue used for cost-basis attribution;
/// - the value walk, a plain share counter marked to market on each price date.
pub struct PositionService;

impl PositionService {
    pub fn new() -> Self {
        Self
    }

    /// Rebuild every derived field of `position`.
    ///
    /// Expects `position.preprocess` to have run and the market price to be
    /// seeded already. `history` must be sorted by date. When the history is
    /// empty or no market price is known, only replay-derived metrics are
    /// produced (no value history, no all-time high).
    pub fn calculate(
        &self,
        position: &mut Position,
        history: &[PricePoint],
        benchmark: &BenchmarkComparator,
        now: NaiveDateTime,
    ) {
        let today = now.date();
        let mut replay = LotReplay {
            lots: LotQueue::new(),
            realized_gain: 0.0,
            split_multiplier: position.split_multiplier,
            market_price: position.market_price,
        };
        for txn in &mut position.transactions {
            replay.apply(txn, benchmark, today);
        }

        let full_history = !history.is_empty() && position.market_price > 0.0;
        if full_history {
            position.value_history = build_value_history(
                &position.transactions,
                history,
                position.split_multiplier,
            );
            position.all_time_high_value = position
                .value_history
                .values()
                .copied()
                .fold(0.0, f64::max);
        } else {
            log::info!("Calculating reduced metrics for {}", position.ticker);
            position.value_history.clear();
            position.all_time_high_value = 0.0;
        }

        position.lots = replay.lots;
        position.realized_gain = replay.realized_gain;
        position.split_multiplier = replay.split_multiplier;
        position.derive_holdings(now, full_history);
    }
}

impl Default for PositionService {
    fn default() -> Self {
        Self::new()
    }
}

/// State of the lot replay for a single position.
struct LotReplay {
    lots: LotQueue,
    realized_gain: f64,
    split_multiplier: f64,
    market_price: f64,
}

impl LotReplay {
    fn apply(&mut self, txn: &mut Transaction, benchmark: &BenchmarkComparator, today: NaiveDate) {
        match txn.action {
            Action::Buy => {
                self.lots.buy(txn.shares, txn.price);
                txn.benchmark_return = benchmark.return_since(txn.date(), today);
            }
            Action::Sell => {
                txn.benchmark_return = -benchmark.return_since(txn.date(), today);
                let outcome = self.lots.sell(txn.shares, txn.price);
                self.realized_gain += outcome.realized_gain;
                if outcome.oversold_shares > 0.0 {
                    log::warn!(
                        "{} is oversold, adding remaining {} shares to realized gain (${:.2})",
                        txn.ticker,
                        outcome.oversold_shares,
                        outcome.oversold_shares * txn.price
                    );
                }
            }
            Action::Split => {
                self.lots.split(txn.shares);
                self.split_multiplier /= txn.shares;
            }
            Action::Deposit | Action::Withdraw => {}
        }

        if self.market_price > 0.0 && txn.action.is_trade() && txn.value != 0.0 {
            let sign = if txn.action == Action::Sell { -1.0 } else { 1.0 };
            let held_value = self.market_price * txn.shares * self.split_multiplier;
            txn.total_return = sign * (held_value - txn.value) / txn.value * 100.0;
            txn.excess_return = txn.total_return - txn.benchmark_return;
        }
    }
}

/// Mark a transaction stream to market against a split-adjusted price series.
///
/// Each price date first replays every remaining transaction dated on or
/// before it, so a trade booked on a weekend or holiday is rolled forward to
/// the next close instead of being skipped. It then records `shares × close × multiplier`. The walk stops at
/// the first date where nothing is held and no transactions remain.
pub fn build_value_history(
    transactions: &[Transaction],
    history: &[PricePoint],
    initial_multiplier: f64,
) -> BTreeMap<NaiveDate, f64> {
    let mut values = BTreeMap::new();
    let mut shares = 0.0;
    let mut multiplier = initial_multiplier;
    let mut next = 0;

    for point in history {
        while let Some(txn) = transactions.get(next).filter(|t| t.date() <= point.date) {
            match txn.action {
                Action::Buy => shares += txn.shares,
                Action::Sell => shares -= txn.shares,
                Action::Split => {
                    shares *= txn.shares;
                    multiplier /= txn.shares;
                }
                Action::Deposit | Action::Withdraw => {}
            }
            if shares < SHARE_EPSILON {
                shares = 0.0;
            }
            next += 1;
        }

        if shares > 0.0 || next < transactions.len() {
            values.insert(point.date, shares * point.close * multiplier);
        } else {
            break;
        }
    }

    values
}
