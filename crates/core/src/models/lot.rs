use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// An open buy with its remaining shares and per-share cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    pub shares: f64,
    pub price: f64,
}

impl Lot {
    pub fn cost_basis(&self) -> f64 {
        self.shares * self.price
    }
}

/// Result of matching one sell against the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SaleOutcome {
    /// Gain (or loss) locked in by this sale.
    pub realized_gain: f64,
    /// Shares sold beyond what the queue held, credited at zero cost basis.
    pub oversold_shares: f64,
}

/// FIFO queue of open lots for a single ticker.
///
/// Sells consume from the front (oldest lot first). Shares the queue cannot
/// cover are usually reinvested dividends that never appeared as a Buy; they
/// count as realized gain at full sale value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LotQueue {
    lots: VecDeque<Lot>,
}

impl LotQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new lot at the back of the queue.
    pub fn buy(&mut self, shares: f64, price: f64) {
        self.lots.push_back(Lot { shares, price });
    }

    /// Consume `shares` at `price` from the oldest lots.
    pub fn sell(&mut self, shares: f64, price: f64) -> SaleOutcome {
        let mut outcome = SaleOutcome::default();
        let mut remaining = shares;

        while remaining > 0.0 {
            let Some(front) = self.lots.front_mut() else {
                outcome.realized_gain += remaining * price;
                outcome.oversold_shares = remaining;
                break;
            };

            if front.shares > remaining {
                outcome.realized_gain += (price - front.price) * remaining;
                front.shares -= remaining;
                remaining = 0.0;
            } else {
                // Lot fully consumed (exactly or with shares left to sell).
                outcome.realized_gain += (price - front.price) * front.shares;
                remaining -= front.shares;
                self.lots.pop_front();
            }
        }

        outcome
    }

    /// Apply a split to every open lot. Cost basis per lot is unchanged.
    pub fn split(&mut self, ratio: f64) {
        for lot in &mut self.lots {
            lot.shares *= ratio;
            lot.price /= ratio;
        }
    }

    pub fn total_shares(&self) -> f64 {
        self.lots.iter().map(|l| l.shares).sum()
    }

    pub fn total_cost_basis(&self) -> f64 {
        self.lots.iter().map(Lot::cost_basis).sum()
    }

    pub fn lots(&self) -> impl Iterator<Item = &Lot> {
        self.lots.iter()
    }

    pub fn len(&self) -> usize {
        self.lots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    pub fn clear(&mut self) {
        self.lots.clear();
    }
}
