use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Summary of the entire portfolio after a calculation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    /// Market value of every non-cash position plus the cash balance
    pub total_market_value: f64,

    /// Cost basis of the open lots of every non-cash position
    pub total_cost_basis: f64,

    /// Number of positions currently held
    pub total_positions_held: usize,

    /// Sum of today's per-position gains
    pub daily_gain: f64,

    /// (total_market_value − total_cost_basis) / total_cost_basis × 100,
    /// 0 when the cost basis is (near) zero
    pub percentage_gain: f64,

    pub year_to_date_percentage_gain: f64,

    /// Portfolio value (positions + cash) on the first recorded day of this
    /// year, net of this year's deposits and withdrawals up to that day
    pub market_value_at_year_start: f64,

    /// Year → percentage return for that year
    pub annual_performance_by_year: BTreeMap<i32, f64>,

    pub last_updated: DateTime<Utc>,
}
