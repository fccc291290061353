use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single daily close (date → split-adjusted close).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// Best-effort quote and fundamentals snapshot for one symbol.
///
/// Every field is optional: sources differ in what they report, and a
/// missing field only leaves a display value empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fundamentals {
    pub current_price: Option<f64>,
    pub nav_price: Option<f64>,
    pub previous_close: Option<f64>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
    pub gross_margins: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub forward_pe: Option<f64>,
    pub price_to_sales_ttm: Option<f64>,
}
