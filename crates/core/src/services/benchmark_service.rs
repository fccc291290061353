use chrono::{Duration, NaiveDate};

use crate::models::price::PricePoint;

/// Day offsets probed when a past date has no close, nearest first and the
/// earlier day winning ties.
const FALLBACK_OFFSETS: [i64; 6] = [-1, 1, -2, 2, -3, 3];

/// Looks up the reference index's close on arbitrary dates and turns it into
/// a percentage return up to today.
///
/// Weekends and holidays have no close; past dates fall back to the nearest
/// trading day within three days. A lookup for today returns the most recent
/// close, since today's close may not exist yet.
#[derive(Debug, Clone, Default)]
pub struct BenchmarkComparator {
    ticker: String,
    series: Vec<PricePoint>,
}

impl BenchmarkComparator {
    pub fn new(ticker: impl Into<String>, mut series: Vec<PricePoint>) -> Self {
        series.sort_by_key(|p| p.date);
        series.dedup_by_key(|p| p.date);
        Self {
            ticker: ticker.into(),
            series,
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn series(&self) -> &[PricePoint] {
        &self.series
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    fn close_on(&self, date: NaiveDate) -> Option<f64> {
        self.series
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|i| self.series[i].close)
    }

    /// Close on `date`, or 0 when nothing usable is found.
    pub fn quote_on(&self, date: NaiveDate, today: NaiveDate) -> f64 {
        if let Some(close) = self.close_on(date) {
            return close;
        }
        if date == today {
            if let Some(latest) = self.series.last() {
                return latest.close;
            }
        }
        for offset in FALLBACK_OFFSETS {
            if let Some(close) = self.close_on(date + Duration::days(offset)) {
                return close;
            }
        }
        log::warn!(
            "Could not find {} quote for {}, please add missing price history",
            self.ticker,
            date
        );
        0.0
    }

    /// Percentage change of the benchmark from `date` to `today`.
    pub fn return_since(&self, date: NaiveDate, today: NaiveDate) -> f64 {
        if self.series.is_empty() {
            return 0.0;
        }
        let then = self.quote_on(date, today);
        if then <= 0.0 {
            return 0.0;
        }
        let now = self.quote_on(today, today);
        (now - then) / then * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn probes_earlier_day_first() {
        let bench = BenchmarkComparator::new(
            "SPY",
            vec![PricePoint::new(d(2024, 1, 4), 10.0), PricePoint::new(d(2024, 1, 6), 12.0)],
        );
        assert_eq!(bench.quote_on(d(2024, 1, 5), d(2024, 2, 1)), 10.0);
    }

    #[test]
    fn zero_base_yields_zero_return() {
        let bench = BenchmarkComparator::new(
            "SPY",
            vec![PricePoint::new(d(2024, 1, 2), 0.0), PricePoint::new(d(2024, 1, 3), 5.0)],
        );
        assert_eq!(bench.return_since(d(2024, 1, 2), d(2024, 1, 3)), 0.0);
    }
}
