use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::sync::Arc;

use crate::errors::CoreError;
use crate::models::position::Position;
use crate::models::price::PricePoint;
use crate::providers::traits::{PriceStore, QuoteProvider};

/// Inclusive date range to request from the quote provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Decides when a stored price series is out of date and fills the gap
/// from the quote provider.
///
/// - unknown ticker: everything from the first transaction to today;
/// - held, latest close older than `stale_after`: latest+1 to today;
/// - sold, last transaction more than `sold_grace` after the latest close:
///   latest+1 to one day past the last transaction.
pub struct HistoryService {
    store: Arc<dyn PriceStore>,
    provider: Arc<dyn QuoteProvider>,
    stale_after: Duration,
    sold_grace: Duration,
}

impl HistoryService {
    pub fn new(
        store: Arc<dyn PriceStore>,
        provider: Arc<dyn QuoteProvider>,
        stale_after_hours: i64,
        sold_grace_hours: i64,
    ) -> Self {
        Self {
            store,
            provider,
            stale_after: Duration::hours(stale_after_hours),
            sold_grace: Duration::hours(sold_grace_hours),
        }
    }

    /// Pure backfill decision. `latest` is the newest stored close, `None`
    /// when the ticker is unknown to the store.
    pub fn plan(
        &self,
        latest: Option<NaiveDate>,
        first_activity: NaiveDate,
        last_activity: NaiveDateTime,
        held: bool,
        now: NaiveDateTime,
    ) -> Option<BackfillRange> {
        let today = now.date();
        let Some(latest) = latest else {
            return Some(BackfillRange {
                from: first_activity,
                to: today,
            });
        };

        let latest_start = latest.and_time(NaiveTime::default());
        let next_day = latest + Duration::days(1);
        if held {
            (now - latest_start > self.stale_after).then_some(BackfillRange {
                from: next_day,
                to: today,
            })
        } else {
            (last_activity - latest_start > self.sold_grace).then(|| BackfillRange {
                from: next_day,
                to: last_activity.date() + Duration::days(1),
            })
        }
    }

    /// Bring the stored series of `position` up to date.
    pub async fn refresh_position(
        &self,
        position: &Position,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let Some(last) = position.transactions().last() else {
            return Ok(());
        };
        let first = position
            .first_trade_date()
            .unwrap_or_else(|| last.date());
        self.refresh(
            &position.ticker,
            &position.quote_symbol(),
            first,
            last.timestamp,
            position.currently_held,
            now,
        )
        .await
    }

    /// Bring the benchmark series up to date. The benchmark is always
    /// treated as held.
    pub async fn refresh_benchmark(
        &self,
        ticker: &str,
        start: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let now_naive = now.naive_utc();
        self.refresh(ticker, ticker, start, now_naive, true, now).await
    }

    async fn refresh(
        &self,
        ticker: &str,
        symbol: &str,
        first_activity: NaiveDate,
        last_activity: NaiveDateTime,
        held: bool,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let latest = if self.store.exists(ticker).await? {
            self.store.latest_date(ticker).await?
        } else {
            None
        };

        let Some(range) = self.plan(latest, first_activity, last_activity, held, now.naive_utc())
        else {
            return Ok(());
        };
        if range.from > range.to {
            return Ok(());
        }

        log::debug!(
            "Querying {} data from {}: {} ---> {}",
            symbol,
            self.provider.name(),
            range.from,
            range.to
        );
        let rows = self
            .provider
            .fetch_history(symbol, range.from, range.to)
            .await?;
        if rows.is_empty() {
            return Ok(());
        }
        self.store.backfill(ticker, rows).await
    }

    /// Stored series for `ticker`. A store failure degrades to an empty series.
    pub async fn load_series(&self, ticker: &str) -> Vec<PricePoint> {
        match self.store.get_series(ticker).await {
            Ok(series) => series,
            Err(e) => {
                log::warn!("Couldn't load price history for {ticker}: {e}");
                Vec::new()
            }
        }
    }
}
