use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::collections::HashMap;
use time::OffsetDateTime;

use super::traits::QuoteProvider;
use crate::errors::CoreError;
use crate::models::price::{Fundamentals, PricePoint};

const PROVIDER_NAME: &str = "Yahoo Finance";
const QUOTE_URL: &str = "https://query1.finance.yahoo.com/v7/finance/quote";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) portfolio-tracker";

/// Symbols per bulk quote request.
const QUOTE_BATCH_SIZE: usize = 50;

/// Yahoo Finance market data.
///
/// - **Free**: No API key required.
/// - **History**: daily split-adjusted closes through the `yahoo_finance_api` crate.
/// - **Snapshot**: the public bulk quote endpoint, queried in batches of
///   [`QUOTE_BATCH_SIZE`] symbols concurrently.
pub struct YahooFinanceProvider {
    connector: yahoo_finance_api::YahooConnector,
    client: reqwest::Client,
}

impl YahooFinanceProvider {
    pub fn new() -> Result<Self, CoreError> {
        let connector = yahoo_finance_api::YahooConnector::new()
            .map_err(|e| api_error(format!("Failed to create connector: {e}")))?;
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { connector, client })
    }

    /// Convert a `chrono::NaiveDate` to `time::OffsetDateTime` (midnight UTC).
    fn to_offset_datetime(date: NaiveDate) -> Result<OffsetDateTime, CoreError> {
        let month = u8::try_from(date.month())
            .ok()
            .and_then(|m| time::Month::try_from(m).ok())
            .ok_or_else(|| api_error(format!("Invalid month in {date}")))?;
        let day = u8::try_from(date.day()).map_err(|e| api_error(format!("{date}: {e}")))?;

        let odt = time::Date::from_calendar_date(date.year(), month, day)
            .map_err(|e| api_error(format!("Invalid date {date}: {e}")))?
            .with_hms(0, 0, 0)
            .map_err(|e| api_error(format!("Invalid time for {date}: {e}")))?
            .assume_utc();
        Ok(odt)
    }

    /// Convert a unix timestamp (seconds) to `chrono::NaiveDate`.
    fn timestamp_to_naive_date(ts: i64) -> Option<NaiveDate> {
        chrono::DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive())
    }

    async fn fetch_quote_batch(
        &self,
        symbols: &[String],
    ) -> Result<Vec<YahooQuote>, CoreError> {
        let response = self
            .client
            .get(QUOTE_URL)
            .query(&[("symbols", symbols.join(","))])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(format!(
                "Quote request returned HTTP {}",
                response.status()
            )));
        }

        let body: YahooQuoteEnvelope = response
            .json()
            .await
            .map_err(|e| CoreError::Deserialization(format!("Yahoo quote response: {e}")))?;
        Ok(body.quote_response.result)
    }
}

fn api_error(message: String) -> CoreError {
    CoreError::Api {
        provider: PROVIDER_NAME.into(),
        message,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YahooQuoteEnvelope {
    quote_response: YahooQuoteResponse,
}

#[derive(Debug, Deserialize)]
struct YahooQuoteResponse {
    #[serde(default)]
    result: Vec<YahooQuote>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YahooQuote {
    symbol: String,
    regular_market_price: Option<f64>,
    regular_market_previous_close: Option<f64>,
    nav_price: Option<f64>,
    market_cap: Option<f64>,
    #[serde(rename = "trailingPE")]
    trailing_pe: Option<f64>,
    #[serde(rename = "forwardPE")]
    forward_pe: Option<f64>,
    #[serde(rename = "priceToSalesTrailing12Months")]
    price_to_sales_ttm: Option<f64>,
    sector: Option<String>,
    industry: Option<String>,
    gross_margins: Option<f64>,
    revenue_growth: Option<f64>,
}

impl From<YahooQuote> for Fundamentals {
    fn from(q: YahooQuote) -> Self {
        Fundamentals {
            current_price: q.regular_market_price,
            nav_price: q.nav_price,
            previous_close: q.regular_market_previous_close,
            sector: q.sector,
            industry: q.industry,
            market_cap: q.market_cap,
            gross_margins: q.gross_margins,
            revenue_growth: q.revenue_growth,
            trailing_pe: q.trailing_pe,
            forward_pe: q.forward_pe,
            price_to_sales_ttm: q.price_to_sales_ttm,
        }
    }
}

#[async_trait]
impl QuoteProvider for YahooFinanceProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError> {
        let start = Self::to_offset_datetime(from)?;
        let end = Self::to_offset_datetime(to + chrono::Duration::days(1))?; // inclusive end

        let resp = self
            .connector
            .get_quote_history(symbol, start, end)
            .await
            .map_err(|e| api_error(format!("Failed to fetch history range for {symbol}: {e}")))?;

        let quotes = resp
            .quotes()
            .map_err(|e| api_error(format!("Failed to parse quotes for {symbol}: {e}")))?;

        let mut points: Vec<PricePoint> = quotes
            .iter()
            .filter_map(|q| {
                let date = Self::timestamp_to_naive_date(q.timestamp)?;
                (date >= from && date <= to && q.adjclose > 0.0)
                    .then(|| PricePoint::new(date, q.adjclose))
            })
            .collect();
        points.sort_by_key(|p| p.date);
        points.dedup_by_key(|p| p.date);

        Ok(points)
    }

    async fn get_bulk_snapshot(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, Fundamentals>, CoreError> {
        let batches = symbols
            .chunks(QUOTE_BATCH_SIZE)
            .map(|batch| self.fetch_quote_batch(batch));
        let results = futures::future::join_all(batches).await;

        let mut snapshots = HashMap::new();
        let mut last_error = None;
        for result in results {
            match result {
                Ok(quotes) => snapshots.extend(
                    quotes
                        .into_iter()
                        .map(|q| (q.symbol.clone(), Fundamentals::from(q))),
                ),
                Err(e) => {
                    log::warn!("Quote batch from {PROVIDER_NAME} failed: {e}");
                    last_error = Some(e);
                }
            }
        }

        // Only fail when nothing at all came back.
        match last_error {
            Some(e) if snapshots.is_empty() => Err(e),
            _ => Ok(snapshots),
        }
    }
}
