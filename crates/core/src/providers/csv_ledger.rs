use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::traits::LedgerSource;
use crate::errors::CoreError;
use crate::models::transaction::LedgerRow;

const REQUIRED_COLUMNS: [&str; 4] = ["date", "ticker", "action", "shares"];

/// Ledger kept as one CSV file per asset class: `<dir>/<asset_class>.csv`.
///
/// Expected header: `date,ticker,action,shares,price,type`. The `price` and
/// `type` columns may be omitted; header names are matched case-insensitively.
#[derive(Debug, Clone)]
pub struct CsvLedgerSource {
    dir: PathBuf,
}

impl CsvLedgerSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, asset_class: &str) -> PathBuf {
        self.dir.join(format!("{asset_class}.csv"))
    }

    /// Parse ledger rows from CSV text.
    pub fn parse(text: &str) -> Result<Vec<LedgerRow>, CoreError> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let headers = rdr.headers()?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
        };

        let mut required = [0usize; REQUIRED_COLUMNS.len()];
        for (slot, field) in required.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = column(field).ok_or(CoreError::MissingField { row: 0, field })?;
        }
        let [date, ticker, action, shares] = required;
        let price = column("price");
        let asset_type = column("type");

        let mut rows = Vec::new();
        for (idx, record) in rdr.records().enumerate() {
            let record = record?;
            // Header is row 0.
            let row = idx + 1;
            let cell = |i: usize, field: &'static str| {
                record
                    .get(i)
                    .map(str::to_string)
                    .ok_or(CoreError::MissingField { row, field })
            };
            let optional = |i: Option<usize>| {
                i.and_then(|i| record.get(i))
                    .unwrap_or_default()
                    .to_string()
            };

            let date = cell(date, "date")?;
            if date.is_empty() {
                // Blank rows are dropped by the catalogue; keep them out early.
                continue;
            }
            rows.push(LedgerRow {
                date,
                ticker: cell(ticker, "ticker")?,
                action: cell(action, "action")?,
                shares: cell(shares, "shares")?,
                price: optional(price),
                asset_type: optional(asset_type),
            });
        }
        Ok(rows)
    }

    async fn read(path: &Path) -> Result<String, CoreError> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CoreError::Ledger(format!("Failed to read {}: {e}", path.display())))
    }
}

#[async_trait]
impl LedgerSource for CsvLedgerSource {
    async fn get_transaction_rows(&self, asset_class: &str) -> Result<Vec<LedgerRow>, CoreError> {
        let path = self.path_for(asset_class);
        let text = Self::read(&path).await?;
        let rows = Self::parse(&text)?;
        log::info!("Read {} ledger rows from {}", rows.len(), path.display());
        Ok(rows)
    }
}
