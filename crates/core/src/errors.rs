use thiserror::Error;

/// Unified error type for the entire portfolio-tracker-core library.
/// Every public function returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Ledger schema ───────────────────────────────────────────────
    #[error("Unable to parse date field from transaction: '{0}'")]
    InvalidDate(String),

    #[error("Unable to parse shares field from transaction: '{0}'")]
    InvalidShares(String),

    #[error("Unable to parse price field from transaction: '{0}'")]
    InvalidPrice(String),

    #[error("Unknown transaction action '{0}' (expected Buy, Sell, Deposit, Withdraw or Split)")]
    UnknownAction(String),

    #[error("Invalid asset type '{asset_type}' for {ticker}")]
    UnknownAssetType { ticker: String, asset_type: String },

    #[error("Ledger row {row} is missing the '{field}' column")]
    MissingField { row: usize, field: &'static str },

    // ── Collaborators ───────────────────────────────────────────────
    #[error("API error ({provider}): {message}")]
    Api {
        provider: String,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Price store error: {0}")]
    PriceStore(String),

    #[error("Ledger source error: {0}")]
    Ledger(String),

    // ── Files / Serialization ───────────────────────────────────────
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("File I/O error: {0}")]
    FileIO(String),

    #[error("CSV error: {0}")]
    Csv(String),

    // ── Runtime ─────────────────────────────────────────────────────
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Worker for {ticker} failed: {message}")]
    Worker { ticker: String, message: String },
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::FileIO(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}

impl From<csv::Error> for CoreError {
    fn from(e: csv::Error) -> Self {
        CoreError::Csv(e.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest errors carry the full URL; drop the query string.
        let msg = e.to_string();
        let sanitized = if let Some(idx) = msg.find('?') {
            format!("{}?<query redacted>", &msg[..idx])
        } else {
            msg
        };
        CoreError::Network(sanitized)
    }
}

impl CoreError {
    /// Schema errors come from a malformed ledger and abort the whole import.
    #[must_use]
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidDate(_)
                | CoreError::InvalidShares(_)
                | CoreError::InvalidPrice(_)
                | CoreError::UnknownAction(_)
                | CoreError::MissingField { .. }
        )
    }
}
