use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::CoreError;

/// The type/category of a position, as declared in the ledger's type column.
/// Determines which quote field carries the current price and how the
/// symbol is looked up with external sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetType {
    /// Individual stocks (AAPL, TSLA, etc.)
    Stock,
    /// Exchange-traded funds, quoted by NAV
    #[serde(rename = "ETF")]
    Etf,
    /// Mutual funds, priced once a day (previous close)
    #[serde(rename = "Mutual Fund")]
    MutualFund,
    /// Cryptocurrencies, looked up as `<TICKER>-USD`
    Crypto,
    /// The cash sentinel position
    Cash,
}

impl AssetType {
    /// Parse the ledger spelling of an asset type for `ticker`.
    pub fn parse_for(ticker: &str, raw: &str) -> Result<Self, CoreError> {
        raw.parse().map_err(|_| CoreError::UnknownAssetType {
            ticker: ticker.to_string(),
            asset_type: raw.to_string(),
        })
    }

    /// Symbol to use with external quote sources.
    pub fn quote_symbol(&self, ticker: &str) -> String {
        match self {
            AssetType::Crypto => format!("{ticker}-USD"),
            _ => ticker.to_string(),
        }
    }
}

impl FromStr for AssetType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Stock" => Ok(AssetType::Stock),
            "ETF" => Ok(AssetType::Etf),
            "Mutual Fund" => Ok(AssetType::MutualFund),
            "Crypto" => Ok(AssetType::Crypto),
            "Cash" => Ok(AssetType::Cash),
            other => Err(CoreError::UnknownAssetType {
                ticker: String::new(),
                asset_type: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetType::Stock => write!(f, "Stock"),
            AssetType::Etf => write!(f, "ETF"),
            AssetType::MutualFund => write!(f, "Mutual Fund"),
            AssetType::Crypto => write!(f, "Crypto"),
            AssetType::Cash => write!(f, "Cash"),
        }
    }
}
