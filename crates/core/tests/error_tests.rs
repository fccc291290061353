// ═══════════════════════════════════════════════════════════════════
// Error Tests: CoreError variants, Display formatting, From impls
// ═══════════════════════════════════════════════════════════════════

use portfolio_tracker_core::errors::CoreError;

// ── Display formatting ──────────────────────────────────────────────

mod display {
    use super::*;

    #[test]
    fn invalid_date() {
        let err = CoreError::InvalidDate("2024-02-30".into());
        assert_eq!(
            err.to_string(),
            "Unable to parse date field from transaction: '2024-02-30'"
        );
    }

    #[test]
    fn invalid_shares() {
        let err = CoreError::InvalidShares("abc".into());
        assert_eq!(
            err.to_string(),
            "Unable to parse shares field from transaction: 'abc'"
        );
    }

    #[test]
    fn unknown_action() {
        let err = CoreError::UnknownAction("Dividend".into());
        assert!(err.to_string().contains("'Dividend'"));
    }

    #[test]
    fn unknown_asset_type() {
        let err = CoreError::UnknownAssetType {
            ticker: "XYZ".into(),
            asset_type: "Bond".into(),
        };
        assert_eq!(err.to_string(), "Invalid asset type 'Bond' for XYZ");
    }

    #[test]
    fn missing_field() {
        let err = CoreError::MissingField {
            row: 7,
            field: "shares",
        };
        assert_eq!(err.to_string(), "Ledger row 7 is missing the 'shares' column");
    }

    #[test]
    fn api_error() {
        let err = CoreError::Api {
            provider: "Yahoo Finance".into(),
            message: "HTTP 429".into(),
        };
        assert_eq!(err.to_string(), "API error (Yahoo Finance): HTTP 429");
    }

    #[test]
    fn worker_error() {
        let err = CoreError::Worker {
            ticker: "AAPL".into(),
            message: "task panicked".into(),
        };
        assert_eq!(err.to_string(), "Worker for AAPL failed: task panicked");
    }

    #[test]
    fn price_store() {
        let err = CoreError::PriceStore("Refusing close NaN for SPY on 2024-01-03".into());
        assert_eq!(
            err.to_string(),
            "Price store error: Refusing close NaN for SPY on 2024-01-03"
        );
    }

    #[test]
    fn configuration() {
        let err = CoreError::Configuration("cash_ticker must not be empty".into());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: cash_ticker must not be empty"
        );
    }
}

// ── Classification ──────────────────────────────────────────────────

mod schema {
    use super::*;

    #[test]
    fn ledger_errors_are_schema_errors() {
        assert!(CoreError::InvalidDate(String::new()).is_schema_error());
        assert!(CoreError::InvalidShares(String::new()).is_schema_error());
        assert!(CoreError::InvalidPrice(String::new()).is_schema_error());
        assert!(CoreError::UnknownAction(String::new()).is_schema_error());
        assert!(CoreError::MissingField { row: 1, field: "date" }.is_schema_error());
    }

    #[test]
    fn degraded_paths_are_not_schema_errors() {
        assert!(!CoreError::UnknownAssetType {
            ticker: "X".into(),
            asset_type: "Y".into()
        }
        .is_schema_error());
        assert!(!CoreError::Network("timeout".into()).is_schema_error());
        assert!(!CoreError::PriceStore("locked".into()).is_schema_error());
    }
}

// ── From conversions ────────────────────────────────────────────────

mod conversions {
    use super::*;

    #[test]
    fn from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: CoreError = io.into();
        assert!(matches!(err, CoreError::FileIO(ref m) if m.contains("gone")));
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: CoreError = json_err.into();
        assert!(matches!(err, CoreError::Deserialization(_)));
    }

    #[test]
    fn from_csv_error() {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader("a,b\nc\n".as_bytes());
        let csv_err = rdr
            .records()
            .find_map(Result::err)
            .expect("unequal row lengths should fail");
        let err: CoreError = csv_err.into();
        assert!(matches!(err, CoreError::Csv(_)));
    }

    #[test]
    fn question_mark_propagates() {
        fn read() -> Result<String, CoreError> {
            Ok(std::fs::read_to_string("/definitely/not/here.csv")?)
        }
        assert!(matches!(read(), Err(CoreError::FileIO(_))));
    }
}
