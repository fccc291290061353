// ═══════════════════════════════════════════════════════════════════
// Model Tests: Transaction parsing, AssetType, LotQueue, Settings,
// Position preprocessing and market price seeding
// ═══════════════════════════════════════════════════════════════════

use chrono::NaiveDate;

use portfolio_tracker_core::errors::CoreError;
use portfolio_tracker_core::models::asset::AssetType;
use portfolio_tracker_core::models::lot::LotQueue;
use portfolio_tracker_core::models::position::Position;
use portfolio_tracker_core::models::price::{Fundamentals, PricePoint};
use portfolio_tracker_core::models::settings::{Settings, SplitTable};
use portfolio_tracker_core::models::transaction::{
    parse_amount, sort_chronologically, Action, LedgerRow, Transaction,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

// ═══════════════════════════════════════════════════════════════════
// Transaction
// ═══════════════════════════════════════════════════════════════════

mod transaction {
    use super::*;

    #[test]
    fn parses_buy_with_thousands_separator() {
        let txn = Transaction::parse("2024-03-15", "AAPL", "Buy", "1,250.5", "2.00").unwrap();
        assert_eq!(txn.ticker, "AAPL");
        assert_eq!(txn.action, Action::Buy);
        assert_close(txn.shares, 1250.5);
        assert_close(txn.price, 2.0);
        assert_close(txn.value, 2501.0);
        assert_eq!(txn.date(), d(2024, 3, 15));
    }

    #[test]
    fn missing_price_defaults_to_one() {
        let txn = Transaction::parse("2024-01-02", "CASH", "Deposit", "5,000", "").unwrap();
        assert_close(txn.price, 1.0);
        assert_close(txn.value, 5000.0);
    }

    #[test]
    fn action_is_case_insensitive() {
        let txn = Transaction::parse("2024-01-02", "MSFT", "sell", "3", "400").unwrap();
        assert_eq!(txn.action, Action::Sell);
        assert_eq!(Action::Withdraw.to_string(), "Withdraw");
    }

    #[test]
    fn invalid_date_is_a_schema_error() {
        let err = Transaction::parse("03/15/2024", "AAPL", "Buy", "1", "1").unwrap_err();
        assert!(matches!(err, CoreError::InvalidDate(_)));
        assert!(err.is_schema_error());
    }

    #[test]
    fn negative_or_garbage_shares_rejected() {
        let err = Transaction::parse("2024-01-02", "AAPL", "Buy", "-1", "1").unwrap_err();
        assert!(matches!(err, CoreError::InvalidShares(_)));

        let err = Transaction::parse("2024-01-02", "AAPL", "Buy", "ten", "1").unwrap_err();
        assert!(matches!(err, CoreError::InvalidShares(_)));
    }

    #[test]
    fn unparsable_price_rejected() {
        let err = Transaction::parse("2024-01-02", "AAPL", "Buy", "1", "$12").unwrap_err();
        assert!(matches!(err, CoreError::InvalidPrice(_)));
        assert!(err.is_schema_error());
    }

    #[test]
    fn unknown_action_rejected() {
        let err = Transaction::parse("2024-01-02", "AAPL", "Dividend", "1", "1").unwrap_err();
        assert!(matches!(err, CoreError::UnknownAction(ref a) if a == "Dividend"));
    }

    #[test]
    fn from_row_ignores_type_column() {
        let row = LedgerRow::new("2024-01-02", "VTI", "Buy", "2", "200", "ETF");
        let txn = Transaction::from_row(&row).unwrap();
        assert_eq!(txn.ticker, "VTI");
        assert_close(txn.value, 400.0);
    }

    #[test]
    fn blank_rows_detected() {
        assert!(LedgerRow::new("  ", "", "", "", "", "").is_blank());
        assert!(!LedgerRow::new("2024-01-02", "VTI", "Buy", "1", "", "").is_blank());
    }

    #[test]
    fn split_sorts_before_same_day_trade() {
        let buy = Transaction::parse("2022-08-25", "TSLA", "Buy", "1", "900").unwrap();
        let split = Transaction::split("TSLA", d(2022, 8, 25), 3.0);
        let mut txns = vec![buy, split];
        sort_chronologically(&mut txns);
        assert_eq!(txns[0].action, Action::Split);
        assert_eq!(txns[1].action, Action::Buy);
    }

    #[test]
    fn same_timestamp_keeps_ledger_order() {
        let first = Transaction::parse("2024-01-02", "A", "Buy", "1", "1").unwrap();
        let second = Transaction::parse("2024-01-02", "A", "Sell", "1", "1").unwrap();
        let (first_id, second_id) = (first.id, second.id);
        let mut txns = vec![first, second];
        sort_chronologically(&mut txns);
        assert_eq!(txns[0].id, first_id);
        assert_eq!(txns[1].id, second_id);
    }

    #[test]
    fn parse_amount_handles_whitespace_and_commas() {
        assert_eq!(parse_amount(" 1,000 "), Some(1000.0));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("NaN"), None);
    }

    #[test]
    fn serializes_camel_case() {
        let txn = Transaction::parse("2024-01-02", "A", "Buy", "1", "1").unwrap();
        let json = serde_json::to_string(&txn).unwrap();
        assert!(json.contains("\"totalReturn\""));
        assert!(json.contains("\"excessReturn\""));
    }
}

// ═══════════════════════════════════════════════════════════════════
// AssetType
// ═══════════════════════════════════════════════════════════════════

mod asset_type {
    use super::*;

    #[test]
    fn parses_ledger_spellings() {
        assert_eq!("Stock".parse::<AssetType>().unwrap(), AssetType::Stock);
        assert_eq!("ETF".parse::<AssetType>().unwrap(), AssetType::Etf);
        assert_eq!(
            "Mutual Fund".parse::<AssetType>().unwrap(),
            AssetType::MutualFund
        );
        assert_eq!("Crypto".parse::<AssetType>().unwrap(), AssetType::Crypto);
        assert_eq!(AssetType::MutualFund.to_string(), "Mutual Fund");
    }

    #[test]
    fn unknown_type_names_the_ticker() {
        let err = AssetType::parse_for("XYZ", "Bond").unwrap_err();
        match err {
            CoreError::UnknownAssetType { ticker, asset_type } => {
                assert_eq!(ticker, "XYZ");
                assert_eq!(asset_type, "Bond");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn crypto_quoted_against_usd() {
        assert_eq!(AssetType::Crypto.quote_symbol("BTC"), "BTC-USD");
        assert_eq!(AssetType::Stock.quote_symbol("AAPL"), "AAPL");
    }
}

// ═══════════════════════════════════════════════════════════════════
// LotQueue
// ═══════════════════════════════════════════════════════════════════

mod lots {
    use super::*;

    #[test]
    fn buys_only_have_no_realized_gain() {
        let mut q = LotQueue::new();
        q.buy(10.0, 10.0);
        q.buy(5.0, 20.0);
        assert_close(q.total_shares(), 15.0);
        assert_close(q.total_cost_basis(), 200.0);
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn fifo_sale_consumes_oldest_first() {
        let mut q = LotQueue::new();
        q.buy(10.0, 10.0);
        q.buy(10.0, 20.0);
        let outcome = q.sell(15.0, 30.0);

        assert_close(outcome.realized_gain, 250.0);
        assert_close(outcome.oversold_shares, 0.0);
        let remaining: Vec<_> = q.lots().collect();
        assert_eq!(remaining.len(), 1);
        assert_close(remaining[0].shares, 5.0);
        assert_close(remaining[0].price, 20.0);
    }

    #[test]
    fn exact_sale_pops_the_lot() {
        let mut q = LotQueue::new();
        q.buy(10.0, 10.0);
        let outcome = q.sell(10.0, 12.0);
        assert_close(outcome.realized_gain, 20.0);
        assert!(q.is_empty());
    }

    #[test]
    fn split_keeps_cost_basis() {
        let mut q = LotQueue::new();
        q.buy(10.0, 100.0);
        q.split(2.0);
        let lot = q.lots().next().unwrap();
        assert_close(lot.shares, 20.0);
        assert_close(lot.price, 50.0);
        assert_close(q.total_cost_basis(), 1000.0);
    }

    #[test]
    fn oversold_shares_count_at_full_value() {
        let mut q = LotQueue::new();
        let outcome = q.sell(5.0, 10.0);
        assert_close(outcome.realized_gain, 50.0);
        assert_close(outcome.oversold_shares, 5.0);
        assert_close(q.total_shares(), 0.0);
    }

    #[test]
    fn partially_covered_sale_credits_the_remainder() {
        let mut q = LotQueue::new();
        q.buy(2.0, 10.0);
        let outcome = q.sell(5.0, 15.0);
        // 2 × (15 − 10) + 3 × 15
        assert_close(outcome.realized_gain, 55.0);
        assert_close(outcome.oversold_shares, 3.0);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Settings & SplitTable
// ═══════════════════════════════════════════════════════════════════

mod settings {
    use super::*;

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.benchmark_ticker, "SPY");
        assert_eq!(s.cash_ticker, "CASH");
        assert_eq!(s.stale_after_hours, 72);
        assert_eq!(s.sold_grace_hours, 24);
        assert!(s.is_delisted("XLNX"));
        assert!(!s.is_delisted("AAPL"));
        assert_eq!(s.stock_splits.splits_for("TSLA").len(), 2);
    }

    #[test]
    fn partial_json_takes_defaults() {
        let s = Settings::from_json(r#"{"benchmark_ticker": "QQQ"}"#).unwrap();
        assert_eq!(s.benchmark_ticker, "QQQ");
        assert_eq!(s.cash_ticker, "CASH");
        assert!(!s.stock_splits.is_empty());
    }

    #[test]
    fn json_round_trip() {
        let s = Settings::default();
        let back = Settings::from_json(&s.to_json().unwrap()).unwrap();
        assert_eq!(s, back);
    }

    #[test]
    fn custom_split_table_from_json() {
        let json = r#"{"stock_splits": {"ACME": [{"date": "2023-05-01", "ratio": 4.0}]}}"#;
        let s = Settings::from_json(json).unwrap();
        assert_eq!(s.stock_splits.splits_for("ACME").len(), 1);
        assert!(s.stock_splits.splits_for("TSLA").is_empty());
    }

    #[test]
    fn rejects_non_positive_split_ratio() {
        let json = r#"{"stock_splits": {"ACME": [{"date": "2023-05-01", "ratio": 0.0}]}}"#;
        let err = Settings::from_json(json).unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
    }

    #[test]
    fn rejects_empty_benchmark() {
        let err = Settings::from_json(r#"{"benchmark_ticker": " "}"#).unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
    }

    #[test]
    fn split_table_keeps_dates_ordered() {
        let mut table = SplitTable::new();
        table.insert("ACME", d(2023, 6, 1), 3.0);
        table.insert("ACME", d(2021, 6, 1), 2.0);
        let dates: Vec<_> = table.splits_for("ACME").iter().map(|s| s.date).collect();
        assert_eq!(dates, vec![d(2021, 6, 1), d(2023, 6, 1)]);

        let txns = table.transactions_for("ACME");
        assert!(txns.iter().all(|t| t.action == Action::Split));
        assert_close(txns[0].shares, 2.0);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Position
// ═══════════════════════════════════════════════════════════════════

mod position {
    use super::*;

    fn tsla() -> Position {
        let mut p = Position::new("TSLA", AssetType::Stock);
        p.add_transaction(Transaction::parse("2020-01-10", "TSLA", "Buy", "2", "500").unwrap());
        p
    }

    #[test]
    fn preprocess_merges_splits_and_sets_multiplier() {
        let mut p = tsla();
        p.preprocess(&SplitTable::historical(), false);

        assert_eq!(p.transactions().len(), 3);
        assert_close(p.split_multiplier, 15.0);
        assert!(p.currently_held);
        assert_eq!(p.first_trade_date(), Some(d(2020, 1, 10)));
        assert_eq!(p.last_transaction_date(), Some(d(2022, 8, 25)));
    }

    #[test]
    fn preprocess_is_idempotent() {
        let mut p = tsla();
        p.preprocess(&SplitTable::historical(), false);
        p.preprocess(&SplitTable::historical(), false);
        assert_eq!(p.transactions().len(), 3);
        assert_close(p.split_multiplier, 15.0);
    }

    #[test]
    fn delisted_is_never_held() {
        let mut p = Position::new("APPH", AssetType::Stock);
        p.add_transaction(Transaction::parse("2021-01-04", "APPH", "Buy", "10", "30").unwrap());
        p.preprocess(&SplitTable::new(), true);
        assert!(!p.currently_held);
    }

    #[test]
    fn fully_sold_is_not_held() {
        let mut p = Position::new("ACME", AssetType::Stock);
        p.add_transaction(Transaction::parse("2021-01-04", "ACME", "Buy", "10", "30").unwrap());
        p.add_transaction(Transaction::parse("2021-02-04", "ACME", "Sell", "9.9995", "31").unwrap());
        p.preprocess(&SplitTable::new(), false);
        assert!(!p.currently_held);
    }

    #[test]
    fn etf_price_comes_from_nav() {
        let mut p = Position::new("VTI", AssetType::Etf);
        p.apply_fundamentals(Some(&Fundamentals {
            current_price: Some(10.0),
            nav_price: Some(11.0),
            previous_close: Some(9.0),
            ..Fundamentals::default()
        }));
        assert_close(p.market_price, 11.0);
        assert_close(p.market_prev_close, 9.0);
    }

    #[test]
    fn mutual_fund_price_comes_from_previous_close() {
        let mut p = Position::new("VFIAX", AssetType::MutualFund);
        p.apply_fundamentals(Some(&Fundamentals {
            current_price: Some(10.0),
            previous_close: Some(9.5),
            ..Fundamentals::default()
        }));
        assert_close(p.market_price, 9.5);
    }

    #[test]
    fn display_fields_only_for_held_stocks() {
        let snapshot = Fundamentals {
            current_price: Some(10.0),
            sector: Some("Technology".into()),
            trailing_pe: Some(25.0),
            ..Fundamentals::default()
        };

        let mut sold = Position::new("ACME", AssetType::Stock);
        sold.apply_fundamentals(Some(&snapshot));
        assert!(sold.sector.is_none());

        let mut held = tsla();
        held.preprocess(&SplitTable::new(), false);
        held.apply_fundamentals(Some(&snapshot));
        assert_eq!(held.sector.as_deref(), Some("Technology"));
        assert_eq!(held.trailing_pe, Some(25.0));
    }

    #[test]
    fn missing_snapshot_leaves_price_unknown() {
        let mut p = tsla();
        p.apply_fundamentals(None);
        assert_close(p.market_price, 0.0);
    }

    #[test]
    fn history_fallback_uses_last_two_closes() {
        let mut p = tsla();
        p.price_from_history(&[
            PricePoint::new(d(2024, 1, 2), 10.0),
            PricePoint::new(d(2024, 1, 3), 12.0),
        ]);
        assert_close(p.market_price, 12.0);
        assert_close(p.market_prev_close, 10.0);
    }

    #[test]
    fn history_fallback_never_overrides_snapshot() {
        let mut p = tsla();
        p.market_price = 99.0;
        p.price_from_history(&[PricePoint::new(d(2024, 1, 2), 10.0)]);
        assert_close(p.market_price, 99.0);
    }

    #[test]
    fn reset_keeps_transactions() {
        let mut p = tsla();
        p.preprocess(&SplitTable::historical(), false);
        p.market_price = 100.0;
        p.reset();
        assert_eq!(p.transactions().len(), 3);
        assert_close(p.market_price, 0.0);
        assert!(!p.currently_held);
        assert_close(p.split_multiplier, 1.0);
    }
}
