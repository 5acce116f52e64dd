// Common test utilities and helpers

use chrono::{SecondsFormat, Utc};
use market_maker_bot::{Side, TradeFill, TradeMode, TradeRecord};
use std::path::PathBuf;
use tempfile::TempDir;

/// Create a temporary directory for test databases and watermark files
pub fn create_temp_data_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");
    (temp_dir, db_path)
}

/// Build a fill with the current timestamp
pub fn make_fill(id: i64, side: Side, price: f64, quantity: f64) -> TradeFill {
    TradeFill {
        id,
        symbol: "BTCUSDT".to_string(),
        side,
        price,
        quantity,
        timestamp: Utc::now(),
    }
}

/// Build a ledger record with an explicit RFC 3339 timestamp
pub fn make_record(id: i64, side: Side, price: f64, quantity: f64, timestamp: &str) -> TradeRecord {
    TradeRecord {
        id,
        mode: TradeMode::Spot,
        symbol: "BTCUSDT".to_string(),
        side,
        price,
        quantity,
        cost: price * quantity,
        timestamp: timestamp.to_string(),
    }
}

/// Current time as the ledger's timestamp string
pub fn now_ts() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
