//! Trade ledger operations

use crate::types::{Side, TradeFill, TradeMode};
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, Result as SqlResult, Row};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// One ledger row. The primary key is `(id, symbol)`: exchange trade ids are
/// only monotone per account+symbol, so the same id can legitimately appear
/// for two symbols. Re-inserting an already-seen `(id, symbol)` pair is a
/// no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: i64,
    pub mode: TradeMode,
    pub symbol: String,
    pub side: Side,
    pub price: f64,
    pub quantity: f64,
    pub cost: f64,
    pub timestamp: String,
}

/// Net realized cash flow for one UTC calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPnl {
    pub date: String,
    pub pnl: f64,
}

impl TradeRecord {
    /// Build a ledger row from an exchange fill.
    pub fn from_fill(fill: &TradeFill, mode: TradeMode) -> Self {
        TradeRecord {
            id: fill.id,
            mode,
            symbol: fill.symbol.clone(),
            side: fill.side,
            price: fill.price,
            quantity: fill.quantity,
            cost: fill.cost(),
            timestamp: fill
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    fn from_row(row: &Row) -> SqlResult<Self> {
        Ok(TradeRecord {
            id: row.get(0)?,
            mode: TradeMode::from_str(&row.get::<_, String>(1)?).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, e.into())
            })?,
            symbol: row.get(2)?,
            side: Side::from_str(&row.get::<_, String>(3)?).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
            })?,
            price: row.get(4)?,
            quantity: row.get(5)?,
            cost: row.get(6)?,
            timestamp: row.get(7)?,
        })
    }

    /// Insert into the ledger. Returns `true` if a new row was written,
    /// `false` if the `(id, symbol)` pair was already present.
    pub fn insert(&self, conn: Arc<Mutex<Connection>>) -> SqlResult<bool> {
        let conn = conn.lock().unwrap();
        let rows = conn.execute(
            "INSERT OR IGNORE INTO trades (
                id, mode, symbol, side, price, quantity, cost, timestamp
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                self.id,
                self.mode.as_str(),
                self.symbol,
                self.side.as_str(),
                self.price,
                self.quantity,
                self.cost,
                self.timestamp,
            ],
        )?;
        Ok(rows == 1)
    }

    /// Find a ledger row by exchange trade id within a symbol
    pub fn find_by_id(
        conn: Arc<Mutex<Connection>>,
        id: i64,
        symbol: &str,
    ) -> SqlResult<Option<Self>> {
        let conn = conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, mode, symbol, side, price, quantity, cost, timestamp
             FROM trades WHERE id = ?1 AND symbol = ?2",
        )?;

        let mut rows = stmt.query(params![id, symbol])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Highest trade id recorded for the symbol, or 0 when the ledger holds
    /// nothing for it yet.
    pub fn max_id(conn: Arc<Mutex<Connection>>, symbol: &str) -> SqlResult<i64> {
        let conn = conn.lock().unwrap();
        let max: Option<i64> = conn.query_row(
            "SELECT MAX(id) FROM trades WHERE symbol = ?1",
            params![symbol],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0))
    }

    /// Realized cash flow (sell proceeds minus buy cost) and trade count for
    /// the current UTC day.
    pub fn today_pnl(conn: Arc<Mutex<Connection>>, symbol: &str) -> SqlResult<(f64, i64)> {
        let today = Utc::now().date_naive().to_string();
        let conn = conn.lock().unwrap();

        conn.query_row(
            "SELECT
                SUM(CASE WHEN side = 'SELL' THEN cost ELSE -cost END),
                COUNT(*)
             FROM trades
             WHERE symbol = ?1 AND date(timestamp) = ?2",
            params![symbol, today],
            |row| {
                let pnl: Option<f64> = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok((pnl.unwrap_or(0.0), count))
            },
        )
    }

    /// Daily cash-flow PnL for the most recent `days` UTC days that have
    /// trades, oldest first. Days without trades are absent, not zero.
    pub fn pnl_history(
        conn: Arc<Mutex<Connection>>,
        symbol: &str,
        days: u32,
    ) -> SqlResult<Vec<DailyPnl>> {
        let conn = conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT
                date(timestamp) AS day,
                SUM(CASE WHEN side = 'SELL' THEN cost ELSE -cost END)
             FROM trades
             WHERE symbol = ?1
             GROUP BY day
             ORDER BY day DESC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![symbol, days], |row| {
            let pnl: Option<f64> = row.get(1)?;
            Ok(DailyPnl {
                date: row.get(0)?,
                pnl: pnl.unwrap_or(0.0),
            })
        })?;

        let mut history: Vec<DailyPnl> = rows.collect::<SqlResult<_>>()?;
        history.reverse();
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn record(id: i64, side: Side, price: f64, quantity: f64, timestamp: &str) -> TradeRecord {
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

    fn today_ts() -> String {
        Utc::now()
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    #[test]
    fn test_insert_and_find() {
        let db = Database::new_in_memory().unwrap();
        db.run_migrations().unwrap();
        let conn = db.get_connection();

        let inserted = record(42, Side::Buy, 100.0, 0.5, &today_ts())
            .insert(Arc::clone(&conn))
            .unwrap();
        assert!(inserted);

        let loaded = TradeRecord::find_by_id(Arc::clone(&conn), 42, "BTCUSDT")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.side, Side::Buy);
        assert_eq!(loaded.cost, 50.0);
        assert_eq!(loaded.mode, TradeMode::Spot);
    }

    #[test]
    fn test_duplicate_insert_is_noop() {
        let db = Database::new_in_memory().unwrap();
        db.run_migrations().unwrap();
        let conn = db.get_connection();

        let first = record(7, Side::Buy, 100.0, 1.0, &today_ts());
        assert!(first.insert(Arc::clone(&conn)).unwrap());

        // Same id replayed with different payload: original row stands
        let replay = record(7, Side::Sell, 999.0, 9.0, &today_ts());
        assert!(!replay.insert(Arc::clone(&conn)).unwrap());

        let loaded = TradeRecord::find_by_id(Arc::clone(&conn), 7, "BTCUSDT")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.side, Side::Buy);
        assert_eq!(loaded.price, 100.0);
    }

    #[test]
    fn test_same_id_on_two_symbols_keeps_both_rows() {
        let db = Database::new_in_memory().unwrap();
        db.run_migrations().unwrap();
        let conn = db.get_connection();

        let ts = today_ts();
        let btc = record(1000, Side::Buy, 100.0, 1.0, &ts);
        assert!(btc.insert(Arc::clone(&conn)).unwrap());

        // ETHUSDT independently reaches trade id 1000; it must not be
        // swallowed as a duplicate of the BTCUSDT fill.
        let mut eth = record(1000, Side::Sell, 50.0, 2.0, &ts);
        eth.symbol = "ETHUSDT".to_string();
        assert!(eth.insert(Arc::clone(&conn)).unwrap());

        let (btc_pnl, btc_count) = TradeRecord::today_pnl(Arc::clone(&conn), "BTCUSDT").unwrap();
        assert_eq!((btc_pnl, btc_count), (-100.0, 1));

        let (eth_pnl, eth_count) = TradeRecord::today_pnl(Arc::clone(&conn), "ETHUSDT").unwrap();
        assert_eq!((eth_pnl, eth_count), (100.0, 1));
    }

    #[test]
    fn test_corrupt_side_column_fails_loudly() {
        let db = Database::new_in_memory().unwrap();
        db.run_migrations().unwrap();
        let conn = db.get_connection();

        {
            let guard = conn.lock().unwrap();
            guard
                .execute(
                    "INSERT INTO trades (id, mode, symbol, side, price, quantity, cost, timestamp)
                     VALUES (1, 'spot', 'BTCUSDT', 'HODL', 1.0, 1.0, 1.0, '2026-08-27T00:00:00.000Z')",
                    [],
                )
                .unwrap();
        }

        // A mangled row must surface as an error, not decode as a BUY
        assert!(TradeRecord::find_by_id(conn, 1, "BTCUSDT").is_err());
    }

    #[test]
    fn test_today_pnl() {
        let db = Database::new_in_memory().unwrap();
        db.run_migrations().unwrap();
        let conn = db.get_connection();

        let ts = today_ts();
        record(1, Side::Buy, 100.0, 1.0, &ts)
            .insert(Arc::clone(&conn))
            .unwrap();
        record(2, Side::Sell, 110.0, 1.0, &ts)
            .insert(Arc::clone(&conn))
            .unwrap();
        // Old trade outside today's window
        record(3, Side::Sell, 1000.0, 1.0, "2020-01-01T00:00:00.000Z")
            .insert(Arc::clone(&conn))
            .unwrap();

        let (pnl, count) = TradeRecord::today_pnl(Arc::clone(&conn), "BTCUSDT").unwrap();
        assert_eq!(pnl, 10.0);
        assert_eq!(count, 2);
    }

    #[test]
    fn test_today_pnl_empty_ledger() {
        let db = Database::new_in_memory().unwrap();
        db.run_migrations().unwrap();

        let (pnl, count) = TradeRecord::today_pnl(db.get_connection(), "BTCUSDT").unwrap();
        assert_eq!(pnl, 0.0);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_pnl_history_ordering_and_limit() {
        let db = Database::new_in_memory().unwrap();
        db.run_migrations().unwrap();
        let conn = db.get_connection();

        record(1, Side::Sell, 10.0, 1.0, "2026-08-01T10:00:00.000Z")
            .insert(Arc::clone(&conn))
            .unwrap();
        record(2, Side::Buy, 4.0, 1.0, "2026-08-02T10:00:00.000Z")
            .insert(Arc::clone(&conn))
            .unwrap();
        record(3, Side::Sell, 6.0, 1.0, "2026-08-02T11:00:00.000Z")
            .insert(Arc::clone(&conn))
            .unwrap();
        record(4, Side::Sell, 20.0, 1.0, "2026-08-03T10:00:00.000Z")
            .insert(Arc::clone(&conn))
            .unwrap();

        let history = TradeRecord::pnl_history(Arc::clone(&conn), "BTCUSDT", 2).unwrap();
        assert_eq!(
            history,
            vec![
                DailyPnl { date: "2026-08-02".to_string(), pnl: 2.0 },
                DailyPnl { date: "2026-08-03".to_string(), pnl: 20.0 },
            ]
        );
    }

    #[test]
    fn test_max_id() {
        let db = Database::new_in_memory().unwrap();
        db.run_migrations().unwrap();
        let conn = db.get_connection();

        assert_eq!(TradeRecord::max_id(Arc::clone(&conn), "BTCUSDT").unwrap(), 0);

        record(15, Side::Buy, 1.0, 1.0, &today_ts())
            .insert(Arc::clone(&conn))
            .unwrap();
        record(9, Side::Buy, 1.0, 1.0, &today_ts())
            .insert(Arc::clone(&conn))
            .unwrap();

        assert_eq!(TradeRecord::max_id(Arc::clone(&conn), "BTCUSDT").unwrap(), 15);
    }
}
