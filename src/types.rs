// Core domain types shared by the gateway, sizing engine and trade ledger

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-of-book snapshot, produced once per poll and consumed immediately.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub bid: f64,
    pub ask: f64,
}

impl Quote {
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(format!("unknown side: {other}")),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cash (spot) vs. margined (futures) trading for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeMode {
    Spot,
    Futures,
}

impl TradeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeMode::Spot => "spot",
            TradeMode::Futures => "futures",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "spot" => Ok(TradeMode::Spot),
            "futures" => Ok(TradeMode::Futures),
            other => Err(format!("unknown trade mode: {other}")),
        }
    }
}

impl fmt::Display for TradeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resting limit order as submitted to the exchange. The bot does not track
/// open-order identity beyond submission; stale orders are bulk-cancelled at
/// the start of every cycle instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub symbol: String,
    pub side: Side,
    pub price: f64,
    pub quantity: f64,
    pub time_in_force: &'static str,
}

impl Order {
    pub fn limit(symbol: &str, side: Side, price: f64, quantity: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            side,
            price,
            quantity,
            time_in_force: "GTC",
        }
    }
}

/// An executed fill reported by the exchange. `id` is exchange-assigned and
/// monotonically increasing per account+symbol; it is the deduplication and
/// watermark key.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeFill {
    pub id: i64,
    pub symbol: String,
    pub side: Side,
    pub price: f64,
    pub quantity: f64,
    pub timestamp: DateTime<Utc>,
}

impl TradeFill {
    pub fn cost(&self) -> f64 {
        self.price * self.quantity
    }
}
