// Exchange trading API abstraction

use crate::error::GatewayError;
use crate::types::{Order, TradeFill, TradeMode};
use async_trait::async_trait;
use serde_json::Value;

pub mod binance;

pub use binance::{BinanceCredentials, BinanceGateway};

/// Synchronous request/response surface of the exchange the core consumes.
/// Everything here is fallible and every failure is recoverable from the
/// control loop's point of view.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Free quote-asset balance for the account.
    async fn quote_balance(&self, mode: TradeMode) -> Result<f64, GatewayError>;

    /// Exchange-wide instrument list (used for derivatives filter lookup).
    async fn instrument_list(&self) -> Result<Value, GatewayError>;

    /// Per-symbol instrument payload (used for spot filter lookup).
    async fn instrument(&self, symbol: &str) -> Result<Value, GatewayError>;

    /// Submit a resting limit order; returns the exchange-assigned order id.
    async fn place_limit_order(&self, order: &Order, mode: TradeMode)
        -> Result<i64, GatewayError>;

    /// Cancel all open orders for the symbol.
    async fn cancel_open_orders(&self, symbol: &str, mode: TradeMode)
        -> Result<(), GatewayError>;

    /// Full account trade history for the symbol, oldest first.
    async fn account_trades(&self, symbol: &str, mode: TradeMode)
        -> Result<Vec<TradeFill>, GatewayError>;
}
