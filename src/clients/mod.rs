// Market data clients

use crate::error::GatewayError;
use crate::types::Quote;
use async_trait::async_trait;

pub mod binance_ws;

pub use binance_ws::DepthFeed;

/// Source of top-of-book quotes for one symbol. The control loop pulls one
/// quote per cycle and treats any failure as a recoverable cycle error.
#[async_trait]
pub trait QuoteStream: Send {
    async fn next_quote(&mut self) -> Result<Quote, GatewayError>;
}
