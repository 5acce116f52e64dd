// WebSocket depth feed for Binance top-of-book quotes

use crate::clients::QuoteStream;
use crate::error::GatewayError;
use crate::types::{Quote, TradeMode};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

const SPOT_WS_BASE: &str = "wss://stream.binance.com:9443/ws";
const FUTURES_WS_BASE: &str = "wss://fstream.binance.com/ws";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Streaming depth5 subscription for one symbol. Connects lazily and
/// reconnects on the next poll after any stream failure.
pub struct DepthFeed {
    symbol: String,
    url: String,
    stream: Option<WsStream>,
}

impl DepthFeed {
    pub fn new(symbol: &str, mode: TradeMode) -> Self {
        let base = match mode {
            TradeMode::Spot => SPOT_WS_BASE,
            TradeMode::Futures => FUTURES_WS_BASE,
        };
        let url = format!("{}/{}@depth5@100ms", base, symbol.to_lowercase());
        Self {
            symbol: symbol.to_string(),
            url,
            stream: None,
        }
    }

    /// Override the stream endpoint (testnet or local fixture server).
    pub fn with_url(symbol: &str, url: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            url: url.to_string(),
            stream: None,
        }
    }

    async fn ensure_connected(&mut self) -> Result<&mut WsStream, GatewayError> {
        if self.stream.is_none() {
            let (stream, _) = connect_async(&self.url)
                .await
                .map_err(|e| GatewayError::Network(format!("websocket connect: {e}")))?;
            info!(symbol = %self.symbol, url = %self.url, "depth stream connected");
            self.stream = Some(stream);
        }
        // Just populated above when it was None
        match self.stream.as_mut() {
            Some(stream) => Ok(stream),
            None => Err(GatewayError::Network("websocket not connected".to_string())),
        }
    }
}

#[async_trait]
impl QuoteStream for DepthFeed {
    /// Pull the next usable top-of-book snapshot. Malformed frames and pings
    /// are skipped; a closed or failed stream drops the connection and
    /// surfaces a network error so the caller can back off and retry.
    async fn next_quote(&mut self) -> Result<Quote, GatewayError> {
        let symbol = self.symbol.clone();
        let stream = self.ensure_connected().await?;

        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<Value>(&text) {
                        Ok(payload) => {
                            if let Some(quote) = parse_depth_quote(&symbol, &payload) {
                                return Ok(quote);
                            }
                            debug!(symbol = %symbol, "skipping non-depth frame");
                        }
                        Err(e) => {
                            debug!(symbol = %symbol, error = %e, "skipping malformed frame");
                        }
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    stream
                        .send(Message::Pong(payload))
                        .await
                        .map_err(|e| GatewayError::Network(format!("websocket pong: {e}")))?;
                }
                Some(Ok(Message::Close(_))) | None => {
                    warn!(symbol = %symbol, "depth stream closed");
                    self.stream = None;
                    return Err(GatewayError::Network("depth stream closed".to_string()));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(symbol = %symbol, error = %e, "depth stream error");
                    self.stream = None;
                    return Err(GatewayError::Network(format!("depth stream: {e}")));
                }
            }
        }
    }
}

/// Parse a depth5 frame into a top-of-book quote. Spot frames carry
/// `bids`/`asks`, futures frames `b`/`a`; both are string-encoded
/// `[price, qty]` arrays.
pub fn parse_depth_quote(symbol: &str, payload: &Value) -> Option<Quote> {
    let bids = payload.get("bids").or_else(|| payload.get("b"))?.as_array()?;
    let asks = payload.get("asks").or_else(|| payload.get("a"))?.as_array()?;

    let bid = level_price(bids.first()?)?;
    let ask = level_price(asks.first()?)?;

    Some(Quote {
        symbol: symbol.to_string(),
        bid,
        ask,
    })
}

fn level_price(level: &Value) -> Option<f64> {
    level.as_array()?.first()?.as_str()?.parse::<f64>().ok()
}
