//! Binance REST connector (spot and USD-margined futures).
//!
//! Private endpoints are authenticated with an HMAC-SHA256 signature over the
//! query string plus an `X-MBX-APIKEY` header.

use crate::error::GatewayError;
use crate::gateway::ExchangeGateway;
use crate::types::{Order, Side, TradeFill, TradeMode};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

const SPOT_URL: &str = "https://api.binance.com";
const FUTURES_URL: &str = "https://fapi.binance.com";
const SPOT_TESTNET_URL: &str = "https://testnet.binance.vision";
const FUTURES_TESTNET_URL: &str = "https://testnet.binancefuture.com";

/// API credentials for private endpoints.
#[derive(Debug, Clone)]
pub struct BinanceCredentials {
    pub api_key: String,
    pub api_secret: String,
}

/// A thin wrapper over the Binance REST API, parameterized by trade mode at
/// the call site so one client serves both spot and futures symbols.
pub struct BinanceGateway {
    http: Client,
    credentials: BinanceCredentials,
    spot_url: String,
    futures_url: String,
    quote_asset: String,
    recv_window: u64,
}

impl BinanceGateway {
    pub fn new(credentials: BinanceCredentials, quote_asset: &str, testnet: bool) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to create reqwest client");

        let (spot_url, futures_url) = if testnet {
            (SPOT_TESTNET_URL, FUTURES_TESTNET_URL)
        } else {
            (SPOT_URL, FUTURES_URL)
        };

        Self {
            http,
            credentials,
            spot_url: spot_url.to_string(),
            futures_url: futures_url.to_string(),
            quote_asset: quote_asset.to_string(),
            recv_window: 5_000,
        }
    }

    /// Override both base URLs (tests point these at a mock server).
    pub fn with_base_urls(mut self, spot_url: &str, futures_url: &str) -> Self {
        self.spot_url = spot_url.to_string();
        self.futures_url = futures_url.to_string();
        self
    }

    fn base(&self, mode: TradeMode) -> &str {
        match mode {
            TradeMode::Spot => &self.spot_url,
            TradeMode::Futures => &self.futures_url,
        }
    }

    fn sign(&self, payload: &str) -> Result<String, GatewayError> {
        let mut mac = HmacSha256::new_from_slice(self.credentials.api_secret.as_bytes())
            .map_err(|e| GatewayError::Auth(format!("failed to create signing key: {e}")))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    async fn public_get<T>(&self, base: &str, path: &str, query: &str) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
    {
        let url = if query.is_empty() {
            format!("{base}{path}")
        } else {
            format!("{base}{path}?{query}")
        };
        let resp = self.http.get(url).send().await?;
        Self::decode(resp).await
    }

    async fn signed_request<T>(
        &self,
        method: Method,
        base: &str,
        path: &str,
        mut params: Vec<(&str, String)>,
    ) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
    {
        params.push(("recvWindow", self.recv_window.to_string()));
        params.push(("timestamp", Utc::now().timestamp_millis().to_string()));
        let query = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        let signature = self.sign(&query)?;
        let url = format!("{base}{path}?{query}&signature={signature}");

        let resp = self
            .http
            .request(method, url)
            .header("X-MBX-APIKEY", &self.credentials.api_key)
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, GatewayError> {
        let status = resp.status();
        if status.is_success() {
            return resp
                .json::<T>()
                .await
                .map_err(|e| GatewayError::Response(e.to_string()));
        }

        let body = resp.text().await.unwrap_or_default();
        Err(match status.as_u16() {
            401 | 403 => GatewayError::Auth(body),
            418 | 429 => GatewayError::RateLimited(body),
            400 => GatewayError::RejectedOrder(body),
            _ => GatewayError::Response(format!("HTTP {status}: {body}")),
        })
    }

    fn parse_f64(field: &'static str, s: &str) -> Result<f64, GatewayError> {
        s.parse::<f64>()
            .map_err(|_| GatewayError::Response(format!("unparseable {field}: {s}")))
    }

    fn fill_time(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Deserialize)]
struct OrderAck {
    #[serde(rename = "orderId")]
    order_id: i64,
}

#[derive(Debug, Deserialize)]
struct SpotAccount {
    balances: Vec<AssetBalance>,
}

#[derive(Debug, Deserialize)]
struct AssetBalance {
    asset: String,
    free: String,
}

#[derive(Debug, Deserialize)]
struct FuturesBalance {
    asset: String,
    balance: String,
}

#[derive(Debug, Deserialize)]
struct SpotTrade {
    id: i64,
    price: String,
    qty: String,
    #[serde(rename = "isBuyer")]
    is_buyer: bool,
    time: i64,
}

#[derive(Debug, Deserialize)]
struct FuturesTrade {
    id: i64,
    price: String,
    qty: String,
    side: String,
    time: i64,
}

#[derive(Debug, Deserialize)]
struct OpenOrder {
    #[serde(rename = "orderId")]
    order_id: i64,
}

#[async_trait]
impl ExchangeGateway for BinanceGateway {
    async fn quote_balance(&self, mode: TradeMode) -> Result<f64, GatewayError> {
        match mode {
            TradeMode::Spot => {
                let account: SpotAccount = self
                    .signed_request(Method::GET, &self.spot_url, "/api/v3/account", Vec::new())
                    .await?;
                let balance = account
                    .balances
                    .iter()
                    .find(|b| b.asset == self.quote_asset)
                    .map(|b| Self::parse_f64("free balance", &b.free))
                    .transpose()?;
                Ok(balance.unwrap_or(0.0))
            }
            TradeMode::Futures => {
                let rows: Vec<FuturesBalance> = self
                    .signed_request(Method::GET, &self.futures_url, "/fapi/v2/balance", Vec::new())
                    .await?;
                let balance = rows
                    .iter()
                    .find(|b| b.asset == self.quote_asset)
                    .map(|b| Self::parse_f64("balance", &b.balance))
                    .transpose()?;
                Ok(balance.unwrap_or(0.0))
            }
        }
    }

    async fn instrument_list(&self) -> Result<Value, GatewayError> {
        self.public_get(&self.futures_url, "/fapi/v1/exchangeInfo", "")
            .await
    }

    async fn instrument(&self, symbol: &str) -> Result<Value, GatewayError> {
        self.public_get(
            &self.spot_url,
            "/api/v3/exchangeInfo",
            &format!("symbol={symbol}"),
        )
        .await
    }

    async fn place_limit_order(
        &self,
        order: &Order,
        mode: TradeMode,
    ) -> Result<i64, GatewayError> {
        let path = match mode {
            TradeMode::Spot => "/api/v3/order",
            TradeMode::Futures => "/fapi/v1/order",
        };
        let params = vec![
            ("symbol", order.symbol.clone()),
            ("side", order.side.as_str().to_string()),
            ("type", "LIMIT".to_string()),
            ("timeInForce", order.time_in_force.to_string()),
            ("quantity", format!("{}", order.quantity)),
            ("price", format!("{}", order.price)),
        ];
        let ack: OrderAck = self
            .signed_request(Method::POST, self.base(mode), path, params)
            .await?;
        Ok(ack.order_id)
    }

    async fn cancel_open_orders(
        &self,
        symbol: &str,
        mode: TradeMode,
    ) -> Result<(), GatewayError> {
        match mode {
            // Spot has no bulk-cancel endpoint that tolerates an empty book,
            // so list first and cancel one by one.
            TradeMode::Spot => {
                let open: Vec<OpenOrder> = self
                    .signed_request(
                        Method::GET,
                        &self.spot_url,
                        "/api/v3/openOrders",
                        vec![("symbol", symbol.to_string())],
                    )
                    .await?;
                for order in open {
                    let _: Value = self
                        .signed_request(
                            Method::DELETE,
                            &self.spot_url,
                            "/api/v3/order",
                            vec![
                                ("symbol", symbol.to_string()),
                                ("orderId", order.order_id.to_string()),
                            ],
                        )
                        .await?;
                }
                Ok(())
            }
            TradeMode::Futures => {
                let _: Value = self
                    .signed_request(
                        Method::DELETE,
                        &self.futures_url,
                        "/fapi/v1/allOpenOrders",
                        vec![("symbol", symbol.to_string())],
                    )
                    .await?;
                Ok(())
            }
        }
    }

    async fn account_trades(
        &self,
        symbol: &str,
        mode: TradeMode,
    ) -> Result<Vec<TradeFill>, GatewayError> {
        let params = vec![("symbol", symbol.to_string())];
        match mode {
            TradeMode::Spot => {
                let rows: Vec<SpotTrade> = self
                    .signed_request(Method::GET, &self.spot_url, "/api/v3/myTrades", params)
                    .await?;
                rows.into_iter()
                    .map(|t| {
                        Ok(TradeFill {
                            id: t.id,
                            symbol: symbol.to_string(),
                            side: if t.is_buyer { Side::Buy } else { Side::Sell },
                            price: Self::parse_f64("trade price", &t.price)?,
                            quantity: Self::parse_f64("trade qty", &t.qty)?,
                            timestamp: Self::fill_time(t.time),
                        })
                    })
                    .collect()
            }
            TradeMode::Futures => {
                let rows: Vec<FuturesTrade> = self
                    .signed_request(Method::GET, &self.futures_url, "/fapi/v1/userTrades", params)
                    .await?;
                rows.into_iter()
                    .map(|t| {
                        Ok(TradeFill {
                            id: t.id,
                            symbol: symbol.to_string(),
                            side: Side::from_str(&t.side).map_err(GatewayError::Response)?,
                            price: Self::parse_f64("trade price", &t.price)?,
                            quantity: Self::parse_f64("trade qty", &t.qty)?,
                            timestamp: Self::fill_time(t.time),
                        })
                    })
                    .collect()
            }
        }
    }
}
