//! Unified error handling for the market-maker bot
//!
//! Per-cycle errors (filters, gateway, persistence) are contained inside the
//! control loop and never unwind past a single cycle; only `ConfigError` is
//! fatal at startup.

use thiserror::Error;

/// Errors raised while resolving exchange trading rules for a symbol.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("symbol {0} not found in exchange instrument list")]
    SymbolNotFound(String),

    #[error("missing or unparseable filter field: {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Typed failures from the exchange trading API. The control loop treats all
/// of these as recoverable.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("order rejected: {0}")]
    RejectedOrder(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("unexpected response: {0}")]
    Response(String),
}

impl GatewayError {
    /// Whether a retry on the next cycle is likely to help.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::RateLimited(_)
                | GatewayError::Network(_)
                | GatewayError::Timeout(_)
        )
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout(err.to_string())
        } else if err.is_connect() {
            GatewayError::Network(err.to_string())
        } else if err.is_status() {
            GatewayError::Response(err.to_string())
        } else {
            GatewayError::Network(err.to_string())
        }
    }
}

/// Top-level error type for the bot.
#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BotError {
    /// Error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            BotError::Config(_) => "config",
            BotError::Filter(_) => "filter",
            BotError::Gateway(_) => "gateway",
            BotError::Persistence(_) => "persistence",
            BotError::Io(_) => "io",
        }
    }
}

impl From<rusqlite::Error> for BotError {
    fn from(err: rusqlite::Error) -> Self {
        BotError::Persistence(err.to_string())
    }
}

/// Result type alias using BotError
pub type BotResult<T> = Result<T, BotError>;
