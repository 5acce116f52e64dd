// Market Maker Bot Library
//
// A grid market-making bot for Binance spot and USD-margined futures with a
// SQLite trade ledger and per-symbol control loops

pub mod cli;
pub mod clients;
pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod filters;
pub mod gateway;
pub mod types;
pub mod watermark;

// Re-export core trading types
pub use crate::core::{
    ControlLoop, GridLevel, GridParams, LoopExit, SessionTracker, SizingResult, StopReason,
    Supervisor,
};

// Re-export error types
pub use error::{BotError, BotResult, FilterError, GatewayError};

// Re-export configuration
pub use config::{Config, ConfigError, LoopSettings, SymbolConfig, TradingDefaults};

// Re-export market data and gateway clients
pub use clients::{DepthFeed, QuoteStream};
pub use gateway::{BinanceCredentials, BinanceGateway, ExchangeGateway};

// Re-export database types
pub use db::{DailyPnl, Database, TradeRecord};

// Re-export domain types
pub use filters::{resolve_filters, SymbolFilters};
pub use types::{Order, Quote, Side, TradeFill, TradeMode};
pub use watermark::WatermarkStore;
