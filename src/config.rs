// Configuration management for the market-maker bot

use crate::types::TradeMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Global defaults, overridable per symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingDefaults {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_grid_levels")]
    pub grid_levels: usize,
    #[serde(default = "default_step_width")]
    pub step_width: f64,
    #[serde(default = "default_allocation")]
    pub allocation: f64,
    #[serde(default = "default_take_profit")]
    pub take_profit: f64,
    #[serde(default = "default_stop_loss")]
    pub stop_loss: f64,
    #[serde(default = "default_true")]
    pub use_spread: bool,
    #[serde(default)]
    pub testnet: bool,
}

impl Default for TradingDefaults {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            grid_levels: default_grid_levels(),
            step_width: default_step_width(),
            allocation: default_allocation(),
            take_profit: default_take_profit(),
            stop_loss: default_stop_loss(),
            use_spread: true,
            testnet: false,
        }
    }
}

/// One traded symbol with its own credentials, mode and optional overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolConfig {
    pub symbol: String,
    pub mode: TradeMode,
    pub api_key: String,
    pub api_secret: String,
    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,
    pub poll_interval_secs: Option<u64>,
    pub grid_levels: Option<usize>,
    pub step_width: Option<f64>,
    pub allocation: Option<f64>,
    pub take_profit: Option<f64>,
    pub stop_loss: Option<f64>,
    pub use_spread: Option<bool>,
}

/// Fully-resolved per-symbol settings handed to a control loop instance.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub symbol: String,
    pub mode: TradeMode,
    pub quote_asset: String,
    pub poll_interval: Duration,
    pub grid_levels: usize,
    pub step_width: f64,
    pub allocation: f64,
    pub take_profit: f64,
    pub stop_loss: f64,
    pub use_spread: bool,
    pub testnet: bool,
}

impl SymbolConfig {
    /// Merge this symbol's overrides over the global defaults.
    pub fn settings(&self, defaults: &TradingDefaults) -> LoopSettings {
        LoopSettings {
            symbol: self.symbol.clone(),
            mode: self.mode,
            quote_asset: self.quote_asset.clone(),
            poll_interval: Duration::from_secs(
                self.poll_interval_secs.unwrap_or(defaults.poll_interval_secs),
            ),
            grid_levels: self.grid_levels.unwrap_or(defaults.grid_levels),
            step_width: self.step_width.unwrap_or(defaults.step_width),
            allocation: self.allocation.unwrap_or(defaults.allocation),
            take_profit: self.take_profit.unwrap_or(defaults.take_profit),
            stop_loss: self.stop_loss.unwrap_or(defaults.stop_loss),
            use_spread: self.use_spread.unwrap_or(defaults.use_spread),
            testnet: defaults.testnet,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatermarkConfig {
    #[serde(default = "default_watermark_dir")]
    pub dir: String,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            dir: default_watermark_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: TradingDefaults,
    pub symbols: Vec<SymbolConfig>,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub watermark: WatermarkConfig,
}

// Default value functions
fn default_poll_interval() -> u64 { 5 }
fn default_grid_levels() -> usize { 3 }
fn default_step_width() -> f64 { 0.5 }
fn default_allocation() -> f64 { 0.1 }
fn default_take_profit() -> f64 { 99999.0 }
fn default_stop_loss() -> f64 { -99999.0 }
fn default_true() -> bool { true }
fn default_quote_asset() -> String { "USDT".to_string() }
fn default_db_path() -> String { "data/trades.db".to_string() }
fn default_watermark_dir() -> String { "data".to_string() }

impl Default for Config {
    fn default() -> Self {
        Self {
            defaults: TradingDefaults::default(),
            symbols: vec![SymbolConfig {
                symbol: "BTCUSDT".to_string(),
                mode: TradeMode::Futures,
                api_key: "YOUR_API_KEY".to_string(),
                api_secret: "YOUR_API_SECRET".to_string(),
                quote_asset: default_quote_asset(),
                poll_interval_secs: None,
                grid_levels: None,
                step_width: None,
                allocation: None,
                take_profit: None,
                stop_loss: None,
                use_spread: None,
            }],
            database: DatabaseConfig::default(),
            watermark: WatermarkConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::FileRead(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        fs::write(path, content).map_err(|e| ConfigError::FileWrite(e.to_string()))?;

        Ok(())
    }

    /// Load configuration from file, or write a default template if missing.
    /// The template still fails validation until real API keys are filled in.
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            let config = Self::default();
            config.to_file(&path)?;
            Ok(config)
        }
    }

    /// Validate configuration values. Failures here are fatal and prevent
    /// startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() {
            return Err(ConfigError::Validation(
                "at least one [[symbols]] entry is required".to_string(),
            ));
        }

        for (i, sym) in self.symbols.iter().enumerate() {
            if self.symbols[..i].iter().any(|s| s.symbol == sym.symbol) {
                return Err(ConfigError::Validation(format!(
                    "duplicate symbol entry: {}",
                    sym.symbol
                )));
            }

            if sym.api_key.is_empty() || sym.api_key.contains("YOUR_API_KEY") {
                return Err(ConfigError::Validation(format!(
                    "API key not configured for {}",
                    sym.symbol
                )));
            }
            if sym.api_secret.is_empty() || sym.api_secret.contains("YOUR_API_SECRET") {
                return Err(ConfigError::Validation(format!(
                    "API secret not configured for {}",
                    sym.symbol
                )));
            }

            let settings = sym.settings(&self.defaults);
            if settings.grid_levels == 0 {
                return Err(ConfigError::Validation(format!(
                    "grid_levels must be greater than 0 for {}",
                    sym.symbol
                )));
            }
            if settings.step_width <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "step_width must be positive for {}",
                    sym.symbol
                )));
            }
            if settings.allocation <= 0.0 || settings.allocation > 1.0 {
                return Err(ConfigError::Validation(format!(
                    "allocation must be in (0, 1] for {}",
                    sym.symbol
                )));
            }
            if settings.stop_loss >= settings.take_profit {
                return Err(ConfigError::Validation(format!(
                    "stop_loss must be below take_profit for {}",
                    sym.symbol
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(String),

    #[error("Failed to write config file: {0}")]
    FileWrite(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> Config {
        let mut config = Config::default();
        config.symbols[0].api_key = "key".to_string();
        config.symbols[0].api_secret = "secret".to_string();
        config
    }

    #[test]
    fn test_default_template_rejects_placeholders() {
        let config = Config::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_valid_config() {
        assert!(configured().validate().is_ok());
    }

    #[test]
    fn test_symbol_overrides() {
        let mut config = configured();
        config.symbols[0].grid_levels = Some(5);
        config.symbols[0].take_profit = Some(50.0);

        let settings = config.symbols[0].settings(&config.defaults);
        assert_eq!(settings.grid_levels, 5);
        assert_eq!(settings.take_profit, 50.0);
        // Untouched fields fall back to defaults
        assert_eq!(settings.poll_interval, Duration::from_secs(5));
        assert_eq!(settings.allocation, 0.1);
    }

    #[test]
    fn test_duplicate_symbols_rejected() {
        let mut config = configured();
        let dup = config.symbols[0].clone();
        config.symbols.push(dup);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stop_loss_above_take_profit_rejected() {
        let mut config = configured();
        config.symbols[0].take_profit = Some(-10.0);
        config.symbols[0].stop_loss = Some(10.0);
        assert!(config.validate().is_err());
    }
}
