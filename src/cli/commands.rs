// CLI command implementations

use crate::clients::DepthFeed;
use crate::config::Config;
use crate::core::{ControlLoop, LoopExit, Supervisor};
use crate::db::{Database, TradeRecord};
use crate::error::{BotError, BotResult};
use crate::gateway::{BinanceCredentials, BinanceGateway, ExchangeGateway};
use crate::watermark::WatermarkStore;
use tracing::{error, info, warn};

/// Write a default config template if none exists yet.
pub fn init_config(path: &str) -> BotResult<()> {
    if std::path::Path::new(path).exists() {
        warn!("⚠️  {} already exists, leaving it untouched", path);
        return Ok(());
    }

    Config::default().to_file(path)?;
    info!("✅ Wrote config template to {}", path);
    info!("💡 Fill in your API keys before running 'run'");
    Ok(())
}

/// Start one control loop per configured symbol under a supervisor and run
/// until every loop has exited or Ctrl+C is pressed.
pub async fn run_all(config: &Config) -> BotResult<()> {
    // One shared ledger handle; every loop serializes on its connection
    let db = open_ledger(config)?;

    let mut supervisor = Supervisor::new();
    for sym in &config.symbols {
        let settings = sym.settings(&config.defaults);
        let credentials = BinanceCredentials {
            api_key: sym.api_key.clone(),
            api_secret: sym.api_secret.clone(),
        };
        let gateway = BinanceGateway::new(credentials, &settings.quote_asset, settings.testnet);
        let quotes = DepthFeed::new(&settings.symbol, settings.mode);
        let watermark = WatermarkStore::new(&config.watermark.dir, &settings.symbol);

        let control_loop = ControlLoop::new(settings, gateway, quotes, db.clone(), watermark)?;
        supervisor.spawn(control_loop);
    }

    info!("🚀 {} symbol loop(s) running - Press Ctrl+C to stop", supervisor.len());

    let mut ctrl_c = Box::pin(tokio::signal::ctrl_c());
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("🛑 Received shutdown signal");
                supervisor.stop_all();
                while let Some(result) = supervisor.join_next().await {
                    match result {
                        Ok((symbol, exit)) => info!("   {} exited: {:?}", symbol, exit),
                        Err(e) => error!("❌ Loop task panicked: {}", e),
                    }
                }
                break;
            }
            joined = supervisor.join_next() => {
                match joined {
                    Some(Ok((symbol, LoopExit::Stopped(reason)))) => {
                        info!("🏁 {} stopped: {}", symbol, reason);
                    }
                    Some(Ok((symbol, LoopExit::Shutdown))) => {
                        info!("🛑 {} shut down", symbol);
                    }
                    Some(Err(e)) => error!("❌ Loop task panicked: {}", e),
                    None => {
                        info!("✅ All symbol loops have exited");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Print today's realized cash flow for a symbol.
pub fn show_pnl_today(config: &Config, symbol: &str) -> BotResult<()> {
    let db = open_ledger(config)?;
    let (pnl, count) = TradeRecord::today_pnl(db.get_connection(), symbol)
        .map_err(|e| BotError::Persistence(e.to_string()))?;

    println!("📊 {} today: {:.2} over {} trade(s)", symbol, pnl, count);
    Ok(())
}

/// Print the daily PnL history for a symbol, oldest day first.
pub fn show_pnl_history(config: &Config, symbol: &str, days: u32) -> BotResult<()> {
    let db = open_ledger(config)?;
    let history = TradeRecord::pnl_history(db.get_connection(), symbol, days)
        .map_err(|e| BotError::Persistence(e.to_string()))?;

    if history.is_empty() {
        println!("📊 {} has no recorded trades", symbol);
        return Ok(());
    }

    println!("📊 {} daily PnL (last {} day(s) with trades):", symbol, days);
    let mut total = 0.0;
    for day in &history {
        println!("   {}  {:>12.2}", day.date, day.pnl);
        total += day.pnl;
    }
    println!("   {:<10}  {:>12.2}", "total", total);
    Ok(())
}

/// Fetch and print the free quote balance for a configured symbol.
pub async fn show_balance(config: &Config, symbol: &str) -> BotResult<()> {
    let sym = config
        .symbols
        .iter()
        .find(|s| s.symbol == symbol)
        .ok_or_else(|| {
            BotError::Config(crate::config::ConfigError::Validation(format!(
                "{} is not in the configuration",
                symbol
            )))
        })?;

    let settings = sym.settings(&config.defaults);
    let credentials = BinanceCredentials {
        api_key: sym.api_key.clone(),
        api_secret: sym.api_secret.clone(),
    };
    let gateway = BinanceGateway::new(credentials, &settings.quote_asset, settings.testnet);
    let balance = gateway.quote_balance(settings.mode).await?;

    println!(
        "💰 {} free {} balance: {:.2}",
        symbol, settings.quote_asset, balance
    );
    Ok(())
}

fn open_ledger(config: &Config) -> BotResult<Database> {
    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db =
        Database::new(&config.database.path).map_err(|e| BotError::Persistence(e.to_string()))?;
    db.run_migrations()
        .map_err(|e| BotError::Persistence(e.to_string()))?;
    Ok(db)
}
