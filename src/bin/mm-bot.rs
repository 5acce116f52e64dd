// Market maker bot entry point

use clap::{Parser, Subcommand};
use market_maker_bot::cli::{init_config, run_all, show_balance, show_pnl_history, show_pnl_today};
use market_maker_bot::Config;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mm-bot")]
#[command(about = "Grid market-making bot for Binance spot and futures")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config template to the config path
    Init,
    /// Run the trading loops for all configured symbols
    Run,
    /// Show today's realized PnL for a symbol
    PnlToday {
        /// Symbol, e.g. BTCUSDT
        symbol: String,
    },
    /// Show daily PnL history for a symbol
    PnlHistory {
        /// Symbol, e.g. BTCUSDT
        symbol: String,
        /// Number of days to show
        #[arg(short, long, default_value = "7")]
        days: u32,
    },
    /// Show the free quote balance for a configured symbol
    Balance {
        /// Symbol, e.g. BTCUSDT
        symbol: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(cli).await {
        error!("❌ {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> market_maker_bot::BotResult<()> {
    match cli.command {
        Commands::Init => init_config(&cli.config),
        Commands::Run => {
            let config = Config::from_file(&cli.config)?;
            run_all(&config).await
        }
        Commands::PnlToday { symbol } => {
            let config = Config::from_file(&cli.config)?;
            show_pnl_today(&config, &symbol)
        }
        Commands::PnlHistory { symbol, days } => {
            let config = Config::from_file(&cli.config)?;
            show_pnl_history(&config, &symbol, days)
        }
        Commands::Balance { symbol } => {
            let config = Config::from_file(&cli.config)?;
            show_balance(&config, &symbol).await
        }
    }
}
