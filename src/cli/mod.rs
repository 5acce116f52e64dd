//! CLI command implementations

pub mod commands;

pub use commands::{init_config, run_all, show_balance, show_pnl_history, show_pnl_today};
