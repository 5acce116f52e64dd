// Lifecycle supervision for the per-symbol control loops

use crate::clients::QuoteStream;
use crate::core::control_loop::{ControlLoop, LoopExit};
use crate::gateway::ExchangeGateway;
use std::collections::HashMap;
use tokio::sync::broadcast;
use tokio::task::{JoinError, JoinSet};
use tracing::info;

/// Runs one task per symbol loop and keeps a dedicated stop channel for each,
/// so a single symbol can be stopped without touching the others.
///
/// Restarting a symbol is stop + spawn: signal `stop(symbol)`, wait for its
/// task to join, then `spawn` a freshly built loop for the same symbol. The
/// session PnL resets with the new loop while the watermark and ledger carry
/// over, exactly as on a process restart.
pub struct Supervisor {
    tasks: JoinSet<(String, LoopExit)>,
    channels: HashMap<String, broadcast::Sender<()>>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            tasks: JoinSet::new(),
            channels: HashMap::new(),
        }
    }

    /// Spawn a loop under its symbol's name. Spawning a symbol that is
    /// already running replaces the stop channel, orphaning the old loop, so
    /// stop and join the old one first when restarting.
    pub fn spawn<G, Q>(&mut self, mut control_loop: ControlLoop<G, Q>)
    where
        G: ExchangeGateway + 'static,
        Q: QuoteStream + 'static,
    {
        let symbol = control_loop.symbol().to_string();
        let (stop_tx, stop_rx) = broadcast::channel(1);
        self.channels.insert(symbol.clone(), stop_tx);

        self.tasks.spawn(async move {
            let exit = control_loop.run(stop_rx).await;
            (symbol, exit)
        });
    }

    /// Signal one symbol's loop to stop. Returns `false` when no loop is
    /// running for the symbol.
    pub fn stop(&self, symbol: &str) -> bool {
        match self.channels.get(symbol) {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    /// Signal every running loop to stop.
    pub fn stop_all(&self) {
        info!(loops = self.channels.len(), "stopping all symbol loops");
        for tx in self.channels.values() {
            let _ = tx.send(());
        }
    }

    /// Wait for the next loop to exit and release its stop channel.
    pub async fn join_next(&mut self) -> Option<Result<(String, LoopExit), JoinError>> {
        let joined = self.tasks.join_next().await;
        if let Some(Ok((symbol, _))) = &joined {
            self.channels.remove(symbol);
        }
        joined
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoopSettings;
    use crate::db::Database;
    use crate::error::GatewayError;
    use crate::types::{Order, Quote, TradeFill, TradeMode};
    use crate::watermark::WatermarkStore;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tempfile::tempdir;

    // A gateway with no balance and no fills: its loop idles until stopped
    struct IdleGateway;

    #[async_trait]
    impl ExchangeGateway for IdleGateway {
        async fn quote_balance(&self, _mode: TradeMode) -> Result<f64, GatewayError> {
            Ok(0.0)
        }

        async fn instrument_list(&self) -> Result<Value, GatewayError> {
            Ok(json!({ "symbols": [] }))
        }

        async fn instrument(&self, symbol: &str) -> Result<Value, GatewayError> {
            Ok(json!({
                "symbols": [{
                    "symbol": symbol,
                    "filters": [
                        { "filterType": "LOT_SIZE", "minQty": "0.001", "stepSize": "0.001" },
                        { "filterType": "PRICE_FILTER", "tickSize": "0.1" },
                        { "filterType": "MIN_NOTIONAL", "minNotional": "10.0" }
                    ]
                }]
            }))
        }

        async fn place_limit_order(
            &self,
            _order: &Order,
            _mode: TradeMode,
        ) -> Result<i64, GatewayError> {
            Ok(1)
        }

        async fn cancel_open_orders(
            &self,
            _symbol: &str,
            _mode: TradeMode,
        ) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn account_trades(
            &self,
            _symbol: &str,
            _mode: TradeMode,
        ) -> Result<Vec<TradeFill>, GatewayError> {
            Ok(vec![])
        }
    }

    struct IdleQuotes {
        symbol: String,
    }

    #[async_trait]
    impl QuoteStream for IdleQuotes {
        async fn next_quote(&mut self) -> Result<Quote, GatewayError> {
            Ok(Quote {
                symbol: self.symbol.clone(),
                bid: 99.9,
                ask: 100.1,
            })
        }
    }

    fn idle_loop(symbol: &str, dir: &std::path::Path) -> ControlLoop<IdleGateway, IdleQuotes> {
        let db = Database::new_in_memory().unwrap();
        db.run_migrations().unwrap();

        let settings = LoopSettings {
            symbol: symbol.to_string(),
            mode: TradeMode::Spot,
            quote_asset: "USDT".to_string(),
            poll_interval: Duration::from_millis(1),
            grid_levels: 3,
            step_width: 0.5,
            allocation: 0.1,
            take_profit: 99999.0,
            stop_loss: -99999.0,
            use_spread: true,
            testnet: false,
        };

        ControlLoop::new(
            settings,
            IdleGateway,
            IdleQuotes {
                symbol: symbol.to_string(),
            },
            db,
            WatermarkStore::new(dir.to_str().unwrap(), symbol),
        )
        .unwrap()
    }

    async fn join_with_timeout(supervisor: &mut Supervisor) -> (String, LoopExit) {
        tokio::time::timeout(Duration::from_secs(5), supervisor.join_next())
            .await
            .expect("loop should exit promptly")
            .expect("a task should be running")
            .expect("loop task should not panic")
    }

    #[tokio::test]
    async fn test_stop_targets_a_single_symbol() {
        let dir = tempdir().unwrap();
        let mut supervisor = Supervisor::new();
        supervisor.spawn(idle_loop("BTCUSDT", dir.path()));
        supervisor.spawn(idle_loop("ETHUSDT", dir.path()));
        assert_eq!(supervisor.len(), 2);

        assert!(supervisor.stop("BTCUSDT"));
        let (symbol, exit) = join_with_timeout(&mut supervisor).await;
        assert_eq!(symbol, "BTCUSDT");
        assert_eq!(exit, LoopExit::Shutdown);

        // The other symbol keeps running until told otherwise
        assert_eq!(supervisor.len(), 1);
        assert!(supervisor.stop("ETHUSDT"));
        let (symbol, _) = join_with_timeout(&mut supervisor).await;
        assert_eq!(symbol, "ETHUSDT");
        assert!(supervisor.is_empty());
    }

    #[tokio::test]
    async fn test_stop_unknown_symbol_is_refused() {
        let supervisor = Supervisor::new();
        assert!(!supervisor.stop("DOGEUSDT"));
    }

    #[tokio::test]
    async fn test_restart_spawns_a_fresh_loop_for_the_symbol() {
        let dir = tempdir().unwrap();
        let mut supervisor = Supervisor::new();
        supervisor.spawn(idle_loop("BTCUSDT", dir.path()));

        supervisor.stop("BTCUSDT");
        let (symbol, _) = join_with_timeout(&mut supervisor).await;
        assert_eq!(symbol, "BTCUSDT");
        assert!(!supervisor.stop("BTCUSDT"));

        supervisor.spawn(idle_loop("BTCUSDT", dir.path()));
        assert!(supervisor.stop("BTCUSDT"));
        let (symbol, exit) = join_with_timeout(&mut supervisor).await;
        assert_eq!(symbol, "BTCUSDT");
        assert_eq!(exit, LoopExit::Shutdown);
    }

    #[tokio::test]
    async fn test_stop_all_drains_every_loop() {
        let dir = tempdir().unwrap();
        let mut supervisor = Supervisor::new();
        supervisor.spawn(idle_loop("BTCUSDT", dir.path()));
        supervisor.spawn(idle_loop("ETHUSDT", dir.path()));
        supervisor.spawn(idle_loop("SOLUSDT", dir.path()));

        supervisor.stop_all();
        for _ in 0..3 {
            let (_, exit) = join_with_timeout(&mut supervisor).await;
            assert_eq!(exit, LoopExit::Shutdown);
        }
        assert!(supervisor.is_empty());
        assert!(tokio::time::timeout(Duration::from_millis(50), supervisor.join_next())
            .await
            .unwrap()
            .is_none());
    }
}
