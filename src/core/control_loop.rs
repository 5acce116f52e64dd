// Per-symbol trading cycle: poll, cancel, size, place, reconcile, sleep

use crate::clients::QuoteStream;
use crate::config::LoopSettings;
use crate::core::grid::{size_grid, GridParams, SizingResult};
use crate::core::placement::place_grid;
use crate::core::session::{SessionTracker, StopReason};
use crate::db::{Database, TradeRecord};
use crate::error::BotResult;
use crate::filters::{resolve_filters, SymbolFilters};
use crate::gateway::ExchangeGateway;
use crate::watermark::WatermarkStore;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Pause after a failed cycle before trying again.
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Why a control loop returned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoopExit {
    /// Session take-profit or stop-loss fired. Terminal for this symbol
    /// until the operator restarts the process.
    Stopped(StopReason),
    /// Process-wide shutdown signal received.
    Shutdown,
}

enum CycleOutcome {
    Continue,
    Stop(StopReason),
}

/// One symbol's trading loop. Owns its market data stream, gateway handle,
/// ledger connection, watermark and session state; symbols never share
/// mutable state so one symbol's failure cannot stall another.
pub struct ControlLoop<G, Q> {
    settings: LoopSettings,
    gateway: G,
    quotes: Q,
    db: Database,
    watermark: WatermarkStore,
    session: SessionTracker,
    filters: Option<SymbolFilters>,
    last_seen: i64,
}

impl<G, Q> ControlLoop<G, Q>
where
    G: ExchangeGateway,
    Q: QuoteStream,
{
    /// Build a loop, restoring the reconciliation watermark from disk. The
    /// session starts strictly after the restored watermark so pre-restart
    /// fills never count toward this session's PnL.
    pub fn new(
        settings: LoopSettings,
        gateway: G,
        quotes: Q,
        db: Database,
        watermark: WatermarkStore,
    ) -> BotResult<Self> {
        let last_seen = watermark.load()?;
        info!(
            symbol = %settings.symbol,
            mode = %settings.mode,
            last_seen,
            "control loop initialized"
        );

        Ok(Self {
            session: SessionTracker::new(last_seen + 1),
            settings,
            gateway,
            quotes,
            db,
            watermark,
            filters: None,
            last_seen,
        })
    }

    /// The symbol this loop trades.
    pub fn symbol(&self) -> &str {
        &self.settings.symbol
    }

    /// Run cycles until a stop condition fires or shutdown is signalled.
    pub async fn run(&mut self, mut shutdown: broadcast::Receiver<()>) -> LoopExit {
        loop {
            let outcome = tokio::select! {
                outcome = self.cycle() => outcome,
                _ = shutdown.recv() => {
                    info!(symbol = %self.settings.symbol, "shutdown requested");
                    return LoopExit::Shutdown;
                }
            };

            match outcome {
                Ok(CycleOutcome::Continue) => {}
                Ok(CycleOutcome::Stop(reason)) => {
                    info!(symbol = %self.settings.symbol, %reason, "session stopped");
                    return LoopExit::Stopped(reason);
                }
                Err(e) => {
                    warn!(
                        symbol = %self.settings.symbol,
                        category = e.category(),
                        error = %e,
                        "cycle failed; backing off"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                        _ = shutdown.recv() => return LoopExit::Shutdown,
                    }
                }
            }
        }
    }

    /// One full trading cycle. Errors abort the cycle, never the loop.
    async fn cycle(&mut self) -> BotResult<CycleOutcome> {
        let symbol = self.settings.symbol.clone();
        let mode = self.settings.mode;

        let quote = self.quotes.next_quote().await?;
        let mid = quote.mid();
        debug!(symbol = %symbol, bid = quote.bid, ask = quote.ask, mid, "quote received");

        // Clear the previous cycle's resting orders. A cancel failure is
        // tolerable: stale orders either fill (and reconcile later) or get
        // swept on the next cycle.
        if let Err(e) = self.gateway.cancel_open_orders(&symbol, mode).await {
            warn!(symbol = %symbol, error = %e, "cancel failed; carrying stale orders");
        }

        if let SizingResult::Accepted { quantity, levels } = self.size(mid).await? {
            let report = place_grid(&self.gateway, &symbol, mode, &levels).await;
            info!(
                symbol = %symbol,
                mid,
                quantity,
                placed = report.succeeded,
                failed = report.failed,
                "grid placed"
            );
        }

        if let Some(reason) = self.reconcile().await? {
            return Ok(CycleOutcome::Stop(reason));
        }

        tokio::time::sleep(self.settings.poll_interval).await;
        Ok(CycleOutcome::Continue)
    }

    /// Resolve (and cache) exchange filters, fetch the free balance and size
    /// the grid for this cycle.
    async fn size(&mut self, mid: f64) -> BotResult<SizingResult> {
        let filters = match &self.filters {
            Some(f) => f.clone(),
            None => {
                let f = resolve_filters(&self.gateway, &self.settings.symbol, self.settings.mode)
                    .await?;
                debug!(
                    symbol = %self.settings.symbol,
                    min_qty = f.min_qty,
                    tick_size = f.tick_size,
                    min_notional = f.min_notional,
                    "filters resolved"
                );
                self.filters = Some(f.clone());
                f
            }
        };

        let balance = self.gateway.quote_balance(self.settings.mode).await?;
        let params = GridParams {
            levels: self.settings.grid_levels,
            step_width: self.settings.step_width,
            use_spread: self.settings.use_spread,
        };

        let result = size_grid(mid, balance, self.settings.allocation, &params, &filters);
        if let SizingResult::Skipped { reason } = &result {
            debug!(symbol = %self.settings.symbol, balance, %reason, "sizing skipped");
        }
        Ok(result)
    }

    /// Pull trade history, persist everything past the watermark, advance the
    /// watermark, fold the new fills into the session and evaluate stops.
    ///
    /// Ordering is deliberate: all inserts must succeed before the watermark
    /// moves, so a persistence failure replays the whole batch next cycle and
    /// the idempotent inserts absorb the duplicates.
    async fn reconcile(&mut self) -> BotResult<Option<StopReason>> {
        let symbol = self.settings.symbol.clone();
        let trades = self.gateway.account_trades(&symbol, self.settings.mode).await?;

        let mut fresh: Vec<_> = trades
            .into_iter()
            .filter(|t| t.id > self.last_seen)
            .collect();
        fresh.sort_by_key(|t| t.id);

        if fresh.is_empty() {
            return Ok(None);
        }

        let conn = self.db.get_connection();
        let mut inserted = 0usize;
        for fill in &fresh {
            let record = TradeRecord::from_fill(fill, self.settings.mode);
            if record.insert(conn.clone())? {
                inserted += 1;
            }
        }

        if let Some(last) = fresh.last() {
            self.watermark.store(last.id)?;
            self.last_seen = last.id;
        }

        for fill in &fresh {
            self.session.apply(fill);
        }

        info!(
            symbol = %symbol,
            new_fills = fresh.len(),
            inserted,
            watermark = self.last_seen,
            session = %self.session.summary(),
            "reconciled"
        );

        Ok(self
            .session
            .check_stop(self.settings.take_profit, self.settings.stop_loss))
    }
}
