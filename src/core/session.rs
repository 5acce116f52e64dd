// Session PnL tracking and take-profit/stop-loss evaluation

use crate::types::{Side, TradeFill};
use std::fmt;

/// Why a control loop left its cycle for the terminal `Stopped` state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopReason {
    TakeProfit(f64),
    StopLoss(f64),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::TakeProfit(pnl) => write!(f, "take-profit reached at {pnl:.2}"),
            StopReason::StopLoss(pnl) => write!(f, "stop-loss reached at {pnl:.2}"),
        }
    }
}

/// Running aggregation of fills since the current process session began.
///
/// PnL is the raw cash-flow delta (total sell proceeds minus total buy cost),
/// not matched-lot realized PnL: an open inventory imbalance shows up as
/// negative PnL immediately. Held in memory only; a restart opens a fresh
/// session bounded below by the persisted watermark.
#[derive(Debug, Clone)]
pub struct SessionTracker {
    start_trade_id: i64,
    buy_cost: f64,
    buy_qty: f64,
    sell_cost: f64,
    sell_qty: f64,
}

impl SessionTracker {
    pub fn new(start_trade_id: i64) -> Self {
        Self {
            start_trade_id,
            buy_cost: 0.0,
            buy_qty: 0.0,
            sell_cost: 0.0,
            sell_qty: 0.0,
        }
    }

    pub fn start_trade_id(&self) -> i64 {
        self.start_trade_id
    }

    /// Fold a fill into the session. Fills from before the session started
    /// are ignored here even though they are still persisted to the ledger.
    pub fn apply(&mut self, fill: &TradeFill) {
        if fill.id < self.start_trade_id {
            return;
        }
        match fill.side {
            Side::Buy => {
                self.buy_cost += fill.cost();
                self.buy_qty += fill.quantity;
            }
            Side::Sell => {
                self.sell_cost += fill.cost();
                self.sell_qty += fill.quantity;
            }
        }
    }

    pub fn pnl(&self) -> f64 {
        self.sell_cost - self.buy_cost
    }

    pub fn summary(&self) -> String {
        format!(
            "bought {:.4} for {:.2}, sold {:.4} for {:.2}, session pnl {:.2}",
            self.buy_qty,
            self.buy_cost,
            self.sell_qty,
            self.sell_cost,
            self.pnl()
        )
    }

    /// Evaluate the session against its termination thresholds.
    pub fn check_stop(&self, take_profit: f64, stop_loss: f64) -> Option<StopReason> {
        let pnl = self.pnl();
        if pnl >= take_profit {
            Some(StopReason::TakeProfit(pnl))
        } else if pnl <= stop_loss {
            Some(StopReason::StopLoss(pnl))
        } else {
            None
        }
    }
}
