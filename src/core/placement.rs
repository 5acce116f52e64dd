// Order placement sequencing

use crate::core::grid::GridLevel;
use crate::gateway::ExchangeGateway;
use crate::types::{Order, Side, TradeMode};
use tracing::{debug, warn};

/// Per-cycle placement outcome. Individual rejections are recorded, never
/// propagated: a partially placed grid is a normal cycle result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementReport {
    pub succeeded: usize,
    pub failed: usize,
}

impl PlacementReport {
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Submit both sides of every grid tier, buys before sells within a tier.
/// Each order is attempted independently; a rejection is logged and the
/// sequencer moves on to the next order.
pub async fn place_grid<G>(
    gateway: &G,
    symbol: &str,
    mode: TradeMode,
    levels: &[GridLevel],
) -> PlacementReport
where
    G: ExchangeGateway + ?Sized,
{
    let mut report = PlacementReport::default();

    for level in levels {
        let orders = [
            Order::limit(symbol, Side::Buy, level.buy_price, level.quantity),
            Order::limit(symbol, Side::Sell, level.sell_price, level.quantity),
        ];

        for order in &orders {
            match gateway.place_limit_order(order, mode).await {
                Ok(order_id) => {
                    debug!(
                        symbol,
                        side = order.side.as_str(),
                        price = order.price,
                        quantity = order.quantity,
                        order_id,
                        "order placed"
                    );
                    report.succeeded += 1;
                }
                Err(e) => {
                    warn!(
                        symbol,
                        side = order.side.as_str(),
                        price = order.price,
                        quantity = order.quantity,
                        error = %e,
                        "order placement failed"
                    );
                    report.failed += 1;
                }
            }
        }
    }

    report
}
