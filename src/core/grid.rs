// Grid sizing engine - pure, deterministic order sizing and level generation

use crate::filters::SymbolFilters;
use std::fmt;

/// Grid shape parameters, fixed per control loop instance.
#[derive(Debug, Clone)]
pub struct GridParams {
    pub levels: usize,
    pub step_width: f64,
    pub use_spread: bool,
}

/// One grid tier: a resting buy below and a resting sell above the mid-price.
#[derive(Debug, Clone, PartialEq)]
pub struct GridLevel {
    pub buy_price: f64,
    pub sell_price: f64,
    pub quantity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    BelowMinQty,
    BelowMinNotional,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::BelowMinQty => write!(f, "quantity below exchange minimum"),
            SkipReason::BelowMinNotional => write!(f, "order value below minimum notional"),
        }
    }
}

/// Outcome of sizing one cycle. `Skipped` is a silent no-op, not an error:
/// the cycle proceeds without placing orders.
#[derive(Debug, Clone, PartialEq)]
pub enum SizingResult {
    Accepted {
        quantity: f64,
        levels: Vec<GridLevel>,
    },
    Skipped {
        reason: SkipReason,
    },
}

/// Round to `dp` decimal places.
pub fn round_dp(x: f64, dp: u32) -> f64 {
    let factor = 10f64.powi(dp as i32);
    (x * factor).round() / factor
}

/// Snap a price onto the exchange tick grid. The trailing 8-dp round clears
/// the float noise left by the multiply, so snapped prices compare exactly.
pub fn snap(x: f64, tick: f64) -> f64 {
    round_dp((x / tick).round() * tick, 8)
}

/// Size one grid cycle: derive the per-order quantity from the allocated
/// balance fraction and reject quietly when exchange minimums are not met.
pub fn size_grid(
    mid_price: f64,
    balance: f64,
    allocation: f64,
    params: &GridParams,
    filters: &SymbolFilters,
) -> SizingResult {
    let order_value = balance * allocation;
    let quantity = round_dp(order_value / mid_price, filters.qty_precision);

    if quantity < filters.min_qty {
        return SizingResult::Skipped {
            reason: SkipReason::BelowMinQty,
        };
    }
    if order_value < filters.min_notional {
        return SizingResult::Skipped {
            reason: SkipReason::BelowMinNotional,
        };
    }

    SizingResult::Accepted {
        quantity,
        levels: generate_grid(mid_price, quantity, params, filters.tick_size),
    }
}

/// Generate the price ladder: tier `i` sits `i * step_width` away from the
/// mid on both sides, snapped to the tick grid. With `use_spread` off the
/// grid collapses to a single pair resting at the snapped mid itself.
pub fn generate_grid(
    mid_price: f64,
    quantity: f64,
    params: &GridParams,
    tick_size: f64,
) -> Vec<GridLevel> {
    if !params.use_spread {
        let pinned = snap(mid_price, tick_size);
        return vec![GridLevel {
            buy_price: pinned,
            sell_price: pinned,
            quantity,
        }];
    }

    (1..=params.levels)
        .map(|i| {
            let offset = i as f64 * params.step_width;
            GridLevel {
                buy_price: snap(mid_price - offset, tick_size),
                sell_price: snap(mid_price + offset, tick_size),
                quantity,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_filters() -> SymbolFilters {
        SymbolFilters {
            symbol: "BTCUSDT".to_string(),
            min_qty: 0.001,
            step_size: 0.001,
            tick_size: 0.1,
            min_notional: 10.0,
            qty_precision: 3,
            price_precision: 1,
        }
    }

    fn params(levels: usize) -> GridParams {
        GridParams {
            levels,
            step_width: 0.5,
            use_spread: true,
        }
    }

    #[test]
    fn test_snap_to_tick() {
        assert_eq!(snap(100000.13, 0.1), 100000.1);
        assert_eq!(snap(100000.16, 0.1), 100000.2);
        assert_eq!(snap(0.12345678, 0.0001), 0.1235);
    }

    #[test]
    fn test_grid_shape() {
        let levels = generate_grid(100.0, 1.0, &params(3), 0.1);

        assert_eq!(levels.len(), 3);
        for (i, level) in levels.iter().enumerate() {
            assert!(level.buy_price < 100.0, "tier {i} buy not below mid");
            assert!(level.sell_price > 100.0, "tier {i} sell not above mid");
        }
        // Monotonic widening: each deeper tier's buy is strictly lower
        assert!(levels[1].buy_price < levels[0].buy_price);
        assert!(levels[2].buy_price < levels[1].buy_price);
        assert!(levels[1].sell_price > levels[0].sell_price);
    }

    #[test]
    fn test_no_spread_collapses_to_single_pair() {
        let grid_params = GridParams {
            levels: 3,
            step_width: 0.5,
            use_spread: false,
        };
        let levels = generate_grid(100.03, 1.0, &grid_params, 0.1);

        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].buy_price, 100.0);
        assert_eq!(levels[0].sell_price, 100.0);
    }

    #[test]
    fn test_sizing_skip_below_notional() {
        // order_value = 50 * 0.1 = 5 < 10
        let result = size_grid(100000.0, 50.0, 0.1, &params(3), &test_filters());
        assert!(matches!(result, SizingResult::Skipped { .. }));
    }

    #[test]
    fn test_sizing_accept_boundary() {
        // order_value = 200, quantity = round(200 / 100, 3) = 2.0
        let result = size_grid(100.0, 2000.0, 0.1, &params(3), &test_filters());
        match result {
            SizingResult::Accepted { quantity, levels } => {
                assert_eq!(quantity, 2.0);
                assert_eq!(levels.len(), 3);
            }
            other => panic!("expected acceptance, got {other:?}"),
        }
    }

    #[test]
    fn test_sizing_skip_below_min_qty() {
        let mut filters = test_filters();
        filters.min_notional = 1.0;
        // quantity = round(15 / 100000, 3) = 0.0 < 0.001
        let result = size_grid(100000.0, 150.0, 0.1, &params(3), &filters);
        assert_eq!(
            result,
            SizingResult::Skipped {
                reason: SkipReason::BelowMinQty
            }
        );
    }

    #[test]
    fn test_sizing_is_deterministic() {
        let a = size_grid(100000.13, 5000.0, 0.1, &params(3), &test_filters());
        let b = size_grid(100000.13, 5000.0, 0.1, &params(3), &test_filters());
        assert_eq!(a, b);
    }
}
