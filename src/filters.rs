// Symbol filter resolution - normalizes exchange trading rules

use crate::error::FilterError;
use crate::gateway::ExchangeGateway;
use crate::types::TradeMode;
use serde_json::Value;
use tracing::warn;

/// Fallback applied when the exchange does not publish a minimum notional,
/// in quote-currency units.
pub const MIN_NOTIONAL_FALLBACK: f64 = 10.0;

/// Normalized trading rules for one symbol. Treated as slowly-changing
/// reference data and cached for the lifetime of the owning control loop.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolFilters {
    pub symbol: String,
    pub min_qty: f64,
    pub step_size: f64,
    pub tick_size: f64,
    pub min_notional: f64,
    pub qty_precision: u32,
    pub price_precision: u32,
}

impl SymbolFilters {
    /// Build filters from a single instrument payload (one element of the
    /// exchange's `symbols` array).
    pub fn from_instrument(symbol: &str, instrument: &Value) -> Result<Self, FilterError> {
        let entries = instrument
            .get("filters")
            .and_then(|f| f.as_array())
            .ok_or(FilterError::MissingField("filters"))?;

        let mut min_qty = None;
        let mut step_size = None;
        let mut tick_size = None;
        let mut min_notional = None;

        for entry in entries {
            match entry.get("filterType").and_then(|t| t.as_str()) {
                Some("LOT_SIZE") => {
                    min_qty = field_f64(entry, "minQty");
                    step_size = field_f64(entry, "stepSize");
                }
                Some("PRICE_FILTER") => {
                    tick_size = field_f64(entry, "tickSize");
                }
                // Spot publishes NOTIONAL, futures MIN_NOTIONAL
                Some("MIN_NOTIONAL") | Some("NOTIONAL") => {
                    min_notional = field_f64(entry, "minNotional")
                        .or_else(|| field_f64(entry, "notional"));
                }
                _ => {}
            }
        }

        let min_qty = min_qty.ok_or(FilterError::MissingField("minQty"))?;
        let step_size = step_size.ok_or(FilterError::MissingField("stepSize"))?;
        let tick_size = tick_size.ok_or(FilterError::MissingField("tickSize"))?;
        let min_notional = min_notional.unwrap_or(MIN_NOTIONAL_FALLBACK);

        let qty_precision = precision_of(step_size);
        let price_precision = precision_of(tick_size);

        // Precision derivation assumes a power-of-ten step; exchanges using
        // e.g. 0.0025 would round quantities onto the wrong lattice.
        if !is_power_of_ten(step_size) {
            warn!(
                symbol,
                step_size, "stepSize is not a power of ten; quantity rounding may be off-grid"
            );
        }

        Ok(Self {
            symbol: symbol.to_string(),
            min_qty,
            step_size,
            tick_size,
            min_notional,
            qty_precision,
            price_precision,
        })
    }
}

/// Resolve filters for `symbol` under the given trade mode.
///
/// Derivatives symbols are looked up inside the exchange-wide instrument
/// list; spot symbols query the per-symbol instrument endpoint directly.
pub async fn resolve_filters<G>(
    gateway: &G,
    symbol: &str,
    mode: TradeMode,
) -> Result<SymbolFilters, FilterError>
where
    G: ExchangeGateway + ?Sized,
{
    let instrument = match mode {
        TradeMode::Futures => {
            let list = gateway.instrument_list().await?;
            find_instrument(&list, symbol)
                .ok_or_else(|| FilterError::SymbolNotFound(symbol.to_string()))?
        }
        TradeMode::Spot => {
            let payload = gateway.instrument(symbol).await?;
            find_instrument(&payload, symbol)
                .ok_or_else(|| FilterError::SymbolNotFound(symbol.to_string()))?
        }
    };

    SymbolFilters::from_instrument(symbol, &instrument)
}

fn find_instrument(payload: &Value, symbol: &str) -> Option<Value> {
    payload
        .get("symbols")?
        .as_array()?
        .iter()
        .find(|s| s.get("symbol").and_then(|v| v.as_str()) == Some(symbol))
        .cloned()
}

fn field_f64(entry: &Value, key: &str) -> Option<f64> {
    entry.get(key)?.as_str()?.parse::<f64>().ok()
}

/// Decimal places implied by a power-of-ten step (0.001 -> 3, 1.0 -> 0).
fn precision_of(step: f64) -> u32 {
    step.log10().round().abs() as u32
}

fn is_power_of_ten(step: f64) -> bool {
    let p = step.log10().round() as i32;
    (10f64.powi(p) - step).abs() < 1e-12
}
