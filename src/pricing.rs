//! Retail price computation from supplier cost
//!
//! Every selling price ends in `.45` or `.89`. The net price is snapped onto
//! that grid, then the taxed price is snapped again, so the final price can
//! differ from `net * 1.2` by up to one currency unit.

use serde::Serialize;

use crate::error::{Result, SyncError};

/// VAT factor applied to the net price
pub const TAX_FACTOR: f64 = 1.2;

/// Fractions up to this value snap to `.45`, anything above to `.89`
const SNAP_THRESHOLD: f64 = 0.69;
const SNAP_LOW: f64 = 0.45;
const SNAP_HIGH: f64 = 0.89;

/// Absorbs binary representation error (e.g. `0.69` computed as `0.6900000001`)
const EPSILON: f64 = 1e-9;

/// How to treat a cost value that is not a number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CostPolicy {
    /// Refuse to price the product
    #[default]
    Strict,
    /// Log a warning and price the product as if it cost nothing
    ZeroOnInvalid,
}

/// Prices derived from one cost value, all rounded to cents
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceBreakdown {
    pub price_pre_tax: f64,
    pub final_price: f64,
    pub margin_pre_tax: f64,
}

/// Compute net price, taxed price and margin from a raw feed cost.
///
/// Missing or empty cost counts as `0`. A decimal comma is accepted.
/// Non-numeric, infinite or negative values are rejected with
/// [`SyncError::InvalidCostFormat`].
///
/// # Examples
/// - `"5,00"` -> 8.45 net, 10.45 final, 3.71 margin
/// - `"15"` -> 20.45 net, 24.45 final, 5.38 margin
pub fn compute_price_breakdown(raw_cost: Option<&str>) -> Result<PriceBreakdown> {
    let cost = parse_cost(raw_cost)?;
    Ok(breakdown_for_cost(cost))
}

/// Like [`compute_price_breakdown`], but applies `policy` to invalid costs.
pub fn compute_price_breakdown_with(
    raw_cost: Option<&str>,
    policy: CostPolicy,
) -> Result<PriceBreakdown> {
    match (compute_price_breakdown(raw_cost), policy) {
        (Err(SyncError::InvalidCostFormat { value, .. }), CostPolicy::ZeroOnInvalid) => {
            log::warn!("Unparseable cost {:?}, pricing as 0", value);
            Ok(breakdown_for_cost(0.0))
        }
        (result, _) => result,
    }
}

/// Parse a feed cost value, normalizing the decimal comma.
pub fn parse_cost(raw_cost: Option<&str>) -> Result<f64> {
    let raw = raw_cost.map(str::trim).unwrap_or_default();
    let raw = if raw.is_empty() { "0" } else { raw };

    let invalid = || SyncError::InvalidCostFormat {
        sku: None,
        value: raw.to_string(),
    };

    let cost = raw.replace(',', ".").parse::<f64>().map_err(|_| invalid())?;
    if !cost.is_finite() || cost < 0.0 {
        return Err(invalid());
    }
    Ok(cost)
}

/// Tiered markup divisor: cheaper products carry a higher markup.
pub fn markup_divisor(cost: f64) -> f64 {
    if cost < 6.0 {
        0.60
    } else if cost <= 11.0 {
        0.72
    } else {
        0.75
    }
}

/// Snap a price onto the `.45` / `.89` grid.
pub fn snap_price(raw: f64) -> f64 {
    // 7.20 / 0.72 must land on 10, not 9.999999999999998
    let base = (raw + EPSILON).floor();
    let frac = raw - base;
    let add = if frac <= SNAP_THRESHOLD + EPSILON {
        SNAP_LOW
    } else {
        SNAP_HIGH
    };
    base + add
}

fn breakdown_for_cost(cost: f64) -> PriceBreakdown {
    let price_pre_tax = snap_price(cost / markup_divisor(cost));
    let final_price = snap_price(price_pre_tax * TAX_FACTOR);
    let margin_pre_tax = final_price / TAX_FACTOR - cost;

    PriceBreakdown {
        price_pre_tax: round_cents(price_pre_tax),
        final_price: round_cents(final_price),
        margin_pre_tax: round_cents(margin_pre_tax),
    }
}

/// Round half-up to two decimals, measured on the decimal value rather than
/// its binary approximation (`5.375` may be stored as `5.37499...`).
pub fn round_cents(value: f64) -> f64 {
    let scaled = value * 100.0;
    let nudged = scaled + scaled.signum() * 1e-7;
    nudged.round() / 100.0
}

/// Format an amount the way it is written to the remote table
pub fn format_amount(value: f64) -> String {
    format!("{:.2}", value)
}

#[cfg(test)]
#[path = "pricing_tests.rs"]
mod tests;
