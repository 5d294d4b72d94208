//! Record normaliser: untrusted [`RawItem`] → validated [`ProcessedItem`].
//!
//! The model that produced the raw records is probabilistic, so every field
//! is re-checked here. A record either becomes a `ProcessedItem` or a
//! [`Rejection`] with a reason; nothing in this module panics or returns a
//! fatal error for bad data.
//!
//! ## Rules
//!
//! 1. `paid_qty` / `free_qty` absent or not an integer → `missing quantity fields`.
//!    When *both* are absent, the printed quantity text (`qty_str`, e.g.
//!    `"10+1"`) is tried first.
//! 2. Either quantity negative → `negative quantity`.
//! 3. `total_qty = paid_qty + free_qty`.
//! 4. `rate_per_qty = amount / total_qty` when `amount` is a non-negative
//!    integer and `total_qty > 0`; otherwise `None`, and the item is kept.
//! 5. Legacy figures come from `base_rate` / `base_discount_percent` and follow
//!    the same "undefined rather than wrong" rule: a discount outside 0–100 %
//!    or a result that is not finite leaves them undefined.
//!
//! Every skip and every fall-back to an undefined metric is logged with the
//! supplier, the SKU name, and the raw values.

use crate::error::{RejectReason, Rejection};
use crate::item::{LegacyMetrics, ProcessedItem, RawItem};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Placeholder used when the model did not name the supplier.
pub const UNKNOWN_SUPPLIER: &str = "UNKNOWN_SUPPLIER";
/// Placeholder used when the model did not name the product.
pub const UNKNOWN_SKU_NAME: &str = "UNKNOWN_SKU_NAME";

/// A rejected record together with its position in the input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRecord {
    /// 0-based index into the raw record sequence.
    pub index: usize,
    pub rejection: Rejection,
}

/// Outcome of normalising a whole extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizeReport {
    /// Accepted items, in input order.
    pub items: Vec<ProcessedItem>,
    pub rejected: Vec<RejectedRecord>,
}

/// Normalise every raw record, preserving input order.
pub fn normalize_all(raw_items: &[RawItem]) -> NormalizeReport {
    let mut report = NormalizeReport::default();

    for (index, raw) in raw_items.iter().enumerate() {
        match normalize_item(raw) {
            Ok(item) => report.items.push(item),
            Err(rejection) => report.rejected.push(RejectedRecord { index, rejection }),
        }
    }

    info!(
        "Normalised {} records: {} kept, {} skipped",
        raw_items.len(),
        report.items.len(),
        report.rejected.len()
    );
    report
}

/// Validate one raw record and compute its derived metrics.
pub fn normalize_item(raw: &RawItem) -> Result<ProcessedItem, Rejection> {
    let supplier = match raw.supplier.as_deref() {
        Some(s) => s.to_string(),
        None => {
            warn!(sku_name = ?raw.sku_name, "Record has no supplier, using {}", UNKNOWN_SUPPLIER);
            UNKNOWN_SUPPLIER.to_string()
        }
    };
    let sku_name = match raw.sku_name.as_deref() {
        Some(s) => s.to_string(),
        None => {
            warn!(supplier = %supplier, "Record has no sku_name, using {}", UNKNOWN_SKU_NAME);
            UNKNOWN_SKU_NAME.to_string()
        }
    };

    let (paid_qty, free_qty) = match quantities(raw) {
        Ok(q) => q,
        Err(reason) => {
            let rejection = Rejection {
                supplier,
                sku_name,
                reason,
                paid_qty: raw_repr(raw.paid_qty.as_ref()),
                free_qty: raw_repr(raw.free_qty.as_ref()),
            };
            warn!(
                supplier = %rejection.supplier,
                sku_name = %rejection.sku_name,
                paid_qty = %rejection.paid_qty,
                free_qty = %rejection.free_qty,
                qty_str = ?raw.qty_str,
                "Skipping record: {}",
                reason
            );
            return Err(rejection);
        }
    };

    // Both fit in i64, so the sum always fits in u64.
    let total_qty = paid_qty + free_qty;

    let amount = match integer_field(raw.amount.as_ref()) {
        Field::Valid(a) if a >= 0 => Some(a as u64),
        Field::Absent => None,
        _ => {
            warn!(
                supplier = %supplier,
                sku_name = %sku_name,
                amount = %raw_repr(raw.amount.as_ref()),
                "Amount is not a non-negative integer"
            );
            None
        }
    };

    let rate_per_qty = match amount {
        Some(a) if total_qty > 0 => Some(a as f64 / total_qty as f64),
        _ => {
            warn!(
                supplier = %supplier,
                sku_name = %sku_name,
                amount = %raw_repr(raw.amount.as_ref()),
                total_qty,
                "Rate per quantity undefined"
            );
            None
        }
    };

    let mrp = match decimal_field(raw.mrp.as_ref()) {
        Field::Valid(m) => Some(m),
        Field::Absent => None,
        Field::Invalid => {
            debug!(supplier = %supplier, sku_name = %sku_name, mrp = %raw_repr(raw.mrp.as_ref()), "Unparsable MRP");
            None
        }
    };

    let legacy = legacy_metrics(raw, paid_qty, free_qty, &supplier, &sku_name);

    Ok(ProcessedItem {
        supplier,
        sku_name,
        sku_code: raw.sku_code.clone(),
        batch_number: raw.batch_number.clone(),
        mrp,
        amount,
        paid_qty,
        free_qty,
        total_qty,
        rate_per_qty,
        legacy,
        is_best_deal: false,
    })
}

/// Parse a printed quantity scheme into `(paid, free)`.
///
/// Accepts `"16+0"`, `"32 + 8"` and a bare `"15"` (no free goods). Only the
/// leading part is read, so `"10+1 strips"` is `(10, 1)`.
pub fn parse_quantity_string(text: &str) -> Option<(u64, u64)> {
    static RE_PAID_FREE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^\s*(\d+)\s*\+\s*(\d+)").unwrap());
    static RE_PAID_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d+)").unwrap());

    if let Some(caps) = RE_PAID_FREE.captures(text) {
        let paid = caps[1].parse().ok()?;
        let free = caps[2].parse().ok()?;
        return Some((paid, free));
    }
    let caps = RE_PAID_ONLY.captures(text)?;
    Some((caps[1].parse().ok()?, 0))
}

// ── Field interpretation ─────────────────────────────────────────────────

/// How a single untrusted value turned out.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Field<T> {
    Absent,
    Valid(T),
    Invalid,
}

fn quantities(raw: &RawItem) -> Result<(u64, u64), RejectReason> {
    if raw.paid_qty.is_none() && raw.free_qty.is_none() {
        return match raw.qty_str.as_deref().and_then(parse_quantity_string) {
            // Keep the same i64 ceiling as the integer fields.
            Some((paid, free)) if paid <= i64::MAX as u64 && free <= i64::MAX as u64 => {
                debug!("Quantities taken from qty_str {:?}", raw.qty_str);
                Ok((paid, free))
            }
            _ => Err(RejectReason::MissingQuantity),
        };
    }

    let paid = integer_field(raw.paid_qty.as_ref());
    let free = integer_field(raw.free_qty.as_ref());
    match (paid, free) {
        (Field::Valid(p), Field::Valid(f)) if p < 0 || f < 0 => Err(RejectReason::NegativeQuantity),
        (Field::Valid(p), Field::Valid(f)) => Ok((p as u64, f as u64)),
        _ => Err(RejectReason::MissingQuantity),
    }
}

/// JSON integers, plus floats with no fractional part (`10.0`).
/// Strings are a type error, not something to guess at.
fn integer_field(value: Option<&Value>) -> Field<i64> {
    match value {
        None | Some(Value::Null) => Field::Absent,
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Field::Valid(i)
            } else if let Some(f) = n.as_f64() {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    Field::Valid(f as i64)
                } else {
                    Field::Invalid
                }
            } else {
                Field::Invalid
            }
        }
        Some(_) => Field::Invalid,
    }
}

/// Decimal figures such as MRP and base rate arrive as printed strings.
fn decimal_field(value: Option<&Value>) -> Field<f64> {
    match value {
        None | Some(Value::Null) => Field::Absent,
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if f.is_finite() => Field::Valid(f),
            _ => Field::Invalid,
        },
        Some(Value::String(s)) if s.trim().is_empty() => Field::Absent,
        Some(Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => Field::Valid(f),
            _ => Field::Invalid,
        },
        Some(_) => Field::Invalid,
    }
}

fn legacy_metrics(
    raw: &RawItem,
    paid_qty: u64,
    free_qty: u64,
    supplier: &str,
    sku_name: &str,
) -> LegacyMetrics {
    let base_rate = match decimal_field(raw.base_rate.as_ref()) {
        Field::Valid(r) if r >= 0.0 => r,
        Field::Absent => {
            debug!(supplier, sku_name, "No base rate; legacy metrics undefined");
            return LegacyMetrics::default();
        }
        _ => {
            warn!(
                supplier,
                sku_name,
                base_rate = %raw_repr(raw.base_rate.as_ref()),
                "Invalid base rate; legacy metrics undefined"
            );
            return LegacyMetrics::default();
        }
    };

    let discount_pct = match decimal_field(raw.base_discount_percent.as_ref()) {
        Field::Valid(d) if (0.0..=100.0).contains(&d) => d,
        Field::Absent => 0.0,
        _ => {
            warn!(
                supplier,
                sku_name,
                base_discount_percent = %raw_repr(raw.base_discount_percent.as_ref()),
                "Invalid discount; legacy metrics undefined"
            );
            return LegacyMetrics::default();
        }
    };

    let effective_rate = base_rate * (1.0 - discount_pct / 100.0);
    let total = paid_qty + free_qty;
    let comparison_rate = if total == 0 {
        debug!(supplier, sku_name, "Zero total quantity; comparison rate undefined");
        None
    } else {
        round2(paid_qty as f64 * effective_rate / total as f64)
    };

    let effective_rate = round2(effective_rate);
    if effective_rate.is_none() {
        warn!(supplier, sku_name, "Effective rate overflows; legacy metrics undefined");
        return LegacyMetrics::default();
    }

    LegacyMetrics {
        effective_rate,
        effective_discount_pct: round2(discount_pct),
        comparison_rate,
    }
}

/// Two-decimal rounding; `None` once the value is no longer finite.
fn round2(x: f64) -> Option<f64> {
    Some((x * 100.0).round() / 100.0).filter(|r| r.is_finite())
}

fn raw_repr(value: Option<&Value>) -> String {
    value.map_or_else(|| "null".to_string(), Value::to_string)
}
