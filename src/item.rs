//! Line-item types: what the model extracted, and what we made of it.
//!
//! [`RawItem`] mirrors the JSON object the extraction prompt asks for, but
//! trusts none of it. Text fields accept any JSON scalar; numeric fields are
//! kept as untyped [`serde_json::Value`]s so that a model answering `"10"` or
//! `10.5` where an integer was requested is caught by the normaliser rather
//! than by serde, which would drop the whole document.
//!
//! [`ProcessedItem`] is the validated view built by
//! [`crate::normalize::normalize_item`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One SKU line item as returned by the extraction model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    /// Quoting company (not the manufacturer).
    #[serde(
        default,
        alias = "sku_supplier",
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub supplier: Option<String>,

    /// Product name, used as the comparison key.
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub sku_name: Option<String>,

    /// Supplier's own product code as printed on the quotation.
    #[serde(
        default,
        rename = "sku_invoice",
        alias = "sku_code",
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub sku_code: Option<String>,

    /// Total quoted price for the listed quantity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_qty: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_qty: Option<Value>,

    /// Quantity as printed, e.g. `"10+1"`.
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub qty_str: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mrp: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_rate: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_discount_percent: Option<Value>,

    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub batch_number: Option<String>,
}

impl RawItem {
    pub fn new(supplier: impl Into<String>, sku_name: impl Into<String>) -> Self {
        Self {
            supplier: Some(supplier.into()),
            sku_name: Some(sku_name.into()),
            ..Default::default()
        }
    }

    pub fn with_amount(mut self, amount: i64) -> Self {
        self.amount = Some(Value::from(amount));
        self
    }

    pub fn with_quantities(mut self, paid: i64, free: i64) -> Self {
        self.paid_qty = Some(Value::from(paid));
        self.free_qty = Some(Value::from(free));
        self
    }

    pub fn with_base_rate(mut self, rate: impl Into<Value>, discount_pct: Option<Value>) -> Self {
        self.base_rate = Some(rate.into());
        self.base_discount_percent = discount_pct;
        self
    }
}

/// Accept any JSON scalar where text is expected.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Secondary pricing figures kept for display.
///
/// None of these take part in best-deal selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyMetrics {
    /// `base_rate × (1 − discount / 100)`, 2 decimals.
    pub effective_rate: Option<f64>,
    /// The supplier's base discount in percent, 2 decimals.
    pub effective_discount_pct: Option<f64>,
    /// `paid × effective_rate / (paid + free)`, 2 decimals.
    pub comparison_rate: Option<f64>,
}

/// A validated line item with its derived metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedItem {
    pub supplier: String,
    pub sku_name: String,
    pub sku_code: Option<String>,
    pub batch_number: Option<String>,
    pub mrp: Option<f64>,
    pub amount: Option<u64>,
    pub paid_qty: u64,
    pub free_qty: u64,
    /// Always `paid_qty + free_qty`.
    pub total_qty: u64,
    /// `amount / total_qty`; `None` when either side is unusable.
    pub rate_per_qty: Option<f64>,
    pub legacy: LegacyMetrics,
    /// Set by [`crate::select::mark_best_deals`] only.
    pub is_best_deal: bool,
}

impl ProcessedItem {
    /// Quantity scheme as suppliers write it: `"paid+free"`.
    pub fn qty_display(&self) -> String {
        format!("{}+{}", self.paid_qty, self.free_qty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialises_original_key_names() {
        let json = r#"{
            "sku_supplier": "NARSINGH PHARMA",
            "sku_invoice": "GLN-G1",
            "sku_name": "GLUCONORM G1",
            "amount": 450,
            "paid_qty": 9,
            "free_qty": 1,
            "batch_number": "IAK0040"
        }"#;
        let item: RawItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.supplier.as_deref(), Some("NARSINGH PHARMA"));
        assert_eq!(item.sku_code.as_deref(), Some("GLN-G1"));
        assert_eq!(item.amount, Some(Value::from(450)));
        assert_eq!(item.batch_number.as_deref(), Some("IAK0040"));
    }

    #[test]
    fn tolerates_wrong_types_and_missing_keys() {
        let json = r#"{"supplier": 42, "paid_qty": "ten", "free_qty": null}"#;
        let item: RawItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.supplier.as_deref(), Some("42"));
        assert_eq!(item.sku_name, None);
        assert_eq!(item.paid_qty, Some(Value::from("ten")));
        assert_eq!(item.free_qty, None);
        assert_eq!(item.amount, None);
    }

    #[test]
    fn builder_helpers() {
        let item = RawItem::new("S", "A").with_amount(100).with_quantities(10, 0);
        assert_eq!(item.amount, Some(Value::from(100)));
        assert_eq!(item.paid_qty, Some(Value::from(10)));
        assert_eq!(item.free_qty, Some(Value::from(0)));
    }

    #[test]
    fn serialises_back_to_accepted_keys() {
        let item = RawItem {
            sku_code: Some("X1".into()),
            ..RawItem::new("S", "A").with_quantities(1, 0)
        };
        let json = serde_json::to_string(&item).unwrap();
        let back: RawItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
        assert!(json.contains("\"sku_invoice\""));
    }
}
