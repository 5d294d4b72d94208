//! Offline comparison tests: raw model output in, comparison table out.
//!
//! No PDF, no pdfium and no API key needed; these run everywhere.

use edgequake_quotecmp::{
    build_table, normalize_all, parse_response, select_best_deals, ComparisonSession,
    ComparisonTable, RawItem, RejectReason,
};
use serde_json::json;
use std::collections::BTreeSet;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn item(supplier: &str, sku: &str, amount: i64, paid: i64, free: i64) -> RawItem {
    RawItem::new(supplier, sku)
        .with_amount(amount)
        .with_quantities(paid, free)
}

/// A response the way the model tends to answer: fenced, mixed types.
const MODEL_RESPONSE: &str = r#"```json
{"sku_data": [
  {"sku_supplier": "NARSINGH PHARMA", "sku_invoice": "N-114", "sku_name": "ATORVA 20MG TAB",
   "mrp": "112.50", "base_rate": "80.00", "base_discount_percent": "10",
   "paid_qty": 10, "free_qty": 0, "batch_number": "IAK0040", "amount": 720},
  {"sku_supplier": "MEDIVISION", "sku_invoice": "AT20", "sku_name": "ATORVA 20MG TAB",
   "mrp": "112.50", "base_rate": "78", "paid_qty": 10, "free_qty": 2, "amount": 780},
  {"sku_supplier": "MEDIVISION", "sku_name": "JANUMET 50/500", "qty_str": "16+0", "amount": 2400},
  {"sku_supplier": "S. D. M. AGENCY", "sku_name": "JANUMET 50/500", "paid_qty": "ten", "free_qty": 0, "amount": 1500},
  {"sku_supplier": "S. D. M. AGENCY", "sku_name": "SEROFLO 250 ROTACAP", "paid_qty": 5, "free_qty": 0},
  "stray text"
]}
```"#;

// ── Scenarios ────────────────────────────────────────────────────────────────

#[test]
fn scenario_lower_rate_with_free_goods_wins() {
    let items = select_best_deals(normalize_all(&[item("S1", "A", 100, 10, 0), item("S2", "A", 45, 9, 1)]).items);
    assert_eq!(items[0].rate_per_qty, Some(10.0));
    assert_eq!(items[1].rate_per_qty, Some(4.5));
    assert!(!items[0].is_best_deal);
    assert!(items[1].is_best_deal);
}

#[test]
fn scenario_zero_quantity_has_no_best_deal() {
    let items = select_best_deals(normalize_all(&[item("S1", "B", 50, 0, 0)]).items);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].rate_per_qty, None);
    assert!(!items[0].is_best_deal);

    let table = build_table(&items, None);
    assert_eq!(table.len(), 1);
    assert!(table.best_deals().is_empty());
}

#[test]
fn scenario_missing_paid_qty_is_absent_from_table() {
    let raw: RawItem = serde_json::from_value(json!({
        "supplier": "S1", "sku_name": "C", "amount": 100, "free_qty": 2
    }))
    .unwrap();
    let report = normalize_all(&[raw, item("S2", "C", 90, 9, 0)]);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].rejection.reason, RejectReason::MissingQuantity);

    let table = build_table(&select_best_deals(report.items), None);
    assert_eq!(table.len(), 1);
    assert_eq!(table.rows[0].supplier, "S2");
    assert!(table.rows[0].best_deal);
}

#[test]
fn model_response_to_comparison() {
    let raw = parse_response("quotes.pdf", MODEL_RESPONSE).unwrap();
    assert_eq!(raw.len(), 5, "non-object entry must be dropped");

    let session = ComparisonSession::from_raw(&raw);
    assert_eq!(session.items().len(), 4);
    assert_eq!(session.rejected().len(), 1);
    assert_eq!(session.rejected()[0].rejection.supplier, "S. D. M. AGENCY");
    assert_eq!(
        session.sku_names(),
        vec!["ATORVA 20MG TAB", "JANUMET 50/500", "SEROFLO 250 ROTACAP"]
    );

    let table = session.table();
    // ATORVA: 720/10 = 72.0 vs 780/12 = 65.0
    let atorva: Vec<_> = table.rows.iter().filter(|r| r.sku_name == "ATORVA 20MG TAB").collect();
    assert_eq!(atorva.len(), 2);
    assert!(!atorva[0].best_deal);
    assert!(atorva[1].best_deal);
    assert_eq!(atorva[1].rate_per_qty, Some(65.0));
    assert_eq!(atorva[0].effective_rate, Some(72.0));
    assert_eq!(atorva[0].comparison_rate, Some(72.0));
    assert_eq!(atorva[0].mrp, Some(112.5));
    assert_eq!(atorva[0].batch_number.as_deref(), Some("IAK0040"));

    // JANUMET quantities came from the printed text.
    let janumet = table.rows.iter().find(|r| r.sku_name == "JANUMET 50/500").unwrap();
    assert_eq!((janumet.paid_qty, janumet.free_qty), (16, 0));
    assert_eq!(janumet.rate_per_qty, Some(150.0));
    assert!(janumet.best_deal);

    // SEROFLO has no amount: kept, never a best deal.
    let seroflo = table.rows.iter().find(|r| r.sku_name == "SEROFLO 250 ROTACAP").unwrap();
    assert_eq!(seroflo.rate_per_qty, None);
    assert!(!seroflo.best_deal);

    let counts = session.supplier_sku_counts();
    assert_eq!(counts["MEDIVISION"], 2);
    assert_eq!(counts["NARSINGH PHARMA"], 1);
    assert_eq!(counts["S. D. M. AGENCY"], 1);
}

#[test]
fn pivot_puts_suppliers_side_by_side() {
    let raw = parse_response("quotes.pdf", MODEL_RESPONSE).unwrap();
    let pivot = ComparisonSession::from_raw(&raw).table().pivot();

    assert_eq!(pivot.suppliers, vec!["NARSINGH PHARMA", "MEDIVISION", "S. D. M. AGENCY"]);
    let names: Vec<&str> = pivot.rows.iter().map(|r| r.sku_name.as_str()).collect();
    assert_eq!(names, vec!["ATORVA 20MG TAB", "JANUMET 50/500", "SEROFLO 250 ROTACAP"]);

    let atorva = &pivot.rows[0];
    assert!(atorva.offers[2].is_none(), "S. D. M. AGENCY did not quote ATORVA");
    assert_eq!(atorva.best_deal.as_deref(), Some("MEDIVISION"));
    // The rejected JANUMET quote leaves only MEDIVISION.
    let janumet = &pivot.rows[1];
    assert_eq!(janumet.offers.iter().filter(|o| o.is_some()).count(), 1);
    assert_eq!(janumet.best_deal.as_deref(), Some("MEDIVISION"));
    assert_eq!(pivot.rows[2].best_deal, None);

    let md = pivot.to_markdown();
    assert!(md.lines().nth(4).unwrap().ends_with("| - |"));
}

// ── Properties ───────────────────────────────────────────────────────────────

fn varied_items() -> Vec<RawItem> {
    let mut raws = Vec::new();
    for i in 0..60i64 {
        let sku = format!("SKU-{}", i % 7);
        let supplier = format!("SUPPLIER-{}", i % 5);
        let mut raw = item(&supplier, &sku, (i * 37) % 500, (i * 13) % 11, i % 3);
        if i % 9 == 0 {
            raw.amount = None;
        }
        if i % 17 == 0 {
            raw.paid_qty = Some(json!(-1));
        }
        raws.push(raw);
    }
    raws
}

#[test]
fn totals_and_rates_hold_for_every_item() {
    let report = normalize_all(&varied_items());
    assert!(!report.items.is_empty());
    for it in &report.items {
        assert_eq!(it.total_qty, it.paid_qty + it.free_qty);
        match (it.amount, it.rate_per_qty) {
            (Some(a), Some(rate)) => {
                assert!(it.total_qty > 0);
                assert!(rate.is_finite() && rate >= 0.0);
                assert_eq!(rate, a as f64 / it.total_qty as f64);
            }
            (Some(_), None) => assert_eq!(it.total_qty, 0),
            (None, rate) => assert_eq!(rate, None),
        }
    }
    for rej in &report.rejected {
        assert_eq!(rej.rejection.reason, RejectReason::NegativeQuantity);
    }
}

#[test]
fn at_most_one_best_deal_per_group_and_it_is_the_earliest_minimum() {
    let items = select_best_deals(normalize_all(&varied_items()).items);
    let names: BTreeSet<&str> = items.iter().map(|i| i.sku_name.as_str()).collect();

    for name in names {
        let group: Vec<_> = items.iter().filter(|i| i.sku_name == name).collect();
        let flagged: Vec<_> = group.iter().filter(|i| i.is_best_deal).collect();
        let min = group
            .iter()
            .filter_map(|i| i.rate_per_qty)
            .fold(None, |acc: Option<f64>, r| Some(acc.map_or(r, |a| a.min(r))));

        match min {
            None => assert!(flagged.is_empty(), "{name}"),
            Some(min) => {
                assert_eq!(flagged.len(), 1, "{name}");
                assert_eq!(flagged[0].rate_per_qty, Some(min));
                let first = group.iter().find(|i| i.rate_per_qty == Some(min)).unwrap();
                assert!(first.is_best_deal, "{name}: tie must go to the earliest item");
            }
        }
    }
}

#[test]
fn filter_is_subset_in_input_order() {
    let items = select_best_deals(normalize_all(&varied_items()).items);
    let filter: BTreeSet<String> = ["SKU-2", "SKU-5", "NOT-QUOTED"].iter().map(|s| s.to_string()).collect();
    let table = build_table(&items, Some(&filter));

    assert!(table.rows.iter().all(|r| filter.contains(&r.sku_name)));
    let expected: Vec<(&str, &str)> = items
        .iter()
        .filter(|i| filter.contains(&i.sku_name))
        .map(|i| (i.supplier.as_str(), i.sku_name.as_str()))
        .collect();
    let got: Vec<(&str, &str)> = table
        .rows
        .iter()
        .map(|r| (r.supplier.as_str(), r.sku_name.as_str()))
        .collect();
    assert_eq!(got, expected);
}

#[test]
fn csv_round_trip_recovers_every_row() {
    let raw = parse_response("quotes.pdf", MODEL_RESPONSE).unwrap();
    let mut all = raw;
    all.extend(varied_items());
    let table = ComparisonSession::from_raw(&all).table();

    let csv = table.to_csv_string().unwrap();
    assert!(csv.contains("N/A"));
    let back = ComparisonTable::from_csv_str(&csv).unwrap();
    assert_eq!(back, table);
}

#[test]
fn empty_input_gives_empty_everything() {
    let session = ComparisonSession::from_raw(&[]);
    assert!(session.is_empty());
    assert!(session.sku_names().is_empty());
    let table = session.table();
    assert!(table.is_empty());
    let csv = table.to_csv_string().unwrap();
    assert_eq!(csv.lines().count(), 1, "header only");
}
