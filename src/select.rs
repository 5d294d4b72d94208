//! Best-deal selection: one winner per SKU name, by lowest rate per quantity.
//!
//! Grouping is exact string equality on `sku_name` (case-sensitive, no
//! trimming). Items without a defined `rate_per_qty` are never eligible.
//! Ties go to the item that appears first in the input.

use crate::item::ProcessedItem;
use std::collections::HashMap;
use tracing::debug;

/// Flag the best deal in every SKU-name group.
///
/// Clears any previous flags first, so calling it twice gives the same
/// result. Items are not reordered.
pub fn mark_best_deals(items: &mut [ProcessedItem]) {
    // sku_name → (index, rate) of the cheapest item seen so far.
    let mut best: HashMap<&str, (usize, f64)> = HashMap::new();

    for (idx, item) in items.iter().enumerate() {
        let Some(rate) = item.rate_per_qty else {
            continue;
        };
        best.entry(item.sku_name.as_str())
            .and_modify(|current| {
                // Strictly lower only: the earlier item keeps a tie.
                if rate < current.1 {
                    *current = (idx, rate);
                }
            })
            .or_insert((idx, rate));
    }

    let winners: Vec<usize> = best.values().map(|&(idx, _)| idx).collect();
    debug!("Best deals found for {} SKU names", winners.len());

    for item in items.iter_mut() {
        item.is_best_deal = false;
    }
    for idx in winners {
        items[idx].is_best_deal = true;
    }
}

/// Owned variant of [`mark_best_deals`] for pipeline-style call sites.
pub fn select_best_deals(mut items: Vec<ProcessedItem>) -> Vec<ProcessedItem> {
    mark_best_deals(&mut items);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::RawItem;
    use crate::normalize::normalize_item;

    fn item(supplier: &str, sku: &str, amount: i64, paid: i64, free: i64) -> ProcessedItem {
        normalize_item(
            &RawItem::new(supplier, sku)
                .with_amount(amount)
                .with_quantities(paid, free),
        )
        .unwrap()
    }

    fn flags(items: &[ProcessedItem]) -> Vec<bool> {
        items.iter().map(|i| i.is_best_deal).collect()
    }

    #[test]
    fn lowest_rate_wins() {
        let items = select_best_deals(vec![item("S1", "A", 100, 10, 0), item("S2", "A", 45, 9, 1)]);
        assert_eq!(flags(&items), vec![false, true]);
    }

    #[test]
    fn tie_goes_to_first_item() {
        let items = select_best_deals(vec![
            item("S1", "A", 60, 6, 0),
            item("S2", "A", 50, 5, 0),
            item("S3", "A", 10, 1, 0),
        ]);
        assert_eq!(flags(&items), vec![true, false, false]);
    }

    #[test]
    fn group_without_defined_rate_has_no_winner() {
        let items = select_best_deals(vec![item("S1", "B", 50, 0, 0)]);
        assert_eq!(flags(&items), vec![false]);
    }

    #[test]
    fn undefined_rate_never_wins_over_defined() {
        let items = select_best_deals(vec![item("S1", "A", 0, 0, 0), item("S2", "A", 100, 1, 0)]);
        assert_eq!(flags(&items), vec![false, true]);
    }

    #[test]
    fn groups_are_independent_and_case_sensitive() {
        let items = select_best_deals(vec![
            item("S1", "A", 100, 10, 0),
            item("S2", "a", 10, 10, 0),
            item("S3", "B", 30, 3, 0),
            item("S4", "A", 90, 10, 0),
        ]);
        assert_eq!(flags(&items), vec![false, true, true, true]);
    }

    #[test]
    fn zero_rate_is_a_valid_best_deal() {
        let items = select_best_deals(vec![item("S1", "A", 10, 1, 0), item("S2", "A", 0, 5, 5)]);
        assert_eq!(flags(&items), vec![false, true]);
    }

    #[test]
    fn rerun_clears_stale_flags() {
        let mut items = vec![item("S1", "A", 100, 10, 0), item("S2", "A", 45, 9, 1)];
        items[0].is_best_deal = true;
        mark_best_deals(&mut items);
        mark_best_deals(&mut items);
        assert_eq!(flags(&items), vec![false, true]);
    }

    #[test]
    fn at_most_one_flag_per_group() {
        let mut items = Vec::new();
        for i in 0..20 {
            items.push(item(&format!("S{i}"), &format!("SKU{}", i % 4), (i % 7) * 10, 5, i % 3));
        }
        mark_best_deals(&mut items);
        for g in 0..4 {
            let name = format!("SKU{g}");
            let n = items.iter().filter(|it| it.sku_name == name && it.is_best_deal).count();
            assert_eq!(n, 1, "group {name}");
        }
    }
}
