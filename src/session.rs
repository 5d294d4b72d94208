//! Comparison session: the state behind one interactive comparison.
//!
//! A session owns the processed items of one extraction and the user's
//! current SKU selection. Loading a new extraction replaces the session
//! wholesale; [`ComparisonSession::reset`] returns to the empty state.

use crate::item::{ProcessedItem, RawItem};
use crate::normalize::{normalize_all, RejectedRecord};
use crate::select::mark_best_deals;
use crate::table::{build_table, supplier_sku_counts, ComparisonTable};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct ComparisonSession {
    items: Vec<ProcessedItem>,
    rejected: Vec<RejectedRecord>,
    /// `None` means every SKU name is selected.
    selection: Option<BTreeSet<String>>,
}

impl ComparisonSession {
    /// Normalise and flag a fresh extraction.
    pub fn from_raw(raw_items: &[RawItem]) -> Self {
        let report = normalize_all(raw_items);
        let mut items = report.items;
        mark_best_deals(&mut items);
        Self {
            items,
            rejected: report.rejected,
            selection: None,
        }
    }

    /// Flagged items, in extraction order.
    pub fn items(&self) -> &[ProcessedItem] {
        &self.items
    }

    pub fn rejected(&self) -> &[RejectedRecord] {
        &self.rejected
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Distinct SKU names, sorted. These are the choices offered for
    /// filtering.
    pub fn sku_names(&self) -> Vec<String> {
        self.items
            .iter()
            .map(|item| item.sku_name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Restrict the table to the given SKU names.
    ///
    /// Names that no item carries are ignored with a warning. An empty
    /// selection is allowed and yields an empty table.
    pub fn select<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let known: BTreeSet<&str> = self.items.iter().map(|i| i.sku_name.as_str()).collect();
        let selection: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        for name in selection.iter().filter(|n| !known.contains(n.as_str())) {
            warn!("Selected SKU '{}' does not appear in any quotation", name);
        }
        debug!("Selecting {} SKU names", selection.len());
        self.selection = Some(selection);
    }

    /// Builder-style [`select`](Self::select).
    pub fn with_selection<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select(names);
        self
    }

    /// Drop the selection so every SKU name is shown again.
    pub fn select_all(&mut self) {
        self.selection = None;
    }

    /// Currently selected names (all names when nothing was chosen).
    pub fn selection(&self) -> Vec<String> {
        match &self.selection {
            Some(names) => names.iter().cloned().collect(),
            None => self.sku_names(),
        }
    }

    /// Comparison table for the current selection.
    pub fn table(&self) -> ComparisonTable {
        build_table(&self.items, self.selection.as_ref())
    }

    pub fn supplier_sku_counts(&self) -> BTreeMap<String, usize> {
        supplier_sku_counts(&self.items)
    }

    /// Forget the extraction and the selection.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
