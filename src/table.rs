//! Comparison table: flat rows for display and CSV export, plus a
//! per-SKU pivot with suppliers side by side.
//!
//! Rows are rebuilt from the flagged [`ProcessedItem`]s on every call and
//! never stored. Undefined figures travel as `None` and are written as
//! [`NOT_AVAILABLE`] in every textual form.

use crate::error::QuoteError;
use crate::item::ProcessedItem;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Display;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info};

/// Marker for an undefined value in CSV and Markdown output.
pub const NOT_AVAILABLE: &str = "N/A";

/// CSV header, in column order.
pub const COLUMNS: [&str; 14] = [
    "supplier",
    "sku_name",
    "sku_code",
    "batch_number",
    "mrp",
    "amount",
    "paid_qty",
    "free_qty",
    "total_qty",
    "rate_per_qty",
    "effective_rate",
    "effective_discount_pct",
    "comparison_rate",
    "best_deal",
];

/// One display row, derived from one processed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub supplier: String,
    pub sku_name: String,
    pub sku_code: Option<String>,
    pub batch_number: Option<String>,
    pub mrp: Option<f64>,
    pub amount: Option<u64>,
    pub paid_qty: u64,
    pub free_qty: u64,
    pub total_qty: u64,
    pub rate_per_qty: Option<f64>,
    pub effective_rate: Option<f64>,
    pub effective_discount_pct: Option<f64>,
    pub comparison_rate: Option<f64>,
    pub best_deal: bool,
}

impl From<&ProcessedItem> for ComparisonRow {
    fn from(item: &ProcessedItem) -> Self {
        Self {
            supplier: item.supplier.clone(),
            sku_name: item.sku_name.clone(),
            sku_code: item.sku_code.clone(),
            batch_number: item.batch_number.clone(),
            mrp: item.mrp,
            amount: item.amount,
            paid_qty: item.paid_qty,
            free_qty: item.free_qty,
            total_qty: item.total_qty,
            rate_per_qty: item.rate_per_qty,
            effective_rate: item.legacy.effective_rate,
            effective_discount_pct: item.legacy.effective_discount_pct,
            comparison_rate: item.legacy.comparison_rate,
            best_deal: item.is_best_deal,
        }
    }
}

/// Winning offer for one SKU name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestDeal {
    pub sku_name: String,
    pub supplier: String,
    /// `"paid+free"`.
    pub qty: String,
    pub rate_per_qty: f64,
}

/// An ordered set of comparison rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonTable {
    pub rows: Vec<ComparisonRow>,
}

/// Marker for a supplier that did not quote a SKU, in the pivot view.
pub const NOT_QUOTED: &str = "-";

/// Per-supplier cell group of the pivot view, in column order.
pub const PIVOT_FIELDS: [&str; 7] = [
    "MRP",
    "Rate/Qty",
    "Eff. Rate",
    "Eff. Disc%",
    "Qty",
    "SKU Code",
    "Batch Number",
];

/// Side-by-side view: one row per SKU name, one offer slot per supplier.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PivotTable {
    /// Suppliers in order of first appearance.
    pub suppliers: Vec<String>,
    /// One row per SKU name, sorted.
    pub rows: Vec<PivotRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotRow {
    pub sku_name: String,
    /// Indexed like [`PivotTable::suppliers`]; `None` when not quoted.
    pub offers: Vec<Option<ComparisonRow>>,
    /// Supplier of the flagged best deal, if any.
    pub best_deal: Option<String>,
}

/// Build the comparison table from items already flagged by
/// [`crate::select::mark_best_deals`].
///
/// With a filter, only items whose `sku_name` is in the set are kept. Input
/// order is preserved either way.
pub fn build_table(items: &[ProcessedItem], filter: Option<&BTreeSet<String>>) -> ComparisonTable {
    let rows: Vec<ComparisonRow> = items
        .iter()
        .filter(|item| filter.is_none_or(|names| names.contains(&item.sku_name)))
        .map(ComparisonRow::from)
        .collect();
    debug!("Comparison table: {} of {} items", rows.len(), items.len());
    ComparisonTable { rows }
}

/// Number of distinct products each supplier quoted.
///
/// Products are told apart by the supplier's SKU code, falling back to the
/// SKU name when the code was not extracted.
pub fn supplier_sku_counts(items: &[ProcessedItem]) -> BTreeMap<String, usize> {
    let mut seen: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
    for item in items {
        let key = item.sku_code.as_deref().unwrap_or(&item.sku_name);
        seen.entry(item.supplier.clone()).or_default().insert(key);
    }
    seen.into_iter().map(|(s, skus)| (s, skus.len())).collect()
}

impl ComparisonTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The flagged row of each SKU name, in order of first appearance.
    pub fn best_deals(&self) -> Vec<BestDeal> {
        self.rows
            .iter()
            .filter(|row| row.best_deal)
            .filter_map(|row| {
                row.rate_per_qty.map(|rate| BestDeal {
                    sku_name: row.sku_name.clone(),
                    supplier: row.supplier.clone(),
                    qty: format!("{}+{}", row.paid_qty, row.free_qty),
                    rate_per_qty: rate,
                })
            })
            .collect()
    }

    /// Pivot into one row per SKU name with a slot per supplier.
    ///
    /// When a supplier quoted the same SKU more than once, the slot shows its
    /// best-deal row if it has one, otherwise its first row.
    pub fn pivot(&self) -> PivotTable {
        let mut suppliers: Vec<String> = Vec::new();
        let mut position: HashMap<&str, usize> = HashMap::new();
        for row in &self.rows {
            if !position.contains_key(row.supplier.as_str()) {
                position.insert(row.supplier.as_str(), suppliers.len());
                suppliers.push(row.supplier.clone());
            }
        }
        let names: BTreeSet<&str> = self.rows.iter().map(|r| r.sku_name.as_str()).collect();

        let rows = names
            .into_iter()
            .map(|name| {
                let mut offers: Vec<Option<&ComparisonRow>> = vec![None; suppliers.len()];
                for row in self.rows.iter().filter(|r| r.sku_name == name) {
                    let slot = &mut offers[position[row.supplier.as_str()]];
                    let replace = match *slot {
                        None => true,
                        Some(kept) => row.best_deal && !kept.best_deal,
                    };
                    if replace {
                        *slot = Some(row);
                    }
                }
                PivotRow {
                    sku_name: name.to_string(),
                    offers: offers.into_iter().map(|o| o.cloned()).collect(),
                    best_deal: self
                        .rows
                        .iter()
                        .find(|r| r.sku_name == name && r.best_deal)
                        .map(|r| r.supplier.clone()),
                }
            })
            .collect();

        PivotTable { suppliers, rows }
    }

    // ── CSV ──────────────────────────────────────────────────────────────

    /// Write the table as CSV (header row + one row per comparison row).
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), QuoteError> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(COLUMNS)?;
        for row in &self.rows {
            wtr.write_record(csv_record(row))?;
        }
        wtr.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String, QuoteError> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        String::from_utf8(buf).map_err(|e| QuoteError::Internal(format!("CSV is not UTF-8: {e}")))
    }

    /// Write the CSV export to `path`.
    ///
    /// Writes to a temp file next to `path` and persists it over `path`. On
    /// any failure the temp file is removed and `path` is left untouched.
    pub fn write_csv_file(&self, path: impl AsRef<Path>) -> Result<(), QuoteError> {
        let path = path.as_ref();
        let write_err = |source: std::io::Error| QuoteError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(write_err)?;

        let tmp = tempfile::Builder::new()
            .suffix(".csv.tmp")
            .tempfile_in(dir)
            .map_err(write_err)?;
        self.write_csv(std::io::BufWriter::new(tmp.as_file()))?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;

        info!("Wrote {} rows to {}", self.rows.len(), path.display());
        Ok(())
    }

    /// Read a table back from its CSV export.
    ///
    /// Columns are matched by header name, so reordered exports load too.
    pub fn read_csv<R: Read>(reader: R) -> Result<Self, QuoteError> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers = rdr.headers()?.clone();
        let positions: HashMap<&str, usize> = headers.iter().enumerate().map(|(i, h)| (h, i)).collect();

        let mut index = [0usize; COLUMNS.len()];
        for (slot, column) in index.iter_mut().zip(COLUMNS) {
            *slot = *positions
                .get(column)
                .ok_or_else(|| QuoteError::MissingCsvColumn {
                    column: column.to_string(),
                })?;
        }

        let mut rows = Vec::new();
        for (n, record) in rdr.records().enumerate() {
            let record = record?;
            let cell = |col: usize| CsvCell {
                row: n + 1,
                column: COLUMNS[col],
                value: record.get(index[col]).unwrap_or(""),
            };
            rows.push(ComparisonRow {
                supplier: cell(0).value.to_string(),
                sku_name: cell(1).value.to_string(),
                sku_code: cell(2).text(),
                batch_number: cell(3).text(),
                mrp: cell(4).optional()?,
                amount: cell(5).optional()?,
                paid_qty: cell(6).required()?,
                free_qty: cell(7).required()?,
                total_qty: cell(8).required()?,
                rate_per_qty: cell(9).optional()?,
                effective_rate: cell(10).optional()?,
                effective_discount_pct: cell(11).optional()?,
                comparison_rate: cell(12).optional()?,
                best_deal: cell(13).flag()?,
            });
        }
        Ok(Self { rows })
    }

    pub fn from_csv_str(csv: &str) -> Result<Self, QuoteError> {
        Self::read_csv(csv.as_bytes())
    }

    // ── Markdown ─────────────────────────────────────────────────────────

    /// Render as a GFM pipe table for the terminal. Money to 2 decimals.
    pub fn to_markdown(&self) -> String {
        let mut out = String::from(
            "| Supplier | SKU Name | SKU Code | Batch | MRP | Amount | Qty | Rate/Qty | Eff. Rate | Eff. Disc% | Cmp. Rate | Best Deal |\n\
             | :--- | :--- | :--- | :--- | ---: | ---: | ---: | ---: | ---: | ---: | ---: | :---: |\n",
        );
        for row in &self.rows {
            let cells = [
                md_escape(&row.supplier),
                md_escape(&row.sku_name),
                row.sku_code.as_deref().map_or_else(|| NOT_AVAILABLE.to_string(), md_escape),
                row.batch_number.as_deref().map_or_else(|| NOT_AVAILABLE.to_string(), md_escape),
                money(row.mrp),
                or_na(row.amount),
                format!("{}+{}", row.paid_qty, row.free_qty),
                money(row.rate_per_qty),
                money(row.effective_rate),
                row.effective_discount_pct
                    .map_or_else(|| NOT_AVAILABLE.to_string(), |d| format!("{d:.2} %")),
                money(row.comparison_rate),
                if row.best_deal { "✓".to_string() } else { String::new() },
            ];
            out.push_str("| ");
            out.push_str(&cells.join(" | "));
            out.push_str(" |\n");
        }
        out
    }
}

impl PivotTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render as a GFM pipe table, one column per supplier and field.
    pub fn to_markdown(&self) -> String {
        let mut header = vec!["SKU Name".to_string()];
        let mut align = vec![":---"];
        for supplier in &self.suppliers {
            for field in PIVOT_FIELDS {
                header.push(format!("{} {field}", md_escape(supplier)));
                align.push("---:");
            }
        }
        header.push("Best Deal".to_string());
        align.push(":---");

        let mut out = format!("| {} |\n| {} |\n", header.join(" | "), align.join(" | "));
        for row in &self.rows {
            let mut cells = vec![md_escape(&row.sku_name)];
            for offer in &row.offers {
                match offer {
                    Some(o) => cells.extend([
                        money(o.mrp),
                        money(o.rate_per_qty),
                        money(o.effective_rate),
                        o.effective_discount_pct
                            .map_or_else(|| NOT_AVAILABLE.to_string(), |d| format!("{d:.2} %")),
                        format!("{}+{}", o.paid_qty, o.free_qty),
                        o.sku_code.as_deref().map_or_else(|| NOT_AVAILABLE.to_string(), md_escape),
                        o.batch_number.as_deref().map_or_else(|| NOT_AVAILABLE.to_string(), md_escape),
                    ]),
                    None => cells.extend(PIVOT_FIELDS.map(|_| NOT_QUOTED.to_string())),
                }
            }
            cells.push(row.best_deal.as_deref().map_or_else(|| NOT_QUOTED.to_string(), md_escape));
            out.push_str("| ");
            out.push_str(&cells.join(" | "));
            out.push_str(" |\n");
        }
        out
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn csv_record(row: &ComparisonRow) -> [String; COLUMNS.len()] {
    [
        row.supplier.clone(),
        row.sku_name.clone(),
        or_na(row.sku_code.as_ref()),
        or_na(row.batch_number.as_ref()),
        or_na(row.mrp),
        or_na(row.amount),
        row.paid_qty.to_string(),
        row.free_qty.to_string(),
        row.total_qty.to_string(),
        or_na(row.rate_per_qty),
        or_na(row.effective_rate),
        or_na(row.effective_discount_pct),
        or_na(row.comparison_rate),
        if row.best_deal { "yes" } else { "no" }.to_string(),
    ]
}

/// `f64` display is the shortest string that parses back to the same value,
/// which is what makes the CSV round trip exact.
fn or_na<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| v.to_string())
}

fn money(value: Option<f64>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| format!("{v:.2}"))
}

fn md_escape(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

struct CsvCell<'a> {
    row: usize,
    column: &'static str,
    value: &'a str,
}

impl CsvCell<'_> {
    fn invalid(&self) -> QuoteError {
        QuoteError::InvalidCsvValue {
            row: self.row,
            column: self.column.to_string(),
            value: self.value.to_string(),
        }
    }

    fn text(&self) -> Option<String> {
        (self.value != NOT_AVAILABLE).then(|| self.value.to_string())
    }

    fn optional<T: std::str::FromStr>(&self) -> Result<Option<T>, QuoteError> {
        if self.value == NOT_AVAILABLE {
            return Ok(None);
        }
        self.value.parse().map(Some).map_err(|_| self.invalid())
    }

    fn required<T: std::str::FromStr>(&self) -> Result<T, QuoteError> {
        self.value.parse().map_err(|_| self.invalid())
    }

    fn flag(&self) -> Result<bool, QuoteError> {
        match self.value {
            "yes" => Ok(true),
            "no" => Ok(false),
            _ => Err(self.invalid()),
        }
    }
}
