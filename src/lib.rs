//! # edgequake-quotecmp
//!
//! Compare supplier quotations: extract line items from quotation PDFs with
//! a vision model, validate them, and flag the cheapest offer per product.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDFs
//!  │
//!  ├─ 1. Extract    render pages, one model call per document  (extract)
//!  ├─ 2. Normalise  RawItem → ProcessedItem or Rejection       (normalize)
//!  ├─ 3. Select     lowest rate per quantity per SKU name      (select)
//!  └─ 4. Table      filter, Markdown, CSV export / re-import   (table)
//! ```
//!
//! Steps 2–4 are synchronous and pure. [`ComparisonSession`] bundles them
//! with the user's SKU selection.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_quotecmp::{extract, ComparisonSession, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / ...
//!     let config = ExtractionConfig::default();
//!     let output = extract(&["narsingh.pdf", "medivision.pdf"], &config).await?;
//!
//!     let session = ComparisonSession::from_raw(&output.items);
//!     let table = session.table();
//!     println!("{}", table.to_markdown());
//!     table.write_csv_file("sku_comparison_report.csv")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Without a model
//!
//! Raw records can come from anywhere that produces the same JSON:
//!
//! ```rust
//! use edgequake_quotecmp::{ComparisonSession, RawItem};
//!
//! let raw = vec![
//!     RawItem::new("S1", "A").with_amount(100).with_quantities(10, 0),
//!     RawItem::new("S2", "A").with_amount(45).with_quantities(9, 1),
//! ];
//! let session = ComparisonSession::from_raw(&raw);
//! let best = session.table().best_deals();
//! assert_eq!(best[0].supplier, "S2");
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `quotecmp` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod item;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod select;
pub mod session;
pub mod table;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, PageSelection};
pub use error::{QuoteError, RejectReason, Rejection};
pub use extract::{extract, extract_from_bytes, extract_sync, resolve_provider};
pub use item::{LegacyMetrics, ProcessedItem, RawItem};
pub use normalize::{normalize_all, normalize_item, NormalizeReport, RejectedRecord};
pub use output::{DocumentExtraction, DocumentMetadata, ExtractionOutput, ExtractionStats};
pub use pipeline::parse::parse_response;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use select::{mark_best_deals, select_best_deals};
pub use session::ComparisonSession;
pub use table::{
    build_table, supplier_sku_counts, BestDeal, ComparisonRow, ComparisonTable, PivotRow, PivotTable,
};
