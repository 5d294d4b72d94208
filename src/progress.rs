//! Progress events for document extraction.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`]. Documents
//! are extracted concurrently, so events for different documents interleave
//! and may arrive from different threads.
//!
//! # Example
//!
//! ```rust
//! use edgequake_quotecmp::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::Arc;
//!
//! struct Log;
//!
//! impl ExtractionProgressCallback for Log {
//!     fn on_document_complete(&self, index: usize, label: &str, items: usize) {
//!         eprintln!("#{index} {label}: {items} line items");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(Log))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Receives extraction events. Every method defaults to a no-op.
///
/// `index` is the 0-based position of the document in the input list.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once, before any document is opened.
    fn on_extraction_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called after the document's pages are rendered, before the model call.
    fn on_document_start(&self, index: usize, label: &str, pages: usize) {
        let _ = (index, label, pages);
    }

    /// Called when the model's answer for a document has been parsed.
    fn on_document_complete(&self, index: usize, label: &str, items: usize) {
        let _ = (index, label, items);
    }

    /// Called when a document fails. The whole extraction fails with it.
    fn on_document_error(&self, index: usize, label: &str, error: &str) {
        let _ = (index, label, error);
    }

    /// Called once after every document succeeded.
    fn on_extraction_complete(&self, total_documents: usize, total_items: usize) {
        let _ = (total_documents, total_items);
    }
}

pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// The type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
