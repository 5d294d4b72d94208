//! Error types for the edgequake-quotecmp library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`QuoteError`] — **Fatal**: the extraction or export cannot proceed at
//!   all (bad input file, provider not configured, the model answered with
//!   something that is not JSON). Returned as `Err(QuoteError)` from the
//!   top-level `extract*` functions and from the CSV helpers.
//!
//! * [`Rejection`] — **Non-fatal**: a single extracted record failed
//!   validation (missing or negative quantities). The record is skipped and
//!   logged; every other record is still compared.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-quotecmp library.
///
/// Record-level validation failures use [`Rejection`] and are collected in
/// [`crate::normalize::NormalizeReport`] rather than propagated here.
#[derive(Debug, Error)]
pub enum QuoteError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// No documents were supplied.
    #[error("No quotation documents were supplied")]
    NoInput,

    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The page selection matched no page of the document.
    #[error("No selected page exists in '{path}' (document has {total} pages)")]
    NoPagesSelected { path: PathBuf, total: usize },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page} of '{path}': {detail}")]
    RasterisationFailed {
        path: PathBuf,
        page: usize,
        detail: String,
    },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The extraction call for a document failed after all retries.
    #[error("Extraction failed for '{document}' after {retries} retries: {detail}")]
    ExtractionFailed {
        document: String,
        retries: u32,
        detail: String,
    },

    /// The model answered, but not with the JSON shape we asked for.
    #[error("Malformed extraction response for '{document}': {detail}")]
    MalformedResponse { document: String, detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write an output file (CSV export, raw JSON dump).
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV encoding or decoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A CSV export is missing one of the comparison columns.
    #[error("CSV header is missing column '{column}'")]
    MissingCsvColumn { column: String },

    /// A CSV cell could not be mapped back onto a comparison row.
    #[error("Invalid CSV value in row {row}, column '{column}': '{value}'")]
    InvalidCsvValue {
        row: usize,
        column: String,
        value: String,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium for your platform, or set PDFIUM_LIB_PATH=/path/to/libpdfium."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a raw record was not turned into a processed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Paid or free quantity absent, or not an integer.
    MissingQuantity,
    /// Paid or free quantity below zero.
    NegativeQuantity,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::MissingQuantity => "missing quantity fields",
            RejectReason::NegativeQuantity => "negative quantity",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-fatal validation failure for one extracted record.
///
/// Carries enough context to diagnose extraction quality: who quoted it,
/// which product, and the raw quantity values the model produced.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("skipped '{sku_name}' from '{supplier}': {reason} (paid_qty={paid_qty}, free_qty={free_qty})")]
pub struct Rejection {
    pub supplier: String,
    pub sku_name: String,
    pub reason: RejectReason,
    /// Raw `paid_qty` as extracted, rendered as JSON (`null` when absent).
    pub paid_qty: String,
    /// Raw `free_qty` as extracted, rendered as JSON (`null` when absent).
    pub free_qty: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_reason_strings() {
        assert_eq!(
            RejectReason::MissingQuantity.to_string(),
            "missing quantity fields"
        );
        assert_eq!(RejectReason::NegativeQuantity.to_string(), "negative quantity");
    }

    #[test]
    fn rejection_display_carries_context() {
        let r = Rejection {
            supplier: "MEDIVISION".into(),
            sku_name: "ATORVA 20MG TAB".into(),
            reason: RejectReason::NegativeQuantity,
            paid_qty: "-3".into(),
            free_qty: "0".into(),
        };
        let msg = r.to_string();
        assert!(msg.contains("MEDIVISION"), "got: {msg}");
        assert!(msg.contains("ATORVA 20MG TAB"));
        assert!(msg.contains("negative quantity"));
        assert!(msg.contains("paid_qty=-3"));
    }

    #[test]
    fn extraction_failed_display() {
        let e = QuoteError::ExtractionFailed {
            document: "narsingh.pdf".into(),
            retries: 3,
            detail: "HTTP 503".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("narsingh.pdf"));
        assert!(msg.contains("3 retries"));
        assert!(msg.contains("HTTP 503"));
    }

    #[test]
    fn invalid_csv_value_display() {
        let e = QuoteError::InvalidCsvValue {
            row: 2,
            column: "paid_qty".into(),
            value: "ten".into(),
        };
        assert!(e.to_string().contains("row 2"));
        assert!(e.to_string().contains("paid_qty"));
    }
}
