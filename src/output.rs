//! Result types returned by the extraction entry points.

use crate::item::RawItem;
use serde::{Deserialize, Serialize};

/// Everything one extraction run produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// Raw records of every document, in input order (document order, then
    /// the order the model listed them).
    pub items: Vec<RawItem>,
    /// Per-document details, in input order.
    pub documents: Vec<DocumentExtraction>,
    pub stats: ExtractionStats,
}

/// Extraction details for a single quotation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentExtraction {
    /// File name or last URL segment.
    pub label: String,
    /// Path or URL as supplied by the caller.
    pub source: String,
    pub metadata: DocumentMetadata,
    /// Pages actually sent to the model.
    pub pages_sent: usize,
    pub item_count: usize,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub retries: u32,
    /// Time spent in the model call, retries included.
    pub llm_duration_ms: u64,
    pub duration_ms: u64,
}

/// Document info read by pdfium without rendering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

/// Aggregate numbers for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub documents: usize,
    pub pages_sent: usize,
    pub items: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
    /// Wall time spent rasterising, summed over documents.
    pub render_duration_ms: u64,
    /// Time spent in model calls, summed over documents.
    pub llm_duration_ms: u64,
}

impl ExtractionStats {
    /// Sum the per-document figures.
    pub fn from_documents(documents: &[DocumentExtraction]) -> Self {
        Self {
            documents: documents.len(),
            pages_sent: documents.iter().map(|d| d.pages_sent).sum(),
            items: documents.iter().map(|d| d.item_count).sum(),
            total_input_tokens: documents.iter().map(|d| d.input_tokens as u64).sum(),
            total_output_tokens: documents.iter().map(|d| d.output_tokens as u64).sum(),
            llm_duration_ms: documents.iter().map(|d| d.llm_duration_ms).sum(),
            ..Default::default()
        }
    }
}
