//! Extraction entry points: quotation PDFs → raw line items.
//!
//! Each document goes through `input → render → encode → llm → parse`.
//! Documents run concurrently (bounded by `config.concurrency`), and the
//! records are put back into input order before they are returned, so the
//! comparison that follows is deterministic.
//!
//! Any failing document fails the whole extraction; partial results are
//! never returned.

use crate::config::ExtractionConfig;
use crate::error::QuoteError;
use crate::item::RawItem;
use crate::output::{DocumentExtraction, ExtractionOutput, ExtractionStats};
use crate::pipeline::{encode, input, llm, parse, render};
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Model used when only `GEMINI_API_KEY` is available.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Extract line items from quotation PDFs given as paths or http(s) URLs.
///
/// # Errors
/// [`QuoteError::NoInput`] for an empty list, otherwise the first fatal
/// error of any document (missing file, bad PDF, provider or model failure,
/// unparsable answer).
///
/// # Example
/// ```rust,no_run
/// use edgequake_quotecmp::{extract, ComparisonSession, ExtractionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ExtractionConfig::default();
/// let output = extract(&["narsingh.pdf", "medivision.pdf"], &config).await?;
/// let session = ComparisonSession::from_raw(&output.items);
/// println!("{}", session.table().to_markdown());
/// # Ok(())
/// # }
/// ```
pub async fn extract<S: AsRef<str>>(
    inputs: &[S],
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, QuoteError> {
    let sources = inputs
        .iter()
        .map(|s| {
            let source = s.as_ref().to_string();
            Source {
                label: input::document_label(&source),
                location: Location::Input(source),
            }
        })
        .collect();
    run(sources, config).await
}

/// Extract from in-memory PDFs, given as `(label, bytes)` pairs.
///
/// Each document is written to a managed temp file that is removed when
/// this function returns.
pub async fn extract_from_bytes<L, B>(
    documents: &[(L, B)],
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, QuoteError>
where
    L: AsRef<str>,
    B: AsRef<[u8]>,
{
    let mut temp_files = Vec::with_capacity(documents.len());
    let mut sources = Vec::with_capacity(documents.len());

    for (label, bytes) in documents {
        let label = label.as_ref().to_string();
        input::check_magic(bytes.as_ref(), Path::new(&label))?;

        let mut tmp = tempfile::Builder::new()
            .suffix(".pdf")
            .tempfile()
            .map_err(|e| QuoteError::Internal(format!("tempfile: {e}")))?;
        tmp.write_all(bytes.as_ref())
            .map_err(|e| QuoteError::Internal(format!("tempfile write: {e}")))?;

        sources.push(Source {
            label,
            location: Location::Local(tmp.path().to_path_buf()),
        });
        temp_files.push(tmp);
    }

    let output = run(sources, config).await;
    drop(temp_files);
    output
}

/// Blocking wrapper around [`extract`] for callers without a runtime.
pub fn extract_sync<S: AsRef<str>>(
    inputs: &[S],
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, QuoteError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| QuoteError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(extract(inputs, config))
}

// ── Orchestration ────────────────────────────────────────────────────────

struct Source {
    label: String,
    location: Location,
}

enum Location {
    /// Path or URL, still to be resolved.
    Input(String),
    /// A temp file we wrote ourselves.
    Local(PathBuf),
}

impl Location {
    fn describe(&self) -> String {
        match self {
            Location::Input(s) => s.clone(),
            Location::Local(p) => p.display().to_string(),
        }
    }
}

struct DocumentOutcome {
    index: usize,
    document: DocumentExtraction,
    items: Vec<RawItem>,
    render_ms: u64,
}

async fn run(sources: Vec<Source>, config: &ExtractionConfig) -> Result<ExtractionOutput, QuoteError> {
    if sources.is_empty() {
        return Err(QuoteError::NoInput);
    }
    let total_start = Instant::now();
    let total_documents = sources.len();
    info!("Starting extraction of {} documents", total_documents);

    let provider = resolve_provider(config).await?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_start(total_documents);
    }

    let mut outcomes: Vec<DocumentOutcome> = stream::iter(sources.iter().enumerate().map(|(index, source)| {
        let provider = Arc::clone(&provider);
        async move {
            let result = process_document(&provider, index, source, config).await;
            if let (Err(e), Some(cb)) = (&result, &config.progress_callback) {
                cb.on_document_error(index, &source.label, &e.to_string());
            }
            result
        }
    }))
    .buffer_unordered(config.concurrency)
    .try_collect()
    .await?;

    // Concurrency finishes documents in any order; comparison needs input order.
    outcomes.sort_by_key(|o| o.index);

    let render_duration_ms: u64 = outcomes.iter().map(|o| o.render_ms).sum();
    let mut items = Vec::new();
    let mut documents = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        items.extend(outcome.items);
        documents.push(outcome.document);
    }

    let stats = ExtractionStats {
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        render_duration_ms,
        ..ExtractionStats::from_documents(&documents)
    };

    info!(
        "Extraction complete: {} records from {} documents, {}ms total",
        items.len(),
        documents.len(),
        stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_complete(total_documents, items.len());
    }

    Ok(ExtractionOutput {
        items,
        documents,
        stats,
    })
}

async fn process_document(
    provider: &Arc<dyn LLMProvider>,
    index: usize,
    source: &Source,
    config: &ExtractionConfig,
) -> Result<DocumentOutcome, QuoteError> {
    let label = source.label.as_str();
    let start = Instant::now();

    // ── Step 1: Resolve input ────────────────────────────────────────────
    // Keeps a downloaded copy alive until this document is done.
    let resolved;
    let pdf_path = match &source.location {
        Location::Input(s) => {
            resolved = input::resolve_input(s, config.download_timeout_secs).await?;
            resolved.path().to_path_buf()
        }
        Location::Local(p) => p.clone(),
    };

    // ── Step 2: Page selection ───────────────────────────────────────────
    let metadata = render::extract_metadata(&pdf_path, config.password.as_deref()).await?;
    let page_indices = config.pages.to_indices(metadata.page_count);
    if page_indices.is_empty() {
        return Err(QuoteError::NoPagesSelected {
            path: pdf_path,
            total: metadata.page_count,
        });
    }
    debug!(document = label, "Selected {} of {} pages", page_indices.len(), metadata.page_count);

    // ── Step 3: Render + encode ──────────────────────────────────────────
    let render_start = Instant::now();
    let rendered = render::render_pages(&pdf_path, config, &page_indices).await?;
    let images = rendered
        .iter()
        .map(|(idx, img)| {
            encode::encode_page(img).map_err(|e| QuoteError::RasterisationFailed {
                path: pdf_path.clone(),
                page: idx + 1,
                detail: format!("Image encoding failed: {e}"),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let render_ms = render_start.elapsed().as_millis() as u64;
    let pages_sent = images.len();

    // ── Step 4: Model call ───────────────────────────────────────────────
    if let Some(ref cb) = config.progress_callback {
        cb.on_document_start(index, label, pages_sent);
    }
    let response = llm::extract_document(provider, label, images, config).await?;

    // ── Step 5: Parse ────────────────────────────────────────────────────
    let items = parse::parse_response(label, &response.content)?;
    info!(document = label, "Extracted {} records from {} pages", items.len(), pages_sent);

    if let Some(ref cb) = config.progress_callback {
        cb.on_document_complete(index, label, items.len());
    }

    Ok(DocumentOutcome {
        index,
        document: DocumentExtraction {
            label: label.to_string(),
            source: source.location.describe(),
            metadata,
            pages_sent,
            item_count: items.len(),
            input_tokens: response.input_tokens,
            output_tokens: response.output_tokens,
            retries: response.retries,
            llm_duration_ms: response.duration_ms,
            duration_ms: start.elapsed().as_millis() as u64,
        },
        items,
        render_ms,
    })
}

// ── Provider resolution ──────────────────────────────────────────────────

/// Default model for a named provider when none is configured.
fn default_model(provider_name: &str) -> &'static str {
    match provider_name {
        "gemini" | "google" | "vertexai" => DEFAULT_GEMINI_MODEL,
        "anthropic" => "claude-sonnet-4-20250514",
        _ => "gpt-4.1-mini",
    }
}

fn create_vision_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, QuoteError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        QuoteError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Pick the provider, from most to least specific:
///
/// 1. `config.provider`, used as-is
/// 2. `config.provider_name` with `config.model` (or that provider's default)
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set
/// 4. `GEMINI_API_KEY` → Gemini, `gemini-2.0-flash` unless a model is set
/// 5. whatever [`ProviderFactory::from_env`] detects
pub async fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, QuoteError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or_else(|| default_model(name));
        return create_vision_provider(name, model);
    }

    if let (Some(prov), Some(model)) = (
        non_empty_env("EDGEQUAKE_LLM_PROVIDER"),
        non_empty_env("EDGEQUAKE_MODEL"),
    ) {
        return create_vision_provider(&prov, &model);
    }

    if non_empty_env("GEMINI_API_KEY").is_some() {
        let model = config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
        return create_vision_provider("gemini", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| QuoteError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY or ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {e}"
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_input_is_an_error() {
        let config = ExtractionConfig::default();
        let err = extract::<&str>(&[], &config).await.unwrap_err();
        assert!(matches!(err, QuoteError::NoInput));
    }

    #[tokio::test]
    async fn bytes_without_pdf_magic_fail_before_any_call() {
        let config = ExtractionConfig::default();
        let docs = [("price-list.xlsx", b"PK\x03\x04".to_vec())];
        let err = extract_from_bytes(&docs, &config).await.unwrap_err();
        assert!(matches!(err, QuoteError::NotAPdf { .. }), "got {err}");
    }

    #[test]
    fn default_models() {
        assert_eq!(default_model("gemini"), DEFAULT_GEMINI_MODEL);
        assert_eq!(default_model("anthropic"), "claude-sonnet-4-20250514");
        assert_eq!(default_model("openai"), "gpt-4.1-mini");
    }

    #[test]
    fn location_describes_source() {
        assert_eq!(Location::Input("https://x.io/q.pdf".into()).describe(), "https://x.io/q.pdf");
        assert_eq!(Location::Local(PathBuf::from("/tmp/q.pdf")).describe(), "/tmp/q.pdf");
    }
}
