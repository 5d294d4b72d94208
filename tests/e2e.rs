//! End-to-end tests: real quotation PDFs and live model calls.
//!
//! Gated behind `E2E_ENABLED` and the presence of the PDFs in
//! `./test_cases/quotations/`, so they never run in CI by accident.
//!
//! Run with:
//!   E2E_ENABLED=1 GEMINI_API_KEY=... cargo test --test e2e -- --nocapture

use edgequake_quotecmp::{
    extract, extract_from_bytes, ComparisonSession, ComparisonTable, ExtractionConfig,
    ExtractionProgressCallback, PageSelection, QuoteError,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn quotations_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/quotations")
}

/// Route library logs through the test harness (`RUST_LOG=debug` for detail).
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

fn output_dir() -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/output");
    std::fs::create_dir_all(&d).ok();
    d
}

/// Skip unless E2E_ENABLED is set and at least one quotation PDF exists.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        init_tracing();
        let mut pdfs: Vec<String> = std::fs::read_dir(quotations_dir())
            .map(|rd| {
                rd.filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| p.extension().is_some_and(|x| x.eq_ignore_ascii_case("pdf")))
                    .map(|p| p.to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default();
        if pdfs.is_empty() {
            println!("SKIP — no PDFs in {}", quotations_dir().display());
            return;
        }
        pdfs.sort();
        pdfs
    }};
}

#[derive(Default)]
struct Counter {
    completed: AtomicUsize,
    errors: AtomicUsize,
}

impl ExtractionProgressCallback for Counter {
    fn on_document_complete(&self, _index: usize, _label: &str, _items: usize) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_document_error(&self, _index: usize, _label: &str, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Live extraction ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_extract_and_compare_all_quotations() {
    let pdfs = e2e_skip_unless_ready!();

    let counter = Arc::new(Counter::default());
    let config = ExtractionConfig::builder()
        .progress_callback(counter.clone())
        .build()
        .unwrap();

    let output = extract(&pdfs, &config).await.expect("extraction should succeed");

    assert_eq!(output.documents.len(), pdfs.len());
    assert_eq!(counter.completed.load(Ordering::SeqCst), pdfs.len());
    assert_eq!(counter.errors.load(Ordering::SeqCst), 0);
    assert!(!output.items.is_empty(), "no line items extracted");
    assert!(output.stats.total_input_tokens > 0);
    for (doc, path) in output.documents.iter().zip(&pdfs) {
        assert_eq!(&doc.source, path, "documents must stay in input order");
    }

    let session = ComparisonSession::from_raw(&output.items);
    let table = session.table();
    println!("{}", table.to_markdown());

    for name in session.sku_names() {
        let flagged = table
            .rows
            .iter()
            .filter(|r| r.sku_name == name && r.best_deal)
            .count();
        assert!(flagged <= 1, "{name}: {flagged} best deals");
    }

    let csv_path = output_dir().join("sku_comparison_report.csv");
    table.write_csv_file(&csv_path).unwrap();
    let back = ComparisonTable::read_csv(std::fs::File::open(&csv_path).unwrap()).unwrap();
    assert_eq!(back, table);
}

#[tokio::test]
async fn test_first_page_only_from_bytes() {
    let pdfs = e2e_skip_unless_ready!();

    let bytes = std::fs::read(&pdfs[0]).unwrap();
    let config = ExtractionConfig::builder()
        .pages(PageSelection::Single(1))
        .build()
        .unwrap();

    let output = extract_from_bytes(&[("first.pdf", bytes)], &config)
        .await
        .expect("extraction should succeed");
    assert_eq!(output.documents[0].pages_sent, 1);
    assert_eq!(output.documents[0].label, "first.pdf");
}

#[tokio::test]
async fn test_page_selection_past_end_fails() {
    let pdfs = e2e_skip_unless_ready!();

    let config = ExtractionConfig::builder()
        .pages(PageSelection::Single(10_000))
        .build()
        .unwrap();
    let err = extract(&pdfs[..1], &config).await.unwrap_err();
    assert!(matches!(err, QuoteError::NoPagesSelected { .. }), "got {err}");
}

#[tokio::test]
async fn test_missing_file_fails_whole_extraction() {
    let mut pdfs = e2e_skip_unless_ready!();
    pdfs.push("/definitely/not/here.pdf".to_string());

    let config = ExtractionConfig::default();
    let err = extract(&pdfs, &config).await.unwrap_err();
    assert!(matches!(err, QuoteError::FileNotFound { .. }), "got {err}");
}
