//! CLI binary for edgequake-quotecmp.
//!
//! Maps flags onto `ExtractionConfig`, runs the extraction (or loads a saved
//! one), and prints the comparison.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_quotecmp::{
    extract, parse_response, ComparisonSession, ComparisonTable, ExtractionConfig,
    ExtractionProgressCallback, PageSelection, PivotTable, ProgressCallback, RawItem,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar over documents; documents finish out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Resolving provider…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map_or(0.0, |t| t.elapsed().as_secs_f64())
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_documents: usize) {
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>2}/{len} documents  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        self.bar.set_length(total_documents as u64);
        self.bar.set_prefix("Extracting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Reading {total_documents} quotations…"))
        ));
    }

    fn on_document_start(&self, index: usize, label: &str, pages: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(format!("{label} ({pages} pages)"));
    }

    fn on_document_complete(&self, index: usize, label: &str, items: usize) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} {:<32} {}  {}",
            green("✓"),
            label,
            dim(&format!("{items:>4} items")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, index: usize, label: &str, error: &str) {
        let secs = self.elapsed_secs(index);
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['…']).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {:<32} {}  {}",
            red("✗"),
            label,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.abandon();
    }

    fn on_extraction_complete(&self, total_documents: usize, total_items: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} line items from {} quotations",
            green("✔"),
            bold(&total_items.to_string()),
            total_documents
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Compare three quotations
  quotecmp narsingh.pdf medivision.pdf sdm.pdf

  # Only some products, and export CSV
  quotecmp *.pdf --sku "ATORVA 20MG TAB" --sku "JANUMET 50/500" --csv sku_comparison_report.csv

  # Keep the raw extraction, then re-run the comparison offline
  quotecmp *.pdf --save-raw raw.json
  quotecmp --raw-json raw.json --list-skus
  quotecmp --raw-json raw.json --json

  # Suppliers side by side, one row per product
  quotecmp --raw-json raw.json --pivot

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default model gemini-2.0-flash)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Provider override (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Model override
  PDFIUM_LIB_PATH         Path to libpdfium (or its directory)
"#;

/// Compare supplier quotations and find the best deal per product.
#[derive(Parser, Debug)]
#[command(
    name = "quotecmp",
    version,
    about = "Compare supplier quotation PDFs and flag the best deal per SKU",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Quotation PDFs: local paths or HTTP/HTTPS URLs.
    #[arg(required_unless_present = "raw_json", conflicts_with = "raw_json")]
    inputs: Vec<String>,

    /// Load previously extracted records instead of calling a model.
    #[arg(long, value_name = "FILE")]
    raw_json: Option<PathBuf>,

    /// Save the raw extracted records as JSON.
    #[arg(long, value_name = "FILE", env = "QUOTECMP_SAVE_RAW")]
    save_raw: Option<PathBuf>,

    /// Only show these SKU names (repeatable). Default: all.
    #[arg(long = "sku", value_name = "NAME")]
    skus: Vec<String>,

    /// Export the comparison table as CSV.
    #[arg(long, value_name = "FILE", env = "QUOTECMP_CSV")]
    csv: Option<PathBuf>,

    /// Print the comparison as JSON instead of a Markdown table.
    #[arg(long)]
    json: bool,

    /// One row per SKU with suppliers side by side, instead of one row per quote.
    #[arg(long, env = "QUOTECMP_PIVOT")]
    pivot: bool,

    /// Print the distinct SKU names and exit.
    #[arg(long)]
    list_skus: bool,

    /// Model ID (e.g. gemini-2.0-flash, gpt-4.1-mini).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Rendering DPI (72–400).
    #[arg(long, env = "QUOTECMP_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Documents extracted concurrently.
    #[arg(short, long, env = "QUOTECMP_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Pages per document: all, 5, 3-15, or 1,3,5.
    #[arg(long, env = "QUOTECMP_PAGES", default_value = "all")]
    pages: String,

    /// User password for encrypted PDFs.
    #[arg(long, env = "QUOTECMP_PASSWORD")]
    password: Option<String>,

    /// Text file with a replacement extraction prompt.
    #[arg(long, env = "QUOTECMP_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max output tokens per document.
    #[arg(long, env = "QUOTECMP_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "QUOTECMP_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Retries per document on a failed model call.
    #[arg(long, env = "QUOTECMP_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "QUOTECMP_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-document model call timeout in seconds.
    #[arg(long, env = "QUOTECMP_API_TIMEOUT", default_value_t = 180)]
    api_timeout: u64,

    /// Disable the progress bar.
    #[arg(long, env = "QUOTECMP_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level logs.
    #[arg(short, long, env = "QUOTECMP_VERBOSE")]
    verbose: bool,

    /// Suppress everything except errors and the result.
    #[arg(short, long, env = "QUOTECMP_QUIET")]
    quiet: bool,
}

/// `--json` output.
#[derive(Serialize)]
struct JsonReport<'a> {
    table: &'a ComparisonTable,
    #[serde(skip_serializing_if = "Option::is_none")]
    pivot: Option<PivotTable>,
    best_deals: Vec<edgequake_quotecmp::BestDeal>,
    supplier_sku_counts: BTreeMap<String, usize>,
    rejected: &'a [edgequake_quotecmp::RejectedRecord],
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && cli.raw_json.is_none();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Raw records ──────────────────────────────────────────────────────
    let raw_items = match cli.raw_json {
        Some(ref path) => load_raw(path).await?,
        None => {
            let progress_cb: Option<ProgressCallback> = if show_progress {
                Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
            } else {
                None
            };
            let config = build_config(&cli, progress_cb).await?;
            let output = extract(&cli.inputs, &config)
                .await
                .context("Extraction failed")?;
            if !cli.quiet {
                eprintln!(
                    "   {} tokens in  /  {} tokens out  —  {}ms total",
                    dim(&output.stats.total_input_tokens.to_string()),
                    dim(&output.stats.total_output_tokens.to_string()),
                    output.stats.total_duration_ms,
                );
            }
            output.items
        }
    };

    if let Some(ref path) = cli.save_raw {
        save_raw(path, &raw_items).await?;
        if !cli.quiet {
            eprintln!("{} raw records saved to {}", green("✔"), bold(&path.display().to_string()));
        }
    }

    // ── Comparison ───────────────────────────────────────────────────────
    let mut session = ComparisonSession::from_raw(&raw_items);

    if cli.list_skus {
        for name in session.sku_names() {
            println!("{name}");
        }
        return Ok(());
    }

    if !cli.skus.is_empty() {
        session.select(cli.skus.iter().cloned());
    }
    let table = session.table();

    if let Some(ref path) = cli.csv {
        let path = path.clone();
        let csv_table = table.clone();
        tokio::task::spawn_blocking(move || csv_table.write_csv_file(&path))
            .await
            .context("CSV export task failed")?
            .context("CSV export failed")?;
    }

    if cli.json {
        let report = JsonReport {
            table: &table,
            pivot: cli.pivot.then(|| table.pivot()),
            best_deals: table.best_deals(),
            supplier_sku_counts: session.supplier_sku_counts(),
            rejected: session.rejected(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else {
        print_report(&session, &table, cli.pivot);
    }

    if !cli.quiet {
        if !session.rejected().is_empty() {
            eprintln!(
                "{} {} records skipped (run with -v for details)",
                cyan("⚠"),
                session.rejected().len()
            );
        }
        if let Some(ref path) = cli.csv {
            eprintln!("{} CSV written to {}", green("✔"), bold(&path.display().to_string()));
        }
    }

    Ok(())
}

fn print_report(session: &ComparisonSession, table: &ComparisonTable, pivot: bool) {
    if table.is_empty() {
        println!("No line items to compare.");
        return;
    }
    if pivot {
        println!("{}", table.pivot().to_markdown());
    } else {
        println!("{}", table.to_markdown());
    }

    let deals = table.best_deals();
    if !deals.is_empty() {
        println!("## Best deals\n");
        for deal in &deals {
            println!(
                "- **{}**: {} ({}) at {:.2} per unit",
                deal.sku_name, deal.supplier, deal.qty, deal.rate_per_qty
            );
        }
        println!();
    }

    println!("## SKUs per supplier\n");
    for (supplier, count) in session.supplier_sku_counts() {
        println!("- {supplier}: {count}");
    }
}

async fn load_raw(path: &Path) -> Result<Vec<RawItem>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read raw records from {}", path.display()))?;
    parse_response(&path.display().to_string(), &text)
        .with_context(|| format!("{} does not hold extracted records", path.display()))
}

/// Same `{"sku_data": [...]}` shape the model returns, so `--raw-json` reads it back.
async fn save_raw(path: &Path, items: &[RawItem]) -> Result<()> {
    let json = serde_json::to_string_pretty(&serde_json::json!({ "sku_data": items }))
        .context("Failed to serialise raw records")?;
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, json)
        .await
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let pages: PageSelection = cli.pages.parse().context("Invalid --pages")?;

    let mut builder = ExtractionConfig::builder()
        .dpi(cli.dpi)
        .concurrency(cli.concurrency)
        .pages(pages)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {}", path.display()))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
