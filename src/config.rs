//! Configuration for quotation extraction.
//!
//! Every extraction knob lives in [`ExtractionConfig`], built through
//! [`ExtractionConfigBuilder`]. The comparison stage (normaliser, selector,
//! table) has no configuration.

use crate::error::QuoteError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configuration for extracting line items from quotation PDFs.
///
/// # Example
/// ```rust
/// use edgequake_quotecmp::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .dpi(200)
///     .concurrency(4)
///     .model("gemini-2.0-flash")
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 200);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Rendering DPI for each page. Range: 72–400. Default: 150.
    ///
    /// Quotations are dense tables in small print; raise to 200 if the model
    /// misreads digits.
    pub dpi: u32,

    /// Cap on the longest edge of a rendered page, in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Documents extracted at the same time. Default: 4.
    pub concurrency: usize,

    /// Model identifier, e.g. "gemini-2.0-flash", "gpt-4.1-mini".
    /// If None, the provider's default is used.
    pub model: Option<String>,

    /// Provider name (e.g. "gemini", "openai", "anthropic").
    pub provider_name: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0, extraction must be literal.
    pub temperature: f32,

    /// Output token limit per document. Default: 8192.
    ///
    /// A multi-page quotation can list a few hundred SKUs; each costs roughly
    /// 60 output tokens as JSON.
    pub max_tokens: usize,

    /// Retries after a failed extraction call. Default: 3.
    pub max_retries: u32,

    /// First retry delay in milliseconds, doubled on each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// User password for encrypted PDFs.
    pub password: Option<String>,

    /// Replaces the built-in extraction prompt.
    pub system_prompt: Option<String>,

    /// Pages to send from each document. Default: all.
    pub pages: PageSelection,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-call timeout for the extraction request in seconds. Default: 180.
    pub api_timeout_secs: u64,

    /// Receives document-level progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            dpi: 150,
            max_rendered_pixels: 2000,
            concurrency: 4,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 8192,
            max_retries: 3,
            retry_backoff_ms: 500,
            password: None,
            system_prompt: None,
            pages: PageSelection::default(),
            download_timeout_secs: 120,
            api_timeout_secs: 180,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("custom_prompt", &self.system_prompt.is_some())
            .field("pages", &self.pages)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl ExtractionConfig {
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Delay before retry `attempt` (1-based): `retry_backoff_ms × 2^(attempt-1)`.
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let shift = attempt.saturating_sub(1).min(16);
        self.retry_backoff_ms.saturating_mul(1u64 << shift)
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, QuoteError> {
        let c = &self.config;
        if !(72..=400).contains(&c.dpi) {
            return Err(QuoteError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.concurrency == 0 {
            return Err(QuoteError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.max_tokens == 0 {
            return Err(QuoteError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 || c.download_timeout_secs == 0 {
            return Err(QuoteError::InvalidConfig("Timeouts must be ≥ 1 second".into()));
        }
        Ok(self.config)
    }
}

// ── Page selection ───────────────────────────────────────────────────────

/// Which pages of each quotation to send for extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    #[default]
    All,
    /// 1-indexed.
    Single(usize),
    /// 1-indexed, inclusive.
    Range(usize, usize),
    /// 1-indexed, deduplicated.
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into sorted, deduplicated 0-indexed page numbers.
    /// Pages beyond `total_pages` are dropped.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => (1..=total_pages)
                .contains(p)
                .then(|| vec![p - 1])
                .unwrap_or_default(),
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

impl std::str::FromStr for PageSelection {
    type Err = QuoteError;

    /// Parse `"all"`, `"3"`, `"2-5"` or `"1,3,7"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let bad = || QuoteError::InvalidConfig(format!("Invalid page selection '{s}'"));
        let page = |p: &str| p.trim().parse::<usize>().ok().filter(|&n| n >= 1);

        if s.eq_ignore_ascii_case("all") || s.is_empty() {
            return Ok(PageSelection::All);
        }
        if s.contains(',') {
            let pages = s.split(',').map(page).collect::<Option<Vec<_>>>().ok_or_else(bad)?;
            return Ok(PageSelection::Set(pages));
        }
        if let Some((a, b)) = s.split_once('-') {
            let (a, b) = (page(a).ok_or_else(bad)?, page(b).ok_or_else(bad)?);
            if a > b {
                return Err(bad());
            }
            return Ok(PageSelection::Range(a, b));
        }
        page(s).map(PageSelection::Single).ok_or_else(bad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = ExtractionConfig::builder().build().unwrap();
        assert_eq!(config.dpi, 150);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.temperature, 0.0);
        assert!(config.provider.is_none());
    }

    #[test]
    fn rejects_out_of_range_dpi_and_zero_concurrency() {
        let err = ExtractionConfig::builder().dpi(30).build().unwrap_err();
        assert!(matches!(err, QuoteError::InvalidConfig(_)));
        let err = ExtractionConfig::builder().concurrency(0).build().unwrap_err();
        assert!(err.to_string().contains("Concurrency"));
    }

    #[test]
    fn backoff_doubles() {
        let config = ExtractionConfig::builder().retry_backoff_ms(500).build().unwrap();
        assert_eq!(config.backoff_ms(1), 500);
        assert_eq!(config.backoff_ms(2), 1000);
        assert_eq!(config.backoff_ms(3), 2000);
    }

    #[test]
    fn debug_redacts_password() {
        let config = ExtractionConfig::builder().password("hunter2").build().unwrap();
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn page_selection_indices() {
        assert_eq!(PageSelection::All.to_indices(3), vec![0, 1, 2]);
        assert_eq!(PageSelection::Single(2).to_indices(3), vec![1]);
        assert!(PageSelection::Single(9).to_indices(3).is_empty());
        assert_eq!(PageSelection::Range(2, 10).to_indices(4), vec![1, 2, 3]);
        assert_eq!(PageSelection::Set(vec![3, 1, 3, 8]).to_indices(4), vec![0, 2]);
    }

    #[test]
    fn page_selection_parses() {
        assert_eq!("all".parse::<PageSelection>().unwrap(), PageSelection::All);
        assert_eq!("4".parse::<PageSelection>().unwrap(), PageSelection::Single(4));
        assert_eq!("2-5".parse::<PageSelection>().unwrap(), PageSelection::Range(2, 5));
        assert_eq!("1, 3,7".parse::<PageSelection>().unwrap(), PageSelection::Set(vec![1, 3, 7]));
        assert!("5-2".parse::<PageSelection>().is_err());
        assert!("0".parse::<PageSelection>().is_err());
        assert!("x".parse::<PageSelection>().is_err());
    }
}
