//! The extraction call: one chat request per quotation document.
//!
//! A request carries the extraction prompt as the system turn and every
//! selected page image of the document in a single user turn, so the model
//! sees line items that continue across pages.
//!
//! Failed calls (transport errors, provider errors, timeouts) are retried
//! with exponential backoff: `retry_backoff_ms × 2^(attempt-1)`. A response
//! that arrives but does not parse is not retried here; see
//! [`crate::pipeline::parse`].

use crate::config::ExtractionConfig;
use crate::error::QuoteError;
use crate::prompts::{document_instruction, EXTRACTION_SYSTEM_PROMPT};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Raw model answer for one document.
#[derive(Debug, Clone)]
pub struct DocumentResponse {
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Retries needed before the call succeeded.
    pub retries: u32,
    pub duration_ms: u64,
}

/// Send the page images of one document and return the model's answer.
///
/// # Errors
/// [`QuoteError::ExtractionFailed`] once every retry has failed.
pub async fn extract_document(
    provider: &Arc<dyn LLMProvider>,
    label: &str,
    images: Vec<ImageData>,
    config: &ExtractionConfig,
) -> Result<DocumentResponse, QuoteError> {
    let start = Instant::now();
    let messages = build_messages(label, images, config);
    let options = build_options(config);
    let call_timeout = Duration::from_secs(config.api_timeout_secs);

    let mut last_err = String::from("no attempt made");

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.backoff_ms(attempt);
            warn!(
                document = label,
                "Retry {}/{} after {}ms", attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match timeout(call_timeout, provider.chat(&messages, Some(&options))).await {
            Ok(Ok(response)) => {
                let duration = start.elapsed();
                debug!(
                    document = label,
                    input_tokens = response.prompt_tokens,
                    output_tokens = response.completion_tokens,
                    "Extraction call finished in {:?}",
                    duration
                );
                return Ok(DocumentResponse {
                    content: response.content,
                    input_tokens: response.prompt_tokens,
                    output_tokens: response.completion_tokens,
                    retries: attempt,
                    duration_ms: duration.as_millis() as u64,
                });
            }
            Ok(Err(e)) => last_err = e.to_string(),
            Err(_) => last_err = format!("no response within {}s", config.api_timeout_secs),
        }
        warn!(document = label, "Attempt {} failed: {}", attempt + 1, last_err);
    }

    Err(QuoteError::ExtractionFailed {
        document: label.to_string(),
        retries: config.max_retries,
        detail: last_err,
    })
}

fn build_messages(label: &str, images: Vec<ImageData>, config: &ExtractionConfig) -> Vec<ChatMessage> {
    let system_prompt = config
        .system_prompt
        .as_deref()
        .unwrap_or(EXTRACTION_SYSTEM_PROMPT);
    let instruction = document_instruction(label, images.len());
    vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user_with_images(instruction, images),
    ]
}

fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_follow_config() {
        let config = ExtractionConfig::builder()
            .temperature(0.2)
            .max_tokens(2048)
            .build()
            .unwrap();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(2048));
    }

    #[test]
    fn one_system_and_one_user_turn() {
        let config = ExtractionConfig::default();
        let images = vec![
            ImageData::new("AAAA".to_string(), "image/png"),
            ImageData::new("BBBB".to_string(), "image/png"),
        ];
        let messages = build_messages("narsingh.pdf", images, &config);
        assert_eq!(messages.len(), 2);
    }
}
