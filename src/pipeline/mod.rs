//! Extraction stages, one transformation each.
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ llm ──▶ parse
//! (URL/path)  (pdfium)  (base64)  (chat)   (JSON → RawItem)
//! ```
//!
//! 1. [`input`]  — resolve a path or URL to a local, magic-checked PDF
//! 2. [`render`] — rasterise the selected pages in `spawn_blocking`
//! 3. [`encode`] — PNG + base64 for the multimodal request
//! 4. [`llm`]    — one chat call per document, with retry/backoff
//! 5. [`parse`]  — pull the record array out of the model's answer

pub mod encode;
pub mod input;
pub mod llm;
pub mod parse;
pub mod render;
