//! Input resolution: turn a quotation path or URL into a local PDF file.
//!
//! pdfium opens files by path, so URL inputs are downloaded into a
//! [`TempDir`] that lives as long as the [`ResolvedInput`]. Both kinds are
//! checked for the `%PDF` magic bytes before anything else touches them.

use crate::error::QuoteError;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A quotation ready to be opened by pdfium.
#[derive(Debug)]
pub enum ResolvedInput {
    Local(PathBuf),
    /// Downloaded copy; removed when this value is dropped.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Short name for a document, used in logs and error messages: the file
/// name of a path, or the last segment of a URL.
pub fn document_label(input: &str) -> String {
    let trimmed = input.trim_end_matches('/');
    let name = if is_url(trimmed) {
        trimmed
            .split(['?', '#'])
            .next()
            .and_then(|p| p.rsplit('/').next())
    } else {
        Path::new(trimmed).file_name().and_then(|n| n.to_str())
    };
    match name {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => input.to_string(),
    }
}

/// Resolve a path or http(s) URL to a local, magic-checked PDF.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, QuoteError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, QuoteError> {
    let path = PathBuf::from(path_str);

    if !path.is_file() {
        return Err(QuoteError::FileNotFound { path });
    }

    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(QuoteError::PermissionDenied { path });
        }
        Err(_) => return Err(QuoteError::FileNotFound { path }),
    };

    let mut magic = [0u8; 4];
    let read = file.read(&mut magic).unwrap_or(0);
    check_magic(&magic[..read], &path)?;

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Fail with `NotAPdf` unless `bytes` starts with `%PDF`.
pub fn check_magic(bytes: &[u8], path: &Path) -> Result<(), QuoteError> {
    if bytes.starts_with(PDF_MAGIC) {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    Err(QuoteError::NotAPdf {
        path: path.to_path_buf(),
        magic,
    })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, QuoteError> {
    info!("Downloading quotation from: {}", url);

    let failed = |reason: String| QuoteError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            QuoteError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;

    let temp_dir = TempDir::new().map_err(|e| QuoteError::Internal(e.to_string()))?;
    let mut filename = document_label(url);
    if !filename.to_ascii_lowercase().ends_with(".pdf") {
        filename = "downloaded.pdf".to_string();
    }
    let file_path = temp_dir.path().join(filename);

    check_magic(&bytes, &file_path)?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| QuoteError::Internal(format!("Failed to write temp file: {e}")))?;

    info!("Downloaded {} bytes to {}", bytes.len(), file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn detects_urls() {
        assert!(is_url("https://example.com/q.pdf"));
        assert!(is_url("http://example.com/q.pdf"));
        assert!(!is_url("/tmp/q.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn labels() {
        assert_eq!(document_label("/data/quotes/narsingh.pdf"), "narsingh.pdf");
        assert_eq!(document_label("https://x.io/a/medivision.pdf?sig=1"), "medivision.pdf");
        assert_eq!(document_label("q.pdf"), "q.pdf");
    }

    #[test]
    fn missing_file() {
        let err = resolve_local("/definitely/not/here.pdf").unwrap_err();
        assert!(matches!(err, QuoteError::FileNotFound { .. }));
    }

    #[test]
    fn rejects_non_pdf() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"PK\x03\x04zip").unwrap();
        let err = resolve_local(f.path().to_str().unwrap()).unwrap_err();
        match err {
            QuoteError::NotAPdf { magic, .. } => assert_eq!(&magic, b"PK\x03\x04"),
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn accepts_pdf_magic() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%PDF-1.7\n").unwrap();
        let resolved = resolve_local(f.path().to_str().unwrap()).unwrap();
        assert_eq!(resolved.path(), f.path());
        assert!(format!("{resolved:?}").starts_with("Local("));
    }

    #[test]
    fn empty_file_is_not_a_pdf() {
        let f = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            resolve_local(f.path().to_str().unwrap()),
            Err(QuoteError::NotAPdf { .. })
        ));
    }
}
