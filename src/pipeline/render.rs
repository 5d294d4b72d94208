//! PDF rasterisation: render the selected pages of a quotation via pdfium.
//!
//! pdfium is blocking and keeps thread-local state, so every call here runs
//! inside `tokio::task::spawn_blocking`. Page size follows the configured
//! DPI, with the longest edge capped at `max_rendered_pixels`.

use crate::config::ExtractionConfig;
use crate::error::QuoteError;
use crate::output::DocumentMetadata;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bind to pdfium: `PDFIUM_LIB_PATH` (a file or the directory holding it)
/// first, then the system library.
pub fn bind_pdfium() -> Result<Pdfium, QuoteError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(custom) if !custom.is_empty() => {
            let custom = PathBuf::from(custom);
            let lib = if custom.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&custom)
            } else {
                custom
            };
            debug!("Binding pdfium from {}", lib.display());
            Pdfium::bind_to_library(&lib)
        }
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| QuoteError::PdfiumBindingFailed(format!("{e:?}")))?;

    Ok(Pdfium::new(bindings))
}

fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, QuoteError> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let detail = format!("{e:?}");
        if detail.to_ascii_lowercase().contains("password") {
            if password.is_some() {
                QuoteError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                QuoteError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            QuoteError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail,
            }
        }
    })
}

/// Pixel size for a page of `width_pt × height_pt` points at `dpi`, longest
/// edge capped at `max_pixels`.
pub fn target_size(width_pt: f32, height_pt: f32, dpi: u32, max_pixels: u32) -> (i32, i32) {
    let scale = dpi as f32 / 72.0;
    let (mut w, mut h) = (width_pt * scale, height_pt * scale);
    let longest = w.max(h);
    if longest > max_pixels as f32 {
        let shrink = max_pixels as f32 / longest;
        w *= shrink;
        h *= shrink;
    }
    ((w.round() as i32).max(1), (h.round() as i32).max(1))
}

/// Rasterise the given 0-indexed pages.
///
/// Returns `(page_index, image)` pairs in the order requested.
pub async fn render_pages(
    pdf_path: &Path,
    config: &ExtractionConfig,
    page_indices: &[usize],
) -> Result<Vec<(usize, DynamicImage)>, QuoteError> {
    let path = pdf_path.to_path_buf();
    let dpi = config.dpi;
    let max_pixels = config.max_rendered_pixels;
    let password = config.password.clone();
    let indices = page_indices.to_vec();

    tokio::task::spawn_blocking(move || {
        render_pages_blocking(&path, dpi, max_pixels, password.as_deref(), &indices)
    })
    .await
    .map_err(|e| QuoteError::Internal(format!("Render task panicked: {e}")))?
}

fn render_pages_blocking(
    pdf_path: &Path,
    dpi: u32,
    max_pixels: u32,
    password: Option<&str>,
    page_indices: &[usize],
) -> Result<Vec<(usize, DynamicImage)>, QuoteError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, pdf_path, password)?;
    let pages = document.pages();
    let total_pages = pages.len() as usize;

    let raster_err = |page: usize, e: PdfiumError| QuoteError::RasterisationFailed {
        path: pdf_path.to_path_buf(),
        page: page + 1,
        detail: format!("{e:?}"),
    };

    let mut results = Vec::with_capacity(page_indices.len());
    for &idx in page_indices.iter().filter(|&&i| i < total_pages) {
        let page = pages.get(idx as u16).map_err(|e| raster_err(idx, e))?;
        let (w, h) = target_size(page.width().value, page.height().value, dpi, max_pixels);
        let render_config = PdfRenderConfig::new()
            .set_target_width(w)
            .set_maximum_width(w)
            .set_maximum_height(h);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| raster_err(idx, e))?;
        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        results.push((idx, image));
    }

    info!("Rendered {} of {} pages from {}", results.len(), total_pages, pdf_path.display());
    Ok(results)
}

/// Read page count and document info without rendering.
pub async fn extract_metadata(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, QuoteError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(str::to_string);

    tokio::task::spawn_blocking(move || extract_metadata_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| QuoteError::Internal(format!("Metadata task panicked: {e}")))?
}

fn extract_metadata_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, QuoteError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, pdf_path, password)?;
    let metadata = document.metadata();

    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata
            .get(tag)
            .map(|t| t.value().trim().to_string())
            .filter(|v| !v.is_empty())
    };

    Ok(DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
    })
}
