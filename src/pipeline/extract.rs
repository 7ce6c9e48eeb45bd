//! Per-page text acquisition (PageTextExtractor).

use crate::config::RedactionMode;
use crate::error::{RedactError, Result};
use crate::ocr::OcrEngine;
use crate::pdf::PageSource;

/// Fixed upscale for OCR rasterization. Doubling each dimension over the
/// native point size measurably improves recognition of small print.
pub(crate) const OCR_SCALE: f32 = 2.0;

/// Produces the text a page will be matched against.
///
/// `ExactText` needs no text at all: rules go straight to geometric search.
/// Failures here are page-scoped; the orchestrator skips the page and
/// continues.
pub(crate) fn extract_page_text<S: PageSource>(
    source: &S,
    // `+ 'static` keeps the engine's own lifetime out of the borrow, so the
    // caller can re-borrow its boxed engine on every page
    ocr: Option<&mut (dyn OcrEngine + 'static)>,
    page: usize,
    mode: RedactionMode,
) -> Result<Option<String>> {
    match mode {
        RedactionMode::ExactText => Ok(None),
        RedactionMode::Regex => source
            .page_text(page)
            .map(Some)
            .map_err(|e| e.for_page(page)),
        RedactionMode::OcrRegex => {
            let engine = ocr.ok_or(RedactError::OcrNotConfigured)?;
            let image = source
                .render_page(page, OCR_SCALE, OCR_SCALE)
                .map_err(|e| e.for_page(page))?;
            log::info!("[extract] running {} OCR on page {}", engine.name(), page);
            let transcript = engine.transcribe(&image).map_err(|e| e.for_page(page))?;
            Ok(Some(transcript))
        }
    }
}
