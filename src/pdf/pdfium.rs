//! pdfium-render backed [`PageSource`].
//!
//! pdfium owns rendering, the text layer, and literal geometric search.
//! The document is reopened from the held byte buffer on every call; open
//! is cheap next to render/search and it keeps this type free of
//! self-referential lifetimes.

use std::path::PathBuf;

use image::DynamicImage;
use pdfium_render::prelude::*;

use super::PageSource;
use crate::error::{RedactError, Result};
use crate::geometry::Rect;

/// Padding added around search hits, in normalized page units. Covers
/// glyph anti-aliasing bleed at the edges of the reported bounds.
const HIT_PADDING: f64 = 0.003;

fn library_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            paths.push(exe_dir.join("libs"));
            paths.push(exe_dir.to_path_buf());

            #[cfg(target_os = "macos")]
            if let Some(contents_dir) = exe_dir.parent() {
                paths.push(contents_dir.join("Resources").join("libs"));
                paths.push(contents_dir.join("Resources"));
            }
        }
    }

    paths.push(PathBuf::from("libs"));
    paths.push(PathBuf::from("./"));

    paths
}

fn bind_pdfium() -> Result<Pdfium> {
    for path in library_search_paths() {
        let lib_path = Pdfium::pdfium_platform_library_name_at_path(&path);
        log::debug!("[pdfium] probing {:?}", lib_path);
        if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
            log::info!("[pdfium] loaded library from {:?}", path);
            return Ok(Pdfium::new(bindings));
        }
    }

    log::debug!("[pdfium] probing system library");
    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| RedactError::Backend(format!("pdfium library unavailable: {}", e)))
}

/// Geometric text access backed by pdfium.
pub struct PdfiumSource {
    pdfium: Pdfium,
    bytes: Vec<u8>,
}

impl PdfiumSource {
    /// Binds the pdfium library and verifies the bytes parse as a PDF.
    pub fn open(bytes: Vec<u8>) -> Result<Self> {
        let pdfium = bind_pdfium()?;
        pdfium
            .load_pdf_from_byte_slice(&bytes, None)
            .map_err(|e| RedactError::DocumentOpen(e.to_string()))?;
        Ok(Self { pdfium, bytes })
    }

    fn document(&self) -> Result<PdfDocument<'_>> {
        self.pdfium
            .load_pdf_from_byte_slice(&self.bytes, None)
            .map_err(|e| RedactError::DocumentOpen(e.to_string()))
    }
}

fn get_page<'a>(document: &'a PdfDocument<'_>, page: usize) -> Result<PdfPage<'a>> {
    document
        .pages()
        .get(page as u16)
        .map_err(|e| RedactError::Backend(format!("page {} unavailable: {}", page, e)))
}

impl PageSource for PdfiumSource {
    fn page_count(&self) -> Result<usize> {
        Ok(self.document()?.pages().len() as usize)
    }

    fn page_text(&self, page: usize) -> Result<String> {
        let document = self.document()?;
        let page = get_page(&document, page)?;
        let text = page
            .text()
            .map_err(|e| RedactError::Backend(format!("text layer: {}", e)))?;
        Ok(text.all())
    }

    fn search_for(&self, page: usize, literal: &str) -> Result<Vec<Rect>> {
        let document = self.document()?;
        let page = get_page(&document, page)?;

        let page_width = page.width().value as f64;
        let page_height = page.height().value as f64;

        let text = page
            .text()
            .map_err(|e| RedactError::Backend(format!("text layer: {}", e)))?;

        // A literal the page's encoding cannot represent simply has no
        // occurrences; that is a miss, not an error.
        let search = match text.search(literal, &PdfSearchOptions::new()) {
            Ok(search) => search,
            Err(_) => return Ok(Vec::new()),
        };

        let mut rects = Vec::new();
        for segments in search.iter(PdfSearchDirection::SearchForward) {
            for segment in segments.iter() {
                let bounds = segment.bounds();

                let left = bounds.left().value as f64 / page_width;
                let right = bounds.right().value as f64 / page_width;
                // pdfium reports bottom-left origin; flip to top-left
                let top = 1.0 - bounds.top().value as f64 / page_height;
                let bottom = 1.0 - bounds.bottom().value as f64 / page_height;

                if let Some(rect) = Rect::new(
                    left - HIT_PADDING,
                    top - HIT_PADDING,
                    right + HIT_PADDING,
                    bottom + HIT_PADDING,
                ) {
                    rects.push(rect);
                }
            }
        }

        Ok(rects)
    }

    fn render_page(&self, page: usize, scale_x: f32, scale_y: f32) -> Result<DynamicImage> {
        let document = self.document()?;
        let page = get_page(&document, page)?;

        let target_width = (page.width().value * scale_x) as i32;
        let target_height = (page.height().value * scale_y) as i32;

        log::debug!(
            "[pdfium] rendering page at {}x{} px",
            target_width,
            target_height
        );

        let render_config = PdfRenderConfig::new()
            .set_target_width(target_width)
            .set_target_height(target_height);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| RedactError::Backend(format!("render: {}", e)))?;

        Ok(bitmap.as_image())
    }
}
