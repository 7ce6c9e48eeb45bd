//! PDF collaborators: the geometric text seam and the lopdf rewrite layer.

pub(crate) mod content;
pub(crate) mod coords;
mod pdfium;

pub use pdfium::PdfiumSource;

use crate::error::Result;
use crate::geometry::Rect;
use image::DynamicImage;

/// Read-only geometric access to the rendered document.
///
/// This is the sole bridge between text matching and page coordinates:
/// `search_for` is literal-only, which is why regex modes scan a text
/// transcript first and then look up each matched substring here.
pub trait PageSource {
    fn page_count(&self) -> Result<usize>;

    /// Logical text layer of a page, in the reading order the layer gives.
    fn page_text(&self, page: usize) -> Result<String>;

    /// All bounding rectangles of a literal string on a page. An unknown
    /// or unfindable literal yields an empty list, never an error.
    fn search_for(&self, page: usize, literal: &str) -> Result<Vec<Rect>>;

    /// Rasterizes a page at the given per-axis scale over its point size.
    fn render_page(&self, page: usize, scale_x: f32, scale_y: f32) -> Result<DynamicImage>;
}
