//! OCR collaborator seam.

mod tesseract;

pub use tesseract::{TesseractConfig, TesseractEngine};

use crate::error::Result;
use image::DynamicImage;

/// An OCR engine turns a rasterized page into a plain-text transcript.
///
/// The pipeline makes no assumption about layout reconstruction; whatever
/// the engine returns is scanned as-is. Engines are stateful (model
/// handles, warm caches), hence `&mut self`.
pub trait OcrEngine: Send {
    fn transcribe(&mut self, image: &DynamicImage) -> Result<String>;

    /// Short engine identifier for logs.
    fn name(&self) -> &str;
}
