//! Rule-driven irreversible PDF redaction.
//!
//! Given a document and a set of match rules (literal terms, regexes, or
//! regexes over an OCR transcript), the pipeline locates every hit,
//! plans page regions, and commits a destructive redaction: the text under
//! each region is stripped from the content stream and the region is
//! painted over. The output document no longer contains the redacted
//! content in any extractable form.
//!
//! ```no_run
//! use blackout_pdf::{MatchRule, RedactionMode, RedactionPipeline, RunConfig};
//!
//! # fn main() -> blackout_pdf::Result<()> {
//! let input = std::fs::read("contract.pdf")?;
//!
//! let mut pipeline = RedactionPipeline::new();
//! pipeline.load(input)?;
//! pipeline.configure(&RunConfig::new(
//!     RedactionMode::Regex,
//!     vec![MatchRule::pattern(r"\d{3}-\d{2}-\d{4}")],
//! ))?;
//!
//! let report = pipeline.run(Some(&mut |done, total| {
//!     eprintln!("page {}/{}", done, total);
//! }))?;
//! std::fs::write("contract.redacted.pdf", &report.output)?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod geometry;
pub mod ocr;
mod pdf;
mod pipeline;

pub use config::{rules_from_json, MatchRule, RedactionMode, RunConfig};
pub use error::{RedactError, Result};
pub use geometry::{FillPolicy, Rect, RedactionRegion};
pub use ocr::{OcrEngine, TesseractConfig, TesseractEngine};
pub use pdf::{PageSource, PdfiumSource};
pub use pipeline::{ProgressFn, RedactionPipeline, RunReport, RunState, SkippedPage};
