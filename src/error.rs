//! Crate-wide error type.

pub type Result<T> = std::result::Result<T, RedactError>;

#[derive(Debug, thiserror::Error)]
pub enum RedactError {
    /// Input bytes are not a parseable PDF. Nothing is processed.
    #[error("failed to open document: {0}")]
    DocumentOpen(String),

    /// A regex rule failed to compile. Reported before any page is touched.
    #[error("invalid pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Rasterization, OCR or text extraction failed for a single page.
    /// The pipeline recovers by skipping that page.
    #[error("page {page}: {reason}")]
    PageExtraction { page: usize, reason: String },

    /// The render/search backend reported an error outside page scope.
    #[error("render backend: {0}")]
    Backend(String),

    /// Rewriting a page content stream during commit failed.
    #[error("content stream: {0}")]
    Content(String),

    #[error("ocr: {0}")]
    Ocr(String),

    /// OCR mode was selected but no engine was attached to the pipeline.
    #[error("ocr engine not configured but mode requires one")]
    OcrNotConfigured,

    #[error("invalid pipeline state: expected {expected}, was {actual}")]
    State {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("failed to save document: {0}")]
    Save(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RedactError {
    /// Demote any error to a per-page extraction failure so the run can
    /// skip the page and continue.
    pub(crate) fn for_page(self, page: usize) -> Self {
        match self {
            RedactError::PageExtraction { .. } => self,
            other => RedactError::PageExtraction {
                page,
                reason: other.to_string(),
            },
        }
    }
}
