//! Pipeline orchestration: state machine, per-page loop, reporting.

mod apply;
mod extract;
mod locate;
mod plan;

use serde::Serialize;

use crate::config::{CompiledRun, RedactionMode, RunConfig};
use crate::error::{RedactError, Result};
use crate::ocr::OcrEngine;
use crate::pdf::{PageSource, PdfiumSource};

use apply::RedactionApplier;

/// Pipeline lifecycle. One instance of [`RedactionPipeline`] walks this
/// machine exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// No document attached yet.
    Idle,
    /// Document bytes parsed, awaiting configuration.
    Loaded,
    /// Rules compiled; ready to run.
    Configuring,
    Running,
    Completed,
    /// Unrecoverable error; no output was produced.
    Failed,
}

impl RunState {
    fn name(self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Loaded => "loaded",
            RunState::Configuring => "configuring",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
        }
    }
}

/// A page left unredacted because extraction failed on it.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedPage {
    pub page: usize,
    pub reason: String,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Serialized output document. Equal to the input bytes when no region
    /// was committed anywhere (lopdf re-serialization is not byte-stable,
    /// and a no-op run must not disturb the document).
    pub output: Vec<u8>,
    pub pages_total: usize,
    /// Pages that received at least one committed region.
    pub pages_redacted: usize,
    pub regions_applied: usize,
    pub skipped: Vec<SkippedPage>,
}

/// Progress observer, called after each page as `(pages_done, pages_total)`.
pub type ProgressFn<'a> = &'a mut dyn FnMut(usize, usize);

/// Drives a whole redaction run over one document.
///
/// Pages are processed strictly in index order; the lopdf document is the
/// single mutable handle and is owned exclusively here for the run's
/// duration. Extraction and location read through the immutable
/// [`PageSource`], so they could be parallelized per page, but commits
/// must stay serialized on the document.
pub struct RedactionPipeline<S: PageSource> {
    source: Option<S>,
    doc: Option<lopdf::Document>,
    input: Vec<u8>,
    state: RunState,
    run: Option<CompiledRun>,
    ocr: Option<Box<dyn OcrEngine>>,
}

impl RedactionPipeline<PdfiumSource> {
    /// Pipeline over the production pdfium source.
    pub fn new() -> Self {
        Self::empty()
    }

    /// Accepts document bytes: parses them with lopdf for mutation and
    /// opens the pdfium source over the same buffer for search/render.
    pub fn load(&mut self, bytes: Vec<u8>) -> Result<()> {
        self.expect_state(RunState::Idle, "idle")?;
        let source = PdfiumSource::open(bytes.clone())?;
        self.attach(bytes, source)
    }
}

impl Default for RedactionPipeline<PdfiumSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: PageSource> RedactionPipeline<S> {
    fn empty() -> Self {
        Self {
            source: None,
            doc: None,
            input: Vec::new(),
            state: RunState::Idle,
            run: None,
            ocr: None,
        }
    }

    /// Pipeline over a custom source (alternate backends, tests).
    pub fn with_source(bytes: Vec<u8>, source: S) -> Result<Self> {
        let mut pipeline = Self::empty();
        pipeline.attach(bytes, source)?;
        Ok(pipeline)
    }

    fn attach(&mut self, bytes: Vec<u8>, source: S) -> Result<()> {
        let doc = lopdf::Document::load_mem(&bytes)
            .map_err(|e| RedactError::DocumentOpen(e.to_string()))?;
        let doc_pages = doc.page_iter().count();
        // the document's page list drives iteration; a disagreeing backend
        // surfaces later as per-page extraction failures
        let source_pages = source.page_count()?;
        if source_pages != doc_pages {
            log::warn!(
                "[pipeline] backend reports {} page(s), document lists {}",
                source_pages,
                doc_pages
            );
        }
        log::info!("[pipeline] document loaded, {} page(s)", doc_pages);
        self.source = Some(source);
        self.doc = Some(doc);
        self.input = bytes;
        self.state = RunState::Loaded;
        Ok(())
    }

    /// Attaches the OCR engine used by [`RedactionMode::OcrRegex`] runs.
    pub fn set_ocr_engine(&mut self, engine: Box<dyn OcrEngine>) {
        self.ocr = Some(engine);
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn expect_state(&self, expected: RunState, name: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(RedactError::State {
                expected: name,
                actual: self.state.name(),
            })
        }
    }

    /// Compiles the run configuration. Fails fast on an invalid pattern —
    /// a bad rule applies to every page uniformly, so nothing may run
    /// under it. May be called again to replace the configuration.
    pub fn configure(&mut self, config: &RunConfig) -> Result<()> {
        if self.state != RunState::Loaded && self.state != RunState::Configuring {
            return Err(RedactError::State {
                expected: "loaded",
                actual: self.state.name(),
            });
        }
        self.run = Some(config.compile()?);
        self.state = RunState::Configuring;
        Ok(())
    }

    /// Runs the full pipeline, consuming the configuration.
    ///
    /// Per-page extraction failures are logged, recorded in the report and
    /// skipped; anything else fails the whole run with no output.
    pub fn run(&mut self, mut progress: Option<ProgressFn<'_>>) -> Result<RunReport> {
        self.expect_state(RunState::Configuring, "configuring")?;

        let run = self.run.as_ref().ok_or(RedactError::State {
            expected: "configuring",
            actual: self.state.name(),
        })?;
        if run.mode == RedactionMode::OcrRegex && self.ocr.is_none() {
            return Err(RedactError::OcrNotConfigured);
        }

        self.state = RunState::Running;

        let source = self.source.as_ref().ok_or(RedactError::State {
            expected: "configuring",
            actual: "idle",
        })?;
        let doc = self.doc.as_mut().ok_or(RedactError::State {
            expected: "configuring",
            actual: "idle",
        })?;

        let page_ids: Vec<lopdf::ObjectId> = doc.page_iter().collect();
        let pages_total = page_ids.len();

        let mut report = RunReport {
            output: Vec::new(),
            pages_total,
            pages_redacted: 0,
            regions_applied: 0,
            skipped: Vec::new(),
        };

        for (index, page_id) in page_ids.into_iter().enumerate() {
            match process_page(source, doc, page_id, index, run, self.ocr.as_deref_mut()) {
                Ok(applied) => {
                    if applied > 0 {
                        report.pages_redacted += 1;
                        report.regions_applied += applied;
                    }
                }
                Err(RedactError::PageExtraction { page, reason }) => {
                    log::warn!("[pipeline] skipping page {}: {}", page, reason);
                    report.skipped.push(SkippedPage { page, reason });
                }
                Err(err) => {
                    self.state = RunState::Failed;
                    return Err(err);
                }
            }
            if let Some(cb) = progress.as_mut() {
                cb(index + 1, pages_total);
            }
        }

        report.output = if report.regions_applied == 0 {
            self.input.clone()
        } else {
            doc.compress();
            let mut buffer = Vec::new();
            doc.save_to(&mut buffer).map_err(|e| {
                self.state = RunState::Failed;
                RedactError::Save(e.to_string())
            })?;
            buffer
        };

        self.state = RunState::Completed;
        log::info!(
            "[pipeline] completed: {}/{} page(s) redacted, {} region(s), {} skipped",
            report.pages_redacted,
            report.pages_total,
            report.regions_applied,
            report.skipped.len()
        );
        Ok(report)
    }
}

fn process_page<S: PageSource>(
    source: &S,
    doc: &mut lopdf::Document,
    page_id: lopdf::ObjectId,
    index: usize,
    run: &CompiledRun,
    ocr: Option<&mut (dyn OcrEngine + 'static)>,
) -> Result<usize> {
    let text = extract::extract_page_text(source, ocr, index, run.mode)?;

    let rects = locate::locate_rule_hits(source, index, text.as_deref(), run)
        .map_err(|e| e.for_page(index))?;
    if rects.is_empty() {
        log::debug!("[pipeline] page {}: no matches", index);
        return Ok(0);
    }

    let regions = plan::plan_regions(rects, run.fill);
    let mut applier = RedactionApplier::new();
    for region in regions {
        applier.stage(region);
    }
    applier.commit(doc, page_id)
}
