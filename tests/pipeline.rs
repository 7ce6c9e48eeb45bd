//! End-to-end pipeline tests over in-memory documents.
//!
//! `LiveSource` stands in for the pdfium collaborator: it reads the text
//! layer straight out of the lopdf content streams and answers literal
//! geometric search from it, so redactions round-trip realistically
//! without a native rendering library.

use std::collections::HashMap;

use image::DynamicImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use blackout_pdf::{
    MatchRule, OcrEngine, PageSource, Rect, RedactError, RedactionMode, RedactionPipeline, Result,
    RunConfig, RunState,
};

// ---------------------------------------------------------------------------
// document fixtures

/// Builds a PDF with one page per entry, each showing its text at
/// (100, 700) in 12pt Helvetica, and returns the serialized bytes.
fn build_pdf(page_texts: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in page_texts {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12i64.into()]),
                Operation::new("Td", vec![100i64.into(), 700i64.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::String(
                        text.as_bytes().to_vec(),
                        lopdf::StringFormat::Literal,
                    )],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0i64.into(), 0i64.into(), 612i64.into(), 792i64.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Decoded content stream of page `index` (0-based) in `bytes`.
fn page_stream(bytes: &[u8], index: usize) -> Vec<u8> {
    let doc = Document::load_mem(bytes).unwrap();
    let page_id = doc.page_iter().nth(index).unwrap();
    let dict = doc.get_dictionary(page_id).unwrap();
    let content_id = dict.get(b"Contents").unwrap().as_reference().unwrap();
    let stream = doc.get_object(content_id).unwrap().as_stream().unwrap();
    stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone())
}

/// Text shown on a page, concatenated from its Tj operators.
fn shown_text(bytes: &[u8], index: usize) -> String {
    let content = Content::decode(&page_stream(bytes, index)).unwrap();
    let mut out = String::new();
    for op in &content.operations {
        if op.operator == "Tj" {
            if let Some(Object::String(s, _)) = op.operands.first() {
                out.push_str(&String::from_utf8_lossy(s));
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// collaborator doubles

/// Geometric search collaborator that answers from the document itself.
struct LiveSource {
    bytes: Vec<u8>,
}

impl LiveSource {
    fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    fn page_count_inner(&self) -> usize {
        Document::load_mem(&self.bytes).unwrap().page_iter().count()
    }
}

impl PageSource for LiveSource {
    fn page_count(&self) -> Result<usize> {
        Ok(self.page_count_inner())
    }

    fn page_text(&self, page: usize) -> Result<String> {
        Ok(shown_text(&self.bytes, page))
    }

    fn search_for(&self, page: usize, literal: &str) -> Result<Vec<Rect>> {
        // one band over the text line for any page that still shows the
        // literal (fixtures place their text at 700pt on a 792pt page)
        if shown_text(&self.bytes, page).contains(literal) {
            Ok(vec![Rect::new(0.0, 0.05, 1.0, 0.2).unwrap()])
        } else {
            Ok(Vec::new())
        }
    }

    fn render_page(&self, _page: usize, _sx: f32, _sy: f32) -> Result<DynamicImage> {
        Ok(DynamicImage::new_rgb8(8, 8))
    }
}

/// Scripted collaborator for failure-path tests.
struct ScriptedSource {
    texts: HashMap<usize, String>,
    failing_pages: Vec<usize>,
    hits: HashMap<String, Vec<Rect>>,
}

impl PageSource for ScriptedSource {
    fn page_count(&self) -> Result<usize> {
        Ok(self.texts.len())
    }

    fn page_text(&self, page: usize) -> Result<String> {
        if self.failing_pages.contains(&page) {
            return Err(RedactError::Backend(format!(
                "text layer unavailable on page {}",
                page
            )));
        }
        Ok(self.texts.get(&page).cloned().unwrap_or_default())
    }

    fn search_for(&self, _page: usize, literal: &str) -> Result<Vec<Rect>> {
        Ok(self.hits.get(literal).cloned().unwrap_or_default())
    }

    fn render_page(&self, page: usize, _sx: f32, _sy: f32) -> Result<DynamicImage> {
        if self.failing_pages.contains(&page) {
            return Err(RedactError::Backend(format!(
                "raster failed on page {}",
                page
            )));
        }
        Ok(DynamicImage::new_rgb8(8, 8))
    }
}

struct ScriptedOcr {
    transcripts: HashMap<usize, String>,
    calls: usize,
}

impl OcrEngine for ScriptedOcr {
    fn transcribe(&mut self, _image: &DynamicImage) -> Result<String> {
        let page = self.calls;
        self.calls += 1;
        Ok(self.transcripts.get(&page).cloned().unwrap_or_default())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// ---------------------------------------------------------------------------
// tests

#[test]
fn empty_rule_set_returns_input_bytes_unchanged() {
    let input = build_pdf(&["Nothing to hide", "Still nothing"]);
    let mut pipeline =
        RedactionPipeline::with_source(input.clone(), LiveSource::new(input.clone())).unwrap();
    pipeline
        .configure(&RunConfig::new(RedactionMode::ExactText, vec![]))
        .unwrap();

    let report = pipeline.run(None).unwrap();
    assert_eq!(report.output, input);
    assert_eq!(report.pages_total, 2);
    assert_eq!(report.pages_redacted, 0);
    assert_eq!(report.regions_applied, 0);
    assert_eq!(pipeline.state(), RunState::Completed);
}

#[test]
fn exact_term_redacts_only_the_matching_page() {
    let input = build_pdf(&[
        "Page one is public",
        "This page is Confidential material",
        "Page three is public",
    ]);
    let mut pipeline =
        RedactionPipeline::with_source(input.clone(), LiveSource::new(input.clone())).unwrap();
    pipeline
        .configure(&RunConfig::new(
            RedactionMode::ExactText,
            vec![MatchRule::literal("Confidential")],
        ))
        .unwrap();

    let report = pipeline.run(None).unwrap();
    assert_eq!(report.pages_redacted, 1);
    assert!(report.regions_applied >= 1);

    // matching page lost its text and gained a painted fill
    assert!(!shown_text(&report.output, 1).contains("Confidential"));
    let redacted_ops = Content::decode(&page_stream(&report.output, 1)).unwrap();
    assert!(redacted_ops.operations.iter().any(|op| op.operator == "re"));

    // the other pages' content streams are untouched
    assert_eq!(page_stream(&report.output, 0), page_stream(&input, 0));
    assert_eq!(page_stream(&report.output, 2), page_stream(&input, 2));
    assert_eq!(shown_text(&report.output, 0), "Page one is public");
}

#[test]
fn redacted_content_is_no_longer_searchable() {
    let input = build_pdf(&["Account 12345 belongs to Alice"]);
    let mut pipeline =
        RedactionPipeline::with_source(input.clone(), LiveSource::new(input.clone())).unwrap();
    pipeline
        .configure(&RunConfig::new(
            RedactionMode::ExactText,
            vec![MatchRule::literal("Alice")],
        ))
        .unwrap();
    let report = pipeline.run(None).unwrap();

    // the collaborator over the *output* document finds nothing
    let after = LiveSource::new(report.output.clone());
    assert!(after.search_for(0, "Alice").unwrap().is_empty());
}

#[test]
fn redacted_literal_is_absent_from_every_output_object() {
    let input = build_pdf(&["Confidential payload", "public page"]);
    let mut pipeline =
        RedactionPipeline::with_source(input.clone(), LiveSource::new(input)).unwrap();
    pipeline
        .configure(&RunConfig::new(
            RedactionMode::ExactText,
            vec![MatchRule::literal("Confidential")],
        ))
        .unwrap();
    let report = pipeline.run(None).unwrap();
    assert_eq!(report.pages_redacted, 1);

    // irreversibility: no stream in the saved file, referenced or orphaned,
    // may still carry the redacted bytes
    let doc = Document::load_mem(&report.output).unwrap();
    for object in doc.objects.values() {
        if let Object::Stream(stream) = object {
            let data = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            assert!(!String::from_utf8_lossy(&data).contains("Confidential"));
        }
    }
}

#[test]
fn rerunning_on_redacted_output_applies_zero_regions() {
    let input = build_pdf(&["SSN: 123-45-6789", "No numbers here"]);
    let config = RunConfig::new(
        RedactionMode::Regex,
        vec![MatchRule::pattern(r"\d{3}-\d{2}-\d{4}")],
    );

    let mut first =
        RedactionPipeline::with_source(input.clone(), LiveSource::new(input.clone())).unwrap();
    first.configure(&config).unwrap();
    let first_report = first.run(None).unwrap();
    assert_eq!(first_report.regions_applied, 1);
    assert_eq!(first_report.pages_redacted, 1);

    let output = first_report.output;
    let mut second =
        RedactionPipeline::with_source(output.clone(), LiveSource::new(output.clone())).unwrap();
    second.configure(&config).unwrap();
    let second_report = second.run(None).unwrap();
    assert_eq!(second_report.regions_applied, 0);
    assert_eq!(second_report.output, output);
}

#[test]
fn ssn_pattern_locates_one_region() {
    let input = build_pdf(&["SSN: 123-45-6789 on record"]);
    let mut pipeline =
        RedactionPipeline::with_source(input.clone(), LiveSource::new(input.clone())).unwrap();
    pipeline
        .configure(&RunConfig::new(
            RedactionMode::Regex,
            vec![MatchRule::pattern(r"\d{3}-\d{2}-\d{4}")],
        ))
        .unwrap();
    let report = pipeline.run(None).unwrap();
    assert_eq!(report.regions_applied, 1);
    assert!(!shown_text(&report.output, 0).contains("123-45-6789"));
}

#[test]
fn ocr_misread_redacts_nothing() {
    let input = build_pdf(&["SSN: 123-45-6789"]);
    // transcript misreads the leading digit; the native layer has no
    // literal "l23-45-6789", so no rectangle is produced
    let source = ScriptedSource {
        texts: HashMap::from([(0, String::new())]),
        failing_pages: vec![],
        hits: HashMap::new(),
    };
    let mut pipeline = RedactionPipeline::with_source(input.clone(), source).unwrap();
    pipeline.set_ocr_engine(Box::new(ScriptedOcr {
        transcripts: HashMap::from([(0, "SSN: l23-45-6789".to_string())]),
        calls: 0,
    }));
    pipeline
        .configure(&RunConfig::new(
            RedactionMode::OcrRegex,
            vec![MatchRule::pattern(r"[l\d]{3}-\d{2}-\d{4}")],
        ))
        .unwrap();

    let report = pipeline.run(None).unwrap();
    assert_eq!(report.regions_applied, 0);
    assert_eq!(report.output, input);
    assert!(report.skipped.is_empty());
}

#[test]
fn ocr_transcript_hits_are_located_on_the_native_layer() {
    let input = build_pdf(&["Scanned page"]);
    let rect = Rect::new(0.2, 0.2, 0.6, 0.3).unwrap();
    let source = ScriptedSource {
        texts: HashMap::from([(0, String::new())]),
        failing_pages: vec![],
        hits: HashMap::from([("987-65-4321".to_string(), vec![rect])]),
    };
    let mut pipeline = RedactionPipeline::with_source(input, source).unwrap();
    pipeline.set_ocr_engine(Box::new(ScriptedOcr {
        transcripts: HashMap::from([(0, "SSN 987-65-4321".to_string())]),
        calls: 0,
    }));
    pipeline
        .configure(&RunConfig::new(
            RedactionMode::OcrRegex,
            vec![MatchRule::pattern(r"\d{3}-\d{2}-\d{4}")],
        ))
        .unwrap();

    let report = pipeline.run(None).unwrap();
    assert_eq!(report.regions_applied, 1);
    assert_eq!(report.pages_redacted, 1);
}

#[test]
fn invalid_pattern_fails_before_any_page_runs() {
    let input = build_pdf(&["content"]);
    let mut pipeline =
        RedactionPipeline::with_source(input.clone(), LiveSource::new(input)).unwrap();
    let err = pipeline
        .configure(&RunConfig::new(
            RedactionMode::Regex,
            vec![MatchRule::pattern("[unclosed")],
        ))
        .unwrap_err();
    assert!(matches!(err, RedactError::Pattern { .. }));
    // configuration error leaves the pipeline re-configurable
    assert_eq!(pipeline.state(), RunState::Loaded);
}

#[test]
fn ocr_mode_without_engine_fails_fast() {
    let input = build_pdf(&["content"]);
    let mut pipeline =
        RedactionPipeline::with_source(input.clone(), LiveSource::new(input)).unwrap();
    pipeline
        .configure(&RunConfig::new(
            RedactionMode::OcrRegex,
            vec![MatchRule::pattern("x")],
        ))
        .unwrap();
    let err = pipeline.run(None).unwrap_err();
    assert!(matches!(err, RedactError::OcrNotConfigured));
    assert_eq!(pipeline.state(), RunState::Configuring);
}

#[test]
fn failed_page_is_skipped_and_reported() {
    let input = build_pdf(&["first", "second", "third"]);
    let source = ScriptedSource {
        texts: HashMap::from([
            (0, "alpha target".to_string()),
            (1, String::new()),
            (2, "gamma target".to_string()),
        ]),
        failing_pages: vec![1],
        hits: HashMap::from([(
            "target".to_string(),
            vec![Rect::new(0.1, 0.1, 0.4, 0.2).unwrap()],
        )]),
    };
    let mut pipeline = RedactionPipeline::with_source(input, source).unwrap();
    pipeline
        .configure(&RunConfig::new(
            RedactionMode::Regex,
            vec![MatchRule::pattern("target")],
        ))
        .unwrap();

    let report = pipeline.run(None).unwrap();
    assert_eq!(pipeline.state(), RunState::Completed);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].page, 1);
    assert_eq!(report.pages_redacted, 2);
}

#[test]
fn progress_is_reported_after_each_page_in_order() {
    let input = build_pdf(&["one", "two", "three"]);
    let mut pipeline =
        RedactionPipeline::with_source(input.clone(), LiveSource::new(input)).unwrap();
    pipeline
        .configure(&RunConfig::new(RedactionMode::ExactText, vec![]))
        .unwrap();

    let mut seen: Vec<(usize, usize)> = Vec::new();
    pipeline
        .run(Some(&mut |done, total| seen.push((done, total))))
        .unwrap();
    assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
}

#[test]
fn lifecycle_is_enforced() {
    let input = build_pdf(&["content"]);
    let mut pipeline =
        RedactionPipeline::with_source(input.clone(), LiveSource::new(input)).unwrap();
    assert_eq!(pipeline.state(), RunState::Loaded);

    // running before configuring is rejected
    assert!(matches!(
        pipeline.run(None),
        Err(RedactError::State { .. })
    ));

    pipeline
        .configure(&RunConfig::new(RedactionMode::ExactText, vec![]))
        .unwrap();
    assert_eq!(pipeline.state(), RunState::Configuring);
    pipeline.run(None).unwrap();
    assert_eq!(pipeline.state(), RunState::Completed);

    // a pipeline instance drives exactly one run
    assert!(matches!(
        pipeline.run(None),
        Err(RedactError::State { .. })
    ));
    assert!(matches!(
        pipeline.configure(&RunConfig::new(RedactionMode::ExactText, vec![])),
        Err(RedactError::State { .. })
    ));
}

/// Backend reporting a page count the document disagrees with.
struct MiscountedSource(LiveSource);

impl PageSource for MiscountedSource {
    fn page_count(&self) -> Result<usize> {
        Ok(self.0.page_count_inner() + 2)
    }

    fn page_text(&self, page: usize) -> Result<String> {
        self.0.page_text(page)
    }

    fn search_for(&self, page: usize, literal: &str) -> Result<Vec<Rect>> {
        self.0.search_for(page, literal)
    }

    fn render_page(&self, page: usize, sx: f32, sy: f32) -> Result<DynamicImage> {
        self.0.render_page(page, sx, sy)
    }
}

#[test]
fn document_page_list_drives_iteration_over_backend_count() {
    let input = build_pdf(&["one", "two"]);
    let source = MiscountedSource(LiveSource::new(input.clone()));
    let mut pipeline = RedactionPipeline::with_source(input, source).unwrap();
    pipeline
        .configure(&RunConfig::new(RedactionMode::ExactText, vec![]))
        .unwrap();
    let report = pipeline.run(None).unwrap();
    assert_eq!(report.pages_total, 2);
}

#[test]
fn garbage_bytes_are_rejected_at_load() {
    let garbage = b"this is not a pdf".to_vec();
    let err = RedactionPipeline::with_source(garbage.clone(), LiveSource::new(garbage))
        .err()
        .expect("expected open failure");
    assert!(matches!(err, RedactError::DocumentOpen(_)));
}
