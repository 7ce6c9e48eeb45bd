//! Rule matching and geometric lookup (MatchLocator).

use std::collections::HashSet;

use crate::config::{CompiledRule, CompiledRun, RedactionMode};
use crate::error::Result;
use crate::geometry::{dedup_rects, Rect};
use crate::pdf::PageSource;

/// Finds every rectangle a page's rules hit.
///
/// Exact mode sends each literal straight to geometric search. Regex modes
/// are two-step: scan `text` (text layer or OCR transcript) for
/// non-overlapping matches in left-to-right order, then look up each whole
/// matched substring as a literal on the **native** page layer — the
/// geometric API only understands literals. An OCR misread therefore
/// produces a substring the native layer doesn't contain and quietly yields
/// no rectangle; that imprecision is inherent to the design.
pub(crate) fn locate_rule_hits<S: PageSource>(
    source: &S,
    page: usize,
    text: Option<&str>,
    run: &CompiledRun,
) -> Result<Vec<Rect>> {
    let mut rects = Vec::new();

    match run.mode {
        RedactionMode::ExactText => {
            for rule in &run.rules {
                if let CompiledRule::Literal(term) = rule {
                    rects.extend(source.search_for(page, term)?);
                }
            }
        }
        RedactionMode::Regex | RedactionMode::OcrRegex => {
            let text = text.unwrap_or("");
            // The same substring matched by several rules (or several
            // times) is only searched once per page.
            let mut searched: HashSet<&str> = HashSet::new();

            for rule in &run.rules {
                let CompiledRule::Pattern(regex) = rule else {
                    continue;
                };
                for m in regex.find_iter(text) {
                    let matched = m.as_str();
                    if matched.is_empty() || !searched.insert(matched) {
                        continue;
                    }
                    rects.extend(source.search_for(page, matched)?);
                }
            }
        }
    }

    Ok(dedup_rects(rects))
}
