//! Destructive per-page commit (RedactionApplier).

use crate::error::Result;
use crate::geometry::{FillPolicy, RedactionRegion};
use crate::pdf::content::{paint_fill, strip_masked_text};
use crate::pdf::coords::{page_box, page_content, replace_page_content, to_page_rect, PageRect};

/// Stages regions for one page, then commits them in a single rewrite.
///
/// Staged regions are inert until [`commit`](Self::commit); commit replaces
/// the page's content stream with one where every character under a region
/// has been stripped and solid-black regions are painted over. Once a page
/// is committed its original content is not recoverable from the document.
#[derive(Default)]
pub(crate) struct RedactionApplier {
    staged: Vec<RedactionRegion>,
}

impl RedactionApplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&mut self, region: RedactionRegion) {
        self.staged.push(region);
    }

    #[cfg(test)]
    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }

    /// Commits all staged regions to the page, clearing the stage.
    /// Returns the number of regions applied. With nothing staged the page
    /// is left byte-for-byte untouched.
    pub fn commit(&mut self, doc: &mut lopdf::Document, page_id: lopdf::ObjectId) -> Result<usize> {
        if self.staged.is_empty() {
            return Ok(0);
        }

        let pbox = page_box(doc, page_id);

        let strip_masks: Vec<PageRect> = self
            .staged
            .iter()
            .map(|region| to_page_rect(&region.rect, &pbox))
            .collect();
        let fill_masks: Vec<PageRect> = self
            .staged
            .iter()
            .filter(|region| region.fill == FillPolicy::SolidBlack)
            .map(|region| to_page_rect(&region.rect, &pbox))
            .collect();

        let content = page_content(doc, page_id)?;
        let stripped = strip_masked_text(&content, &strip_masks)?;
        let rewritten = if fill_masks.is_empty() {
            stripped
        } else {
            paint_fill(&stripped, &fill_masks)?
        };

        // overwrite in place: the original stream bytes must not linger as
        // an orphan object in the serialized output
        replace_page_content(doc, page_id, rewritten)?;

        let applied = self.staged.len();
        self.staged.clear();
        log::info!("[apply] committed {} region(s)", applied);
        Ok(applied)
    }
}
