//! Region planning (RedactionPlanner).

use crate::geometry::{FillPolicy, Rect, RedactionRegion};

/// Turns located rectangles into planned regions with a fill policy.
///
/// Overlapping commits are idempotent, so merging is an optimization, not
/// a correctness requirement; rectangles fully contained in another are
/// dropped to avoid redundant stream rewrites.
pub(crate) fn plan_regions(rects: Vec<Rect>, fill: FillPolicy) -> Vec<RedactionRegion> {
    let mut kept: Vec<Rect> = Vec::with_capacity(rects.len());

    for rect in rects {
        if kept.iter().any(|k| k.contains(&rect)) {
            continue;
        }
        kept.retain(|k| !rect.contains(k));
        kept.push(rect);
    }

    kept.into_iter()
        .map(|rect| RedactionRegion { rect, fill })
        .collect()
}
