//! Page geometry: box lookup and normalized-to-point conversion.

use lopdf::{Dictionary, Document, Object, Stream};

use crate::error::{RedactError, Result};
use crate::geometry::Rect;

/// Effective page box in PDF points plus the page's /Rotate value.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PageBox {
    pub llx: f32,
    pub lly: f32,
    pub urx: f32,
    pub ury: f32,
    pub rotation: i32,
}

impl PageBox {
    pub fn width(&self) -> f32 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f32 {
        self.ury - self.lly
    }
}

/// Rectangle in PDF point space, origin bottom-left.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PageRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PageRect {
    /// Whether an estimated glyph box intersects this rectangle. A small
    /// margin absorbs the error of width estimation, so characters on the
    /// edge of a region are stripped rather than left legible.
    pub fn intersects_glyph(&self, gx: f32, gy: f32, gw: f32, gh: f32) -> bool {
        const MARGIN: f32 = 5.0;
        let x_overlap = gx < self.x + self.width + MARGIN && gx + gw > self.x - MARGIN;
        let y_overlap = gy < self.y + self.height + MARGIN && gy + gh > self.y - MARGIN;
        x_overlap && y_overlap
    }
}

fn box_values(arr: &[Object]) -> Option<(f32, f32, f32, f32)> {
    let values: Vec<f32> = arr.iter().filter_map(number).collect();
    if values.len() == 4 {
        Some((values[0], values[1], values[2], values[3]))
    } else {
        None
    }
}

pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

fn page_rotation(doc: &Document, page_id: lopdf::ObjectId) -> i32 {
    if let Ok(Object::Dictionary(dict)) = doc.get_object(page_id) {
        if let Ok(Object::Integer(rotate)) = dict.get(b"Rotate") {
            return *rotate as i32;
        }
        if let Ok(Object::Reference(parent_ref)) = dict.get(b"Parent") {
            if let Ok(Object::Dictionary(parent)) = doc.get_object(*parent_ref) {
                if let Ok(Object::Integer(rotate)) = parent.get(b"Rotate") {
                    return *rotate as i32;
                }
            }
        }
    }
    0
}

/// Resolves the effective page box: CropBox first (the visible area), then
/// MediaBox, then the parent's MediaBox, falling back to Letter.
pub(crate) fn page_box(doc: &Document, page_id: lopdf::ObjectId) -> PageBox {
    let rotation = page_rotation(doc, page_id);

    let raw = if let Ok(Object::Dictionary(dict)) = doc.get_object(page_id) {
        let own = dict
            .get(b"CropBox")
            .or_else(|_| dict.get(b"MediaBox"))
            .ok()
            .and_then(|obj| match obj {
                Object::Array(arr) => box_values(arr),
                _ => None,
            });

        own.or_else(|| {
            let parent_ref = match dict.get(b"Parent") {
                Ok(Object::Reference(r)) => *r,
                _ => return None,
            };
            match doc.get_object(parent_ref) {
                Ok(Object::Dictionary(parent)) => match parent.get(b"MediaBox") {
                    Ok(Object::Array(arr)) => box_values(arr),
                    _ => None,
                },
                _ => None,
            }
        })
    } else {
        None
    };

    let (llx, lly, urx, ury) = raw.unwrap_or_else(|| {
        log::warn!("[coords] page box missing, assuming Letter");
        (0.0, 0.0, 612.0, 792.0)
    });

    PageBox {
        llx,
        lly,
        urx,
        ury,
        rotation,
    }
}

/// Converts a normalized rectangle (top-left origin, display orientation)
/// into unrotated PDF point space.
///
/// Viewers apply /Rotate before display, so the normalized coordinates the
/// search layer reports are relative to the rotated page; 90 and 270 swap
/// the axes on the way back.
pub(crate) fn to_page_rect(rect: &Rect, pbox: &PageBox) -> PageRect {
    let pw = pbox.width();
    let ph = pbox.height();
    let (x, y) = (rect.x0 as f32, rect.y0 as f32);
    let (w, h) = (rect.width() as f32, rect.height() as f32);

    match pbox.rotation.rem_euclid(360) {
        90 => PageRect {
            x: pbox.llx + (1.0 - y - h) * pw,
            y: pbox.lly + x * ph,
            width: h * pw,
            height: w * ph,
        },
        180 => PageRect {
            x: pbox.llx + (1.0 - x - w) * pw,
            y: pbox.lly + y * ph,
            width: w * pw,
            height: h * ph,
        },
        270 => PageRect {
            x: pbox.llx + y * pw,
            y: pbox.lly + (1.0 - x - w) * ph,
            width: h * pw,
            height: w * ph,
        },
        _ => PageRect {
            x: pbox.llx + x * pw,
            y: pbox.lly + (1.0 - y - h) * ph,
            width: w * pw,
            height: h * ph,
        },
    }
}

fn stream_content(stream: &Stream) -> Vec<u8> {
    match stream.decompressed_content() {
        Ok(data) => data,
        Err(_) => stream.content.clone(),
    }
}

/// Collects a page's content stream data, concatenating stream arrays.
pub(crate) fn page_content(doc: &Document, page_id: lopdf::ObjectId) -> Result<Vec<u8>> {
    let page = doc
        .get_object(page_id)
        .map_err(|e| RedactError::Content(e.to_string()))?;

    if let Object::Dictionary(dict) = page {
        if let Ok(contents) = dict.get(b"Contents") {
            match contents {
                Object::Reference(ref_id) => {
                    if let Ok(Object::Stream(stream)) = doc.get_object(*ref_id) {
                        return Ok(stream_content(stream));
                    }
                }
                Object::Array(arr) => {
                    let mut all = Vec::new();
                    for item in arr {
                        if let Object::Reference(ref_id) = item {
                            if let Ok(Object::Stream(stream)) = doc.get_object(*ref_id) {
                                all.extend(stream_content(stream));
                                all.push(b'\n');
                            }
                        }
                    }
                    return Ok(all);
                }
                Object::Stream(stream) => {
                    return Ok(stream_content(stream));
                }
                _ => {}
            }
        }
    }

    Err(RedactError::Content("page has no content stream".into()))
}

/// Replaces a page's content with `data`, overwriting the existing stream
/// objects in place. The prior stream bytes must not survive anywhere in
/// the document; lopdf serializes every object it holds, referenced or not,
/// so swapping in a fresh object and leaving the old one behind would leak
/// the original text into the saved file.
pub(crate) fn replace_page_content(
    doc: &mut Document,
    page_id: lopdf::ObjectId,
    data: Vec<u8>,
) -> Result<()> {
    let contents = doc
        .get_dictionary(page_id)
        .map_err(|e| RedactError::Content(e.to_string()))?
        .get(b"Contents")
        .map_err(|_| RedactError::Content("page has no content stream".into()))?
        .clone();

    match contents {
        Object::Reference(ref_id) => {
            doc.objects
                .insert(ref_id, Object::Stream(Stream::new(Dictionary::new(), data)));
            Ok(())
        }
        Object::Array(arr) => {
            let ids: Vec<lopdf::ObjectId> =
                arr.iter().filter_map(|obj| obj.as_reference().ok()).collect();
            if ids.is_empty() {
                return Err(RedactError::Content("page has no content stream".into()));
            }
            // the first stream carries the rewritten content, the rest are
            // emptied rather than deleted so the array stays valid
            let mut data = Some(data);
            for ref_id in ids {
                let body = data.take().unwrap_or_default();
                doc.objects
                    .insert(ref_id, Object::Stream(Stream::new(Dictionary::new(), body)));
            }
            Ok(())
        }
        Object::Stream(_) => {
            if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(page_id) {
                dict.set(
                    b"Contents",
                    Object::Stream(Stream::new(Dictionary::new(), data)),
                );
            }
            Ok(())
        }
        _ => Err(RedactError::Content("page has no content stream".into())),
    }
}
