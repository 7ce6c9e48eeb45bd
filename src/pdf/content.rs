//! Destructive content-stream rewrite.
//!
//! Redaction happens in two passes over a page's content stream. The first
//! pass tracks the graphics and text matrices, estimates where each shown
//! character lands, and replaces characters inside a masked region with
//! spaces, so the glyphs are neither rendered nor recoverable by text
//! extraction. The second pass appends filled rectangles for regions whose
//! policy is solid black.

use lopdf::{
    content::{Content, Operation},
    Object,
};

use super::coords::{number, PageRect};
use crate::error::{RedactError, Result};

type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

fn concat(m: &Matrix, a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Matrix {
    [
        m[0] * a + m[2] * b,
        m[1] * a + m[3] * b,
        m[0] * c + m[2] * d,
        m[1] * c + m[3] * d,
        m[0] * e + m[2] * f + m[4],
        m[1] * e + m[3] * f + m[5],
    ]
}

fn six_operands(op: &Operation) -> Option<(f32, f32, f32, f32, f32, f32)> {
    if op.operands.len() < 6 {
        return None;
    }
    Some((
        number(&op.operands[0])?,
        number(&op.operands[1])?,
        number(&op.operands[2])?,
        number(&op.operands[3])?,
        number(&op.operands[4])?,
        number(&op.operands[5])?,
    ))
}

/// Rough per-byte advance. Single-byte encodings average a bit over half an
/// em; multi-byte (CJK, CID) glyphs a full em. Exact metrics would need the
/// font program; the intersection margin absorbs the slack.
fn char_width(byte: u8, font_size: f32) -> f32 {
    if byte < 128 {
        font_size * 0.55
    } else {
        font_size
    }
}

fn text_width(bytes: &[u8], font_size: f32) -> f32 {
    bytes.iter().map(|&b| char_width(b, font_size)).sum()
}

/// Replaces every byte whose estimated box intersects a mask with a space.
/// Spaces keep the surviving characters in place and carry no content.
fn strip_chars(
    bytes: &[u8],
    start_x: f32,
    y: f32,
    font_size: f32,
    masks: &[PageRect],
) -> (Vec<u8>, bool) {
    let glyph_height = font_size.abs().max(12.0);
    let mut out = Vec::with_capacity(bytes.len());
    let mut x = start_x;
    let mut changed = false;

    for &byte in bytes {
        let width = char_width(byte, font_size);
        let masked = masks
            .iter()
            .any(|m| m.intersects_glyph(x, y, width, glyph_height));
        if masked {
            out.push(b' ');
            changed = true;
        } else {
            out.push(byte);
        }
        x += width;
    }

    (out, changed)
}

fn string_operand(obj: Option<&Object>) -> (Vec<u8>, lopdf::StringFormat) {
    match obj {
        Some(Object::String(s, fmt)) => (s.clone(), *fmt),
        _ => (Vec::new(), lopdf::StringFormat::Literal),
    }
}

struct TextState {
    ctm: Matrix,
    ctm_stack: Vec<Matrix>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    in_text: bool,
    font_size: f32,
}

impl TextState {
    fn new() -> Self {
        Self {
            ctm: IDENTITY,
            ctm_stack: Vec::new(),
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            in_text: false,
            font_size: 12.0,
        }
    }

    /// Text origin in device space for the current text matrix.
    fn origin(&self) -> (f32, f32) {
        let x = self.ctm[0] * self.text_matrix[4] + self.ctm[2] * self.text_matrix[5] + self.ctm[4];
        let y = self.ctm[1] * self.text_matrix[4] + self.ctm[3] * self.text_matrix[5] + self.ctm[5];
        (x, y)
    }
}

/// First pass: strip masked characters out of every text-showing operator.
pub(crate) fn strip_masked_text(content_data: &[u8], masks: &[PageRect]) -> Result<Vec<u8>> {
    let content = Content::decode(content_data).map_err(|e| RedactError::Content(e.to_string()))?;
    let mut out: Vec<Operation> = Vec::with_capacity(content.operations.len());
    let mut state = TextState::new();

    for op in content.operations {
        match op.operator.as_str() {
            "q" => {
                state.ctm_stack.push(state.ctm);
                out.push(op);
            }
            "Q" => {
                if let Some(saved) = state.ctm_stack.pop() {
                    state.ctm = saved;
                }
                out.push(op);
            }
            "cm" => {
                if let Some((a, b, c, d, e, f)) = six_operands(&op) {
                    state.ctm = concat(&state.ctm, a, b, c, d, e, f);
                }
                out.push(op);
            }
            "BT" => {
                state.in_text = true;
                state.text_matrix = IDENTITY;
                state.line_matrix = IDENTITY;
                out.push(op);
            }
            "ET" => {
                state.in_text = false;
                out.push(op);
            }
            "Tm" if state.in_text => {
                if let Some((a, b, c, d, e, f)) = six_operands(&op) {
                    state.text_matrix = [a, b, c, d, e, f];
                    state.line_matrix = state.text_matrix;
                }
                out.push(op);
            }
            "Td" | "TD" if state.in_text && op.operands.len() >= 2 => {
                if let (Some(tx), Some(ty)) = (number(&op.operands[0]), number(&op.operands[1])) {
                    state.line_matrix[4] += tx;
                    state.line_matrix[5] += ty;
                    state.text_matrix = state.line_matrix;
                }
                out.push(op);
            }
            "Tf" if op.operands.len() >= 2 => {
                if let Some(size) = number(&op.operands[1]) {
                    state.font_size = size.abs();
                }
                out.push(op);
            }
            "Tj" | "'" if state.in_text => {
                let (x, y) = state.origin();
                let (bytes, fmt) = string_operand(op.operands.first());
                let (stripped, changed) = strip_chars(&bytes, x, y, state.font_size, masks);
                if changed {
                    log::debug!(
                        "[strip] {:?}: {} of {} bytes masked",
                        op.operator,
                        stripped.iter().filter(|&&b| b == b' ').count(),
                        bytes.len()
                    );
                    out.push(Operation::new(
                        op.operator.as_str(),
                        vec![Object::String(stripped, fmt)],
                    ));
                } else {
                    out.push(op);
                }
            }
            "\"" if state.in_text && op.operands.len() >= 3 => {
                let (x, y) = state.origin();
                let (bytes, fmt) = string_operand(op.operands.get(2));
                let (stripped, changed) = strip_chars(&bytes, x, y, state.font_size, masks);
                if changed {
                    let mut operands = op.operands.clone();
                    operands[2] = Object::String(stripped, fmt);
                    out.push(Operation::new("\"", operands));
                } else {
                    out.push(op);
                }
            }
            "TJ" if state.in_text => {
                let (start_x, y) = state.origin();
                let mut x = start_x;
                let mut changed = false;
                let mut items: Vec<Object> = Vec::new();

                if let Some(Object::Array(arr)) = op.operands.first() {
                    for item in arr {
                        match item {
                            Object::String(s, fmt) => {
                                let (stripped, this_changed) =
                                    strip_chars(s, x, y, state.font_size, masks);
                                changed |= this_changed;
                                x += text_width(s, state.font_size);
                                items.push(Object::String(stripped, *fmt));
                            }
                            Object::Integer(n) => {
                                x -= (*n as f32) / 1000.0 * state.font_size;
                                items.push(item.clone());
                            }
                            Object::Real(n) => {
                                x -= n / 1000.0 * state.font_size;
                                items.push(item.clone());
                            }
                            other => items.push(other.clone()),
                        }
                    }
                }

                if changed {
                    out.push(Operation::new("TJ", vec![Object::Array(items)]));
                } else {
                    out.push(op);
                }
            }
            _ => out.push(op),
        }
    }

    Content { operations: out }
        .encode()
        .map_err(|e| RedactError::Content(e.to_string()))
}

/// Second pass: append filled black rectangles over the given regions,
/// bracketed by q/Q so the page's graphics state is untouched.
pub(crate) fn paint_fill(content_data: &[u8], masks: &[PageRect]) -> Result<Vec<u8>> {
    let content = Content::decode(content_data).map_err(|e| RedactError::Content(e.to_string()))?;
    let mut ops = content.operations;

    ops.push(Operation::new("q", vec![]));
    ops.push(Operation::new(
        "rg",
        vec![Object::Real(0.0), Object::Real(0.0), Object::Real(0.0)],
    ));

    for rect in masks {
        ops.push(Operation::new(
            "re",
            vec![
                Object::Real(rect.x),
                Object::Real(rect.y),
                Object::Real(rect.width),
                Object::Real(rect.height),
            ],
        ));
        ops.push(Operation::new("f", vec![]));
    }

    ops.push(Operation::new("Q", vec![]));

    Content { operations: ops }
        .encode()
        .map_err(|e| RedactError::Content(e.to_string()))
}
