//! HTML-safe rendering of arbitrary values.
//!
//! Rendering never fails. Arrays are rendered recursively with each element
//! wrapped in its own `<span>`; a nested array that is already on the current
//! rendering path, or one nested deeper than [`MAX_RENDER_DEPTH`], is
//! truncated to `[...]`.

use std::fmt::Write;

use crate::value::{ArrayRef, Value};

/// Maximum array nesting rendered before truncating.
pub const MAX_RENDER_DEPTH: usize = 32;

/// Marker emitted in place of a truncated array.
pub const TRUNCATED: &str = "[...]";

/// Replaces `"`, `<`, `>`, `&` and every non-ASCII character with a numeric
/// character reference.
#[must_use]
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len().max(16));
    for c in s.chars() {
        if !c.is_ascii() || matches!(c, '"' | '<' | '>' | '&') {
            let _ = write!(out, "&#{};", u32::from(c));
        } else {
            out.push(c);
        }
    }
    out
}

/// Renders a value for embedding in an HTML page.
#[must_use]
pub fn render(value: &Value) -> String {
    let mut out = String::new();
    let mut path = Vec::new();
    render_into(value, &mut out, &mut path);
    out
}

/// Renders an operation's own failure, including its cause chain.
#[must_use]
pub fn render_failure(error: &anyhow::Error) -> String {
    escape_html(&format!("{error:#}"))
}

fn render_into(value: &Value, out: &mut String, path: &mut Vec<usize>) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(v) => out.push_str(&v.to_string()),
        Value::Char(v) => out.push_str(&escape_html(&v.to_string())),
        Value::I8(v) => out.push_str(&v.to_string()),
        Value::I16(v) => out.push_str(&v.to_string()),
        Value::I32(v) => out.push_str(&v.to_string()),
        Value::I64(v) => out.push_str(&v.to_string()),
        Value::F32(v) => out.push_str(&v.to_string()),
        Value::F64(v) => out.push_str(&v.to_string()),
        Value::Str(v) => out.push_str(&escape_html(v)),
        Value::Array(array) => render_array(array, out, path),
        Value::Object(object) => out.push_str(&escape_html(&object.to_string())),
    }
}

fn render_array(array: &ArrayRef, out: &mut String, path: &mut Vec<usize>) {
    let identity = array.identity();
    if path.len() >= MAX_RENDER_DEPTH || path.contains(&identity) {
        out.push_str(TRUNCATED);
        return;
    }

    path.push(identity);
    out.push('[');
    for (i, element) in array.snapshot().iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str("<span class=\"array-element\">");
        render_into(element, out, path);
        out.push_str("</span>");
    }
    out.push(']');
    path.pop();
}
