//! Whitespace and comment removal.
//!
//! Copyright (c) 2025 Posit, PBC

use super::{CssTransform, TransformContext};
use crate::error::Result;
use crate::links::{is_ident_byte, skip_comment, skip_string};

pub struct Minify;

impl CssTransform for Minify {
    fn name(&self) -> &str {
        "minify"
    }

    fn transform(&self, css: &mut String, ctx: &mut TransformContext<'_>) -> Result<()> {
        let before = css.len();
        *css = minify_css(css);
        ctx.lines_preserved = false;
        ctx.sources.clear();
        tracing::debug!(asset = %ctx.asset, before, after = css.len(), "minified");
        Ok(())
    }
}

fn is_tight(b: u8) -> bool {
    matches!(b, b'{' | b'}' | b';' | b',')
}

/// Remove comments and insignificant whitespace.
///
/// Whitespace runs collapse to one space, and disappear entirely next to
/// `{`, `}`, `;` and `,`. A `;` directly before `}` is dropped. String
/// literals and `url()` arguments are copied verbatim.
pub fn minify_css(css: &str) -> String {
    let bytes = css.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(css.len());
    let mut pending_space = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];

        if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
            i = skip_comment(bytes, i);
            pending_space = true;
            continue;
        }
        if b.is_ascii_whitespace() {
            pending_space = true;
            i += 1;
            continue;
        }

        if pending_space {
            let prev = out.last().copied();
            if prev.is_some_and(|p| !is_tight(p)) && !is_tight(b) {
                out.push(b' ');
            }
            pending_space = false;
        }

        match b {
            b'"' | b'\'' => {
                let end = skip_string(bytes, i);
                out.extend_from_slice(&bytes[i..end]);
                i = end;
            }
            b'(' if out.len() >= 3
                && out[out.len() - 3..].eq_ignore_ascii_case(b"url")
                && (out.len() == 3 || !is_ident_byte(out[out.len() - 4])) =>
            {
                let close = bytes[i..]
                    .iter()
                    .position(|c| *c == b')')
                    .map_or(bytes.len(), |p| i + p + 1);
                out.extend_from_slice(&bytes[i..close]);
                i = close;
            }
            b'}' => {
                if out.last() == Some(&b';') {
                    out.pop();
                }
                out.push(b);
                i += 1;
            }
            _ => {
                out.push(b);
                i += 1;
            }
        }
    }

    // Only ASCII bytes were removed, so the result is still UTF-8.
    String::from_utf8(out).unwrap_or_default()
}
