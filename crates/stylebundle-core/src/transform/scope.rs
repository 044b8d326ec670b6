//! Class scoping.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Rewrites every class selector in rule preludes to a name derived from
//! the identity of the stylesheet that first declares the class, so class
//! names from different stylesheets cannot collide. Declarations, strings, comments and the bodies of
//! at-rules such as `@keyframes` and `@font-face` are left alone.

use super::{ClassMap, CssTransform, TransformContext};
use crate::error::Result;
use crate::hash::short_base36;
use crate::links::{is_ident_byte, skip_comment, skip_string};

/// Length of the hash suffix of scoped names.
const SCOPE_HASH_LEN: usize = 5;

/// At-rules whose blocks contain style rules.
const GROUPING_AT_RULES: &[&str] = &["media", "supports", "document", "layer", "container", "scope"];

/// `_<class>_<hash>` for `class` declared in the stylesheet at `relative_id`.
pub fn scoped_class_name(relative_id: &str, class: &str) -> String {
    format!(
        "_{}_{}",
        class,
        short_base36(&format!("{}:{}", relative_id, class), SCOPE_HASH_LEN)
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    /// Top level or a grouping at-rule: preludes are selectors.
    Rules,
    /// Inside a style rule: nested preludes are selectors too.
    Style,
    /// Anything else; never rewritten.
    Opaque,
}

pub struct ScopeClasses;

impl CssTransform for ScopeClasses {
    fn name(&self) -> &str {
        "scope-classes"
    }

    fn transform(&self, css: &mut String, ctx: &mut TransformContext<'_>) -> Result<()> {
        let fallback = ctx.asset.relative_to(ctx.project_root);
        let sources: Vec<(usize, String)> = ctx
            .sources
            .iter()
            .map(|(start, id)| (*start, id.relative_to(ctx.project_root)))
            .collect();
        let mut class_map = ctx.class_map.take().unwrap_or_default();
        *css = scope_css(css, &sources, &fallback, &mut class_map);
        tracing::debug!(asset = %ctx.asset, classes = class_map.len(), "scoped classes");
        ctx.class_map = Some(class_map);
        ctx.sources.clear();
        Ok(())
    }
}

/// The stylesheet whose text contains byte `pos`.
fn source_at<'s>(sources: &'s [(usize, String)], pos: usize) -> Option<&'s str> {
    sources
        .iter()
        .rev()
        .find(|(start, _)| *start <= pos)
        .map(|(_, id)| id.as_str())
}

fn scope_css(css: &str, sources: &[(usize, String)], fallback: &str, class_map: &mut ClassMap) -> String {
    let bytes = css.as_bytes();
    let mut out = String::with_capacity(css.len() + css.len() / 4);
    let mut stack = vec![Block::Rules];
    let mut segment_start = 0usize;
    let mut copied = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_comment(bytes, i),
            b'"' | b'\'' => i = skip_string(bytes, i),
            b';' => {
                segment_start = i + 1;
                i += 1;
            }
            b'}' => {
                if stack.len() > 1 {
                    stack.pop();
                }
                segment_start = i + 1;
                i += 1;
            }
            b'{' => {
                let parent = stack.last().copied().unwrap_or(Block::Rules);
                let prelude_start = skip_blank(bytes, segment_start);
                let block = if parent == Block::Opaque {
                    Block::Opaque
                } else if bytes.get(prelude_start) == Some(&b'@') {
                    at_rule_block(&css[prelude_start..i])
                } else {
                    let relative_id = source_at(sources, prelude_start).unwrap_or(fallback);
                    out.push_str(&css[copied..prelude_start]);
                    out.push_str(&scope_prelude(&css[prelude_start..i], relative_id, class_map));
                    copied = i;
                    Block::Style
                };
                stack.push(block);
                segment_start = i + 1;
                i += 1;
            }
            _ => i += 1,
        }
    }
    out.push_str(&css[copied..]);
    out
}

/// Skip whitespace and comments.
fn skip_blank(bytes: &[u8], mut i: usize) -> usize {
    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if bytes.get(i) == Some(&b'/') && bytes.get(i + 1) == Some(&b'*') {
            i = skip_comment(bytes, i);
        } else {
            return i;
        }
    }
}

fn at_rule_block(prelude: &str) -> Block {
    let name: String = prelude[1..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect::<String>()
        .to_ascii_lowercase();
    if GROUPING_AT_RULES.contains(&name.as_str()) {
        Block::Rules
    } else {
        Block::Opaque
    }
}

fn scope_prelude(prelude: &str, relative_id: &str, class_map: &mut ClassMap) -> String {
    let bytes = prelude.as_bytes();
    let mut out = String::with_capacity(prelude.len() * 2);
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_comment(bytes, i),
            b'"' | b'\'' => i = skip_string(bytes, i),
            b'.' => {
                let end = class_name_end(bytes, i + 1);
                if end > i + 1 && !bytes[i + 1].is_ascii_digit() {
                    let class = &prelude[i + 1..end];
                    let scoped = class_map
                        .entry(class.to_string())
                        .or_insert_with(|| scoped_class_name(relative_id, class));
                    out.push_str(&prelude[copied..i + 1]);
                    out.push_str(scoped);
                    copied = end;
                }
                i = end.max(i + 1);
            }
            _ => i += 1,
        }
    }
    out.push_str(&prelude[copied..]);
    out
}

fn class_name_end(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() {
            i += 2;
        } else if is_ident_byte(bytes[i]) {
            i += 1;
        } else {
            break;
        }
    }
    i
}
