//! SCSS adapter: top-level `@import` extraction and isolated compilation.
//!
//! Copyright (c) 2025 Posit, PBC

use stylebundle_runtime::RuntimeError;
use stylebundle_runtime::sass_native::compile_scss_isolated;

use super::{CompileOptions, Compiled};
use crate::asset::AssetId;
use crate::config::OutputStyle;
use crate::error::{BuildError, Result};
use crate::links::{extract_links, is_external, is_ident_byte, skip_comment, skip_string};
use crate::source_map::SourceMapFragment;

/// Which import rules the extractor applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `//` comments; `@import "x.css"` stays a plain CSS import.
    Scss,
    /// Plain CSS: relative `.css` imports are bundled.
    Css,
}

/// Source with module imports removed, plus the removed references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedImports {
    pub source: String,
    pub imports: Vec<String>,
}

/// Remove top-level `@import` statements that name other stylesheets.
///
/// Plain CSS imports (`url(...)`, absolute URLs, imports with a media
/// query and, for SCSS, `.css` files) stay in place. A removed statement
/// leaves its newlines behind so line numbers are unchanged.
pub fn extract_imports(source: &str, dialect: Dialect) -> ExtractedImports {
    let bytes = source.as_bytes();
    let mut out = String::with_capacity(source.len());
    let mut imports = Vec::new();
    let mut depth = 0usize;
    let mut last = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_comment(bytes, i),
            b'/' if dialect == Dialect::Scss && bytes.get(i + 1) == Some(&b'/') => {
                i = skip_line(bytes, i);
            }
            b'"' | b'\'' => i = skip_string(bytes, i),
            b'u' | b'U'
                if starts_with_ci(bytes, i, b"url(") && (i == 0 || !is_ident_byte(bytes[i - 1])) =>
            {
                i = skip_parens(bytes, i + 3);
            }
            b'{' => {
                depth += 1;
                i += 1;
            }
            b'}' => {
                depth = depth.saturating_sub(1);
                i += 1;
            }
            b'@' if depth == 0 && is_import_at(bytes, i) => {
                let end = statement_end(bytes, i + "@import".len());
                let body = source[i + "@import".len()..end].trim_end_matches(';');
                let (modules, plain) = split_import_list(body, dialect);

                if !modules.is_empty() {
                    out.push_str(&source[last..i]);
                    if !plain.is_empty() {
                        out.push_str("@import ");
                        out.push_str(&plain.join(", "));
                        out.push(';');
                    }
                    out.extend(source[i..end].chars().filter(|c| *c == '\n'));
                    last = end;
                    imports.extend(modules);
                }
                i = end;
            }
            _ => i += 1,
        }
    }
    out.push_str(&source[last..]);

    ExtractedImports {
        source: out,
        imports,
    }
}

fn starts_with_ci(bytes: &[u8], i: usize, pat: &[u8]) -> bool {
    bytes.len() >= i + pat.len() && bytes[i..i + pat.len()].eq_ignore_ascii_case(pat)
}

fn is_import_at(bytes: &[u8], i: usize) -> bool {
    starts_with_ci(bytes, i, b"@import")
        && bytes
            .get(i + "@import".len())
            .is_some_and(|b| b.is_ascii_whitespace() || *b == b'"' || *b == b'\'')
}

fn skip_line(bytes: &[u8], i: usize) -> usize {
    bytes[i..]
        .iter()
        .position(|b| *b == b'\n')
        .map_or(bytes.len(), |p| i + p)
}

/// `i` points at `(`; returns the index past the matching `)`.
fn skip_parens(bytes: &[u8], i: usize) -> usize {
    let mut depth = 0usize;
    let mut j = i;
    while j < bytes.len() {
        match bytes[j] {
            b'"' | b'\'' => {
                j = skip_string(bytes, j);
                continue;
            }
            b'(' => depth += 1,
            b')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return j + 1;
                }
            }
            _ => {}
        }
        j += 1;
    }
    bytes.len()
}

/// Index past the `;` terminating the statement that starts before `i`,
/// or the start of a `}`/end of input when the terminator is missing.
fn statement_end(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'(' => {
                i = skip_parens(bytes, i);
                continue;
            }
            b';' => return i + 1,
            b'}' | b'{' => return i,
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

/// Split an import list into module references and items that stay as
/// plain CSS imports (kept verbatim).
fn split_import_list(body: &str, dialect: Dialect) -> (Vec<String>, Vec<String>) {
    let mut modules = Vec::new();
    let mut plain = Vec::new();

    for item in split_top_level_commas(body) {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        match module_reference(item, dialect) {
            Some(reference) => modules.push(reference),
            None => plain.push(item.to_string()),
        }
    }
    (modules, plain)
}

fn module_reference(item: &str, dialect: Dialect) -> Option<String> {
    if item.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("url(")) {
        return None;
    }
    let bytes = item.as_bytes();
    let (value, rest) = if bytes[0] == b'"' || bytes[0] == b'\'' {
        let end = skip_string(bytes, 0);
        if end < 2 || bytes[end - 1] != bytes[0] {
            return None;
        }
        (&item[1..end - 1], item[end..].trim())
    } else {
        match item.split_once(char::is_whitespace) {
            Some((value, rest)) => (value, rest.trim()),
            None => (item, ""),
        }
    };

    // A media query or supports() condition makes it a plain CSS import.
    if !rest.is_empty() || value.is_empty() || is_external(value) {
        return None;
    }
    if dialect == Dialect::Scss && value.to_ascii_lowercase().ends_with(".css") {
        return None;
    }
    Some(value.to_string())
}

fn split_top_level_commas(body: &str) -> Vec<&str> {
    let bytes = body.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'(' => {
                i = skip_parens(bytes, i);
                continue;
            }
            b',' => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&body[start..]);
    parts
}

/// Compile SCSS text belonging to `id`.
///
/// `scss` is what grass sees; `original` is the file content as read (it
/// differs for the indented syntax) and is embedded in the source map.
pub(super) fn compile(
    id: &AssetId,
    scss: &str,
    original: &str,
    options: &CompileOptions,
) -> Result<Compiled> {
    let extracted = extract_imports(scss, Dialect::Scss);

    if extracted.source.trim().is_empty() {
        return Ok(Compiled {
            imports: extracted.imports,
            ..Compiled::default()
        });
    }

    let minified = options.output_style == OutputStyle::Compressed;
    let css = compile_scss_isolated(&extracted.source, minified).map_err(|e| {
        let message = match e {
            RuntimeError::SassError(msg) => msg,
            other => other.to_string(),
        };
        BuildError::Compile {
            asset: id.clone(),
            message,
        }
    })?;

    if css.trim().is_empty() {
        return Ok(Compiled {
            imports: extracted.imports,
            ..Compiled::default()
        });
    }

    let source_map = (options.source_maps && !minified).then(|| {
        SourceMapFragment::from_compiled(id.clone(), original, &extracted.source, &css)
    });

    Ok(Compiled {
        links: extract_links(&css),
        css,
        imports: extracted.imports,
        source_map,
    })
}
