//! Stylesheet imports in code entries.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Code modules are not bundled. They are only scanned for the
//! stylesheets they import, and each such import is replaced by the
//! stylesheet module value (the class map, or `{}`).

use std::path::Path;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::links::{skip_comment, skip_string};
use crate::resolve::STYLESHEET_EXTENSIONS;

/// Extensions treated as code entries.
pub const SCRIPT_EXTENSIONS: &[&str] = &["js", "mjs", "cjs", "jsx", "ts", "tsx"];

/// `require('x')`, `import n from 'x'`, `import * as n from 'x'` and `import 'x'`.
static IMPORT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?x)
        \brequire\(\s*(?:'(?P<req_sq>[^'\n]+)'|"(?P<req_dq>[^"\n]+)")\s*\)
        | \bimport\s+(?P<ns>\*\s+as\s+)?(?P<binding>[A-Za-z_$][\w$]*)\s+from\s+
          (?:'(?P<from_sq>[^'\n]+)'|"(?P<from_dq>[^"\n]+)")[\ \t]*;?
        | \bimport\s+(?:'(?P<bare_sq>[^'\n]+)'|"(?P<bare_dq>[^"\n]+)")[\ \t]*;?
        "#,
    )
    .unwrap()
});

pub fn is_script_extension(ext: &str) -> bool {
    SCRIPT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
}

/// Syntactic form of a stylesheet import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportStyle {
    /// `require('x.scss')`; the call expression is replaced.
    Require,
    /// `import name from 'x.scss'`
    Default { binding: String },
    /// `import * as name from 'x.scss'`
    Namespace { binding: String },
    /// `import 'x.scss'`; removed.
    Bare,
}

/// One stylesheet import found in a code module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StylesheetImport {
    pub specifier: String,
    pub style: ImportStyle,
    /// Byte range of the statement or call in the code.
    pub start: usize,
    pub end: usize,
}

fn is_stylesheet_specifier(specifier: &str) -> bool {
    let path = specifier.split(['?', '#']).next().unwrap_or(specifier);
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| STYLESHEET_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

fn specifier<'a>(caps: &'a Captures<'_>, names: [&str; 2]) -> Option<&'a str> {
    names
        .iter()
        .find_map(|name| caps.name(name))
        .map(|m| m.as_str())
}

/// Index just past the template literal starting at `i`.
fn skip_template(bytes: &[u8], i: usize) -> usize {
    let mut j = i + 1;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b'`' => return j + 1,
            _ => j += 1,
        }
    }
    bytes.len()
}

/// Byte ranges of comments and string literals, in order.
fn inert_ranges(code: &str) -> Vec<(usize, usize)> {
    let bytes = code.as_bytes();
    let mut ranges = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let end = match (bytes[i], bytes.get(i + 1).copied()) {
            (b'/', Some(b'/')) => bytes[i..]
                .iter()
                .position(|&b| b == b'\n')
                .map_or(bytes.len(), |n| i + n),
            (b'/', Some(b'*')) => skip_comment(bytes, i),
            (b'"' | b'\'', _) => skip_string(bytes, i),
            (b'`', _) => skip_template(bytes, i),
            _ => {
                i += 1;
                continue;
            }
        };
        ranges.push((i, end));
        i = end.max(i + 1);
    }
    ranges
}

/// Find stylesheet imports in `code`, in source order. Imports of other
/// modules, and anything inside comments or string literals, are ignored.
pub fn scan_stylesheet_imports(code: &str) -> Vec<StylesheetImport> {
    let inert = inert_ranges(code);
    let is_inert = |pos: usize| inert.iter().any(|&(start, end)| start <= pos && pos < end);

    IMPORT_PATTERN
        .captures_iter(code)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            if is_inert(whole.start()) {
                return None;
            }
            let (spec, style) = if let Some(spec) = specifier(&caps, ["req_sq", "req_dq"]) {
                (spec, ImportStyle::Require)
            } else if let Some(spec) = specifier(&caps, ["from_sq", "from_dq"]) {
                let binding = caps.name("binding")?.as_str().to_string();
                if caps.name("ns").is_some() {
                    (spec, ImportStyle::Namespace { binding })
                } else {
                    (spec, ImportStyle::Default { binding })
                }
            } else {
                (specifier(&caps, ["bare_sq", "bare_dq"])?, ImportStyle::Bare)
            };

            is_stylesheet_specifier(spec).then(|| StylesheetImport {
                specifier: spec.to_string(),
                style,
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

/// Replace each import with the module value returned by `value_for`.
pub fn rewrite_script<F>(code: &str, imports: &[StylesheetImport], mut value_for: F) -> String
where
    F: FnMut(&StylesheetImport) -> String,
{
    let mut out = String::with_capacity(code.len());
    let mut last = 0;
    for import in imports {
        out.push_str(&code[last..import.start]);
        match &import.style {
            ImportStyle::Require => out.push_str(&value_for(import)),
            ImportStyle::Default { binding } | ImportStyle::Namespace { binding } => {
                out.push_str(&format!("const {} = {};", binding, value_for(import)));
            }
            ImportStyle::Bare => {}
        }
        last = import.end;
    }
    out.push_str(&code[last..]);
    out
}
