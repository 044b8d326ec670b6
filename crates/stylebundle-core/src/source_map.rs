//! Source map fragments and Source Map v3 output.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! The compiler collaborator does not report positions, so fragments are
//! line-level: each generated line that opens a rule or holds a declaration
//! is matched to the source line it most plausibly came from. Plain CSS maps
//! line for line.

use std::collections::HashMap;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::asset::AssetId;

/// Zero-based position pair in one fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    pub generated_line: u32,
    pub generated_column: u32,
    pub source_line: u32,
    pub source_column: u32,
}

/// Mappings from one asset's compiled CSS back to its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMapFragment {
    pub source: AssetId,
    pub source_content: Option<String>,
    pub mappings: Vec<Mapping>,
}

impl SourceMapFragment {
    /// Line-for-line mapping for output that is the source itself.
    pub fn identity(source: AssetId, content: &str) -> Self {
        let mappings = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                let indent = indent_of(line);
                Mapping {
                    generated_line: i as u32,
                    generated_column: indent,
                    source_line: i as u32,
                    source_column: indent,
                }
            })
            .collect();
        Self {
            source,
            source_content: Some(content.to_string()),
            mappings,
        }
    }

    /// Heuristic mapping of compiled CSS back to a preprocessor source.
    ///
    /// `search_text` is what gets matched against (for the indented syntax,
    /// the lowered text whose lines correspond 1:1 to the source);
    /// `source_content` is embedded in the map. Matching never moves
    /// backwards in the source.
    pub fn from_compiled(
        source: AssetId,
        source_content: &str,
        search_text: &str,
        css: &str,
    ) -> Self {
        let source_lines: Vec<&str> = search_text.lines().collect();
        let mut cursor = 0usize;
        let mut mappings = Vec::new();

        for (gen_line, line) in css.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed == "}" {
                continue;
            }
            let candidates = match_tokens(trimmed);
            if let Some((src_line, src_col)) = find_forward(&source_lines, cursor, &candidates) {
                cursor = src_line;
                mappings.push(Mapping {
                    generated_line: gen_line as u32,
                    generated_column: indent_of(line),
                    source_line: src_line as u32,
                    source_column: src_col as u32,
                });
            }
        }

        Self {
            source,
            source_content: Some(source_content.to_string()),
            mappings,
        }
    }
}

fn indent_of(line: &str) -> u32 {
    (line.len() - line.trim_start().len()) as u32
}

/// Tokens to look for in the source, most specific first.
fn match_tokens(line: &str) -> Vec<String> {
    if let Some(prelude) = line.strip_suffix('{') {
        let first = prelude.split(',').next().unwrap_or("").trim();
        let mut tokens = Vec::new();
        if let Some(last) = first.split_whitespace().last() {
            tokens.push(last.to_string());
        }
        if let Some(head) = first.split_whitespace().next() {
            if !tokens.iter().any(|t| t == head) {
                tokens.push(head.to_string());
            }
        }
        tokens
    } else if let Some((prop, _)) = line.split_once(':') {
        vec![format!("{}:", prop.trim())]
    } else {
        Vec::new()
    }
}

fn find_forward(lines: &[&str], cursor: usize, tokens: &[String]) -> Option<(usize, usize)> {
    for token in tokens {
        for (i, line) in lines.iter().enumerate().skip(cursor) {
            if let Some(col) = line.find(token.as_str()) {
                return Some((i, col));
            }
        }
    }
    None
}

/// A Source Map v3 document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u8,
    pub file: String,
    pub sources: Vec<String>,
    pub sources_content: Vec<Option<String>>,
    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMap {
    pub fn to_json(&self) -> String {
        // Serializing plain strings and integers cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Merges per-asset fragments into a single map over the flattened output.
#[derive(Debug)]
pub struct SourceMapBuilder {
    file: String,
    sources: Vec<String>,
    sources_content: Vec<Option<String>>,
    source_index: HashMap<AssetId, u32>,
    /// (generated line, generated column, source index, source line, source column)
    segments: Vec<(u32, u32, u32, u32, u32)>,
}

impl SourceMapBuilder {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            sources: Vec::new(),
            sources_content: Vec::new(),
            source_index: HashMap::new(),
            segments: Vec::new(),
        }
    }

    /// Add a fragment whose generated line 0 lands on `line_offset` of the
    /// combined output. `source_name` is how the map refers to the source.
    pub fn add_fragment(&mut self, fragment: &SourceMapFragment, line_offset: u32, source_name: &str) {
        let src = match self.source_index.get(&fragment.source) {
            Some(&idx) => idx,
            None => {
                let idx = self.sources.len() as u32;
                self.sources.push(source_name.to_string());
                self.sources_content.push(fragment.source_content.clone());
                self.source_index.insert(fragment.source.clone(), idx);
                idx
            }
        };
        for m in &fragment.mappings {
            self.segments.push((
                m.generated_line + line_offset,
                m.generated_column,
                src,
                m.source_line,
                m.source_column,
            ));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn build(mut self) -> SourceMap {
        self.segments.sort_by_key(|s| (s.0, s.1));

        let mut mappings = String::new();
        let mut line = 0u32;
        let mut prev_col = 0i64;
        let mut prev_src = 0i64;
        let mut prev_src_line = 0i64;
        let mut prev_src_col = 0i64;
        let mut first_in_line = true;

        for &(gen_line, gen_col, src, src_line, src_col) in &self.segments {
            while line < gen_line {
                mappings.push(';');
                line += 1;
                prev_col = 0;
                first_in_line = true;
            }
            if !first_in_line {
                mappings.push(',');
            }
            first_in_line = false;

            encode_vlq(gen_col as i64 - prev_col, &mut mappings);
            encode_vlq(src as i64 - prev_src, &mut mappings);
            encode_vlq(src_line as i64 - prev_src_line, &mut mappings);
            encode_vlq(src_col as i64 - prev_src_col, &mut mappings);

            prev_col = gen_col as i64;
            prev_src = src as i64;
            prev_src_line = src_line as i64;
            prev_src_col = src_col as i64;
        }

        SourceMap {
            version: 3,
            file: self.file,
            sources: self.sources,
            sources_content: self.sources_content,
            names: Vec::new(),
            mappings,
        }
    }
}

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Append the base64 VLQ encoding of `value`.
pub fn encode_vlq(value: i64, out: &mut String) {
    let signed = if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    };
    let mut vlq = signed as u64;
    loop {
        let mut digit = (vlq & 0b11111) as usize;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0b100000;
        }
        out.push(BASE64[digit] as char);
        if vlq == 0 {
            break;
        }
    }
}

/// Forward-slash path of `target` relative to the directory `base`.
/// Both paths are expected to be absolute.
pub fn relative_path(base: &Path, target: &Path) -> String {
    let base: Vec<Component> = base.components().collect();
    let target: Vec<Component> = target.components().collect();
    let common = base
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    for _ in common..base.len() {
        parts.push("..".to_string());
    }
    for c in &target[common..] {
        parts.push(c.as_os_str().to_string_lossy().into_owned());
    }
    parts.join("/")
}
