//! Indented syntax (`.sass`) support.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! grass only reads SCSS from strings, so `.sass` sources are lowered to
//! SCSS first. The lowering keeps every source line on the same output
//! line: block openers get ` {` at the end of the line, closers are put in
//! front of the next line, and statements get a trailing `;`.

/// A source line after comment handling.
#[derive(Debug)]
enum Line<'a> {
    Blank,
    /// Loud comment that fits on one line; emitted as-is.
    InlineComment(&'a str),
    Code { indent: usize, content: &'a str },
}

/// Lower indented-syntax source to equivalent SCSS.
pub fn lower_indented(source: &str) -> Result<String, String> {
    let lines = classify(source)?;
    let mut out: Vec<String> = Vec::with_capacity(lines.len() + 1);
    let mut open: Vec<usize> = Vec::new();

    let mut continuing = false;
    let mut logical_indent = 0usize;
    let mut in_import = false;

    for (n, line) in lines.iter().enumerate() {
        let (indent, content) = match line {
            Line::Blank => {
                out.push(String::new());
                continue;
            }
            Line::InlineComment(text) => {
                out.push((*text).to_string());
                continue;
            }
            Line::Code { indent, content } => (*indent, *content),
        };

        let mut text = String::new();
        let converted = if continuing {
            if in_import {
                quote_import_items(content)
            } else {
                content.to_string()
            }
        } else {
            while open.last().is_some_and(|&opener| opener >= indent) {
                open.pop();
                text.push_str("} ");
            }
            logical_indent = indent;
            in_import = content.starts_with("@import");
            convert_statement(content)
        };

        text.insert_str(0, &" ".repeat(indent));
        text.push_str(&converted);

        continuing = content.ends_with(',');
        if !continuing {
            in_import = false;
            let opens_block = next_code_indent(&lines, n + 1).is_some_and(|next| next > logical_indent);
            if opens_block {
                text.push_str(" {");
                open.push(logical_indent);
            } else if !converted.ends_with(';') {
                text.push(';');
            }
        }
        out.push(text);
    }

    if !open.is_empty() {
        out.push("}".repeat(open.len()));
    }

    let mut result = out.join("\n");
    if source.ends_with('\n') {
        result.push('\n');
    }
    Ok(result)
}

fn classify(source: &str) -> Result<Vec<Line<'_>>, String> {
    let mut lines = Vec::new();
    let mut comment_indent: Option<usize> = None;

    for (n, raw) in source.lines().enumerate() {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            lines.push(Line::Blank);
            continue;
        }
        let indent_str = &raw[..raw.len() - raw.trim_start().len()];
        if indent_str.contains(' ') && indent_str.contains('\t') {
            return Err(format!(
                "line {}: indentation mixes tabs and spaces",
                n + 1
            ));
        }
        let indent = indent_str.chars().count();

        if let Some(ci) = comment_indent {
            if indent > ci {
                lines.push(Line::Blank);
                continue;
            }
            comment_indent = None;
        }

        if trimmed.starts_with("//") {
            comment_indent = Some(indent);
            lines.push(Line::Blank);
            continue;
        }
        if trimmed.starts_with("/*") {
            if trimmed.ends_with("*/") {
                lines.push(Line::InlineComment(raw.trim_end()));
            } else {
                comment_indent = Some(indent);
                lines.push(Line::Blank);
            }
            continue;
        }

        let content = strip_line_comment(trimmed).trim_end();
        if content.is_empty() {
            lines.push(Line::Blank);
        } else {
            lines.push(Line::Code { indent, content });
        }
    }
    Ok(lines)
}

fn next_code_indent(lines: &[Line<'_>], from: usize) -> Option<usize> {
    lines[from..].iter().find_map(|line| match line {
        Line::Code { indent, .. } => Some(*indent),
        _ => None,
    })
}

/// Drop a trailing `// ...` comment outside strings and parentheses.
fn strip_line_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut quote: Option<u8> = None;
    let mut parens = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'(' => parens += 1,
                b')' => parens = parens.saturating_sub(1),
                b'/' if parens == 0 && bytes.get(i + 1) == Some(&b'/') => return &line[..i],
                _ => {}
            },
        }
        i += 1;
    }
    line
}

/// Rewrite the first line of a logical statement into SCSS form.
fn convert_statement(content: &str) -> String {
    if let Some(rest) = content.strip_prefix('=') {
        return format!("@mixin {}", rest.trim_start());
    }
    if let Some(rest) = content.strip_prefix('+') {
        return format!("@include {}", rest.trim_start());
    }
    if let Some(rest) = content.strip_prefix(':') {
        if rest.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return match rest.split_once(char::is_whitespace) {
                Some((prop, value)) => format!("{}: {}", prop, value.trim_start()),
                None => format!("{}:", rest),
            };
        }
    }
    if let Some(rest) = content.strip_prefix("@import") {
        if rest.starts_with(char::is_whitespace) {
            return format!("@import {}", quote_import_items(rest.trim_start()));
        }
    }
    content.to_string()
}

/// Quote bare import targets: `foo, bar` becomes `"foo", "bar"`.
fn quote_import_items(list: &str) -> String {
    let trailing_comma = list.trim_end().ends_with(',');
    let items: Vec<String> = list
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let quoted = item.starts_with('"') || item.starts_with('\'');
            let is_url = item.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("url("));
            if quoted || is_url {
                item.to_string()
            } else {
                format!("\"{}\"", item)
            }
        })
        .collect();

    let mut joined = items.join(", ");
    if trailing_comma {
        joined.push(',');
    }
    joined
}
