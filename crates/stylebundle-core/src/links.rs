//! `url()` reference scanning and rewriting.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! The scanner understands just enough CSS to avoid false positives: it
//! skips comments and string literals and only accepts `url(` when it is
//! not the tail of a longer identifier.

use once_cell::sync::Lazy;
use regex::Regex;

/// `scheme:` prefix of an absolute URL (`http:`, `data:`, `mailto:` ...).
static URL_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").unwrap());

/// One `url(...)` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlToken {
    /// Byte offset of `u` in `url(`.
    pub start: usize,
    /// Byte offset just past the closing `)`.
    pub end: usize,
    /// The reference, without quotes or surrounding whitespace.
    pub value: String,
}

/// Whether a reference points outside the project and must be left alone:
/// absolute URLs, protocol-relative URLs, data URIs and fragment references.
pub fn is_external(reference: &str) -> bool {
    reference.starts_with("//") || reference.starts_with('#') || URL_SCHEME.is_match(reference)
}

pub(crate) fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b >= 0x80
}

/// Index just past the comment starting at `i` (which must point at `/*`).
pub(crate) fn skip_comment(bytes: &[u8], i: usize) -> usize {
    let mut j = i + 2;
    while j + 1 < bytes.len() {
        if bytes[j] == b'*' && bytes[j + 1] == b'/' {
            return j + 2;
        }
        j += 1;
    }
    bytes.len()
}

/// Index just past the string literal starting at `i` (which must point at the quote).
pub(crate) fn skip_string(bytes: &[u8], i: usize) -> usize {
    let quote = bytes[i];
    let mut j = i + 1;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b if b == quote => return j + 1,
            b'\n' => return j,
            _ => j += 1,
        }
    }
    bytes.len()
}

/// Find every `url()` occurrence in `css`, in order.
pub fn find_urls(css: &str) -> Vec<UrlToken> {
    let bytes = css.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_comment(bytes, i),
            b'"' | b'\'' => i = skip_string(bytes, i),
            b'u' | b'U'
                if bytes.len() >= i + 4
                    && bytes[i..i + 4].eq_ignore_ascii_case(b"url(")
                    && (i == 0 || !is_ident_byte(bytes[i - 1])) =>
            {
                match parse_url_args(css, i + 4) {
                    Some((value, end)) => {
                        tokens.push(UrlToken {
                            start: i,
                            end,
                            value,
                        });
                        i = end;
                    }
                    None => i += 4,
                }
            }
            _ => i += 1,
        }
    }

    tokens
}

/// Parse the argument of `url(` starting at `start`; returns the value and
/// the offset past `)`.
fn parse_url_args(css: &str, start: usize) -> Option<(String, usize)> {
    let bytes = css.as_bytes();
    let mut j = start;
    while j < bytes.len() && bytes[j].is_ascii_whitespace() {
        j += 1;
    }

    if j < bytes.len() && (bytes[j] == b'"' || bytes[j] == b'\'') {
        let end_quote = skip_string(bytes, j);
        if end_quote > bytes.len() || bytes.get(end_quote - 1) != Some(&bytes[j]) {
            return None;
        }
        let value = &css[j + 1..end_quote - 1];
        let mut k = end_quote;
        while k < bytes.len() && bytes[k].is_ascii_whitespace() {
            k += 1;
        }
        if bytes.get(k) != Some(&b')') {
            return None;
        }
        return Some((value.to_string(), k + 1));
    }

    let close = css[j..].find(')')? + j;
    let value = css[j..close].trim();
    if value.contains(char::is_whitespace) {
        return None;
    }
    Some((value.to_string(), close + 1))
}

/// Distinct, non-empty `url()` references in order of first occurrence.
pub fn extract_links(css: &str) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    for token in find_urls(css) {
        if !token.value.is_empty() && !links.contains(&token.value) {
            links.push(token.value);
        }
    }
    links
}

/// Replace `url()` occurrences for which `replacement` returns a new
/// reference with `url("<new>")`. Other occurrences are kept byte for byte.
pub fn rewrite_links<F>(css: &str, mut replacement: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(css.len());
    let mut last = 0;
    for token in find_urls(css) {
        if let Some(new_ref) = replacement(&token.value) {
            out.push_str(&css[last..token.start]);
            out.push_str("url(\"");
            out.push_str(&new_ref);
            out.push_str("\")");
            last = token.end;
        }
    }
    out.push_str(&css[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_quoted_and_unquoted() {
        let css = r#"@font-face { src: url("test.woff2") format("woff2"), url( 'a b.ttf' ); }
.bg { background: URL(img/bg.png) no-repeat; }"#;
        let values: Vec<String> = find_urls(css).into_iter().map(|t| t.value).collect();
        assert_eq!(values, vec!["test.woff2", "a b.ttf", "img/bg.png"]);
    }

    #[test]
    fn test_ignores_comments_strings_and_identifiers() {
        let css = r#"/* url(commented.png) */
.a { content: "url(in-string.png)"; background: myurl(nope.png); }
.b { background: url(yes.png); }"#;
        assert_eq!(extract_links(css), vec!["yes.png"]);
    }

    #[test]
    fn test_extract_links_dedups_in_order() {
        let css = ".a { background: url(b.png); } .c { background: url(a.png), url(b.png); }";
        assert_eq!(extract_links(css), vec!["b.png", "a.png"]);
    }

    #[test]
    fn test_rewrite_links() {
        let css = r#".a { src: url(test.woff2); } .b { background: url("http://google.com"); }"#;
        let rewritten = rewrite_links(css, |value| {
            (value == "test.woff2").then(|| "test.0badc0de.woff2".to_string())
        });
        assert_eq!(
            rewritten,
            r#".a { src: url("test.0badc0de.woff2"); } .b { background: url("http://google.com"); }"#
        );
    }

    #[test]
    fn test_unterminated_url_is_ignored() {
        assert!(find_urls(".a { background: url(broken.png; }").is_empty());
        assert!(find_urls(".a { background: url(\"x.png\"").is_empty());
    }

    #[test]
    fn test_is_external() {
        assert!(is_external("http://google.com"));
        assert!(is_external("https://example.com/font.woff"));
        assert!(is_external("//cdn.example.com/a.png"));
        assert!(is_external("data:image/png;base64,AAAA"));
        assert!(is_external("#gradient"));
        assert!(!is_external("test.woff2"));
        assert!(!is_external("../fonts/test.woff2"));
        assert!(!is_external("/abs/path.png"));
    }
}
