//! SASS compilation using the grass crate.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! grass is a pure Rust implementation that targets dart-sass 1.54.3.
//! Each stylesheet is compiled in isolation: the compiler is handed
//! `grass::NullFs`, so any `@import`/`@use` of a file that was not removed
//! from the source beforehand fails instead of silently reading from disk.
//! Built-in modules (`sass:math`, `sass:color`, ...) still work.

use grass::{NullFs, Options, OutputStyle};

use crate::traits::{RuntimeError, RuntimeResult};

/// Compile a single SCSS source to CSS without file system access.
///
/// # Arguments
///
/// * `scss` - The SCSS source code to compile
/// * `minified` - Whether to produce compressed output
///
/// # Returns
///
/// Compiled CSS string on success, `RuntimeError::SassError` on failure.
pub fn compile_scss_isolated(scss: &str, minified: bool) -> RuntimeResult<String> {
    let style = if minified {
        OutputStyle::Compressed
    } else {
        OutputStyle::Expanded
    };

    let options = Options::default().fs(&NullFs).style(style).quiet(true);

    tracing::trace!(bytes = scss.len(), minified, "compiling scss with grass");
    grass::from_string(scss.to_string(), &options)
        .map_err(|e| RuntimeError::SassError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_simple_scss() {
        let scss = "$primary: #007bff; .btn { color: $primary; }";

        let css = compile_scss_isolated(scss, false).unwrap();

        assert!(css.contains(".btn"));
        assert!(css.contains("#007bff"));
    }

    #[test]
    fn test_compile_scss_minified() {
        let scss = "$primary: blue;\n\n.btn {\n  color: $primary;\n}";

        let css = compile_scss_isolated(scss, true).unwrap();

        assert!(!css.contains("\n\n"));
        assert!(css.contains(".btn"));
        assert!(css.contains("blue"));
    }

    #[test]
    fn test_compile_scss_nesting() {
        let scss = ".card { .title { font-weight: bold; } }";

        let css = compile_scss_isolated(scss, false).unwrap();

        assert!(css.contains(".card .title"));
    }

    #[test]
    fn test_compile_scss_builtin_module() {
        let scss = "@use \"sass:math\";\n.box { width: math.div(100px, 2); }";

        let css = compile_scss_isolated(scss, false).unwrap();

        assert!(css.contains("50px"));
    }

    #[test]
    fn test_compile_scss_cannot_read_files() {
        let scss = "@import \"variables\";\n.a { color: red; }";

        let result = compile_scss_isolated(scss, false);

        assert!(matches!(result, Err(RuntimeError::SassError(_))));
    }

    #[test]
    fn test_compile_scss_syntax_error() {
        let result = compile_scss_isolated(".broken { color: red;", false);

        let err = result.unwrap_err();
        assert!(err.to_string().contains("SASS compilation error"));
    }
}
