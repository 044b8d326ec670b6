//! Compile adapters.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Each adapter turns the bytes of one file into plain CSS plus the raw
//! references it found. Adapters never look at other files: imports are
//! cut out of the source before compilation and reported back to the
//! graph builder, which compiles the imported files separately.
//!
//! # Architecture
//!
//! The adapter is picked from the file extension by [`CompilerKind`]:
//! 1. `.scss` - import extraction, then grass with no file system
//! 2. `.sass` - lowered to SCSS, then the same path
//! 3. `.css` - passthrough with `@import` extraction

mod css;
pub mod sass;
pub mod scss;

use crate::asset::AssetId;
use crate::config::OutputStyle;
use crate::error::{BuildError, Result};
use crate::source_map::SourceMapFragment;

/// Settings shared by every compile of one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    pub output_style: OutputStyle,
    pub source_maps: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            output_style: OutputStyle::Expanded,
            source_maps: true,
        }
    }
}

/// Normalized compiler output for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compiled {
    pub css: String,
    /// Raw import references in source order.
    pub imports: Vec<String>,
    /// Distinct raw `url()` references in order of first occurrence.
    pub links: Vec<String>,
    pub source_map: Option<SourceMapFragment>,
}

/// The stylesheet syntaxes the builder can compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompilerKind {
    Scss,
    Sass,
    Css,
}

impl CompilerKind {
    /// Pick the adapter for a file extension (case-insensitive).
    pub fn for_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "scss" => Some(Self::Scss),
            "sass" => Some(Self::Sass),
            "css" => Some(Self::Css),
            _ => None,
        }
    }

    pub fn for_asset(id: &AssetId) -> Option<Self> {
        id.extension().as_deref().and_then(Self::for_extension)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Scss => "scss",
            Self::Sass => "sass",
            Self::Css => "css",
        }
    }

    /// Compile one file.
    ///
    /// Empty (or whitespace-only) input yields empty CSS and no references.
    pub fn compile(self, id: &AssetId, source: &[u8], options: &CompileOptions) -> Result<Compiled> {
        let text = std::str::from_utf8(source).map_err(|e| BuildError::Compile {
            asset: id.clone(),
            message: format!("source is not valid UTF-8: {}", e),
        })?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        if text.trim().is_empty() {
            return Ok(Compiled::default());
        }

        let compiled = match self {
            Self::Scss => scss::compile(id, text, text, options)?,
            Self::Sass => {
                let lowered = sass::lower_indented(text).map_err(|message| BuildError::Compile {
                    asset: id.clone(),
                    message,
                })?;
                scss::compile(id, &lowered, text, options)?
            }
            Self::Css => css::compile(id, text, options),
        };

        tracing::debug!(
            asset = %id,
            compiler = self.name(),
            imports = compiled.imports.len(),
            links = compiled.links.len(),
            "compiled stylesheet"
        );
        Ok(compiled)
    }
}
