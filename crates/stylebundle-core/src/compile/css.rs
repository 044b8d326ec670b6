//! Plain CSS adapter.
//!
//! Copyright (c) 2025 Posit, PBC

use super::scss::{Dialect, extract_imports};
use super::{CompileOptions, Compiled};
use crate::asset::AssetId;
use crate::links::extract_links;
use crate::source_map::SourceMapFragment;

/// Plain CSS passes through; relative `@import`s become graph edges.
pub(super) fn compile(id: &AssetId, source: &str, options: &CompileOptions) -> Compiled {
    let extracted = extract_imports(source, Dialect::Css);
    if extracted.source.trim().is_empty() {
        return Compiled {
            imports: extracted.imports,
            ..Compiled::default()
        };
    }

    let css = extracted.source;
    let source_map = options
        .source_maps
        .then(|| SourceMapFragment::identity(id.clone(), &css));

    Compiled {
        links: extract_links(&css),
        imports: extracted.imports,
        css,
        source_map,
    }
}
