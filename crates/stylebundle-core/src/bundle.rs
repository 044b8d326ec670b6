//! Bundle tree assembly.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! The bundler flattens the import closure of the stylesheet entries into
//! one stylesheet, runs the transform pipeline over it and arranges the
//! outputs into a tree:
//!
//! ```text
//! script index.js            (code entries only)
//! └── stylesheet index.css
//!     ├── map index.css.map  (when maps are enabled and any fragment exists)
//!     └── linked test.<hash>.woff2 ...
//! ```

use std::fmt::Write as _;

use serde::Serialize;

use crate::asset::{AssetGraph, AssetId, AssetIndex};
use crate::context::BuildContext;
use crate::error::{BuildError, Result};
use crate::graph::BuildStats;
use crate::script::{StylesheetImport, rewrite_script};
use crate::source_map::{SourceMapBuilder, relative_path};
use crate::transform::ClassMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BundleType {
    Script,
    Stylesheet,
    SourceMap,
    LinkedAsset,
}

impl BundleType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Stylesheet => "stylesheet",
            Self::SourceMap => "map",
            Self::LinkedAsset => "linked",
        }
    }
}

/// One output file and the bundles nested under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub bundle_type: BundleType,
    /// Output file name, relative to the output directory.
    pub name: String,
    /// Contributing assets, in output order.
    pub assets: Vec<AssetId>,
    pub children: Vec<Bundle>,
    /// Bytes written for this bundle.
    pub content: Vec<u8>,
}

impl Bundle {
    /// Content as text, for bundles that hold text.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }
}

/// The output of one build.
#[derive(Debug, Clone)]
pub struct BundleTree {
    pub root: Bundle,
    /// Class map from the scoping stage, if it ran.
    pub class_map: Option<ClassMap>,
    pub stats: BuildStats,
}

impl BundleTree {
    /// Depth-first, parents before children.
    pub fn iter(&self) -> impl Iterator<Item = &Bundle> {
        let mut stack = vec![&self.root];
        std::iter::from_fn(move || {
            let bundle = stack.pop()?;
            stack.extend(bundle.children.iter().rev());
            Some(bundle)
        })
    }

    pub fn find(&self, name: &str) -> Option<&Bundle> {
        self.iter().find(|b| b.name == name)
    }

    pub fn stylesheet(&self) -> Option<&Bundle> {
        self.iter()
            .find(|b| b.bundle_type == BundleType::Stylesheet)
    }

    /// Indented one-line-per-bundle summary: type, name and the file names
    /// of the contributing assets.
    pub fn outline(&self) -> String {
        fn walk(bundle: &Bundle, depth: usize, out: &mut String) {
            let assets: Vec<&str> = bundle.assets.iter().map(AssetId::file_name).collect();
            let _ = writeln!(
                out,
                "{}{} {} [{}]",
                "  ".repeat(depth),
                bundle.bundle_type.as_str(),
                bundle.name,
                assets.join(", ")
            );
            for child in &bundle.children {
                walk(child, depth + 1, out);
            }
        }

        let mut out = String::new();
        walk(&self.root, 0, &mut out);
        out
    }
}

/// A code entry with its stylesheet imports resolved.
#[derive(Debug, Clone)]
pub struct ScriptEntry {
    pub id: AssetId,
    pub code: String,
    pub imports: Vec<StylesheetImport>,
}

/// What the build started from.
#[derive(Debug, Clone)]
pub enum Entry {
    Stylesheet(AssetId),
    Script(ScriptEntry),
}

impl Entry {
    pub fn id(&self) -> &AssetId {
        match self {
            Entry::Stylesheet(id) => id,
            Entry::Script(script) => &script.id,
        }
    }
}

/// Flattened, transformed stylesheet output.
struct Stylesheet {
    bundle: Bundle,
    class_map: Option<ClassMap>,
}

/// Arranges a built [`AssetGraph`] into a [`BundleTree`].
pub struct Bundler<'a> {
    ctx: &'a BuildContext,
}

impl<'a> Bundler<'a> {
    pub fn new(ctx: &'a BuildContext) -> Self {
        Self { ctx }
    }

    pub fn assemble(&self, entry: &Entry, graph: &AssetGraph, stats: BuildStats) -> Result<BundleTree> {
        let stylesheet_name = format!("{}.css", entry.id().file_stem());

        let stylesheet = if graph.entries().is_empty() {
            None
        } else {
            Some(self.stylesheet(&stylesheet_name, graph)?)
        };

        let (root, class_map) = match (entry, stylesheet) {
            (Entry::Stylesheet(_), Some(sheet)) => (sheet.bundle, sheet.class_map),
            (Entry::Stylesheet(id), None) => (
                Bundle {
                    bundle_type: BundleType::Stylesheet,
                    name: stylesheet_name,
                    assets: vec![id.clone()],
                    children: Vec::new(),
                    content: Vec::new(),
                },
                None,
            ),
            (Entry::Script(script), sheet) => {
                let (children, class_map) = match sheet {
                    Some(sheet) => (vec![sheet.bundle], sheet.class_map),
                    None => (Vec::new(), None),
                };
                let root = self.script_bundle(script, graph, children, class_map.as_ref())?;
                (root, class_map)
            }
        };

        let tree = BundleTree {
            root,
            class_map,
            stats,
        };
        tracing::info!(
            entry = %entry.id(),
            bundles = tree.iter().count(),
            "bundle tree assembled"
        );
        Ok(tree)
    }

    fn stylesheet(&self, name: &str, graph: &AssetGraph) -> Result<Stylesheet> {
        let order = graph.post_order(graph.entries());

        let mut css = String::new();
        let mut offsets: Vec<(AssetIndex, u32)> = Vec::with_capacity(order.len());
        let mut sources: Vec<(usize, AssetId)> = Vec::with_capacity(order.len());
        let mut line = 0u32;
        for &idx in &order {
            let text = graph.asset(idx).css.trim_end();
            if text.trim().is_empty() {
                continue;
            }
            offsets.push((idx, line));
            sources.push((css.len(), graph.asset(idx).id.clone()));
            css.push_str(text);
            css.push('\n');
            line += text.lines().count() as u32;
        }

        let primary = &graph.asset(graph.entries()[0]).id;
        let output = self
            .ctx
            .pipeline
            .apply_with_sources(css, primary, sources, self.ctx.project_root())?;
        let mut css = output.css;

        let mut children = Vec::new();
        if self.ctx.options.source_maps && !css.is_empty() {
            if output.lines_preserved {
                let map_name = format!("{}.map", name);
                let mut builder = SourceMapBuilder::new(name);
                for &(idx, offset) in &offsets {
                    if let Some(fragment) = &graph.asset(idx).source_map {
                        let source = relative_path(self.ctx.out_dir(), fragment.source.path());
                        builder.add_fragment(fragment, offset, &source);
                    }
                }
                if !builder.is_empty() {
                    let map = builder.build();
                    let _ = writeln!(css, "/*# sourceMappingURL={} */", map_name);
                    children.push(Bundle {
                        bundle_type: BundleType::SourceMap,
                        name: map_name,
                        assets: Vec::new(),
                        children: Vec::new(),
                        content: map.to_json().into_bytes(),
                    });
                }
            } else {
                tracing::debug!(bundle = name, "source map dropped, a transform changed line structure");
            }
        }

        for linked_idx in graph.linked_closure(&order) {
            let linked = graph.linked_asset(linked_idx);
            children.push(Bundle {
                bundle_type: BundleType::LinkedAsset,
                name: linked.output_name.clone(),
                assets: vec![linked.id.clone()],
                children: Vec::new(),
                content: linked.bytes.to_vec(),
            });
        }

        Ok(Stylesheet {
            bundle: Bundle {
                bundle_type: BundleType::Stylesheet,
                name: name.to_string(),
                assets: order.iter().map(|&idx| graph.asset(idx).id.clone()).collect(),
                children,
                content: css.into_bytes(),
            },
            class_map: output.class_map,
        })
    }

    fn script_bundle(
        &self,
        script: &ScriptEntry,
        graph: &AssetGraph,
        children: Vec<Bundle>,
        class_map: Option<&ClassMap>,
    ) -> Result<Bundle> {
        let module_value = match class_map {
            Some(map) => serde_json::to_string(map)
                .map_err(|e| BuildError::transform("scope-classes", e.to_string()))?,
            None => "{}".to_string(),
        };
        let code = rewrite_script(&script.code, &script.imports, |_| module_value.clone());

        let mut assets = vec![script.id.clone()];
        for &idx in graph.entries() {
            let id = &graph.asset(idx).id;
            if !assets.contains(id) {
                assets.push(id.clone());
            }
        }

        Ok(Bundle {
            bundle_type: BundleType::Script,
            name: script.id.file_name().to_string(),
            assets,
            children,
            content: code.into_bytes(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(bundle_type: BundleType, name: &str) -> Bundle {
        Bundle {
            bundle_type,
            name: name.to_string(),
            assets: Vec::new(),
            children: Vec::new(),
            content: Vec::new(),
        }
    }

    fn tree() -> BundleTree {
        let mut sheet = leaf(BundleType::Stylesheet, "index.css");
        sheet.assets = vec![AssetId::new("/p/_a.scss"), AssetId::new("/p/index.scss")];
        sheet.children = vec![
            leaf(BundleType::SourceMap, "index.css.map"),
            leaf(BundleType::LinkedAsset, "font.0123abcd.woff2"),
        ];
        let mut root = leaf(BundleType::Script, "index.js");
        root.assets = vec![AssetId::new("/p/index.js"), AssetId::new("/p/index.scss")];
        root.children = vec![sheet];
        BundleTree {
            root,
            class_map: None,
            stats: BuildStats::default(),
        }
    }

    #[test]
    fn test_iter_is_depth_first() {
        let names: Vec<String> = tree().iter().map(|b| b.name.clone()).collect();
        assert_eq!(
            names,
            vec!["index.js", "index.css", "index.css.map", "font.0123abcd.woff2"]
        );
    }

    #[test]
    fn test_find_and_stylesheet() {
        let tree = tree();
        assert_eq!(
            tree.find("index.css.map").map(|b| b.bundle_type),
            Some(BundleType::SourceMap)
        );
        assert!(tree.find("nope.css").is_none());
        assert_eq!(tree.stylesheet().map(|b| b.name.as_str()), Some("index.css"));
    }

    #[test]
    fn test_outline() {
        insta::assert_snapshot!(tree().outline(), @r"
        script index.js [index.js, index.scss]
          stylesheet index.css [_a.scss, index.scss]
            map index.css.map []
            linked font.0123abcd.woff2 []
        ");
    }
}
