//! Assets, linked assets and the asset graph.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! The graph is an arena: assets live in a `Vec` and refer to each other by
//! [`AssetIndex`]. The builder inserts assets in post-order (imports before
//! importers), so arena order is also the flattened output order.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::source_map::SourceMapFragment;

/// Stable identity of a resolved file: its absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(Arc<Path>);

impl AssetId {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self(Arc::from(path.as_ref()))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Lower-cased file extension, if any.
    pub fn extension(&self) -> Option<String> {
        self.0
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    pub fn file_stem(&self) -> &str {
        self.0.file_stem().and_then(|s| s.to_str()).unwrap_or("")
    }

    pub fn file_name(&self) -> &str {
        self.0.file_name().and_then(|s| s.to_str()).unwrap_or("")
    }

    /// Directory containing the file.
    pub fn dir(&self) -> &Path {
        self.0.parent().unwrap_or_else(|| Path::new("/"))
    }

    /// Forward-slash path relative to `root`, or the full path when the
    /// asset lives outside of it.
    pub fn relative_to(&self, root: &Path) -> String {
        let rel = self.0.strip_prefix(root).unwrap_or(&self.0);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .filter(|c| c != "/")
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl Serialize for AssetId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<PathBuf> for AssetId {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

/// Position of an [`Asset`] in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetIndex(pub(crate) usize);

/// Position of a [`LinkedAsset`] in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkedIndex(pub(crate) usize);

/// An import edge: the raw reference as written and the asset it resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEdge {
    pub raw: String,
    pub target: AssetIndex,
}

/// What a `url()` reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkTarget {
    Local(LinkedIndex),
    /// Absolute URL, data URI or fragment; never rewritten.
    External,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRef {
    pub raw: String,
    pub target: LinkTarget,
}

/// One compiled stylesheet file.
#[derive(Debug, Clone)]
pub struct Asset {
    pub id: AssetId,
    /// Compiler output for this file only, local links rewritten to output names.
    pub css: String,
    /// Imports in source order.
    pub imports: Vec<ImportEdge>,
    /// Distinct links in order of first occurrence.
    pub links: Vec<LinkRef>,
    pub source_map: Option<SourceMapFragment>,
}

impl Asset {
    /// Linked assets referenced directly by this file.
    pub fn linked(&self) -> impl Iterator<Item = LinkedIndex> + '_ {
        self.links.iter().filter_map(|l| match l.target {
            LinkTarget::Local(idx) => Some(idx),
            LinkTarget::External => None,
        })
    }
}

/// A binary resource referenced from a stylesheet.
#[derive(Debug, Clone)]
pub struct LinkedAsset {
    pub id: AssetId,
    pub bytes: Arc<[u8]>,
    /// Hex-encoded SHA-256 of `bytes`.
    pub hash: String,
    /// `<basename>.<hash-prefix>.<ext>`
    pub output_name: String,
    pub mime_type: &'static str,
}

/// Imports and links of every asset reachable from the build entries.
#[derive(Debug, Default)]
pub struct AssetGraph {
    assets: Vec<Asset>,
    by_id: HashMap<AssetId, AssetIndex>,
    linked: Vec<LinkedAsset>,
    linked_by_id: HashMap<AssetId, LinkedIndex>,
    entries: Vec<AssetIndex>,
}

impl AssetGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an asset. Callers insert in post-order.
    pub(crate) fn push_asset(&mut self, asset: Asset) -> AssetIndex {
        let idx = AssetIndex(self.assets.len());
        self.by_id.insert(asset.id.clone(), idx);
        self.assets.push(asset);
        idx
    }

    pub(crate) fn push_linked(&mut self, linked: LinkedAsset) -> LinkedIndex {
        let idx = LinkedIndex(self.linked.len());
        self.linked_by_id.insert(linked.id.clone(), idx);
        self.linked.push(linked);
        idx
    }

    pub(crate) fn set_entries(&mut self, entries: Vec<AssetIndex>) {
        self.entries = entries;
    }

    pub fn asset(&self, idx: AssetIndex) -> &Asset {
        &self.assets[idx.0]
    }

    pub fn linked_asset(&self, idx: LinkedIndex) -> &LinkedAsset {
        &self.linked[idx.0]
    }

    pub fn index_of(&self, id: &AssetId) -> Option<AssetIndex> {
        self.by_id.get(id).copied()
    }

    pub fn linked_index_of(&self, id: &AssetId) -> Option<LinkedIndex> {
        self.linked_by_id.get(id).copied()
    }

    pub fn get(&self, id: &AssetId) -> Option<&Asset> {
        self.index_of(id).map(|idx| self.asset(idx))
    }

    pub fn entries(&self) -> &[AssetIndex] {
        &self.entries
    }

    /// All assets in arena (post-) order.
    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    /// All linked assets in order of first reference.
    pub fn linked_assets(&self) -> &[LinkedAsset] {
        &self.linked
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Post-order import closure of `roots`: imports before importers,
    /// first-imported first, each asset once.
    pub fn post_order(&self, roots: &[AssetIndex]) -> Vec<AssetIndex> {
        let mut done = vec![false; self.assets.len()];
        let mut order = Vec::new();

        for &root in roots {
            if done[root.0] {
                continue;
            }
            let mut stack: Vec<(AssetIndex, usize)> = vec![(root, 0)];
            while let Some(&(idx, next)) = stack.last() {
                match self.assets[idx.0].imports.get(next) {
                    Some(edge) => {
                        if let Some(top) = stack.last_mut() {
                            top.1 += 1;
                        }
                        if !done[edge.target.0] && !stack.iter().any(|(i, _)| *i == edge.target)
                        {
                            stack.push((edge.target, 0));
                        }
                    }
                    None => {
                        stack.pop();
                        done[idx.0] = true;
                        order.push(idx);
                    }
                }
            }
        }

        order
    }

    /// Distinct linked assets referenced by `assets`, in first-reference order.
    pub fn linked_closure(&self, assets: &[AssetIndex]) -> Vec<LinkedIndex> {
        let mut seen = vec![false; self.linked.len()];
        let mut result = Vec::new();
        for &idx in assets {
            for linked in self.asset(idx).linked() {
                if !seen[linked.0] {
                    seen[linked.0] = true;
                    result.push(linked);
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(path: &str, imports: &[usize]) -> Asset {
        Asset {
            id: AssetId::new(path),
            css: String::new(),
            imports: imports
                .iter()
                .map(|&i| ImportEdge {
                    raw: format!("dep{}", i),
                    target: AssetIndex(i),
                })
                .collect(),
            links: Vec::new(),
            source_map: None,
        }
    }

    #[test]
    fn test_asset_id_parts() {
        let id = AssetId::new("/project/styles/_Partial.SCSS");
        assert_eq!(id.extension().as_deref(), Some("scss"));
        assert_eq!(id.file_stem(), "_Partial");
        assert_eq!(id.file_name(), "_Partial.SCSS");
        assert_eq!(id.dir(), Path::new("/project/styles"));
        assert_eq!(
            id.relative_to(Path::new("/project")),
            "styles/_Partial.SCSS"
        );
    }

    #[test]
    fn test_relative_to_outside_root() {
        let id = AssetId::new("/elsewhere/a.css");
        assert_eq!(id.relative_to(Path::new("/project")), "elsewhere/a.css");
    }

    #[test]
    fn test_post_order_shared_import_emitted_once() {
        // 0: shared, 1: a (imports shared), 2: b (imports shared), 3: index (imports a, b)
        let mut graph = AssetGraph::new();
        graph.push_asset(asset("/p/_shared.scss", &[]));
        graph.push_asset(asset("/p/_a.scss", &[0]));
        graph.push_asset(asset("/p/_b.scss", &[0]));
        let root = graph.push_asset(asset("/p/index.scss", &[1, 2]));

        let order = graph.post_order(&[root]);
        assert_eq!(
            order,
            vec![AssetIndex(0), AssetIndex(1), AssetIndex(2), AssetIndex(3)]
        );
    }

    #[test]
    fn test_post_order_subtree() {
        let mut graph = AssetGraph::new();
        graph.push_asset(asset("/p/_leaf.scss", &[]));
        let mid = graph.push_asset(asset("/p/_mid.scss", &[0]));
        graph.push_asset(asset("/p/index.scss", &[1]));

        assert_eq!(graph.post_order(&[mid]), vec![AssetIndex(0), mid]);
    }

    #[test]
    fn test_lookup_by_id() {
        let mut graph = AssetGraph::new();
        let idx = graph.push_asset(asset("/p/index.scss", &[]));
        assert_eq!(graph.index_of(&AssetId::new("/p/index.scss")), Some(idx));
        assert!(graph.get(&AssetId::new("/p/other.scss")).is_none());
        assert_eq!(graph.len(), 1);
    }
}
