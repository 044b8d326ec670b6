//! Reference resolution.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Maps the raw text of an `@import` or `url()` reference, together with
//! the file it appears in, to the identity of the file it names.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stylebundle_runtime::SystemRuntime;

use crate::asset::AssetId;
use crate::error::{BuildError, Result};
use crate::links::is_external;

/// Stylesheet extensions in probing order.
pub const STYLESHEET_EXTENSIONS: &[&str] = &["scss", "sass", "css"];

/// How a resolved path becomes an [`AssetId`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdentityPolicy {
    /// Ask the runtime for the canonical path (symlinks resolved).
    #[default]
    Canonical,
    /// Only fold `.` and `..` components.
    Lexical,
}

/// Which kind of reference is being resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    /// `@import`: load paths, partials and extension probing apply.
    Import,
    /// `url()`: a plain path relative to the referring file.
    Link,
}

/// Outcome of a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Stylesheet(AssetId),
    Linked(AssetId),
    /// Left untouched in the output.
    External,
}

pub struct Resolver {
    runtime: Arc<dyn SystemRuntime>,
    load_paths: Vec<PathBuf>,
    policy: IdentityPolicy,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("load_paths", &self.load_paths)
            .field("policy", &self.policy)
            .finish()
    }
}

impl Resolver {
    pub fn new(
        runtime: Arc<dyn SystemRuntime>,
        load_paths: Vec<PathBuf>,
        policy: IdentityPolicy,
    ) -> Self {
        Self {
            runtime,
            load_paths,
            policy,
        }
    }

    pub fn policy(&self) -> IdentityPolicy {
        self.policy
    }

    /// Resolve `raw` as written in `from`.
    pub fn resolve(&self, from: &AssetId, raw: &str, kind: RefKind) -> Result<Resolved> {
        match kind {
            RefKind::Import => self.resolve_import(from, raw).map(Resolved::Stylesheet),
            RefKind::Link => self.resolve_link(from, raw),
        }
    }

    /// Resolve a stylesheet import: the referring file's directory first,
    /// then each load path in order.
    pub fn resolve_import(&self, from: &AssetId, raw: &str) -> Result<AssetId> {
        let raw_path = Path::new(raw);
        let bases: Vec<&Path> = if raw_path.is_absolute() {
            vec![Path::new("")]
        } else {
            std::iter::once(from.dir())
                .chain(self.load_paths.iter().map(PathBuf::as_path))
                .collect()
        };

        for base in bases {
            let target = base.join(raw_path);
            for candidate in import_candidates(&target) {
                if self.is_file(&candidate)? {
                    tracing::trace!(reference = raw, resolved = %candidate.display(), "resolved import");
                    return self.identity(&candidate);
                }
            }
        }

        Err(BuildError::Resolution {
            reference: raw.to_string(),
            from: from.clone(),
        })
    }

    /// Resolve a `url()` reference. External URLs and root-relative paths
    /// are not resolved.
    pub fn resolve_link(&self, from: &AssetId, raw: &str) -> Result<Resolved> {
        if is_external(raw) || raw.starts_with('/') {
            return Ok(Resolved::External);
        }
        let path = strip_query_and_fragment(raw);
        if path.is_empty() {
            return Ok(Resolved::External);
        }

        let candidate = from.dir().join(path);
        if self.is_file(&candidate)? {
            return self.identity(&candidate).map(Resolved::Linked);
        }

        Err(BuildError::Resolution {
            reference: raw.to_string(),
            from: from.clone(),
        })
    }

    /// Identity of an existing file under the configured policy.
    pub fn identity(&self, path: &Path) -> Result<AssetId> {
        match self.policy {
            IdentityPolicy::Canonical => self
                .runtime
                .canonicalize(path)
                .map(AssetId::from)
                .map_err(|e| BuildError::io(path, e)),
            IdentityPolicy::Lexical => Ok(AssetId::from(normalize_lexically(path))),
        }
    }

    fn is_file(&self, path: &Path) -> Result<bool> {
        self.runtime
            .is_file(path)
            .map_err(|e| BuildError::io(path, e))
    }
}

/// Files an import of `target` may refer to, in probing order.
fn import_candidates(target: &Path) -> Vec<PathBuf> {
    let dir = target.parent().unwrap_or_else(|| Path::new(""));
    let Some(name) = target.file_name().and_then(|n| n.to_str()) else {
        return Vec::new();
    };

    let has_known_ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| STYLESHEET_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));

    let mut candidates = Vec::new();
    let mut push_partial_pair = |dir: &Path, file: String| {
        candidates.push(dir.join(&file));
        if !file.starts_with('_') {
            candidates.push(dir.join(format!("_{}", file)));
        }
    };

    if has_known_ext {
        push_partial_pair(dir, name.to_string());
        return candidates;
    }

    for ext in STYLESHEET_EXTENSIONS {
        push_partial_pair(dir, format!("{}.{}", name, ext));
    }
    for index in ["index", "_index"] {
        for ext in STYLESHEET_EXTENSIONS {
            candidates.push(target.join(format!("{}.{}", index, ext)));
        }
    }
    candidates
}

fn strip_query_and_fragment(raw: &str) -> &str {
    raw.split(['?', '#']).next().unwrap_or(raw)
}

/// Fold `.` and `..` components without touching the file system.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
