//! Writing bundle trees to the output directory.
//!
//! Copyright (c) 2025 Posit, PBC

use std::path::{Path, PathBuf};

use stylebundle_runtime::SystemRuntime;

use crate::bundle::BundleTree;
use crate::error::{BuildError, Result};

/// Write every bundle of `tree` to `out_dir/<name>`, parents first.
///
/// Returns the written paths in write order.
pub fn write_bundle_tree(
    tree: &BundleTree,
    out_dir: &Path,
    runtime: &dyn SystemRuntime,
) -> Result<Vec<PathBuf>> {
    runtime
        .dir_create(out_dir, true)
        .map_err(|e| BuildError::io(out_dir, e))?;

    let mut written = Vec::new();
    for bundle in tree.iter() {
        let path = out_dir.join(&bundle.name);
        runtime
            .file_write(&path, &bundle.content)
            .map_err(|e| BuildError::io(&path, e))?;
        tracing::debug!(bundle = %bundle.name, bytes = bundle.content.len(), "wrote bundle");
        written.push(path);
    }

    tracing::info!(out_dir = %out_dir.display(), files = written.len(), "bundles written");
    Ok(written)
}
