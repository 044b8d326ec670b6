//! Build driver: entry detection, graph construction and bundling.
//!
//! Copyright (c) 2025 Posit, PBC

use std::path::{Path, PathBuf};
use std::sync::Arc;

use stylebundle_runtime::SystemRuntime;

use crate::asset::AssetId;
use crate::bundle::{BundleTree, Bundler, Entry, ScriptEntry};
use crate::cancellation::Cancellation;
use crate::compile::CompilerKind;
use crate::config::BuildOptions;
use crate::context::BuildContext;
use crate::error::{BuildError, Result};
use crate::graph::GraphBuilder;
use crate::script::{is_script_extension, scan_stylesheet_imports};

/// Build the bundle tree for one entry file.
///
/// Relative paths in `options` are resolved against the entry's directory
/// unless a project root is set.
pub async fn build(
    entry: &Path,
    options: BuildOptions,
    runtime: Arc<dyn SystemRuntime>,
) -> Result<BundleTree> {
    build_with_cancellation(entry, options, runtime, Cancellation::new()).await
}

/// [`build`] on a fresh multi-thread tokio runtime.
pub fn build_blocking(
    entry: &Path,
    options: BuildOptions,
    runtime: Arc<dyn SystemRuntime>,
) -> Result<BundleTree> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| BuildError::Worker(format!("failed to start async runtime: {}", e)))?;
    rt.block_on(build(entry, options, runtime))
}

/// [`build`], aborting with [`BuildError::Cancelled`] once `cancellation`
/// fires.
pub async fn build_with_cancellation(
    entry: &Path,
    options: BuildOptions,
    runtime: Arc<dyn SystemRuntime>,
    cancellation: Cancellation,
) -> Result<BundleTree> {
    let entry_path = absolute_entry(entry, runtime.as_ref())?;
    let entry_dir = entry_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"));
    let options = options.resolve_paths(&entry_dir);

    let ctx = Arc::new(BuildContext::new(options, runtime, cancellation)?);
    tracing::info!(
        entry = %entry_path.display(),
        transforms = ?ctx.pipeline.transform_names(),
        "starting build"
    );

    let entry = detect_entry(&ctx, &entry_path)?;
    let stylesheets = stylesheet_entries(&ctx, &entry)?;

    let (graph, stats) = GraphBuilder::new(ctx.clone()).build(&stylesheets).await?;
    if ctx.cancellation.is_cancelled() {
        return Err(BuildError::Cancelled);
    }

    let tree = Bundler::new(&ctx).assemble(&entry, &graph, stats)?;
    tracing::info!(
        entry = %entry.id(),
        compiles = stats.compiles,
        linked = stats.linked_reads,
        "build finished"
    );
    Ok(tree)
}

fn absolute_entry(entry: &Path, runtime: &dyn SystemRuntime) -> Result<PathBuf> {
    if entry.is_absolute() {
        return Ok(entry.to_path_buf());
    }
    let cwd = runtime.cwd().map_err(|e| BuildError::io(entry, e))?;
    Ok(cwd.join(entry))
}

/// Classify the entry file by extension.
fn detect_entry(ctx: &BuildContext, path: &Path) -> Result<Entry> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    if CompilerKind::for_extension(&ext).is_some() {
        return Ok(Entry::Stylesheet(ctx.resolver.identity(path)?));
    }

    if is_script_extension(&ext) {
        let id = ctx.resolver.identity(path)?;
        let code = ctx
            .runtime
            .file_read_string(id.path())
            .map_err(|e| BuildError::io(id.path(), e))?;
        let imports = scan_stylesheet_imports(&code);
        tracing::debug!(entry = %id, imports = imports.len(), "scanned code entry");
        return Ok(Entry::Script(ScriptEntry { id, code, imports }));
    }

    Err(BuildError::UnsupportedEntry(path.to_path_buf()))
}

/// Stylesheet entries of the graph, in import order, each once.
fn stylesheet_entries(ctx: &BuildContext, entry: &Entry) -> Result<Vec<AssetId>> {
    match entry {
        Entry::Stylesheet(id) => Ok(vec![id.clone()]),
        Entry::Script(script) => {
            let mut entries: Vec<AssetId> = Vec::new();
            for import in &script.imports {
                let id = ctx.resolver.resolve_import(&script.id, &import.specifier)?;
                if !entries.contains(&id) {
                    entries.push(id);
                }
            }
            Ok(entries)
        }
    }
}
