//! Asset graph construction.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Building runs in two phases:
//!
//! 1. **Discovery** - a coordinator claims identities and hands them to
//!    worker tasks (bounded by a semaphore) that read, compile and resolve
//!    one file each. Only the coordinator touches the claim sets, so every
//!    identity is compiled once and every linked asset is read once, no
//!    matter how many files import it.
//! 2. **Assembly** - a depth-first walk from the entries over the
//!    discovered import edges. It detects cycles with the set of
//!    identities on the current path and inserts assets into the arena in
//!    post-order, rewriting local `url()`s to hashed output names.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::asset::{Asset, AssetGraph, AssetId, ImportEdge, LinkRef, LinkTarget, LinkedAsset};
use crate::compile::{Compiled, CompilerKind};
use crate::context::BuildContext;
use crate::error::{BuildError, Result};
use crate::hash::{compute_hash, hashed_file_name};
use crate::links::rewrite_links;
use crate::mime::mime_type_from_extension;
use crate::resolve::Resolved;

/// Counters collected while building one graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Stylesheet compiles performed.
    pub compiles: usize,
    /// Linked assets read from the runtime.
    pub linked_reads: usize,
    /// Transient read failures that were retried.
    pub read_retries: usize,
}

/// One compiled file with its references resolved.
#[derive(Debug)]
struct CompiledUnit {
    id: AssetId,
    compiled: Compiled,
    imports: Vec<(String, AssetId)>,
    links: Vec<(String, Resolved)>,
}

#[derive(Debug)]
enum Discovered {
    Stylesheet(Box<CompiledUnit>),
    Linked { asset: LinkedAsset, retries: usize },
}

/// Builds the [`AssetGraph`] for a set of stylesheet entries.
#[derive(Debug)]
pub struct GraphBuilder {
    ctx: Arc<BuildContext>,
}

impl GraphBuilder {
    pub fn new(ctx: Arc<BuildContext>) -> Self {
        Self { ctx }
    }

    /// Build the graph reachable from `entries`, which become the graph's
    /// entries in the same order.
    pub async fn build(&self, entries: &[AssetId]) -> Result<(AssetGraph, BuildStats)> {
        let (units, linked, stats) = self.discover(entries).await?;
        let graph = assemble(entries, units, linked)?;
        tracing::debug!(
            assets = graph.len(),
            linked = graph.linked_assets().len(),
            compiles = stats.compiles,
            "asset graph built"
        );
        Ok((graph, stats))
    }

    async fn discover(
        &self,
        entries: &[AssetId],
    ) -> Result<(
        HashMap<AssetId, CompiledUnit>,
        HashMap<AssetId, LinkedAsset>,
        BuildStats,
    )> {
        let cancellation = self.ctx.cancellation.clone();
        if cancellation.is_cancelled() {
            return Err(BuildError::Cancelled);
        }

        let semaphore = Arc::new(Semaphore::new(self.ctx.options.parallelism));
        let mut tasks: JoinSet<Result<Discovered>> = JoinSet::new();
        let mut claimed: HashSet<AssetId> = HashSet::new();
        let mut claimed_linked: HashSet<AssetId> = HashSet::new();
        let mut units = HashMap::new();
        let mut linked = HashMap::new();
        let mut stats = BuildStats::default();

        for entry in entries {
            if claimed.insert(entry.clone()) {
                self.spawn_compile(&mut tasks, &semaphore, entry.clone());
            }
        }

        loop {
            let next = tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    tasks.abort_all();
                    tracing::info!("build cancelled, aborted in-flight tasks");
                    return Err(BuildError::Cancelled);
                }
                next = tasks.join_next() => next,
            };
            let Some(joined) = next else {
                break;
            };

            let discovered = match joined.map_err(BuildError::from).and_then(|r| r) {
                Ok(discovered) => discovered,
                Err(e) => {
                    tasks.abort_all();
                    return Err(e);
                }
            };

            match discovered {
                Discovered::Stylesheet(unit) => {
                    stats.compiles += 1;
                    for (_, target) in &unit.imports {
                        if claimed.insert(target.clone()) {
                            self.spawn_compile(&mut tasks, &semaphore, target.clone());
                        }
                    }
                    for (_, resolved) in &unit.links {
                        if let Resolved::Linked(target) = resolved {
                            if claimed_linked.insert(target.clone()) {
                                self.spawn_read_linked(&mut tasks, &semaphore, target.clone());
                            }
                        }
                    }
                    units.insert(unit.id.clone(), *unit);
                }
                Discovered::Linked { asset, retries } => {
                    stats.linked_reads += 1;
                    stats.read_retries += retries;
                    linked.insert(asset.id.clone(), asset);
                }
            }
        }

        Ok((units, linked, stats))
    }

    fn spawn_compile(
        &self,
        tasks: &mut JoinSet<Result<Discovered>>,
        semaphore: &Arc<Semaphore>,
        id: AssetId,
    ) {
        let ctx = self.ctx.clone();
        let semaphore = semaphore.clone();
        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| BuildError::Cancelled)?;
            tokio::task::spawn_blocking(move || compile_unit(&ctx, id)).await?
        });
    }

    fn spawn_read_linked(
        &self,
        tasks: &mut JoinSet<Result<Discovered>>,
        semaphore: &Arc<Semaphore>,
        id: AssetId,
    ) {
        let ctx = self.ctx.clone();
        let semaphore = semaphore.clone();
        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| BuildError::Cancelled)?;
            tokio::task::spawn_blocking(move || read_linked(&ctx, id)).await?
        });
    }
}

/// Read, compile and resolve the references of one stylesheet.
fn compile_unit(ctx: &BuildContext, id: AssetId) -> Result<Discovered> {
    let kind = CompilerKind::for_asset(&id)
        .ok_or_else(|| BuildError::UnsupportedEntry(id.path().to_path_buf()))?;
    let source = ctx
        .runtime
        .file_read(id.path())
        .map_err(|e| BuildError::io(id.path(), e))?;

    let compiled = kind.compile(&id, &source, &ctx.compile_options)?;

    let imports = compiled
        .imports
        .iter()
        .map(|raw| {
            ctx.resolver
                .resolve_import(&id, raw)
                .map(|target| (raw.clone(), target))
        })
        .collect::<Result<Vec<_>>>()?;
    let links = compiled
        .links
        .iter()
        .map(|raw| {
            ctx.resolver
                .resolve_link(&id, raw)
                .map(|target| (raw.clone(), target))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Discovered::Stylesheet(Box::new(CompiledUnit {
        id,
        compiled,
        imports,
        links,
    })))
}

/// Read and hash one linked asset, retrying transient failures.
fn read_linked(ctx: &BuildContext, id: AssetId) -> Result<Discovered> {
    let max_retries = ctx.options.link_read_retries as usize;
    let mut retries = 0usize;

    let bytes = loop {
        match ctx.runtime.file_read(id.path()) {
            Ok(bytes) => break bytes,
            Err(e) if e.is_transient() && retries < max_retries => {
                retries += 1;
                tracing::warn!(asset = %id, attempt = retries, error = %e, "Transient read failure, retrying");
            }
            Err(e) => return Err(BuildError::io(id.path(), e)),
        }
    };

    let hash = compute_hash(&bytes);
    let output_name = hashed_file_name(id.file_name(), &hash);
    let mime_type = mime_type_from_extension(id.extension().as_deref().unwrap_or(""));
    tracing::debug!(asset = %id, output = %output_name, "read linked asset");

    Ok(Discovered::Linked {
        asset: LinkedAsset {
            id,
            bytes: Arc::from(bytes),
            hash,
            output_name,
            mime_type,
        },
        retries,
    })
}

/// Depth-first assembly of discovered units into the arena.
fn assemble(
    entries: &[AssetId],
    mut units: HashMap<AssetId, CompiledUnit>,
    mut linked: HashMap<AssetId, LinkedAsset>,
) -> Result<AssetGraph> {
    let mut graph = AssetGraph::new();
    let mut entry_indices = Vec::with_capacity(entries.len());

    for entry in entries {
        if let Some(idx) = graph.index_of(entry) {
            entry_indices.push(idx);
            continue;
        }

        let mut stack: Vec<(AssetId, usize)> = vec![(entry.clone(), 0)];
        let mut on_path: HashSet<AssetId> = HashSet::from([entry.clone()]);

        while let Some((id, next)) = stack.last().map(|(id, next)| (id.clone(), *next)) {
            let unit = units.get(&id).ok_or_else(|| missing_unit(&id))?;

            match unit.imports.get(next).map(|(_, target)| target.clone()) {
                Some(target) => {
                    if let Some(top) = stack.last_mut() {
                        top.1 += 1;
                    }
                    if graph.index_of(&target).is_some() {
                        continue;
                    }
                    if on_path.contains(&target) {
                        let start = stack.iter().position(|(i, _)| *i == target).unwrap_or(0);
                        let mut path: Vec<AssetId> =
                            stack[start..].iter().map(|(i, _)| i.clone()).collect();
                        path.push(target);
                        return Err(BuildError::Cycle { path });
                    }
                    on_path.insert(target.clone());
                    stack.push((target, 0));
                }
                None => {
                    stack.pop();
                    on_path.remove(&id);
                    let unit = units.remove(&id).ok_or_else(|| missing_unit(&id))?;
                    let asset = finish_asset(&mut graph, unit, &mut linked)?;
                    graph.push_asset(asset);
                }
            }
        }

        let idx = graph.index_of(entry).ok_or_else(|| missing_unit(entry))?;
        entry_indices.push(idx);
    }

    graph.set_entries(entry_indices);
    Ok(graph)
}

/// Turn a unit whose imports are all in the arena into an [`Asset`].
fn finish_asset(
    graph: &mut AssetGraph,
    unit: CompiledUnit,
    linked: &mut HashMap<AssetId, LinkedAsset>,
) -> Result<Asset> {
    let imports = unit
        .imports
        .into_iter()
        .map(|(raw, target)| {
            graph
                .index_of(&target)
                .map(|target| ImportEdge { raw, target })
                .ok_or_else(|| missing_unit(&target))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut links = Vec::with_capacity(unit.links.len());
    let mut output_names: HashMap<String, String> = HashMap::new();
    for (raw, resolved) in unit.links {
        let target = match resolved {
            Resolved::Linked(id) => {
                let idx = match graph.linked_index_of(&id) {
                    Some(idx) => idx,
                    None => {
                        let asset = linked.remove(&id).ok_or_else(|| missing_unit(&id))?;
                        graph.push_linked(asset)
                    }
                };
                output_names.insert(raw.clone(), graph.linked_asset(idx).output_name.clone());
                LinkTarget::Local(idx)
            }
            Resolved::External | Resolved::Stylesheet(_) => LinkTarget::External,
        };
        links.push(LinkRef { raw, target });
    }

    let css = if output_names.is_empty() {
        unit.compiled.css
    } else {
        rewrite_links(&unit.compiled.css, |raw| output_names.get(raw).cloned())
    };

    tracing::trace!(asset = %unit.id, imports = imports.len(), links = links.len(), "asset assembled");
    Ok(Asset {
        id: unit.id,
        css,
        imports,
        links,
        source_map: unit.compiled.source_map,
    })
}

fn missing_unit(id: &AssetId) -> BuildError {
    BuildError::Worker(format!("no discovery result for {}", id))
}
