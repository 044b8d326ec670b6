/*
 * build.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Build command implementation
 */

//! Build command implementation.
//!
//! Loads `stylebundle.yml` for the entry, applies command-line overrides,
//! builds the bundle tree and writes it to the output directory. Nothing is
//! written when the build fails.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use stylebundle_core::{BuildOptions, BundleTree, StageKind, build_blocking, load_config, write_bundle_tree};
use stylebundle_runtime::{NativeRuntime, SystemRuntime};

/// Arguments for the build command
#[derive(Debug)]
pub struct BuildArgs {
    pub entry: String,
    pub out_dir: Option<String>,
    pub no_source_maps: bool,
    pub parallelism: Option<usize>,
    pub transforms: Vec<String>,
    pub dry_run: bool,
    pub json: bool,
}

/// Execute the build command
pub fn execute(args: BuildArgs) -> Result<()> {
    let runtime = Arc::new(NativeRuntime::new());
    let cwd = runtime
        .cwd()
        .map_err(|e| anyhow::anyhow!("Failed to get current directory: {}", e))?;

    let entry = cwd.join(&args.entry);
    let exists = runtime
        .is_file(&entry)
        .map_err(|e| anyhow::anyhow!("Failed to check entry path: {}", e))?;
    if !exists {
        anyhow::bail!("Entry file does not exist: {}", entry.display());
    }

    let options = load_config(runtime.as_ref(), &entry)
        .with_context(|| format!("Failed to load configuration for {}", entry.display()))?;
    let options = apply_overrides(options, &args, &cwd)?;

    let tree = build_blocking(&entry, options.clone(), runtime.clone())
        .with_context(|| format!("Failed to build {}", entry.display()))?;

    if args.dry_run {
        print!("{}", tree.outline());
    } else {
        write_bundle_tree(&tree, &options.out_dir, runtime.as_ref())
            .with_context(|| format!("Failed to write bundles to {}", options.out_dir.display()))?;
        info!(
            "Built {} bundles into {}",
            tree.iter().count(),
            options.out_dir.display()
        );
    }

    if args.json {
        println!("{}", summary(&tree, &options));
    }

    Ok(())
}

/// Command-line flags take precedence over the configuration file.
fn apply_overrides(mut options: BuildOptions, args: &BuildArgs, cwd: &std::path::Path) -> Result<BuildOptions> {
    if let Some(out_dir) = &args.out_dir {
        options.out_dir = cwd.join(PathBuf::from(out_dir));
    }
    if args.no_source_maps {
        options.source_maps = false;
    }
    if let Some(parallelism) = args.parallelism {
        options.parallelism = parallelism;
    }
    if !args.transforms.is_empty() {
        options.transforms = args
            .transforms
            .iter()
            .map(|name| {
                name.parse::<StageKind>()
                    .with_context(|| format!("Invalid --transform value '{}'", name))
            })
            .collect::<Result<Vec<_>>>()?;
    }
    Ok(options)
}

fn summary(tree: &BundleTree, options: &BuildOptions) -> serde_json::Value {
    let bundles: Vec<serde_json::Value> = tree
        .iter()
        .map(|bundle| {
            serde_json::json!({
                "type": bundle.bundle_type,
                "name": bundle.name,
                "bytes": bundle.content.len(),
            })
        })
        .collect();

    serde_json::json!({
        "outDir": options.out_dir.display().to_string(),
        "bundles": bundles,
        "compiles": tree.stats.compiles,
        "linkedReads": tree.stats.linked_reads,
        "readRetries": tree.stats.read_retries,
    })
}
