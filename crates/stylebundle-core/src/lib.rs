//! Asset graph and bundle tree construction for stylesheet builds
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Starting from one entry file (a stylesheet, or a code module that
//! imports stylesheets), a build resolves and compiles every reachable
//! stylesheet once, reads and content-hashes every local `url()` resource,
//! and arranges the results into a [`BundleTree`] that the writer puts on
//! disk.
//!
//! # Architecture
//!
//! - [`Resolver`] - maps import and link references to file identities
//! - [`CompilerKind`] - SCSS, indented Sass and plain CSS compilers
//! - [`GraphBuilder`] - concurrent discovery, then cycle-checked assembly
//!   into an [`AssetGraph`]
//! - [`TransformPipeline`] - optional post-processing stages ([`StageKind`])
//! - [`Bundler`] - flattens the graph into stylesheet, map and linked bundles
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use stylebundle_core::{BuildOptions, build_blocking, write_bundle_tree};
//! use stylebundle_runtime::NativeRuntime;
//!
//! let runtime = Arc::new(NativeRuntime::new());
//! let tree = build_blocking("styles/index.scss".as_ref(), BuildOptions::default(), runtime.clone())?;
//! write_bundle_tree(&tree, "dist".as_ref(), runtime.as_ref())?;
//! ```

pub mod asset;
pub mod build;
pub mod bundle;
pub mod cancellation;
pub mod compile;
pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod hash;
pub mod links;
pub mod mime;
pub mod resolve;
pub mod script;
pub mod source_map;
pub mod transform;
pub mod writer;

// Re-export commonly used types
pub use asset::{Asset, AssetGraph, AssetId, AssetIndex, LinkedAsset, LinkedIndex};
pub use build::{build, build_blocking, build_with_cancellation};
pub use bundle::{Bundle, BundleTree, BundleType, Bundler, Entry, ScriptEntry};
pub use cancellation::Cancellation;
pub use compile::{CompileOptions, Compiled, CompilerKind};
pub use config::{BuildOptions, CONFIG_FILE_NAME, OutputStyle, find_config, load_config};
pub use context::BuildContext;
pub use error::{BuildError, ConfigError, Result};
pub use graph::{BuildStats, GraphBuilder};
pub use resolve::{IdentityPolicy, Resolved, Resolver};
pub use source_map::{SourceMap, SourceMapBuilder, SourceMapFragment};
pub use transform::{ClassMap, CssTransform, StageKind, TransformPipeline};
pub use writer::write_bundle_tree;
