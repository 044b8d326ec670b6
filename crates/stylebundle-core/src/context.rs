//! Per-build state.
//!
//! Copyright (c) 2025 Posit, PBC

use std::path::Path;
use std::sync::Arc;

use stylebundle_runtime::SystemRuntime;

use crate::cancellation::Cancellation;
use crate::compile::CompileOptions;
use crate::config::BuildOptions;
use crate::error::Result;
use crate::resolve::Resolver;
use crate::transform::TransformPipeline;

/// Everything one build run needs. Caches live in the graph builder and
/// are dropped with the run; nothing is shared between builds.
pub struct BuildContext {
    pub options: BuildOptions,
    pub runtime: Arc<dyn SystemRuntime>,
    pub resolver: Resolver,
    pub compile_options: CompileOptions,
    pub pipeline: TransformPipeline,
    pub cancellation: Cancellation,
}

impl BuildContext {
    /// Create a context from options whose paths are already absolute
    /// (see [`BuildOptions::resolve_paths`]).
    pub fn new(
        options: BuildOptions,
        runtime: Arc<dyn SystemRuntime>,
        cancellation: Cancellation,
    ) -> Result<Self> {
        options.validate()?;

        let resolver = Resolver::new(
            runtime.clone(),
            options.load_paths.clone(),
            options.identity_policy,
        );
        let compile_options = CompileOptions {
            output_style: options.output_style,
            source_maps: options.source_maps,
        };
        let pipeline = TransformPipeline::from_stages(&options.transforms);

        Ok(Self {
            options,
            runtime,
            resolver,
            compile_options,
            pipeline,
            cancellation,
        })
    }

    pub fn project_root(&self) -> &Path {
        self.options.root()
    }

    pub fn out_dir(&self) -> &Path {
        &self.options.out_dir
    }
}

impl std::fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildContext")
            .field("options", &self.options)
            .field("resolver", &self.resolver)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}
