/*
 * transform/mod.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * CSS post-processing pipeline.
 */

//! CSS post-processing pipeline.
//!
//! This module provides the abstractions for transforms applied to the
//! flattened stylesheet text:
//!
//! - [`CssTransform`] - The trait implemented by all stages
//! - [`TransformPipeline`] - Ordered collection of stages to execute
//! - [`StageKind`] - The registry of stages selectable from configuration
//!
//! # Architecture
//!
//! Stages run in a flat, ordered sequence (configuration order). Each
//! stage rewrites the CSS text in place and may record auxiliary output
//! in the [`TransformContext`]; the scoping stage records the class map
//! that code modules receive for their stylesheet imports.

mod minify;
mod scope;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use minify::{Minify, minify_css};
pub use scope::{ScopeClasses, scoped_class_name};

use crate::asset::AssetId;
use crate::error::{ConfigError, Result};

/// Original class name to scoped class name.
pub type ClassMap = BTreeMap<String, String>;

/// State shared by the stages of one pipeline run.
#[derive(Debug)]
pub struct TransformContext<'a> {
    /// The stylesheet the CSS belongs to.
    pub asset: &'a AssetId,
    /// Base for the relative identity hashed into scoped names.
    pub project_root: &'a Path,
    /// Set by the scoping stage.
    pub class_map: Option<ClassMap>,
    /// Cleared by a stage whose output lines no longer match its input.
    pub lines_preserved: bool,
    /// Byte offset where each contributing stylesheet's text starts, in
    /// ascending order. Cleared by any stage that moves text.
    pub sources: Vec<(usize, AssetId)>,
}

impl<'a> TransformContext<'a> {
    pub fn new(asset: &'a AssetId, project_root: &'a Path) -> Self {
        Self {
            asset,
            project_root,
            class_map: None,
            lines_preserved: true,
            sources: Vec::new(),
        }
    }
}

/// Trait for CSS transformations.
///
/// Stages must be `Send + Sync` so a pipeline can be shared by concurrent
/// builds.
pub trait CssTransform: Send + Sync {
    /// Name used in configuration and logs.
    fn name(&self) -> &str;

    /// Apply the transformation to `css`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Transform`](crate::BuildError::Transform) if
    /// the stage cannot process the input.
    fn transform(&self, css: &mut String, ctx: &mut TransformContext<'_>) -> Result<()>;
}

/// A pipeline of CSS transforms to execute in order.
pub struct TransformPipeline {
    transforms: Vec<Box<dyn CssTransform>>,
}

/// Result of running a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    pub css: String,
    pub class_map: Option<ClassMap>,
    pub lines_preserved: bool,
}

impl TransformPipeline {
    /// Create a new empty pipeline.
    pub fn new() -> Self {
        Self {
            transforms: Vec::new(),
        }
    }

    /// Build a pipeline from configured stage names.
    pub fn from_stages(stages: &[StageKind]) -> Self {
        let mut pipeline = Self::new();
        pipeline.extend(stages.iter().map(|stage| stage.create()));
        pipeline
    }

    /// Add a transform to the pipeline.
    ///
    /// Transforms run in the order they are added.
    pub fn push(&mut self, transform: Box<dyn CssTransform>) {
        self.transforms.push(transform);
    }

    /// Add multiple transforms to the pipeline.
    pub fn extend(&mut self, transforms: impl IntoIterator<Item = Box<dyn CssTransform>>) {
        self.transforms.extend(transforms);
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Execute all transforms in insertion order.
    ///
    /// Returns the first error encountered. Execution stops on error.
    pub fn execute(&self, css: &mut String, ctx: &mut TransformContext<'_>) -> Result<()> {
        for transform in &self.transforms {
            tracing::debug!(transform = transform.name(), asset = %ctx.asset, "Running transform");
            transform.transform(css, ctx)?;
        }
        Ok(())
    }

    /// Run the pipeline over the flattened CSS of `asset`.
    pub fn apply(&self, css: String, asset: &AssetId, project_root: &Path) -> Result<TransformOutput> {
        self.apply_with_sources(css, asset, Vec::new(), project_root)
    }

    /// Like [`apply`](Self::apply), with the offsets at which each
    /// contributing stylesheet starts in `css`.
    pub fn apply_with_sources(
        &self,
        css: String,
        asset: &AssetId,
        sources: Vec<(usize, AssetId)>,
        project_root: &Path,
    ) -> Result<TransformOutput> {
        let mut css = css;
        let mut ctx = TransformContext::new(asset, project_root);
        ctx.sources = sources;
        self.execute(&mut css, &mut ctx)?;
        Ok(TransformOutput {
            css,
            class_map: ctx.class_map,
            lines_preserved: ctx.lines_preserved,
        })
    }

    /// List the names of all transforms in execution order.
    pub fn transform_names(&self) -> Vec<&str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }
}

impl Default for TransformPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TransformPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.transform_names()).finish()
    }
}

/// The stages that can be named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    ScopeClasses,
    Minify,
}

impl StageKind {
    pub const ALL: [StageKind; 2] = [StageKind::ScopeClasses, StageKind::Minify];

    pub fn name(self) -> &'static str {
        match self {
            Self::ScopeClasses => "scope-classes",
            Self::Minify => "minify",
        }
    }

    pub fn create(self) -> Box<dyn CssTransform> {
        match self {
            Self::ScopeClasses => Box::new(ScopeClasses),
            Self::Minify => Box::new(Minify),
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StageKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.name() == s)
            .ok_or_else(|| ConfigError::UnknownStage(s.to_string()))
    }
}
