//! Error types for stylesheet builds.
//!
//! Copyright (c) 2025 Posit, PBC

use std::path::PathBuf;

use stylebundle_runtime::RuntimeError;
use thiserror::Error;

use crate::asset::AssetId;

/// Errors that abort a build.
///
/// Every variant is fatal for the entry being built: no bundle of a failed
/// build is handed to the writer.
#[derive(Debug, Error)]
pub enum BuildError {
    /// An import or link reference did not resolve to any file.
    #[error("Cannot resolve '{reference}' from {from}")]
    Resolution { reference: String, from: AssetId },

    /// The stylesheet compiler rejected a source file.
    #[error("Failed to compile {asset}: {message}")]
    Compile { asset: AssetId, message: String },

    /// Import edges form a cycle.
    #[error("Import cycle detected: {}", format_cycle(.path))]
    Cycle { path: Vec<AssetId> },

    /// A transform stage failed.
    #[error("Transform '{stage}' failed: {message}")]
    Transform { stage: String, message: String },

    /// Reading or writing a file failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: RuntimeError,
    },

    /// The entry file type has no compiler or scanner.
    #[error("Unsupported entry type: {}", .0.display())]
    UnsupportedEntry(PathBuf),

    /// Invalid build configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A worker task panicked or was torn down unexpectedly.
    #[error("Build worker failed: {0}")]
    Worker(String),

    /// The build was cancelled before it completed.
    #[error("Build was cancelled")]
    Cancelled,
}

impl BuildError {
    pub fn io(path: impl Into<PathBuf>, source: RuntimeError) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn transform(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transform {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Check if this is a cancellation error.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<tokio::task::JoinError> for BuildError {
    fn from(e: tokio::task::JoinError) -> Self {
        if e.is_cancelled() {
            BuildError::Cancelled
        } else {
            BuildError::Worker(e.to_string())
        }
    }
}

fn format_cycle(path: &[AssetId]) -> String {
    path.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Unknown transform stage '{0}' (expected one of: scope-classes, minify)")]
    UnknownStage(String),

    #[error("parallelism must be at least 1")]
    ZeroParallelism,
}

pub type Result<T> = std::result::Result<T, BuildError>;
