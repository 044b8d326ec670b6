/*
 * stylebundle-runtime
 * Copyright (c) 2025 Posit, PBC
 *
 * Runtime abstraction layer for stylebundle.
 *
 * This crate provides a trait-based abstraction for the file system
 * operations the bundler performs, so builds can run against:
 *
 * - NativeRuntime: Full system access using std
 * - MemoryRuntime: An in-memory virtual file system
 *
 * It also hosts the grass-based SCSS compiler entry point.
 */

mod memory;
mod native;
pub mod sass_native;
mod traits;

pub use traits::{PathKind, RuntimeError, RuntimeResult, SystemRuntime};

pub use memory::{MemoryRuntime, VirtualFileSystem};
pub use native::NativeRuntime;

/// Create the default runtime for the host.
pub fn default_runtime() -> NativeRuntime {
    NativeRuntime::new()
}
