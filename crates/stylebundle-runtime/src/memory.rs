/*
 * memory.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * MemoryRuntime: a SystemRuntime over an in-memory virtual file system.
 */

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;

use crate::traits::{PathKind, RuntimeError, RuntimeResult, SystemRuntime};

/// Helper function to create a "not found" error.
fn not_found_error(path: &Path) -> RuntimeError {
    RuntimeError::Io(io::Error::new(
        io::ErrorKind::NotFound,
        format!("Path not found: {}", path.display()),
    ))
}

/// In-memory file system.
///
/// Directories are created implicitly for the parents of every file that
/// is added. Relative paths are interpreted against the project root.
#[derive(Debug)]
pub struct VirtualFileSystem {
    /// File contents, keyed by normalized absolute path
    files: HashMap<PathBuf, Vec<u8>>,
    /// Directory entries (automatically includes parents of all files)
    directories: HashSet<PathBuf>,
    /// Project root directory (default working directory)
    project_root: PathBuf,
}

impl VirtualFileSystem {
    /// Create a new empty virtual filesystem rooted at `/project`.
    pub fn new() -> Self {
        Self::with_project_root(PathBuf::from("/project"))
    }

    /// Create VFS with a custom project root.
    pub fn with_project_root(project_root: PathBuf) -> Self {
        let mut vfs = Self {
            files: HashMap::new(),
            directories: HashSet::new(),
            project_root: project_root.clone(),
        };
        vfs.directories.insert(PathBuf::from("/"));
        vfs.add_directory_and_parents(&project_root);
        vfs
    }

    /// Add a file, creating all parent directories.
    pub fn add_file(&mut self, path: &Path, contents: Vec<u8>) {
        let normalized = self.normalize_path(path);
        if let Some(parent) = normalized.parent() {
            self.add_directory_and_parents(parent);
        }
        self.files.insert(normalized, contents);
    }

    /// Add a directory (and all parent directories).
    pub fn add_directory(&mut self, path: &Path) {
        let normalized = self.normalize_path(path);
        self.add_directory_and_parents(&normalized);
    }

    /// List all files, sorted.
    pub fn list_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self.files.keys().cloned().collect();
        files.sort();
        files
    }

    pub fn is_file(&self, path: &Path) -> bool {
        self.files.contains_key(&self.normalize_path(path))
    }

    pub fn is_directory(&self, path: &Path) -> bool {
        self.directories.contains(&self.normalize_path(path))
    }

    pub fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        let normalized = self.normalize_path(path);
        self.files
            .get(&normalized)
            .cloned()
            .ok_or_else(|| not_found_error(&normalized))
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Normalize a path to an absolute path.
    pub fn normalize_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return normalize_components(path);
        }
        normalize_components(&self.project_root.join(path))
    }

    fn add_directory_and_parents(&mut self, path: &Path) {
        let mut current = PathBuf::new();
        for component in path.components() {
            current.push(component);
            self.directories.insert(current.clone());
        }
    }
}

impl Default for VirtualFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize path components (remove `.` and resolve `..`).
fn normalize_components(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("/");
                }
            }
            Component::CurDir => {}
            other => normalized.push(other),
        }
    }
    if normalized.as_os_str().is_empty() {
        normalized.push("/");
    }
    normalized
}

/// Runtime over a [`VirtualFileSystem`].
///
/// Uses an `RwLock` so one instance can be shared by concurrent build workers.
#[derive(Debug, Default)]
pub struct MemoryRuntime {
    vfs: RwLock<VirtualFileSystem>,
}

impl MemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vfs(vfs: VirtualFileSystem) -> Self {
        Self {
            vfs: RwLock::new(vfs),
        }
    }

    /// Add (or replace) a file.
    pub fn add_file(&self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) {
        self.write_vfs().add_file(path.as_ref(), contents.into());
    }

    pub fn list_files(&self) -> Vec<PathBuf> {
        self.read_vfs().list_files()
    }

    pub fn project_root(&self) -> PathBuf {
        self.read_vfs().project_root().to_path_buf()
    }

    fn read_vfs(&self) -> std::sync::RwLockReadGuard<'_, VirtualFileSystem> {
        // A poisoned lock only means a writer panicked mid-insert; the map is still usable.
        self.vfs.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_vfs(&self) -> std::sync::RwLockWriteGuard<'_, VirtualFileSystem> {
        self.vfs.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl SystemRuntime for MemoryRuntime {
    fn file_read(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        self.read_vfs().read_file(path)
    }

    fn file_write(&self, path: &Path, contents: &[u8]) -> RuntimeResult<()> {
        self.write_vfs().add_file(path, contents.to_vec());
        Ok(())
    }

    fn path_exists(&self, path: &Path, kind: Option<PathKind>) -> RuntimeResult<bool> {
        let vfs = self.read_vfs();
        Ok(match kind {
            None => vfs.is_file(path) || vfs.is_directory(path),
            Some(PathKind::File) => vfs.is_file(path),
            Some(PathKind::Directory) => vfs.is_directory(path),
        })
    }

    fn canonicalize(&self, path: &Path) -> RuntimeResult<PathBuf> {
        let vfs = self.read_vfs();
        let normalized = vfs.normalize_path(path);
        if vfs.is_file(&normalized) || vfs.is_directory(&normalized) {
            Ok(normalized)
        } else {
            Err(not_found_error(&normalized))
        }
    }

    fn dir_create(&self, path: &Path, _recursive: bool) -> RuntimeResult<()> {
        self.write_vfs().add_directory(path);
        Ok(())
    }

    fn cwd(&self) -> RuntimeResult<PathBuf> {
        Ok(self.project_root())
    }
}
