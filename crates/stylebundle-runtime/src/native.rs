/*
 * native.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * NativeRuntime implementation backed by std::fs.
 */

use std::path::{Path, PathBuf};

use crate::traits::{PathKind, RuntimeResult, SystemRuntime};

/// Runtime with full access to the host file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeRuntime;

impl NativeRuntime {
    /// Create a new native runtime.
    pub fn new() -> Self {
        Self
    }
}

impl SystemRuntime for NativeRuntime {
    fn file_read(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        Ok(std::fs::read(path)?)
    }

    fn file_write(&self, path: &Path, contents: &[u8]) -> RuntimeResult<()> {
        Ok(std::fs::write(path, contents)?)
    }

    fn path_exists(&self, path: &Path, kind: Option<PathKind>) -> RuntimeResult<bool> {
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        Ok(match kind {
            None => true,
            Some(PathKind::File) => metadata.is_file(),
            Some(PathKind::Directory) => metadata.is_dir(),
        })
    }

    fn canonicalize(&self, path: &Path) -> RuntimeResult<PathBuf> {
        Ok(std::fs::canonicalize(path)?)
    }

    fn dir_create(&self, path: &Path, recursive: bool) -> RuntimeResult<()> {
        if recursive {
            std::fs::create_dir_all(path)?;
        } else {
            std::fs::create_dir(path)?;
        }
        Ok(())
    }

    fn cwd(&self) -> RuntimeResult<PathBuf> {
        Ok(std::env::current_dir()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_file_round_trip() {
        let rt = NativeRuntime::new();
        let temp = tempfile::tempdir().unwrap();

        let file_path = temp.path().join("a.scss");
        rt.file_write(&file_path, b".a { color: red; }").unwrap();

        assert!(rt.is_file(&file_path).unwrap());
        assert!(!rt.is_dir(&file_path).unwrap());
        assert!(rt.is_dir(temp.path()).unwrap());
        assert_eq!(rt.file_read_string(&file_path).unwrap(), ".a { color: red; }");
    }

    #[test]
    fn test_native_missing_path_is_not_an_error() {
        let rt = NativeRuntime::new();
        let temp = tempfile::tempdir().unwrap();
        assert!(!rt.path_exists(&temp.path().join("nope"), None).unwrap());
    }

    #[test]
    fn test_native_canonicalize_resolves_parent_components() {
        let rt = NativeRuntime::new();
        let temp = tempfile::tempdir().unwrap();
        rt.dir_create(&temp.path().join("sub/dir"), true).unwrap();
        rt.file_write(&temp.path().join("sub/x.css"), b"").unwrap();

        let canonical = rt
            .canonicalize(&temp.path().join("sub/dir/../x.css"))
            .unwrap();
        assert_eq!(
            canonical,
            rt.canonicalize(&temp.path().join("sub/x.css")).unwrap()
        );
    }
}
