//! Build configuration.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Options come from a `stylebundle.yml` file found next to the entry or in
//! one of its ancestor directories, and are then overridden by command-line
//! flags:
//!
//! ```yaml
//! out-dir: public/css
//! source-maps: true
//! load-paths:
//!   - vendor/scss
//! transforms:
//!   - scope-classes
//!   - minify
//! identity-policy: canonical
//! ```
//!
//! Relative paths are interpreted against the directory of the config file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stylebundle_runtime::SystemRuntime;

use crate::error::{BuildError, ConfigError, Result};
use crate::resolve::{IdentityPolicy, normalize_lexically};
use crate::transform::StageKind;

/// Name of the configuration file looked up for each entry.
pub const CONFIG_FILE_NAME: &str = "stylebundle.yml";

/// Output formatting of compiled SCSS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputStyle {
    #[default]
    Expanded,
    Compressed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BuildOptions {
    /// Where bundles are written.
    pub out_dir: PathBuf,

    /// Emit a `.map` bundle next to the stylesheet.
    pub source_maps: bool,

    /// Maximum number of files compiled or read at once.
    pub parallelism: usize,

    /// Extra directories searched for imports, after the importing file's
    /// own directory.
    pub load_paths: Vec<PathBuf>,

    /// Post-processing stages, in order.
    pub transforms: Vec<StageKind>,

    pub identity_policy: IdentityPolicy,

    /// Retries for transient errors while reading linked assets.
    pub link_read_retries: u32,

    pub output_style: OutputStyle,

    /// Base for relative paths in source maps and scoped class hashes.
    /// Defaults to the config file's directory, or the entry's directory.
    pub project_root: Option<PathBuf>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("dist"),
            source_maps: true,
            parallelism: default_parallelism(),
            load_paths: Vec::new(),
            transforms: Vec::new(),
            identity_policy: IdentityPolicy::default(),
            link_read_retries: 3,
            output_style: OutputStyle::default(),
            project_root: None,
        }
    }
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl BuildOptions {
    /// Parse options from YAML text. An empty document yields the defaults.
    pub fn from_yaml(text: &str, path: &Path) -> std::result::Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.parallelism == 0 {
            return Err(ConfigError::ZeroParallelism);
        }
        Ok(())
    }

    /// Make every path absolute against `base` (the project root when it is
    /// unset).
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        let root = match self.project_root.take() {
            Some(root) => normalize_lexically(&base.join(root)),
            None => normalize_lexically(base),
        };
        self.out_dir = normalize_lexically(&root.join(&self.out_dir));
        self.load_paths = self
            .load_paths
            .iter()
            .map(|p| normalize_lexically(&root.join(p)))
            .collect();
        self.project_root = Some(root);
        self
    }

    /// The project root; only meaningful after [`resolve_paths`](Self::resolve_paths).
    pub fn root(&self) -> &Path {
        self.project_root.as_deref().unwrap_or_else(|| Path::new("/"))
    }
}

/// Find the nearest `stylebundle.yml` in `start` or its ancestors.
pub fn find_config(runtime: &dyn SystemRuntime, start: &Path) -> Result<Option<PathBuf>> {
    for dir in start.ancestors() {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if runtime
            .is_file(&candidate)
            .map_err(|e| BuildError::io(&candidate, e))?
        {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

/// Load options for an entry file: the nearest config file if there is
/// one, otherwise defaults; paths resolved against the config directory
/// (or the entry directory).
pub fn load_config(runtime: &dyn SystemRuntime, entry: &Path) -> Result<BuildOptions> {
    let entry_dir = entry.parent().unwrap_or_else(|| Path::new("/"));

    let (options, base) = match find_config(runtime, entry_dir)? {
        Some(path) => {
            let text = runtime
                .file_read_string(&path)
                .map_err(|e| BuildError::io(&path, e))?;
            let options = BuildOptions::from_yaml(&text, &path)?;
            tracing::debug!(config = %path.display(), "loaded configuration");
            let base = path.parent().unwrap_or(entry_dir).to_path_buf();
            (options, base)
        }
        None => (BuildOptions::default(), entry_dir.to_path_buf()),
    };

    options.validate()?;
    Ok(options.resolve_paths(&base))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stylebundle_runtime::MemoryRuntime;

    #[test]
    fn test_defaults() {
        let options = BuildOptions::default();
        assert_eq!(options.out_dir, PathBuf::from("dist"));
        assert!(options.source_maps);
        assert!(options.parallelism >= 1);
        assert_eq!(options.link_read_retries, 3);
        assert_eq!(options.identity_policy, IdentityPolicy::Canonical);
        assert!(options.transforms.is_empty());
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
out-dir: public
source-maps: false
parallelism: 2
load-paths: [vendor]
transforms: [scope-classes, minify]
identity-policy: lexical
output-style: compressed
"#;
        let options = BuildOptions::from_yaml(yaml, Path::new("stylebundle.yml")).unwrap();
        assert_eq!(options.out_dir, PathBuf::from("public"));
        assert!(!options.source_maps);
        assert_eq!(options.parallelism, 2);
        assert_eq!(options.load_paths, vec![PathBuf::from("vendor")]);
        assert_eq!(
            options.transforms,
            vec![StageKind::ScopeClasses, StageKind::Minify]
        );
        assert_eq!(options.identity_policy, IdentityPolicy::Lexical);
        assert_eq!(options.output_style, OutputStyle::Compressed);
        // Unset keys keep their defaults.
        assert_eq!(options.link_read_retries, 3);
    }

    #[test]
    fn test_unknown_stage_is_parse_error() {
        let err = BuildOptions::from_yaml("transforms: [autoprefix]", Path::new("x.yml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("autoprefix"));
    }

    #[test]
    fn test_zero_parallelism_rejected() {
        let options = BuildOptions {
            parallelism: 0,
            ..BuildOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(ConfigError::ZeroParallelism)
        ));
    }

    #[test]
    fn test_resolve_paths() {
        let options = BuildOptions {
            load_paths: vec![PathBuf::from("../shared")],
            ..BuildOptions::default()
        }
        .resolve_paths(Path::new("/project/site"));
        assert_eq!(options.root(), Path::new("/project/site"));
        assert_eq!(options.out_dir, PathBuf::from("/project/site/dist"));
        assert_eq!(options.load_paths, vec![PathBuf::from("/project/shared")]);
    }

    #[test]
    fn test_load_config_from_ancestor() {
        let rt = MemoryRuntime::new();
        rt.add_file("/project/stylebundle.yml", "out-dir: build\n");
        rt.add_file("/project/src/styles/index.scss", ".a {}");

        let options = load_config(&rt, Path::new("/project/src/styles/index.scss")).unwrap();
        assert_eq!(options.root(), Path::new("/project"));
        assert_eq!(options.out_dir, PathBuf::from("/project/build"));
    }

    #[test]
    fn test_load_config_without_file() {
        let rt = MemoryRuntime::new();
        rt.add_file("/project/src/index.scss", ".a {}");

        let options = load_config(&rt, Path::new("/project/src/index.scss")).unwrap();
        assert_eq!(options.root(), Path::new("/project/src"));
        assert_eq!(options.out_dir, PathBuf::from("/project/src/dist"));
    }

    #[test]
    fn test_load_config_parse_error() {
        let rt = MemoryRuntime::new();
        rt.add_file("/project/stylebundle.yml", "source-maps: [oops");
        let err = load_config(&rt, Path::new("/project/index.scss")).unwrap_err();
        assert!(matches!(err, BuildError::Config(ConfigError::Parse { .. })));
    }
}
