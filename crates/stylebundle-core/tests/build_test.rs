//! Integration tests: full builds against an in-memory file system.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, mpsc};

use stylebundle_core::transform::scoped_class_name;
use stylebundle_core::{
    AssetId, BuildError, BuildOptions, BundleTree, BundleType, Cancellation, StageKind, build,
    build_with_cancellation,
};
use stylebundle_runtime::{MemoryRuntime, PathKind, RuntimeError, RuntimeResult, SystemRuntime};
use tokio::sync::oneshot;

fn runtime(files: &[(&str, &str)]) -> Arc<MemoryRuntime> {
    let rt = MemoryRuntime::new();
    for (path, contents) in files {
        rt.add_file(path, *contents);
    }
    Arc::new(rt)
}

async fn build_entry(entry: &str, rt: Arc<MemoryRuntime>, options: BuildOptions) -> BundleTree {
    build(Path::new(entry), options, rt).await.unwrap()
}

fn stylesheet_text(tree: &BundleTree) -> String {
    tree.stylesheet()
        .and_then(|b| b.text())
        .unwrap_or_default()
        .to_string()
}

fn position(haystack: &str, needle: &str) -> usize {
    haystack
        .find(needle)
        .unwrap_or_else(|| panic!("{needle:?} not found in {haystack:?}"))
}

#[tokio::test]
async fn test_imports_are_flattened_in_order() {
    let rt = runtime(&[
        (
            "/project/index.scss",
            "@import 'foo';\n@import 'bar';\n.index { color: red; }\n",
        ),
        ("/project/_foo.scss", ".foo { color: blue; }\n"),
        ("/project/_bar.scss", ".bar { color: green; }\n"),
    ]);
    let tree = build_entry("/project/index.scss", rt, BuildOptions::default()).await;

    let css = stylesheet_text(&tree);
    let foo = position(&css, ".foo {");
    let bar = position(&css, ".bar {");
    let index = position(&css, ".index {");
    assert!(foo < bar && bar < index, "{css}");

    assert_eq!(tree.root.bundle_type, BundleType::Stylesheet);
    assert_eq!(
        tree.root.assets,
        vec![
            AssetId::new("/project/_foo.scss"),
            AssetId::new("/project/_bar.scss"),
            AssetId::new("/project/index.scss"),
        ]
    );
}

#[tokio::test]
async fn test_empty_stylesheet_is_empty_bundle() {
    let rt = runtime(&[("/project/index.scss", "")]);
    let tree = build_entry("/project/index.scss", rt, BuildOptions::default()).await;

    assert_eq!(tree.root.name, "index.css");
    assert_eq!(tree.root.text(), Some(""));
    assert!(tree.root.children.is_empty());
}

#[tokio::test]
async fn test_shared_import_compiles_once() {
    let rt = runtime(&[
        ("/project/index.scss", "@import 'a';\n@import 'b';\n"),
        ("/project/_a.scss", "@import 'shared';\n.a { x: 1; }\n"),
        ("/project/_b.scss", "@import 'shared';\n.b { x: 2; }\n"),
        ("/project/_shared.scss", ".shared { x: 0; }\n"),
    ]);
    let tree = build_entry("/project/index.scss", rt, BuildOptions::default()).await;

    assert_eq!(tree.stats.compiles, 4);
    let css = stylesheet_text(&tree);
    assert_eq!(css.matches(".shared {").count(), 1, "{css}");
    assert!(position(&css, ".shared {") < position(&css, ".a {"));
}

#[tokio::test]
async fn test_import_cycle_is_error() {
    let rt = runtime(&[
        ("/project/a.scss", "@import 'b';\n.a { x: 1; }\n"),
        ("/project/b.scss", "@import 'a';\n.b { x: 2; }\n"),
    ]);
    let err = build(Path::new("/project/a.scss"), BuildOptions::default(), rt)
        .await
        .unwrap_err();

    match err {
        BuildError::Cycle { path } => {
            assert_eq!(path.first(), path.last());
            assert!(path.contains(&AssetId::new("/project/b.scss")));
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
}

#[tokio::test]
async fn test_sass_imports_with_comma_list() {
    let rt = runtime(&[
        ("/project/index.sass", "@import foo, bar\n\n.index\n  color: red\n"),
        ("/project/_foo.sass", ".foo\n  color: blue\n"),
        ("/project/_bar.scss", ".bar { color: green; }\n"),
    ]);
    let tree = build_entry("/project/index.sass", rt, BuildOptions::default()).await;

    let css = stylesheet_text(&tree);
    assert!(css.contains(".foo {\n  color: blue;\n}"), "{css}");
    assert!(css.contains(".bar {\n  color: green;\n}"), "{css}");
    assert!(position(&css, ".foo {") < position(&css, ".bar {"));
    assert!(position(&css, ".bar {") < position(&css, ".index {"));
}

#[tokio::test]
async fn test_non_ascii_partial_names() {
    let scss = runtime(&[
        ("/project/index.scss", "@import \"ab€\";\n.index { color: red; }\n"),
        ("/project/_ab€.scss", ".euro { color: gold; }\n"),
    ]);
    let tree = build_entry("/project/index.scss", scss, BuildOptions::default()).await;
    let css = stylesheet_text(&tree);
    assert!(position(&css, ".euro {") < position(&css, ".index {"), "{css}");
    assert_eq!(tree.root.assets[0], AssetId::new("/project/_ab€.scss"));

    let sass = runtime(&[
        ("/project/index.sass", "@import ab€\n.index\n  color: red\n"),
        ("/project/_ab€.sass", ".euro\n  color: gold\n"),
    ]);
    let tree = build_entry("/project/index.sass", sass, BuildOptions::default()).await;
    let css = stylesheet_text(&tree);
    assert!(position(&css, ".euro {") < position(&css, ".index {"), "{css}");
}

#[tokio::test]
async fn test_sass_and_scss_produce_same_css() {
    let options = BuildOptions {
        source_maps: false,
        ..BuildOptions::default()
    };
    let sass = runtime(&[(
        "/project/index.sass",
        "$accent: #336699\n\n.card\n  border: 1px solid $accent\n  .title\n    font-weight: bold\n",
    )]);
    let scss = runtime(&[(
        "/project/index.scss",
        "$accent: #336699;\n\n.card {\n  border: 1px solid $accent;\n  .title {\n    font-weight: bold;\n  }\n}\n",
    )]);

    let from_sass = build_entry("/project/index.sass", sass, options.clone()).await;
    let from_scss = build_entry("/project/index.scss", scss, options).await;
    assert_eq!(stylesheet_text(&from_sass), stylesheet_text(&from_scss));
}

#[tokio::test]
async fn test_scoped_classes_from_code_entry() {
    let rt = runtime(&[
        (
            "/project/app.js",
            "import styles from './button.scss';\nexport const cls = styles.button;\n",
        ),
        ("/project/button.scss", ".button { color: red; }\n.button:hover { color: blue; }\n"),
    ]);
    let options = BuildOptions {
        transforms: vec![StageKind::ScopeClasses],
        ..BuildOptions::default()
    };
    let tree = build_entry("/project/app.js", rt, options).await;

    let scoped = scoped_class_name("button.scss", "button");
    let class_map = tree.class_map.clone().unwrap();
    assert_eq!(class_map.get("button"), Some(&scoped));

    let css = stylesheet_text(&tree);
    assert!(css.contains(&format!(".{} {{", scoped)), "{css}");
    assert!(css.contains(&format!(".{}:hover {{", scoped)), "{css}");
    assert!(!css.contains(".button"), "{css}");

    let code = tree.root.text().unwrap();
    assert_eq!(
        code,
        format!(
            "const styles = {{\"button\":\"{}\"}};\nexport const cls = styles.button;\n",
            scoped
        )
    );
}

#[tokio::test]
async fn test_scoped_classes_hash_declaring_file() {
    let rt = runtime(&[
        ("/project/index.scss", "@import 'card';\n.index .card { color: red; }\n"),
        ("/project/_card.scss", ".card { color: blue; }\n"),
    ]);
    let options = BuildOptions {
        transforms: vec![StageKind::ScopeClasses],
        ..BuildOptions::default()
    };
    let tree = build_entry("/project/index.scss", rt, options).await;

    let class_map = tree.class_map.clone().unwrap();
    assert_eq!(class_map["card"], scoped_class_name("_card.scss", "card"));
    assert_eq!(class_map["index"], scoped_class_name("index.scss", "index"));

    let css = stylesheet_text(&tree);
    assert_eq!(css.matches(class_map["card"].as_str()).count(), 2, "{css}");
}

#[tokio::test]
async fn test_commented_out_script_import_is_ignored() {
    let rt = runtime(&[
        (
            "/project/index.js",
            "// import './old.scss';\nimport s from './index.scss';\n",
        ),
        ("/project/index.scss", ".index { color: red; }\n"),
    ]);
    let tree = build_entry("/project/index.js", rt, BuildOptions::default()).await;

    assert_eq!(
        tree.root.assets,
        vec![
            AssetId::new("/project/index.js"),
            AssetId::new("/project/index.scss"),
        ]
    );
    assert_eq!(
        tree.root.text().unwrap(),
        "// import './old.scss';\nconst s = {};\n"
    );
}

#[tokio::test]
async fn test_code_entry_outline() {
    let rt = runtime(&[
        ("/project/app.js", "import './index.scss';\n"),
        ("/project/index.scss", "@import 'a';\n.index { x: 1; }\n"),
        ("/project/_a.scss", ".a { x: 2; }\n"),
    ]);
    let tree = build_entry("/project/app.js", rt, BuildOptions::default()).await;

    insta::assert_snapshot!(tree.outline(), @r"
    script app.js [app.js, index.scss]
      stylesheet app.css [_a.scss, index.scss]
        map app.css.map []
    ");
}

#[tokio::test]
async fn test_source_map_sources_relative_to_out_dir() {
    let rt = runtime(&[
        ("/project/src/index.scss", "@import 'a';\n.index { x: 1; }\n"),
        ("/project/src/_a.scss", ".a { x: 2; }\n"),
    ]);
    let options = BuildOptions {
        project_root: Some(PathBuf::from("/project")),
        ..BuildOptions::default()
    };
    let tree = build_entry("/project/src/index.scss", rt, options).await;

    let css = stylesheet_text(&tree);
    assert!(css.ends_with("/*# sourceMappingURL=index.css.map */\n"), "{css}");

    let map = tree.find("index.css.map").unwrap();
    let json: serde_json::Value = serde_json::from_slice(&map.content).unwrap();
    assert_eq!(json["version"], 3);
    assert_eq!(json["file"], "index.css");
    assert_eq!(
        json["sources"],
        serde_json::json!(["../src/_a.scss", "../src/index.scss"])
    );
    assert!(json["mappings"].as_str().is_some_and(|m| !m.is_empty()));
}

#[tokio::test]
async fn test_minify_drops_source_map() {
    let rt = runtime(&[("/project/index.scss", ".a {\n  color: red;\n}\n")]);
    let options = BuildOptions {
        transforms: vec![StageKind::Minify],
        ..BuildOptions::default()
    };
    let tree = build_entry("/project/index.scss", rt, options).await;

    assert!(tree.find("index.css.map").is_none());
    let css = stylesheet_text(&tree);
    assert!(!css.contains("sourceMappingURL"), "{css}");
    assert!(!css.contains('\n'), "{css}");
}

#[tokio::test]
async fn test_builds_are_deterministic() {
    let files = [
        ("/project/index.scss", "@import 'a';\n@import 'b';\n.i { src: url(img.png); }\n"),
        ("/project/_a.scss", ".a { background: url(img.png); }\n"),
        ("/project/_b.scss", ".b { background: url(other.svg); }\n"),
        ("/project/img.png", "PNG"),
        ("/project/other.svg", "<svg/>"),
    ];
    let options = BuildOptions {
        parallelism: 4,
        ..BuildOptions::default()
    };

    let first = build_entry("/project/index.scss", runtime(&files), options.clone()).await;
    let second = build_entry("/project/index.scss", runtime(&files), options).await;

    assert_eq!(first.outline(), second.outline());
    let contents = |tree: &BundleTree| -> Vec<Vec<u8>> {
        tree.iter().map(|b| b.content.clone()).collect()
    };
    assert_eq!(contents(&first), contents(&second));

    let linked: Vec<&str> = first
        .iter()
        .filter(|b| b.bundle_type == BundleType::LinkedAsset)
        .map(|b| b.name.as_str())
        .collect();
    assert_eq!(linked.len(), 2);
    assert!(linked[0].starts_with("img.") && linked[0].ends_with(".png"));
    assert!(linked[1].starts_with("other.") && linked[1].ends_with(".svg"));
}

#[tokio::test]
async fn test_cancelled_build() {
    let rt = runtime(&[("/project/index.scss", ".a { x: 1; }\n")]);
    let cancellation = Cancellation::new();
    cancellation.cancel();

    let err = build_with_cancellation(
        Path::new("/project/index.scss"),
        BuildOptions::default(),
        rt,
        cancellation,
    )
    .await
    .unwrap_err();
    assert!(err.is_cancelled());
}

/// Blocks reads of one path until released, signalling when the read starts.
#[derive(Debug)]
struct GatedRuntime {
    inner: MemoryRuntime,
    gated: PathBuf,
    started: Mutex<Option<oneshot::Sender<()>>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl SystemRuntime for GatedRuntime {
    fn file_read(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        if path == self.gated {
            if let Some(started) = self.started.lock().unwrap().take() {
                let _ = started.send(());
            }
            let _ = self.release.lock().unwrap().recv();
        }
        self.inner.file_read(path)
    }

    fn file_write(&self, path: &Path, contents: &[u8]) -> RuntimeResult<()> {
        self.inner.file_write(path, contents)
    }

    fn path_exists(&self, path: &Path, kind: Option<PathKind>) -> RuntimeResult<bool> {
        self.inner.path_exists(path, kind)
    }

    fn canonicalize(&self, path: &Path) -> RuntimeResult<PathBuf> {
        self.inner.canonicalize(path)
    }

    fn dir_create(&self, path: &Path, recursive: bool) -> RuntimeResult<()> {
        self.inner.dir_create(path, recursive)
    }

    fn cwd(&self) -> RuntimeResult<PathBuf> {
        self.inner.cwd()
    }
}

#[tokio::test]
async fn test_cancel_during_discovery_aborts_workers() {
    let inner = MemoryRuntime::new();
    inner.add_file("/project/index.scss", "@import 'slow';\n.index { color: red; }\n");
    inner.add_file("/project/_slow.scss", ".slow { color: blue; }\n");

    let (started_tx, started_rx) = oneshot::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let rt = GatedRuntime {
        inner,
        gated: PathBuf::from("/project/_slow.scss"),
        started: Mutex::new(Some(started_tx)),
        release: Mutex::new(release_rx),
    };

    let cancellation = Cancellation::new();
    let building = build_with_cancellation(
        Path::new("/project/index.scss"),
        BuildOptions::default(),
        Arc::new(rt),
        cancellation.clone(),
    );
    let cancel = async {
        started_rx.await.unwrap();
        cancellation.cancel();
    };
    let (result, ()) = tokio::join!(building, cancel);

    // Unblock the worker thread so the test runtime can shut down.
    release_tx.send(()).unwrap();
    assert!(result.unwrap_err().is_cancelled());
}

/// Fails the first `failures` reads of each listed path with `kind`.
#[derive(Debug)]
struct FlakyRuntime {
    inner: MemoryRuntime,
    kind: io::ErrorKind,
    failures: usize,
    remaining: Mutex<HashMap<PathBuf, usize>>,
}

impl FlakyRuntime {
    fn new(inner: MemoryRuntime, kind: io::ErrorKind, failures: usize, paths: &[&str]) -> Self {
        let remaining = paths
            .iter()
            .map(|p| (PathBuf::from(p), failures))
            .collect();
        Self {
            inner,
            kind,
            failures,
            remaining: Mutex::new(remaining),
        }
    }
}

impl SystemRuntime for FlakyRuntime {
    fn file_read(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        let mut remaining = self.remaining.lock().unwrap();
        if let Some(left) = remaining.get_mut(path) {
            if *left > 0 {
                *left -= 1;
                return Err(RuntimeError::Io(io::Error::new(
                    self.kind,
                    format!("flaky read ({} failures configured)", self.failures),
                )));
            }
        }
        drop(remaining);
        self.inner.file_read(path)
    }

    fn file_write(&self, path: &Path, contents: &[u8]) -> RuntimeResult<()> {
        self.inner.file_write(path, contents)
    }

    fn path_exists(&self, path: &Path, kind: Option<PathKind>) -> RuntimeResult<bool> {
        self.inner.path_exists(path, kind)
    }

    fn canonicalize(&self, path: &Path) -> RuntimeResult<PathBuf> {
        self.inner.canonicalize(path)
    }

    fn dir_create(&self, path: &Path, recursive: bool) -> RuntimeResult<()> {
        self.inner.dir_create(path, recursive)
    }

    fn cwd(&self) -> RuntimeResult<PathBuf> {
        self.inner.cwd()
    }
}

fn font_project() -> MemoryRuntime {
    let rt = MemoryRuntime::new();
    rt.add_file("/project/index.css", ".a { src: url(font.woff2); }\n");
    rt.add_file("/project/font.woff2", b"wOF2".to_vec());
    rt
}

#[tokio::test]
async fn test_transient_link_reads_are_retried() {
    let rt = FlakyRuntime::new(
        font_project(),
        io::ErrorKind::Interrupted,
        2,
        &["/project/font.woff2"],
    );
    let tree = build(Path::new("/project/index.css"), BuildOptions::default(), Arc::new(rt))
        .await
        .unwrap();

    assert_eq!(tree.stats.read_retries, 2);
    assert_eq!(tree.stats.linked_reads, 1);
    let font = tree
        .iter()
        .find(|b| b.bundle_type == BundleType::LinkedAsset)
        .unwrap();
    assert_eq!(font.content, b"wOF2");
}

#[tokio::test]
async fn test_transient_reads_give_up_after_limit() {
    let rt = FlakyRuntime::new(
        font_project(),
        io::ErrorKind::TimedOut,
        10,
        &["/project/font.woff2"],
    );
    let options = BuildOptions {
        link_read_retries: 1,
        ..BuildOptions::default()
    };
    let err = build(Path::new("/project/index.css"), options, Arc::new(rt))
        .await
        .unwrap_err();
    assert!(matches!(err, BuildError::Io { ref path, .. } if path == Path::new("/project/font.woff2")));
}

#[tokio::test]
async fn test_permanent_link_read_failure_is_not_retried() {
    let rt = FlakyRuntime::new(
        font_project(),
        io::ErrorKind::PermissionDenied,
        1,
        &["/project/font.woff2"],
    );
    let err = build(Path::new("/project/index.css"), BuildOptions::default(), Arc::new(rt))
        .await
        .unwrap_err();
    match err {
        BuildError::Io { source, .. } => {
            assert_eq!(source.io_kind(), Some(io::ErrorKind::PermissionDenied));
        }
        other => panic!("expected an I/O error, got {other:?}"),
    }
}
