use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Looked up in the package directory when `--config` is not given.
pub const CONFIG_FILE: &str = "gobridge.json";

/// Optional per-package settings. Command-line flags override every field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct FileConfig {
    pub plugin: Option<String>,
    pub import_path: Option<String>,
    pub output: Option<PathBuf>,
    pub library_name: Option<String>,
    pub build_system: Option<String>,
    pub verbose: Option<bool>,
    pub strict: Option<bool>,
    pub packaging: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config '{}'", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid config '{}'", path.display()))
    }

    /// Load `explicit` if given, else `<dir>/gobridge.json` if it exists.
    pub fn discover(dir: &Path, explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let path = dir.join(CONFIG_FILE);
        if path.is_file() {
            log::info!("using config {}", path.display());
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Derive a package's import path from the nearest enclosing `go.mod`.
pub fn infer_import_path(pkg_dir: &Path) -> Option<String> {
    let pkg_dir = pkg_dir.canonicalize().ok()?;
    for root in pkg_dir.ancestors() {
        let go_mod = root.join("go.mod");
        if !go_mod.is_file() {
            continue;
        }
        let content = std::fs::read_to_string(&go_mod).ok()?;
        let module = module_path(&content)?;
        let rel = pkg_dir.strip_prefix(root).ok()?;
        let mut path = module;
        for part in rel.components() {
            path.push('/');
            path.push_str(&part.as_os_str().to_string_lossy());
        }
        return Some(path);
    }
    None
}

/// The path on the `module` line of a go.mod file.
fn module_path(go_mod: &str) -> Option<String> {
    go_mod.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("module")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let rest = rest.split("//").next().unwrap_or_default().trim();
        let path = rest.trim_matches('"');
        (!path.is_empty()).then(|| path.to_string())
    })
}
