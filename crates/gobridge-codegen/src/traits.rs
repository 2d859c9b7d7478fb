use gobridge_ir::ParsedPackage;
use serde::{Deserialize, Serialize};

use crate::error::CodegenError;
use crate::packaging::BuildSystem;

/// A code generation backend.
///
/// Each target implements this trait to turn a package IR into one
/// artifact. Symbols the target cannot express are omitted from the
/// artifact; `generate` only fails on a structurally invalid package.
pub trait Plugin: Send + Sync {
    /// Registry key (e.g., "cgo", "python").
    fn name(&self) -> &str;

    /// Generate the main artifact.
    fn generate(&self, pkg: &ParsedPackage) -> Result<Vec<u8>, CodegenError>;

    /// Relative path of the main artifact.
    fn default_output(&self, pkg: &ParsedPackage) -> String;

    /// Relative path of the main artifact when packaging files are written
    /// next to it.
    fn packaged_output(&self, pkg: &ParsedPackage) -> String {
        self.default_output(pkg)
    }

    /// Extra files written with `--packaging`, keyed by relative path.
    fn companion_files(&self, _pkg: &ParsedPackage) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// Options handed to every plugin factory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginOptions {
    /// Log every dropped symbol at warn level
    pub verbose: bool,
    /// Shared library base name, `lib<package>` when unset
    pub library_name: Option<String>,
    pub build_system: BuildSystem,
}

impl PluginOptions {
    pub fn library_name_for(&self, package: &str) -> String {
        match &self.library_name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("lib{package}"),
        }
    }
}
