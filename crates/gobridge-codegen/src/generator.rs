use std::collections::BTreeMap;
use std::path::Path;

use gobridge_ir::ParsedPackage;

use crate::error::CodegenError;
use crate::naming::is_go_identifier;
use crate::traits::Plugin;

/// A collection of generated files, keyed by relative path.
#[derive(Debug, Clone, Default)]
pub struct GeneratedProject {
    /// Files keyed by relative path (sorted for deterministic output)
    files: BTreeMap<String, String>,
}

impl GeneratedProject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file to the generated project.
    pub fn add_file(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }

    /// Get all generated files.
    pub fn files(&self) -> &BTreeMap<String, String> {
        &self.files
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    /// Number of generated files.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Write all generated files to the given output directory.
    pub fn write_to_disk(&self, output_dir: &Path) -> Result<(), std::io::Error> {
        for (rel_path, content) in &self.files {
            let full_path = output_dir.join(rel_path);
            if let Some(parent) = full_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&full_path, content)?;
        }
        Ok(())
    }
}

/// Reject a package the glue could not import.
pub fn validate_package(pkg: &ParsedPackage) -> Result<(), CodegenError> {
    if pkg.name.is_empty() {
        return Err(CodegenError::InvalidPackage("package name is empty".into()));
    }
    if !is_go_identifier(&pkg.name) {
        return Err(CodegenError::InvalidPackage(format!(
            "{:?} is not a valid package name",
            pkg.name
        )));
    }
    if pkg.name == "main" {
        return Err(CodegenError::InvalidPackage(
            "package main cannot be imported".into(),
        ));
    }
    Ok(())
}

/// Run `plugin` over `pkg` and collect its output files.
pub fn generate_project(
    plugin: &dyn Plugin,
    pkg: &ParsedPackage,
    with_packaging: bool,
) -> Result<GeneratedProject, CodegenError> {
    let code = plugin.generate(pkg)?;
    let content = String::from_utf8_lossy(&code).into_owned();

    let mut project = GeneratedProject::new();
    if with_packaging {
        project.add_file(plugin.packaged_output(pkg), content);
        for (path, body) in plugin.companion_files(pkg) {
            project.add_file(path, body);
        }
    } else {
        project.add_file(plugin.default_output(pkg), content);
    }

    log::debug!(
        "{} produced {} file(s) for package {}",
        plugin.name(),
        project.file_count(),
        pkg.name
    );
    Ok(project)
}
