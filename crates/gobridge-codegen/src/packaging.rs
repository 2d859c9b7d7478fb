//! Python packaging metadata for the generated bindings.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildSystem {
    #[default]
    Setuptools,
    Hatch,
    Poetry,
    Uv,
}

impl BuildSystem {
    pub const ALL: [BuildSystem; 4] = [
        BuildSystem::Setuptools,
        BuildSystem::Hatch,
        BuildSystem::Poetry,
        BuildSystem::Uv,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BuildSystem::Setuptools => "setuptools",
            BuildSystem::Hatch => "hatch",
            BuildSystem::Poetry => "poetry",
            BuildSystem::Uv => "uv",
        }
    }

    /// Parse a build-system name; unknown names fall back to setuptools.
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(name.trim()))
            .unwrap_or_default()
    }
}

impl fmt::Display for BuildSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared library extension for the host platform.
pub fn shared_library_extension() -> &'static str {
    if cfg!(target_os = "windows") {
        ".dll"
    } else if cfg!(target_os = "macos") {
        ".dylib"
    } else {
        ".so"
    }
}

/// `pyproject.toml` for a package directory named `package` that ships the
/// shared library `library` (without extension) for every platform.
pub fn pyproject_toml(package: &str, library: &str, build_system: BuildSystem) -> String {
    let description = format!("Python bindings for the {package} Go package");
    let project = format!(
        r#"[project]
name = "{package}"
version = "0.1.0"
description = "{description}"
requires-python = ">=3.8"
"#
    );
    let libs = format!(r#""{library}.so", "{library}.dylib", "{library}.dll""#);
    let artifacts =
        format!(r#""{package}/{library}.so", "{package}/{library}.dylib", "{package}/{library}.dll""#);

    match build_system {
        BuildSystem::Setuptools => format!(
            r#"[build-system]
requires = ["setuptools>=61.0", "wheel"]
build-backend = "setuptools.build_meta"

{project}
[tool.setuptools]
packages = ["{package}"]

[tool.setuptools.package-data]
{package} = [{libs}]
"#
        ),
        BuildSystem::Hatch => format!(
            r#"[build-system]
requires = ["hatchling"]
build-backend = "hatchling.build"

{project}
[tool.hatch.build.targets.wheel]
packages = ["{package}"]
artifacts = [{artifacts}]
"#
        ),
        BuildSystem::Poetry => format!(
            r#"[tool.poetry]
name = "{package}"
version = "0.1.0"
description = "{description}"
authors = []
packages = [{{ include = "{package}" }}]
include = [
    {{ path = "{package}/{library}.so", format = "wheel" }},
    {{ path = "{package}/{library}.dylib", format = "wheel" }},
    {{ path = "{package}/{library}.dll", format = "wheel" }},
]

[tool.poetry.dependencies]
python = "^3.8"

[build-system]
requires = ["poetry-core>=1.0.0"]
build-backend = "poetry.core.masonry.api"
"#
        ),
        BuildSystem::Uv => format!(
            r#"[build-system]
requires = ["hatchling"]
build-backend = "hatchling.build"

{project}
[tool.hatch.build.targets.wheel]
packages = ["{package}"]
artifacts = [{artifacts}]

[tool.uv]
package = true
"#
        ),
    }
}
