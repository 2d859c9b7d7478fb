pub mod abi;
pub mod context;
pub mod error;
pub mod generator;
pub mod mapping;
pub mod naming;
pub mod packaging;
pub mod registry;
pub mod traits;

// Target emitters
pub mod emitters;

// Re-exports
pub use context::EmitContext;
pub use error::CodegenError;
pub use generator::{generate_project, validate_package, GeneratedProject};
pub use packaging::BuildSystem;
pub use registry::{global, PluginFactory, PluginRegistry};
pub use traits::{Plugin, PluginOptions};
