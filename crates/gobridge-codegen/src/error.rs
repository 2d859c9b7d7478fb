use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("unknown plugin: {name} (available: {})", available.join(", "))]
    UnknownPlugin {
        name: String,
        available: Vec<String>,
    },

    #[error("invalid package: {0}")]
    InvalidPackage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
