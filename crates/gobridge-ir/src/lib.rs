pub mod error;
pub mod types;

// Re-exports
pub use error::UnsupportedType;
pub use types::{
    is_exported, ParsedField, ParsedFunc, ParsedMethod, ParsedPackage, ParsedParam, ParsedResult,
    ParsedStruct, ParsedType, Signature, TypeKind,
};
