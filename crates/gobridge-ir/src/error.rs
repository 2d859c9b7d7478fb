use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A type shape that cannot cross the FFI boundary.
///
/// Raised by the extractor while resolving a type expression and by the
/// type mappers; the offending function, method or field is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("unsupported type {shape}: {reason}")]
pub struct UnsupportedType {
    /// Short description of the rejected shape (e.g. "chan", "func")
    pub shape: String,
    /// Human-readable rejection reason
    pub reason: String,
}

impl UnsupportedType {
    pub fn new(shape: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            shape: shape.into(),
            reason: reason.into(),
        }
    }

    pub fn channel() -> Self {
        Self::new("chan", "channels cannot be exposed via cgo")
    }

    pub fn function() -> Self {
        Self::new("func", "function types cannot be exposed via cgo")
    }

    pub fn interface() -> Self {
        Self::new("interface", "non-empty interfaces cannot be exposed via cgo")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_shape_and_reason() {
        let err = UnsupportedType::channel();
        assert_eq!(
            err.to_string(),
            "unsupported type chan: channels cannot be exposed via cgo"
        );
    }
}
