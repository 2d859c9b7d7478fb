use gobridge_ir::UnsupportedType;
use thiserror::Error;

/// A lexing or parsing failure inside one source file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{line}:{column}: {message}")]
pub struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl SyntaxError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

/// Errors that abort extraction of a whole package
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("package directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("I/O error reading {0}: {1}")]
    Io(String, std::io::Error),

    #[error("syntax error in {file}:{line}:{column}: {message}")]
    Syntax {
        file: String,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("no Go packages found in {0}")]
    NoPackage(String),

    #[error("no non-test packages found in {0}")]
    NoNonTestPackage(String),

    /// Only raised when extraction runs in strict mode.
    #[error("cannot expose {symbol}: {source}")]
    Unsupported {
        symbol: String,
        source: UnsupportedType,
    },
}

impl ExtractError {
    pub fn syntax(file: &str, err: SyntaxError) -> Self {
        ExtractError::Syntax {
            file: file.to_string(),
            line: err.line,
            column: err.column,
            message: err.message,
        }
    }
}
