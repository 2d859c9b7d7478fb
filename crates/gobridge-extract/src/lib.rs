pub mod error;
pub mod extract;
pub mod lexer;
pub mod parser;
pub mod syntax;

// Re-exports
pub use error::{ExtractError, SyntaxError};
pub use extract::{extract_sources, parse_package, DroppedSymbol, ExtractOptions, ExtractReport};
pub use parser::parse_file;
