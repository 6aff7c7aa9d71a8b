pub mod editor_parsing;
pub mod javascript;
pub mod languages;
pub mod pipeline;
pub mod python;
pub mod rust;
pub mod text_document;
pub mod types;
pub mod typescript;

pub use languages::{Span, TSLanguageConfig, TSLanguageParsing};
pub use pipeline::chunk_file;
pub use text_document::{DocumentSymbol, Position, Range, TextDocument};
