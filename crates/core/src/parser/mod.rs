//! Parser module - tokenizer and object parser.
//!
//! - `lexer` - byte-level token scanner
//! - `object_parser` - objects, references, indirect objects and stream bodies

pub mod lexer;
pub mod object_parser;

pub use lexer::{Keyword, Lexer, Token};
pub use object_parser::{
    IndirectObject, LengthResolver, MAX_DEPTH, ObjectParser, Parsed, parse_indirect, parse_object,
};
