//! Error types for the quire PDF object library.

use thiserror::Error;

/// Primary error type for document, decryption and codec operations.
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("PDF syntax error: {0}")]
    SyntaxError(String),

    #[error("no %PDF- header found in the first 1024 bytes")]
    MissingHeader,

    #[error("document catalog could not be resolved")]
    MissingCatalog,

    #[error("unsupported security configuration: {0}")]
    Unimplemented(String),

    #[error("filter {filter} is not implemented")]
    NotImplemented { filter: String },

    #[error("incorrect password")]
    InvalidPassword,

    #[error("unsupported security handler revision: R={0}")]
    InvalidRevision(i64),

    #[error("decryption failed: {0}")]
    DecryptionError(String),

    #[error("{filter} decode failed: {msg}")]
    CodecError { filter: &'static str, msg: String },

    #[error("type error: expected {expected}, got {got}")]
    TypeError {
        expected: &'static str,
        got: &'static str,
    },

    #[error("PDF object not found: {objid} {genno} R")]
    ObjectNotFound { objid: u32, genno: u16 },

    #[error("no valid xref table found")]
    NoValidXRef,

    #[error("circular reference detected for object {0}")]
    CircularReference(u32),

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PdfError {
    pub(crate) fn codec(filter: &'static str, msg: impl Into<String>) -> Self {
        Self::CodecError {
            filter,
            msg: msg.into(),
        }
    }
}

/// Convenience Result type alias for PdfError.
pub type Result<T> = std::result::Result<T, PdfError>;
