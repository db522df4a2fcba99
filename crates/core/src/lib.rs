//! quire - PDF object parsing, cross-reference resolution, decryption and
//! stream decoding.

pub mod api;
pub mod codec;
pub mod crypto;
pub mod document;
pub mod error;
pub mod model;
pub mod parser;

pub use api::{DocumentBuilder, OpenOptions};
pub use document::{DocumentStats, PDFDocument};
pub use error::{PdfError, Result};
pub use model::{PDFDict, PDFObjRef, PDFObject, PDFStream};
pub use parser::{Parsed, parse_indirect, parse_object};
