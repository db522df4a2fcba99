//! PDF Document module - object access, cross-references and security.
//!
//! This module contains:
//! - `catalog` - document loading, object resolution, stream decoding (PDFDocument)
//! - `xref` - cross-reference tables, streams and the recovery scan
//! - `security` - per-document decryption of strings and streams

pub mod catalog;
pub mod security;
pub mod xref;

pub use catalog::{DocumentStats, PDFDocument};
pub use security::SecurityHandler;
pub use xref::{MAX_XREF_SECTIONS, XRefEntry, XRefResolver, XRefTable};
