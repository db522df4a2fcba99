//! PDF object model.

pub mod objects;

pub use objects::{PDFDict, PDFObjRef, PDFObject, PDFStream};
