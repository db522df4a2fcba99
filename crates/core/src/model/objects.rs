//! PDF object types.
//!
//! Every value produced by the tokenizer is a [`PDFObject`]. Streams keep
//! only their raw payload; decoded bytes are owned by the document cache.

use crate::error::{PdfError, Result};
use bytes::Bytes;
use std::collections::HashMap;

/// Dictionary representation shared by dictionaries and stream attributes.
pub type PDFDict = HashMap<String, PDFObject>;

/// PDF Object types - the fundamental value type in PDF.
#[derive(Debug, Clone, PartialEq)]
pub enum PDFObject {
    /// Null object
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Real (floating point) value
    Real(f64),
    /// Name object (e.g., /Type, /Font)
    Name(String),
    /// Literal string `( ... )`
    String(Vec<u8>),
    /// Hexadecimal string `< ... >`
    HexString(Vec<u8>),
    /// Array of objects
    Array(Vec<Self>),
    /// Dictionary (name -> object mapping)
    Dict(PDFDict),
    /// Stream (dictionary + binary data)
    Stream(Box<PDFStream>),
    /// Indirect object reference
    Ref(PDFObjRef),
    /// Bare keyword that is not part of the object grammar
    Keyword(String),
}

impl PDFObject {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn as_bool(&self) -> Result<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            _ => Err(PdfError::TypeError {
                expected: "bool",
                got: self.type_name(),
            }),
        }
    }

    pub const fn as_int(&self) -> Result<i64> {
        match self {
            Self::Int(n) => Ok(*n),
            _ => Err(PdfError::TypeError {
                expected: "int",
                got: self.type_name(),
            }),
        }
    }

    /// Get numeric value (int or real coerced to f64)
    pub const fn as_num(&self) -> Result<f64> {
        match self {
            Self::Int(n) => Ok(*n as f64),
            Self::Real(n) => Ok(*n),
            _ => Err(PdfError::TypeError {
                expected: "number",
                got: self.type_name(),
            }),
        }
    }

    pub fn as_name(&self) -> Result<&str> {
        match self {
            Self::Name(s) => Ok(s),
            _ => Err(PdfError::TypeError {
                expected: "name",
                got: self.type_name(),
            }),
        }
    }

    /// Get string bytes, accepting both literal and hex strings.
    pub fn as_string(&self) -> Result<&[u8]> {
        match self {
            Self::String(s) | Self::HexString(s) => Ok(s),
            _ => Err(PdfError::TypeError {
                expected: "string",
                got: self.type_name(),
            }),
        }
    }

    pub const fn as_array(&self) -> Result<&Vec<Self>> {
        match self {
            Self::Array(arr) => Ok(arr),
            _ => Err(PdfError::TypeError {
                expected: "array",
                got: self.type_name(),
            }),
        }
    }

    /// Get as dictionary. A stream yields its attribute dictionary.
    pub fn as_dict(&self) -> Result<&PDFDict> {
        match self {
            Self::Dict(d) => Ok(d),
            Self::Stream(s) => Ok(&s.attrs),
            _ => Err(PdfError::TypeError {
                expected: "dict",
                got: self.type_name(),
            }),
        }
    }

    pub fn as_stream(&self) -> Result<&PDFStream> {
        match self {
            Self::Stream(s) => Ok(s),
            _ => Err(PdfError::TypeError {
                expected: "stream",
                got: self.type_name(),
            }),
        }
    }

    pub const fn as_ref(&self) -> Result<&PDFObjRef> {
        match self {
            Self::Ref(r) => Ok(r),
            _ => Err(PdfError::TypeError {
                expected: "ref",
                got: self.type_name(),
            }),
        }
    }

    /// Get type name for error messages
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Real(_) => "real",
            Self::Name(_) => "name",
            Self::String(_) => "string",
            Self::HexString(_) => "hexstring",
            Self::Array(_) => "array",
            Self::Dict(_) => "dict",
            Self::Stream(_) => "stream",
            Self::Ref(_) => "ref",
            Self::Keyword(_) => "keyword",
        }
    }

    /// True when the object is a dictionary or stream whose `/Type` is `name`.
    pub fn has_type(&self, name: &str) -> bool {
        self.as_dict()
            .ok()
            .and_then(|d| d.get("Type"))
            .and_then(|t| t.as_name().ok())
            .is_some_and(|t| t == name)
    }
}

/// PDF indirect object reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PDFObjRef {
    pub objid: u32,
    pub genno: u16,
}

impl PDFObjRef {
    pub const fn new(objid: u32, genno: u16) -> Self {
        Self { objid, genno }
    }
}

/// PDF Stream - dictionary attributes + raw (still encoded) payload.
#[derive(Debug, Clone, PartialEq)]
pub struct PDFStream {
    /// Stream dictionary attributes
    pub attrs: PDFDict,
    rawdata: Bytes,
    /// Object ID (set when the stream is owned by a numbered object)
    pub objid: Option<u32>,
    /// Generation number
    pub genno: Option<u16>,
}

impl PDFStream {
    pub fn new(attrs: PDFDict, rawdata: impl Into<Bytes>) -> Self {
        Self {
            attrs,
            rawdata: rawdata.into(),
            objid: None,
            genno: None,
        }
    }

    pub const fn set_objid(&mut self, objid: u32, genno: u16) {
        self.objid = Some(objid);
        self.genno = Some(genno);
    }

    /// Get raw (undecoded) data.
    pub fn get_rawdata(&self) -> &[u8] {
        self.rawdata.as_ref()
    }

    /// Get raw data as shared bytes.
    pub fn rawdata_bytes(&self) -> Bytes {
        self.rawdata.clone()
    }

    pub fn get(&self, name: &str) -> Option<&PDFObject> {
        self.attrs.get(name)
    }

    /// Get attribute, trying multiple names.
    pub fn get_any(&self, names: &[&str]) -> Option<&PDFObject> {
        names.iter().find_map(|name| self.attrs.get(*name))
    }

    /// Filter entries of `/Filter` (or `/F`), normalised to a list.
    ///
    /// Entries stay unresolved; indirect references are left for the
    /// document to resolve.
    pub fn filters(&self) -> Vec<PDFObject> {
        match self.get_any(&["Filter", "F"]) {
            None | Some(PDFObject::Null) => Vec::new(),
            Some(PDFObject::Array(items)) => items.clone(),
            Some(other) => vec![other.clone()],
        }
    }

    /// Decode parameters of `/DecodeParms` (or `/DP`), one slot per filter.
    pub fn decode_parms(&self) -> Vec<PDFObject> {
        match self.get_any(&["DecodeParms", "DP"]) {
            None => Vec::new(),
            Some(PDFObject::Array(items)) => items.clone(),
            Some(other) => vec![other.clone()],
        }
    }
}
