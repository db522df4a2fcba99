//! Recursive-descent parser for PDF objects.
//!
//! Parsing is total: malformed input produces [`Parsed::NotFound`] and the
//! caller's offset is left unchanged. Only document-level code turns a
//! missing object into an error.

use super::lexer::{Keyword, Lexer, Token};
use crate::model::objects::{PDFDict, PDFObjRef, PDFObject, PDFStream};
use bytes::Bytes;

/// Deepest array/dictionary nesting accepted before giving up.
pub const MAX_DEPTH: usize = 256;

/// Outcome of parsing at an offset.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<T> {
    /// A value was parsed; `end` is the offset just past it.
    Found { value: T, end: usize },
    NotFound,
}

impl<T> Parsed<T> {
    pub fn found(self) -> Option<(T, usize)> {
        match self {
            Self::Found { value, end } => Some((value, end)),
            Self::NotFound => None,
        }
    }

    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    pub fn value(self) -> Option<T> {
        self.found().map(|(v, _)| v)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Parsed<U> {
        match self {
            Self::Found { value, end } => Parsed::Found {
                value: f(value),
                end,
            },
            Self::NotFound => Parsed::NotFound,
        }
    }
}

/// An `N G obj ... endobj` block.
#[derive(Debug, Clone, PartialEq)]
pub struct IndirectObject {
    pub objid: u32,
    pub genno: u16,
    pub object: PDFObject,
}

/// Resolves an indirect `/Length` while a stream body is being located.
pub type LengthResolver<'r> = &'r dyn Fn(PDFObjRef) -> Option<i64>;

pub struct ObjectParser<'a> {
    lexer: Lexer<'a>,
    source: Option<&'a Bytes>,
    resolve_length: Option<LengthResolver<'a>>,
}

impl<'a> ObjectParser<'a> {
    pub const fn new(data: &'a [u8]) -> Self {
        Self {
            lexer: Lexer::new(data),
            source: None,
            resolve_length: None,
        }
    }

    /// Parse over shared bytes so stream payloads are sliced, not copied.
    pub fn from_bytes(data: &'a Bytes) -> Self {
        Self {
            lexer: Lexer::new(data.as_ref()),
            source: Some(data),
            resolve_length: None,
        }
    }

    pub fn with_length_resolver(mut self, resolver: LengthResolver<'a>) -> Self {
        self.resolve_length = Some(resolver);
        self
    }

    /// Parse one object starting at `offset`.
    pub fn parse_object(&mut self, offset: usize) -> Parsed<PDFObject> {
        if offset > self.lexer.data().len() {
            return Parsed::NotFound;
        }
        self.lexer.set_pos(offset);
        match self.parse_value(0) {
            Some(value) => Parsed::Found {
                value,
                end: self.lexer.tell(),
            },
            None => Parsed::NotFound,
        }
    }

    /// Parse `N G obj <object> [endobj]` starting at `offset`.
    pub fn parse_indirect(&mut self, offset: usize) -> Parsed<IndirectObject> {
        if offset > self.lexer.data().len() {
            return Parsed::NotFound;
        }
        self.lexer.set_pos(offset);
        let Some((objid, genno)) = self.object_header() else {
            return Parsed::NotFound;
        };

        let Some(mut object) = self.parse_value(0) else {
            return Parsed::NotFound;
        };
        if let PDFObject::Stream(stream) = &mut object {
            stream.set_objid(objid, genno);
        }

        let after_object = self.lexer.tell();
        let end = match self.lexer.next_token() {
            Some((_, Token::Keyword(Keyword::EndObj))) => self.lexer.tell(),
            _ => after_object,
        };
        self.lexer.set_pos(end);

        Parsed::Found {
            value: IndirectObject {
                objid,
                genno,
                object,
            },
            end,
        }
    }

    fn object_header(&mut self) -> Option<(u32, u16)> {
        let objid = self.unsigned_int()?;
        let genno = self.unsigned_int()?;
        match self.lexer.next_token() {
            Some((_, Token::Keyword(Keyword::Obj))) => {
                Some((u32::try_from(objid).ok()?, u16::try_from(genno).ok()?))
            }
            _ => None,
        }
    }

    fn unsigned_int(&mut self) -> Option<i64> {
        match self.lexer.next_token() {
            Some((start, Token::Int(n))) if self.lexer.data()[start].is_ascii_digit() => Some(n),
            _ => None,
        }
    }

    fn parse_value(&mut self, depth: usize) -> Option<PDFObject> {
        if depth > MAX_DEPTH {
            return None;
        }
        let (start, token) = self.lexer.next_token()?;
        match token {
            Token::Int(n) => Some(self.maybe_reference(start, n)),
            Token::Real(r) => Some(PDFObject::Real(r)),
            Token::Bool(b) => Some(PDFObject::Bool(b)),
            Token::Name(name) => Some(PDFObject::Name(name)),
            Token::String(s) => Some(PDFObject::String(s)),
            Token::HexString(s) => Some(PDFObject::HexString(s)),
            Token::Keyword(Keyword::ArrayStart) => self.parse_array(depth),
            Token::Keyword(Keyword::DictStart) => {
                let dict = self.parse_dict(depth)?;
                if depth == 0 {
                    Some(self.maybe_stream(dict))
                } else {
                    Some(PDFObject::Dict(dict))
                }
            }
            Token::Keyword(Keyword::Null) => Some(PDFObject::Null),
            Token::Keyword(Keyword::ArrayEnd | Keyword::DictEnd) => None,
            Token::Keyword(kw) if kw.is_structural() && depth > 0 => None,
            Token::Keyword(kw) => Some(PDFObject::Keyword(kw.as_str().to_string())),
        }
    }

    /// `a b R` is a reference only when both are unsigned integers separated
    /// by plain whitespace and followed by whitespace then `R`.
    fn maybe_reference(&mut self, start: usize, first: i64) -> PDFObject {
        let after_first = self.lexer.tell();
        let data = self.lexer.data();
        if let Some(reference) = self.reference_tail(data, start, first) {
            return PDFObject::Ref(reference);
        }
        self.lexer.set_pos(after_first);
        PDFObject::Int(first)
    }

    fn reference_tail(&mut self, data: &[u8], start: usize, first: i64) -> Option<PDFObjRef> {
        if !data[start].is_ascii_digit() {
            return None;
        }
        let after_first = self.lexer.tell();
        self.lexer.skip_plain_whitespace();
        let second_start = self.lexer.tell();
        if second_start == after_first || !data.get(second_start)?.is_ascii_digit() {
            return None;
        }
        let Some((_, Token::Int(second))) = self.lexer.next_token() else {
            return None;
        };
        let after_second = self.lexer.tell();
        self.lexer.skip_plain_whitespace();
        if self.lexer.tell() == after_second {
            return None;
        }
        match self.lexer.next_token() {
            Some((_, Token::Keyword(Keyword::R))) => Some(PDFObjRef::new(
                u32::try_from(first).ok()?,
                u16::try_from(second).ok()?,
            )),
            _ => None,
        }
    }

    fn parse_array(&mut self, depth: usize) -> Option<PDFObject> {
        let mut items = Vec::new();
        loop {
            let before = self.lexer.tell();
            match self.lexer.next_token()? {
                (_, Token::Keyword(Keyword::ArrayEnd)) => return Some(PDFObject::Array(items)),
                _ => {
                    self.lexer.set_pos(before);
                    items.push(self.parse_value(depth + 1)?);
                }
            }
        }
    }

    fn parse_dict(&mut self, depth: usize) -> Option<PDFDict> {
        let mut dict = PDFDict::new();
        loop {
            match self.lexer.next_token()? {
                (_, Token::Keyword(Keyword::DictEnd)) => return Some(dict),
                (_, Token::Name(key)) => {
                    let value = self.parse_value(depth + 1)?;
                    dict.insert(key, value);
                }
                _ => return None,
            }
        }
    }

    /// Attach a `stream ... endstream` body to `dict` when one follows.
    fn maybe_stream(&mut self, dict: PDFDict) -> PDFObject {
        let after_dict = self.lexer.tell();
        self.lexer.skip_whitespace();
        let data = self.lexer.data();
        let kw_start = self.lexer.tell();
        let is_stream = data[kw_start..].starts_with(b"stream")
            && data
                .get(kw_start + 6)
                .is_none_or(|&b| Lexer::is_whitespace(b));
        if !is_stream {
            self.lexer.set_pos(after_dict);
            return PDFObject::Dict(dict);
        }

        let mut body_start = kw_start + 6;
        if data.get(body_start) == Some(&b'\r') {
            body_start += 1;
        }
        if data.get(body_start) == Some(&b'\n') {
            body_start += 1;
        }

        let (body_end, end) = match self.declared_body(&dict, body_start) {
            Some(found) => found,
            None => scan_body(data, body_start),
        };
        self.lexer.set_pos(end);

        let raw = match self.source {
            Some(bytes) => bytes.slice(body_start..body_end),
            None => Bytes::copy_from_slice(&data[body_start..body_end]),
        };
        PDFObject::Stream(Box::new(PDFStream::new(dict, raw)))
    }

    /// Body bounds from `/Length`, if it is consistent with the buffer.
    fn declared_body(&self, dict: &PDFDict, body_start: usize) -> Option<(usize, usize)> {
        let length = match dict.get("Length")? {
            PDFObject::Int(n) => *n,
            PDFObject::Ref(r) => (self.resolve_length?)(*r)?,
            _ => return None,
        };
        let data = self.lexer.data();
        let body_end = body_start.checked_add(usize::try_from(length).ok()?)?;
        if body_end > data.len() {
            return None;
        }
        let mut cursor = body_end;
        while data.get(cursor).is_some_and(|&b| Lexer::is_whitespace(b)) {
            cursor += 1;
        }
        if data[cursor..].starts_with(b"endstream") {
            Some((body_end, cursor + 9))
        } else {
            tracing::warn!(length, body_start, "stream /Length inconsistent, scanning for endstream");
            None
        }
    }
}

/// Locate `endstream` by scanning and drop a single EOL before it.
fn scan_body(data: &[u8], body_start: usize) -> (usize, usize) {
    let Some(rel) = find_subslice(&data[body_start..], b"endstream") else {
        tracing::warn!(body_start, "unterminated stream body");
        return (data.len(), data.len());
    };
    let kw = body_start + rel;
    let body = &data[body_start..kw];
    let trim = if body.ends_with(b"\r\n") {
        2
    } else if body.ends_with(b"\n") || body.ends_with(b"\r") {
        1
    } else {
        0
    };
    (kw - trim, kw + 9)
}

pub(crate) fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Parse one object from `buffer` at `offset`.
pub fn parse_object(buffer: &[u8], offset: usize) -> Parsed<PDFObject> {
    ObjectParser::new(buffer).parse_object(offset)
}

/// Parse an indirect object from `buffer` at `offset`.
pub fn parse_indirect(buffer: &[u8], offset: usize) -> Parsed<IndirectObject> {
    ObjectParser::new(buffer).parse_indirect(offset)
}
