//! Cross-reference resolution.
//!
//! Walks the `startxref` → `/XRefStm` → `/Prev` chain, merging classic
//! tables and xref streams newest-first. When no section loads, the whole
//! buffer is scanned for `N G obj` headers instead.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use indexmap::IndexMap;
use regex::bytes::Regex;

use crate::error::{PdfError, Result};
use crate::model::objects::{PDFDict, PDFObjRef, PDFObject, PDFStream};
use crate::parser::lexer::{Keyword, Lexer, Token};
use crate::parser::object_parser::ObjectParser;

/// Hard cap on sections followed in one resolution pass.
pub const MAX_XREF_SECTIONS: usize = 512;

/// `startxref` is looked for in this many trailing bytes first.
const STARTXREF_WINDOW: usize = 1024;

/// Where an object lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Byte offset of the `N G obj` header.
    Offset { offset: usize, genno: u16 },
    /// `index`-th object of the object stream `container`.
    InObjectStream { container: u32, index: usize },
    Free { genno: u16 },
}

impl XRefEntry {
    pub const fn genno(&self) -> u16 {
        match self {
            Self::Offset { genno, .. } | Self::Free { genno } => *genno,
            Self::InObjectStream { .. } => 0,
        }
    }

    pub const fn is_free(&self) -> bool {
        matches!(self, Self::Free { .. })
    }
}

/// One table or stream as read from the file.
#[derive(Debug, Default)]
struct XRefSection {
    entries: IndexMap<u32, XRefEntry>,
    trailer: PDFDict,
}

/// Merged cross-reference index of a document.
#[derive(Debug, Clone, Default)]
pub struct XRefTable {
    entries: IndexMap<u32, XRefEntry>,
    trailers: Vec<PDFDict>,
    is_fallback: bool,
}

impl XRefTable {
    /// Add an older section: existing entries are kept.
    fn merge_entries(&mut self, entries: IndexMap<u32, XRefEntry>) {
        for (objid, entry) in entries {
            self.entries.entry(objid).or_insert(entry);
        }
    }

    fn merge(&mut self, section: XRefSection) {
        self.merge_entries(section.entries);
        self.trailers.push(section.trailer);
    }

    pub fn get(&self, objid: u32) -> Option<&XRefEntry> {
        self.entries.get(&objid)
    }

    /// Trailer dictionaries, newest first.
    pub fn trailers(&self) -> &[PDFDict] {
        &self.trailers
    }

    /// `key` from the newest trailer that has it.
    pub fn trailer_value(&self, key: &str) -> Option<&PDFObject> {
        self.trailers.iter().find_map(|t| t.get(key))
    }

    /// True when the table was rebuilt by scanning the buffer.
    pub const fn is_fallback(&self) -> bool {
        self.is_fallback
    }

    /// Numbers of all objects that are in use.
    pub fn objids(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.is_free())
            .map(|(objid, _)| *objid)
    }

    pub fn locations(&self) -> HashMap<(u32, u16), XRefEntry> {
        self.entries
            .iter()
            .map(|(objid, entry)| ((*objid, entry.genno()), *entry))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Decodes the filters of an xref stream.
pub type StreamDecoder<'r> = &'r dyn Fn(&PDFStream) -> Result<Vec<u8>>;

pub struct XRefResolver<'a> {
    data: &'a Bytes,
    decode: StreamDecoder<'a>,
}

impl<'a> XRefResolver<'a> {
    pub fn new(data: &'a Bytes, decode: StreamDecoder<'a>) -> Self {
        Self { data, decode }
    }

    /// Build the merged table, falling back to a buffer scan.
    pub fn resolve(&self) -> Result<XRefTable> {
        let chained = self.find_startxref().and_then(|pos| self.load_chain(pos));
        match chained {
            Ok(table) if !table.is_empty() => Ok(table),
            Ok(_) => {
                tracing::warn!("cross-reference chain is empty, scanning for objects");
                self.load_fallback()
            }
            Err(e) => {
                tracing::warn!(error = %e, "cross-reference chain unreadable, scanning for objects");
                self.load_fallback()
            }
        }
    }

    fn find_startxref(&self) -> Result<usize> {
        let data = self.data.as_ref();
        let window_start = data.len().saturating_sub(STARTXREF_WINDOW);
        let pos = rfind(&data[window_start..], b"startxref")
            .map(|p| window_start + p)
            .or_else(|| rfind(data, b"startxref"))
            .ok_or(PdfError::NoValidXRef)?;

        let mut lexer = Lexer::new(data);
        lexer.set_pos(pos + b"startxref".len());
        match lexer.next_token() {
            Some((_, Token::Int(n))) => usize::try_from(n).map_err(|_| PdfError::NoValidXRef),
            _ => Err(PdfError::NoValidXRef),
        }
    }

    fn load_chain(&self, start: usize) -> Result<XRefTable> {
        let mut table = XRefTable::default();
        let mut visited = HashSet::new();
        let mut sections = 0usize;
        let mut next = Some(start);

        while let Some(pos) = next.take() {
            if !visited.insert(pos) {
                tracing::warn!(pos, "cyclic /Prev chain, stopping");
                break;
            }
            if sections >= MAX_XREF_SECTIONS {
                tracing::warn!(sections, "too many cross-reference sections, stopping");
                break;
            }
            if pos >= self.data.len() {
                tracing::warn!(pos, "cross-reference offset out of range");
                break;
            }
            let section = match self.load_section(pos) {
                Ok(section) => section,
                Err(e) if sections == 0 => return Err(e),
                Err(e) => {
                    tracing::warn!(pos, error = %e, "skipping unreadable older section");
                    break;
                }
            };
            sections += 1;
            tracing::debug!(pos, entries = section.entries.len(), "loaded cross-reference section");

            let xref_stm = offset_value(&section.trailer, "XRefStm");
            next = offset_value(&section.trailer, "Prev");
            table.merge(section);

            if let Some(stm) = xref_stm
                && visited.insert(stm)
            {
                match self.load_stream_section(stm) {
                    Ok(hybrid) => {
                        sections += 1;
                        table.merge_entries(hybrid.entries);
                    }
                    Err(e) => tracing::warn!(pos = stm, error = %e, "ignoring bad /XRefStm"),
                }
            }
        }
        Ok(table)
    }

    fn load_section(&self, pos: usize) -> Result<XRefSection> {
        let mut lexer = Lexer::new(self.data.as_ref());
        lexer.set_pos(pos);
        lexer.skip_whitespace();
        let start = lexer.tell();
        if self.data[start..].starts_with(b"xref") {
            self.load_classic_section(start + 4)
        } else {
            self.load_stream_section(start)
        }
    }

    /// Classic table body, starting just past the `xref` keyword.
    fn load_classic_section(&self, pos: usize) -> Result<XRefSection> {
        let data = self.data.as_ref();
        let mut lexer = Lexer::new(data);
        lexer.set_pos(pos);
        let mut section = XRefSection::default();

        loop {
            let first = match lexer.next_token() {
                Some((_, Token::Keyword(Keyword::Trailer))) => break,
                Some((_, Token::Int(n))) => n,
                _ => return Err(PdfError::SyntaxError("malformed xref subsection".into())),
            };
            let Some((_, Token::Int(count))) = lexer.next_token() else {
                return Err(PdfError::SyntaxError("missing xref subsection count".into()));
            };
            let mut base = u32::try_from(first)
                .map_err(|_| PdfError::SyntaxError(format!("bad xref subsection start {first}")))?;

            for i in 0..count.max(0) {
                let row = (lexer.next_token(), lexer.next_token(), lexer.next_token());
                let (
                    Some((_, Token::Int(offset))),
                    Some((_, Token::Int(genno))),
                    Some((_, Token::Keyword(Keyword::Other(marker)))),
                ) = row
                else {
                    return Err(PdfError::SyntaxError("malformed xref row".into()));
                };
                let genno = u16::try_from(genno).unwrap_or(u16::MAX);

                // Subsections that start at 1 but still list the free head of object 0.
                if i == 0 && base > 0 && marker == "f" && offset == 0 && genno == u16::MAX {
                    base -= 1;
                }
                let Some(objid) = u32::try_from(i).ok().and_then(|i| base.checked_add(i)) else {
                    continue;
                };

                let entry = match marker.as_str() {
                    "n" => match usize::try_from(offset) {
                        Ok(offset) => XRefEntry::Offset { offset, genno },
                        Err(_) => continue,
                    },
                    "f" => XRefEntry::Free { genno },
                    other => {
                        return Err(PdfError::SyntaxError(format!("bad xref marker {other:?}")));
                    }
                };
                section.entries.insert(objid, entry);
            }
        }

        let trailer_pos = lexer.tell();
        section.trailer = ObjectParser::new(data)
            .parse_object(trailer_pos)
            .value()
            .and_then(|obj| match obj {
                PDFObject::Dict(dict) => Some(dict),
                _ => None,
            })
            .ok_or_else(|| PdfError::SyntaxError("missing trailer dictionary".into()))?;
        Ok(section)
    }

    fn load_stream_section(&self, pos: usize) -> Result<XRefSection> {
        let object = ObjectParser::from_bytes(self.data)
            .parse_indirect(pos)
            .value()
            .ok_or_else(|| PdfError::SyntaxError(format!("no object at xref offset {pos}")))?
            .object;
        let stream = object.as_stream()?;

        let widths = stream
            .get("W")
            .ok_or_else(|| PdfError::SyntaxError("missing /W in xref stream".into()))?
            .as_array()?
            .iter()
            .map(|w| {
                w.as_int().and_then(|w| match usize::try_from(w) {
                    Ok(w) if w <= 8 => Ok(w),
                    _ => Err(PdfError::SyntaxError(format!("bad /W field width {w}"))),
                })
            })
            .collect::<Result<Vec<usize>>>()?;
        let [w0, w1, w2] = widths[..] else {
            return Err(PdfError::SyntaxError("/W must have 3 elements".into()));
        };
        let row_len = w0 + w1 + w2;
        if row_len == 0 {
            return Err(PdfError::SyntaxError("/W describes empty rows".into()));
        }

        let size = stream
            .get("Size")
            .ok_or_else(|| PdfError::SyntaxError("missing /Size in xref stream".into()))?
            .as_int()?;
        let subsections = match stream.get("Index") {
            Some(index) => index
                .as_array()?
                .chunks_exact(2)
                .map(|pair| Ok((pair[0].as_int()?, pair[1].as_int()?)))
                .collect::<Result<Vec<_>>>()?,
            None => vec![(0, size)],
        };

        let data = (self.decode)(stream)?;
        let mut rows = data.chunks_exact(row_len);
        let mut section = XRefSection::default();

        'subsections: for (first, count) in subsections {
            for i in 0..count.max(0) {
                let Some(row) = rows.next() else {
                    break 'subsections;
                };
                let Ok(objid) = u32::try_from(first + i) else {
                    continue;
                };
                let kind = if w0 == 0 { 1 } else { be_int(&row[..w0]) };
                let field1 = be_int(&row[w0..w0 + w1]);
                let field2 = be_int(&row[w0 + w1..]);
                let entry = match kind {
                    0 => XRefEntry::Free {
                        genno: u16::try_from(field2).unwrap_or(u16::MAX),
                    },
                    1 => {
                        let (Ok(offset), Ok(genno)) =
                            (usize::try_from(field1), u16::try_from(field2))
                        else {
                            continue;
                        };
                        XRefEntry::Offset { offset, genno }
                    }
                    2 => {
                        let (Ok(container), Ok(index)) =
                            (u32::try_from(field1), usize::try_from(field2))
                        else {
                            continue;
                        };
                        XRefEntry::InObjectStream { container, index }
                    }
                    _ => continue,
                };
                section.entries.insert(objid, entry);
            }
        }

        section.trailer = stream
            .attrs
            .iter()
            .filter(|(key, _)| {
                !matches!(
                    key.as_str(),
                    "Length" | "Filter" | "DecodeParms" | "W" | "Index" | "Type"
                )
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(section)
    }

    /// Rebuild the table from `N G obj` headers; the last occurrence wins.
    fn load_fallback(&self) -> Result<XRefTable> {
        let headers = scan_object_headers(self.data)?;
        if headers.is_empty() {
            return Err(PdfError::NoValidXRef);
        }

        let mut table = XRefTable {
            is_fallback: true,
            ..XRefTable::default()
        };
        for (objid, (offset, genno)) in &headers {
            table
                .entries
                .insert(*objid, XRefEntry::Offset { offset: *offset, genno: *genno });
        }

        let trailer = self
            .last_trailer()
            .or_else(|| self.synthesized_trailer(&headers))
            .unwrap_or_default();
        table.trailers.push(trailer);
        tracing::warn!(objects = table.len(), "rebuilt cross-reference index by scanning");
        Ok(table)
    }

    fn last_trailer(&self) -> Option<PDFDict> {
        let pos = rfind(self.data, b"trailer")?;
        match ObjectParser::new(self.data).parse_object(pos + b"trailer".len()).value()? {
            PDFObject::Dict(dict) => Some(dict),
            _ => None,
        }
    }

    /// `/Root` pointing at the first catalog object in file order.
    fn synthesized_trailer(&self, headers: &IndexMap<u32, (usize, u16)>) -> Option<PDFDict> {
        let mut by_position: Vec<(usize, u32, u16)> = headers
            .iter()
            .map(|(objid, (offset, genno))| (*offset, *objid, *genno))
            .collect();
        by_position.sort_unstable();

        let mut parser = ObjectParser::from_bytes(self.data);
        let (objid, genno) = by_position.into_iter().find_map(|(offset, objid, genno)| {
            let indirect = parser.parse_indirect(offset).value()?;
            indirect
                .object
                .has_type("Catalog")
                .then_some((objid, genno))
        })?;
        tracing::debug!(objid, "synthesized trailer from catalog object");
        let mut trailer = PDFDict::new();
        trailer.insert("Root".into(), PDFObject::Ref(PDFObjRef::new(objid, genno)));
        Some(trailer)
    }
}

/// Every `N G obj` header in `data`, mapped to (offset, genno).
/// Later headers for the same number replace earlier ones.
pub(crate) fn scan_object_headers(data: &[u8]) -> Result<IndexMap<u32, (usize, u16)>> {
    let re = Regex::new(r"(\d+)\s+(\d+)\s+obj\b")
        .map_err(|e| PdfError::SyntaxError(format!("object header pattern: {e}")))?;
    let mut headers = IndexMap::new();
    for cap in re.captures_iter(data) {
        let (Some(whole), Some(objid), Some(genno)) = (cap.get(0), cap.get(1), cap.get(2)) else {
            continue;
        };
        let (Some(objid), Some(genno)) = (
            ascii_number::<u32>(objid.as_bytes()),
            ascii_number::<u16>(genno.as_bytes()),
        ) else {
            continue;
        };
        headers.insert(objid, (whole.start(), genno));
    }
    Ok(headers)
}

fn ascii_number<T: std::str::FromStr>(digits: &[u8]) -> Option<T> {
    std::str::from_utf8(digits).ok()?.parse().ok()
}

fn offset_value(trailer: &PDFDict, key: &str) -> Option<usize> {
    let value = trailer.get(key)?.as_int().ok()?;
    usize::try_from(value).ok()
}

fn be_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|w| w == needle)
}
