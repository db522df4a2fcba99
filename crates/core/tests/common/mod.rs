//! Helpers for assembling small PDF files in tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::Write;

/// Writes indirect objects and cross-reference sections with real offsets.
pub struct PdfWriter {
    buf: Vec<u8>,
    pending: BTreeMap<u32, usize>,
    sections: usize,
    last_xref: Option<usize>,
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfWriter {
    pub fn new() -> Self {
        Self {
            buf: b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n".to_vec(),
            pending: BTreeMap::new(),
            sections: 0,
            last_xref: None,
        }
    }

    pub fn offset(&self) -> usize {
        self.buf.len()
    }

    /// Offset of the most recent cross-reference section.
    pub fn last_xref(&self) -> Option<usize> {
        self.last_xref
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn object(&mut self, objid: u32, body: &str) -> &mut Self {
        self.pending.insert(objid, self.buf.len());
        write!(self.buf, "{objid} 0 obj\n{body}\nendobj\n").unwrap();
        self
    }

    /// Stream object; `/Length` is appended to `dict_entries`.
    pub fn stream(&mut self, objid: u32, dict_entries: &str, data: &[u8]) -> &mut Self {
        self.pending.insert(objid, self.buf.len());
        write!(
            self.buf,
            "{objid} 0 obj\n<< {dict_entries} /Length {} >>\nstream\n",
            data.len()
        )
        .unwrap();
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\nendstream\nendobj\n");
        self
    }

    /// Classic `xref` section for the objects written since the last one,
    /// followed by `trailer` and `startxref`.
    pub fn xref(&mut self, trailer: &str) -> usize {
        let pos = self.buf.len();
        let mut entries = std::mem::take(&mut self.pending);
        self.buf.extend_from_slice(b"xref\n");
        if self.sections == 0 {
            self.buf.extend_from_slice(b"0 1\n0000000000 65535 f \n");
        }
        let ids: Vec<u32> = entries.keys().copied().collect();
        for run in runs(&ids) {
            writeln!(self.buf, "{} {}", run[0], run.len()).unwrap();
            for id in run {
                let offset = entries.remove(id).unwrap();
                write!(self.buf, "{offset:010} 00000 n \n").unwrap();
            }
        }
        write!(self.buf, "trailer\n{trailer}\nstartxref\n{pos}\n%%EOF\n").unwrap();
        self.sections += 1;
        self.last_xref = Some(pos);
        pos
    }

    /// Cross-reference stream with `W [1 4 2]` covering `0..size`, followed
    /// by `startxref`.
    ///
    /// `compressed` lists `(objid, container, index)` for objects stored in
    /// object streams. The stream itself is given `objid`.
    pub fn xref_stream(
        &mut self,
        objid: u32,
        size: u32,
        compressed: &[(u32, u32, u16)],
        extra: &str,
    ) -> usize {
        let pos = self.xref_stream_object(objid, size, compressed, extra);
        self.pending.clear();
        write!(self.buf, "startxref\n{pos}\n%%EOF\n").unwrap();
        self.sections += 1;
        self.last_xref = Some(pos);
        pos
    }

    /// The cross-reference stream object alone. Written objects stay
    /// pending so a classic section can list them too.
    pub fn xref_stream_object(
        &mut self,
        objid: u32,
        size: u32,
        compressed: &[(u32, u32, u16)],
        extra: &str,
    ) -> usize {
        let pos = self.buf.len();
        self.pending.insert(objid, pos);
        let mut rows = Vec::new();
        for id in 0..size {
            if let Some(&(_, container, index)) = compressed.iter().find(|c| c.0 == id) {
                rows.push(2u8);
                rows.extend_from_slice(&container.to_be_bytes());
                rows.extend_from_slice(&index.to_be_bytes());
            } else if let Some(&offset) = self.pending.get(&id) {
                rows.push(1u8);
                rows.extend_from_slice(&(offset as u32).to_be_bytes());
                rows.extend_from_slice(&0u16.to_be_bytes());
            } else {
                rows.push(0u8);
                rows.extend_from_slice(&0u32.to_be_bytes());
                rows.extend_from_slice(&0xFFFFu16.to_be_bytes());
            }
        }
        let entries = format!("/Type /XRef /Size {size} /W [1 4 2] {extra}");
        self.stream(objid, &entries, &rows);
        pos
    }

    pub fn finish(&self) -> Vec<u8> {
        self.buf.clone()
    }
}

fn runs(ids: &[u32]) -> Vec<&[u32]> {
    let mut out = Vec::new();
    let mut start = 0;
    for i in 1..=ids.len() {
        if i == ids.len() || ids[i] != ids[i - 1] + 1 {
            out.push(&ids[start..i]);
            start = i;
        }
    }
    out
}

/// Object stream payload holding `objects` as `(objid, body)` pairs.
/// Returns the payload and its `/First` value.
pub fn object_stream_payload(objects: &[(u32, &str)]) -> (Vec<u8>, usize) {
    let mut header = String::new();
    let mut body = String::new();
    for (objid, text) in objects {
        header.push_str(&format!("{objid} {} ", body.len()));
        body.push_str(text);
        body.push(' ');
    }
    let first = header.len();
    (format!("{header}{body}").into_bytes(), first)
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder =
        flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Two-object document: catalog at 1, `/Info`-style dictionary at 2.
pub fn minimal_pdf() -> Vec<u8> {
    let mut w = PdfWriter::new();
    w.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    w.object(2, "<< /Type /Pages /Kids [] /Count 0 >>");
    w.xref("<< /Size 3 /Root 1 0 R >>");
    w.finish()
}
