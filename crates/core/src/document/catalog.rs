//! PDF Document - main entry point for object access.
//!
//! Handles:
//! - Header and catalog checks
//! - Cross-reference loading and the object cache
//! - Security handler setup and per-object decryption
//! - Stream decoding with a per-document cache

use super::security::SecurityHandler;
use super::xref::{XRefEntry, XRefResolver, XRefTable, scan_object_headers};
use crate::api::OpenOptions;
use crate::codec::filter::decode_stream;
use crate::crypto::EncryptionInfo;
use crate::error::{PdfError, Result};
use crate::model::objects::{PDFDict, PDFObjRef, PDFObject, PDFStream};
use crate::parser::lexer::{Lexer, Token};
use crate::parser::object_parser::{ObjectParser, find_subslice};
use bytes::Bytes;
use indexmap::IndexMap;
use memmap2::Mmap;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

/// `%PDF-` must start within this many leading bytes.
const HEADER_WINDOW: usize = 1024;

/// Longest chain of references followed by [`PDFDocument::resolve`].
const MAX_REF_CHAIN: usize = 32;

/// Work counters, used to observe at-most-once caching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentStats {
    /// Objects parsed from the file or from object streams.
    pub objects_parsed: usize,
    /// Streams run through decryption and the filter chain.
    pub streams_decoded: usize,
}

enum Encryption {
    None,
    Unlocked(SecurityHandler),
    /// No password candidate matched.
    Locked {
        info: EncryptionInfo,
        failure: PdfError,
    },
}

/// PDF Document - provides access to PDF objects and decoded streams.
/// Owns its data via Bytes for thread-safe sharing.
pub struct PDFDocument {
    data: Bytes,
    xref: XRefTable,
    catalog: PDFDict,
    encryption: Encryption,
    encrypt_objid: Option<u32>,
    objects: Mutex<HashMap<(u32, u16), Arc<PDFObject>>>,
    streams: Mutex<HashMap<(u32, u16), Bytes>>,
    scan_index: OnceLock<IndexMap<u32, (usize, u16)>>,
    objects_parsed: AtomicUsize,
    streams_decoded: AtomicUsize,
}

impl PDFDocument {
    fn open(data: Bytes, options: &OpenOptions) -> Result<Self> {
        if find_subslice(&data[..data.len().min(HEADER_WINDOW)], b"%PDF-").is_none() {
            return Err(PdfError::MissingHeader);
        }

        let decode_xref = |stream: &PDFStream| {
            decode_stream(stream, stream.get_rawdata(), &|obj: &PDFObject| Ok(obj.clone()))
        };
        let xref = XRefResolver::new(&data, &decode_xref).resolve()?;

        let mut doc = Self {
            data,
            xref,
            catalog: PDFDict::new(),
            encryption: Encryption::None,
            encrypt_objid: None,
            objects: Mutex::new(HashMap::new()),
            streams: Mutex::new(HashMap::new()),
            scan_index: OnceLock::new(),
            objects_parsed: AtomicUsize::new(0),
            streams_decoded: AtomicUsize::new(0),
        };
        doc.setup_encryption(options)?;
        doc.load_catalog()?;
        Ok(doc)
    }

    /// Create a new PDFDocument from raw PDF data.
    pub fn new<D: AsRef<[u8]>>(data: D, options: &OpenOptions) -> Result<Self> {
        Self::open(Bytes::copy_from_slice(data.as_ref()), options)
    }

    /// Create a new PDFDocument from shared bytes (zero-copy).
    pub fn from_bytes(data: Bytes, options: &OpenOptions) -> Result<Self> {
        Self::open(data, options)
    }

    /// Create a new PDFDocument from a memory-mapped PDF.
    pub fn from_mmap(mmap: Mmap, options: &OpenOptions) -> Result<Self> {
        Self::open(Bytes::from_owner(mmap), options)
    }

    fn setup_encryption(&mut self, options: &OpenOptions) -> Result<()> {
        let Some(encrypt) = self.xref.trailer_value("Encrypt").cloned() else {
            return Ok(());
        };
        if let PDFObject::Ref(r) = &encrypt {
            self.encrypt_objid = Some(r.objid);
        }
        let encrypt = self.resolve(&encrypt)?;
        let id = self
            .xref
            .trailer_value("ID")
            .cloned()
            .map(|id| self.resolve(&id))
            .transpose()?;
        let info = EncryptionInfo::from_dict(encrypt.as_dict()?, id.as_ref())?;

        self.encryption = match SecurityHandler::unlock(info.clone(), options) {
            Ok(handler) => Encryption::Unlocked(handler),
            Err(PdfError::InvalidPassword) if !options.require_password => {
                tracing::warn!(revision = info.revision, "no password matched, document is locked");
                Encryption::Locked {
                    info,
                    failure: PdfError::InvalidPassword,
                }
            }
            Err(e) => return Err(e),
        };
        // objects read so far were not decrypted
        self.objects.get_mut().map_err(poisoned)?.clear();
        Ok(())
    }

    fn load_catalog(&mut self) -> Result<()> {
        if matches!(self.encryption, Encryption::Locked { .. }) {
            return Ok(());
        }
        let root = self
            .xref
            .trailer_value("Root")
            .cloned()
            .ok_or(PdfError::MissingCatalog)?;
        match self.resolve(&root) {
            Ok(PDFObject::Dict(dict)) => {
                self.catalog = dict;
                Ok(())
            }
            Ok(other) => {
                tracing::debug!(got = other.type_name(), "/Root is not a dictionary");
                Err(PdfError::MissingCatalog)
            }
            Err(e) => {
                tracing::debug!(error = %e, "/Root could not be resolved");
                Err(PdfError::MissingCatalog)
            }
        }
    }

    /// Returns the raw PDF bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Fetch object `objid genno`, parsing and decrypting it at most once.
    pub fn fetch(&self, objid: u32, genno: u16) -> Result<Arc<PDFObject>> {
        if objid == 0 {
            return Err(PdfError::ObjectNotFound { objid, genno });
        }

        // Thread-local so concurrent readers of the same object do not
        // see each other as cycles.
        thread_local! {
            static RESOLVING: RefCell<HashSet<u32>> = RefCell::new(HashSet::new());
        }

        struct ResolvingGuard {
            objid: u32,
        }

        impl Drop for ResolvingGuard {
            fn drop(&mut self) {
                RESOLVING.with(|set| {
                    set.borrow_mut().remove(&self.objid);
                });
            }
        }

        if let Some(hit) = self.objects.lock().map_err(poisoned)?.get(&(objid, genno)) {
            return Ok(Arc::clone(hit));
        }

        let entered = RESOLVING.with(|set| set.borrow_mut().insert(objid));
        if !entered {
            return Err(PdfError::CircularReference(objid));
        }
        let _guard = ResolvingGuard { objid };

        let object = Arc::new(self.load_object(objid, genno)?);
        self.objects_parsed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(objid, genno, "parsed object");

        let mut objects = self.objects.lock().map_err(poisoned)?;
        Ok(Arc::clone(objects.entry((objid, genno)).or_insert(object)))
    }

    /// A generation other than the indexed one is a dangling reference.
    fn load_object(&self, objid: u32, genno: u16) -> Result<PDFObject> {
        let not_found = PdfError::ObjectNotFound { objid, genno };
        let object = match self.xref.get(objid) {
            Some(XRefEntry::InObjectStream { container, index }) if genno == 0 => {
                return self.load_from_object_stream(objid, *container, *index);
            }
            Some(XRefEntry::Offset { offset, genno: indexed }) if *indexed == genno => {
                self.load_at(objid, genno, *offset)?
            }
            Some(_) => return Err(not_found),
            None => self.load_scanned(objid, genno).ok_or(not_found)?,
        };
        self.decrypt_loaded(object, objid, genno)
    }

    /// Parse the indirect object at `offset`, falling back to the scan
    /// index when the header there names another object.
    fn load_at(&self, objid: u32, genno: u16, offset: usize) -> Result<PDFObject> {
        if let Some(found) = self.parse_indirect_at(objid, genno, offset) {
            return Ok(found);
        }
        tracing::warn!(objid, genno, offset, "object not at its xref offset, using scan index");
        self.load_scanned(objid, genno)
            .ok_or(PdfError::ObjectNotFound { objid, genno })
    }

    fn load_scanned(&self, objid: u32, genno: u16) -> Option<PDFObject> {
        let (offset, _) = *self.scan_index().get(&objid)?;
        self.parse_indirect_at(objid, genno, offset)
    }

    fn parse_indirect_at(&self, objid: u32, genno: u16, offset: usize) -> Option<PDFObject> {
        let length = |r: PDFObjRef| {
            self.fetch(r.objid, r.genno)
                .ok()
                .and_then(|obj| obj.as_int().ok())
        };
        let indirect = ObjectParser::from_bytes(&self.data)
            .with_length_resolver(&length)
            .parse_indirect(offset)
            .value()?;
        (indirect.objid == objid && indirect.genno == genno).then_some(indirect.object)
    }

    fn scan_index(&self) -> &IndexMap<u32, (usize, u16)> {
        self.scan_index.get_or_init(|| {
            let index = scan_object_headers(&self.data).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "object header scan failed");
                IndexMap::new()
            });
            tracing::debug!(objects = index.len(), "built object scan index");
            index
        })
    }

    /// Objects inside object streams were decrypted with their container.
    fn load_from_object_stream(
        &self,
        objid: u32,
        container: u32,
        index: usize,
    ) -> Result<PDFObject> {
        let holder = self.fetch(container, 0)?;
        let stream = holder.as_stream()?;
        if !holder.has_type("ObjStm") {
            tracing::warn!(container, "object stream container lacks /Type /ObjStm");
        }
        let count = required_usize(stream, "N")?;
        let first = required_usize(stream, "First")?;
        let data = self.stream_bytes(&holder)?;
        if first > data.len() {
            tracing::debug!(container, first, len = data.len(), "object stream ends before /First");
            return Err(PdfError::UnexpectedEof);
        }

        let mut header = Lexer::new(&data[..first]);
        let mut pairs = Vec::with_capacity(count);
        while pairs.len() < count {
            match (header.next_token(), header.next_token()) {
                (Some((_, Token::Int(id))), Some((_, Token::Int(off)))) => pairs.push((id, off)),
                _ => break,
            }
        }

        let wanted = i64::from(objid);
        let relative = match pairs.get(index) {
            Some(&(id, off)) if id == wanted => off,
            _ => pairs
                .iter()
                .find(|(id, _)| *id == wanted)
                .map(|&(_, off)| off)
                .ok_or_else(|| {
                    PdfError::SyntaxError(format!(
                        "object {objid} not listed in object stream {container}"
                    ))
                })?,
        };
        let offset = usize::try_from(relative).map_err(|_| {
            PdfError::SyntaxError(format!("negative offset in object stream {container}"))
        })?;

        ObjectParser::new(&data)
            .parse_object(first + offset)
            .value()
            .ok_or_else(|| {
                PdfError::SyntaxError(format!(
                    "object {objid} unreadable in object stream {container}"
                ))
            })
    }

    fn decrypt_loaded(&self, object: PDFObject, objid: u32, genno: u16) -> Result<PDFObject> {
        if self.encrypt_objid == Some(objid) || object.has_type("XRef") {
            return Ok(object);
        }
        match &self.encryption {
            Encryption::None => Ok(object),
            Encryption::Unlocked(handler) => handler.decrypt_object(object, objid, genno),
            Encryption::Locked { .. } => Err(PdfError::InvalidPassword),
        }
    }

    /// Follow references until a direct object is reached.
    pub fn resolve(&self, obj: &PDFObject) -> Result<PDFObject> {
        let mut current = obj.clone();
        let mut last = 0;
        for _ in 0..MAX_REF_CHAIN {
            match current {
                PDFObject::Ref(r) => {
                    last = r.objid;
                    current = (*self.fetch(r.objid, r.genno)?).clone();
                }
                direct => return Ok(direct),
            }
        }
        Err(PdfError::CircularReference(last))
    }

    /// Decoded bytes of a stream, or of the stream a reference points to.
    ///
    /// The payload is decrypted, run through its filter chain and cached per
    /// (objid, genno).
    pub fn stream_bytes(&self, obj: &PDFObject) -> Result<Bytes> {
        let holder;
        let stream = match obj {
            PDFObject::Ref(r) => {
                holder = self.fetch(r.objid, r.genno)?;
                holder.as_stream()?
            }
            other => other.as_stream()?,
        };

        let key = stream.objid.zip(stream.genno);
        if let Some(key) = key
            && let Some(hit) = self.streams.lock().map_err(poisoned)?.get(&key)
        {
            return Ok(hit.clone());
        }

        let decoded = self.decode_payload(stream, key)?;
        self.streams_decoded.fetch_add(1, Ordering::Relaxed);

        match key {
            Some(key) => {
                let mut streams = self.streams.lock().map_err(poisoned)?;
                Ok(streams.entry(key).or_insert(decoded).clone())
            }
            None => Ok(decoded),
        }
    }

    fn decode_payload(&self, stream: &PDFStream, key: Option<(u32, u16)>) -> Result<Bytes> {
        let decrypted = match (&self.encryption, key) {
            (Encryption::Unlocked(handler), Some((objid, genno)))
                if self.encrypt_objid != Some(objid) =>
            {
                Some(handler.decrypt_stream(objid, genno, stream.get_rawdata(), &stream.attrs)?)
            }
            (Encryption::Locked { .. }, Some(_)) if !is_xref_stream(stream) => {
                return Err(PdfError::InvalidPassword);
            }
            _ => None,
        };

        if stream.filters().is_empty() {
            return Ok(match decrypted {
                Some(plain) => Bytes::from(plain),
                None => stream.rawdata_bytes(),
            });
        }
        let data = decrypted.as_deref().unwrap_or(stream.get_rawdata());
        let decoded = decode_stream(stream, data, &|obj: &PDFObject| self.resolve(obj))?;
        Ok(Bytes::from(decoded))
    }

    pub const fn is_encrypted(&self) -> bool {
        !matches!(self.encryption, Encryption::None)
    }

    /// Why the document is locked, when no password matched.
    pub const fn encryption_failure(&self) -> Option<&PdfError> {
        match &self.encryption {
            Encryption::Locked { failure, .. } => Some(failure),
            _ => None,
        }
    }

    pub const fn encryption_info(&self) -> Option<&EncryptionInfo> {
        match &self.encryption {
            Encryption::None => None,
            Encryption::Unlocked(handler) => Some(handler.info()),
            Encryption::Locked { info, .. } => Some(info),
        }
    }

    pub const fn security_handler(&self) -> Option<&SecurityHandler> {
        match &self.encryption {
            Encryption::Unlocked(handler) => Some(handler),
            _ => None,
        }
    }

    /// Trailer dictionaries, newest first.
    pub fn trailers(&self) -> &[PDFDict] {
        self.xref.trailers()
    }

    /// The `/Root` dictionary; empty while the document is locked.
    pub const fn catalog(&self) -> &PDFDict {
        &self.catalog
    }

    pub const fn xref(&self) -> &XRefTable {
        &self.xref
    }

    /// All object numbers in use, in cross-reference order.
    pub fn objids(&self) -> Vec<u32> {
        self.xref.objids().collect()
    }

    pub fn stats(&self) -> DocumentStats {
        DocumentStats {
            objects_parsed: self.objects_parsed.load(Ordering::Relaxed),
            streams_decoded: self.streams_decoded.load(Ordering::Relaxed),
        }
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> PdfError {
    PdfError::SyntaxError("document cache lock poisoned".into())
}

fn is_xref_stream(stream: &PDFStream) -> bool {
    stream.get("Type").and_then(|t| t.as_name().ok()) == Some("XRef")
}

fn required_usize(stream: &PDFStream, key: &str) -> Result<usize> {
    let value = stream
        .get(key)
        .ok_or_else(|| PdfError::SyntaxError(format!("missing /{key} in object stream")))?
        .as_int()?;
    usize::try_from(value)
        .map_err(|_| PdfError::SyntaxError(format!("negative /{key} in object stream")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &[u8] = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n2 0 obj\n<< /Length 11 >>\nstream\nhello world\nendstream\nendobj\n";

    #[test]
    fn test_pdfdocument_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PDFDocument>();
    }

    #[test]
    fn test_stream_without_filters_is_zero_copy() {
        let bytes = Bytes::from_static(SIMPLE);
        let doc = PDFDocument::from_bytes(bytes.clone(), &OpenOptions::default()).unwrap();
        assert!(doc.xref().is_fallback());

        let decoded = doc
            .stream_bytes(&PDFObject::Ref(PDFObjRef::new(2, 0)))
            .unwrap();
        assert_eq!(&decoded[..], b"hello world");

        let start = find_subslice(SIMPLE, b"stream\n").unwrap() + 7;
        assert_eq!(decoded.as_ptr(), bytes[start..].as_ptr());
    }

    #[test]
    fn test_fetch_cache_returns_same_arc() {
        let doc = PDFDocument::new(SIMPLE, &OpenOptions::default()).unwrap();
        let a = doc.fetch(2, 0).unwrap();
        let b = doc.fetch(2, 0).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_other_generation_is_not_found() {
        let doc = PDFDocument::new(SIMPLE, &OpenOptions::default()).unwrap();
        assert!(doc.fetch(2, 0).is_ok());
        assert!(matches!(
            doc.fetch(2, 7),
            Err(PdfError::ObjectNotFound { objid: 2, genno: 7 })
        ));
    }

    #[test]
    fn test_object_zero_is_never_found() {
        let doc = PDFDocument::new(SIMPLE, &OpenOptions::default()).unwrap();
        assert!(matches!(
            doc.fetch(0, 0),
            Err(PdfError::ObjectNotFound { objid: 0, .. })
        ));
    }
}
