//! Document-side security handler.
//!
//! Pairs the validated `/Encrypt` dictionary with the derived file key and
//! applies per-object decryption to strings and stream payloads.

use crate::api::OpenOptions;
use crate::crypto::{EncryptionInfo, FileKey, StreamDecryptor, derive_file_key};
use crate::error::Result;
use crate::model::objects::{PDFDict, PDFObject};

/// Standard security handler for an unlocked document.
#[derive(Debug, Clone)]
pub struct SecurityHandler {
    info: EncryptionInfo,
    key: FileKey,
    decryptor: StreamDecryptor,
}

impl SecurityHandler {
    pub fn new(info: EncryptionInfo, key: FileKey) -> Self {
        let decryptor = StreamDecryptor::for_algorithm(info.algorithm);
        Self {
            info,
            key,
            decryptor,
        }
    }

    /// Derive the file key from the passwords in `options`.
    pub fn unlock(info: EncryptionInfo, options: &OpenOptions) -> Result<Self> {
        let key = derive_file_key(&info, options.owner_candidate(), options.user_candidate())?;
        tracing::debug!(
            revision = info.revision,
            algorithm = ?info.algorithm,
            key_len = key.len(),
            "derived file key"
        );
        Ok(Self::new(info, key))
    }

    pub const fn info(&self) -> &EncryptionInfo {
        &self.info
    }

    pub const fn key(&self) -> &FileKey {
        &self.key
    }

    pub fn decrypt_string(&self, objid: u32, genno: u16, data: &[u8]) -> Result<Vec<u8>> {
        self.decryptor.decrypt(&self.key, objid, genno, data)
    }

    /// Decrypt a stream payload. Cross-reference streams are stored in the
    /// clear, as are metadata streams when `/EncryptMetadata` is false.
    pub fn decrypt_stream(
        &self,
        objid: u32,
        genno: u16,
        data: &[u8],
        attrs: &PDFDict,
    ) -> Result<Vec<u8>> {
        if !self.stream_is_encrypted(attrs) {
            return Ok(data.to_vec());
        }
        self.decryptor.decrypt(&self.key, objid, genno, data)
    }

    pub fn stream_is_encrypted(&self, attrs: &PDFDict) -> bool {
        let kind = attrs.get("Type").and_then(|t| t.as_name().ok());
        match kind {
            Some("XRef") => false,
            Some("Metadata") => self.info.encrypt_metadata,
            _ => true,
        }
    }

    /// Decrypt every string inside `obj`, including stream attributes.
    /// Stream payloads are left for [`decrypt_stream`](Self::decrypt_stream).
    pub fn decrypt_object(&self, obj: PDFObject, objid: u32, genno: u16) -> Result<PDFObject> {
        Ok(match obj {
            PDFObject::String(data) => PDFObject::String(self.decrypt_string(objid, genno, &data)?),
            PDFObject::HexString(data) => {
                PDFObject::HexString(self.decrypt_string(objid, genno, &data)?)
            }
            PDFObject::Array(items) => PDFObject::Array(
                items
                    .into_iter()
                    .map(|item| self.decrypt_object(item, objid, genno))
                    .collect::<Result<_>>()?,
            ),
            PDFObject::Dict(dict) => PDFObject::Dict(self.decrypt_dict(dict, objid, genno)?),
            PDFObject::Stream(mut stream) => {
                let attrs = std::mem::take(&mut stream.attrs);
                stream.attrs = self.decrypt_dict(attrs, objid, genno)?;
                PDFObject::Stream(stream)
            }
            other => other,
        })
    }

    fn decrypt_dict(&self, dict: PDFDict, objid: u32, genno: u16) -> Result<PDFDict> {
        dict.into_iter()
            .map(|(k, v)| Ok((k, self.decrypt_object(v, objid, genno)?)))
            .collect()
    }
}
