//! Per-object decryption of strings and stream bodies.

use super::info::CryptAlgorithm;
use super::key::FileKey;
use crate::codec::aes::aes_cbc_decrypt_with_iv;
use crate::codec::arcfour::rc4;
use crate::error::Result;

/// Decryptor selected once per document from the crypt algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamDecryptor {
    Identity,
    Rc4,
    Aes128,
    Aes256,
}

impl StreamDecryptor {
    pub const fn for_algorithm(algorithm: CryptAlgorithm) -> Self {
        match algorithm {
            CryptAlgorithm::Identity => Self::Identity,
            CryptAlgorithm::Rc4 => Self::Rc4,
            CryptAlgorithm::Aes128 => Self::Aes128,
            CryptAlgorithm::Aes256 => Self::Aes256,
        }
    }

    /// Decrypt the bytes of object `objid genno`.
    pub fn decrypt(&self, key: &FileKey, objid: u32, genno: u16, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Identity => Ok(data.to_vec()),
            Self::Rc4 => rc4(&object_key(key.as_bytes(), objid, genno, false), data),
            Self::Aes128 => {
                aes_cbc_decrypt_with_iv(&object_key(key.as_bytes(), objid, genno, true), data)
            }
            Self::Aes256 => aes_cbc_decrypt_with_iv(key.as_bytes(), data),
        }
    }
}

/// MD5(key ‖ objid[0..3] ‖ genno[0..2] [‖ "sAlT"]), truncated to n + 5.
pub fn object_key(key: &[u8], objid: u32, genno: u16, aes: bool) -> Vec<u8> {
    let mut context = md5::Context::new();
    context.consume(key);
    context.consume(&objid.to_le_bytes()[..3]);
    context.consume(genno.to_le_bytes());
    if aes {
        context.consume(b"sAlT");
    }
    let hash = context.finalize().0;
    hash[..(key.len() + 5).min(16)].to_vec()
}
