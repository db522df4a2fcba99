//! AES-CBC helpers for PDF decryption.

use crate::error::{PdfError, Result};
use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use cbc::{Decryptor, Encryptor};

type Aes128CbcDec = Decryptor<aes::Aes128>;
type Aes256CbcDec = Decryptor<aes::Aes256>;
type Aes128CbcEnc = Encryptor<aes::Aes128>;

pub const AES_BLOCK: usize = 16;

fn bad(msg: impl Into<String>) -> PdfError {
    PdfError::DecryptionError(msg.into())
}

/// Decrypt whole blocks with AES-CBC. The key selects AES-128 (16 bytes)
/// or AES-256 (32 bytes); no padding is removed.
pub fn aes_cbc_decrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    if data.len() % AES_BLOCK != 0 {
        return Err(bad(format!(
            "ciphertext length {} is not a multiple of 16",
            data.len()
        )));
    }
    let mut buf = data.to_vec();
    match key.len() {
        16 => {
            Aes128CbcDec::new_from_slices(key, iv)
                .map_err(|_| bad("AES IV must be 16 bytes"))?
                .decrypt_padded_mut::<NoPadding>(&mut buf)
                .map_err(|_| bad("AES-128 block decryption failed"))?;
        }
        32 => {
            Aes256CbcDec::new_from_slices(key, iv)
                .map_err(|_| bad("AES IV must be 16 bytes"))?
                .decrypt_padded_mut::<NoPadding>(&mut buf)
                .map_err(|_| bad("AES-256 block decryption failed"))?;
        }
        n => return Err(bad(format!("AES key must be 16 or 32 bytes, got {n}"))),
    }
    Ok(buf)
}

/// Encrypt whole blocks with AES-128-CBC, no padding.
pub fn aes128_cbc_encrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    if data.len() % AES_BLOCK != 0 {
        return Err(bad("plaintext length is not a multiple of 16"));
    }
    let mut buf = data.to_vec();
    Aes128CbcEnc::new_from_slices(key, iv)
        .map_err(|_| bad("AES-128 key and IV must be 16 bytes"))?
        .encrypt_padded_mut::<NoPadding>(&mut buf, data.len())
        .map_err(|_| bad("AES-128 block encryption failed"))?;
    Ok(buf)
}

/// Strip PKCS#7 padding. Any malformed padding is an error.
pub fn unpad_pkcs7(data: &[u8]) -> Result<&[u8]> {
    let Some(&last) = data.last() else {
        return Err(bad("empty plaintext has no padding"));
    };
    let pad = last as usize;
    if pad == 0 || pad > AES_BLOCK || pad > data.len() {
        return Err(bad(format!("invalid padding length {pad}")));
    }
    let start = data.len() - pad;
    if data[start..].iter().any(|&b| b != last) {
        return Err(bad("inconsistent padding bytes"));
    }
    Ok(&data[..start])
}

/// Decrypt `iv ‖ ciphertext` and strip PKCS#7 padding.
pub fn aes_cbc_decrypt_with_iv(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    if data.len() < AES_BLOCK * 2 {
        return Err(bad(format!(
            "AES payload of {} bytes is shorter than IV plus one block",
            data.len()
        )));
    }
    let (iv, ciphertext) = data.split_at(AES_BLOCK);
    let plain = aes_cbc_decrypt(key, iv, ciphertext)?;
    Ok(unpad_pkcs7(&plain)?.to_vec())
}
