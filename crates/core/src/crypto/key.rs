//! File-key derivation for the standard security handler.
//!
//! Revisions 2-4 use the MD5/RC4 scheme, revisions 5 and 6 the SHA-2/AES
//! scheme. Owner candidates are tried before user candidates.

use super::info::EncryptionInfo;
use crate::codec::aes::{aes_cbc_decrypt, aes128_cbc_encrypt};
use crate::codec::arcfour::rc4;
use crate::error::{PdfError, Result};
use sha2::{Digest, Sha256, Sha384, Sha512};

/// Password padding constant.
pub const PASSWORD_PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// Upper bound on revision 6 hash rounds.
pub const R6_MAX_ROUNDS: u32 = 289;

/// Modern passwords are truncated to this many bytes.
const MAX_PASSWORD_LEN: usize = 127;

/// Document-wide decryption key, 5 to 32 bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct FileKey(Vec<u8>);

impl FileKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for FileKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Debug for FileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FileKey({} bytes)", self.0.len())
    }
}

/// Key derivation scheme, chosen by revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDerivation {
    /// Revisions 2-4
    Legacy,
    /// Revisions 5-6
    Modern,
}

impl KeyDerivation {
    pub const fn for_revision(revision: i64) -> Result<Self> {
        match revision {
            2..=4 => Ok(Self::Legacy),
            5 | 6 => Ok(Self::Modern),
            r => Err(PdfError::InvalidRevision(r)),
        }
    }

    /// Derive the file key, trying `owner` first and then `user`
    /// (the empty password when `user` is `None`).
    pub fn derive(
        self,
        info: &EncryptionInfo,
        owner: Option<&[u8]>,
        user: Option<&[u8]>,
    ) -> Result<FileKey> {
        let user = user.unwrap_or(b"");
        let found = match self {
            Self::Legacy => owner
                .and_then(|pw| legacy_owner(info, pw).transpose())
                .or_else(|| legacy_user(info, user).transpose()),
            Self::Modern => owner
                .and_then(|pw| modern_owner(info, pw).transpose())
                .or_else(|| modern_user(info, user).transpose()),
        };
        match found {
            Some(key) => key.map(FileKey),
            None => {
                tracing::debug!(revision = info.revision, "no password candidate matched");
                Err(PdfError::InvalidPassword)
            }
        }
    }
}

/// Derive the key for `info` with the given candidates.
pub fn derive_file_key(
    info: &EncryptionInfo,
    owner: Option<&[u8]>,
    user: Option<&[u8]>,
) -> Result<FileKey> {
    KeyDerivation::for_revision(info.revision)?.derive(info, owner, user)
}

fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = PASSWORD_PADDING;
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    padded[len..].copy_from_slice(&PASSWORD_PADDING[..32 - len]);
    padded
}

const fn legacy_key_len(info: &EncryptionInfo) -> usize {
    if info.revision == 2 { 5 } else { info.key_length }
}

/// Key from a (user) password.
fn legacy_compute_key(info: &EncryptionInfo, password: &[u8]) -> Vec<u8> {
    let mut context = md5::Context::new();
    context.consume(pad_password(password));
    context.consume(&info.owner_key[..32]);
    context.consume(info.permissions.to_le_bytes());
    context.consume(&info.doc_id);
    if info.revision >= 4 && !info.encrypt_metadata {
        context.consume([0xFF; 4]);
    }
    let mut hash = context.finalize().0;

    let n = legacy_key_len(info);
    if info.revision >= 3 {
        for _ in 0..50 {
            hash = md5::compute(&hash[..n]).0;
        }
    }
    hash[..n].to_vec()
}

/// Compare the key's encryption of the padding with `/U`.
fn legacy_check_user_key(info: &EncryptionInfo, key: &[u8]) -> Result<bool> {
    if info.revision == 2 {
        return Ok(rc4(key, &PASSWORD_PADDING)? == info.user_key[..32]);
    }
    let mut context = md5::Context::new();
    context.consume(PASSWORD_PADDING);
    context.consume(&info.doc_id);
    let mut result = context.finalize().0.to_vec();
    for i in 0..20u8 {
        let xor_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
        result = rc4(&xor_key, &result)?;
    }
    Ok(result[..16] == info.user_key[..16])
}

fn legacy_user(info: &EncryptionInfo, password: &[u8]) -> Result<Option<Vec<u8>>> {
    let key = legacy_compute_key(info, password);
    Ok(legacy_check_user_key(info, &key)?.then_some(key))
}

/// Recover the user password from `/O`, then authenticate with it.
fn legacy_owner(info: &EncryptionInfo, password: &[u8]) -> Result<Option<Vec<u8>>> {
    let mut hash = md5::compute(pad_password(password)).0;
    if info.revision >= 3 {
        for _ in 0..50 {
            hash = md5::compute(hash).0;
        }
    }
    let key = &hash[..legacy_key_len(info)];

    let owner_key = &info.owner_key[..32];
    let user_password = if info.revision == 2 {
        rc4(key, owner_key)?
    } else {
        let mut data = owner_key.to_vec();
        for i in (0..20u8).rev() {
            let xor_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
            data = rc4(&xor_key, &data)?;
        }
        data
    };
    legacy_user(info, &user_password)
}

fn truncate_password(password: &[u8]) -> &[u8] {
    &password[..password.len().min(MAX_PASSWORD_LEN)]
}

fn modern_hash(info: &EncryptionInfo, password: &[u8], salt: &[u8], udata: &[u8]) -> Result<[u8; 32]> {
    if info.revision == 5 {
        let mut hasher = Sha256::new();
        hasher.update(password);
        hasher.update(salt);
        hasher.update(udata);
        Ok(hasher.finalize().into())
    } else {
        Ok(hardened_hash(password, salt, udata)?.digest)
    }
}

fn modern_owner(info: &EncryptionInfo, password: &[u8]) -> Result<Option<Vec<u8>>> {
    let password = truncate_password(password);
    let udata = &info.user_key[..48];
    let o = &info.owner_key;
    if modern_hash(info, password, &o[32..40], udata)?[..] != o[..32] {
        return Ok(None);
    }
    let intermediate = modern_hash(info, password, &o[40..48], udata)?;
    aes_cbc_decrypt(&intermediate, &[0; 16], &info.owner_encrypted_key[..32]).map(Some)
}

fn modern_user(info: &EncryptionInfo, password: &[u8]) -> Result<Option<Vec<u8>>> {
    let password = truncate_password(password);
    let u = &info.user_key;
    if modern_hash(info, password, &u[32..40], b"")?[..] != u[..32] {
        return Ok(None);
    }
    let intermediate = modern_hash(info, password, &u[40..48], b"")?;
    aes_cbc_decrypt(&intermediate, &[0; 16], &info.user_encrypted_key[..32]).map(Some)
}

/// Output of the revision 6 iterated hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardenedHash {
    pub digest: [u8; 32],
    pub rounds: u32,
}

/// Revision 6 password hash.
///
/// Each round encrypts 64 copies of `password ‖ K ‖ udata` with AES-128-CBC
/// keyed by K, then hashes the ciphertext with SHA-256, -384 or -512
/// depending on its first 16 bytes mod 3. The loop ends once at least 64
/// rounds ran and the last ciphertext byte is at most `rounds - 32`.
pub fn hardened_hash(password: &[u8], salt: &[u8], udata: &[u8]) -> Result<HardenedHash> {
    let mut hasher = Sha256::new();
    hasher.update(password);
    hasher.update(salt);
    hasher.update(udata);
    let mut k: Vec<u8> = hasher.finalize().to_vec();

    let mut rounds: u32 = 0;
    loop {
        let block: Vec<u8> = [password, &k, udata].concat();
        let repeated = block.repeat(64);
        let e = aes128_cbc_encrypt(&k[..16], &k[16..32], &repeated)?;

        k = match mod3_be128(&e[..16]) {
            0 => Sha256::digest(&e).to_vec(),
            1 => Sha384::digest(&e).to_vec(),
            _ => Sha512::digest(&e).to_vec(),
        };
        rounds += 1;

        let last = u32::from(e[e.len() - 1]);
        if (rounds >= 64 && last + 32 <= rounds) || rounds >= R6_MAX_ROUNDS {
            break;
        }
    }

    let mut digest = [0u8; 32];
    digest.copy_from_slice(&k[..32]);
    Ok(HardenedHash { digest, rounds })
}

/// First 16 bytes as a big-endian integer, mod 3.
fn mod3_be128(bytes: &[u8]) -> u8 {
    let mut hi = [0u8; 8];
    let mut lo = [0u8; 8];
    hi.copy_from_slice(&bytes[..8]);
    lo.copy_from_slice(&bytes[8..16]);
    // 2^64 = 1 (mod 3)
    ((u64::from_be_bytes(hi) % 3 + u64::from_be_bytes(lo) % 3) % 3) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mod3_matches_byte_sum() {
        let bytes: Vec<u8> = (0u8..16).map(|b| b.wrapping_mul(37)).collect();
        let by_sum = bytes.iter().map(|&b| u32::from(b)).sum::<u32>() % 3;
        assert_eq!(u32::from(mod3_be128(&bytes)), by_sum);
    }

    #[test]
    fn hardened_hash_known_answer() {
        let h = hardened_hash(b"user", b"uvsalt01", b"").unwrap();
        assert_eq!(
            h.digest.to_vec(),
            hex::decode("647eea44ca0648aaea2bd4bd30be64c4cfa85b768d03b1522cb09499a54e5b41")
                .unwrap()
        );
        assert_eq!(h.rounds, 76);
    }

    #[test]
    fn hardened_hash_round_count_is_bounded() {
        for (pw, salt) in [
            (&b""[..], &b"uvsalt01"[..]),
            (b"owner", b"ovsalt02"),
            (b"a much longer password than usual", b"12345678"),
        ] {
            let h = hardened_hash(pw, salt, b"").unwrap();
            assert!((64..=R6_MAX_ROUNDS).contains(&h.rounds), "{}", h.rounds);
        }
        assert_eq!(hardened_hash(b"", b"uvsalt01", b"").unwrap().rounds, 70);
    }

    #[test]
    fn padding_truncates_long_passwords() {
        let long = [b'x'; 40];
        assert_eq!(pad_password(&long), [b'x'; 32]);
        assert_eq!(pad_password(b""), PASSWORD_PADDING);
    }
}
