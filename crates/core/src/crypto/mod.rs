//! Standard security handler: `/Encrypt` validation, file-key derivation
//! and per-object decryption.

pub mod decrypt;
pub mod info;
pub mod key;

pub use decrypt::{StreamDecryptor, object_key};
pub use info::{CryptAlgorithm, EncryptionInfo};
pub use key::{FileKey, HardenedHash, KeyDerivation, PASSWORD_PADDING, derive_file_key, hardened_hash};
