//! Codec modules for PDF stream filters and ciphers.
//!
//! - `filter`: filter registry and chained decoding
//! - `ascii85`: ASCII85 and ASCIIHex decoding
//! - `flate`: zlib inflate
//! - `lzw`: LZW decompression
//! - `runlength`: run-length decoding
//! - `predictor`: PNG and TIFF predictors
//! - `aes`, `arcfour`: ciphers used by the security handler

pub mod aes;
pub mod arcfour;
pub mod ascii85;
pub mod filter;
pub mod flate;
pub mod lzw;
pub mod predictor;
pub mod runlength;

pub use aes::{aes_cbc_decrypt, aes_cbc_decrypt_with_iv, aes128_cbc_encrypt, unpad_pkcs7};
pub use arcfour::{Arcfour, rc4};
pub use ascii85::{ascii85decode, asciihexdecode};
pub use filter::{Filter, decode, decode_chain, decode_stream, stream_filters};
pub use flate::flatedecode;
pub use lzw::{lzwdecode, lzwdecode_with_earlychange};
pub use predictor::{PredictorParams, apply_predictor};
pub use runlength::rldecode;
