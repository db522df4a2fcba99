//! LZW stream decoder using the weezl crate.

use crate::error::{PdfError, Result};
use weezl::{BitOrder, decode::Decoder};

/// Decode LZW data with the default `/EarlyChange 1`.
pub fn lzwdecode(data: &[u8]) -> Result<Vec<u8>> {
    lzwdecode_with_earlychange(data, 1)
}

/// Decode LZW data (MSB first, 8-bit alphabet).
///
/// `early_change` 1 widens codes one entry early, as PDF writers do by
/// default; 0 widens them when the table is full.
pub fn lzwdecode_with_earlychange(data: &[u8], early_change: i64) -> Result<Vec<u8>> {
    let mut decoder = if early_change == 0 {
        Decoder::new(BitOrder::Msb, 8)
    } else {
        Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
    };
    let mut output = Vec::new();
    let result = decoder.into_vec(&mut output).decode(data);
    result
        .status
        .map_err(|e| PdfError::codec("LZWDecode", e.to_string()))?;
    Ok(output)
}
