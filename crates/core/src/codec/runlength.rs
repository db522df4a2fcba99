//! RunLength stream decoder.

use crate::error::{PdfError, Result};

/// Decode RunLength-encoded data.
///
/// - Length byte 0-127: copy the next (length + 1) bytes literally
/// - Length byte 128: end of data
/// - Length byte 129-255: repeat the next byte (257 - length) times
///
/// A run cut short by the end of input is an error; a missing
/// end-of-data byte is not.
pub fn rldecode(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let length = data[i];
        i += 1;

        match length {
            128 => break,
            0..=127 => {
                let count = length as usize + 1;
                let run = data.get(i..i + count).ok_or_else(|| {
                    PdfError::codec("RunLengthDecode", "literal run past end of data")
                })?;
                result.extend_from_slice(run);
                i += count;
            }
            129..=255 => {
                let byte = *data.get(i).ok_or_else(|| {
                    PdfError::codec("RunLengthDecode", "repeat run missing its byte")
                })?;
                i += 1;
                result.extend(std::iter::repeat_n(byte, 257 - length as usize));
            }
        }
    }

    Ok(result)
}
