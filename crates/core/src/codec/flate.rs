//! FlateDecode (zlib) stream decoder.

use crate::error::{PdfError, Result};
use flate2::read::ZlibDecoder;
use std::io::Read;

/// Inflate a zlib stream. Corrupt or truncated input is an error.
pub fn flatedecode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len().saturating_mul(3));
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| PdfError::codec("FlateDecode", e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    #[test]
    fn inflates_zlib_and_rejects_garbage() {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"hello hello hello").unwrap();
        let compressed = enc.finish().unwrap();
        assert_eq!(flatedecode(&compressed).unwrap(), b"hello hello hello");
        assert!(flatedecode(b"not zlib at all").is_err());
    }
}
