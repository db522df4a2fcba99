//! ASCII85 and ASCIIHex stream decoders.

use crate::error::{PdfError, Result};
use crate::parser::lexer::{Lexer, hex_value};

const A85: &str = "ASCII85Decode";
const AHX: &str = "ASCIIHexDecode";

/// Decode ASCII85-encoded data (Adobe variant).
///
/// Whitespace is ignored, a leading `<~` is optional and `~>` ends the
/// data. `z` stands for four zero bytes and is only valid between groups.
pub fn ascii85decode(data: &[u8]) -> Result<Vec<u8>> {
    let start = data
        .iter()
        .position(|&c| !Lexer::is_whitespace(c))
        .unwrap_or(data.len());
    let data = &data[start..];
    let data = data.strip_prefix(b"<~").unwrap_or(data);
    let mut out = Vec::with_capacity(data.len() / 5 * 4);
    let mut group = [0u8; 5];
    let mut filled = 0usize;

    for &c in data {
        match c {
            b'~' => break,
            c if Lexer::is_whitespace(c) => {}
            b'z' if filled == 0 => out.extend_from_slice(&[0; 4]),
            b'z' => {
                return Err(PdfError::codec(A85, "'z' inside a group"));
            }
            b'!'..=b'u' => {
                group[filled] = c - b'!';
                filled += 1;
                if filled == 5 {
                    out.extend_from_slice(&group_value(&group)?.to_be_bytes());
                    filled = 0;
                }
            }
            other => {
                return Err(PdfError::codec(
                    A85,
                    format!("invalid character 0x{other:02x}"),
                ));
            }
        }
    }

    match filled {
        0 => {}
        1 => return Err(PdfError::codec(A85, "final group has a single character")),
        k => {
            group[k..].fill(b'u' - b'!');
            let bytes = group_value(&group)?.to_be_bytes();
            out.extend_from_slice(&bytes[..k - 1]);
        }
    }
    Ok(out)
}

fn group_value(group: &[u8; 5]) -> Result<u32> {
    let value = group
        .iter()
        .fold(0u64, |acc, &digit| acc * 85 + u64::from(digit));
    u32::try_from(value).map_err(|_| PdfError::codec(A85, "group value exceeds 2^32 - 1"))
}

/// Decode ASCIIHex-encoded data.
///
/// Whitespace is ignored and `>` ends the data. An odd number of digits is
/// accepted only when the `>` terminator is present; the final digit is
/// then padded with `0`.
pub fn asciihexdecode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut pending: Option<u8> = None;
    let mut terminated = false;

    for &c in data {
        if c == b'>' {
            terminated = true;
            break;
        }
        if Lexer::is_whitespace(c) {
            continue;
        }
        let nibble =
            hex_value(c).ok_or_else(|| PdfError::codec(AHX, format!("invalid digit 0x{c:02x}")))?;
        match pending.take() {
            Some(high) => out.push((high << 4) | nibble),
            None => pending = Some(nibble),
        }
    }

    if let Some(high) = pending {
        if !terminated {
            return Err(PdfError::codec(
                AHX,
                "odd number of digits without end-of-data marker",
            ));
        }
        out.push(high << 4);
    }
    Ok(out)
}
