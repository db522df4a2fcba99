//! PNG and TIFF predictors applied after Flate and LZW decoding.

use crate::error::{PdfError, Result};
use crate::model::objects::PDFDict;

const NAME: &str = "Predictor";

/// `/DecodeParms` entries that drive prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictorParams {
    pub predictor: i64,
    pub colors: usize,
    pub bits_per_component: usize,
    pub columns: usize,
}

impl Default for PredictorParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            colors: 1,
            bits_per_component: 8,
            columns: 1,
        }
    }
}

impl PredictorParams {
    pub fn from_dict(params: Option<&PDFDict>) -> Self {
        let mut out = Self::default();
        let Some(params) = params else {
            return out;
        };
        let int = |key: &str| params.get(key).and_then(|v| v.as_int().ok());
        if let Some(p) = int("Predictor") {
            out.predictor = p;
        }
        let count = |v: i64| usize::try_from(v.max(1)).unwrap_or(usize::MAX);
        if let Some(c) = int("Colors") {
            out.colors = count(c);
        }
        if let Some(b) = int("BitsPerComponent") {
            out.bits_per_component = count(b);
        }
        if let Some(c) = int("Columns") {
            out.columns = count(c);
        }
        out
    }

    fn bits_per_pixel(&self) -> Result<usize> {
        self.colors
            .checked_mul(self.bits_per_component)
            .ok_or_else(|| PdfError::codec(NAME, "Colors * BitsPerComponent overflows"))
    }

    fn row_bytes(&self) -> Result<usize> {
        let bits = self
            .bits_per_pixel()?
            .checked_mul(self.columns)
            .ok_or_else(|| {
                PdfError::codec(NAME, format!("row of {} columns overflows", self.columns))
            })?;
        Ok(bits.div_ceil(8))
    }

    fn bytes_per_pixel(&self) -> Result<usize> {
        Ok(self.bits_per_pixel()?.div_ceil(8).max(1))
    }
}

/// Undo the predictor described by `params`. Predictor 1 (or none) is a no-op.
pub fn apply_predictor(data: Vec<u8>, params: &PredictorParams) -> Result<Vec<u8>> {
    match params.predictor {
        ..=1 => Ok(data),
        2 => tiff_predictor(&data, params),
        10..=15 => png_predictor(&data, params),
        other => Err(PdfError::codec(NAME, format!("unsupported predictor {other}"))),
    }
}

fn check_bpc(params: &PredictorParams) -> Result<()> {
    match params.bits_per_component {
        1 | 2 | 4 | 8 | 16 => Ok(()),
        other => Err(PdfError::codec(
            NAME,
            format!("unsupported BitsPerComponent {other}"),
        )),
    }
}

fn png_predictor(data: &[u8], params: &PredictorParams) -> Result<Vec<u8>> {
    check_bpc(params)?;
    let row_bytes = params.row_bytes()?;
    let bpp = params.bytes_per_pixel()?;
    let stride = row_bytes
        .checked_add(1)
        .ok_or_else(|| PdfError::codec(NAME, "row length overflows"))?;
    // rows never hold more than the input
    let buffer_len = row_bytes.min(data.len());

    let mut result = Vec::with_capacity(data.len());
    let mut prev_row = vec![0u8; buffer_len];
    let mut current_row = vec![0u8; buffer_len];

    for chunk in data.chunks(stride) {
        let filter_type = chunk[0];
        let row_data = &chunk[1..];
        let n = row_data.len();

        match filter_type {
            0 => current_row[..n].copy_from_slice(row_data),
            1 => {
                for i in 0..n {
                    let left = if i >= bpp { current_row[i - bpp] } else { 0 };
                    current_row[i] = row_data[i].wrapping_add(left);
                }
            }
            2 => {
                for i in 0..n {
                    current_row[i] = row_data[i].wrapping_add(prev_row[i]);
                }
            }
            3 => {
                for i in 0..n {
                    let left = if i >= bpp { u16::from(current_row[i - bpp]) } else { 0 };
                    let above = u16::from(prev_row[i]);
                    current_row[i] = row_data[i].wrapping_add(((left + above) / 2) as u8);
                }
            }
            4 => {
                for i in 0..n {
                    let left = if i >= bpp { current_row[i - bpp] } else { 0 };
                    let upper_left = if i >= bpp { prev_row[i - bpp] } else { 0 };
                    current_row[i] =
                        row_data[i].wrapping_add(paeth_predictor(left, prev_row[i], upper_left));
                }
            }
            other => {
                return Err(PdfError::codec(NAME, format!("invalid PNG row filter {other}")));
            }
        }

        result.extend_from_slice(&current_row[..n]);
        std::mem::swap(&mut prev_row, &mut current_row);
    }

    Ok(result)
}

const fn paeth_predictor(left: u8, above: u8, upper_left: u8) -> u8 {
    let a = left as i32;
    let b = above as i32;
    let c = upper_left as i32;
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();

    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        above
    } else {
        upper_left
    }
}

/// TIFF predictor 2: horizontal differencing per component.
fn tiff_predictor(data: &[u8], params: &PredictorParams) -> Result<Vec<u8>> {
    check_bpc(params)?;
    let row_bytes = params.row_bytes()?.max(1);
    let colors = params.colors;
    let mut out = data.to_vec();

    for row in out.chunks_mut(row_bytes) {
        match params.bits_per_component {
            8 => {
                for i in colors..row.len() {
                    row[i] = row[i].wrapping_add(row[i - colors]);
                }
            }
            16 => {
                let Some(stride) = colors.checked_mul(2) else {
                    continue;
                };
                let mut i = stride;
                while i + 1 < row.len() {
                    let prev = u16::from_be_bytes([row[i - stride], row[i - stride + 1]]);
                    let cur = u16::from_be_bytes([row[i], row[i + 1]]);
                    row[i..i + 2].copy_from_slice(&cur.wrapping_add(prev).to_be_bytes());
                    i += 2;
                }
            }
            bpc => undo_sub_byte_differencing(row, bpc, colors, params.columns),
        }
    }

    Ok(out)
}

fn undo_sub_byte_differencing(row: &mut [u8], bpc: usize, colors: usize, columns: usize) {
    let mask = (1u16 << bpc) - 1;
    let total = colors.saturating_mul(columns).min(row.len() * 8 / bpc);
    let get = |row: &[u8], idx: usize| -> u16 {
        let bit = idx * bpc;
        let shift = 8 - bpc - (bit % 8);
        (u16::from(row[bit / 8]) >> shift) & mask
    };
    for idx in colors..total {
        let value = (get(row, idx) + get(row, idx - colors)) & mask;
        let bit = idx * bpc;
        let shift = 8 - bpc - (bit % 8);
        let byte = &mut row[bit / 8];
        *byte = (*byte & !((mask as u8) << shift)) | ((value as u8) << shift);
    }
}
