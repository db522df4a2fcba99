//! Filter registry: maps `/Filter` names to decoders.

use super::ascii85::{ascii85decode, asciihexdecode};
use super::flate::flatedecode;
use super::lzw::lzwdecode_with_earlychange;
use super::predictor::{PredictorParams, apply_predictor};
use super::runlength::rldecode;
use crate::error::{PdfError, Result};
use crate::model::objects::{PDFDict, PDFObject, PDFStream};

/// Stream filters known to the decode pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    AsciiHex,
    Ascii85,
    Flate,
    Lzw,
    RunLength,
    CcittFax,
    Dct,
    Jpx,
    Jbig2,
    Crypt,
    Unknown(String),
}

impl Filter {
    /// Look up a filter by its full or abbreviated name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "ASCIIHexDecode" | "AHx" => Self::AsciiHex,
            "ASCII85Decode" | "A85" => Self::Ascii85,
            "FlateDecode" | "Fl" => Self::Flate,
            "LZWDecode" | "LZW" => Self::Lzw,
            "RunLengthDecode" | "RL" => Self::RunLength,
            "CCITTFaxDecode" | "CCF" => Self::CcittFax,
            "DCTDecode" | "DCT" => Self::Dct,
            "JPXDecode" => Self::Jpx,
            "JBIG2Decode" => Self::Jbig2,
            "Crypt" => Self::Crypt,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::AsciiHex => "ASCIIHexDecode",
            Self::Ascii85 => "ASCII85Decode",
            Self::Flate => "FlateDecode",
            Self::Lzw => "LZWDecode",
            Self::RunLength => "RunLengthDecode",
            Self::CcittFax => "CCITTFaxDecode",
            Self::Dct => "DCTDecode",
            Self::Jpx => "JPXDecode",
            Self::Jbig2 => "JBIG2Decode",
            Self::Crypt => "Crypt",
            Self::Unknown(name) => name,
        }
    }

    /// Image codecs and crypt filters are recognised but not decoded.
    pub const fn is_implemented(&self) -> bool {
        matches!(
            self,
            Self::AsciiHex
                | Self::Ascii85
                | Self::Flate
                | Self::Lzw
                | Self::RunLength
                | Self::Unknown(_)
        )
    }

    pub fn decode(&self, data: &[u8], params: Option<&PDFDict>) -> Result<Vec<u8>> {
        match self {
            Self::AsciiHex => asciihexdecode(data),
            Self::Ascii85 => ascii85decode(data),
            Self::Flate => {
                let predictor = PredictorParams::from_dict(params);
                apply_predictor(flatedecode(data)?, &predictor)
            }
            Self::Lzw => {
                let early_change = params
                    .and_then(|p| p.get("EarlyChange"))
                    .and_then(|v| v.as_int().ok())
                    .unwrap_or(1);
                let predictor = PredictorParams::from_dict(params);
                apply_predictor(lzwdecode_with_earlychange(data, early_change)?, &predictor)
            }
            Self::RunLength => rldecode(data),
            Self::Unknown(name) => {
                tracing::warn!(filter = %name, "unknown filter, passing data through");
                Ok(data.to_vec())
            }
            other => Err(PdfError::NotImplemented {
                filter: other.name().to_string(),
            }),
        }
    }
}

/// Decode `data` with the filter called `name`.
pub fn decode(name: &str, data: &[u8], params: Option<&PDFDict>) -> Result<Vec<u8>> {
    Filter::from_name(name).decode(data, params)
}

/// Apply filters left to right, each with its own parameters.
pub fn decode_chain(data: &[u8], filters: &[(Filter, Option<&PDFDict>)]) -> Result<Vec<u8>> {
    let Some(((first, first_params), rest)) = filters.split_first() else {
        return Ok(data.to_vec());
    };
    let mut current = first.decode(data, *first_params)?;
    for (filter, params) in rest {
        current = filter.decode(&current, *params)?;
    }
    Ok(current)
}

/// Filters of `stream` paired with their parameters.
///
/// `resolve` is applied to every filter name and parameter entry so callers
/// can follow indirect references. A `null` parameter slot means none.
pub fn stream_filters(
    stream: &PDFStream,
    resolve: &dyn Fn(&PDFObject) -> Result<PDFObject>,
) -> Result<Vec<(Filter, Option<PDFDict>)>> {
    let params = stream.decode_parms();
    stream
        .filters()
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let filter = Filter::from_name(resolve(entry)?.as_name()?);
            let params = match params.get(i).map(|p| resolve(p)).transpose()? {
                Some(PDFObject::Dict(dict)) => Some(dict),
                _ => None,
            };
            Ok((filter, params))
        })
        .collect()
}

/// Decode `data` through every filter of `stream`.
pub fn decode_stream(
    stream: &PDFStream,
    data: &[u8],
    resolve: &dyn Fn(&PDFObject) -> Result<PDFObject>,
) -> Result<Vec<u8>> {
    let filters = stream_filters(stream, resolve)?;
    let chain: Vec<(Filter, Option<&PDFDict>)> = filters
        .iter()
        .map(|(filter, params)| (filter.clone(), params.as_ref()))
        .collect();
    decode_chain(data, &chain)
}
