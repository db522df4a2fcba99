//! Validated view of an `/Encrypt` dictionary.

use crate::error::{PdfError, Result};
use crate::model::objects::{PDFDict, PDFObject};

/// Cipher used for strings and streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptAlgorithm {
    Identity,
    Rc4,
    Aes128,
    Aes256,
}

/// Everything the key derivation and decryptors need, checked once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionInfo {
    pub algorithm: CryptAlgorithm,
    pub version: i64,
    pub revision: i64,
    /// File key length in bytes.
    pub key_length: usize,
    /// `/O`
    pub owner_key: Vec<u8>,
    /// `/U`
    pub user_key: Vec<u8>,
    /// `/OE` (revisions 5 and 6)
    pub owner_encrypted_key: Vec<u8>,
    /// `/UE` (revisions 5 and 6)
    pub user_encrypted_key: Vec<u8>,
    pub permissions: u32,
    /// First element of the trailer `/ID`, empty when absent.
    pub doc_id: Vec<u8>,
    pub encrypt_metadata: bool,
}

fn syntax(msg: impl Into<String>) -> PdfError {
    PdfError::SyntaxError(msg.into())
}

fn required_int(dict: &PDFDict, key: &str) -> Result<i64> {
    dict.get(key)
        .ok_or_else(|| syntax(format!("missing /{key} in /Encrypt")))?
        .as_int()
        .map_err(|_| syntax(format!("/{key} in /Encrypt is not an integer")))
}

fn required_bytes(dict: &PDFDict, key: &str) -> Result<Vec<u8>> {
    dict.get(key)
        .ok_or_else(|| syntax(format!("missing /{key} in /Encrypt")))?
        .as_string()
        .map(<[u8]>::to_vec)
        .map_err(|_| syntax(format!("/{key} in /Encrypt is not a string")))
}

impl EncryptionInfo {
    /// Build from the `/Encrypt` dictionary and the trailer's `/ID` entry.
    pub fn from_dict(dict: &PDFDict, id: Option<&PDFObject>) -> Result<Self> {
        match dict.get("Filter") {
            Some(PDFObject::Name(name)) if name == "Standard" => {}
            Some(PDFObject::Name(name)) => {
                return Err(PdfError::Unimplemented(format!(
                    "security handler /{name}"
                )));
            }
            Some(_) => return Err(syntax("/Filter in /Encrypt is not a name")),
            None => return Err(syntax("missing /Filter in /Encrypt")),
        }

        let revision = required_int(dict, "R")?;
        if !(2..=6).contains(&revision) {
            return Err(PdfError::InvalidRevision(revision));
        }
        let version = match dict.get("V") {
            None => 0,
            Some(v) => v
                .as_int()
                .map_err(|_| syntax("/V in /Encrypt is not an integer"))?,
        };

        let owner_key = required_bytes(dict, "O")?;
        let user_key = required_bytes(dict, "U")?;
        let permissions = required_int(dict, "P")? as u32;
        let doc_id = first_doc_id(id)?;
        let encrypt_metadata = dict
            .get("EncryptMetadata")
            .and_then(|v| v.as_bool().ok())
            .unwrap_or(true);

        let (algorithm, key_length) = match (version, revision) {
            (1, 2 | 3) => (CryptAlgorithm::Rc4, 5),
            (2, 2 | 3) => (CryptAlgorithm::Rc4, rc4_key_length(dict)?),
            (4, 4) => {
                let algorithm = crypt_filter_algorithm(dict)?;
                let key_length = match algorithm {
                    CryptAlgorithm::Rc4 => rc4_key_length(dict)?,
                    _ => 16,
                };
                (algorithm, key_length)
            }
            (5, 5 | 6) => (crypt_filter_algorithm(dict)?, 32),
            (v, r) => {
                return Err(PdfError::Unimplemented(format!(
                    "encryption V={v} R={r}"
                )));
            }
        };

        let info = Self {
            algorithm,
            version,
            revision,
            key_length,
            owner_key,
            user_key,
            owner_encrypted_key: Vec::new(),
            user_encrypted_key: Vec::new(),
            permissions,
            doc_id,
            encrypt_metadata,
        };

        if revision >= 5 {
            let owner_encrypted_key = required_bytes(dict, "OE")?;
            let user_encrypted_key = required_bytes(dict, "UE")?;
            if info.owner_key.len() < 48 || info.user_key.len() < 48 {
                return Err(syntax("/O and /U must be at least 48 bytes for R5/R6"));
            }
            if owner_encrypted_key.len() < 32 || user_encrypted_key.len() < 32 {
                return Err(syntax("/OE and /UE must be at least 32 bytes"));
            }
            Ok(Self {
                owner_encrypted_key,
                user_encrypted_key,
                ..info
            })
        } else {
            if info.owner_key.len() < 32 || info.user_key.len() < 32 {
                return Err(syntax("/O and /U must be at least 32 bytes"));
            }
            Ok(info)
        }
    }
}

fn first_doc_id(id: Option<&PDFObject>) -> Result<Vec<u8>> {
    let Some(id) = id else {
        return Ok(Vec::new());
    };
    let items = id
        .as_array()
        .map_err(|_| syntax("bad DocID: /ID is not an array"))?;
    let mut strings = items.iter().map(|item| {
        item.as_string()
            .map(<[u8]>::to_vec)
            .map_err(|_| syntax("bad DocID: /ID entries must be strings"))
    });
    match strings.next() {
        None => Ok(Vec::new()),
        Some(first) => {
            let first = first?;
            strings.try_for_each(|s| s.map(drop))?;
            Ok(first)
        }
    }
}

/// `/Length` in bits for RC4: a multiple of 8 in 40..=128, default 40.
fn rc4_key_length(dict: &PDFDict) -> Result<usize> {
    let bits = match dict.get("Length") {
        None => 40,
        Some(v) => v
            .as_int()
            .map_err(|_| syntax("/Length in /Encrypt is not an integer"))?,
    };
    if bits % 8 != 0 || !(40..=128).contains(&bits) {
        return Err(syntax(format!("invalid RC4 key length {bits}")));
    }
    Ok(bits as usize / 8)
}

/// Resolve `/StmF` and `/StrF` through `/CF` to a single algorithm.
fn crypt_filter_algorithm(dict: &PDFDict) -> Result<CryptAlgorithm> {
    let cf = dict.get("CF").and_then(|v| v.as_dict().ok());
    let method = |key: &str| -> Result<CryptAlgorithm> {
        let name = match dict.get(key) {
            None => "Identity",
            Some(v) => v
                .as_name()
                .map_err(|_| syntax(format!("/{key} in /Encrypt is not a name")))?,
        };
        if name == "Identity" {
            return Ok(CryptAlgorithm::Identity);
        }
        let filter = cf
            .and_then(|cf| cf.get(name))
            .and_then(|f| f.as_dict().ok())
            .ok_or_else(|| syntax(format!("crypt filter /{name} not found in /CF")))?;
        match filter.get("CFM").and_then(|v| v.as_name().ok()).unwrap_or("None") {
            "V2" => Ok(CryptAlgorithm::Rc4),
            "AESV2" => Ok(CryptAlgorithm::Aes128),
            "AESV3" => Ok(CryptAlgorithm::Aes256),
            "None" | "Identity" => Ok(CryptAlgorithm::Identity),
            other => Err(PdfError::Unimplemented(format!("crypt filter method /{other}"))),
        }
    };

    let streams = method("StmF")?;
    let strings = method("StrF")?;
    if streams != strings {
        return Err(PdfError::Unimplemented(format!(
            "different stream ({streams:?}) and string ({strings:?}) crypt filters"
        )));
    }
    Ok(streams)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(v: i64, r: i64) -> PDFDict {
        let mut d = PDFDict::new();
        d.insert("Filter".into(), PDFObject::Name("Standard".into()));
        d.insert("V".into(), PDFObject::Int(v));
        d.insert("R".into(), PDFObject::Int(r));
        d.insert("O".into(), PDFObject::String(vec![0; 32]));
        d.insert("U".into(), PDFObject::String(vec![0; 32]));
        d.insert("P".into(), PDFObject::Int(-4));
        d
    }

    #[test]
    fn permissions_wrap_to_unsigned() {
        let info = EncryptionInfo::from_dict(&base(1, 2), None).unwrap();
        assert_eq!(info.permissions, 0xFFFF_FFFC);
        assert_eq!(info.key_length, 5);
        assert_eq!(info.algorithm, CryptAlgorithm::Rc4);
    }

    #[test]
    fn rejects_bad_rc4_length() {
        let mut d = base(2, 3);
        d.insert("Length".into(), PDFObject::Int(44));
        assert!(matches!(
            EncryptionInfo::from_dict(&d, None),
            Err(PdfError::SyntaxError(_))
        ));
    }

    #[test]
    fn v4_crypt_filters_resolve() {
        let mut d = base(4, 4);
        let mut std_cf = PDFDict::new();
        std_cf.insert("CFM".into(), PDFObject::Name("AESV2".into()));
        let mut cf = PDFDict::new();
        cf.insert("StdCF".into(), PDFObject::Dict(std_cf));
        d.insert("CF".into(), PDFObject::Dict(cf));
        d.insert("StmF".into(), PDFObject::Name("StdCF".into()));
        d.insert("StrF".into(), PDFObject::Name("StdCF".into()));
        let info = EncryptionInfo::from_dict(&d, None).unwrap();
        assert_eq!(info.algorithm, CryptAlgorithm::Aes128);
        assert_eq!(info.key_length, 16);

        d.insert("StrF".into(), PDFObject::Name("Identity".into()));
        assert!(matches!(
            EncryptionInfo::from_dict(&d, None),
            Err(PdfError::Unimplemented(_))
        ));
    }
}
