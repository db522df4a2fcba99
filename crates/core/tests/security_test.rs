//! Standard security handler: `/Encrypt` validation, key derivation for
//! revisions 2 through 6 and per-object decryption.

use quire_core::PdfError;
use quire_core::codec::{aes128_cbc_encrypt, rc4};
use quire_core::crypto::{
    CryptAlgorithm, EncryptionInfo, FileKey, KeyDerivation, StreamDecryptor, derive_file_key,
    hardened_hash, object_key,
};
use quire_core::model::{PDFDict, PDFObject};

// V=1, R=2, 40-bit key; owner password "foo", user password "baz"
const RC4_40_O: [u8; 32] = [
    1, 169, 240, 206, 242, 141, 0, 248, 223, 176, 37, 143, 94, 240, 197, 92, 157, 247, 200, 22,
    149, 143, 54, 49, 0, 175, 119, 236, 2, 38, 36, 84,
];
const RC4_40_U: [u8; 32] = [
    105, 75, 157, 162, 248, 9, 199, 124, 114, 119, 140, 251, 202, 194, 4, 129, 178, 114, 5, 208,
    231, 211, 34, 98, 54, 130, 131, 100, 102, 106, 151, 8,
];
const DOCID: [u8; 16] = [
    101, 26, 148, 254, 235, 120, 104, 211, 18, 169, 123, 55, 114, 112, 134, 14,
];

// V=2, R=3, 128-bit key; same passwords and document ID
const RC4_128_O: [u8; 32] = [
    208, 72, 209, 82, 158, 83, 93, 24, 132, 205, 56, 86, 54, 123, 24, 75, 74, 144, 223, 1, 230, 55,
    209, 110, 202, 6, 91, 175, 78, 100, 144, 11,
];
const RC4_128_U: [u8; 32] = [
    9, 52, 18, 54, 59, 157, 50, 124, 122, 197, 1, 68, 199, 199, 85, 241, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0,
];

// V=5, R=5, AESV3; owner password "foo", user password "baz"
const AES256_O: [u8; 48] = [
    197, 126, 60, 46, 218, 22, 190, 91, 132, 46, 198, 222, 145, 49, 111, 125, 24, 147, 223, 122, 6,
    21, 159, 78, 155, 195, 49, 220, 252, 161, 203, 182, 215, 56, 115, 236, 23, 247, 193, 14, 39,
    184, 210, 207, 56, 201, 114, 199,
];
const AES256_U: [u8; 48] = [
    179, 236, 138, 87, 238, 76, 63, 44, 188, 66, 38, 224, 89, 1, 136, 216, 233, 86, 206, 51, 43,
    103, 248, 173, 26, 183, 85, 55, 229, 239, 180, 149, 88, 136, 28, 124, 249, 186, 223, 59, 180,
    7, 178, 19, 84, 51, 249, 188,
];
const AES256_OE: [u8; 32] = [
    91, 206, 49, 194, 37, 90, 49, 81, 128, 220, 14, 148, 72, 121, 213, 222, 45, 98, 227, 35, 15,
    76, 191, 10, 54, 211, 184, 43, 81, 250, 80, 231,
];
const AES256_UE: [u8; 32] = [
    121, 209, 78, 72, 9, 195, 93, 96, 16, 97, 189, 216, 198, 84, 195, 205, 125, 73, 208, 81, 173,
    33, 196, 195, 9, 4, 57, 3, 226, 247, 31, 8,
];
const AES256_KEY: &str = "5250e6e3f7b07091b017f36f36312d5574f84b32f2de934a42c0f8068928d0aa";

// V=5, R=6; owner password "owner", user password "user", file key 00..1f
const R6_O: &str = "17793161d3cae6802108f77f03d8605a10fb8de0b7a7ab1a9a35fd63efd8b832\
                    6f7673616c7430326f6b73616c743032";
const R6_U: &str = "647eea44ca0648aaea2bd4bd30be64c4cfa85b768d03b1522cb09499a54e5b41\
                    757673616c743031756b73616c743031";
const R6_OE: &str = "c0ed19633bf851e4e39f793c6b15773af4d6444a597f10bdc928ce9e649910bc";
const R6_UE: &str = "0b7cdaaaeb33c49fa4dadd4f62e9e6f5c22141ebdda91f436d2bb437c5cff9e5";

fn bytes(hex_str: &str) -> Vec<u8> {
    hex::decode(hex_str.replace(' ', "")).unwrap()
}

fn legacy_dict(v: i64, r: i64, length: Option<i64>, o: &[u8], u: &[u8]) -> PDFDict {
    let mut dict = PDFDict::new();
    dict.insert("Filter".into(), PDFObject::Name("Standard".into()));
    dict.insert("V".into(), PDFObject::Int(v));
    dict.insert("R".into(), PDFObject::Int(r));
    dict.insert("P".into(), PDFObject::Int(-4));
    dict.insert("O".into(), PDFObject::String(o.to_vec()));
    dict.insert("U".into(), PDFObject::String(u.to_vec()));
    if let Some(bits) = length {
        dict.insert("Length".into(), PDFObject::Int(bits));
    }
    dict
}

fn crypt_filters(dict: &mut PDFDict, method: &str) {
    let mut std_cf = PDFDict::new();
    std_cf.insert("CFM".into(), PDFObject::Name(method.into()));
    let mut cf = PDFDict::new();
    cf.insert("StdCF".into(), PDFObject::Dict(std_cf));
    dict.insert("CF".into(), PDFObject::Dict(cf));
    dict.insert("StmF".into(), PDFObject::Name("StdCF".into()));
    dict.insert("StrF".into(), PDFObject::Name("StdCF".into()));
}

fn modern_dict(r: i64, o: &[u8], u: &[u8], oe: &[u8], ue: &[u8]) -> PDFDict {
    let mut dict = legacy_dict(5, r, None, o, u);
    dict.insert("OE".into(), PDFObject::String(oe.to_vec()));
    dict.insert("UE".into(), PDFObject::String(ue.to_vec()));
    crypt_filters(&mut dict, "AESV3");
    dict
}

fn doc_id() -> PDFObject {
    PDFObject::Array(vec![
        PDFObject::String(DOCID.to_vec()),
        PDFObject::String(DOCID.to_vec()),
    ])
}

fn rc4_40() -> EncryptionInfo {
    EncryptionInfo::from_dict(&legacy_dict(1, 2, None, &RC4_40_O, &RC4_40_U), Some(&doc_id()))
        .unwrap()
}

fn rc4_128() -> EncryptionInfo {
    let dict = legacy_dict(2, 3, Some(128), &RC4_128_O, &RC4_128_U);
    EncryptionInfo::from_dict(&dict, Some(&doc_id())).unwrap()
}

fn aes256_r5() -> EncryptionInfo {
    let dict = modern_dict(5, &AES256_O, &AES256_U, &AES256_OE, &AES256_UE);
    EncryptionInfo::from_dict(&dict, None).unwrap()
}

fn aes256_r6() -> EncryptionInfo {
    let dict = modern_dict(6, &bytes(R6_O), &bytes(R6_U), &bytes(R6_OE), &bytes(R6_UE));
    EncryptionInfo::from_dict(&dict, None).unwrap()
}

fn pw(password: &str) -> Option<&[u8]> {
    Some(password.as_bytes())
}

fn key_hex(info: &EncryptionInfo, owner: Option<&[u8]>, user: Option<&[u8]>) -> String {
    hex::encode(derive_file_key(info, owner, user).unwrap().as_bytes())
}

// --- /Encrypt validation ---

#[test]
fn test_info_reads_legacy_dict() {
    let info = rc4_40();
    assert_eq!(info.algorithm, CryptAlgorithm::Rc4);
    assert_eq!(info.key_length, 5);
    assert_eq!(info.doc_id, DOCID);
    assert!(info.encrypt_metadata);
    assert_eq!(rc4_128().key_length, 16);
}

#[test]
fn test_unknown_revision_is_rejected() {
    let dict = legacy_dict(2, 7, None, &RC4_40_O, &RC4_40_U);
    assert!(matches!(
        EncryptionInfo::from_dict(&dict, None),
        Err(PdfError::InvalidRevision(7))
    ));
    assert!(matches!(
        KeyDerivation::for_revision(1),
        Err(PdfError::InvalidRevision(1))
    ));
}

#[test]
fn test_non_standard_handler_is_unimplemented() {
    let mut dict = legacy_dict(1, 2, None, &RC4_40_O, &RC4_40_U);
    dict.insert("Filter".into(), PDFObject::Name("Adobe.PubSec".into()));
    assert!(matches!(
        EncryptionInfo::from_dict(&dict, None),
        Err(PdfError::Unimplemented(_))
    ));
}

#[test]
fn test_mixed_crypt_filters_are_unimplemented() {
    let mut dict = legacy_dict(4, 4, None, &RC4_40_O, &RC4_40_U);
    crypt_filters(&mut dict, "AESV2");
    dict.insert("StrF".into(), PDFObject::Name("Identity".into()));
    assert!(matches!(
        EncryptionInfo::from_dict(&dict, None),
        Err(PdfError::Unimplemented(_))
    ));
}

#[test]
fn test_short_owner_key_is_syntax_error() {
    let dict = legacy_dict(1, 2, None, &RC4_40_O[..16], &RC4_40_U);
    assert!(matches!(
        EncryptionInfo::from_dict(&dict, None),
        Err(PdfError::SyntaxError(_))
    ));
}

#[test]
fn test_bad_doc_id_is_syntax_error() {
    let dict = legacy_dict(1, 2, None, &RC4_40_O, &RC4_40_U);
    let id = PDFObject::Array(vec![PDFObject::Int(3)]);
    assert!(matches!(
        EncryptionInfo::from_dict(&dict, Some(&id)),
        Err(PdfError::SyntaxError(_))
    ));
}

// --- Revisions 2 and 3 ---

#[test]
fn test_rc4_40_user_password() {
    assert_eq!(key_hex(&rc4_40(), None, pw("baz")), "115e6afda4");
}

#[test]
fn test_rc4_40_owner_password() {
    assert_eq!(key_hex(&rc4_40(), pw("foo"), None), "115e6afda4");
}

#[test]
fn test_rc4_40_wrong_and_empty_passwords() {
    let info = rc4_40();
    assert!(matches!(
        derive_file_key(&info, pw("wrong"), pw("wrong")),
        Err(PdfError::InvalidPassword)
    ));
    assert!(matches!(
        derive_file_key(&info, None, None),
        Err(PdfError::InvalidPassword)
    ));
}

#[test]
fn test_rc4_128_passwords() {
    let info = rc4_128();
    assert_eq!(
        key_hex(&info, None, pw("baz")),
        "c2a59ca0a50e5b4ccff13e4bcf0e3b18"
    );
    assert_eq!(
        key_hex(&info, pw("foo"), None),
        "c2a59ca0a50e5b4ccff13e4bcf0e3b18"
    );
    assert!(derive_file_key(&info, None, pw("foo")).is_err());
}

#[test]
fn test_wrong_owner_falls_back_to_user() {
    assert_eq!(
        key_hex(&rc4_40(), pw("not it"), pw("baz")),
        "115e6afda4"
    );
}

// --- Revisions 5 and 6 ---

#[test]
fn test_aes256_r5_passwords() {
    let info = aes256_r5();
    assert_eq!(info.algorithm, CryptAlgorithm::Aes256);
    assert_eq!(key_hex(&info, pw("foo"), None), AES256_KEY);
    assert_eq!(key_hex(&info, None, pw("baz")), AES256_KEY);
    assert!(matches!(
        derive_file_key(&info, pw("baz"), pw("foo")),
        Err(PdfError::InvalidPassword)
    ));
}

#[test]
fn test_aes256_r6_passwords() {
    let info = aes256_r6();
    let expected: Vec<u8> = (0u8..32).collect();
    let user = derive_file_key(&info, None, pw("user")).unwrap();
    assert_eq!(user.as_bytes(), expected.as_slice());
    let owner = derive_file_key(&info, pw("owner"), None).unwrap();
    assert_eq!(owner.as_bytes(), expected.as_slice());
    assert!(matches!(
        derive_file_key(&info, None, None),
        Err(PdfError::InvalidPassword)
    ));
}

#[test]
fn test_hardened_hash_known_answers() {
    let user = hardened_hash(b"user", b"uvsalt01", b"").unwrap();
    assert_eq!(hex::encode(user.digest), &R6_U[..64]);
    assert_eq!(user.rounds, 76);

    let u = bytes(R6_U);
    let owner = hardened_hash(b"owner", b"ovsalt02", &u).unwrap();
    assert_eq!(hex::encode(owner.digest), &R6_O[..64]);
    assert_eq!(owner.rounds, 68);
}

#[test]
fn test_hardened_hash_round_bounds() {
    for (password, salt) in [("", "uvsalt01"), ("user", "ksalt000")] {
        let (password, salt) = (password.as_bytes(), salt.as_bytes());
        let hash = hardened_hash(password, salt, b"").unwrap();
        assert!((64..=289).contains(&hash.rounds), "{}", hash.rounds);
    }
    assert_eq!(hardened_hash(b"", b"uvsalt01", b"").unwrap().rounds, 70);
}

// --- Per-object decryption ---

#[test]
fn test_rc4_object_decryption() {
    let key = FileKey::from(hex::decode("115e6afda4").unwrap());
    let sealed = rc4(&object_key(key.as_bytes(), 4, 0, false), b"Hello, encrypted world").unwrap();
    assert_eq!(
        hex::encode(&sealed),
        "5084294c061bee89b1fb80a1a4c974f859d544915814"
    );
    let plain = StreamDecryptor::Rc4.decrypt(&key, 4, 0, &sealed).unwrap();
    assert_eq!(plain, b"Hello, encrypted world");
}

#[test]
fn test_object_keys_differ_by_number_and_generation() {
    let key = [1u8, 2, 3, 4, 5];
    let base = object_key(&key, 1, 0, false);
    assert_eq!(base.len(), 10);
    assert_ne!(base, object_key(&key, 2, 0, false));
    assert_ne!(base, object_key(&key, 1, 1, false));
    assert_ne!(base, object_key(&key, 1, 0, true));
    assert_eq!(object_key(&[0; 16], 1, 0, false).len(), 16);
}

#[test]
fn test_aes128_object_decryption() {
    let key = FileKey::from(vec![0x42; 16]);
    let iv = [3u8; 16];
    let mut padded = b"AESV2 string".to_vec();
    padded.extend([4; 4]);
    let mut sealed = iv.to_vec();
    sealed.extend(
        aes128_cbc_encrypt(&object_key(key.as_bytes(), 12, 0, true), &iv, &padded).unwrap(),
    );
    let plain = StreamDecryptor::Aes128.decrypt(&key, 12, 0, &sealed).unwrap();
    assert_eq!(plain, b"AESV2 string");
}

#[test]
fn test_identity_decryptor_is_passthrough() {
    let key = FileKey::from(vec![9; 16]);
    assert_eq!(
        StreamDecryptor::Identity.decrypt(&key, 1, 0, b"clear").unwrap(),
        b"clear"
    );
    assert_eq!(
        StreamDecryptor::for_algorithm(CryptAlgorithm::Aes256),
        StreamDecryptor::Aes256
    );
}

#[test]
fn test_file_key_debug_is_redacted() {
    let key = FileKey::from(vec![0xAB; 5]);
    assert_eq!(format!("{key:?}"), "FileKey(5 bytes)");
}
