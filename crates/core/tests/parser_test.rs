//! Object parser behaviour over whole buffers.

use quire_core::parser::MAX_DEPTH;
use quire_core::{PDFObjRef, PDFObject, Parsed, parse_indirect, parse_object};

fn value(data: &[u8]) -> PDFObject {
    parse_object(data, 0).value().expect("object")
}

#[test]
fn test_scalars() {
    assert_eq!(value(b"null"), PDFObject::Null);
    assert_eq!(value(b"true"), PDFObject::Bool(true));
    assert_eq!(value(b"-17"), PDFObject::Int(-17));
    assert_eq!(value(b"3.5"), PDFObject::Real(3.5));
    assert_eq!(value(b"/Type"), PDFObject::Name("Type".into()));
    assert_eq!(value(b"(hi)"), PDFObject::String(b"hi".to_vec()));
    assert_eq!(value(b"<6869>"), PDFObject::HexString(b"hi".to_vec()));
}

#[test]
fn test_reference_needs_two_unsigned_ints() {
    assert_eq!(value(b"12 0 R"), PDFObject::Ref(PDFObjRef::new(12, 0)));
    assert_eq!(
        value(b"[1 2 R -1 0]"),
        PDFObject::Array(vec![
            PDFObject::Ref(PDFObjRef::new(1, 2)),
            PDFObject::Int(-1),
            PDFObject::Int(0),
        ])
    );
    // a dangling R inside an array is malformed
    assert!(!parse_object(b"[-1 0 R]", 0).is_found());
}

#[test]
fn test_int_followed_by_int_is_not_reference() {
    match parse_object(b"1 2 3", 0) {
        Parsed::Found { value, end } => {
            assert_eq!(value, PDFObject::Int(1));
            assert_eq!(end, 1);
        }
        Parsed::NotFound => panic!("expected an integer"),
    }
}

#[test]
fn test_nested_dict() {
    let obj = value(b"<< /Kids [ 3 0 R ] /Info << /Title (T) >> /Count 1 >>");
    let dict = obj.as_dict().unwrap();
    assert_eq!(dict.len(), 3);
    assert_eq!(dict["Count"], PDFObject::Int(1));
    let info = dict["Info"].as_dict().unwrap();
    assert_eq!(info["Title"].as_string().unwrap(), b"T");
}

#[test]
fn test_end_offset_points_past_value() {
    let data = b"  [1 2]  tail";
    let (obj, end) = parse_object(data, 0).found().unwrap();
    assert_eq!(obj.as_array().unwrap().len(), 2);
    assert_eq!(&data[end..], b"  tail");
}

#[test]
fn test_malformed_is_not_found() {
    assert!(!parse_object(b"[1 2", 0).is_found());
    assert!(!parse_object(b"<< /A >>", 0).is_found());
    assert!(!parse_object(b"]", 0).is_found());
    assert!(!parse_object(b"", 0).is_found());
}

#[test]
fn test_depth_limit() {
    let mut deep = vec![b'['; MAX_DEPTH + 2];
    deep.extend(vec![b']'; MAX_DEPTH + 2]);
    assert!(!parse_object(&deep, 0).is_found());

    let mut shallow = vec![b'['; 16];
    shallow.extend(vec![b']'; 16]);
    assert!(parse_object(&shallow, 0).is_found());
}

#[test]
fn test_bare_keyword_is_kept() {
    assert_eq!(value(b"BT"), PDFObject::Keyword("BT".into()));
}

#[test]
fn test_indirect_object_with_stream() {
    let data = b"7 0 obj\n<< /Length 5 >>\nstream\nhello\nendstream\nendobj\n";
    let (indirect, end) = parse_indirect(data, 0).found().unwrap();
    assert_eq!(indirect.objid, 7);
    assert_eq!(indirect.genno, 0);
    let stream = indirect.object.as_stream().unwrap();
    assert_eq!(stream.get_rawdata(), b"hello");
    assert_eq!(stream.objid, Some(7));
    assert_eq!(end, data.len() - 1);
}

#[test]
fn test_wrong_length_falls_back_to_endstream_scan() {
    let data = b"1 0 obj\n<< /Length 99 >>\nstream\nabc\nendstream\nendobj";
    let indirect = parse_indirect(data, 0).value().unwrap();
    assert_eq!(indirect.object.as_stream().unwrap().get_rawdata(), b"abc");
}

#[test]
fn test_indirect_length_without_resolver_scans() {
    let data = b"1 0 obj\n<< /Length 2 0 R >>\nstream\r\nxyz\r\nendstream\nendobj";
    let indirect = parse_indirect(data, 0).value().unwrap();
    assert_eq!(indirect.object.as_stream().unwrap().get_rawdata(), b"xyz");
}

#[test]
fn test_missing_endobj_is_tolerated() {
    let data = b"3 0 obj (x) 4 0 obj";
    let (indirect, end) = parse_indirect(data, 0).found().unwrap();
    assert_eq!(indirect.object, PDFObject::String(b"x".to_vec()));
    assert_eq!(end, 11);
}

#[test]
fn test_unterminated_dict_is_bounded() {
    let data = b"<< /A 1 /B [2 3 /C << /D (x) ";
    assert_eq!(parse_object(data, 0), Parsed::NotFound);
    let (obj, end) = parse_object(data, 6).found().unwrap();
    assert_eq!(obj, PDFObject::Int(1));
    assert_eq!(end, 7);
}
