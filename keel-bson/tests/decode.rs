//! BSON decode tests over handcrafted documents.

use std::collections::BTreeMap;

use bumpalo::Bump;
use keel_bson::{BsonParser, from_slice, value_from_slice, value_from_slice_with_options};
use keel_format::{DecodeOptions, ErrorKind, FormatParser, ParseEventKind, feed_event};
use keel_value::{DocumentBuilder, Value};

/// Wrap an element list into a document: length prefix + body + terminator.
fn document(body: &[u8]) -> Vec<u8> {
    let len = (body.len() + 5) as i32;
    let mut out = len.to_le_bytes().to_vec();
    out.extend_from_slice(body);
    out.push(0x00);
    out
}

/// One element: type byte, NUL-terminated key, payload.
fn elem(element_type: u8, key: &str, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![element_type];
    out.extend_from_slice(key.as_bytes());
    out.push(0x00);
    out.extend_from_slice(payload);
    out
}

/// BSON string payload: i32 length including NUL, text, NUL.
fn string_payload(text: &str) -> Vec<u8> {
    let mut out = ((text.len() + 1) as i32).to_le_bytes().to_vec();
    out.extend_from_slice(text.as_bytes());
    out.push(0x00);
    out
}

/// `{"a": 1, "b": [true, null]}`
fn example() -> Vec<u8> {
    let array = document(
        &[
            elem(0x08, "0", &[1]),
            elem(0x0a, "1", &[]),
        ]
        .concat(),
    );
    document(
        &[
            elem(0x10, "a", &1i32.to_le_bytes()),
            elem(0x04, "b", &array),
        ]
        .concat(),
    )
}

#[test]
fn example_document_via_value_path() {
    keel_testhelpers::setup();
    let value = value_from_slice(&example()).unwrap();
    let keys: Vec<_> = value.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys, ["a", "b"]);
    assert_eq!(value["a"], Value::Int(1));
    assert_eq!(
        value["b"],
        Value::Array(vec![Value::Bool(true), Value::Null])
    );
}

#[test]
fn example_document_via_typed_path() {
    let decoded: BTreeMap<String, Value> = from_slice(&example()).unwrap();
    assert_eq!(decoded["a"], Value::Int(1));
    assert_eq!(
        decoded["b"],
        Value::Array(vec![Value::Bool(true), Value::Null])
    );
}

#[test]
fn reader_and_cursor_build_identical_documents() {
    let bytes = example();
    let via_reader = value_from_slice(&bytes).unwrap();

    let mut parser = BsonParser::from_slice(&bytes);
    let mut builder = DocumentBuilder::new();
    while let Some(event) = parser.next_event().unwrap() {
        feed_event(&mut builder, &event);
    }
    assert_eq!(via_reader, builder.finish());
}

#[test]
fn scalar_elements_decode() {
    let body = [
        elem(0x01, "dbl", &1.5f64.to_le_bytes()),
        elem(0x02, "str", &string_payload("hi")),
        elem(0x05, "bin", &{
            let mut payload = 3i32.to_le_bytes().to_vec();
            payload.push(0x00); // generic subtype
            payload.extend_from_slice(&[1, 2, 3]);
            payload
        }),
        elem(0x08, "no", &[0]),
        elem(0x09, "when", &1_700_000_000_000i64.to_le_bytes()),
        elem(0x0a, "nothing", &[]),
        elem(0x10, "i32", &(-5i32).to_le_bytes()),
        elem(0x11, "ts", &7u64.to_le_bytes()),
        elem(0x12, "i64", &(1i64 << 40).to_le_bytes()),
    ]
    .concat();
    let value = value_from_slice(&document(&body)).unwrap();
    assert_eq!(value["dbl"], Value::Double(1.5));
    assert_eq!(value["str"], Value::Str("hi".to_owned()));
    assert_eq!(value["bin"], Value::Bytes(vec![1, 2, 3]));
    assert_eq!(value["no"], Value::Bool(false));
    assert_eq!(value["when"], Value::Int(1_700_000_000_000));
    assert_eq!(value["nothing"], Value::Null);
    assert_eq!(value["i32"], Value::Int(-5));
    assert_eq!(value["ts"], Value::Uint(7));
    assert_eq!(value["i64"], Value::Int(1 << 40));
}

#[test]
fn empty_document_decodes() {
    let value = value_from_slice(&document(&[])).unwrap();
    assert_eq!(value, Value::Object(keel_value::Object::new()));
}

#[test]
fn unsupported_element_types_are_rejected() {
    // 0x07 is ObjectId, deliberately unmapped.
    let bytes = document(&elem(0x07, "id", &[0; 12]));
    let err = value_from_slice(&bytes).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnknownTypeTag { tag: 0x07 }));
    assert_eq!(err.code(), 5);
}

#[test]
fn invalid_utf8_in_key_is_rejected() {
    let mut body = vec![0x0a];
    body.extend_from_slice(&[0xff, 0xfe]);
    body.push(0x00);
    let err = value_from_slice(&document(&body)).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidUtf8));
}

#[test]
fn invalid_utf8_in_string_is_rejected() {
    let mut payload = 2i32.to_le_bytes().to_vec();
    payload.push(0xff);
    payload.push(0x00);
    let err = value_from_slice(&document(&elem(0x02, "s", &payload))).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidUtf8));
    assert_eq!(err.code(), 6);
}

#[test]
fn negative_lengths_are_rejected() {
    let err = value_from_slice(&document(&elem(0x02, "s", &(-1i32).to_le_bytes()))).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::LengthCannotBeNegative));

    let mut payload = (-3i32).to_le_bytes().to_vec();
    payload.push(0x00);
    let err = value_from_slice(&document(&elem(0x05, "b", &payload))).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::LengthCannotBeNegative));
    assert_eq!(err.code(), 3);
}

#[test]
fn declared_size_is_verified_against_content() {
    let mut bytes = example();
    let declared = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    bytes[..4].copy_from_slice(&(declared + 1).to_le_bytes());
    bytes.push(0xaa); // keep the buffer long enough for the inflated claim
    let err = value_from_slice(&bytes).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::DocumentSizeMismatch { .. }));
}

#[test]
fn every_truncation_fails_with_unexpected_eof() {
    let bytes = example();
    for end in 0..bytes.len() {
        let err = value_from_slice(&bytes[..end]).unwrap_err();
        assert!(
            matches!(err.kind, ErrorKind::UnexpectedEof),
            "prefix of {end} bytes gave {err}"
        );
    }
}

#[test]
fn nesting_limit_is_exact() {
    // {"k": {"k": {"k": {}}}} — four documents deep.
    let mut doc = document(&[]);
    for _ in 0..3 {
        doc = document(&elem(0x03, "k", &doc));
    }
    let at_limit = DecodeOptions::new().with_max_nesting_depth(4);
    assert!(value_from_slice_with_options(&doc, at_limit).is_ok());

    let one_short = DecodeOptions::new().with_max_nesting_depth(3);
    let err = value_from_slice_with_options(&doc, one_short).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::MaxDepthExceeded { limit: 3 }));
}

#[test]
fn native_skip_seeks_past_subtrees() {
    let bytes = example();
    let mut parser = BsonParser::from_slice(&bytes);
    // ObjectStart, then key "a".
    parser.next_event().unwrap();
    let event = parser.next_event().unwrap().unwrap();
    assert!(matches!(event.kind, ParseEventKind::Key(ref name) if name == "a"));
    // Skip the int, take key "b", skip the whole array subtree.
    parser.skip_value().unwrap();
    let event = parser.next_event().unwrap().unwrap();
    assert!(matches!(event.kind, ParseEventKind::Key(ref name) if name == "b"));
    parser.skip_value().unwrap();
    // Only the object end remains.
    let event = parser.next_event().unwrap().unwrap();
    assert!(matches!(event.kind, ParseEventKind::ObjectEnd));
    assert!(parser.next_event().unwrap().is_none());
}

#[test]
fn trailing_bytes_after_the_document_are_left_unread() {
    let mut bytes = example();
    let doc_len = bytes.len();
    bytes.extend_from_slice(&[0xde, 0xad]);
    let mut parser = BsonParser::from_slice(&bytes);
    while parser.next_event().unwrap().is_some() {}
    assert_eq!(parser.position().offset, doc_len);
}

#[test]
fn stream_and_arena_paths_match_the_slice_path() {
    let bytes = example();
    let from_buffer = value_from_slice(&bytes).unwrap();

    let from_stream = keel_bson::value_from_reader(bytes.as_slice()).unwrap();
    assert_eq!(from_buffer, from_stream);

    let arena = Bump::new();
    let from_arena = keel_bson::value_from_reader_in(bytes.as_slice(), &arena).unwrap();
    assert_eq!(from_buffer, from_arena);

    let typed: BTreeMap<String, Value> = keel_bson::from_reader(bytes.as_slice()).unwrap();
    assert_eq!(typed["a"], Value::Int(1));
}
