//! UBJSON decode tests: grammar coverage, error taxonomy, and the
//! reader/cursor equivalence property.

use std::collections::BTreeMap;

use bumpalo::Bump;
use keel_format::{Decode, DecodeOptions, ErrorKind, FormatParser, feed_event};
use keel_ubjson::{
    UbjsonParser, from_reader, from_reader_in, from_slice, value_from_slice,
    value_from_slice_with_options,
};
use keel_value::{DocumentBuilder, Value};

/// `{"a": 1, "b": [true, null]}`
const EXAMPLE: &[u8] = &[
    b'{', b'i', 1, b'a', b'i', 1, b'i', 1, b'b', b'[', b'T', b'Z', b']', b'}',
];

#[test]
fn example_document_via_value_path() {
    keel_testhelpers::setup();
    let value = value_from_slice(EXAMPLE).unwrap();
    let object = value.as_object().unwrap();
    let keys: Vec<_> = object.keys().map(String::as_str).collect();
    assert_eq!(keys, ["a", "b"]);
    assert_eq!(value["a"], Value::Int(1));
    assert_eq!(
        value["b"],
        Value::Array(vec![Value::Bool(true), Value::Null])
    );
}

#[derive(Debug, PartialEq)]
struct Example {
    a: i64,
    b: Vec<Option<bool>>,
}

impl<'de> Decode<'de> for Example {
    fn decode<P: FormatParser<'de>>(parser: &mut P) -> Result<Self, keel_format::DecodeError> {
        use keel_format::{ParseEventKind, expect_event, mismatch};
        let event = expect_event(parser)?;
        if !matches!(event.kind, ParseEventKind::ObjectStart) {
            return Err(mismatch(parser, "object", event.kind.type_name()));
        }
        let (mut a, mut b) = (None, None);
        loop {
            let Some(event) = parser.next_event()? else {
                return Err(mismatch(parser, "key or object end", "end of input"));
            };
            match event.kind {
                ParseEventKind::ObjectEnd => break,
                ParseEventKind::Key(name) => match name.as_ref() {
                    "a" => a = Some(i64::decode(parser)?),
                    "b" => b = Some(Vec::<Option<bool>>::decode(parser)?),
                    _ => parser.skip_value()?,
                },
                kind => return Err(mismatch(parser, "key", kind.type_name())),
            }
        }
        match (a, b) {
            (Some(a), Some(b)) => Ok(Example { a, b }),
            _ => Err(mismatch(parser, "fields a and b", "object end")),
        }
    }
}

#[test]
fn example_document_via_typed_path() {
    let example: Example = from_slice(EXAMPLE).unwrap();
    assert_eq!(
        example,
        Example {
            a: 1,
            b: vec![Some(true), None],
        }
    );
}

#[test]
fn reader_and_cursor_build_identical_documents() {
    let via_reader = value_from_slice(EXAMPLE).unwrap();

    let mut parser = UbjsonParser::from_slice(EXAMPLE);
    let mut builder = DocumentBuilder::new();
    while let Some(event) = parser.next_event().unwrap() {
        feed_event(&mut builder, &event);
    }
    let via_cursor = builder.finish();

    assert_eq!(via_reader, via_cursor);
}

#[test]
fn scalar_markers_decode() {
    assert_eq!(value_from_slice(&[b'Z']).unwrap(), Value::Null);
    assert_eq!(value_from_slice(&[b'T']).unwrap(), Value::Bool(true));
    assert_eq!(value_from_slice(&[b'F']).unwrap(), Value::Bool(false));
    assert_eq!(
        value_from_slice(&[b'i', 0xff]).unwrap(),
        Value::Int(-1)
    );
    assert_eq!(value_from_slice(&[b'U', 200]).unwrap(), Value::Uint(200));
    assert_eq!(
        value_from_slice(&[b'I', 0x01, 0x00]).unwrap(),
        Value::Int(256)
    );
    assert_eq!(
        value_from_slice(&[b'l', 0x00, 0x01, 0x00, 0x00]).unwrap(),
        Value::Int(65536)
    );
    assert_eq!(
        value_from_slice(&[b'L', 0, 0, 0, 1, 0, 0, 0, 0]).unwrap(),
        Value::Int(1 << 32)
    );
    assert_eq!(
        value_from_slice(&[b'd', 0x3f, 0xc0, 0x00, 0x00]).unwrap(),
        Value::Double(1.5)
    );
    assert_eq!(
        value_from_slice(&[b'D', 0x3f, 0xf8, 0, 0, 0, 0, 0, 0]).unwrap(),
        Value::Double(1.5)
    );
    assert_eq!(
        value_from_slice(&[b'C', b'a']).unwrap(),
        Value::Str("a".to_owned())
    );
    assert_eq!(
        value_from_slice(&[b'S', b'U', 2, b'h', b'i']).unwrap(),
        Value::Str("hi".to_owned())
    );
    assert_eq!(
        value_from_slice(&[b'H', b'U', 20, b'1', b'8', b'4', b'4', b'6', b'7', b'4', b'4',
            b'0', b'7', b'3', b'7', b'0', b'9', b'5', b'5', b'1', b'6', b'1', b'7']).unwrap(),
        Value::BigNum("18446744073709551617".to_owned())
    );
}

#[test]
fn noop_markers_are_skipped() {
    let value = value_from_slice(&[b'[', b'N', b'T', b'N', b']']).unwrap();
    assert_eq!(value, Value::Array(vec![Value::Bool(true)]));
}

#[test]
fn counted_containers_close_by_exhaustion() {
    // {#U2 x:10 y:20}
    let bytes = [
        b'{', b'#', b'U', 2, b'i', 1, b'x', b'i', 10, b'i', 1, b'y', b'i', 20,
    ];
    let value = value_from_slice(&bytes).unwrap();
    assert_eq!(value["x"], Value::Int(10));
    assert_eq!(value["y"], Value::Int(20));

    // [#U0] — empty counted array, no close marker
    assert_eq!(
        value_from_slice(&[b'[', b'#', b'U', 0]).unwrap(),
        Value::Array(vec![])
    );
}

#[test]
fn strongly_typed_containers_omit_element_markers() {
    // [$i#U3 1 2 3]
    let bytes = [b'[', b'$', b'i', b'#', b'U', 3, 1, 2, 3];
    let value = value_from_slice(&bytes).unwrap();
    assert_eq!(
        value,
        Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
    );

    // {$U#U1 k:42}
    let bytes = [b'{', b'$', b'U', b'#', b'U', 1, b'i', 1, b'k', 42];
    let value = value_from_slice(&bytes).unwrap();
    assert_eq!(value["k"], Value::Uint(42));
}

#[test]
fn type_without_count_is_an_error() {
    let err = value_from_slice(&[b'[', b'$', b'i', b'T']).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::CountRequiredAfterType));
    assert_eq!(err.code(), 2);
}

#[test]
fn count_must_be_integer_typed() {
    let err = value_from_slice(&[b'[', b'#', b'd', 0, 0, 0, 0]).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::LengthMustBeInteger));
    assert_eq!(err.code(), 4);
}

#[test]
fn count_cannot_be_negative() {
    let err = value_from_slice(&[b'[', b'#', b'i', 0xff]).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::LengthCannotBeNegative));
    assert_eq!(err.code(), 3);
}

#[test]
fn unknown_marker_is_an_error() {
    let err = value_from_slice(&[b'Q']).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnknownTypeTag { tag: b'Q' }));
    assert_eq!(err.code(), 5);
}

#[test]
fn invalid_utf8_in_key_and_string() {
    let err = value_from_slice(&[b'{', b'i', 1, 0xff, b'Z', b'}']).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidUtf8));
    assert_eq!(err.code(), 6);

    let err = value_from_slice(&[b'S', b'U', 1, 0xff]).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidUtf8));
}

#[test]
fn every_truncation_fails_with_unexpected_eof() {
    for end in 0..EXAMPLE.len() {
        let err = value_from_slice(&EXAMPLE[..end]).unwrap_err();
        assert!(
            matches!(err.kind, ErrorKind::UnexpectedEof),
            "prefix of {end} bytes gave {err}"
        );
    }
}

#[test]
fn open_tag_alone_fails_just_past_the_tag() {
    let err = value_from_slice(&[b'[']).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnexpectedEof));
    assert_eq!(err.position.offset, 1);
    assert_eq!(err.position.line(), 1);
    assert_eq!(err.position.column(), 2);
}

#[test]
fn nesting_limit_is_exact() {
    // [[[[Z]]]] nested four deep.
    let bytes = [
        b'[', b'[', b'[', b'[', b'Z', b']', b']', b']', b']',
    ];
    let at_limit = DecodeOptions::new().with_max_nesting_depth(4);
    assert!(value_from_slice_with_options(&bytes, at_limit).is_ok());

    let one_short = DecodeOptions::new().with_max_nesting_depth(3);
    let err = value_from_slice_with_options(&bytes, one_short).unwrap_err();
    assert!(matches!(
        err.kind,
        ErrorKind::MaxDepthExceeded { limit: 3 }
    ));
}

#[test]
fn cursor_stops_after_root_and_leaves_trailing_bytes() {
    let mut input = EXAMPLE.to_vec();
    input.extend_from_slice(&[b'T', b'F']);
    let mut parser = UbjsonParser::from_slice(&input);
    while parser.next_event().unwrap().is_some() {}
    assert_eq!(parser.position().offset, EXAMPLE.len());
    assert!(parser.next_event().unwrap().is_none());
}

#[test]
fn skip_value_crosses_one_element() {
    let mut parser = UbjsonParser::from_slice(EXAMPLE);
    // Enter the object, consume the first key, skip its value.
    parser.next_event().unwrap();
    parser.next_event().unwrap();
    parser.skip_value().unwrap();
    // Next event is the second key.
    let event = parser.next_event().unwrap().unwrap();
    assert!(matches!(
        event.kind,
        keel_format::ParseEventKind::Key(ref name) if name == "b"
    ));
}

#[test]
fn stream_decoding_matches_slice_decoding() {
    let from_stream: BTreeMap<String, Value> = from_reader(EXAMPLE).unwrap();
    let from_buffer = value_from_slice(EXAMPLE).unwrap();
    assert_eq!(from_stream["a"], from_buffer["a"]);
    assert_eq!(from_stream["b"], from_buffer["b"]);
}

#[test]
fn arena_staged_stream_decoding() {
    let arena = Bump::new();
    let example: Example = from_reader_in(EXAMPLE, &arena).unwrap();
    assert_eq!(example.a, 1);
    assert_eq!(example.b, vec![Some(true), None]);
}
