//! Core mechanics exercised over a scripted parser, independent of any wire
//! format.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::collections::VecDeque;

use keel_format::{
    Decode, DecodeError, DocumentReader, ErrorKind, FormatParser, ParseEvent, ParseEventKind,
    Position, ScalarValue, Span, Visitor, expect_event, mismatch,
};

/// Parser that replays a scripted event sequence.
struct ScriptedParser<'de> {
    events: VecDeque<ParseEvent<'de>>,
    consumed: usize,
}

impl<'de> ScriptedParser<'de> {
    fn new(kinds: Vec<ParseEventKind<'de>>) -> Self {
        ScriptedParser {
            events: kinds
                .into_iter()
                .enumerate()
                .map(|(i, kind)| ParseEvent::new(kind, Span::new(i, 1)))
                .collect(),
            consumed: 0,
        }
    }
}

impl<'de> FormatParser<'de> for ScriptedParser<'de> {
    fn next_event(&mut self) -> Result<Option<ParseEvent<'de>>, DecodeError> {
        match self.events.pop_front() {
            Some(event) => {
                self.consumed += 1;
                Ok(Some(event))
            }
            None => Ok(None),
        }
    }

    fn peek_event(&mut self) -> Result<Option<ParseEvent<'de>>, DecodeError> {
        Ok(self.events.front().cloned())
    }

    fn position(&self) -> Position {
        Position::new(self.consumed)
    }

    fn format_name(&self) -> &'static str {
        "scripted"
    }
}

fn key(name: &str) -> ParseEventKind<'_> {
    ParseEventKind::Key(Cow::Borrowed(name))
}

fn str_scalar(value: &str) -> ParseEventKind<'_> {
    ParseEventKind::Scalar(ScalarValue::Str(Cow::Borrowed(value)))
}

fn u64_scalar(value: u64) -> ParseEventKind<'static> {
    ParseEventKind::Scalar(ScalarValue::U64(value))
}

/// Visitor that renders callbacks into a flat trace for assertions.
#[derive(Default)]
struct TraceVisitor {
    out: Vec<String>,
}

impl Visitor for TraceVisitor {
    fn begin_object(&mut self) {
        self.out.push("{".into());
    }
    fn end_object(&mut self) {
        self.out.push("}".into());
    }
    fn begin_array(&mut self) {
        self.out.push("[".into());
    }
    fn end_array(&mut self) {
        self.out.push("]".into());
    }
    fn key(&mut self, name: &str) {
        self.out.push(format!("key {name}"));
    }
    fn string_value(&mut self, value: &str) {
        self.out.push(format!("str {value}"));
    }
    fn bytes_value(&mut self, value: &[u8]) {
        self.out.push(format!("bytes {value:?}"));
    }
    fn int_value(&mut self, value: i64) {
        self.out.push(format!("int {value}"));
    }
    fn uint_value(&mut self, value: u64) {
        self.out.push(format!("uint {value}"));
    }
    fn bignum_value(&mut self, value: &str) {
        self.out.push(format!("bignum {value}"));
    }
    fn double_value(&mut self, value: f64) {
        self.out.push(format!("double {value}"));
    }
    fn bool_value(&mut self, value: bool) {
        self.out.push(format!("bool {value}"));
    }
    fn null_value(&mut self) {
        self.out.push("null".into());
    }
}

#[test]
fn reader_pumps_exactly_one_document() {
    let mut parser = ScriptedParser::new(vec![
        ParseEventKind::ObjectStart,
        key("a"),
        u64_scalar(1),
        key("b"),
        ParseEventKind::ArrayStart,
        ParseEventKind::Scalar(ScalarValue::Bool(true)),
        ParseEventKind::Scalar(ScalarValue::Null),
        ParseEventKind::ArrayEnd,
        ParseEventKind::ObjectEnd,
    ]);
    // Extra events after the root must not be touched by the reader.
    parser.events.push_back(ParseEvent::new(
        u64_scalar(99),
        Span::new(usize::MAX, 1),
    ));

    let mut visitor = TraceVisitor::default();
    DocumentReader::new(&mut parser).read_to(&mut visitor).unwrap();
    assert_eq!(
        visitor.out,
        [
            "{", "key a", "uint 1", "key b", "[", "bool true", "null", "]", "}"
        ]
    );
    assert_eq!(parser.events.len(), 1);
}

#[test]
fn reader_rejects_empty_input() {
    let parser = ScriptedParser::new(vec![]);
    let err = DocumentReader::new(parser)
        .read_to(&mut TraceVisitor::default())
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnexpectedEof));
}

#[test]
fn reader_rejects_exhaustion_mid_structure() {
    let parser = ScriptedParser::new(vec![ParseEventKind::ArrayStart, u64_scalar(1)]);
    let err = DocumentReader::new(parser)
        .read_to(&mut TraceVisitor::default())
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnexpectedEof));
}

#[test]
fn skip_value_crosses_whole_subtrees() {
    let mut parser = ScriptedParser::new(vec![
        ParseEventKind::ArrayStart,
        ParseEventKind::ObjectStart,
        key("nested"),
        ParseEventKind::ArrayStart,
        u64_scalar(1),
        ParseEventKind::ArrayEnd,
        ParseEventKind::ObjectEnd,
        ParseEventKind::ArrayEnd,
        str_scalar("after"),
    ]);
    parser.skip_value().unwrap();
    let trailing: String = String::decode(&mut parser).unwrap();
    assert_eq!(trailing, "after");
}

#[test]
fn skip_container_requires_a_container() {
    let mut parser = ScriptedParser::new(vec![u64_scalar(7)]);
    let err = parser.skip_container().unwrap_err();
    assert!(matches!(
        err.kind,
        ErrorKind::Mismatch {
            expected: "container",
            ..
        }
    ));
}

#[test]
fn decode_builds_maps_vectors_and_options() {
    let mut parser = ScriptedParser::new(vec![
        ParseEventKind::ObjectStart,
        key("xs"),
        ParseEventKind::ArrayStart,
        ParseEventKind::Scalar(ScalarValue::Null),
        u64_scalar(3),
        ParseEventKind::ArrayEnd,
        ParseEventKind::ObjectEnd,
    ]);
    let decoded: BTreeMap<String, Vec<Option<u32>>> = BTreeMap::decode(&mut parser).unwrap();
    assert_eq!(decoded["xs"], vec![None, Some(3)]);
}

#[test]
fn decode_reports_integer_overflow() {
    let mut parser = ScriptedParser::new(vec![u64_scalar(300)]);
    let err = u8::decode(&mut parser).unwrap_err();
    assert!(matches!(
        err.kind,
        ErrorKind::NumberOutOfRange { target: "u8", .. }
    ));
}

#[test]
fn decode_rejects_signed_into_unsigned() {
    let mut parser = ScriptedParser::new(vec![ParseEventKind::Scalar(ScalarValue::I64(-1))]);
    let err = u64::decode(&mut parser).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::NumberOutOfRange { .. }));
}

/// `{ a: int, b: sequence<optional<bool>> }`, decoded through a hand-written
/// `Decode` impl the way applications write them.
#[derive(Debug, PartialEq)]
struct Example {
    a: i64,
    b: Vec<Option<bool>>,
}

impl<'de> Decode<'de> for Example {
    fn decode<P: FormatParser<'de>>(parser: &mut P) -> Result<Self, DecodeError> {
        let event = expect_event(parser)?;
        if !matches!(event.kind, ParseEventKind::ObjectStart) {
            return Err(mismatch(parser, "object", event.kind.type_name()));
        }
        let mut a = None;
        let mut b = None;
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
fn decode_drives_a_typed_struct() {
    let mut parser = ScriptedParser::new(vec![
        ParseEventKind::ObjectStart,
        key("a"),
        u64_scalar(1),
        key("ignored"),
        ParseEventKind::ArrayStart,
        str_scalar("x"),
        ParseEventKind::ArrayEnd,
        key("b"),
        ParseEventKind::ArrayStart,
        ParseEventKind::Scalar(ScalarValue::Bool(true)),
        ParseEventKind::Scalar(ScalarValue::Null),
        ParseEventKind::ArrayEnd,
        ParseEventKind::ObjectEnd,
    ]);
    let example = Example::decode(&mut parser).unwrap();
    assert_eq!(
        example,
        Example {
            a: 1,
            b: vec![Some(true), None],
        }
    );
}
