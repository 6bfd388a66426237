//! Structural events shared by every format parser.

use core::fmt;
use std::borrow::Cow;

use crate::error::Position;

/// Byte range in the input that an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Absolute byte offset of the first byte.
    pub offset: usize,
    /// Number of bytes covered.
    pub len: usize,
}

impl Span {
    /// Create a span starting at `offset`, covering `len` bytes.
    pub const fn new(offset: usize, len: usize) -> Self {
        Span { offset, len }
    }

    /// The span's start as a reportable [`Position`].
    pub const fn position(&self) -> Position {
        Position::new(self.offset)
    }
}

/// Scalar data extracted from the wire format.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue<'de> {
    /// Null literal.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Signed integer literal.
    I64(i64),
    /// Unsigned integer literal.
    U64(u64),
    /// Arbitrary-precision number as decimal text (CBOR bignums, UBJSON
    /// high-precision numbers).
    BigNumber(Cow<'de, str>),
    /// Floating-point literal.
    F64(f64),
    /// UTF-8 string literal.
    Str(Cow<'de, str>),
    /// Binary literal.
    Bytes(Cow<'de, [u8]>),
}

impl ScalarValue<'_> {
    /// Human-readable name of the scalar kind, used in mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            ScalarValue::Null => "null",
            ScalarValue::Bool(_) => "bool",
            ScalarValue::I64(_) => "integer",
            ScalarValue::U64(_) => "unsigned integer",
            ScalarValue::BigNumber(_) => "big number",
            ScalarValue::F64(_) => "double",
            ScalarValue::Str(_) => "string",
            ScalarValue::Bytes(_) => "byte string",
        }
    }
}

/// One atomic parsing outcome, in document order.
///
/// Container starts and ends nest correctly in any event stream produced by a
/// conforming parser; a parser that cannot guarantee that for its input fails
/// with a structural error instead.
#[derive(Clone, PartialEq)]
pub struct ParseEvent<'de> {
    /// What was parsed.
    pub kind: ParseEventKind<'de>,
    /// Where in the input it was parsed from.
    pub span: Span,
}

impl<'de> ParseEvent<'de> {
    /// Pair an event kind with its source span.
    pub const fn new(kind: ParseEventKind<'de>, span: Span) -> Self {
        ParseEvent { kind, span }
    }
}

impl fmt::Debug for ParseEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} @ {}", self.kind, self.span.offset)
    }
}

/// Event kind emitted by a format parser while streaming through a document.
#[derive(Clone, PartialEq)]
pub enum ParseEventKind<'de> {
    /// Beginning of an object.
    ObjectStart,
    /// End of an object.
    ObjectEnd,
    /// Beginning of an array.
    ArrayStart,
    /// End of an array.
    ArrayEnd,
    /// Object member key; always followed by exactly one value.
    Key(Cow<'de, str>),
    /// Scalar literal.
    Scalar(ScalarValue<'de>),
}

impl ParseEventKind<'_> {
    /// Human-readable name of the event kind, used in mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            ParseEventKind::ObjectStart => "object",
            ParseEventKind::ObjectEnd => "object end",
            ParseEventKind::ArrayStart => "array",
            ParseEventKind::ArrayEnd => "array end",
            ParseEventKind::Key(_) => "key",
            ParseEventKind::Scalar(value) => value.type_name(),
        }
    }
}

impl fmt::Debug for ParseEventKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseEventKind::ObjectStart => f.write_str("ObjectStart"),
            ParseEventKind::ObjectEnd => f.write_str("ObjectEnd"),
            ParseEventKind::ArrayStart => f.write_str("ArrayStart"),
            ParseEventKind::ArrayEnd => f.write_str("ArrayEnd"),
            ParseEventKind::Key(name) => f.debug_tuple("Key").field(name).finish(),
            ParseEventKind::Scalar(value) => f.debug_tuple("Scalar").field(value).finish(),
        }
    }
}
