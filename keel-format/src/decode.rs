//! Typed deserialization directly off a cursor.
//!
//! [`Decode`] is the per-type counterpart of the visitor protocol: instead of
//! materializing a document tree, a type consumes a parser's events itself.
//! `keel-value` implements `Decode` for its `Value`, which doubles as the
//! type-erased fallback for dynamic fields embedded in typed structures.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use crate::error::{DecodeError, ErrorKind};
use crate::event::{ParseEvent, ParseEventKind, ScalarValue};
use crate::parser::FormatParser;

/// A type that can be built directly from a cursor's structural events.
///
/// Implementations must advance the parser past exactly the one value they
/// consume, and must surface every structural mismatch as an error — never a
/// silent default.
pub trait Decode<'de>: Sized {
    /// Consume one value from `parser` and build `Self`.
    fn decode<P: FormatParser<'de>>(parser: &mut P) -> Result<Self, DecodeError>;
}

/// Pull the next event, failing with [`ErrorKind::UnexpectedEof`] if the
/// stream is exhausted. The usual first step of a `Decode` implementation.
pub fn expect_event<'de, P: FormatParser<'de>>(
    parser: &mut P,
) -> Result<ParseEvent<'de>, DecodeError> {
    parser.next_event()?.ok_or_else(|| {
        DecodeError::new(
            ErrorKind::UnexpectedEof,
            parser.format_name(),
            parser.position(),
        )
    })
}

/// Structural mismatch error at the parser's current position.
pub fn mismatch<'de, P: FormatParser<'de>>(
    parser: &P,
    expected: &'static str,
    found: &'static str,
) -> DecodeError {
    DecodeError::new(
        ErrorKind::Mismatch { expected, found },
        parser.format_name(),
        parser.position(),
    )
}

/// Range error for a numeric value that does not fit the destination type.
pub fn number_out_of_range<'de, P: FormatParser<'de>>(
    parser: &P,
    value: impl ToString,
    target: &'static str,
) -> DecodeError {
    DecodeError::new(
        ErrorKind::NumberOutOfRange {
            value: value.to_string(),
            target,
        },
        parser.format_name(),
        parser.position(),
    )
}

macro_rules! impl_decode_int {
    ($($ty:ty),* $(,)?) => {$(
        impl<'de> Decode<'de> for $ty {
            fn decode<P: FormatParser<'de>>(parser: &mut P) -> Result<Self, DecodeError> {
                let event = expect_event(parser)?;
                match event.kind {
                    ParseEventKind::Scalar(ScalarValue::I64(v)) => <$ty>::try_from(v)
                        .map_err(|_| number_out_of_range(parser, v, stringify!($ty))),
                    ParseEventKind::Scalar(ScalarValue::U64(v)) => <$ty>::try_from(v)
                        .map_err(|_| number_out_of_range(parser, v, stringify!($ty))),
                    kind => Err(mismatch(parser, "integer", kind.type_name())),
                }
            }
        }
    )*};
}

impl_decode_int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl<'de> Decode<'de> for bool {
    fn decode<P: FormatParser<'de>>(parser: &mut P) -> Result<Self, DecodeError> {
        let event = expect_event(parser)?;
        match event.kind {
            ParseEventKind::Scalar(ScalarValue::Bool(v)) => Ok(v),
            kind => Err(mismatch(parser, "bool", kind.type_name())),
        }
    }
}

impl<'de> Decode<'de> for f64 {
    fn decode<P: FormatParser<'de>>(parser: &mut P) -> Result<Self, DecodeError> {
        let event = expect_event(parser)?;
        match event.kind {
            ParseEventKind::Scalar(ScalarValue::F64(v)) => Ok(v),
            ParseEventKind::Scalar(ScalarValue::I64(v)) => Ok(v as f64),
            ParseEventKind::Scalar(ScalarValue::U64(v)) => Ok(v as f64),
            kind => Err(mismatch(parser, "double", kind.type_name())),
        }
    }
}

impl<'de> Decode<'de> for f32 {
    fn decode<P: FormatParser<'de>>(parser: &mut P) -> Result<Self, DecodeError> {
        f64::decode(parser).map(|v| v as f32)
    }
}

impl<'de> Decode<'de> for String {
    fn decode<P: FormatParser<'de>>(parser: &mut P) -> Result<Self, DecodeError> {
        let event = expect_event(parser)?;
        match event.kind {
            ParseEventKind::Scalar(ScalarValue::Str(v)) => Ok(v.into_owned()),
            kind => Err(mismatch(parser, "string", kind.type_name())),
        }
    }
}

impl<'de> Decode<'de> for Cow<'de, str> {
    fn decode<P: FormatParser<'de>>(parser: &mut P) -> Result<Self, DecodeError> {
        let event = expect_event(parser)?;
        match event.kind {
            ParseEventKind::Scalar(ScalarValue::Str(v)) => Ok(v),
            kind => Err(mismatch(parser, "string", kind.type_name())),
        }
    }
}

impl<'de> Decode<'de> for char {
    fn decode<P: FormatParser<'de>>(parser: &mut P) -> Result<Self, DecodeError> {
        let event = expect_event(parser)?;
        match event.kind {
            ParseEventKind::Scalar(ScalarValue::Str(v)) => {
                let mut chars = v.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(c),
                    _ => Err(mismatch(parser, "single-character string", "string")),
                }
            }
            kind => Err(mismatch(parser, "single-character string", kind.type_name())),
        }
    }
}

/// Owned byte-string wrapper.
///
/// `Vec<u8>` decodes element-wise from arrays; `ByteBuf` decodes from the
/// formats' native byte-string scalars.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ByteBuf(pub Vec<u8>);

impl ByteBuf {
    /// Unwrap into the underlying bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for ByteBuf {
    fn from(bytes: Vec<u8>) -> Self {
        ByteBuf(bytes)
    }
}

impl AsRef<[u8]> for ByteBuf {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<'de> Decode<'de> for ByteBuf {
    fn decode<P: FormatParser<'de>>(parser: &mut P) -> Result<Self, DecodeError> {
        let event = expect_event(parser)?;
        match event.kind {
            ParseEventKind::Scalar(ScalarValue::Bytes(v)) => Ok(ByteBuf(v.into_owned())),
            kind => Err(mismatch(parser, "byte string", kind.type_name())),
        }
    }
}

impl<'de, T: Decode<'de>> Decode<'de> for Option<T> {
    fn decode<P: FormatParser<'de>>(parser: &mut P) -> Result<Self, DecodeError> {
        match parser.peek_event()? {
            Some(event) if matches!(event.kind, ParseEventKind::Scalar(ScalarValue::Null)) => {
                parser.next_event()?;
                Ok(None)
            }
            _ => T::decode(parser).map(Some),
        }
    }
}

impl<'de, T: Decode<'de>> Decode<'de> for Box<T> {
    fn decode<P: FormatParser<'de>>(parser: &mut P) -> Result<Self, DecodeError> {
        T::decode(parser).map(Box::new)
    }
}

impl<'de, T: Decode<'de>> Decode<'de> for Vec<T> {
    fn decode<P: FormatParser<'de>>(parser: &mut P) -> Result<Self, DecodeError> {
        let event = expect_event(parser)?;
        if !matches!(event.kind, ParseEventKind::ArrayStart) {
            return Err(mismatch(parser, "array", event.kind.type_name()));
        }
        let mut items = Vec::new();
        loop {
            match parser.peek_event()? {
                None => {
                    return Err(DecodeError::new(
                        ErrorKind::UnexpectedEof,
                        parser.format_name(),
                        parser.position(),
                    ));
                }
                Some(event) if matches!(event.kind, ParseEventKind::ArrayEnd) => {
                    parser.next_event()?;
                    return Ok(items);
                }
                Some(_) => items.push(T::decode(parser)?),
            }
        }
    }
}

fn decode_map_entries<'de, P, V, F>(parser: &mut P, mut insert: F) -> Result<(), DecodeError>
where
    P: FormatParser<'de>,
    V: Decode<'de>,
    F: FnMut(String, V),
{
    let event = expect_event(parser)?;
    if !matches!(event.kind, ParseEventKind::ObjectStart) {
        return Err(mismatch(parser, "object", event.kind.type_name()));
    }
    loop {
        let Some(event) = parser.next_event()? else {
            return Err(DecodeError::new(
                ErrorKind::UnexpectedEof,
                parser.format_name(),
                parser.position(),
            ));
        };
        match event.kind {
            ParseEventKind::ObjectEnd => return Ok(()),
            ParseEventKind::Key(name) => {
                let value = V::decode(parser)?;
                insert(name.into_owned(), value);
            }
            kind => return Err(mismatch(parser, "key", kind.type_name())),
        }
    }
}

impl<'de, V: Decode<'de>> Decode<'de> for BTreeMap<String, V> {
    fn decode<P: FormatParser<'de>>(parser: &mut P) -> Result<Self, DecodeError> {
        let mut map = BTreeMap::new();
        decode_map_entries(parser, |key, value| {
            map.insert(key, value);
        })?;
        Ok(map)
    }
}

impl<'de, V: Decode<'de>> Decode<'de> for HashMap<String, V> {
    fn decode<P: FormatParser<'de>>(parser: &mut P) -> Result<Self, DecodeError> {
        let mut map = HashMap::new();
        decode_map_entries(parser, |key, value| {
            map.insert(key, value);
        })?;
        Ok(map)
    }
}
