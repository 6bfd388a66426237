#![forbid(unsafe_code)]

//! BSON support for keel.
//!
//! This crate provides the BSON pull parser ([`BsonParser`]) and the two
//! decode paths over it: named `value_*` entry points that materialize a
//! dynamic [`Value`] through the push reader, and `from_*` entry points that
//! drive a typed [`Decode`] implementation straight off the cursor.
//!
//! ## Wire format
//!
//! The top level of a BSON stream is always a document. Supported element
//! types:
//!
//! | Type | Element                      | Event                |
//! |------|------------------------------|----------------------|
//! | 0x01 | double                       | double               |
//! | 0x02 | string                       | string               |
//! | 0x03 | embedded document            | object               |
//! | 0x04 | array (index keys discarded) | array                |
//! | 0x05 | binary (subtype dropped)     | byte string          |
//! | 0x08 | bool                         | bool                 |
//! | 0x09 | UTC datetime                 | signed integer       |
//! | 0x0A | null                         | null                 |
//! | 0x10 | int32                        | signed integer       |
//! | 0x11 | timestamp                    | unsigned integer     |
//! | 0x12 | int64                        | signed integer       |
//!
//! Anything else (regex, code, decimal128, …) fails with an unknown-type
//! error rather than being half-mapped. Declared document sizes are verified
//! against the bytes actually consumed.

/// Trace-level logging macro that forwards to `tracing::trace!` when the `tracing` feature is enabled.
#[cfg(feature = "tracing")]
#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)*) => {
        ::tracing::trace!($($arg)*)
    };
}

/// Trace-level logging macro (no-op when `tracing` feature is disabled).
#[cfg(not(feature = "tracing"))]
#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

/// Debug-level logging macro that forwards to `tracing::debug!` when the `tracing` feature is enabled.
#[cfg(feature = "tracing")]
#[allow(unused_macros)]
macro_rules! debug {
    ($($arg:tt)*) => {
        ::tracing::debug!($($arg)*)
    };
}

/// Debug-level logging macro (no-op when `tracing` feature is disabled).
#[cfg(not(feature = "tracing"))]
#[allow(unused_macros)]
macro_rules! debug {
    ($($arg:tt)*) => {};
}

#[allow(unused_imports)]
pub(crate) use debug;
#[allow(unused_imports)]
pub(crate) use trace;

mod parser;

use std::io::Read;

use bumpalo::Bump;
use keel_format::{Decode, DecodeOptions, DocumentReader, ReadSource, SliceSource};
use keel_value::{DocumentBuilder, Value};

pub use keel_format::DecodeError;
pub use parser::BsonParser;

/// Decode a typed value from BSON bytes.
///
/// # Example
///
/// ```
/// use std::collections::BTreeMap;
///
/// // {"a": 1}
/// let bytes = [0x0c, 0, 0, 0, 0x10, b'a', 0, 1, 0, 0, 0, 0x00];
/// let decoded: BTreeMap<String, i32> = keel_bson::from_slice(&bytes).unwrap();
/// assert_eq!(decoded["a"], 1);
/// ```
pub fn from_slice<'de, T: Decode<'de>>(input: &'de [u8]) -> Result<T, DecodeError> {
    from_slice_with_options(input, DecodeOptions::new())
}

/// Decode a typed value from BSON bytes with explicit options.
pub fn from_slice_with_options<'de, T: Decode<'de>>(
    input: &'de [u8],
    options: DecodeOptions,
) -> Result<T, DecodeError> {
    debug!("decoding bson value from {} byte slice", input.len());
    let mut parser = BsonParser::with_options(SliceSource::new(input), options);
    T::decode(&mut parser)
}

/// Decode a typed value from a BSON stream.
pub fn from_reader<T, R>(reader: R) -> Result<T, DecodeError>
where
    T: for<'de> Decode<'de>,
    R: Read,
{
    let mut parser = BsonParser::new(ReadSource::new(reader));
    T::decode(&mut parser)
}

/// Decode a typed value from a BSON stream, staging payloads in `arena`.
///
/// The arena must outlive the decoded value if the value borrows from it
/// (e.g. `Cow<str>` fields).
pub fn from_reader_in<'bump, T, R>(reader: R, arena: &'bump Bump) -> Result<T, DecodeError>
where
    T: Decode<'bump>,
    R: Read,
{
    let mut parser = BsonParser::new(ReadSource::new_in(reader, arena));
    T::decode(&mut parser)
}

/// Decode a dynamic [`Value`] from BSON bytes.
///
/// # Example
///
/// ```
/// use keel_value::Value;
///
/// // {"a": 1}
/// let bytes = [0x0c, 0, 0, 0, 0x10, b'a', 0, 1, 0, 0, 0, 0x00];
/// let value = keel_bson::value_from_slice(&bytes).unwrap();
/// assert_eq!(value["a"], Value::Int(1));
/// ```
pub fn value_from_slice(input: &[u8]) -> Result<Value, DecodeError> {
    value_from_slice_with_options(input, DecodeOptions::new())
}

/// Decode a dynamic [`Value`] from BSON bytes with explicit options.
pub fn value_from_slice_with_options(
    input: &[u8],
    options: DecodeOptions,
) -> Result<Value, DecodeError> {
    debug!("decoding bson document from {} byte slice", input.len());
    let parser = BsonParser::with_options(SliceSource::new(input), options);
    let mut builder = DocumentBuilder::new();
    DocumentReader::new(parser).read_to(&mut builder)?;
    Ok(builder.finish())
}

/// Decode a dynamic [`Value`] from a BSON stream.
pub fn value_from_reader<R: Read>(reader: R) -> Result<Value, DecodeError> {
    let parser = BsonParser::new(ReadSource::new(reader));
    let mut builder = DocumentBuilder::new();
    DocumentReader::new(parser).read_to(&mut builder)?;
    Ok(builder.finish())
}

/// Decode a dynamic [`Value`] from a BSON stream, staging payloads in
/// `arena`.
///
/// The result owns its data; the arena only backs transient scalar staging
/// and can be dropped (or reset) after this returns.
pub fn value_from_reader_in<R: Read>(reader: R, arena: &Bump) -> Result<Value, DecodeError> {
    let parser = BsonParser::new(ReadSource::new_in(reader, arena));
    let mut builder = DocumentBuilder::new();
    DocumentReader::new(parser).read_to(&mut builder)?;
    Ok(builder.finish())
}
