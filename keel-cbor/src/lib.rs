#![forbid(unsafe_code)]

//! CBOR support for keel.
//!
//! This crate provides the CBOR pull parser ([`CborParser`]) and the two
//! decode paths over it: named `value_*` entry points that materialize a
//! dynamic [`Value`] through the push reader, and `from_*` entry points that
//! drive a typed [`Decode`] implementation straight off the cursor.
//!
//! ## Wire format
//!
//! The full RFC 8949 data model minus semantic-tag preservation:
//!
//! - definite and indefinite arrays, maps, byte strings and text strings
//!   (indefinite strings are assembled from their chunks);
//! - half-, single- and double-precision floats, all surfaced as doubles;
//! - bignum tags 2/3, surfaced as decimal text; every other semantic tag is
//!   transparent and the tagged item is parsed normally;
//! - `undefined` is surfaced as null; unassigned simple values are rejected;
//! - integer map keys are stringified in decimal, other non-text keys are
//!   rejected.

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
pub use parser::CborParser;

/// Decode a typed value from CBOR bytes.
///
/// # Example
///
/// ```
/// // [1, 2, 3]
/// let bytes = [0x83, 0x01, 0x02, 0x03];
/// let decoded: Vec<u32> = keel_cbor::from_slice(&bytes).unwrap();
/// assert_eq!(decoded, [1, 2, 3]);
/// ```
pub fn from_slice<'de, T: Decode<'de>>(input: &'de [u8]) -> Result<T, DecodeError> {
    from_slice_with_options(input, DecodeOptions::new())
}

/// Decode a typed value from CBOR bytes with explicit options.
pub fn from_slice_with_options<'de, T: Decode<'de>>(
    input: &'de [u8],
    options: DecodeOptions,
) -> Result<T, DecodeError> {
    debug!("decoding cbor value from {} byte slice", input.len());
    let mut parser = CborParser::with_options(SliceSource::new(input), options);
    T::decode(&mut parser)
}

/// Decode a typed value from a CBOR stream.
pub fn from_reader<T, R>(reader: R) -> Result<T, DecodeError>
where
    T: for<'de> Decode<'de>,
    R: Read,
{
    let mut parser = CborParser::new(ReadSource::new(reader));
    T::decode(&mut parser)
}

/// Decode a typed value from a CBOR stream, staging payloads in `arena`.
///
/// The arena must outlive the decoded value if the value borrows from it
/// (e.g. `Cow<str>` fields).
pub fn from_reader_in<'bump, T, R>(reader: R, arena: &'bump Bump) -> Result<T, DecodeError>
where
    T: Decode<'bump>,
    R: Read,
{
    let mut parser = CborParser::new(ReadSource::new_in(reader, arena));
    T::decode(&mut parser)
}

/// Decode a dynamic [`Value`] from CBOR bytes.
///
/// # Example
///
/// ```
/// use keel_value::Value;
///
/// // {"a": 1}
/// let bytes = [0xa1, 0x61, b'a', 0x01];
/// let value = keel_cbor::value_from_slice(&bytes).unwrap();
/// assert_eq!(value["a"], Value::Uint(1));
/// ```
pub fn value_from_slice(input: &[u8]) -> Result<Value, DecodeError> {
    value_from_slice_with_options(input, DecodeOptions::new())
}

/// Decode a dynamic [`Value`] from CBOR bytes with explicit options.
pub fn value_from_slice_with_options(
    input: &[u8],
    options: DecodeOptions,
) -> Result<Value, DecodeError> {
    debug!("decoding cbor document from {} byte slice", input.len());
    let parser = CborParser::with_options(SliceSource::new(input), options);
    let mut builder = DocumentBuilder::new();
    DocumentReader::new(parser).read_to(&mut builder)?;
    Ok(builder.finish())
}

/// Decode a dynamic [`Value`] from a CBOR stream.
pub fn value_from_reader<R: Read>(reader: R) -> Result<Value, DecodeError> {
    let parser = CborParser::new(ReadSource::new(reader));
    let mut builder = DocumentBuilder::new();
    DocumentReader::new(parser).read_to(&mut builder)?;
    Ok(builder.finish())
}

/// Decode a dynamic [`Value`] from a CBOR stream, staging payloads in
/// `arena`.
///
/// The result owns its data; the arena only backs transient scalar staging
/// and can be dropped (or reset) after this returns.
pub fn value_from_reader_in<R: Read>(reader: R, arena: &Bump) -> Result<Value, DecodeError> {
    let parser = CborParser::new(ReadSource::new_in(reader, arena));
    let mut builder = DocumentBuilder::new();
    DocumentReader::new(parser).read_to(&mut builder)?;
    Ok(builder.finish())
}
