#![forbid(unsafe_code)]

//! UBJSON support for keel.
//!
//! This crate provides the UBJSON pull parser ([`UbjsonParser`]) and the two
//! decode paths over it: named `value_*` entry points that materialize a
//! dynamic [`Value`] through the push reader, and `from_*` entry points that
//! drive a typed [`Decode`] implementation straight off the cursor.
//!
//! ## Wire format
//!
//! | Kind      | Markers                                            |
//! |-----------|----------------------------------------------------|
//! | Null      | `Z`                                                |
//! | No-op     | `N` (skipped wherever a marker is expected)        |
//! | Bool      | `T`, `F`                                           |
//! | Integer   | `i` (i8), `U` (u8), `I` (i16), `l` (i32), `L` (i64)|
//! | Float     | `d` (f32), `D` (f64)                               |
//! | Big number| `H` (length-prefixed decimal text)                 |
//! | Char      | `C`                                                |
//! | String    | `S` (length-prefixed)                              |
//! | Array     | `[` … `]`, optional `$type` `#count`               |
//! | Object    | `{` … `}`, optional `$type` `#count`               |
//!
//! A container with a `$` element type must declare a `#` count; counted
//! containers have no close marker. Lengths and counts must be integer-typed
//! and non-negative.

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
use keel_format::{Decode, DecodeOptions, DocumentReader, ReadSource};
use keel_value::{DocumentBuilder, Value};

pub use keel_format::DecodeError;
pub use parser::UbjsonParser;

/// Decode a typed value from UBJSON bytes.
///
/// # Example
///
/// ```
/// use std::collections::BTreeMap;
///
/// // {"a": 1}
/// let bytes = [b'{', b'i', 1, b'a', b'i', 1, b'}'];
/// let decoded: BTreeMap<String, i64> = keel_ubjson::from_slice(&bytes).unwrap();
/// assert_eq!(decoded["a"], 1);
/// ```
pub fn from_slice<'de, T: Decode<'de>>(input: &'de [u8]) -> Result<T, DecodeError> {
    from_slice_with_options(input, DecodeOptions::new())
}

/// Decode a typed value from UBJSON bytes with explicit options.
pub fn from_slice_with_options<'de, T: Decode<'de>>(
    input: &'de [u8],
    options: DecodeOptions,
) -> Result<T, DecodeError> {
    debug!("decoding ubjson value from {} byte slice", input.len());
    let mut parser = UbjsonParser::with_options(keel_format::SliceSource::new(input), options);
    T::decode(&mut parser)
}

/// Decode a typed value from a UBJSON stream.
pub fn from_reader<T, R>(reader: R) -> Result<T, DecodeError>
where
    T: for<'de> Decode<'de>,
    R: Read,
{
    let mut parser = UbjsonParser::new(ReadSource::new(reader));
    T::decode(&mut parser)
}

/// Decode a typed value from a UBJSON stream, staging payloads in `arena`.
///
/// The arena must outlive the decoded value if the value borrows from it
/// (e.g. `Cow<str>` fields).
pub fn from_reader_in<'bump, T, R>(reader: R, arena: &'bump Bump) -> Result<T, DecodeError>
where
    T: Decode<'bump>,
    R: Read,
{
    let mut parser = UbjsonParser::new(ReadSource::new_in(reader, arena));
    T::decode(&mut parser)
}

/// Decode a dynamic [`Value`] from UBJSON bytes.
///
/// # Example
///
/// ```
/// use keel_value::Value;
///
/// // [true, false]
/// let bytes = [b'[', b'T', b'F', b']'];
/// let value = keel_ubjson::value_from_slice(&bytes).unwrap();
/// assert_eq!(value[0], Value::Bool(true));
/// assert_eq!(value[1], Value::Bool(false));
/// ```
pub fn value_from_slice(input: &[u8]) -> Result<Value, DecodeError> {
    value_from_slice_with_options(input, DecodeOptions::new())
}

/// Decode a dynamic [`Value`] from UBJSON bytes with explicit options.
pub fn value_from_slice_with_options(
    input: &[u8],
    options: DecodeOptions,
) -> Result<Value, DecodeError> {
    debug!("decoding ubjson document from {} byte slice", input.len());
    let parser = UbjsonParser::with_options(keel_format::SliceSource::new(input), options);
    let mut builder = DocumentBuilder::new();
    DocumentReader::new(parser).read_to(&mut builder)?;
    Ok(builder.finish())
}

/// Decode a dynamic [`Value`] from a UBJSON stream.
pub fn value_from_reader<R: Read>(reader: R) -> Result<Value, DecodeError> {
    let parser = UbjsonParser::new(ReadSource::new(reader));
    let mut builder = DocumentBuilder::new();
    DocumentReader::new(parser).read_to(&mut builder)?;
    Ok(builder.finish())
}

/// Decode a dynamic [`Value`] from a UBJSON stream, staging payloads in
/// `arena`.
///
/// The result owns its data; the arena only backs transient scalar staging
/// and can be dropped (or reset) after this returns.
pub fn value_from_reader_in<R: Read>(reader: R, arena: &Bump) -> Result<Value, DecodeError> {
    let parser = UbjsonParser::new(ReadSource::new_in(reader, arena));
    let mut builder = DocumentBuilder::new();
    DocumentReader::new(parser).read_to(&mut builder)?;
    Ok(builder.finish())
}
