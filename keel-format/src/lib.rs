#![deny(unsafe_code)]
#![deny(missing_docs, rustdoc::broken_intra_doc_links)]

//! Format-agnostic core for decoding self-describing binary documents.
//!
//! Every format crate (`keel-bson`, `keel-cbor`, `keel-ubjson`) implements the
//! [`FormatParser`] pull trait over a [`Source`] and emits the same
//! [`ParseEvent`] stream. Consumers pick one of two modes off that stream:
//! push a whole document into a [`Visitor`] via [`DocumentReader`], or drive
//! the cursor directly through the [`Decode`] trait to build a typed value
//! without materializing a document tree.

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

mod decode;
mod error;
mod event;
mod parser;
mod reader;
mod source;
mod visitor;

pub use decode::{ByteBuf, Decode, expect_event, mismatch, number_out_of_range};
pub use error::{DecodeError, ErrorKind, Position, SourceError};
pub use event::{ParseEvent, ParseEventKind, ScalarValue, Span};
pub use parser::{DEFAULT_MAX_NESTING_DEPTH, DecodeOptions, FormatParser, skip_value_by_events};
pub use reader::DocumentReader;
pub use source::{ReadSource, SliceSource, Source};
pub use visitor::{Visitor, feed_event};
