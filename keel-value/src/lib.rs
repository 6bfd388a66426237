#![deny(unsafe_code)]
#![deny(missing_docs, rustdoc::broken_intra_doc_links)]

//! Dynamic document value for keel.
//!
//! [`Value`] represents one decoded document: scalars, byte strings, arrays,
//! and insertion-ordered objects. It is built incrementally through
//! `keel-format`'s visitor protocol by [`DocumentBuilder`], and implements
//! `Decode` so typed structures can keep "any value" fields without leaving
//! the typed decoding path.

mod builder;
mod value;

mod decode;

pub use builder::DocumentBuilder;
pub use value::Value;

/// Ordered object storage: document key order is preserved, duplicate keys
/// keep their first position with the last value winning.
pub type Object = indexmap::IndexMap<String, Value>;
