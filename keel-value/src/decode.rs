//! `Decode` for `Value`: the type-erased fallback inside the typed path.

use keel_format::{
    Decode, DecodeError, FormatParser, ParseEventKind, expect_event, feed_event, mismatch,
};

use crate::{DocumentBuilder, Value};

impl<'de> Decode<'de> for Value {
    /// Consume exactly one value's events and materialize it.
    ///
    /// This is what keeps heterogeneous "any value" fields representable
    /// inside otherwise strongly-typed structures: a typed `Decode` impl
    /// delegates one subtree to `Value::decode` and continues.
    fn decode<P: FormatParser<'de>>(parser: &mut P) -> Result<Self, DecodeError> {
        let mut builder = DocumentBuilder::new();
        let event = expect_event(parser)?;
        let mut depth = match event.kind {
            ParseEventKind::ObjectStart | ParseEventKind::ArrayStart => 1usize,
            ParseEventKind::Scalar(_) => 0,
            ref kind => return Err(mismatch(parser, "value", kind.type_name())),
        };
        feed_event(&mut builder, &event);
        while depth > 0 {
            let event = expect_event(parser)?;
            match event.kind {
                ParseEventKind::ObjectStart | ParseEventKind::ArrayStart => depth += 1,
                ParseEventKind::ObjectEnd | ParseEventKind::ArrayEnd => depth -= 1,
                _ => {}
            }
            feed_event(&mut builder, &event);
        }
        Ok(builder.finish())
    }
}
