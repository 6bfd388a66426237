//! The push side of the decoding core: the structural visitor protocol.

use crate::event::{ParseEvent, ParseEventKind, ScalarValue};

/// Consumer of structural events.
///
/// This is the sole coupling surface between format parsers and destination
/// types: any visitor can be driven by any format, through
/// [`DocumentReader`](crate::DocumentReader) or by pumping a cursor's events
/// with [`feed_event`]. Callbacks arrive in document order with correctly
/// nested container begin/end pairs; the parser enforces that, so visitors
/// don't have to.
pub trait Visitor {
    /// An object begins.
    fn begin_object(&mut self);
    /// The current object ends.
    fn end_object(&mut self);
    /// An array begins.
    fn begin_array(&mut self);
    /// The current array ends.
    fn end_array(&mut self);
    /// An object member key; always followed by exactly one value.
    fn key(&mut self, name: &str);
    /// A text string value.
    fn string_value(&mut self, value: &str);
    /// A binary value.
    fn bytes_value(&mut self, value: &[u8]);
    /// A signed integer value.
    fn int_value(&mut self, value: i64);
    /// An unsigned integer value.
    fn uint_value(&mut self, value: u64);
    /// An arbitrary-precision number as decimal text.
    fn bignum_value(&mut self, value: &str);
    /// A floating-point value.
    fn double_value(&mut self, value: f64);
    /// A boolean value.
    fn bool_value(&mut self, value: bool);
    /// A null value.
    fn null_value(&mut self);
}

/// Forward one parse event to a visitor.
pub fn feed_event<V: Visitor>(visitor: &mut V, event: &ParseEvent<'_>) {
    match &event.kind {
        ParseEventKind::ObjectStart => visitor.begin_object(),
        ParseEventKind::ObjectEnd => visitor.end_object(),
        ParseEventKind::ArrayStart => visitor.begin_array(),
        ParseEventKind::ArrayEnd => visitor.end_array(),
        ParseEventKind::Key(name) => visitor.key(name),
        ParseEventKind::Scalar(value) => match value {
            ScalarValue::Null => visitor.null_value(),
            ScalarValue::Bool(v) => visitor.bool_value(*v),
            ScalarValue::I64(v) => visitor.int_value(*v),
            ScalarValue::U64(v) => visitor.uint_value(*v),
            ScalarValue::BigNumber(v) => visitor.bignum_value(v),
            ScalarValue::F64(v) => visitor.double_value(*v),
            ScalarValue::Str(v) => visitor.string_value(v),
            ScalarValue::Bytes(v) => visitor.bytes_value(v),
        },
    }
}
