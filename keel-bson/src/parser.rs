//! BSON parser implementing `FormatParser`.

use std::borrow::Cow;

use keel_format::{
    DecodeError, DecodeOptions, ErrorKind, FormatParser, ParseEvent, ParseEventKind, Position,
    ScalarValue, SliceSource, Source, Span, skip_value_by_events,
};

const FORMAT: &str = "bson";

// BSON element types
const BSON_DOUBLE: u8 = 0x01;
const BSON_STRING: u8 = 0x02;
const BSON_DOCUMENT: u8 = 0x03;
const BSON_ARRAY: u8 = 0x04;
const BSON_BINARY: u8 = 0x05;
const BSON_BOOL: u8 = 0x08;
const BSON_DATETIME: u8 = 0x09;
const BSON_NULL: u8 = 0x0a;
const BSON_INT32: u8 = 0x10;
const BSON_TIMESTAMP: u8 = 0x11;
const BSON_INT64: u8 = 0x12;

const BSON_TERMINATOR: u8 = 0x00;

/// Smallest well-formed document: the 4 length bytes plus the terminator.
const MIN_DOCUMENT_LEN: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocKind {
    Object,
    Array,
}

/// One in-progress document (embedded documents and arrays share the same
/// framing on the wire).
#[derive(Debug, Clone, Copy)]
struct Frame {
    kind: DocKind,
    /// Offset of the document's length prefix.
    start: usize,
    /// Offset just past the document's terminator, per the declared length.
    end: usize,
    /// Element type whose key was just emitted; its value is parsed next.
    pending_type: Option<u8>,
}

/// BSON pull parser over any byte source.
///
/// The top level of a BSON stream is always a document, so the first event is
/// always `ObjectStart`. Array documents carry index keys on the wire; they
/// are consumed and discarded.
pub struct BsonParser<'de, S> {
    source: S,
    options: DecodeOptions,
    stack: Vec<Frame>,
    event_peek: Option<ParseEvent<'de>>,
    done: bool,
}

impl<'de> BsonParser<'de, SliceSource<'de>> {
    /// Parser over an in-memory buffer.
    pub fn from_slice(input: &'de [u8]) -> Self {
        BsonParser::new(SliceSource::new(input))
    }
}

impl<'de, S: Source<'de>> BsonParser<'de, S> {
    /// Parser over any byte source, with default options.
    pub fn new(source: S) -> Self {
        BsonParser::with_options(source, DecodeOptions::new())
    }

    /// Parser over any byte source, with explicit options.
    pub fn with_options(source: S, options: DecodeOptions) -> Self {
        BsonParser {
            source,
            options,
            stack: Vec::new(),
            event_peek: None,
            done: false,
        }
    }

    fn err(&self, kind: ErrorKind, offset: usize) -> DecodeError {
        DecodeError::new(kind, FORMAT, Position::new(offset))
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        self.source
            .read_u8()
            .map_err(|e| DecodeError::from_source(e, FORMAT))
    }

    fn read_exact(&mut self, n: usize) -> Result<Cow<'de, [u8]>, DecodeError> {
        self.source
            .read_exact(n)
            .map_err(|e| DecodeError::from_source(e, FORMAT))
    }

    fn read_i32(&mut self) -> Result<i32, DecodeError> {
        let bytes = self.read_exact(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_i64(&mut self) -> Result<i64, DecodeError> {
        let bytes = self.read_exact(8)?;
        Ok(i64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }

    fn read_u64(&mut self) -> Result<u64, DecodeError> {
        let bytes = self.read_exact(8)?;
        Ok(u64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }

    fn read_f64(&mut self) -> Result<f64, DecodeError> {
        let bytes = self.read_exact(8)?;
        Ok(f64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }

    /// Read a NUL-terminated key, without UTF-8 validation.
    fn read_cstring_bytes(&mut self) -> Result<Vec<u8>, DecodeError> {
        let mut bytes = Vec::new();
        loop {
            let byte = self.read_u8()?;
            if byte == BSON_TERMINATOR {
                return Ok(bytes);
            }
            bytes.push(byte);
        }
    }

    /// Open a document: length prefix, frame push, start event.
    fn open_document(&mut self, kind: DocKind, start: usize) -> Result<ParseEvent<'de>, DecodeError> {
        let len = self.read_i32()?;
        if len < MIN_DOCUMENT_LEN {
            return Err(self.err(ErrorKind::LengthCannotBeNegative, start));
        }
        if self.stack.len() >= self.options.max_nesting_depth {
            return Err(self.err(
                ErrorKind::MaxDepthExceeded {
                    limit: self.options.max_nesting_depth,
                },
                start,
            ));
        }
        self.stack.push(Frame {
            kind,
            start,
            end: start + len as usize,
            pending_type: None,
        });
        let event_kind = match kind {
            DocKind::Object => ParseEventKind::ObjectStart,
            DocKind::Array => ParseEventKind::ArrayStart,
        };
        Ok(self.event(event_kind, start))
    }

    /// Close the current document, verifying the declared length.
    fn close_document(&mut self, frame: Frame, start: usize) -> Result<ParseEvent<'de>, DecodeError> {
        let actual = self.source.position();
        if actual != frame.end {
            return Err(self.err(
                ErrorKind::DocumentSizeMismatch {
                    declared: frame.end - frame.start,
                    actual: actual - frame.start,
                },
                start,
            ));
        }
        self.stack.pop();
        if self.stack.is_empty() {
            self.done = true;
        }
        let event_kind = match frame.kind {
            DocKind::Object => ParseEventKind::ObjectEnd,
            DocKind::Array => ParseEventKind::ArrayEnd,
        };
        Ok(self.event(event_kind, start))
    }

    fn event(&self, kind: ParseEventKind<'de>, start: usize) -> ParseEvent<'de> {
        ParseEvent::new(
            kind,
            Span::new(start, self.source.position().saturating_sub(start)),
        )
    }

    /// Parse one element value of the given type, emitting its event.
    fn parse_value(&mut self, element_type: u8, start: usize) -> Result<ParseEvent<'de>, DecodeError> {
        let scalar = match element_type {
            BSON_DOUBLE => ScalarValue::F64(self.read_f64()?),
            BSON_STRING => ScalarValue::Str(self.read_string(start)?),
            BSON_DOCUMENT => return self.open_document(DocKind::Object, start),
            BSON_ARRAY => return self.open_document(DocKind::Array, start),
            BSON_BINARY => {
                let len = self.read_i32()?;
                if len < 0 {
                    return Err(self.err(ErrorKind::LengthCannotBeNegative, start));
                }
                // Subtype byte is consumed and not surfaced; the event set
                // carries plain byte strings.
                self.read_u8()?;
                ScalarValue::Bytes(self.read_exact(len as usize)?)
            }
            BSON_BOOL => ScalarValue::Bool(self.read_u8()? != 0),
            BSON_DATETIME => ScalarValue::I64(self.read_i64()?),
            BSON_NULL => ScalarValue::Null,
            BSON_INT32 => ScalarValue::I64(i64::from(self.read_i32()?)),
            BSON_TIMESTAMP => ScalarValue::U64(self.read_u64()?),
            BSON_INT64 => ScalarValue::I64(self.read_i64()?),
            tag => return Err(self.err(ErrorKind::UnknownTypeTag { tag }, start)),
        };
        Ok(self.event(ParseEventKind::Scalar(scalar), start))
    }

    /// Length-prefixed string: i32 byte count including the trailing NUL.
    fn read_string(&mut self, start: usize) -> Result<Cow<'de, str>, DecodeError> {
        let len = self.read_i32()?;
        if len < 1 {
            return Err(self.err(ErrorKind::LengthCannotBeNegative, start));
        }
        let at = self.source.position();
        let bytes = self.read_exact(len as usize - 1)?;
        let text = match bytes {
            Cow::Borrowed(bytes) => std::str::from_utf8(bytes)
                .map(Cow::Borrowed)
                .map_err(|_| self.err(ErrorKind::InvalidUtf8, at))?,
            Cow::Owned(bytes) => String::from_utf8(bytes)
                .map(Cow::Owned)
                .map_err(|_| self.err(ErrorKind::InvalidUtf8, at))?,
        };
        self.read_u8()?; // trailing NUL
        Ok(text)
    }

    /// Seek past one pending element value using the wire's length prefixes.
    fn skip_payload(&mut self, element_type: u8, start: usize) -> Result<(), DecodeError> {
        match element_type {
            BSON_DOUBLE | BSON_DATETIME | BSON_TIMESTAMP | BSON_INT64 => {
                self.read_exact(8)?;
            }
            BSON_NULL => {}
            BSON_BOOL => {
                self.read_u8()?;
            }
            BSON_INT32 => {
                self.read_exact(4)?;
            }
            BSON_STRING => {
                let len = self.read_i32()?;
                if len < 1 {
                    return Err(self.err(ErrorKind::LengthCannotBeNegative, start));
                }
                self.read_exact(len as usize)?;
            }
            BSON_BINARY => {
                let len = self.read_i32()?;
                if len < 0 {
                    return Err(self.err(ErrorKind::LengthCannotBeNegative, start));
                }
                self.read_u8()?;
                self.read_exact(len as usize)?;
            }
            BSON_DOCUMENT | BSON_ARRAY => {
                let len = self.read_i32()?;
                if len < MIN_DOCUMENT_LEN {
                    return Err(self.err(ErrorKind::LengthCannotBeNegative, start));
                }
                self.read_exact(len as usize - 4)?;
            }
            tag => return Err(self.err(ErrorKind::UnknownTypeTag { tag }, start)),
        }
        Ok(())
    }

    fn produce_event(&mut self) -> Result<Option<ParseEvent<'de>>, DecodeError> {
        if self.done {
            return Ok(None);
        }

        let start = self.source.position();

        let Some(frame) = self.stack.last().copied() else {
            // Root: a BSON stream is one document.
            return self.open_document(DocKind::Object, start).map(Some);
        };

        if let Some(element_type) = frame.pending_type {
            if let Some(frame) = self.stack.last_mut() {
                frame.pending_type = None;
            }
            return self.parse_value(element_type, start).map(Some);
        }

        let element_type = self.read_u8()?;
        if element_type == BSON_TERMINATOR {
            return self.close_document(frame, start).map(Some);
        }

        match frame.kind {
            DocKind::Object => {
                let key_at = self.source.position();
                let key_bytes = self.read_cstring_bytes()?;
                let key = String::from_utf8(key_bytes)
                    .map_err(|_| self.err(ErrorKind::InvalidUtf8, key_at))?;
                if let Some(frame) = self.stack.last_mut() {
                    frame.pending_type = Some(element_type);
                }
                Ok(Some(self.event(ParseEventKind::Key(Cow::Owned(key)), start)))
            }
            DocKind::Array => {
                // Array documents carry index keys; discard them.
                self.read_cstring_bytes()?;
                self.parse_value(element_type, self.source.position()).map(Some)
            }
        }
    }
}

impl<'de, S: Source<'de>> FormatParser<'de> for BsonParser<'de, S> {
    fn next_event(&mut self) -> Result<Option<ParseEvent<'de>>, DecodeError> {
        if let Some(event) = self.event_peek.take() {
            return Ok(Some(event));
        }
        self.produce_event()
    }

    fn peek_event(&mut self) -> Result<Option<ParseEvent<'de>>, DecodeError> {
        if let Some(event) = self.event_peek.clone() {
            return Ok(Some(event));
        }
        let event = self.produce_event()?;
        self.event_peek.clone_from(&event);
        Ok(event)
    }

    fn position(&self) -> Position {
        Position::new(self.source.position())
    }

    fn format_name(&self) -> &'static str {
        FORMAT
    }

    /// Native skip: when an element value is pending, seek past it via the
    /// wire's length prefixes instead of parsing (skips string validation and
    /// event construction for whole subtrees).
    fn skip_value(&mut self) -> Result<(), DecodeError> {
        if self.event_peek.is_none() {
            if let Some(frame) = self.stack.last().copied() {
                if let Some(element_type) = frame.pending_type {
                    if let Some(frame) = self.stack.last_mut() {
                        frame.pending_type = None;
                    }
                    let start = self.source.position();
                    return self.skip_payload(element_type, start);
                }
            }
        }
        skip_value_by_events(self)
    }
}
