//! UBJSON parser implementing `FormatParser`.

use std::borrow::Cow;

use keel_format::{
    DecodeError, DecodeOptions, ErrorKind, FormatParser, ParseEvent, ParseEventKind, Position,
    ScalarValue, SliceSource, Source, Span,
};

const FORMAT: &str = "ubjson";

// UBJSON markers
const UBJSON_NULL: u8 = b'Z';
const UBJSON_NOOP: u8 = b'N';
const UBJSON_TRUE: u8 = b'T';
const UBJSON_FALSE: u8 = b'F';
const UBJSON_INT8: u8 = b'i';
const UBJSON_UINT8: u8 = b'U';
const UBJSON_INT16: u8 = b'I';
const UBJSON_INT32: u8 = b'l';
const UBJSON_INT64: u8 = b'L';
const UBJSON_FLOAT32: u8 = b'd';
const UBJSON_FLOAT64: u8 = b'D';
const UBJSON_HIGH_PRECISION: u8 = b'H';
const UBJSON_CHAR: u8 = b'C';
const UBJSON_STRING: u8 = b'S';
const UBJSON_ARRAY_OPEN: u8 = b'[';
const UBJSON_ARRAY_CLOSE: u8 = b']';
const UBJSON_OBJECT_OPEN: u8 = b'{';
const UBJSON_OBJECT_CLOSE: u8 = b'}';
const UBJSON_TYPE: u8 = b'$';
const UBJSON_COUNT: u8 = b'#';

/// Container frame.
///
/// `remaining: Some(n)` is a counted container (no close marker on the wire);
/// `None` is self-terminating (`]`/`}`). `element_type` is the forced element
/// marker of a strongly typed container.
#[derive(Debug, Clone, Copy)]
enum Frame {
    /// Inside an object, expecting a key (or the close condition).
    ObjectKey {
        element_type: Option<u8>,
        remaining: Option<usize>,
    },
    /// Inside an object, expecting the value of the key just emitted.
    ObjectValue {
        element_type: Option<u8>,
        remaining: Option<usize>,
    },
    /// Inside an array.
    Array {
        element_type: Option<u8>,
        remaining: Option<usize>,
    },
}

/// UBJSON pull parser over any byte source.
pub struct UbjsonParser<'de, S> {
    source: S,
    options: DecodeOptions,
    stack: Vec<Frame>,
    event_peek: Option<ParseEvent<'de>>,
    done: bool,
}

impl<'de> UbjsonParser<'de, SliceSource<'de>> {
    /// Parser over an in-memory buffer.
    pub fn from_slice(input: &'de [u8]) -> Self {
        UbjsonParser::new(SliceSource::new(input))
    }
}

impl<'de, S: Source<'de>> UbjsonParser<'de, S> {
    /// Parser over any byte source, with default options.
    pub fn new(source: S) -> Self {
        UbjsonParser::with_options(source, DecodeOptions::new())
    }

    /// Parser over any byte source, with explicit options.
    pub fn with_options(source: S, options: DecodeOptions) -> Self {
        UbjsonParser {
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

    fn peek_u8(&mut self) -> Result<Option<u8>, DecodeError> {
        self.source
            .peek()
            .map_err(|e| DecodeError::from_source(e, FORMAT))
    }

    /// Read the next marker, skipping no-ops.
    fn read_marker(&mut self) -> Result<u8, DecodeError> {
        loop {
            let marker = self.read_u8()?;
            if marker != UBJSON_NOOP {
                return Ok(marker);
            }
        }
    }

    fn read_i16(&mut self) -> Result<i16, DecodeError> {
        let bytes = self.read_exact(2)?;
        Ok(i16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_i32(&mut self) -> Result<i32, DecodeError> {
        let bytes = self.read_exact(4)?;
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_i64(&mut self) -> Result<i64, DecodeError> {
        let bytes = self.read_exact(8)?;
        Ok(i64::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }

    fn read_f32(&mut self) -> Result<f32, DecodeError> {
        let bytes = self.read_exact(4)?;
        Ok(f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_f64(&mut self) -> Result<f64, DecodeError> {
        let bytes = self.read_exact(8)?;
        Ok(f64::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }

    /// Decode a length whose integer marker has already been read.
    ///
    /// Lengths and counts must be integer-typed and non-negative.
    fn read_length_with(&mut self, marker: u8, start: usize) -> Result<usize, DecodeError> {
        let value = match marker {
            UBJSON_INT8 => i64::from(self.read_u8()? as i8),
            UBJSON_UINT8 => i64::from(self.read_u8()?),
            UBJSON_INT16 => i64::from(self.read_i16()?),
            UBJSON_INT32 => i64::from(self.read_i32()?),
            UBJSON_INT64 => self.read_i64()?,
            _ => return Err(self.err(ErrorKind::LengthMustBeInteger, start)),
        };
        usize::try_from(value).map_err(|_| self.err(ErrorKind::LengthCannotBeNegative, start))
    }

    /// Read a length or count: marker plus payload.
    fn read_length(&mut self) -> Result<usize, DecodeError> {
        let start = self.source.position();
        let marker = self.read_marker()?;
        self.read_length_with(marker, start)
    }

    /// UTF-8 validate a payload of `len` bytes.
    fn read_utf8(&mut self, len: usize) -> Result<Cow<'de, str>, DecodeError> {
        let at = self.source.position();
        match self.read_exact(len)? {
            Cow::Borrowed(bytes) => std::str::from_utf8(bytes)
                .map(Cow::Borrowed)
                .map_err(|_| self.err(ErrorKind::InvalidUtf8, at)),
            Cow::Owned(bytes) => String::from_utf8(bytes)
                .map(Cow::Owned)
                .map_err(|_| self.err(ErrorKind::InvalidUtf8, at)),
        }
    }

    /// Read a length-prefixed, UTF-8 validated string payload.
    fn read_text(&mut self) -> Result<Cow<'de, str>, DecodeError> {
        let len = self.read_length()?;
        self.read_utf8(len)
    }

    /// Read the optional `$type` / `#count` parameters after a container open.
    fn read_container_params(&mut self) -> Result<(Option<u8>, Option<usize>), DecodeError> {
        match self.peek_u8()? {
            Some(UBJSON_TYPE) => {
                self.read_u8()?;
                let element_type = self.read_u8()?;
                let at = self.source.position();
                match self.peek_u8()? {
                    Some(UBJSON_COUNT) => {
                        self.read_u8()?;
                        let count = self.read_length()?;
                        Ok((Some(element_type), Some(count)))
                    }
                    _ => Err(self.err(ErrorKind::CountRequiredAfterType, at)),
                }
            }
            Some(UBJSON_COUNT) => {
                self.read_u8()?;
                let count = self.read_length()?;
                Ok((None, Some(count)))
            }
            _ => Ok((None, None)),
        }
    }

    fn push_frame(&mut self, frame: Frame, open_offset: usize) -> Result<(), DecodeError> {
        if self.stack.len() >= self.options.max_nesting_depth {
            return Err(self.err(
                ErrorKind::MaxDepthExceeded {
                    limit: self.options.max_nesting_depth,
                },
                open_offset,
            ));
        }
        self.stack.push(frame);
        Ok(())
    }

    /// Mark one item of the enclosing container as finished.
    fn finish_item(&mut self) {
        let Some(frame) = self.stack.last_mut() else {
            self.done = true;
            return;
        };
        match *frame {
            Frame::ObjectValue {
                element_type,
                remaining,
            } => {
                *frame = Frame::ObjectKey {
                    element_type,
                    remaining,
                };
            }
            Frame::Array {
                remaining: Some(remaining),
                element_type,
            } => {
                *frame = Frame::Array {
                    remaining: Some(remaining - 1),
                    element_type,
                };
            }
            Frame::Array {
                remaining: None, ..
            } => {}
            Frame::ObjectKey { .. } => {
                debug_assert!(false, "value finished while expecting a key");
            }
        }
    }

    fn event(&self, kind: ParseEventKind<'de>, start: usize) -> ParseEvent<'de> {
        ParseEvent::new(
            kind,
            Span::new(start, self.source.position().saturating_sub(start)),
        )
    }

    /// Parse one value whose marker has already been read, emitting its event.
    fn parse_value(&mut self, marker: u8, start: usize) -> Result<ParseEvent<'de>, DecodeError> {
        let scalar = match marker {
            UBJSON_NULL => ScalarValue::Null,
            UBJSON_TRUE => ScalarValue::Bool(true),
            UBJSON_FALSE => ScalarValue::Bool(false),
            UBJSON_INT8 => ScalarValue::I64(i64::from(self.read_u8()? as i8)),
            UBJSON_UINT8 => ScalarValue::U64(u64::from(self.read_u8()?)),
            UBJSON_INT16 => ScalarValue::I64(i64::from(self.read_i16()?)),
            UBJSON_INT32 => ScalarValue::I64(i64::from(self.read_i32()?)),
            UBJSON_INT64 => ScalarValue::I64(self.read_i64()?),
            UBJSON_FLOAT32 => ScalarValue::F64(f64::from(self.read_f32()?)),
            UBJSON_FLOAT64 => ScalarValue::F64(self.read_f64()?),
            UBJSON_CHAR => {
                // One byte; anything past ASCII is not valid UTF-8 on its own.
                let at = self.source.position();
                let byte = self.read_u8()?;
                let text = std::str::from_utf8(std::slice::from_ref(&byte))
                    .map_err(|_| self.err(ErrorKind::InvalidUtf8, at))?
                    .to_owned();
                ScalarValue::Str(Cow::Owned(text))
            }
            UBJSON_STRING => ScalarValue::Str(self.read_text()?),
            UBJSON_HIGH_PRECISION => ScalarValue::BigNumber(self.read_text()?),
            UBJSON_OBJECT_OPEN => {
                let (element_type, remaining) = self.read_container_params()?;
                self.push_frame(
                    Frame::ObjectKey {
                        element_type,
                        remaining,
                    },
                    start,
                )?;
                return Ok(self.event(ParseEventKind::ObjectStart, start));
            }
            UBJSON_ARRAY_OPEN => {
                let (element_type, remaining) = self.read_container_params()?;
                self.push_frame(
                    Frame::Array {
                        element_type,
                        remaining,
                    },
                    start,
                )?;
                return Ok(self.event(ParseEventKind::ArrayStart, start));
            }
            tag => return Err(self.err(ErrorKind::UnknownTypeTag { tag }, start)),
        };
        self.finish_item();
        Ok(self.event(ParseEventKind::Scalar(scalar), start))
    }

    fn produce_event(&mut self) -> Result<Option<ParseEvent<'de>>, DecodeError> {
        if self.done {
            return Ok(None);
        }

        let start = self.source.position();

        // Counted containers close by exhaustion, without a close marker.
        match self.stack.last() {
            Some(Frame::ObjectKey {
                remaining: Some(0), ..
            }) => {
                self.stack.pop();
                self.finish_item();
                return Ok(Some(self.event(ParseEventKind::ObjectEnd, start)));
            }
            Some(Frame::Array {
                remaining: Some(0), ..
            }) => {
                self.stack.pop();
                self.finish_item();
                return Ok(Some(self.event(ParseEventKind::ArrayEnd, start)));
            }
            _ => {}
        }

        match self.stack.last().copied() {
            Some(Frame::ObjectKey {
                element_type,
                remaining,
            }) => {
                let marker = self.read_marker()?;
                if remaining.is_none() && marker == UBJSON_OBJECT_CLOSE {
                    self.stack.pop();
                    self.finish_item();
                    return Ok(Some(self.event(ParseEventKind::ObjectEnd, start)));
                }
                // Keys are length-prefixed strings without an `S` marker; the
                // marker just read is the key's length marker.
                let len = self.read_length_with(marker, start)?;
                let key = self.read_utf8(len)?;
                if let Some(frame) = self.stack.last_mut() {
                    *frame = Frame::ObjectValue {
                        element_type,
                        remaining: remaining.map(|n| n - 1),
                    };
                }
                Ok(Some(self.event(ParseEventKind::Key(key), start)))
            }
            Some(Frame::ObjectValue { element_type, .. }) => {
                let marker = match element_type {
                    Some(marker) => marker,
                    None => self.read_marker()?,
                };
                self.parse_value(marker, start).map(Some)
            }
            Some(Frame::Array {
                element_type,
                remaining,
            }) => {
                // Typed elements carry no per-element marker.
                let marker = match element_type {
                    Some(marker) => marker,
                    None => self.read_marker()?,
                };
                if remaining.is_none() && marker == UBJSON_ARRAY_CLOSE {
                    self.stack.pop();
                    self.finish_item();
                    return Ok(Some(self.event(ParseEventKind::ArrayEnd, start)));
                }
                self.parse_value(marker, start).map(Some)
            }
            None => {
                let marker = self.read_marker()?;
                self.parse_value(marker, start).map(Some)
            }
        }
    }
}

impl<'de, S: Source<'de>> FormatParser<'de> for UbjsonParser<'de, S> {
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
}
