//! CBOR parser implementing `FormatParser`.

use std::borrow::Cow;

use keel_format::{
    DecodeError, DecodeOptions, ErrorKind, FormatParser, ParseEvent, ParseEventKind, Position,
    ScalarValue, SliceSource, Source, Span,
};

const FORMAT: &str = "cbor";

// CBOR major types
const MAJOR_UNSIGNED: u8 = 0;
const MAJOR_NEGATIVE: u8 = 1;
const MAJOR_BYTES: u8 = 2;
const MAJOR_TEXT: u8 = 3;
const MAJOR_ARRAY: u8 = 4;
const MAJOR_MAP: u8 = 5;
const MAJOR_TAG: u8 = 6;
const MAJOR_SIMPLE: u8 = 7;

// Additional-info values
const INFO_INDEFINITE: u8 = 31;

// The break stop code, a complete initial byte.
const BREAK: u8 = 0xff;

// Semantic tags with decode-time meaning
const TAG_POS_BIGNUM: u64 = 2;
const TAG_NEG_BIGNUM: u64 = 3;

const fn major(initial: u8) -> u8 {
    initial >> 5
}

const fn info(initial: u8) -> u8 {
    initial & 0x1f
}

/// Container frame. `remaining: None` is an indefinite-length container,
/// closed by a break stop code.
#[derive(Debug, Clone, Copy)]
enum Frame {
    /// Inside a map, expecting a key (or the close condition).
    MapKey { remaining: Option<u64> },
    /// Inside a map, expecting the value of the key just emitted.
    MapValue { remaining: Option<u64> },
    /// Inside an array.
    Array { remaining: Option<u64> },
}

/// CBOR pull parser over any byte source.
pub struct CborParser<'de, S> {
    source: S,
    options: DecodeOptions,
    stack: Vec<Frame>,
    event_peek: Option<ParseEvent<'de>>,
    done: bool,
}

impl<'de> CborParser<'de, SliceSource<'de>> {
    /// Parser over an in-memory buffer.
    pub fn from_slice(input: &'de [u8]) -> Self {
        CborParser::new(SliceSource::new(input))
    }
}

impl<'de, S: Source<'de>> CborParser<'de, S> {
    /// Parser over any byte source, with default options.
    pub fn new(source: S) -> Self {
        CborParser::with_options(source, DecodeOptions::new())
    }

    /// Parser over any byte source, with explicit options.
    pub fn with_options(source: S, options: DecodeOptions) -> Self {
        CborParser {
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

    fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let bytes = self.read_exact(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.read_exact(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_u64(&mut self) -> Result<u64, DecodeError> {
        let bytes = self.read_exact(8)?;
        Ok(u64::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }

    /// Decode an initial byte's argument. `Ok(None)` means indefinite length.
    fn read_arg(&mut self, initial: u8, start: usize) -> Result<Option<u64>, DecodeError> {
        match info(initial) {
            n @ 0..=23 => Ok(Some(u64::from(n))),
            24 => Ok(Some(u64::from(self.read_u8()?))),
            25 => Ok(Some(u64::from(self.read_u16()?))),
            26 => Ok(Some(u64::from(self.read_u32()?))),
            27 => Ok(Some(self.read_u64()?)),
            INFO_INDEFINITE => Ok(None),
            // 28..=30 are reserved
            _ => Err(self.err(ErrorKind::UnknownTypeTag { tag: initial }, start)),
        }
    }

    /// Decode a definite, platform-addressable length.
    fn read_len(&mut self, initial: u8, start: usize) -> Result<usize, DecodeError> {
        let Some(len) = self.read_arg(initial, start)? else {
            return Err(self.err(ErrorKind::UnknownTypeTag { tag: initial }, start));
        };
        usize::try_from(len).map_err(|_| self.err(ErrorKind::UnexpectedEof, start))
    }

    /// Byte-string payload for an initial byte, concatenating indefinite
    /// chunks.
    fn read_bytes_payload(&mut self, initial: u8, start: usize) -> Result<Cow<'de, [u8]>, DecodeError> {
        if info(initial) != INFO_INDEFINITE {
            let len = self.read_len(initial, start)?;
            return self.read_exact(len);
        }
        let mut assembled: Vec<u8> = Vec::new();
        loop {
            let at = self.source.position();
            let chunk_initial = self.read_u8()?;
            if chunk_initial == BREAK {
                return Ok(Cow::Owned(assembled));
            }
            if major(chunk_initial) != MAJOR_BYTES || info(chunk_initial) == INFO_INDEFINITE {
                return Err(self.err(
                    ErrorKind::Mismatch {
                        expected: "definite byte string chunk",
                        found: "other item",
                    },
                    at,
                ));
            }
            let len = self.read_len(chunk_initial, at)?;
            assembled.extend_from_slice(&self.read_exact(len)?);
        }
    }

    /// Text payload for an initial byte, UTF-8 validated, concatenating
    /// indefinite chunks.
    fn read_text_payload(&mut self, initial: u8, start: usize) -> Result<Cow<'de, str>, DecodeError> {
        if info(initial) != INFO_INDEFINITE {
            let len = self.read_len(initial, start)?;
            let at = self.source.position();
            return match self.read_exact(len)? {
                Cow::Borrowed(bytes) => std::str::from_utf8(bytes)
                    .map(Cow::Borrowed)
                    .map_err(|_| self.err(ErrorKind::InvalidUtf8, at)),
                Cow::Owned(bytes) => String::from_utf8(bytes)
                    .map(Cow::Owned)
                    .map_err(|_| self.err(ErrorKind::InvalidUtf8, at)),
            };
        }
        let mut assembled = String::new();
        loop {
            let at = self.source.position();
            let chunk_initial = self.read_u8()?;
            if chunk_initial == BREAK {
                return Ok(Cow::Owned(assembled));
            }
            if major(chunk_initial) != MAJOR_TEXT || info(chunk_initial) == INFO_INDEFINITE {
                return Err(self.err(
                    ErrorKind::Mismatch {
                        expected: "definite text string chunk",
                        found: "other item",
                    },
                    at,
                ));
            }
            let len = self.read_len(chunk_initial, at)?;
            let payload_at = self.source.position();
            let bytes = self.read_exact(len)?;
            let text = std::str::from_utf8(&bytes)
                .map_err(|_| self.err(ErrorKind::InvalidUtf8, payload_at))?;
            assembled.push_str(text);
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
            Frame::MapValue { remaining } => *frame = Frame::MapKey { remaining },
            Frame::Array {
                remaining: Some(remaining),
            } => {
                *frame = Frame::Array {
                    remaining: Some(remaining - 1),
                }
            }
            Frame::Array { remaining: None } => {}
            Frame::MapKey { .. } => {
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

    /// Parse one data item whose initial byte has already been read.
    fn parse_value(&mut self, initial: u8, start: usize) -> Result<ParseEvent<'de>, DecodeError> {
        let mut initial = initial;
        loop {
            if major(initial) != MAJOR_TAG {
                break;
            }
            let Some(tag) = self.read_arg(initial, start)? else {
                return Err(self.err(ErrorKind::UnknownTypeTag { tag: initial }, start));
            };
            if tag == TAG_POS_BIGNUM || tag == TAG_NEG_BIGNUM {
                return self.parse_bignum(tag == TAG_NEG_BIGNUM, start);
            }
            // Other semantic tags are transparent: parse the tagged item.
            initial = self.read_u8()?;
        }

        let scalar = match major(initial) {
            MAJOR_UNSIGNED => {
                let Some(value) = self.read_arg(initial, start)? else {
                    return Err(self.err(ErrorKind::UnknownTypeTag { tag: initial }, start));
                };
                ScalarValue::U64(value)
            }
            MAJOR_NEGATIVE => {
                let Some(value) = self.read_arg(initial, start)? else {
                    return Err(self.err(ErrorKind::UnknownTypeTag { tag: initial }, start));
                };
                // The encoded argument n stands for -1 - n.
                match i64::try_from(value) {
                    Ok(n) => ScalarValue::I64(-1 - n),
                    Err(_) => {
                        let magnitude = u128::from(value) + 1;
                        ScalarValue::BigNumber(Cow::Owned(format!("-{magnitude}")))
                    }
                }
            }
            MAJOR_BYTES => ScalarValue::Bytes(self.read_bytes_payload(initial, start)?),
            MAJOR_TEXT => ScalarValue::Str(self.read_text_payload(initial, start)?),
            MAJOR_ARRAY => {
                let remaining = self.read_arg(initial, start)?;
                self.push_frame(Frame::Array { remaining }, start)?;
                return Ok(self.event(ParseEventKind::ArrayStart, start));
            }
            MAJOR_MAP => {
                let remaining = self.read_arg(initial, start)?;
                self.push_frame(Frame::MapKey { remaining }, start)?;
                return Ok(self.event(ParseEventKind::ObjectStart, start));
            }
            MAJOR_SIMPLE => match info(initial) {
                20 => ScalarValue::Bool(false),
                21 => ScalarValue::Bool(true),
                22 => ScalarValue::Null,
                // `undefined` has no counterpart in the event set; treat as null.
                23 => ScalarValue::Null,
                25 => ScalarValue::F64(half_to_f64(self.read_u16()?)),
                26 => ScalarValue::F64(f64::from(f32::from_bits(self.read_u32()?))),
                27 => ScalarValue::F64(f64::from_bits(self.read_u64()?)),
                INFO_INDEFINITE => return Err(self.err(ErrorKind::UnexpectedBreak, start)),
                _ => return Err(self.err(ErrorKind::UnknownTypeTag { tag: initial }, start)),
            },
            _ => return Err(self.err(ErrorKind::UnknownTypeTag { tag: initial }, start)),
        };
        self.finish_item();
        Ok(self.event(ParseEventKind::Scalar(scalar), start))
    }

    /// Tag 2/3: a definite byte string holding a big-endian magnitude.
    fn parse_bignum(&mut self, negative: bool, start: usize) -> Result<ParseEvent<'de>, DecodeError> {
        let at = self.source.position();
        let payload_initial = self.read_u8()?;
        if major(payload_initial) != MAJOR_BYTES || info(payload_initial) == INFO_INDEFINITE {
            return Err(self.err(
                ErrorKind::Mismatch {
                    expected: "byte string bignum payload",
                    found: "other item",
                },
                at,
            ));
        }
        let len = self.read_len(payload_initial, at)?;
        let magnitude = self.read_exact(len)?;
        let text = magnitude_to_decimal(&magnitude, negative);
        self.finish_item();
        Ok(self.event(ParseEventKind::Scalar(ScalarValue::BigNumber(Cow::Owned(text))), start))
    }

    /// Decode a map key. Text keys are used directly; integer keys are
    /// stringified in decimal; anything else is a structural mismatch.
    fn parse_key(&mut self, initial: u8, start: usize) -> Result<Cow<'de, str>, DecodeError> {
        match major(initial) {
            MAJOR_TEXT => self.read_text_payload(initial, start),
            MAJOR_UNSIGNED => {
                let Some(value) = self.read_arg(initial, start)? else {
                    return Err(self.err(ErrorKind::UnknownTypeTag { tag: initial }, start));
                };
                Ok(Cow::Owned(value.to_string()))
            }
            MAJOR_NEGATIVE => {
                let Some(value) = self.read_arg(initial, start)? else {
                    return Err(self.err(ErrorKind::UnknownTypeTag { tag: initial }, start));
                };
                let magnitude = u128::from(value) + 1;
                Ok(Cow::Owned(format!("-{magnitude}")))
            }
            _ => Err(self.err(
                ErrorKind::Mismatch {
                    expected: "text or integer map key",
                    found: "other item",
                },
                start,
            )),
        }
    }

    fn produce_event(&mut self) -> Result<Option<ParseEvent<'de>>, DecodeError> {
        if self.done {
            return Ok(None);
        }

        let start = self.source.position();

        // Definite containers close by count exhaustion.
        match self.stack.last() {
            Some(Frame::MapKey { remaining: Some(0) }) => {
                self.stack.pop();
                self.finish_item();
                return Ok(Some(self.event(ParseEventKind::ObjectEnd, start)));
            }
            Some(Frame::Array { remaining: Some(0) }) => {
                self.stack.pop();
                self.finish_item();
                return Ok(Some(self.event(ParseEventKind::ArrayEnd, start)));
            }
            _ => {}
        }

        match self.stack.last().copied() {
            Some(Frame::MapKey { remaining }) => {
                let initial = self.read_u8()?;
                if initial == BREAK {
                    if remaining.is_some() {
                        return Err(self.err(ErrorKind::UnexpectedBreak, start));
                    }
                    self.stack.pop();
                    self.finish_item();
                    return Ok(Some(self.event(ParseEventKind::ObjectEnd, start)));
                }
                let key = self.parse_key(initial, start)?;
                if let Some(frame) = self.stack.last_mut() {
                    *frame = Frame::MapValue {
                        remaining: remaining.map(|n| n - 1),
                    };
                }
                Ok(Some(self.event(ParseEventKind::Key(key), start)))
            }
            Some(Frame::MapValue { .. }) => {
                let initial = self.read_u8()?;
                self.parse_value(initial, start).map(Some)
            }
            Some(Frame::Array { remaining }) => {
                let initial = self.read_u8()?;
                if initial == BREAK {
                    if remaining.is_some() {
                        return Err(self.err(ErrorKind::UnexpectedBreak, start));
                    }
                    self.stack.pop();
                    self.finish_item();
                    return Ok(Some(self.event(ParseEventKind::ArrayEnd, start)));
                }
                self.parse_value(initial, start).map(Some)
            }
            None => {
                let initial = self.read_u8()?;
                self.parse_value(initial, start).map(Some)
            }
        }
    }
}

impl<'de, S: Source<'de>> FormatParser<'de> for CborParser<'de, S> {
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

/// Half-precision float to f64, per RFC 8949 appendix D.
fn half_to_f64(bits: u16) -> f64 {
    let exponent = (bits >> 10) & 0x1f;
    let mantissa = f64::from(bits & 0x3ff);
    let value = if exponent == 0 {
        mantissa * (-24f64).exp2()
    } else if exponent != 31 {
        (mantissa + 1024.0) * f64::from(i32::from(exponent) - 25).exp2()
    } else if mantissa == 0.0 {
        f64::INFINITY
    } else {
        f64::NAN
    };
    if bits & 0x8000 != 0 { -value } else { value }
}

/// Render a big-endian magnitude as decimal text, optionally as the CBOR
/// negative `-1 - n` (magnitude plus one, minus sign).
///
/// Base-2^32 limbs with repeated division by 10^9; the pack carries no
/// arbitrary-precision crate and bignums are cold, so thirty lines of
/// schoolbook arithmetic beat a new dependency.
fn magnitude_to_decimal(bytes: &[u8], negative: bool) -> String {
    // Little-endian limbs: limbs = limbs * 256 + byte, per input byte.
    let mut limbs: Vec<u32> = Vec::new();
    for &byte in bytes {
        let mut carry = u64::from(byte);
        for limb in &mut limbs {
            let v = u64::from(*limb) * 256 + carry;
            *limb = v as u32;
            carry = v >> 32;
        }
        if carry > 0 {
            limbs.push(carry as u32);
        }
    }

    if negative {
        // -1 - n: add one to the magnitude.
        let mut carry = 1u64;
        for limb in &mut limbs {
            let v = u64::from(*limb) + carry;
            *limb = v as u32;
            carry = v >> 32;
            if carry == 0 {
                break;
            }
        }
        if carry > 0 {
            limbs.push(carry as u32);
        }
    }

    if limbs.is_empty() {
        return "0".to_owned();
    }

    // Peel off 9 decimal digits per division.
    let mut groups: Vec<u32> = Vec::new();
    while !limbs.is_empty() {
        let mut rem: u64 = 0;
        for limb in limbs.iter_mut().rev() {
            let v = rem << 32 | u64::from(*limb);
            *limb = (v / 1_000_000_000) as u32;
            rem = v % 1_000_000_000;
        }
        while limbs.last() == Some(&0) {
            limbs.pop();
        }
        groups.push(rem as u32);
    }

    let mut text = String::new();
    if negative {
        text.push('-');
    }
    for (i, group) in groups.iter().rev().enumerate() {
        if i == 0 {
            text.push_str(&group.to_string());
        } else {
            text.push_str(&format!("{group:09}"));
        }
    }
    text
}
