//! The pull side of the decoding core: the [`FormatParser`] cursor trait and
//! the decode-relevant configuration.

use crate::error::{DecodeError, ErrorKind, Position};
use crate::event::{ParseEvent, ParseEventKind};

/// Default container nesting limit, protecting against adversarially deep
/// documents exhausting the call stack or the frame stack.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 1024;

/// Decode-relevant configuration, passed explicitly to parser constructors.
///
/// One immutable value with plain named fields; encoder-side presentation
/// knobs live with the encoders, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Maximum container nesting depth before the decode fails with
    /// [`ErrorKind::MaxDepthExceeded`].
    pub max_nesting_depth: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions::new()
    }
}

impl DecodeOptions {
    /// Options with every field at its default.
    pub const fn new() -> Self {
        DecodeOptions {
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }

    /// Replace the nesting limit.
    pub const fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }
}

/// Streaming pull parser for a specific wire format.
///
/// A parser is a lazy, finite, forward-only, single-pass sequence of
/// [`ParseEvent`]s over exactly one document: after the root value's last
/// event, `next_event` returns `Ok(None)` without touching any trailing
/// bytes. Instances are single-use and not reentrant; construction performs
/// no I/O.
pub trait FormatParser<'de> {
    /// Read the next parse event, or `Ok(None)` once the root value is
    /// complete.
    fn next_event(&mut self) -> Result<Option<ParseEvent<'de>>, DecodeError>;

    /// Peek at the next event without consuming it.
    fn peek_event(&mut self) -> Result<Option<ParseEvent<'de>>, DecodeError>;

    /// Position of the next unread byte, for error attribution by a
    /// caller-driven typed consumer.
    fn position(&self) -> Position;

    /// Short format name, used as the error category.
    fn format_name(&self) -> &'static str;

    /// Skip one whole value (scalar or container subtree) without handing its
    /// events to the caller.
    ///
    /// The default pumps events and counts depth; formats whose wire format
    /// carries length prefixes may override this with a seek.
    fn skip_value(&mut self) -> Result<(), DecodeError> {
        skip_value_by_events(self)
    }

    /// Skip an entire container subtree. The next event must be a container
    /// start.
    fn skip_container(&mut self) -> Result<(), DecodeError> {
        match self.peek_event()? {
            Some(event)
                if matches!(
                    event.kind,
                    ParseEventKind::ObjectStart | ParseEventKind::ArrayStart
                ) =>
            {
                self.skip_value()
            }
            Some(event) => Err(DecodeError::new(
                ErrorKind::Mismatch {
                    expected: "container",
                    found: event.kind.type_name(),
                },
                self.format_name(),
                event.span.position(),
            )),
            None => Err(DecodeError::new(
                ErrorKind::UnexpectedEof,
                self.format_name(),
                self.position(),
            )),
        }
    }
}

/// Event-pumping implementation behind the default
/// [`FormatParser::skip_value`]: consume one value's events, counting depth.
///
/// Parsers that override `skip_value` with a native seek use this as their
/// fallback for states the seek cannot handle (e.g. a buffered peeked event).
pub fn skip_value_by_events<'de, P: FormatParser<'de> + ?Sized>(
    parser: &mut P,
) -> Result<(), DecodeError> {
    let Some(event) = parser.next_event()? else {
        return Err(DecodeError::new(
            ErrorKind::UnexpectedEof,
            parser.format_name(),
            parser.position(),
        ));
    };
    match event.kind {
        ParseEventKind::Scalar(_) => Ok(()),
        ParseEventKind::ObjectStart | ParseEventKind::ArrayStart => {
            let mut depth = 1usize;
            while depth > 0 {
                let Some(event) = parser.next_event()? else {
                    return Err(DecodeError::new(
                        ErrorKind::UnexpectedEof,
                        parser.format_name(),
                        parser.position(),
                    ));
                };
                match event.kind {
                    ParseEventKind::ObjectStart | ParseEventKind::ArrayStart => depth += 1,
                    ParseEventKind::ObjectEnd | ParseEventKind::ArrayEnd => depth -= 1,
                    _ => {}
                }
            }
            Ok(())
        }
        kind => Err(DecodeError::new(
            ErrorKind::Mismatch {
                expected: "value",
                found: kind.type_name(),
            },
            parser.format_name(),
            event.span.position(),
        )),
    }
}

impl<'de, P: FormatParser<'de> + ?Sized> FormatParser<'de> for &mut P {
    fn next_event(&mut self) -> Result<Option<ParseEvent<'de>>, DecodeError> {
        (**self).next_event()
    }

    fn peek_event(&mut self) -> Result<Option<ParseEvent<'de>>, DecodeError> {
        (**self).peek_event()
    }

    fn position(&self) -> Position {
        (**self).position()
    }

    fn format_name(&self) -> &'static str {
        (**self).format_name()
    }

    fn skip_value(&mut self) -> Result<(), DecodeError> {
        (**self).skip_value()
    }

    fn skip_container(&mut self) -> Result<(), DecodeError> {
        (**self).skip_container()
    }
}
