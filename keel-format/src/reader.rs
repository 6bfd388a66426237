//! Push-style document reader over any pull parser.

use crate::error::{DecodeError, ErrorKind, Position};
use crate::event::ParseEventKind;
use crate::parser::FormatParser;
use crate::trace;
use crate::visitor::{Visitor, feed_event};

/// Reads one whole document in a single call, driving a [`Visitor`].
///
/// The reader and the cursor are two consumption modes of the same parsing
/// core: `read_to` pumps the parser's events synchronously into the visitor
/// and returns once the root value is complete. Construction performs no I/O.
/// A reader decodes exactly one document and is consumed by `read_to`.
pub struct DocumentReader<P> {
    parser: P,
}

impl<'de, P: FormatParser<'de>> DocumentReader<P> {
    /// Wrap a format parser.
    pub const fn new(parser: P) -> Self {
        DocumentReader { parser }
    }

    /// Position of the next unread byte.
    pub fn position(&self) -> Position {
        self.parser.position()
    }

    /// Consume the entire document, emitting every event into `visitor`.
    ///
    /// Exactly one top-level value is read; empty input or an event stream
    /// that ends mid-structure fails with [`ErrorKind::UnexpectedEof`]. Bytes
    /// after the root value are left unread.
    pub fn read_to<V: Visitor>(mut self, visitor: &mut V) -> Result<(), DecodeError> {
        trace!("reading one {} document", self.parser.format_name());
        let mut depth = 0usize;
        loop {
            let Some(event) = self.parser.next_event()? else {
                return Err(DecodeError::new(
                    ErrorKind::UnexpectedEof,
                    self.parser.format_name(),
                    self.parser.position(),
                ));
            };
            match event.kind {
                ParseEventKind::ObjectStart | ParseEventKind::ArrayStart => depth += 1,
                ParseEventKind::ObjectEnd | ParseEventKind::ArrayEnd => {
                    debug_assert!(depth > 0, "parser emitted an unmatched container end");
                    depth -= 1;
                }
                _ => {}
            }
            feed_event(visitor, &event);
            let root_complete = depth == 0
                && matches!(
                    event.kind,
                    ParseEventKind::Scalar(_)
                        | ParseEventKind::ObjectEnd
                        | ParseEventKind::ArrayEnd
                );
            if root_complete {
                trace!(
                    "document complete at offset {}",
                    self.parser.position().offset
                );
                return Ok(());
            }
        }
    }
}
