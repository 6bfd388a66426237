//! Error taxonomy shared by every format parser.

use core::fmt;

/// Position of an error in the input.
///
/// Binary documents have no line structure, so the reported line is always 1
/// and the column is the one-based byte offset. This keeps the reporting
/// contract identical to text-format parsers, so callers handle errors from
/// either uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Absolute byte offset from the start of the input.
    pub offset: usize,
}

impl Position {
    /// Position at the given byte offset.
    pub const fn new(offset: usize) -> Self {
        Position { offset }
    }

    /// Reported line; always 1 for binary input.
    pub const fn line(&self) -> usize {
        1
    }

    /// Reported column; the one-based byte offset.
    pub const fn column(&self) -> usize {
        self.offset + 1
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} column {}", self.line(), self.column())
    }
}

/// Error raised by a byte [`Source`](crate::Source).
///
/// Sources know nothing about formats; parsers convert this into a
/// [`DecodeError`] under their own category.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The input ended before the requested bytes were available.
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEof {
        /// Offset at which the shortfall was detected.
        offset: usize,
    },
    /// The underlying stream failed.
    #[error("i/o error at offset {offset}: {source}")]
    Io {
        /// Offset reached before the failure.
        offset: usize,
        /// The stream's error.
        #[source]
        source: std::io::Error,
    },
}

/// A decode failure: what went wrong, which format raised it, and where.
///
/// Errors are detected as close to the offending byte as possible and carry
/// the position at detection time. Every error is terminal for the decode
/// call; there is no partial-result recovery.
#[derive(Debug, thiserror::Error)]
#[error("{category}: {kind} at {position}")]
pub struct DecodeError {
    /// The specific kind of failure.
    #[source]
    pub kind: ErrorKind,
    /// Error category: the short name of the format (or component) that
    /// raised the error.
    pub category: &'static str,
    /// Input position at which the failure was detected.
    pub position: Position,
}

impl DecodeError {
    /// Create an error from its three parts.
    pub const fn new(kind: ErrorKind, category: &'static str, position: Position) -> Self {
        DecodeError {
            kind,
            category,
            position,
        }
    }

    /// Convert a [`SourceError`] into a format-attributed decode error.
    pub fn from_source(err: SourceError, category: &'static str) -> Self {
        match err {
            SourceError::UnexpectedEof { offset } => {
                DecodeError::new(ErrorKind::UnexpectedEof, category, Position::new(offset))
            }
            SourceError::Io { offset, source } => {
                DecodeError::new(ErrorKind::Io(source), category, Position::new(offset))
            }
        }
    }

    /// Stable numeric code of the underlying [`ErrorKind`].
    pub const fn code(&self) -> u32 {
        self.kind.code()
    }
}

/// The kinds of decode failure, shared across formats.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The input ended in the middle of a value or container.
    #[error("unexpected end of input")]
    UnexpectedEof,
    /// A tag byte that the format grammar does not define.
    #[error("unknown type tag 0x{tag:02x}")]
    UnknownTypeTag {
        /// The offending byte.
        tag: u8,
    },
    /// A container declared an element type but no element count (UBJSON's
    /// `$` without `#`).
    #[error("type is specified for container, but count is not specified")]
    CountRequiredAfterType,
    /// A declared length or count was negative.
    #[error("length cannot be negative")]
    LengthCannotBeNegative,
    /// A declared length or count was not an integer-typed value.
    #[error("length must be an integer numeric type")]
    LengthMustBeInteger,
    /// A text string or object key held invalid UTF-8.
    #[error("invalid UTF-8 encoding in text string")]
    InvalidUtf8,
    /// Container nesting exceeded the configured limit.
    #[error("maximum nesting depth of {limit} exceeded")]
    MaxDepthExceeded {
        /// The configured limit that was exceeded.
        limit: usize,
    },
    /// A CBOR break stop code appeared outside an indefinite-length item.
    #[error("break stop code outside indefinite-length item")]
    UnexpectedBreak,
    /// A BSON document's declared size disagrees with its content.
    #[error("document size does not match its content (declared {declared}, read {actual})")]
    DocumentSizeMismatch {
        /// Size the document header declared.
        declared: usize,
        /// Bytes actually consumed up to the terminator.
        actual: usize,
    },
    /// The event stream did not have the structure the consumer required.
    #[error("expected {expected}, found {found}")]
    Mismatch {
        /// What the consumer required.
        expected: &'static str,
        /// What the parser produced.
        found: &'static str,
    },
    /// A numeric value does not fit the destination type.
    #[error("number {value} does not fit in {target}")]
    NumberOutOfRange {
        /// The decimal rendering of the offending value.
        value: String,
        /// Name of the destination type.
        target: &'static str,
    },
    /// An I/O failure from a stream-backed source.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorKind {
    /// Stable numeric code.
    ///
    /// The first six values match the classic UBJSON parser code order so
    /// downstream tooling keyed on those numbers keeps working.
    pub const fn code(&self) -> u32 {
        match self {
            ErrorKind::UnexpectedEof => 1,
            ErrorKind::CountRequiredAfterType => 2,
            ErrorKind::LengthCannotBeNegative => 3,
            ErrorKind::LengthMustBeInteger => 4,
            ErrorKind::UnknownTypeTag { .. } => 5,
            ErrorKind::InvalidUtf8 => 6,
            ErrorKind::MaxDepthExceeded { .. } => 7,
            ErrorKind::UnexpectedBreak => 8,
            ErrorKind::DocumentSizeMismatch { .. } => 9,
            ErrorKind::Mismatch { .. } => 10,
            ErrorKind::NumberOutOfRange { .. } => 11,
            ErrorKind::Io(_) => 12,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_synthesizes_line_and_column() {
        let position = Position::new(17);
        assert_eq!(position.line(), 1);
        assert_eq!(position.column(), 18);
    }

    #[test]
    fn error_display_carries_category_and_position() {
        let err = DecodeError::new(ErrorKind::UnexpectedEof, "ubjson", Position::new(4));
        insta::assert_snapshot!(err.to_string(), @"ubjson: unexpected end of input at line 1 column 5");
    }

    #[test]
    fn codes_follow_classic_order() {
        assert_eq!(ErrorKind::UnexpectedEof.code(), 1);
        assert_eq!(ErrorKind::CountRequiredAfterType.code(), 2);
        assert_eq!(ErrorKind::LengthCannotBeNegative.code(), 3);
        assert_eq!(ErrorKind::LengthMustBeInteger.code(), 4);
        assert_eq!(ErrorKind::UnknownTypeTag { tag: 0xc1 }.code(), 5);
        assert_eq!(ErrorKind::InvalidUtf8.code(), 6);
    }
}
