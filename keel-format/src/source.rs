//! Byte sources: the seam between parsers and raw input.
//!
//! A source owns or borrows its input and tracks a monotonically increasing
//! absolute read offset. Sources are created per decode call and never shared
//! across concurrent decodes.

use std::borrow::Cow;
use std::io::{self, Read};

use bumpalo::Bump;

use crate::error::SourceError;

/// Abstraction over a finite byte buffer or an open input stream.
///
/// The `'de` lifetime is the lifetime of data a source can hand out without
/// copying: the input buffer for [`SliceSource`], the staging arena for an
/// arena-backed [`ReadSource`].
pub trait Source<'de> {
    /// Look at the next byte without consuming it. `Ok(None)` at end of input.
    fn peek(&mut self) -> Result<Option<u8>, SourceError>;

    /// Consume and return the next byte.
    fn read_u8(&mut self) -> Result<u8, SourceError>;

    /// Consume exactly `n` bytes.
    fn read_exact(&mut self, n: usize) -> Result<Cow<'de, [u8]>, SourceError>;

    /// Absolute offset of the next unread byte.
    fn position(&self) -> usize;
}

/// Bounds-checked source over an in-memory buffer. Payloads are borrowed from
/// the input, so no per-scalar copies happen on this path.
pub struct SliceSource<'de> {
    input: &'de [u8],
    pos: usize,
}

impl<'de> SliceSource<'de> {
    /// Wrap a byte slice.
    pub const fn new(input: &'de [u8]) -> Self {
        SliceSource { input, pos: 0 }
    }
}

impl<'de> Source<'de> for SliceSource<'de> {
    fn peek(&mut self) -> Result<Option<u8>, SourceError> {
        Ok(self.input.get(self.pos).copied())
    }

    fn read_u8(&mut self) -> Result<u8, SourceError> {
        let byte = self
            .input
            .get(self.pos)
            .copied()
            .ok_or(SourceError::UnexpectedEof { offset: self.pos })?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_exact(&mut self, n: usize) -> Result<Cow<'de, [u8]>, SourceError> {
        // checked_add: n comes straight from untrusted length prefixes.
        if self
            .pos
            .checked_add(n)
            .is_none_or(|end| end > self.input.len())
        {
            return Err(SourceError::UnexpectedEof { offset: self.pos });
        }
        let slice = &self.input[self.pos..self.pos + n];
        self.pos += n;
        Ok(Cow::Borrowed(slice))
    }

    fn position(&self) -> usize {
        self.pos
    }
}

const STREAM_BUF_LEN: usize = 8 * 1024;

/// Buffered source over any [`io::Read`].
///
/// The absolute offset is tracked independently of the underlying stream's
/// own position, so non-seekable streams work. Without an arena every payload
/// is copied into an owned buffer; constructed with [`ReadSource::new_in`],
/// payloads are staged in the caller's bump arena and borrowed instead, which
/// keeps per-scalar heap allocation out of the hot path and releases
/// everything at once when the arena drops. The arena must outlive the
/// source and every event produced from it.
pub struct ReadSource<'bump, R> {
    reader: R,
    buf: Box<[u8]>,
    start: usize,
    end: usize,
    pos: usize,
    arena: Option<&'bump Bump>,
}

impl<'bump, R: Read> ReadSource<'bump, R> {
    /// Wrap a stream; payloads are owned copies.
    pub fn new(reader: R) -> Self {
        ReadSource {
            reader,
            buf: vec![0u8; STREAM_BUF_LEN].into_boxed_slice(),
            start: 0,
            end: 0,
            pos: 0,
            arena: None,
        }
    }

    /// Wrap a stream, staging payloads in `arena`.
    pub fn new_in(reader: R, arena: &'bump Bump) -> Self {
        ReadSource {
            arena: Some(arena),
            ..ReadSource::new(reader)
        }
    }

    /// Refill the window if it is empty. Returns false at end of input.
    fn fill(&mut self) -> Result<bool, SourceError> {
        if self.start < self.end {
            return Ok(true);
        }
        self.start = 0;
        self.end = 0;
        loop {
            match self.reader.read(&mut self.buf) {
                Ok(0) => return Ok(false),
                Ok(n) => {
                    self.end = n;
                    return Ok(true);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    return Err(SourceError::Io {
                        offset: self.pos,
                        source: err,
                    });
                }
            }
        }
    }

    /// Copy `n` buffered-or-streamed bytes into `dst`.
    fn read_into(&mut self, mut dst: &mut [u8]) -> Result<(), SourceError> {
        while !dst.is_empty() {
            if !self.fill()? {
                return Err(SourceError::UnexpectedEof { offset: self.pos });
            }
            let take = dst.len().min(self.end - self.start);
            dst[..take].copy_from_slice(&self.buf[self.start..self.start + take]);
            self.start += take;
            self.pos += take;
            dst = &mut dst[take..];
        }
        Ok(())
    }
}

impl<'bump, R: Read> Source<'bump> for ReadSource<'bump, R> {
    fn peek(&mut self) -> Result<Option<u8>, SourceError> {
        if !self.fill()? {
            return Ok(None);
        }
        Ok(Some(self.buf[self.start]))
    }

    fn read_u8(&mut self) -> Result<u8, SourceError> {
        if !self.fill()? {
            return Err(SourceError::UnexpectedEof { offset: self.pos });
        }
        let byte = self.buf[self.start];
        self.start += 1;
        self.pos += 1;
        Ok(byte)
    }

    fn read_exact(&mut self, n: usize) -> Result<Cow<'bump, [u8]>, SourceError> {
        match self.arena {
            Some(arena) => {
                let dst = arena.alloc_slice_fill_copy(n, 0u8);
                self.read_into(dst)?;
                Ok(Cow::Borrowed(dst))
            }
            None => {
                let mut dst = vec![0u8; n];
                self.read_into(&mut dst)?;
                Ok(Cow::Owned(dst))
            }
        }
    }

    fn position(&self) -> usize {
        self.pos
    }
}
