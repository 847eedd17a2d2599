//! Comment and trailing-comma stripping for relaxed JSON sources.

use std::io::{self, BufRead, BufReader, Read};

use crate::error::SourceError;
use crate::source::SourcePosition;

/// A byte of normalized output together with where it came from.
#[derive(Debug, Clone, Copy)]
struct Token {
    byte: u8,
    position: SourcePosition,
    /// True for bytes of string content (the quotes themselves are structural).
    quoted: bool,
}

/// Pull-based byte source producing strict JSON from a relaxed source.
///
/// Outside string literals the normalizer:
/// - drops `// ...` line comments and `/* ... */` block comments
/// - drops whitespace (space, tab, CR, LF, NUL)
/// - drops a `,` whose next significant byte is `]` or `}`
///
/// Inside string literals every byte passes through unchanged. A backslash
/// inside a string escapes the following byte, so `\"` does not end the
/// literal.
///
/// # Example
///
/// ```
/// use std::io::Read;
/// use rsrconf::source::Normalizer;
///
/// let mut out = String::new();
/// Normalizer::new(&br#"{"a": 1, /* c */ "b": [1,2,],}"#[..])
///     .read_to_string(&mut out)
///     .unwrap();
/// assert_eq!(out, r#"{"a":1,"b":[1,2]}"#);
/// ```
pub struct Normalizer<R> {
    reader: BufReader<R>,
    /// Position of the next raw byte.
    cursor: SourcePosition,
    in_string: bool,
    escaped: bool,
    /// Significant token pulled ahead for comma elision.
    lookahead: Option<Token>,
    /// Output byte computed by `peek_byte` and not yet handed out.
    ready: Option<Token>,
    /// Position of the byte last returned by `read_byte`.
    last: Option<SourcePosition>,
    /// Error held back by `Read::read` after a partial fill.
    deferred: Option<SourceError>,
}

impl<R: Read> Normalizer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            cursor: SourcePosition::start(),
            in_string: false,
            escaped: false,
            lookahead: None,
            ready: None,
            last: None,
            deferred: None,
        }
    }

    /// Read the next normalized byte; `Ok(None)` at end of stream.
    pub fn read_byte(&mut self) -> Result<Option<u8>, SourceError> {
        let token = match self.ready.take() {
            Some(token) => Some(token),
            None => self.next_output()?,
        };
        Ok(token.map(|token| {
            self.last = Some(token.position);
            token.byte
        }))
    }

    /// Return the byte the next `read_byte` call will produce without
    /// consuming it.
    pub fn peek_byte(&mut self) -> Result<Option<u8>, SourceError> {
        if self.ready.is_none() {
            self.ready = self.next_output()?;
        }
        Ok(self.ready.map(|token| token.byte))
    }

    /// Source position of the byte last returned by [`Normalizer::read_byte`].
    pub fn position(&self) -> Option<SourcePosition> {
        self.last
    }

    /// Source position of the next unread raw byte.
    pub fn cursor(&self) -> SourcePosition {
        self.cursor
    }

    /// Whether the reader currently sits inside a string literal.
    pub fn in_string(&self) -> bool {
        self.in_string
    }

    fn next_output(&mut self) -> Result<Option<Token>, SourceError> {
        loop {
            let token = match self.lookahead.take() {
                Some(token) => token,
                None => match self.next_significant()? {
                    Some(token) => token,
                    None => return Ok(None),
                },
            };

            if token.byte == b',' && !token.quoted {
                self.lookahead = self.next_significant()?;
                if let Some(next) = self.lookahead {
                    if !next.quoted && matches!(next.byte, b']' | b'}') {
                        continue;
                    }
                }
            }
            return Ok(Some(token));
        }
    }

    /// Next byte that is neither whitespace nor part of a comment.
    fn next_significant(&mut self) -> Result<Option<Token>, SourceError> {
        loop {
            let Some((byte, position)) = self.next_raw()? else {
                return Ok(None);
            };

            if self.in_string {
                let quoted = if self.escaped {
                    self.escaped = false;
                    true
                } else if byte == b'\\' {
                    self.escaped = true;
                    true
                } else if byte == b'"' {
                    self.in_string = false;
                    false
                } else {
                    true
                };
                return Ok(Some(Token {
                    byte,
                    position,
                    quoted,
                }));
            }

            match byte {
                b' ' | b'\t' | b'\r' | b'\n' | 0 => continue,
                b'"' => {
                    self.in_string = true;
                    return Ok(Some(Token {
                        byte,
                        position,
                        quoted: false,
                    }));
                }
                b'/' => match self.peek_raw()? {
                    Some(b'/') => {
                        self.next_raw()?;
                        self.skip_line_comment()?;
                    }
                    Some(b'*') => {
                        self.next_raw()?;
                        self.skip_block_comment(position)?;
                    }
                    _ => {
                        return Ok(Some(Token {
                            byte,
                            position,
                            quoted: false,
                        }))
                    }
                },
                _ => {
                    return Ok(Some(Token {
                        byte,
                        position,
                        quoted: false,
                    }))
                }
            }
        }
    }

    fn skip_line_comment(&mut self) -> Result<(), SourceError> {
        while let Some((byte, _)) = self.next_raw()? {
            if byte == b'\n' || byte == b'\r' {
                break;
            }
        }
        Ok(())
    }

    fn skip_block_comment(&mut self, opened_at: SourcePosition) -> Result<(), SourceError> {
        let mut previous = 0u8;
        loop {
            match self.next_raw()? {
                Some((b'/', _)) if previous == b'*' => return Ok(()),
                Some((byte, _)) => previous = byte,
                None => {
                    return Err(SourceError::IncompleteComment {
                        position: opened_at,
                    })
                }
            }
        }
    }

    fn peek_raw(&mut self) -> Result<Option<u8>, SourceError> {
        loop {
            match self.reader.fill_buf() {
                Ok(buf) => return Ok(buf.first().copied()),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(SourceError::Io(err)),
            }
        }
    }

    fn next_raw(&mut self) -> Result<Option<(u8, SourcePosition)>, SourceError> {
        let Some(byte) = self.peek_raw()? else {
            return Ok(None);
        };
        self.reader.consume(1);
        let position = self.cursor;
        self.cursor = position.advance(byte);
        Ok(Some((byte, position)))
    }
}

impl<R: Read> Read for Normalizer<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(err) = self.deferred.take() {
            return Err(err.into_io());
        }
        let mut written = 0;
        while written < buf.len() {
            match self.read_byte() {
                Ok(Some(byte)) => {
                    buf[written] = byte;
                    written += 1;
                }
                Ok(None) => break,
                Err(err) if written == 0 => return Err(err.into_io()),
                Err(err) => {
                    self.deferred = Some(err);
                    break;
                }
            }
        }
        Ok(written)
    }
}
