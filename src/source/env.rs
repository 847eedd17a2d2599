//! Inline `*env:NAME` substitution on top of the normalizer.

use std::collections::VecDeque;
use std::env;
use std::io::{self, Read};

use crate::error::SourceError;
use crate::source::Normalizer;

/// Marker that introduces an environment variable placeholder.
pub const ENV_MARKER: &[u8] = b"*env:";

/// A substitution performed by the [`EnvSubstitutor`], kept to translate
/// output offsets back into normalized offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Splice {
    /// Output offset of the first byte of the substituted value.
    output_at: u64,
    /// Length of `*env:NAME` in the normalized stream.
    token_len: u64,
    value_len: u64,
}

/// Reader replacing `*env:NAME` placeholders with the value of the
/// environment variable `NAME`.
///
/// The name is the run of ASCII letters, digits and underscores following
/// the marker; the byte ending the run is kept. Values are spliced in
/// unquoted, so a placeholder used as a JSON string must sit inside quotes:
///
/// ```
/// use std::io::Read;
/// use rsrconf::source::EnvSubstitutor;
///
/// std::env::set_var("RSRCONF_DOC_USER", "cgrates");
/// let mut out = String::new();
/// EnvSubstitutor::new(&br#"{"user": "*env:RSRCONF_DOC_USER", }"#[..])
///     .read_to_string(&mut out)
///     .unwrap();
/// assert_eq!(out, r#"{"user":"cgrates"}"#);
/// ```
///
/// Matching state lives in the reader, so markers and names may straddle
/// any number of `read` calls, and values longer than the caller's buffer
/// are carried over to the following calls.
pub struct EnvSubstitutor<R> {
    inner: Normalizer<R>,
    /// Number of marker bytes matched so far.
    matched: usize,
    /// Output waiting to be copied into a caller buffer.
    carry: VecDeque<u8>,
    /// Byte that ended an env name, re-examined for a following marker.
    replay: Option<u8>,
    pending_error: Option<SourceError>,
    finished: bool,
    /// Total bytes pushed to the output so far.
    produced: u64,
    splices: Vec<Splice>,
}

impl<R: Read> EnvSubstitutor<R> {
    pub fn new(reader: R) -> Self {
        Self::from_normalizer(Normalizer::new(reader))
    }

    pub fn from_normalizer(inner: Normalizer<R>) -> Self {
        Self {
            inner,
            matched: 0,
            carry: VecDeque::new(),
            replay: None,
            pending_error: None,
            finished: false,
            produced: 0,
            splices: Vec::new(),
        }
    }

    /// The wrapped normalizer.
    pub fn normalizer(&self) -> &Normalizer<R> {
        &self.inner
    }

    /// Translate an offset in this reader's output into the corresponding
    /// offset of the normalizer output. Offsets inside a substituted value
    /// map to the start of its placeholder.
    pub fn normalized_offset(&self, output_offset: u64) -> u64 {
        let mut delta: i64 = 0;
        for splice in &self.splices {
            if output_offset < splice.output_at {
                break;
            }
            if output_offset < splice.output_at + splice.value_len {
                return (splice.output_at as i64 + delta) as u64;
            }
            delta += splice.token_len as i64 - splice.value_len as i64;
        }
        (output_offset as i64 + delta) as u64
    }

    /// Advance the state machine by one normalized byte.
    fn step(&mut self) -> Result<(), SourceError> {
        let byte = match self.replay.take() {
            Some(byte) => Some(byte),
            None => self.inner.read_byte()?,
        };

        let Some(byte) = byte else {
            self.flush_partial_marker();
            self.finished = true;
            return Ok(());
        };

        if byte == ENV_MARKER[self.matched] {
            self.matched += 1;
            if self.matched == ENV_MARKER.len() {
                self.matched = 0;
                self.substitute()?;
            }
            return Ok(());
        }

        if self.matched > 0 {
            // The held prefix was not a marker after all; the current byte
            // may still open a new one.
            self.flush_partial_marker();
            self.replay = Some(byte);
            return Ok(());
        }

        self.push(byte);
        Ok(())
    }

    fn substitute(&mut self) -> Result<(), SourceError> {
        let mut name = String::new();
        let terminator = loop {
            match self.inner.read_byte()? {
                Some(byte) if is_env_name_byte(byte) => name.push(byte as char),
                other => break other,
            }
        };

        let value = lookup_env(&name)?;
        tracing::trace!(variable = %name, "substituted environment variable");

        self.splices.push(Splice {
            output_at: self.produced,
            token_len: (ENV_MARKER.len() + name.len()) as u64,
            value_len: value.len() as u64,
        });
        for byte in value.into_bytes() {
            self.push(byte);
        }
        self.replay = terminator;
        Ok(())
    }

    fn flush_partial_marker(&mut self) {
        let matched = std::mem::take(&mut self.matched);
        for &byte in &ENV_MARKER[..matched] {
            self.push(byte);
        }
    }

    fn push(&mut self, byte: u8) {
        self.carry.push_back(byte);
        self.produced += 1;
    }
}

impl<R: Read> Read for EnvSubstitutor<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut written = 0;
        loop {
            while written < buf.len() {
                match self.carry.pop_front() {
                    Some(byte) => {
                        buf[written] = byte;
                        written += 1;
                    }
                    None => break,
                }
            }
            if written == buf.len() {
                return Ok(written);
            }

            if let Some(err) = self.pending_error.take() {
                if written > 0 {
                    self.pending_error = Some(err);
                    return Ok(written);
                }
                return Err(err.into_io());
            }
            if self.finished {
                return Ok(written);
            }

            if let Err(err) = self.step() {
                self.finished = true;
                self.carry.clear();
                self.pending_error = Some(err);
            }
        }
    }
}

fn is_env_name_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Resolve an environment variable, failing when it is unset or not UTF-8.
pub fn lookup_env(name: &str) -> Result<String, SourceError> {
    if name.is_empty() {
        return Err(SourceError::EnvNotFound {
            name: String::new(),
        });
    }
    env::var(name).map_err(|_| SourceError::EnvNotFound {
        name: name.to_string(),
    })
}
