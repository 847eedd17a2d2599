//! Mapping normalized output back to the original source.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::source::Normalizer;

/// A 1-based line/column location inside a configuration source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourcePosition {
    pub line: u64,
    pub column: u64,
}

impl SourcePosition {
    pub fn new(line: u64, column: u64) -> Self {
        Self { line, column }
    }

    /// Position of the first byte of a source.
    pub fn start() -> Self {
        Self { line: 1, column: 1 }
    }

    /// Position following `byte`.
    pub(crate) fn advance(self, byte: u8) -> Self {
        if byte == b'\n' {
            Self {
                line: self.line + 1,
                column: 1,
            }
        } else {
            Self {
                line: self.line,
                column: self.column + 1,
            }
        }
    }
}

impl Default for SourcePosition {
    fn default() -> Self {
        Self::start()
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Locate the source position of the `index`-th byte (0-based) the
/// normalizer emits for `source`.
///
/// Decoders report errors against the normalized stream, which has comments
/// and whitespace removed; this replays normalization to find where that
/// byte came from. An index exactly one past the end of the output maps to
/// the end of the source so "unexpected end of input" errors still get a
/// location.
///
/// Returns `None` when the index lies further past the end, or when the
/// source fails to normalize before reaching it.
pub fn locate_output_index(source: &[u8], index: u64) -> Option<SourcePosition> {
    let mut normalizer = Normalizer::new(source);
    let mut emitted: u64 = 0;
    loop {
        match normalizer.read_byte() {
            Ok(Some(_)) => {
                if emitted == index {
                    return normalizer.position();
                }
                emitted += 1;
            }
            Ok(None) if emitted == index => return Some(normalizer.cursor()),
            Ok(None) | Err(_) => return None,
        }
    }
}
