//! Loading relaxed-JSON configuration sources into typed values.
//!
//! Sources go through [`Normalizer`] and [`EnvSubstitutor`] before
//! `serde_json` sees them. Decode errors are reported with the line and
//! column of the original source, not of the normalized text.

use std::io::Read;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{LoadError, SourceError};
use crate::source::{locate_output_index, EnvSubstitutor, Normalizer};

/// Strip comments and trailing commas and substitute `*env:NAME` tokens.
pub fn preprocess<R: Read>(reader: R) -> Result<Vec<u8>, SourceError> {
    let mut substitutor = EnvSubstitutor::new(reader);
    read_all(&mut substitutor)
}

/// Strip comments and trailing commas only; `*env:` tokens stay as written.
pub fn normalize_only<R: Read>(reader: R) -> Result<Vec<u8>, SourceError> {
    let mut normalizer = Normalizer::new(reader);
    read_all(&mut normalizer)
}

fn read_all<R: Read>(reader: &mut R) -> Result<Vec<u8>, SourceError> {
    let mut out = Vec::new();
    reader.read_to_end(&mut out).map_err(SourceError::from_io)?;
    Ok(out)
}

/// Preprocess `source` and decode it.
///
/// # Arguments
///
/// * `source` - Raw configuration bytes
///
/// # Returns
///
/// The decoded value, or a [`LoadError`] pointing into `source`.
///
/// ```
/// use rsrconf::loader::decode_slice;
/// use serde_json::{json, Value};
///
/// let value: Value = decode_slice(b"{\"a\": 1, /* c */ \"b\": [1,2,],}").unwrap();
/// assert_eq!(value, json!({"a": 1, "b": [1, 2]}));
/// ```
pub fn decode_slice<T: DeserializeOwned>(source: &[u8]) -> Result<T, LoadError> {
    let mut substitutor = EnvSubstitutor::new(source);
    let output = read_all(&mut substitutor)?;
    debug!(
        source_len = source.len(),
        output_len = output.len(),
        "preprocessed config source"
    );

    serde_json::from_slice(&output)
        .map_err(|err| locate_decode_error(source, &output, &substitutor, err))
}

pub fn decode_str<T: DeserializeOwned>(source: &str) -> Result<T, LoadError> {
    decode_slice(source.as_bytes())
}

/// Read a file and decode it with [`decode_slice`].
pub fn load_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, LoadError> {
    let path = path.as_ref();
    let source = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    debug!(path = %path.display(), bytes = source.len(), "loading config file");
    decode_slice(&source)
}

/// Map a `serde_json` error on the preprocessed output back to `source`.
fn locate_decode_error<R: Read>(
    source: &[u8],
    output: &[u8],
    substitutor: &EnvSubstitutor<R>,
    err: serde_json::Error,
) -> LoadError {
    let message = strip_location(&err.to_string());
    if err.line() == 0 {
        return LoadError::DecodeUnlocated { message };
    }

    let output_offset = offset_of(output, err.line(), err.column());
    let normalized = substitutor.normalized_offset(output_offset as u64);
    match locate_output_index(source, normalized) {
        Some(position) => LoadError::Decode { position, message },
        None => LoadError::DecodeUnlocated { message },
    }
}

/// Byte offset of a 1-based line/column in `text`. `serde_json` reports
/// column 0 when the error sits right after a newline.
fn offset_of(text: &[u8], line: usize, column: usize) -> usize {
    let line_start = text
        .iter()
        .enumerate()
        .filter(|&(_, &byte)| byte == b'\n')
        .map(|(idx, _)| idx + 1)
        .nth(line.saturating_sub(2))
        .filter(|_| line > 1)
        .unwrap_or(0);
    (line_start + column.saturating_sub(1)).min(text.len())
}

fn strip_location(message: &str) -> String {
    match message.rsplit_once(" at line ") {
        Some((head, _)) => head.to_string(),
        None => message.to_string(),
    }
}
