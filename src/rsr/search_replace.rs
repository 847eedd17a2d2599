//! `:s/search/replace/` steps of a dynamic rule.

use regex::Regex;

use crate::error::CompileError;

/// Marker introducing a search/replace step inside a rule.
pub const SEARCH_REPLACE_MARKER: &str = ":s/";

/// A compiled search/replace step.
///
/// The first match of the pattern is replaced by the template, in which
/// `$1`/`${1}` and named groups refer to that match; text around the match
/// is kept. Anchoring the pattern with `^...$` therefore extracts a part of
/// the value. Without a match the input is returned unchanged.
#[derive(Debug, Clone)]
pub struct SearchReplace {
    search: Regex,
    replace: String,
}

impl SearchReplace {
    pub fn new(search: &str, replace: &str) -> Result<Self, CompileError> {
        let search = Regex::new(search).map_err(|err| CompileError::InvalidRegex {
            pattern: search.to_string(),
            reason: err.to_string(),
        })?;
        Ok(Self {
            search,
            replace: replace.to_string(),
        })
    }

    /// Compile a step from the text following a `:s/` marker, e.g.
    /// `\+49(\d+)/0$1/`. Slashes inside the pattern or template are written
    /// as `\/`.
    pub fn parse(fragment: &str) -> Result<Self, CompileError> {
        let malformed = || CompileError::MalformedSearchReplace {
            fragment: fragment.to_string(),
        };

        let slashes = unescaped_slashes(fragment);
        let &[search_end, replace_end] = slashes.as_slice() else {
            return Err(malformed());
        };
        if search_end == 0 || replace_end != fragment.len() - 1 {
            return Err(malformed());
        }

        let search = unescape_slashes(&fragment[..search_end]);
        let replace = unescape_slashes(&fragment[search_end + 1..replace_end]);
        Self::new(&search, &replace)
    }

    pub fn apply(&self, value: &str) -> String {
        self.search
            .replace(value, self.replace.as_str())
            .into_owned()
    }

    pub fn pattern(&self) -> &str {
        self.search.as_str()
    }

    pub fn template(&self) -> &str {
        &self.replace
    }
}

/// Byte offsets of the `/` characters not preceded by a backslash.
pub(crate) fn unescaped_slashes(fragment: &str) -> Vec<usize> {
    let bytes = fragment.as_bytes();
    bytes
        .iter()
        .enumerate()
        .filter(|&(idx, &byte)| byte == b'/' && (idx == 0 || bytes[idx - 1] != b'\\'))
        .map(|(idx, _)| idx)
        .collect()
}

fn unescape_slashes(text: &str) -> String {
    text.replace("\\/", "/")
}
