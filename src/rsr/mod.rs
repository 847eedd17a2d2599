//! RSR rules: small per-field extraction rules compiled once at load time
//! and evaluated against runtime data.
//!
//! A rule is either a literal (`cgrates.org`) or a `~`-prefixed path into the
//! data, optionally followed by search/replace steps, a converter block and
//! a filter block:
//!
//! ```text
//! ~*req.Usage:s/(\d+)/${1}ms/{*duration_seconds&*round:1}(>=1)
//! ```

pub mod compiler;
pub mod filter;
pub mod parser;
pub mod search_replace;

pub use filter::Filter;
pub use parser::{DynamicTemplate, RsrParser, RsrParsers};
pub use search_replace::SearchReplace;
