//! Streaming preprocessing of configuration sources.
//!
//! Configuration files are written in a relaxed JSON dialect: `//` and
//! `/* */` comments, trailing commas before `]`/`}` and `*env:NAME`
//! placeholders are all allowed. The types here turn such a source into
//! strict JSON while it is being read, without buffering the whole file.
//!
//! The pieces compose by wrapping:
//!
//! ```text
//! raw reader -> Normalizer (comments, commas, whitespace) -> EnvSubstitutor (*env:NAME) -> serde_json
//! ```

pub mod env;
pub mod normalizer;
pub mod position;

pub use env::EnvSubstitutor;
pub use normalizer::Normalizer;
pub use position::{locate_output_index, SourcePosition};
