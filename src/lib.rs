//! # rsrconf: relaxed-JSON configuration and RSR rules
//!
//! rsrconf turns human-written configuration sources into strict JSON and
//! compiles the small extraction rules ("RSR rules") found in them into
//! reusable objects that are evaluated against runtime data.
//!
//! ## Features
//!
//! - **Streaming preprocessing**: `//` and `/* */` comments, trailing commas
//!   and `*env:NAME` placeholders are resolved while the source is read
//! - **Located errors**: decode errors point at the line and column of the
//!   original source
//! - **Rule compilation**: literals, field paths, regex search/replace,
//!   converters and filters compiled once and shared between threads
//! - **Atomic reloads**: compiled generations are published through an
//!   `ArcSwap` cell
//!
//! ## Example: loading a config
//!
//! ```
//! use rsrconf::{loader, RsrParsers};
//! use serde::Deserialize;
//! use serde_json::json;
//!
//! #[derive(Deserialize)]
//! struct Template {
//!     tenant: RsrParsers,
//!     account: RsrParsers,
//! }
//!
//! let source = r#"{
//!     // the tenant is fixed
//!     "tenant": "cgrates.org",
//!     "account": "~*req.Account:s/^\\+49(\\d+)/0$1/",
//! }"#;
//! let template: Template = loader::decode_str(source).unwrap();
//!
//! let event = json!({"*req": {"Account": "+4986517174963"}});
//! assert_eq!(template.tenant.parse_provider(&event).unwrap(), "cgrates.org");
//! assert_eq!(template.account.parse_provider(&event).unwrap(), "086517174963");
//! ```

pub mod converter;
pub mod error;
pub mod extraction;
pub mod loader;
pub mod publish;
pub mod rsr;
pub mod settings;
pub mod source;

pub use error::{CompileError, ConvertError, EvalError, LoadError, SourceError};
pub use extraction::{DataProvider, FieldPath};
pub use publish::Published;
pub use rsr::{RsrParser, RsrParsers};
pub use settings::Settings;
pub use source::{EnvSubstitutor, Normalizer, SourcePosition};
