//! Error types for preprocessing, rule compilation and rule evaluation.
//!
//! Each layer has its own error enum so callers can tell a broken source file
//! apart from a broken rule or a failed evaluation against runtime data.

use std::io;

use crate::source::SourcePosition;

/// Errors raised while reading a configuration source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("incomplete comment opened at {position}")]
    IncompleteComment { position: SourcePosition },

    #[error("environment variable not found: <{name}>")]
    EnvNotFound { name: String },
}

impl SourceError {
    /// Wrap into an `io::Error` so the error can cross a `Read` boundary.
    pub fn into_io(self) -> io::Error {
        match self {
            SourceError::Io(err) => err,
            SourceError::EnvNotFound { .. } => io::Error::new(io::ErrorKind::NotFound, self),
            SourceError::IncompleteComment { .. } => {
                io::Error::new(io::ErrorKind::InvalidData, self)
            }
        }
    }

    /// Recover a typed error from an `io::Error` produced by [`SourceError::into_io`].
    pub fn from_io(err: io::Error) -> Self {
        let wraps_source = err
            .get_ref()
            .map(|inner| inner.is::<SourceError>())
            .unwrap_or(false);
        if !wraps_source {
            return SourceError::Io(err);
        }

        let kind = err.kind();
        match err.into_inner() {
            Some(inner) => match inner.downcast::<SourceError>() {
                Ok(source_err) => *source_err,
                Err(other) => SourceError::Io(io::Error::new(kind, other)),
            },
            None => SourceError::Io(io::Error::from(kind)),
        }
    }
}

/// Errors raised while compiling rule strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("unclosed verbatim syntax in rules: <{rules}>")]
    UnclosedVerbatim { rules: String },

    #[error("empty rule in rules: <{rules}>")]
    EmptyRule { rules: String },

    #[error("invalid converter terminator in rule: <{rule}>")]
    UnterminatedConverter { rule: String },

    #[error("invalid converter value in string: <{spec}>, err: {reason}")]
    InvalidConverter { spec: String, reason: String },

    #[error("invalid filter value in string: <{spec}>, err: {reason}")]
    InvalidFilter { spec: String, reason: String },

    #[error("invalid Search&Replace subfield rule: <{pattern}>, err: {reason}")]
    InvalidRegex { pattern: String, reason: String },

    #[error("not enough members in Search&Replace, ruleStr: <{fragment}>")]
    MalformedSearchReplace { fragment: String },

    #[error("verbatim marker in listed rule: <{rule}>")]
    VerbatimInListedRule { rule: String },
}

/// Errors raised by a single converter step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    #[error("cannot convert <{value}> to {target}")]
    InvalidInput { value: String, target: &'static str },

    #[error("{converter}: {reason}")]
    Failed {
        converter: &'static str,
        reason: String,
    },
}

/// Errors raised while evaluating compiled rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("field not found: <{path}>")]
    NotFound { path: String },

    #[error("conversion failed in rule <{rule}>: {source}")]
    Conversion {
        rule: String,
        #[source]
        source: ConvertError,
    },

    #[error("filter <{filter}> cannot be evaluated against <{value}>")]
    Filter { filter: String, value: String },

    #[error("dynamic rule <{rule}> failed to compile: {source}")]
    DynamicRule {
        rule: String,
        #[source]
        source: CompileError,
    },
}

/// Errors raised while loading a configuration file into typed data.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid config at {position}: {message}")]
    Decode {
        position: SourcePosition,
        message: String,
    },

    #[error("invalid config: {message}")]
    DecodeUnlocated { message: String },
}
