//! Miette-based error diagnostics for CLI error presentation.
//!
//! Configuration errors are rendered against the file they came from, with a
//! labeled span on the offending key when one is known.

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::error::{ConfigError, Error};

/// Configuration error with source location context.
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(resocket::config))]
pub struct ConfigDiagnostic {
    pub message: String,

    #[source_code]
    pub src: NamedSource<String>,

    #[label("here")]
    pub span: Option<SourceSpan>,

    #[help]
    pub help: Option<String>,
}

impl ConfigDiagnostic {
    #[must_use]
    pub fn new(message: impl Into<String>, name: &str, src: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            src: NamedSource::new(name, src.into()),
            span: None,
            help: None,
        }
    }

    #[must_use]
    pub fn with_span(mut self, offset: usize, len: usize) -> Self {
        self.span = Some((offset, len.max(1)).into());
        self
    }

    #[must_use]
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Build a diagnostic for `err` raised while loading `src`.
    ///
    /// Returns `None` for errors that have nothing to point at in the file.
    #[must_use]
    pub fn from_error(err: &Error, name: &str, src: &str) -> Option<Self> {
        let Error::Config(config_err) = err else {
            return None;
        };
        match config_err {
            ConfigError::Parse(parse) => {
                let diag = Self::new(parse.message(), name, src)
                    .with_help("see `resocket config show` for the expected layout");
                Some(match parse.span() {
                    Some(span) => diag.with_span(span.start, span.end - span.start),
                    None => diag,
                })
            }
            ConfigError::InvalidValue { field, reason } => {
                let diag = Self::new(format!("invalid value for {field}: {reason}"), name, src);
                Some(match locate_key(src, field) {
                    Some((offset, len)) => diag.with_span(offset, len),
                    None => diag,
                })
            }
            ConfigError::MissingField { field } => Some(
                Self::new(format!("missing required field: {field}"), name, src)
                    .with_help(format!("set {field} or the RESOCKET_URL environment variable")),
            ),
            ConfigError::ReadFile(_) => None,
        }
    }
}

/// Connection error with a generic remedy.
#[derive(Debug, Error, Diagnostic)]
#[error("connection failed: {message}")]
#[diagnostic(
    code(resocket::connection),
    help("check that the server is running and the URL is correct")
)]
pub struct ConnectionDiagnostic {
    pub message: String,
}

impl ConnectionDiagnostic {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Byte range of the last segment of a dotted `field` as a key in `src`.
fn locate_key(src: &str, field: &str) -> Option<(usize, usize)> {
    let key = field.rsplit('.').next()?;
    let mut offset = 0;
    for line in src.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix(key) {
            if rest.trim_start().starts_with('=') {
                let indent = line.len() - trimmed.len();
                return Some((offset + indent, key.len()));
            }
        }
        offset += line.len();
    }
    None
}
