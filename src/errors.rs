use std::collections::BTreeMap;
use std::fmt;
use std::panic::Location;

use thiserror::Error;

use crate::value::Value;

/// Any error a predicate or message callback may surface as a cause.
pub type BoxError = Box<dyn std::error::Error + 'static>;

/// Named values attached to a failure and available as message placeholders.
pub type Details = BTreeMap<String, Value>;

/// The two ways an assertion can stop.
#[derive(Debug, Error)]
pub enum AssertError {
    /// A single check did not hold.
    #[error(transparent)]
    Failure(Box<AssertionFailure>),

    /// Continuing the enclosing composite assertion is meaningless. Ancestor
    /// scopes pass this through without touching the message.
    #[error(transparent)]
    Fatal(Box<AssertionFailure>),
}

impl AssertError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, AssertError::Fatal(_))
    }

    pub fn failure(&self) -> &AssertionFailure {
        match self {
            AssertError::Failure(f) | AssertError::Fatal(f) => f,
        }
    }

    pub fn message(&self) -> &str {
        &self.failure().message
    }

    /// Rewrite the message of a recoverable failure. Fatal errors are
    /// returned unchanged.
    pub fn enrich<F>(self, f: F) -> Self
    where
        F: FnOnce(&str) -> String,
    {
        match self {
            AssertError::Failure(mut failure) => {
                failure.message = f(&failure.message);
                AssertError::Failure(failure)
            }
            fatal @ AssertError::Fatal(_) => fatal,
        }
    }
}

/// Payload shared by both error kinds.
#[derive(Debug)]
pub struct AssertionFailure {
    /// Fully composed, finalized message.
    pub message: String,
    pub actual: Option<Value>,
    pub expected: Option<Value>,
    /// Operation names recorded on the chain, joined with `.`.
    pub operator: Option<String>,
    pub details: Details,
    /// Entered operation frames, trimmed at the requested stack start.
    pub frames: Vec<&'static str>,
    /// Source location of the call that raised the failure.
    pub location: Option<&'static Location<'static>>,
    /// Error that made the checked expression false.
    pub caused_by: Option<BoxError>,
    /// Error raised while composing the message (message callback or
    /// formatter).
    pub message_error: Option<BoxError>,
}

impl AssertionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            actual: None,
            expected: None,
            operator: None,
            details: Details::new(),
            frames: Vec::new(),
            location: None,
            caused_by: None,
            message_error: None,
        }
    }
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for AssertionFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.caused_by
            .as_deref()
            .or(self.message_error.as_deref())
    }
}

/// Raised by a formatter that returned `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("formatter `{formatter}` failed: {message}")]
    Failed { formatter: String, message: String },
}

/// Options could not be read.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

// Type alias for results of assertion operations
pub type AssertResult<T> = std::result::Result<T, AssertError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn enrich_rewrites_failures_only() {
        let failure = AssertError::Failure(Box::new(AssertionFailure::new("boom")));
        assert_eq!(failure.enrich(|m| format!("ctx: {m}")).message(), "ctx: boom");

        let fatal = AssertError::Fatal(Box::new(AssertionFailure::new("boom")));
        let fatal = fatal.enrich(|m| format!("ctx: {m}"));
        assert!(fatal.is_fatal());
        assert_eq!(fatal.message(), "boom");
    }
}
