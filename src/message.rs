//! Message sources and the composition helpers used when a check fails.
//!
//! A failure message is built from up to two parts: the caller's message
//! (evaluated lazily, only on failure) and the evaluation message describing
//! the predicate. The final text is `"{caller}: {evaluation}"`, or just the
//! evaluation message when the caller supplied none.

use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use crate::config::Config;
use crate::errors::BoxError;

type LazyText = Rc<dyn Fn() -> Result<String, BoxError>>;
type LazyPolar = Rc<dyn Fn(bool) -> Result<String, BoxError>>;

/// Caller-supplied context for a failure.
#[derive(Clone)]
pub enum Message {
    Text(String),
    Lazy(LazyText),
}

impl Message {
    /// Defer building the message until an assertion actually fails.
    pub fn lazy<F>(f: F) -> Self
    where
        F: Fn() -> Result<String, BoxError> + 'static,
    {
        Message::Lazy(Rc::new(f))
    }

    pub fn resolve(&self) -> Result<String, BoxError> {
        match self {
            Message::Text(s) => Ok(s.clone()),
            Message::Lazy(f) => f(),
        }
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Message::Text(s.to_string())
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Message::Text(s)
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Message::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

/// The predicate's own description of what was expected.
#[derive(Clone)]
pub enum EvalMessage {
    /// Used as written regardless of negation.
    Text(Cow<'static, str>),
    /// Affirmative and negated templates; the context's negation flag picks.
    Polar {
        affirm: Cow<'static, str>,
        negated: Cow<'static, str>,
    },
    /// Built on demand; receives the negation flag.
    Lazy(LazyPolar),
}

impl EvalMessage {
    pub fn text(s: impl Into<Cow<'static, str>>) -> Self {
        EvalMessage::Text(s.into())
    }

    pub fn polar(
        affirm: impl Into<Cow<'static, str>>,
        negated: impl Into<Cow<'static, str>>,
    ) -> Self {
        EvalMessage::Polar {
            affirm: affirm.into(),
            negated: negated.into(),
        }
    }

    pub fn lazy<F>(f: F) -> Self
    where
        F: Fn(bool) -> Result<String, BoxError> + 'static,
    {
        EvalMessage::Lazy(Rc::new(f))
    }

    /// The unrendered template for the given polarity.
    pub fn template(&self, negated: bool) -> Result<Cow<'_, str>, BoxError> {
        match self {
            EvalMessage::Text(s) => Ok(Cow::Borrowed(s.as_ref())),
            EvalMessage::Polar { affirm, negated: neg } => Ok(Cow::Borrowed(if negated {
                neg.as_ref()
            } else {
                affirm.as_ref()
            })),
            EvalMessage::Lazy(f) => f(negated).map(Cow::Owned),
        }
    }
}

impl Default for EvalMessage {
    fn default() -> Self {
        EvalMessage::polar(
            "expected {value} to be truthy",
            "not expected {value} to be truthy",
        )
    }
}

impl From<&'static str> for EvalMessage {
    fn from(s: &'static str) -> Self {
        EvalMessage::Text(Cow::Borrowed(s))
    }
}

impl From<String> for EvalMessage {
    fn from(s: String) -> Self {
        EvalMessage::Text(Cow::Owned(s))
    }
}

impl fmt::Debug for EvalMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalMessage::Text(s) => f.debug_tuple("Text").field(s).finish(),
            EvalMessage::Polar { affirm, negated } => f
                .debug_struct("Polar")
                .field("affirm", affirm)
                .field("negated", negated)
                .finish(),
            EvalMessage::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

/// `"{init}: {eval}"`, or `eval` alone when there is no caller message.
pub fn compose(init: Option<&str>, eval: &str) -> String {
    match init {
        Some(init) if !init.is_empty() => format!("{init}: {eval}"),
        _ => eval.to_string(),
    }
}

/// Run the finalize step over a fully composed message.
pub fn finalize(cfg: &Config, message: String) -> String {
    if !cfg.finalize {
        return message;
    }
    match &cfg.finalize_fn {
        Some(f) => f(&message),
        None => escape_control(&message),
    }
}

/// Make control characters and ANSI escapes visible. Newlines are kept.
pub fn escape_control(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push('\n'),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\u{1b}' => out.push_str("\\x1b"),
            c if c.is_control() && (c as u32) < 0x100 => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn compose_with_and_without_caller_message() {
        assert_eq!(compose(None, "expected 1"), "expected 1");
        assert_eq!(compose(Some(""), "expected 1"), "expected 1");
        assert_eq!(compose(Some("ctx"), "expected 1"), "ctx: expected 1");
    }

    #[test]
    fn polar_template_follows_negation() {
        let m = EvalMessage::polar("is {value}", "is not {value}");
        assert_eq!(m.template(false).unwrap(), "is {value}");
        assert_eq!(m.template(true).unwrap(), "is not {value}");
        assert_eq!(EvalMessage::from("same").template(true).unwrap(), "same");
    }

    #[test]
    fn escape_keeps_newlines_and_shows_ansi() {
        assert_eq!(escape_control("a\u{1b}[31mb\n\tc\u{7}"), "a\\x1b[31mb\n\\tc\\x07");
    }

    #[test]
    fn finalize_is_opt_in() {
        let raw = "x\u{1b}".to_string();
        assert_eq!(finalize(&Config::default(), raw.clone()), raw);
        assert_eq!(finalize(&Config::default().with_finalize(true), raw.clone()), "x\\x1b");
        let custom = Config::default().with_finalize_fn(|s| s.to_uppercase());
        assert_eq!(finalize(&custom, "abc".to_string()), "ABC");
    }
}
