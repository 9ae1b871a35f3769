//! Assertion evaluation over dynamic value graphs.
//!
//! Assertions run against a chain of [`ScopeContext`]s. Each context holds
//! the subject value, reads named values from its ancestors, and composes
//! failure messages through overridable hooks. Values are compared with a
//! cycle-safe deep equality ([`deep_equal`]) and rendered through a pluggable
//! formatter pipeline ([`format_value`]).

pub mod chain;
pub mod comparison;
pub mod config;
pub mod context;
pub mod errors;
pub mod format;
pub mod message;
pub mod session;
mod template;
pub mod value;

pub use chain::Expect;
pub use comparison::{deep_equal, loose_equals, strict_equals};
pub use config::{Config, ConfigOptions, FormatOptions};
pub use context::{Hook, ScopeContext, ScopeOverrides};
pub use errors::{
    AssertError, AssertResult, AssertionFailure, BoxError, ConfigError, Details, FormatError,
};
pub use format::{format_value, formatter_fn, FormatCtx, FormatResult, FormattedValue, Formatter};
pub use message::{EvalMessage, Message};
pub use session::Session;
pub use value::{TypeTag, Value};

/// Convenience: start a chain with the default configuration.
pub fn expect(value: impl Into<Value>) -> Expect {
    Session::default().expect(value)
}
