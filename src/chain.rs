//! Fluent assertions built on [`ScopeContext`].
//!
//! ```
//! use scope_assert::{expect, Value};
//!
//! let tea = Value::object([("tea", "chai")]);
//! expect(tea.clone()).to().deep_equal(tea).unwrap();
//! expect(1).to().not().equal(2).unwrap();
//! ```

use crate::comparison::{deep_equal, loose_equals, strict_equals};
use crate::context::{ScopeContext, ScopeOverrides, EXPECTED_KEY, NOT_KEY};
use crate::errors::{AssertResult, BoxError, Details};
use crate::message::{self, EvalMessage};
use crate::value::Value;

/// Store key holding the dotted property path of a nested subject.
pub const PATH_KEY: &str = "path";
/// Store key holding the labels of the enclosing [`Expect::within`] groups.
pub const GROUP_KEY: &str = "group";
/// Store key holding the type name checked by [`Expect::type_of`].
pub const TYPE_KEY: &str = "type";

#[derive(Clone, Debug)]
pub struct Expect {
    ctx: ScopeContext,
}

impl Expect {
    pub fn new(ctx: ScopeContext) -> Self {
        ctx.enter("expect");
        Self { ctx }
    }

    pub fn scope(&self) -> &ScopeContext {
        &self.ctx
    }

    pub fn value(&self) -> &Value {
        self.ctx.value()
    }

    fn word(self, name: &str) -> Self {
        self.ctx.set_op(name);
        self
    }

    pub fn to(self) -> Self {
        self.word("to")
    }

    pub fn be(self) -> Self {
        self.word("be")
    }

    pub fn that(self) -> Self {
        self.word("that")
    }

    pub fn is(self) -> Self {
        self.word("is")
    }

    pub fn has(self) -> Self {
        self.word("has")
    }

    /// Invert every predicate evaluated further down the chain. A predicate
    /// that failed with an error still fails.
    pub fn not(self) -> Self {
        self.ctx.set_op("not");
        let negated = !self.ctx.is_negated();
        let child = self.ctx.new_child(
            self.ctx.value().clone(),
            ScopeOverrides::new().on_eval(|hook, expr, msg, cause| {
                let expr = if cause.is_some() { expr } else { !expr };
                hook.eval_through(expr, msg, cause)
            }),
        );
        child.set(NOT_KEY, negated);
        Self { ctx: child }
    }

    #[track_caller]
    fn check(self, op: &'static str, pass: bool, msg: EvalMessage) -> AssertResult<Self> {
        self.ctx.set_op(op).enter(op);
        self.ctx.eval(pass, msg)?;
        Ok(self)
    }

    #[track_caller]
    pub fn ok(self) -> AssertResult<Self> {
        let pass = self.ctx.value().is_truthy();
        self.check("ok", pass, EvalMessage::default())
    }

    /// `==` comparison.
    #[track_caller]
    pub fn equal(self, expected: impl Into<Value>) -> AssertResult<Self> {
        let expected = expected.into();
        let pass = loose_equals(self.ctx.value(), &expected);
        self.ctx.set(EXPECTED_KEY, expected);
        self.check(
            "equal",
            pass,
            EvalMessage::polar(
                "expected {value} to equal {expected}",
                "not expected {value} to equal {expected}",
            ),
        )
    }

    /// `===` comparison.
    #[track_caller]
    pub fn strict_equal(self, expected: impl Into<Value>) -> AssertResult<Self> {
        let expected = expected.into();
        let pass = strict_equals(self.ctx.value(), &expected);
        self.ctx.set(EXPECTED_KEY, expected);
        self.check(
            "strictEqual",
            pass,
            EvalMessage::polar(
                "expected {value} to strictly equal {expected}",
                "not expected {value} to strictly equal {expected}",
            ),
        )
    }

    #[track_caller]
    pub fn deep_equal(self, expected: impl Into<Value>) -> AssertResult<Self> {
        self.deep("deepEqual", expected.into(), false)
    }

    #[track_caller]
    pub fn deep_strict_equal(self, expected: impl Into<Value>) -> AssertResult<Self> {
        self.deep("deepStrictEqual", expected.into(), true)
    }

    #[track_caller]
    fn deep(self, op: &'static str, expected: Value, strict: bool) -> AssertResult<Self> {
        let pass = deep_equal(self.ctx.value(), &expected, strict);
        self.ctx.set(EXPECTED_KEY, expected);
        let msg = if strict {
            EvalMessage::polar(
                "expected {value} to deeply and strictly equal {expected}",
                "not expected {value} to deeply and strictly equal {expected}",
            )
        } else {
            EvalMessage::polar(
                "expected {value} to deeply equal {expected}",
                "not expected {value} to deeply equal {expected}",
            )
        };
        self.check(op, pass, msg)
    }

    /// Compare the subject's type tag (`"number"`, `"array"`, `"map"`, ...).
    #[track_caller]
    pub fn type_of(self, tag: &str) -> AssertResult<Self> {
        let pass = self.ctx.value().type_tag().as_str() == tag;
        self.ctx.set(TYPE_KEY, tag);
        self.check(
            "typeOf",
            pass,
            EvalMessage::polar(
                "expected {value} to be of type {type}",
                "not expected {value} to be of type {type}",
            ),
        )
    }

    /// Run a caller predicate. An `Err` fails the check regardless of
    /// negation and is kept as the failure's `caused_by`.
    #[track_caller]
    pub fn satisfy<F, E>(self, predicate: F) -> AssertResult<Self>
    where
        F: FnOnce(&Value) -> Result<bool, E>,
        E: Into<BoxError>,
    {
        let msg = EvalMessage::polar(
            "expected {value} to satisfy the predicate",
            "not expected {value} to satisfy the predicate",
        );
        match predicate(self.ctx.value()) {
            Ok(pass) => self.check("satisfy", pass, msg),
            Err(e) => {
                self.ctx.set_op("satisfy").enter("satisfy");
                self.ctx.eval_with_cause(false, msg, Some(e.into()))?;
                Ok(self)
            }
        }
    }

    /// Continue the chain on the property `name` of the subject. Failures
    /// below are prefixed with the dotted path. A subject that cannot hold
    /// properties is a fatal failure.
    #[track_caller]
    pub fn property(self, name: &str) -> AssertResult<Expect> {
        self.ctx.set_op("property").enter("property");
        let subject = self.ctx.value();
        if !subject.has_properties() {
            let mut details = Details::new();
            details.insert("property".to_string(), Value::from(name));
            return self
                .ctx
                .fatal("cannot read property {property} of {value}", details, None);
        }

        let value = subject.get_prop(name).unwrap_or_default();
        let path = match self.ctx.get(PATH_KEY).as_ref().and_then(Value::as_str) {
            Some(parent) => format!("{parent}.{name}"),
            None => name.to_string(),
        };
        let own = path.clone();
        let child = self.ctx.new_child(
            value,
            ScopeOverrides::new().on_eval_message(move |hook, msg| {
                let base = hook.eval_message_through(msg);
                let current = hook.scope().get(PATH_KEY);
                if current.as_ref().and_then(Value::as_str) == Some(own.as_str()) {
                    format!("{own}: {base}")
                } else {
                    base
                }
            }),
        );
        child.set(PATH_KEY, path);
        Ok(Expect { ctx: child })
    }

    /// Run a group of checks on the same subject. A recoverable failure
    /// inside gets `label` prepended before the message is finalized; a
    /// fatal one is composed without it.
    pub fn within<F>(self, label: &str, f: F) -> AssertResult<Self>
    where
        F: FnOnce(Expect) -> AssertResult<Expect>,
    {
        let label = match self.ctx.get(GROUP_KEY).as_ref().and_then(Value::as_str) {
            Some(outer) => message::compose(Some(outer), label),
            None => label.to_string(),
        };
        let own = label.clone();
        let group = self.ctx.new_child(
            self.ctx.value().clone(),
            ScopeOverrides::new().on_message(move |hook, msg| {
                let base = hook.message_through(msg);
                let current = hook.scope().get(GROUP_KEY);
                if current.as_ref().and_then(Value::as_str) == Some(own.as_str()) {
                    message::compose(Some(&own), &base)
                } else {
                    base
                }
            }),
        );
        group.set(GROUP_KEY, label);
        f(Expect { ctx: group })?;
        Ok(self)
    }
}
