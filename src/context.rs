//! Scope contexts: the nodes of an assertion chain.
//!
//! Every operation of a chain (`expect(x).to.not.deep_equal(y)`) works on a
//! context holding the subject value. Contexts form a tree: a child keeps a
//! reference to its parent for named-value lookup and for message
//! composition, but never writes to it.
//!
//! Message-related behaviour can be customized per child through
//! [`ScopeOverrides`]. Each hook receives a [`Hook`] handle that continues
//! resolution with the next ancestor hook, or the default behaviour when
//! there is none.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::iter;
use std::panic::Location;
use std::rc::Rc;

use itertools::Itertools;
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::errors::{AssertError, AssertResult, AssertionFailure, BoxError, Details};
use crate::format::format_value;
use crate::message::{self, EvalMessage, Message};
use crate::template;
use crate::value::Value;

/// Store key holding the negation flag.
pub const NOT_KEY: &str = "not";
/// Store key holding the value a predicate compares against.
pub const EXPECTED_KEY: &str = "expected";

pub type GetMessageFn = Rc<dyn Fn(&Hook<'_>, &EvalMessage) -> String>;
pub type GetEvalMessageFn = Rc<dyn Fn(&Hook<'_>, &EvalMessage) -> String>;
pub type GetDetailsFn = Rc<dyn Fn(&Hook<'_>) -> Details>;
pub type EvalFn = Rc<dyn Fn(&Hook<'_>, bool, &EvalMessage, Option<BoxError>) -> AssertResult<bool>>;
pub type FailFn = Rc<dyn Fn(&Hook<'_>, &EvalMessage, &Details) -> AssertError>;

/// Optional per-context replacements for message and failure behaviour.
#[derive(Clone, Default)]
pub struct ScopeOverrides {
    pub get_message: Option<GetMessageFn>,
    pub get_eval_message: Option<GetEvalMessageFn>,
    pub get_details: Option<GetDetailsFn>,
    pub eval: Option<EvalFn>,
    pub fail: Option<FailFn>,
}

impl ScopeOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_message<F>(mut self, f: F) -> Self
    where
        F: Fn(&Hook<'_>, &EvalMessage) -> String + 'static,
    {
        self.get_message = Some(Rc::new(f));
        self
    }

    pub fn on_eval_message<F>(mut self, f: F) -> Self
    where
        F: Fn(&Hook<'_>, &EvalMessage) -> String + 'static,
    {
        self.get_eval_message = Some(Rc::new(f));
        self
    }

    pub fn on_details<F>(mut self, f: F) -> Self
    where
        F: Fn(&Hook<'_>) -> Details + 'static,
    {
        self.get_details = Some(Rc::new(f));
        self
    }

    pub fn on_eval<F>(mut self, f: F) -> Self
    where
        F: Fn(&Hook<'_>, bool, &EvalMessage, Option<BoxError>) -> AssertResult<bool> + 'static,
    {
        self.eval = Some(Rc::new(f));
        self
    }

    pub fn on_fail<F>(mut self, f: F) -> Self
    where
        F: Fn(&Hook<'_>, &EvalMessage, &Details) -> AssertError + 'static,
    {
        self.fail = Some(Rc::new(f));
        self
    }
}

/// Arguments of the public call being resolved, carried through hooks.
#[derive(Clone, Copy)]
struct Call<'a> {
    extra: &'a Details,
    stack_start: Option<&'a str>,
    location: &'static Location<'static>,
    cause: &'a RefCell<Option<BoxError>>,
}

/// Handle passed to an override. `scope()` is the context the operation was
/// invoked on; the `*_through` methods continue with the next layer above
/// the context that owns the override.
pub struct Hook<'a> {
    ctx: &'a ScopeContext,
    next: Option<&'a ScopeContext>,
    call: Call<'a>,
}

impl<'a> Hook<'a> {
    pub fn scope(&self) -> &'a ScopeContext {
        self.ctx
    }

    pub fn message_through(&self, msg: &EvalMessage) -> String {
        self.ctx.message_from(self.next, msg, self.call)
    }

    pub fn eval_message_through(&self, msg: &EvalMessage) -> String {
        self.ctx.eval_message_from(self.next, msg, self.call)
    }

    pub fn details_through(&self) -> Details {
        self.ctx.details_from(self.next, self.call)
    }

    pub fn eval_through(
        &self,
        expr: bool,
        msg: &EvalMessage,
        cause: Option<BoxError>,
    ) -> AssertResult<bool> {
        self.ctx.eval_from(self.next, expr, msg, cause, self.call)
    }

    pub fn fail_through(&self, msg: &EvalMessage, details: &Details) -> AssertError {
        let call = Call {
            extra: details,
            ..self.call
        };
        self.ctx.fail_from(self.next, msg, call)
    }
}

/// State shared by every context of one assertion chain.
#[derive(Default)]
struct Chain {
    ops: RefCell<Vec<String>>,
    frames: RefCell<Vec<&'static str>>,
    message_error: RefCell<Option<BoxError>>,
}

struct Scope {
    parent: Option<ScopeContext>,
    value: Value,
    opts: Rc<Config>,
    org_args: Rc<[Value]>,
    init_msg: Option<Message>,
    chain: Rc<Chain>,
    store: RefCell<BTreeMap<String, Value>>,
    overrides: ScopeOverrides,
}

/// A node of an assertion chain. Cloning is cheap and yields a handle to the
/// same node.
#[derive(Clone)]
pub struct ScopeContext {
    inner: Rc<Scope>,
}

fn find_override<'s, T>(
    start: Option<&'s ScopeContext>,
    pick: impl Fn(&'s ScopeOverrides) -> Option<&'s T>,
) -> Option<(&'s ScopeContext, &'s T)> {
    iter::successors(start, |c| c.parent()).find_map(|c| pick(&c.inner.overrides).map(|f| (c, f)))
}

impl ScopeContext {
    /// Start a new chain.
    pub fn root(
        value: impl Into<Value>,
        opts: Rc<Config>,
        init_msg: Option<Message>,
        org_args: Vec<Value>,
    ) -> Self {
        Self {
            inner: Rc::new(Scope {
                parent: None,
                value: value.into(),
                opts,
                org_args: org_args.into(),
                init_msg,
                chain: Rc::new(Chain::default()),
                store: RefCell::new(BTreeMap::new()),
                overrides: ScopeOverrides::default(),
            }),
        }
    }

    /// A child context over `value`. It shares configuration, original
    /// arguments and chain history with `self`, reads `self`'s named values,
    /// and applies `overrides` to everything evaluated through it.
    pub fn new_child(&self, value: impl Into<Value>, overrides: ScopeOverrides) -> Self {
        trace!(ops = ?self.ops(), "new child scope");
        Self {
            inner: Rc::new(Scope {
                parent: Some(self.clone()),
                value: value.into(),
                opts: Rc::clone(&self.inner.opts),
                org_args: Rc::clone(&self.inner.org_args),
                init_msg: None,
                chain: Rc::clone(&self.inner.chain),
                store: RefCell::new(BTreeMap::new()),
                overrides,
            }),
        }
    }

    pub fn value(&self) -> &Value {
        &self.inner.value
    }

    pub fn opts(&self) -> &Rc<Config> {
        &self.inner.opts
    }

    pub fn org_args(&self) -> &[Value] {
        &self.inner.org_args
    }

    pub fn parent(&self) -> Option<&ScopeContext> {
        self.inner.parent.as_ref()
    }

    /// Caller message of the nearest context that has one.
    pub fn init_msg(&self) -> Option<&Message> {
        iter::successors(Some(self), |c| c.parent()).find_map(|c| c.inner.init_msg.as_ref())
    }

    pub fn is_negated(&self) -> bool {
        self.get(NOT_KEY).map(|v| v.is_truthy()).unwrap_or(false)
    }

    /// Record an operation name for failure reports.
    pub fn set_op(&self, name: impl Into<String>) -> &Self {
        let name = name.into();
        trace!(op = %name, "set op");
        self.inner.chain.ops.borrow_mut().push(name);
        self
    }

    /// Record an entered operation frame. Frames are only used to trim the
    /// frame list of a failure at its `stack_start`.
    pub fn enter(&self, frame: &'static str) -> &Self {
        self.inner.chain.frames.borrow_mut().push(frame);
        self
    }

    pub fn ops(&self) -> Vec<String> {
        self.inner.chain.ops.borrow().clone()
    }

    pub fn frames(&self) -> Vec<&'static str> {
        self.inner.chain.frames.borrow().clone()
    }

    /// Nearest value named `name`, looking at this context first and then
    /// its ancestors.
    pub fn get(&self, name: &str) -> Option<Value> {
        iter::successors(Some(self), |c| c.parent())
            .find_map(|c| c.inner.store.borrow().get(name).cloned())
    }

    /// Store a value on this context only; ancestors are untouched.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) -> &Self {
        self.inner.store.borrow_mut().insert(name.into(), value.into());
        self
    }

    /// Every name visible through [`get`](Self::get).
    pub fn keys(&self) -> Vec<String> {
        iter::successors(Some(self), |c| c.parent())
            .flat_map(|c| c.inner.store.borrow().keys().cloned().collect::<Vec<_>>())
            .unique()
            .collect()
    }

    /// The composed failure message for `eval_msg`, finalized. With
    /// `skip_overrides` no hook of this chain is consulted.
    #[track_caller]
    pub fn get_message(&self, eval_msg: &EvalMessage, skip_overrides: bool) -> String {
        let extra = Details::new();
        let cause = RefCell::new(None);
        let call = Call {
            extra: &extra,
            stack_start: None,
            location: Location::caller(),
            cause: &cause,
        };
        self.inner.chain.message_error.take();
        let text = self.compose(eval_msg, skip_overrides, call);
        message::finalize(&self.inner.opts, text)
    }

    /// The rendered evaluation message alone, without the caller message.
    #[track_caller]
    pub fn get_eval_message(&self, eval_msg: &EvalMessage, skip_overrides: bool) -> String {
        let extra = Details::new();
        let cause = RefCell::new(None);
        let call = Call {
            extra: &extra,
            stack_start: None,
            location: Location::caller(),
            cause: &cause,
        };
        if skip_overrides {
            self.default_eval_message(eval_msg, true, call)
        } else {
            self.eval_message_from(Some(self), eval_msg, call)
        }
    }

    #[track_caller]
    pub fn get_details(&self) -> Details {
        let extra = Details::new();
        let cause = RefCell::new(None);
        let call = Call {
            extra: &extra,
            stack_start: None,
            location: Location::caller(),
            cause: &cause,
        };
        self.details_from(Some(self), call)
    }

    /// `Ok(true)` when `expr` holds (after any `eval` hooks), otherwise an
    /// [`AssertError::Failure`] carrying the composed message.
    #[track_caller]
    pub fn eval(&self, expr: bool, eval_msg: impl Into<EvalMessage>) -> AssertResult<bool> {
        self.eval_with_cause(expr, eval_msg, None)
    }

    /// Like [`eval`](Self::eval); `caused_by` is attached to the failure as
    /// the error that made `expr` false.
    #[track_caller]
    pub fn eval_with_cause(
        &self,
        expr: bool,
        eval_msg: impl Into<EvalMessage>,
        caused_by: Option<BoxError>,
    ) -> AssertResult<bool> {
        let msg = eval_msg.into();
        let extra = Details::new();
        let cause = RefCell::new(None);
        let call = Call {
            extra: &extra,
            stack_start: None,
            location: Location::caller(),
            cause: &cause,
        };
        self.eval_from(Some(self), expr, &msg, caused_by, call)
    }

    /// Always `Err(AssertError::Failure)`. `details` are attached to the
    /// failure and usable as placeholders; recorded frames from
    /// `stack_start` onwards are left out of the report.
    #[track_caller]
    pub fn fail<T>(
        &self,
        msg: impl Into<EvalMessage>,
        details: Details,
        stack_start: Option<&str>,
    ) -> AssertResult<T> {
        let msg = msg.into();
        let cause = RefCell::new(None);
        let call = Call {
            extra: &details,
            stack_start,
            location: Location::caller(),
            cause: &cause,
        };
        Err(self.fail_from(Some(self), &msg, call))
    }

    /// Always `Err(AssertError::Fatal)`. The message is composed without any
    /// hook and `fail` hooks are not consulted.
    #[track_caller]
    pub fn fatal<T>(
        &self,
        msg: impl Into<EvalMessage>,
        details: Details,
        stack_start: Option<&str>,
    ) -> AssertResult<T> {
        let msg = msg.into();
        let cause = RefCell::new(None);
        let call = Call {
            extra: &details,
            stack_start,
            location: Location::caller(),
            cause: &cause,
        };
        Err(self.build_error(&msg, call, true))
    }

    fn compose(&self, msg: &EvalMessage, skip_overrides: bool, call: Call<'_>) -> String {
        if skip_overrides {
            self.default_message(msg, true, call)
        } else {
            self.message_from(Some(self), msg, call)
        }
    }

    fn message_from(
        &self,
        start: Option<&ScopeContext>,
        msg: &EvalMessage,
        call: Call<'_>,
    ) -> String {
        match find_override(start, |o| o.get_message.as_ref()) {
            Some((owner, f)) => f(
                &Hook {
                    ctx: self,
                    next: owner.parent(),
                    call,
                },
                msg,
            ),
            None => self.default_message(msg, false, call),
        }
    }

    fn default_message(&self, msg: &EvalMessage, skip_overrides: bool, call: Call<'_>) -> String {
        let eval_text = if skip_overrides {
            self.default_eval_message(msg, true, call)
        } else {
            self.eval_message_from(Some(self), msg, call)
        };
        let init = self.init_msg().map(|m| match m.resolve() {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "message callback failed");
                let text = format!("<message failed: {e}>");
                self.record_message_error(e);
                text
            }
        });
        message::compose(init.as_deref(), &eval_text)
    }

    fn eval_message_from(
        &self,
        start: Option<&ScopeContext>,
        msg: &EvalMessage,
        call: Call<'_>,
    ) -> String {
        match find_override(start, |o| o.get_eval_message.as_ref()) {
            Some((owner, f)) => f(
                &Hook {
                    ctx: self,
                    next: owner.parent(),
                    call,
                },
                msg,
            ),
            None => self.default_eval_message(msg, false, call),
        }
    }

    fn default_eval_message(
        &self,
        msg: &EvalMessage,
        skip_overrides: bool,
        call: Call<'_>,
    ) -> String {
        let text = match msg.template(self.is_negated()) {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "evaluation message callback failed");
                self.record_message_error(e);
                "evaluation of {value} failed".into()
            }
        };
        let mut details = if skip_overrides {
            self.default_details()
        } else {
            self.details_from(Some(self), call)
        };
        details.extend(call.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        template::render(&text, |name| {
            let value = self.placeholder(name, &details)?;
            Some(self.render_value(&value))
        })
    }

    fn details_from(&self, start: Option<&ScopeContext>, call: Call<'_>) -> Details {
        match find_override(start, |o| o.get_details.as_ref()) {
            Some((owner, f)) => f(&Hook {
                ctx: self,
                next: owner.parent(),
                call,
            }),
            None => self.default_details(),
        }
    }

    fn default_details(&self) -> Details {
        let mut details = Details::new();
        details.insert("actual".to_string(), self.value().clone());
        if let Some(expected) = self.get(EXPECTED_KEY) {
            details.insert(EXPECTED_KEY.to_string(), expected);
        }
        details
    }

    /// Placeholder lookup: details, then `value`, then `argN`, then the
    /// named-value store.
    fn placeholder(&self, name: &str, details: &Details) -> Option<Value> {
        if let Some(v) = details.get(name) {
            return Some(v.clone());
        }
        if name == "value" {
            return Some(self.value().clone());
        }
        if let Some(idx) = name.strip_prefix("arg").and_then(|n| n.parse::<usize>().ok()) {
            return self.org_args().get(idx).cloned();
        }
        self.get(name)
    }

    fn render_value(&self, value: &Value) -> String {
        match format_value(&self.inner.opts, value) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "value formatting failed while composing message");
                let text = format!("<{e}>");
                self.record_message_error(Box::new(e));
                text
            }
        }
    }

    /// Keeps the first error of the composition in progress.
    fn record_message_error(&self, err: BoxError) {
        let mut slot = self.inner.chain.message_error.borrow_mut();
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    fn eval_from(
        &self,
        start: Option<&ScopeContext>,
        expr: bool,
        msg: &EvalMessage,
        cause: Option<BoxError>,
        call: Call<'_>,
    ) -> AssertResult<bool> {
        match find_override(start, |o| o.eval.as_ref()) {
            Some((owner, f)) => f(
                &Hook {
                    ctx: self,
                    next: owner.parent(),
                    call,
                },
                expr,
                msg,
                cause,
            ),
            None if expr => Ok(true),
            None => {
                let slot = RefCell::new(cause);
                let call = Call { cause: &slot, ..call };
                Err(self.fail_from(Some(self), msg, call))
            }
        }
    }

    fn fail_from(
        &self,
        start: Option<&ScopeContext>,
        msg: &EvalMessage,
        call: Call<'_>,
    ) -> AssertError {
        match find_override(start, |o| o.fail.as_ref()) {
            Some((owner, f)) => f(
                &Hook {
                    ctx: self,
                    next: owner.parent(),
                    call,
                },
                msg,
                call.extra,
            ),
            None => self.build_error(msg, call, false),
        }
    }

    fn build_error(&self, msg: &EvalMessage, call: Call<'_>, fatal: bool) -> AssertError {
        let chain = &self.inner.chain;
        chain.message_error.take();
        let message = message::finalize(&self.inner.opts, self.compose(msg, fatal, call));

        let mut details = if fatal {
            self.default_details()
        } else {
            self.details_from(Some(self), call)
        };
        details.extend(call.extra.iter().map(|(k, v)| (k.clone(), v.clone())));

        let failure = AssertionFailure {
            message,
            actual: Some(self.value().clone()),
            expected: self.get(EXPECTED_KEY),
            operator: self.operator(),
            details,
            frames: self.frames_until(call.stack_start),
            location: Some(call.location),
            caused_by: call.cause.borrow_mut().take(),
            message_error: chain.message_error.borrow_mut().take(),
        };
        debug!(
            fatal,
            message = %failure.message,
            operator = ?failure.operator,
            location = %call.location,
            "assertion failed"
        );
        if fatal {
            AssertError::Fatal(Box::new(failure))
        } else {
            AssertError::Failure(Box::new(failure))
        }
    }

    fn operator(&self) -> Option<String> {
        let ops = self.inner.chain.ops.borrow();
        if ops.is_empty() {
            None
        } else {
            Some(ops.iter().join("."))
        }
    }

    fn frames_until(&self, stack_start: Option<&str>) -> Vec<&'static str> {
        let frames = self.inner.chain.frames.borrow();
        let end = stack_start
            .and_then(|start| frames.iter().position(|f| *f == start))
            .unwrap_or(frames.len());
        frames[..end].to_vec()
    }
}

impl fmt::Debug for ScopeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeContext")
            .field("value", self.value())
            .field("ops", &self.ops())
            .field("keys", &self.keys())
            .field("has_parent", &self.parent().is_some())
            .finish()
    }
}
