//! Entry point owning the configuration snapshot.
//!
//! A `Session` is single-threaded. Reconfiguring swaps the snapshot; contexts
//! created earlier keep the one they started with.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::chain::Expect;
use crate::config::Config;
use crate::context::ScopeContext;
use crate::errors::AssertResult;
use crate::message::{EvalMessage, Message};
use crate::value::Value;

#[derive(Debug, Default)]
pub struct Session {
    config: RefCell<Rc<Config>>,
    last: RefCell<Option<ScopeContext>>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self {
            config: RefCell::new(Rc::new(config)),
            last: RefCell::new(None),
        }
    }

    pub fn config(&self) -> Rc<Config> {
        Rc::clone(&self.config.borrow())
    }

    pub fn configure<F>(&self, f: F)
    where
        F: FnOnce(&mut Config),
    {
        let mut next = Config::clone(&self.config.borrow());
        f(&mut next);
        debug!(config = ?next, "session reconfigured");
        *self.config.borrow_mut() = Rc::new(next);
    }

    /// A new root context, remembered as the last one created.
    pub fn scope(&self, value: impl Into<Value>, msg: Option<Message>) -> ScopeContext {
        let value = value.into();
        let ctx = ScopeContext::root(value.clone(), self.config(), msg, vec![value]);
        *self.last.borrow_mut() = Some(ctx.clone());
        ctx
    }

    pub fn expect(&self, value: impl Into<Value>) -> Expect {
        Expect::new(self.scope(value, None))
    }

    /// Like [`expect`](Self::expect); `msg` is prefixed to failure messages.
    pub fn expect_with(&self, value: impl Into<Value>, msg: impl Into<Message>) -> Expect {
        Expect::new(self.scope(value, Some(msg.into())))
    }

    /// Fail unless `value` is truthy.
    #[track_caller]
    pub fn assert(&self, value: impl Into<Value>, msg: impl Into<Message>) -> AssertResult<()> {
        let ctx = self.scope(value, Some(msg.into()));
        ctx.set_op("assert").enter("assert");
        ctx.eval(ctx.value().is_truthy(), EvalMessage::default())?;
        Ok(())
    }

    pub fn last_scope(&self) -> Option<ScopeContext> {
        self.last.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reconfigure_only_affects_new_scopes() {
        let session = Session::default();
        let before = session.scope(1, Some("a\tb".into()));
        session.configure(|cfg| cfg.finalize = true);
        let after = session.scope(1, Some("a\tb".into()));

        let msg = EvalMessage::from("{value}");
        assert_eq!(before.get_message(&msg, false), "a\tb: 1");
        assert_eq!(after.get_message(&msg, false), "a\\tb: 1");
    }

    #[test]
    fn assert_composes_caller_message() {
        let session = Session::default();
        session.assert(1, "fine").unwrap();
        let err = session.assert(0, "ctx").unwrap_err();
        assert_eq!(err.message(), "ctx: expected 0 to be truthy");
        assert_eq!(err.failure().operator.as_deref(), Some("assert"));
    }

    #[test]
    fn last_scope_tracks_latest_root() {
        let session = Session::default();
        assert!(session.last_scope().is_none());
        session.expect(1);
        session.expect(2);
        assert_eq!(session.last_scope().unwrap().value(), &Value::from(2));
    }
}
