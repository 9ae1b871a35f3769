use std::rc::Rc;

use pretty_assertions::assert_eq;
use scope_assert as sa;
use sa::{
    AssertError, AssertionFailure, Config, Details, EvalMessage, ScopeContext, ScopeOverrides,
    Value,
};

fn root(value: impl Into<Value>) -> ScopeContext {
    ScopeContext::root(value, Rc::new(Config::default()), None, Vec::new())
}

fn decorated() -> ScopeOverrides {
    ScopeOverrides::new()
        .on_message(|hook, msg| format!("{} [decorated]", hook.message_through(msg)))
}

#[test]
fn test_child_shadows_without_touching_parent() {
    let parent = root(1);
    parent.set("k", "parent");
    let child = parent.new_child(2, ScopeOverrides::new());
    assert_eq!(child.get("k"), Some(Value::from("parent")));

    child.set("k", "child");
    assert_eq!(child.get("k"), Some(Value::from("child")));
    assert_eq!(parent.get("k"), Some(Value::from("parent")));
    assert_eq!(child.get("missing"), None);
}

#[test]
fn test_child_shares_chain_history() {
    let parent = root(1);
    parent.set_op("to");
    let child = parent.new_child(2, ScopeOverrides::new());
    child.set_op("equal");
    assert_eq!(parent.ops(), vec!["to", "equal"]);
    assert!(Rc::ptr_eq(parent.opts(), child.opts()));
    assert_eq!(child.parent().map(|p| p.value().clone()), Some(Value::from(1)));
}

#[test]
fn test_message_override_applies_to_failures() {
    let parent = root(1);
    let child = parent.new_child(1, decorated());
    let err = child.fail::<()>("broken {value}", Details::new(), None).unwrap_err();
    assert_eq!(err.message(), "broken 1 [decorated]");
    assert_eq!(child.get_message(&"broken".into(), false), "broken [decorated]");
    assert_eq!(child.get_message(&"broken".into(), true), "broken");
}

#[test]
fn test_fatal_bypasses_ancestor_overrides() {
    let parent = root(1);
    let child = parent.new_child(1, decorated());
    let grandchild = child.new_child(1, ScopeOverrides::new());

    let err = grandchild.fatal::<()>("cannot continue", Details::new(), None).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.message(), "cannot continue");
}

#[test]
fn test_overrides_chain_nearest_first() {
    let parent = root(1);
    let outer = parent.new_child(
        1,
        ScopeOverrides::new().on_eval_message(|hook, msg| {
            format!("outer({})", hook.eval_message_through(msg))
        }),
    );
    let inner = outer.new_child(
        1,
        ScopeOverrides::new().on_eval_message(|hook, msg| {
            format!("inner({})", hook.eval_message_through(msg))
        }),
    );
    assert_eq!(inner.get_eval_message(&"m".into(), false), "inner(outer(m))");
    assert_eq!(outer.get_eval_message(&"m".into(), false), "outer(m)");
    assert_eq!(inner.get_eval_message(&"m".into(), true), "m");
}

#[test]
fn test_details_override_feeds_placeholders() {
    let parent = root(4);
    let child = parent.new_child(
        4,
        ScopeOverrides::new().on_details(|hook| {
            let mut details = hook.details_through();
            details.insert("limit".to_string(), Value::from(3));
            details
        }),
    );
    let err = child.eval(false, "{value} exceeds {limit}").unwrap_err();
    assert_eq!(err.message(), "4 exceeds 3");
    assert_eq!(err.failure().details.get("limit"), Some(&Value::from(3)));
    assert_eq!(err.failure().details.get("actual"), Some(&Value::from(4)));
}

#[test]
fn test_eval_override_can_suppress_failure() {
    let parent = root(0);
    let lenient = parent.new_child(0, ScopeOverrides::new().on_eval(|_, _, _, _| Ok(true)));
    assert!(lenient.eval(false, "never shown").unwrap());
    assert!(parent.eval(false, "shown").is_err());
}

#[test]
fn test_fail_override_replaces_failure_but_not_fatal() {
    let parent = root(1);
    let child = parent.new_child(
        1,
        ScopeOverrides::new().on_fail(|hook, msg, details| {
            let err = hook.fail_through(msg, details);
            let message = format!("custom: {}", err.message());
            AssertError::Failure(Box::new(AssertionFailure::new(message)))
        }),
    );
    let err = child.eval(false, "plain").unwrap_err();
    assert_eq!(err.message(), "custom: plain");

    let err = child.fatal::<()>("plain", Details::new(), None).unwrap_err();
    assert_eq!(err.message(), "plain");
}

#[test]
fn test_negation_flag_selects_template() {
    let ctx = root(1);
    let msg = EvalMessage::polar("is {value}", "is not {value}");
    assert_eq!(ctx.get_eval_message(&msg, false), "is 1");
    ctx.set(sa::context::NOT_KEY, true);
    assert_eq!(ctx.get_eval_message(&msg, false), "is not 1");
}

#[test]
fn test_eval_message_callback_receives_negation() {
    let ctx = root(1);
    ctx.set(sa::context::NOT_KEY, true);
    let msg = EvalMessage::lazy(|negated| Ok(format!("negated={negated} value={{value}}")));
    assert_eq!(ctx.get_eval_message(&msg, false), "negated=true value=1");
}

#[test]
fn test_failure_report_fields() {
    let ctx = ScopeContext::root(
        Value::from("tea"),
        Rc::new(Config::default()),
        Some("order".into()),
        vec![Value::from("tea"), Value::from(2)],
    );
    ctx.set_op("to").set_op("equal");
    ctx.set(sa::context::EXPECTED_KEY, "coffee");
    let mut details = Details::new();
    details.insert("cups".to_string(), Value::from(2));

    let err = ctx
        .fail::<()>("{value} is not {expected} (x{arg1}, {cups} cups)", details, None)
        .unwrap_err();
    let failure = err.failure();
    assert_eq!(failure.message, r#"order: "tea" is not "coffee" (x2, 2 cups)"#);
    assert_eq!(failure.operator.as_deref(), Some("to.equal"));
    assert_eq!(failure.actual, Some(Value::from("tea")));
    assert_eq!(failure.expected, Some(Value::from("coffee")));
    assert_eq!(failure.details.get("cups"), Some(&Value::from(2)));
}
