use pretty_assertions::assert_eq;
use scope_assert as sa;
use sa::{format_value, formatter_fn, Config, FormatError, FormattedValue, Session, Value};

fn point_formatter() -> Config {
    Config::new().with_formatter(formatter_fn("point", |ctx, value| {
        let Value::Object(obj) = value else { return None };
        let obj = obj.borrow();
        if obj.class() != Some("Point") {
            return Some(FormattedValue::skip());
        }
        let x = obj.get("x").cloned().unwrap_or_default();
        let y = obj.get("y").cloned().unwrap_or_default();
        let rendered = format!("({}, {})", ctx.format(&x).ok()?, ctx.format(&y).ok()?);
        Some(FormattedValue::ok(rendered))
    }))
}

#[test]
fn test_custom_ok_takes_precedence_over_builtins() {
    let cfg = point_formatter();
    let p = Value::instance("Point", [("x", 1), ("y", 2)]);
    assert_eq!(format_value(&cfg, &p).unwrap(), "(1, 2)");

    // other objects still reach the built-in renderer
    let other = Value::object([("x", 1)]);
    assert_eq!(format_value(&cfg, &other).unwrap(), "{x:1}");
}

#[test]
fn test_custom_formatter_applies_to_nested_values() {
    let cfg = point_formatter();
    let v = Value::array([Value::instance("Point", [("x", 0), ("y", 0)])]);
    assert_eq!(format_value(&cfg, &v).unwrap(), "[(0, 0)]");
}

#[test]
fn test_continue_candidate_loses_to_later_ok() {
    let hint = formatter_fn("hint", |_, _| Some(FormattedValue::next("hint")));
    let mut cfg = Config::new();
    cfg.add_formatter(hint);
    assert_eq!(format_value(&cfg, &Value::from(1)).unwrap(), "1");
}

#[test]
fn test_failed_formatter_aborts() {
    let cfg = Config::new().with_formatter(formatter_fn("broken", |_, value| {
        value.as_str().map(|_| {
            FormattedValue::failed(FormatError::Failed {
                formatter: "broken".to_string(),
                message: "cannot render text".to_string(),
            })
        })
    }));
    assert_eq!(format_value(&cfg, &Value::from(1)).unwrap(), "1");
    let err = format_value(&cfg, &Value::array(["x"])).unwrap_err();
    assert_eq!(err.to_string(), "formatter `broken` failed: cannot render text");
}

#[test]
fn test_formatter_failure_surfaces_on_the_assertion() {
    let session = Session::new(Config::new().with_formatter(formatter_fn("broken", |_, value| {
        value.as_str().map(|_| {
            FormattedValue::failed(FormatError::Failed {
                formatter: "broken".to_string(),
                message: "nope".to_string(),
            })
        })
    })));
    let err = session.expect("tea").equal(1).unwrap_err();
    assert_eq!(
        err.message(),
        "expected <formatter `broken` failed: nope> to equal 1"
    );
    let message_error = err.failure().message_error.as_ref().map(|e| e.to_string());
    assert_eq!(message_error, Some("formatter `broken` failed: nope".to_string()));
}

#[test]
fn test_limits_come_from_json_config() {
    let cfg = Config::from_json(r#"{"format": {"maxItems": 2}}"#).unwrap();
    let v = Value::array([1, 2, 3, 4]);
    assert_eq!(format_value(&cfg, &v).unwrap(), "[1,2,...+2]");
}
