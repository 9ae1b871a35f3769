//! Formatters installed after any custom ones. Each handles one family of
//! values and skips the rest.

use chrono::{DateTime, SecondsFormat, Utc};
use itertools::Itertools;
use tracing::trace;

use super::*;
use crate::value::Value;

pub fn defaults() -> [&'static dyn Formatter; 10] {
    [
        &Primitive,
        &Text,
        &Date,
        &RegExp,
        &ErrorValue,
        &Function,
        &Array,
        &Map,
        &Set,
        &Object,
    ]
}

/// `[object Tag]`, the rendering used when no formatter produced anything.
pub fn tag_description(value: &Value) -> String {
    format!("[object {}]", value.type_tag().class_name())
}

/// Placeholder for a container nested deeper than `max_depth`.
pub fn elided(value: &Value) -> String {
    match value {
        Value::Array(_) => "[...]".to_string(),
        Value::Object(obj) => match obj.borrow().class() {
            Some(class) => format!("{class}{{...}}"),
            None => "{...}".to_string(),
        },
        Value::Map(_) => "Map{...}".to_string(),
        Value::Set(_) => "Set[...]".to_string(),
        other => tag_description(other),
    }
}

fn finish(name: &str, rendered: Result<String, FormatError>) -> Option<FormattedValue> {
    Some(match rendered {
        Ok(s) => FormattedValue::ok(s),
        Err(FormatError::Failed { formatter, message }) => {
            trace!(formatter = name, nested = %formatter, "nested formatting failed");
            FormattedValue::failed(FormatError::Failed { formatter, message })
        }
    })
}

fn quote(name: &str, s: &str) -> Result<String, FormatError> {
    serde_json::to_string(s).map_err(|e| FormatError::Failed {
        formatter: name.to_string(),
        message: e.to_string(),
    })
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

pub(crate) fn number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n == f64::INFINITY {
        "Infinity".to_string()
    } else if n == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        let abs = n.abs();
        if abs >= 1e21 || (abs != 0.0 && abs < 1e-6) {
            exponent(n)
        } else {
            n.to_string()
        }
    }
}

/// `1e21` as `1e+21`, `1.5e-7` as `1.5e-7`.
fn exponent(n: f64) -> String {
    let s = format!("{n:e}");
    match s.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
        _ => s,
    }
}

/// Largest time value a Date can hold, in milliseconds either side of the epoch.
const MAX_TIME_MS: f64 = 8.64e15;

/// Render up to `max_items` entries, noting how many were left out.
fn entries<T, F>(
    ctx: &mut FormatCtx<'_>,
    items: &[T],
    mut render: F,
) -> Result<String, FormatError>
where
    F: FnMut(&mut FormatCtx<'_>, &T) -> Result<String, FormatError>,
{
    let max = ctx.options().max_items;
    let mut parts = Vec::with_capacity(items.len().min(max) + 1);
    for item in items.iter().take(max) {
        parts.push(render(ctx, item)?);
    }
    if items.len() > max {
        parts.push(format!("...+{}", items.len() - max));
    }
    Ok(parts.iter().join(","))
}

pub struct Primitive;
impl Formatter for Primitive {
    fn name(&self) -> &str {
        "primitive"
    }

    fn value(&self, _ctx: &mut FormatCtx<'_>, value: &Value) -> Option<FormattedValue> {
        let s = match value {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => number(*n),
            Value::BigInt(n) => format!("{n}n"),
            Value::Symbol(sym) => format!("Symbol({})", sym.description.as_deref().unwrap_or("")),
            _ => return None,
        };
        Some(FormattedValue::ok(s))
    }
}

pub struct Text;
impl Formatter for Text {
    fn name(&self) -> &str {
        "string"
    }

    fn value(&self, ctx: &mut FormatCtx<'_>, value: &Value) -> Option<FormattedValue> {
        let Value::String(s) = value else { return None };
        let max = ctx.options().max_string_len;
        let rendered = if s.chars().count() > max {
            let head: String = s.chars().take(max).collect();
            quote(self.name(), &head).map(|q| format!("{q}..."))
        } else {
            quote(self.name(), s)
        };
        finish(self.name(), rendered)
    }
}

/// ISO-8601 in UTC with milliseconds. Fractional milliseconds are truncated
/// toward zero and times beyond ±8.64e15 ms are `Invalid Date`. chrono
/// stops at year 262143 (about 8.2e15 ms), so times between that and the
/// bound also render as `Invalid Date`.
pub struct Date;
impl Formatter for Date {
    fn name(&self) -> &str {
        "date"
    }

    fn value(&self, _ctx: &mut FormatCtx<'_>, value: &Value) -> Option<FormattedValue> {
        let Value::Date(ms) = value else { return None };
        let time = ms.trunc();
        let iso = if time.is_finite() && time.abs() <= MAX_TIME_MS {
            DateTime::<Utc>::from_timestamp_millis(time as i64)
                .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        } else {
            None
        };
        Some(FormattedValue::ok(iso.unwrap_or_else(|| "Invalid Date".to_string())))
    }
}

pub struct RegExp;
impl Formatter for RegExp {
    fn name(&self) -> &str {
        "regexp"
    }

    fn value(&self, _ctx: &mut FormatCtx<'_>, value: &Value) -> Option<FormattedValue> {
        let Value::RegExp { source, flags } = value else { return None };
        Some(FormattedValue::ok(format!("/{source}/{flags}")))
    }
}

pub struct ErrorValue;
impl Formatter for ErrorValue {
    fn name(&self) -> &str {
        "error"
    }

    fn value(&self, _ctx: &mut FormatCtx<'_>, value: &Value) -> Option<FormattedValue> {
        let Value::Error { name, message } = value else { return None };
        Some(FormattedValue::ok(if message.is_empty() {
            format!("[{name}]")
        } else {
            format!("[{name}: {message}]")
        }))
    }
}

pub struct Function;
impl Formatter for Function {
    fn name(&self) -> &str {
        "function"
    }

    fn value(&self, _ctx: &mut FormatCtx<'_>, value: &Value) -> Option<FormattedValue> {
        let Value::Function(f) = value else { return None };
        let name = f.name.as_deref().filter(|n| !n.is_empty()).unwrap_or("<anonymous>");
        Some(FormattedValue::ok(format!("[Function {name}]")))
    }
}

pub struct Array;
impl Formatter for Array {
    fn name(&self) -> &str {
        "array"
    }

    fn value(&self, ctx: &mut FormatCtx<'_>, value: &Value) -> Option<FormattedValue> {
        let Value::Array(items) = value else { return None };
        let items = items.borrow();
        let body = entries(ctx, &items[..], |ctx, item| ctx.format(item));
        finish(self.name(), body.map(|b| format!("[{b}]")))
    }
}

pub struct Map;
impl Formatter for Map {
    fn name(&self) -> &str {
        "map"
    }

    fn value(&self, ctx: &mut FormatCtx<'_>, value: &Value) -> Option<FormattedValue> {
        let Value::Map(pairs) = value else { return None };
        let pairs = pairs.borrow();
        let body = entries(ctx, &pairs[..], |ctx, (k, v)| {
            Ok(format!("{}=>{}", ctx.format(k)?, ctx.format(v)?))
        });
        finish(self.name(), body.map(|b| format!("Map{{{b}}}")))
    }
}

pub struct Set;
impl Formatter for Set {
    fn name(&self) -> &str {
        "set"
    }

    fn value(&self, ctx: &mut FormatCtx<'_>, value: &Value) -> Option<FormattedValue> {
        let Value::Set(members) = value else { return None };
        let members = members.borrow();
        let body = entries(ctx, &members[..], |ctx, item| ctx.format(item));
        finish(self.name(), body.map(|b| format!("Set[{b}]")))
    }
}

pub struct Object;
impl Formatter for Object {
    fn name(&self) -> &str {
        "object"
    }

    fn value(&self, ctx: &mut FormatCtx<'_>, value: &Value) -> Option<FormattedValue> {
        let Value::Object(obj) = value else { return None };
        let obj = obj.borrow();
        let props: Vec<(&str, &Value)> = obj.iter().collect();
        let name = self.name();
        let body = entries(ctx, &props[..], |ctx, (key, v)| {
            let key = if is_identifier(key) { key.to_string() } else { quote(name, key)? };
            Ok(format!("{key}:{}", ctx.format(v)?))
        });
        let prefix = obj.class().unwrap_or("");
        finish(name, body.map(|b| format!("{prefix}{{{b}}}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use pretty_assertions::assert_eq;

    fn fmt(v: &Value) -> String {
        format_value(&Config::default(), v).unwrap()
    }

    #[test]
    fn primitives() {
        assert_eq!(fmt(&Value::Undefined), "undefined");
        assert_eq!(fmt(&Value::Number(1.0)), "1");
        assert_eq!(fmt(&Value::Number(-0.0)), "-0");
        assert_eq!(fmt(&Value::Number(f64::NEG_INFINITY)), "-Infinity");
        assert_eq!(fmt(&Value::BigInt(7)), "7n");
        assert_eq!(fmt(&Value::Number(123.0)), "123");
        assert_eq!(fmt(&Value::Number(0.000001)), "0.000001");
        assert_eq!(fmt(&Value::from("a\"b")), r#""a\"b""#);
    }

    #[test]
    fn large_and_small_numbers_use_exponents() {
        assert_eq!(fmt(&Value::Number(1e21)), "1e+21");
        assert_eq!(fmt(&Value::Number(-2.5e30)), "-2.5e+30");
        assert_eq!(fmt(&Value::Number(1.5e-7)), "1.5e-7");
        assert_eq!(fmt(&Value::Number(1e20)), "100000000000000000000");
    }

    #[test]
    fn dates_truncate_and_clip() {
        assert_eq!(fmt(&Value::date(1.9)), "1970-01-01T00:00:00.001Z");
        assert_eq!(fmt(&Value::date(-1.9)), "1969-12-31T23:59:59.999Z");
        assert_eq!(fmt(&Value::date(8.64e15 + 1.0)), "Invalid Date");
        assert_eq!(fmt(&Value::date(f64::INFINITY)), "Invalid Date");
    }

    #[test]
    fn built_in_objects() {
        assert_eq!(fmt(&Value::date(0.0)), "1970-01-01T00:00:00.000Z");
        assert_eq!(fmt(&Value::date(f64::NAN)), "Invalid Date");
        assert_eq!(fmt(&Value::regexp("a+", "gi")), "/a+/gi");
        assert_eq!(fmt(&Value::error("TypeError", "nope")), "[TypeError: nope]");
        assert_eq!(fmt(&Value::function("run")), "[Function run]");
        assert_eq!(fmt(&Value::anonymous_function()), "[Function <anonymous>]");
    }

    #[test]
    fn containers() {
        let obj = Value::object([("tea", Value::from("chai")), ("has space", Value::from(1))]);
        assert_eq!(fmt(&obj), r#"{tea:"chai","has space":1}"#);
        assert_eq!(fmt(&Value::instance("Point", [("x", 1)])), "Point{x:1}");
        assert_eq!(fmt(&Value::map([(1, "a"), (2, "b")])), r#"Map{1=>"a",2=>"b"}"#);
        assert_eq!(fmt(&Value::set([1, 2])), "Set[1,2]");
    }

    #[test]
    fn cycles_and_limits() {
        let o = Value::object([("a", 1)]);
        o.set_prop("self", o.clone());
        assert_eq!(fmt(&o), "{a:1,self:[<circular>]}");

        let mut cfg = Config::default();
        cfg.format.max_items = 2;
        cfg.format.max_depth = 1;
        cfg.format.max_string_len = 3;
        let long = Value::array([Value::array([1]), Value::from(2), Value::from(3)]);
        assert_eq!(format_value(&cfg, &long).unwrap(), "[[...],2,...+1]");
        assert_eq!(format_value(&cfg, &Value::from("abcdef")).unwrap(), r#""abc"..."#);
    }

    #[test]
    fn shared_but_acyclic_is_printed_twice() {
        let leaf = Value::array([1]);
        let v = Value::array([leaf.clone(), leaf]);
        assert_eq!(fmt(&v), "[[1],[1]]");
    }
}
