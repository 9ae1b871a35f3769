//! Dynamic value model evaluated by the assertion core.
//!
//! Containers are shared handles so that object graphs may reference
//! themselves; two handles are the "same" value when they point at the same
//! allocation.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde_json::Value as JsonValue;

use crate::comparison::deep_equal;
use crate::config::Config;
use crate::format::format_value;

/// Shared, interior-mutable container handle.
pub type Shared<T> = Rc<RefCell<T>>;

/// A value under evaluation.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    BigInt(i128),
    String(String),
    Symbol(Rc<SymbolRef>),
    /// Milliseconds since the Unix epoch; `NaN` is an invalid date.
    Date(f64),
    RegExp { source: String, flags: String },
    Error { name: String, message: String },
    Function(Rc<FunctionRef>),
    Array(Shared<Vec<Value>>),
    Object(Shared<Object>),
    Map(Shared<Vec<(Value, Value)>>),
    Set(Shared<Vec<Value>>),
}

/// Identity-compared symbol.
#[derive(Debug, Default)]
pub struct SymbolRef {
    pub description: Option<String>,
}

/// Identity-compared function handle. Only the name is observable.
#[derive(Debug, Default)]
pub struct FunctionRef {
    pub name: Option<String>,
}

/// Own enumerable properties in insertion order, plus the constructor name
/// for class instances (`None` for plain objects).
#[derive(Clone, Default)]
pub struct Object {
    class: Option<String>,
    props: Vec<(String, Value)>,
}

impl Object {
    pub fn new(class: Option<String>) -> Self {
        Self { class, props: Vec::new() }
    }

    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.props.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Insert or replace `key`, keeping the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.props.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.props.push((key, value)),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.props.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.props.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }
}

/// Closed set of value categories, the typed replacement for a runtime
/// `typeof` probe. Async and generator functions are not distinguished from
/// plain functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Undefined,
    Null,
    Boolean,
    Number,
    BigInt,
    String,
    Symbol,
    Date,
    RegExp,
    Error,
    Function,
    Array,
    Object,
    Map,
    Set,
}

impl TypeTag {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeTag::Undefined => "undefined",
            TypeTag::Null => "null",
            TypeTag::Boolean => "boolean",
            TypeTag::Number => "number",
            TypeTag::BigInt => "bigint",
            TypeTag::String => "string",
            TypeTag::Symbol => "symbol",
            TypeTag::Date => "date",
            TypeTag::RegExp => "regexp",
            TypeTag::Error => "error",
            TypeTag::Function => "function",
            TypeTag::Array => "array",
            TypeTag::Object => "object",
            TypeTag::Map => "map",
            TypeTag::Set => "set",
        }
    }

    /// Name used by the `[object Tag]` rendering.
    pub fn class_name(self) -> &'static str {
        match self {
            TypeTag::Undefined => "Undefined",
            TypeTag::Null => "Null",
            TypeTag::Boolean => "Boolean",
            TypeTag::Number => "Number",
            TypeTag::BigInt => "BigInt",
            TypeTag::String => "String",
            TypeTag::Symbol => "Symbol",
            TypeTag::Date => "Date",
            TypeTag::RegExp => "RegExp",
            TypeTag::Error => "Error",
            TypeTag::Function => "Function",
            TypeTag::Array => "Array",
            TypeTag::Object => "Object",
            TypeTag::Map => "Map",
            TypeTag::Set => "Set",
        }
    }

    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            TypeTag::Undefined
                | TypeTag::Null
                | TypeTag::Boolean
                | TypeTag::Number
                | TypeTag::BigInt
                | TypeTag::String
                | TypeTag::Symbol
        )
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn shared<T>(inner: T) -> Shared<T> {
    Rc::new(RefCell::new(inner))
}

impl Value {
    pub fn array<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::Array(shared(items.into_iter().map(Into::into).collect()))
    }

    pub fn object<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::build_object(None, entries)
    }

    /// An object whose constructor is the named class.
    pub fn instance<I, K, V>(class: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::build_object(Some(class.into()), entries)
    }

    fn build_object<I, K, V>(class: Option<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut obj = Object::new(class);
        for (k, v) in entries {
            obj.insert(k, v.into());
        }
        Value::Object(shared(obj))
    }

    pub fn empty_object() -> Self {
        Value::Object(shared(Object::default()))
    }

    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Value>,
        V: Into<Value>,
    {
        Value::Map(shared(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    pub fn set<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut members: Vec<Value> = Vec::new();
        for item in items {
            let item = item.into();
            if !members.iter().any(|m| m.same_value_zero(&item)) {
                members.push(item);
            }
        }
        Value::Set(shared(members))
    }

    pub fn date(millis: f64) -> Self {
        Value::Date(millis)
    }

    pub fn regexp(source: impl Into<String>, flags: impl Into<String>) -> Self {
        Value::RegExp {
            source: source.into(),
            flags: flags.into(),
        }
    }

    pub fn error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Value::Error {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn function(name: impl Into<String>) -> Self {
        Value::Function(Rc::new(FunctionRef {
            name: Some(name.into()),
        }))
    }

    pub fn anonymous_function() -> Self {
        Value::Function(Rc::new(FunctionRef::default()))
    }

    pub fn symbol(description: impl Into<String>) -> Self {
        Value::Symbol(Rc::new(SymbolRef {
            description: Some(description.into()),
        }))
    }

    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Undefined => TypeTag::Undefined,
            Value::Null => TypeTag::Null,
            Value::Bool(_) => TypeTag::Boolean,
            Value::Number(_) => TypeTag::Number,
            Value::BigInt(_) => TypeTag::BigInt,
            Value::String(_) => TypeTag::String,
            Value::Symbol(_) => TypeTag::Symbol,
            Value::Date(_) => TypeTag::Date,
            Value::RegExp { .. } => TypeTag::RegExp,
            Value::Error { .. } => TypeTag::Error,
            Value::Function(_) => TypeTag::Function,
            Value::Array(_) => TypeTag::Array,
            Value::Object(_) => TypeTag::Object,
            Value::Map(_) => TypeTag::Map,
            Value::Set(_) => TypeTag::Set,
        }
    }

    pub fn is_primitive(&self) -> bool {
        self.type_tag().is_primitive()
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::BigInt(n) => *n != 0,
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Address of the shared allocation for containers, functions and
    /// symbols; `None` for values compared by content.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Array(rc) => Some(Rc::as_ptr(rc) as *const () as usize),
            Value::Object(rc) => Some(Rc::as_ptr(rc) as *const () as usize),
            Value::Map(rc) => Some(Rc::as_ptr(rc) as *const () as usize),
            Value::Set(rc) => Some(Rc::as_ptr(rc) as *const () as usize),
            Value::Function(rc) => Some(Rc::as_ptr(rc) as *const () as usize),
            Value::Symbol(rc) => Some(Rc::as_ptr(rc) as *const () as usize),
            _ => None,
        }
    }

    /// Identity of the values that can participate in a reference cycle.
    pub fn container_id(&self) -> Option<usize> {
        match self {
            Value::Array(_) | Value::Object(_) | Value::Map(_) | Value::Set(_) => self.identity(),
            _ => None,
        }
    }

    /// `SameValueZero`: `NaN` matches `NaN`, `+0` matches `-0`, handles by
    /// identity.
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => (a.is_nan() && b.is_nan()) || a == b,
            _ => match (self.identity(), other.identity()) {
                (Some(a), Some(b)) => a == b,
                (None, None) => crate::comparison::strict_equals(self, other),
                _ => false,
            },
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Whether property access on this value is meaningful.
    pub fn has_properties(&self) -> bool {
        !self.is_nullish()
    }

    /// Own property lookup. Arrays and strings answer `length` and numeric
    /// indexes; objects answer their own keys. Missing keys yield `None`.
    pub fn get_prop(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(obj) => obj.borrow().get(key).cloned(),
            Value::Array(items) => {
                let items = items.borrow();
                if key == "length" {
                    return Some(Value::Number(items.len() as f64));
                }
                key.parse::<usize>().ok().and_then(|i| items.get(i).cloned())
            }
            Value::String(s) => {
                if key == "length" {
                    return Some(Value::Number(s.encode_utf16().count() as f64));
                }
                key.parse::<usize>()
                    .ok()
                    .and_then(|i| s.chars().nth(i))
                    .map(|c| Value::String(c.to_string()))
            }
            Value::Map(entries) if key == "size" => {
                Some(Value::Number(entries.borrow().len() as f64))
            }
            Value::Set(members) if key == "size" => {
                Some(Value::Number(members.borrow().len() as f64))
            }
            Value::Error { name, message } => match key {
                "name" => Some(Value::String(name.clone())),
                "message" => Some(Value::String(message.clone())),
                _ => None,
            },
            Value::Function(f) if key == "name" => {
                Some(Value::String(f.name.clone().unwrap_or_default()))
            }
            _ => None,
        }
    }

    /// Set an own property on an object. Returns `false` for anything else.
    pub fn set_prop(&self, key: impl Into<String>, value: Value) -> bool {
        match self {
            Value::Object(obj) => {
                obj.borrow_mut().insert(key, value);
                true
            }
            _ => false,
        }
    }

    /// Append to an array, or add a new member to a set.
    pub fn push(&self, value: Value) -> bool {
        match self {
            Value::Array(items) => {
                items.borrow_mut().push(value);
                true
            }
            Value::Set(members) => {
                let mut members = members.borrow_mut();
                if !members.iter().any(|m| m.same_value_zero(&value)) {
                    members.push(value);
                }
                true
            }
            _ => false,
        }
    }

    /// Insert or replace a map entry; keys match by `SameValueZero`.
    pub fn map_insert(&self, key: Value, value: Value) -> bool {
        match self {
            Value::Map(entries) => {
                let mut entries = entries.borrow_mut();
                match entries.iter_mut().find(|(k, _)| k.same_value_zero(&key)) {
                    Some(slot) => slot.1 = value,
                    None => entries.push((key, value)),
                }
                true
            }
            _ => false,
        }
    }

    /// Render through the default formatter pipeline.
    pub fn display(&self) -> String {
        format_value(&Config::default(), self)
            .unwrap_or_else(|_| format!("[object {}]", self.type_tag().class_name()))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Structural equality with strict type checks.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        deep_equal(self, other, true)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(shared(items))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<&JsonValue> for Value {
    fn from(json: &JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            JsonValue::String(s) => Value::String(s.clone()),
            JsonValue::Array(items) => Value::array(items.iter().map(Value::from)),
            JsonValue::Object(map) => {
                Value::object(map.iter().map(|(k, v)| (k.clone(), Value::from(v))))
            }
        }
    }
}

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        Value::from(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn json_conversion_keeps_key_order_and_kinds() {
        let v = Value::from(json!({"a": 1, "b": [true, null], "c": "x"}));
        assert_eq!(v.type_tag(), TypeTag::Object);
        assert_eq!(v.get_prop("a"), Some(Value::Number(1.0)));
        let b = v.get_prop("b").unwrap();
        assert_eq!(b.get_prop("length"), Some(Value::Number(2.0)));
        assert_eq!(b.get_prop("1"), Some(Value::Null));
    }

    #[test]
    fn truthiness_follows_primitive_rules() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("0").is_truthy());
        assert!(Value::array(Vec::<Value>::new()).is_truthy());
    }

    #[test]
    fn set_deduplicates_members() {
        let s = Value::set([
            Value::from(1),
            Value::from(1),
            Value::Number(f64::NAN),
            Value::Number(f64::NAN),
        ]);
        assert_eq!(s.get_prop("size"), Some(Value::Number(2.0)));
        let o = Value::empty_object();
        assert!(s.push(o.clone()));
        assert!(s.push(o));
        assert_eq!(s.get_prop("size"), Some(Value::Number(3.0)));
    }

    #[test]
    fn self_reference_is_observable_through_identity() {
        let o = Value::empty_object();
        assert!(o.set_prop("self", o.clone()));
        let inner = o.get_prop("self").unwrap();
        assert_eq!(inner.identity(), o.identity());
    }
}
