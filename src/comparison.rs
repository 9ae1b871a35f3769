use std::rc::Rc;

use crate::value::{Object, Value};

/// Structural equality of two value graphs.
///
/// `strict` requires matching type tags for primitives and matching class
/// names for objects; otherwise primitives compare with loose coercion
/// (`1 == "1"`, `null == undefined`). `NaN` equals `NaN` in both modes.
/// Cyclic graphs terminate: a pair of handles that is already being compared
/// further up the walk counts as equal.
pub fn deep_equal(a: &Value, b: &Value, strict: bool) -> bool {
    Comparator::new(strict).equal(a, b)
}

pub fn deep_equal_loose(a: &Value, b: &Value) -> bool {
    deep_equal(a, b, false)
}

pub fn deep_equal_strict(a: &Value, b: &Value) -> bool {
    deep_equal(a, b, true)
}

/// Shallow `===`: primitives by value (`NaN` never equal), everything else
/// by identity or, for inline built-ins, by content.
pub fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::BigInt(x), Value::BigInt(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        _ => match (a.identity(), b.identity()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

/// Shallow `==`: primitives with loose coercion (`NaN` never equal),
/// everything else by identity.
pub fn loose_equals(a: &Value, b: &Value) -> bool {
    if let (Value::Number(x), Value::Number(y)) = (a, b) {
        return x == y;
    }
    if a.is_primitive() && b.is_primitive() {
        return loose_primitive(a, b).unwrap_or(false);
    }
    strict_equals(a, b)
}

struct Comparator {
    strict: bool,
    /// Container pairs currently on the comparison path.
    stack: Vec<(usize, usize)>,
}

impl Comparator {
    fn new(strict: bool) -> Self {
        Self {
            strict,
            stack: Vec::new(),
        }
    }

    fn equal(&mut self, a: &Value, b: &Value) -> bool {
        if let (Some(x), Some(y)) = (a.identity(), b.identity()) {
            if x == y {
                return true;
            }
        }

        if a.is_primitive() || b.is_primitive() {
            return self.primitives(a, b);
        }

        match (a, b) {
            (Value::Date(x), Value::Date(y)) => same_number(*x, *y),
            (
                Value::RegExp { source: sa, flags: fa },
                Value::RegExp { source: sb, flags: fb },
            ) => sa == sb && fa == fb,
            (
                Value::Error { name: na, message: ma },
                Value::Error { name: nb, message: mb },
            ) => na == nb && ma == mb,
            (Value::Array(x), Value::Array(y)) => self.guarded(a, b, |c| {
                c.sequences(&x.borrow(), &y.borrow())
            }),
            (Value::Object(x), Value::Object(y)) => {
                self.guarded(a, b, |c| c.objects(&x.borrow(), &y.borrow()))
            }
            (Value::Map(x), Value::Map(y)) => {
                self.guarded(a, b, |c| c.entries(&x.borrow(), &y.borrow()))
            }
            (Value::Set(x), Value::Set(y)) => {
                self.guarded(a, b, |c| c.members(&x.borrow(), &y.borrow()))
            }
            // functions reached here are distinct handles
            _ => false,
        }
    }

    fn primitives(&self, a: &Value, b: &Value) -> bool {
        if let (Value::Number(x), Value::Number(y)) = (a, b) {
            return same_number(*x, *y);
        }
        if self.strict || a.type_tag() == b.type_tag() {
            return a.type_tag() == b.type_tag() && strict_equals(a, b);
        }
        if !(a.is_primitive() && b.is_primitive()) {
            return false;
        }
        loose_primitive(a, b).unwrap_or(false)
    }

    fn guarded<F>(&mut self, a: &Value, b: &Value, compare: F) -> bool
    where
        F: FnOnce(&mut Self) -> bool,
    {
        let (Some(x), Some(y)) = (a.container_id(), b.container_id()) else {
            return compare(self);
        };
        if self.stack.contains(&(x, y)) {
            return true;
        }
        self.stack.push((x, y));
        let result = compare(self);
        self.stack.pop();
        result
    }

    fn sequences(&mut self, a: &[Value], b: &[Value]) -> bool {
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b).all(|(x, y)| self.equal(x, y))
    }

    fn objects(&mut self, a: &Object, b: &Object) -> bool {
        if self.strict && a.class() != b.class() {
            return false;
        }
        if a.len() != b.len() {
            return false;
        }
        for (key, av) in a.iter() {
            match b.get(key) {
                Some(bv) => {
                    if !self.equal(av, bv) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        true
    }

    /// Entry order is irrelevant: every entry of `a` must pair with a
    /// distinct entry of `b` with equal key and value.
    fn entries(&mut self, a: &[(Value, Value)], b: &[(Value, Value)]) -> bool {
        self.paired(a, b, |c, (ak, av), (bk, bv)| c.equal(ak, bk) && c.equal(av, bv))
    }

    fn members(&mut self, a: &[Value], b: &[Value]) -> bool {
        self.paired(a, b, |c, x, y| c.equal(x, y))
    }

    /// Whether `a` and `b` admit a one-to-one pairing under `eq`. Loose
    /// equality is not transitive, so a first-fit scan can miss a pairing
    /// that exists; this searches augmenting paths instead.
    fn paired<T, F>(&mut self, a: &[T], b: &[T], mut eq: F) -> bool
    where
        F: FnMut(&mut Self, &T, &T) -> bool,
    {
        if a.len() != b.len() {
            return false;
        }
        let mut candidates: Vec<Vec<usize>> = Vec::with_capacity(a.len());
        for x in a {
            let mut row = Vec::new();
            for (j, y) in b.iter().enumerate() {
                if eq(self, x, y) {
                    row.push(j);
                }
            }
            if row.is_empty() {
                return false;
            }
            candidates.push(row);
        }

        let mut owner: Vec<Option<usize>> = vec![None; b.len()];
        for i in 0..a.len() {
            let mut seen = vec![false; b.len()];
            if !augment(&candidates, i, &mut seen, &mut owner) {
                return false;
            }
        }
        true
    }
}

/// Try to pair `i` with one of its candidates, re-pairing earlier owners
/// along the way.
fn augment(
    candidates: &[Vec<usize>],
    i: usize,
    seen: &mut [bool],
    owner: &mut [Option<usize>],
) -> bool {
    for &j in &candidates[i] {
        if seen[j] {
            continue;
        }
        seen[j] = true;
        let free = match owner[j] {
            None => true,
            Some(k) => augment(candidates, k, seen, owner),
        };
        if free {
            owner[j] = Some(i);
            return true;
        }
    }
    false
}

fn same_number(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || a == b
}

/// Numeric reading of a string: surrounding whitespace ignored, empty is 0.
fn string_to_number(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return Some(0.0);
    }
    match t {
        "Infinity" | "+Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ if t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => None,
        _ => t.parse::<f64>().ok(),
    }
}

fn bigint_vs_number(n: i128, f: f64) -> bool {
    f.fract() == 0.0 && f.is_finite() && n as f64 == f
}

/// Abstract equality for two primitives of different kinds. `None` when no
/// coercion applies.
fn loose_primitive(a: &Value, b: &Value) -> Option<bool> {
    use Value::*;
    let result = match (a, b) {
        (Undefined | Null, Undefined | Null) => true,
        (Undefined | Null, _) | (_, Undefined | Null) => false,
        (Bool(x), Bool(y)) => x == y,
        (String(x), String(y)) => x == y,
        (BigInt(x), BigInt(y)) => x == y,
        (Number(x), Number(y)) => x == y,
        (Bool(x), other) | (other, Bool(x)) => {
            return loose_primitive(&Number(if *x { 1.0 } else { 0.0 }), other);
        }
        (Number(n), String(s)) | (String(s), Number(n)) => {
            string_to_number(s).map(|m| m == *n).unwrap_or(false)
        }
        (BigInt(n), Number(f)) | (Number(f), BigInt(n)) => bigint_vs_number(*n, *f),
        (BigInt(n), String(s)) | (String(s), BigInt(n)) => {
            s.trim().parse::<i128>().map(|m| m == *n).unwrap_or(false)
        }
        (Symbol(x), Symbol(y)) => Rc::ptr_eq(x, y),
        _ => return None,
    };
    Some(result)
}
