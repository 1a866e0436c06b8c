//! Runtime value type for `eval` expressions.
//!
//! Variables are stored as strings; values coerce to integers and floats
//! whenever an operator asks for a number.

use std::cmp::Ordering;
use std::fmt;

use crate::error::EvalError;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
}

impl Default for Value {
    fn default() -> Self {
        Value::Str(String::new())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) if x.fract() == 0.0 && x.abs() < 1e15 => write!(f, "{x:.1}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl Value {
    /// Read a stored variable, keeping numbers numeric.
    pub fn from_stored(s: &str) -> Self {
        let t = s.trim();
        if let Ok(n) = t.parse::<i64>() {
            Value::Int(n)
        } else if let Ok(x) = t.parse::<f64>() {
            Value::Float(x)
        } else {
            Value::Str(s.to_owned())
        }
    }

    /// `0`, `""` and `"0"` are falsy.
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty() && s != "0",
        }
    }

    /// Coerce to `i64`; non-numeric strings are 0.
    pub fn as_int(&self) -> i64 {
        match self {
            Value::Int(n) => *n,
            Value::Float(x) => *x as i64,
            Value::Str(s) => s.trim().parse().unwrap_or(0),
        }
    }

    pub fn as_float(&self) -> f64 {
        match self {
            Value::Int(n) => *n as f64,
            Value::Float(x) => *x,
            Value::Str(s) => s.trim().parse().unwrap_or(0.0),
        }
    }

    /// Name of the type, as returned by `whatis()`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Float(_) => "real",
            Value::Str(_) => "string",
        }
    }

    fn is_numeric(&self) -> bool {
        match self {
            Value::Int(_) | Value::Float(_) => true,
            Value::Str(s) => s.trim().parse::<f64>().is_ok(),
        }
    }

    fn is_float(&self) -> bool {
        match self {
            Value::Float(_) => true,
            Value::Int(_) => false,
            Value::Str(s) => s.trim().parse::<i64>().is_err() && s.trim().parse::<f64>().is_ok(),
        }
    }

    fn numeric(a: &Value, b: &Value, int_op: fn(i64, i64) -> Option<i64>, float_op: fn(f64, f64) -> f64) -> Value {
        if a.is_float() || b.is_float() {
            return Value::Float(float_op(a.as_float(), b.as_float()));
        }
        match int_op(a.as_int(), b.as_int()) {
            Some(n) => Value::Int(n),
            None => Value::Float(float_op(a.as_float(), b.as_float())),
        }
    }

    // ── Arithmetic ────────────────────────────────────────────────────────────

    /// Numeric addition, or concatenation when either side is not a number.
    pub fn arith_add(&self, rhs: &Value) -> Value {
        if !self.is_numeric() || !rhs.is_numeric() {
            return Value::Str(format!("{self}{rhs}"));
        }
        Self::numeric(self, rhs, i64::checked_add, |a, b| a + b)
    }

    pub fn arith_sub(&self, rhs: &Value) -> Value {
        Self::numeric(self, rhs, i64::checked_sub, |a, b| a - b)
    }

    pub fn arith_mul(&self, rhs: &Value) -> Value {
        Self::numeric(self, rhs, i64::checked_mul, |a, b| a * b)
    }

    pub fn arith_div(&self, rhs: &Value) -> Result<Value, EvalError> {
        if rhs.as_float() == 0.0 {
            return Err(EvalError::DivisionByZero);
        }
        Ok(Self::numeric(self, rhs, i64::checked_div, |a, b| a / b))
    }

    pub fn arith_rem(&self, rhs: &Value) -> Result<Value, EvalError> {
        if rhs.as_float() == 0.0 {
            return Err(EvalError::ModuloByZero);
        }
        Ok(Self::numeric(self, rhs, i64::checked_rem, |a, b| a % b))
    }

    pub fn arith_neg(&self) -> Value {
        match Value::from_stored(&self.to_string()) {
            Value::Int(n) => n.checked_neg().map_or(Value::Float(-(n as f64)), Value::Int),
            Value::Float(x) => Value::Float(-x),
            Value::Str(_) => Value::Int(0),
        }
    }

    /// Numeric comparison when both sides are numbers, string order otherwise.
    pub fn cmp_value(&self, rhs: &Value) -> Ordering {
        if self.is_numeric() && rhs.is_numeric() {
            self.as_float().partial_cmp(&rhs.as_float()).unwrap_or(Ordering::Equal)
        } else {
            self.to_string().cmp(&rhs.to_string())
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Int(i64::from(b))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
