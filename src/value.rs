//! Runtime values exchanged between the expression engine and the decoder.

use std::fmt;

use num_bigint::BigInt;
use num_traits::ToPrimitive;

/// Opaque handle to a decode context, handed out by the decoder for the
/// `_io`, `_parent` and `_root` built-ins. Member access on a [Value::Scope]
/// routes back through the resolver callback; no operator accepts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeRef(pub usize);

/// The tagged union of runtime values.
///
/// Mixed-type arithmetic follows the numeric tower: `Int` promotes to `Float`
/// or `Big` as needed, and `Big` combined with `Float` converts to `Float`
/// (lossy).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Big(BigInt),
    Str(String),
    Array(Vec<Value>),
    Scope(ScopeRef),
}

impl Value {
    /// Wraps an unsigned decoded quantity, promoting past `i64::MAX` to `Big`.
    pub fn from_u64(v: u64) -> Value {
        match i64::try_from(v) {
            Ok(v) => Value::Int(v),
            Err(_) => Value::Big(BigInt::from(v)),
        }
    }

    /// Narrows to a machine integer: `Int` as is, `Float` truncated, `Big` if
    /// it fits. Anything else is `None`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) => Some(*v as i64),
            Value::Big(v) => v.to_i64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Value {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Float(v)
    }
}

impl From<BigInt> for Value {
    fn from(v: BigInt) -> Value {
        Value::Big(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::Str(v.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Big(v) => write!(f, "{}", v),
            Value::Str(v) => write!(f, "{:?}", v),
            Value::Array(vs) => {
                write!(f, "[")?;
                for (i, v) in vs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Scope(s) => write!(f, "<scope {}>", s.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u64_fits() {
        assert_eq!(Value::from_u64(42), Value::Int(42));
        assert_eq!(Value::from_u64(i64::MAX as u64), Value::Int(i64::MAX));
    }

    #[test]
    fn test_from_u64_promotes() {
        assert_eq!(Value::from_u64(u64::MAX), Value::Big(BigInt::from(u64::MAX)));
    }

    #[test]
    fn test_as_int() {
        assert_eq!(Value::Int(5).as_int(), Some(5));
        assert_eq!(Value::Float(5.9).as_int(), Some(5));
        assert_eq!(Value::Big(BigInt::from(7)).as_int(), Some(7));
        assert_eq!(Value::Str("5".into()).as_int(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Int(3).to_string(), "3");
        assert_eq!(Value::Str("a".into()).to_string(), "\"a\"");
        assert_eq!(
            Value::Array(vec![Value::Int(1), Value::Bool(true)]).to_string(),
            "[1, true]"
        );
    }
}
