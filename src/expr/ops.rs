//! Prefix and infix operator semantics over [Value].
//!
//! Mixed numeric operands are promoted through one shared ladder before the
//! operator applies: machine integer with float becomes float, machine integer
//! with big integer becomes big integer, and big integer with float becomes
//! float (lossy). Machine-integer arithmetic wraps, except left shift which
//! detects overflow and re-runs in arbitrary precision.

use std::fmt;

use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};

use crate::errors::EvalError;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    Neg,
    Not,
}

impl fmt::Display for PrefixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrefixOp::Neg => write!(f, "-"),
            PrefixOp::Not => write!(f, "not"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eq,
    NotEq,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
}

impl fmt::Display for InfixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InfixOp::Add => "+",
            InfixOp::Sub => "-",
            InfixOp::Mul => "*",
            InfixOp::Div => "/",
            InfixOp::Mod => "%",
            InfixOp::Lt => "<",
            InfixOp::LtEq => "<=",
            InfixOp::Gt => ">",
            InfixOp::GtEq => ">=",
            InfixOp::Eq => "==",
            InfixOp::NotEq => "!=",
            InfixOp::Shl => "<<",
            InfixOp::Shr => ">>",
            InfixOp::BitAnd => "&",
            InfixOp::BitOr => "|",
            InfixOp::BitXor => "^",
            InfixOp::And => "and",
            InfixOp::Or => "or",
        };
        write!(f, "{}", s)
    }
}

fn invalid(l: &Value, op: InfixOp, r: &Value) -> EvalError {
    EvalError::InvalidOperation(format!("{} {} {}", l, op, r))
}

fn invalid_prefix(op: PrefixOp, v: &Value) -> EvalError {
    EvalError::InvalidOperation(format!("{} {}", op, v))
}

fn zero_div(l: &Value, r: &Value) -> EvalError {
    EvalError::DivisionByZero {
        lhs: l.to_string(),
        rhs: r.to_string(),
    }
}

/// The operand pair after numeric promotion.
enum NumPair {
    Int(i64, i64),
    Float(f64, f64),
    Big(BigInt, BigInt),
}

fn big_to_f64(v: &BigInt) -> f64 {
    v.to_f64().unwrap_or(f64::NAN)
}

fn promote(l: &Value, r: &Value) -> Option<NumPair> {
    match (l, r) {
        (Value::Int(l), Value::Int(r)) => Some(NumPair::Int(*l, *r)),
        (Value::Int(l), Value::Float(r)) => Some(NumPair::Float(*l as f64, *r)),
        (Value::Int(l), Value::Big(r)) => Some(NumPair::Big(BigInt::from(*l), r.clone())),
        (Value::Float(l), Value::Int(r)) => Some(NumPair::Float(*l, *r as f64)),
        (Value::Float(l), Value::Float(r)) => Some(NumPair::Float(*l, *r)),
        (Value::Float(l), Value::Big(r)) => Some(NumPair::Float(*l, big_to_f64(r))),
        (Value::Big(l), Value::Int(r)) => Some(NumPair::Big(l.clone(), BigInt::from(*r))),
        (Value::Big(l), Value::Float(r)) => Some(NumPair::Float(big_to_f64(l), *r)),
        (Value::Big(l), Value::Big(r)) => Some(NumPair::Big(l.clone(), r.clone())),
        _ => None,
    }
}

pub fn prefix(op: PrefixOp, v: &Value) -> Result<Value, EvalError> {
    match (op, v) {
        (PrefixOp::Neg, Value::Int(v)) => Ok(Value::Int(v.wrapping_neg())),
        (PrefixOp::Neg, Value::Float(v)) => Ok(Value::Float(-v)),
        (PrefixOp::Neg, Value::Big(v)) => Ok(Value::Big(-v)),
        (PrefixOp::Not, Value::Bool(v)) => Ok(Value::Bool(!v)),
        _ => Err(invalid_prefix(op, v)),
    }
}

pub fn infix(op: InfixOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    match op {
        InfixOp::Add => add(l, r),
        InfixOp::Sub => arith(op, l, r, i64::wrapping_sub, |a, b| a - b, |a, b| a - b),
        InfixOp::Mul => arith(op, l, r, i64::wrapping_mul, |a, b| a * b, |a, b| a * b),
        InfixOp::Div => div(l, r),
        InfixOp::Mod => modulo(l, r),
        InfixOp::Lt | InfixOp::LtEq | InfixOp::Gt | InfixOp::GtEq => compare(op, l, r),
        InfixOp::Eq => eq(l, r),
        InfixOp::NotEq => not_eq(l, r),
        InfixOp::Shl => shl(l, r),
        InfixOp::Shr => shr(l, r),
        InfixOp::BitAnd => bitwise(op, l, r, |a, b| a & b, |a, b| a & b),
        InfixOp::BitOr => bitwise(op, l, r, |a, b| a | b, |a, b| a | b),
        InfixOp::BitXor => bitwise(op, l, r, |a, b| a ^ b, |a, b| a ^ b),
        InfixOp::And => logic(op, l, r, |a, b| a && b),
        InfixOp::Or => logic(op, l, r, |a, b| a || b),
    }
}

/// Equality as a boolean, for switch-case and enum matching.
pub fn value_eq(l: &Value, r: &Value) -> Result<bool, EvalError> {
    match eq(l, r)? {
        Value::Bool(b) => Ok(b),
        _ => unreachable!("eq evaluates to a boolean"),
    }
}

fn add(l: &Value, r: &Value) -> Result<Value, EvalError> {
    if let (Value::Str(a), Value::Str(b)) = (l, r) {
        return Ok(Value::Str(format!("{}{}", a, b)));
    }
    arith(InfixOp::Add, l, r, i64::wrapping_add, |a, b| a + b, |a, b| a + b)
}

fn arith(
    op: InfixOp,
    l: &Value,
    r: &Value,
    int_fn: fn(i64, i64) -> i64,
    float_fn: fn(f64, f64) -> f64,
    big_fn: fn(BigInt, BigInt) -> BigInt,
) -> Result<Value, EvalError> {
    match promote(l, r) {
        Some(NumPair::Int(a, b)) => Ok(Value::Int(int_fn(a, b))),
        Some(NumPair::Float(a, b)) => Ok(Value::Float(float_fn(a, b))),
        Some(NumPair::Big(a, b)) => Ok(Value::Big(big_fn(a, b))),
        None => Err(invalid(l, op, r)),
    }
}

fn div(l: &Value, r: &Value) -> Result<Value, EvalError> {
    match promote(l, r) {
        Some(NumPair::Int(a, b)) => {
            if b == 0 {
                if a == 0 {
                    return Ok(Value::Float(f64::NAN));
                }
                return Err(zero_div(l, r));
            }
            Ok(Value::Int(a.wrapping_div(b)))
        }
        Some(NumPair::Float(a, b)) => {
            if b == 0.0 {
                if a == 0.0 {
                    return Ok(Value::Float(f64::NAN));
                }
                return Err(zero_div(l, r));
            }
            Ok(Value::Float(a / b))
        }
        Some(NumPair::Big(a, b)) => {
            if b.is_zero() {
                if a.is_zero() {
                    return Ok(Value::Float(f64::NAN));
                }
                return Err(zero_div(l, r));
            }
            // exact quotient when evenly divisible, float approximation
            // otherwise
            if (&a % &b).is_zero() {
                Ok(Value::Big(a / b))
            } else {
                Ok(Value::Float(big_to_f64(&a) / big_to_f64(&b)))
            }
        }
        None => Err(invalid(l, InfixOp::Div, r)),
    }
}

fn modulo(l: &Value, r: &Value) -> Result<Value, EvalError> {
    match promote(l, r) {
        Some(NumPair::Int(a, b)) => {
            if b == 0 {
                return Err(zero_div(l, r));
            }
            Ok(Value::Int(a.wrapping_rem(b)))
        }
        Some(NumPair::Float(a, b)) => {
            if b == 0.0 {
                return Err(zero_div(l, r));
            }
            Ok(Value::Float(a % b))
        }
        Some(NumPair::Big(a, b)) => {
            if b.is_zero() {
                return Err(zero_div(l, r));
            }
            Ok(Value::Big(a % b))
        }
        None => Err(invalid(l, InfixOp::Mod, r)),
    }
}

fn compare(op: InfixOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    use std::cmp::Ordering;

    let holds = |ord: Ordering| match op {
        InfixOp::Lt => ord == Ordering::Less,
        InfixOp::LtEq => ord != Ordering::Greater,
        InfixOp::Gt => ord == Ordering::Greater,
        InfixOp::GtEq => ord != Ordering::Less,
        _ => unreachable!(),
    };

    if let (Value::Str(a), Value::Str(b)) = (l, r) {
        return Ok(Value::Bool(holds(a.cmp(b))));
    }
    match promote(l, r) {
        Some(NumPair::Int(a, b)) => Ok(Value::Bool(holds(a.cmp(&b)))),
        Some(NumPair::Float(a, b)) => {
            // NaN compares false under every ordering operator
            let v = match a.partial_cmp(&b) {
                Some(ord) => holds(ord),
                None => false,
            };
            Ok(Value::Bool(v))
        }
        Some(NumPair::Big(a, b)) => Ok(Value::Bool(holds(a.cmp(&b)))),
        None => Err(invalid(l, op, r)),
    }
}

fn eq(l: &Value, r: &Value) -> Result<Value, EvalError> {
    match (l, r) {
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(a == b)),
        (Value::Str(a), Value::Str(b)) => Ok(Value::Bool(a == b)),
        (Value::Array(a), Value::Array(b)) => {
            if a.len() != b.len() {
                return Ok(Value::Bool(false));
            }
            for (i, (av, bv)) in a.iter().zip(b.iter()).enumerate() {
                let v = eq(av, bv).map_err(|err| EvalError::AtIndex(i, Box::new(err)))?;
                if v == Value::Bool(false) {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
        _ => match promote(l, r) {
            Some(NumPair::Int(a, b)) => Ok(Value::Bool(a == b)),
            Some(NumPair::Float(a, b)) => Ok(Value::Bool(a == b)),
            Some(NumPair::Big(a, b)) => Ok(Value::Bool(a == b)),
            None => Err(invalid(l, InfixOp::Eq, r)),
        },
    }
}

fn not_eq(l: &Value, r: &Value) -> Result<Value, EvalError> {
    // negation of equality; nested errors propagate unchanged
    match eq(l, r) {
        Ok(Value::Bool(b)) => Ok(Value::Bool(!b)),
        Ok(_) => unreachable!("eq evaluates to a boolean"),
        Err(EvalError::InvalidOperation(_)) => Err(invalid(l, InfixOp::NotEq, r)),
        Err(err) => Err(err),
    }
}

fn shl(l: &Value, r: &Value) -> Result<Value, EvalError> {
    match promote(l, r) {
        Some(NumPair::Int(a, b)) => Ok(shl_int(a, b, l, r)?),
        Some(NumPair::Float(a, b)) => Ok(shl_int(a as i64, b as i64, l, r)?),
        Some(NumPair::Big(a, b)) => {
            let n = b.to_usize().ok_or_else(|| invalid(l, InfixOp::Shl, r))?;
            Ok(Value::Big(a << n))
        }
        None => Err(invalid(l, InfixOp::Shl, r)),
    }
}

fn shl_int(a: i64, b: i64, l: &Value, r: &Value) -> Result<Value, EvalError> {
    if b < 0 {
        return Err(invalid(l, InfixOp::Shl, r));
    }
    // shift at machine width and check the result shifts back; on overflow
    // redo the operation in arbitrary precision
    if b < 64 {
        let v = a.wrapping_shl(b as u32);
        if v.wrapping_shr(b as u32) == a {
            return Ok(Value::Int(v));
        }
    }
    Ok(Value::Big(BigInt::from(a) << (b as usize)))
}

fn shr(l: &Value, r: &Value) -> Result<Value, EvalError> {
    let shr_int = |a: i64, b: i64| -> Result<Value, EvalError> {
        if b < 0 {
            return Err(invalid(l, InfixOp::Shr, r));
        }
        if b >= 64 {
            return Ok(Value::Int(if a < 0 { -1 } else { 0 }));
        }
        Ok(Value::Int(a >> b))
    };
    match promote(l, r) {
        Some(NumPair::Int(a, b)) => shr_int(a, b),
        Some(NumPair::Float(a, b)) => shr_int(a as i64, b as i64),
        Some(NumPair::Big(a, b)) => {
            let n = b.to_usize().ok_or_else(|| invalid(l, InfixOp::Shr, r))?;
            Ok(Value::Big(a >> n))
        }
        None => Err(invalid(l, InfixOp::Shr, r)),
    }
}

fn bitwise(
    op: InfixOp,
    l: &Value,
    r: &Value,
    int_fn: fn(i64, i64) -> i64,
    big_fn: fn(BigInt, BigInt) -> BigInt,
) -> Result<Value, EvalError> {
    match promote(l, r) {
        Some(NumPair::Int(a, b)) => Ok(Value::Int(int_fn(a, b))),
        Some(NumPair::Float(a, b)) => Ok(Value::Int(int_fn(a as i64, b as i64))),
        Some(NumPair::Big(a, b)) => Ok(Value::Big(big_fn(a, b))),
        None => Err(invalid(l, op, r)),
    }
}

fn logic(op: InfixOp, l: &Value, r: &Value, f: fn(bool, bool) -> bool) -> Result<Value, EvalError> {
    match (l, r) {
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(f(*a, *b))),
        _ => Err(invalid(l, op, r)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(v: i128) -> Value {
        Value::Big(BigInt::from(v))
    }

    #[test]
    fn test_promotion_int_float() {
        assert_eq!(
            infix(InfixOp::Add, &Value::Int(3), &Value::Float(1.5)).unwrap(),
            Value::Float(4.5)
        );
        assert_eq!(
            infix(InfixOp::Add, &Value::Float(1.5), &Value::Int(3)).unwrap(),
            Value::Float(4.5)
        );
    }

    #[test]
    fn test_promotion_int_big() {
        assert_eq!(
            infix(InfixOp::Add, &Value::Int(1), &big(10)).unwrap(),
            big(11)
        );
    }

    #[test]
    fn test_promotion_big_float_is_lossy_float() {
        assert_eq!(
            infix(InfixOp::Add, &big(2), &Value::Float(0.5)).unwrap(),
            Value::Float(2.5)
        );
    }

    #[test]
    fn test_div_zero_over_zero_is_nan() {
        match infix(InfixOp::Div, &Value::Int(0), &Value::Int(0)).unwrap() {
            Value::Float(v) => assert!(v.is_nan()),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_div_nonzero_over_zero_is_error() {
        match infix(InfixOp::Div, &Value::Int(5), &Value::Int(0)) {
            Err(EvalError::DivisionByZero { .. }) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_big_div_even_is_exact() {
        assert_eq!(infix(InfixOp::Div, &big(10), &big(5)).unwrap(), big(2));
    }

    #[test]
    fn test_big_div_uneven_falls_back_to_float() {
        match infix(InfixOp::Div, &big(10), &big(3)).unwrap() {
            Value::Float(v) => assert!((v - 10.0 / 3.0).abs() < 1e-12),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_shl_overflow_promotes_to_big() {
        assert_eq!(
            infix(InfixOp::Shl, &Value::Int(1), &Value::Int(3)).unwrap(),
            Value::Int(8)
        );
        assert_eq!(
            infix(InfixOp::Shl, &Value::Int(i64::MAX), &Value::Int(1)).unwrap(),
            Value::Big(BigInt::from(i64::MAX) << 1usize)
        );
        assert_eq!(
            infix(InfixOp::Shl, &Value::Int(1), &Value::Int(70)).unwrap(),
            Value::Big(BigInt::from(1) << 70usize)
        );
    }

    #[test]
    fn test_array_eq() {
        let a = Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let b = Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let short = Value::Array(vec![Value::Int(1), Value::Int(2)]);

        assert_eq!(infix(InfixOp::Eq, &a, &b).unwrap(), Value::Bool(true));
        // length mismatch is inequality, not an error
        assert_eq!(infix(InfixOp::Eq, &short, &a).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_array_eq_nested_error_carries_index() {
        let l = Value::Array(vec![Value::Int(1), Value::Str("x".into())]);
        let r = Value::Array(vec![Value::Int(1), Value::Int(2)]);
        match infix(InfixOp::Eq, &l, &r) {
            Err(EvalError::AtIndex(1, err)) => {
                assert!(matches!(*err, EvalError::InvalidOperation(_)))
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_array_not_eq_propagates_nested_error() {
        let l = Value::Array(vec![Value::Str("x".into())]);
        let r = Value::Array(vec![Value::Int(2)]);
        assert!(matches!(
            infix(InfixOp::NotEq, &l, &r),
            Err(EvalError::AtIndex(0, _))
        ));
    }

    #[test]
    fn test_string_ops() {
        assert_eq!(
            infix(InfixOp::Add, &"ab".into(), &"cd".into()).unwrap(),
            Value::Str("abcd".into())
        );
        assert_eq!(
            infix(InfixOp::Lt, &"abc".into(), &"abd".into()).unwrap(),
            Value::Bool(true)
        );
        // strings only concatenate and compare
        assert!(matches!(
            infix(InfixOp::Sub, &"ab".into(), &"cd".into()),
            Err(EvalError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_bool_only_combines_with_bool() {
        assert_eq!(
            infix(InfixOp::And, &Value::Bool(true), &Value::Bool(false)).unwrap(),
            Value::Bool(false)
        );
        match infix(InfixOp::Add, &Value::Bool(true), &Value::Int(1)) {
            Err(EvalError::InvalidOperation(msg)) => {
                assert!(msg.contains('+'));
                assert!(msg.contains("true"));
                assert!(msg.contains('1'));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_mod_by_zero_is_error_even_for_zero() {
        assert!(matches!(
            infix(InfixOp::Mod, &Value::Int(0), &Value::Int(0)),
            Err(EvalError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_bitwise_on_floats_truncates() {
        assert_eq!(
            infix(InfixOp::BitOr, &Value::Float(6.7), &Value::Int(1)).unwrap(),
            Value::Int(7)
        );
    }

    #[test]
    fn test_prefix_ops() {
        assert_eq!(prefix(PrefixOp::Neg, &Value::Int(5)).unwrap(), Value::Int(-5));
        assert_eq!(
            prefix(PrefixOp::Not, &Value::Bool(false)).unwrap(),
            Value::Bool(true)
        );
        assert!(prefix(PrefixOp::Not, &Value::Int(1)).is_err());
        assert!(prefix(PrefixOp::Neg, &Value::Bool(true)).is_err());
    }

    #[test]
    fn test_value_eq_mixed_numeric() {
        assert!(value_eq(&Value::Int(2), &big(2)).unwrap());
        assert!(!value_eq(&Value::Int(2), &Value::Float(2.5)).unwrap());
    }
}
