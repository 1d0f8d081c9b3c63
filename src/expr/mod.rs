//! The embedded expression language: lexer, parser, operator semantics and
//! evaluator.
//!
//! Expressions never resolve identifiers themselves. Evaluation delegates
//! every identifier, namespaced identifier and scope member access to a
//! caller-supplied [Resolve] implementation; this callback is the only seam
//! between the expression engine and the decoder.

pub mod lexer;
pub mod ops;
pub mod parser;

pub use parser::Node;

use crate::errors::{EvalError, SyntaxError};
use crate::value::{ScopeRef, Value};

/// Identifier resolution callback supplied by the evaluation host.
///
/// `scope` is set when resolving a member access on a scope value
/// (`_parent.name`), `ns` when resolving a namespaced identifier
/// (`ns::name`).
pub trait Resolve {
    fn resolve(
        &mut self,
        scope: Option<ScopeRef>,
        ns: Option<&str>,
        name: &str,
    ) -> Result<Value, EvalError>;
}

/// Resolver with no bindings; every identifier fails. Used for expressions
/// that must be constant, like enum keys.
pub struct NoResolve;

impl Resolve for NoResolve {
    fn resolve(
        &mut self,
        _scope: Option<ScopeRef>,
        _ns: Option<&str>,
        name: &str,
    ) -> Result<Value, EvalError> {
        Err(EvalError::Resolve(format!(
            "failed to lookup ident {}",
            name
        )))
    }
}

/// An expression: original source text plus its parsed tree. Immutable once
/// parsed; schema loading parses every expression attribute eagerly so
/// malformed expressions never reach decode time.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub text: String,
    pub node: Node,
}

impl Expr {
    pub fn parse(text: &str) -> Result<Expr, SyntaxError> {
        Ok(Expr {
            text: text.to_string(),
            node: parser::parse(text)?,
        })
    }

    /// Evaluates the expression, routing identifier lookups through `r`.
    pub fn eval(&self, r: &mut dyn Resolve) -> Result<Value, EvalError> {
        eval_node(&self.node, r)
    }
}

fn eval_node(node: &Node, r: &mut dyn Resolve) -> Result<Value, EvalError> {
    match node {
        Node::Int(v) => Ok(Value::Int(*v)),
        Node::Big(v) => Ok(Value::Big(v.clone())),
        Node::Float(v) => Ok(Value::Float(*v)),
        Node::Str(v) => Ok(Value::Str(v.clone())),
        Node::Bool(v) => Ok(Value::Bool(*v)),
        Node::Ident(name) => r.resolve(None, None, name),
        Node::ScopedIdent { ns, name } => r.resolve(None, Some(ns), name),
        Node::Prefix { op, expr } => {
            let v = eval_node(expr, r)?;
            ops::prefix(*op, &v)
        }
        Node::Infix { op, lhs, rhs } => {
            let l = eval_node(lhs, r)?;
            let rv = eval_node(rhs, r)?;
            ops::infix(*op, &l, &rv)
        }
        Node::Member { base, name } => match eval_node(base, r)? {
            Value::Scope(scope) => r.resolve(Some(scope), None, name),
            v => Err(EvalError::InvalidOperation(format!("{}.{}", v, name))),
        },
        Node::Index { base, index } => {
            let base = eval_node(base, r)?;
            let index = eval_node(index, r)?;
            match base {
                Value::Array(vs) => {
                    let i = index
                        .as_int()
                        .ok_or_else(|| EvalError::BadIndex(index.to_string()))?;
                    let i = usize::try_from(i)
                        .ok()
                        .filter(|i| *i < vs.len())
                        .ok_or_else(|| EvalError::BadIndex(index.to_string()))?;
                    Ok(vs[i].clone())
                }
                v => Err(EvalError::BadIndex(format!("{} is not an array", v))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Test resolver over a flat name -> value map, with one enum namespace.
    struct MapResolve {
        vars: HashMap<String, Value>,
    }

    impl Resolve for MapResolve {
        fn resolve(
            &mut self,
            _scope: Option<ScopeRef>,
            ns: Option<&str>,
            name: &str,
        ) -> Result<Value, EvalError> {
            if let Some(ns) = ns {
                let key = format!("{}::{}", ns, name);
                return self
                    .vars
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| EvalError::Resolve(format!("failed to lookup {}", key)));
            }
            self.vars
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::Resolve(format!("failed to lookup ident {}", name)))
        }
    }

    fn eval(src: &str, vars: &[(&str, Value)]) -> Result<Value, EvalError> {
        let mut r = MapResolve {
            vars: vars
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        };
        Expr::parse(src).unwrap().eval(&mut r)
    }

    #[test]
    fn test_literals() {
        assert_eq!(eval("1 + 2 * 3", &[]).unwrap(), Value::Int(7));
        assert_eq!(eval("true and not false", &[]).unwrap(), Value::Bool(true));
        assert_eq!(eval("\"a\" + 'b'", &[]).unwrap(), Value::Str("ab".into()));
    }

    #[test]
    fn test_ident_resolution() {
        assert_eq!(
            eval("len * 2", &[("len", Value::Int(21))]).unwrap(),
            Value::Int(42)
        );
        assert!(matches!(
            eval("missing", &[]),
            Err(EvalError::Resolve(_))
        ));
    }

    #[test]
    fn test_scoped_ident_resolution() {
        assert_eq!(
            eval("color::red", &[("color::red", Value::Int(2))]).unwrap(),
            Value::Int(2)
        );
    }

    #[test]
    fn test_index() {
        let xs = Value::Array(vec![Value::Int(10), Value::Int(20)]);
        assert_eq!(eval("xs[1]", &[("xs", xs.clone())]).unwrap(), Value::Int(20));
        assert!(matches!(
            eval("xs[2]", &[("xs", xs)]),
            Err(EvalError::BadIndex(_))
        ));
    }

    #[test]
    fn test_member_on_non_scope_fails() {
        assert!(matches!(
            eval("x.y", &[("x", Value::Int(1))]),
            Err(EvalError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_no_resolve_for_constants() {
        let e = Expr::parse("0x10 | 0b11").unwrap();
        assert_eq!(e.eval(&mut NoResolve).unwrap(), Value::Int(0x13));
        assert!(Expr::parse("a").unwrap().eval(&mut NoResolve).is_err());
    }

    #[test]
    fn test_text_is_kept() {
        let e = Expr::parse("a > 0").unwrap();
        assert_eq!(e.text, "a > 0");
    }
}
