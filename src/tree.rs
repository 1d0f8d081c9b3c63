//! The decoded output: a named, ordered field/value tree.

use num_bigint::BigInt;

use crate::value::Value;

/// A decoded value node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Bool(bool),
    UInt(u64),
    SInt(i64),
    Float(f64),
    Big(BigInt),
    Bytes(Vec<u8>),
    Str(String),
    Struct(Struct),
    Array(Vec<Node>),
}

/// One named field. `sym` is the enum symbol overlay: set when an attached
/// enum matched the decoded value, purely presentational, the raw value is
/// untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub value: Node,
    pub sym: Option<String>,
}

/// An ordered sequence of decoded fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Struct {
    pub fields: Vec<Field>,
}

impl Struct {
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn push(&mut self, name: impl Into<String>, value: Node, sym: Option<String>) {
        self.fields.push(Field {
            name: name.into(),
            value,
            sym,
        });
    }
}

impl Node {
    /// Converts an expression value into a tree node, for value instances
    /// materialized into the output. Scope values have no tree form.
    pub fn from_value(v: &Value) -> Option<Node> {
        match v {
            Value::Bool(v) => Some(Node::Bool(*v)),
            Value::Int(v) => Some(Node::SInt(*v)),
            Value::Float(v) => Some(Node::Float(*v)),
            Value::Big(v) => Some(Node::Big(v.clone())),
            Value::Str(v) => Some(Node::Str(v.clone())),
            Value::Array(vs) => {
                let ns: Option<Vec<Node>> = vs.iter().map(Node::from_value).collect();
                ns.map(Node::Array)
            }
            Value::Scope(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_by_name() {
        let mut s = Struct::default();
        s.push("a", Node::UInt(1), None);
        s.push("b", Node::Str("x".into()), None);
        assert_eq!(s.get("b").unwrap().value, Node::Str("x".into()));
        assert!(s.get("c").is_none());
    }

    #[test]
    fn test_from_value_round() {
        assert_eq!(Node::from_value(&Value::Int(-3)), Some(Node::SInt(-3)));
        assert_eq!(
            Node::from_value(&Value::Array(vec![Value::Bool(true)])),
            Some(Node::Array(vec![Node::Bool(true)]))
        );
    }
}
