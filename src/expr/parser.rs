//! Recursive-descent parser producing the expression syntax tree.

use num_bigint::BigInt;

use crate::errors::SyntaxError;
use crate::expr::lexer::{lex, Tok, Token};
use crate::expr::ops::{InfixOp, PrefixOp};

/// A node in the parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Int(i64),
    Big(BigInt),
    Float(f64),
    Str(String),
    Bool(bool),
    /// Plain identifier, resolved through the caller-supplied callback.
    Ident(String),
    /// `ns::name`, used for enum lookups.
    ScopedIdent { ns: String, name: String },
    Prefix {
        op: PrefixOp,
        expr: Box<Node>,
    },
    Infix {
        op: InfixOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    /// `base.name` member access; only meaningful on scope values.
    Member { base: Box<Node>, name: String },
    /// `base[index]` array indexing.
    Index { base: Box<Node>, index: Box<Node> },
}

/// Parses `src` into a syntax tree. Trailing input is an error.
pub fn parse(src: &str) -> Result<Node, SyntaxError> {
    let tokens = lex(src)?;
    let mut p = Parser {
        tokens,
        pos: 0,
        src_len: src.len(),
    };
    let node = p.expr(0)?;
    if let Some(t) = p.peek() {
        return Err(SyntaxError {
            message: "unexpected trailing input".to_string(),
            start: t.start,
            end: t.end,
        });
    }
    Ok(node)
}

fn infix_prec(tok: &Tok) -> Option<(InfixOp, u8)> {
    let (op, prec) = match tok {
        Tok::Or => (InfixOp::Or, 1),
        Tok::And => (InfixOp::And, 2),
        Tok::EqEq => (InfixOp::Eq, 3),
        Tok::NotEq => (InfixOp::NotEq, 3),
        Tok::Lt => (InfixOp::Lt, 3),
        Tok::LtEq => (InfixOp::LtEq, 3),
        Tok::Gt => (InfixOp::Gt, 3),
        Tok::GtEq => (InfixOp::GtEq, 3),
        Tok::Pipe => (InfixOp::BitOr, 4),
        Tok::Caret => (InfixOp::BitXor, 4),
        Tok::Amp => (InfixOp::BitAnd, 5),
        Tok::Shl => (InfixOp::Shl, 6),
        Tok::Shr => (InfixOp::Shr, 6),
        Tok::Plus => (InfixOp::Add, 7),
        Tok::Minus => (InfixOp::Sub, 7),
        Tok::Star => (InfixOp::Mul, 8),
        Tok::Slash => (InfixOp::Div, 8),
        Tok::Percent => (InfixOp::Mod, 8),
        _ => return None,
    };
    Some((op, prec))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    src_len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned()?;
        self.pos += 1;
        Some(t)
    }

    fn err_here(&self, message: impl Into<String>) -> SyntaxError {
        let (start, end) = match self.peek() {
            Some(t) => (t.start, t.end),
            None => (self.src_len, self.src_len),
        };
        SyntaxError {
            message: message.into(),
            start,
            end,
        }
    }

    fn expect(&mut self, tok: Tok, what: &str) -> Result<(), SyntaxError> {
        match self.peek() {
            Some(t) if t.tok == tok => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(self.err_here(format!("expected {}", what))),
        }
    }

    fn expr(&mut self, min_prec: u8) -> Result<Node, SyntaxError> {
        let mut lhs = self.unary()?;

        while let Some((op, prec)) = self.peek().and_then(|t| infix_prec(&t.tok)) {
            if prec < min_prec {
                break;
            }
            self.pos += 1;
            let rhs = self.expr(prec + 1)?;
            lhs = Node::Infix {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }

        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Node, SyntaxError> {
        match self.peek().map(|t| &t.tok) {
            Some(Tok::Minus) => {
                self.pos += 1;
                Ok(Node::Prefix {
                    op: PrefixOp::Neg,
                    expr: Box::new(self.unary()?),
                })
            }
            Some(Tok::Not) => {
                self.pos += 1;
                Ok(Node::Prefix {
                    op: PrefixOp::Not,
                    expr: Box::new(self.unary()?),
                })
            }
            _ => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Result<Node, SyntaxError> {
        let mut node = self.primary()?;

        loop {
            match self.peek().map(|t| &t.tok) {
                Some(Tok::Dot) => {
                    self.pos += 1;
                    let name = match self.bump() {
                        Some(Token {
                            tok: Tok::Ident(name),
                            ..
                        }) => name,
                        _ => return Err(self.err_here("expected member name")),
                    };
                    node = Node::Member {
                        base: Box::new(node),
                        name,
                    };
                }
                Some(Tok::LBracket) => {
                    self.pos += 1;
                    let index = self.expr(0)?;
                    self.expect(Tok::RBracket, "]")?;
                    node = Node::Index {
                        base: Box::new(node),
                        index: Box::new(index),
                    };
                }
                _ => return Ok(node),
            }
        }
    }

    fn primary(&mut self) -> Result<Node, SyntaxError> {
        let t = match self.bump() {
            Some(t) => t,
            None => return Err(self.err_here("unexpected end of expression")),
        };
        match t.tok {
            Tok::Int(v) => Ok(Node::Int(v)),
            Tok::Big(v) => Ok(Node::Big(v)),
            Tok::Float(v) => Ok(Node::Float(v)),
            Tok::Str(v) => Ok(Node::Str(v)),
            Tok::True => Ok(Node::Bool(true)),
            Tok::False => Ok(Node::Bool(false)),
            Tok::Ident(name) => {
                if self.peek().map(|t| &t.tok) == Some(&Tok::ColonColon) {
                    self.pos += 1;
                    match self.bump() {
                        Some(Token {
                            tok: Tok::Ident(member),
                            ..
                        }) => Ok(Node::ScopedIdent { ns: name, name: member }),
                        _ => Err(self.err_here("expected name after ::")),
                    }
                } else {
                    Ok(Node::Ident(name))
                }
            }
            Tok::LParen => {
                let node = self.expr(0)?;
                self.expect(Tok::RParen, ")")?;
                Ok(node)
            }
            _ => Err(SyntaxError {
                message: "expected a value".to_string(),
                start: t.start,
                end: t.end,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        assert_eq!(
            parse("1 + 2 * 3").unwrap(),
            Node::Infix {
                op: InfixOp::Add,
                lhs: Box::new(Node::Int(1)),
                rhs: Box::new(Node::Infix {
                    op: InfixOp::Mul,
                    lhs: Box::new(Node::Int(2)),
                    rhs: Box::new(Node::Int(3)),
                }),
            }
        );
    }

    #[test]
    fn test_parens_override() {
        assert_eq!(
            parse("(1 + 2) * 3").unwrap(),
            Node::Infix {
                op: InfixOp::Mul,
                lhs: Box::new(Node::Infix {
                    op: InfixOp::Add,
                    lhs: Box::new(Node::Int(1)),
                    rhs: Box::new(Node::Int(2)),
                }),
                rhs: Box::new(Node::Int(3)),
            }
        );
    }

    #[test]
    fn test_left_associative() {
        // 8 - 4 - 2 parses as (8 - 4) - 2
        assert_eq!(
            parse("8 - 4 - 2").unwrap(),
            Node::Infix {
                op: InfixOp::Sub,
                lhs: Box::new(Node::Infix {
                    op: InfixOp::Sub,
                    lhs: Box::new(Node::Int(8)),
                    rhs: Box::new(Node::Int(4)),
                }),
                rhs: Box::new(Node::Int(2)),
            }
        );
    }

    #[test]
    fn test_logic_binds_loosest() {
        let n = parse("a == 1 and b == 2").unwrap();
        match n {
            Node::Infix { op: InfixOp::And, .. } => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_prefix() {
        assert_eq!(
            parse("-x").unwrap(),
            Node::Prefix {
                op: PrefixOp::Neg,
                expr: Box::new(Node::Ident("x".into())),
            }
        );
        assert_eq!(
            parse("not true").unwrap(),
            Node::Prefix {
                op: PrefixOp::Not,
                expr: Box::new(Node::Bool(true)),
            }
        );
    }

    #[test]
    fn test_scoped_ident() {
        assert_eq!(
            parse("color::red").unwrap(),
            Node::ScopedIdent {
                ns: "color".into(),
                name: "red".into(),
            }
        );
    }

    #[test]
    fn test_member_and_index() {
        assert_eq!(
            parse("_parent.len").unwrap(),
            Node::Member {
                base: Box::new(Node::Ident("_parent".into())),
                name: "len".into(),
            }
        );
        assert_eq!(
            parse("xs[1]").unwrap(),
            Node::Index {
                base: Box::new(Node::Ident("xs".into())),
                index: Box::new(Node::Int(1)),
            }
        );
    }

    #[test]
    fn test_trailing_input() {
        let err = parse("1 2").unwrap_err();
        assert_eq!((err.start, err.end), (2, 3));
    }

    #[test]
    fn test_missing_operand() {
        assert!(parse("1 +").is_err());
        assert!(parse("(1").is_err());
    }
}
