//! Tokenizer for the expression language.

use num_bigint::BigInt;

use crate::errors::SyntaxError;

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Int(i64),
    /// Integer literal too large for a machine integer.
    Big(BigInt),
    Float(f64),
    Str(String),
    Ident(String),
    True,
    False,
    And,
    Or,
    Not,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Lt,
    LtEq,
    Gt,
    GtEq,
    EqEq,
    NotEq,
    Shl,
    Shr,
    Amp,
    Pipe,
    Caret,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    ColonColon,
}

/// A token plus its byte span in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub start: usize,
    pub end: usize,
}

fn err(message: impl Into<String>, start: usize, end: usize) -> SyntaxError {
    SyntaxError {
        message: message.into(),
        start,
        end,
    }
}

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.src.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        String::from_utf8_lossy(&self.src[start..self.pos]).into_owned()
    }

    fn number(&mut self) -> Result<Tok, SyntaxError> {
        let start = self.pos;

        let radix = if self.peek() == Some(b'0') {
            match self.peek2() {
                Some(b'x') | Some(b'X') => 16,
                Some(b'b') | Some(b'B') => 2,
                Some(b'o') | Some(b'O') => 8,
                _ => 10,
            }
        } else {
            10
        };

        if radix != 10 {
            self.pos += 2;
            let digits_start = self.pos;
            while let Some(c) = self.peek() {
                if (c as char).is_digit(radix) || c == b'_' {
                    self.pos += 1;
                } else {
                    break;
                }
            }
            let digits: String = self.src[digits_start..self.pos]
                .iter()
                .map(|&c| c as char)
                .filter(|&c| c != '_')
                .collect();
            if digits.is_empty() {
                return Err(err("malformed number", start, self.pos));
            }
            return Ok(int_token(&digits, radix));
        }

        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        // a dot starts a fraction only when a digit follows, otherwise it is
        // member access on an integer literal
        if self.peek() == Some(b'.') && self.peek2().is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.pos += 1;
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() || c == b'_' {
                    self.pos += 1;
                } else {
                    break;
                }
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E'))
            && self
                .peek2()
                .is_some_and(|c| c.is_ascii_digit() || c == b'+' || c == b'-')
        {
            is_float = true;
            self.pos += 2;
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    self.pos += 1;
                } else {
                    break;
                }
            }
        }

        let text: String = self.src[start..self.pos]
            .iter()
            .map(|&c| c as char)
            .filter(|&c| c != '_')
            .collect();
        if is_float {
            text.parse::<f64>()
                .map(Tok::Float)
                .map_err(|_| err("malformed number", start, self.pos))
        } else {
            Ok(int_token(&text, 10))
        }
    }

    fn double_quoted(&mut self) -> Result<Tok, SyntaxError> {
        let start = self.pos;
        self.pos += 1;
        let mut s = String::new();
        loop {
            match self.bump() {
                None => return Err(err("unterminated string", start, self.pos)),
                Some(b'"') => return Ok(Tok::Str(s)),
                Some(b'\\') => match self.bump() {
                    Some(b'\\') => s.push('\\'),
                    Some(b'"') => s.push('"'),
                    Some(b'n') => s.push('\n'),
                    Some(b'r') => s.push('\r'),
                    Some(b't') => s.push('\t'),
                    Some(b'0') => s.push('\0'),
                    Some(b'x') => {
                        let hex_start = self.pos;
                        let h = self.bump();
                        let l = self.bump();
                        let v = match (h, l) {
                            (Some(h), Some(l)) => {
                                let h = (h as char).to_digit(16);
                                let l = (l as char).to_digit(16);
                                h.zip(l).map(|(h, l)| (h * 16 + l) as u8)
                            }
                            _ => None,
                        };
                        match v {
                            Some(v) => s.push(v as char),
                            None => return Err(err("malformed \\x escape", hex_start, self.pos)),
                        }
                    }
                    _ => return Err(err("unknown escape", self.pos - 1, self.pos)),
                },
                Some(c) => {
                    // keep multi-byte utf-8 sequences intact
                    let rest = &self.src[self.pos - 1..];
                    let ch_len = utf8_len(c);
                    if ch_len > 1 && rest.len() >= ch_len {
                        s.push_str(&String::from_utf8_lossy(&rest[..ch_len]));
                        self.pos += ch_len - 1;
                    } else {
                        s.push(c as char);
                    }
                }
            }
        }
    }

    fn single_quoted(&mut self) -> Result<Tok, SyntaxError> {
        let start = self.pos;
        self.pos += 1;
        let content_start = self.pos;
        loop {
            match self.bump() {
                None => return Err(err("unterminated string", start, self.pos)),
                Some(b'\'') => {
                    let s = String::from_utf8_lossy(&self.src[content_start..self.pos - 1]);
                    return Ok(Tok::Str(s.into_owned()));
                }
                Some(_) => {}
            }
        }
    }
}

fn utf8_len(first: u8) -> usize {
    match first {
        c if c >= 0xf0 => 4,
        c if c >= 0xe0 => 3,
        c if c >= 0xc0 => 2,
        _ => 1,
    }
}

fn int_token(digits: &str, radix: u32) -> Tok {
    match i64::from_str_radix(digits, radix) {
        Ok(v) => Tok::Int(v),
        Err(_) => match BigInt::parse_bytes(digits.as_bytes(), radix) {
            Some(v) => Tok::Big(v),
            None => Tok::Int(0), // digits already validated per radix
        },
    }
}

/// Tokenizes `src`, reporting the first malformed construct with its span.
pub fn lex(src: &str) -> Result<Vec<Token>, SyntaxError> {
    let mut lx = Lexer {
        src: src.as_bytes(),
        pos: 0,
    };
    let mut tokens = Vec::new();

    while let Some(c) = lx.peek() {
        let start = lx.pos;
        let tok = match c {
            b' ' | b'\t' | b'\n' | b'\r' => {
                lx.pos += 1;
                continue;
            }
            b'0'..=b'9' => lx.number()?,
            b'"' => lx.double_quoted()?,
            b'\'' => lx.single_quoted()?,
            c if c.is_ascii_alphabetic() || c == b'_' => match lx.ident().as_str() {
                "true" => Tok::True,
                "false" => Tok::False,
                "and" => Tok::And,
                "or" => Tok::Or,
                "not" => Tok::Not,
                name => Tok::Ident(name.to_string()),
            },
            b'+' => {
                lx.pos += 1;
                Tok::Plus
            }
            b'-' => {
                lx.pos += 1;
                Tok::Minus
            }
            b'*' => {
                lx.pos += 1;
                Tok::Star
            }
            b'/' => {
                lx.pos += 1;
                Tok::Slash
            }
            b'%' => {
                lx.pos += 1;
                Tok::Percent
            }
            b'^' => {
                lx.pos += 1;
                Tok::Caret
            }
            b'(' => {
                lx.pos += 1;
                Tok::LParen
            }
            b')' => {
                lx.pos += 1;
                Tok::RParen
            }
            b'[' => {
                lx.pos += 1;
                Tok::LBracket
            }
            b']' => {
                lx.pos += 1;
                Tok::RBracket
            }
            b'.' => {
                lx.pos += 1;
                Tok::Dot
            }
            b'<' => {
                lx.pos += 1;
                if lx.eat(b'<') {
                    Tok::Shl
                } else if lx.eat(b'=') {
                    Tok::LtEq
                } else {
                    Tok::Lt
                }
            }
            b'>' => {
                lx.pos += 1;
                if lx.eat(b'>') {
                    Tok::Shr
                } else if lx.eat(b'=') {
                    Tok::GtEq
                } else {
                    Tok::Gt
                }
            }
            b'=' => {
                lx.pos += 1;
                if lx.eat(b'=') {
                    Tok::EqEq
                } else {
                    return Err(err("expected ==", start, lx.pos));
                }
            }
            b'!' => {
                lx.pos += 1;
                if lx.eat(b'=') {
                    Tok::NotEq
                } else {
                    return Err(err("expected !=", start, lx.pos));
                }
            }
            b'&' => {
                lx.pos += 1;
                Tok::Amp
            }
            b'|' => {
                lx.pos += 1;
                Tok::Pipe
            }
            b':' => {
                lx.pos += 1;
                if lx.eat(b':') {
                    Tok::ColonColon
                } else {
                    return Err(err("expected ::", start, lx.pos));
                }
            }
            _ => return Err(err(format!("unexpected character {:?}", c as char), start, start + 1)),
        };
        tokens.push(Token {
            tok,
            start,
            end: lx.pos,
        });
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<Tok> {
        lex(src).unwrap().into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn test_numbers() {
        assert_eq!(toks("42"), vec![Tok::Int(42)]);
        assert_eq!(toks("0xff"), vec![Tok::Int(255)]);
        assert_eq!(toks("0b1010"), vec![Tok::Int(10)]);
        assert_eq!(toks("0o17"), vec![Tok::Int(15)]);
        assert_eq!(toks("1_000"), vec![Tok::Int(1000)]);
        assert_eq!(toks("1.5"), vec![Tok::Float(1.5)]);
        assert_eq!(toks("2e3"), vec![Tok::Float(2000.0)]);
    }

    #[test]
    fn test_big_literal() {
        match &toks("18446744073709551615")[..] {
            [Tok::Big(v)] => assert_eq!(*v, num_bigint::BigInt::from(u64::MAX)),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_dot_after_int_is_member() {
        assert_eq!(
            toks("1.foo"),
            vec![Tok::Int(1), Tok::Dot, Tok::Ident("foo".into())]
        );
    }

    #[test]
    fn test_strings() {
        assert_eq!(toks(r#""a\nb""#), vec![Tok::Str("a\nb".into())]);
        assert_eq!(toks(r#""\x41""#), vec![Tok::Str("A".into())]);
        assert_eq!(toks("'no\\escape'"), vec![Tok::Str("no\\escape".into())]);
    }

    #[test]
    fn test_operators_and_keywords() {
        assert_eq!(
            toks("a << 2 >= b and not c"),
            vec![
                Tok::Ident("a".into()),
                Tok::Shl,
                Tok::Int(2),
                Tok::GtEq,
                Tok::Ident("b".into()),
                Tok::And,
                Tok::Not,
                Tok::Ident("c".into()),
            ]
        );
    }

    #[test]
    fn test_scoped_ident_tokens() {
        assert_eq!(
            toks("color::red"),
            vec![
                Tok::Ident("color".into()),
                Tok::ColonColon,
                Tok::Ident("red".into()),
            ]
        );
    }

    #[test]
    fn test_error_span() {
        let err = lex("1 + $").unwrap_err();
        assert_eq!((err.start, err.end), (4, 5));
    }

    #[test]
    fn test_unterminated_string() {
        assert!(lex("\"abc").is_err());
    }
}
