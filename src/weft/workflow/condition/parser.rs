// SPDX-License-Identifier: MIT

//! Condition expression parser
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! or      := and ("or" and)*
//! and     := unary ("and" unary)*
//! unary   := "not" unary | primary
//! primary := "(" or ")" | "true" | "false" | path (op literal)?
//! ```

use super::ast::{CompareOp, Expression, Literal};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConditionError {
    #[error("empty condition")]
    Empty,
    #[error("unterminated string starting at offset {0}")]
    UnterminatedString(usize),
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },
    #[error("expected {expected}, found {found}")]
    Expected { expected: String, found: String },
    #[error("trailing input after condition: {0}")]
    Trailing(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    Op(CompareOp),
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("'{}'", s),
            Token::Str(s) => format!("string '{}'", s),
            Token::Num(n) => format!("number {}", n),
            Token::Op(op) => format!("operator '{}'", op),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ConditionError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, ch) = chars[i];
        match ch {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '\'' | '"' => {
                let quote = ch;
                let start = i + 1;
                let end = (start..chars.len())
                    .find(|&j| chars[j].1 == quote)
                    .ok_or(ConditionError::UnterminatedString(offset))?;
                tokens.push(Token::Str(chars[start..end].iter().map(|(_, c)| c).collect()));
                i = end + 1;
            }
            '=' | '!' | '<' | '>' => {
                let next = chars.get(i + 1).map(|(_, c)| *c);
                let (op, width) = match (ch, next) {
                    ('=', Some('=')) => (CompareOp::Eq, 2),
                    ('!', Some('=')) => (CompareOp::NotEq, 2),
                    ('>', Some('=')) => (CompareOp::Gte, 2),
                    ('<', Some('=')) => (CompareOp::Lte, 2),
                    ('>', _) => (CompareOp::Gt, 1),
                    ('<', _) => (CompareOp::Lt, 1),
                    _ => return Err(ConditionError::UnexpectedChar { ch, offset }),
                };
                tokens.push(Token::Op(op));
                i += width;
            }
            c if c.is_ascii_digit() || c == '-' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().map(|(_, c)| c).collect();
                let num = text
                    .parse::<f64>()
                    .map_err(|_| ConditionError::UnexpectedChar { ch, offset })?;
                tokens.push(Token::Num(num));
            }
            c if c.is_alphanumeric() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].1.is_alphanumeric() || chars[i].1 == '_' || chars[i].1 == '.')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().map(|(_, c)| c).collect();
                if word == "contains" {
                    tokens.push(Token::Op(CompareOp::Contains));
                } else {
                    tokens.push(Token::Ident(word));
                }
            }
            _ => return Err(ConditionError::UnexpectedChar { ch, offset }),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(w)) if w == keyword)
    }

    fn parse_or(&mut self) -> Result<Expression, ConditionError> {
        let mut left = self.parse_and()?;
        while self.peek_keyword("or") {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expression::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression, ConditionError> {
        let mut left = self.parse_unary()?;
        while self.peek_keyword("and") {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expression::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression, ConditionError> {
        if self.peek_keyword("not") {
            self.pos += 1;
            return Ok(Expression::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expression, ConditionError> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    other => Err(expected("')'", other.as_ref())),
                }
            }
            Some(Token::Ident(word)) if word == "true" => Ok(Expression::True),
            Some(Token::Ident(word)) if word == "false" => Ok(Expression::False),
            Some(Token::Ident(path)) => {
                let Some(Token::Op(op)) = self.peek().cloned() else {
                    return Ok(Expression::Truthy(path));
                };
                self.pos += 1;
                let right = self.parse_literal()?;
                Ok(Expression::Compare {
                    left: path,
                    op,
                    right,
                })
            }
            other => Err(expected("a field, 'not', '(' or literal", other.as_ref())),
        }
    }

    fn parse_literal(&mut self) -> Result<Literal, ConditionError> {
        match self.next() {
            Some(Token::Str(s)) => Ok(Literal::String(s)),
            Some(Token::Num(n)) => Ok(Literal::Number(n)),
            Some(Token::Ident(w)) if w == "true" => Ok(Literal::Boolean(true)),
            Some(Token::Ident(w)) if w == "false" => Ok(Literal::Boolean(false)),
            Some(Token::Ident(w)) if w == "null" => Ok(Literal::Null),
            other => Err(expected("a literal", other.as_ref())),
        }
    }
}

fn expected(what: &str, found: Option<&Token>) -> ConditionError {
    ConditionError::Expected {
        expected: what.to_string(),
        found: found
            .map(Token::describe)
            .unwrap_or_else(|| "end of input".to_string()),
    }
}

/// Parse a condition expression string into an AST
pub fn parse(input: &str) -> Result<Expression, ConditionError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ConditionError::Empty);
    }

    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.pos < parser.tokens.len() {
        let rest: Vec<String> = parser.tokens[parser.pos..]
            .iter()
            .map(Token::describe)
            .collect();
        return Err(ConditionError::Trailing(rest.join(" ")));
    }
    Ok(expr)
}
