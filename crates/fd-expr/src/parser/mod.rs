//! Expression parser.
//!
//! Recursive-descent parser over the token stream produced by the lexer.
//! Precedence, tightest first:
//!
//! | Level | Operators | Associativity |
//! |---|---|---|
//! | power | `**` | right |
//! | unary | `-` `+` `!` | prefix |
//! | multiplicative | `*` `/` `%` | left |
//! | additive | `+` `-` | left |
//! | comparison | `>` `<` `>=` `<=` `==` `!=` | left |
//! | and | `&` | left |
//! | or | `\|` | left |
//!
//! As in most calculator grammars, `-a ** 2` parses as `-(a ** 2)`.
//! Nesting (parentheses, call arguments and prefix operators) is limited to
//! [`MAX_DEPTH`] levels.

pub mod ast;
mod lexer;

pub use ast::{BinaryOp, Expr, UnaryOp};

use crate::Result;
use lexer::{Token, TokenKind, syntax, tokenize};

/// Deepest nesting accepted by [`parse`].
pub const MAX_DEPTH: usize = 256;

/// Parse an expression string into a tree.
///
/// Identifiers are not resolved here: whether `close` is a field or a named
/// sub-expression, and whether `ma` is a registered operator, is decided at
/// evaluation time.
pub fn parse(input: &str) -> Result<Expr> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        input,
        tokens,
        pos: 0,
        depth: 0,
    };

    if parser.peek() == &TokenKind::Eof {
        return Err(syntax(input, 0, "empty expression"));
    }

    let expr = parser.parse_or()?;
    match parser.peek() {
        TokenKind::Eof => Ok(expr),
        TokenKind::RParen => Err(parser.error_here("unmatched `)`")),
        _ => Err(parser.error_here("expected an operator or end of expression")),
    }
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn advance(&mut self) -> &Token {
        let token = &self.tokens[self.pos];
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn error_here(&self, message: &str) -> crate::ExprError {
        syntax(self.input, self.tokens[self.pos].start, message)
    }

    fn expect(&mut self, kind: &TokenKind, message: &str) -> Result<()> {
        if self.peek() == kind {
            self.advance();
            Ok(())
        } else {
            Err(self.error_here(message))
        }
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.peek() == &TokenKind::Pipe {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_comparison()?;
        while self.peek() == &TokenKind::Amp {
            self.advance();
            let right = self.parse_comparison()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Ge => BinaryOp::Ge,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::Ne => BinaryOp::Ne,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    // Every recursive path passes through here, so this bounds the stack.
    fn parse_unary(&mut self) -> Result<Expr> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error_here("expression is nested too deeply"));
        }
        self.depth += 1;
        let result = self.parse_prefixed();
        self.depth -= 1;
        result
    }

    fn parse_prefixed(&mut self) -> Result<Expr> {
        match self.peek() {
            TokenKind::Minus => {
                self.advance();
                // Negative literals fold into the literal itself
                Ok(match self.parse_unary()? {
                    Expr::Literal(value) => Expr::Literal(-value),
                    operand => Expr::Unary(UnaryOp::Neg, Box::new(operand)),
                })
            }
            TokenKind::Plus => {
                self.advance();
                self.parse_unary()
            }
            TokenKind::Bang => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)))
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Expr> {
        let base = self.parse_primary()?;
        if self.peek() == &TokenKind::Power {
            self.advance();
            // Right-associative; the exponent may carry its own sign
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.advance().clone();
        match token.kind {
            TokenKind::Number(value) => Ok(Expr::Literal(value)),
            TokenKind::Ident(name) => {
                if self.peek() == &TokenKind::LParen {
                    self.advance();
                    let args = self.parse_args()?;
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Field(name))
                }
            }
            TokenKind::LParen => {
                let inner = self.parse_or()?;
                if self.peek() == &TokenKind::RParen {
                    self.advance();
                    Ok(inner)
                } else {
                    Err(syntax(
                        self.input,
                        token.start,
                        "unbalanced parenthesis, expected `)`",
                    ))
                }
            }
            TokenKind::Eof => Err(syntax(self.input, token.start, "unexpected end of expression")),
            _ => Err(syntax(
                self.input,
                token.start,
                format!("unexpected `{}`", &self.input[token.start..token.end]),
            )),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.peek() == &TokenKind::RParen {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            match self.peek() {
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::RParen => {
                    self.advance();
                    return Ok(args);
                }
                _ => {
                    self.expect(&TokenKind::RParen, "expected `,` or `)` in argument list")?;
                }
            }
        }
    }
}
