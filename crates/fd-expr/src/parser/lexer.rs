//! Tokenizer for factor expressions.

use crate::{ExprError, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Power,
    Gt,
    Lt,
    Ge,
    Le,
    EqEq,
    Ne,
    Amp,
    Pipe,
    Bang,
    LParen,
    RParen,
    Comma,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) start: usize,
    pub(crate) end: usize,
}

/// Split `input` into tokens, terminated by `Eof`.
pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        let start = pos;

        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == b'.' && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit)) {
            pos = scan_number(bytes, pos);
            let text = &input[start..pos];
            let value: f64 = text
                .parse()
                .map_err(|_| syntax(input, start, format!("invalid number `{text}`")))?;
            if !value.is_finite() {
                return Err(syntax(input, start, format!("number `{text}` is out of range")));
            }
            tokens.push(Token {
                kind: TokenKind::Number(value),
                start,
                end: pos,
            });
            continue;
        }

        if c.is_ascii_alphabetic() || c == b'_' {
            while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
                pos += 1;
            }
            tokens.push(Token {
                kind: TokenKind::Ident(input[start..pos].to_string()),
                start,
                end: pos,
            });
            continue;
        }

        let next = bytes.get(pos + 1).copied();
        let (kind, width) = match (c, next) {
            (b'*', Some(b'*')) => (TokenKind::Power, 2),
            (b'>', Some(b'=')) => (TokenKind::Ge, 2),
            (b'<', Some(b'=')) => (TokenKind::Le, 2),
            (b'=', Some(b'=')) => (TokenKind::EqEq, 2),
            (b'!', Some(b'=')) => (TokenKind::Ne, 2),
            (b'+', _) => (TokenKind::Plus, 1),
            (b'-', _) => (TokenKind::Minus, 1),
            (b'*', _) => (TokenKind::Star, 1),
            (b'/', _) => (TokenKind::Slash, 1),
            (b'%', _) => (TokenKind::Percent, 1),
            (b'>', _) => (TokenKind::Gt, 1),
            (b'<', _) => (TokenKind::Lt, 1),
            (b'&', _) => (TokenKind::Amp, 1),
            (b'|', _) => (TokenKind::Pipe, 1),
            (b'!', _) => (TokenKind::Bang, 1),
            (b'(', _) => (TokenKind::LParen, 1),
            (b')', _) => (TokenKind::RParen, 1),
            (b',', _) => (TokenKind::Comma, 1),
            (b'=', _) => return Err(syntax(input, start, "assignment is not supported, use `==`")),
            _ => {
                let ch = input[start..].chars().next().unwrap_or('?');
                return Err(syntax(input, start, format!("unexpected character `{ch}`")));
            }
        };
        pos += width;
        tokens.push(Token {
            kind,
            start,
            end: pos,
        });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        start: input.len(),
        end: input.len(),
    });
    Ok(tokens)
}

fn scan_number(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos < bytes.len() && bytes[pos] == b'.' {
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        let mut exp = pos + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            pos = exp;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }
    pos
}

/// Build a syntax error pointing at `position`.
pub(crate) fn syntax(input: &str, position: usize, message: impl Into<String>) -> ExprError {
    const FRAGMENT_LEN: usize = 16;
    let fragment: String = input
        .get(position..)
        .unwrap_or_default()
        .chars()
        .take(FRAGMENT_LEN)
        .collect();
    ExprError::Syntax {
        message: message.into(),
        fragment: if fragment.is_empty() {
            "<end of input>".to_string()
        } else {
            fragment
        },
        position,
    }
}
