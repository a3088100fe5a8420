//! Expression tree.

use derive_more::Display;
use std::fmt;

/// Binary operators, listed by the grammar from tightest to loosest binding.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `**`
    #[display("**")]
    Pow,
    /// `*`
    #[display("*")]
    Mul,
    /// `/`
    #[display("/")]
    Div,
    /// `%`, floor modulo
    #[display("%")]
    Mod,
    /// `+`
    #[display("+")]
    Add,
    /// `-`
    #[display("-")]
    Sub,
    /// `>`
    #[display(">")]
    Gt,
    /// `<`
    #[display("<")]
    Lt,
    /// `>=`
    #[display(">=")]
    Ge,
    /// `<=`
    #[display("<=")]
    Le,
    /// `==`
    #[display("==")]
    Eq,
    /// `!=`
    #[display("!=")]
    Ne,
    /// `&`, logical and
    #[display("&")]
    And,
    /// `|`, logical or
    #[display("|")]
    Or,
}

impl BinaryOp {
    /// Whether the operator yields a boolean series.
    pub const fn is_boolean(self) -> bool {
        matches!(
            self,
            Self::Gt | Self::Lt | Self::Ge | Self::Le | Self::Eq | Self::Ne | Self::And | Self::Or
        )
    }
}

/// Prefix operators.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `-`
    #[display("-")]
    Neg,
    /// `!`, logical not
    #[display("!")]
    Not,
}

/// Parsed factor expression.
///
/// The tree holds no reference to any panel, so one parsed expression can be
/// evaluated against many panels. `Display` renders a canonical, fully
/// parenthesised form that parses back to an equal tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Identifier: a panel field or a named sub-expression
    Field(String),
    /// Numeric constant
    Literal(f64),
    /// Prefix operation
    Unary(UnaryOp, Box<Expr>),
    /// Infix operation
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// Operator call with positional arguments
    Call(String, Vec<Expr>),
}

impl Expr {
    /// Bare identifiers referenced anywhere in the tree, in first-seen order.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.walk(&mut |node| {
            if let Self::Field(name) = node
                && !out.contains(&name.as_str())
            {
                out.push(name.as_str());
            }
        });
        out
    }

    /// Operator names called anywhere in the tree, in first-seen order.
    pub fn calls(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.walk(&mut |node| {
            if let Self::Call(name, _) = node
                && !out.contains(&name.as_str())
            {
                out.push(name.as_str());
            }
        });
        out
    }

    /// Whether the tree is a constant literal.
    pub const fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Self)) {
        visit(self);
        match self {
            Self::Field(_) | Self::Literal(_) => {}
            Self::Unary(_, operand) => operand.walk(visit),
            Self::Binary(_, left, right) => {
                left.walk(visit);
                right.walk(visit);
            }
            Self::Call(_, args) => {
                for arg in args {
                    arg.walk(visit);
                }
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => write!(f, "{name}"),
            Self::Literal(value) if value.is_sign_negative() => write!(f, "({value})"),
            Self::Literal(value) => write!(f, "{value}"),
            Self::Unary(op, operand) => write!(f, "({op}{operand})"),
            Self::Binary(op, left, right) => write!(f, "({left} {op} {right})"),
            Self::Call(name, args) => {
                write!(f, "{name}(")?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str) -> Box<Expr> {
        Box::new(Expr::Field(name.to_string()))
    }

    #[test]
    fn test_display_is_fully_parenthesised() {
        let expr = Expr::Binary(
            BinaryOp::Div,
            Box::new(Expr::Call(
                "rank".to_string(),
                vec![Expr::Call(
                    "roc".to_string(),
                    vec![Expr::Field("close".to_string()), Expr::Literal(5.0)],
                )],
            )),
            Box::new(Expr::Binary(BinaryOp::Add, field("a"), Box::new(Expr::Literal(-1.5)))),
        );
        assert_eq!(expr.to_string(), "(rank(roc(close, 5)) / (a + (-1.5)))");
    }

    #[test]
    fn test_identifiers_and_calls() {
        let expr = Expr::Call(
            "CORR".to_string(),
            vec![
                Expr::Field("close".to_string()),
                Expr::Binary(BinaryOp::Mul, field("volume"), field("close")),
                Expr::Literal(10.0),
            ],
        );
        assert_eq!(expr.identifiers(), vec!["close", "volume"]);
        assert_eq!(expr.calls(), vec!["CORR"]);
    }

    #[test]
    fn test_boolean_ops() {
        assert!(BinaryOp::Gt.is_boolean());
        assert!(BinaryOp::Or.is_boolean());
        assert!(!BinaryOp::Pow.is_boolean());
    }
}
