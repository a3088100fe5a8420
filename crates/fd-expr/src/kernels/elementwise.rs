//! Row-by-row kernels and the arithmetic behind expression operators.
//!
//! Booleans are `1.0` / `0.0`; any non-zero defined value is truthy. Every
//! function here propagates undefined inputs to an undefined output.

use crate::parser::{BinaryOp, UnaryOp};

const fn truth(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

/// Apply a binary expression operator to two defined-or-undefined values.
pub fn binary(op: BinaryOp, a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return f64::NAN;
    }
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        // floor modulo: the result takes the sign of the divisor
        BinaryOp::Mod => a - b * (a / b).floor(),
        BinaryOp::Pow => a.powf(b),
        BinaryOp::Gt => truth(a > b),
        BinaryOp::Lt => truth(a < b),
        BinaryOp::Ge => truth(a >= b),
        BinaryOp::Le => truth(a <= b),
        BinaryOp::Eq => truth(a == b),
        BinaryOp::Ne => truth(a != b),
        BinaryOp::And => truth(a != 0.0 && b != 0.0),
        BinaryOp::Or => truth(a != 0.0 || b != 0.0),
    }
}

/// Apply a unary expression operator.
pub fn unary(op: UnaryOp, x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    match op {
        UnaryOp::Neg => -x,
        UnaryOp::Not => truth(x == 0.0),
    }
}

/// Apply `op` pairwise over two aligned slices.
pub fn zip_with(op: BinaryOp, left: &[f64], right: &[f64]) -> Vec<f64> {
    left.iter().zip(right).map(|(a, b)| binary(op, *a, *b)).collect()
}

/// `-1`, `0` or `1`.
pub fn sign(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .map(|v| {
            if v.is_nan() || *v == 0.0 {
                *v
            } else {
                v.signum()
            }
        })
        .collect()
}

/// Natural logarithm; undefined for non-positive inputs.
pub fn log(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .map(|v| if *v > 0.0 { v.ln() } else { f64::NAN })
        .collect()
}

/// Absolute value.
pub fn abs(values: &[f64]) -> Vec<f64> {
    values.iter().map(|v| v.abs()).collect()
}

/// `sign(x) * |x| ** exponent`.
pub fn signed_power(values: &[f64], exponent: f64) -> Vec<f64> {
    values
        .iter()
        .zip(sign(values))
        .map(|(v, s)| s * v.abs().powf(exponent))
        .collect()
}

/// Element-wise minimum of two series.
pub fn min(left: &[f64], right: &[f64]) -> Vec<f64> {
    left.iter()
        .zip(right)
        .map(|(a, b)| if a.is_nan() || b.is_nan() { f64::NAN } else { a.min(*b) })
        .collect()
}

/// Element-wise maximum of two series.
pub fn max(left: &[f64], right: &[f64]) -> Vec<f64> {
    left.iter()
        .zip(right)
        .map(|(a, b)| if a.is_nan() || b.is_nan() { f64::NAN } else { a.max(*b) })
        .collect()
}

/// Logical exclusive or: true where exactly one side is truthy.
pub fn xor(left: &[f64], right: &[f64]) -> Vec<f64> {
    left.iter()
        .zip(right)
        .map(|(a, b)| {
            if a.is_nan() || b.is_nan() {
                f64::NAN
            } else {
                truth((*a != 0.0) != (*b != 0.0))
            }
        })
        .collect()
}

/// Choose `then` where `condition` is truthy and `otherwise` elsewhere.
pub fn select(condition: &[f64], then: &[f64], otherwise: &[f64]) -> Vec<f64> {
    condition
        .iter()
        .zip(then.iter().zip(otherwise))
        .map(|(c, (t, o))| {
            if c.is_nan() {
                f64::NAN
            } else if *c != 0.0 {
                *t
            } else {
                *o
            }
        })
        .collect()
}
