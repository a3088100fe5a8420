//! Kernels over one timestamp's cross-section of entities.
//!
//! Undefined values are excluded from the cross-section and stay undefined in
//! the output.

use super::{mean, negligible, variance};

fn defined(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| !v.is_nan()).collect()
}

/// Percentile rank in `(0, 1]`, ties receiving their average rank.
///
/// Matches `rank(pct=True)`: the smallest of `n` distinct values ranks
/// `1/n` and the largest ranks `1`.
pub fn percentile_rank(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).filter(|i| !values[*i].is_nan()).collect();
    order.sort_by(|a, b| values[*a].total_cmp(&values[*b]));
    let n = order.len() as f64;

    let mut out = vec![f64::NAN; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // 1-based ranks start+1 ..= end share their average
        let rank = (start + 1 + end) as f64 / 2.0;
        for idx in &order[start..end] {
            out[*idx] = rank / n;
        }
        start = end;
    }
    out
}

/// Cross-sectional z-score with the sample standard deviation.
///
/// Undefined when fewer than two entities are defined or all defined values
/// are equal up to rounding noise.
pub fn zscore(values: &[f64]) -> Vec<f64> {
    let present = defined(values);
    let std = variance(&present, 1).sqrt();
    let m = mean(&present);
    if std.is_nan() || negligible(std, m) {
        return vec![f64::NAN; values.len()];
    }
    values.iter().map(|v| (v - m) / std).collect()
}

/// Subtract the cross-sectional mean.
pub fn demean(values: &[f64]) -> Vec<f64> {
    let present = defined(values);
    if present.is_empty() {
        return vec![f64::NAN; values.len()];
    }
    let m = mean(&present);
    values.iter().map(|v| v - m).collect()
}
