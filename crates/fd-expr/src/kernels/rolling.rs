//! Single-series trailing-window kernels.

use super::{mean, negligible, rolling_apply, variance};
use crate::{ExprError, Result};

/// Values whose spread is within this tolerance are considered tied.
pub const TIE_TOLERANCE: f64 = 1e-12;

/// Simple moving average over `window` rows.
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    rolling_apply(values, window, mean)
}

/// Rolling sum over `window` rows.
pub fn rolling_sum(values: &[f64], window: usize) -> Vec<f64> {
    rolling_apply(values, window, |w| w.iter().sum())
}

/// Rolling sample standard deviation (`ddof = 1`).
pub fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    rolling_apply(values, window, |w| variance(w, 1).sqrt())
}

/// Rolling minimum.
pub fn rolling_min(values: &[f64], window: usize) -> Vec<f64> {
    rolling_apply(values, window, |w| w.iter().copied().fold(f64::INFINITY, f64::min))
}

/// Rolling maximum.
pub fn rolling_max(values: &[f64], window: usize) -> Vec<f64> {
    rolling_apply(values, window, |w| w.iter().copied().fold(f64::NEG_INFINITY, f64::max))
}

/// Offset of the window minimum from the oldest row (first occurrence wins).
pub fn rolling_argmin(values: &[f64], window: usize) -> Vec<f64> {
    rolling_apply(values, window, |w| {
        let mut best = 0;
        for (idx, v) in w.iter().enumerate() {
            if *v < w[best] {
                best = idx;
            }
        }
        best as f64
    })
}

/// Offset of the window maximum from the oldest row (first occurrence wins).
pub fn rolling_argmax(values: &[f64], window: usize) -> Vec<f64> {
    rolling_apply(values, window, |w| {
        let mut best = 0;
        for (idx, v) in w.iter().enumerate() {
            if *v > w[best] {
                best = idx;
            }
        }
        best as f64
    })
}

/// Rolling product.
pub fn rolling_product(values: &[f64], window: usize) -> Vec<f64> {
    rolling_apply(values, window, |w| w.iter().product())
}

/// Percentile position of the newest value within its trailing window.
///
/// Ties share their average rank, and the result is `rank / window`, so it
/// lies in `(0, 1]`. A window whose values are all indistinguishable yields
/// `0.5`.
pub fn rolling_rank(values: &[f64], window: usize) -> Vec<f64> {
    rolling_apply(values, window, |w| {
        let (lo, hi) = w
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        if negligible(hi - lo, hi) {
            return 0.5;
        }
        let last = w[w.len() - 1];
        let below = w.iter().filter(|v| **v < last).count() as f64;
        let equal = w.iter().filter(|v| **v == last).count() as f64;
        (below + (equal + 1.0) / 2.0) / w.len() as f64
    })
}

/// `(newest - mean) / std` over the trailing window.
///
/// A flat window (standard deviation within rounding noise of zero) yields
/// `0`.
pub fn rolling_zscore(values: &[f64], window: usize) -> Vec<f64> {
    rolling_apply(values, window, |w| {
        let m = mean(w);
        let std = variance(w, 1).sqrt();
        if negligible(std, m) {
            0.0
        } else {
            (w[w.len() - 1] - m) / std
        }
    })
}

/// Linearly weighted average, newest row weighted heaviest.
///
/// Weight `i` (1-indexed, oldest to newest) is `i / (1 + 2 + ... + window)`.
pub fn decay_linear(values: &[f64], window: usize) -> Vec<f64> {
    if window > values.len() {
        return vec![f64::NAN; values.len()];
    }
    let n = window as f64;
    let total = n * (n + 1.0) / 2.0;
    rolling_apply(values, window, |w| {
        w.iter()
            .enumerate()
            .map(|(idx, v)| v * (idx + 1) as f64 / total)
            .sum()
    })
}

/// Least-squares slope of the window against time steps `1..=window`.
pub fn trend_slope(values: &[f64], window: usize) -> Vec<f64> {
    if window < 2 || window > values.len() {
        return vec![f64::NAN; values.len()];
    }
    let n = window as f64;
    let t_mean = (n + 1.0) / 2.0;
    // sum of (t - t_mean)^2 over t = 1..=n
    let stt = n * (n * n - 1.0) / 12.0;
    rolling_apply(values, window, |w| {
        let y_mean = mean(w);
        let sty: f64 = w
            .iter()
            .enumerate()
            .map(|(idx, y)| ((idx + 1) as f64 - t_mean) * (y - y_mean))
            .sum();
        sty / stt
    })
}

/// Rolling quantile with linear interpolation.
///
/// Unlike the other window kernels this one needs only one defined value:
/// the trailing window may be partial and undefined values are skipped.
pub fn rolling_quantile(values: &[f64], window: usize, q: f64) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if window == 0 {
        return out;
    }
    for end in 1..=values.len() {
        let start = end.saturating_sub(window);
        let mut defined: Vec<f64> = values[start..end]
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .collect();
        if defined.is_empty() {
            continue;
        }
        defined.sort_by(f64::total_cmp);
        let pos = q * (defined.len() - 1) as f64;
        let lo = pos.floor() as usize;
        let hi = pos.ceil() as usize;
        out[end - 1] = defined[lo] + (defined[hi] - defined[lo]) * (pos - lo as f64);
    }
    out
}

/// Shift by `lag` rows; positive lags look back, negative lags look ahead.
pub fn shift(values: &[f64], lag: i64) -> Vec<f64> {
    let len = values.len();
    let mut out = vec![f64::NAN; len];
    let offset = lag.unsigned_abs() as usize;
    if offset >= len {
        return out;
    }
    if lag >= 0 {
        out[offset..].copy_from_slice(&values[..len - offset]);
    } else {
        out[..len - offset].copy_from_slice(&values[offset..]);
    }
    out
}

/// `x - shift(x, lag)`.
pub fn delta(values: &[f64], lag: i64) -> Vec<f64> {
    values
        .iter()
        .zip(shift(values, lag))
        .map(|(v, prev)| v - prev)
        .collect()
}

/// Rate of change: `x / shift(x, lag) - 1`.
pub fn rate_of_change(values: &[f64], lag: i64) -> Vec<f64> {
    values
        .iter()
        .zip(shift(values, lag))
        .map(|(v, prev)| v / prev - 1.0)
        .collect()
}

/// Forward-looking label: `shift(x, lag) / x - 1`.
///
/// With a negative `lag` this is the return over the next `-lag` rows, the
/// usual training target for a factor.
pub fn forward_label(values: &[f64], lag: i64) -> Vec<f64> {
    values
        .iter()
        .zip(shift(values, lag))
        .map(|(v, shifted)| shifted / v - 1.0)
        .collect()
}

/// Exponentially weighted moving average with adjusted weights.
///
/// `alpha = 2 / (span + 1)`. The average is defined from the first defined
/// value; undefined inputs keep decaying the older weights.
pub fn exponential_moving_average(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let decay = 1.0 - alpha;
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    values
        .iter()
        .map(|v| {
            numerator *= decay;
            denominator *= decay;
            if !v.is_nan() {
                numerator += v;
                denominator += 1.0;
            }
            if denominator > 0.0 {
                numerator / denominator
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Rescale so that the absolute values sum to `target`.
///
/// Undefined values are ignored in the sum and stay undefined. A zero sum is
/// a [`DegenerateInput`](ExprError::DegenerateInput) error.
pub fn scale(values: &[f64], target: f64) -> Result<Vec<f64>> {
    let abs_sum: f64 = values.iter().filter(|v| !v.is_nan()).map(|v| v.abs()).sum();
    if abs_sum == 0.0 {
        return Err(ExprError::degenerate(
            "SCALE",
            "sum of absolute values is zero",
        ));
    }
    let factor = target / abs_sum;
    Ok(values.iter().map(|v| v * factor).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use rstest::rstest;

    const CLOSES: [f64; 5] = [10.0, 11.0, 12.0, 11.0, 13.0];

    fn assert_undefined_prefix(out: &[f64], count: usize) {
        for (idx, v) in out.iter().enumerate() {
            if idx < count {
                assert!(v.is_nan(), "row {idx} should be undefined, got {v}");
            } else {
                assert!(!v.is_nan(), "row {idx} should be defined");
            }
        }
    }

    #[test]
    fn test_moving_average_values() {
        let out = moving_average(&CLOSES, 3);
        assert_undefined_prefix(&out, 2);
        assert_relative_eq!(out[2], 11.0);
        assert_relative_eq!(out[3], 34.0 / 3.0);
        assert_relative_eq!(out[4], 12.0);
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(3)]
    #[case(5)]
    fn test_window_boundary(#[case] window: usize) {
        let values: Vec<f64> = (0..12).map(|i| (i as f64 * 0.7).sin() + 2.0).collect();
        assert_undefined_prefix(&moving_average(&values, window), window - 1);
        assert_undefined_prefix(&rolling_sum(&values, window), window - 1);
        if window > 1 {
            assert_undefined_prefix(&rolling_std(&values, window), window - 1);
        }
    }

    #[test]
    fn test_rolling_std_is_sample() {
        let out = rolling_std(&[1.0, 2.0, 3.0, 4.0], 4);
        assert_relative_eq!(out[3], (5.0f64 / 3.0).sqrt());
    }

    #[test]
    fn test_min_max_argmin_argmax() {
        let values = [3.0, 1.0, 4.0, 1.0, 5.0];
        assert_eq!(rolling_min(&values, 3)[2..], [1.0, 1.0, 1.0]);
        assert_eq!(rolling_max(&values, 3)[2..], [4.0, 4.0, 5.0]);
        assert_eq!(rolling_argmin(&values, 3)[2..], [1.0, 0.0, 1.0]);
        assert_eq!(rolling_argmax(&values, 3)[2..], [2.0, 1.0, 2.0]);
    }

    #[test]
    fn test_rolling_rank() {
        let out = rolling_rank(&[1.0, 2.0, 3.0, 2.0], 3);
        // newest is the largest of [1, 2, 3]
        assert_relative_eq!(out[2], 1.0);
        // newest 2 ties with the 2 in [2, 3, 2]: average rank 1.5 of 3
        assert_relative_eq!(out[3], 0.5);
        assert!(out.iter().skip(2).all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_rolling_rank_flat_window() {
        let out = rolling_rank(&[4.0, 4.0, 4.0, 4.0], 4);
        assert_eq!(out[3], 0.5);
    }

    #[test]
    fn test_rolling_zscore() {
        let out = rolling_zscore(&[1.0, 2.0, 3.0], 3);
        assert_relative_eq!(out[2], 1.0);
        let flat = rolling_zscore(&[2.0, 2.0, 2.0], 3);
        assert_eq!(flat[2], 0.0);
    }

    #[rstest]
    #[case(0.1)]
    #[case(0.3)]
    #[case(1234.567)]
    #[case(-7.77)]
    fn test_rolling_zscore_flat_fractional_window(#[case] level: f64) {
        let out = rolling_zscore(&[level; 6], 3);
        assert!(out[..2].iter().all(|v| v.is_nan()));
        assert!(out[2..].iter().all(|v| *v == 0.0), "{out:?}");
    }

    #[test]
    fn test_decay_linear_weights() {
        // weights 1/6, 2/6, 3/6 oldest to newest
        let out = decay_linear(&[6.0, 12.0, 18.0, 0.0], 3);
        assert_undefined_prefix(&out, 2);
        assert_relative_eq!(out[2], 1.0 + 4.0 + 9.0);
        assert_relative_eq!(out[3], 2.0 + 6.0);
    }

    #[test]
    fn test_trend_slope() {
        let out = trend_slope(&[1.0, 3.0, 5.0, 7.0], 3);
        assert_relative_eq!(out[2], 2.0);
        assert_relative_eq!(out[3], 2.0);
        assert!(trend_slope(&[1.0, 2.0], 1).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_trend_slope_matches_direct_sum() {
        let values = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0];
        let window = 5;
        let out = trend_slope(&values, window);
        let t_mean = 3.0;
        let w = &values[3..8];
        let y_mean = w.iter().sum::<f64>() / 5.0;
        let sty: f64 = w.iter().enumerate().map(|(i, y)| (i as f64 + 1.0 - t_mean) * (y - y_mean)).sum();
        assert_relative_eq!(out[7], sty / 10.0, epsilon = 1e-12);
    }

    #[rstest]
    #[case(usize::MAX)]
    #[case(100_000_000_000)]
    #[case(6)]
    fn test_windows_longer_than_history(#[case] window: usize) {
        assert!(decay_linear(&CLOSES, window).iter().all(|v| v.is_nan()));
        assert!(trend_slope(&CLOSES, window).iter().all(|v| v.is_nan()));
        assert!(rolling_zscore(&CLOSES, window).iter().all(|v| v.is_nan()));
        assert!(rolling_rank(&CLOSES, window).iter().all(|v| v.is_nan()));
        assert_eq!(rolling_quantile(&CLOSES, window, 0.5)[0], 10.0);
    }

    #[test]
    fn test_rolling_quantile_partial_windows() {
        let out = rolling_quantile(&[1.0, 2.0, 3.0, 4.0, 5.0], 3, 0.5);
        assert_eq!(out, vec![1.0, 1.5, 2.0, 3.0, 4.0]);
        let high = rolling_quantile(&[1.0, 2.0, 3.0, 4.0, 5.0], 5, 0.8);
        assert_relative_eq!(high[4], 4.2);
    }

    #[test]
    fn test_shift_and_friends() {
        let values = [1.0, 2.0, 4.0, 8.0];
        let lagged = shift(&values, 1);
        assert!(lagged[0].is_nan());
        assert_eq!(lagged[1..], [1.0, 2.0, 4.0]);

        let lead = shift(&values, -1);
        assert_eq!(lead[..3], [2.0, 4.0, 8.0]);
        assert!(lead[3].is_nan());

        assert!(shift(&values, 10).iter().all(|v| v.is_nan()));
        assert_eq!(delta(&values, 2)[2..], [3.0, 6.0]);
        assert_eq!(rate_of_change(&values, 1)[1..], [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_forward_label() {
        let out = forward_label(&[1.0, 2.0, 4.0, 8.0], -2);
        assert_eq!(out[..2], [3.0, 3.0]);
        assert!(out[2].is_nan() && out[3].is_nan());
        assert_eq!(forward_label(&[1.0, 2.0], 1)[1], -0.5);
    }

    #[test]
    fn test_ema() {
        // span 3 -> alpha 0.5; adjusted weights 1, 0.5
        let out = exponential_moving_average(&[1.0, 2.0], 3);
        assert_eq!(out[0], 1.0);
        assert_relative_eq!(out[1], (2.0 + 0.5) / 1.5);

        let leading_gap = exponential_moving_average(&[f64::NAN, 4.0], 3);
        assert!(leading_gap[0].is_nan());
        assert_eq!(leading_gap[1], 4.0);
    }

    #[test]
    fn test_scale_sums_to_target() {
        let out = scale(&[1.0, -3.0, f64::NAN, 4.0], 2.0).unwrap();
        let total: f64 = out.iter().filter(|v| !v.is_nan()).map(|v| v.abs()).sum();
        assert_abs_diff_eq!(total, 2.0, epsilon = 1e-12);
        assert!(out[2].is_nan());
    }

    #[test]
    fn test_scale_zero_sum_is_degenerate() {
        let err = scale(&[0.0, 0.0, f64::NAN], 1.0).unwrap_err();
        assert!(matches!(err, ExprError::DegenerateInput { .. }));
    }
}
