//! Two-series trailing-window kernels: correlation, covariance, regression.

use super::{covariance, mean, negligible, rolling_apply, rolling_apply2, variance};

/// Windowed standard deviations within this distance of zero make the
/// correlation undefined.
pub const CORR_STD_TOLERANCE: f64 = 2e-5;

/// Relative variance below which a regression window is treated as singular.
const SINGULAR_VARIANCE: f64 = 1e-14;

/// Rolling Pearson correlation.
///
/// Undefined when either series' windowed sample standard deviation is
/// within [`CORR_STD_TOLERANCE`] of zero.
pub fn rolling_corr(left: &[f64], right: &[f64], window: usize) -> Vec<f64> {
    rolling_apply2(left, right, window, |a, b| {
        let sa = variance(a, 1).sqrt();
        let sb = variance(b, 1).sqrt();
        if sa.abs() <= CORR_STD_TOLERANCE || sb.abs() <= CORR_STD_TOLERANCE {
            return f64::NAN;
        }
        (covariance(a, b) / (sa * sb)).clamp(-1.0, 1.0)
    })
}

/// Rolling sample covariance (`ddof = 1`).
pub fn rolling_cov(left: &[f64], right: &[f64], window: usize) -> Vec<f64> {
    rolling_apply2(left, right, window, covariance)
}

/// Rolling least-squares slope of `y` regressed on `x` with an intercept.
///
/// A window in which `x` has (numerically) no variance has no unique fit and
/// yields an undefined value.
pub fn rolling_slope(y: &[f64], x: &[f64], window: usize) -> Vec<f64> {
    rolling_apply2(y, x, window, |ys, xs| ols_slope(ys, xs).unwrap_or(f64::NAN))
}

/// Resistance-support relative strength: slope of `high` regressed on `low`.
pub fn rsrs(high: &[f64], low: &[f64], window: usize) -> Vec<f64> {
    rolling_slope(high, low, window)
}

/// Standardized RSRS: z-score of the RSRS slope over its own trailing
/// `z_window` values, using the population standard deviation.
pub fn rsrs_zscore(high: &[f64], low: &[f64], window: usize, z_window: usize) -> Vec<f64> {
    let beta = rsrs(high, low, window);
    rolling_apply(&beta, z_window, |w| {
        let m = mean(w);
        let std = variance(w, 0).sqrt();
        if negligible(std, m) {
            0.0
        } else {
            (w[w.len() - 1] - m) / std
        }
    })
}

fn ols_slope(y: &[f64], x: &[f64]) -> Option<f64> {
    if y.len() < 2 {
        return None;
    }
    let mx = mean(x);
    let my = mean(y);
    let sxx: f64 = x.iter().map(|v| (v - mx) * (v - mx)).sum();
    let sxy: f64 = x.iter().zip(y).map(|(a, b)| (a - mx) * (b - my)).sum();
    let scale = mx.abs().max(1.0);
    if sxx / x.len() as f64 <= SINGULAR_VARIANCE * scale * scale {
        return None;
    }
    let slope = sxy / sxx;
    slope.is_finite().then_some(slope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn wave(n: usize, phase: f64) -> Vec<f64> {
        (0..n).map(|i| (i as f64 * 0.37 + phase).sin() * 3.0 + 10.0).collect()
    }

    #[test]
    fn test_self_correlation_is_one() {
        let a = wave(30, 0.0);
        let out = rolling_corr(&a, &a, 10);
        assert!(out[..9].iter().all(|v| v.is_nan()));
        for v in &out[9..] {
            assert_relative_eq!(*v, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_correlation_is_symmetric() {
        let a = wave(40, 0.0);
        let b = wave(40, 1.3);
        let ab = rolling_corr(&a, &b, 8);
        let ba = rolling_corr(&b, &a, 8);
        for (x, y) in ab.iter().zip(&ba) {
            assert!(x.is_nan() && y.is_nan() || x == y);
        }
    }

    #[test]
    fn test_correlation_masks_flat_windows() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b = [5.0, 5.0, 5.0, 5.0, 6.0, 7.0];
        let out = rolling_corr(&a, &b, 3);
        // windows ending at rows 2 and 3 see a constant `b`
        assert!(out[2].is_nan());
        assert!(out[3].is_nan());
        assert!(!out[4].is_nan());
        assert!(!out[5].is_nan());
    }

    #[test]
    fn test_correlation_near_constant_is_masked() {
        let a = [1.0, 2.0, 3.0];
        let b = [1.0, 1.00001, 1.0];
        assert!(rolling_corr(&a, &b, 3)[2].is_nan());
    }

    #[test]
    fn test_covariance() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [2.0, 4.0, 6.0, 8.0];
        let out = rolling_cov(&a, &b, 4);
        assert_relative_eq!(out[3], 2.0 * 5.0 / 3.0);
    }

    #[test]
    fn test_slope_recovers_linear_relation() {
        let x: Vec<f64> = (0..20).map(|i| i as f64 * 0.5).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 * v - 1.0).collect();
        let out = rolling_slope(&y, &x, 5);
        assert!(out[..4].iter().all(|v| v.is_nan()));
        for v in &out[4..] {
            assert_relative_eq!(*v, 3.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_slope_singular_window_is_undefined() {
        let x = [2.0, 2.0, 2.0, 3.0];
        let y = [1.0, 2.0, 3.0, 4.0];
        let out = rolling_slope(&y, &x, 3);
        assert!(out[2].is_nan());
        assert!(!out[3].is_nan());
    }

    #[test]
    fn test_rsrs_zscore_leading_undefined() {
        let low = wave(30, 0.0);
        let high: Vec<f64> = low.iter().enumerate().map(|(i, v)| v * 1.1 + (i % 3) as f64).collect();
        let out = rsrs_zscore(&high, &low, 5, 6);
        // the slope is defined from row 4, its z-score needs 6 of them
        assert!(out[..9].iter().all(|v| v.is_nan()));
        assert!(out[9..].iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn test_rsrs_zscore_constant_slope_is_zero() {
        let low = wave(20, 0.4);
        let high: Vec<f64> = low.iter().map(|v| v * 1.1 + 0.3).collect();
        let out = rsrs_zscore(&high, &low, 4, 5);
        assert!(out[..7].iter().all(|v| v.is_nan()));
        assert!(out[7..].iter().all(|v| *v == 0.0), "{out:?}");
    }
}
