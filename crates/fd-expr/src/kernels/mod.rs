//! Numeric kernels.
//!
//! Every kernel works on the values of a single partition (one entity's
//! history for time-series kernels, one timestamp's cross-section for
//! cross-sectional kernels) and returns a vector of the same length.
//! Undefined values are `NaN`. A trailing window that contains an undefined
//! value produces an undefined result, so the first `window - 1` rows of a
//! partition are always undefined.

pub mod cross_section;
pub mod elementwise;
pub mod pairwise;
pub mod rolling;
pub mod signal;
pub mod technical;

/// Apply `f` to every complete trailing window of `values`.
pub(crate) fn rolling_apply(values: &[f64], window: usize, f: impl Fn(&[f64]) -> f64) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if window == 0 {
        return out;
    }
    for end in window..=values.len() {
        let slice = &values[end - window..end];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        out[end - 1] = f(slice);
    }
    out
}

/// Apply `f` to every complete trailing window of two aligned series.
pub(crate) fn rolling_apply2(
    left: &[f64],
    right: &[f64],
    window: usize,
    f: impl Fn(&[f64], &[f64]) -> f64,
) -> Vec<f64> {
    let len = left.len().min(right.len());
    let mut out = vec![f64::NAN; left.len()];
    if window == 0 {
        return out;
    }
    for end in window..=len {
        let a = &left[end - window..end];
        let b = &right[end - window..end];
        if a.iter().chain(b).any(|v| v.is_nan()) {
            continue;
        }
        out[end - 1] = f(a, b);
    }
    out
}

/// Whether `spread` is rounding noise at the magnitude of `level`.
///
/// Flat windows of non-integer values have a computed standard deviation of
/// around `1e-17` rather than exactly zero.
pub(crate) fn negligible(spread: f64, level: f64) -> bool {
    spread <= rolling::TIE_TOLERANCE * level.abs().max(1.0)
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Variance with `ddof` delta degrees of freedom; `NaN` when undefined.
pub(crate) fn variance(values: &[f64], ddof: usize) -> f64 {
    let n = values.len();
    if n <= ddof {
        return f64::NAN;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (n - ddof) as f64
}

/// Sample covariance (`ddof = 1`).
pub(crate) fn covariance(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len();
    if n < 2 {
        return f64::NAN;
    }
    let ma = mean(a);
    let mb = mean(b);
    a.iter().zip(b).map(|(x, y)| (x - ma) * (y - mb)).sum::<f64>() / (n - 1) as f64
}
