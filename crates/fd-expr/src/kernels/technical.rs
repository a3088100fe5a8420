//! Classic technical indicators with Wilder-style smoothing.
//!
//! Indicators are computed over each maximal run of defined input rows; an
//! undefined row breaks the run and the indicator restarts its warm-up after
//! it.

use super::{mean, rolling_apply, variance};

fn over_defined_runs(
    len: usize,
    defined: impl Fn(usize) -> bool,
    mut f: impl FnMut(usize, usize, &mut [f64]),
) -> Vec<f64> {
    let mut out = vec![f64::NAN; len];
    let mut start = 0;
    while start < len {
        if !defined(start) {
            start += 1;
            continue;
        }
        let mut end = start;
        while end < len && defined(end) {
            end += 1;
        }
        f(start, end, &mut out[start..end]);
        start = end;
    }
    out
}

/// Relative strength index over `period` price changes.
///
/// The first value appears `period` rows into a run. Average gains and losses
/// are seeded with a simple mean and then smoothed as
/// `avg = (avg * (period - 1) + x) / period`. A window with no losses scores
/// 100, and a window with neither gains nor losses scores 50.
pub fn rsi(values: &[f64], period: usize) -> Vec<f64> {
    over_defined_runs(values.len(), |i| !values[i].is_nan(), |start, end, out| {
        let run = &values[start..end];
        if period == 0 || run.len() <= period {
            return;
        }
        let p = period as f64;
        let changes: Vec<f64> = run.windows(2).map(|w| w[1] - w[0]).collect();
        let mut avg_gain = changes[..period].iter().map(|c| c.max(0.0)).sum::<f64>() / p;
        let mut avg_loss = changes[..period].iter().map(|c| (-c).max(0.0)).sum::<f64>() / p;
        out[period] = rsi_value(avg_gain, avg_loss);
        for (idx, change) in changes.iter().enumerate().skip(period) {
            avg_gain = (avg_gain * (p - 1.0) + change.max(0.0)) / p;
            avg_loss = (avg_loss * (p - 1.0) + (-change).max(0.0)) / p;
            out[idx + 1] = rsi_value(avg_gain, avg_loss);
        }
    })
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 { 50.0 } else { 100.0 }
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// Average true range.
///
/// True range needs the previous close, so the first value appears `period`
/// rows into a run: the mean of the first `period` true ranges, then Wilder
/// smoothing.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    let defined = |i: usize| !(high[i].is_nan() || low[i].is_nan() || close[i].is_nan());
    over_defined_runs(close.len(), defined, |start, end, out| {
        if period == 0 || end - start <= period {
            return;
        }
        let p = period as f64;
        let true_range: Vec<f64> = (start + 1..end)
            .map(|i| {
                let prev = close[i - 1];
                (high[i] - low[i])
                    .max((high[i] - prev).abs())
                    .max((low[i] - prev).abs())
            })
            .collect();
        let mut value = mean(&true_range[..period]);
        out[period] = value;
        for (idx, tr) in true_range.iter().enumerate().skip(period) {
            value = (value * (p - 1.0) + tr) / p;
            out[idx + 1] = value;
        }
    })
}

/// On-balance volume, starting from the first row's volume.
pub fn obv(close: &[f64], volume: &[f64]) -> Vec<f64> {
    let defined = |i: usize| !(close[i].is_nan() || volume[i].is_nan());
    over_defined_runs(close.len(), defined, |start, end, out| {
        let mut total = volume[start];
        out[0] = total;
        for i in start + 1..end {
            if close[i] > close[i - 1] {
                total += volume[i];
            } else if close[i] < close[i - 1] {
                total -= volume[i];
            }
            out[i - start] = total;
        }
    })
}

/// Upper Bollinger band: moving average plus `nbdev` population deviations.
pub fn bbands_upper(values: &[f64], period: usize, nbdev: f64) -> Vec<f64> {
    rolling_apply(values, period, |w| mean(w) + nbdev * variance(w, 0).sqrt())
}

/// Lower Bollinger band: moving average minus `nbdev` population deviations.
pub fn bbands_lower(values: &[f64], period: usize, nbdev: f64) -> Vec<f64> {
    rolling_apply(values, period, |w| mean(w) - nbdev * variance(w, 0).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rsi_warm_up_and_bounds() {
        let prices: Vec<f64> = (0..40).map(|i| 50.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let out = rsi(&prices, 14);
        assert!(out[..14].iter().all(|v| v.is_nan()));
        assert!(out[14..].iter().all(|v| (0.0..=100.0).contains(v)));
    }

    #[test]
    fn test_rsi_seed_value() {
        // changes: +1, -1, +2 -> avg gain 1, avg loss 1/3
        let out = rsi(&[10.0, 11.0, 10.0, 12.0], 3);
        assert_relative_eq!(out[3], 75.0);
    }

    #[test]
    fn test_rsi_degenerate_windows() {
        assert_eq!(rsi(&[1.0, 2.0, 3.0], 2)[2], 100.0);
        assert_eq!(rsi(&[1.0, 1.0, 1.0], 2)[2], 50.0);
        assert_eq!(rsi(&[3.0, 2.0, 1.0], 2)[2], 0.0);
    }

    #[test]
    fn test_rsi_restarts_after_gap() {
        let out = rsi(&[1.0, 2.0, 3.0, f64::NAN, 5.0, 4.0, 3.0], 2);
        assert_eq!(out[2], 100.0);
        assert!(out[3].is_nan());
        assert!(out[4].is_nan());
        assert!(out[5].is_nan());
        assert_eq!(out[6], 0.0);
    }

    #[test]
    fn test_atr() {
        let high = [11.0, 12.0, 12.5, 12.5];
        let low = [9.0, 10.0, 11.5, 10.0];
        let close = [10.0, 11.0, 12.0, 11.0];
        let out = atr(&high, &low, &close, 2);
        // true ranges from row 1: 2.0, 1.5, 2.5
        assert!(out[..2].iter().all(|v| v.is_nan()));
        assert_relative_eq!(out[2], 1.75);
        assert_relative_eq!(out[3], (1.75 + 2.5) / 2.0);
    }

    #[test]
    fn test_obv() {
        let close = [10.0, 11.0, 11.0, 9.0];
        let volume = [100.0, 50.0, 30.0, 20.0];
        assert_eq!(obv(&close, &volume), vec![100.0, 150.0, 150.0, 130.0]);
    }

    #[test]
    fn test_bbands_use_population_std() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let upper = bbands_upper(&x, 4, 2.0);
        let lower = bbands_lower(&x, 4, 2.0);
        let std = 1.25_f64.sqrt();
        assert_relative_eq!(upper[3], 2.5 + 2.0 * std);
        assert_relative_eq!(lower[3], 2.5 - 2.0 * std);
        assert!(upper[2].is_nan());
    }
}
