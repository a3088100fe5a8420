//! Candlestick, lagged price and rolling-window features over OHLCV bars.

use super::{AlphaSet, NamedExpression, named};

const ROLLING_WINDOWS: [usize; 5] = [5, 10, 20, 30, 60];
const LAGS: usize = 5;

/// Price-volume feature set over `open`, `high`, `low`, `close` and `volume`.
///
/// Candle shape (`KMID`..`KSFT2`), the last five rows of each price and of
/// volume scaled by the current value, and rolling return, mean, deviation,
/// extreme, quantile and stochastic features over 5 to 60 rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct Alpha158;

impl AlphaSet for Alpha158 {
    fn name(&self) -> &str {
        "alpha158"
    }

    fn description(&self) -> &str {
        "Candle shape, lagged OHLCV ratios and rolling price statistics"
    }

    fn fields_names(&self) -> Vec<NamedExpression> {
        let mut fields = vec![
            named("KMID", "(close - open) / open"),
            named("KLEN", "(high - low) / open"),
            named("KMID2", "(close - open) / (high - low + 1e-12)"),
            named("KUP", "(high - MAX(open, close)) / open"),
            named("KUP2", "(high - MAX(open, close)) / (high - low + 1e-12)"),
            named("KLOW", "(MIN(open, close) - low) / open"),
            named("KLOW2", "(MIN(open, close) - low) / (high - low + 1e-12)"),
            named("KSFT", "(2 * close - high - low) / open"),
            named("KSFT2", "(2 * close - high - low) / (high - low + 1e-12)"),
        ];

        for field in ["open", "high", "low", "close"] {
            for d in 0..LAGS {
                let expression = match d {
                    0 => format!("{field} / close"),
                    _ => format!("REF({field}, {d}) / close"),
                };
                fields.push((format!("{}{d}", field.to_uppercase()), expression));
            }
        }
        for d in 0..LAGS {
            let expression = match d {
                0 => "volume / (volume + 1e-12)".to_string(),
                _ => format!("REF(volume, {d}) / (volume + 1e-12)"),
            };
            fields.push((format!("VOLUME{d}"), expression));
        }

        let rolling: [(&str, fn(usize) -> String); 8] = [
            ("ROC", |d| format!("REF(close, {d}) / close")),
            ("MA", |d| format!("MA(close, {d}) / close")),
            ("STD", |d| format!("STD(close, {d}) / close")),
            ("MAX", |d| format!("TS_MAX(high, {d}) / close")),
            ("MIN", |d| format!("TS_MIN(low, {d}) / close")),
            ("QTLU", |d| format!("QUANTILE(close, {d}, 0.8) / close")),
            ("QTLD", |d| format!("QUANTILE(close, {d}, 0.2) / close")),
            ("RSV", |d| {
                format!("(close - TS_MIN(low, {d})) / (TS_MAX(high, {d}) - TS_MIN(low, {d}) + 1e-12)")
            }),
        ];
        for (prefix, expression) in rolling {
            for d in ROLLING_WINDOWS {
                fields.push((format!("{prefix}{d}"), expression(d)));
            }
        }
        fields
    }
}
