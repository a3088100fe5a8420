//! Small themed sets: momentum, value, volatility and technical.

use super::{AlphaSet, NamedExpression, named};

/// Price, volume, volatility and range momentum over one and three months.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlphaMomentum;

impl AlphaSet for AlphaMomentum {
    fn name(&self) -> &str {
        "momentum"
    }

    fn description(&self) -> &str {
        "One- and three-month price, volume, volatility and range momentum"
    }

    fn fields_names(&self) -> Vec<NamedExpression> {
        vec![
            named("mom_price_1m", "close / REF(close, 20) - 1"),
            named("mom_price_3m", "close / REF(close, 60) - 1"),
            named("mom_volume_1m", "volume / MA(volume, 20) - 1"),
            named("mom_vol_1m", "STD(returns, 20)"),
            named("mom_range_1m", "MA((high - low) / close, 20)"),
        ]
    }
}

/// Price ratios and a short volume-weighted price.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlphaValue;

impl AlphaSet for AlphaValue {
    fn name(&self) -> &str {
        "value"
    }

    fn description(&self) -> &str {
        "Bar ratios, price against its average, and five-row VWAP"
    }

    fn fields_names(&self) -> Vec<NamedExpression> {
        vec![
            named("value_hl_ratio", "high / low"),
            named("value_co_ratio", "close / open"),
            named("value_ma_ratio", "close / MA(close, 20)"),
            named("value_vwap", "SUM(close * volume, 5) / SUM(volume, 5)"),
            named("value_momentum", "close / REF(close, 5) - 1"),
        ]
    }
}

/// Return, range and Garman-Klass style volatility estimates.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlphaVolatility;

impl AlphaSet for AlphaVolatility {
    fn name(&self) -> &str {
        "volatility"
    }

    fn description(&self) -> &str {
        "Return, range and log-range volatility estimates"
    }

    fn fields_names(&self) -> Vec<NamedExpression> {
        vec![
            named("vol_std_20", "STD(returns, 20)"),
            named("vol_std_60", "STD(returns, 60)"),
            named("vol_park_20", "STD((high - low) / close, 20)"),
            named("vol_gk_20", "MA(LOG(high / low) ** 2, 20)"),
            named("vol_volume_20", "STD(returns * LOG(volume), 20)"),
        ]
    }
}

/// Oscillators and bands written as plain expressions.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlphaTechnical;

impl AlphaSet for AlphaTechnical {
    fn name(&self) -> &str {
        "technical"
    }

    fn description(&self) -> &str {
        "RSI, moving-average spread, band position, signed volume and true range"
    }

    fn fields_names(&self) -> Vec<NamedExpression> {
        vec![
            named("tech_rsi_14", "RSI(close, 14)"),
            named("tech_macd", "MA(close, 12) - MA(close, 26)"),
            named("tech_bb", "(close - MA(close, 20)) / (2 * STD(close, 20))"),
            named("tech_obv", "SUM(volume * SIGN(close - REF(close, 1)), 20)"),
            named(
                "tech_atr",
                "MA(MAX(MAX(high - low, ABS(high - REF(close, 1))), ABS(low - REF(close, 1))), 14)",
            ),
        ]
    }
}
