//! Built-in operator table.
//!
//! Every built-in is a [`Builtin`]: static metadata plus a plain function
//! pointer into the kernel layer. Parameters reach the kernel already checked
//! against their [`ParamKind`], so windows can be cast straight to `usize`.

use crate::kernels::{cross_section, elementwise, pairwise, rolling, signal, technical};
use crate::parser::BinaryOp;
use crate::registry::{
    ExecMode, Operator, OperatorCategory, OperatorRegistry, Param, ParamKind, Signature,
};
use crate::{Result, ValueKind};
use std::sync::Arc;

type Kernel = fn(&[&[f64]], &[f64]) -> Result<Vec<f64>>;

/// An operator backed by a kernel function.
#[derive(Debug)]
pub(crate) struct Builtin {
    name: &'static str,
    description: &'static str,
    category: OperatorCategory,
    mode: ExecMode,
    signature: Signature,
    output: ValueKind,
    kernel: Kernel,
    aliases: &'static [&'static str],
}

impl Builtin {
    fn new(
        name: &'static str,
        description: &'static str,
        category: OperatorCategory,
        signature: Signature,
        kernel: Kernel,
    ) -> Self {
        let mode = match category {
            OperatorCategory::CrossSection => ExecMode::CrossSection,
            OperatorCategory::Elementwise => ExecMode::Elementwise,
            _ => ExecMode::TimeSeries,
        };
        Self {
            name,
            description,
            category,
            mode,
            signature,
            output: ValueKind::Numeric,
            kernel,
            aliases: &[],
        }
    }

    fn boolean(mut self) -> Self {
        self.output = ValueKind::Boolean;
        self
    }

    fn aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }
}

impl Operator for Builtin {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn category(&self) -> OperatorCategory {
        self.category
    }

    fn mode(&self) -> ExecMode {
        self.mode
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn output(&self) -> ValueKind {
        self.output
    }

    fn compute(&self, inputs: &[&[f64]], params: &[f64]) -> Result<Vec<f64>> {
        (self.kernel)(inputs, params)
    }
}

fn window(value: f64) -> usize {
    value as usize
}

fn lag(value: f64) -> i64 {
    value as i64
}

fn unary(inputs: &[&str]) -> Signature {
    Signature::new(inputs.iter().copied())
}

fn windowed(inputs: &[&str], default: Option<f64>) -> Signature {
    let param = match default {
        Some(default) => Param::optional("window", ParamKind::Window, default),
        None => Param::required("window", ParamKind::Window),
    };
    unary(inputs).param(param)
}

fn lagged(default: Option<f64>) -> Signature {
    let param = match default {
        Some(default) => Param::optional("lag", ParamKind::Lag, default),
        None => Param::required("lag", ParamKind::Lag),
    };
    unary(&["x"]).param(param)
}

/// Register every built-in and its aliases.
pub(crate) fn install(registry: &mut OperatorRegistry) {
    for builtin in table() {
        let (name, aliases) = (builtin.name, builtin.aliases);
        if let Err(err) = registry.register(Arc::new(builtin)) {
            tracing::error!(operator = name, error = %err, "skipping built-in operator");
            continue;
        }
        for alias in aliases {
            if let Err(err) = registry.alias(alias, name) {
                tracing::error!(operator = name, alias, error = %err, "skipping built-in alias");
            }
        }
    }
}

fn table() -> Vec<Builtin> {
    use OperatorCategory::{CrossSection, Elementwise, Pairwise, Rolling, Signal, Technical};

    vec![
        // Rolling
        Builtin::new("MA", "Simple moving average", Rolling, windowed(&["x"], Some(20.0)), |x, p| {
            Ok(rolling::moving_average(x[0], window(p[0])))
        })
        .aliases(&["SMA", "ma", "mean"]),
        Builtin::new(
            "EMA",
            "Exponential moving average with span-based decay",
            Rolling,
            unary(&["x"]).param(Param::required("span", ParamKind::Window)),
            |x, p| Ok(rolling::exponential_moving_average(x[0], window(p[0]))),
        )
        .aliases(&["ema"]),
        Builtin::new("STD", "Rolling sample standard deviation", Rolling, windowed(&["x"], Some(20.0)), |x, p| {
            Ok(rolling::rolling_std(x[0], window(p[0])))
        })
        .aliases(&["std", "stddev"]),
        Builtin::new("SUM", "Rolling sum", Rolling, windowed(&["x"], None), |x, p| {
            Ok(rolling::rolling_sum(x[0], window(p[0])))
        })
        .aliases(&["sum"]),
        Builtin::new("TS_MIN", "Rolling minimum", Rolling, windowed(&["x"], Some(5.0)), |x, p| {
            Ok(rolling::rolling_min(x[0], window(p[0])))
        })
        .aliases(&["ts_min"]),
        Builtin::new("TS_MAX", "Rolling maximum", Rolling, windowed(&["x"], Some(5.0)), |x, p| {
            Ok(rolling::rolling_max(x[0], window(p[0])))
        })
        .aliases(&["ts_max"]),
        Builtin::new(
            "TS_ARGMIN",
            "Offset of the rolling minimum from the oldest row",
            Rolling,
            windowed(&["x"], Some(5.0)),
            |x, p| Ok(rolling::rolling_argmin(x[0], window(p[0]))),
        )
        .aliases(&["ts_argmin"]),
        Builtin::new(
            "TS_ARGMAX",
            "Offset of the rolling maximum from the oldest row",
            Rolling,
            windowed(&["x"], Some(5.0)),
            |x, p| Ok(rolling::rolling_argmax(x[0], window(p[0]))),
        )
        .aliases(&["ts_argmax"]),
        Builtin::new(
            "TS_RANK",
            "Percentile rank of the newest value within its window",
            Rolling,
            windowed(&["x"], Some(9.0)),
            |x, p| Ok(rolling::rolling_rank(x[0], window(p[0]))),
        )
        .aliases(&["ts_rank"]),
        Builtin::new(
            "ZSCORE",
            "Z-score of the newest value within its window",
            Rolling,
            windowed(&["x"], None),
            |x, p| Ok(rolling::rolling_zscore(x[0], window(p[0]))),
        )
        .aliases(&["zscore"]),
        Builtin::new(
            "SCALE",
            "Rescale so absolute values sum to a target",
            Rolling,
            unary(&["x"]).param(Param::optional("a", ParamKind::Real, 1.0)),
            |x, p| rolling::scale(x[0], p[0]),
        )
        .aliases(&["scale"]),
        Builtin::new(
            "DECAY_LINEAR",
            "Linearly weighted moving average, newest row heaviest",
            Rolling,
            windowed(&["x"], None),
            |x, p| Ok(rolling::decay_linear(x[0], window(p[0]))),
        )
        .aliases(&["decay_linear"]),
        Builtin::new(
            "QUANTILE",
            "Rolling quantile over partial windows",
            Rolling,
            windowed(&["x"], None).param(Param::optional("q", ParamKind::Probability, 0.8)),
            |x, p| Ok(rolling::rolling_quantile(x[0], window(p[0]), p[1])),
        )
        .aliases(&["quantile"]),
        Builtin::new("PRODUCT", "Rolling product", Rolling, windowed(&["x"], None), |x, p| {
            Ok(rolling::rolling_product(x[0], window(p[0])))
        })
        .aliases(&["product"]),
        Builtin::new("DELTA", "Difference from the value `lag` rows back", Rolling, lagged(Some(20.0)), |x, p| {
            Ok(rolling::delta(x[0], lag(p[0])))
        })
        .aliases(&["delta"]),
        Builtin::new("REF", "Value `lag` rows back", Rolling, lagged(Some(5.0)), |x, p| {
            Ok(rolling::shift(x[0], lag(p[0])))
        })
        .aliases(&["DELAY", "shift", "delay"]),
        Builtin::new("ROC", "Rate of change over `lag` rows", Rolling, lagged(None), |x, p| {
            Ok(rolling::rate_of_change(x[0], lag(p[0])))
        })
        .aliases(&["roc"]),
        Builtin::new(
            "LABEL",
            "Forward label: value `period` rows away over the current value, minus one",
            Rolling,
            unary(&["x"]).param(Param::required("period", ParamKind::Lag)),
            |x, p| Ok(rolling::forward_label(x[0], lag(p[0]))),
        )
        .aliases(&["label"]),
        Builtin::new(
            "SLOPE",
            "Least-squares trend slope against the row index",
            Rolling,
            windowed(&["x"], Some(20.0)),
            |x, p| Ok(rolling::trend_slope(x[0], window(p[0]))),
        )
        .aliases(&["ts_slope"]),
        // Pairwise
        Builtin::new(
            "CORR",
            "Rolling Pearson correlation, undefined over flat windows",
            Pairwise,
            windowed(&["x", "y"], Some(20.0)),
            |x, p| Ok(pairwise::rolling_corr(x[0], x[1], window(p[0]))),
        )
        .aliases(&["correlation", "ts_corr"]),
        Builtin::new("COV", "Rolling sample covariance", Pairwise, windowed(&["x", "y"], Some(10.0)), |x, p| {
            Ok(pairwise::rolling_cov(x[0], x[1], window(p[0])))
        })
        .aliases(&["covariance", "ts_cov"]),
        Builtin::new(
            "SLOPE_PAIR",
            "Rolling least-squares slope of y on x",
            Pairwise,
            windowed(&["y", "x"], Some(18.0)),
            |x, p| Ok(pairwise::rolling_slope(x[0], x[1], window(p[0]))),
        )
        .aliases(&["slope_pair"]),
        Builtin::new(
            "RSRS",
            "Resistance-support relative strength: slope of high on low",
            Pairwise,
            windowed(&["high", "low"], Some(18.0)),
            |x, p| Ok(pairwise::rsrs(x[0], x[1], window(p[0]))),
        )
        .aliases(&["rsrs"]),
        Builtin::new(
            "RSRS_ZSCORE",
            "RSRS slope standardized over its own trailing history",
            Pairwise,
            windowed(&["high", "low"], Some(18.0)).param(Param::optional(
                "z_window",
                ParamKind::Window,
                600.0,
            )),
            |x, p| Ok(pairwise::rsrs_zscore(x[0], x[1], window(p[0]), window(p[1]))),
        )
        .aliases(&["rsrs_zscore"]),
        // Signals
        Builtin::new("CROSS_UP", "Left crosses above right", Signal, unary(&["left", "right"]), |x, _| {
            Ok(signal::cross_up(x[0], x[1]))
        })
        .boolean()
        .aliases(&["cross_up"]),
        Builtin::new("CROSS_DOWN", "Left crosses below right", Signal, unary(&["left", "right"]), |x, _| {
            Ok(signal::cross_down(x[0], x[1]))
        })
        .boolean()
        .aliases(&["cross_down"]),
        Builtin::new(
            "SIGNAL",
            "Position held from an entry until an exit",
            Signal,
            unary(&["entry", "exit"]),
            |x, _| Ok(signal::position_signal(x[0], x[1])),
        )
        .aliases(&["calc_signal"]),
        // Technical
        Builtin::new(
            "RSI",
            "Relative strength index",
            Technical,
            unary(&["x"]).param(Param::optional("period", ParamKind::Window, 14.0)),
            |x, p| Ok(technical::rsi(x[0], window(p[0]))),
        )
        .aliases(&["rsi"]),
        Builtin::new(
            "ATR",
            "Average true range",
            Technical,
            unary(&["high", "low", "close"]).param(Param::optional("period", ParamKind::Window, 14.0)),
            |x, p| Ok(technical::atr(x[0], x[1], x[2], window(p[0]))),
        )
        .aliases(&["atr"]),
        Builtin::new("OBV", "On-balance volume", Technical, unary(&["close", "volume"]), |x, _| {
            Ok(technical::obv(x[0], x[1]))
        })
        .aliases(&["obv"]),
        Builtin::new(
            "BBANDS_UP",
            "Upper Bollinger band",
            Technical,
            unary(&["x"])
                .param(Param::optional("period", ParamKind::Window, 20.0))
                .param(Param::optional("nbdev", ParamKind::Real, 2.0)),
            |x, p| Ok(technical::bbands_upper(x[0], window(p[0]), p[1])),
        )
        .aliases(&["bbands_up"]),
        Builtin::new(
            "BBANDS_DOWN",
            "Lower Bollinger band",
            Technical,
            unary(&["x"])
                .param(Param::optional("period", ParamKind::Window, 20.0))
                .param(Param::optional("nbdev", ParamKind::Real, 2.0)),
            |x, p| Ok(technical::bbands_lower(x[0], window(p[0]), p[1])),
        )
        .aliases(&["bbands_down"]),
        // Cross-sectional
        Builtin::new("RANK", "Cross-sectional percentile rank", CrossSection, unary(&["x"]), |x, _| {
            Ok(cross_section::percentile_rank(x[0]))
        })
        .aliases(&["rank", "CS_RANK", "cs_rank"]),
        Builtin::new("CS_ZSCORE", "Cross-sectional z-score", CrossSection, unary(&["x"]), |x, _| {
            Ok(cross_section::zscore(x[0]))
        })
        .aliases(&["cs_zscore"]),
        Builtin::new("CS_DEMEAN", "Subtract the cross-sectional mean", CrossSection, unary(&["x"]), |x, _| {
            Ok(cross_section::demean(x[0]))
        })
        .aliases(&["cs_demean"]),
        // Elementwise
        Builtin::new("SIGN", "Sign of each value", Elementwise, unary(&["x"]), |x, _| {
            Ok(elementwise::sign(x[0]))
        })
        .aliases(&["sign"]),
        Builtin::new("LOG", "Natural logarithm", Elementwise, unary(&["x"]), |x, _| {
            Ok(elementwise::log(x[0]))
        })
        .aliases(&["log"]),
        Builtin::new("ABS", "Absolute value", Elementwise, unary(&["x"]), |x, _| {
            Ok(elementwise::abs(x[0]))
        })
        .aliases(&["abs"]),
        Builtin::new(
            "SIGNED_POWER",
            "Power of the magnitude, keeping the sign",
            Elementwise,
            unary(&["x"]).param(Param::required("exponent", ParamKind::Real)),
            |x, p| Ok(elementwise::signed_power(x[0], p[0])),
        )
        .aliases(&["signed_power"]),
        Builtin::new("MIN", "Element-wise minimum", Elementwise, unary(&["x", "y"]), |x, _| {
            Ok(elementwise::min(x[0], x[1]))
        })
        .aliases(&["min"]),
        Builtin::new("MAX", "Element-wise maximum", Elementwise, unary(&["x", "y"]), |x, _| {
            Ok(elementwise::max(x[0], x[1]))
        })
        .aliases(&["max"]),
        Builtin::new("GT", "left > right", Elementwise, unary(&["left", "right"]), |x, _| {
            Ok(elementwise::zip_with(BinaryOp::Gt, x[0], x[1]))
        })
        .boolean()
        .aliases(&["gt", "greater"]),
        Builtin::new("LT", "left < right", Elementwise, unary(&["left", "right"]), |x, _| {
            Ok(elementwise::zip_with(BinaryOp::Lt, x[0], x[1]))
        })
        .boolean()
        .aliases(&["lt", "less"]),
        Builtin::new("GE", "left >= right", Elementwise, unary(&["left", "right"]), |x, _| {
            Ok(elementwise::zip_with(BinaryOp::Ge, x[0], x[1]))
        })
        .boolean()
        .aliases(&["ge"]),
        Builtin::new("LE", "left <= right", Elementwise, unary(&["left", "right"]), |x, _| {
            Ok(elementwise::zip_with(BinaryOp::Le, x[0], x[1]))
        })
        .boolean()
        .aliases(&["le"]),
        Builtin::new("EQ", "left == right", Elementwise, unary(&["left", "right"]), |x, _| {
            Ok(elementwise::zip_with(BinaryOp::Eq, x[0], x[1]))
        })
        .boolean()
        .aliases(&["eq"]),
        Builtin::new("NE", "left != right", Elementwise, unary(&["left", "right"]), |x, _| {
            Ok(elementwise::zip_with(BinaryOp::Ne, x[0], x[1]))
        })
        .boolean()
        .aliases(&["ne"]),
        Builtin::new("XOR", "Exactly one side is truthy", Elementwise, unary(&["left", "right"]), |x, _| {
            Ok(elementwise::xor(x[0], x[1]))
        })
        .boolean()
        .aliases(&["xor"]),
        Builtin::new(
            "WHERE",
            "Pick `then` where the condition holds, `otherwise` elsewhere",
            Elementwise,
            unary(&["condition", "then", "otherwise"]),
            |x, _| Ok(elementwise::select(x[0], x[1], x[2])),
        )
        .aliases(&["where"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_names_are_unique() {
        let mut seen = HashSet::new();
        for builtin in table() {
            assert!(seen.insert(builtin.name), "duplicate {}", builtin.name);
            for alias in builtin.aliases {
                assert!(seen.insert(*alias), "duplicate alias {alias}");
            }
        }
        assert_eq!(OperatorRegistry::with_defaults().len(), seen.len());
    }

    #[test]
    fn test_modes_follow_categories() {
        let registry = OperatorRegistry::with_defaults();
        assert_eq!(registry.resolve("RANK").unwrap().mode(), ExecMode::CrossSection);
        assert_eq!(registry.resolve("ts_rank").unwrap().mode(), ExecMode::TimeSeries);
        assert_eq!(registry.resolve("MIN").unwrap().mode(), ExecMode::Elementwise);
        assert_eq!(registry.resolve("CORR").unwrap().mode(), ExecMode::TimeSeries);
    }

    #[test]
    fn test_boolean_outputs() {
        let registry = OperatorRegistry::with_defaults();
        assert_eq!(registry.resolve("CROSS_UP").unwrap().output(), ValueKind::Boolean);
        assert_eq!(registry.resolve("greater").unwrap().output(), ValueKind::Boolean);
        assert_eq!(registry.resolve("SIGNAL").unwrap().output(), ValueKind::Numeric);
        assert_eq!(registry.resolve("xor").unwrap().output(), ValueKind::Boolean);
    }

    #[test]
    fn test_source_defaults() {
        let registry = OperatorRegistry::with_defaults();
        let default_of = |name: &str| registry.resolve(name).unwrap().signature().params[0].default;
        assert_eq!(default_of("MA"), Some(20.0));
        assert_eq!(default_of("ts_rank"), Some(9.0));
        assert_eq!(default_of("COV"), Some(10.0));
        assert_eq!(default_of("delay"), Some(5.0));
        assert_eq!(default_of("SUM"), None);
        let rsrs = registry.resolve("RSRS_ZSCORE").unwrap();
        assert_eq!(rsrs.signature().params[1].default, Some(600.0));
    }

    #[test]
    fn test_compute_through_trait() {
        let registry = OperatorRegistry::with_defaults();
        let ma = registry.resolve("MA").unwrap();
        let out = ma.compute(&[&[10.0, 11.0, 12.0]], &[3.0]).unwrap();
        assert_eq!(out[2], 11.0);
        let label = registry.resolve("label").unwrap();
        let out = label.compute(&[&[10.0, 11.0, 12.1]], &[-1.0]).unwrap();
        approx::assert_relative_eq!(out[0], 0.1, epsilon = 1e-12);
        assert!(out[2].is_nan());
        assert!(label.signature().params[0].default.is_none());
        let scale = registry.resolve("SCALE").unwrap();
        assert!(scale.compute(&[&[0.0, 0.0]], &[1.0]).is_err());
    }
}
