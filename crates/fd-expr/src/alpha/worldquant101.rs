//! The first ten formulaic alphas, several in simplified form.

use super::{AlphaSet, NamedExpression, named};

/// Formulaic alphas `alpha001` to `alpha010`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorldQuant101;

impl AlphaSet for WorldQuant101 {
    fn name(&self) -> &str {
        "worldquant101"
    }

    fn description(&self) -> &str {
        "Formulaic alphas 1 to 10 over ranks, correlations and deltas"
    }

    fn fields_names(&self) -> Vec<NamedExpression> {
        vec![
            named(
                "alpha001",
                "(TS_RANK(volume, 32) * (1 - TS_RANK(close + high - low, 16))) * (1 - TS_RANK(returns, 32))",
            ),
            named("alpha002", "CORR(RANK(volume), RANK((close - open) / open), 6)"),
            named("alpha003", "CORR(RANK(open), RANK(volume), 10)"),
            named("alpha004", "TS_RANK(RANK(low), 9)"),
            named("alpha005", "RANK(open - MA(high, 10)) * RANK(close - high)"),
            named("alpha006", "CORR(open, volume, 10)"),
            named("alpha007", "TS_RANK(volume, 5)"),
            named("alpha008", "RANK(SUM(returns, 5))"),
            named("alpha009", "DELTA(close, 1)"),
            named("alpha010", "RANK(DELTA(close, 1))"),
        ]
    }
}
