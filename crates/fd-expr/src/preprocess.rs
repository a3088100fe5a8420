//! Cross-sectional preprocessing of factor frames.
//!
//! These helpers post-process the frames produced by
//! [`Engine::evaluate_many`](crate::Engine::evaluate_many): every statistic is
//! computed per timestamp with polars window expressions.

use crate::Result;
use polars::prelude::*;

/// Cross-sectional z-score standardization.
///
/// Computes z_i = (x_i - mean(x)) / std(x) for each timestamp across all
/// entities.
///
/// # Arguments
///
/// * `df` - Frame with `time_column` and `value_column`
/// * `value_column` - Name of the column to standardize
/// * `time_column` - Column defining the cross-sections
///
/// # Returns
///
/// DataFrame with the value column replaced by its z-scores.
pub fn cross_sectional_standardize(
    df: &DataFrame,
    value_column: &str,
    time_column: &str,
) -> Result<DataFrame> {
    let result = df
        .clone()
        .lazy()
        .with_column(
            ((col(value_column) - col(value_column).mean()) / col(value_column).std(1))
                .over([col(time_column)])
                .alias(value_column),
        )
        .collect()?;

    Ok(result)
}

/// Winsorization for outlier handling.
///
/// Clips values to the `lower_pct` / `upper_pct` quantiles of their
/// cross-section.
pub fn winsorize(
    df: &DataFrame,
    value_column: &str,
    time_column: &str,
    lower_pct: f64,
    upper_pct: f64,
) -> Result<DataFrame> {
    let result = df
        .clone()
        .lazy()
        .with_column(
            col(value_column)
                .quantile(lit(lower_pct), QuantileMethod::Linear)
                .over([col(time_column)])
                .alias("__lower"),
        )
        .with_column(
            col(value_column)
                .quantile(lit(upper_pct), QuantileMethod::Linear)
                .over([col(time_column)])
                .alias("__upper"),
        )
        .with_column(
            when(col(value_column).lt(col("__lower")))
                .then(col("__lower"))
                .when(col(value_column).gt(col("__upper")))
                .then(col("__upper"))
                .otherwise(col(value_column))
                .alias(value_column),
        )
        .drop(["__lower", "__upper"])
        .collect()?;

    Ok(result)
}

/// MAD-based robust standardization.
///
/// Computes z_i = (x_i - median(x)) / (1.4826 * MAD(x)) per cross-section.
pub fn robust_standardize(df: &DataFrame, value_column: &str, time_column: &str) -> Result<DataFrame> {
    // consistency with the normal distribution
    const MAD_SCALE: f64 = 1.4826;

    let result = df
        .clone()
        .lazy()
        .with_column(
            col(value_column)
                .median()
                .over([col(time_column)])
                .alias("__median"),
        )
        .with_column(
            (col(value_column) - col("__median"))
                .abs()
                .median()
                .over([col(time_column)])
                .alias("__mad"),
        )
        .with_column(
            ((col(value_column) - col("__median")) / (col("__mad") * lit(MAD_SCALE)))
                .alias(value_column),
        )
        .drop(["__median", "__mad"])
        .collect()?;

    Ok(result)
}

/// Remove group exposure by demeaning within each (timestamp, group) cell.
///
/// `group_column` is typically an industry or sector label.
pub fn neutralize(
    df: &DataFrame,
    value_column: &str,
    time_column: &str,
    group_column: &str,
) -> Result<DataFrame> {
    let result = df
        .clone()
        .lazy()
        .with_column(
            (col(value_column) - col(value_column).mean())
                .over([col(time_column), col(group_column)])
                .alias(value_column),
        )
        .collect()?;

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn frame() -> DataFrame {
        df![
            "symbol" => ["A", "B", "C", "A", "B", "C"],
            "date" => ["2024-01-01", "2024-01-01", "2024-01-01", "2024-01-02", "2024-01-02", "2024-01-02"],
            "sector" => ["x", "x", "y", "x", "x", "y"],
            "value" => [1.0, 2.0, 3.0, 4.0, 5.0, 60.0]
        ]
        .unwrap()
    }

    #[test]
    fn test_cross_sectional_standardize() {
        let result = cross_sectional_standardize(&frame(), "value", "date").unwrap();
        let values = result.column("value").unwrap().f64().unwrap();

        // Mean of [1,2,3] = 2, std = 1. So z-scores should be [-1, 0, 1]
        assert_relative_eq!(values.get(0).unwrap(), -1.0, epsilon = 1e-12);
        assert_relative_eq!(values.get(1).unwrap(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(values.get(2).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_winsorize_clips_to_quantiles() {
        let result = winsorize(&frame(), "value", "date", 0.0, 0.5).unwrap();
        let values = result.column("value").unwrap().f64().unwrap();
        // 2024-01-02 median is 5, so 60 is clipped
        assert_eq!(values.get(5), Some(5.0));
        assert_eq!(values.get(3), Some(4.0));
        assert_eq!(result.width(), 4);
    }

    #[test]
    fn test_robust_standardize() {
        let result = robust_standardize(&frame(), "value", "date").unwrap();
        let values = result.column("value").unwrap().f64().unwrap();
        // median 2, MAD 1
        assert_relative_eq!(values.get(2).unwrap(), 1.0 / 1.4826, epsilon = 1e-12);
        assert_relative_eq!(values.get(1).unwrap(), 0.0);
    }

    #[test]
    fn test_neutralize_demeans_within_groups() {
        let result = neutralize(&frame(), "value", "date", "sector").unwrap();
        let values = result.column("value").unwrap().f64().unwrap();
        assert_relative_eq!(values.get(0).unwrap(), -0.5);
        assert_relative_eq!(values.get(1).unwrap(), 0.5);
        assert_relative_eq!(values.get(2).unwrap(), 0.0);
    }
}
