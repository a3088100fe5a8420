//! Engine entry points.
//!
//! An [`Engine`] bundles a registry, a configuration and any named
//! sub-expressions. Evaluation is a pure function of the expression and the
//! panel: the engine is never mutated by it, so one engine can serve many
//! threads.

use crate::alpha::AlphaSet;
use crate::eval::Evaluator;
use crate::grouped::{GroupedExecutor, PartitionFailure};
use crate::parser::{self, Expr};
use crate::registry::OperatorRegistry;
use crate::{EngineConfig, ExprError, FactorSeries, Panel, PanelConfig, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A parsed factor expression, reusable across panels.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorExpr {
    text: String,
    tree: Expr,
}

impl FactorExpr {
    /// Parse an expression, annotating any error with its text.
    pub fn parse(expression: &str) -> Result<Self> {
        let tree = parser::parse(expression).map_err(|e| e.in_expression(expression))?;
        Ok(Self {
            text: expression.to_string(),
            tree,
        })
    }

    /// The expression as written.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The parsed tree.
    pub const fn tree(&self) -> &Expr {
        &self.tree
    }
}

impl FromStr for FactorExpr {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for FactorExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Result of evaluating one expression.
///
/// `failures` lists the partitions that were contained under
/// [`ErrorPolicy::Isolate`](crate::ErrorPolicy::Isolate); their rows are
/// undefined in `series`.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Values aligned to the panel rows
    pub series: FactorSeries,
    /// Contained partition failures
    pub failures: Vec<PartitionFailure>,
}

impl Evaluation {
    /// Whether every partition computed successfully.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// DataFrame with the panel's index columns and the result as `name`.
    pub fn to_frame(&self, panel: &Panel, config: &PanelConfig, name: &str) -> Result<DataFrame> {
        let (entities, timestamps) = panel.index_columns(config);
        let df = DataFrame::new(vec![
            entities.into(),
            timestamps.into(),
            self.series.to_series(name).into(),
        ])?;
        Ok(df)
    }

    /// Values observed on one date, as `(entity, value)` pairs.
    ///
    /// Matches every timestamp that starts with the ISO date, so intraday
    /// timestamps on that day are included.
    pub fn cross_section(&self, panel: &Panel, date: NaiveDate) -> Vec<(String, Option<f64>)> {
        let day = date.format("%Y-%m-%d").to_string();
        panel
            .time_partitions()
            .iter()
            .filter(|p| p.key().starts_with(&day))
            .flat_map(|p| p.rows().iter())
            .filter_map(|row| {
                panel
                    .entity(*row)
                    .map(|entity| (entity.to_string(), self.series.get(*row)))
            })
            .collect()
    }
}

/// Several named results side by side.
#[derive(Debug, Clone)]
pub struct FactorFrame {
    frame: DataFrame,
    failures: Vec<PartitionFailure>,
}

impl FactorFrame {
    /// Index columns followed by one column per factor.
    pub const fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Consume and return the DataFrame.
    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    /// Contained partition failures across all factors.
    pub fn failures(&self) -> &[PartitionFailure] {
        &self.failures
    }

    /// Whether every factor computed without contained failures.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Factor expression engine.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    registry: Arc<OperatorRegistry>,
    executor: GroupedExecutor,
    definitions: HashMap<String, Expr>,
}

impl Engine {
    /// Engine over the process-wide operator registry.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_registry(config, OperatorRegistry::global())
    }

    /// Engine over a caller-supplied registry.
    pub fn with_registry(config: EngineConfig, registry: Arc<OperatorRegistry>) -> Result<Self> {
        let executor = GroupedExecutor::new(&config)?;
        Ok(Self {
            config,
            registry,
            executor,
            definitions: HashMap::new(),
        })
    }

    /// Engine configuration.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Operator registry used for name resolution.
    pub fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }

    /// Define a named sub-expression usable as an identifier.
    ///
    /// Panel fields take precedence over definitions of the same name.
    pub fn define(&mut self, name: &str, expression: &str) -> Result<()> {
        let valid = name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(ExprError::Config(format!(
                "`{name}` is not a valid definition name"
            )));
        }
        let expr = FactorExpr::parse(expression)?;
        tracing::debug!(name, expression, "defined sub-expression");
        self.definitions.insert(name.to_string(), expr.tree);
        Ok(())
    }

    /// Named sub-expressions, in arbitrary order.
    pub fn definitions(&self) -> impl Iterator<Item = (&str, &Expr)> {
        self.definitions.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parse and evaluate an expression.
    #[tracing::instrument(skip(self, panel), fields(rows = panel.len()))]
    pub fn evaluate(&self, expression: &str, panel: &Panel) -> Result<Evaluation> {
        let expr = FactorExpr::parse(expression)?;
        self.evaluate_expr(&expr, panel)
    }

    /// Evaluate an already parsed expression.
    pub fn evaluate_expr(&self, expr: &FactorExpr, panel: &Panel) -> Result<Evaluation> {
        let mut evaluator = Evaluator::new(&self.registry, &self.executor, &self.definitions, panel);
        let series = evaluator
            .evaluate_series(expr.tree())
            .map_err(|e| e.in_expression(expr.text()))?;
        let failures = evaluator.into_failures();
        if !failures.is_empty() {
            tracing::warn!(
                expression = expr.text(),
                failed = failures.len(),
                "evaluation completed with contained partition failures"
            );
        }
        Ok(Evaluation { series, failures })
    }

    /// Evaluate several named expressions into one frame.
    #[tracing::instrument(skip_all, fields(factors = factors.len(), rows = panel.len()))]
    pub fn evaluate_many(&self, factors: &[(&str, &str)], panel: &Panel) -> Result<FactorFrame> {
        let (entities, timestamps) = panel.index_columns(&self.config.panel);
        let mut columns: Vec<Column> = vec![entities.into(), timestamps.into()];
        let mut failures = Vec::new();

        for (name, expression) in factors {
            let evaluation = self.evaluate(expression, panel)?;
            columns.push(evaluation.series.to_series(name).into());
            failures.extend(evaluation.failures);
        }

        Ok(FactorFrame {
            frame: DataFrame::new(columns)?,
            failures,
        })
    }

    /// Read a DataFrame as a panel and evaluate several named expressions.
    pub fn evaluate_frame(&self, factors: &[(&str, &str)], df: &DataFrame) -> Result<FactorFrame> {
        let panel = Panel::from_frame(df, &self.config.panel)?;
        self.evaluate_many(factors, &panel)
    }

    /// Evaluate every factor of an alpha set, optionally followed by its label.
    ///
    /// The set's definitions are added for this call only; definitions
    /// already on the engine win.
    #[tracing::instrument(skip_all, fields(set = set.name(), rows = panel.len()))]
    pub fn evaluate_alpha(&self, set: &dyn AlphaSet, panel: &Panel, with_label: bool) -> Result<FactorFrame> {
        let mut scoped = self.clone();
        for (name, expression) in set.definitions() {
            if !scoped.definitions.contains_key(&name) {
                scoped.define(&name, &expression)?;
            }
        }
        let features = if with_label {
            set.all_features()
        } else {
            set.fields_names()
        };
        let factors: Vec<(&str, &str)> = features
            .iter()
            .map(|(name, expression)| (name.as_str(), expression.as_str()))
            .collect();
        scoped.evaluate_many(&factors, panel)
    }
}
