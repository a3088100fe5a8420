//! Expression evaluation against a panel.
//!
//! Only two things are reachable from an expression: panel fields (or named
//! sub-expressions) and operators resolved through the registry. Everything
//! else is plain arithmetic on the tree.

use crate::grouped::{GroupedExecutor, PartitionFailure};
use crate::kernels::elementwise;
use crate::parser::{BinaryOp, Expr, UnaryOp};
use crate::registry::OperatorRegistry;
use crate::{ExprError, FactorSeries, Panel, Result, Value, ValueKind};
use std::collections::HashMap;

/// Walks an expression tree, collecting contained partition failures.
#[derive(Debug)]
pub(crate) struct Evaluator<'a> {
    registry: &'a OperatorRegistry,
    executor: &'a GroupedExecutor,
    definitions: &'a HashMap<String, Expr>,
    panel: &'a Panel,
    resolving: Vec<String>,
    failures: Vec<PartitionFailure>,
}

impl<'a> Evaluator<'a> {
    pub(crate) const fn new(
        registry: &'a OperatorRegistry,
        executor: &'a GroupedExecutor,
        definitions: &'a HashMap<String, Expr>,
        panel: &'a Panel,
    ) -> Self {
        Self {
            registry,
            executor,
            definitions,
            panel,
            resolving: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Evaluate to a series aligned to the panel, broadcasting a scalar result.
    pub(crate) fn evaluate_series(&mut self, expr: &Expr) -> Result<FactorSeries> {
        let len = self.panel.len();
        self.evaluate(expr).map(|value| value.into_series(len))
    }

    pub(crate) fn into_failures(self) -> Vec<PartitionFailure> {
        self.failures
    }

    pub(crate) fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(value) => Ok(Value::Scalar(*value)),
            Expr::Field(name) => self.identifier(name),
            Expr::Unary(op, operand) => {
                let operand = self.evaluate(operand)?;
                Ok(apply_unary(*op, operand))
            }
            Expr::Binary(op, left, right) => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                apply_binary(*op, left, right)
            }
            Expr::Call(name, args) => self.call(name, args),
        }
    }

    fn identifier(&mut self, name: &str) -> Result<Value> {
        if let Some(values) = self.panel.field(name) {
            return Ok(Value::Series(FactorSeries::numeric(values.to_vec())));
        }
        let Some(definition) = self.definitions.get(name) else {
            return Err(ExprError::UnknownField {
                name: name.to_string(),
            });
        };
        if self.resolving.iter().any(|n| n == name) {
            return Err(ExprError::RecursiveDefinition {
                name: name.to_string(),
            });
        }
        self.resolving.push(name.to_string());
        let value = self.evaluate(definition);
        self.resolving.pop();
        value
    }

    fn call(&mut self, name: &str, args: &[Expr]) -> Result<Value> {
        let operator = self.registry.resolve(name)?;
        let signature = operator.signature();
        if args.len() < signature.min_args() || args.len() > signature.max_args() {
            return Err(ExprError::Arity {
                operator: name.to_string(),
                expected: signature.arity(),
                found: args.len(),
            });
        }

        let (series_args, param_args) = args.split_at(signature.inputs.len());

        // Parameters first: a bad window fails before any input is computed
        let mut params = Vec::with_capacity(signature.params.len());
        for (idx, param) in signature.params.iter().enumerate() {
            let value = match param_args.get(idx) {
                Some(arg) => match self.evaluate(arg)? {
                    Value::Scalar(value) => value,
                    Value::Series(_) => {
                        return Err(ExprError::invalid_argument(
                            name,
                            &param.name,
                            format!("expected a constant, got `{arg}`"),
                        ));
                    }
                },
                None => param.default.ok_or_else(|| {
                    ExprError::invalid_argument(name, &param.name, "missing required parameter")
                })?,
            };
            param
                .kind
                .check(value)
                .map_err(|reason| ExprError::invalid_argument(name, &param.name, reason))?;
            params.push(value);
        }

        let inputs = series_args
            .iter()
            .map(|arg| self.evaluate_series(arg))
            .collect::<Result<Vec<_>>>()?;
        let views: Vec<&[f64]> = inputs.iter().map(FactorSeries::values).collect();

        let values = self.executor.execute(
            name,
            operator.as_ref(),
            self.panel,
            &views,
            &params,
            &mut self.failures,
        )?;
        Ok(Value::Series(FactorSeries::new(values, operator.output())))
    }
}

fn apply_unary(op: UnaryOp, operand: Value) -> Value {
    match operand {
        Value::Scalar(x) => Value::Scalar(elementwise::unary(op, x)),
        Value::Series(series) => {
            let kind = match op {
                UnaryOp::Neg => ValueKind::Numeric,
                UnaryOp::Not => ValueKind::Boolean,
            };
            let values = series.values().iter().map(|x| elementwise::unary(op, *x)).collect();
            Value::Series(FactorSeries::new(values, kind))
        }
    }
}

fn apply_binary(op: BinaryOp, left: Value, right: Value) -> Result<Value> {
    let kind = if op.is_boolean() {
        ValueKind::Boolean
    } else {
        ValueKind::Numeric
    };
    let values = match (left, right) {
        (Value::Scalar(a), Value::Scalar(b)) => return Ok(Value::Scalar(elementwise::binary(op, a, b))),
        (Value::Scalar(a), Value::Series(b)) => {
            b.values().iter().map(|v| elementwise::binary(op, a, *v)).collect()
        }
        (Value::Series(a), Value::Scalar(b)) => {
            a.values().iter().map(|v| elementwise::binary(op, *v, b)).collect()
        }
        (Value::Series(a), Value::Series(b)) => {
            if a.len() != b.len() {
                return Err(ExprError::ShapeMismatch {
                    left: a.len(),
                    right: b.len(),
                });
            }
            elementwise::zip_with(op, a.values(), b.values())
        }
    };
    Ok(Value::Series(FactorSeries::new(values, kind)))
}
