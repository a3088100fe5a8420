//! Partition-aware operator execution.
//!
//! Operators are written against a single partition: one entity's history or
//! one timestamp's cross-section. The executor slices every input to each
//! partition, runs the partitions on the rayon pool, and scatters the results
//! back to their original panel rows. Partitions never share output rows, so
//! the scatter needs no synchronization.

use crate::registry::{ExecMode, Operator};
use crate::{EngineConfig, ErrorPolicy, ExprError, Panel, Partition, Result};
use derive_more::Display;
use rayon::prelude::*;
use std::sync::Arc;

/// A partition whose computation failed and was replaced by undefined values.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
#[display("{operator} failed on {mode} partition {partition}: {reason}")]
pub struct PartitionFailure {
    /// Operator name as called
    pub operator: String,
    /// Entity identifier or timestamp of the partition
    pub partition: String,
    /// How the panel was partitioned
    pub mode: ExecMode,
    /// Error message of the failure
    pub reason: String,
}

/// Key reported for elementwise operators, which run on the whole panel.
const WHOLE_PANEL: &str = "*";

/// Runs operators partition by partition under an [`ErrorPolicy`].
#[derive(Debug, Clone)]
pub(crate) struct GroupedExecutor {
    policy: ErrorPolicy,
    parallel: bool,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl GroupedExecutor {
    pub(crate) fn new(config: &EngineConfig) -> Result<Self> {
        let pool = match config.threads {
            Some(0) => return Err(ExprError::Config("threads must be at least 1".to_string())),
            Some(threads) if config.parallel => Some(Arc::new(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|idx| format!("fd-expr-{idx}"))
                    .build()
                    .map_err(|e| ExprError::Config(format!("failed to build worker pool: {e}")))?,
            )),
            _ => None,
        };
        Ok(Self {
            policy: config.error_policy,
            parallel: config.parallel,
            pool,
        })
    }

    /// Run `operator` over `panel`, reading `inputs` aligned to the panel rows.
    ///
    /// Contained failures are appended to `failures`; under
    /// [`ErrorPolicy::Strict`] the first failing partition (in partition
    /// order) is returned as [`ExprError::PartitionCompute`] instead.
    pub(crate) fn execute(
        &self,
        name: &str,
        operator: &dyn Operator,
        panel: &Panel,
        inputs: &[&[f64]],
        params: &[f64],
        failures: &mut Vec<PartitionFailure>,
    ) -> Result<Vec<f64>> {
        for input in inputs {
            if input.len() != panel.len() {
                return Err(ExprError::ShapeMismatch {
                    left: panel.len(),
                    right: input.len(),
                });
            }
        }

        let mode = operator.mode();
        tracing::debug!(operator = name, %mode, rows = panel.len(), "executing operator");

        let partitions = match mode {
            ExecMode::TimeSeries => panel.entity_partitions(),
            ExecMode::CrossSection => panel.time_partitions(),
            ExecMode::Elementwise => {
                let result = compute_checked(operator, inputs, params, panel.len());
                return match result {
                    Ok(values) => Ok(values),
                    Err(err) => {
                        self.contain(name, WHOLE_PANEL, mode, err, failures)?;
                        Ok(vec![f64::NAN; panel.len()])
                    }
                };
            }
        };

        let run = |partition: &Partition| -> Result<Vec<f64>> {
            let sliced: Vec<Vec<f64>> = inputs
                .iter()
                .map(|input| partition.rows().iter().map(|row| input[*row]).collect())
                .collect();
            let views: Vec<&[f64]> = sliced.iter().map(Vec::as_slice).collect();
            compute_checked(operator, &views, params, partition.len())
        };

        let results: Vec<Result<Vec<f64>>> = if self.parallel {
            let job = || partitions.par_iter().map(run).collect::<Vec<_>>();
            match &self.pool {
                Some(pool) => pool.install(job),
                None => job(),
            }
        } else {
            partitions.iter().map(run).collect()
        };

        let mut out = vec![f64::NAN; panel.len()];
        for (partition, result) in partitions.iter().zip(results) {
            match result {
                Ok(values) => {
                    for (row, value) in partition.rows().iter().zip(values) {
                        out[*row] = value;
                    }
                }
                Err(err) => self.contain(name, partition.key(), mode, err, failures)?,
            }
        }
        Ok(out)
    }

    fn contain(
        &self,
        name: &str,
        partition: &str,
        mode: ExecMode,
        err: ExprError,
        failures: &mut Vec<PartitionFailure>,
    ) -> Result<()> {
        match self.policy {
            ErrorPolicy::Strict => Err(ExprError::PartitionCompute {
                operator: name.to_string(),
                partition: partition.to_string(),
                source: Box::new(err),
            }),
            ErrorPolicy::Isolate => {
                tracing::warn!(
                    operator = name,
                    partition,
                    %mode,
                    error = %err,
                    "partition failed, filling with undefined values"
                );
                failures.push(PartitionFailure {
                    operator: name.to_string(),
                    partition: partition.to_string(),
                    mode,
                    reason: err.to_string(),
                });
                Ok(())
            }
        }
    }
}

fn compute_checked(
    operator: &dyn Operator,
    inputs: &[&[f64]],
    params: &[f64],
    len: usize,
) -> Result<Vec<f64>> {
    let out = operator.compute(inputs, params)?;
    if out.len() != len {
        return Err(ExprError::ShapeMismatch {
            left: len,
            right: out.len(),
        });
    }
    Ok(out)
}
