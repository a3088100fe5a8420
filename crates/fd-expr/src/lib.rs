#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/fd-expr/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod alpha;
mod builtins;
pub mod config;
mod engine;
pub mod error;
mod eval;
pub mod grouped;
pub mod kernels;
pub mod panel;
pub mod parser;
pub mod preprocess;
pub mod registry;
pub mod series;

// Re-export core types
pub use alpha::{AlphaRegistry, AlphaSet};
pub use config::{EngineConfig, ErrorPolicy, PanelConfig};
pub use engine::{Engine, Evaluation, FactorExpr, FactorFrame};
pub use error::{ErrorKind, ExprError, Result};
pub use grouped::PartitionFailure;
pub use panel::{Panel, Partition};
pub use parser::{BinaryOp, Expr, UnaryOp, parse};
pub use preprocess::{cross_sectional_standardize, neutralize, robust_standardize, winsorize};
pub use registry::{
    ExecMode, Operator, OperatorCategory, OperatorInfo, OperatorRegistry, Param, ParamKind,
    Signature,
};
pub use series::{FactorSeries, Value, ValueKind};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
