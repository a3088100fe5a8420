//! Operator registry for name resolution and introspection.
//!
//! The registry maps every name an expression may call to an [`Operator`].
//! Built-ins are registered once by [`OperatorRegistry::with_defaults`]; after
//! that a registry is only read, so one instance can be shared across threads
//! and partitions without locking.

use crate::{ExprError, Result, ValueKind};
use derive_more::Display;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// How the grouped executor partitions a panel for an operator.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecMode {
    /// One partition per entity, rows in time order
    #[display("time-series")]
    TimeSeries,
    /// One partition per timestamp, across entities
    #[display("cross-section")]
    CrossSection,
    /// The whole panel at once; output row `i` depends only on input row `i`
    #[display("elementwise")]
    Elementwise,
}

/// Operator category for grouping related operators.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorCategory {
    /// Rolling - trailing-window statistics on one series
    Rolling,
    /// Pairwise - trailing-window statistics on two series
    Pairwise,
    /// CrossSection - statistics across entities at one timestamp
    CrossSection,
    /// Elementwise - row-by-row transforms and comparisons
    Elementwise,
    /// Signal - crossing detectors and position signals
    Signal,
    /// Technical - classic indicators
    Technical,
}

/// Accepted values for a scalar parameter.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Window length: an integer of at least 1
    #[display("window")]
    Window,
    /// Row offset: any integer, negative looks ahead
    #[display("lag")]
    Lag,
    /// Probability in `[0, 1]`
    #[display("probability")]
    Probability,
    /// Any finite number
    #[display("real")]
    Real,
}

impl ParamKind {
    /// Check a value against this kind, describing the problem on failure.
    pub fn check(self, value: f64) -> std::result::Result<(), String> {
        if !value.is_finite() {
            return Err(format!("expected a finite {self}, got {value}"));
        }
        match self {
            Self::Window if value.fract() != 0.0 || value < 1.0 => {
                Err(format!("window must be an integer of at least 1, got {value}"))
            }
            Self::Lag if value.fract() != 0.0 => Err(format!("lag must be an integer, got {value}")),
            Self::Probability if !(0.0..=1.0).contains(&value) => {
                Err(format!("probability must lie in [0, 1], got {value}"))
            }
            _ => Ok(()),
        }
    }
}

/// A scalar parameter following an operator's series inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Parameter name, used in messages and listings
    pub name: String,
    /// Accepted values
    pub kind: ParamKind,
    /// Value used when the argument is omitted
    pub default: Option<f64>,
}

impl Param {
    /// A parameter that must be supplied.
    pub fn required(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
        }
    }

    /// A parameter with a default value.
    pub fn optional(name: impl Into<String>, kind: ParamKind, default: f64) -> Self {
        Self {
            name: name.into(),
            kind,
            default: Some(default),
        }
    }
}

/// Call shape of an operator: series inputs first, then scalar parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    /// Names of the series inputs
    pub inputs: Vec<String>,
    /// Scalar parameters in call order
    pub params: Vec<Param>,
}

impl Signature {
    /// Signature with the given series inputs and no parameters.
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            params: Vec::new(),
        }
    }

    /// Append a parameter.
    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Minimum number of call arguments.
    pub fn min_args(&self) -> usize {
        self.inputs.len() + self.params.iter().filter(|p| p.default.is_none()).count()
    }

    /// Maximum number of call arguments.
    pub fn max_args(&self) -> usize {
        self.inputs.len() + self.params.len()
    }

    /// Human-readable accepted argument count, e.g. `2` or `1 to 2`.
    pub fn arity(&self) -> String {
        let (min, max) = (self.min_args(), self.max_args());
        if min == max {
            min.to_string()
        } else {
            format!("{min} to {max}")
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.inputs.is_empty() {
            return Err("an operator needs at least one series input".to_string());
        }
        let mut seen_default = false;
        for param in &self.params {
            match param.default {
                Some(default) => {
                    seen_default = true;
                    param
                        .kind
                        .check(default)
                        .map_err(|reason| format!("default for `{}`: {reason}", param.name))?;
                }
                None if seen_default => {
                    return Err(format!(
                        "required parameter `{}` follows an optional one",
                        param.name
                    ));
                }
                None => {}
            }
        }
        Ok(())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.inputs.clone();
        for param in &self.params {
            parts.push(match param.default {
                Some(default) => format!("{}={default}", param.name),
                None => param.name.clone(),
            });
        }
        write!(f, "({})", parts.join(", "))
    }
}

/// A vectorized operator callable from expressions.
///
/// Implementations compute on one partition at a time: the grouped executor
/// slices every series input to the partition's rows, in the partition's
/// order, and expects an output of the same length back.
pub trait Operator: Send + Sync + fmt::Debug {
    /// Canonical name.
    fn name(&self) -> &str;

    /// Human-readable description of what the operator computes.
    fn description(&self) -> &str;

    /// Category for listings.
    fn category(&self) -> OperatorCategory;

    /// Partitioning applied before [`compute`](Self::compute) is called.
    fn mode(&self) -> ExecMode;

    /// Accepted arguments.
    fn signature(&self) -> &Signature;

    /// Element type of the result.
    fn output(&self) -> ValueKind {
        ValueKind::Numeric
    }

    /// Compute one partition.
    ///
    /// `inputs` holds one slice per series input, all of equal length.
    /// `params` holds every parameter, defaults filled in and already checked
    /// against their [`ParamKind`].
    fn compute(&self, inputs: &[&[f64]], params: &[f64]) -> Result<Vec<f64>>;
}

/// Metadata for operator introspection.
#[derive(Debug, Clone)]
pub struct OperatorInfo {
    /// Name the operator is registered under (possibly an alias)
    pub name: String,
    /// Canonical operator name
    pub canonical: String,
    /// Human-readable description
    pub description: String,
    /// Operator category
    pub category: OperatorCategory,
    /// Partitioning mode
    pub mode: ExecMode,
    /// Call shape
    pub signature: Signature,
    /// Result element type
    pub output: ValueKind,
}

/// Registry for operator resolution.
#[derive(Debug, Default)]
pub struct OperatorRegistry {
    operators: HashMap<String, Arc<dyn Operator>>,
}

static GLOBAL: OnceLock<Arc<OperatorRegistry>> = OnceLock::new();

impl OperatorRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            operators: HashMap::new(),
        }
    }

    /// Registry holding every built-in operator and its aliases.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        crate::builtins::install(&mut registry);
        registry
    }

    /// The process-wide registry.
    ///
    /// Initialised with [`with_defaults`](Self::with_defaults) on first use
    /// unless [`install_global`](Self::install_global) ran earlier.
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::with_defaults())))
    }

    /// Install `registry` as the process-wide registry.
    ///
    /// Must run at startup before the first call to [`global`](Self::global);
    /// fails once the global registry exists.
    pub fn install_global(registry: Self) -> Result<()> {
        GLOBAL.set(Arc::new(registry)).map_err(|_| {
            ExprError::Config("the global operator registry is already initialised".to_string())
        })
    }

    /// Register an operator under its canonical name.
    ///
    /// Fails if the name is taken or the signature is malformed. Use
    /// [`replace`](Self::replace) to override an existing binding.
    pub fn register(&mut self, operator: Arc<dyn Operator>) -> Result<()> {
        let name = operator.name().to_string();
        validate(operator.as_ref())?;
        if self.operators.contains_key(&name) {
            return Err(ExprError::DuplicateOperator { name });
        }
        tracing::debug!(operator = %name, mode = %operator.mode(), "registered operator");
        self.operators.insert(name, operator);
        Ok(())
    }

    /// Bind an operator under its canonical name, overriding any existing
    /// binding. Returns the operator that was replaced.
    pub fn replace(&mut self, operator: Arc<dyn Operator>) -> Result<Option<Arc<dyn Operator>>> {
        validate(operator.as_ref())?;
        let name = operator.name().to_string();
        let previous = self.operators.insert(name.clone(), operator);
        if let Some(previous) = &previous {
            tracing::warn!(
                operator = %name,
                previous = %previous.name(),
                "replaced registered operator"
            );
        }
        Ok(previous)
    }

    /// Make `target`'s operator callable as `alias` too.
    pub fn alias(&mut self, alias: &str, target: &str) -> Result<()> {
        if self.operators.contains_key(alias) {
            return Err(ExprError::DuplicateOperator {
                name: alias.to_string(),
            });
        }
        let operator = self.resolve(target)?;
        self.operators.insert(alias.to_string(), operator);
        Ok(())
    }

    /// Get an operator by name.
    pub fn get(&self, name: &str) -> Option<&dyn Operator> {
        self.operators.get(name).map(|op| op.as_ref())
    }

    /// Get an operator by name, failing with
    /// [`UnknownOperator`](ExprError::UnknownOperator) when absent.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Operator>> {
        self.operators
            .get(name)
            .cloned()
            .ok_or_else(|| ExprError::UnknownOperator {
                name: name.to_string(),
            })
    }

    /// Get operators by category, one entry per canonical operator.
    pub fn by_category(&self, category: OperatorCategory) -> Vec<&dyn Operator> {
        let mut ops: Vec<&dyn Operator> = self
            .operators
            .iter()
            .filter(|(name, op)| op.category() == category && op.name() == name.as_str())
            .map(|(_, op)| op.as_ref())
            .collect();
        ops.sort_by(|a, b| a.name().cmp(b.name()));
        ops
    }

    /// Get all operator metadata, sorted by registered name.
    pub fn all_info(&self) -> Vec<OperatorInfo> {
        let mut info: Vec<OperatorInfo> = self
            .operators
            .iter()
            .map(|(name, op)| OperatorInfo {
                name: name.clone(),
                canonical: op.name().to_string(),
                description: op.description().to_string(),
                category: op.category(),
                mode: op.mode(),
                signature: op.signature().clone(),
                output: op.output(),
            })
            .collect();
        info.sort_by(|a, b| a.name.cmp(&b.name));
        info
    }

    /// All callable names, aliases included, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operators.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Number of callable names.
    pub fn len(&self) -> usize {
        self.operators.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

fn validate(operator: &dyn Operator) -> Result<()> {
    let name = operator.name();
    let valid_name = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid_name {
        return Err(ExprError::InvalidOperator {
            name: name.to_string(),
            reason: "name is not a valid identifier".to_string(),
        });
    }
    operator
        .signature()
        .validate()
        .map_err(|reason| ExprError::InvalidOperator {
            name: name.to_string(),
            reason,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use rstest::rstest;

    #[derive(Debug)]
    struct Double {
        name: &'static str,
        signature: Signature,
    }

    impl Double {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                signature: Signature::new(["x"]),
            }
        }
    }

    impl Operator for Double {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "Twice the input"
        }

        fn category(&self) -> OperatorCategory {
            OperatorCategory::Elementwise
        }

        fn mode(&self) -> ExecMode {
            ExecMode::Elementwise
        }

        fn signature(&self) -> &Signature {
            &self.signature
        }

        fn compute(&self, inputs: &[&[f64]], _params: &[f64]) -> Result<Vec<f64>> {
            Ok(inputs[0].iter().map(|v| v * 2.0).collect())
        }
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = OperatorRegistry::new();
        assert!(registry.is_empty());
        registry.register(Arc::new(Double::new("DOUBLE"))).unwrap();
        registry.alias("double", "DOUBLE").unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["DOUBLE", "double"]);
        assert_eq!(registry.resolve("double").unwrap().name(), "DOUBLE");
        assert_eq!(registry.by_category(OperatorCategory::Elementwise).len(), 1);
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let mut registry = OperatorRegistry::new();
        registry.register(Arc::new(Double::new("DOUBLE"))).unwrap();
        let err = registry.resolve("Double").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownOperator);
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = OperatorRegistry::new();
        registry.register(Arc::new(Double::new("DOUBLE"))).unwrap();
        let err = registry.register(Arc::new(Double::new("DOUBLE"))).unwrap_err();
        assert!(matches!(err, ExprError::DuplicateOperator { name } if name == "DOUBLE"));
        assert!(registry.alias("DOUBLE", "DOUBLE").is_err());
    }

    #[test]
    fn test_replace_is_explicit() {
        let mut registry = OperatorRegistry::new();
        assert!(registry.replace(Arc::new(Double::new("DOUBLE"))).unwrap().is_none());
        let previous = registry.replace(Arc::new(Double::new("DOUBLE"))).unwrap();
        assert!(previous.is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_alias_to_missing_operator() {
        let mut registry = OperatorRegistry::new();
        let err = registry.alias("x", "MISSING").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownOperator);
    }

    #[test]
    fn test_invalid_operator_name() {
        let mut registry = OperatorRegistry::new();
        let err = registry.register(Arc::new(Double::new("2x"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Registration);
    }

    #[test]
    fn test_signature_validation() {
        let bad_order = Signature::new(["x"])
            .param(Param::optional("a", ParamKind::Real, 1.0))
            .param(Param::required("b", ParamKind::Real));
        assert!(bad_order.validate().is_err());

        let bad_default = Signature::new(["x"]).param(Param::optional("n", ParamKind::Window, 0.0));
        assert!(bad_default.validate().is_err());

        assert!(Signature::new(Vec::<String>::new()).validate().is_err());
    }

    #[test]
    fn test_signature_shape() {
        let sig = Signature::new(["x"])
            .param(Param::required("window", ParamKind::Window))
            .param(Param::optional("q", ParamKind::Probability, 0.8));
        assert_eq!(sig.min_args(), 2);
        assert_eq!(sig.max_args(), 3);
        assert_eq!(sig.arity(), "2 to 3");
        assert_eq!(sig.to_string(), "(x, window, q=0.8)");
    }

    #[rstest]
    #[case(ParamKind::Window, 5.0, true)]
    #[case(ParamKind::Window, 0.0, false)]
    #[case(ParamKind::Window, 2.5, false)]
    #[case(ParamKind::Lag, -3.0, true)]
    #[case(ParamKind::Lag, 1.5, false)]
    #[case(ParamKind::Probability, 1.0, true)]
    #[case(ParamKind::Probability, 1.2, false)]
    #[case(ParamKind::Real, -7.25, true)]
    #[case(ParamKind::Real, f64::INFINITY, false)]
    fn test_param_kind_check(#[case] kind: ParamKind, #[case] value: f64, #[case] ok: bool) {
        assert_eq!(kind.check(value).is_ok(), ok);
    }

    #[test]
    fn test_defaults_and_global() {
        let registry = OperatorRegistry::with_defaults();
        for name in ["MA", "ma", "REF", "DELAY", "RANK", "CROSS_UP", "RSRS", "MIN", "TS_MIN"] {
            assert!(registry.get(name).is_some(), "{name} should be registered");
        }
        assert_eq!(registry.resolve("REF").unwrap().name(), registry.resolve("shift").unwrap().name());
        assert_eq!(OperatorRegistry::global().len(), registry.len());
    }
}
