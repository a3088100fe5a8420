//! Named factor sets.
//!
//! An [`AlphaSet`] is a named list of `(name, expression)` pairs plus the
//! sub-expressions they share and a forward-return label. Sets are fed to
//! [`Engine::evaluate_alpha`](crate::Engine::evaluate_alpha) or, through
//! [`AlphaSet::fields_names`], to [`Engine::evaluate_many`](crate::Engine::evaluate_many).

mod alpha158;
mod thematic;
mod worldquant101;

pub use alpha158::Alpha158;
pub use thematic::{AlphaMomentum, AlphaTechnical, AlphaValue, AlphaVolatility};
pub use worldquant101::WorldQuant101;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A factor name paired with its expression.
pub type NamedExpression = (String, String);

/// Forward horizons, in rows, of the information-coefficient labels.
pub const IC_HORIZONS: [i64; 4] = [1, 5, 10, 20];

/// A named collection of factor expressions.
pub trait AlphaSet: Send + Sync + fmt::Debug {
    /// Set name used for lookup.
    fn name(&self) -> &str;

    /// One-line description.
    fn description(&self) -> &str;

    /// Factor names and expressions, in output order.
    fn fields_names(&self) -> Vec<NamedExpression>;

    /// Sub-expressions the factors refer to by name.
    ///
    /// A panel field of the same name shadows the definition.
    fn definitions(&self) -> Vec<NamedExpression> {
        vec![named("returns", "close / REF(close, 1) - 1")]
    }

    /// Training label: the 20-row forward return.
    fn label(&self) -> NamedExpression {
        named("label", "LABEL(close, -20)")
    }

    /// Forward returns used to score factors, one per [`IC_HORIZONS`] entry.
    fn ic_labels(&self) -> Vec<NamedExpression> {
        IC_HORIZONS
            .iter()
            .map(|d| (format!("return_{d}"), format!("LABEL(close, -{d})")))
            .collect()
    }

    /// Factors followed by the label.
    fn all_features(&self) -> Vec<NamedExpression> {
        let mut features = self.fields_names();
        features.push(self.label());
        features
    }

    /// Expression of the factor called `name`.
    fn field_by_name(&self, name: &str) -> Option<String> {
        self.fields_names()
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, expression)| expression)
    }
}

pub(crate) fn named(name: &str, expression: &str) -> NamedExpression {
    (name.to_string(), expression.to_string())
}

/// Registry of alpha sets keyed by name.
#[derive(Debug, Default, Clone)]
pub struct AlphaRegistry {
    sets: BTreeMap<String, Arc<dyn AlphaSet>>,
}

impl AlphaRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in set.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(Alpha158));
        registry.register(Arc::new(WorldQuant101));
        registry.register(Arc::new(AlphaMomentum));
        registry.register(Arc::new(AlphaValue));
        registry.register(Arc::new(AlphaVolatility));
        registry.register(Arc::new(AlphaTechnical));
        registry
    }

    /// Register a set, replacing any set of the same name.
    pub fn register(&mut self, set: Arc<dyn AlphaSet>) {
        self.sets.insert(set.name().to_string(), set);
    }

    /// Look up a set by name.
    pub fn get(&self, name: &str) -> Option<&dyn AlphaSet> {
        self.sets.get(name).map(|set| set.as_ref())
    }

    /// Registered set names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.sets.keys().map(String::as_str).collect()
    }

    /// Registered sets in name order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn AlphaSet> {
        self.sets.values().map(|set| set.as_ref())
    }

    /// Number of registered sets.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}
