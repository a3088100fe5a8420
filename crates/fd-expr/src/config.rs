//! Engine configuration.
//!
//! All configuration types are plain serde structs with sensible defaults, so
//! an empty JSON object is a valid configuration.

use serde::{Deserialize, Serialize};

/// How a failure inside one partition affects the whole call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// The failing partition contributes undefined values and the failure is
    /// reported alongside the result.
    #[default]
    Isolate,
    /// The first failing partition aborts the evaluation.
    Strict,
}

/// Names of the index columns when a panel is read from a DataFrame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Entity identifier column (default: `symbol`)
    pub entity_column: String,
    /// Timestamp column (default: `date`)
    pub time_column: String,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            entity_column: "symbol".to_string(),
            time_column: "date".to_string(),
        }
    }
}

/// Configuration for [`Engine`](crate::Engine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Panel index column names
    pub panel: PanelConfig,
    /// Partition failure handling
    pub error_policy: ErrorPolicy,
    /// Run partitions on a worker pool
    pub parallel: bool,
    /// Size of a dedicated worker pool; `None` uses the global rayon pool
    pub threads: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            panel: PanelConfig::default(),
            error_policy: ErrorPolicy::Isolate,
            parallel: true,
            threads: None,
        }
    }
}

impl EngineConfig {
    /// Configuration that propagates the first partition failure.
    pub fn strict() -> Self {
        Self {
            error_policy: ErrorPolicy::Strict,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.panel.entity_column, "symbol");
        assert_eq!(config.panel.time_column, "date");
        assert_eq!(config.error_policy, ErrorPolicy::Isolate);
        assert!(config.parallel);
        assert_eq!(config.threads, None);
    }

    #[test]
    fn test_strict() {
        assert_eq!(EngineConfig::strict().error_policy, ErrorPolicy::Strict);
    }

    #[test]
    fn test_empty_json_is_default() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_json_overrides() {
        let config: EngineConfig = serde_json::from_str(
            r#"{"error_policy": "strict", "threads": 2, "panel": {"entity_column": "ticker"}}"#,
        )
        .unwrap();
        assert_eq!(config.error_policy, ErrorPolicy::Strict);
        assert_eq!(config.threads, Some(2));
        assert_eq!(config.panel.entity_column, "ticker");
        assert_eq!(config.panel.time_column, "date");
        assert!(config.parallel);
    }
}
