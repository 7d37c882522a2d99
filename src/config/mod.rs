//! Configuration module for ruleflow
//!
//! The engine reads a single TOML file:
//!
//! ```toml
//! rules = ["rules/main.rules"]
//!
//! [log]
//! level = "debug"
//! directory = "logs"
//!
//! # handed to every node
//! [custom]
//! region = "eu"
//!
//! # handed only to `timer` nodes
//! [nodes.timer]
//! freq = "500ms"
//! ```
//!
//! Node parameters are merged in three levels: `[custom]`, then
//! `[nodes.<type>]`, then the parameters written at the call site. Later
//! levels win.

use crate::error::{EngineError, Result};
use crate::pipeline::Params;
use crate::rules::Param;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default log filter when neither the config nor `RUST_LOG` sets one
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Log file name prefix used by the rolling file appender
pub const LOG_FILE_PREFIX: &str = "ruleflow.log";

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `info` or `ruleflow::pipeline=trace`
    pub level: String,
    /// Write a daily rolling log file into this directory as well
    pub directory: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            directory: None,
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub log: LogConfig,
    /// Entry rule files
    pub rules: Vec<PathBuf>,
    /// Values visible to every node
    pub custom: BTreeMap<String, toml::Value>,
    /// Values visible to nodes of one type, keyed by type name
    pub nodes: BTreeMap<String, BTreeMap<String, toml::Value>>,
}

impl EngineConfig {
    /// Load a config file from disk.
    ///
    /// Relative `rules` entries and `log.directory` are resolved against the
    /// config file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        let mut config = Self::from_toml_str(&content)
            .map_err(|e| e.with_context(format!("In {}", path.display())))?;

        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            config.rebase(base);
        }
        Ok(config)
    }

    /// Parse a config from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))
    }

    fn rebase(&mut self, base: &Path) {
        for rule in &mut self.rules {
            if rule.is_relative() {
                *rule = base.join(&*rule);
            }
        }
        if let Some(dir) = self.log.directory.as_mut().filter(|d| d.is_relative()) {
            *dir = base.join(&*dir);
        }
    }

    /// Set a global value
    pub fn with_custom(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }

    /// Set a value for one node type
    pub fn with_node_value(
        mut self,
        type_name: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<toml::Value>,
    ) -> Self {
        self.nodes
            .entry(type_name.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    /// Build the parameters handed to a node factory: `[custom]`, then
    /// `[nodes.<type_name>]`, then the call site.
    pub fn node_params(&self, type_name: &str, call_site: &[Param]) -> Params {
        let mut params = Params::new();
        for (key, value) in &self.custom {
            params.insert(key.as_str(), value_to_string(value));
        }
        if let Some(values) = self.nodes.get(type_name) {
            for (key, value) in values {
                params.insert(key.as_str(), value_to_string(value));
            }
        }
        for param in call_site {
            params.insert(param.name.as_str(), param.value.to_string());
        }
        params
    }
}

fn value_to_string(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Float(f) => f.to_string(),
        toml::Value::Boolean(b) => b.to_string(),
        toml::Value::Datetime(d) => d.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ParamValue;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.log.level, "info");
        assert!(config.rules.is_empty());
    }

    #[test]
    fn test_parse_full_file() {
        let config = EngineConfig::from_toml_str(
            r#"
            rules = ["main.rules"]

            [log]
            level = "debug"

            [custom]
            region = "eu"
            retries = 3

            [nodes.timer]
            freq = "500ms"
            "#,
        )
        .unwrap();
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.rules, vec![PathBuf::from("main.rules")]);
        assert_eq!(config.custom.len(), 2);
        assert!(config.nodes.contains_key("timer"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = EngineConfig::from_toml_str("rulez = []").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_node_params_precedence() {
        let config = EngineConfig::default()
            .with_custom("freq", "10s")
            .with_custom("region", "eu")
            .with_custom("retries", 3)
            .with_node_value("timer", "freq", "2s")
            .with_node_value("timer", "count", 5)
            .with_node_value("echo", "prefix", "never");

        let call_site = vec![Param {
            name: "count".into(),
            value: ParamValue::Number(2.0),
        }];
        let params = config.node_params("timer", &call_site);
        assert_eq!(params.get("freq"), Some("2s"));
        assert_eq!(params.get("count"), Some("2"));
        assert_eq!(params.get("region"), Some("eu"));
        assert_eq!(params.get("retries"), Some("3"));
        assert_eq!(params.get("prefix"), None);

        let params = config.node_params("text", &[]);
        assert_eq!(params.get("freq"), Some("10s"));
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ruleflow.toml");
        std::fs::write(
            &path,
            "rules = [\"main.rules\", \"/abs/other.rules\"]\n[log]\ndirectory = \"logs\"\n",
        )
        .unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.rules[0], dir.path().join("main.rules"));
        assert_eq!(config.rules[1], PathBuf::from("/abs/other.rules"));
        assert_eq!(config.log.directory, Some(dir.path().join("logs")));
    }

    #[test]
    fn test_load_missing_file() {
        let err = EngineConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
