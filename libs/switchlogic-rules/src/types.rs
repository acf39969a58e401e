//! Rule configuration types
//!
//! Field names follow the host plugin's JSON schema (`usePut`), with snake
//! case accepted as an alias for YAML/TOML configuration files.

use serde::{Deserialize, Serialize};

/// Output path prefixes delivered by put when no configuration says otherwise
pub const DEFAULT_PUT_PREFIXES: &[&str] = &["electrical.switches."];

fn default_use_put() -> Vec<String> {
    DEFAULT_PUT_PREFIXES.iter().map(|p| p.to_string()).collect()
}

fn default_enabled() -> bool {
    true
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Output path prefixes delivered by put rather than notify
    #[serde(rename = "usePut", alias = "use_put", default = "default_use_put")]
    pub use_put: Vec<String>,

    /// Rule definitions
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            use_put: default_use_put(),
            rules: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn with_rules(rules: Vec<RuleConfig>) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    /// Whether an output at `path` is delivered by put
    pub fn puts_to(&self, path: &str) -> bool {
        self.use_put.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }
}

/// A single rule definition
///
/// `input` and `output` are optional here so that an incomplete rule can be
/// reported and dropped instead of failing the whole configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Identifier used for the per-rule transition log
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Input logic expression
    #[serde(default)]
    pub input: Option<String>,

    /// Output term
    #[serde(default)]
    pub output: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Force put delivery for this rule
    #[serde(rename = "usePut", alias = "use_put", default)]
    pub use_put: bool,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            id: None,
            input: None,
            output: None,
            description: None,
            use_put: false,
            enabled: true,
        }
    }
}

impl RuleConfig {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: Some(input.into()),
            output: Some(output.into()),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_use_put(mut self, use_put: bool) -> Self {
        self.use_put = use_put;
        self
    }

    /// Description, defaulting to `<input> => <output>`
    pub fn display_name(&self) -> String {
        match &self.description {
            Some(d) if !d.is_empty() => d.clone(),
            _ => format!(
                "{} => {}",
                self.input.as_deref().unwrap_or_default(),
                self.output.as_deref().unwrap_or_default()
            ),
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"rules": []}"#).unwrap();
        assert_eq!(config.use_put, vec!["electrical.switches.".to_string()]);
        assert!(config.puts_to("electrical.switches.bank.0.1.state"));
        assert!(!config.puts_to("notifications.engine.oil"));
    }

    #[test]
    fn test_plugin_field_names() {
        let config: EngineConfig = serde_json::from_str(
            r#"{
                "usePut": [],
                "rules": [
                    {"input": "[0,1] and not [0,2]", "output": "[0,3]", "usePut": true},
                    {"input": "tanks.0.currentLevel:lt:0.1", "description": "low fuel"}
                ]
            }"#,
        )
        .unwrap();

        assert!(config.use_put.is_empty());
        assert!(config.rules[0].use_put);
        assert!(config.rules[0].enabled);
        assert_eq!(config.rules[0].display_name(), "[0,1] and not [0,2] => [0,3]");
        assert_eq!(config.rules[1].output, None);
        assert_eq!(config.rules[1].display_name(), "low fuel");
    }

    #[test]
    fn test_snake_case_alias() {
        let config: EngineConfig = serde_yaml::from_str(
            "use_put: [\"tanks.\"]\nrules:\n  - input: \"1\"\n    output: tanks.valve\n    use_put: false\n",
        )
        .unwrap();
        assert_eq!(config.use_put, vec!["tanks.".to_string()]);
        assert!(!config.rules[0].use_put);
    }
}
