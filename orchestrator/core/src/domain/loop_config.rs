// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Loop Configuration Types
//
// Defines the configuration schema for an answerloop instance:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Escalation threshold and escalation transport
// - Decision strategy (keyword heuristics or an LLM backend)
// - Storage backend and data directory
// - Auto-validation windows
// - Network and observability settings

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const API_VERSION: &str = "answerloop/v1";
pub const KIND: &str = "LoopConfig";

/// Top-level Kubernetes-style loop configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfigManifest {
    /// API version (must be "answerloop/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "LoopConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: LoopConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Loop settings (content under `spec:`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfigSpec {
    /// Candidates strictly below this confidence are escalated
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub escalation: EscalationConfig,

    #[serde(default)]
    pub decision: DecisionConfig,

    #[serde(default)]
    pub auto_validation: AutoValidationConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    /// JSON files under `data_dir`
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackendKind,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EscalationMode {
    /// Prompt on the controlling terminal
    #[default]
    Console,
    /// Park the request until answered over the HTTP API
    Queue,
    /// Never ask; always keep the best guess
    Defer,
}

impl std::str::FromStr for EscalationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "console" => Ok(Self::Console),
            "queue" => Ok(Self::Queue),
            "defer" => Ok(Self::Defer),
            other => Err(format!("unknown escalation mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    #[serde(default)]
    pub mode: EscalationMode,

    /// How long a queued escalation waits before deferring
    #[serde(default = "default_escalation_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStrategy {
    #[default]
    Heuristic,
    Llm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionConfig {
    #[serde(default)]
    pub strategy: DecisionStrategy,

    /// Keyword rules consulted by the heuristic strategy, first match wins
    #[serde(default = "default_decision_rules")]
    pub rules: Vec<DecisionRule>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm: Option<LlmConfig>,

    /// Use the heuristic strategy when the LLM backend fails
    #[serde(default = "default_true")]
    pub fallback_on_unavailable: bool,
}

/// A canned decision for questions containing every keyword
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRule {
    pub name: String,
    pub keywords: Vec<String>,
    pub chosen_option: String,
    pub reasoning: String,
    pub confidence: f64,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub alternatives: Vec<String>,
}

impl DecisionRule {
    /// All keywords must appear in the lowercased question.
    pub fn matches(&self, question_lower: &str) -> bool {
        !self.keywords.is_empty()
            && self
                .keywords
                .iter()
                .all(|k| question_lower.contains(&k.to_lowercase()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LlmProviderType {
    Ollama,
    Openai,
    OpenaiCompatible,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "type")]
    pub provider_type: LlmProviderType,

    pub endpoint: String,

    pub model: String,

    /// API key, or "env:VAR_NAME" to read it from the environment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoValidationConfig {
    /// Only choices logged within this window are auto-validated
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: f64,

    #[serde(default = "default_stability_hours")]
    pub stability_hours: f64,

    #[serde(default = "default_stability_confidence")]
    pub stability_confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_api_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_true() -> bool {
    true
}

fn default_confidence_threshold() -> f64 {
    0.6
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./.answerloop")
}

fn default_escalation_timeout() -> u64 {
    300
}

fn default_max_age_hours() -> f64 {
    24.0
}

fn default_stability_hours() -> f64 {
    1.0
}

fn default_stability_confidence() -> f64 {
    0.8
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    8088
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

/// Built-in keyword rules for common technology comparisons.
pub fn default_decision_rules() -> Vec<DecisionRule> {
    vec![
        DecisionRule {
            name: "database".to_string(),
            keywords: vec!["mongodb".to_string(), "postgres".to_string()],
            chosen_option: "PostgreSQL".to_string(),
            reasoning: "Based on analysis: (1) Team has SQL experience, \
                (2) Data is structured with relationships, \
                (3) ACID guarantees needed for data integrity, \
                (4) Scale projections fit PostgreSQL's capabilities"
                .to_string(),
            confidence: 0.85,
            sources: vec![
                "Architecture".to_string(),
                "Security".to_string(),
                "Performance".to_string(),
            ],
            alternatives: vec!["MongoDB".to_string(), "MySQL".to_string()],
        },
        DecisionRule {
            name: "ui-framework".to_string(),
            keywords: vec!["react".to_string(), "vue".to_string()],
            chosen_option: "React".to_string(),
            reasoning: "React chosen because: (1) Larger ecosystem and community, \
                (2) Better job market for hiring, \
                (3) More third-party libraries available, \
                (4) Team has some React experience already"
                .to_string(),
            confidence: 0.75,
            sources: vec!["Architecture".to_string(), "Audit".to_string()],
            alternatives: vec!["Vue".to_string(), "Angular".to_string()],
        },
        cautious_rule("experimental-technology", "experimental"),
        cautious_rule("new-technology", "new technology"),
    ]
}

fn cautious_rule(name: &str, keyword: &str) -> DecisionRule {
    DecisionRule {
        name: name.to_string(),
        keywords: vec![keyword.to_string()],
        chosen_option: "Proceed with caution".to_string(),
        reasoning: "Limited information available about this technology. \
            Would benefit from human expertise and experience."
            .to_string(),
        confidence: 0.45,
        sources: vec!["Architecture".to_string()],
        alternatives: vec!["Wait and see".to_string(), "Research more".to_string()],
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::default(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            mode: EscalationMode::default(),
            timeout_seconds: default_escalation_timeout(),
        }
    }
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            strategy: DecisionStrategy::default(),
            rules: default_decision_rules(),
            llm: None,
            fallback_on_unavailable: true,
        }
    }
}

impl Default for AutoValidationConfig {
    fn default() -> Self {
        Self {
            max_age_hours: default_max_age_hours(),
            stability_hours: default_stability_hours(),
            stability_confidence: default_stability_confidence(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_api_port(),
        }
    }
}

impl Default for LoopConfigSpec {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            storage: StorageConfig::default(),
            escalation: EscalationConfig::default(),
            decision: DecisionConfig::default(),
            auto_validation: AutoValidationConfig::default(),
            network: None,
            observability: None,
        }
    }
}

impl Default for LoopConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "answerloop".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                version: Some("1.0.0".to_string()),
            },
            spec: LoopConfigSpec::default(),
        }
    }
}

impl LoopConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. ANSWERLOOP_CONFIG_PATH environment variable
    /// 2. ./answerloop-config.yaml (working directory)
    /// 3. ~/.answerloop/config.yaml (user home)
    /// 4. /etc/answerloop/config.yaml (system, Unix) or C:\ProgramData\Answerloop\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("ANSWERLOOP_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./answerloop-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".answerloop").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/answerloop/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Answerloop\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path (fail if missing/invalid)
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::debug!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("ANSWERLOOP_CONFIDENCE_THRESHOLD") {
            match val.trim().parse::<f64>() {
                Ok(threshold) => {
                    tracing::info!("Environment override: ANSWERLOOP_CONFIDENCE_THRESHOLD={}", threshold);
                    self.spec.confidence_threshold = threshold;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for ANSWERLOOP_CONFIDENCE_THRESHOLD: '{}'. Expected a number. Ignoring.",
                    val
                ),
            }
        }

        if let Some(val) = lookup("ANSWERLOOP_DATA_DIR") {
            if !val.trim().is_empty() {
                tracing::info!("Environment override: ANSWERLOOP_DATA_DIR={}", val);
                self.spec.storage.data_dir = PathBuf::from(val);
            }
        }

        if let Some(val) = lookup("ANSWERLOOP_ESCALATION_MODE") {
            match val.parse::<EscalationMode>() {
                Ok(mode) => {
                    tracing::info!("Environment override: ANSWERLOOP_ESCALATION_MODE={:?}", mode);
                    self.spec.escalation.mode = mode;
                }
                Err(e) => tracing::warn!("Invalid ANSWERLOOP_ESCALATION_MODE: {}. Ignoring.", e),
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let threshold = self.spec.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            anyhow::bail!("spec.confidence_threshold must be within [0, 1], got {}", threshold);
        }

        if self.spec.escalation.timeout_seconds == 0 {
            anyhow::bail!("spec.escalation.timeout_seconds must be greater than zero");
        }

        for rule in &self.spec.decision.rules {
            if rule.keywords.is_empty() {
                anyhow::bail!("Decision rule '{}' must have at least one keyword", rule.name);
            }
            if !(0.0..=1.0).contains(&rule.confidence) {
                anyhow::bail!("Decision rule '{}' confidence must be within [0, 1]", rule.name);
            }
        }

        if self.spec.decision.strategy == DecisionStrategy::Llm {
            let llm = self
                .spec
                .decision
                .llm
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("spec.decision.llm is required when strategy is 'llm'"))?;
            if llm.endpoint.is_empty() {
                anyhow::bail!("spec.decision.llm.endpoint cannot be empty");
            }
            if llm.model.is_empty() {
                anyhow::bail!("spec.decision.llm.model cannot be empty");
            }
        }

        let auto = &self.spec.auto_validation;
        if auto.max_age_hours <= 0.0 {
            anyhow::bail!("spec.auto_validation.max_age_hours must be positive");
        }

        Ok(())
    }

    pub fn network(&self) -> NetworkConfig {
        self.spec.network.clone().unwrap_or_default()
    }

    /// Logging settings, defaulted when absent
    pub fn logging(&self) -> LoggingConfig {
        self.spec
            .observability
            .as_ref()
            .and_then(|o| o.logging.clone())
            .unwrap_or_else(|| LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_manifest() {
        let manifest = LoopConfigManifest::default();
        assert_eq!(manifest.api_version, "answerloop/v1");
        assert_eq!(manifest.kind, "LoopConfig");
        assert!(!manifest.metadata.name.is_empty());
        assert_eq!(manifest.spec.confidence_threshold, 0.6);
        assert_eq!(manifest.spec.storage.backend, StorageBackendKind::File);
        assert_eq!(manifest.spec.escalation.timeout_seconds, 300);
        assert_eq!(manifest.spec.decision.rules.len(), 4);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_minimal_yaml_fills_defaults() {
        let yaml = r#"
apiVersion: answerloop/v1
kind: LoopConfig
metadata:
  name: dev
spec:
  confidence_threshold: 0.7
  escalation:
    mode: queue
"#;
        let manifest = LoopConfigManifest::from_yaml_str(yaml).unwrap();
        assert_eq!(manifest.spec.confidence_threshold, 0.7);
        assert_eq!(manifest.spec.escalation.mode, EscalationMode::Queue);
        assert_eq!(manifest.spec.escalation.timeout_seconds, 300);
        assert_eq!(manifest.spec.decision.strategy, DecisionStrategy::Heuristic);
        assert_eq!(manifest.spec.auto_validation.stability_confidence, 0.8);
        assert_eq!(manifest.network().port, 8088);
        assert_eq!(manifest.logging().format, "text");
    }

    #[test]
    fn test_llm_section_parses() {
        let yaml = r#"
apiVersion: answerloop/v1
kind: LoopConfig
metadata:
  name: llm
spec:
  decision:
    strategy: llm
    llm:
      type: openai-compatible
      endpoint: http://localhost:1234/v1
      model: qwen2.5
      api_key: env:LOCAL_KEY
"#;
        let manifest = LoopConfigManifest::from_yaml_str(yaml).unwrap();
        let llm = manifest.spec.decision.llm.clone().unwrap();
        assert_eq!(llm.provider_type, LlmProviderType::OpenaiCompatible);
        assert_eq!(llm.api_key.as_deref(), Some("env:LOCAL_KEY"));
        assert!(manifest.spec.decision.fallback_on_unavailable);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut manifest = LoopConfigManifest::default();

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.kind = "NodeConfig".to_string();
        assert!(manifest.validate().is_err());
        manifest.kind = KIND.to_string();

        manifest.metadata.name = "".to_string();
        assert!(manifest.validate().is_err());
        manifest.metadata.name = "test".to_string();

        manifest.spec.confidence_threshold = 1.5;
        assert!(manifest.validate().is_err());
        manifest.spec.confidence_threshold = 0.6;

        manifest.spec.escalation.timeout_seconds = 0;
        assert!(manifest.validate().is_err());
        manifest.spec.escalation.timeout_seconds = 30;

        manifest.spec.decision.strategy = DecisionStrategy::Llm;
        assert!(manifest.validate().is_err());
        manifest.spec.decision.llm = Some(LlmConfig {
            provider_type: LlmProviderType::Ollama,
            endpoint: "http://localhost:11434".to_string(),
            model: "".to_string(),
            api_key: None,
        });
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("ANSWERLOOP_CONFIDENCE_THRESHOLD", "0.75"),
            ("ANSWERLOOP_DATA_DIR", "/var/lib/answerloop"),
            ("ANSWERLOOP_ESCALATION_MODE", "defer"),
        ]);
        let mut manifest = LoopConfigManifest::default();
        manifest.apply_overrides_from(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(manifest.spec.confidence_threshold, 0.75);
        assert_eq!(manifest.spec.storage.data_dir, PathBuf::from("/var/lib/answerloop"));
        assert_eq!(manifest.spec.escalation.mode, EscalationMode::Defer);
    }

    #[test]
    fn test_invalid_env_overrides_are_ignored() {
        let mut manifest = LoopConfigManifest::default();
        manifest.apply_overrides_from(|k| match k {
            "ANSWERLOOP_CONFIDENCE_THRESHOLD" => Some("high".to_string()),
            "ANSWERLOOP_ESCALATION_MODE" => Some("pager".to_string()),
            _ => None,
        });
        assert_eq!(manifest.spec.confidence_threshold, 0.6);
        assert_eq!(manifest.spec.escalation.mode, EscalationMode::Console);
    }

    #[test]
    fn test_rule_requires_every_keyword() {
        let rules = default_decision_rules();
        let database = &rules[0];
        assert!(database.matches("should we use mongodb or postgresql?"));
        assert!(!database.matches("should we use mongodb?"));
    }
}
