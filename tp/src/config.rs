//! TripPlanner configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main TripPlanner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Workflow limits and timeouts
    pub workflow: WorkflowConfig,

    /// Search source configuration
    pub sources: SourcesConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Prompt template configuration
    pub prompts: PromptsConfig,

    /// Log level (overridden by --log-level)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Only commands that call the model need this. Call it early to fail
    /// fast with a clear error message.
    pub fn validate(&self) -> Result<()> {
        let env = self.llm.api_key_env();
        if std::env::var(&env).is_err() {
            return Err(eyre::eyre!("LLM API key not found. Set the {} environment variable.", env));
        }
        if self.sources.fixtures.is_none() && self.sources.base_url.is_none() {
            return Err(eyre::eyre!(
                "No search source configured. Set sources.base-url or sources.fixtures."
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .tripplanner.yml
        let local_config = PathBuf::from(".tripplanner.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/tripplanner/tripplanner.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tripplanner").join("tripplanner.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
///
/// `model`, `api-key-env` and `base-url` fall back to per-provider defaults
/// when left out, so switching `provider` alone is enough.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("mistral" or "openai")
    pub provider: String,

    /// Model identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env", skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// API base URL
    #[serde(rename = "base-url", skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Temperature for selection and scheduling decisions
    #[serde(rename = "coordinator-temperature")]
    pub coordinator_temperature: f32,

    /// Temperature for phrases and stories
    #[serde(rename = "creative-temperature")]
    pub creative_temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "mistral".to_string(),
            model: None,
            api_key_env: None,
            base_url: None,
            max_tokens: 4096,
            timeout_ms: 120_000,
            coordinator_temperature: 0.3,
            creative_temperature: 0.7,
        }
    }
}

impl LlmConfig {
    pub fn model(&self) -> String {
        self.model.clone().unwrap_or_else(|| match self.provider.as_str() {
            "openai" => "gpt-4o-mini".to_string(),
            _ => "mistral-large-latest".to_string(),
        })
    }

    pub fn api_key_env(&self) -> String {
        self.api_key_env.clone().unwrap_or_else(|| match self.provider.as_str() {
            "openai" => "OPENAI_API_KEY".to_string(),
            _ => "MISTRAL_API_KEY".to_string(),
        })
    }

    pub fn base_url(&self) -> String {
        self.base_url.clone().unwrap_or_else(|| match self.provider.as_str() {
            "openai" => "https://api.openai.com".to_string(),
            _ => "https://api.mistral.ai".to_string(),
        })
    }

    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        let env = self.api_key_env();
        std::env::var(&env).context(format!("Environment variable {} not set", env))
    }
}

/// Workflow limits and timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Maximum budget adjustment cycles
    #[serde(rename = "max-iterations")]
    pub max_iterations: u32,

    /// Timeout for one source search in milliseconds
    #[serde(rename = "fetch-timeout-ms")]
    pub fetch_timeout_ms: u64,

    /// Timeout for one model decision in milliseconds
    #[serde(rename = "model-timeout-ms")]
    pub model_timeout_ms: u64,

    /// Timeout for one story (cache lookup plus generation) in milliseconds
    #[serde(rename = "story-timeout-ms")]
    pub story_timeout_ms: u64,

    /// Candidates kept per category after fetching
    #[serde(rename = "candidate-limit")]
    pub candidate_limit: usize,

    /// Let the model curate fetched candidates
    pub curation: bool,

    /// Lower bound of the ceiling shrink factor
    #[serde(rename = "min-shrink")]
    pub min_shrink: f64,

    /// Upper bound of the ceiling shrink factor
    #[serde(rename = "max-shrink")]
    pub max_shrink: f64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_iterations: crate::domain::DEFAULT_MAX_ITERATIONS,
            fetch_timeout_ms: 20_000,
            model_timeout_ms: 90_000,
            story_timeout_ms: 30_000,
            candidate_limit: 10,
            curation: true,
            min_shrink: 0.5,
            max_shrink: 0.9,
        }
    }
}

impl WorkflowConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_millis(self.model_timeout_ms)
    }

    pub fn story_timeout(&self) -> Duration {
        Duration::from_millis(self.story_timeout_ms)
    }
}

/// Search source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Base URL of the search service
    #[serde(rename = "base-url", skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Environment variable containing the search service key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// Directory of JSON fixture files, used instead of the service when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixtures: Option<PathBuf>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key_env: "TRIP_SOURCES_API_KEY".to_string(),
            fixtures: None,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database for the narrative cache and saved results
    #[serde(rename = "db-path")]
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/tripplanner on Linux)
        let db_path = dirs::data_dir()
            .map(|d| d.join("tripplanner"))
            .unwrap_or_else(|| PathBuf::from(".tripplanner"))
            .join("tripplanner.db");

        Self { db_path }
    }
}

/// Prompt template configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Directory of `.hbs` files overriding the embedded templates
    #[serde(rename = "override-dir", skip_serializing_if = "Option::is_none")]
    pub override_dir: Option<PathBuf>,
}

impl PromptsConfig {
    /// Override directory with `~/` expanded
    pub fn expanded_dir(&self) -> Option<PathBuf> {
        let dir = self.override_dir.as_ref()?;
        match dir.strip_prefix("~") {
            Ok(rest) => dirs::home_dir().map(|home| home.join(rest)),
            Err(_) => Some(dir.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.llm.provider, "mistral");
        assert_eq!(config.workflow.max_iterations, 2);
        assert_eq!(config.workflow.candidate_limit, 10);
        assert!(config.workflow.curation);
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_llm_provider_defaults() {
        let mut config = LlmConfig::default();
        assert_eq!(config.model(), "mistral-large-latest");
        assert_eq!(config.api_key_env(), "MISTRAL_API_KEY");
        assert_eq!(config.base_url(), "https://api.mistral.ai");

        config.provider = "openai".to_string();
        assert_eq!(config.model(), "gpt-4o-mini");
        assert_eq!(config.api_key_env(), "OPENAI_API_KEY");
        assert_eq!(config.base_url(), "https://api.openai.com");
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
llm:
  provider: openai
  model: gpt-4o
  api-key-env: MY_API_KEY
  max-tokens: 2048
  coordinator-temperature: 0.1

workflow:
  max-iterations: 3
  fetch-timeout-ms: 5000
  curation: false

sources:
  fixtures: ./fixtures

log-level: debug
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.model(), "gpt-4o");
        assert_eq!(config.llm.api_key_env(), "MY_API_KEY");
        assert_eq!(config.llm.base_url(), "https://api.openai.com");
        assert_eq!(config.llm.max_tokens, 2048);
        assert_eq!(config.workflow.max_iterations, 3);
        assert_eq!(config.workflow.fetch_timeout(), Duration::from_secs(5));
        assert!(!config.workflow.curation);
        assert_eq!(config.workflow.candidate_limit, 10);
        assert_eq!(config.sources.fixtures, Some(PathBuf::from("./fixtures")));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tp.yml");
        fs::write(&path, "workflow:\n  candidate-limit: 4\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.workflow.candidate_limit, 4);

        let missing = dir.path().join("missing.yml");
        assert!(Config::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_validate_requires_source() {
        let mut config = Config::default();
        config.llm.api_key_env = Some("PATH".to_string());
        assert!(config.validate().is_err());
        config.sources.fixtures = Some(PathBuf::from("fixtures"));
        assert!(config.validate().is_ok());
    }
}
