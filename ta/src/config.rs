//! TaskAgent configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::asana::ProjectId;

/// Main TaskAgent configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Asana configuration
    pub asana: AsanaConfig,

    /// Chat agent behaviour
    pub agent: AgentConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that every credential the agent needs is present so startup
    /// fails with a message naming the missing variable.
    pub fn validate(&self) -> Result<()> {
        let llm = self.llm.resolve();
        if llm.get_api_key().is_err() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                llm.api_key_env
            ));
        }
        self.validate_tracker()
    }

    /// Validate only what direct ticket creation needs
    pub fn validate_tracker(&self) -> Result<()> {
        if self.asana.get_token().is_err() {
            return Err(eyre::eyre!(
                "Asana access token not found. Set the {} environment variable.",
                self.asana.token_env
            ));
        }
        if self.asana.project_id.is_none() {
            return Err(eyre::eyre!(
                "Asana project id not set. Set ASANA_PROJECT_ID, pass --project, or add asana.project-id to the config."
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

        // Try project-local config: .taskagent.yml
        let local_config = PathBuf::from(".taskagent.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/taskagent/taskagent.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("taskagent").join("taskagent.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialized
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let path = match config_path {
            Some(p) => p.clone(),
            None => {
                let local = PathBuf::from(".taskagent.yml");
                if local.exists() {
                    local
                } else {
                    dirs::config_dir()?.join("taskagent").join("taskagent.yml")
                }
            }
        };
        let content = fs::read_to_string(path).ok()?;
        let config: Self = serde_yaml::from_str(&content).ok()?;
        config.log_level
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Apply environment overrides
    ///
    /// `LLM_MODEL` wins over `OPENAI_MODEL`; `ASANA_PROJECT_ID` replaces the
    /// configured project.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (the environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(model) = non_empty("LLM_MODEL").or_else(|| non_empty("OPENAI_MODEL")) {
            debug!(%model, "apply_overrides: model from environment");
            self.llm.model = model;
        }

        if let Some(project) = non_empty("ASANA_PROJECT_ID") {
            debug!(%project, "apply_overrides: project from environment");
            self.asana.project_id = Some(project.parse().context("ASANA_PROJECT_ID is not a valid project id")?);
        }

        Ok(())
    }

    /// Render for `ta config`; only env var names appear, never secrets
    pub fn to_yaml(&self) -> Result<String> {
        let mut shown = self.clone();
        let resolved = self.llm.resolve();
        shown.llm.provider = resolved.provider;
        shown.llm.api_key_env = resolved.api_key_env;
        shown.llm.base_url = resolved.base_url;
        serde_yaml::to_string(&shown).context("Failed to render config")
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name: "auto", "openai" or "anthropic"
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key (empty = provider default)
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL (empty = provider default)
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "auto".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: String::new(),
            base_url: String::new(),
            max_tokens: 4096,
            timeout_ms: 120_000,
        }
    }
}

impl LlmConfig {
    /// Fill in provider-dependent defaults
    ///
    /// With provider "auto", GPT and o-series model names go to OpenAI and
    /// everything else goes to Anthropic.
    pub fn resolve(&self) -> ResolvedLlmConfig {
        let provider = match self.provider.to_lowercase().as_str() {
            "" | "auto" => infer_provider(&self.model).to_string(),
            other => other.to_string(),
        };
        debug!(%provider, model = %self.model, "LlmConfig::resolve: called");

        let (default_key_env, default_base_url) = match provider.as_str() {
            "anthropic" => ("ANTHROPIC_API_KEY", "https://api.anthropic.com"),
            _ => ("OPENAI_API_KEY", "https://api.openai.com"),
        };

        ResolvedLlmConfig {
            api_key_env: non_empty_or(&self.api_key_env, default_key_env),
            base_url: non_empty_or(&self.base_url, default_base_url)
                .trim_end_matches('/')
                .to_string(),
            provider,
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            timeout_ms: self.timeout_ms,
        }
    }
}

fn non_empty_or(value: &str, default: &str) -> String {
    if value.trim().is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

/// Pick a provider from a model name
pub fn infer_provider(model: &str) -> &'static str {
    let model = model.to_lowercase();
    if model.contains("gpt") || model.starts_with("o1") || model.starts_with("o3") || model.starts_with("o4") {
        "openai"
    } else {
        "anthropic"
    }
}

/// LLM configuration with provider defaults filled in
#[derive(Debug, Clone)]
pub struct ResolvedLlmConfig {
    pub provider: String,
    pub model: String,
    pub api_key_env: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

impl ResolvedLlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        read_secret(&self.api_key_env)
    }
}

/// Asana configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AsanaConfig {
    /// REST API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Environment variable containing the personal access token
    #[serde(rename = "token-env")]
    pub token_env: String,

    /// Project that receives new tasks
    #[serde(rename = "project-id", skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for AsanaConfig {
    fn default() -> Self {
        Self {
            base_url: "https://app.asana.com/api/1.0".to_string(),
            token_env: "ASANA_ACCESS_TOKEN".to_string(),
            project_id: None,
            timeout_ms: 30_000,
        }
    }
}

impl AsanaConfig {
    /// Read the access token from the configured environment variable
    pub fn get_token(&self) -> Result<String> {
        read_secret(&self.token_env)
    }
}

fn read_secret(env: &str) -> Result<String> {
    match std::env::var(env) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(eyre::eyre!("{} is not set", env)),
    }
}

/// Chat agent behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Company name used in the project-manager persona
    pub company: String,

    /// Maximum tool rounds per user turn
    #[serde(rename = "max-tool-rounds")]
    pub max_tool_rounds: u32,

    /// Stream model output to the terminal
    pub stream: bool,

    /// Directory with `.pmt` prompt overrides
    #[serde(rename = "prompts-dir", skip_serializing_if = "Option::is_none")]
    pub prompts_dir: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            company: "Fewa".to_string(),
            max_tool_rounds: 5,
            stream: true,
            prompts_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.llm.provider, "auto");
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.asana.token_env, "ASANA_ACCESS_TOKEN");
        assert!(config.asana.project_id.is_none());
        assert_eq!(config.agent.max_tool_rounds, 5);
        assert_eq!(config.agent.company, "Fewa");
    }

    #[test]
    fn test_resolve_auto_openai() {
        let resolved = LlmConfig::default().resolve();

        assert_eq!(resolved.provider, "openai");
        assert_eq!(resolved.api_key_env, "OPENAI_API_KEY");
        assert_eq!(resolved.base_url, "https://api.openai.com");
    }

    #[test]
    fn test_resolve_auto_anthropic() {
        let config = LlmConfig {
            model: "claude-3-5-sonnet-latest".to_string(),
            ..LlmConfig::default()
        };
        let resolved = config.resolve();

        assert_eq!(resolved.provider, "anthropic");
        assert_eq!(resolved.api_key_env, "ANTHROPIC_API_KEY");
        assert_eq!(resolved.base_url, "https://api.anthropic.com");
    }

    #[test]
    fn test_resolve_explicit_values_win() {
        let config = LlmConfig {
            provider: "openai".to_string(),
            model: "llama-3".to_string(),
            api_key_env: "LOCAL_KEY".to_string(),
            base_url: "http://localhost:8080/".to_string(),
            ..LlmConfig::default()
        };
        let resolved = config.resolve();

        assert_eq!(resolved.provider, "openai");
        assert_eq!(resolved.api_key_env, "LOCAL_KEY");
        assert_eq!(resolved.base_url, "http://localhost:8080");
    }

    #[test]
    fn test_infer_provider() {
        assert_eq!(infer_provider("gpt-4o-mini"), "openai");
        assert_eq!(infer_provider("GPT-4o"), "openai");
        assert_eq!(infer_provider("o3-mini"), "openai");
        assert_eq!(infer_provider("claude-3-haiku-20240307"), "anthropic");
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
log-level: DEBUG
llm:
  provider: anthropic
  model: claude-3-5-sonnet-latest
  max-tokens: 2048
  timeout-ms: 60000

asana:
  token-env: MY_ASANA_TOKEN
  project-id: "https://app.asana.com/0/1207654321/list"

agent:
  company: Acme
  max-tool-rounds: 3
  stream: false
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.log_level.as_deref(), Some("DEBUG"));
        assert_eq!(config.llm.model, "claude-3-5-sonnet-latest");
        assert_eq!(config.llm.max_tokens, 2048);
        assert_eq!(config.asana.token_env, "MY_ASANA_TOKEN");
        assert_eq!(config.asana.project_id.unwrap().as_str(), "1207654321");
        assert_eq!(config.agent.company, "Acme");
        assert_eq!(config.agent.max_tool_rounds, 3);
        assert!(!config.agent.stream);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
llm:
  model: gpt-4o
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.provider, "auto");
        assert_eq!(config.asana.base_url, "https://app.asana.com/api/1.0");
        assert_eq!(config.agent.max_tool_rounds, 5);
    }

    #[test]
    fn test_overrides_llm_model_beats_openai_model() {
        let mut config = Config::default();
        config
            .apply_overrides(lookup(&[("OPENAI_MODEL", "gpt-4o"), ("LLM_MODEL", "claude-3-opus")]))
            .unwrap();
        assert_eq!(config.llm.model, "claude-3-opus");

        let mut config = Config::default();
        config.apply_overrides(lookup(&[("OPENAI_MODEL", "gpt-4o")])).unwrap();
        assert_eq!(config.llm.model, "gpt-4o");
    }

    #[test]
    fn test_overrides_empty_values_ignored() {
        let mut config = Config::default();
        config
            .apply_overrides(lookup(&[("LLM_MODEL", "  "), ("ASANA_PROJECT_ID", "")]))
            .unwrap();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert!(config.asana.project_id.is_none());
    }

    #[test]
    fn test_overrides_project_id() {
        let mut config = Config::default();
        config
            .apply_overrides(lookup(&[("ASANA_PROJECT_ID", "https://app.asana.com/0/555/list")]))
            .unwrap();
        assert_eq!(config.asana.project_id.unwrap().as_str(), "555");

        let mut config = Config::default();
        assert!(config.apply_overrides(lookup(&[("ASANA_PROJECT_ID", "abc")])).is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "agent:\n  company: Initech").unwrap();

        let config = Config::load(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(config.agent.company, "Initech");
    }

    #[test]
    fn test_load_explicit_path_missing_is_error() {
        let missing = PathBuf::from("/definitely/not/here/taskagent.yml");
        assert!(Config::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_load_log_level_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log-level: trace").unwrap();

        let level = Config::load_log_level(Some(&file.path().to_path_buf()));
        assert_eq!(level.as_deref(), Some("trace"));
    }

    #[test]
    fn test_to_yaml_shows_env_names_only() {
        let yaml = Config::default().to_yaml().unwrap();
        assert!(yaml.contains("api-key-env: OPENAI_API_KEY"));
        assert!(yaml.contains("token-env: ASANA_ACCESS_TOKEN"));
        assert!(yaml.contains("provider: openai"));
    }

    #[test]
    #[serial_test::serial]
    fn test_validate_names_missing_variable() {
        let config = Config {
            llm: LlmConfig {
                api_key_env: "TA_TEST_MISSING_LLM_KEY".to_string(),
                ..LlmConfig::default()
            },
            ..Config::default()
        };
        // SAFETY: serialized test, no other thread reads this variable
        unsafe { std::env::remove_var("TA_TEST_MISSING_LLM_KEY") };

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("TA_TEST_MISSING_LLM_KEY"));
    }

    #[test]
    #[serial_test::serial]
    fn test_validate_requires_project() {
        let config = Config {
            llm: LlmConfig {
                api_key_env: "TA_TEST_LLM_KEY".to_string(),
                ..LlmConfig::default()
            },
            asana: AsanaConfig {
                token_env: "TA_TEST_ASANA_TOKEN".to_string(),
                ..AsanaConfig::default()
            },
            ..Config::default()
        };
        // SAFETY: serialized test, no other thread reads these variables
        unsafe {
            std::env::set_var("TA_TEST_LLM_KEY", "sk-test");
            std::env::set_var("TA_TEST_ASANA_TOKEN", "asana-test");
        }

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("project id"));

        let mut config = config;
        config.asana.project_id = Some("123".parse().unwrap());
        assert!(config.validate().is_ok());

        unsafe {
            std::env::remove_var("TA_TEST_LLM_KEY");
            std::env::remove_var("TA_TEST_ASANA_TOKEN");
        }
    }
}
