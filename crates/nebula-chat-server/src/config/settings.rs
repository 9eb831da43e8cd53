use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::services::conversation::MAX_HISTORY_LIMIT;

/// Env var name the Nebula secret was historically provided under
pub const LEGACY_NEBULA_KEY_VAR: &str = "THIRDWEB_SECRET_KEY";
pub const LEGACY_AGENT_KEY_VAR: &str = "OPENAI_API_KEY";

pub const DEFAULT_NEBULA_URL: &str = "https://nebula-api.thirdweb.com/chat";
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are Carl Jung. Answer questions about the human psyche from his POV.";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub nebula: NebulaConfig,
    pub conversation: ConversationConfig,
    pub agent: AgentConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NebulaConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    /// No timeout when unset
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConversationConfig {
    pub max_history_messages: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AgentConfig {
    pub enabled: bool,
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    pub system_prompt: String,
    pub max_iterations: usize,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl Settings {
    /// Layering: defaults, then `config/settings.toml` (optional), then `APP_*` env vars.
    ///
    /// Fails when no Nebula API key can be found, so the server never starts
    /// without one.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let builder = Self::defaults()?
            .add_source(File::with_name("config/settings").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut settings = Self::deserialize_from(builder)?;
        settings.apply_key_fallbacks(
            std::env::var(LEGACY_NEBULA_KEY_VAR).ok(),
            std::env::var(LEGACY_AGENT_KEY_VAR).ok(),
        );
        settings.validate()?;
        Ok(settings)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("nebula.base_url", DEFAULT_NEBULA_URL)?
            .set_default("conversation.max_history_messages", 20)?
            .set_default("agent.enabled", false)?
            .set_default("agent.base_url", "https://api.openai.com/v1")?
            .set_default("agent.model", "gpt-4o-mini")?
            .set_default("agent.system_prompt", DEFAULT_SYSTEM_PROMPT)?
            .set_default("agent.max_iterations", 5)
    }

    fn deserialize_from(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }

    /// Fill blank API keys from the legacy env var values
    /// (`THIRDWEB_SECRET_KEY`, `OPENAI_API_KEY`). Layered values win.
    fn apply_key_fallbacks(&mut self, nebula_key: Option<String>, agent_key: Option<String>) {
        if self.nebula.api_key.trim().is_empty() {
            if let Some(key) = nebula_key {
                self.nebula.api_key = key;
            }
        }

        let agent_key_missing = self
            .agent
            .api_key
            .as_deref()
            .map_or(true, |k| k.trim().is_empty());
        if agent_key_missing {
            self.agent.api_key = agent_key;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nebula.api_key.trim().is_empty() {
            return Err(ConfigError::Message(format!(
                "Nebula API key is required (set APP_NEBULA__API_KEY or {})",
                LEGACY_NEBULA_KEY_VAR
            )));
        }

        let history = self.conversation.max_history_messages;
        if history == 0 || history > MAX_HISTORY_LIMIT {
            return Err(ConfigError::Message(format!(
                "conversation.max_history_messages must be between 1 and {} (got {})",
                MAX_HISTORY_LIMIT, history
            )));
        }

        if self.agent.enabled {
            let has_key = self
                .agent
                .api_key
                .as_deref()
                .is_some_and(|k| !k.trim().is_empty());
            if !has_key {
                return Err(ConfigError::Message(format!(
                    "agent.enabled is set but no agent API key was provided (set APP_AGENT__API_KEY or {})",
                    LEGACY_AGENT_KEY_VAR
                )));
            }
            if self.agent.max_iterations == 0 {
                return Err(ConfigError::Message(
                    "agent.max_iterations must be at least 1".to_string(),
                ));
            }
        }

        Ok(())
    }
}
