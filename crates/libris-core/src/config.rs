use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{LibrisError, Result};

/// Top-level configuration for the Libris assistant.
///
/// Loaded from `~/.libris/config.toml` by default. Each section corresponds
/// to one collaborator or cross-cutting concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibrisConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

impl LibrisConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LibrisConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| LibrisError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Validate the collaborator bindings needed to run against live
    /// services. Fails fast at startup instead of at the first turn.
    pub fn validate(&self) -> Result<()> {
        if self.classifier.endpoint.trim().is_empty() {
            return Err(LibrisError::Config(
                "classifier.endpoint must not be empty".to_string(),
            ));
        }
        if self.knowledge.endpoint.trim().is_empty() {
            return Err(LibrisError::Config(
                "knowledge.endpoint must not be empty".to_string(),
            ));
        }
        if self.knowledge.kb_id.trim().is_empty() {
            return Err(LibrisError::Config(
                "knowledge.kb_id must not be empty".to_string(),
            ));
        }
        if self.search.site_url.trim().is_empty() {
            return Err(LibrisError::Config(
                "search.site_url must not be empty".to_string(),
            ));
        }
        if self.search.row_limit == 0 {
            return Err(LibrisError::Config(
                "search.row_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Turn-handling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Whether the assistant answers at all.
    pub enabled: bool,
    /// Pause before the feedback prompt, letting the prior card render
    /// client-side. Zero disables the pause.
    pub feedback_delay_ms: u64,
    /// Address offered when no answer source can help.
    pub contact_address: String,
    /// Maximum accepted utterance length in bytes.
    pub max_message_length: usize,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            feedback_delay_ms: 2000,
            contact_address: "librarian@example.com".to_string(),
            max_message_length: 2000,
        }
    }
}

/// Intent classifier collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Base URL of the classifier service.
    pub endpoint: String,
    /// Application identifier within the classifier service.
    pub app_id: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            app_id: String::new(),
            api_key_env: "LIBRIS_CLASSIFIER_KEY".to_string(),
        }
    }
}

/// Question-answering knowledge base collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Base URL of the knowledge-base service.
    pub endpoint: String,
    /// Knowledge-base identifier.
    pub kb_id: String,
    /// Name of the environment variable holding the endpoint key.
    pub api_key_env: String,
    /// Number of candidates requested per query.
    pub top_k: usize,
    /// Minimum confidence applied by the collaborator, echoed in requests.
    pub min_score: f64,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            kb_id: String::new(),
            api_key_env: "LIBRIS_KNOWLEDGE_KEY".to_string(),
            top_k: 3,
            min_score: 0.7,
        }
    }
}

/// Full-text site search collaborator settings.
///
/// The `*_env` fields name environment variables; the credential values
/// themselves never live in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Site path every fallback query is scoped to.
    pub site_url: String,
    /// Maximum result rows per query.
    pub row_limit: usize,
    /// Name of the environment variable holding the service username.
    pub username_env: String,
    /// Name of the environment variable holding the service password.
    pub password_env: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            site_url: String::new(),
            row_limit: 3,
            username_env: "LIBRIS_SEARCH_USER".to_string(),
            password_env: "LIBRIS_SEARCH_PASSWORD".to_string(),
        }
    }
}
