//! Postbot configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::domain::{AnalysisField, ConversationState, ModelSelection, UnknownStateError};
use crate::llm::Sampling;

/// Configuration problems that surface while serving a request
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown provider family: {0}")]
    UnknownFamily(String),

    #[error("Model {model} does not belong to provider family {family}")]
    UnknownModel { family: String, model: String },

    #[error("No interview step configured for state {0}")]
    MissingStep(ConversationState),

    #[error(transparent)]
    UnknownState(#[from] UnknownStateError),

    #[error("API key not found. Set the {0} environment variable.")]
    MissingApiKey(String),
}

impl ConfigError {
    /// Short Russian description for the chat
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::UnknownFamily(family) => format!("Неизвестный тип модели: {}", family),
            ConfigError::UnknownModel { model, .. } => format!("Неизвестная модель: {}", model),
            ConfigError::MissingStep(state) => format!("шаг анализа {} не настроен", state),
            ConfigError::UnknownState(e) => format!("повреждённое состояние сессии ({})", e.0),
            ConfigError::MissingApiKey(_) => "ключ API не настроен".to_string(),
        }
    }
}

/// Main postbot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Admin user id, wins over `admin-id-env`
    #[serde(rename = "admin-id")]
    pub admin_id: Option<i64>,

    /// Environment variable holding the admin user id
    #[serde(rename = "admin-id-env")]
    pub admin_id_env: String,

    pub llm: LlmConfig,

    /// Provider families in menu order
    pub providers: Vec<ProviderConfig>,

    pub interview: InterviewConfig,

    pub analysis: AnalysisConfig,

    pub storage: StorageConfig,

    pub telegram: TelegramConfig,

    /// Directory with `.pmt` files overriding the embedded prompts
    #[serde(rename = "prompts-dir")]
    pub prompts_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: None,
            admin_id: None,
            admin_id_env: "ADMIN_ID".to_string(),
            llm: LlmConfig::default(),
            providers: default_providers(),
            interview: InterviewConfig::default(),
            analysis: AnalysisConfig::default(),
            storage: StorageConfig::default(),
            telegram: TelegramConfig::default(),
            prompts_dir: None,
        }
    }
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks the catalogue and interview table are coherent and the API key
    /// variable is set.
    pub fn validate(&self) -> Result<()> {
        debug!("Config::validate: called");
        if self.providers.is_empty() {
            return Err(eyre::eyre!("No provider families configured"));
        }
        for provider in &self.providers {
            if provider.models.is_empty() {
                return Err(eyre::eyre!("Provider family {} has no models", provider.name));
            }
        }
        self.default_selection()?;

        for state in ConversationState::ALL.into_iter().filter(|s| s.is_interview_step()) {
            self.step(state)?;
        }

        if self.analysis.topics.is_empty() {
            return Err(eyre::eyre!("analysis.topics must not be empty"));
        }

        self.api_key()?;
        Ok(())
    }

    /// Look up a provider family by name
    pub fn provider(&self, family: &str) -> Result<&ProviderConfig, ConfigError> {
        self.providers
            .iter()
            .find(|p| p.name == family)
            .ok_or_else(|| ConfigError::UnknownFamily(family.to_string()))
    }

    /// Resolve a family/model pair into a selection, validating membership
    pub fn selection(&self, family: &str, model: &str) -> Result<ModelSelection, ConfigError> {
        debug!(%family, %model, "Config::selection: called");
        let provider = self.provider(family)?;
        if !provider.models.iter().any(|m| m == model) {
            return Err(ConfigError::UnknownModel {
                family: family.to_string(),
                model: model.to_string(),
            });
        }
        Ok(ModelSelection {
            provider_family: provider.name.clone(),
            model_name: model.to_string(),
            endpoint: provider.base_url.clone(),
        })
    }

    /// Selection given to sessions created on first contact
    pub fn default_selection(&self) -> Result<ModelSelection, ConfigError> {
        self.selection(&self.llm.default_family, &self.llm.default_model)
    }

    /// Interview step for a state
    pub fn step(&self, state: ConversationState) -> Result<&StepConfig, ConfigError> {
        self.interview
            .steps
            .iter()
            .find(|s| s.state == state)
            .ok_or(ConfigError::MissingStep(state))
    }

    /// Proxy API key from the configured environment variable
    pub fn api_key(&self) -> Result<String, ConfigError> {
        std::env::var(&self.llm.api_key_env).map_err(|_| ConfigError::MissingApiKey(self.llm.api_key_env.clone()))
    }

    /// Admin id from config, else from the environment
    pub fn admin_id(&self) -> Option<i64> {
        self.admin_id.or_else(|| {
            std::env::var(&self.admin_id_env)
                .ok()
                .and_then(|v| v.trim().parse().ok())
        })
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: postbot.yml
        let local_config = PathBuf::from("postbot.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/postbot/postbot.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("postbot").join("postbot.yml");
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

    /// Read only the log level, before logging is set up
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates = match config_path {
            Some(path) => vec![path.clone()],
            None => {
                let mut paths = vec![PathBuf::from("postbot.yml")];
                if let Some(dir) = dirs::config_dir() {
                    paths.push(dir.join("postbot").join("postbot.yml"));
                }
                paths
            }
        };
        candidates
            .into_iter()
            .find(|p| p.exists())
            .and_then(|p| Self::load_from_file(p).ok())
            .and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Shared LLM settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Environment variable containing the proxy API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    #[serde(rename = "balance-url")]
    pub balance_url: String,

    #[serde(rename = "default-family")]
    pub default_family: String,

    #[serde(rename = "default-model")]
    pub default_model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: "PROXY_API_KEY".to_string(),
            timeout_ms: 120_000,
            balance_url: "https://api.proxyapi.ru/proxyapi/balance".to_string(),
            default_family: "ChatGPT".to_string(),
            default_model: "gpt-4.1-nano-2025-04-14".to_string(),
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Wire protocol a provider family speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Openai,
    Gemini,
}

/// One provider family of the model menu
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,

    pub protocol: Protocol,

    #[serde(rename = "base-url")]
    pub base_url: String,

    #[serde(default)]
    pub models: Vec<String>,
}

fn provider(name: &str, protocol: Protocol, base_url: &str, models: &[&str]) -> ProviderConfig {
    ProviderConfig {
        name: name.to_string(),
        protocol,
        base_url: base_url.to_string(),
        models: models.iter().map(|m| m.to_string()).collect(),
    }
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![
        provider(
            "ChatGPT",
            Protocol::Openai,
            "https://api.proxyapi.ru/openai/v1",
            &[
                "gpt-4.1-2025-04-14",
                "gpt-4.1-mini-2025-04-14",
                "gpt-4.1-nano-2025-04-14",
                "gpt-4o-mini-2024-07-18",
                "gpt-4o-2024-11-20",
                "gpt-3.5-turbo-0125",
            ],
        ),
        provider(
            "DeepSeek",
            Protocol::Openai,
            "https://api.proxyapi.ru/deepseek",
            &["deepseek-chat", "deepseek-reasoner"],
        ),
        provider(
            "Gemini",
            Protocol::Gemini,
            "https://api.proxyapi.ru/google/v1beta",
            &["gemini-2.0-flash", "gemini-2.0-flash-lite", "gemini-1.5-pro"],
        ),
    ]
}

/// One row of the interview table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    pub state: ConversationState,

    /// Field the answer is stored into
    pub field: AnalysisField,

    pub next: ConversationState,

    /// Question shown to the user
    pub text: String,

    /// Suggested answers shown as buttons
    #[serde(default)]
    pub options: Vec<String>,
}

fn step(state: ConversationState, field: AnalysisField, next: ConversationState, text: &str, options: &[&str]) -> StepConfig {
    StepConfig {
        state,
        field,
        next,
        text: text.to_string(),
        options: options.iter().map(|o| o.to_string()).collect(),
    }
}

/// Interview flow configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterviewConfig {
    pub steps: Vec<StepConfig>,

    #[serde(rename = "post-text-prompt")]
    pub post_text_prompt: String,
}

impl Default for InterviewConfig {
    fn default() -> Self {
        use AnalysisField as F;
        use ConversationState as S;
        Self {
            steps: vec![
                step(
                    S::Platform,
                    F::Platform,
                    S::BlogType,
                    "Выберите или напишите платформу для публикации.",
                    &["Telegram", "Twitter (X)", "Reddit", "Threads"],
                ),
                step(
                    S::BlogType,
                    F::BlogType,
                    S::Purpose,
                    "Выберите или напишите тип своего блога.",
                    &["СМИ", "Личный блог", "Научный блог"],
                ),
                step(
                    S::Purpose,
                    F::Purpose,
                    S::Audience,
                    "Выберите или напишите цель публикации.",
                    &["Информирование", "Образование", "Развлечение", "Реклама"],
                ),
                step(
                    S::Audience,
                    F::Audience,
                    S::PostText,
                    "Выберите или напишите тип аудитории.",
                    &["Население", "Молодёжь", "Специалисты"],
                ),
            ],
            post_text_prompt: "Отлично! Теперь отправьте текст поста.".to_string(),
        }
    }
}

/// What advanced analysis does when some fan-out branches fail
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FanoutPolicy {
    /// Any failed branch fails the whole analysis
    #[default]
    Abort,
    /// Skip failed branches, fail only if all of them failed
    BestEffort,
}

/// A fan-out topic: a reaction aspect plus the phrase the reply should open with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicConfig {
    pub label: String,
    pub beginning: String,
}

fn topic(label: &str, beginning: &str) -> TopicConfig {
    TopicConfig {
        label: label.to_string(),
        beginning: beginning.to_string(),
    }
}

/// Analysis pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub topics: Vec<TopicConfig>,

    #[serde(rename = "fanout-policy")]
    pub fanout_policy: FanoutPolicy,

    /// Single-prompt analysis
    pub direct: Sampling,

    /// Opening reaction of advanced analysis
    pub seed: Sampling,

    /// Per-topic fan-out requests
    pub fanout: Sampling,

    /// Per-topic summaries
    pub summary: Sampling,

    /// First stage of the relevance gate
    pub reasoning: Sampling,

    /// Second stage of the relevance gate
    pub decision: Sampling,

    /// Dialog continuation
    pub dialog: Sampling,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            topics: vec![
                topic("Эмоциональная реакция", "Большинство читателей почувствуют"),
                topic("Вопросы аудитории", "Скорее всего, читатели спросят"),
                topic("Критика", "Основная критика будет связана с"),
                topic("Вовлечённость", "Обсуждение под постом развернётся вокруг"),
            ],
            fanout_policy: FanoutPolicy::default(),
            direct: Sampling::default(),
            seed: Sampling::default().with_max_tokens(150).without_penalties(),
            fanout: Sampling::default().with_max_tokens(150),
            summary: Sampling::default().with_max_tokens(150),
            reasoning: Sampling::default().with_max_tokens(300),
            decision: Sampling::default().with_max_tokens(10).with_temperature(0.0),
            dialog: Sampling::default().with_max_tokens(700),
        }
    }
}

/// Session persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Document store directory
    #[serde(rename = "store-dir")]
    pub store_dir: PathBuf,

    pub collection: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_dir: sessionstore::config::default_store_path(),
            collection: sessionstore::USERS_COLLECTION.to_string(),
        }
    }
}

/// Telegram Bot API connector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Environment variable containing the bot token
    #[serde(rename = "token-env")]
    pub token_env: String,

    #[serde(rename = "api-url")]
    pub api_url: String,

    /// Long-polling timeout for getUpdates
    #[serde(rename = "poll-timeout-secs")]
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token_env: "TELEGRAM_API_TOKEN".to_string(),
            api_url: "https://api.telegram.org".to_string(),
            poll_timeout_secs: 30,
        }
    }
}

impl TelegramConfig {
    pub fn token(&self) -> Result<String> {
        std::env::var(&self.token_env)
            .map_err(|_| eyre::eyre!("Telegram token not found. Set the {} environment variable.", self.token_env))
    }
}
