//! LLM provider clients
//!
//! One client per wire protocol behind the [`LlmClient`] trait, and a
//! [`ProviderRegistry`] that maps provider families to their client.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

mod balance;
pub mod client;
mod error;
mod gemini;
mod openai;
mod transport;
mod types;

pub use balance::{BALANCE_UNAVAILABLE, BalanceSource, ProxyBalance, balance_text};
pub use client::LlmClient;
pub use error::LlmError;
pub use gemini::GeminiClient;
pub use openai::OpenAIClient;
pub use transport::Transport;
pub use types::{CompletionRequest, Message, Role, Sampling, strip_emphasis};

use crate::config::{Config, ConfigError, Protocol};
use crate::domain::ModelSelection;

/// Provider family name to client
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    clients: HashMap<String, Arc<dyn LlmClient>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client for a family, replacing any previous one
    pub fn insert(&mut self, family: impl Into<String>, client: Arc<dyn LlmClient>) {
        self.clients.insert(family.into(), client);
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with(mut self, family: impl Into<String>, client: Arc<dyn LlmClient>) -> Self {
        self.insert(family, client);
        self
    }

    /// Client serving a session's selected family
    pub fn client_for(&self, selection: &ModelSelection) -> Result<Arc<dyn LlmClient>, ConfigError> {
        debug!(family = %selection.provider_family, "ProviderRegistry::client_for: called");
        self.clients
            .get(&selection.provider_family)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownFamily(selection.provider_family.clone()))
    }

    pub fn families(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }
}

/// Build one client per configured family, sharing one transport per protocol
pub fn create_registry(config: &Config) -> Result<ProviderRegistry, eyre::Report> {
    let transport = Transport::new(config.api_key()?, config.llm.timeout())?;
    let openai: Arc<dyn LlmClient> = Arc::new(OpenAIClient::new(transport.clone()));
    let gemini: Arc<dyn LlmClient> = Arc::new(GeminiClient::new(transport));

    let mut registry = ProviderRegistry::new();
    for provider in &config.providers {
        debug!(family = %provider.name, protocol = ?provider.protocol, "create_registry: registering family");
        let client = match provider.protocol {
            Protocol::Openai => openai.clone(),
            Protocol::Gemini => gemini.clone(),
        };
        registry.insert(provider.name.clone(), client);
    }
    Ok(registry)
}

/// Balance source for the configured proxy
pub fn create_balance(config: &Config) -> Result<Arc<dyn BalanceSource>, eyre::Report> {
    let transport = Transport::new(config.api_key()?, config.llm.timeout())?;
    Ok(Arc::new(ProxyBalance::new(transport, config.llm.balance_url.clone())))
}
