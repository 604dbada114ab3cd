use anyhow::{Context, Result};

use super::actions::ToolVersion;

pub const ANTHROPIC_HOST: &str = "https://api.anthropic.com";
pub const OPENAI_HOST: &str = "https://api.openai.com";

pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// How the Anthropic-wire endpoint authenticates requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnthropicAuth {
    /// `x-api-key` header, used by the native endpoint.
    ApiKey(String),
    /// `Authorization: Bearer` header, used by Bedrock/Vertex gateways.
    /// Token acquisition (SigV4 exchange, OAuth refresh) happens upstream.
    Bearer(String),
}

/// Configuration for any endpoint speaking the Anthropic messages format.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub host: String,
    pub auth: AnthropicAuth,
    pub model: String,
    pub max_tokens: u32,
    /// Extended-reasoning token budget, forwarded verbatim when set.
    pub thinking_budget: Option<u32>,
    pub token_efficient_tools: bool,
    pub tool_version: ToolVersion,
    pub prompt_caching: bool,
}

impl AnthropicConfig {
    pub fn new<K: Into<String>, M: Into<String>>(api_key: K, model: M) -> Self {
        Self {
            host: ANTHROPIC_HOST.to_string(),
            auth: AnthropicAuth::ApiKey(api_key.into()),
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            thinking_budget: None,
            token_efficient_tools: false,
            tool_version: ToolVersion::default(),
            prompt_caching: true,
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key =
            std::env::var("ANTHROPIC_API_KEY").context("ANTHROPIC_API_KEY is not set")?;
        let model = std::env::var("ANTHROPIC_MODEL")
            .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());
        let mut config = Self::new(api_key, model);
        if let Ok(host) = std::env::var("ANTHROPIC_HOST") {
            config.host = host;
        }
        Ok(config)
    }

    /// A Bedrock-fronted endpoint: bearer auth, no prompt caching.
    pub fn bedrock<H: Into<String>, T: Into<String>, M: Into<String>>(
        host: H,
        access_token: T,
        model: M,
    ) -> Self {
        Self {
            host: host.into(),
            auth: AnthropicAuth::Bearer(access_token.into()),
            prompt_caching: false,
            ..Self::new("", model)
        }
    }

    /// A Vertex-fronted endpoint: bearer auth, no prompt caching.
    pub fn vertex<H: Into<String>, T: Into<String>, M: Into<String>>(
        host: H,
        access_token: T,
        model: M,
    ) -> Self {
        Self {
            host: host.into(),
            auth: AnthropicAuth::Bearer(access_token.into()),
            prompt_caching: false,
            ..Self::new("", model)
        }
    }
}

/// Configuration for an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub tool_version: ToolVersion,
}

impl OpenAiConfig {
    pub fn new<K: Into<String>, M: Into<String>>(api_key: K, model: M) -> Self {
        Self {
            host: OPENAI_HOST.to_string(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            tool_version: ToolVersion::default(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY is not set")?;
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let mut config = Self::new(api_key, model);
        if let Ok(host) = std::env::var("OPENAI_HOST") {
            config.host = host;
        }
        Ok(config)
    }
}

/// Unified enum wrapping the per-provider configurations.
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    Anthropic(AnthropicConfig),
    Bedrock(AnthropicConfig),
    Vertex(AnthropicConfig),
    OpenAiCompatible(OpenAiConfig),
}
