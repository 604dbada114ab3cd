use anyhow::Result;
use strum_macros::{Display, EnumIter, EnumString};

use super::anthropic::AnthropicProvider;
use super::base::Provider;
use super::configs::ProviderConfig;
use super::openai::OpenAiProvider;

/// The provider families the loop can drive. Resolved to one concrete
/// adapter before the first turn; nothing downstream branches on this again.
#[derive(EnumIter, EnumString, Display, Debug, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    Bedrock,
    Vertex,
    #[strum(serialize = "openai")]
    OpenAiCompatible,
}

pub fn get_provider(config: ProviderConfig) -> Result<Box<dyn Provider>> {
    match config {
        ProviderConfig::Anthropic(config)
        | ProviderConfig::Bedrock(config)
        | ProviderConfig::Vertex(config) => Ok(Box::new(AnthropicProvider::new(config)?)),
        ProviderConfig::OpenAiCompatible(config) => Ok(Box::new(OpenAiProvider::new(config)?)),
    }
}
