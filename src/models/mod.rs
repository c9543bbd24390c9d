//! Model definitions and selection.

pub mod capabilities;
pub mod selector;

#[cfg(feature = "anthropic")]
pub mod anthropic;
#[cfg(feature = "azure")]
pub mod azure;
#[cfg(feature = "bedrock")]
pub mod bedrock;
#[cfg(feature = "groq")]
pub mod groq;
#[cfg(feature = "openai")]
pub mod openai;

pub use capabilities::ModelCapabilities;
pub use selector::ModelSelector;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level language model enum, dispatching to provider-specific variants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "provider", content = "model")]
pub enum LanguageModel {
    #[cfg(feature = "anthropic")]
    Anthropic(anthropic::AnthropicModel),
    #[cfg(feature = "openai")]
    OpenAi(openai::OpenAiModel),
    #[cfg(feature = "groq")]
    Groq(groq::GroqModel),
    #[cfg(feature = "azure")]
    Azure(azure::AzureDeployment),
    #[cfg(feature = "bedrock")]
    Bedrock(bedrock::BedrockModel),
}

impl LanguageModel {
    /// Get the model's API identifier string.
    pub fn model_id(&self) -> String {
        match self {
            #[cfg(feature = "anthropic")]
            Self::Anthropic(m) => m.as_str().to_string(),
            #[cfg(feature = "openai")]
            Self::OpenAi(m) => m.as_str().to_string(),
            #[cfg(feature = "groq")]
            Self::Groq(m) => m.as_str().to_string(),
            #[cfg(feature = "azure")]
            Self::Azure(d) => d.identifier(),
            #[cfg(feature = "bedrock")]
            Self::Bedrock(m) => m.as_str().to_string(),
        }
    }

    /// Get the provider name.
    pub fn provider_name(&self) -> &str {
        match self {
            #[cfg(feature = "anthropic")]
            Self::Anthropic(_) => "anthropic",
            #[cfg(feature = "openai")]
            Self::OpenAi(_) => "openai",
            #[cfg(feature = "groq")]
            Self::Groq(_) => "groq",
            #[cfg(feature = "azure")]
            Self::Azure(_) => "azure",
            #[cfg(feature = "bedrock")]
            Self::Bedrock(_) => "bedrock",
        }
    }

    /// Get capabilities for this model.
    pub fn capabilities(&self) -> ModelCapabilities {
        match self {
            #[cfg(feature = "anthropic")]
            Self::Anthropic(m) => m.capabilities(),
            #[cfg(feature = "openai")]
            Self::OpenAi(m) => m.capabilities(),
            #[cfg(feature = "groq")]
            Self::Groq(m) => m.capabilities(),
            #[cfg(feature = "azure")]
            Self::Azure(d) => d.capabilities(),
            #[cfg(feature = "bedrock")]
            Self::Bedrock(m) => m.capabilities(),
        }
    }
}

impl fmt::Display for LanguageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider_name(), self.model_id())
    }
}
