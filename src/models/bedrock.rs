//! Anthropic models hosted on Amazon Bedrock.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::capabilities::ModelCapabilities;

/// Bedrock model ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
pub enum BedrockModel {
    #[strum(serialize = "anthropic.claude-3-5-sonnet-20240620-v1:0")]
    Claude35Sonnet,
    #[strum(serialize = "anthropic.claude-3-sonnet-20240229-v1:0")]
    Claude3Sonnet,
    #[strum(serialize = "anthropic.claude-3-haiku-20240307-v1:0")]
    Claude3Haiku,
    /// Any other Anthropic model id enabled in the account.
    #[strum(default)]
    Custom(String),
}

impl BedrockModel {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Claude35Sonnet => "anthropic.claude-3-5-sonnet-20240620-v1:0",
            Self::Claude3Sonnet => "anthropic.claude-3-sonnet-20240229-v1:0",
            Self::Claude3Haiku => "anthropic.claude-3-haiku-20240307-v1:0",
            Self::Custom(s) => s,
        }
    }

    pub fn capabilities(&self) -> ModelCapabilities {
        ModelCapabilities::full()
    }
}
