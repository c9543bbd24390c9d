//! Anthropic model definitions.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::capabilities::ModelCapabilities;

/// Anthropic models.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
pub enum AnthropicModel {
    #[strum(serialize = "claude-3-5-sonnet-20240620")]
    Claude35Sonnet,
    #[strum(serialize = "claude-3-opus-20240229")]
    Claude3Opus,
    #[strum(serialize = "claude-3-sonnet-20240229")]
    Claude3Sonnet,
    #[strum(serialize = "claude-3-haiku-20240307")]
    Claude3Haiku,
    /// Custom/unknown Anthropic model by ID.
    #[strum(default)]
    Custom(String),
}

impl AnthropicModel {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Claude35Sonnet => "claude-3-5-sonnet-20240620",
            Self::Claude3Opus => "claude-3-opus-20240229",
            Self::Claude3Sonnet => "claude-3-sonnet-20240229",
            Self::Claude3Haiku => "claude-3-haiku-20240307",
            Self::Custom(s) => s,
        }
    }

    pub fn capabilities(&self) -> ModelCapabilities {
        ModelCapabilities::full()
    }
}
