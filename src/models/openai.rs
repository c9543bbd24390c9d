//! OpenAI model definitions.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::capabilities::ModelCapabilities;

/// OpenAI models.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
pub enum OpenAiModel {
    #[strum(serialize = "gpt-4o")]
    Gpt4o,
    #[strum(serialize = "gpt-4")]
    Gpt4,
    #[strum(serialize = "gpt-3.5-turbo")]
    Gpt35Turbo,
    #[strum(serialize = "o1-preview")]
    O1Preview,
    #[strum(serialize = "o1-mini")]
    O1Mini,
    /// Custom/unknown OpenAI model by ID.
    #[strum(default)]
    Custom(String),
}

impl OpenAiModel {
    /// Get the API model identifier.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Gpt4o => "gpt-4o",
            Self::Gpt4 => "gpt-4",
            Self::Gpt35Turbo => "gpt-3.5-turbo",
            Self::O1Preview => "o1-preview",
            Self::O1Mini => "o1-mini",
            Self::Custom(s) => s,
        }
    }

    /// Early reasoning models: no system role, fixed temperature, no streaming.
    pub fn is_reasoning_preview(&self) -> bool {
        matches!(self, Self::O1Preview | Self::O1Mini)
    }

    pub fn capabilities(&self) -> ModelCapabilities {
        if self.is_reasoning_preview() {
            return ModelCapabilities {
                supports_function_calls: true,
                supports_image_inputs: true,
                supports_streaming: false,
                supports_system_messages: false,
                supports_temperature: false,
            };
        }
        ModelCapabilities::full()
    }
}
