//! Groq model definitions.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::capabilities::ModelCapabilities;

/// Groq models (OpenAI-compatible API).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
pub enum GroqModel {
    #[strum(serialize = "llama3-70b-8192")]
    Llama370b,
    #[strum(serialize = "llama3-8b-8192")]
    Llama38b,
    #[strum(default)]
    Custom(String),
}

impl GroqModel {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Llama370b => "llama3-70b-8192",
            Self::Llama38b => "llama3-8b-8192",
            Self::Custom(s) => s,
        }
    }

    pub fn capabilities(&self) -> ModelCapabilities {
        ModelCapabilities {
            supports_function_calls: true,
            supports_image_inputs: false,
            ..Default::default()
        }
    }
}
