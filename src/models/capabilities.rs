//! Model capabilities descriptor.

use serde::{Deserialize, Serialize};

/// Describes what a model can do.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelCapabilities {
    pub supports_function_calls: bool,
    pub supports_image_inputs: bool,
    pub supports_streaming: bool,
    pub supports_system_messages: bool,
    pub supports_temperature: bool,
}

impl Default for ModelCapabilities {
    fn default() -> Self {
        Self {
            supports_function_calls: false,
            supports_image_inputs: false,
            supports_streaming: true,
            supports_system_messages: true,
            supports_temperature: true,
        }
    }
}

impl ModelCapabilities {
    /// Full-featured model capabilities.
    pub fn full() -> Self {
        Self {
            supports_function_calls: true,
            supports_image_inputs: true,
            ..Default::default()
        }
    }
}
