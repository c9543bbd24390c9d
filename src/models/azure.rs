//! Azure OpenAI deployment descriptor.

use serde::{Deserialize, Serialize};

use super::capabilities::ModelCapabilities;

pub const DEFAULT_API_VERSION: &str = "2024-02-15-preview";

/// An Azure OpenAI deployment. Azure addresses models by resource and
/// deployment rather than by model id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct AzureDeployment {
    pub resource_name: String,
    pub deployment_name: String,
    pub api_version: String,
    #[serde(default)]
    pub supports_image_inputs: bool,
}

impl AzureDeployment {
    pub fn new(resource_name: impl Into<String>, deployment_name: impl Into<String>) -> Self {
        Self {
            resource_name: resource_name.into(),
            deployment_name: deployment_name.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            supports_image_inputs: false,
        }
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn with_image_inputs(mut self, supported: bool) -> Self {
        self.supports_image_inputs = supported;
        self
    }

    /// Identifier reported for this deployment.
    pub fn identifier(&self) -> String {
        format!("azure_{}_{}", self.resource_name, self.deployment_name)
    }

    pub fn capabilities(&self) -> ModelCapabilities {
        ModelCapabilities {
            supports_function_calls: true,
            supports_image_inputs: self.supports_image_inputs,
            ..Default::default()
        }
    }
}
