//! Model selection and parsing.

use std::str::FromStr;

use super::LanguageModel;
use crate::config::ParleyConfig;
use crate::error::ParleyError;

/// Parse a "provider:model" string into a LanguageModel.
pub struct ModelSelector;

impl ModelSelector {
    /// Parse "provider:model_id" into a LanguageModel.
    ///
    /// Examples: "openai:gpt-4o", "anthropic:claude-3-5-sonnet-20240620",
    /// "azure:my-resource/gpt4".
    pub fn parse(s: &str) -> Result<LanguageModel, ParleyError> {
        let (provider, model_id) = s.split_once(':').ok_or_else(|| {
            ParleyError::InvalidArgument(format!(
                "Invalid model selector '{s}': expected 'provider:model_id'"
            ))
        })?;

        if model_id.is_empty() {
            return Err(ParleyError::InvalidArgument(format!(
                "Invalid model selector '{s}': empty model id"
            )));
        }

        match provider {
            #[cfg(feature = "anthropic")]
            "anthropic" | "claude" => {
                use super::anthropic::AnthropicModel;
                let m = AnthropicModel::from_str(model_id)
                    .unwrap_or(AnthropicModel::Custom(model_id.to_string()));
                Ok(LanguageModel::Anthropic(m))
            }
            #[cfg(feature = "openai")]
            "openai" => {
                use super::openai::OpenAiModel;
                let m = OpenAiModel::from_str(model_id)
                    .unwrap_or(OpenAiModel::Custom(model_id.to_string()));
                Ok(LanguageModel::OpenAi(m))
            }
            #[cfg(feature = "groq")]
            "groq" => {
                use super::groq::GroqModel;
                let m = GroqModel::from_str(model_id)
                    .unwrap_or(GroqModel::Custom(model_id.to_string()));
                Ok(LanguageModel::Groq(m))
            }
            #[cfg(feature = "azure")]
            "azure" => {
                use super::azure::AzureDeployment;
                let (resource, deployment) = model_id.split_once('/').ok_or_else(|| {
                    ParleyError::InvalidArgument(format!(
                        "Invalid Azure selector '{s}': expected 'azure:resource/deployment'"
                    ))
                })?;
                Ok(LanguageModel::Azure(AzureDeployment::new(resource, deployment)))
            }
            #[cfg(feature = "bedrock")]
            "bedrock" => {
                use super::bedrock::BedrockModel;
                let m = BedrockModel::from_str(model_id)
                    .unwrap_or(BedrockModel::Custom(model_id.to_string()));
                Ok(LanguageModel::Bedrock(m))
            }
            other => Err(ParleyError::ModelNotFound(format!(
                "Unknown or disabled provider '{other}'"
            ))),
        }
    }
}

impl ModelSelector {
    /// Like [`ModelSelector::parse`], but a bare `azure` or `azure:` selector
    /// names the deployment described by the config's `azure.*` settings.
    #[cfg_attr(not(feature = "azure"), allow(unused_variables))]
    pub fn parse_with_config(s: &str, config: &ParleyConfig) -> Result<LanguageModel, ParleyError> {
        #[cfg(feature = "azure")]
        if matches!(s, "azure" | "azure:") {
            return config
                .azure_deployment()
                .map(LanguageModel::Azure)
                .ok_or_else(|| {
                    ParleyError::Configuration(
                        "Azure selector without a deployment needs AZURE_OPENAI_RESOURCE and AZURE_OPENAI_DEPLOYMENT"
                            .into(),
                    )
                });
        }
        Self::parse(s)
    }
}

impl FromStr for LanguageModel {
    type Err = ParleyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelSelector::parse(s)
    }
}
