//! Protocol adapter trait and vendor implementations.

pub mod http;

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

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::ParleyConfig;
use crate::error::ParleyError;
use crate::models::{capabilities::ModelCapabilities, LanguageModel};
use crate::types::{ChatRequest, Message};

/// Receives the output of one adapter pass, in the order it becomes available.
#[async_trait]
pub trait ResponseSink: Send {
    /// A small incremental piece of assistant text.
    async fn write_text_fragment(&mut self, fragment: String);
    /// A fully assembled message: chat turn or function invocation.
    async fn write_complete_message(&mut self, message: Message);
}

/// Speaks one vendor's wire protocol.
///
/// A call to [`run`](ProtocolAdapter::run) is one pass: a single HTTP round
/// trip whose output is pushed into the sink until the vendor ends the turn.
#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    /// Provider name (e.g., "anthropic", "openai").
    fn provider_name(&self) -> &str;
    /// Identifier of the model this adapter serves.
    fn identifier(&self) -> &str;

    fn capabilities(&self) -> &ModelCapabilities;

    async fn run(
        &self,
        request: &ChatRequest,
        sink: &mut dyn ResponseSink,
        cancel: &CancellationToken,
    ) -> Result<(), ParleyError>;
}

/// Output of a streaming state machine step.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PassOutput {
    Fragment(String),
    Complete(Message),
}

pub(crate) async fn forward(sink: &mut dyn ResponseSink, outputs: Vec<PassOutput>) {
    for output in outputs {
        match output {
            PassOutput::Fragment(text) => sink.write_text_fragment(text).await,
            PassOutput::Complete(message) => sink.write_complete_message(message).await,
        }
    }
}

/// Race a pass against cancellation.
pub(crate) async fn until_cancelled<F>(cancel: &CancellationToken, pass: F) -> Result<(), ParleyError>
where
    F: Future<Output = Result<(), ParleyError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ParleyError::Canceled),
        result = pass => result,
    }
}

/// Reject requests the model cannot take before anything goes on the wire.
pub(crate) fn check_request(
    identifier: &str,
    capabilities: &ModelCapabilities,
    request: &ChatRequest,
) -> Result<(), ParleyError> {
    let has_images = request
        .messages
        .iter()
        .any(|m| matches!(m, Message::Image(_)));
    if has_images && !capabilities.supports_image_inputs {
        return Err(ParleyError::UnsupportedOperation(format!(
            "{identifier} does not accept image inputs"
        )));
    }
    Ok(())
}

/// Create an adapter for the given model, using the provided config.
#[allow(unused_variables)]
pub fn create_adapter(
    model: &LanguageModel,
    config: &ParleyConfig,
) -> Result<Arc<dyn ProtocolAdapter>, ParleyError> {
    match model {
        #[cfg(feature = "anthropic")]
        LanguageModel::Anthropic(m) => {
            let api_key = config
                .get_api_key("anthropic")
                .ok_or_else(|| ParleyError::Authentication("Missing ANTHROPIC_API_KEY".into()))?;
            Ok(Arc::new(anthropic::AnthropicAdapter::new(
                m.clone(),
                api_key,
                config.get_base_url("anthropic"),
            )))
        }
        #[cfg(feature = "openai")]
        LanguageModel::OpenAi(m) => {
            let api_key = config
                .get_api_key("openai")
                .ok_or_else(|| ParleyError::Authentication("Missing OPENAI_API_KEY".into()))?;
            Ok(Arc::new(openai::OpenAiAdapter::new(
                m.clone(),
                api_key,
                config.get_base_url("openai"),
            )))
        }
        #[cfg(feature = "groq")]
        LanguageModel::Groq(m) => {
            let api_key = config
                .get_api_key("groq")
                .ok_or_else(|| ParleyError::Authentication("Missing GROQ_API_KEY".into()))?;
            Ok(Arc::new(groq::GroqAdapter::new(
                m.clone(),
                api_key,
                config.get_base_url("groq"),
            )))
        }
        #[cfg(feature = "azure")]
        LanguageModel::Azure(deployment) => {
            let api_key = config
                .get_api_key("azure")
                .ok_or_else(|| ParleyError::Authentication("Missing AZURE_OPENAI_API_KEY".into()))?;
            Ok(Arc::new(azure::AzureAdapter::new(
                configured_deployment(deployment, config),
                api_key,
                config.get_base_url("azure"),
            )))
        }
        #[cfg(feature = "bedrock")]
        LanguageModel::Bedrock(m) => {
            let access_key_id = config
                .get_api_key("bedrock")
                .ok_or_else(|| ParleyError::Authentication("Missing AMAZON_ACCESS_KEY".into()))?;
            let secret_access_key = config
                .get_setting("bedrock.secret_access_key")
                .ok_or_else(|| {
                    ParleyError::Authentication("Missing AMAZON_SECRET_ACCESS_KEY".into())
                })?;
            let region = config
                .get_setting("bedrock.region")
                .ok_or_else(|| ParleyError::Configuration("Missing AMAZON_REGION".into()))?;
            Ok(Arc::new(bedrock::BedrockAdapter::new(
                m.clone(),
                bedrock::BedrockCredentials {
                    access_key_id,
                    secret_access_key,
                    region,
                },
                config.get_base_url("bedrock"),
            )))
        }
    }
}

/// Apply `azure.api_version` to a deployment still on the default version.
#[cfg(feature = "azure")]
fn configured_deployment(
    deployment: &crate::models::azure::AzureDeployment,
    config: &ParleyConfig,
) -> crate::models::azure::AzureDeployment {
    use crate::models::azure::DEFAULT_API_VERSION;

    match config.get_setting("azure.api_version") {
        Some(version) if deployment.api_version == DEFAULT_API_VERSION => {
            deployment.clone().with_api_version(version)
        }
        _ => deployment.clone(),
    }
}
