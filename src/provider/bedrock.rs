//! Anthropic models on Amazon Bedrock.
//!
//! The request is the Messages API body with Bedrock's `anthropic_version`
//! in place of `model` and `stream`. Every event-stream chunk carries one
//! Anthropic stream event, so decoding reuses the Anthropic stream state machine.

use async_trait::async_trait;
use aws_sdk_bedrockruntime::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_bedrockruntime::error::DisplayErrorContext;
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::types::ResponseStream;
use aws_sdk_bedrockruntime::Client;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ParleyError;
use crate::models::bedrock::BedrockModel;
use crate::models::capabilities::ModelCapabilities;
use crate::types::ChatRequest;

use super::anthropic::{messages_body, AnthropicStreamState, StreamStep, JSON_PREFILL};
use super::{check_request, forward, until_cancelled, ProtocolAdapter, ResponseSink};

const BEDROCK_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

/// Static AWS credentials for one region.
#[derive(Clone)]
pub struct BedrockCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

impl std::fmt::Debug for BedrockCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BedrockCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

pub struct BedrockAdapter {
    model: BedrockModel,
    client: Client,
    capabilities: ModelCapabilities,
}

impl BedrockAdapter {
    /// `endpoint_url` replaces the regional Bedrock runtime endpoint.
    pub fn new(
        model: BedrockModel,
        credentials: BedrockCredentials,
        endpoint_url: Option<String>,
    ) -> Self {
        let mut builder = aws_sdk_bedrockruntime::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(credentials.region))
            .credentials_provider(Credentials::new(
                credentials.access_key_id,
                credentials.secret_access_key,
                None,
                None,
                "parley",
            ));
        if let Some(url) = endpoint_url {
            builder = builder.endpoint_url(url);
        }

        let capabilities = model.capabilities();
        Self {
            model,
            client: Client::from_conf(builder.build()),
            capabilities,
        }
    }
}

fn build_request_body(request: &ChatRequest) -> Value {
    let mut body = messages_body(request);
    if let Some(obj) = body.as_object_mut() {
        obj.insert(
            "anthropic_version".into(),
            BEDROCK_ANTHROPIC_VERSION.into(),
        );
    }
    body
}

/// Feed one event-stream item into the Anthropic state machine.
fn apply_chunk(
    state: &mut AnthropicStreamState,
    event: &ResponseStream,
) -> Result<StreamStep, ParleyError> {
    let ResponseStream::Chunk(part) = event else {
        return Ok(StreamStep::default());
    };
    let Some(bytes) = part.bytes() else {
        return Ok(StreamStep::default());
    };
    let value: Value = serde_json::from_slice(bytes.as_ref())
        .map_err(|e| ParleyError::protocol(format!("invalid Bedrock chunk: {e}")))?;
    state.apply(&value)
}

fn sdk_error<E: std::error::Error>(err: E) -> ParleyError {
    ParleyError::Provider {
        provider: "bedrock".into(),
        message: DisplayErrorContext(err).to_string(),
    }
}

#[async_trait]
impl ProtocolAdapter for BedrockAdapter {
    fn provider_name(&self) -> &str {
        "bedrock"
    }

    fn identifier(&self) -> &str {
        self.model.as_str()
    }

    fn capabilities(&self) -> &ModelCapabilities {
        &self.capabilities
    }

    async fn run(
        &self,
        request: &ChatRequest,
        sink: &mut dyn ResponseSink,
        cancel: &CancellationToken,
    ) -> Result<(), ParleyError> {
        check_request(self.model.as_str(), &self.capabilities, request)?;
        let body = serde_json::to_vec(&build_request_body(request))?;

        debug!(model = self.model.as_str(), provider = "bedrock", "Bedrock pass");

        until_cancelled(cancel, async {
            let mut output = self
                .client
                .invoke_model_with_response_stream()
                .model_id(self.model.as_str())
                .content_type("application/json")
                .accept("application/json")
                .body(Blob::new(body))
                .send()
                .await
                .map_err(sdk_error)?;

            let mut state = AnthropicStreamState::new();
            if request.is_json() {
                forward(sink, state.prefill(JSON_PREFILL)).await;
            }

            while let Some(event) = output.body.recv().await.map_err(sdk_error)? {
                let step = apply_chunk(&mut state, &event)?;
                forward(sink, step.outputs).await;
                if step.finished {
                    break;
                }
            }
            Ok(())
        })
        .await
    }
}
