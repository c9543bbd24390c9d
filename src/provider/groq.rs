//! Groq adapter (OpenAI-compatible).

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ParleyError;
use crate::models::capabilities::ModelCapabilities;
use crate::models::groq::GroqModel;
use crate::types::ChatRequest;

use super::http::bearer_headers;
use super::openai::OpenAiAdapter;
use super::{ProtocolAdapter, ResponseSink};

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

pub struct GroqAdapter {
    inner: OpenAiAdapter,
}

impl GroqAdapter {
    pub fn new(model: GroqModel, api_key: String, base_url: Option<String>) -> Self {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            inner: OpenAiAdapter::compatible(
                "groq",
                model.as_str().to_string(),
                format!("{}/chat/completions", base_url.trim_end_matches('/')),
                bearer_headers(&api_key),
                model.capabilities(),
            ),
        }
    }
}

#[async_trait]
impl ProtocolAdapter for GroqAdapter {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    fn identifier(&self) -> &str {
        self.inner.identifier()
    }

    fn capabilities(&self) -> &ModelCapabilities {
        self.inner.capabilities()
    }

    async fn run(
        &self,
        request: &ChatRequest,
        sink: &mut dyn ResponseSink,
        cancel: &CancellationToken,
    ) -> Result<(), ParleyError> {
        self.inner.run(request, sink, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groq_does_not_accept_images() {
        let adapter = GroqAdapter::new(GroqModel::Llama370b, "gsk-test".into(), None);
        assert_eq!(adapter.provider_name(), "groq");
        assert_eq!(adapter.identifier(), "llama3-70b-8192");
        assert!(!adapter.capabilities().supports_image_inputs);
        assert!(adapter.capabilities().supports_function_calls);
    }
}
