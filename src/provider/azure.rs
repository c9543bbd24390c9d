//! Azure OpenAI adapter.
//!
//! Azure speaks the OpenAI protocol but routes by resource and deployment
//! and authenticates with an `api-key` header.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ParleyError;
use crate::models::azure::AzureDeployment;
use crate::models::capabilities::ModelCapabilities;
use crate::types::ChatRequest;

use super::http::api_key_headers;
use super::openai::OpenAiAdapter;
use super::{ProtocolAdapter, ResponseSink};

pub struct AzureAdapter {
    inner: OpenAiAdapter,
}

impl AzureAdapter {
    /// `base_url` replaces `https://{resource}.openai.azure.com`.
    pub fn new(deployment: AzureDeployment, api_key: String, base_url: Option<String>) -> Self {
        Self {
            inner: OpenAiAdapter::compatible(
                "azure",
                deployment.identifier(),
                deployment_url(&deployment, base_url.as_deref()),
                api_key_headers(&api_key),
                deployment.capabilities(),
            ),
        }
    }
}

fn deployment_url(deployment: &AzureDeployment, base_url: Option<&str>) -> String {
    let base = match base_url {
        Some(url) => url.trim_end_matches('/').to_string(),
        None => format!("https://{}.openai.azure.com", deployment.resource_name),
    };
    format!(
        "{base}/openai/deployments/{}/chat/completions?api-version={}",
        deployment.deployment_name, deployment.api_version
    )
}

#[async_trait]
impl ProtocolAdapter for AzureAdapter {
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
    fn url_addresses_resource_and_deployment() {
        let deployment = AzureDeployment::new("france", "gpt4").with_api_version("2024-06-01");
        assert_eq!(
            deployment_url(&deployment, None),
            "https://france.openai.azure.com/openai/deployments/gpt4/chat/completions?api-version=2024-06-01"
        );
        assert_eq!(
            deployment_url(&deployment, Some("http://127.0.0.1:8080/")),
            "http://127.0.0.1:8080/openai/deployments/gpt4/chat/completions?api-version=2024-06-01"
        );
    }

    #[test]
    fn identifier_names_resource_and_deployment() {
        let adapter = AzureAdapter::new(AzureDeployment::new("france", "gpt4"), "k".into(), None);
        assert_eq!(adapter.identifier(), "azure_france_gpt4");
        assert_eq!(adapter.provider_name(), "azure");
    }
}
