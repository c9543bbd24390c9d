//! OpenAI Chat Completions adapter.
//!
//! Also drives the OpenAI-compatible vendors (Groq, Azure OpenAI), which
//! only differ in endpoint, auth headers and capabilities.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::HeaderMap;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ParleyError;
use crate::models::capabilities::ModelCapabilities;
use crate::models::openai::OpenAiModel;
use crate::types::{ChatMessage, ChatRequest, FunctionInvocation, Message, Role};

use super::http::{bearer_headers, post_json, sse_stream, SseData};
use super::{check_request, forward, until_cancelled, PassOutput, ProtocolAdapter, ResponseSink};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Where the system prompt goes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestShaping {
    /// System prompt as a leading `system` message.
    Standard,
    /// Models without a system role: the system prompt becomes a leading
    /// user message.
    FoldSystemPrompt,
}

impl RequestShaping {
    pub fn for_capabilities(capabilities: &ModelCapabilities) -> Self {
        if capabilities.supports_system_messages {
            Self::Standard
        } else {
            Self::FoldSystemPrompt
        }
    }
}

/// Temperature sent to models that do not accept one.
const FIXED_TEMPERATURE: f64 = 1.0;

pub struct OpenAiAdapter {
    provider: &'static str,
    identifier: String,
    url: String,
    headers: HeaderMap,
    shaping: RequestShaping,
    capabilities: ModelCapabilities,
}

impl OpenAiAdapter {
    pub fn new(model: OpenAiModel, api_key: String, base_url: Option<String>) -> Self {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let capabilities = model.capabilities();
        Self {
            provider: "openai",
            identifier: model.as_str().to_string(),
            url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            headers: bearer_headers(&api_key),
            shaping: RequestShaping::for_capabilities(&capabilities),
            capabilities,
        }
    }

    /// An adapter for an OpenAI-compatible endpoint.
    #[cfg(any(feature = "groq", feature = "azure"))]
    pub(crate) fn compatible(
        provider: &'static str,
        identifier: String,
        url: String,
        headers: HeaderMap,
        capabilities: ModelCapabilities,
    ) -> Self {
        Self {
            provider,
            identifier,
            url,
            headers,
            shaping: RequestShaping::for_capabilities(&capabilities),
            capabilities,
        }
    }

    pub fn shaping(&self) -> RequestShaping {
        self.shaping
    }

    fn streams(&self) -> bool {
        self.capabilities.supports_streaming
    }

    pub(crate) fn build_request_body(&self, request: &ChatRequest) -> Value {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(ref system) = request.system_prompt {
            let role = match self.shaping {
                RequestShaping::Standard => "system",
                RequestShaping::FoldSystemPrompt => "user",
            };
            messages.push(json!({"role": role, "content": system}));
        }
        messages.extend(request.messages.iter().map(message_to_openai));

        let temperature = if self.capabilities.supports_temperature {
            request.temperature
        } else {
            FIXED_TEMPERATURE
        };

        let mut body = json!({
            "model": self.identifier,
            "temperature": temperature,
            "messages": messages,
            "stream": self.streams(),
            "user": request.end_user_identifier,
        });

        let Some(obj) = body.as_object_mut() else {
            return body;
        };

        if !request.functions.is_empty() {
            let tools: Vec<Value> = request
                .functions
                .iter()
                .map(|f| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": f.name(),
                            "description": f.description(),
                            "parameters": f.input_schema(),
                        }
                    })
                })
                .collect();
            obj.insert("tools".into(), tools.into());
        }
        if request.is_json() {
            obj.insert("response_format".into(), json!({"type": "json_object"}));
        }
        if let Some(max) = request.max_tokens {
            obj.insert("max_tokens".into(), max.into());
        }
        if let Some(ref mandatory) = request.mandatory_function {
            obj.insert(
                "tool_choice".into(),
                json!({"type": "function", "function": {"name": mandatory.name()}}),
            );
        }

        body
    }

    async fn run_pass(
        &self,
        request: &ChatRequest,
        sink: &mut dyn ResponseSink,
    ) -> Result<(), ParleyError> {
        check_request(&self.identifier, &self.capabilities, request)?;
        let body = self.build_request_body(request);
        let resp = post_json(&self.url, self.headers.clone(), &body).await?;

        if !self.streams() {
            let value: Value = resp.json().await?;
            let outputs = parse_completion(&self.identifier, &value)?;
            forward(sink, outputs).await;
            return Ok(());
        }

        let mut chunks = sse_stream(resp);
        let mut state = OpenAiStreamState::new();
        while let Some(data) = chunks.next().await {
            match data? {
                SseData::Done => break,
                SseData::Json(chunk) => forward(sink, state.apply(&chunk)?).await,
            }
        }
        forward(sink, state.finish()?).await;
        Ok(())
    }
}

#[async_trait]
impl ProtocolAdapter for OpenAiAdapter {
    fn provider_name(&self) -> &str {
        self.provider
    }

    fn identifier(&self) -> &str {
        &self.identifier
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
        debug!(
            model = self.identifier.as_str(),
            provider = self.provider,
            streaming = self.streams(),
            "OpenAI pass"
        );
        until_cancelled(cancel, self.run_pass(request, sink)).await
    }
}

fn message_to_openai(msg: &Message) -> Value {
    match msg {
        Message::Chat(m) => json!({"role": m.role.as_str(), "content": m.text}),
        Message::Image(m) => json!({
            "role": m.role.as_str(),
            "content": [{
                "type": "image_url",
                "image_url": {"url": format!("data:{};base64,{}", m.mime_type, m.data)},
            }],
        }),
        Message::FunctionInvocation(fi) => json!({
            "role": "assistant",
            "content": Value::Null,
            "tool_calls": [{
                "type": "function",
                "id": fi.id,
                "function": {
                    "name": fi.name,
                    "arguments": fi.parameters.to_string(),
                },
            }],
        }),
        Message::FunctionReturnValue(rv) => json!({
            "role": "tool",
            "tool_call_id": rv.id,
            "content": rv.result,
        }),
    }
}

/// Extract the outputs of a non-streaming `chat.completion` response.
fn parse_completion(identifier: &str, value: &Value) -> Result<Vec<PassOutput>, ParleyError> {
    let object = value.get("object").and_then(Value::as_str);
    if object != Some("chat.completion") {
        return Err(ParleyError::protocol(format!(
            "{identifier}: expected chat.completion object but got {}",
            object.unwrap_or("nothing")
        )));
    }

    let message = value
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| {
            ParleyError::protocol(format!("{identifier}: no message in first choice"))
        })?;
    let role = message
        .get("role")
        .and_then(Value::as_str)
        .ok_or_else(|| ParleyError::protocol(format!("{identifier}: no role in first choice")))?;

    let mut outputs = Vec::new();
    if let Some(content) = message.get("content").and_then(Value::as_str) {
        outputs.push(PassOutput::Fragment(content.to_string()));
        outputs.push(PassOutput::Complete(Message::Chat(ChatMessage::new(
            Role::from(role),
            content,
        ))));
    }

    if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
        for call in calls {
            let mut pending = PendingToolCall::default();
            pending.merge(call);
            outputs.push(PassOutput::Complete(pending.into_invocation()?));
        }
    }

    if outputs.is_empty() {
        return Err(ParleyError::protocol(format!(
            "{identifier}: no content in first choice"
        )));
    }
    Ok(outputs)
}

#[derive(Debug, Default)]
struct PendingToolCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

impl PendingToolCall {
    fn merge(&mut self, fragment: &Value) {
        if self.id.is_none() {
            self.id = fragment.get("id").and_then(Value::as_str).map(str::to_string);
        }
        let function = fragment.get("function");
        if self.name.is_none() {
            self.name = function
                .and_then(|f| f.get("name"))
                .and_then(Value::as_str)
                .map(str::to_string);
        }
        if let Some(args) = function
            .and_then(|f| f.get("arguments"))
            .and_then(Value::as_str)
        {
            self.arguments.push_str(args);
        }
    }

    fn into_invocation(self) -> Result<Message, ParleyError> {
        let id = self
            .id
            .ok_or_else(|| ParleyError::protocol("tool call without id"))?;
        let name = self
            .name
            .ok_or_else(|| ParleyError::protocol("tool call without function name"))?;
        let parameters = if self.arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(&self.arguments).map_err(|e| {
                ParleyError::protocol(format!("invalid arguments for tool call {id}: {e}"))
            })?
        };
        Ok(Message::FunctionInvocation(FunctionInvocation::new(
            id, name, parameters,
        )))
    }
}

/// Accumulates streamed chat completion chunks.
///
/// Tool call fragments are keyed by their `index`; invocations are emitted
/// once the stream ends, in ascending index order.
#[derive(Debug, Default)]
pub(crate) struct OpenAiStreamState {
    text: String,
    calls: BTreeMap<u64, PendingToolCall>,
}

impl OpenAiStreamState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, chunk: &Value) -> Result<Vec<PassOutput>, ParleyError> {
        let choices = chunk
            .get("choices")
            .and_then(Value::as_array)
            .ok_or_else(|| ParleyError::protocol("chunk without choices"))?;

        let mut outputs = Vec::new();
        let Some(delta) = choices.first().and_then(|c| c.get("delta")) else {
            return Ok(outputs);
        };

        if let Some(content) = delta.get("content").and_then(Value::as_str) {
            if !content.is_empty() {
                self.text.push_str(content);
                outputs.push(PassOutput::Fragment(content.to_string()));
            }
        }

        if let Some(tool_calls) = delta.get("tool_calls").and_then(Value::as_array) {
            self.flush_text(&mut outputs);
            for fragment in tool_calls {
                let Some(index) = fragment.get("index") else {
                    continue;
                };
                let index = index
                    .as_u64()
                    .ok_or_else(|| ParleyError::protocol("tool call index is not a number"))?;
                self.calls.entry(index).or_default().merge(fragment);
            }
        }

        Ok(outputs)
    }

    /// Flush remaining text, then every accumulated tool call.
    pub fn finish(&mut self) -> Result<Vec<PassOutput>, ParleyError> {
        let mut outputs = Vec::new();
        self.flush_text(&mut outputs);
        for (_, call) in std::mem::take(&mut self.calls) {
            outputs.push(PassOutput::Complete(call.into_invocation()?));
        }
        Ok(outputs)
    }

    fn flush_text(&mut self, outputs: &mut Vec<PassOutput>) {
        if self.text.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.text);
        outputs.push(PassOutput::Complete(Message::assistant(text)));
    }
}
