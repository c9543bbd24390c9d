//! Anthropic Messages API adapter.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ParleyError;
use crate::models::anthropic::AnthropicModel;
use crate::models::capabilities::ModelCapabilities;
use crate::types::{ChatMessage, ChatRequest, FunctionInvocation, Message, Role};

use super::http::{anthropic_headers, post_json, sse_stream, SseData};
use super::{check_request, forward, until_cancelled, PassOutput, ProtocolAdapter, ResponseSink};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;
pub(crate) const JSON_PREFILL: &str = "{";

pub struct AnthropicAdapter {
    model: AnthropicModel,
    api_key: String,
    base_url: String,
    capabilities: ModelCapabilities,
}

impl AnthropicAdapter {
    pub fn new(model: AnthropicModel, api_key: String, base_url: Option<String>) -> Self {
        let capabilities = model.capabilities();
        Self {
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model,
            api_key,
            capabilities,
        }
    }

    fn build_request_body(&self, request: &ChatRequest) -> Value {
        let mut body = messages_body(request);
        if let Some(obj) = body.as_object_mut() {
            obj.insert("model".into(), self.model.as_str().into());
            obj.insert("stream".into(), true.into());
        }
        body
    }
}

/// Messages API body without transport fields (`model`, `stream`).
///
/// Shared with hosts that carry the model and streaming mode outside the
/// body.
pub(crate) fn messages_body(request: &ChatRequest) -> Value {
    let mut messages = request.messages.clone();
    if request.is_json() {
        messages.push(Message::assistant(JSON_PREFILL));
    }

    let wire_messages: Vec<Value> = merge_by_role(&messages)
        .into_iter()
        .map(|group| {
            let content: Vec<Value> = group.iter().map(|m| content_block(m)).collect();
            json!({
                "role": anthropic_role(group[0]),
                "content": content,
            })
        })
        .collect();

    let tools: Vec<Value> = request
        .functions
        .iter()
        .map(|f| {
            json!({
                "name": f.name(),
                "description": f.description(),
                "input_schema": f.input_schema(),
            })
        })
        .collect();

    let mut body = json!({
        "messages": wire_messages,
        "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        "temperature": request.temperature,
        "tools": tools,
    });

    if let Some(obj) = body.as_object_mut() {
        if let Some(ref mandatory) = request.mandatory_function {
            obj.insert(
                "tool_choice".into(),
                json!({"type": "tool", "name": mandatory.name()}),
            );
        }
        if let Some(ref system) = request.system_prompt {
            obj.insert("system".into(), system.clone().into());
        }
    }

    body
}

#[async_trait]
impl ProtocolAdapter for AnthropicAdapter {
    fn provider_name(&self) -> &str {
        "anthropic"
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
        let body = self.build_request_body(request);
        let url = format!("{}/messages", self.base_url);

        debug!(model = self.model.as_str(), provider = "anthropic", "Anthropic pass");

        until_cancelled(cancel, async {
            let resp = post_json(&url, anthropic_headers(&self.api_key, API_VERSION), &body).await?;
            let mut events = sse_stream(resp);
            let mut state = AnthropicStreamState::new();

            if request.is_json() {
                forward(sink, state.prefill(JSON_PREFILL)).await;
            }

            while let Some(data) = events.next().await {
                let SseData::Json(event) = data? else {
                    continue;
                };
                let step = state.apply(&event)?;
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

/// Role a message takes on the wire.
fn anthropic_role(message: &Message) -> &str {
    match message {
        Message::Chat(m) => m.role.as_str(),
        Message::Image(m) => m.role.as_str(),
        Message::FunctionReturnValue(_) => "user",
        Message::FunctionInvocation(_) => "assistant",
    }
}

/// Group consecutive messages sharing a wire role, preserving order.
///
/// The Messages API rejects two user or two assistant turns in a row but
/// accepts several content blocks per turn.
pub(crate) fn merge_by_role(messages: &[Message]) -> Vec<Vec<&Message>> {
    let mut groups: Vec<Vec<&Message>> = Vec::new();
    for message in messages {
        match groups.last_mut() {
            Some(group) if anthropic_role(group[0]) == anthropic_role(message) => {
                group.push(message)
            }
            _ => groups.push(vec![message]),
        }
    }
    groups
}

fn content_block(message: &Message) -> Value {
    match message {
        Message::Chat(m) => json!({"type": "text", "text": m.text}),
        Message::Image(m) => json!({
            "type": "image",
            "source": {
                "type": "base64",
                "media_type": m.mime_type,
                "data": m.data,
            }
        }),
        Message::FunctionInvocation(fi) => json!({
            "type": "tool_use",
            "id": fi.id,
            "name": fi.name,
            "input": fi.parameters,
        }),
        Message::FunctionReturnValue(rv) => json!({
            "type": "tool_result",
            "tool_use_id": rv.id,
            "is_error": !rv.successful,
            "content": [{"type": "text", "text": rv.result}],
        }),
    }
}

#[derive(Debug, Default)]
struct PendingCall {
    id: String,
    name: String,
    arguments: String,
}

/// Outputs produced by one stream event.
#[derive(Debug, Default)]
pub(crate) struct StreamStep {
    pub outputs: Vec<PassOutput>,
    pub finished: bool,
}

/// Accumulates one Anthropic event stream into fragments and complete messages.
#[derive(Debug, Default)]
pub(crate) struct AnthropicStreamState {
    text: String,
    /// Prefill already forwarded as a fragment, owed to the next text block.
    prefill: String,
    call: Option<PendingCall>,
}

impl AnthropicStreamState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a prefill the model continues from.
    ///
    /// The prefill becomes part of the first text block's message; a pass
    /// without text never turns it into a message of its own.
    pub fn prefill(&mut self, text: &str) -> Vec<PassOutput> {
        self.prefill.push_str(text);
        vec![PassOutput::Fragment(text.to_string())]
    }

    pub fn apply(&mut self, event: &Value) -> Result<StreamStep, ParleyError> {
        let event_type = event
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ParleyError::protocol("event without type"))?;

        let mut step = StreamStep::default();
        match event_type {
            "content_block_start" => {
                let block = required(event, "content_block")?;
                match required_str(block, "type")? {
                    "tool_use" => {
                        self.call = Some(PendingCall {
                            id: required_str(block, "id")?.to_string(),
                            name: required_str(block, "name")?.to_string(),
                            arguments: String::new(),
                        });
                    }
                    "text" => {
                        let text = required_str(block, "text")?;
                        self.append_text(text, &mut step);
                    }
                    _ => {}
                }
            }
            "content_block_delta" => {
                let Some(delta) = event.get("delta") else {
                    return Ok(step);
                };
                match delta.get("type").and_then(Value::as_str) {
                    Some("text_delta") => {
                        let text = required_str(delta, "text")?;
                        self.append_text(text, &mut step);
                    }
                    Some("input_json_delta") => {
                        let partial = required_str(delta, "partial_json")?;
                        let call = self.call.as_mut().ok_or_else(|| {
                            ParleyError::protocol("input_json_delta outside a tool_use block")
                        })?;
                        call.arguments.push_str(partial);
                    }
                    _ => {}
                }
            }
            "content_block_stop" => {
                if !self.text.is_empty() {
                    let text = std::mem::take(&mut self.text);
                    step.outputs.push(PassOutput::Complete(Message::Chat(ChatMessage::new(
                        Role::Assistant,
                        text,
                    ))));
                }
                if let Some(call) = self.call.take() {
                    let parameters = if call.arguments.trim().is_empty() {
                        json!({})
                    } else {
                        serde_json::from_str(&call.arguments).map_err(|e| {
                            ParleyError::protocol(format!(
                                "invalid arguments for tool_use {}: {e}",
                                call.id
                            ))
                        })?
                    };
                    step.outputs.push(PassOutput::Complete(Message::FunctionInvocation(
                        FunctionInvocation::new(call.id, call.name, parameters),
                    )));
                }
            }
            "message_stop" => step.finished = true,
            "error" => {
                let message = event
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown stream error");
                return Err(ParleyError::Provider {
                    provider: "anthropic".into(),
                    message: message.to_string(),
                });
            }
            // ping, message_start, message_delta and anything newer
            _ => {}
        }
        Ok(step)
    }

    fn append_text(&mut self, text: &str, step: &mut StreamStep) {
        if text.is_empty() {
            return;
        }
        if !self.prefill.is_empty() {
            let prefill = std::mem::take(&mut self.prefill);
            self.text.push_str(&prefill);
        }
        self.text.push_str(text);
        step.outputs.push(PassOutput::Fragment(text.to_string()));
    }
}

fn required<'a>(value: &'a Value, field: &str) -> Result<&'a Value, ParleyError> {
    value
        .get(field)
        .ok_or_else(|| ParleyError::protocol(format!("missing field `{field}`")))
}

fn required_str<'a>(value: &'a Value, field: &str) -> Result<&'a str, ParleyError> {
    required(value, field)?
        .as_str()
        .ok_or_else(|| ParleyError::protocol(format!("field `{field}` is not a string")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::{Function, FunctionParameters};
    use crate::types::{FunctionReturnValue, ResponseFormat};
    use pretty_assertions::assert_eq;

    fn adapter() -> AnthropicAdapter {
        AnthropicAdapter::new(AnthropicModel::Claude3Haiku, "test-key".into(), None)
    }

    fn run_events(events: &[Value]) -> Result<Vec<PassOutput>, ParleyError> {
        let mut state = AnthropicStreamState::new();
        let mut outputs = Vec::new();
        for event in events {
            let step = state.apply(event)?;
            outputs.extend(step.outputs);
            if step.finished {
                break;
            }
        }
        Ok(outputs)
    }

    #[test]
    fn merges_consecutive_roles_in_order() {
        let messages = vec![
            Message::user("a"),
            Message::user("b"),
            FunctionInvocation::new("t1", "add", json!({})).into(),
            Message::assistant("c"),
            FunctionReturnValue::succeeded("t1", "5").into(),
        ];
        let groups = merge_by_role(&messages);
        let sizes: Vec<usize> = groups.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(groups[1][0], &messages[2]);
        assert_eq!(groups[1][1], &messages[3]);
    }

    #[test]
    fn merging_alternating_roles_is_identity() {
        let messages = vec![
            Message::user("q1"),
            Message::assistant("a1"),
            Message::user("q2"),
            Message::assistant("a2"),
        ];
        let groups = merge_by_role(&messages);
        assert_eq!(groups.len(), messages.len());
        for (group, message) in groups.iter().zip(&messages) {
            assert_eq!(group.as_slice(), &[message]);
        }
    }

    #[test]
    fn request_body_includes_tools_system_and_tool_choice() {
        let add = Function::new(
            "add",
            "Add two numbers",
            FunctionParameters::object()
                .integer("a", "first", true)
                .integer("b", "second", true)
                .build(),
            |args| async move { Ok((args.get_i64("a")? + args.get_i64("b")?).to_string()) },
        );
        let request = ChatRequest::builder()
            .system_prompt("be brief")
            .messages(vec![Message::user("2+3?")])
            .functions(vec![add.clone()])
            .mandatory_function(add)
            .build();

        let body = adapter().build_request_body(&request);
        assert_eq!(body["system"], "be brief");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["stream"], true);
        assert_eq!(body["tools"][0]["name"], "add");
        assert_eq!(body["tools"][0]["input_schema"]["required"], json!(["a", "b"]));
        assert_eq!(body["tool_choice"], json!({"type": "tool", "name": "add"}));
        assert_eq!(
            body["messages"],
            json!([{"role": "user", "content": [{"type": "text", "text": "2+3?"}]}])
        );
    }

    #[test]
    fn json_format_appends_assistant_prefill() {
        let request = ChatRequest::builder()
            .messages(vec![Message::user("give me json")])
            .response_format(ResponseFormat::Json)
            .max_tokens(100)
            .build();

        let body = adapter().build_request_body(&request);
        assert_eq!(body["max_tokens"], 100);
        assert_eq!(
            body["messages"][1],
            json!({"role": "assistant", "content": [{"type": "text", "text": "{"}]})
        );
    }

    #[test]
    fn tool_results_merge_into_one_user_turn() {
        let request = ChatRequest::new(vec![
            Message::user("go"),
            FunctionInvocation::new("t1", "a", json!({"x": 1})).into(),
            FunctionInvocation::new("t2", "b", json!({})).into(),
            FunctionReturnValue::succeeded("t1", "ok").into(),
            FunctionReturnValue::failed("t2", "boom").into(),
        ]);
        let body = adapter().build_request_body(&request);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[1]["content"][0]["input"], json!({"x": 1}));
        assert_eq!(messages[2]["role"], "user");
        assert_eq!(messages[2]["content"][1]["is_error"], true);
        assert_eq!(messages[2]["content"][1]["content"][0]["text"], "boom");
    }

    #[test]
    fn text_stream_produces_fragments_then_message() {
        let outputs = run_events(&[
            json!({"type": "message_start", "message": {}}),
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
            json!({"type": "ping"}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Hel"}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "lo"}}),
            json!({"type": "content_block_stop", "index": 0}),
            json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}}),
            json!({"type": "message_stop"}),
        ])
        .unwrap();

        assert_eq!(
            outputs,
            vec![
                PassOutput::Fragment("Hel".into()),
                PassOutput::Fragment("lo".into()),
                PassOutput::Complete(Message::assistant("Hello")),
            ]
        );
    }

    #[test]
    fn tool_use_block_assembles_invocation() {
        let outputs = run_events(&[
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "tool_use", "id": "toolu_1", "name": "add", "input": {}}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "input_json_delta", "partial_json": "{\"a\": 2,"}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "input_json_delta", "partial_json": " \"b\": 3}"}}),
            json!({"type": "content_block_stop", "index": 0}),
            json!({"type": "message_stop"}),
        ])
        .unwrap();

        assert_eq!(
            outputs,
            vec![PassOutput::Complete(
                FunctionInvocation::new("toolu_1", "add", json!({"a": 2, "b": 3})).into()
            )]
        );
    }

    #[test]
    fn empty_tool_arguments_become_empty_object() {
        let outputs = run_events(&[
            json!({"type": "content_block_start", "content_block": {"type": "tool_use", "id": "t", "name": "now"}}),
            json!({"type": "content_block_stop"}),
        ])
        .unwrap();
        assert_eq!(
            outputs,
            vec![PassOutput::Complete(
                FunctionInvocation::new("t", "now", json!({})).into()
            )]
        );
    }

    #[test]
    fn prefill_is_part_of_the_assistant_text() {
        let mut state = AnthropicStreamState::new();
        let mut outputs = state.prefill("{");
        for event in [
            json!({"type": "content_block_delta", "delta": {"type": "text_delta", "text": "\"a\":1}"}}),
            json!({"type": "content_block_stop"}),
        ] {
            outputs.extend(state.apply(&event).unwrap().outputs);
        }
        assert_eq!(outputs[0], PassOutput::Fragment("{".into()));
        assert_eq!(outputs[2], PassOutput::Complete(Message::assistant("{\"a\":1}")));
    }

    #[test]
    fn prefill_before_tool_use_yields_no_chat_message() {
        let mut state = AnthropicStreamState::new();
        let mut outputs = state.prefill("{");
        for event in [
            json!({"type": "content_block_start", "content_block": {"type": "tool_use", "id": "t1", "name": "add"}}),
            json!({"type": "content_block_delta", "delta": {"type": "input_json_delta", "partial_json": "{\"a\":1}"}}),
            json!({"type": "content_block_stop"}),
            json!({"type": "message_stop"}),
        ] {
            outputs.extend(state.apply(&event).unwrap().outputs);
        }
        assert_eq!(
            outputs,
            vec![
                PassOutput::Fragment("{".into()),
                PassOutput::Complete(FunctionInvocation::new("t1", "add", json!({"a": 1})).into()),
            ]
        );
    }

    #[test]
    fn messages_body_leaves_out_transport_fields() {
        let body = messages_body(&ChatRequest::new(vec![Message::user("hi")]));
        assert!(body.get("model").is_none());
        assert!(body.get("stream").is_none());
        assert_eq!(body["max_tokens"], 4096);
    }

    #[test]
    fn event_without_type_is_a_protocol_violation() {
        let err = run_events(&[json!({"delta": {}})]).unwrap_err();
        assert!(matches!(err, ParleyError::Protocol(_)));
    }

    #[test]
    fn tool_use_without_id_is_a_protocol_violation() {
        let err = run_events(&[
            json!({"type": "content_block_start", "content_block": {"type": "tool_use", "name": "add"}}),
        ])
        .unwrap_err();
        assert!(matches!(err, ParleyError::Protocol(_)));
    }

    #[test]
    fn stream_error_event_is_fatal() {
        let err = run_events(&[json!({
            "type": "error",
            "error": {"type": "overloaded_error", "message": "Overloaded"}
        })])
        .unwrap_err();
        assert!(
            matches!(err, ParleyError::Provider { ref message, .. } if message == "Overloaded")
        );
    }

    #[test]
    fn unknown_delta_types_are_ignored() {
        let outputs = run_events(&[
            json!({"type": "content_block_delta", "delta": {"type": "thinking_delta", "thinking": "hmm"}}),
            json!({"type": "content_block_stop"}),
        ])
        .unwrap();
        assert!(outputs.is_empty());
    }
}
