//! Shared HTTP client, SSE parsing, and auth utilities.

use std::sync::OnceLock;

use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};

use crate::error::ParleyError;

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Number of characters of the outgoing body kept on API errors.
pub const PAYLOAD_EXCERPT_CHARS: usize = 500;

/// Get (or create) the shared reqwest client.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    })
}

/// Build default headers for a Bearer-token API.
pub fn bearer_headers(api_key: &str) -> HeaderMap {
    let mut headers = json_headers();
    if let Ok(val) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// Build Anthropic-style headers (x-api-key).
pub fn anthropic_headers(api_key: &str, version: &str) -> HeaderMap {
    let mut headers = json_headers();
    if let Ok(val) = HeaderValue::from_str(api_key) {
        headers.insert("x-api-key", val);
    }
    if let Ok(val) = HeaderValue::from_str(version) {
        headers.insert("anthropic-version", val);
    }
    headers
}

/// Build Azure-style headers (api-key).
pub fn api_key_headers(api_key: &str) -> HeaderMap {
    let mut headers = json_headers();
    if let Ok(val) = HeaderValue::from_str(api_key) {
        headers.insert("api-key", val);
    }
    headers
}

fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
    headers
}

/// Parse an SSE "data:" line, returning the payload.
pub fn parse_sse_data(line: &str) -> Option<&str> {
    let data = line.strip_prefix("data:")?;
    Some(data.strip_prefix(' ').unwrap_or(data))
}

/// One decoded SSE payload.
#[derive(Debug, Clone, PartialEq)]
pub enum SseData {
    Json(serde_json::Value),
    /// OpenAI's `[DONE]` terminator.
    Done,
}

/// Splits a byte stream into SSE data payloads.
///
/// Bytes are buffered until a full line is available, so multi-byte
/// characters split across chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every payload completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseData>, ParleyError> {
        self.buffer.extend_from_slice(chunk);
        let mut out = Vec::new();

        while let Some(line_end) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=line_end).collect();
            if let Some(data) = decode_line(&line)? {
                out.push(data);
            }
        }
        Ok(out)
    }

    /// Drain a trailing line that had no newline.
    pub fn finish(&mut self) -> Result<Option<SseData>, ParleyError> {
        let line = std::mem::take(&mut self.buffer);
        decode_line(&line)
    }
}

fn decode_line(raw: &[u8]) -> Result<Option<SseData>, ParleyError> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();

    if line.is_empty() || line.starts_with(':') {
        return Ok(None);
    }

    let Some(data) = parse_sse_data(line) else {
        // event:, id:, retry: lines carry nothing we route on.
        return Ok(None);
    };
    if data == "[DONE]" {
        return Ok(Some(SseData::Done));
    }

    let value = serde_json::from_str(data)
        .map_err(|e| ParleyError::protocol(format!("invalid JSON in event stream: {e}")))?;
    Ok(Some(SseData::Json(value)))
}

/// Turn a streaming response into a stream of SSE payloads.
pub fn sse_stream(resp: reqwest::Response) -> BoxStream<'static, Result<SseData, ParleyError>> {
    let byte_stream = resp.bytes_stream();

    let stream = async_stream::stream! {
        let mut decoder = SseDecoder::new();
        let mut failed = false;
        futures::pin_mut!(byte_stream);

        while let Some(chunk_result) = byte_stream.next().await {
            let decoded = match chunk_result {
                Ok(chunk) => decoder.push(&chunk),
                Err(e) => Err(ParleyError::Network(e)),
            };
            match decoded {
                Ok(items) => {
                    for data in items {
                        yield Ok::<SseData, ParleyError>(data);
                    }
                }
                Err(e) => {
                    yield Err(e);
                    failed = true;
                    break;
                }
            }
        }

        if !failed {
            match decoder.finish() {
                Ok(Some(data)) => yield Ok(data),
                Ok(None) => {}
                Err(e) => yield Err(e),
            }
        }
    };

    Box::pin(stream)
}

/// POST a JSON body, mapping a non-success status to [`ParleyError::Api`].
pub async fn post_json(
    url: &str,
    headers: HeaderMap,
    body: &serde_json::Value,
) -> Result<reqwest::Response, ParleyError> {
    let payload = serde_json::to_string(body)?;

    let resp = shared_client()
        .post(url)
        .headers(headers)
        .body(payload.clone())
        .send()
        .await?;

    let status = resp.status().as_u16();
    if !resp.status().is_success() {
        let body_text = resp.text().await.unwrap_or_default();
        return Err(status_to_error(status, &body_text, &payload));
    }
    Ok(resp)
}

/// Map an HTTP failure to an error carrying the start of the request body.
pub fn status_to_error(status: u16, body: &str, payload: &str) -> ParleyError {
    ParleyError::Api {
        status,
        message: extract_error_message(body),
        payload_excerpt: Some(excerpt(payload, PAYLOAD_EXCERPT_CHARS)),
    }
}

fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

/// First `max_chars` characters of `text`, never splitting a character.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn decoder_handles_lines_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"type\":").unwrap().is_empty());
        let out = decoder.push(b"\"ping\"}\n\n").unwrap();
        assert_eq!(out, vec![SseData::Json(json!({"type": "ping"}))]);
    }

    #[test]
    fn decoder_skips_comments_and_event_lines() {
        let mut decoder = SseDecoder::new();
        let out = decoder
            .push(b": keepalive\nevent: message_stop\ndata: [DONE]\n")
            .unwrap();
        assert_eq!(out, vec![SseData::Done]);
    }

    #[test]
    fn decoder_keeps_multibyte_characters_intact() {
        let text = "data: {\"t\":\"héllo\"}\n".as_bytes();
        let split = text.iter().position(|b| *b == 0xc3).unwrap() + 1;
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&text[..split]).unwrap().is_empty());
        let out = decoder.push(&text[split..]).unwrap();
        assert_eq!(out, vec![SseData::Json(json!({"t": "héllo"}))]);
    }

    #[test]
    fn decoder_flushes_unterminated_trailing_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: [DONE]").unwrap().is_empty());
        assert_eq!(decoder.finish().unwrap(), Some(SseData::Done));
    }

    #[test]
    fn invalid_json_is_a_protocol_violation() {
        let mut decoder = SseDecoder::new();
        let err = decoder.push(b"data: {not json}\n").unwrap_err();
        assert!(matches!(err, ParleyError::Protocol(_)));
    }

    #[test]
    fn excerpt_respects_character_boundaries() {
        assert_eq!(excerpt("ééé", 2), "éé");
        assert_eq!(excerpt("short", 500), "short");
        assert_eq!(excerpt(&"x".repeat(600), 500).len(), 500);
    }

    #[test]
    fn status_error_prefers_vendor_message() {
        let err = status_to_error(
            429,
            r#"{"error":{"message":"slow down"}}"#,
            r#"{"model":"gpt-4o"}"#,
        );
        match err {
            ParleyError::Api {
                status,
                message,
                payload_excerpt,
            } => {
                assert_eq!(status, 429);
                assert_eq!(message, "slow down");
                assert_eq!(payload_excerpt.as_deref(), Some(r#"{"model":"gpt-4o"}"#));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
