//! Message types for model communication.

use std::fmt;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// A unit of conversation, as sent to or received from a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Chat(ChatMessage),
    Image(ImageMessage),
    FunctionInvocation(FunctionInvocation),
    FunctionReturnValue(FunctionReturnValue),
}

impl Message {
    /// Create a user chat message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::Chat(ChatMessage::new(Role::User, text))
    }

    /// Create an assistant chat message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Chat(ChatMessage::new(Role::Assistant, text))
    }

    /// Create a chat message with an arbitrary role.
    pub fn chat(role: impl Into<Role>, text: impl Into<String>) -> Self {
        Self::Chat(ChatMessage::new(role.into(), text))
    }

    /// Text of a chat message, `None` for every other variant.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Chat(m) => Some(&m.text),
            _ => None,
        }
    }

    pub fn as_function_invocation(&self) -> Option<&FunctionInvocation> {
        match self {
            Self::FunctionInvocation(fi) => Some(fi),
            _ => None,
        }
    }

    pub fn as_function_return_value(&self) -> Option<&FunctionReturnValue> {
        match self {
            Self::FunctionReturnValue(rv) => Some(rv),
            _ => None,
        }
    }
}

impl From<ChatMessage> for Message {
    fn from(m: ChatMessage) -> Self {
        Self::Chat(m)
    }
}

impl From<ImageMessage> for Message {
    fn from(m: ImageMessage) -> Self {
        Self::Image(m)
    }
}

impl From<FunctionInvocation> for Message {
    fn from(fi: FunctionInvocation) -> Self {
        Self::FunctionInvocation(fi)
    }
}

impl From<FunctionReturnValue> for Message {
    fn from(rv: FunctionReturnValue) -> Self {
        Self::FunctionReturnValue(rv)
    }
}

/// Conversation role.
///
/// Vendors occasionally use roles beyond the common three; those are kept
/// verbatim in [`Role::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    System,
    User,
    Assistant,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        match s {
            "system" => Self::System,
            "user" => Self::User,
            "assistant" => Self::Assistant,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        Role::from(s.as_str())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

/// A text turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

impl ChatMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

/// An image turn. `data` is the base64-encoded payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageMessage {
    pub role: Role,
    pub mime_type: String,
    pub data: String,
}

impl ImageMessage {
    pub fn new(role: Role, mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            role,
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Build an image message from raw bytes, base64-encoding them.
    pub fn from_bytes(role: Role, mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(
            role,
            mime_type,
            base64::engine::general_purpose::STANDARD.encode(bytes),
        )
    }
}

/// A function call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionInvocation {
    /// Vendor-assigned id, unique within a conversation.
    pub id: String,
    pub name: String,
    /// Parameter document exactly as the model produced it.
    pub parameters: serde_json::Value,
}

impl FunctionInvocation {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parameters,
        }
    }
}

/// The outcome of running a [`FunctionInvocation`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionReturnValue {
    /// Id of the invocation this value answers.
    pub id: String,
    pub successful: bool,
    /// Function output, or a readable error description when unsuccessful.
    pub result: String,
}

impl FunctionReturnValue {
    pub fn succeeded(id: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            successful: true,
            result: result.into(),
        }
    }

    pub fn failed(id: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            successful: false,
            result: result.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_serializes_with_type_tag() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(json["type"], "chat");
        assert_eq!(json["role"], "user");
        assert_eq!(json["text"], "hi");
    }

    #[test]
    fn unknown_roles_survive_a_round_trip() {
        let msg: Message =
            serde_json::from_value(serde_json::json!({"type": "chat", "role": "developer", "text": "x"}))
                .unwrap();
        match msg {
            Message::Chat(m) => assert_eq!(m.role, Role::Other("developer".into())),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn image_from_bytes_encodes_base64() {
        let img = ImageMessage::from_bytes(Role::User, "image/png", b"abc");
        assert_eq!(img.data, "YWJj");
    }
}
