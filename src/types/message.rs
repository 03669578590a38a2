use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::types::FunctionCall;

/// Role of a conversation message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    /// System role.
    System,

    /// User role.
    User,

    /// Assistant role.
    Assistant,

    /// Any other role string the provider sends. Kept verbatim; roles are
    /// not validated.
    Other(String),
}

impl Role {
    /// The wire representation of this role.
    pub fn as_str(&self) -> &str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Other(s) => s,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        match s {
            "system" => Role::System,
            "user" => Role::User,
            "assistant" => Role::Assistant,
            other => Role::Other(other.to_string()),
        }
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Role::from(s.as_str()))
    }
}

/// The payload of a message: plain text or a function call, never both.
///
/// The wire format signals a function call by setting `content` to null and
/// attaching a `function_call` object; that ambiguity is resolved into this
/// tagged variant at the serde boundary so the rest of the crate never
/// inspects field presence.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    /// Plain text content.
    Text(String),

    /// A structured function call; `content` is null on the wire.
    FunctionCall(FunctionCall),
}

/// One persisted conversation message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// The role of the message.
    pub role: Role,

    /// The message payload.
    pub body: MessageBody,
}

impl Message {
    /// Create a new `Message`.
    pub fn new(role: Role, body: MessageBody) -> Self {
        Self { role, body }
    }

    /// Create a text message.
    pub fn text(role: Role, content: impl Into<String>) -> Self {
        Self::new(role, MessageBody::Text(content.into()))
    }

    /// Create a user text message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    /// Create a system text message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    /// Create a function-call message.
    pub fn function_call(role: Role, call: FunctionCall) -> Self {
        Self::new(role, MessageBody::FunctionCall(call))
    }

    /// The text content, if this is a text message.
    pub fn content(&self) -> Option<&str> {
        match &self.body {
            MessageBody::Text(text) => Some(text),
            MessageBody::FunctionCall(_) => None,
        }
    }

    /// The function call, if present.
    pub fn as_function_call(&self) -> Option<&FunctionCall> {
        match &self.body {
            MessageBody::Text(_) => None,
            MessageBody::FunctionCall(call) => Some(call),
        }
    }
}

// Wire form: {"role": ..., "content": "..."} for text, and
// {"role": ..., "content": null, "function_call": {...}} for calls.
#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a Role,
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<&'a FunctionCall>,
}

#[derive(Deserialize)]
struct WireMessageOwned {
    role: Role,
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    function_call: Option<FunctionCall>,
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match &self.body {
            MessageBody::Text(text) => WireMessage {
                role: &self.role,
                content: Some(text),
                function_call: None,
            },
            MessageBody::FunctionCall(call) => WireMessage {
                role: &self.role,
                content: None,
                function_call: Some(call),
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WireMessageOwned::deserialize(deserializer)?;
        let body = if let Some(call) = wire.function_call {
            MessageBody::FunctionCall(call)
        } else {
            match wire.content {
                Some(Value::String(text)) => MessageBody::Text(text),
                Some(Value::Null) | None => {
                    return Err(D::Error::custom(
                        "message has neither content nor function_call",
                    ));
                }
                // A non-string content is outside the expected shape but not
                // worth rejecting the whole record for.
                Some(other) => MessageBody::Text(other.to_string()),
            }
        };
        Ok(Message {
            role: wire.role,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_message_round_trip() {
        let msg = Message::user("hello");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hello"}"#);
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn function_call_serializes_null_content() {
        let msg = Message::function_call(
            Role::Assistant,
            FunctionCall::new("lookup", serde_json::json!({"q": 1})),
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["content"], Value::Null);
        assert_eq!(json["function_call"]["name"], "lookup");
        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn function_call_wins_over_content() {
        // Some providers emit both fields; function_call takes precedence.
        let json = r#"{"role":"assistant","content":"ignored","function_call":{"name":"f","arguments":{}}}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert!(msg.as_function_call().is_some());
        assert!(msg.content().is_none());
    }

    #[test]
    fn neither_field_is_rejected() {
        let json = r#"{"role":"assistant","content":null}"#;
        assert!(serde_json::from_str::<Message>(json).is_err());
    }

    #[test]
    fn unknown_role_preserved() {
        let msg: Message = serde_json::from_str(r#"{"role":"tool","content":"x"}"#).unwrap();
        assert_eq!(msg.role, Role::Other("tool".to_string()));
        assert_eq!(msg.role.to_string(), "tool");
    }
}
