//! Outbound request payload assembly.
//!
//! A payload starts from built-in defaults, takes every property override on
//! top (last write wins), and then gets the `messages` array: replayed topic
//! history, when any, followed by the new user message.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::properties::PropertySet;
use crate::store::ConversationRecord;
use crate::types::Message;

/// The default, stateless topic. Prompts against it never replay history.
pub const DEFAULT_TOPIC: &str = "General";

/// A fully-formed request payload.
///
/// Internally a JSON object so that property overrides of any shape pass
/// through unharmed; accessors cover the keys this client itself cares
/// about.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChatRequest(Map<String, Value>);

impl ChatRequest {
    /// Whether the request asks for a streamed response.
    ///
    /// Defaults to true; a non-boolean `stream` override is ignored.
    pub fn is_streaming(&self) -> bool {
        self.0.get("stream").and_then(Value::as_bool).unwrap_or(true)
    }

    /// The payload as a JSON value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Pretty-printed payload for dry-run diagnostics.
    pub fn to_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.0)?)
    }

    /// Looks up a payload key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// Builds the chat completion payload.
///
/// History replay: when `topic` is not the default topic and a record exists,
/// chat mode replays the entire stored sequence while one-shot mode replays
/// only the first stored message (the system prompt). The new user message is
/// always appended last.
pub fn build_chat_request(
    model: &str,
    props: &PropertySet,
    record: Option<&ConversationRecord>,
    topic: &str,
    chat_mode: bool,
    prompt: &str,
) -> Result<ChatRequest> {
    let mut payload = Map::new();
    payload.insert("model".to_string(), Value::String(model.to_string()));
    payload.insert("stream".to_string(), Value::Bool(true));
    for (key, value) in props.iter() {
        payload.insert(key.clone(), value.clone());
    }

    let mut messages = Vec::new();
    if topic != DEFAULT_TOPIC && let Some(record) = record {
        if chat_mode {
            for message in &record.messages {
                messages.push(serde_json::to_value(message)?);
            }
        } else if let Some(first) = record.messages.first() {
            messages.push(serde_json::to_value(first)?);
        }
    }
    messages.push(serde_json::to_value(Message::user(prompt))?);
    payload.insert("messages".to_string(), Value::Array(messages));

    Ok(ChatRequest(payload))
}

/// Builds a single-input payload for the auxiliary APIs (moderations,
/// embeddings, images). `defaults` seeds the object, overrides land on top,
/// and `protected` keys cannot be overridden.
pub fn build_simple_request(
    defaults: &[(&str, Value)],
    props: &PropertySet,
    protected: &[&str],
) -> ChatRequest {
    let mut payload = Map::new();
    for (key, value) in defaults {
        payload.insert((*key).to_string(), value.clone());
    }
    for (key, value) in props.iter() {
        if protected.iter().any(|p| p.eq_ignore_ascii_case(key)) {
            continue;
        }
        payload.insert(key.clone(), value.clone());
    }
    ChatRequest(payload)
}
