//! Deciding what to persist after a response completes.
//!
//! A finished stream and a buffered response both reduce to one [`Message`];
//! a function call wins over plain content when both are present. When the
//! exchange is persisted, the user's prompt goes in first and the assistant
//! message second, preserving causal order in the log no matter how the
//! response was obtained.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::store::ConversationStore;
use crate::types::{ChatResponse, FunctionCall, Message, MessageBody, Role};

/// Interprets a buffered response body as the message to persist.
///
/// The decision order mirrors stream finalization: a `function_call` on the
/// message takes precedence, otherwise the content string is the body.
/// Function arguments conventionally arrive as a JSON-encoded string and are
/// parsed when possible, kept raw otherwise.
pub fn from_buffered(body: &Value) -> Result<Message> {
    let response: ChatResponse = serde_json::from_value(body.clone()).map_err(|err| {
        Error::serialization(
            format!("response is not a chat completion: {err}"),
            Some(Box::new(err)),
        )
    })?;
    let message = response
        .message()
        .ok_or_else(|| Error::api(None, "response carried no choices"))?;
    let role = message
        .role
        .as_deref()
        .map(Role::from)
        .unwrap_or(Role::Assistant);
    let body = if let Some(call) = &message.function_call {
        MessageBody::FunctionCall(FunctionCall::new(
            call.name.clone(),
            parse_string_arguments(&call.arguments),
        ))
    } else {
        match &message.content {
            Some(Value::String(text)) => MessageBody::Text(text.clone()),
            Some(Value::Null) | None => MessageBody::Text(String::new()),
            Some(other) => MessageBody::Text(other.to_string()),
        }
    };
    Ok(Message::new(role, body))
}

/// Buffered responses encode arguments as a string of JSON; streams already
/// produce a value. Parse the string form when it holds valid JSON.
fn parse_string_arguments(arguments: &Value) -> Value {
    match arguments {
        Value::String(raw) => serde_json::from_str(raw)
            .unwrap_or_else(|_| Value::String(raw.clone())),
        other => other.clone(),
    }
}

/// Appends the user prompt and the assistant response to the topic, in that
/// order.
///
/// Callers skip this entirely in dry-run mode, in replay mode, and outside
/// chat mode; partial streaming output never reaches here.
pub fn persist_exchange(
    store: &ConversationStore,
    topic: &str,
    prompt: &str,
    response: &Message,
) -> Result<()> {
    store.append(topic, Message::user(prompt))?;
    store.append(topic, response.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn buffered_text_becomes_text_message() {
        let body = json!({
            "choices": [{"message": {"role": "assistant", "content": "hello"}}]
        });
        let message = from_buffered(&body).unwrap();
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content(), Some("hello"));
    }

    #[test]
    fn buffered_function_call_wins_over_content() {
        let body = json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "function_call": {"name": "f", "arguments": "{\"x\": 1}"}
            }}]
        });
        let message = from_buffered(&body).unwrap();
        let call = message.as_function_call().unwrap();
        assert_eq!(call.name, "f");
        assert_eq!(call.arguments, json!({"x": 1}));
    }

    #[test]
    fn unparseable_string_arguments_stay_raw() {
        let body = json!({
            "choices": [{"message": {
                "function_call": {"name": "f", "arguments": "oops"}
            }}]
        });
        let message = from_buffered(&body).unwrap();
        let call = message.as_function_call().unwrap();
        assert_eq!(call.arguments, json!("oops"));
    }

    #[test]
    fn empty_choices_is_an_api_error() {
        let body = json!({"choices": []});
        assert!(from_buffered(&body).unwrap_err().is_api());
    }

    #[test]
    fn exchange_appends_user_then_assistant() {
        let dir = std::env::temp_dir().join(format!("osric-reconcile-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let store = ConversationStore::new(dir).unwrap();
        let response = Message::text(Role::Assistant, "pong");
        persist_exchange(&store, "t", "ping", &response).unwrap();

        let record = store.load("t").unwrap();
        assert_eq!(record.messages.len(), 2);
        assert_eq!(record.messages[0], Message::user("ping"));
        assert_eq!(record.messages[1], response);
    }
}
