use serde::Deserialize;
use serde_json::Value;

use crate::types::FunctionCall;

/// A buffered (non-streamed) chat completion response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    /// The returned choices; this client only ever requests one.
    #[serde(default)]
    pub choices: Vec<ResponseChoice>,

    /// Token usage for the request, when the provider reports it.
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatResponse {
    /// The first choice's message, if any.
    pub fn message(&self) -> Option<&ResponseMessage> {
        self.choices.first().map(|c| &c.message)
    }
}

/// One choice of a buffered response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseChoice {
    /// The complete assistant message.
    #[serde(default)]
    pub message: ResponseMessage,
}

/// The assistant message of a buffered response, before reconciliation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMessage {
    /// Role, `assistant` unless the provider says otherwise.
    #[serde(default)]
    pub role: Option<String>,

    /// Plain text content; null when a function call is present.
    #[serde(default)]
    pub content: Option<Value>,

    /// Function call requested by the model.
    #[serde(default)]
    pub function_call: Option<FunctionCall>,
}

/// Token usage accounting reported with buffered responses.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Usage {
    /// Total tokens consumed by the request and response.
    #[serde(default)]
    pub total_tokens: u64,
}
