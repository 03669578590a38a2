use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A function invocation requested by the model.
///
/// `arguments` is whatever JSON value the model produced. When streamed
/// arguments do not reassemble into valid JSON they are preserved as a raw
/// string rather than dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// The name of the function to call.
    pub name: String,

    /// The arguments to pass, as a JSON value.
    pub arguments: Value,
}

impl FunctionCall {
    /// Create a new `FunctionCall`.
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}
