use serde::Deserialize;

/// One parsed frame of a streamed chat response.
///
/// Frames arrive one per `data:` line; every field is optional because any
/// given frame may carry only a role, only a fragment, or only a terminal
/// reason.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatChunk {
    /// Per-frame choices; this client only ever requests one.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

impl ChatChunk {
    /// The first choice's delta, if any.
    pub fn delta(&self) -> Option<&Delta> {
        self.choices.first().and_then(|c| c.delta.as_ref())
    }

    /// The first choice's terminal reason, if any.
    pub fn finish_reason(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.finish_reason.as_deref())
            .filter(|r| !r.is_empty())
    }
}

/// One choice within a streamed frame.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    /// The incremental payload.
    #[serde(default)]
    pub delta: Option<Delta>,

    /// Set on the terminal frame: `stop`, `function_call`, or an error
    /// reason such as `content_filter`.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// The incremental payload of one frame.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Delta {
    /// Role, typically only on the first frame.
    #[serde(default)]
    pub role: Option<String>,

    /// A fragment of plain text content.
    #[serde(default)]
    pub content: Option<String>,

    /// A fragment of a function call.
    #[serde(default)]
    pub function_call: Option<DeltaFunctionCall>,
}

/// Incremental function-call data: the name arrives once, the arguments as a
/// sequence of string fragments.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeltaFunctionCall {
    /// Function name, present on the frame that opens the call.
    #[serde(default)]
    pub name: Option<String>,

    /// The next fragment of the JSON-encoded arguments.
    #[serde(default)]
    pub arguments: Option<String>,
}
