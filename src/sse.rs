//! Incremental decoding of streamed chat responses.
//!
//! The response body is a line-oriented event stream: each `data:` line
//! carries one JSON frame, blank lines separate frames, and `[DONE]` marks
//! the end. The decoder reconstructs either plain text or a function call
//! from the frames while forwarding every fragment to a [`StreamSink`] the
//! moment it is decoded, so output appears as it arrives.
//!
//! The decoder is deliberately tolerant of isolated corrupt frames: a line
//! that does not parse is reported as a warning and skipped, and decoding
//! continues with the next frame.

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};

use crate::error::{Error, Result};
use crate::observability::{STREAM_FRAGMENTS, STREAM_FRAMES, STREAM_MALFORMED_FRAMES};
use crate::types::{ChatChunk, FunctionCall, Message, MessageBody, Role};

/// End-of-stream sentinel line.
const DONE_SENTINEL: &str = "[DONE]";

/// Receives decoder output as it is produced.
///
/// Fragments are emitted in arrival order, one per frame, with no buffering
/// beyond the frame itself; warnings go to the diagnostic channel and never
/// interleave with fragments on the primary one.
pub trait StreamSink {
    /// One incremental fragment of content or function-call arguments.
    fn fragment(&mut self, fragment: &str);

    /// A non-fatal decoding problem.
    fn warning(&mut self, message: &str);
}

/// What the decoder is accumulating.
///
/// The variant is decided by the first meaningful frame and transitions at
/// most once: once a function-call name is latched, every later fragment is
/// a function-argument fragment, even if a frame omits the function-call
/// field. The provider protocol never mixes plain content and function calls
/// within one response, and the decoder makes that irreversibility explicit.
#[derive(Debug, Clone, PartialEq)]
enum Accumulating {
    /// No content-bearing frame seen yet.
    Pending,

    /// Plain text content.
    Text(String),

    /// A function call: latched name plus the argument fragments so far.
    FunctionCall { name: String, arguments: String },
}

/// Reconstructs one streamed response from its frames.
#[derive(Debug)]
pub struct StreamDecoder {
    role: Role,
    state: Accumulating,
    terminated: bool,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDecoder {
    /// Creates a decoder awaiting its first frame.
    pub fn new() -> Self {
        Self {
            role: Role::Assistant,
            state: Accumulating::Pending,
            terminated: false,
        }
    }

    /// Drives the decoder over a byte stream until the terminal frame or
    /// end of stream, then finalizes.
    pub async fn decode<S, K>(mut self, mut stream: S, sink: &mut K) -> Result<Message>
    where
        S: Stream<Item = Result<Bytes>> + Unpin,
        K: StreamSink + ?Sized,
    {
        let mut buffer: Vec<u8> = Vec::new();
        'read: while let Some(bytes) = stream.next().await {
            buffer.extend_from_slice(&bytes?);
            while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                if self.feed_raw(&line, sink)? {
                    break 'read;
                }
            }
        }
        if !self.terminated && !buffer.is_empty() {
            self.feed_raw(&buffer, sink)?;
        }
        self.finish(sink)
    }

    fn feed_raw<K>(&mut self, line: &[u8], sink: &mut K) -> Result<bool>
    where
        K: StreamSink + ?Sized,
    {
        match std::str::from_utf8(line) {
            Ok(text) => self.feed_line(text, sink),
            Err(_) => {
                STREAM_MALFORMED_FRAMES.click();
                sink.warning("skipping stream frame with invalid UTF-8");
                Ok(false)
            }
        }
    }

    /// Processes one line of the stream. Returns true when the stream has
    /// reached its terminal frame.
    pub fn feed_line<K>(&mut self, line: &str, sink: &mut K) -> Result<bool>
    where
        K: StreamSink + ?Sized,
    {
        let line = line.trim_end_matches(['\r', '\n']);
        let line = line.strip_prefix("data:").map(str::trim_start).unwrap_or(line);
        if line.trim().is_empty() || line == DONE_SENTINEL {
            return Ok(false);
        }

        let chunk: ChatChunk = match serde_json::from_str(line) {
            Ok(chunk) => chunk,
            Err(err) => {
                STREAM_MALFORMED_FRAMES.click();
                sink.warning(&format!(
                    "failed to parse stream frame: {err} - line: '{line}'"
                ));
                return Ok(false);
            }
        };
        STREAM_FRAMES.click();

        if let Some(delta) = chunk.delta() {
            // Latest role wins; the protocol should not change it, but the
            // decoder does not validate.
            if let Some(role) = delta.role.as_deref() {
                self.role = Role::from(role);
            }

            if let Some(name) = delta.function_call.as_ref().and_then(|fc| fc.name.as_deref())
                && !matches!(self.state, Accumulating::FunctionCall { .. })
            {
                self.state = Accumulating::FunctionCall {
                    name: name.to_string(),
                    arguments: String::new(),
                };
            }

            match &mut self.state {
                Accumulating::FunctionCall { arguments, .. } => {
                    let fragment = delta
                        .function_call
                        .as_ref()
                        .and_then(|fc| fc.arguments.as_deref());
                    if let Some(fragment) = fragment {
                        arguments.push_str(fragment);
                        STREAM_FRAGMENTS.click();
                        sink.fragment(fragment);
                    }
                }
                state => {
                    if let Some(fragment) = delta.content.as_deref() {
                        if let Accumulating::Text(text) = state {
                            text.push_str(fragment);
                        } else {
                            *state = Accumulating::Text(fragment.to_string());
                        }
                        STREAM_FRAGMENTS.click();
                        sink.fragment(fragment);
                    }
                }
            }
        }

        match chunk.finish_reason() {
            Some("stop") | Some("function_call") => {
                self.terminated = true;
                Ok(true)
            }
            Some(reason) => Err(Error::api(None, reason.to_string())),
            None => Ok(false),
        }
    }

    /// Finalizes the accumulated state into a message.
    ///
    /// Function arguments that fail to parse as JSON are preserved as a raw
    /// string with a warning rather than failing the whole response.
    pub fn finish<K>(self, sink: &mut K) -> Result<Message>
    where
        K: StreamSink + ?Sized,
    {
        let body = match self.state {
            Accumulating::Pending => MessageBody::Text(String::new()),
            Accumulating::Text(text) => MessageBody::Text(text),
            Accumulating::FunctionCall { name, arguments } => {
                let value = match serde_json::from_str(&arguments) {
                    Ok(value) => value,
                    Err(_) => {
                        sink.warning("function call arguments were not valid JSON");
                        serde_json::Value::String(arguments)
                    }
                };
                MessageBody::FunctionCall(FunctionCall::new(name, value))
            }
        };
        Ok(Message::new(self.role, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    /// Records fragments and warnings for assertions.
    #[derive(Debug, Default)]
    struct RecordingSink {
        fragments: Vec<String>,
        warnings: Vec<String>,
    }

    impl StreamSink for RecordingSink {
        fn fragment(&mut self, fragment: &str) {
            self.fragments.push(fragment.to_string());
        }

        fn warning(&mut self, message: &str) {
            self.warnings.push(message.to_string());
        }
    }

    fn byte_stream(chunks: &[&str]) -> impl Stream<Item = Result<Bytes>> + Unpin {
        let owned: Vec<Result<Bytes>> = chunks
            .iter()
            .map(|c| Ok(Bytes::from(c.to_string())))
            .collect();
        stream::iter(owned)
    }

    async fn decode(chunks: &[&str]) -> (Result<Message>, RecordingSink) {
        let mut sink = RecordingSink::default();
        let result = StreamDecoder::new()
            .decode(byte_stream(chunks), &mut sink)
            .await;
        (result, sink)
    }

    #[tokio::test]
    async fn plain_content_stream() {
        let (result, sink) = decode(&[
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"Hel\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n",
            "data: [DONE]\n",
        ])
        .await;
        let message = result.unwrap();
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content(), Some("Hello"));
        assert_eq!(sink.fragments, vec!["Hel", "lo"]);
        assert!(sink.warnings.is_empty());
    }

    #[tokio::test]
    async fn frames_split_across_chunks() {
        let (result, sink) = decode(&[
            "data: {\"choices\":[{\"delta\":{\"cont",
            "ent\":\"one\"}}]}\ndata: {\"choices\":[{\"delta\":{\"content\":\" two\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n",
        ])
        .await;
        assert_eq!(result.unwrap().content(), Some("one two"));
        assert_eq!(sink.fragments, vec!["one", " two"]);
    }

    #[tokio::test]
    async fn function_call_accumulation() {
        let (result, sink) = decode(&[
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"function_call\":{\"name\":\"foo\",\"arguments\":\"\"}}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"function_call\":{\"arguments\":\"{\\\"x\\\":\"}}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"function_call\":{\"arguments\":\"1}\"}}}]}\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"function_call\"}]}\n",
        ])
        .await;
        let message = result.unwrap();
        let call = message.as_function_call().unwrap();
        assert_eq!(call.name, "foo");
        assert_eq!(call.arguments, serde_json::json!({"x": 1}));
        assert_eq!(sink.fragments, vec!["", "{\"x\":", "1}"]);
        assert!(sink.warnings.is_empty());
    }

    #[tokio::test]
    async fn function_call_mode_never_reverts() {
        // A later frame that omits the function_call field but carries
        // content must not flip the decoder back to content mode.
        let (result, _sink) = decode(&[
            "data: {\"choices\":[{\"delta\":{\"function_call\":{\"name\":\"f\"}}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"stray\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"function_call\":{\"arguments\":\"{}\"}}}]}\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"function_call\"}]}\n",
        ])
        .await;
        let message = result.unwrap();
        let call = message.as_function_call().unwrap();
        assert_eq!(call.name, "f");
        assert_eq!(call.arguments, serde_json::json!({}));
    }

    #[tokio::test]
    async fn malformed_frame_is_skipped_with_warning() {
        let (result, sink) = decode(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n",
            "data: this is not json\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n",
        ])
        .await;
        assert_eq!(result.unwrap().content(), Some("ab"));
        assert_eq!(sink.fragments, vec!["a", "b"]);
        assert_eq!(sink.warnings.len(), 1);
        assert!(sink.warnings[0].contains("failed to parse stream frame"));
    }

    #[tokio::test]
    async fn unexpected_finish_reason_is_fatal() {
        let (result, _sink) = decode(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"content_filter\"}]}\n",
        ])
        .await;
        let err = result.unwrap_err();
        assert!(err.is_api());
        assert!(err.to_string().contains("content_filter"));
    }

    #[tokio::test]
    async fn non_json_arguments_preserved_as_raw_string() {
        let (result, sink) = decode(&[
            "data: {\"choices\":[{\"delta\":{\"function_call\":{\"name\":\"f\",\"arguments\":\"not json\"}}}]}\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"function_call\"}]}\n",
        ])
        .await;
        let message = result.unwrap();
        let call = message.as_function_call().unwrap();
        assert_eq!(call.arguments, serde_json::Value::String("not json".to_string()));
        assert_eq!(sink.warnings.len(), 1);
        assert!(sink.warnings[0].contains("not valid JSON"));
    }

    #[tokio::test]
    async fn stream_ending_without_terminal_frame_finalizes() {
        let (result, sink) = decode(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n",
        ])
        .await;
        assert_eq!(result.unwrap().content(), Some("partial"));
        assert_eq!(sink.fragments, vec!["partial"]);
    }

    #[tokio::test]
    async fn trailing_line_without_newline_is_processed() {
        let (result, _sink) = decode(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}",
        ])
        .await;
        assert_eq!(result.unwrap().content(), Some("tail"));
    }

    #[tokio::test]
    async fn role_latest_value_wins() {
        let (result, _sink) = decode(&[
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"a\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"role\":\"narrator\",\"content\":\"b\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n",
        ])
        .await;
        assert_eq!(result.unwrap().role, Role::Other("narrator".to_string()));
    }

    #[tokio::test]
    async fn frames_after_terminal_are_ignored() {
        let (result, sink) = decode(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"done\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n",
        ])
        .await;
        assert_eq!(result.unwrap().content(), Some("done"));
        assert_eq!(sink.fragments, vec!["done"]);
    }
}
