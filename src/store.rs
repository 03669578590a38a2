//! Topic-scoped conversation persistence.
//!
//! Each topic maps to one pretty-printed JSON file under the data directory.
//! Every mutation loads the record, changes it in memory, and rewrites the
//! whole file through a temp-file rename, so readers always observe the last
//! committed state. One invocation owns a topic's file exclusively; there is
//! no lock and concurrent invocations against the same topic are unsupported.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{from_reader, to_writer_pretty};

use crate::error::{Error, Result};
use crate::types::Message;

/// Filename of the process-wide cumulative token counter.
const GLOBAL_TOKENS_FILE: &str = "total_tokens";

/// The persisted state of one topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Messages in strict chronological append order.
    #[serde(default)]
    pub messages: Vec<Message>,

    /// Running token counter, monotonically non-decreasing.
    #[serde(default)]
    pub total_tokens: u64,
}

/// File-backed store for conversation records.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    data_dir: PathBuf,
}

impl ConversationStore {
    /// Creates a store rooted at `data_dir`, creating the directory if
    /// needed.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).map_err(|err| {
            Error::io(
                format!("failed to create data directory '{}'", data_dir.display()),
                err,
            )
        })?;
        Ok(Self { data_dir })
    }

    /// Path of the conversation file for `topic`.
    pub fn path_for(&self, topic: &str) -> PathBuf {
        self.data_dir.join(format!("{topic}.json"))
    }

    /// Whether `topic` has a backing record.
    pub fn exists(&self, topic: &str) -> bool {
        self.path_for(topic).exists()
    }

    /// Loads the record for `topic`, or an empty one if no file exists.
    ///
    /// # Errors
    ///
    /// Returns `Error::StorageCorrupt` when the file exists but does not
    /// parse as a conversation record. Corruption is fatal and never
    /// silently repaired.
    pub fn load(&self, topic: &str) -> Result<ConversationRecord> {
        let path = self.path_for(topic);
        if !path.exists() {
            return Ok(ConversationRecord::default());
        }
        let file = File::open(&path)
            .map_err(|err| Error::io(format!("failed to open '{}'", path.display()), err))?;
        let reader = BufReader::new(file);
        from_reader(reader).map_err(|err| {
            Error::storage_corrupt(
                format!("'{}' is not a conversation record: {err}", path.display()),
                Some(Box::new(err)),
            )
        })
    }

    /// Appends one message to `topic`, creating the record on first write.
    ///
    /// This is the only mutation path for messages; the whole file is
    /// rewritten. Write failures are fatal.
    pub fn append(&self, topic: &str, message: Message) -> Result<()> {
        let mut record = self.load(topic)?;
        record.messages.push(message);
        crate::observability::STORE_APPENDS.click();
        self.write(topic, &record)
    }

    /// Adds `n` tokens to the topic's running counter.
    ///
    /// A topic with no backing record is left untouched; that is a no-op,
    /// not an error.
    pub fn add_tokens(&self, topic: &str, n: u64) -> Result<()> {
        if !self.exists(topic) {
            return Ok(());
        }
        let mut record = self.load(topic)?;
        record.total_tokens += n;
        self.write(topic, &record)
    }

    /// Adds `n` tokens to the global counter file.
    ///
    /// Best-effort: the caller is expected to log a warning on failure and
    /// carry on, never to abort the invocation.
    pub fn bump_global_tokens(&self, n: u64) -> Result<u64> {
        let path = self.data_dir.join(GLOBAL_TOKENS_FILE);
        let current = match fs::read_to_string(&path) {
            Ok(text) => text.trim().parse::<u64>().unwrap_or(0),
            Err(_) => 0,
        };
        let total = current + n;
        write_atomically(&path, total.to_string().as_bytes())?;
        Ok(total)
    }

    fn write(&self, topic: &str, record: &ConversationRecord) -> Result<()> {
        let path = self.path_for(topic);
        let tmp = path.with_extension("json.tmp");
        {
            let file = File::create(&tmp).map_err(|err| {
                Error::io(format!("failed to create '{}'", tmp.display()), err)
            })?;
            let mut writer = BufWriter::new(file);
            to_writer_pretty(&mut writer, record).map_err(|err| {
                Error::serialization(
                    format!("failed to serialize conversation '{topic}'"),
                    Some(Box::new(err)),
                )
            })?;
            writer
                .flush()
                .map_err(|err| Error::io(format!("failed to write '{}'", tmp.display()), err))?;
        }
        fs::rename(&tmp, &path)
            .map_err(|err| Error::io(format!("failed to replace '{}'", path.display()), err))
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)
        .map_err(|err| Error::io(format!("failed to write '{}'", tmp.display()), err))?;
    fs::rename(&tmp, path)
        .map_err(|err| Error::io(format!("failed to replace '{}'", path.display()), err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FunctionCall, MessageBody, Role};

    fn temp_store(tag: &str) -> ConversationStore {
        let dir = std::env::temp_dir().join(format!(
            "osric-store-{tag}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        ConversationStore::new(dir).unwrap()
    }

    #[test]
    fn load_missing_topic_is_empty() {
        let store = temp_store("missing");
        let record = store.load("nothing").unwrap();
        assert!(record.messages.is_empty());
        assert_eq!(record.total_tokens, 0);
        assert!(!store.exists("nothing"));
    }

    #[test]
    fn append_round_trip_preserves_order() {
        let store = temp_store("round-trip");
        store.append("t", Message::system("be brief")).unwrap();
        store.append("t", Message::user("hi")).unwrap();
        store
            .append(
                "t",
                Message::function_call(
                    Role::Assistant,
                    FunctionCall::new("f", serde_json::json!({"x": 1})),
                ),
            )
            .unwrap();

        let record = store.load("t").unwrap();
        assert_eq!(record.messages.len(), 3);
        assert_eq!(record.messages[0], Message::system("be brief"));
        assert_eq!(record.messages[1], Message::user("hi"));
        assert_eq!(
            record.messages[2].body,
            MessageBody::FunctionCall(FunctionCall::new("f", serde_json::json!({"x": 1})))
        );

        // Idempotent load after no further writes.
        assert_eq!(store.load("t").unwrap(), record);
    }

    #[test]
    fn corrupt_file_is_fatal() {
        let store = temp_store("corrupt");
        fs::write(store.path_for("bad"), b"{\"messages\": 42}").unwrap();
        let err = store.load("bad").unwrap_err();
        assert!(err.is_storage_corrupt());
    }

    #[test]
    fn add_tokens_without_record_is_noop() {
        let store = temp_store("tokens-noop");
        store.add_tokens("ghost", 100).unwrap();
        assert!(!store.exists("ghost"));
    }

    #[test]
    fn add_tokens_accumulates() {
        let store = temp_store("tokens");
        store.append("t", Message::system("s")).unwrap();
        store.add_tokens("t", 7).unwrap();
        store.add_tokens("t", 5).unwrap();
        assert_eq!(store.load("t").unwrap().total_tokens, 12);
    }

    #[test]
    fn global_counter_accumulates() {
        let store = temp_store("global");
        assert_eq!(store.bump_global_tokens(10).unwrap(), 10);
        assert_eq!(store.bump_global_tokens(3).unwrap(), 13);
    }

    #[test]
    fn persisted_form_is_the_wire_shape() {
        let store = temp_store("shape");
        store.append("t", Message::user("ping")).unwrap();
        let text = fs::read_to_string(store.path_for("t")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "ping");
        assert_eq!(value["total_tokens"], 0);
        // Pretty-printed, human-readable.
        assert!(text.contains('\n'));
    }
}
