//! The per-invocation orchestrator.
//!
//! One invocation is a single logical flow of control: resolve
//! configuration, split the free arguments into topic, properties, and
//! prompt, then drive one API call to completion. Streamed content goes to
//! stdout as it decodes; everything diagnostic goes to stderr.

use std::io::Write as _;

use serde_json::Value;

use crate::api::ApiKind;
use crate::cli::{self, Args};
use crate::client::OpenAi;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::observability::STORE_TOKEN_WARNINGS;
use crate::properties::PropertySet;
use crate::reconcile;
use crate::request::{self, ChatRequest, DEFAULT_TOPIC};
use crate::sse::{StreamDecoder, StreamSink};
use crate::store::ConversationStore;
use crate::types::Message;

/// Name used to prefix diagnostics.
pub const APP_NAME: &str = "osric";

/// Writes fragments to stdout as they decode and warnings to stderr.
struct ConsoleSink;

impl StreamSink for ConsoleSink {
    fn fragment(&mut self, fragment: &str) {
        print!("{fragment}");
        let _ = std::io::stdout().flush();
    }

    fn warning(&mut self, message: &str) {
        eprintln!("{APP_NAME}: Warning: {message}");
    }
}

/// One resolved invocation.
#[derive(Debug)]
pub struct App {
    config: Config,
    store: ConversationStore,
    args: Args,
    api: ApiKind,
    topic: String,
    props: PropertySet,
    prompt_words: String,
}

impl App {
    /// Resolves arguments and free tokens into an invocation.
    pub fn new(config: Config, args: Args, free: Vec<String>) -> Result<Self> {
        let api = match args.api.as_deref() {
            Some(name) => name.parse::<ApiKind>()?,
            None => ApiKind::default(),
        };
        let store = ConversationStore::new(config.data_dir.clone())?;
        let (topic, rest) = cli::split_topic(&free);
        let topic = topic.unwrap_or_else(|| DEFAULT_TOPIC.to_string());
        let (props, remainder) = PropertySet::parse(&rest);
        let prompt_words = PropertySet::join_remainder(&remainder);
        Ok(Self {
            config,
            store,
            args,
            api,
            topic,
            props,
            prompt_words,
        })
    }

    /// Runs the invocation to completion.
    pub async fn run(&self) -> Result<()> {
        if self.args.chat && self.topic == DEFAULT_TOPIC && !self.store.exists(DEFAULT_TOPIC) {
            return Err(Error::input(
                "Topic is required for chatting (--chat). Use @topic_name or create one first.",
            ));
        }

        if self.topic != DEFAULT_TOPIC && !self.store.exists(&self.topic) {
            return self.create_topic();
        }

        match self.api {
            ApiKind::ChatCompletions => self.chat_completions().await,
            ApiKind::Models => self.models().await,
            ApiKind::Moderations => self.moderations().await,
            ApiKind::Embeddings => self.embeddings().await,
            ApiKind::ImagesGenerations => self.images_generations().await,
        }
    }

    /// First prompt against an unknown topic: record it as the topic's
    /// system message instead of calling the API.
    fn create_topic(&self) -> Result<()> {
        if self.prompt_words.is_empty() {
            return Err(Error::input("Prompt for new topic is required"));
        }
        self.store
            .append(&self.topic, Message::system(self.prompt_words.as_str()))?;
        eprintln!(
            "Topic '{}' created with initial prompt '{}'",
            self.topic, self.prompt_words
        );
        Ok(())
    }

    fn resolve_prompt(&self) -> Result<String> {
        cli::resolve_prompt(&self.prompt_words, self.args.file.as_deref(), &mut |msg| {
            eprintln!("{msg}")
        })
    }

    fn print_dry_run(&self, payload: Option<&ChatRequest>) -> Result<()> {
        let url = format!("{}/{}", self.config.endpoint, self.api.path());
        eprintln!("Dry-run mode, no API calls made.");
        eprintln!("\nRequest URL:\n--------------\n{url}");
        eprintln!(
            "\nAuthorization:\n--------------\nBearer {}",
            self.config.masked_key()
        );
        eprintln!("\nPayload:\n--------------");
        match payload {
            Some(payload) => eprintln!("{}", payload.to_pretty()?),
            None => eprintln!("{{}}"),
        }
        Ok(())
    }

    /// Obtains a buffered response body: from the replay file, or from the
    /// live API (GET when there is no payload). Returns `None` when the
    /// invocation already completed (dry-run, or the body was dumped).
    async fn call_buffered(&self, payload: Option<&ChatRequest>) -> Result<Option<Value>> {
        if let Some(replay) = self.args.replay.as_deref() {
            let text = std::fs::read_to_string(replay)
                .map_err(|err| Error::io(format!("failed to read dumped file '{replay}'"), err))?;
            let value = serde_json::from_str(&text).map_err(|err| {
                Error::serialization(
                    format!("dumped file '{replay}' is not valid JSON: {err}"),
                    Some(Box::new(err)),
                )
            })?;
            return Ok(Some(value));
        }

        if self.args.dry_run {
            self.print_dry_run(payload)?;
            return Ok(None);
        }

        let client = OpenAi::new(&self.config)?;
        let raw = match payload {
            Some(payload) => {
                client
                    .send_raw(self.api.path(), &payload.to_value())
                    .await?
            }
            None => {
                let value = client.get(self.api.path()).await?;
                serde_json::to_string_pretty(&value)?
            }
        };

        if let Some(dump) = self.args.dump.as_deref() {
            std::fs::write(dump, &raw)
                .map_err(|err| Error::io(format!("failed to write dump file '{dump}'"), err))?;
            eprintln!("Response dumped to '{dump}'.");
            return Ok(None);
        }

        let value = serde_json::from_str(&raw).map_err(|err| {
            Error::serialization(format!("Failed to parse response: {err}"), Some(Box::new(err)))
        })?;
        Ok(Some(value))
    }

    async fn chat_completions(&self) -> Result<()> {
        // Replay substitutes for the network and never touches history.
        if self.args.replay.is_some() {
            if let Some(body) = self.call_buffered(None).await? {
                let message = reconcile::from_buffered(&body)?;
                print_message(&message)?;
            }
            return Ok(());
        }

        let prompt = self.resolve_prompt()?;
        let record = if self.topic != DEFAULT_TOPIC {
            Some(self.store.load(&self.topic)?)
        } else {
            None
        };
        let payload = request::build_chat_request(
            &self.config.model,
            &self.props,
            record.as_ref(),
            &self.topic,
            self.args.chat,
            &prompt,
        )?;

        if self.args.dry_run {
            return self.print_dry_run(Some(&payload));
        }

        let client = OpenAi::new(&self.config)?;
        let mut usage_tokens = None;
        let message = if payload.is_streaming() {
            if self.args.dump.is_some() {
                eprintln!(
                    "{APP_NAME}: Warning: Dumping response to file is not supported for \
                     streaming requests. Ignoring --dump."
                );
            }
            let stream = client.stream(self.api.path(), &payload.to_value()).await?;
            let mut sink = ConsoleSink;
            let message = StreamDecoder::new().decode(stream, &mut sink).await?;
            println!();
            message
        } else {
            let raw = client.send_raw(self.api.path(), &payload.to_value()).await?;
            if let Some(dump) = self.args.dump.as_deref() {
                std::fs::write(dump, &raw).map_err(|err| {
                    Error::io(format!("failed to write dump file '{dump}'"), err)
                })?;
                eprintln!("Response dumped to '{dump}'.");
                return Ok(());
            }
            let body: Value = serde_json::from_str(&raw).map_err(|err| {
                Error::serialization(
                    format!("Failed to parse response: {err}"),
                    Some(Box::new(err)),
                )
            })?;
            usage_tokens = body
                .get("usage")
                .and_then(|u| u.get("total_tokens"))
                .and_then(Value::as_u64);
            let message = reconcile::from_buffered(&body)?;
            print_message(&message)?;
            message
        };

        // One-shot prompts leave history untouched; only continued topics
        // grow their log.
        if self.args.chat {
            reconcile::persist_exchange(&self.store, &self.topic, &prompt, &message)?;
            if let Some(n) = usage_tokens {
                self.store.add_tokens(&self.topic, n)?;
                if let Err(err) = self.store.bump_global_tokens(n) {
                    STORE_TOKEN_WARNINGS.click();
                    eprintln!(
                        "{APP_NAME}: Warning: Failed to update global token file: {err}"
                    );
                }
            }
        }
        Ok(())
    }

    async fn models(&self) -> Result<()> {
        if let Some(body) = self.call_buffered(None).await? {
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Ok(())
    }

    async fn moderations(&self) -> Result<()> {
        let prompt = self.resolve_prompt()?;
        let payload = request::build_simple_request(
            &[
                ("model", Value::String("text-moderation-latest".to_string())),
                ("input", Value::String(prompt)),
            ],
            &self.props,
            &[],
        );
        if let Some(body) = self.call_buffered(Some(&payload)).await? {
            match body.get("results").and_then(Value::as_array) {
                Some(results) => {
                    for result in results {
                        println!("{}", serde_json::to_string(result)?);
                    }
                }
                None => println!("{}", serde_json::to_string_pretty(&body)?),
            }
        }
        Ok(())
    }

    async fn embeddings(&self) -> Result<()> {
        let prompt = self.resolve_prompt()?;
        let payload = request::build_simple_request(
            &[
                ("model", Value::String("text-embedding-ada-002".to_string())),
                ("input", Value::String(prompt)),
            ],
            &self.props,
            &[],
        );
        if let Some(body) = self.call_buffered(Some(&payload)).await? {
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Ok(())
    }

    async fn images_generations(&self) -> Result<()> {
        let prompt = self.resolve_prompt()?;
        let payload = request::build_simple_request(
            &[
                ("n", Value::Number(1.into())),
                ("size", Value::String("1024x1024".to_string())),
                ("response_format", Value::String("url".to_string())),
                ("prompt", Value::String(prompt)),
            ],
            &self.props,
            // The URL format is forced so the output stays line-oriented.
            &["response_format"],
        );
        if let Some(body) = self.call_buffered(Some(&payload)).await? {
            match body.get("data").and_then(Value::as_array) {
                Some(items) => {
                    for item in items {
                        println!("{}", item.get("url").and_then(Value::as_str).unwrap_or(""));
                    }
                }
                None => println!("{}", serde_json::to_string_pretty(&body)?),
            }
        }
        Ok(())
    }
}

/// Prints a reconciled message the way the original response would read:
/// plain content verbatim, function calls as pretty JSON.
fn print_message(message: &Message) -> Result<()> {
    match message.as_function_call() {
        Some(call) => println!("{}", serde_json::to_string_pretty(call)?),
        None => println!("{}", message.content().unwrap_or("")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(tag: &str) -> Config {
        let dir = std::env::temp_dir().join(format!("osric-app-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        Config {
            endpoint: "https://api.example.com/v1".to_string(),
            api_key: "sk-test".to_string(),
            model: "gpt-4o".to_string(),
            data_dir: dir,
            provider: None,
        }
    }

    fn free(words: &[&str]) -> Vec<String> {
        words.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn new_topic_is_created_without_an_api_call() {
        let config = test_config("create");
        let data_dir = config.data_dir.clone();
        let app = App::new(
            config,
            Args::default(),
            free(&["@project", "You", "are", "terse"]),
        )
        .unwrap();
        app.run().await.unwrap();

        let store = ConversationStore::new(data_dir).unwrap();
        let record = store.load("project").unwrap();
        assert_eq!(record.messages.len(), 1);
        assert_eq!(record.messages[0], Message::system("You are terse"));
    }

    #[tokio::test]
    async fn new_topic_without_prompt_is_an_error() {
        let app = App::new(test_config("create-empty"), Args::default(), free(&["@p"])).unwrap();
        let err = app.run().await.unwrap_err();
        assert!(matches!(err, Error::Input { .. }));
    }

    #[tokio::test]
    async fn chat_against_missing_default_topic_is_an_error() {
        let args = Args {
            chat: true,
            ..Args::default()
        };
        let app = App::new(test_config("chat-default"), args, free(&["hello"])).unwrap();
        let err = app.run().await.unwrap_err();
        assert!(matches!(err, Error::Input { .. }));
        assert!(err.to_string().contains("Topic is required"));
    }

    #[tokio::test]
    async fn dry_run_makes_no_network_call_and_no_mutation() {
        let config = test_config("dry-run");
        let data_dir = config.data_dir.clone();
        let args = Args {
            dry_run: true,
            ..Args::default()
        };
        let app = App::new(config, args, free(&["ping"])).unwrap();
        // The endpoint is unreachable; dry-run must still succeed.
        app.run().await.unwrap();

        let store = ConversationStore::new(data_dir).unwrap();
        assert!(!store.exists(DEFAULT_TOPIC));
    }

    #[tokio::test]
    async fn replay_prints_without_touching_history() {
        let config = test_config("replay");
        let data_dir = config.data_dir.clone();
        let replay_path = data_dir.join("dumped.json");
        std::fs::create_dir_all(&data_dir).unwrap();
        std::fs::write(
            &replay_path,
            r#"{"choices":[{"message":{"role":"assistant","content":"recorded"}}]}"#,
        )
        .unwrap();
        let args = Args {
            chat: false,
            replay: Some(replay_path.to_str().unwrap().to_string()),
            ..Args::default()
        };
        let app = App::new(config, args, free(&[])).unwrap();
        app.run().await.unwrap();

        let store = ConversationStore::new(data_dir).unwrap();
        assert!(!store.exists(DEFAULT_TOPIC));
    }

    #[tokio::test]
    async fn unknown_api_name_is_rejected_at_startup() {
        let args = Args {
            api: Some("audio/speech".to_string()),
            ..Args::default()
        };
        let err = App::new(test_config("bad-api"), args, free(&[])).unwrap_err();
        assert!(err.to_string().contains("not available"));
    }

    #[test]
    fn free_argument_resolution() {
        let app = App::new(
            test_config("resolution"),
            Args::default(),
            free(&["+temperature=0.2", "@notes", "+stream=false", "what", "is", "up"]),
        )
        .unwrap();
        assert_eq!(app.topic, "notes");
        assert_eq!(app.props.len(), 2);
        assert_eq!(app.prompt_words, "what is up");
    }
}
