//! Command-line client for OpenAI-compatible chat APIs.
//!
//! # Usage
//!
//! ```bash
//! # One-shot prompt against the default model
//! osric explain monads in one sentence
//!
//! # Create a topic, then chat against it
//! osric @rustwork You are a terse Rust reviewer
//! osric --chat @rustwork review this lifetime error
//!
//! # Override request properties inline
//! osric +temperature=0.2 +stream=false what is up
//!
//! # Inspect the request without sending it
//! osric --dry-run +max_tokens=16 hello
//!
//! # Call an auxiliary API
//! osric --api models
//! ```

use arrrg::CommandLine;

use osric::app::{APP_NAME, App};
use osric::cli::Args;
use osric::config::Config;

const USAGE: &str = "osric [OPTIONS] [+property=value ...] [@TOPIC] [PROMPT ...]";

#[tokio::main]
async fn main() {
    let (args, free) = Args::from_command_line_relaxed(USAGE);
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{APP_NAME}: {err}");
            std::process::exit(err.exit_code());
        }
    };
    if let Some(provider) = &config.provider
        && std::env::var("SUPPRESS_PROVIDER_TIPS").as_deref() != Ok("1")
    {
        eprintln!("OpenAI compatible provider: {provider}");
    }
    let result = match App::new(config, args, free) {
        Ok(app) => app.run().await,
        Err(err) => Err(err),
    };
    if let Err(err) = result {
        eprintln!("{APP_NAME}: {err}");
        std::process::exit(err.exit_code());
    }
}
