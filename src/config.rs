//! Environment-derived configuration.
//!
//! All settings are read once at startup into an immutable [`Config`] that is
//! passed explicitly to the components that need it; nothing reads the
//! environment after this point.

use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Default API endpoint when the provider does not override it.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Resolved configuration for one invocation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the API, without a trailing slash.
    pub endpoint: String,

    /// Bearer token sent with every request.
    pub api_key: String,

    /// Model identifier used as the payload default.
    pub model: String,

    /// Directory holding conversation files and the global token counter.
    pub data_dir: PathBuf,

    /// Provider name when `OPENAI_COMPATIBLE_PROVIDER` selects a non-default
    /// environment prefix.
    pub provider: Option<String>,
}

impl Config {
    /// Loads configuration from the environment.
    ///
    /// `OPENAI_COMPATIBLE_PROVIDER` selects the prefix for the
    /// `<PREFIX>_API_ENDPOINT`, `<PREFIX>_API_KEY`, and `<PREFIX>_API_MODEL`
    /// variables; the prefix defaults to `OPENAI`. The data directory comes
    /// from `OPENAI_DATA_DIR`, then `XDG_CONFIG_HOME`, then `~/.openai`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` when the API key is missing; this is
    /// fatal before any request is attempted.
    pub fn from_env() -> Result<Self> {
        let provider = env::var("OPENAI_COMPATIBLE_PROVIDER")
            .ok()
            .filter(|s| !s.is_empty());
        let prefix = provider.as_deref().unwrap_or("OPENAI");

        let endpoint = env::var(format!("{prefix}_API_ENDPOINT"))
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let endpoint = endpoint.trim_end_matches('/').to_string();

        let api_key = env::var(format!("{prefix}_API_KEY"))
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                Error::configuration(format!("Missing environment variable: {prefix}_API_KEY."))
            })?;

        let model = env::var(format!("{prefix}_API_MODEL"))
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let data_dir = Self::data_dir_from_env()?;

        Ok(Config {
            endpoint,
            api_key,
            model,
            data_dir,
            provider,
        })
    }

    fn data_dir_from_env() -> Result<PathBuf> {
        if let Some(dir) = env::var_os("OPENAI_DATA_DIR").filter(|s| !s.is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        if let Some(dir) = env::var_os("XDG_CONFIG_HOME").filter(|s| !s.is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        let home = env::var_os("HOME").filter(|s| !s.is_empty()).ok_or_else(|| {
            Error::configuration("Cannot locate a data directory: HOME is not set.")
        })?;
        Ok(PathBuf::from(home).join(".openai"))
    }

    /// The bearer token with everything past the first three characters
    /// masked, for dry-run diagnostics.
    pub fn masked_key(&self) -> String {
        let visible: String = self.api_key.chars().take(3).collect();
        format!("{visible}****")
    }
}
