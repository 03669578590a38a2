//! The closed set of supported API endpoints.
//!
//! Endpoint names map to an enum resolved once at startup; an unknown name
//! is an explicit error rather than a lookup failure deep in the call path.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// The APIs this client can drive.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum ApiKind {
    /// `chat/completions`: the conversational API, streamed by default.
    #[default]
    ChatCompletions,

    /// `models`: list available models.
    Models,

    /// `moderations`: classify an input.
    Moderations,

    /// `embeddings`: embed an input.
    Embeddings,

    /// `images/generations`: generate images from a prompt.
    ImagesGenerations,
}

impl ApiKind {
    /// The request path below the endpoint base.
    pub fn path(&self) -> &'static str {
        match self {
            ApiKind::ChatCompletions => "chat/completions",
            ApiKind::Models => "models",
            ApiKind::Moderations => "moderations",
            ApiKind::Embeddings => "embeddings",
            ApiKind::ImagesGenerations => "images/generations",
        }
    }
}

impl fmt::Display for ApiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

impl FromStr for ApiKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat/completions" => Ok(ApiKind::ChatCompletions),
            "models" => Ok(ApiKind::Models),
            "moderations" => Ok(ApiKind::Moderations),
            "embeddings" => Ok(ApiKind::Embeddings),
            "images/generations" => Ok(ApiKind::ImagesGenerations),
            _ => Err(Error::input(format!("API '{s}' is not available."))),
        }
    }
}
