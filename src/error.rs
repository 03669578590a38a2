//! Error types for osric.
//!
//! One crate-wide error enum covers everything from missing configuration to
//! mid-stream API failures. Warnings (malformed stream frames, global token
//! counter write failures) are deliberately not errors; they go to the
//! diagnostic channel and never change the outcome of an invocation.

use std::error;
use std::fmt;
use std::io;
use std::sync::Arc;

/// The main error type for osric.
#[derive(Clone, Debug)]
pub enum Error {
    /// A required setting is missing or unusable. Reported before any
    /// request is attempted.
    Configuration {
        /// Human-readable error message.
        message: String,
    },

    /// No prompt was available from arguments, a prompt file, or stdin.
    Input {
        /// Human-readable error message.
        message: String,
    },

    /// A conversation file exists but is not parseable as the expected
    /// shape. Never auto-repaired.
    StorageCorrupt {
        /// Human-readable error message.
        message: String,
        /// The underlying parse error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// The API returned a non-success status, or a stream carried a terminal
    /// reason other than `stop` or `function_call`.
    Api {
        /// HTTP status code, when the error came from a response status.
        status_code: Option<u16>,
        /// Best-effort message extracted from the error envelope.
        message: String,
    },

    /// Connection-level failure reaching the endpoint.
    Connection {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// The request timed out.
    Timeout {
        /// Human-readable error message.
        message: String,
        /// Duration of the timeout in seconds.
        duration: Option<f64>,
    },

    /// HTTP client error that is neither a timeout nor a connection failure.
    HttpClient {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// Error during JSON serialization or deserialization.
    Serialization {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// I/O error.
    Io {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Arc<io::Error>,
    },

    /// A streaming error occurred while reading the response body.
    Streaming {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// A URL parsing or manipulation error.
    Url {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<url::ParseError>,
    },
}

impl Error {
    /// Creates a new configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new input error.
    pub fn input(message: impl Into<String>) -> Self {
        Error::Input {
            message: message.into(),
        }
    }

    /// Creates a new storage corruption error.
    pub fn storage_corrupt(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::StorageCorrupt {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new API error.
    pub fn api(status_code: Option<u16>, message: impl Into<String>) -> Self {
        Error::Api {
            status_code,
            message: message.into(),
        }
    }

    /// Creates a new connection error.
    pub fn connection(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Connection {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new timeout error.
    pub fn timeout(message: impl Into<String>, duration: Option<f64>) -> Self {
        Error::Timeout {
            message: message.into(),
            duration,
        }
    }

    /// Creates a new HTTP client error.
    pub fn http_client(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::HttpClient {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new serialization error.
    pub fn serialization(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source: Arc::new(source),
        }
    }

    /// Creates a new streaming error.
    pub fn streaming(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Streaming {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new URL error.
    pub fn url(message: impl Into<String>, source: Option<url::ParseError>) -> Self {
        Error::Url {
            message: message.into(),
            source,
        }
    }

    /// Returns true if this error is a configuration error.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }

    /// Returns true if this error indicates a corrupt conversation file.
    pub fn is_storage_corrupt(&self) -> bool {
        matches!(self, Error::StorageCorrupt { .. })
    }

    /// Returns true if this error came from the API itself.
    pub fn is_api(&self) -> bool {
        matches!(self, Error::Api { .. })
    }

    /// Returns the status code associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api { status_code, .. } => *status_code,
            _ => None,
        }
    }

    /// Process exit code for this error, roughly one per failure class.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Configuration { .. } => 1,
            Error::Input { .. } => 13,
            Error::StorageCorrupt { .. } => 5,
            Error::Io { .. } => 6,
            Error::Api { .. } => 9,
            Error::Connection { .. } | Error::Timeout { .. } | Error::HttpClient { .. } => 9,
            Error::Streaming { .. } => 10,
            Error::Serialization { .. } => 8,
            Error::Url { .. } => 2,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration { message } => {
                write!(f, "Configuration error: {message}")
            }
            Error::Input { message } => {
                write!(f, "{message}")
            }
            Error::StorageCorrupt { message, .. } => {
                write!(f, "Conversation file corrupt: {message}")
            }
            Error::Api {
                status_code,
                message,
            } => {
                if let Some(status_code) = status_code {
                    write!(f, "API call failed: {status_code}\nDetails: {message}")
                } else {
                    write!(f, "API error: {message}")
                }
            }
            Error::Connection { message, .. } => {
                write!(f, "Connection error: {message}")
            }
            Error::Timeout { message, duration } => {
                if let Some(duration) = duration {
                    write!(f, "Timeout error: {message} ({duration} seconds)")
                } else {
                    write!(f, "Timeout error: {message}")
                }
            }
            Error::HttpClient { message, .. } => {
                write!(f, "HTTP client error: {message}")
            }
            Error::Serialization { message, .. } => {
                write!(f, "Serialization error: {message}")
            }
            Error::Io { message, .. } => {
                write!(f, "I/O error: {message}")
            }
            Error::Streaming { message, .. } => {
                write!(f, "Streaming error: {message}")
            }
            Error::Url { message, .. } => {
                write!(f, "URL error: {message}")
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::StorageCorrupt { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Connection { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::HttpClient { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Serialization { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Io { source, .. } => Some(source),
            Error::Streaming { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Url { source, .. } => {
                source.as_ref().map(|e| e as &(dyn error::Error + 'static))
            }
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err.to_string(), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(format!("JSON error: {err}"), Some(Box::new(err)))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::url(format!("URL parse error: {err}"), Some(err))
    }
}

/// A specialized Result type for osric operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_api_error_with_status() {
        let err = Error::api(Some(429), "rate limited".to_string());
        assert_eq!(
            err.to_string(),
            "API call failed: 429\nDetails: rate limited"
        );
        assert_eq!(err.status_code(), Some(429));
        assert_eq!(err.exit_code(), 9);
    }

    #[test]
    fn display_api_error_mid_stream() {
        let err = Error::api(None, "content_filter");
        assert_eq!(err.to_string(), "API error: content_filter");
        assert_eq!(err.status_code(), None);
    }

    #[test]
    fn storage_corrupt_is_fatal_class() {
        let err = Error::storage_corrupt("not a conversation record", None);
        assert!(err.is_storage_corrupt());
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io { .. }));
    }
}
