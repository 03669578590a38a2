//! HTTP transport for OpenAI-compatible endpoints.
//!
//! The client makes exactly one attempt per request; retry policy belongs to
//! the caller's shell loop, not here. For streamed requests the status and
//! headers are checked before the body is consumed, so API errors surface
//! before any decoding starts.

use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use futures::stream::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use serde_json::Value;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Client for an OpenAI-compatible API.
#[derive(Debug, Clone)]
pub struct OpenAi {
    api_key: String,
    client: ReqwestClient,
    base_url: String,
    timeout: Duration,
}

impl OpenAi {
    /// Create a client from resolved configuration.
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_timeout(config, DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(config: &Config, timeout: Duration) -> Result<Self> {
        url::Url::parse(&config.endpoint).map_err(|e| {
            Error::url(
                format!("Invalid endpoint URL '{}': {e}", config.endpoint),
                Some(e),
            )
        })?;
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;
        Ok(Self {
            api_key: config.api_key.clone(),
            client,
            base_url: config.endpoint.clone(),
            timeout,
        })
    }

    /// The full URL for an API path.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| Error::configuration("API key contains invalid header characters."))?;
        headers.insert(header::AUTHORIZATION, bearer);
        Ok(headers)
    }

    fn map_send_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {e}"),
                Some(self.timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }

    /// Extracts a best-effort error from a non-success response.
    ///
    /// The conventional envelope is `{"error": {"message": ...}}`; when the
    /// body is not that shape the raw body is the message.
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };
        Error::api(Some(status_code), extract_error_message(&body))
    }

    /// GET a path and parse the body as JSON.
    pub async fn get(&self, path: &str) -> Result<Value> {
        CLIENT_REQUESTS.click();
        let response = self
            .client
            .get(self.url_for(path))
            .headers(self.default_headers()?)
            .send()
            .await
            .map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                self.map_send_error(e)
            })?;
        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }
        let body = response
            .text()
            .await
            .map_err(|e| Error::http_client(format!("Failed to read response: {e}"), Some(Box::new(e))))?;
        serde_json::from_str(&body).map_err(|e| {
            Error::serialization(format!("Failed to parse response: {e}"), Some(Box::new(e)))
        })
    }

    /// POST a payload and return the raw body of a success response.
    ///
    /// The raw body is kept so it can be dumped verbatim to a file before
    /// any interpretation happens.
    pub async fn send_raw(&self, path: &str, payload: &Value) -> Result<String> {
        CLIENT_REQUESTS.click();
        let response = self
            .client
            .post(self.url_for(path))
            .headers(self.default_headers()?)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                self.map_send_error(e)
            })?;
        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }
        response
            .text()
            .await
            .map_err(|e| Error::http_client(format!("Failed to read response: {e}"), Some(Box::new(e))))
    }

    /// POST a payload and parse the body of a success response as JSON.
    pub async fn send(&self, path: &str, payload: &Value) -> Result<Value> {
        let body = self.send_raw(path, payload).await?;
        serde_json::from_str(&body).map_err(|e| {
            Error::serialization(format!("Failed to parse response: {e}"), Some(Box::new(e)))
        })
    }

    /// POST a payload and return the response body as a byte stream.
    ///
    /// The status is checked before the stream is returned; a non-success
    /// status consumes the body for its error envelope instead.
    pub async fn stream(
        &self,
        path: &str,
        payload: &Value,
    ) -> Result<impl Stream<Item = Result<Bytes>> + Unpin + use<>> {
        CLIENT_REQUESTS.click();
        let mut headers = self.default_headers()?;
        headers.insert(header::ACCEPT, HeaderValue::from_static("text/event-stream"));
        let response = self
            .client
            .post(self.url_for(path))
            .headers(headers)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                self.map_send_error(e)
            })?;
        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }
        Ok(response.bytes_stream().map(|result| {
            result.map_err(|e| {
                Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e)))
            })
        }))
    }
}

/// Pulls `error.message` out of an error envelope, falling back to the raw
/// body when that shape is absent.
pub fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")?
                .get("message")?
                .as_str()
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config() -> Config {
        Config {
            endpoint: "https://api.example.com/v1".to_string(),
            api_key: "sk-test".to_string(),
            model: "gpt-4o".to_string(),
            data_dir: PathBuf::from("/tmp"),
            provider: None,
        }
    }

    #[test]
    fn url_joins_path() {
        let client = OpenAi::new(&config()).unwrap();
        assert_eq!(
            client.url_for("chat/completions"),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let config = Config {
            endpoint: "not a url".to_string(),
            ..config()
        };
        let err = OpenAi::new(&config).unwrap_err();
        assert!(matches!(err, crate::error::Error::Url { .. }));
    }

    #[test]
    fn error_envelope_extraction() {
        let body = r#"{"error": {"message": "You exceeded your quota.", "type": "insufficient_quota"}}"#;
        assert_eq!(extract_error_message(body), "You exceeded your quota.");
    }

    #[test]
    fn error_envelope_fallback_to_raw_body() {
        assert_eq!(extract_error_message("upstream exploded"), "upstream exploded");
        assert_eq!(extract_error_message(r#"{"detail": "other"}"#), r#"{"detail": "other"}"#);
    }
}
