//! HTTP client for the streaming prompt endpoint.

use std::time::Duration;

use anyhow::Result;
use futures_util::StreamExt;
use serde::Serialize;

use super::shared::{ByteStream, TransportError, TransportResult, USER_AGENT};
use super::trace::{DebugTrace, wrap_stream};
use crate::config::Config;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Backend connection settings, resolved from config and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Full URL of the streaming endpoint
    pub endpoint_url: String,
    pub token: Option<String>,
    pub debug: bool,
}

impl BackendConfig {
    /// Resolves endpoint URL and token from `config` and the environment.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            endpoint_url: config.endpoint_url()?,
            token: config.effective_token(),
            debug: config.debug,
        })
    }
}

#[derive(Debug, Serialize)]
struct PromptRequest<'a> {
    prompt: &'a str,
}

/// Client issuing prompt requests and returning the raw response body stream.
#[derive(Debug, Clone)]
pub struct BackendClient {
    config: BackendConfig,
    http: reqwest::Client,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { config, http }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Sends `prompt` and returns the response body as a byte stream.
    ///
    /// The body is not buffered: chunks are yielded as the backend flushes them.
    ///
    /// # Errors
    /// Returns a transport error when the request cannot be sent or the
    /// backend answers with a non-success status.
    pub async fn send_prompt(&self, prompt: &str) -> TransportResult<ByteStream> {
        let trace = DebugTrace::from_env(self.config.debug);
        let request = PromptRequest { prompt };

        let mut builder = self
            .http
            .post(&self.config.endpoint_url)
            .header("content-type", "application/json")
            .header("accept", "text/plain")
            .header("user-agent", USER_AGENT);
        if let Some(token) = &self.config.token {
            builder = builder.bearer_auth(token);
        }

        let body = serde_json::to_vec(&request).map_err(|e| {
            TransportError::body(format!("Failed to encode prompt request: {e}"))
        })?;
        if let Some(trace) = &trace {
            trace.write_request(&body);
        }

        tracing::debug!(url = %self.config.endpoint_url, "sending prompt");
        let response = builder
            .body(body)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "backend rejected prompt");
            return Err(TransportError::http_status(status.as_u16(), &error_body));
        }

        let byte_stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::from_reqwest(&e)))
            .boxed();
        Ok(wrap_stream(trace.as_ref(), byte_stream))
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::backend::shared::TransportErrorKind;

    fn client_for(server: &MockServer, token: Option<&str>) -> BackendClient {
        BackendClient::new(BackendConfig {
            endpoint_url: format!("{}/api/genai/send_message", server.uri()),
            token: token.map(str::to_string),
            debug: false,
        })
    }

    #[tokio::test]
    async fn test_send_prompt_posts_json_and_streams_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/genai/send_message"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(serde_json::json!({ "prompt": "What is a monad?" })))
            .respond_with(ResponseTemplate::new(200).set_body_string("A monad is **a monoid**"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("secret"));
        let stream = client.send_prompt("What is a monad?").await.unwrap();
        let chunks: Vec<_> = stream.collect().await;

        let mut body = Vec::new();
        for chunk in chunks {
            body.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(body, b"A monad is **a monoid**");
    }

    #[tokio::test]
    async fn test_send_prompt_maps_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(serde_json::json!({ "detail": "Forbidden." })),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let Err(err) = client.send_prompt("hi").await else {
            panic!("expected an HTTP status error");
        };
        assert_eq!(err.kind, TransportErrorKind::HttpStatus);
        assert_eq!(err.message, "HTTP 403: Forbidden.");
    }

    #[tokio::test]
    async fn test_send_prompt_connection_refused() {
        // Port 9 (discard) on localhost is closed in test environments.
        let client = BackendClient::new(BackendConfig {
            endpoint_url: "http://127.0.0.1:9/api/genai/send_message".to_string(),
            token: None,
            debug: false,
        });
        let Err(err) = client.send_prompt("hi").await else {
            panic!("expected a connect error");
        };
        assert_eq!(err.kind, TransportErrorKind::Connect);
    }
}
