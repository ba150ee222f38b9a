//! HTTP plumbing shared by the provider sessions.

use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, Secret};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::ports::{AIError, ProviderKind, TokenUsage};

/// Where and how a session reaches its provider.
///
/// The `reqwest::Client` is shared (cloning is cheap); the key never leaves
/// the `Secret` wrapper except to build a request header.
#[derive(Debug, Clone)]
pub struct Endpoint {
    client: Client,
    api_key: Secret<String>,
    base_url: String,
    timeout: Duration,
}

impl Endpoint {
    pub fn new(
        client: Client,
        api_key: Secret<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    /// Starts a POST to `{base_url}/{path}` with the request timeout applied.
    pub(crate) fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}/{}", self.base_url, path.trim_start_matches('/')))
            .timeout(self.timeout)
            .header("Content-Type", "application/json")
    }

    /// Sends the request and decodes a successful JSON body.
    pub(crate) async fn send_json<R: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<R, AIError> {
        let response = request
            .send()
            .await
            .map_err(|e| map_send_error(e, self.timeout))?;
        let response = handle_response_status(response).await?;
        response
            .json::<R>()
            .await
            .map_err(|e| AIError::parse(format!("Failed to parse response: {}", e)))
    }
}

/// Maps a transport failure to an [`AIError`].
pub(crate) fn map_send_error(e: reqwest::Error, timeout: Duration) -> AIError {
    if e.is_timeout() {
        AIError::Timeout {
            timeout_secs: timeout.as_secs() as u32,
        }
    } else if e.is_connect() {
        AIError::network(format!("Connection failed: {}", e))
    } else {
        AIError::network(e.to_string())
    }
}

/// Turns a non-success status into an [`AIError`].
pub(crate) async fn handle_response_status(response: Response) -> Result<Response, AIError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    Err(error_for_status(status.as_u16(), error_body))
}

pub(crate) fn error_for_status(status: u16, error_body: String) -> AIError {
    match status {
        401 | 403 => AIError::AuthenticationFailed,
        429 => AIError::rate_limited(parse_retry_after(&error_body)),
        400 | 413 => {
            if is_context_length_error(&error_body) {
                AIError::ContextTooLong(error_body)
            } else {
                AIError::InvalidRequest(error_body)
            }
        }
        500..=599 => AIError::unavailable(format!("Server error {}: {}", status, error_body)),
        _ => AIError::network(format!("Unexpected status {}: {}", status, error_body)),
    }
}

fn is_context_length_error(body: &str) -> bool {
    let lower = body.to_lowercase();
    [
        "context_length_exceeded",
        "maximum context length",
        "prompt is too long",
        "exceeds the maximum number of tokens",
    ]
    .iter()
    .any(|marker| lower.contains(marker))
}

/// Reads "try again in Ns" from a provider error body, defaulting to 30s.
pub(crate) fn parse_retry_after(error_body: &str) -> u32 {
    let message = serde_json::from_str::<serde_json::Value>(error_body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| error_body.to_string());

    message
        .find("try again in ")
        .map(|idx| &message[idx + "try again in ".len()..])
        .and_then(|rest| {
            let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse::<u32>().ok()
        })
        .unwrap_or(30)
}

/// Emits token usage for telemetry.
pub(crate) fn log_usage(provider: ProviderKind, model: &str, usage: &TokenUsage) {
    tracing::debug!(
        provider = %provider,
        model = %model,
        input_tokens = usage.input_tokens,
        output_tokens = usage.output_tokens,
        cache_read_tokens = usage.cache_read_tokens,
        cache_write_tokens = usage.cache_write_tokens,
        "AI call completed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    mod status_mapping {
        use super::*;

        #[test]
        fn auth_failures() {
            assert_eq!(error_for_status(401, String::new()), AIError::AuthenticationFailed);
            assert_eq!(error_for_status(403, String::new()), AIError::AuthenticationFailed);
        }

        #[test]
        fn rate_limit_reads_retry_after() {
            let body = r#"{"error":{"message":"Rate limit exceeded. Please try again in 12 seconds."}}"#;
            assert_eq!(error_for_status(429, body.to_string()), AIError::rate_limited(12));
        }

        #[test]
        fn context_length_is_distinguished_from_bad_request() {
            let err = error_for_status(400, "This model's maximum context length is 8192".to_string());
            assert!(matches!(err, AIError::ContextTooLong(_)));

            let err = error_for_status(400, "missing field".to_string());
            assert_eq!(err, AIError::InvalidRequest("missing field".to_string()));
        }

        #[test]
        fn server_errors_are_retryable() {
            assert!(error_for_status(503, "overloaded".to_string()).is_retryable());
        }
    }

    #[test]
    fn retry_after_defaults_when_absent() {
        assert_eq!(parse_retry_after(r#"{"error":{"message":"slow down"}}"#), 30);
        assert_eq!(parse_retry_after("not json"), 30);
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let endpoint = Endpoint::new(
            Client::new(),
            Secret::new("k".to_string()),
            "https://api.example.com/v1/",
            Duration::from_secs(5),
        );
        assert_eq!(endpoint.base_url(), "https://api.example.com/v1");
        assert_eq!(endpoint.api_key(), "k");
    }
}
