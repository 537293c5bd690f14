//! Session token acquisition.
//!
//! The token endpoint is an external collaborator: `GET {url}?identity=...`
//! answering `{"token": "<opaque>"}`.  The session only needs the opaque
//! string to hand to the room connector.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::config::ServerConfig;

// ---------------------------------------------------------------------------
// TokenError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token request failed: {0}")]
    Request(String),

    #[error("token request timed out")]
    Timeout,

    #[error("token endpoint returned HTTP {0}")]
    Status(u16),

    #[error("failed to parse token response: {0}")]
    Parse(String),

    #[error("token endpoint returned an empty token")]
    Empty,
}

impl From<reqwest::Error> for TokenError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TokenError::Timeout
        } else {
            TokenError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// TokenProvider
// ---------------------------------------------------------------------------

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch_token(&self, identity: &str) -> Result<String, TokenError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// Extract the token from a response body.
fn parse_token(body: &str) -> Result<String, TokenError> {
    let parsed: TokenResponse =
        serde_json::from_str(body).map_err(|e| TokenError::Parse(e.to_string()))?;
    if parsed.token.is_empty() {
        return Err(TokenError::Empty);
    }
    Ok(parsed.token)
}

// ---------------------------------------------------------------------------
// HttpTokenProvider
// ---------------------------------------------------------------------------

/// Fetches tokens over HTTP with `reqwest`.
pub struct HttpTokenProvider {
    client: reqwest::Client,
    url: String,
}

impl HttpTokenProvider {
    /// Build a provider from server config.  A default (no-timeout) client is
    /// used if the builder fails.
    pub fn from_config(config: &ServerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.token_timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            url: config.token_url.clone(),
        }
    }
}

#[async_trait]
impl TokenProvider for HttpTokenProvider {
    async fn fetch_token(&self, identity: &str) -> Result<String, TokenError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("identity", identity)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TokenError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_token(&body)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_token_body() {
        assert_eq!(parse_token(r#"{"token":"abc.def.ghi"}"#).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn ignores_extra_fields() {
        assert_eq!(parse_token(r#"{"token":"t","room":"default"}"#).unwrap(), "t");
    }

    #[test]
    fn missing_token_is_parse_error() {
        assert!(matches!(parse_token(r#"{"status":"ok"}"#), Err(TokenError::Parse(_))));
    }

    #[test]
    fn empty_token_is_rejected() {
        assert!(matches!(parse_token(r#"{"token":""}"#), Err(TokenError::Empty)));
    }

    #[test]
    fn from_config_builds_without_panic() {
        let _provider = HttpTokenProvider::from_config(&ServerConfig::default());
    }

    #[test]
    fn provider_is_object_safe() {
        let provider: Box<dyn TokenProvider> =
            Box::new(HttpTokenProvider::from_config(&ServerConfig::default()));
        drop(provider);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_request_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = ServerConfig {
            token_url: format!("http://{addr}/get_token"),
            ..ServerConfig::default()
        };
        let provider = HttpTokenProvider::from_config(&config);
        let err = provider.fetch_token("test-user").await.unwrap_err();
        assert!(matches!(err, TokenError::Request(_) | TokenError::Timeout));
    }
}
