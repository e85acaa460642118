//! Shared HTTP plumbing: client construction, transport errors, replies.

use reqwest::StatusCode;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);
/// Longest server body excerpt carried in an error detail.
const DETAIL_LIMIT: usize = 200;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("HTTP {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("failed to build HTTP client: {0}")]
    Build(String),
}

impl TransportError {
    /// Timeouts, connection failures and 5xx responses may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Timeout | TransportError::Connect(_) => true,
            TransportError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else if e.is_decode() {
            TransportError::Decode(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Per-request timeout.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("rollcall/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Build the shared `reqwest` client. Every request inherits the timeout.
pub fn build_client(opts: &ClientOptions) -> Result<reqwest::Client, TransportError> {
    reqwest::Client::builder()
        .timeout(opts.timeout)
        .user_agent(opts.user_agent.clone())
        .build()
        .map_err(|e| TransportError::Build(e.to_string()))
}

/// Status and raw body of a completed HTTP exchange.
#[derive(Debug)]
pub(crate) struct Reply {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_slice(&self.body).map_err(|e| TransportError::Decode(e.to_string()))
    }

    pub fn error_for_status(self) -> Result<Self, TransportError> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(self.status_error())
        }
    }

    pub fn status_error(&self) -> TransportError {
        TransportError::Status {
            status: self.status.as_u16(),
            detail: server_detail(&self.body),
        }
    }
}

pub(crate) async fn post_json<B: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    body: &B,
) -> Result<Reply, TransportError> {
    let resp = client.post(url).json(body).send().await?;
    let status = resp.status();
    let body = resp.bytes().await?.to_vec();
    tracing::debug!(url, status = status.as_u16(), bytes = body.len(), "POST completed");
    Ok(Reply { status, body })
}

pub(crate) async fn get(
    client: &reqwest::Client,
    url: &str,
    timeout: Option<Duration>,
) -> Result<Reply, TransportError> {
    let mut req = client.get(url);
    if let Some(t) = timeout {
        req = req.timeout(t);
    }
    let resp = req.send().await?;
    let status = resp.status();
    let body = resp.bytes().await?.to_vec();
    tracing::debug!(url, status = status.as_u16(), bytes = body.len(), "GET completed");
    Ok(Reply { status, body })
}

/// Best human-readable explanation in an error body: its `error` or
/// `message` field, otherwise a text excerpt.
pub(crate) fn server_detail(body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        for key in ["error", "message"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                return text.to_string();
            }
        }
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return "empty response body".to_string();
    }
    text.chars().take(DETAIL_LIMIT).collect()
}

/// Accept identifiers sent either as JSON strings or numbers.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Int(i64),
        Float(f64),
    }

    match Option::<Id>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Id::Text(s)) => Ok(Some(s)),
        Some(Id::Int(n)) => Ok(Some(n.to_string())),
        Some(Id::Float(f)) if f.fract() == 0.0 && f.is_finite() => Ok(Some(format!("{f:.0}"))),
        Some(Id::Float(f)) => Err(de::Error::custom(format!("invalid identifier: {f}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classes() {
        assert!(TransportError::Timeout.is_retryable());
        assert!(TransportError::Connect("refused".into()).is_retryable());
        assert!(TransportError::Status { status: 503, detail: String::new() }.is_retryable());
        assert!(!TransportError::Status { status: 404, detail: String::new() }.is_retryable());
        assert!(!TransportError::Status { status: 400, detail: String::new() }.is_retryable());
        assert!(!TransportError::Decode("eof".into()).is_retryable());
    }

    #[test]
    fn test_server_detail_prefers_error_field() {
        assert_eq!(server_detail(br#"{"error":"bad image","message":"m"}"#), "bad image");
        assert_eq!(server_detail(br#"{"message":"Internal error"}"#), "Internal error");
        assert_eq!(server_detail(b"<html>Bad Gateway</html>"), "<html>Bad Gateway</html>");
        assert_eq!(server_detail(b"   "), "empty response body");
    }

    #[test]
    fn test_server_detail_truncates_text() {
        let long = "x".repeat(1000);
        assert_eq!(server_detail(long.as_bytes()).len(), DETAIL_LIMIT);
    }

    #[derive(Deserialize)]
    struct Wrapper {
        #[serde(default, deserialize_with = "string_or_number")]
        id: Option<String>,
    }

    #[test]
    fn test_string_or_number_ids() {
        let w: Wrapper = serde_json::from_str(r#"{"id":"42"}"#).unwrap();
        assert_eq!(w.id.as_deref(), Some("42"));
        let w: Wrapper = serde_json::from_str(r#"{"id":42}"#).unwrap();
        assert_eq!(w.id.as_deref(), Some("42"));
        let w: Wrapper = serde_json::from_str(r#"{"id":null}"#).unwrap();
        assert_eq!(w.id, None);
        let w: Wrapper = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(w.id, None);
        assert!(serde_json::from_str::<Wrapper>(r#"{"id":4.5}"#).is_err());
    }
}
