//! Face recognition endpoint client.

use crate::http::{self, string_or_number, TransportError};
use crate::retry::RetryPolicy;
use rollcall_core::{Confidence, EncodedImage, RecognitionOutcome, Recognizer};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct RecognizeRequest<'a> {
    image: &'a str,
}

/// Body returned by the recognition endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizeResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub recognized: bool,
    #[serde(default, deserialize_with = "string_or_number")]
    pub student_id: Option<String>,
    pub confidence: Option<f32>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl RecognizeResponse {
    /// Map a decoded 2xx body to an outcome.
    pub fn into_outcome(self) -> RecognitionOutcome {
        match (self.success && self.recognized, self.student_id) {
            (true, Some(identity)) if !identity.is_empty() => {
                let raw = self.confidence.unwrap_or(0.0);
                match Confidence::new(raw) {
                    Some(confidence) => RecognitionOutcome::Matched {
                        identity,
                        confidence,
                    },
                    None => RecognitionOutcome::Failed {
                        detail: format!("malformed response: confidence {raw} outside [0, 100]"),
                    },
                }
            }
            _ => RecognitionOutcome::Unmatched {
                reason: self
                    .message
                    .or(self.error)
                    .unwrap_or_else(|| "no match".to_string()),
            },
        }
    }
}

/// Client for the recognition endpoint. Requests are retried with backoff.
pub struct RecognitionClient {
    http: reqwest::Client,
    url: String,
    retry: RetryPolicy,
}

impl RecognitionClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            http,
            url: url.into(),
            retry,
        }
    }

    async fn request(&self, payload: &str) -> Result<RecognizeResponse, TransportError> {
        let body = &RecognizeRequest { image: payload };
        let (client, url) = (&self.http, self.url.as_str());
        self.retry
            .run("recognize", move || async move {
                http::post_json(client, url, body)
                    .await?
                    .error_for_status()?
                    .json::<RecognizeResponse>()
            })
            .await
    }
}

impl Recognizer for RecognitionClient {
    async fn recognize(&self, image: &EncodedImage) -> RecognitionOutcome {
        let payload = image.to_base64();
        tracing::info!(
            width = image.width,
            height = image.height,
            payload_chars = payload.len(),
            "sending recognition request"
        );

        match self.request(&payload).await {
            Ok(resp) => {
                let outcome = resp.into_outcome();
                tracing::debug!(?outcome, "recognition response");
                outcome
            }
            Err(err) => {
                tracing::warn!(error = %err, "recognition request failed");
                RecognitionOutcome::Failed {
                    detail: err.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> RecognitionOutcome {
        serde_json::from_str::<RecognizeResponse>(json)
            .unwrap()
            .into_outcome()
    }

    #[test]
    fn test_matched_response() {
        let outcome = parse(r#"{"success":true,"recognized":true,"studentId":"42","confidence":97}"#);
        assert_eq!(
            outcome,
            RecognitionOutcome::Matched {
                identity: "42".into(),
                confidence: Confidence::new(97.0).unwrap(),
            }
        );
    }

    #[test]
    fn test_numeric_student_id() {
        let outcome = parse(r#"{"success":true,"recognized":true,"studentId":42,"confidence":99.5}"#);
        assert!(matches!(outcome, RecognitionOutcome::Matched { identity, .. } if identity == "42"));
    }

    #[test]
    fn test_missing_confidence_is_zero() {
        let outcome = parse(r#"{"success":true,"recognized":true,"studentId":"42"}"#);
        assert!(matches!(
            outcome,
            RecognitionOutcome::Matched { confidence, .. } if confidence.percent() == 0.0
        ));
    }

    #[test]
    fn test_out_of_range_confidence_is_failure() {
        let outcome = parse(r#"{"success":true,"recognized":true,"studentId":"42","confidence":140}"#);
        assert!(matches!(outcome, RecognitionOutcome::Failed { .. }));
    }

    #[test]
    fn test_no_face_is_unmatched() {
        let outcome = parse(r#"{"success":false,"recognized":false,"message":"no face"}"#);
        assert_eq!(outcome, RecognitionOutcome::Unmatched { reason: "no face".into() });
    }

    #[test]
    fn test_recognized_without_identity_is_unmatched() {
        let outcome = parse(r#"{"success":true,"recognized":true}"#);
        assert_eq!(outcome, RecognitionOutcome::Unmatched { reason: "no match".into() });
    }

    #[test]
    fn test_unmatched_falls_back_to_error_text() {
        let outcome = parse(r#"{"success":true,"recognized":false,"error":"Face not in collection"}"#);
        assert_eq!(
            outcome,
            RecognitionOutcome::Unmatched { reason: "Face not in collection".into() }
        );
    }
}
