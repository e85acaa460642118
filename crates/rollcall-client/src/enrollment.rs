//! Face enrollment endpoint client. One request per enrollment, never retried.

use crate::http::{self, Reply};
use rollcall_core::{EncodedImage, EnrollOutcome};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnrollRequest<'a> {
    image: &'a str,
    student_id: &'a str,
    student_name: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub face_id: Option<String>,
    pub error: Option<String>,
}

impl From<EnrollResponse> for EnrollOutcome {
    fn from(resp: EnrollResponse) -> Self {
        let message = resp
            .message
            .clone()
            .or_else(|| resp.error.clone())
            .unwrap_or_else(|| {
                if resp.success {
                    "Enrolled".to_string()
                } else {
                    "Enrollment failed".to_string()
                }
            });
        EnrollOutcome {
            success: resp.success,
            message,
            face_id: resp.face_id,
            error: resp.error,
        }
    }
}

pub struct EnrollmentClient {
    http: reqwest::Client,
    url: String,
}

impl EnrollmentClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    /// Register a face template for `identity_id`.
    pub async fn enroll(
        &self,
        image: &EncodedImage,
        identity_id: &str,
        display_name: &str,
    ) -> EnrollOutcome {
        let (identity_id, display_name) = (identity_id.trim(), display_name.trim());
        if identity_id.is_empty() || display_name.is_empty() {
            return EnrollOutcome::failed("student id and name are required");
        }

        let payload = image.to_base64();
        let body = EnrollRequest {
            image: &payload,
            student_id: identity_id,
            student_name: display_name,
        };
        tracing::info!(
            identity = identity_id,
            payload_chars = payload.len(),
            "sending enrollment request"
        );

        match http::post_json(&self.http, &self.url, &body).await {
            Ok(reply) => interpret(reply),
            Err(err) => {
                tracing::warn!(error = %err, "enrollment request failed");
                EnrollOutcome::failed(err.to_string())
            }
        }
    }
}

/// A decodable error body still carries the server's explanation.
fn interpret(reply: Reply) -> EnrollOutcome {
    match reply.json::<EnrollResponse>() {
        Ok(resp) if reply.status.is_success() => resp.into(),
        Ok(resp) => {
            let mut outcome = EnrollOutcome::from(resp);
            outcome.success = false;
            if outcome.error.is_none() {
                outcome.error = Some(reply.status_error().to_string());
            }
            outcome
        }
        Err(_) => EnrollOutcome::failed(reply.status_error().to_string()),
    }
}
