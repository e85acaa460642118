//! Attendance ledger endpoint client.
//!
//! Marking attendance is not idempotent from the client's point of view, so
//! exactly one request is made per call and failures are never retried.

use crate::http::{self, string_or_number, Reply};
use rollcall_core::{
    AttendanceLedger, AttendanceOutcome, Confidence, IdentitySnapshot, Rejection,
};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct MarkAttendanceRequest<'a> {
    student_id: &'a str,
    confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    institute_id: Option<&'a str>,
}

/// Student record embedded in a ledger response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentRecord {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    pub name: Option<String>,
    pub photo_url: Option<String>,
    pub is_part_time_today: Option<bool>,
    pub check_in_time: Option<String>,
    pub confidence: Option<f32>,
    pub first_check_in: Option<String>,
}

/// Body returned by the attendance endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarkAttendanceResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub already_marked: bool,
    pub student: Option<StudentRecord>,
    pub error: Option<String>,
}

impl MarkAttendanceResponse {
    /// Map a decoded body to an outcome. `local_time` is used when the
    /// ledger does not report a check-in time.
    pub fn into_outcome(self, identity: &str, local_time: impl FnOnce() -> String) -> AttendanceOutcome {
        let student = self.student.unwrap_or_default();

        if self.success {
            let checked_in_at = student.check_in_time.clone().unwrap_or_else(local_time);
            return AttendanceOutcome::Marked {
                identity: snapshot(identity, student),
                checked_in_at,
            };
        }

        if self.already_marked {
            let first_check_in = student
                .first_check_in
                .clone()
                .or_else(|| student.check_in_time.clone());
            return AttendanceOutcome::AlreadyMarked {
                identity: snapshot(identity, student),
                first_check_in,
                message: self
                    .message
                    .unwrap_or_else(|| "Already checked in".to_string()),
            };
        }

        let text = self
            .error
            .or(self.message)
            .unwrap_or_else(|| "Failed to mark attendance".to_string());
        AttendanceOutcome::Rejected(Rejection::classify(&text))
    }
}

fn snapshot(identity: &str, student: StudentRecord) -> IdentitySnapshot {
    let id = student
        .id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| identity.to_string());
    let name = student
        .name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| IdentitySnapshot::placeholder(&id).name);
    IdentitySnapshot {
        id,
        name,
        photo_url: student.photo_url,
        part_time_today: student.is_part_time_today,
        check_in_time: student.check_in_time,
    }
}

fn local_clock() -> String {
    chrono::Local::now().format("%H:%M").to_string()
}

pub struct AttendanceClient {
    http: reqwest::Client,
    url: String,
    institute_id: Option<String>,
}

impl AttendanceClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>, institute_id: Option<String>) -> Self {
        Self {
            http,
            url: url.into(),
            institute_id,
        }
    }

    /// Server-side rejections come back as 4xx with a normal body; only
    /// 5xx and undecodable bodies count as transport failures.
    fn interpret(identity: &str, reply: Reply) -> AttendanceOutcome {
        if reply.status.is_server_error() {
            return AttendanceOutcome::Failed {
                detail: reply.status_error().to_string(),
            };
        }
        match reply.json::<MarkAttendanceResponse>() {
            Ok(resp) => resp.into_outcome(identity, local_clock),
            Err(_) if !reply.status.is_success() => AttendanceOutcome::Failed {
                detail: reply.status_error().to_string(),
            },
            Err(err) => AttendanceOutcome::Failed {
                detail: err.to_string(),
            },
        }
    }
}

impl AttendanceLedger for AttendanceClient {
    async fn mark_attendance(&self, identity: &str, confidence: Confidence) -> AttendanceOutcome {
        let body = MarkAttendanceRequest {
            student_id: identity,
            confidence: confidence.percent(),
            institute_id: self.institute_id.as_deref(),
        };
        tracing::info!(identity, confidence = confidence.percent(), "marking attendance");

        let outcome = match http::post_json(&self.http, &self.url, &body).await {
            Ok(reply) => Self::interpret(identity, reply),
            Err(err) => {
                tracing::warn!(error = %err, "attendance request failed");
                AttendanceOutcome::Failed {
                    detail: err.to_string(),
                }
            }
        };
        tracing::debug!(?outcome, "attendance response");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn parse(json: &str) -> AttendanceOutcome {
        serde_json::from_str::<MarkAttendanceResponse>(json)
            .unwrap()
            .into_outcome("42", || "09:30".to_string())
    }

    fn reply(status: u16, body: &str) -> Reply {
        Reply {
            status: StatusCode::from_u16(status).unwrap(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_marked_with_student_details() {
        let outcome = parse(
            r#"{"success":true,"message":"ok","student":{"id":"42","name":"Ada","photo_url":"p.jpg","is_part_time_today":true,"check_in_time":"08:01"}}"#,
        );
        match outcome {
            AttendanceOutcome::Marked { identity, checked_in_at } => {
                assert_eq!(identity.name, "Ada");
                assert_eq!(identity.photo_url.as_deref(), Some("p.jpg"));
                assert_eq!(identity.part_time_today, Some(true));
                assert_eq!(checked_in_at, "08:01");
            }
            other => panic!("expected Marked, got {other:?}"),
        }
    }

    #[test]
    fn test_marked_without_student_uses_placeholder_and_local_time() {
        match parse(r#"{"success":true,"message":"ok"}"#) {
            AttendanceOutcome::Marked { identity, checked_in_at } => {
                assert_eq!(identity.id, "42");
                assert_eq!(identity.name, "Student 42");
                assert_eq!(checked_in_at, "09:30");
            }
            other => panic!("expected Marked, got {other:?}"),
        }
    }

    #[test]
    fn test_already_marked_reports_first_check_in() {
        let outcome = parse(
            r#"{"success":false,"already_marked":true,"message":"Already checked in","student":{"id":"42","name":"Ada","first_check_in":"08:01"}}"#,
        );
        match outcome {
            AttendanceOutcome::AlreadyMarked { identity, first_check_in, message } => {
                assert_eq!(identity.name, "Ada");
                assert_eq!(first_check_in.as_deref(), Some("08:01"));
                assert_eq!(message, "Already checked in");
            }
            other => panic!("expected AlreadyMarked, got {other:?}"),
        }
    }

    #[test]
    fn test_directory_miss_detected_from_error_text() {
        let outcome = parse(r#"{"success":false,"message":"x","error":"Student does not exist"}"#);
        assert!(matches!(outcome, AttendanceOutcome::Rejected(Rejection::DirectoryMiss { .. })));

        let outcome = parse(r#"{"success":false,"message":"Student not found"}"#);
        assert!(matches!(outcome, AttendanceOutcome::Rejected(Rejection::DirectoryMiss { .. })));
    }

    #[test]
    fn test_other_rejection() {
        let outcome = parse(r#"{"success":false,"message":"Outside school hours"}"#);
        assert_eq!(
            outcome,
            AttendanceOutcome::Rejected(Rejection::Other { message: "Outside school hours".into() })
        );
    }

    #[test]
    fn test_interpret_client_error_body() {
        let outcome = AttendanceClient::interpret(
            "42",
            reply(404, r#"{"success":false,"error":"Student not found"}"#),
        );
        assert!(matches!(outcome, AttendanceOutcome::Rejected(Rejection::DirectoryMiss { .. })));
    }

    #[test]
    fn test_interpret_server_error_is_failure() {
        let outcome = AttendanceClient::interpret(
            "42",
            reply(500, r#"{"success":false,"error":"Student not found"}"#),
        );
        assert!(matches!(outcome, AttendanceOutcome::Failed { detail } if detail.contains("500")));
    }

    #[test]
    fn test_interpret_garbage_body_is_failure() {
        assert!(matches!(
            AttendanceClient::interpret("42", reply(200, "<html>")),
            AttendanceOutcome::Failed { .. }
        ));
        assert!(matches!(
            AttendanceClient::interpret("42", reply(403, "Forbidden")),
            AttendanceOutcome::Failed { detail } if detail.contains("403")
        ));
    }
}
