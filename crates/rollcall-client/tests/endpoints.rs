//! Clients against a local HTTP server standing in for the backends.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use rollcall_client::{
    AdminClient, AttendanceClient, ClientOptions, EnrollmentClient, RecognitionClient, RetryPolicy,
};
use rollcall_core::{
    AttendanceLedger, AttendanceOutcome, Confidence, EncodedImage, RecognitionOutcome, Recognizer,
    Rejection,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Recorder {
    hits: AtomicUsize,
    bodies: Mutex<Vec<Value>>,
}

impl Recorder {
    fn record(&self, body: Value) -> usize {
        self.bodies.lock().unwrap().push(body);
        self.hits.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn http(timeout: Duration) -> reqwest::Client {
    rollcall_client::http::build_client(&ClientOptions {
        timeout,
        ..ClientOptions::default()
    })
    .unwrap()
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_millis(10),
    }
}

fn image() -> EncodedImage {
    EncodedImage {
        jpeg: vec![0xFF, 0xD8, 0xFF, 0xD9],
        width: 1,
        height: 1,
        quality: 70,
    }
}

#[tokio::test]
async fn test_recognition_retries_server_errors() {
    let rec = Arc::new(Recorder::default());
    let app = Router::new()
        .route(
            "/recognize",
            post(|State(rec): State<Arc<Recorder>>, Json(body): Json<Value>| async move {
                if rec.record(body) < 3 {
                    (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"error": "busy"})))
                } else {
                    (
                        StatusCode::OK,
                        Json(json!({"success": true, "recognized": true, "studentId": "42", "confidence": 97})),
                    )
                }
            }),
        )
        .with_state(Arc::clone(&rec));
    let base = serve(app).await;

    let client = RecognitionClient::new(http(Duration::from_secs(5)), format!("{base}/recognize"), fast_retry());
    let outcome = client.recognize(&image()).await;

    assert_eq!(
        outcome,
        RecognitionOutcome::Matched {
            identity: "42".into(),
            confidence: Confidence::new(97.0).unwrap(),
        }
    );
    assert_eq!(rec.hits(), 3);
    let bodies = rec.bodies.lock().unwrap();
    assert_eq!(bodies[0]["image"], json!(image().to_base64()));
}

#[tokio::test]
async fn test_recognition_client_error_not_retried() {
    let rec = Arc::new(Recorder::default());
    let app = Router::new()
        .route(
            "/recognize",
            post(|State(rec): State<Arc<Recorder>>, Json(body): Json<Value>| async move {
                rec.record(body);
                (StatusCode::BAD_REQUEST, Json(json!({"error": "image too small"})))
            }),
        )
        .with_state(Arc::clone(&rec));
    let base = serve(app).await;

    let client = RecognitionClient::new(http(Duration::from_secs(5)), format!("{base}/recognize"), fast_retry());
    let outcome = client.recognize(&image()).await;

    match outcome {
        RecognitionOutcome::Failed { detail } => assert!(detail.contains("image too small"), "{detail}"),
        other => panic!("expected Failed, got {other:?}"),
    }
    assert_eq!(rec.hits(), 1);
}

#[tokio::test]
async fn test_recognition_no_match_is_unmatched() {
    let app = Router::new().route(
        "/recognize",
        post(|| async { Json(json!({"success": false, "recognized": false, "message": "no face"})) }),
    );
    let base = serve(app).await;

    let client = RecognitionClient::new(http(Duration::from_secs(5)), format!("{base}/recognize"), fast_retry());
    assert_eq!(
        client.recognize(&image()).await,
        RecognitionOutcome::Unmatched { reason: "no face".into() }
    );
}

#[tokio::test]
async fn test_recognition_timeout_is_failed() {
    let app = Router::new().route(
        "/recognize",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Json(json!({"success": true}))
        }),
    );
    let base = serve(app).await;

    let client = RecognitionClient::new(
        http(Duration::from_millis(100)),
        format!("{base}/recognize"),
        RetryPolicy::once(),
    );
    match client.recognize(&image()).await {
        RecognitionOutcome::Failed { detail } => assert_eq!(detail, "request timed out"),
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_recognition_unreachable_is_failed() {
    // Bind then drop to get a port with nothing listening.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = RecognitionClient::new(http(Duration::from_secs(1)), format!("http://{addr}/"), fast_retry());
    assert!(matches!(client.recognize(&image()).await, RecognitionOutcome::Failed { .. }));
}

#[tokio::test]
async fn test_attendance_request_shape_and_success() {
    let rec = Arc::new(Recorder::default());
    let app = Router::new()
        .route(
            "/attendance",
            post(|State(rec): State<Arc<Recorder>>, Json(body): Json<Value>| async move {
                rec.record(body);
                Json(json!({"success": true, "message": "ok", "student": {"id": "42", "name": "Ada", "photo_url": ""}}))
            }),
        )
        .with_state(Arc::clone(&rec));
    let base = serve(app).await;

    let client = AttendanceClient::new(
        http(Duration::from_secs(5)),
        format!("{base}/attendance"),
        Some("INST001".into()),
    );
    let outcome = client
        .mark_attendance("42", Confidence::new(97.0).unwrap())
        .await;

    match outcome {
        AttendanceOutcome::Marked { identity, .. } => assert_eq!(identity.name, "Ada"),
        other => panic!("expected Marked, got {other:?}"),
    }
    let bodies = rec.bodies.lock().unwrap();
    assert_eq!(bodies[0], json!({"student_id": "42", "confidence": 97.0, "institute_id": "INST001"}));
}

#[tokio::test]
async fn test_attendance_directory_miss_on_not_found() {
    let app = Router::new().route(
        "/attendance",
        post(|| async {
            (
                StatusCode::NOT_FOUND,
                Json(json!({"success": false, "message": "Failed", "error": "Student not found"})),
            )
        }),
    );
    let base = serve(app).await;

    let client = AttendanceClient::new(http(Duration::from_secs(5)), format!("{base}/attendance"), None);
    assert!(matches!(
        client.mark_attendance("42", Confidence::new(99.0).unwrap()).await,
        AttendanceOutcome::Rejected(Rejection::DirectoryMiss { .. })
    ));
}

#[tokio::test]
async fn test_attendance_server_error_not_retried() {
    let rec = Arc::new(Recorder::default());
    let app = Router::new()
        .route(
            "/attendance",
            post(|State(rec): State<Arc<Recorder>>, Json(body): Json<Value>| async move {
                rec.record(body);
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "db down"})))
            }),
        )
        .with_state(Arc::clone(&rec));
    let base = serve(app).await;

    let client = AttendanceClient::new(http(Duration::from_secs(5)), format!("{base}/attendance"), None);
    match client.mark_attendance("42", Confidence::new(99.0).unwrap()).await {
        AttendanceOutcome::Failed { detail } => assert!(detail.contains("db down"), "{detail}"),
        other => panic!("expected Failed, got {other:?}"),
    }
    assert_eq!(rec.hits(), 1);
}

#[tokio::test]
async fn test_enrollment_request_shape() {
    let rec = Arc::new(Recorder::default());
    let app = Router::new()
        .route(
            "/enroll",
            post(|State(rec): State<Arc<Recorder>>, Json(body): Json<Value>| async move {
                rec.record(body);
                Json(json!({"success": true, "message": "Student enrolled", "faceId": "f-9", "studentId": "42"}))
            }),
        )
        .with_state(Arc::clone(&rec));
    let base = serve(app).await;

    let client = EnrollmentClient::new(http(Duration::from_secs(5)), format!("{base}/enroll"));
    let outcome = client.enroll(&image(), "42", "Ada Lovelace").await;

    assert!(outcome.success);
    assert_eq!(outcome.face_id.as_deref(), Some("f-9"));
    let bodies = rec.bodies.lock().unwrap();
    assert_eq!(bodies[0]["studentId"], "42");
    assert_eq!(bodies[0]["studentName"], "Ada Lovelace");
    assert_eq!(bodies[0]["image"], json!(image().to_base64()));
}

#[tokio::test]
async fn test_enrollment_server_error_not_retried() {
    let rec = Arc::new(Recorder::default());
    let app = Router::new()
        .route(
            "/enroll",
            post(|State(rec): State<Arc<Recorder>>, Json(body): Json<Value>| async move {
                rec.record(body);
                (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"success": false, "error": "busy"})))
            }),
        )
        .with_state(Arc::clone(&rec));
    let base = serve(app).await;

    let client = EnrollmentClient::new(http(Duration::from_secs(5)), format!("{base}/enroll"));
    let outcome = client.enroll(&image(), "42", "Ada").await;
    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some("busy"));
    assert_eq!(rec.hits(), 1);
}

#[tokio::test]
async fn test_admin_list_faces_and_ping() {
    let app = Router::new()
        .route(
            "/faces",
            get(|| async {
                Json(json!({
                    "success": true,
                    "totalFaces": 1,
                    "faces": [{"studentId": "42", "faceId": "f-1", "confidence": 99.5, "imageId": "i-1"}],
                    "collectionId": "students",
                    "region": "local"
                }))
            }),
        )
        .route(
            "/collection",
            post(|| async { Json(json!({"success": true, "message": "Collection created"})) }),
        )
        .route("/recognize", get(|| async { StatusCode::METHOD_NOT_ALLOWED }));
    let base = serve(app).await;

    let admin = AdminClient::new(
        http(Duration::from_secs(5)),
        format!("{base}/collection"),
        format!("{base}/faces"),
        format!("{base}/recognize"),
    );

    let faces = admin.list_faces().await.unwrap();
    assert_eq!(faces.total_faces, 1);
    assert_eq!(faces.faces[0].face_id, "f-1");

    let status = admin.create_collection().await.unwrap();
    assert!(status.success);
    assert_eq!(status.message, "Collection created");

    assert!(admin.ping().await);
}
