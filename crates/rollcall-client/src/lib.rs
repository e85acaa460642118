//! rollcall-client — HTTP clients for the recognition and attendance backends.
//!
//! Every client folds transport failures into a discriminated outcome, so
//! callers in the attendance flow never see an `Err`.

pub mod admin;
pub mod attendance;
pub mod enrollment;
pub mod http;
pub mod recognition;
pub mod retry;

pub use admin::{AdminClient, CollectionStatus, EnrolledFace, FaceList};
pub use attendance::AttendanceClient;
pub use enrollment::EnrollmentClient;
pub use http::{ClientOptions, TransportError};
pub use recognition::RecognitionClient;
pub use retry::RetryPolicy;
pub use reqwest::Url;

/// Backend endpoint URLs.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub recognize: String,
    pub enroll: String,
    pub create_collection: String,
    pub list_faces: String,
    pub mark_attendance: String,
}

/// All clients, sharing one connection pool.
pub struct Backend {
    pub recognition: RecognitionClient,
    pub attendance: AttendanceClient,
    pub enrollment: EnrollmentClient,
    pub admin: AdminClient,
}

impl Backend {
    pub fn new(
        endpoints: &Endpoints,
        opts: &ClientOptions,
        retry: RetryPolicy,
        institute_id: Option<String>,
    ) -> Result<Self, TransportError> {
        let client = http::build_client(opts)?;
        Ok(Self {
            recognition: RecognitionClient::new(client.clone(), &endpoints.recognize, retry),
            attendance: AttendanceClient::new(client.clone(), &endpoints.mark_attendance, institute_id),
            enrollment: EnrollmentClient::new(client.clone(), &endpoints.enroll),
            admin: AdminClient::new(
                client,
                &endpoints.create_collection,
                &endpoints.list_faces,
                &endpoints.recognize,
            ),
        })
    }
}
