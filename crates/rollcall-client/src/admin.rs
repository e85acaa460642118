//! Face collection administration: initialise, list enrolled faces, ping.

use crate::http::{self, string_or_number, TransportError};
use serde::Deserialize;
use std::time::Duration;

const PING_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectionStatus {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledFace {
    #[serde(default, deserialize_with = "string_or_number")]
    pub student_id: Option<String>,
    pub face_id: String,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub image_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceList {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub total_faces: usize,
    #[serde(default)]
    pub faces: Vec<EnrolledFace>,
    #[serde(default)]
    pub collection_id: String,
    #[serde(default)]
    pub region: String,
    pub error: Option<String>,
}

pub struct AdminClient {
    http: reqwest::Client,
    create_collection_url: String,
    list_faces_url: String,
    recognize_url: String,
}

impl AdminClient {
    pub fn new(
        http: reqwest::Client,
        create_collection_url: impl Into<String>,
        list_faces_url: impl Into<String>,
        recognize_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            create_collection_url: create_collection_url.into(),
            list_faces_url: list_faces_url.into(),
            recognize_url: recognize_url.into(),
        }
    }

    /// Create the backend face collection.
    pub async fn create_collection(&self) -> Result<CollectionStatus, TransportError> {
        tracing::info!(url = %self.create_collection_url, "creating face collection");
        http::post_json(&self.http, &self.create_collection_url, &serde_json::json!({}))
            .await?
            .error_for_status()?
            .json()
    }

    pub async fn list_faces(&self) -> Result<FaceList, TransportError> {
        let list: FaceList = http::get(&self.http, &self.list_faces_url, None)
            .await?
            .error_for_status()?
            .json()?;
        tracing::info!(total = list.total_faces, returned = list.faces.len(), "fetched enrolled faces");
        Ok(list)
    }

    /// True if the recognition endpoint answers at all, whatever the status.
    pub async fn ping(&self) -> bool {
        match http::get(&self.http, &self.recognize_url, Some(PING_TIMEOUT)).await {
            Ok(reply) => {
                tracing::info!(status = reply.status.as_u16(), "recognition endpoint reachable");
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "recognition endpoint unreachable");
                false
            }
        }
    }
}
