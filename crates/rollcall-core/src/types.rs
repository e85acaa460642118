use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Recognition confidence as a percentage in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct Confidence(f32);

impl Confidence {
    pub const MAX: Confidence = Confidence(100.0);

    /// Returns `None` for NaN, infinities, and anything outside [0, 100].
    pub fn new(percent: f32) -> Option<Self> {
        if percent.is_finite() && (0.0..=100.0).contains(&percent) {
            Some(Self(percent))
        } else {
            None
        }
    }

    pub fn percent(self) -> f32 {
        self.0
    }

    /// True when this confidence is high enough to mark attendance.
    pub fn meets(self, threshold: Confidence) -> bool {
        self.0 >= threshold.0
    }
}

impl TryFrom<f32> for Confidence {
    type Error = String;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Confidence::new(value).ok_or_else(|| format!("confidence out of range [0, 100]: {value}"))
    }
}

impl From<Confidence> for f32 {
    fn from(c: Confidence) -> f32 {
        c.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}%", self.0)
    }
}

/// An image produced by a capture provider, not yet transcoded.
#[derive(Debug, Clone)]
pub enum CapturedImage {
    /// Encoded image on disk (JPEG, PNG, ...).
    File(PathBuf),
    /// Encoded image bytes in memory.
    Encoded(Vec<u8>),
    /// Base64 image, optionally wrapped in a `data:` URI.
    Base64(String),
    /// Raw 8-bit grayscale frame (row-major, width * height bytes).
    Gray {
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    },
}

/// Outcome of a recognition request.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionOutcome {
    Matched {
        identity: String,
        confidence: Confidence,
    },
    Unmatched {
        reason: String,
    },
    Failed {
        detail: String,
    },
}

/// Identity details returned by the attendance ledger, used for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentitySnapshot {
    pub id: String,
    pub name: String,
    pub photo_url: Option<String>,
    pub part_time_today: Option<bool>,
    pub check_in_time: Option<String>,
}

impl IdentitySnapshot {
    /// Snapshot used when the ledger does not return identity details.
    pub fn placeholder(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: format!("Student {id}"),
            ..Self::default()
        }
    }
}

/// Why the attendance ledger refused a check-in.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// The identity is not present in the attendance directory.
    DirectoryMiss { message: String },
    Other { message: String },
}

impl Rejection {
    /// Classify a rejection by its server text.
    ///
    /// Directory misses are recognised only by "not found" / "does not exist"
    /// phrasing, since the ledger reports no structured error code.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("not found") || lower.contains("does not exist") {
            Rejection::DirectoryMiss {
                message: message.to_string(),
            }
        } else {
            Rejection::Other {
                message: message.to_string(),
            }
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Rejection::DirectoryMiss { message } | Rejection::Other { message } => message,
        }
    }
}

/// Outcome of a mark-attendance request.
#[derive(Debug, Clone, PartialEq)]
pub enum AttendanceOutcome {
    Marked {
        identity: IdentitySnapshot,
        checked_in_at: String,
    },
    AlreadyMarked {
        identity: IdentitySnapshot,
        first_check_in: Option<String>,
        message: String,
    },
    Rejected(Rejection),
    /// Transport failure: timeout, connection error, 5xx, undecodable body.
    Failed {
        detail: String,
    },
}

/// Result of registering a face with the recognition backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrollOutcome {
    pub success: bool,
    pub message: String,
    pub face_id: Option<String>,
    pub error: Option<String>,
}

impl EnrollOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            message: format!("Enrollment failed: {error}"),
            face_id: None,
            error: Some(error),
        }
    }
}
