//! rollcall-core — Attendance flow orchestration and image transcoding.
//!
//! Drives one capture → recognize → mark-attendance attempt at a time against
//! remote collaborators, and exposes the result as a single display state.

pub mod orchestrator;
pub mod state;
pub mod transcode;
pub mod types;

pub use orchestrator::{
    AttemptPolicy, AttemptResult, AttendanceLedger, Cue, Haptics, NoHaptics, Orchestrator,
    PendingAttempt, Recognizer,
};
pub use state::{AttemptId, DisplayState, Failure, Recovery};
pub use transcode::{EncodedImage, TranscodeError, TranscodeOptions};
pub use types::{
    AttendanceOutcome, CapturedImage, Confidence, EnrollOutcome, IdentitySnapshot,
    RecognitionOutcome, Rejection,
};
