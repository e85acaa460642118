//! Attendance orchestration: capture → transcode → recognize → mark attendance.
//!
//! The orchestrator owns the single current [`DisplayState`]. An attempt runs
//! as a tokio task; its result is applied only if the orchestrator is still
//! processing that same attempt, so a late response for an abandoned attempt
//! never overwrites a newer state.

use crate::state::{AttemptId, DisplayState, Failure};
use crate::transcode::{self, EncodedImage, TranscodeOptions};
use crate::types::{AttendanceOutcome, CapturedImage, Confidence, RecognitionOutcome, Rejection};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;

const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 95.0;

/// Remote face recognition backend.
pub trait Recognizer: Send + Sync + 'static {
    /// Never fails: transport problems are reported as [`RecognitionOutcome::Failed`].
    fn recognize(&self, image: &EncodedImage) -> impl Future<Output = RecognitionOutcome> + Send;
}

/// Remote attendance ledger.
pub trait AttendanceLedger: Send + Sync + 'static {
    fn mark_attendance(
        &self,
        identity: &str,
        confidence: Confidence,
    ) -> impl Future<Output = AttendanceOutcome> + Send;
}

/// User feedback cue fired when a check-in is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    CheckedIn,
    AlreadyCheckedIn,
}

impl Cue {
    /// Vibration pattern in milliseconds (alternating on/off).
    pub fn pattern_ms(self) -> &'static [u64] {
        match self {
            Cue::CheckedIn => &[200],
            Cue::AlreadyCheckedIn => &[100, 50, 100],
        }
    }
}

/// Haptic (or equivalent) feedback sink.
pub trait Haptics {
    fn signal(&self, cue: Cue);
}

/// Discards every cue.
pub struct NoHaptics;

impl Haptics for NoHaptics {
    fn signal(&self, _cue: Cue) {}
}

/// Per-attempt settings.
#[derive(Debug, Clone)]
pub struct AttemptPolicy {
    /// Minimum confidence before the attendance ledger is contacted.
    pub threshold: Confidence,
    pub transcode: TranscodeOptions,
}

impl Default for AttemptPolicy {
    fn default() -> Self {
        Self {
            threshold: Confidence::new(DEFAULT_CONFIDENCE_THRESHOLD).unwrap_or(Confidence::MAX),
            transcode: TranscodeOptions::default(),
        }
    }
}

/// Terminal state produced by a finished attempt.
#[derive(Debug, Clone)]
pub struct AttemptResult {
    pub attempt: AttemptId,
    pub state: DisplayState,
}

/// Handle to an in-flight attempt.
pub struct PendingAttempt {
    attempt: AttemptId,
    task: JoinHandle<DisplayState>,
}

impl PendingAttempt {
    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Wait for the attempt. A panic inside the attempt becomes an Error state.
    pub async fn finish(self) -> AttemptResult {
        let state = match self.task.await {
            Ok(state) => state,
            Err(err) => {
                tracing::error!(attempt = %self.attempt, error = %err, "attempt task failed");
                DisplayState::error(Failure::Unexpected(err.to_string()))
            }
        };
        AttemptResult {
            attempt: self.attempt,
            state,
        }
    }
}

pub struct Orchestrator<R, A, H> {
    recognizer: Arc<R>,
    ledger: Arc<A>,
    haptics: H,
    policy: AttemptPolicy,
    state: DisplayState,
    next_attempt: u64,
}

impl<R, A, H> Orchestrator<R, A, H>
where
    R: Recognizer,
    A: AttendanceLedger,
    H: Haptics,
{
    pub fn new(recognizer: Arc<R>, ledger: Arc<A>, haptics: H, policy: AttemptPolicy) -> Self {
        Self {
            recognizer,
            ledger,
            haptics,
            policy,
            state: DisplayState::Capturing,
            next_attempt: 1,
        }
    }

    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    /// Start an attempt from a completed capture.
    ///
    /// Only valid while capturing; in any other state the image is dropped
    /// and `None` is returned.
    pub fn capture_completed(&mut self, image: CapturedImage) -> Option<PendingAttempt> {
        if !matches!(self.state, DisplayState::Capturing) {
            tracing::debug!(state = self.state.name(), "capture ignored");
            return None;
        }

        let attempt = AttemptId(self.next_attempt);
        self.next_attempt += 1;
        self.state = DisplayState::Processing { attempt };
        tracing::info!(%attempt, "attempt started");

        let task = tokio::spawn(run_attempt(
            Arc::clone(&self.recognizer),
            Arc::clone(&self.ledger),
            image,
            self.policy.clone(),
        ));
        Some(PendingAttempt { attempt, task })
    }

    /// Apply a finished attempt. Returns `false` if the result is stale.
    pub fn apply(&mut self, result: AttemptResult) -> bool {
        match self.state {
            DisplayState::Processing { attempt } if attempt == result.attempt => {}
            _ => {
                tracing::debug!(
                    attempt = %result.attempt,
                    state = self.state.name(),
                    "discarding stale attempt result"
                );
                return false;
            }
        }

        match &result.state {
            DisplayState::Success { .. } => self.haptics.signal(Cue::CheckedIn),
            DisplayState::AlreadyMarked { .. } => self.haptics.signal(Cue::AlreadyCheckedIn),
            _ => {}
        }

        tracing::info!(attempt = %result.attempt, state = result.state.name(), "attempt finished");
        self.state = result.state;
        true
    }

    /// Retry / done: return to capturing and forget the current attempt.
    pub fn reset(&mut self) {
        if let DisplayState::Processing { attempt } = self.state {
            tracing::debug!(%attempt, "abandoning in-flight attempt");
        }
        self.state = DisplayState::Capturing;
    }

    /// The screen was left. Any in-flight request keeps running; its result
    /// will be discarded.
    pub fn navigate_away(&mut self) {
        self.reset();
    }

    /// Run one full attempt and return the resulting state.
    pub async fn run(&mut self, image: CapturedImage) -> &DisplayState {
        if let Some(pending) = self.capture_completed(image) {
            let result = pending.finish().await;
            self.apply(result);
        }
        &self.state
    }
}

async fn run_attempt<R, A>(
    recognizer: Arc<R>,
    ledger: Arc<A>,
    image: CapturedImage,
    policy: AttemptPolicy,
) -> DisplayState
where
    R: Recognizer,
    A: AttendanceLedger,
{
    let opts = policy.transcode.clone();
    let encoded = match tokio::task::spawn_blocking(move || transcode::transcode(&image, &opts)).await {
        Ok(Ok(encoded)) => encoded,
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "image processing failed");
            return DisplayState::error(Failure::ImageProcessing(err.to_string()));
        }
        Err(err) => return DisplayState::error(Failure::Unexpected(err.to_string())),
    };

    let (identity, confidence) = match recognizer.recognize(&encoded).await {
        RecognitionOutcome::Matched {
            identity,
            confidence,
        } => (identity, confidence),
        RecognitionOutcome::Unmatched { reason } => {
            tracing::info!(%reason, "face not recognised");
            return DisplayState::UnknownFace { reason };
        }
        RecognitionOutcome::Failed { detail } => {
            tracing::warn!(%detail, "recognition failed");
            return DisplayState::error(Failure::RecognitionTransport(detail));
        }
    };
    drop(encoded);

    if !confidence.meets(policy.threshold) {
        tracing::info!(
            %identity,
            confidence = confidence.percent(),
            threshold = policy.threshold.percent(),
            "confidence below threshold"
        );
        return DisplayState::error(Failure::LowConfidence {
            identity,
            confidence,
            threshold: policy.threshold,
        });
    }

    tracing::info!(%identity, confidence = confidence.percent(), "marking attendance");
    match ledger.mark_attendance(&identity, confidence).await {
        AttendanceOutcome::Marked {
            identity,
            checked_in_at,
        } => DisplayState::Success {
            identity,
            confidence,
            checked_in_at,
        },
        AttendanceOutcome::AlreadyMarked {
            identity,
            first_check_in,
            message,
        } => DisplayState::AlreadyMarked {
            identity,
            confidence,
            first_check_in,
            message,
        },
        AttendanceOutcome::Rejected(Rejection::DirectoryMiss { message }) => {
            tracing::info!(%identity, %message, "identity not in attendance directory");
            DisplayState::UnknownInDirectory {
                identity,
                confidence,
            }
        }
        AttendanceOutcome::Rejected(Rejection::Other { message }) => {
            DisplayState::error(Failure::AttendanceRejected(message))
        }
        AttendanceOutcome::Failed { detail } => {
            DisplayState::error(Failure::AttendanceTransport(detail))
        }
    }
}
