//! Display states of the attendance flow and the failures that lead to them.

use crate::types::{Confidence, IdentitySnapshot};
use std::fmt;
use thiserror::Error;

/// Token identifying one capture-to-terminal attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttemptId(pub(crate) u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why an attempt ended in the Error state. `Display` is the user-facing message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Failure {
    #[error("Could not process the captured image ({0}). Please try again.")]
    ImageProcessing(String),
    #[error("Recognition service unavailable ({0}). Please try again.")]
    RecognitionTransport(String),
    #[error("Face matched with {confidence}, below the required {threshold}. Please try again.")]
    LowConfidence {
        identity: String,
        confidence: Confidence,
        threshold: Confidence,
    },
    #[error("Attendance service unavailable ({0}). Please try again.")]
    AttendanceTransport(String),
    #[error("Attendance was not recorded: {0}")]
    AttendanceRejected(String),
    #[error("An unexpected error occurred during recognition.")]
    Unexpected(String),
}

impl Failure {
    /// True for failures caused by a network or service hiccup.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Failure::RecognitionTransport(_) | Failure::AttendanceTransport(_)
        )
    }
}

/// The single action offered to the user from a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Acknowledge a result and return to capturing.
    Done,
    /// Capture again.
    Retry,
    /// The face or identity is unknown; enroll it.
    Enroll,
}

/// The externally visible state of the attendance flow.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayState {
    Capturing,
    Processing {
        attempt: AttemptId,
    },
    Success {
        identity: IdentitySnapshot,
        confidence: Confidence,
        checked_in_at: String,
    },
    AlreadyMarked {
        identity: IdentitySnapshot,
        confidence: Confidence,
        first_check_in: Option<String>,
        message: String,
    },
    /// The recognition backend found no matching face.
    UnknownFace {
        reason: String,
    },
    /// The face matched, but the attendance directory has no such identity.
    UnknownInDirectory {
        identity: String,
        confidence: Confidence,
    },
    Error {
        failure: Failure,
    },
}

impl DisplayState {
    pub fn error(failure: Failure) -> Self {
        DisplayState::Error { failure }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, DisplayState::Capturing | DisplayState::Processing { .. })
    }

    /// Recovery action for terminal states; `None` while capturing or processing.
    pub fn recovery(&self) -> Option<Recovery> {
        match self {
            DisplayState::Capturing | DisplayState::Processing { .. } => None,
            DisplayState::Success { .. } | DisplayState::AlreadyMarked { .. } => Some(Recovery::Done),
            DisplayState::UnknownFace { .. } | DisplayState::UnknownInDirectory { .. } => {
                Some(Recovery::Enroll)
            }
            DisplayState::Error { .. } => Some(Recovery::Retry),
        }
    }

    /// Short state name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            DisplayState::Capturing => "capturing",
            DisplayState::Processing { .. } => "processing",
            DisplayState::Success { .. } => "success",
            DisplayState::AlreadyMarked { .. } => "already_marked",
            DisplayState::UnknownFace { .. } => "unknown_face",
            DisplayState::UnknownInDirectory { .. } => "unknown_in_directory",
            DisplayState::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_terminal_state_has_one_recovery() {
        let c = Confidence::new(90.0).unwrap();
        let terminal = [
            DisplayState::Success {
                identity: IdentitySnapshot::placeholder("1"),
                confidence: c,
                checked_in_at: "08:00".into(),
            },
            DisplayState::AlreadyMarked {
                identity: IdentitySnapshot::placeholder("1"),
                confidence: c,
                first_check_in: None,
                message: String::new(),
            },
            DisplayState::UnknownFace { reason: "no face".into() },
            DisplayState::UnknownInDirectory { identity: "1".into(), confidence: c },
            DisplayState::error(Failure::Unexpected("x".into())),
        ];
        for state in &terminal {
            assert!(state.is_terminal(), "{} should be terminal", state.name());
            assert!(state.recovery().is_some());
        }
        assert_eq!(DisplayState::Capturing.recovery(), None);
        assert_eq!(DisplayState::Processing { attempt: AttemptId(1) }.recovery(), None);
    }

    #[test]
    fn test_unknown_states_offer_enrollment() {
        let state = DisplayState::UnknownFace { reason: "no match".into() };
        assert_eq!(state.recovery(), Some(Recovery::Enroll));
    }

    #[test]
    fn test_low_confidence_message() {
        let f = Failure::LowConfidence {
            identity: "42".into(),
            confidence: Confidence::new(80.0).unwrap(),
            threshold: Confidence::new(95.0).unwrap(),
        };
        assert_eq!(
            f.to_string(),
            "Face matched with 80.0%, below the required 95.0%. Please try again."
        );
        assert!(!f.is_transient());
    }

    #[test]
    fn test_transport_failures_are_transient() {
        assert!(Failure::RecognitionTransport("timeout".into()).is_transient());
        assert!(Failure::AttendanceTransport("503".into()).is_transient());
        assert!(!Failure::ImageProcessing("bad".into()).is_transient());
    }
}
