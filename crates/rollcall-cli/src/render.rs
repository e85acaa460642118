//! Text rendering of display states for the terminal.

use rollcall_core::{Cue, DisplayState, Haptics, Recovery};

/// Render the current state as the lines shown to the user.
pub fn render(state: &DisplayState) -> String {
    let body = match state {
        DisplayState::Capturing => "Look at the camera.".to_string(),
        DisplayState::Processing { .. } => "Recognizing...".to_string(),
        DisplayState::Success {
            identity,
            confidence,
            checked_in_at,
        } => {
            let mut out = format!(
                "Welcome, {}!\nChecked in at {checked_in_at} (match {confidence})",
                identity.name
            );
            if identity.part_time_today == Some(true) {
                out.push_str("\nPart-time today");
            }
            out
        }
        DisplayState::AlreadyMarked {
            identity,
            first_check_in,
            message,
            ..
        } => match first_check_in {
            Some(at) => format!("{}: {message}\nFirst check-in at {at}", identity.name),
            None => format!("{}: {message}", identity.name),
        },
        DisplayState::UnknownFace { reason } => {
            format!("Face not recognized ({reason}).")
        }
        DisplayState::UnknownInDirectory { identity, .. } => {
            format!("Face matched student {identity}, but they are not in the attendance directory.")
        }
        DisplayState::Error { failure } => failure.to_string(),
    };

    match state.recovery() {
        Some(recovery) => format!("{body}\n{}", hint(recovery)),
        None if matches!(state, DisplayState::Capturing) => {
            format!("{body}\n[Enter] capture  [s] switch camera  [q] quit")
        }
        None => body,
    }
}

fn hint(recovery: Recovery) -> &'static str {
    match recovery {
        Recovery::Done => "[Enter] done",
        Recovery::Retry => "[Enter] try again",
        Recovery::Enroll => "[Enter] continue  (enroll with `rollcall enroll --id ID --name NAME`)",
    }
}

/// Rings the terminal bell once per pulse of the cue's pattern.
pub struct TerminalHaptics;

impl Haptics for TerminalHaptics {
    fn signal(&self, cue: Cue) {
        let pulses = cue.pattern_ms().iter().step_by(2).count();
        eprint!("{}", "\x07".repeat(pulses));
        tracing::debug!(?cue, pulses, "haptic cue");
    }
}
