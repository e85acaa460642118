//! Interactive attendance loop driven by line input (stdin in the binary).

use crate::capture::Source;
use crate::render::render;
use anyhow::Result;
use rollcall_core::{AttendanceLedger, DisplayState, Haptics, Orchestrator, Recognizer};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// A user intent read from one input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Capture while capturing; acknowledge (retry / done) from a result.
    Primary,
    SwitchCamera,
    Dismiss,
    Quit,
    Unknown,
}

impl Intent {
    pub fn parse(line: &str) -> Self {
        match line.trim().to_ascii_lowercase().as_str() {
            "" | "c" | "capture" => Intent::Primary,
            "s" | "switch" => Intent::SwitchCamera,
            "r" | "retry" | "d" | "done" => Intent::Dismiss,
            "q" | "quit" | "exit" => Intent::Quit,
            _ => Intent::Unknown,
        }
    }
}

fn show(state: &DisplayState) {
    println!("\n{}", render(state));
}

/// Runs until `q` or end of input. Input read while an attempt is in flight
/// never starts a second capture; quitting mid-attempt navigates away.
pub async fn run<R, A, H, I>(
    orch: &mut Orchestrator<R, A, H>,
    source: &mut Source,
    input: I,
) -> Result<()>
where
    R: Recognizer,
    A: AttendanceLedger,
    H: Haptics,
    I: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    show(orch.state());

    while let Some(line) = lines.next_line().await? {
        let intent = Intent::parse(&line);
        let capturing = matches!(orch.state(), DisplayState::Capturing);

        match intent {
            Intent::Quit => break,
            Intent::Unknown => {
                println!("unrecognized input {:?}", line.trim());
                continue;
            }
            Intent::SwitchCamera if capturing => match source.switch() {
                Some(device) => println!("using camera {device}"),
                None => println!("no camera to switch to"),
            },
            Intent::SwitchCamera => {}
            Intent::Primary | Intent::Dismiss if !capturing => {
                orch.reset();
                show(orch.state());
            }
            Intent::Dismiss => {}
            Intent::Primary => {
                let image = match source.capture().await {
                    Ok(image) => image,
                    Err(err) => {
                        tracing::warn!(error = %err, "capture failed");
                        println!("capture failed: {err:#}");
                        continue;
                    }
                };
                let Some(pending) = orch.capture_completed(image) else {
                    continue;
                };
                show(orch.state());

                let finish = pending.finish();
                tokio::pin!(finish);
                loop {
                    tokio::select! {
                        result = &mut finish => {
                            orch.apply(result);
                            break;
                        }
                        line = lines.next_line() => match line?.as_deref().map(Intent::parse) {
                            None | Some(Intent::Quit) => {
                                orch.navigate_away();
                                return Ok(());
                            }
                            Some(intent) => {
                                tracing::debug!(?intent, "input ignored while processing");
                            }
                        },
                    }
                }
                show(orch.state());
            }
        }
    }

    orch.navigate_away();
    Ok(())
}
