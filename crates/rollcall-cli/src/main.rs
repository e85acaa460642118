mod capture;
mod config;
mod kiosk;
mod render;

use anyhow::{Context, Result};
use capture::Source;
use clap::{Args, Parser, Subcommand};
use config::Config;
use render::{render, TerminalHaptics};
use rollcall_client::{AttendanceClient, Backend, RecognitionClient};
use rollcall_core::{CapturedImage, DisplayState, Haptics, NoHaptics, Orchestrator};
use rollcall_hw::Camera;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "rollcall", about = "Face recognition attendance client")]
struct Cli {
    /// Path to a TOML config file (default: $ROLLCALL_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ImageSource {
    /// Use a still image from disk instead of the camera
    #[arg(long, conflicts_with = "device")]
    image: Option<PathBuf>,
    /// Camera device to capture from (repeatable; overrides config)
    #[arg(long)]
    device: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the interactive attendance kiosk
    Kiosk {
        #[command(flatten)]
        source: ImageSource,
    },
    /// Run a single attendance attempt and exit
    Mark {
        #[command(flatten)]
        source: ImageSource,
        /// Do not ring the terminal bell on check-in
        #[arg(short, long)]
        quiet: bool,
    },
    /// Enroll a student's face
    Enroll {
        /// Student identifier
        #[arg(long)]
        id: String,
        /// Student display name
        #[arg(long)]
        name: String,
        #[command(flatten)]
        source: ImageSource,
    },
    /// List faces enrolled in the backend collection
    Faces,
    /// Create the backend face collection
    InitCollection,
    /// Check that the recognition endpoint is reachable
    Ping,
    /// List video capture devices
    Devices,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rollcall=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Devices = cli.command {
        list_devices();
        return Ok(ExitCode::SUCCESS);
    }

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    let backend = Backend::new(
        &config.endpoints(),
        &config.client_options(),
        config.retry_policy(),
        config.institute(),
    )
    .context("failed to build HTTP client")?;

    match cli.command {
        Commands::Kiosk { source } => {
            let mut source = open_source(source, &config)?;
            let mut orch = orchestrator(backend, &config, TerminalHaptics);
            let input = tokio::io::BufReader::new(tokio::io::stdin());
            kiosk::run(&mut orch, &mut source, input).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Mark { source, quiet } => {
            let source = open_source(source, &config)?;
            let image = source.capture().await?;
            Ok(if quiet {
                mark_once(orchestrator(backend, &config, NoHaptics), image).await
            } else {
                mark_once(orchestrator(backend, &config, TerminalHaptics), image).await
            })
        }
        Commands::Enroll { id, name, source } => {
            let source = open_source(source, &config)?;
            let image = source.capture().await?;
            let opts = config.attempt_policy().transcode;
            let encoded = tokio::task::spawn_blocking(move || {
                rollcall_core::transcode::transcode(&image, &opts)
            })
            .await
            .context("transcode task failed")?
            .context("failed to process image")?;

            let outcome = backend.enrollment.enroll(&encoded, &id, &name).await;
            println!("{}", outcome.message);
            if let Some(face_id) = &outcome.face_id {
                println!("face id: {face_id}");
            }
            Ok(if outcome.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Faces => {
            let list = backend.admin.list_faces().await.context("failed to list faces")?;
            if list.faces.is_empty() {
                println!("No faces enrolled");
            } else {
                println!("{:<16} {:<40} {:>8}", "STUDENT", "FACE ID", "CONF");
                for face in &list.faces {
                    println!(
                        "{:<16} {:<40} {:>7.1}%",
                        face.student_id.as_deref().unwrap_or("-"),
                        face.face_id,
                        face.confidence
                    );
                }
            }
            println!("{} face(s) in collection {:?}", list.total_faces, list.collection_id);
            Ok(ExitCode::SUCCESS)
        }
        Commands::InitCollection => {
            let status = backend
                .admin
                .create_collection()
                .await
                .context("failed to create collection")?;
            println!("{}", status.message);
            Ok(if status.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Ping => {
            if backend.admin.ping().await {
                println!("recognition endpoint reachable");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("recognition endpoint unreachable");
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Devices => Ok(ExitCode::SUCCESS),
    }
}

fn orchestrator<H: Haptics>(
    backend: Backend,
    config: &Config,
    haptics: H,
) -> Orchestrator<RecognitionClient, AttendanceClient, H> {
    let Backend {
        recognition,
        attendance,
        ..
    } = backend;
    Orchestrator::new(
        Arc::new(recognition),
        Arc::new(attendance),
        haptics,
        config.attempt_policy(),
    )
}

async fn mark_once<H: Haptics>(
    mut orch: Orchestrator<RecognitionClient, AttendanceClient, H>,
    image: CapturedImage,
) -> ExitCode {
    let state = orch.run(image).await;
    println!("{}", render(state));
    match state {
        DisplayState::Success { .. } | DisplayState::AlreadyMarked { .. } => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

fn open_source(source: ImageSource, config: &Config) -> Result<Source> {
    if let Some(path) = source.image {
        return Ok(Source::File(path));
    }
    let devices = if source.device.is_empty() {
        config.camera_devices.clone()
    } else {
        source.device
    };
    Source::camera(devices, config.capture_attempts)
}

fn list_devices() {
    let devices = Camera::list_devices();
    if devices.is_empty() {
        println!("No video capture devices found");
        return;
    }
    for dev in devices {
        println!("{}  {} ({}, {})", dev.path, dev.name, dev.driver, dev.bus);
    }
}
