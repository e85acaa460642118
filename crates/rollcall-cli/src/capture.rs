use anyhow::{Context, Result};
use rollcall_core::CapturedImage;
use rollcall_hw::{Camera, CameraSelector};
use std::path::PathBuf;

/// Where captured images come from.
pub enum Source {
    /// A still image on disk, reused on every capture.
    File(PathBuf),
    Camera {
        selector: CameraSelector,
        attempts: usize,
    },
}

impl Source {
    pub fn camera(devices: Vec<String>, attempts: usize) -> Result<Self> {
        let selector = if devices.is_empty() {
            CameraSelector::discover()
        } else {
            CameraSelector::new(devices)
        }
        .context("no camera available")?;
        Ok(Source::Camera { selector, attempts })
    }

    pub async fn capture(&self) -> Result<CapturedImage> {
        match self {
            Source::File(path) => {
                if !path.exists() {
                    anyhow::bail!("image not found: {}", path.display());
                }
                Ok(CapturedImage::File(path.clone()))
            }
            Source::Camera { selector, attempts } => {
                let device = selector.active().to_string();
                let attempts = *attempts;
                let frame = tokio::task::spawn_blocking(move || {
                    Camera::open(&device)?.capture_still(attempts)
                })
                .await
                .context("capture task failed")?
                .context("camera capture failed")?;
                Ok(frame.into())
            }
        }
    }

    /// Switch to the next camera. Returns the new device, if switching applies.
    pub fn switch(&mut self) -> Option<String> {
        match self {
            Source::File(_) => None,
            Source::Camera { selector, .. } => Some(selector.switch().to_string()),
        }
    }
}
