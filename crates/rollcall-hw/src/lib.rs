//! rollcall-hw — Camera still capture for attendance attempts.
//!
//! Provides V4L2-based capture of single grayscale stills with dark-frame
//! rejection, and a selector for switching between cameras.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, CameraSelector, DeviceInfo, PixelFormat};
pub use frame::Frame;
