//! faceaccess-hw — Capture sources for the access gate.
//!
//! Provides V4L2 webcam capture, a still-image source, and the frame
//! processing needed to hand the backend a usable JPEG.

pub mod camera;
pub mod frame;
pub mod source;
pub mod still;

pub use camera::{Camera, DeviceInfo, PixelFormat};
pub use frame::{Frame, FrameError, FrameFormat};
pub use source::{CaptureSettings, CaptureSource};
pub use still::StillImage;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
    #[error("no usable frame ({dark_skipped} dark frames skipped)")]
    NoUsableFrame { dark_skipped: usize },
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
