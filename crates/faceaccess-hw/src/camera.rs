//! V4L2 webcam capture via the `v4l` crate.

use crate::frame::{self, Frame, FrameFormat};
use crate::source::{CaptureSettings, CaptureSource};
use crate::CameraError;
use std::path::Path;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

/// Requested capture size; drivers may negotiate something else.
const REQUESTED_WIDTH: u32 = 640;
const REQUESTED_HEIGHT: u32 = 480;

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel), converted to RGB.
    Yuyv,
    /// Motion-JPEG, one compressed image per buffer.
    Mjpeg,
    /// 8-bit grayscale.
    Grey,
}

/// V4L2 camera device handle. Dropping it releases the device.
pub struct Camera {
    device: Device,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pub fourcc: FourCC,
    pixel_format: PixelFormat,
    settings: CaptureSettings,
}

impl Camera {
    /// Open a V4L2 camera device by path (e.g., "/dev/video0").
    pub fn open(device_path: &str, settings: CaptureSettings) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            if e.to_string().contains("busy") || e.to_string().contains("EBUSY") {
                CameraError::DeviceBusy
            } else {
                CameraError::DeviceNotFound(format!("{device_path}: {e}"))
            }
        })?;

        let caps = device.query_caps().map_err(|e| {
            CameraError::CaptureFailed(format!("failed to query capabilities: {e}"))
        })?;

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::StreamingNotSupported);
        }

        // Ask for YUYV; most webcams accept it, the rest fall back to MJPG or GREY.
        let mut fmt = device.format().map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
        })?;
        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = REQUESTED_WIDTH;
        fmt.height = REQUESTED_HEIGHT;

        let negotiated = device.set_format(&fmt).map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to set format: {e}"))
        })?;

        let fourcc = negotiated.fourcc;
        let pixel_format = if fourcc == FourCC::new(b"YUYV") {
            PixelFormat::Yuyv
        } else if fourcc == FourCC::new(b"MJPG") {
            PixelFormat::Mjpeg
        } else if fourcc == FourCC::new(b"GREY") {
            PixelFormat::Grey
        } else {
            return Err(CameraError::FormatNegotiationFailed(format!(
                "unsupported pixel format: {fourcc:?} (need YUYV, MJPG, or GREY)"
            )));
        };

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?fourcc,
            "negotiated format"
        );

        Ok(Self {
            device,
            width: negotiated.width,
            height: negotiated.height,
            device_path: device_path.to_string(),
            fourcc,
            pixel_format,
            settings,
        })
    }

    /// Decode a raw driver buffer into a frame.
    fn decode(&self, buf: &[u8], sequence: u32) -> Result<Frame, CameraError> {
        let frame = match self.pixel_format {
            PixelFormat::Yuyv => {
                let rgb = frame::yuyv_to_rgb(buf, self.width, self.height)?;
                Frame::new(rgb, FrameFormat::Rgb8, self.width, self.height, sequence)?
            }
            PixelFormat::Grey => {
                Frame::new(buf.to_vec(), FrameFormat::Gray8, self.width, self.height, sequence)?
            }
            PixelFormat::Mjpeg => {
                let decoded = image::load_from_memory_with_format(buf, image::ImageFormat::Jpeg)?
                    .to_rgb8();
                let (width, height) = decoded.dimensions();
                Frame::new(decoded.into_raw(), FrameFormat::Rgb8, width, height, sequence)?
            }
        };
        Ok(frame)
    }

    /// Grab up to `count * 3` raw buffers and return the first `count`
    /// non-dark frames, plus how many dark ones were skipped.
    pub fn capture_frames(&self, count: usize) -> Result<(Vec<Frame>, usize), CameraError> {
        let max_attempts = count * 3;
        let mut good_frames = Vec::with_capacity(count);
        let mut dark_count = 0usize;

        let mut stream =
            MmapStream::with_buffers(&self.device, BufType::VideoCapture, 4).map_err(|e| {
                CameraError::CaptureFailed(format!("failed to create mmap stream: {e}"))
            })?;

        for _ in 0..max_attempts {
            if good_frames.len() >= count {
                break;
            }

            let (buf, meta) = stream.next().map_err(|e| {
                CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}"))
            })?;

            let frame = self.decode(buf, meta.sequence)?;
            if frame.is_dark {
                dark_count += 1;
                tracing::debug!(seq = meta.sequence, "skipping dark frame");
                continue;
            }
            good_frames.push(frame);
        }

        Ok((good_frames, dark_count))
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        let mut devices = Vec::new();

        for i in 0..16 {
            let path = format!("/dev/video{i}");
            if !Path::new(&path).exists() {
                continue;
            }
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
                continue;
            }
            devices.push(DeviceInfo {
                path,
                name: caps.card.clone(),
                driver: caps.driver.clone(),
                bus: caps.bus.clone(),
            });
        }

        devices
    }
}

impl CaptureSource for Camera {
    fn describe(&self) -> String {
        format!("{} ({}x{} {:?})", self.device_path, self.width, self.height, self.pixel_format)
    }

    /// Discard frames while auto-exposure settles.
    fn warm_up(&mut self, frames: usize) -> Result<(), CameraError> {
        if frames > 0 {
            tracing::info!(count = frames, "discarding warmup frames");
            let _ = self.capture_frames(frames)?;
        }
        Ok(())
    }

    /// Keep the last non-dark frame of a short burst; later frames have had
    /// more time for exposure to settle.
    fn capture_still(&mut self) -> Result<Vec<u8>, CameraError> {
        let (mut frames, dark_skipped) = self.capture_frames(self.settings.frames.max(1))?;
        tracing::debug!(captured = frames.len(), dark_skipped, "captured burst");

        let frame = frames.pop().ok_or(CameraError::NoUsableFrame { dark_skipped })?;
        let jpeg = frame.encode_jpeg(self.settings.jpeg_quality)?;
        tracing::debug!(seq = frame.sequence, bytes = jpeg.len(), "encoded still");
        Ok(jpeg)
    }
}
