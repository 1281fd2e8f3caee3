//! Capture source abstraction.

use crate::CameraError;

/// Knobs for turning a burst of frames into one still.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Non-dark frames to grab per still.
    pub frames: usize,
    /// JPEG quality, 1–100.
    pub jpeg_quality: u8,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            frames: 3,
            jpeg_quality: 80,
        }
    }
}

/// Something that can produce a JPEG still on demand.
///
/// Implementations own their device exclusively; dropping the source
/// releases it.
pub trait CaptureSource: Send {
    /// Short description for logs.
    fn describe(&self) -> String;

    /// Prepare the device before the first still. Default: nothing to do.
    fn warm_up(&mut self, _frames: usize) -> Result<(), CameraError> {
        Ok(())
    }

    /// Capture one still, JPEG-encoded.
    fn capture_still(&mut self) -> Result<Vec<u8>, CameraError>;
}

impl<S: CaptureSource + ?Sized> CaptureSource for Box<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn warm_up(&mut self, frames: usize) -> Result<(), CameraError> {
        (**self).warm_up(frames)
    }

    fn capture_still(&mut self) -> Result<Vec<u8>, CameraError> {
        (**self).capture_still()
    }
}
