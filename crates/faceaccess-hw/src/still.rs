//! Still-image capture source: serves a picture from disk as if it came
//! from the camera. Useful on machines without a webcam.

use crate::frame::{Frame, FrameFormat};
use crate::source::CaptureSource;
use crate::CameraError;
use std::path::{Path, PathBuf};

pub struct StillImage {
    path: PathBuf,
    jpeg_quality: u8,
}

impl StillImage {
    /// Fails early if the file does not exist.
    pub fn open(path: impl AsRef<Path>, jpeg_quality: u8) -> Result<Self, CameraError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(CameraError::DeviceNotFound(path.display().to_string()));
        }
        Ok(Self {
            path: path.to_path_buf(),
            jpeg_quality,
        })
    }
}

impl CaptureSource for StillImage {
    fn describe(&self) -> String {
        format!("still image {}", self.path.display())
    }

    /// Re-reads the file on every call and re-encodes it as JPEG.
    fn capture_still(&mut self) -> Result<Vec<u8>, CameraError> {
        let bytes = std::fs::read(&self.path)?;
        let rgb = image::load_from_memory(&bytes)?.to_rgb8();
        let (width, height) = rgb.dimensions();
        let frame = Frame::new(rgb.into_raw(), FrameFormat::Rgb8, width, height, 0)?;
        if frame.is_dark {
            tracing::warn!(path = %self.path.display(), "still image is almost entirely dark");
        }
        Ok(frame.encode_jpeg(self.jpeg_quality)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    fn temp_png() -> NamedTempFile {
        let file = Builder::new().suffix(".png").tempfile().unwrap();
        let img = image::RgbImage::from_fn(8, 6, |x, y| image::Rgb([(x * 30) as u8, (y * 40) as u8, 128]));
        img.save(file.path()).unwrap();
        file
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = StillImage::open(dir.path().join("face.png"), 80).err().unwrap();
        assert!(matches!(err, CameraError::DeviceNotFound(_)));
    }

    #[test]
    fn test_directory_is_not_a_still() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            StillImage::open(dir.path(), 80),
            Err(CameraError::DeviceNotFound(_))
        ));
    }

    #[test]
    fn test_capture_reencodes_as_jpeg() {
        let file = temp_png();
        let mut source = StillImage::open(file.path(), 80).unwrap();
        let jpeg = source.capture_still().unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 6));
        assert!(source.describe().contains("still image"));
    }

    #[test]
    fn test_capture_rejects_non_image() {
        let mut file = Builder::new().suffix(".jpg").tempfile().unwrap();
        file.write_all(b"definitely not an image").unwrap();
        let mut source = StillImage::open(file.path(), 80).unwrap();
        assert!(matches!(source.capture_still(), Err(CameraError::Image(_))));
    }
}
