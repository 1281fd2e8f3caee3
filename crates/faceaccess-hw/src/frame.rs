//! Frame type and conversions: YUYV to RGB, luma, dark detection, JPEG encoding.

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

/// Pixel layout of a [`Frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// 3 bytes per pixel, R G B.
    Rgb8,
    /// 1 byte per pixel.
    Gray8,
}

impl FrameFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb8 => 3,
            Self::Gray8 => 1,
        }
    }

    fn color_type(self) -> ExtendedColorType {
        match self {
            Self::Rgb8 => ExtendedColorType::Rgb8,
            Self::Gray8 => ExtendedColorType::L8,
        }
    }
}

/// A captured camera frame.
#[derive(Clone)]
pub struct Frame {
    pub pixels: Vec<u8>,
    pub format: FrameFormat,
    pub width: u32,
    pub height: u32,
    pub sequence: u32,
    pub is_dark: bool,
}

impl Frame {
    /// Build a frame and classify it as dark or not.
    pub fn new(
        pixels: Vec<u8>,
        format: FrameFormat,
        width: u32,
        height: u32,
        sequence: u32,
    ) -> Result<Self, FrameError> {
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if pixels.len() < expected {
            return Err(FrameError::InvalidLength {
                expected,
                actual: pixels.len(),
            });
        }
        let mut frame = Self {
            pixels,
            format,
            width,
            height,
            sequence,
            is_dark: false,
        };
        frame.pixels.truncate(expected);
        frame.is_dark = is_dark_frame(&frame.luma(), DARK_FRAME_THRESHOLD);
        Ok(frame)
    }

    /// Per-pixel luma (BT.601 weights for RGB).
    pub fn luma(&self) -> Vec<u8> {
        match self.format {
            FrameFormat::Gray8 => self.pixels.clone(),
            FrameFormat::Rgb8 => self
                .pixels
                .chunks_exact(3)
                .map(|px| {
                    let y = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
                    y.round().clamp(0.0, 255.0) as u8
                })
                .collect(),
        }
    }

    /// Average luma (0.0–255.0).
    pub fn avg_brightness(&self) -> f32 {
        let luma = self.luma();
        if luma.is_empty() {
            return 0.0;
        }
        luma.iter().map(|&b| b as f32).sum::<f32>() / luma.len() as f32
    }

    /// Encode as baseline JPEG at `quality` (1–100).
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, FrameError> {
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100)).encode(
            &self.pixels,
            self.width,
            self.height,
            self.format.color_type(),
        )?;
        Ok(out)
    }
}

/// Share of near-black pixels above which a frame is rejected.
pub const DARK_FRAME_THRESHOLD: f32 = 0.95;

/// Convert packed YUYV (4:2:2) to RGB using BT.601 coefficients.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share
/// the chroma pair.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = width as usize * height as usize * 2;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for chunk in yuyv[..expected].chunks_exact(4) {
        let u = chunk[1] as f32 - 128.0;
        let v = chunk[3] as f32 - 128.0;
        for y in [chunk[0], chunk[2]] {
            let y = y as f32;
            rgb.push(clamp_u8(y + 1.402 * v));
            rgb.push(clamp_u8(y - 0.344_136 * u - 0.714_136 * v));
            rgb.push(clamp_u8(y + 1.772 * u));
        }
    }
    Ok(rgb)
}

fn clamp_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// True if more than `threshold_pct` of pixels fall in the darkest bucket (0–31).
/// A lens cap or an unlit room gives nothing the backend can recognize.
pub fn is_dark_frame(luma: &[u8], threshold_pct: f32) -> bool {
    if luma.is_empty() {
        return true;
    }
    let dark_count = luma.iter().filter(|&&p| p < 32).count();
    (dark_count as f32 / luma.len() as f32) > threshold_pct
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("JPEG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_neutral_chroma_is_gray() {
        // 2x1 image: [Y0=100, U=128, Y1=200, V=128]
        let rgb = yuyv_to_rgb(&[100, 128, 200, 128], 2, 1).unwrap();
        assert_eq!(rgb, vec![100, 100, 100, 200, 200, 200]);
    }

    #[test]
    fn test_yuyv_red_chroma() {
        let rgb = yuyv_to_rgb(&[76, 85, 76, 255], 2, 1).unwrap();
        // Strong V pushes red up and green down.
        assert!(rgb[0] > 240, "red = {}", rgb[0]);
        assert!(rgb[1] < 10, "green = {}", rgb[1]);
    }

    #[test]
    fn test_yuyv_invalid_length() {
        assert!(yuyv_to_rgb(&[100, 128], 2, 1).is_err());
    }

    #[test]
    fn test_frame_rejects_short_buffer() {
        let err = Frame::new(vec![0; 5], FrameFormat::Rgb8, 2, 1, 0).err().unwrap();
        assert!(matches!(err, FrameError::InvalidLength { expected: 6, actual: 5 }));
    }

    #[test]
    fn test_frame_luma_and_darkness() {
        let dark = Frame::new(vec![0; 4 * 4 * 3], FrameFormat::Rgb8, 4, 4, 1).unwrap();
        assert!(dark.is_dark);
        assert_eq!(dark.avg_brightness(), 0.0);

        let bright = Frame::new(vec![200; 16], FrameFormat::Gray8, 4, 4, 2).unwrap();
        assert!(!bright.is_dark);
        assert_eq!(bright.luma(), vec![200; 16]);
    }

    #[test]
    fn test_dark_frame_thresholds() {
        assert!(is_dark_frame(&[], DARK_FRAME_THRESHOLD));

        // 96% dark, 4% bright → dark
        let mut luma = vec![10u8; 960];
        luma.extend(vec![128u8; 40]);
        assert!(is_dark_frame(&luma, DARK_FRAME_THRESHOLD));

        // 94% dark, 6% bright → not dark
        let mut luma = vec![10u8; 940];
        luma.extend(vec![128u8; 60]);
        assert!(!is_dark_frame(&luma, DARK_FRAME_THRESHOLD));
    }

    #[test]
    fn test_encode_jpeg() {
        let pixels: Vec<u8> = (0..16 * 8 * 3).map(|i| (i % 251) as u8).collect();
        let frame = Frame::new(pixels, FrameFormat::Rgb8, 16, 8, 0).unwrap();
        let jpeg = frame.encode_jpeg(80).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }
}
