use crate::photo::{ImagePayload, PhotoError};
use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;

/// Turns a raw video frame into a compressed image payload
pub trait FrameEncoder: Send + Sync {
    fn encode(&self, frame: &RgbImage) -> Result<ImagePayload, PhotoError>;
}

/// Lossy JPEG encoding at a fixed quality (1-100)
#[derive(Debug, Clone, Copy)]
pub struct JpegFrameEncoder {
    quality: u8,
}

impl JpegFrameEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

impl Default for JpegFrameEncoder {
    fn default() -> Self {
        Self::new(80)
    }
}

impl FrameEncoder for JpegFrameEncoder {
    fn encode(&self, frame: &RgbImage) -> Result<ImagePayload, PhotoError> {
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, self.quality).encode_image(frame)?;
        Ok(ImagePayload::new("image/jpeg", buf))
    }
}
