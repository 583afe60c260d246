use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Received an empty image")]
    Empty,
    #[error("Failed to decode image: {0}")]
    DecodeFailed(image::ImageError),
    #[error("Failed to encode image: {0}")]
    EncodeFailed(image::ImageError),
}

/// A decoded camera snapshot held by a session until a prediction consumes it.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub image: DynamicImage,
}

impl CapturedImage {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        let image = image::load_from_memory(bytes).map_err(ImageError::DecodeFailed)?;
        Ok(Self { image })
    }

    /// JPEG has no alpha channel, so the bitmap is flattened to RGB8 first.
    pub fn to_jpg(&self) -> Result<Vec<u8>, ImageError> {
        let rgb = DynamicImage::ImageRgb8(self.image.to_rgb8());
        let mut buf = Cursor::new(Vec::new());
        rgb.write_to(&mut buf, ImageFormat::Jpeg)
            .map_err(ImageError::EncodeFailed)?;
        Ok(buf.into_inner())
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }
}
