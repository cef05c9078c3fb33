//! Decoded image resources.

use crate::error::FetchError;
use image::RgbaImage;

/// A decoded RGBA bitmap ready to be blitted
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pixels: RgbaImage,
}

impl DecodedImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    /// Decode any format the `image` crate recognizes
    pub fn decode(bytes: &[u8]) -> Result<Self, FetchError> {
        let pixels = image::load_from_memory(bytes)?.into_rgba8();
        Ok(Self { pixels })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}
