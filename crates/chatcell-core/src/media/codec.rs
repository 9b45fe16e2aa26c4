//! Image decoding.

use std::fmt;
use std::sync::Arc;

use image::RgbaImage;

use crate::layout::Size;

/// Errors from decoding image bytes.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// No bytes to decode.
    #[error("Empty image data")]
    Empty,

    /// Unsupported format or corrupt data.
    #[error("{0}")]
    Image(#[from] image::ImageError),
}

/// Decoded RGBA pixels, cheap to clone.
#[derive(Clone)]
pub struct DecodedImage {
    pixels: Arc<RgbaImage>,
}

impl DecodedImage {
    /// Wrap decoded pixels.
    #[must_use]
    pub fn new(pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Pixel dimensions as a layout size.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn size(&self) -> Size {
        Size::new(self.width() as f32, self.height() as f32)
    }

    /// The decoded pixel buffer.
    #[must_use]
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Whether two handles share the same pixel buffer.
    #[must_use]
    pub fn same_pixels(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

impl fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

/// Turns encoded bytes into pixels.
pub trait ImageCodec {
    /// Decode `bytes` into an image.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are empty or not a supported image.
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, CodecError>;
}

/// Codec for the raster formats supported by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterCodec;

impl ImageCodec for RasterCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, CodecError> {
        if bytes.is_empty() {
            return Err(CodecError::Empty);
        }
        let image = image::load_from_memory(bytes)?;
        Ok(DecodedImage::new(image.to_rgba8()))
    }
}
