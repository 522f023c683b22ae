//! Immutable image snapshots.

use std::fmt;
use std::sync::Arc;

use image::{DynamicImage, GenericImageView, RgbImage};

/// An immutable raster image.
///
/// Cloning is cheap: clones share the same pixel buffer. There is no way to
/// obtain mutable access to the pixels, so every edit produces a new `Image`
/// and snapshots held by the history can never change behind its back.
#[derive(Clone)]
pub struct Image {
    pixels: Arc<DynamicImage>,
}

impl Image {
    /// Wrap a decoded image.
    pub fn new(pixels: DynamicImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    /// Create an RGB image filled with a single colour.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let buffer = RgbImage::from_pixel(width, height, image::Rgb(rgb));
        Self::new(DynamicImage::ImageRgb8(buffer))
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Borrow the underlying pixels.
    pub fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }

    /// RGB copy of the pixels, the working format of every raster operation.
    pub fn to_rgb8(&self) -> RgbImage {
        self.pixels.to_rgb8()
    }

    /// True when both handles point at the same pixel buffer.
    pub fn same_buffer(&self, other: &Image) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

impl From<DynamicImage> for Image {
    fn from(pixels: DynamicImage) -> Self {
        Self::new(pixels)
    }
}

impl From<RgbImage> for Image {
    fn from(buffer: RgbImage) -> Self {
        Self::new(DynamicImage::ImageRgb8(buffer))
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Image({}x{})", self.width(), self.height())
    }
}
