//! Image engine trait and the raster types that flow between pipeline stages.
//!
//! The [`ImageEngine`] trait is the whole pixel-level surface the pipeline
//! depends on: metadata, decode, resample, extract and JPEG encode. The
//! production implementation is [`RustEngine`](super::rust_backend::RustEngine);
//! tests swap in a recording mock so stage logic can be checked without
//! touching pixels.

use super::params::{JpegParams, ResampleParams};
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("Could not decode image: {0}")]
    Decode(String),
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("Encode failed: {0}")]
    Encode(String),
    #[error("Crop rectangle {rect:?} does not fit a {width}x{height} image")]
    InvalidRect {
        rect: CropRect,
        width: u32,
        height: u32,
    },
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// True when `self` is at least as large as `other` in both dimensions.
    pub fn contains(self, other: Dimensions) -> bool {
        self.width >= other.width && self.height >= other.height
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}px", self.width, self.height)
    }
}

/// A rectangle in the pixel space of some source raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// Non-empty and entirely inside `bounds`.
    pub fn fits_within(&self, bounds: Dimensions) -> bool {
        self.width > 0
            && self.height > 0
            && self.x as u64 + self.width as u64 <= bounds.width as u64
            && self.y as u64 + self.height as u64 <= bounds.height as u64
    }
}

/// Color space a raster's samples are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    /// Whatever the source container declared; not yet normalized.
    Source,
    Srgb,
}

/// An in-memory decoded image.
///
/// Stages never mutate a raster in place: each one produces a new raster and
/// the previous one can be dropped as soon as the stage completes.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pixels: DynamicImage,
    color_space: ColorSpace,
}

impl RasterImage {
    pub fn new(pixels: DynamicImage, color_space: ColorSpace) -> Self {
        Self {
            pixels,
            color_space,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width(), self.height())
    }

    pub fn has_alpha(&self) -> bool {
        self.pixels.color().has_alpha()
    }

    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    pub fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }

    pub fn into_pixels(self) -> DynamicImage {
        self.pixels
    }
}

/// Header-level facts about an encoded image, read without a full decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceMetadata {
    pub width: u32,
    pub height: u32,
    /// EXIF orientation, 1 (as stored) through 8.
    pub orientation: u16,
    pub has_alpha: bool,
}

/// Pixel-level capabilities the pipeline consumes.
///
/// Implementations must be shareable across the crop worker pool, hence
/// `Send + Sync`.
pub trait ImageEngine: Send + Sync {
    /// Read dimensions, orientation and alpha presence from the container.
    fn metadata(&self, bytes: &[u8]) -> Result<SourceMetadata, ImagingError>;

    /// Decode encoded bytes into a raster, as stored (no orientation applied).
    fn decode(&self, bytes: &[u8]) -> Result<RasterImage, ImagingError>;

    /// Resample to new pixel dimensions.
    fn resample(
        &self,
        image: &RasterImage,
        params: &ResampleParams,
    ) -> Result<RasterImage, ImagingError>;

    /// Copy a rectangle out of a raster.
    fn extract(&self, image: &RasterImage, rect: CropRect) -> Result<RasterImage, ImagingError>;

    /// Encode as JPEG with the given quality, chroma mode, density and profile.
    fn encode_jpeg(&self, image: &RasterImage, params: &JpegParams)
    -> Result<Vec<u8>, ImagingError>;
}
