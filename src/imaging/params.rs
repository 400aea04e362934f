//! Parameter types for engine operations.
//!
//! These structs describe *what* to do, not *how* to do it. They sit between
//! the stage logic (normalize, upscale, crop), which decides what to ask for,
//! and the [`ImageEngine`](super::backend::ImageEngine), which does the pixel
//! work.
//!
//! ## Types
//!
//! - [`Quality`]: JPEG quality (1–100, default 95). Clamped on construction.
//! - [`ChromaSubsampling`]: `4:4:4` (default, print masters) or `4:2:0`.
//! - [`ResampleParams`]: exact target dimensions of a Lanczos3 resample.
//! - [`JpegParams`]: quality, chroma mode, density and optional ICC profile.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Quality setting for JPEG encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(95)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChromaSubsampling {
    #[default]
    #[serde(rename = "4:4:4")]
    Yuv444,
    #[serde(rename = "4:2:0")]
    Yuv420,
}

impl ChromaSubsampling {
    pub fn label(self) -> &'static str {
        match self {
            ChromaSubsampling::Yuv444 => "4:4:4",
            ChromaSubsampling::Yuv420 => "4:2:0",
        }
    }
}

/// A Lanczos3 resample to exactly `width`×`height`.
///
/// The output is stretched to the box; callers pick a box with the source's
/// aspect ratio (upscale) or extract a matching rectangle first (crop).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResampleParams {
    pub width: u32,
    pub height: u32,
}

impl ResampleParams {
    pub fn fill(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Parameters for a JPEG encode.
#[derive(Debug, Clone, PartialEq)]
pub struct JpegParams {
    pub quality: Quality,
    pub chroma: ChromaSubsampling,
    /// Pixel density written to the JFIF header, in dots per inch.
    pub dpi: u32,
    /// ICC profile embedded as APP2 segments, when available.
    pub icc_profile: Option<Arc<[u8]>>,
}

impl Default for JpegParams {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            chroma: ChromaSubsampling::default(),
            dpi: crate::catalogue::DEFAULT_DPI,
            icc_profile: None,
        }
    }
}
