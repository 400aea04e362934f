//! Image processing in pure Rust, statically linked.
//!
//! | Stage | Module | Crate / function |
//! |---|---|---|
//! | **Normalize** | [`normalize`] | `image` decode, `kamadak-exif` orientation, alpha flatten |
//! | **Upscale** | [`upscale`] | Lanczos3 `resize_exact`, staged through 2× |
//! | **Crop** | [`crop`] + [`saliency`] | summed-area saliency search, centered fallback |
//! | **Encode** | [`rust_backend`] | `jpeg-encoder` q95, 4:4:4, JFIF density, ICC |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for canvas and crop geometry (unit testable)
//! - **Parameters**: Data structures describing engine operations
//! - **Backend**: [`ImageEngine`] trait + [`RustEngine`]
//! - **Stages**: normalize, upscale, saliency and crop, each driving the engine

pub mod backend;
mod calculations;
pub mod crop;
pub mod normalize;
mod params;
pub mod rust_backend;
pub mod saliency;
pub mod upscale;

pub use backend::{
    ColorSpace, CropRect, Dimensions, ImageEngine, ImagingError, RasterImage, SourceMetadata,
};
pub use calculations::{
    UpscalePlan, aspect_deviation, aspect_frame, center_crop_rect, cover_dimensions, plan_upscale,
    scale_factor,
};
pub use crop::{CropDecision, CropResult, CropStrategy, CroppedRaster, Cropper, FallbackReason};
pub use normalize::{NormalizedImage, load_icc_profile, normalize};
pub use params::{ChromaSubsampling, JpegParams, Quality, ResampleParams};
pub use rust_backend::RustEngine;
pub use saliency::{DetectorError, DisabledDetector, EdgeSaliencyDetector, SaliencyDetector};
pub use upscale::{UpscalePath, Upscaled, upscale};
