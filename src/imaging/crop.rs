//! Cropper: one target-size JPEG per request, from a shared read-only raster.
//!
//! Every crop tries the [`SaliencyDetector`] first. Anything short of a valid
//! in-bounds rectangle with the right aspect ratio (no proposal, a detector
//! error, a malformed rectangle) becomes a [`CropDecision::Fallback`] and the
//! centered crop from [`center_crop_rect`] is used instead. Fallback never
//! surfaces as an error; only engine failures (extract, resample, encode) do.

use super::backend::{CropRect, Dimensions, ImageEngine, ImagingError, RasterImage};
use super::calculations::{aspect_deviation, center_crop_rect};
use super::params::{JpegParams, ResampleParams};
use super::saliency::SaliencyDetector;
use tracing::{debug, warn};

/// Largest aspect error accepted from a detector proposal.
const MAX_PROPOSAL_DEVIATION: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropStrategy {
    ContentAware,
    CenterFallback,
}

impl CropStrategy {
    pub fn label(self) -> &'static str {
        match self {
            CropStrategy::ContentAware => "content-aware",
            CropStrategy::CenterFallback => "center",
        }
    }
}

/// Why the detector's answer was not used.
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    /// Detector returned no rectangle.
    NoProposal,
    DetectorFailed(String),
    /// Rectangle out of bounds, empty, or of the wrong aspect ratio.
    InvalidProposal(CropRect),
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackReason::NoProposal => write!(f, "no salient region"),
            FallbackReason::DetectorFailed(e) => write!(f, "detector failed: {e}"),
            FallbackReason::InvalidProposal(r) => write!(
                f,
                "unusable proposal {}x{}+{}+{}",
                r.width, r.height, r.x, r.y
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CropDecision {
    Salient(CropRect),
    Fallback(FallbackReason),
}

/// A crop at its target size, not yet encoded.
///
/// Sub-sizes are cut from a master's `CroppedRaster`, so the raster stays
/// available until the ratio's ladder is done.
#[derive(Debug)]
pub struct CroppedRaster {
    pub raster: RasterImage,
    /// Selected rectangle in the source raster's pixel space.
    pub source_rect: CropRect,
    pub strategy: CropStrategy,
}

/// An encoded crop plus its provenance.
#[derive(Debug, Clone)]
pub struct CropResult {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub source_rect: CropRect,
    pub strategy: CropStrategy,
}

pub struct Cropper<'a> {
    engine: &'a dyn ImageEngine,
    detector: &'a dyn SaliencyDetector,
    jpeg: &'a JpegParams,
}

impl<'a> Cropper<'a> {
    pub fn new(
        engine: &'a dyn ImageEngine,
        detector: &'a dyn SaliencyDetector,
        jpeg: &'a JpegParams,
    ) -> Self {
        Self {
            engine,
            detector,
            jpeg,
        }
    }

    /// Ask the detector and validate its answer against `source` and `target`.
    pub fn decide(&self, source: &RasterImage, target: Dimensions) -> CropDecision {
        match self.detector.find_crop(source, target.width, target.height) {
            Ok(Some(rect)) if is_usable(rect, source.dimensions(), target) => {
                CropDecision::Salient(rect)
            }
            Ok(Some(rect)) => CropDecision::Fallback(FallbackReason::InvalidProposal(rect)),
            Ok(None) => CropDecision::Fallback(FallbackReason::NoProposal),
            Err(e) => CropDecision::Fallback(FallbackReason::DetectorFailed(e.to_string())),
        }
    }

    /// Select, extract and resample a `target`-sized raster out of `source`.
    pub fn crop_raster(
        &self,
        source: &RasterImage,
        target: Dimensions,
    ) -> Result<CroppedRaster, ImagingError> {
        if target.width == 0 || target.height == 0 {
            return Err(ImagingError::ProcessingFailed(format!(
                "cannot crop to {target}"
            )));
        }

        let (rect, strategy) = self.select(source, target);
        let extracted = self.engine.extract(source, rect)?;
        let raster = if extracted.dimensions() == target {
            extracted
        } else {
            self.engine.resample(
                &extracted,
                &ResampleParams::fill(target.width, target.height),
            )?
        };

        Ok(CroppedRaster {
            raster,
            source_rect: rect,
            strategy,
        })
    }

    /// Cut `source` down to `aspect`'s aspect ratio at full resolution.
    ///
    /// Used before the upscale on sources outside the masters' aspect band.
    /// The window is chosen like any crop (detector first, centered fallback)
    /// but is not resampled.
    pub fn trim(
        &self,
        source: &RasterImage,
        aspect: Dimensions,
    ) -> Result<CroppedRaster, ImagingError> {
        if aspect.width == 0 || aspect.height == 0 {
            return Err(ImagingError::ProcessingFailed(format!(
                "cannot trim to {aspect}"
            )));
        }
        let (rect, strategy) = self.select(source, aspect);
        Ok(CroppedRaster {
            raster: self.engine.extract(source, rect)?,
            source_rect: rect,
            strategy,
        })
    }

    /// The window to cut: the detector's proposal, or the centered crop.
    fn select(&self, source: &RasterImage, target: Dimensions) -> (CropRect, CropStrategy) {
        match self.decide(source, target) {
            CropDecision::Salient(rect) => (rect, CropStrategy::ContentAware),
            CropDecision::Fallback(reason) => {
                if reason == FallbackReason::NoProposal {
                    debug!(size = %target, %reason, "using centered crop");
                } else {
                    warn!(size = %target, %reason, "content-aware crop failed, using centered crop");
                }
                (
                    center_crop_rect(source.dimensions(), target),
                    CropStrategy::CenterFallback,
                )
            }
        }
    }

    /// Encode a cropped raster with this cropper's JPEG settings.
    pub fn encode(&self, cropped: &CroppedRaster) -> Result<CropResult, ImagingError> {
        let bytes = self.engine.encode_jpeg(&cropped.raster, self.jpeg)?;
        Ok(CropResult {
            bytes,
            width: cropped.raster.width(),
            height: cropped.raster.height(),
            source_rect: cropped.source_rect,
            strategy: cropped.strategy,
        })
    }

    /// [`crop_raster`](Self::crop_raster) followed by [`encode`](Self::encode).
    pub fn crop(&self, source: &RasterImage, target: Dimensions) -> Result<CropResult, ImagingError> {
        let cropped = self.crop_raster(source, target)?;
        self.encode(&cropped)
    }
}

fn is_usable(rect: CropRect, bounds: Dimensions, target: Dimensions) -> bool {
    rect.fits_within(bounds) && aspect_deviation(rect.dimensions(), target) <= MAX_PROPOSAL_DEVIATION
}
