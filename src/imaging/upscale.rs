//! Upscaler: brings the normalized raster to one canvas covering every master.
//!
//! Runs once per request. The geometry comes from
//! [`plan_upscale`](super::calculations::plan_upscale); this module only
//! drives the engine through the planned resample steps and reports which
//! path was taken for the manifest.

use super::backend::{Dimensions, ImageEngine, ImagingError, RasterImage};
use super::calculations::{UpscalePlan, plan_upscale};
use super::params::ResampleParams;
use tracing::{info, instrument};

/// Which resample path produced the working canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpscalePath {
    /// Source already covered the canvas exactly; no resample.
    Unchanged,
    /// Source was larger on both sides; one Lanczos3 resample down.
    Downscaled,
    /// One Lanczos3 resample up (factor ≤ 2×).
    Single,
    /// Lanczos3 to 2× the source, then Lanczos3 to the final canvas.
    Staged,
}

impl UpscalePath {
    pub fn was_upscaled(self) -> bool {
        matches!(self, UpscalePath::Single | UpscalePath::Staged)
    }

    pub fn describe(self) -> &'static str {
        match self {
            UpscalePath::Unchanged => "none (source already at canvas size)",
            UpscalePath::Downscaled => "single Lanczos3 resample down to canvas",
            UpscalePath::Single => "single Lanczos3 upscale",
            UpscalePath::Staged => "two-stage Lanczos3 upscale via 2x intermediate",
        }
    }
}

#[derive(Debug)]
pub struct Upscaled {
    pub raster: RasterImage,
    pub path: UpscalePath,
    pub scale: f64,
}

/// Resample `source` to the smallest same-aspect canvas covering `target`.
#[instrument(skip(engine, source), fields(src = %source.dimensions()))]
pub fn upscale(
    engine: &dyn ImageEngine,
    source: RasterImage,
    target: Dimensions,
) -> Result<Upscaled, ImagingError> {
    if source.width() == 0 || source.height() == 0 || target.width == 0 || target.height == 0 {
        return Err(ImagingError::ProcessingFailed(format!(
            "cannot scale {} to {target}",
            source.dimensions()
        )));
    }

    let plan = plan_upscale(source.dimensions(), target);
    let path = path_for(&plan, source.dimensions());

    let raster = match path {
        UpscalePath::Unchanged => source,
        UpscalePath::Downscaled | UpscalePath::Single => {
            resample_to(engine, &source, plan.output)?
        }
        UpscalePath::Staged => {
            let intermediate = plan.intermediate.unwrap_or(plan.output);
            let halfway = resample_to(engine, &source, intermediate)?;
            drop(source);
            resample_to(engine, &halfway, plan.output)?
        }
    };

    info!(
        path = ?path,
        scale = plan.scale,
        width = raster.width(),
        height = raster.height(),
        "canvas ready"
    );

    Ok(Upscaled {
        raster,
        path,
        scale: plan.scale,
    })
}

fn path_for(plan: &UpscalePlan, source: Dimensions) -> UpscalePath {
    if plan.is_staged() {
        UpscalePath::Staged
    } else if plan.upscaled {
        UpscalePath::Single
    } else if plan.output == source {
        UpscalePath::Unchanged
    } else {
        UpscalePath::Downscaled
    }
}

fn resample_to(
    engine: &dyn ImageEngine,
    image: &RasterImage,
    size: Dimensions,
) -> Result<RasterImage, ImagingError> {
    engine.resample(image, &ResampleParams::fill(size.width, size.height))
}
