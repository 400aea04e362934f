//! Image normalization: the first pipeline stage.
//!
//! Raw upload bytes go in; an upright, 8-bit sRGB, fully opaque raster comes
//! out. Order matters:
//!
//! 1. **Decode** through the [`ImageEngine`].
//! 2. **Orient**: apply the EXIF Orientation tag so stored pixels match what a
//!    viewer shows.
//! 3. **sRGB**: collapse every supported sample layout to 8-bit RGB(A).
//! 4. **Flatten**: composite any alpha channel onto white, since every output
//!    is an opaque JPEG.
//!
//! The optional ICC profile embedded into outputs is loaded separately by
//! [`load_icc_profile`]; a missing profile file is logged and ignored.

use super::backend::{ColorSpace, Dimensions, ImageEngine, ImagingError, RasterImage};
use image::{DynamicImage, Rgb, RgbImage};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Output of [`normalize`]: the working raster plus facts the manifest reports.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub raster: RasterImage,
    /// Stored dimensions of the upload, before orientation.
    pub original: Dimensions,
    pub orientation: u16,
    pub had_alpha: bool,
}

impl NormalizedImage {
    /// True when the orientation tag swapped width and height.
    pub fn was_rotated(&self) -> bool {
        self.orientation >= 5
    }
}

#[instrument(skip_all, fields(bytes = bytes.len()))]
pub fn normalize(engine: &dyn ImageEngine, bytes: &[u8]) -> Result<NormalizedImage, ImagingError> {
    let meta = engine.metadata(bytes)?;
    let decoded = engine.decode(bytes)?;
    let original = decoded.dimensions();
    let had_alpha = decoded.has_alpha();

    let oriented = apply_orientation(decoded.into_pixels(), meta.orientation);
    let raster = to_srgb(oriented)?;

    debug!(
        orientation = meta.orientation,
        had_alpha,
        width = raster.width(),
        height = raster.height(),
        "normalized"
    );

    Ok(NormalizedImage {
        raster,
        original,
        orientation: meta.orientation,
        had_alpha,
    })
}

/// Apply an EXIF orientation transform so the pixels are upright.
pub fn apply_orientation(img: DynamicImage, orientation: u16) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Collapse a decoded image to opaque 8-bit sRGB.
fn to_srgb(img: DynamicImage) -> Result<RasterImage, ImagingError> {
    let rgb = match img {
        DynamicImage::ImageRgb8(buf) => buf,
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageRgb16(_)
        | DynamicImage::ImageRgb32F(_) => img.to_rgb8(),
        DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageLumaA16(_)
        | DynamicImage::ImageRgba8(_)
        | DynamicImage::ImageRgba16(_)
        | DynamicImage::ImageRgba32F(_) => flatten_on_white(&img),
        other => {
            return Err(ImagingError::UnsupportedFormat(format!(
                "cannot convert {:?} samples to sRGB",
                other.color()
            )));
        }
    };
    Ok(RasterImage::new(DynamicImage::ImageRgb8(rgb), ColorSpace::Srgb))
}

/// Composite onto an opaque white background: `out = a·c + (1 − a)·255`.
fn flatten_on_white(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    RgbImage::from_fn(w, h, |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Load the ICC profile embedded into every output JPEG.
///
/// Returns `None` (with a warning) when the file is missing or unreadable;
/// outputs are then written without an embedded profile.
pub fn load_icc_profile(path: &Path) -> Option<Arc<[u8]>> {
    match std::fs::read(path) {
        Ok(bytes) if !bytes.is_empty() => {
            debug!(path = %path.display(), size = bytes.len(), "loaded ICC profile");
            Some(bytes.into())
        }
        Ok(_) => {
            warn!(path = %path.display(), "ICC profile is empty, continuing without it");
            None
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ICC profile unavailable, continuing without it");
            None
        }
    }
}
