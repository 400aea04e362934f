//! Pure Rust image engine.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate (pure Rust decoders), format sniffed from bytes |
//! | Orientation | `kamadak-exif` Orientation tag (JPEG APP1, PNG eXIf, TIFF, WebP) |
//! | Resample | `image::DynamicImage::resize_exact`, Lanczos3 |
//! | Extract | `image::DynamicImage::crop_imm` |
//! | Encode → JPEG | `jpeg-encoder` (quality, 4:4:4 or 4:2:0, JFIF density, ICC APP2) |

use super::backend::{
    ColorSpace, CropRect, ImageEngine, ImagingError, RasterImage, SourceMetadata,
};
use super::params::{ChromaSubsampling, JpegParams, ResampleParams};
use image::error::UnsupportedErrorKind;
use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageError, ImageReader};
use jpeg_encoder::{ColorType, Density, Encoder, SamplingFactor};
use std::io::Cursor;

/// Pure Rust engine using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustEngine;

impl RustEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Read the EXIF Orientation tag (1-8). Missing or invalid tags read as 1.
pub fn read_orientation(bytes: &[u8]) -> u16 {
    let mut cursor = Cursor::new(bytes);
    let Ok(exif) = exif::Reader::new().read_from_container(&mut cursor) else {
        return 1;
    };
    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .map(|v| v as u16)
        .filter(|v| (1..=8).contains(v))
        .unwrap_or(1)
}

fn reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, ImagingError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ImagingError::Decode(e.to_string()))?;
    if reader.format().is_none() {
        return Err(ImagingError::Decode(
            "not a recognised image container".to_string(),
        ));
    }
    Ok(reader)
}

fn map_decode_error(err: ImageError) -> ImagingError {
    match &err {
        ImageError::Unsupported(u) if matches!(u.kind(), UnsupportedErrorKind::Color(_)) => {
            ImagingError::UnsupportedFormat(err.to_string())
        }
        _ => ImagingError::Decode(err.to_string()),
    }
}

impl ImageEngine for RustEngine {
    fn metadata(&self, bytes: &[u8]) -> Result<SourceMetadata, ImagingError> {
        let decoder = reader(bytes)?.into_decoder().map_err(map_decode_error)?;
        let (width, height) = decoder.dimensions();
        Ok(SourceMetadata {
            width,
            height,
            orientation: read_orientation(bytes),
            has_alpha: decoder.color_type().has_alpha(),
        })
    }

    fn decode(&self, bytes: &[u8]) -> Result<RasterImage, ImagingError> {
        let img = reader(bytes)?.decode().map_err(map_decode_error)?;
        Ok(RasterImage::new(img, ColorSpace::Source))
    }

    fn resample(
        &self,
        image: &RasterImage,
        params: &ResampleParams,
    ) -> Result<RasterImage, ImagingError> {
        if params.width == 0 || params.height == 0 {
            return Err(ImagingError::ProcessingFailed(format!(
                "cannot resample to {}x{}",
                params.width, params.height
            )));
        }
        let out = image
            .pixels()
            .resize_exact(params.width, params.height, FilterType::Lanczos3);
        Ok(RasterImage::new(out, image.color_space()))
    }

    fn extract(&self, image: &RasterImage, rect: CropRect) -> Result<RasterImage, ImagingError> {
        if !rect.fits_within(image.dimensions()) {
            return Err(ImagingError::InvalidRect {
                rect,
                width: image.width(),
                height: image.height(),
            });
        }
        let out = image
            .pixels()
            .crop_imm(rect.x, rect.y, rect.width, rect.height);
        Ok(RasterImage::new(out, image.color_space()))
    }

    fn encode_jpeg(
        &self,
        image: &RasterImage,
        params: &JpegParams,
    ) -> Result<Vec<u8>, ImagingError> {
        let (w, h) = (image.width(), image.height());
        let (Ok(w16), Ok(h16)) = (u16::try_from(w), u16::try_from(h)) else {
            return Err(ImagingError::Encode(format!(
                "{w}x{h} exceeds the JPEG limit of 65535px per side"
            )));
        };
        let density = u16::try_from(params.dpi)
            .map_err(|_| ImagingError::Encode(format!("density {} dpi too large", params.dpi)))?;

        let rgb = match image.pixels() {
            DynamicImage::ImageRgb8(buf) => std::borrow::Cow::Borrowed(buf.as_raw()),
            other => std::borrow::Cow::Owned(other.to_rgb8().into_raw()),
        };

        let mut out = Vec::new();
        let mut encoder = Encoder::new(&mut out, params.quality.value() as u8);
        encoder.set_sampling_factor(match params.chroma {
            ChromaSubsampling::Yuv444 => SamplingFactor::R_4_4_4,
            ChromaSubsampling::Yuv420 => SamplingFactor::R_4_2_0,
        });
        encoder.set_density(Density::Inch {
            x: density,
            y: density,
        });
        if let Some(icc) = &params.icc_profile {
            encoder
                .add_icc_profile(icc)
                .map_err(|e| ImagingError::Encode(e.to_string()))?;
        }
        encoder
            .encode(&rgb, w16, h16, ColorType::Rgb)
            .map_err(|e| ImagingError::Encode(e.to_string()))?;
        Ok(out)
    }
}
